//! CLI binary for svg2gif-batch.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `StoreConfig` + `BatchConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use svg2gif_batch::{
    convert_container, BatchConfig, BatchProgressCallback, BatchStats, OpendalStore,
    ProgressCallback, StoreConfig, DEFAULT_CONTAINER,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback. The total is unknown until the listing is
/// exhausted, so the bar length grows by each page's candidate count.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>5}/{len} items  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Listing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold("Starting batch conversion…")
        ));
    }

    fn on_page_start(&self, page_num: usize, listed: usize, candidates: usize) {
        self.bar.inc_length(candidates as u64);
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!("page {page_num}"));
        self.bar.println(format!(
            "  {} Page {:>4}  {}",
            cyan("▸"),
            page_num,
            dim(&format!("{listed} listed, {candidates} candidates")),
        ));
    }

    fn on_item_complete(&self, _key: &str, _output_name: &str, _bytes: usize) {
        self.bar.inc(1);
    }

    fn on_item_error(&self, key: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(100) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };

        self.bar
            .println(format!("  {} {}  {}", red("✗"), key, red(&msg)));
        self.bar.inc(1);
    }

    fn on_page_complete(&self, page_num: usize, converted: usize, failed: usize) {
        let mark = if failed == 0 { green("✓") } else { cyan("⚠") };
        self.bar.println(format!(
            "  {} Page {:>4}  {}",
            mark,
            page_num,
            dim(&format!("{converted} converted, {failed} failed")),
        ));
    }

    fn on_batch_complete(&self, stats: &BatchStats) {
        self.bar.finish_and_clear();

        if stats.failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&stats.converted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if stats.converted == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&stats.converted.to_string()),
                stats.candidates,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert the default container into ./gifs
  svg2gif --connection-string "$AZURE_STORAGE" -o ./gifs

  # Only one folder, eight workers
  svg2gif --prefix runs/2019/ -c 8 -o ./gifs

  # Convert a local directory tree instead of a container
  svg2gif --source-dir ./charts -o ./gifs

  # Also upload each GIF next to its SVG
  svg2gif --upload -o ./gifs

  # Machine-readable summary
  svg2gif --json -o ./gifs > stats.json

ENVIRONMENT VARIABLES:
  SVG2GIF_CONNECTION_STRING  Azure storage connection string (also: ConnectionString)
  SVG2GIF_OUTPUT_PATH        Output directory (also: OutputPath)
  RUST_LOG                   Override the log filter (e.g. svg2gif_batch=debug)
"#;

/// Convert every SVG in a blob container into a GIF.
#[derive(Parser, Debug)]
#[command(
    name = "svg2gif",
    version,
    about = "Convert every SVG in a blob container into a trimmed, width-capped GIF",
    long_about = "Walk a blob container page by page, convert each SVG larger than the size \
threshold into a GIF (rasterised at high density, trimmed, resized to a maximum width) and \
write it to a local directory. Items that fail are logged and skipped; the batch continues.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Azure storage connection string.
    #[arg(long, env = "SVG2GIF_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    /// Container to convert.
    #[arg(long, env = "SVG2GIF_CONTAINER", default_value = DEFAULT_CONTAINER)]
    container: String,

    /// Read SVGs from a local directory instead of a container.
    #[arg(long, env = "SVG2GIF_SOURCE_DIR")]
    source_dir: Option<PathBuf>,

    /// Directory the GIFs are written to.
    #[arg(short, long, env = "SVG2GIF_OUTPUT_PATH")]
    output_path: Option<PathBuf>,

    /// Only convert keys under this prefix.
    #[arg(long, env = "SVG2GIF_PREFIX", default_value = "")]
    prefix: String,

    /// Objects requested per listing call.
    #[arg(long, env = "SVG2GIF_PAGE_SIZE", default_value_t = 100)]
    page_size: usize,

    /// Maximum conversions in flight.
    #[arg(short, long, env = "SVG2GIF_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Skip SVGs of this many bytes or fewer.
    #[arg(long, env = "SVG2GIF_MIN_SIZE", default_value_t = 1024)]
    min_size: u64,

    /// Downscale GIFs wider than this.
    #[arg(long, env = "SVG2GIF_MAX_WIDTH", default_value_t = 1600)]
    max_width: u32,

    /// Rasterisation density in DPI.
    #[arg(long, env = "SVG2GIF_DENSITY", default_value_t = 1000.0)]
    density: f32,

    /// Background colour the SVG is flattened onto, as RRGGBB hex.
    #[arg(long, env = "SVG2GIF_BACKGROUND", default_value = "ffffff", value_parser = parse_hex_rgb)]
    background: [u8; 3],

    /// Upload each GIF back to the store next to its source.
    #[arg(long, env = "SVG2GIF_UPLOAD")]
    upload: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "SVG2GIF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SVG2GIF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SVG2GIF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SVG2GIF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs; warnings (failed
    // items) still come through.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build store + config ─────────────────────────────────────────────
    let store_config = build_store_config(&cli)?;
    let store = OpendalStore::new(&store_config).context("Failed to open object store")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_container(Arc::new(store), &config)
        .await
        .context("Batch conversion failed")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        // Only print inline stats when the progress callback is disabled.
        let stats = &output.stats;
        eprintln!(
            "Converted {}/{} files in {}ms ({} pages, {} skipped)",
            stats.converted, stats.candidates, stats.total_duration_ms, stats.pages, stats.skipped
        );
        for failure in &output.failures {
            eprintln!("  {} [{}] {}", failure.key, failure.stage, failure.message);
        }
    } else if !cli.quiet {
        eprintln!(
            "   {} pages  /  {} skipped  —  {}ms total  →  {}",
            dim(&output.stats.pages.to_string()),
            dim(&output.stats.skipped.to_string()),
            output.stats.total_duration_ms,
            bold(&config.output_dir.display().to_string()),
        );
    }

    Ok(())
}

/// Pick the local-directory backend if requested, otherwise Azure.
fn build_store_config(cli: &Cli) -> Result<StoreConfig> {
    if let Some(ref root) = cli.source_dir {
        return Ok(StoreConfig::Fs { root: root.clone() });
    }

    let connection_string = cli
        .connection_string
        .clone()
        .or_else(|| std::env::var("ConnectionString").ok())
        .context(
            "No connection string: pass --connection-string, set SVG2GIF_CONNECTION_STRING, \
             or use --source-dir",
        )?;

    Ok(StoreConfig::AzureBlob {
        connection_string,
        container: cli.container.clone(),
    })
}

/// Parse `RRGGBB` (optionally `#`-prefixed) into RGB bytes.
fn parse_hex_rgb(s: &str) -> Result<[u8; 3], String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("expected RRGGBB, got '{s}'"));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("expected RRGGBB, got '{s}'"))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let output_dir = cli
        .output_path
        .clone()
        .or_else(|| std::env::var_os("OutputPath").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut builder = BatchConfig::builder()
        .output_dir(output_dir)
        .prefix(cli.prefix.clone())
        .page_size(cli.page_size)
        .concurrency(cli.concurrency)
        .min_size_bytes(cli.min_size)
        .max_width(cli.max_width)
        .density(cli.density)
        .background(cli.background)
        .upload_results(cli.upload);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_background_parses_with_or_without_hash() {
        assert_eq!(parse_hex_rgb("ffffff"), Ok([255, 255, 255]));
        assert_eq!(parse_hex_rgb("#1a2B3c"), Ok([0x1a, 0x2b, 0x3c]));
        assert!(parse_hex_rgb("fff").is_err());
        assert!(parse_hex_rgb("gg0000").is_err());
        assert!(parse_hex_rgb("ffé000").is_err());
    }
}
