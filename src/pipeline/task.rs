//! One unit of work: download, convert, persist and optionally upload.
//!
//! ## Return value
//!
//! [`ConversionTask::execute`] always returns a [`ConversionResult`], never
//! an `Err`. Every failure is logged with the item key, reported to the
//! progress callback and folded into the result so a single bad SVG cannot
//! abort the batch.
//!
//! ## Atomic writes
//!
//! The GIF is written to a `.tmp` sibling first and renamed into place, so a
//! failed or interrupted item never leaves a truncated file under its final
//! name. The `.tmp` file is removed again if either step fails.
//!
//! ## Contained output
//!
//! Object keys become relative paths under `output_dir`. Keys with `..`,
//! root or drive-prefix components are rejected before download.

use super::converter::{RasterConverter, RasterOutput};
use super::filter::CandidateItem;
use crate::config::BatchConfig;
use crate::error::{ItemError, StoreError};
use crate::output::{ConversionResult, ConvertedItem};
use crate::progress::ProgressCallback;
use crate::store::ObjectStore;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Replace a trailing `source_ext` with `target_ext`, leaving the rest of the
/// key untouched. Keys without the source extension get the target appended.
pub fn derive_output_name(key: &str, source_ext: &str, target_ext: &str) -> String {
    let stem = key.strip_suffix(source_ext).unwrap_or(key);
    format!("{stem}{target_ext}")
}

/// Executes conversions; shared by every worker of the pool.
pub struct ConversionTask {
    store: Arc<dyn ObjectStore>,
    converter: Arc<dyn RasterConverter>,
    config: Arc<BatchConfig>,
}

impl ConversionTask {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        converter: Arc<dyn RasterConverter>,
        config: Arc<BatchConfig>,
    ) -> Self {
        Self {
            store,
            converter,
            config,
        }
    }

    /// Name the GIF for `key` will be written and uploaded under.
    pub fn output_name(&self, key: &str) -> String {
        derive_output_name(
            key,
            &self.config.source_extension,
            &self.config.target_extension,
        )
    }

    pub fn progress_callback(&self) -> Option<&ProgressCallback> {
        self.config.progress_callback.as_ref()
    }

    /// Convert one candidate. Never fails; see the module docs.
    pub async fn execute(&self, candidate: CandidateItem) -> ConversionResult {
        let key = candidate.key().to_string();
        let output_name = self.output_name(&key);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_item_start(&key);
        }

        let outcome = self.run(&key, &output_name).await;

        match &outcome {
            Ok(item) => {
                debug!(
                    key = %key,
                    output = %output_name,
                    bytes = item.bytes,
                    width = item.width,
                    height = item.height,
                    duration_ms = item.duration_ms,
                    "Converted"
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_item_complete(&key, &output_name, item.bytes);
                }
            }
            Err(e) => {
                warn!(key = %key, stage = e.stage(), error = %e, "Conversion failed");
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_item_error(&key, &e.to_string());
                }
            }
        }

        ConversionResult {
            source_key: key,
            output_name,
            outcome,
        }
    }

    async fn run(&self, key: &str, output_name: &str) -> Result<ConvertedItem, ItemError> {
        let start = Instant::now();

        let local_path =
            contained_path(&self.config.output_dir, output_name).ok_or_else(|| {
                ItemError::Write {
                    key: key.to_string(),
                    path: self.config.output_dir.join(output_name),
                    detail: "output name escapes the output directory".to_string(),
                }
            })?;

        // ── Step 1: Download ─────────────────────────────────────────────
        let source = self
            .store
            .download(key)
            .await
            .map_err(|e| ItemError::Download {
                key: key.to_string(),
                detail: e.to_string(),
            })?;

        // ── Step 2: Convert (CPU-bound) ──────────────────────────────────
        let raster = self.convert_blocking(key, source).await?;

        // ── Step 3: Persist locally ──────────────────────────────────────
        write_atomic(&local_path, &raster.bytes)
            .await
            .map_err(|e| ItemError::Write {
                key: key.to_string(),
                path: local_path.clone(),
                detail: e.to_string(),
            })?;

        // ── Step 4: Upload (opt-in) ──────────────────────────────────────
        let bytes = raster.bytes.len();
        let uploaded = if self.config.upload_results {
            self.upload(key, output_name, raster.bytes).await?;
            true
        } else {
            false
        };

        Ok(ConvertedItem {
            local_path,
            bytes,
            width: raster.width,
            height: raster.height,
            uploaded,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn convert_blocking(&self, key: &str, source: Vec<u8>) -> Result<RasterOutput, ItemError> {
        let converter = Arc::clone(&self.converter);
        tokio::task::spawn_blocking(move || converter.convert(&source))
            .await
            .map_err(|e| ItemError::Panicked {
                key: key.to_string(),
                detail: format!("converter panicked: {e}"),
            })?
            .map_err(|e| e.for_item(key))
    }

    async fn upload(&self, key: &str, output_name: &str, bytes: Vec<u8>) -> Result<(), ItemError> {
        self.store
            .upload(output_name, bytes)
            .await
            .map_err(|e: StoreError| ItemError::Upload {
                key: key.to_string(),
                target: output_name.to_string(),
                detail: e.to_string(),
            })
    }
}

/// `output_dir/output_name`, or `None` if the name is not a plain relative
/// path.
fn contained_path(output_dir: &Path, output_name: &str) -> Option<PathBuf> {
    let relative = Path::new(output_name);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    let has_file = relative
        .components()
        .any(|c| matches!(c, Component::Normal(_)));
    (plain && has_file).then(|| output_dir.join(relative))
}

/// Write to a temp sibling, then rename into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = tmp_sibling(path);
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::pipeline::filter::CandidateFilter;
    use crate::store::{MemoryStore, ObjectDescriptor};

    /// Echoes the source bytes back as the "raster".
    struct EchoConverter;

    impl RasterConverter for EchoConverter {
        fn convert(&self, source: &[u8]) -> Result<RasterOutput, ConvertError> {
            if source.starts_with(b"bad") {
                return Err(ConvertError::Decode("not an svg".into()));
            }
            Ok(RasterOutput {
                bytes: source.to_vec(),
                width: 1,
                height: 1,
            })
        }
    }

    fn candidate(key: &str) -> CandidateItem {
        CandidateFilter::new(".svg", 0)
            .select(&[ObjectDescriptor::object(key, 1)])
            .pop()
            .expect("candidate")
    }

    fn task(store: Arc<MemoryStore>, out: &Path, upload: bool) -> ConversionTask {
        let config = BatchConfig::builder()
            .output_dir(out)
            .upload_results(upload)
            .build()
            .unwrap();
        ConversionTask::new(store, Arc::new(EchoConverter), Arc::new(config))
    }

    #[test]
    fn output_name_replaces_only_trailing_extension() {
        assert_eq!(derive_output_name("chart.svg", ".svg", ".gif"), "chart.gif");
        assert_eq!(
            derive_output_name("runs/2019/a.svg.svg", ".svg", ".gif"),
            "runs/2019/a.svg.gif"
        );
        assert_eq!(derive_output_name("a.b.svg", ".svg", ".gif"), "a.b.gif");
        assert_eq!(derive_output_name("noext", ".svg", ".gif"), "noext.gif");
    }

    #[test]
    fn tmp_sibling_keeps_directory() {
        let p = tmp_sibling(Path::new("/out/runs/a.gif"));
        assert_eq!(p, PathBuf::from("/out/runs/a.gif.tmp"));
    }

    #[test]
    fn contained_path_rejects_escaping_names() {
        let out = Path::new("/out");
        assert_eq!(
            contained_path(out, "runs/a.gif"),
            Some(PathBuf::from("/out/runs/a.gif"))
        );
        assert_eq!(
            contained_path(out, "./a.gif"),
            Some(PathBuf::from("/out/./a.gif"))
        );
        assert_eq!(contained_path(out, "../a.gif"), None);
        assert_eq!(contained_path(out, "runs/../../a.gif"), None);
        assert_eq!(contained_path(out, "/etc/a.gif"), None);
        assert_eq!(contained_path(out, ""), None);
    }

    #[tokio::test]
    async fn escaping_keys_never_leave_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let store = Arc::new(MemoryStore::new());
        for key in ["../escaped.svg", "nested/../../escaped2.svg"] {
            store.insert(key, b"GIFDATA".to_vec());
            let result = task(store.clone(), &out, false).execute(candidate(key)).await;
            assert_eq!(result.error().map(ItemError::stage), Some("write"), "{key}");
        }

        assert!(!dir.path().join("escaped.gif").exists());
        assert!(!dir.path().join("escaped2.gif").exists());
        assert_eq!(store.downloads(), 0);
    }

    #[tokio::test]
    async fn rename_failure_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory where the GIF should go makes the rename fail.
        std::fs::create_dir_all(dir.path().join("chart.gif/inner")).unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("chart.svg", b"GIFDATA".to_vec());

        let result = task(store, dir.path(), false)
            .execute(candidate("chart.svg"))
            .await;

        assert_eq!(result.error().map(ItemError::stage), Some("write"));
        assert!(!dir.path().join("chart.gif.tmp").exists());
        assert!(dir.path().join("chart.gif").is_dir());
    }

    #[tokio::test]
    async fn success_writes_file_under_nested_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("runs/chart.svg", b"GIFDATA".to_vec());
        let c = candidate("runs/chart.svg");

        let result = task(store.clone(), dir.path(), false).execute(c).await;

        assert_eq!(result.output_name, "runs/chart.gif");
        let item = result.outcome.expect("success");
        assert_eq!(item.local_path, dir.path().join("runs/chart.gif"));
        assert!(!item.uploaded);
        assert_eq!(std::fs::read(&item.local_path).unwrap(), b"GIFDATA");
        assert!(!store.contains("runs/chart.gif"));
    }

    #[tokio::test]
    async fn upload_is_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("chart.svg", b"GIFDATA".to_vec());
        let c = candidate("chart.svg");

        let result = task(store.clone(), dir.path(), true).execute(c).await;

        assert!(result.outcome.expect("success").uploaded);
        assert_eq!(store.get("chart.gif").as_deref(), Some(&b"GIFDATA"[..]));
    }

    #[tokio::test]
    async fn decode_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("bad.svg", b"bad bytes".to_vec());
        let c = candidate("bad.svg");

        let result = task(store, dir.path(), false).execute(c).await;

        let err = result.error().expect("failure").clone();
        assert!(matches!(err, ItemError::Decode { .. }), "got: {err:?}");
        assert!(!dir.path().join("bad.gif").exists());
        assert!(!dir.path().join("bad.gif.tmp").exists());
    }

    #[tokio::test]
    async fn download_failure_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("gone.svg", b"x".to_vec());
        store.fail_downloads_for("gone.svg");
        let c = candidate("gone.svg");

        let result = task(store, dir.path(), false).execute(c).await;
        assert_eq!(result.error().map(ItemError::stage), Some("download"));
    }
}
