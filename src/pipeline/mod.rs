//! Pipeline stages for container-wide SVG-to-GIF conversion.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! cursor ──▶ filter ──▶ pool ──▶ task ──▶ converter ──▶ (local file, optional upload)
//! (pages)    (select)   (K permits) (1 item) (render → resize → encode)
//! ```
//!
//! 1. [`cursor`]    — list the container page by page, following tokens
//! 2. [`filter`]    — keep real `.svg` objects above the size threshold
//! 3. [`pool`]      — run one task per candidate, at most K at once, and
//!    wait for the whole page
//! 4. [`task`]      — download, convert, write and optionally upload one item
//! 5. [`converter`] — the CPU-bound part, built from:
//!    * [`render`] — rasterise with resvg at high density, trim, re-page
//!    * [`resize`] — cap the width
//!    * [`encode`] — GIF encode

pub mod converter;
pub mod cursor;
pub mod encode;
pub mod filter;
pub mod pool;
pub mod render;
pub mod resize;
pub mod task;
