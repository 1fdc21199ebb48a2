//! Archive extraction with path sanitization.
//!
//! # Architecture
//!
//! - `sanitize.rs` - Entry path sanitization (zip-slip prevention)
//! - `extract.rs` - The [`Extractor`] seam and the zip implementation
//!
//! Extraction only ever runs on archives that already passed checksum
//! verification; this crate does not hash anything itself.

pub use error::{Error, Result};
pub use extract::{ExtractOptions, ExtractReport, Extractor, ZipExtractor};
pub use sanitize::sanitize_entry_path;

mod error;
mod extract;
mod sanitize;
