//! Download primitive with streaming verification and atomic placement.
//!
//! # Architecture
//!
//! This crate follows the two-layer pattern:
//! - [`data`] - Immutable options derived from a lockfile entry
//! - [`effects`] - I/O operations behind the [`Fetch`] and [`HttpClient`] traits
//!
//! # Key Features
//!
//! - **Single-Pass**: bytes are hashed while they stream to disk
//! - **Atomic Placement**: bodies land in a `.part` sibling and are renamed only once verified
//! - **Mechanism-Only**: one attempt per call; retry policy belongs to the caller

pub mod data;
pub mod effects;
mod error;

pub use data::FetchOptions;
pub use effects::{BoxStream, Fetch, HttpClient, HttpFetcher, display_url};
pub use error::{FetchError, Result};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;
