//! Immutable data types for fetching.

mod options;

pub use options::FetchOptions;
