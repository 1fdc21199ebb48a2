//! I/O operations for fetching.

mod fetcher;
mod http;

pub use fetcher::{Fetch, HttpFetcher, display_url};
pub use http::{BoxStream, HttpClient};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
