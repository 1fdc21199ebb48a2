use std::fmt;
use std::sync::Arc;

use stager_verify::Checksum;

/// Expectations for one fetch.
///
/// Only lockfile-derived values belong here; nothing reported by the remote
/// side is ever used to decide whether the bytes are correct.
///
/// # Examples
///
/// ```
/// use stager_fetch::FetchOptions;
///
/// let options = FetchOptions::default()
///     .expected_size(Some(1024))
///     .header("User-Agent", "stager");
/// ```
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Declared byte length; a body of any other length is rejected.
    pub expected_size: Option<u64>,

    /// Declared checksum; the body is hashed while streaming and rejected on mismatch.
    pub expected_checksum: Option<Checksum>,

    /// Extra request headers. Never logged.
    pub headers: Arc<[(String, String)]>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("expected_size", &self.expected_size)
            .field("expected_checksum", &self.expected_checksum)
            .field("headers", &format_args!("[{} redacted]", self.headers.len()))
            .finish()
    }
}

impl FetchOptions {
    pub fn expected_size(mut self, size: Option<u64>) -> Self {
        self.expected_size = size;
        self
    }

    pub fn expected_checksum(mut self, checksum: Option<Checksum>) -> Self {
        self.expected_checksum = checksum;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.headers.to_vec();
        headers.push((key.into(), value.into()));
        self.headers = headers.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_headers() {
        let options = FetchOptions::default().header("Authorization", "Bearer secret-token");
        let rendered = format!("{options:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("1 redacted"));
    }
}
