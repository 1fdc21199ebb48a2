use std::future::Future;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use stager_verify::{AnyHasher, Hasher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::data::FetchOptions;
use crate::effects::http::HttpClient;
use crate::error::{FetchError, Result};

/// The download primitive consumed by the installer.
///
/// A call either leaves the complete, verified body at `destination` or
/// returns an error and leaves nothing there.
pub trait Fetch: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> impl Future<Output = Result<u64>> + Send;
}

impl<T: Fetch> Fetch for &T {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> impl Future<Output = Result<u64>> + Send {
        (**self).fetch(url, destination, options)
    }
}

/// Fetcher for `http(s)://` locations through an [`HttpClient`], and for
/// `file://` locations straight from disk.
pub struct HttpFetcher<C: HttpClient> {
    client: C,
}

impl<C: HttpClient> HttpFetcher<C> {
    pub fn new(client: C) -> Self { Self { client } }

    async fn download(&self, url: &str, shown: &str, part: &Path, options: &FetchOptions) -> Result<u64> {
        let network = |message: String| FetchError::Network {
            url:     shown.to_string(),
            message: message.replace(url, shown),
        };

        let mut stream = self
            .client
            .stream(url, &options.headers)
            .await
            .map_err(|e| network(e.to_string()))?;

        let mut sink = PartFile::create(part, options).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| network(e.to_string()))?;
            sink.write(&chunk, shown).await?;
        }
        sink.finish(shown).await
    }

    async fn copy_local(&self, source: &Path, shown: &str, part: &Path, options: &FetchOptions) -> Result<u64> {
        let mut file = tokio::fs::File::open(source).await.map_err(|e| FetchError::Io {
            path:   source.to_path_buf(),
            source: e,
        })?;

        let mut sink = PartFile::create(part, options).await?;
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buffer).await.map_err(|e| FetchError::Io {
                path:   source.to_path_buf(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            sink.write(&buffer[..n], shown).await?;
        }
        sink.finish(shown).await
    }
}

impl<C: HttpClient> Fetch for HttpFetcher<C> {
    async fn fetch(&self, url: &str, destination: &Path, options: &FetchOptions) -> Result<u64> {
        let shown = display_url(url);
        let part = part_path(destination);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| FetchError::Io {
                path:   parent.to_path_buf(),
                source: e,
            })?;
        }

        let result = if let Some(local) = url.strip_prefix("file://") {
            self.copy_local(Path::new(local), &shown, &part, options).await
        } else if url.starts_with("http://") || url.starts_with("https://") {
            self.download(url, &shown, &part, options).await
        } else {
            return Err(FetchError::UnsupportedScheme(shown));
        };

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, destination).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(FetchError::Io {
                path:   destination.to_path_buf(),
                source: e,
            });
        }

        debug!(destination = %destination.display(), bytes = written, "fetch complete");
        Ok(written)
    }
}

/// Partially written body that hashes and counts bytes as they arrive.
struct PartFile<'a> {
    file:    tokio::fs::File,
    path:    &'a Path,
    options: &'a FetchOptions,
    hasher:  Option<AnyHasher>,
    written: u64,
}

impl<'a> PartFile<'a> {
    async fn create(path: &'a Path, options: &'a FetchOptions) -> Result<Self> {
        let file = tokio::fs::File::create(path).await.map_err(|e| FetchError::Io {
            path:   path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            file,
            path,
            options,
            hasher: options
                .expected_checksum
                .as_ref()
                .map(|checksum| AnyHasher::new(checksum.algorithm())),
            written: 0,
        })
    }

    async fn write(&mut self, chunk: &[u8], shown: &str) -> Result<()> {
        self.written += chunk.len() as u64;
        if let Some(expected) = self.options.expected_size {
            if self.written > expected {
                return Err(FetchError::SizeMismatch {
                    url: shown.to_string(),
                    expected,
                    actual: self.written,
                });
            }
        }
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }
        self.file.write_all(chunk).await.map_err(|e| FetchError::Io {
            path:   self.path.to_path_buf(),
            source: e,
        })
    }

    async fn finish(mut self, shown: &str) -> Result<u64> {
        self.file.flush().await.map_err(|e| FetchError::Io {
            path:   self.path.to_path_buf(),
            source: e,
        })?;

        if let Some(expected) = self.options.expected_size {
            if self.written != expected {
                return Err(FetchError::SizeMismatch {
                    url: shown.to_string(),
                    expected,
                    actual: self.written,
                });
            }
        }

        if let (Some(expected), Some(hasher)) = (&self.options.expected_checksum, self.hasher) {
            let actual = hex::encode(hasher.finalize());
            if !expected.matches_hex(&actual) {
                return Err(FetchError::ChecksumMismatch {
                    url: shown.to_string(),
                    expected: expected.to_string(),
                    actual: format!("{}:{actual}", expected.algorithm()),
                });
            }
        }

        Ok(self.written)
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

/// Render a source location for logs and errors: credentials, query strings
/// and fragments are dropped.
pub fn display_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    match without_query.split_once("://") {
        Some((scheme, rest)) => {
            let (authority, path) = match rest.split_once('/') {
                Some((authority, path)) => (authority, Some(path)),
                None => (rest, None),
            };
            let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
            match path {
                Some(path) => format!("{scheme}://{host}/{path}"),
                None => format!("{scheme}://{host}"),
            }
        }
        None => without_query.to_string(),
    }
}
