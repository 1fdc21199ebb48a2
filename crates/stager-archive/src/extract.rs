use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use stager_fs::AtomicWriteOptions;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::sanitize::sanitize_entry_path;

/// Summary of one extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Entries written (files and directories).
    pub entry_count: usize,
    /// Entries skipped by an exclude prefix.
    pub skipped:     usize,
    /// Bytes written across all file entries.
    pub total_bytes: u64,
}

/// Upper bound on the buffer reserved from an entry's declared size. The
/// header is untrusted; larger entries still grow the buffer as they read.
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

fn preallocation(declared: u64) -> usize { declared.min(MAX_PREALLOCATION) as usize }

/// Extraction seam used by the installer for archive-kind artifacts.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<ExtractReport>;
}

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// Entry name prefixes that are never extracted.
    pub exclude_prefixes: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            exclude_prefixes: vec!["META-INF/".to_string()],
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self { Self::default() }

    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.exclude_prefixes.push(prefix.into());
        self
    }

    pub fn clear_excludes(mut self) -> Self {
        self.exclude_prefixes.clear();
        self
    }

    fn is_excluded(&self, entry: &str) -> bool {
        self.exclude_prefixes.iter().any(|prefix| entry.starts_with(prefix.as_str()))
    }
}

/// Zip extractor. Existing files at an entry's destination are replaced
/// atomically.
#[derive(Clone, Debug, Default)]
pub struct ZipExtractor {
    options: ExtractOptions,
}

impl ZipExtractor {
    pub fn new(options: ExtractOptions) -> Self { Self { options } }
}

impl Extractor for ZipExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<ExtractReport> {
        let corrupted = |message: String| Error::Corrupted {
            archive: archive.to_path_buf(),
            message,
        };

        let file = File::open(archive).map_err(|e| Error::Read {
            path:   archive.to_path_buf(),
            source: e,
        })?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| corrupted(e.to_string()))?;

        let mut report = ExtractReport::default();
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(|e| corrupted(e.to_string()))?;
            let name = entry.name().to_string();

            if self.options.is_excluded(&name) {
                trace!(entry = %name, "excluded");
                report.skipped += 1;
                continue;
            }

            let target = sanitize_entry_path(&name, destination)?;

            if entry.is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| stager_fs::Error::CreateDir {
                    path:   target.clone(),
                    source: e,
                })?;
            } else {
                let mut content = Vec::with_capacity(preallocation(entry.size()));
                entry
                    .read_to_end(&mut content)
                    .map_err(|e| corrupted(format!("entry '{name}': {e}")))?;
                stager_fs::atomic_write(&target, &content, AtomicWriteOptions::default())?;
                report.total_bytes += content.len() as u64;
            }
            report.entry_count += 1;
        }

        debug!(
            archive = %archive.display(),
            destination = %destination.display(),
            entries = report.entry_count,
            skipped = report.skipped,
            bytes = report.total_bytes,
            "archive extracted"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn declared_entry_size_does_not_drive_allocation() {
        assert_eq!(preallocation(0), 0);
        assert_eq!(preallocation(4096), 4096);
        assert_eq!(preallocation(u64::MAX), MAX_PREALLOCATION as usize);
        assert_eq!(preallocation(u32::MAX as u64), MAX_PREALLOCATION as usize);
    }

    fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            match content {
                Some(bytes) => {
                    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                    writer.write_all(bytes).unwrap();
                }
                None => writer.add_directory(*name, SimpleFileOptions::default()).unwrap(),
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_files_and_skips_meta_inf() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("natives.jar");
        write_zip(&archive, &[
            ("META-INF/MANIFEST.MF", Some(b"Manifest-Version: 1.0")),
            ("linux/", None),
            ("linux/liblwjgl.so", Some(b"\x7fELF")),
            ("readme.txt", Some(b"hi")),
        ]);
        let dest = dir.path().join("natives");

        let report = ZipExtractor::default().extract(&archive, &dest).unwrap();

        assert_eq!(report, ExtractReport { entry_count: 3, skipped: 1, total_bytes: 6 });
        assert_eq!(std::fs::read(dest.join("linux/liblwjgl.so")).unwrap(), b"\x7fELF");
        assert!(!dest.join("META-INF").exists());
    }

    #[test]
    fn existing_files_are_replaced() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        write_zip(&archive, &[("lib.so", Some(b"new"))]);
        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("lib.so"), b"old contents").unwrap();

        ZipExtractor::default().extract(&archive, &dest).unwrap();

        assert_eq!(std::fs::read(dest.join("lib.so")).unwrap(), b"new");
    }

    #[test]
    fn escaping_entry_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../evil.so", Some(b"x"))]);
        let dest = dir.path().join("out");

        let err = ZipExtractor::default().extract(&archive, &dest).unwrap_err();

        assert!(matches!(err, Error::ZipSlip { .. }));
        assert!(!dir.path().join("evil.so").exists());
    }

    #[test]
    fn garbage_is_reported_as_corrupted() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = ZipExtractor::default().extract(&archive, dir.path()).unwrap_err();

        assert!(matches!(err, Error::Corrupted { .. }));
    }

    #[test]
    fn custom_excludes() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        write_zip(&archive, &[("META-INF/x", Some(b"1")), ("docs/y", Some(b"2"))]);
        let options = ExtractOptions::new().clear_excludes().exclude("docs/");

        let report = ZipExtractor::new(options).extract(&archive, &dir.path().join("out")).unwrap();

        assert_eq!(report.entry_count, 1);
        assert!(dir.path().join("out/META-INF/x").exists());
    }
}
