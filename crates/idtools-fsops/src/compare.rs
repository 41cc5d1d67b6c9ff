//! Content comparison used to decide whether a copy is a no-op.
//!
//! # Design
//! - Checks run in ascending cost: size, first byte, last byte, full SHA-256 digest.
//! - Only the digest pass can prove equality; every earlier pass can only reject.
//! - A missing destination is an expected state, any other IO failure is fatal.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};

/// Which check decided the outcome of a comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Destination does not exist yet.
    DestinationMissing,
    /// File lengths differ.
    SizeMismatch,
    /// Lengths match but the first bytes differ.
    FirstByteMismatch,
    /// Lengths and first bytes match but the last bytes differ.
    LastByteMismatch,
    /// Edge bytes match but the content digests differ.
    DigestMismatch,
    /// Both files hash to the same digest.
    Identical,
}

impl Comparison {
    /// Stable label used in reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DestinationMissing => "destination_missing",
            Self::SizeMismatch => "size_mismatch",
            Self::FirstByteMismatch => "first_byte_mismatch",
            Self::LastByteMismatch => "last_byte_mismatch",
            Self::DigestMismatch => "digest_mismatch",
            Self::Identical => "identical",
        }
    }

    /// Returns `true` when the files were proven byte-identical.
    #[must_use]
    pub const fn is_identical(self) -> bool {
        matches!(self, Self::Identical)
    }
}

/// Returns `true` iff `destination` exists and is byte-identical to `source`.
///
/// # Errors
///
/// Fails when `source` cannot be inspected or when either file cannot be read.
pub fn is_same_file(source: &Path, destination: &Path) -> FsOpsResult<bool> {
    Ok(compare_files(source, destination)?.is_identical())
}

/// Compare two files, short-circuiting on the cheapest check that rejects equality.
///
/// # Errors
///
/// A missing destination yields [`Comparison::DestinationMissing`]; every other stat,
/// open or read failure on either file is returned as [`FsOpsError::Io`].
pub fn compare_files(source: &Path, destination: &Path) -> FsOpsResult<Comparison> {
    let destination_meta = match fs::metadata(destination) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(verdict(destination, Comparison::DestinationMissing));
        }
        Err(err) => return Err(FsOpsError::io("compare.stat_destination", destination, err)),
    };
    let source_meta = fs::metadata(source)
        .map_err(|source_err| FsOpsError::io("compare.stat_source", source, source_err))?;

    let len = source_meta.len();
    if len != destination_meta.len() {
        return Ok(verdict(destination, Comparison::SizeMismatch));
    }

    let mut source_probe = Probe::open("compare.open_source", source, len)?;
    let mut destination_probe = Probe::open("compare.open_destination", destination, len)?;

    if source_probe.first_byte()? != destination_probe.first_byte()? {
        return Ok(verdict(destination, Comparison::FirstByteMismatch));
    }
    if source_probe.last_byte()? != destination_probe.last_byte()? {
        return Ok(verdict(destination, Comparison::LastByteMismatch));
    }
    if source_probe.digest()? != destination_probe.digest()? {
        return Ok(verdict(destination, Comparison::DigestMismatch));
    }
    Ok(verdict(destination, Comparison::Identical))
}

fn verdict(destination: &Path, comparison: Comparison) -> Comparison {
    debug!(
        destination = %destination.display(),
        comparison = comparison.as_str(),
        "content comparison decided"
    );
    comparison
}

/// Open handle plus the length recorded at stat time.
struct Probe<'a> {
    path: &'a Path,
    file: File,
    len: u64,
}

impl<'a> Probe<'a> {
    fn open(operation: &'static str, path: &'a Path, len: u64) -> FsOpsResult<Self> {
        let file = File::open(path).map_err(|source| FsOpsError::io(operation, path, source))?;
        Ok(Self { path, file, len })
    }

    // Empty files have no edge bytes; both sides report `None` and fall through to the digest.
    fn first_byte(&mut self) -> FsOpsResult<Option<u8>> {
        if self.len == 0 {
            return Ok(None);
        }
        let mut buf = [0_u8; 1];
        self.file
            .read_exact(&mut buf)
            .map_err(|source| FsOpsError::io("compare.read_first_byte", self.path, source))?;
        Ok(Some(buf[0]))
    }

    fn last_byte(&mut self) -> FsOpsResult<Option<u8>> {
        if self.len == 0 {
            return Ok(None);
        }
        let mut buf = [0_u8; 1];
        self.read_exact_at(&mut buf, self.len - 1)
            .map_err(|source| FsOpsError::io("compare.read_last_byte", self.path, source))?;
        Ok(Some(buf[0]))
    }

    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(not(unix))]
    fn read_exact_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.file.seek(io::SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn digest(&mut self) -> FsOpsResult<[u8; 32]> {
        self.file
            .rewind()
            .map_err(|source| FsOpsError::io("compare.rewind", self.path, source))?;
        let mut hasher = Sha256::new();
        io::copy(&mut self.file, &mut hasher)
            .map_err(|source| FsOpsError::io("compare.hash", self.path, source))?;
        Ok(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::path::PathBuf;
    use tempfile::TempDir;

    type TestResult<T> = Result<T>;

    const LARGE_LEN: usize = 3 * 1024 * 1024;

    fn temp_dir() -> TestResult<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix("idtools-compare-")
            .tempdir()?)
    }

    fn write(dir: &TempDir, name: &str, contents: &[u8]) -> TestResult<PathBuf> {
        let path = dir.path().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn large_payload() -> Vec<u8> {
        (0..LARGE_LEN)
            .map(|index| u8::try_from(index % 251).unwrap_or(0))
            .collect()
    }

    #[test]
    fn missing_destination_is_not_an_error() -> TestResult<()> {
        let temp = temp_dir()?;
        let source = write(&temp, "source", b"hello")?;
        let destination = temp.path().join("absent");

        assert_eq!(
            compare_files(&source, &destination)?,
            Comparison::DestinationMissing
        );
        assert!(!is_same_file(&source, &destination)?);
        Ok(())
    }

    #[test]
    fn missing_source_is_fatal() -> TestResult<()> {
        let temp = temp_dir()?;
        let source = temp.path().join("absent");
        let destination = write(&temp, "dest", b"hello")?;

        let err = compare_files(&source, &destination).err();
        assert!(matches!(
            err,
            Some(FsOpsError::Io {
                operation: "compare.stat_source",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn empty_files_fall_through_to_matching_digests() -> TestResult<()> {
        let temp = temp_dir()?;
        let source = write(&temp, "source", b"")?;
        let destination = write(&temp, "dest", b"")?;

        assert_eq!(compare_files(&source, &destination)?, Comparison::Identical);
        Ok(())
    }

    #[test]
    fn single_byte_files_compare_by_value() -> TestResult<()> {
        let temp = temp_dir()?;
        let source = write(&temp, "source", b"a")?;
        let same = write(&temp, "same", b"a")?;
        let different = write(&temp, "different", b"b")?;

        assert!(is_same_file(&source, &same)?);
        assert_eq!(
            compare_files(&source, &different)?,
            Comparison::FirstByteMismatch
        );
        Ok(())
    }

    #[test]
    fn size_mismatch_short_circuits() -> TestResult<()> {
        let temp = temp_dir()?;
        let source = write(&temp, "source", b"hello")?;
        let destination = write(&temp, "dest", b"hello world")?;

        assert_eq!(
            compare_files(&source, &destination)?,
            Comparison::SizeMismatch
        );
        Ok(())
    }

    #[test]
    fn large_files_detect_single_byte_differences() -> TestResult<()> {
        let temp = temp_dir()?;
        let payload = large_payload();
        let source = write(&temp, "source", &payload)?;

        let identical = write(&temp, "identical", &payload)?;
        assert_eq!(compare_files(&source, &identical)?, Comparison::Identical);

        let cases = [
            (0, Comparison::FirstByteMismatch),
            (LARGE_LEN - 1, Comparison::LastByteMismatch),
            (LARGE_LEN / 2, Comparison::DigestMismatch),
        ];
        for (position, expected) in cases {
            let mut altered = payload.clone();
            altered[position] = altered[position].wrapping_add(1);
            let destination = write(&temp, &format!("altered-{position}"), &altered)?;
            assert_eq!(
                compare_files(&source, &destination)?,
                expected,
                "difference at byte {position}"
            );
            assert!(!is_same_file(&source, &destination)?);
        }
        Ok(())
    }

    #[test]
    fn file_is_identical_to_itself() -> TestResult<()> {
        let temp = temp_dir()?;
        let source = write(&temp, "source", b"same path")?;

        assert!(is_same_file(&source, &source)?);
        Ok(())
    }

    #[test]
    fn comparison_labels_are_stable() {
        assert_eq!(Comparison::Identical.as_str(), "identical");
        assert_eq!(
            Comparison::DestinationMissing.as_str(),
            "destination_missing"
        );
        assert!(Comparison::Identical.is_identical());
        assert!(!Comparison::DigestMismatch.is_identical());
    }
}
