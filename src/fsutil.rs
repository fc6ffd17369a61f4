//! Synchronous filesystem pass-throughs for transfer workers and callers.
//!
//! Stateless helpers: whole-file and ranged reads, deletion, local-location
//! validation, and the SHA-256 digest used by hash-based uploads. Nothing
//! here touches coordinator state.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::location::{FullLocalLocationInfo, PartialLocalLocation};

/// Largest file accepted for validation (4000 MiB).
pub const MAX_FILE_SIZE: i64 = 4000 << 20;

const BUF_SIZE: usize = 64 * 1024;

pub fn read_whole_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read {}", path.display()))
}

/// Read `count` bytes starting at `offset`. A file shorter than the range
/// yields a short read, not an error.
pub fn read_file_range(path: &Path, offset: i64, count: i64) -> Result<Vec<u8>> {
    if offset < 0 || count < 0 {
        bail!("negative range for {}", path.display());
    }
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    f.seek(SeekFrom::Start(offset as u64))
        .with_context(|| format!("seek {} in {}", offset, path.display()))?;
    let mut buf = Vec::new();
    f.take(count as u64)
        .read_to_end(&mut buf)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(buf)
}

/// Delete a file. A missing file is not an error, matching best-effort
/// worker cleanup.
pub fn delete_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("delete {}", path.display())),
    }
}

/// Validate a caller-supplied full local location before an upload. Returns
/// the info with the size filled in from disk when the caller passed 0.
pub fn validate_full_local(
    mut info: FullLocalLocationInfo,
    skip_file_size_checks: bool,
) -> Result<FullLocalLocationInfo> {
    let path = &info.location.path;
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a regular file", path.display());
    }
    let on_disk = meta.len() as i64;
    if info.size == 0 {
        info.size = on_disk;
    }
    if skip_file_size_checks {
        return Ok(info);
    }
    if on_disk == 0 {
        bail!("{} is empty", path.display());
    }
    if on_disk > MAX_FILE_SIZE {
        bail!("{} is too big: {} bytes", path.display(), on_disk);
    }
    if info.size != on_disk {
        bail!(
            "file size mismatch for {}: expected {}, found {}",
            path.display(),
            info.size,
            on_disk
        );
    }
    Ok(info)
}

/// Validate a partial local location: the file must exist and contain at
/// least the claimed ready prefix.
pub fn validate_partial_local(partial: &PartialLocalLocation) -> Result<()> {
    let path = &partial.path;
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a regular file", path.display());
    }
    if partial.ready_bytes < 0 {
        bail!("negative ready size for {}", path.display());
    }
    if (meta.len() as i64) < partial.ready_bytes {
        bail!(
            "{} is shorter than its ready prefix: {} < {}",
            path.display(),
            meta.len(),
            partial.ready_bytes
        );
    }
    Ok(())
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FileType, FullLocalLocation};
    use std::io::Write;

    fn temp_file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_file_range_middle_and_past_end() {
        let f = temp_file_with(b"0123456789");
        assert_eq!(read_file_range(f.path(), 2, 3).unwrap(), b"234");
        // Short read past end of file.
        assert_eq!(read_file_range(f.path(), 8, 10).unwrap(), b"89");
        assert!(read_file_range(f.path(), -1, 2).is_err());
    }

    #[test]
    fn delete_file_tolerates_missing() {
        let f = temp_file_with(b"x");
        let path = f.path().to_path_buf();
        drop(f);
        assert!(delete_file(&path).is_ok());

        let f = temp_file_with(b"x");
        let path = f.into_temp_path().keep().unwrap();
        assert!(delete_file(&path).is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn validate_full_local_fills_and_checks_size() {
        let f = temp_file_with(b"hello");
        let info = FullLocalLocationInfo {
            location: FullLocalLocation {
                file_type: FileType::Document,
                path: f.path().to_path_buf(),
            },
            size: 0,
        };
        let validated = validate_full_local(info.clone(), false).unwrap();
        assert_eq!(validated.size, 5);

        let wrong = FullLocalLocationInfo { size: 7, ..info };
        assert!(validate_full_local(wrong.clone(), false).is_err());
        // skip_file_size_checks accepts the mismatch.
        assert!(validate_full_local(wrong, true).is_ok());
    }

    #[test]
    fn validate_full_local_rejects_empty() {
        let f = temp_file_with(b"");
        let info = FullLocalLocationInfo {
            location: FullLocalLocation {
                file_type: FileType::Document,
                path: f.path().to_path_buf(),
            },
            size: 0,
        };
        assert!(validate_full_local(info, false).is_err());
    }

    #[test]
    fn validate_partial_local_checks_ready_prefix() {
        let f = temp_file_with(b"0123456789");
        let ok = PartialLocalLocation {
            path: f.path().to_path_buf(),
            ready_bytes: 10,
        };
        assert!(validate_partial_local(&ok).is_ok());

        let too_long = PartialLocalLocation {
            path: f.path().to_path_buf(),
            ready_bytes: 11,
        };
        assert!(validate_partial_local(&too_long).is_err());
    }

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_path_known_content() {
        let f = temp_file_with(b"hello\n");
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }
}
