use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::IoError;

/// Read a file and convert to UTF-8 if needed.
///
/// Metadata and ledger exports come out of Windows tools, so invalid UTF-8 is
/// decoded as Windows-1252 instead of failing.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => IoError::MissingFile { path: path.to_path_buf() },
        _ => IoError::read(path, e),
    })?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Write `content` to `path`, creating parent directories. Replaces any
/// existing file.
pub fn write_text(path: &Path, content: &str) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| IoError::write(parent, e))?;
    }
    fs::write(path, content).map_err(|e| IoError::write(path, e))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Delete an output left by an earlier run. A file that is already gone is
/// not an error.
pub fn remove_stale(path: &Path) -> Result<(), IoError> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::info!("removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IoError::write(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.txt");
        fs::write(&path, "Año\t1,5\t12\n").unwrap();
        assert_eq!(read_file_as_utf8(&path).unwrap(), "Año\t1,5\t12\n");
    }

    #[test]
    fn windows_1252_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.txt");
        // "Año" in cp1252: 0xF1 is ñ
        fs::write(&path, [b'A', 0xF1, b'o']).unwrap();
        assert_eq!(read_file_as_utf8(&path).unwrap(), "Año");
    }

    #[test]
    fn missing_file_is_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file_as_utf8(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.is_missing_file());
    }

    #[test]
    fn write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.txt");
        write_text(&path, "x").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x");
    }

    #[test]
    fn remove_stale_tolerates_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_merge_2025-05-30.csv");
        remove_stale(&path).unwrap();
        write_text(&path, "x").unwrap();
        remove_stale(&path).unwrap();
        assert!(!path.exists());
    }
}
