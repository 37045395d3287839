//! Whole-file input and atomic output.
//!
//! The engine reads its input completely before analysis starts and writes its output in one
//! step after the pipeline succeeded. Output goes to a [`tempfile::NamedTempFile`] in the
//! destination directory first and is then persisted over the target, so readers never observe
//! a partially written file and a failed run leaves any existing output untouched.

use std::{io::Write, path::Path};

use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Reads the whole file at `path` as UTF-8 text.
///
/// # Errors
///
/// [`crate::Error::FileError`] if the file cannot be read or is not valid UTF-8.
pub fn read_source(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// Atomically replaces the file at `path` with `contents`.
///
/// # Errors
///
/// [`crate::Error::FileError`] if the temporary file cannot be created, written, or moved
/// into place.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(directory)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::FileError(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read() {
        let temp_dir = tempdir().unwrap();
        let target = temp_dir.path().join("out.spvasm");

        write_atomic(&target, "OpCapability Shader\n").unwrap();
        assert_eq!(read_source(&target).unwrap(), "OpCapability Shader\n");

        write_atomic(&target, "OpNop\n").unwrap();
        assert_eq!(read_source(&target).unwrap(), "OpNop\n");
        assert_eq!(
            std::fs::read_dir(temp_dir.path()).unwrap().count(),
            1,
            "no temporary files left behind"
        );
    }

    #[test]
    fn missing_input_is_file_error() {
        let temp_dir = tempdir().unwrap();
        let result = read_source(&temp_dir.path().join("missing.spvasm"));
        assert!(matches!(result, Err(Error::FileError(_))));
    }

    #[test]
    fn missing_directory_is_file_error() {
        let temp_dir = tempdir().unwrap();
        let target = temp_dir.path().join("no").join("such").join("out.spvasm");
        assert!(matches!(
            write_atomic(&target, "OpNop\n"),
            Err(Error::FileError(_))
        ));
        assert!(!target.exists());
    }
}
