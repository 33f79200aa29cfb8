//! File assertions for path-typed fields.
//!
//! The store only checks that referenced files exist and carry an expected
//! extension; it never looks inside them.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// Placeholder some documents use for "no file".
pub const NONE_PLACEHOLDER: &str = "None";

/// Checks a path supplied for a schema field.
pub trait FileAssertion {
    /// `extensions` empty means any extension is accepted.
    fn assert_file(&self, field: &str, path: &str, extensions: &[&str]) -> ConfigResult<()>;

    fn assert_directory(&self, field: &str, path: &str) -> ConfigResult<()>;
}

/// Returns true when a path value means "not set".
pub fn is_unset(path: &str) -> bool {
    path.is_empty() || path == NONE_PLACEHOLDER
}

/// Checks paths against the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileAssertion;

impl FileAssertion for FsFileAssertion {
    fn assert_file(&self, field: &str, path: &str, extensions: &[&str]) -> ConfigResult<()> {
        if is_unset(path) {
            return Ok(());
        }
        if !extensions.is_empty() && !extensions.iter().any(|ext| path.ends_with(ext)) {
            return Err(ConfigError::FileAssertion {
                field: field.to_string(),
                path: path.to_string(),
                reason: format!("expected one of the extensions {}", extensions.join(", ")),
            });
        }
        if !Path::new(path).is_file() {
            return Err(ConfigError::FileAssertion {
                field: field.to_string(),
                path: path.to_string(),
                reason: "file does not exist".to_string(),
            });
        }
        Ok(())
    }

    fn assert_directory(&self, field: &str, path: &str) -> ConfigResult<()> {
        if is_unset(path) || Path::new(path).is_dir() {
            return Ok(());
        }
        Err(ConfigError::FileAssertion {
            field: field.to_string(),
            path: path.to_string(),
            reason: "directory does not exist".to_string(),
        })
    }
}

/// Accepts every path. Used when the referenced files live elsewhere,
/// e.g. when preparing a configuration for another machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipFileAssertion;

impl FileAssertion for SkipFileAssertion {
    fn assert_file(&self, _field: &str, _path: &str, _extensions: &[&str]) -> ConfigResult<()> {
        Ok(())
    }

    fn assert_directory(&self, _field: &str, _path: &str) -> ConfigResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_existing_file_with_extension() {
        let dir = TempDir::new().unwrap();
        let fasta = dir.path().join("genome.fa.gz");
        fs::write(&fasta, b">chr1\nACGT\n").unwrap();

        let check = FsFileAssertion;
        assert!(check
            .assert_file("sequence", fasta.to_str().unwrap(), &[".fa", ".fa.gz"])
            .is_ok());
    }

    #[test]
    fn test_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let gff = dir.path().join("genes.gff");
        fs::write(&gff, b"").unwrap();

        let err = FsFileAssertion
            .assert_file("annotation", gff.to_str().unwrap(), &[".gtf", ".gtf.gz"])
            .unwrap_err();
        assert!(err.to_string().contains(".gtf"));
    }

    #[test]
    fn test_missing_file() {
        let err = FsFileAssertion
            .assert_file("barcodes", "/nonexistent/barcodes.csv", &[])
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_placeholder_is_skipped() {
        assert!(FsFileAssertion.assert_file("barcodes", "None", &[]).is_ok());
        assert!(FsFileAssertion.assert_file("annotation", "", &[".gtf"]).is_ok());
        assert!(FsFileAssertion.assert_directory("STAR_index_dir", "").is_ok());
    }

    #[test]
    fn test_directory() {
        let dir = TempDir::new().unwrap();
        assert!(FsFileAssertion
            .assert_directory("STAR_index_dir", dir.path().to_str().unwrap())
            .is_ok());
        assert!(FsFileAssertion
            .assert_directory("STAR_index_dir", "/nonexistent/star")
            .is_err());
    }
}
