use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::ensure_dir;
use crate::error::OutputError;

/// Pushes a local file to a remote location.
pub trait Uploader {
    fn upload(
        &self,
        file_name: &str,
        local_dir: &Path,
        remote_dir: &Path,
    ) -> Result<PathBuf, OutputError>;
}

/// Copies into a directory, typically a mounted share.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryUploader;

impl Uploader for DirectoryUploader {
    fn upload(
        &self,
        file_name: &str,
        local_dir: &Path,
        remote_dir: &Path,
    ) -> Result<PathBuf, OutputError> {
        let local = local_dir.join(file_name);
        if !local.is_file() {
            return Err(OutputError::MissingLocalFile { path: local });
        }

        ensure_dir(remote_dir)?;
        let remote = remote_dir.join(file_name);
        fs::copy(&local, &remote).map_err(|source| OutputError::Io {
            path: remote.clone(),
            source,
        })?;
        info!(local = %local.display(), remote = %remote.display(), "uploaded file");
        Ok(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_into_remote_dir() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        fs::write(local.path().join("0572.010.msg"), "$ payload").unwrap();

        let target = remote.path().join("incoming");
        let uploaded = DirectoryUploader
            .upload("0572.010.msg", local.path(), &target)
            .unwrap();
        assert_eq!(uploaded, target.join("0572.010.msg"));
        assert_eq!(fs::read_to_string(uploaded).unwrap(), "$ payload");
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let local = tempfile::tempdir().unwrap();
        let err = DirectoryUploader
            .upload("0572.011.msg", local.path(), local.path())
            .unwrap_err();
        assert!(matches!(err, OutputError::MissingLocalFile { .. }));
    }
}
