use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{decode_utf8, BlobLocator, BlobSource, FetchError};

/// Serves blobs from a local directory: `<root>/<bucket>/<key>`.
pub struct FolderBlobSource {
    pub root: PathBuf,
}

impl FolderBlobSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, locator: &BlobLocator) -> Result<PathBuf, FetchError> {
        let relative = Path::new(&locator.bucket).join(&locator.key);
        // Locators must stay inside the root.
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FetchError::InvalidLocator(locator.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobSource for FolderBlobSource {
    async fn fetch(&self, locator: &BlobLocator) -> Result<String, FetchError> {
        let path = self.resolve(locator)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::NotFound(locator.to_string()),
            ErrorKind::PermissionDenied => FetchError::AccessDenied(locator.to_string()),
            _ => FetchError::Transient(format!("failed to read {}: {e}", path.display())),
        })?;

        decode_utf8(locator, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_folder() -> (TempDir, FolderBlobSource) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("bucket/2024")).unwrap();
        fs::write(
            temp_dir.path().join("bucket/2024/events.json"),
            r#"{"request_id":"r1"}{"request_id":"r2"}"#,
        )
        .unwrap();
        fs::write(temp_dir.path().join("bucket/binary.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let source = FolderBlobSource::new(temp_dir.path());
        (temp_dir, source)
    }

    #[tokio::test]
    async fn test_fetch_existing_blob() {
        let (_temp_dir, source) = setup_test_folder();
        let blob = source
            .fetch(&BlobLocator::new("bucket", "2024/events.json"))
            .await
            .unwrap();
        assert_eq!(blob, r#"{"request_id":"r1"}{"request_id":"r2"}"#);
    }

    #[tokio::test]
    async fn test_fetch_missing_blob() {
        let (_temp_dir, source) = setup_test_folder();
        let result = source.fetch(&BlobLocator::new("bucket", "nope.json")).await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_paths_outside_root() {
        let (_temp_dir, source) = setup_test_folder();
        let result = source
            .fetch(&BlobLocator::new("bucket", "../../etc/passwd"))
            .await;
        assert!(matches!(result, Err(FetchError::InvalidLocator(_))));
    }

    #[tokio::test]
    async fn test_fetch_non_utf8_blob() {
        let (_temp_dir, source) = setup_test_folder();
        let result = source.fetch(&BlobLocator::new("bucket", "binary.bin")).await;
        assert!(matches!(result, Err(FetchError::InvalidEncoding { .. })));
    }
}
