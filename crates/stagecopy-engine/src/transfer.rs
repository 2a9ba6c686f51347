//! Local filesystem transfer

use async_trait::async_trait;
use stagecopy_types::{Error, FileTransfer, Result};
use std::path::Path;

/// Copies files with `tokio::fs`, overwriting existing destinations
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransfer;

#[async_trait]
impl FileTransfer for LocalTransfer {
    async fn ensure_directory(&self, dir: &Path) -> Result<bool> {
        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::from_io_at(parent, &e))?;
        }
        // Only the caller whose create_dir succeeds reports the creation.
        match tokio::fs::create_dir(dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::from_io_at(dir, &e)),
        }
    }

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64> {
        tokio::fs::metadata(source)
            .await
            .map_err(|e| Error::from_io_at(source, &e))?;
        tokio::fs::copy(source, destination).await.map_err(|e| {
            Error::transfer(
                destination,
                format!("failed copying from {}: {}", source.display(), e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_creates_missing_directory_once() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Branches").join("2024-06");

        assert!(LocalTransfer.ensure_directory(&dir).await.unwrap());
        assert!(dir.is_dir());
        assert!(!LocalTransfer.ensure_directory(&dir).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_create_directory_once() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Arc::new(temp_dir.path().join("out").join("a").join("b"));

        let mut callers = JoinSet::new();
        for _ in 0..16 {
            let dir = Arc::clone(&dir);
            callers.spawn(async move { LocalTransfer.ensure_directory(&dir).await });
        }

        let mut created = 0;
        while let Some(joined) = callers.join_next().await {
            if joined.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_copy_overwrites_destination() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("statement.pdf");
        let destination = temp_dir.path().join("copy.pdf");
        std::fs::write(&source, b"new contents").unwrap();
        std::fs::write(&destination, b"stale contents that are longer").unwrap();

        let bytes = LocalTransfer.copy_file(&source, &destination).await.unwrap();
        assert_eq!(bytes, 12);
        assert_eq!(std::fs::read(&destination).unwrap(), b"new contents");

        // A second copy still leaves a single identical file
        LocalTransfer.copy_file(&source, &destination).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"new contents");
    }

    #[tokio::test]
    async fn test_missing_source_maps_to_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("missing.pdf");

        let err = LocalTransfer
            .copy_file(&source, &temp_dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::FileNotFound { path: source });
    }

    #[tokio::test]
    async fn test_missing_destination_directory_names_destination() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.pdf");
        std::fs::write(&source, b"statement").unwrap();
        let destination = temp_dir.path().join("missing-dir").join("out.pdf");

        let err = LocalTransfer
            .copy_file(&source, &destination)
            .await
            .unwrap_err();
        match err {
            Error::Transfer { path, message } => {
                assert_eq!(path, destination);
                assert!(message.contains(&source.display().to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
