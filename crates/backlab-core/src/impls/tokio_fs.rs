//! TokioFilesystem - tokio::fs による LocalFilesystem 実装

use async_trait::async_trait;
use std::path::Path;

use crate::domain::StorageError;
use crate::ports::{ContentReader, DirEntry, LocalFilesystem};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFilesystem;

#[async_trait]
impl LocalFilesystem for TokioFilesystem {
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let mut read_dir = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            // symlinks are not followed, a link to a directory counts as a file
            let file_type = entry.file_type().await?;
            match entry.file_name().into_string() {
                Ok(name) => entries.push(DirEntry {
                    name,
                    is_dir: file_type.is_dir(),
                }),
                Err(raw) => {
                    tracing::debug!(name = ?raw, "skipping non utf-8 entry");
                }
            }
        }
        Ok(entries)
    }

    async fn remove_file(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    async fn open_for_read(&self, path: &Path) -> Result<ContentReader, StorageError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn lists_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1000000000-a.tar"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("logs")).unwrap();

        let mut entries = TokioFilesystem.list_directory(dir.path()).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            entries,
            vec![DirEntry::file("1000000000-a.tar"), DirEntry::dir("logs")]
        );
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokioFilesystem
            .list_directory(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[tokio::test]
    async fn read_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1000000000-a.tar");
        std::fs::write(&path, b"payload").unwrap();

        let mut reader = TokioFilesystem.open_for_read(&path).await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        drop(reader);
        assert_eq!(content, b"payload");

        TokioFilesystem.remove_file(&path).await.unwrap();
        assert!(!path.exists());
        assert!(TokioFilesystem.remove_file(&path).await.is_err());
    }

    #[tokio::test]
    async fn opening_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokioFilesystem
            .open_for_read(&dir.path().join("1000000000-gone.tar"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
