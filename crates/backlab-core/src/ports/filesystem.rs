//! LocalFilesystem port - ローカルのバックアップディレクトリ
//!
//! inventory / orchestrator が必要とする操作は 3 つだけ:
//! 一覧、削除、読み込み。
//!
//! 読み込みはストリームで返す。バックアップは数十 GB になりうるので、
//! 全体をメモリに載せずにそのまま object store へ流す。

use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncRead;

use crate::domain::StorageError;

/// Readable artifact content, streamed from the filesystem into the object store.
pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

/// One directory entry as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

#[async_trait]
pub trait LocalFilesystem: Send + Sync {
    /// Entries directly under `path`, in no particular order.
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError>;

    async fn remove_file(&self, path: &Path) -> Result<(), StorageError>;

    async fn open_for_read(&self, path: &Path) -> Result<ContentReader, StorageError>;
}
