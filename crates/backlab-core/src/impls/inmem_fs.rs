//! InMemoryFilesystem - 開発・テスト用の LocalFilesystem
//!
//! # 学習ポイント
//! - 失敗注入（特定パスの削除失敗、一覧失敗）
//! - 呼び出し記録（「スキャンが行われなかった」ことをテストで確認するため）

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::StorageError;
use crate::ports::{ContentReader, DirEntry, LocalFilesystem};

#[derive(Default)]
struct FsState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    fail_remove: HashSet<PathBuf>,
    fail_list: bool,
    list_calls: usize,
    removed: Vec<PathBuf>,
}

/// InMemoryFilesystem はファイルとディレクトリをメモリ上に持つ
///
/// # 使用例
/// ```ignore
/// let fs = InMemoryFilesystem::new();
/// fs.add_file("/backups/1000000000-a.tar", b"a");
/// fs.add_dir("/backups/logs");
/// fs.fail_remove("/backups/1000000000-a.tar");
/// ```
#[derive(Default)]
pub struct InMemoryFilesystem {
    state: Mutex<FsState>,
}

impl InMemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(path.into(), content.to_vec());
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock().unwrap();
        state.dirs.insert(path.into());
    }

    /// Make every later `remove_file(path)` fail.
    pub fn fail_remove(&self, path: impl Into<PathBuf>) {
        let mut state = self.state.lock().unwrap();
        state.fail_remove.insert(path.into());
    }

    /// Undo [`Self::fail_remove`].
    pub fn allow_remove(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.fail_remove.remove(path.as_ref());
    }

    /// Make every later `list_directory` fail.
    pub fn fail_list(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_list = true;
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        let state = self.state.lock().unwrap();
        let path = path.as_ref();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    /// Paths successfully removed, in removal order.
    pub fn removed(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().removed.clone()
    }
}

#[async_trait]
impl LocalFilesystem for InMemoryFilesystem {
    async fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_list {
            return Err(StorageError::Injected(format!(
                "list {} failed",
                path.display()
            )));
        }

        let child_name = |p: &PathBuf| -> Option<String> {
            if p.parent() == Some(path) {
                p.file_name().map(|n| n.to_string_lossy().into_owned())
            } else {
                None
            }
        };

        let files = state.files.keys().filter_map(|p| child_name(p).map(DirEntry::file));
        let dirs = state.dirs.iter().filter_map(|p| child_name(p).map(DirEntry::dir));
        let entries: Vec<DirEntry> = files.chain(dirs).collect();

        if entries.is_empty() && !state.dirs.contains(path) {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        Ok(entries)
    }

    async fn remove_file(&self, path: &Path) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_remove.contains(path) {
            return Err(StorageError::Injected(format!(
                "remove {} failed",
                path.display()
            )));
        }
        match state.files.remove(path) {
            Some(_) => {
                state.removed.push(path.to_path_buf());
                Ok(())
            }
            None => Err(StorageError::NotFound(path.display().to_string())),
        }
    }

    async fn open_for_read(&self, path: &Path) -> Result<ContentReader, StorageError> {
        let state = self.state.lock().unwrap();
        let content = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
        Ok(Box::new(std::io::Cursor::new(content)))
    }
}
