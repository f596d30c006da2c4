//! ObjectStore port - バージョン付きオブジェクトストレージ
//!
//! engine はこれを「バージョン付き削除ができる key-value ストア」としてのみ扱う。
//! 認証情報などはアダプタ側の設定で、engine は関知しない。
//!
//! # 設計原則
//! - 同名アップロードは新しいバージョンを作る（上書きは安全な置き換え）
//! - 削除は (name, version_id) 単位
//! - 一覧はページング。続きは `VersionPage::next` のカーソルで取る

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{ObjectVersionId, StorageError};
use crate::ports::filesystem::ContentReader;

/// Visibility of a newly created bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    AllPrivate,
    AllPublic,
}

/// Handle to an existing bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
}

impl Bucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub name: String,
    pub version_id: ObjectVersionId,
    pub size: u64,
}

/// One stored object version as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub name: String,
    pub version_id: ObjectVersionId,
}

/// Where the next page starts (inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub start_name: String,
    pub start_id: ObjectVersionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionPage {
    pub versions: Vec<ObjectVersion>,
    /// `None` once the listing is exhausted.
    pub next: Option<PageCursor>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_bucket(&self, name: &str, visibility: Visibility) -> Result<Bucket, StorageError>;

    async fn get_bucket(&self, name: &str) -> Result<Bucket, StorageError>;

    /// Store `content` as a new version of `name`, reading it to the end.
    async fn upload_object(
        &self,
        bucket: &Bucket,
        name: &str,
        metadata: &HashMap<String, String>,
        content: ContentReader,
    ) -> Result<ObjectHandle, StorageError>;

    /// List versions in `(name, version_id)` order starting at the cursor, at most `page_size` entries.
    async fn list_object_versions(
        &self,
        bucket: &Bucket,
        start: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<VersionPage, StorageError>;

    async fn delete_object_version(
        &self,
        bucket: &Bucket,
        name: &str,
        version_id: &ObjectVersionId,
    ) -> Result<(), StorageError>;
}
