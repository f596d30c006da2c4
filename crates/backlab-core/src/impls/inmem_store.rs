//! InMemoryObjectStore - 開発・テスト用のバージョン付きオブジェクトストア
//!
//! # 実装詳細
//! - バケットごとに BTreeMap<(name, version_id), content> を持つ
//! - version_id は連番（ゼロ埋め）なので一覧順が決定的
//! - 失敗注入: アップロード失敗、一覧失敗、特定バージョンの削除失敗
//! - アップロードされたストリームは読み切ってから lock を取る

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use tokio::io::AsyncReadExt;

use crate::domain::{ObjectVersionId, StorageError};
use crate::ports::{
    Bucket, ContentReader, ObjectHandle, ObjectStore, ObjectVersion, PageCursor, VersionPage,
    Visibility,
};

type ObjectKey = (String, ObjectVersionId);

#[derive(Default)]
struct StoredBucket {
    visibility: Option<Visibility>,
    objects: BTreeMap<ObjectKey, Vec<u8>>,
}

#[derive(Default)]
struct StoreState {
    buckets: HashMap<String, StoredBucket>,
    next_version: u64,
    fail_upload: bool,
    fail_list: bool,
    fail_delete: HashSet<ObjectKey>,
    list_calls: usize,
    uploads: Vec<(String, String)>,
    deleted: Vec<(String, ObjectVersionId)>,
}

impl StoreState {
    fn bucket(&self, name: &str) -> Result<&StoredBucket, StorageError> {
        self.buckets
            .get(name)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {name}")))
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut StoredBucket, StorageError> {
        self.buckets
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {name}")))
    }

    fn allocate_version(&mut self) -> ObjectVersionId {
        self.next_version += 1;
        ObjectVersionId::new(format!("{:020}", self.next_version))
    }
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    state: Mutex<StoreState>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds an empty private bucket.
    pub fn with_bucket(name: &str) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().buckets.insert(
            name.to_string(),
            StoredBucket {
                visibility: Some(Visibility::AllPrivate),
                ..StoredBucket::default()
            },
        );
        store
    }

    /// Store a version directly, bypassing upload bookkeeping. Returns its version id.
    pub fn put_version(&self, bucket: &str, name: &str, content: &[u8]) -> ObjectVersionId {
        let mut state = self.state.lock().unwrap();
        let version_id = state.allocate_version();
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .objects
            .insert((name.to_string(), version_id.clone()), content.to_vec());
        version_id
    }

    pub fn fail_uploads(&self) {
        self.state.lock().unwrap().fail_upload = true;
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_delete(&self, name: &str, version_id: &ObjectVersionId) {
        self.state
            .lock()
            .unwrap()
            .fail_delete
            .insert((name.to_string(), version_id.clone()));
    }

    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().unwrap().buckets.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn visibility(&self, bucket: &str) -> Option<Visibility> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .and_then(|b| b.visibility)
    }

    /// All `(name, version_id)` pairs currently stored in `bucket`.
    pub fn versions(&self, bucket: &str) -> Vec<(String, ObjectVersionId)> {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn content(&self, bucket: &str, name: &str, version_id: &ObjectVersionId) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket)?
            .objects
            .get(&(name.to_string(), version_id.clone()))
            .cloned()
    }

    /// `(bucket, name)` of every successful upload.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Successfully deleted versions, in deletion order.
    pub fn deleted(&self) -> Vec<(String, ObjectVersionId)> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_bucket(&self, name: &str, visibility: Visibility) -> Result<Bucket, StorageError> {
        let mut state = self.state.lock().unwrap();
        if state.buckets.contains_key(name) {
            return Err(StorageError::Backend(format!("bucket {name} already exists")));
        }
        state.buckets.insert(
            name.to_string(),
            StoredBucket {
                visibility: Some(visibility),
                ..StoredBucket::default()
            },
        );
        Ok(Bucket::new(name))
    }

    async fn get_bucket(&self, name: &str) -> Result<Bucket, StorageError> {
        let state = self.state.lock().unwrap();
        state.bucket(name)?;
        Ok(Bucket::new(name))
    }

    async fn upload_object(
        &self,
        bucket: &Bucket,
        name: &str,
        _metadata: &HashMap<String, String>,
        mut content: ContentReader,
    ) -> Result<ObjectHandle, StorageError> {
        let fail_upload = self.state.lock().unwrap().fail_upload;
        if fail_upload {
            return Err(StorageError::Injected(format!("upload {name} failed")));
        }
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await?;

        let mut state = self.state.lock().unwrap();
        state.bucket(&bucket.name)?;

        let version_id = state.allocate_version();
        let size = buf.len() as u64;
        state
            .bucket_mut(&bucket.name)?
            .objects
            .insert((name.to_string(), version_id.clone()), buf);
        state.uploads.push((bucket.name.clone(), name.to_string()));

        Ok(ObjectHandle {
            name: name.to_string(),
            version_id,
            size,
        })
    }

    async fn list_object_versions(
        &self,
        bucket: &Bucket,
        start: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<VersionPage, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_list {
            return Err(StorageError::Injected(format!("list {} failed", bucket.name)));
        }

        let objects = &state.bucket(&bucket.name)?.objects;
        let mut keys = objects
            .keys()
            .filter(|(name, id)| match start {
                Some(cursor) => (name, id) >= (&cursor.start_name, &cursor.start_id),
                None => true,
            })
            .take(page_size.max(1) + 1);

        let versions: Vec<ObjectVersion> = keys
            .by_ref()
            .take(page_size.max(1))
            .map(|(name, id)| ObjectVersion {
                name: name.clone(),
                version_id: id.clone(),
            })
            .collect();
        let next = keys.next().map(|(name, id)| PageCursor {
            start_name: name.clone(),
            start_id: id.clone(),
        });

        Ok(VersionPage { versions, next })
    }

    async fn delete_object_version(
        &self,
        bucket: &Bucket,
        name: &str,
        version_id: &ObjectVersionId,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        let key = (name.to_string(), version_id.clone());
        if state.fail_delete.contains(&key) {
            return Err(StorageError::Injected(format!(
                "delete {name} ({version_id}) failed"
            )));
        }
        let removed = state.bucket_mut(&bucket.name)?.objects.remove(&key);
        if removed.is_none() {
            return Err(StorageError::NotFound(format!("{name} ({version_id})")));
        }
        state.deleted.push(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_follow_cursor_to_exhaustion() {
        let store = InMemoryObjectStore::with_bucket("b");
        for name in ["1000000000-a.tar", "1100000000-b.tar", "1200000000-c.tar"] {
            store.put_version("b", name, b"x");
        }
        let bucket = Bucket::new("b");

        let first = store.list_object_versions(&bucket, None, 2).await.unwrap();
        assert_eq!(first.versions.len(), 2);
        let cursor = first.next.expect("more pages");
        assert_eq!(cursor.start_name, "1200000000-c.tar");

        let second = store
            .list_object_versions(&bucket, Some(&cursor), 2)
            .await
            .unwrap();
        assert_eq!(second.versions.len(), 1);
        assert_eq!(second.versions[0].name, "1200000000-c.tar");
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn same_name_uploads_create_versions() {
        let store = InMemoryObjectStore::with_bucket("b");
        let bucket = store.get_bucket("b").await.unwrap();
        let meta = HashMap::new();

        let v1 = store.upload_object(&bucket, "1000000000-a.tar", &meta, Box::new(&b"1"[..])).await.unwrap();
        let v2 = store.upload_object(&bucket, "1000000000-a.tar", &meta, Box::new(&b"2"[..])).await.unwrap();

        assert_ne!(v1.version_id, v2.version_id);
        assert_eq!(store.versions("b").len(), 2);
        assert_eq!(store.content("b", "1000000000-a.tar", &v2.version_id), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn delete_addresses_single_version() {
        let store = InMemoryObjectStore::with_bucket("b");
        let v1 = store.put_version("b", "1000000000-a.tar", b"1");
        let v2 = store.put_version("b", "1000000000-a.tar", b"2");
        let bucket = Bucket::new("b");

        store.delete_object_version(&bucket, "1000000000-a.tar", &v1).await.unwrap();

        assert_eq!(store.versions("b"), vec![("1000000000-a.tar".to_string(), v2)]);
        assert!(store
            .delete_object_version(&bucket, "1000000000-a.tar", &v1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn missing_bucket_is_not_found() {
        let store = InMemoryObjectStore::new();
        assert!(matches!(
            store.get_bucket("nope").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
