//! DirectoryObjectStore - ディレクトリ上のバージョン付きオブジェクトストア
//!
//! マウントされたリモートボリューム（NFS, rclone mount など）をバケットとして使う。
//!
//! # レイアウト
//! ```text
//! <root>/<bucket>/<object name>/<version ulid>
//! ```
//! version id は `ulid::Generator` で採番する。同一 store インスタンス内では
//! 同じミリ秒内でも単調増加するので、同じ名前のバージョンは作成順に並ぶ。
//! 別プロセスからの書き込み同士の順序はミリ秒単位でしか保証されない。
//!
//! 書き込みは reader を `<version>.partial` へ `tokio::io::copy` で流し込み、
//! 完了してから rename する。途中で失敗したら `.partial` を消す。

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use ulid::Generator;

use crate::domain::{ObjectVersionId, StorageError};
use crate::ports::{
    Bucket, ContentReader, ObjectHandle, ObjectStore, ObjectVersion, PageCursor, VersionPage,
    Visibility,
};

const PARTIAL_SUFFIX: &str = ".partial";

pub struct DirectoryObjectStore {
    root: PathBuf,
    versions: Mutex<Generator>,
}

impl DirectoryObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            versions: Mutex::new(Generator::new()),
        }
    }

    fn next_version(&self) -> Result<ObjectVersionId, StorageError> {
        let mut generator = self
            .versions
            .lock()
            .map_err(|_| StorageError::Backend("version generator poisoned".to_string()))?;
        let id = generator
            .generate()
            .map_err(|e| StorageError::Backend(format!("version id: {e}")))?;
        Ok(ObjectVersionId::new(id.to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_component("bucket", name)?;
        Ok(self.root.join(name))
    }

    async fn existing_bucket_dir(&self, name: &str) -> Result<PathBuf, StorageError> {
        let dir = self.bucket_dir(name)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StorageError::Backend(format!(
                "{} is not a directory",
                dir.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("bucket {name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every stored version, sorted by `(name, version_id)`.
    async fn all_versions(&self, bucket_dir: &Path) -> Result<Vec<ObjectVersion>, StorageError> {
        let mut versions = Vec::new();
        let mut objects = tokio::fs::read_dir(bucket_dir).await?;
        while let Some(object) = objects.next_entry().await? {
            if !object.file_type().await?.is_dir() {
                continue;
            }
            let Ok(name) = object.file_name().into_string() else {
                continue;
            };
            let mut entries = tokio::fs::read_dir(object.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let Ok(id) = entry.file_name().into_string() else {
                    continue;
                };
                if id.ends_with(PARTIAL_SUFFIX) {
                    continue;
                }
                versions.push(ObjectVersion {
                    name: name.clone(),
                    version_id: ObjectVersionId::new(id),
                });
            }
        }
        versions.sort_by(|a, b| (&a.name, &a.version_id).cmp(&(&b.name, &b.version_id)));
        Ok(versions)
    }
}

async fn write_partial(path: &Path, content: &mut ContentReader) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let size = tokio::io::copy(content, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}

fn validate_component(what: &str, value: &str) -> Result<(), StorageError> {
    if value.is_empty()
        || value.starts_with('.')
        || value.contains('/')
        || value.contains('\\')
    {
        return Err(StorageError::Backend(format!("invalid {what} name {value:?}")));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn create_bucket(&self, name: &str, visibility: Visibility) -> Result<Bucket, StorageError> {
        let dir = self.bucket_dir(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::create_dir(&dir).await?;
        // a mounted directory has no public/private notion, the access mode is the mount's
        tracing::debug!(bucket = name, ?visibility, "created directory bucket");
        Ok(Bucket::new(name))
    }

    async fn get_bucket(&self, name: &str) -> Result<Bucket, StorageError> {
        self.existing_bucket_dir(name).await?;
        Ok(Bucket::new(name))
    }

    async fn upload_object(
        &self,
        bucket: &Bucket,
        name: &str,
        _metadata: &HashMap<String, String>,
        mut content: ContentReader,
    ) -> Result<ObjectHandle, StorageError> {
        validate_component("object", name)?;
        let object_dir = self.existing_bucket_dir(&bucket.name).await?.join(name);
        tokio::fs::create_dir_all(&object_dir).await?;

        let version_id = self.next_version()?;
        let final_path = object_dir.join(version_id.as_str());
        let partial_path = object_dir.join(format!("{version_id}{PARTIAL_SUFFIX}"));

        let size = match write_partial(&partial_path, &mut content).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial_path).await;
                let _ = tokio::fs::remove_dir(&object_dir).await;
                return Err(e.into());
            }
        };
        tokio::fs::rename(&partial_path, &final_path).await?;
        tracing::debug!(object = name, version = %version_id, size, "stored object version");

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
        let dir = self.existing_bucket_dir(&bucket.name).await?;
        let page_size = page_size.max(1);

        let mut remaining = self.all_versions(&dir).await?.into_iter().filter(|v| match start {
            Some(cursor) => (&v.name, &v.version_id) >= (&cursor.start_name, &cursor.start_id),
            None => true,
        });

        let versions: Vec<ObjectVersion> = remaining.by_ref().take(page_size).collect();
        let next = remaining.next().map(|v| PageCursor {
            start_name: v.name,
            start_id: v.version_id,
        });
        Ok(VersionPage { versions, next })
    }

    async fn delete_object_version(
        &self,
        bucket: &Bucket,
        name: &str,
        version_id: &ObjectVersionId,
    ) -> Result<(), StorageError> {
        validate_component("object", name)?;
        validate_component("version", version_id.as_str())?;
        let object_dir = self.existing_bucket_dir(&bucket.name).await?.join(name);

        match tokio::fs::remove_file(object_dir.join(version_id.as_str())).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{name} ({version_id})")));
            }
            Err(e) => return Err(e.into()),
        }

        // last version gone, drop the object directory; a non-empty dir just stays
        let _ = tokio::fs::remove_dir(&object_dir).await;
        Ok(())
    }
}
