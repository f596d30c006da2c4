//! LifecycleOrchestrator - 1 回の backup cycle を実行する
//!
//! # フロー
//! 1. Creating: 外部コマンドでバックアップを作成
//! 2. FindingNewest: ローカルの一覧から最新の artifact を選ぶ
//! 3. Uploading: 最新の artifact をバケットにアップロード
//! 4. ExpiringLocal: 期限切れのローカル artifact を削除
//! 5. ExpiringRemote: 期限切れのリモート artifact（バージョン単位）を削除
//!
//! 1〜3 の失敗はその場で実行を終える。4 の失敗は 5 を止めない。
//! 基準時刻は構築時に一度だけ取得し、4 と 5 の両方で同じ値を使う。
//! 各ステージは前のステージのすべての I/O が終わってから始まる。
//!
//! object store なしで構築した orchestrator（`OrchestratorBuilder::build_local`）は
//! ローカルの操作だけを受け付ける。store を使う操作は `StorageError::NotConfigured` で失敗し、
//! `run_cycle` はコマンドを起動する前に止まる。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{Instrument, debug, error, info, info_span, warn};
use ulid::Ulid;

use crate::app::config::{BacklabConfig, BucketSelection};
use crate::app::inventory::{self, LocalInventory, RemoteInventory};
use crate::domain::{
    Artifact, ArtifactNameParser, BacklabError, BackupCycleResult, CommandError, CycleStage,
    LocalArtifact, RemoteArtifact, RetentionPolicy, StorageError,
};
use crate::ports::{
    Bucket, CommandRunner, LocalFilesystem, ObjectHandle, ObjectStore, SuffixGenerator, Visibility,
};

/// Removed artifacts of one expiry stage plus the error that stopped it, if any.
///
/// Removal stops at the first failure; everything removed before it is listed here.
#[derive(Debug)]
pub struct Expiry<T> {
    pub removed: Vec<T>,
    pub error: Option<BacklabError>,
}

impl<T> Expiry<T> {
    fn empty() -> Self {
        Self {
            removed: Vec::new(),
            error: None,
        }
    }

    fn failed(error: BacklabError) -> Self {
        Self {
            removed: Vec::new(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Vec<T>, BacklabError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.removed),
        }
    }
}

/// Runs backup cycles against injected collaborators.
///
/// Built with [`crate::app::OrchestratorBuilder`].
pub struct LifecycleOrchestrator {
    pub(crate) config: BacklabConfig,
    pub(crate) retention: RetentionPolicy,
    pub(crate) reference_time: i64,
    pub(crate) runner: Arc<dyn CommandRunner>,
    pub(crate) fs: Arc<dyn LocalFilesystem>,
    /// `None` for a local-only orchestrator.
    pub(crate) store: Option<Arc<dyn ObjectStore>>,
    pub(crate) parser: Arc<dyn ArtifactNameParser>,
    pub(crate) suffix: Arc<dyn SuffixGenerator>,
    /// Resolved on first use, then shared by upload and remote expiry.
    pub(crate) bucket: OnceCell<Bucket>,
}

impl LifecycleOrchestrator {
    pub fn config(&self) -> &BacklabConfig {
        &self.config
    }

    /// Epoch seconds captured when the orchestrator was built.
    pub fn reference_time(&self) -> i64 {
        self.reference_time
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    fn store(&self) -> Result<&dyn ObjectStore, StorageError> {
        self.store.as_deref().ok_or(StorageError::NotConfigured)
    }

    /// Run one full cycle: create, find newest, upload, expire local, expire remote.
    pub async fn run_cycle(&self) -> BackupCycleResult {
        let run_id = Ulid::new();
        let span = info_span!("backup_cycle", %run_id, reference_time = self.reference_time);
        self.run_stages().instrument(span).await
    }

    async fn run_stages(&self) -> BackupCycleResult {
        let mut result = BackupCycleResult::new(self.reference_time);
        info!(
            backup_path = %self.config.backup_path.display(),
            retention = ?self.retention,
            "starting backup cycle"
        );

        if let Err(source) = self.store() {
            let err = BacklabError::StorageUnavailable {
                location: format!("bucket {:?}", self.config.bucket),
                source,
            };
            return self.abort(result, CycleStage::Creating, err);
        }

        if let Err(err) = self.create_backup().await {
            return self.abort(result, CycleStage::Creating, err);
        }
        result.created = true;

        let newest = match self.newest_local_artifact().await {
            Ok(newest) => newest,
            Err(err) => return self.abort(result, CycleStage::FindingNewest, err),
        };

        if let Err(err) = self.upload_artifact(&newest).await {
            return self.abort(result, CycleStage::Uploading, err);
        }
        result.uploaded_artifact = Some(newest.artifact);

        let local = self.expire_local().await;
        result.locally_removed = local.removed;
        if let Some(err) = local.error {
            error!(stage = %CycleStage::ExpiringLocal, kind = err.kind(), error = %err, "local expiry stopped");
            result.record_failure(CycleStage::ExpiringLocal, err);
        }

        let remote = self.expire_remote().await;
        result.remotely_removed = remote.removed;
        if let Some(err) = remote.error {
            error!(stage = %CycleStage::ExpiringRemote, kind = err.kind(), error = %err, "remote expiry stopped");
            if !result.record_failure(CycleStage::ExpiringRemote, err) {
                warn!("remote expiry error not reported as the run's error, local expiry failed first");
            }
        }

        info!(
            success = result.is_success(),
            uploaded = ?result.uploaded_artifact.as_ref().map(|a| a.name.as_str()),
            locally_removed = result.locally_removed.len(),
            remotely_removed = result.remotely_removed.len(),
            "backup cycle {}",
            CycleStage::Done
        );
        result
    }

    fn abort(
        &self,
        mut result: BackupCycleResult,
        stage: CycleStage,
        err: BacklabError,
    ) -> BackupCycleResult {
        error!(stage = %stage, kind = err.kind(), error = %err, "backup cycle aborted");
        result.record_failure(stage, err);
        result
    }

    /// Run the backup creation command and wait for it.
    pub async fn create_backup(&self) -> Result<(), BacklabError> {
        let command = &self.config.create_command;
        info!(command = %command, timeout = ?self.config.creation_timeout, "creating backup");

        let output = self
            .runner
            .run(command, self.config.creation_timeout)
            .await
            .map_err(|err| match err {
                CommandError::TimedOut { timeout, .. } => BacklabError::CreationTimedOut { timeout },
                other => BacklabError::CreationFailed {
                    exit_status: None,
                    stderr: other.to_string(),
                },
            })?;

        if !output.is_success() {
            return Err(BacklabError::CreationFailed {
                exit_status: output.exit_code,
                stderr: output.stderr,
            });
        }
        info!("backup created");
        Ok(())
    }

    /// Fresh listing of the local backup directory.
    pub async fn list_local(&self) -> Result<Vec<LocalArtifact>, BacklabError> {
        LocalInventory::new(
            self.fs.as_ref(),
            self.parser.as_ref(),
            &self.config.backup_path,
        )
        .list()
        .await
    }

    /// The local artifact with the highest timestamp.
    pub async fn newest_local_artifact(&self) -> Result<LocalArtifact, BacklabError> {
        let artifacts = self.list_local().await?;
        let newest = inventory::newest(&artifacts).cloned().ok_or_else(|| {
            BacklabError::NoArtifactsFound {
                location: self.config.backup_path.display().to_string(),
            }
        })?;
        debug!(artifact = %newest.artifact, candidates = artifacts.len(), "selected newest artifact");
        Ok(newest)
    }

    /// Upload `artifact` under its file name.
    pub async fn upload_artifact(&self, artifact: &LocalArtifact) -> Result<ObjectHandle, BacklabError> {
        self.upload_path(artifact.name(), &artifact.path).await
    }

    /// Upload any file under its base name.
    pub async fn upload_file(&self, path: &Path) -> Result<ObjectHandle, BacklabError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BacklabError::UploadFailed {
                name: path.display().to_string(),
                source: StorageError::Backend("path has no utf-8 file name".to_string()),
            })?;
        self.upload_path(name, path).await
    }

    async fn upload_path(&self, name: &str, path: &Path) -> Result<ObjectHandle, BacklabError> {
        let upload_failed = |source| BacklabError::UploadFailed {
            name: name.to_string(),
            source,
        };

        let store = self.store().map_err(upload_failed)?;
        let bucket = self.resolve_bucket().await.map_err(upload_failed)?;
        let content = self.fs.open_for_read(path).await.map_err(upload_failed)?;

        info!(artifact = name, bucket = %bucket.name, "uploading artifact");
        let handle = store
            .upload_object(bucket, name, &HashMap::new(), content)
            .await
            .map_err(upload_failed)?;
        info!(artifact = name, version = %handle.version_id, size = handle.size, "artifact uploaded");
        Ok(handle)
    }

    async fn resolve_bucket(&self) -> Result<&Bucket, StorageError> {
        let store = self.store()?;
        self.bucket
            .get_or_try_init(|| async {
                match &self.config.bucket {
                    BucketSelection::Named(name) => store.get_bucket(name).await,
                    BucketSelection::Fresh { prefix } => {
                        let name = format!("{prefix}{}", self.suffix.generate());
                        warn!(
                            bucket = %name,
                            "no bucket configured, creating a new one; retention will not span runs"
                        );
                        store.create_bucket(&name, Visibility::AllPrivate).await
                    }
                }
            })
            .await
    }

    /// Bucket to expire from, without creating one.
    ///
    /// `None` when the selection is `Fresh` and nothing was uploaded in this run:
    /// a brand-new bucket holds nothing to expire.
    async fn existing_bucket(&self) -> Result<Option<&Bucket>, StorageError> {
        self.store()?;
        if let Some(bucket) = self.bucket.get() {
            return Ok(Some(bucket));
        }
        match &self.config.bucket {
            BucketSelection::Named(_) => self.resolve_bucket().await.map(Some),
            BucketSelection::Fresh { .. } => Ok(None),
        }
    }

    /// Fresh listing of the remote bucket. `Ok(vec![])` when no bucket exists yet.
    pub async fn list_remote(&self) -> Result<Vec<RemoteArtifact>, BacklabError> {
        let bucket = match self.existing_bucket().await {
            Ok(Some(bucket)) => bucket,
            Ok(None) => return Ok(Vec::new()),
            Err(source) => {
                return Err(BacklabError::StorageUnavailable {
                    location: format!("bucket {:?}", self.config.bucket),
                    source,
                });
            }
        };
        let store = self.store().map_err(|source| BacklabError::StorageUnavailable {
            location: bucket.name.clone(),
            source,
        })?;
        RemoteInventory::new(store, self.parser.as_ref(), bucket, self.config.paging)
            .list()
            .await
    }

    /// Remove every expired local artifact, stopping at the first failure.
    pub async fn expire_local(&self) -> Expiry<Artifact> {
        let Some(threshold) = self.retention.threshold(self.reference_time) else {
            info!("retention disabled, keeping all local artifacts");
            return Expiry::empty();
        };

        let artifacts = match self.list_local().await {
            Ok(artifacts) => artifacts,
            Err(err) => return Expiry::failed(err),
        };

        let mut expiry = Expiry::empty();
        for local in artifacts {
            if !self.retention.is_expired(local.timestamp(), self.reference_time) {
                continue;
            }
            if let Err(source) = self.fs.remove_file(&local.path).await {
                expiry.error = Some(BacklabError::LocalDeletionFailed {
                    artifact: local.artifact,
                    source,
                });
                break;
            }
            info!(artifact = %local.artifact, threshold, "removed expired local artifact");
            expiry.removed.push(local.artifact);
        }
        expiry
    }

    /// Delete every expired remote version, stopping at the first failure.
    pub async fn expire_remote(&self) -> Expiry<RemoteArtifact> {
        let Some(threshold) = self.retention.threshold(self.reference_time) else {
            info!("retention disabled, keeping all remote artifacts");
            return Expiry::empty();
        };

        let bucket = match self.existing_bucket().await {
            Ok(Some(bucket)) => bucket.clone(),
            Ok(None) => {
                warn!("no bucket resolved in this run, skipping remote expiry");
                return Expiry::empty();
            }
            Err(source) => {
                return Expiry::failed(BacklabError::StorageUnavailable {
                    location: format!("bucket {:?}", self.config.bucket),
                    source,
                });
            }
        };

        let store = match self.store() {
            Ok(store) => store,
            Err(source) => {
                return Expiry::failed(BacklabError::StorageUnavailable {
                    location: bucket.name.clone(),
                    source,
                });
            }
        };

        let artifacts =
            match RemoteInventory::new(store, self.parser.as_ref(), &bucket, self.config.paging)
                .list()
                .await
            {
                Ok(artifacts) => artifacts,
                Err(err) => return Expiry::failed(err),
            };

        let mut expiry = Expiry::empty();
        for remote in artifacts {
            if !self.retention.is_expired(remote.timestamp(), self.reference_time) {
                continue;
            }
            if let Err(source) = store
                .delete_object_version(&bucket, remote.name(), &remote.version_id)
                .await
            {
                expiry.error = Some(BacklabError::RemoteDeletionFailed {
                    artifact: remote,
                    source,
                });
                break;
            }
            info!(artifact = %remote, bucket = %bucket.name, threshold, "deleted expired remote artifact");
            expiry.removed.push(remote);
        }
        expiry
    }
}
