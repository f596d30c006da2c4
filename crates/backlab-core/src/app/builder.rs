//! OrchestratorBuilder - orchestrator の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 基準時刻は build() の瞬間に一度だけ取得する

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::app::config::{BacklabConfig, ConfigError};
use crate::app::orchestrator::LifecycleOrchestrator;
use crate::domain::{ArtifactNameParser, EpochPrefixParser};
use crate::impls::{ProcessRunner, TokioFilesystem};
use crate::ports::{
    Clock, CommandRunner, LocalFilesystem, ObjectStore, RandomSuffix, SuffixGenerator, SystemClock,
};

/// OrchestratorBuilder は LifecycleOrchestrator を構築
///
/// # 使用例
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(config)
///     .store(Arc::new(DirectoryObjectStore::new("/mnt/backups")))
///     .build()?;
/// let result = orchestrator.run_cycle().await;
/// ```
///
/// # デフォルト
/// - clock: SystemClock
/// - runner: ProcessRunner
/// - filesystem: TokioFilesystem
/// - parser: EpochPrefixParser
/// - suffix: RandomSuffix
///
/// object store にはデフォルトがない。未設定なら build() が BuildError を返す。
/// ローカルの操作（作成、一覧、ローカル削除）だけなら build_local() を使う。
pub struct OrchestratorBuilder {
    config: BacklabConfig,
    clock: Box<dyn Clock>,
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn LocalFilesystem>,
    store: Option<Arc<dyn ObjectStore>>,
    parser: Arc<dyn ArtifactNameParser>,
    suffix: Arc<dyn SuffixGenerator>,
}

/// BuildError は orchestrator 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no object store configured")]
    MissingObjectStore,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl OrchestratorBuilder {
    pub fn new(config: BacklabConfig) -> Self {
        Self {
            config,
            clock: Box::new(SystemClock),
            runner: Arc::new(ProcessRunner::new()),
            fs: Arc::new(TokioFilesystem),
            store: None,
            parser: Arc::new(EpochPrefixParser),
            suffix: Arc::new(RandomSuffix::default()),
        }
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn filesystem(mut self, fs: Arc<dyn LocalFilesystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn parser(mut self, parser: impl ArtifactNameParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub fn suffix(mut self, suffix: impl SuffixGenerator + 'static) -> Self {
        self.suffix = Arc::new(suffix);
        self
    }

    /// Validate the configuration, capture the reference time and build.
    pub fn build(self) -> Result<LifecycleOrchestrator, BuildError> {
        if self.store.is_none() {
            return Err(BuildError::MissingObjectStore);
        }
        self.assemble()
    }

    /// Build an orchestrator for local operations only.
    ///
    /// A store set with [`Self::store`] is still used; without one every remote
    /// operation fails with `StorageError::NotConfigured`.
    pub fn build_local(self) -> Result<LifecycleOrchestrator, BuildError> {
        self.assemble()
    }

    fn assemble(self) -> Result<LifecycleOrchestrator, BuildError> {
        self.config.validate()?;

        Ok(LifecycleOrchestrator {
            retention: self.config.retention(),
            reference_time: self.clock.now().timestamp(),
            config: self.config,
            runner: self.runner,
            fs: self.fs,
            store: self.store,
            parser: self.parser,
            suffix: self.suffix,
            bucket: OnceCell::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BacklabError, ParseError, RetentionPolicy, StorageError};
    use crate::impls::{InMemoryFilesystem, InMemoryObjectStore};
    use crate::ports::FixedClock;

    #[test]
    fn test_build_success_captures_reference_time() {
        let orchestrator = OrchestratorBuilder::new(BacklabConfig::new("/backups").with_preserve_for(60))
            .clock(FixedClock::at_epoch(1_600_000_000))
            .store(Arc::new(InMemoryObjectStore::new()))
            .build()
            .unwrap();

        assert_eq!(orchestrator.reference_time(), 1_600_000_000);
        assert_eq!(orchestrator.retention(), RetentionPolicy::PreserveFor(60));
    }

    #[test]
    fn test_build_missing_store() {
        let result = OrchestratorBuilder::new(BacklabConfig::default()).build();
        assert!(matches!(result, Err(BuildError::MissingObjectStore)));
    }

    #[test]
    fn test_build_invalid_config() {
        let result = OrchestratorBuilder::new(BacklabConfig::default().with_preserve_for(-5))
            .store(Arc::new(InMemoryObjectStore::new()))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::InvalidConfig(ConfigError::NegativePreserveFor(-5)))
        ));
    }

    #[tokio::test]
    async fn test_build_local_serves_local_operations_only() {
        let fs = InMemoryFilesystem::new();
        fs.add_dir("/backups");
        fs.add_file("/backups/1500000000-b.tar", b"b");

        let orchestrator = OrchestratorBuilder::new(BacklabConfig::new("/backups"))
            .filesystem(Arc::new(fs))
            .build_local()
            .unwrap();

        let newest = orchestrator.newest_local_artifact().await.unwrap();
        assert_eq!(newest.name(), "1500000000-b.tar");
        assert!(matches!(
            orchestrator.upload_artifact(&newest).await,
            Err(BacklabError::UploadFailed {
                source: StorageError::NotConfigured,
                ..
            })
        ));
    }

    #[test]
    fn test_build_local_still_validates() {
        let result = OrchestratorBuilder::new(BacklabConfig::default().with_preserve_for(-1)).build_local();
        assert!(matches!(
            result,
            Err(BuildError::InvalidConfig(ConfigError::NegativePreserveFor(-1)))
        ));
    }

    struct SuffixTimestampParser;

    impl ArtifactNameParser for SuffixTimestampParser {
        fn parse(&self, name: &str) -> Result<i64, ParseError> {
            let stem = name.strip_suffix(".tar").unwrap_or(name);
            let digits = stem.rsplit('_').next().unwrap_or_default();
            digits.parse().map_err(|_| ParseError::NotAnInteger {
                name: name.to_string(),
                prefix: digits.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_custom_parser_changes_naming_convention() {
        let fs = InMemoryFilesystem::new();
        fs.add_dir("/backups");
        fs.add_file("/backups/gitlab_1000000000.tar", b"a");
        fs.add_file("/backups/gitlab_1500000000.tar", b"b");

        let orchestrator = OrchestratorBuilder::new(BacklabConfig::new("/backups"))
            .filesystem(Arc::new(fs))
            .store(Arc::new(InMemoryObjectStore::new()))
            .parser(SuffixTimestampParser)
            .build()
            .unwrap();

        let newest = orchestrator.newest_local_artifact().await.unwrap();
        assert_eq!(newest.name(), "gitlab_1500000000.tar");
        assert_eq!(newest.timestamp(), 1_500_000_000);
    }
}
