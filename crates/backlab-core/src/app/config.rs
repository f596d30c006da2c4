//! Config - engine が消費する設定
//!
//! # バケット選択
//! バケット名が未設定なら、実行ごとに `<prefix><random>` の private バケットを新規作成する。
//! これは実行をまたいだ retention が効かなくなるので、通常は名前を指定するべき。
//! 推測ではなく `BucketSelection` として明示的に表現する。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::RetentionPolicy;
use crate::ports::CommandSpec;

pub const DEFAULT_BACKUP_PATH: &str = "/var/opt/gitlab/backups";
pub const DEFAULT_BUCKET_PREFIX: &str = "backlab-gitlab-backups-";
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketSelection {
    /// Use an existing bucket.
    Named(String),
    /// Create a new private bucket named `<prefix><random suffix>`.
    Fresh { prefix: String },
}

impl BucketSelection {
    /// `Named` when a non-blank name is given, otherwise `Fresh` with the default prefix.
    pub fn from_name(name: Option<String>) -> Self {
        match name {
            Some(name) if !name.trim().is_empty() => Self::Named(name),
            _ => Self::Fresh {
                prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            },
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }
}

impl Default for BucketSelection {
    fn default() -> Self {
        Self::from_name(None)
    }
}

/// Remote listing bounds.
///
/// `max_pages: None` follows the listing to exhaustion, so retention covers the
/// whole bucket. With `Some(n)` only the first `n * page_size` versions are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub page_size: usize,
    pub max_pages: Option<usize>,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("preserve_for must not be negative (got {0})")]
    NegativePreserveFor(i64),

    #[error("bucket name must not be blank")]
    EmptyBucketName,

    #[error("backup creation command must not be empty")]
    EmptyCommand,

    #[error("backup path must not be empty")]
    EmptyBackupPath,

    #[error("page size must be at least 1")]
    ZeroPageSize,

    #[error("max pages must be at least 1 when set")]
    ZeroMaxPages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklabConfig {
    pub backup_path: PathBuf,
    pub bucket: BucketSelection,
    /// Seconds. `0` keeps everything.
    pub preserve_for_secs: i64,
    pub create_command: CommandSpec,
    /// `None` waits for the creation command forever.
    pub creation_timeout: Option<Duration>,
    pub paging: Paging,
}

impl BacklabConfig {
    pub fn new(backup_path: impl Into<PathBuf>) -> Self {
        Self {
            backup_path: backup_path.into(),
            ..Self::default()
        }
    }

    pub fn with_bucket(mut self, bucket: BucketSelection) -> Self {
        self.bucket = bucket;
        self
    }

    pub fn with_preserve_for(mut self, secs: i64) -> Self {
        self.preserve_for_secs = secs;
        self
    }

    pub fn with_create_command(mut self, command: CommandSpec) -> Self {
        self.create_command = command;
        self
    }

    pub fn with_creation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.creation_timeout = timeout;
        self
    }

    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preserve_for_secs < 0 {
            return Err(ConfigError::NegativePreserveFor(self.preserve_for_secs));
        }
        if let BucketSelection::Named(name) = &self.bucket
            && name.trim().is_empty()
        {
            return Err(ConfigError::EmptyBucketName);
        }
        if self.create_command.program.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if self.backup_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBackupPath);
        }
        if self.paging.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.paging.max_pages == Some(0) {
            return Err(ConfigError::ZeroMaxPages);
        }
        Ok(())
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_seconds(self.preserve_for_secs)
    }
}

impl Default for BacklabConfig {
    fn default() -> Self {
        Self {
            backup_path: PathBuf::from(DEFAULT_BACKUP_PATH),
            bucket: BucketSelection::default(),
            preserve_for_secs: 0,
            create_command: CommandSpec::default(),
            creation_timeout: None,
            paging: Paging::default(),
        }
    }
}
