//! Errors - エラー型と分類
//!
//! # 分類
//! - port レベル: `StorageError`（fs / object store）, `CommandError`（外部プロセス）
//! - 実行レベル: `BacklabError`（どのステージで止まったか + 原因）
//!
//! `ParseError` は `domain::timestamp` にある。inventory が読み飛ばすので
//! `BacklabError` には現れない。
//!
//! 自動リトライは一切しない。失敗した実行はその場で止まり、どこで止まったかを返す。

use std::time::Duration;
use thiserror::Error;

use crate::domain::artifact::{Artifact, RemoteArtifact};

/// StorageError は fs / object store の呼び出し失敗
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("no object store configured")]
    NotConfigured,

    /// Raised by the in-memory fakes when a failure is scripted.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// CommandError は外部コマンドの起動・待機の失敗
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to launch {program:?}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program:?}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program:?} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// BacklabError は 1 回の backup cycle を止めたエラー
#[derive(Debug, Error)]
pub enum BacklabError {
    #[error("storage unavailable at {location}: {source}")]
    StorageUnavailable {
        location: String,
        #[source]
        source: StorageError,
    },

    #[error("backup creation failed (exit status {exit_status:?}): {stderr}")]
    CreationFailed {
        exit_status: Option<i32>,
        stderr: String,
    },

    #[error("backup creation did not finish within {timeout:?}")]
    CreationTimedOut { timeout: Duration },

    #[error("no backup artifacts found in {location}")]
    NoArtifactsFound { location: String },

    #[error("upload of {name} failed: {source}")]
    UploadFailed {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to remove local artifact {artifact}: {source}")]
    LocalDeletionFailed {
        artifact: Artifact,
        #[source]
        source: StorageError,
    },

    #[error("failed to delete remote artifact {artifact}: {source}")]
    RemoteDeletionFailed {
        artifact: RemoteArtifact,
        #[source]
        source: StorageError,
    },
}

impl BacklabError {
    /// Short machine-friendly name of the error kind, used in reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StorageUnavailable { .. } => "storage_unavailable",
            Self::CreationFailed { .. } => "creation_failed",
            Self::CreationTimedOut { .. } => "creation_timed_out",
            Self::NoArtifactsFound { .. } => "no_artifacts_found",
            Self::UploadFailed { .. } => "upload_failed",
            Self::LocalDeletionFailed { .. } => "local_deletion_failed",
            Self::RemoteDeletionFailed { .. } => "remote_deletion_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = BacklabError::LocalDeletionFailed {
            artifact: Artifact::new("1000000000-a.tar", 1_000_000_000),
            source: StorageError::Injected("disk on fire".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("1000000000-a.tar"));
        assert!(msg.contains("disk on fire"));
        assert_eq!(err.kind(), "local_deletion_failed");
    }

    #[test]
    fn creation_failure_reports_status_and_stderr() {
        let err = BacklabError::CreationFailed {
            exit_status: Some(1),
            stderr: "rake aborted!".into(),
        };
        assert_eq!(
            err.to_string(),
            "backup creation failed (exit status Some(1)): rake aborted!"
        );
    }
}
