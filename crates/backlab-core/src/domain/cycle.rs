//! Backup cycle - ステージと実行結果
//!
//! ```text
//! Creating -> FindingNewest -> Uploading -> ExpiringLocal -> ExpiringRemote -> Done
//! ```
//!
//! 各ステージの失敗はそのステージで終わる。ExpiringLocal の失敗だけは
//! ExpiringRemote の実行を妨げない（ローカルの掃除失敗はネットワーク側の不整合を意味しない）。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::artifact::{Artifact, RemoteArtifact};
use crate::domain::errors::BacklabError;

/// One stage of the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Creating,
    FindingNewest,
    Uploading,
    ExpiringLocal,
    ExpiringRemote,
    Done,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Creating => "creating",
            Self::FindingNewest => "finding_newest",
            Self::Uploading => "uploading",
            Self::ExpiringLocal => "expiring_local",
            Self::ExpiringRemote => "expiring_remote",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Outcome of one orchestration run.
///
/// Partial progress is kept: artifacts removed before a failure stay listed.
#[derive(Debug, Default)]
pub struct BackupCycleResult {
    /// Reference instant (epoch seconds) every expiry decision in this run used.
    pub reference_time: i64,
    pub created: bool,
    pub uploaded_artifact: Option<Artifact>,
    pub locally_removed: Vec<Artifact>,
    pub remotely_removed: Vec<RemoteArtifact>,
    /// The first hard error of the run.
    pub error: Option<BacklabError>,
    /// Stage whose failure produced `error`.
    pub stopped_at: Option<CycleStage>,
}

impl BackupCycleResult {
    pub fn new(reference_time: i64) -> Self {
        Self {
            reference_time,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Record a failure. Only the first one is kept; the caller logs the rest.
    ///
    /// Returns `false` when an earlier error was already recorded.
    pub fn record_failure(&mut self, stage: CycleStage, error: BacklabError) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(error);
        self.stopped_at = Some(stage);
        true
    }

    pub fn report(&self) -> CycleReport {
        CycleReport::from(self)
    }
}

/// Serializable view of a [`BackupCycleResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub reference_time: i64,
    pub success: bool,
    pub created: bool,
    pub uploaded_artifact: Option<Artifact>,
    pub locally_removed: Vec<Artifact>,
    pub remotely_removed: Vec<RemoteArtifact>,
    pub stopped_at: Option<CycleStage>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl From<&BackupCycleResult> for CycleReport {
    fn from(result: &BackupCycleResult) -> Self {
        Self {
            reference_time: result.reference_time,
            success: result.is_success(),
            created: result.created,
            uploaded_artifact: result.uploaded_artifact.clone(),
            locally_removed: result.locally_removed.clone(),
            remotely_removed: result.remotely_removed.clone(),
            stopped_at: result.stopped_at,
            error_kind: result.error.as_ref().map(|e| e.kind().to_string()),
            error: result.error.as_ref().map(|e| e.to_string()),
        }
    }
}
