//! Retention policy - 期限切れ判定
//!
//! 判定はすべて「orchestrator 構築時に一度だけ取得した基準時刻」に対して行う。
//! artifact ごとに現在時刻を取り直さないので、1 回の実行内の判定は一貫する。

use serde::{Deserialize, Serialize};

/// Whether an artifact created at `artifact_timestamp` is expired at `reference_time`.
///
/// Expired iff `artifact_timestamp <= reference_time - preserve_for`.
/// This is the raw rule: `preserve_for == 0` expires everything created up to now,
/// negative values push the threshold into the future. Use [`RetentionPolicy`]
/// for the "zero means keep forever" behaviour.
pub fn is_expired(artifact_timestamp: i64, reference_time: i64, preserve_for: i64) -> bool {
    artifact_timestamp <= reference_time.saturating_sub(preserve_for)
}

/// RetentionPolicy は保持期間の設定
///
/// # preserve_for == 0 の扱い
/// 0 は「削除しない」。`from_seconds(0)` は `Disabled` になる。
/// 負の値は設定読み込み時（`BacklabConfig::validate`）に拒否する。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never expire anything.
    #[default]
    Disabled,
    /// Expire artifacts older than this many seconds.
    PreserveFor(i64),
}

impl RetentionPolicy {
    pub fn from_seconds(preserve_for: i64) -> Self {
        if preserve_for == 0 {
            Self::Disabled
        } else {
            Self::PreserveFor(preserve_for)
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::PreserveFor(_))
    }

    /// `reference_time - preserve_for`, or `None` when nothing can expire.
    pub fn threshold(&self, reference_time: i64) -> Option<i64> {
        match self {
            Self::Disabled => None,
            Self::PreserveFor(secs) => Some(reference_time.saturating_sub(*secs)),
        }
    }

    pub fn is_expired(&self, artifact_timestamp: i64, reference_time: i64) -> bool {
        match self {
            Self::Disabled => false,
            Self::PreserveFor(secs) => is_expired(artifact_timestamp, reference_time, *secs),
        }
    }
}
