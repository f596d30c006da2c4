//! Artifact - バックアップ snapshot の値オブジェクト
//!
//! すべて実行ごとに新しく作られる値。実行をまたいで保持される状態はない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A backup snapshot: its tier-specific name plus the creation time encoded in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    /// File name locally, object key remotely.
    pub name: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
}

impl Artifact {
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.timestamp)
    }
}

/// LocalArtifact はディスク上の artifact（絶対パス付き）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalArtifact {
    pub artifact: Artifact,
    pub path: PathBuf,
}

impl LocalArtifact {
    pub fn name(&self) -> &str {
        &self.artifact.name
    }

    pub fn timestamp(&self) -> i64 {
        self.artifact.timestamp
    }
}

/// Opaque identifier of one stored version of a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectVersionId(String);

impl ObjectVersionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RemoteArtifact はバケット上の artifact の 1 バージョン
///
/// 同じ名前に複数バージョンが存在しうるので、削除は (name, version_id) で行う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtifact {
    pub artifact: Artifact,
    pub version_id: ObjectVersionId,
}

impl RemoteArtifact {
    pub fn name(&self) -> &str {
        &self.artifact.name
    }

    pub fn timestamp(&self) -> i64 {
        self.artifact.timestamp
    }
}

impl fmt::Display for RemoteArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (version {})", self.artifact, self.version_id)
    }
}
