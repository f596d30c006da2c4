//! Domain model (artifacts, timestamps, retention, cycle results, errors).
//!
//! すべて値オブジェクト。実行ごとに作られ、永続化される状態は持たない。

pub mod artifact;
pub mod cycle;
pub mod errors;
pub mod retention;
pub mod timestamp;

pub use artifact::{Artifact, LocalArtifact, ObjectVersionId, RemoteArtifact};
pub use cycle::{BackupCycleResult, CycleReport, CycleStage};
pub use errors::{BacklabError, CommandError, StorageError};
pub use retention::{RetentionPolicy, is_expired};
pub use timestamp::{ArtifactNameParser, EpochPrefixParser, ParseError, parse_timestamp};
