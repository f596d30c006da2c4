//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（外部コマンド、ローカル fs、オブジェクトストレージ）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! orchestrator はこれらの trait だけに依存するので、
//! テストでは impls のインメモリ実装に差し替えられます。

pub mod clock;
pub mod command_runner;
pub mod filesystem;
pub mod object_store;
pub mod suffix;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::command_runner::{CommandOutput, CommandRunner, CommandSpec};
pub use self::filesystem::{ContentReader, DirEntry, LocalFilesystem};
pub use self::object_store::{
    Bucket, ObjectHandle, ObjectStore, ObjectVersion, PageCursor, VersionPage, Visibility,
};
pub use self::suffix::{FixedSuffix, RandomSuffix, SuffixGenerator};
