//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **OrchestratorBuilder**: orchestrator の構築とワイヤリング
//! - **LifecycleOrchestrator**: create → newest → upload → expire local → expire remote
//! - **LocalInventory / RemoteInventory**: ストレージ階層ごとの artifact 一覧
//! - **BacklabConfig**: engine が消費する設定

pub mod builder;
pub mod config;
pub mod inventory;
pub mod orchestrator;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, OrchestratorBuilder};
pub use self::config::{BacklabConfig, BucketSelection, ConfigError, Paging};
pub use self::inventory::{LocalInventory, RemoteInventory};
pub use self::orchestrator::{Expiry, LifecycleOrchestrator};
