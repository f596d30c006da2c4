//! backlab-core
//!
//! Retention and lifecycle engine for self-hosted service backups.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（artifact, timestamp, retention, cycle, errors）
//! - **ports**: 抽象化レイヤー（CommandRunner, LocalFilesystem, ObjectStore, Clock, SuffixGenerator）
//! - **impls**: ports の実装（本番用 + インメモリ）
//! - **app**: アプリケーションロジック（config, inventory, orchestrator, builder）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
