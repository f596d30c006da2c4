//! Impls - ports の実装
//!
//! # 本番用
//! - **ProcessRunner**: tokio::process による外部コマンド実行
//! - **TokioFilesystem**: tokio::fs によるローカル fs
//! - **DirectoryObjectStore**: マウントされたディレクトリ上のバージョン付きストア
//!
//! # 開発・テスト用
//! - **InMemoryFilesystem** / **InMemoryObjectStore**: 失敗注入つきのインメモリ実装
//! - **ScriptedCommandRunner**: プロセスを起動しない CommandRunner

pub mod dir_store;
pub mod inmem_fs;
pub mod inmem_store;
pub mod process_runner;
pub mod scripted_runner;
pub mod tokio_fs;

// 主要な型を再エクスポート
pub use self::dir_store::DirectoryObjectStore;
pub use self::inmem_fs::InMemoryFilesystem;
pub use self::inmem_store::InMemoryObjectStore;
pub use self::process_runner::ProcessRunner;
pub use self::scripted_runner::ScriptedCommandRunner;
pub use self::tokio_fs::TokioFilesystem;
