use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backlab_core::app::{
    BacklabConfig, BucketSelection, LifecycleOrchestrator, OrchestratorBuilder, Paging,
};
use backlab_core::app::config::{DEFAULT_BACKUP_PATH, DEFAULT_PAGE_SIZE};
use backlab_core::domain::BacklabError;
use backlab_core::impls::DirectoryObjectStore;
use backlab_core::ports::CommandSpec;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Back up a GitLab instance and keep local and remote backups within a retention window.
#[derive(Debug, Parser)]
#[command(name = "backlab", version)]
struct Cli {
    /// Directory the backup command writes artifacts to.
    #[arg(long, env = "BACKLAB_BACKUP_PATH", default_value = DEFAULT_BACKUP_PATH, global = true)]
    backup_path: PathBuf,

    /// Root directory of the versioned object store (one sub-directory per bucket).
    /// Required by `run`, `upload`, `prune-remote` and `list-remote`.
    #[arg(long, env = "BACKLAB_STORE_ROOT", global = true)]
    store_root: Option<PathBuf>,

    /// Bucket to upload to. Without it a new bucket is created on every run.
    #[arg(long, env = "BACKLAB_BUCKET", global = true)]
    bucket: Option<String>,

    /// Keep backups for this many seconds. 0 keeps everything.
    #[arg(long, env = "BACKLAB_PRESERVE_FOR", default_value_t = 0, global = true)]
    preserve_for: i64,

    /// Command that creates a backup.
    #[arg(
        long,
        env = "BACKLAB_CREATE_COMMAND",
        default_value = "gitlab-rake gitlab:backup:create",
        global = true
    )]
    create_command: String,

    /// Give up on the backup command after this many seconds.
    #[arg(long, env = "BACKLAB_CREATION_TIMEOUT", global = true)]
    creation_timeout: Option<u64>,

    /// Remote listing page size.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, global = true)]
    page_size: usize,

    /// Stop remote listing after this many pages.
    #[arg(long, global = true)]
    max_pages: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create, upload and expire: one full backup cycle.
    Run,
    /// Only run the backup command.
    Create,
    /// Upload a file, or the newest local artifact when no path is given.
    Upload { path: Option<PathBuf> },
    /// Remove expired local artifacts.
    PruneLocal,
    /// Delete expired remote artifact versions.
    PruneRemote,
    /// List local artifacts.
    ListLocal,
    /// List remote artifact versions.
    ListRemote,
}

impl Commands {
    fn uses_store(&self) -> bool {
        !matches!(self, Self::Create | Self::PruneLocal | Self::ListLocal)
    }
}

impl Cli {
    fn config(&self) -> Result<BacklabConfig> {
        let create_command =
            CommandSpec::parse(&self.create_command).context("--create-command is empty")?;
        Ok(BacklabConfig::new(&self.backup_path)
            .with_bucket(BucketSelection::from_name(self.bucket.clone()))
            .with_preserve_for(self.preserve_for)
            .with_create_command(create_command)
            .with_creation_timeout(self.creation_timeout.map(Duration::from_secs))
            .with_paging(Paging {
                page_size: self.page_size,
                max_pages: self.max_pages,
            }))
    }

    fn orchestrator(&self) -> Result<LifecycleOrchestrator> {
        let builder = OrchestratorBuilder::new(self.config()?);
        let built = if self.command.uses_store() {
            let store_root = self
                .store_root
                .clone()
                .context("--store-root (or BACKLAB_STORE_ROOT) is required")?;
            builder
                .store(Arc::new(DirectoryObjectStore::new(store_root)))
                .build()
        } else {
            builder.build_local()
        };
        built.context("invalid backlab configuration")
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a failed step as JSON and turn it into a non-zero exit.
fn report_failure(err: &BacklabError) -> Result<ExitCode> {
    tracing::error!(kind = err.kind(), error = %err, "step failed");
    print_json(&json!({ "success": false, "error_kind": err.kind(), "error": err.to_string() }))?;
    Ok(ExitCode::FAILURE)
}

async fn execute(command: Commands, orchestrator: &LifecycleOrchestrator) -> Result<ExitCode> {
    match command {
        Commands::Run => {
            let result = orchestrator.run_cycle().await;
            print_json(&result.report())?;
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Create => match orchestrator.create_backup().await {
            Ok(()) => {
                print_json(&json!({ "success": true, "created": true }))?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => report_failure(&err),
        },
        Commands::Upload { path } => {
            let uploaded = match path {
                Some(path) => orchestrator.upload_file(&path).await,
                None => match orchestrator.newest_local_artifact().await {
                    Ok(newest) => orchestrator.upload_artifact(&newest).await,
                    Err(err) => Err(err),
                },
            };
            match uploaded {
                Ok(handle) => {
                    print_json(&json!({
                        "success": true,
                        "name": handle.name,
                        "version_id": handle.version_id,
                        "size": handle.size,
                    }))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => report_failure(&err),
            }
        }
        Commands::PruneLocal => {
            let expiry = orchestrator.expire_local().await;
            print_json(&json!({
                "success": expiry.error.is_none(),
                "removed": expiry.removed,
                "error": expiry.error.as_ref().map(|e| e.to_string()),
            }))?;
            Ok(if expiry.error.is_none() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::PruneRemote => {
            let expiry = orchestrator.expire_remote().await;
            print_json(&json!({
                "success": expiry.error.is_none(),
                "removed": expiry.removed,
                "error": expiry.error.as_ref().map(|e| e.to_string()),
            }))?;
            Ok(if expiry.error.is_none() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::ListLocal => match orchestrator.list_local().await {
            Ok(artifacts) => {
                print_json(&artifacts)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => report_failure(&err),
        },
        Commands::ListRemote => match orchestrator.list_remote().await {
            Ok(artifacts) => {
                print_json(&artifacts)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => report_failure(&err),
        },
    }
}

fn main() -> Result<ExitCode> {
    // logs go to stderr, stdout carries the JSON report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let orchestrator = cli.orchestrator()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(execute(cli.command, &orchestrator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use backlab_core::domain::RetentionPolicy;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "backlab",
            "--backup-path",
            "/srv/backups",
            "--bucket",
            "gitlab",
            "--preserve-for",
            "604800",
            "--creation-timeout",
            "3600",
            "--max-pages",
            "4",
            "run",
        ])
        .unwrap();

        let config = cli.config().unwrap();
        assert_eq!(config.backup_path, PathBuf::from("/srv/backups"));
        assert_eq!(config.bucket, BucketSelection::Named("gitlab".into()));
        assert_eq!(config.retention(), RetentionPolicy::PreserveFor(604_800));
        assert_eq!(config.creation_timeout, Some(Duration::from_secs(3600)));
        assert_eq!(config.paging.max_pages, Some(4));
        assert_eq!(config.create_command, CommandSpec::gitlab_backup());
    }

    #[test]
    fn upload_takes_optional_path() {
        let cli = Cli::try_parse_from(["backlab", "upload", "/tmp/1700000000-x.tar"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { path: Some(_) }));

        let cli = Cli::try_parse_from(["backlab", "upload"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { path: None }));
    }

    #[test]
    fn local_commands_run_without_store_root() {
        for command in ["create", "prune-local", "list-local"] {
            let cli = Cli::try_parse_from(["backlab", "--backup-path", "/srv/backups", command]).unwrap();
            assert!(!cli.command.uses_store());
            assert!(cli.orchestrator().is_ok(), "{command}");
        }
    }

    #[test]
    fn store_commands_need_store_root() {
        for command in ["run", "upload", "prune-remote", "list-remote"] {
            let mut cli = Cli::try_parse_from(["backlab", command]).unwrap();
            cli.store_root = None;
            assert!(cli.command.uses_store());
            let err = cli.orchestrator().err().unwrap();
            assert!(err.to_string().contains("--store-root"), "{command}: {err}");
        }

        let cli = Cli::try_parse_from(["backlab", "--store-root", "/mnt/store", "run"]).unwrap();
        assert!(cli.orchestrator().is_ok());
    }

    #[test]
    fn zero_max_pages_is_rejected() {
        let cli = Cli::try_parse_from(["backlab", "--max-pages", "0", "list-local"]).unwrap();
        assert!(cli.orchestrator().is_err());
    }
}
