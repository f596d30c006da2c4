//! ProcessRunner - tokio::process による CommandRunner 実装
//!
//! stdout は捨て、stderr だけを集める。timeout を超えたら子プロセスを kill する
//! （`kill_on_drop` により、待機中の future を drop すると kill される）。

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::domain::CommandError;
use crate::ports::{CommandOutput, CommandRunner, CommandSpec};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Launch {
                program: spec.program.clone(),
                source,
            })?;

        let wait = child.wait_with_output();
        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(res) => res,
                Err(_) => {
                    return Err(CommandError::TimedOut {
                        program: spec.program.clone(),
                        timeout: limit,
                    });
                }
            },
            None => wait.await,
        }
        .map_err(|source| CommandError::Wait {
            program: spec.program.clone(),
            source,
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        })
    }
}
