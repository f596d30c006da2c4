//! ScriptedCommandRunner - テスト用の CommandRunner
//!
//! 実プロセスを起動せず、あらかじめ設定した結果を返す。

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::CommandError;
use crate::ports::{CommandOutput, CommandRunner, CommandSpec};

#[derive(Debug, Clone)]
enum Script {
    Exit(CommandOutput),
    LaunchFailure,
    TimeOut,
}

pub struct ScriptedCommandRunner {
    script: Script,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedCommandRunner {
    pub fn succeeding() -> Self {
        Self::exiting(CommandOutput::success())
    }

    pub fn exiting(output: CommandOutput) -> Self {
        Self {
            script: Script::Exit(output),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Behave as if the program could not be found.
    pub fn unlaunchable() -> Self {
        Self {
            script: Script::LaunchFailure,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Behave as if the program outlived the timeout.
    pub fn hanging() -> Self {
        Self {
            script: Script::TimeOut,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedCommandRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        match &self.script {
            Script::Exit(output) => Ok(output.clone()),
            Script::LaunchFailure => Err(CommandError::Launch {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            }),
            Script::TimeOut => Err(CommandError::TimedOut {
                program: spec.program.clone(),
                timeout: timeout.unwrap_or_default(),
            }),
        }
    }
}
