//! CommandRunner port - 外部プロセスの実行
//!
//! バックアップの作成は外部コマンド（既定: `gitlab-rake gitlab:backup:create`）に任せる。
//! engine は exit status だけを見る。stdout は解釈しない。stderr はエラー報告用に保持する。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::domain::CommandError;

/// Program plus fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `gitlab-rake gitlab:backup:create`
    pub fn gitlab_backup() -> Self {
        Self::new("gitlab-rake", ["gitlab:backup:create"])
    }

    /// Split a whitespace-separated command line. Returns `None` for a blank line.
    ///
    /// No quoting rules: arguments containing spaces are not supported here.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self::gitlab_backup()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What the engine keeps from a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// CommandRunner は外部コマンドを実行して終了を待つ
///
/// `timeout` が `None` なら無期限に待つ。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_program_and_args() {
        let spec = CommandSpec::parse("  gitlab-rake   gitlab:backup:create SKIP=db ").unwrap();
        assert_eq!(spec.program, "gitlab-rake");
        assert_eq!(spec.args, vec!["gitlab:backup:create", "SKIP=db"]);
        assert_eq!(spec.to_string(), "gitlab-rake gitlab:backup:create SKIP=db");
    }

    #[test]
    fn parse_rejects_blank() {
        assert_eq!(CommandSpec::parse("   "), None);
    }

    #[test]
    fn default_is_gitlab_rake() {
        assert_eq!(CommandSpec::default().to_string(), "gitlab-rake gitlab:backup:create");
    }
}
