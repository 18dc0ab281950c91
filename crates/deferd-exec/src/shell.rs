use std::{io, path::PathBuf};

use async_trait::async_trait;
use deferd_core::{CommandRunner, RunOutput, RunnerError};
use tracing::{debug, trace};

use crate::{
    error::{ExecError, ExecResult},
    util::{decode, shell_command},
};

/// Runs a command line through the platform shell and captures its output.
///
/// The child is awaited to completion; it is never interrupted once spawned.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    name: &'static str,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            name: "shell",
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    async fn exec(&self, command_line: &str) -> ExecResult<RunOutput> {
        if command_line.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let mut cmd = shell_command(command_line);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        trace!(target: "deferd.exec.shell", command = %command_line, "spawn");
        let output = cmd.output().await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                ExecError::Spawn(e.to_string())
            }
            _ => ExecError::from(e),
        })?;

        let exit_code = output.status.code();
        match exit_code {
            Some(0) => debug!(target: "deferd.exec.shell", "exit success"),
            Some(code) => debug!(target: "deferd.exec.shell", code, "exit non-zero"),
            None => debug!(target: "deferd.exec.shell", "terminated by signal"),
        }

        Ok(RunOutput {
            stdout: decode(output.stdout),
            stderr: decode(output.stderr),
            exit_code,
        })
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, command_line: &str) -> Result<RunOutput, RunnerError> {
        Ok(self.exec(command_line).await?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_captures_stdout() {
        let out = ShellRunner::new().run("echo hi").await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hi\n");
        assert!(out.stderr.is_empty());
    }

    #[tokio::test]
    async fn missing_path_is_a_non_zero_exit() {
        let out = ShellRunner::new()
            .run("ls /definitely/not/here")
            .await
            .unwrap();
        assert!(!out.success());
        assert_ne!(out.exit_code, Some(0));
        assert!(!out.stderr.is_empty());
    }

    #[tokio::test]
    async fn exit_code_is_preserved() {
        let out = ShellRunner::new().run("exit 3").await.unwrap();
        assert_eq!(out.exit_code, Some(3));
    }

    #[tokio::test]
    async fn cwd_and_env_are_applied() {
        let runner = ShellRunner::new()
            .with_cwd("/")
            .with_env("DEFERD_PROBE", "42");
        assert_eq!(runner.run("pwd").await.unwrap().stdout, "/\n");
        assert_eq!(runner.run("echo $DEFERD_PROBE").await.unwrap().stdout, "42\n");
    }

    #[tokio::test]
    async fn blank_command_is_refused() {
        let err = ShellRunner::new().run("  ").await.unwrap_err();
        assert_eq!(err, RunnerError::Spawn("empty command line".into()));
    }
}
