//! External reverse-proxy reload.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}")]
    Status { program: String, status: ExitStatus },
}

/// Tells the reverse proxy to pick up the regenerated configuration.
#[async_trait]
pub trait Reloader: Send + Sync {
    async fn reload(&self) -> Result<(), ReloadError>;
}

/// Runs a configured command; its output goes to this process's stdout/stderr.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    argv: Vec<String>,
}

impl CommandReloader {
    /// An empty `argv` disables reloading.
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl Reloader for CommandReloader {
    async fn reload(&self) -> Result<(), ReloadError> {
        let Some((program, args)) = self.argv.split_first() else {
            tracing::debug!("No reload command configured, skipping reload");
            return Ok(());
        };

        tracing::info!(command = %self.argv.join(" "), "Reloading reverse proxy");

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| ReloadError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ReloadError::Status {
                program: program.clone(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_command_is_noop() {
        CommandReloader::new(Vec::new()).reload().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_program() {
        let reloader = CommandReloader::new(vec!["/nonexistent/proxy-reload".into()]);
        assert!(matches!(reloader.reload().await, Err(ReloadError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_checked() {
        CommandReloader::new(vec!["true".into()]).reload().await.unwrap();

        let failing = CommandReloader::new(vec!["false".into()]);
        assert!(matches!(failing.reload().await, Err(ReloadError::Status { .. })));
    }
}
