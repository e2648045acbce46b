use crate::config::ConverterConfig;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Errors from invoking the external conversion tool
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The tool could not be started
    #[error("Failed to start converter: {0}")]
    Spawn(#[source] std::io::Error),

    /// The tool exited with a non-zero code
    #[error("Converter exited with code {0}")]
    ExitStatus(i32),

    /// The tool ran past the configured deadline
    #[error("Converter timed out after {0} seconds")]
    Timeout(u64),

    /// IO error while driving the tool
    #[error("IO error during conversion: {0}")]
    Io(#[from] std::io::Error),
}

/// Direction of one converter run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Pack,
    Unpack,
}

/// Seam around the external conversion tool
#[async_trait]
pub trait ItemConverter: Send + Sync {
    /// Runs the tool once in the given direction, resolving on exit code 0
    async fn run(&self, conversion: Conversion) -> Result<(), ConverterError>;
}

/// Shells out to xnbcli's pack/unpack commands in its install directory.
///
/// The tool sweeps its shared packed/ and unpacked/ directories on every
/// run, so runs are serialized behind a mutex; concurrent requests queue
/// here instead of having the tool process each other's files.
pub struct XnbCliConverter {
    root: PathBuf,
    pack_command: String,
    unpack_command: String,
    timeout_secs: u64,
    run_lock: Mutex<()>,
}

impl XnbCliConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            root: config.xnbcli_root.clone(),
            pack_command: config.pack_command.clone(),
            unpack_command: config.unpack_command.clone(),
            timeout_secs: config.convert_timeout_secs,
            run_lock: Mutex::new(()),
        }
    }

    async fn run_command(&self, command_line: &str) -> Result<(), ConverterError> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            ConverterError::Spawn(std::io::Error::new(
                ErrorKind::InvalidInput,
                "empty converter command line",
            ))
        })?;

        let mut child = Command::new(program)
            .args(parts)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ConverterError::Spawn)?;

        // Forward tool output to the service log as it arrives
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "xnbcli", "{}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "xnbcli", "{}", line);
                }
            });
        }

        let status = tokio::time::timeout(Duration::from_secs(self.timeout_secs), child.wait())
            .await
            .map_err(|_| ConverterError::Timeout(self.timeout_secs))??;

        if !status.success() {
            return Err(ConverterError::ExitStatus(status.code().unwrap_or(-1)));
        }

        Ok(())
    }
}

#[async_trait]
impl ItemConverter for XnbCliConverter {
    async fn run(&self, conversion: Conversion) -> Result<(), ConverterError> {
        let command_line = match conversion {
            Conversion::Pack => &self.pack_command,
            Conversion::Unpack => &self.unpack_command,
        };

        // One tool run at a time over the shared directories
        let _guard = self.run_lock.lock().await;

        info!("Running converter: {}", command_line);
        self.run_command(command_line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(command: &str, timeout_secs: u64) -> XnbCliConverter {
        XnbCliConverter::new(&ConverterConfig {
            xnbcli_root: PathBuf::from("."),
            pack_command: command.to_string(),
            unpack_command: command.to_string(),
            convert_timeout_secs: timeout_secs,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_zero_exit_resolves() {
        let result = converter("echo packing done", 5).run(Conversion::Pack).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_code() {
        let result = converter("false", 5).run(Conversion::Unpack).await;
        match result {
            Err(ConverterError::ExitStatus(code)) => assert_eq!(code, 1),
            other => panic!("expected ExitStatus error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_binary_is_spawn_error() {
        let result = converter("definitely-not-a-real-binary-xyz", 5)
            .run(Conversion::Pack)
            .await;
        assert!(matches!(result, Err(ConverterError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_empty_command_is_spawn_error() {
        let result = converter("", 5).run(Conversion::Pack).await;
        assert!(matches!(result, Err(ConverterError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_overdeadline_run_times_out() {
        let result = converter("sleep 30", 1).run(Conversion::Pack).await;
        assert!(matches!(result, Err(ConverterError::Timeout(1))));
    }
}
