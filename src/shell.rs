//! Ad-hoc external command execution for build tasks.

use tokio::process::Command;
use tracing::warn;

use crate::task::TaskError;

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Run `command` through the platform shell and capture its standard output.
///
/// Non-empty standard error is logged as a diagnostic but does not fail the
/// call. A non-zero exit fails with [`TaskError::Command`]; a spawn failure
/// surfaces as [`TaskError::Spawn`].
pub async fn exec(command: &str) -> Result<String, TaskError> {
    let output = shell_command(command)
        .output()
        .await
        .map_err(|source| TaskError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        warn!(command, stderr = %stderr.trim(), "command wrote to stderr");
    }
    if !output.status.success() {
        return Err(TaskError::Command {
            command: command.to_string(),
            status: output.status,
            stderr: stderr.into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
