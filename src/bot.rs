/// Bot process launch: spawn the configured executable with the
/// supervisor's own stdio, and map its termination to an exit code.
use crate::config::BotConfig;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

/// Failed to spawn the bot executable (not found, not executable, ...).
#[derive(Debug)]
pub struct SpawnError {
    pub command: String,
    pub source: std::io::Error,
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to spawn bot `{}`: {}", self.command, self.source)
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Spawn the bot. Stdio, environment and working directory are all
/// inherited, so the child behaves as if it were the top-level process.
pub fn spawn(bot: &BotConfig) -> Result<Child, SpawnError> {
    tracing::debug!(command = %bot.command, args = ?bot.args, "spawning bot");

    let child = Command::new(&bot.command)
        .args(&bot.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| SpawnError {
            command: bot.command.clone(),
            source: e,
        })?;

    tracing::debug!(pid = ?child.id(), "bot process started");
    Ok(child)
}

/// Exit code to mirror for a finished child. No numeric code (killed by a
/// signal) maps to 0.
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => {
            if let Some(signal) = status.signal() {
                tracing::warn!(signal, "bot terminated by signal, reporting exit code 0");
            }
            0
        }
    }
}
