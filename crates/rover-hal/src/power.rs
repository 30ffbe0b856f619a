//! Host power-off.
//!
//! [`HostPowerOff`] starts the configured halt command as a child process and
//! returns immediately.  A detached thread collects the command's output for
//! the log; nobody waits on it, because a successful halt takes the process
//! down with the host.

use std::process::{Command, Stdio};
use std::thread;

use rover_types::RoverError;
use tracing::{error, info, warn};

/// Something that can power the host off.
pub trait ShutdownAction: Send + Sync {
    /// Request a power-off without waiting for it to happen.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Shutdown`] when the request could not even be
    /// issued (e.g. the halt program is missing).  Callers log and carry on.
    fn power_off(&self) -> Result<(), RoverError>;
}

/// Default halt command of a Raspberry Pi style controller.
pub const DEFAULT_HALT_COMMAND: [&str; 3] = ["/bin/bash", "-c", "sudo halt"];

/// Runs a halt command on the host.
#[derive(Debug, Clone)]
pub struct HostPowerOff {
    program: String,
    args: Vec<String>,
}

impl HostPowerOff {
    /// Build from a full command line: the first element is the program, the
    /// rest are its arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Config`] if `command` is empty.
    pub fn from_command<S: AsRef<str>>(command: &[S]) -> Result<Self, RoverError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| RoverError::Config("shutdown command must not be empty".into()))?;
        Ok(Self {
            program: program.as_ref().to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
        })
    }

    /// The program that will be started.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for HostPowerOff {
    fn default() -> Self {
        Self {
            program: DEFAULT_HALT_COMMAND[0].to_string(),
            args: DEFAULT_HALT_COMMAND[1..].iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl ShutdownAction for HostPowerOff {
    fn power_off(&self) -> Result<(), RoverError> {
        info!(program = %self.program, args = ?self.args, "invoking host power-off");
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RoverError::Shutdown(format!("failed to start {}: {e}", self.program)))?;

        let program = self.program.clone();
        let spawned = thread::Builder::new()
            .name("power-off-output".into())
            .spawn(move || match child.wait_with_output() {
                Ok(output) => log_output(&program, &output),
                Err(e) => warn!(program = %program, error = %e, "could not collect power-off output"),
            });
        if let Err(e) = spawned {
            // The command is already running; only its output is lost.
            warn!(error = %e, "could not start power-off output collector");
        }
        Ok(())
    }
}

fn log_output(program: &str, output: &std::process::Output) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        info!(program, stdout = %stdout.trim(), "power-off command finished");
    } else {
        error!(
            program,
            status = %output.status,
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "power-off command failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_is_sudo_halt() {
        let power = HostPowerOff::default();
        assert_eq!(power.program(), "/bin/bash");
        assert_eq!(power.args, vec!["-c".to_string(), "sudo halt".to_string()]);
    }

    #[test]
    fn empty_command_is_a_config_error() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            HostPowerOff::from_command(&empty),
            Err(RoverError::Config(_))
        ));
    }

    #[test]
    fn missing_program_reports_shutdown_error() {
        let power = HostPowerOff::from_command(&["/nonexistent/rover-halt"]).unwrap();
        assert!(matches!(power.power_off(), Err(RoverError::Shutdown(_))));
    }

    #[cfg(unix)]
    #[test]
    fn harmless_command_returns_without_waiting() {
        let power = HostPowerOff::from_command(&["/bin/sh", "-c", "echo halted"]).unwrap();
        assert!(power.power_off().is_ok());
    }
}
