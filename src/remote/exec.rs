// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Remote command execution.
//!
//! Each command runs over its own short-lived connection, independent of
//! the long-lived file-transfer session, so command channels and SFTP
//! traffic never interleave on one transport.

use russh::client::{Config, Handle};
use russh::{ChannelMsg, Disconnect};

use crate::error::{Error, Result};
use crate::remote::Remote;
use crate::ssh::{ClientHandler, Session};

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// The stdout output of the command.
    pub stdout: String,
    /// The stderr output of the command.
    pub stderr: String,
    /// The unix exit status (`$?` in bash).
    pub exit_status: u32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

impl Remote {
    /// Run `command` on the target and wait for it to exit.
    ///
    /// No timeout is enforced here; a hung remote process blocks the
    /// calling step until it exits.
    ///
    /// On a non-zero exit status this returns [`Error::CommandFailed`]. If
    /// `log_path` was supplied, the diagnostic payload is the content of
    /// that remote file; otherwise it is the captured stderr. The
    /// connection is closed before returning on every path.
    pub async fn execute(
        &mut self,
        command: &str,
        log_path: Option<&str>,
    ) -> Result<CommandResult> {
        tracing::debug!(host = %self.target().host, %command, "executing remote command");

        let handle = Session::connect(self.target(), Config::default()).await?;
        let run_result = run_on_channel(&handle, command).await;
        if !handle.is_closed() {
            if let Err(e) = handle.disconnect(Disconnect::ByApplication, "", "").await {
                tracing::debug!(error = %e, "error closing command connection");
            }
        }
        let result = run_result?;

        tracing::debug!(
            host = %self.target().host,
            exit_status = result.exit_status,
            "remote command completed"
        );

        if result.success() {
            return Ok(result);
        }

        let output = match log_path {
            Some(path) => {
                tracing::debug!(host = %self.target().host, %path, "reading remote log");
                match self.read_file(path).await {
                    Ok(lines) => lines.join("\n"),
                    Err(e) => {
                        tracing::warn!(
                            %path,
                            error = %e,
                            "could not fetch remote log, falling back to captured stderr"
                        );
                        result.stderr.clone()
                    }
                }
            }
            None => result.stderr.clone(),
        };

        Err(Error::CommandFailed {
            host: self.target().host.clone(),
            command: command.to_string(),
            exit_code: result.exit_status,
            output,
            remote_log: log_path.map(str::to_string),
        })
    }
}

async fn run_on_channel(handle: &Handle<ClientHandler>, command: &str) -> Result<CommandResult> {
    let mut channel = handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
            // The exit status can arrive before the remaining output has
            // drained, so keep reading until the channel itself is done.
            ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
            _ => {}
        }
    }

    match exit_status {
        Some(exit_status) => Ok(CommandResult {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_status,
        }),
        None => Err(Error::CommandDidntExit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_exit_zero() {
        let result = CommandResult {
            stdout: "ok\n".to_string(),
            stderr: String::new(),
            exit_status: 0,
        };
        assert!(result.success());

        let failed = CommandResult {
            exit_status: 1,
            ..result
        };
        assert!(!failed.success());
    }
}
