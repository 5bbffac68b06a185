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

//! Error types for remote provisioning operations.

use thiserror::Error;

use crate::runner::RunnerError;

/// Error type for provisioning operations
#[derive(Debug, Error)]
pub enum Error {
    /// SSH error from russh
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SFTP error from russh-sftp
    #[error("SFTP error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),

    /// Invalid or unusable private key
    #[error("invalid private key: {0}")]
    Key(#[from] russh::keys::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The target rejected the supplied credentials
    #[error("authentication failed for {username}@{host}")]
    AuthenticationFailed { host: String, username: String },

    /// Directory creation was denied
    #[error("permission denied creating {path} on {host}")]
    PermissionDenied { host: String, path: String },

    /// A remote command exited non-zero
    #[error(
        "host: {host}\ncommand: {command}\nexit code: {exit_code}\nremote log: {remote_log:?}\noutput:\n{output}"
    )]
    CommandFailed {
        host: String,
        command: String,
        exit_code: u32,
        output: String,
        remote_log: Option<String>,
    },

    /// The command channel drained without reporting an exit status
    #[error("remote command exited without reporting a status")]
    CommandDidntExit,

    /// Operation attempted on a session with no usable transport
    #[error("SSH session is closed")]
    ConnectionClosed,

    /// Task runner driven outside its start/step/done contract
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

impl Error {
    /// Whether this failure is a transient transport fault.
    ///
    /// Transport faults (session-level SSH errors, unexpected end-of-stream,
    /// SFTP protocol breakdowns) are the only class the connection guard will
    /// retry after a reconnect. An SFTP status reply is a real answer from
    /// the remote server, not a transport fault.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Ssh(_) => true,
            Self::Sftp(russh_sftp::client::error::Error::Status(_)) => false,
            Self::Sftp(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_is_transport() {
        let err = Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(err.is_transport());
    }

    #[test]
    fn other_io_errors_are_not_transport() {
        let err = Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(!err.is_transport());
    }

    #[test]
    fn command_failure_is_not_transport() {
        let err = Error::CommandFailed {
            host: "10.0.0.1".to_string(),
            command: "true".to_string(),
            exit_code: 1,
            output: String::new(),
            remote_log: None,
        };
        assert!(!err.is_transport());
    }

    #[test]
    fn command_failure_display_carries_context() {
        let err = Error::CommandFailed {
            host: "10.0.0.1".to_string(),
            command: "./deploy.sh > /srv/deploy.log 2>&1".to_string(),
            exit_code: 2,
            output: "missing dependency".to_string(),
            remote_log: Some("/srv/deploy.log".to_string()),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("10.0.0.1"));
        assert!(rendered.contains("deploy.sh"));
        assert!(rendered.contains("exit code: 2"));
        assert!(rendered.contains("missing dependency"));
        assert!(rendered.contains("/srv/deploy.log"));
    }
}
