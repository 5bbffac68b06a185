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

//! SSH connection management for one provisioning target.
//!
//! A [`Session`] owns at most one authenticated connection and one SFTP
//! channel derived from it. Liveness is checked before every reuse; a dead
//! transport is replaced wholesale, never patched up in place.

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Config, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::Disconnect;
use russh_sftp::client::SftpSession;

use crate::error::{Error, Result};
use crate::target::RemoteTarget;

/// Provisioning runs go quiet for minutes between polls; the server may
/// drop the transport in the meantime. A short inactivity timeout keeps
/// dead connections from lingering while the lazy reconnect in [`Session::sftp`]
/// makes the teardown invisible to callers.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// SSH client handler for provisioning targets.
///
/// Targets are freshly created machines with no prior known-hosts entry,
/// so the server key is accepted as presented.
#[derive(Debug, Clone)]
pub struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// The long-lived SSH connection and SFTP channel to a single target.
pub struct Session {
    target: RemoteTarget,
    handle: Option<Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
}

impl Session {
    /// Create a session. No connection is made until the first operation
    /// asks for one.
    pub fn new(target: RemoteTarget) -> Self {
        Self {
            target,
            handle: None,
            sftp: None,
        }
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    /// Open and authenticate a standalone connection to `target`.
    ///
    /// The command executor calls this directly so every command runs over
    /// its own short-lived connection and never contends with the
    /// file-transfer session.
    pub async fn connect(
        target: &RemoteTarget,
        config: Config,
    ) -> Result<Handle<ClientHandler>> {
        tracing::debug!(host = %target.host, port = target.port, "connecting to {target}");

        let mut handle = client::connect(
            Arc::new(config),
            (target.host.as_str(), target.port),
            ClientHandler,
        )
        .await?;

        let key = russh::keys::decode_secret_key(target.private_key(), None)?;
        let auth = handle
            .authenticate_publickey(
                &target.username,
                PrivateKeyWithHashAlg::new(
                    Arc::new(key),
                    handle.best_supported_rsa_hash().await?.flatten(),
                ),
            )
            .await?;
        if !auth.success() {
            return Err(Error::AuthenticationFailed {
                host: target.host.clone(),
                username: target.username.clone(),
            });
        }

        Ok(handle)
    }

    /// Return the live SFTP channel, connecting first if the session has
    /// never connected or the previous transport reports closed.
    pub async fn sftp(&mut self) -> Result<&mut SftpSession> {
        if self.is_closed() {
            self.force_reconnect().await?;
        } else if self.sftp.is_none() {
            self.open_sftp_channel().await?;
        }
        self.sftp.as_mut().ok_or(Error::ConnectionClosed)
    }

    /// Unconditionally tear down any existing transport and connect fresh.
    pub async fn force_reconnect(&mut self) -> Result<()> {
        self.close().await;
        let handle = Self::connect(&self.target, Self::transport_config()).await?;
        self.handle = Some(handle);
        self.open_sftp_channel().await
    }

    async fn open_sftp_channel(&mut self) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(Error::ConnectionClosed)?;

        tracing::debug!(host = %self.target.host, "opening SFTP channel");
        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        self.sftp = Some(sftp);
        Ok(())
    }

    fn transport_config() -> Config {
        Config {
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        }
    }

    /// True when there is no transport or the underlying connection has
    /// already been closed.
    pub fn is_closed(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_closed())
    }

    /// Close the transport. Failures here are only interesting for
    /// diagnostics; the next operation reconnects regardless.
    pub async fn close(&mut self) {
        self.sftp = None;
        if let Some(handle) = self.handle.take() {
            if !handle.is_closed() {
                if let Err(e) = handle.disconnect(Disconnect::ByApplication, "", "").await {
                    tracing::debug!(host = %self.target.host, error = %e, "error closing SSH transport");
                }
            }
        }
    }
}
