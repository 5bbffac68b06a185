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

//! Remote file operations over the long-lived SFTP channel.
//!
//! Every operation here runs under the connection guard with
//! `retry_on_transport_error` set: these calls are issued over and over
//! during a multi-step run and a single network blip should not fail the
//! whole operation.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags, StatusCode};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};
use crate::remote::Remote;
use crate::ssh::GuardPolicy;

/// Upload chunk size in bytes. Larger chunks have been observed to tear the
/// channel down mid-transfer with end-of-stream errors, so the size stays
/// conservative.
// TODO: raise this to 32768 once the EOF failures seen with larger chunks
// are understood.
const UPLOAD_CHUNK_SIZE: usize = 10_000;

impl Remote {
    /// Create `path` on the remote host.
    ///
    /// Permission denied is fatal. Any other failure status is logged and
    /// treated as success on the assumption that the directory already
    /// exists and is usable.
    pub async fn mkdir(&mut self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.session_mut()
            .guarded(GuardPolicy::retrying(), move |session| {
                let path = path.clone();
                Box::pin(async move {
                    let host = session.target().host.clone();
                    let sftp = session.sftp().await?;
                    match sftp.create_dir(&path).await {
                        Ok(()) => Ok(()),
                        Err(SftpError::Status(status)) => {
                            if status.status_code == StatusCode::PermissionDenied {
                                tracing::warn!(%host, %path, "permission denied creating remote directory");
                                Err(Error::PermissionDenied { host, path })
                            } else {
                                tracing::warn!(
                                    %host,
                                    %path,
                                    status = %status.error_message,
                                    "remote directory creation failed, assuming it already exists"
                                );
                                Ok(())
                            }
                        }
                        Err(e) => Err(e.into()),
                    }
                })
            })
            .await
    }

    /// Write `data` to `path`, optionally setting the file mode afterwards.
    /// The remote handle is closed even when the write fails.
    pub async fn write_file(&mut self, path: &str, data: &[u8], mode: Option<u32>) -> Result<()> {
        let path = path.to_string();
        let data = data.to_vec();
        self.session_mut()
            .guarded(GuardPolicy::retrying(), move |session| {
                let path = path.clone();
                let data = data.clone();
                Box::pin(async move {
                    tracing::debug!(host = %session.target().host, %path, "writing remote file");
                    let sftp = session.sftp().await?;
                    let mut file = sftp
                        .open_with_flags(
                            &path,
                            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
                        )
                        .await?;
                    let write_result = async {
                        file.write_all(&data).await?;
                        file.flush().await?;
                        Ok::<(), std::io::Error>(())
                    }
                    .await;
                    let close_result = file.shutdown().await;
                    write_result?;
                    close_result?;

                    if let Some(mode) = mode {
                        let attrs = FileAttributes {
                            permissions: Some(mode),
                            ..Default::default()
                        };
                        sftp.set_metadata(&path, attrs).await?;
                    }
                    Ok(())
                })
            })
            .await
    }

    /// Serialize `value` as JSON and write it to `path`.
    pub async fn write_json<T: Serialize + ?Sized>(&mut self, path: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string(value)?;
        self.write_file(path, data.as_bytes(), None).await
    }

    /// Read the remote file at `path` and return its lines.
    pub async fn read_file(&mut self, path: &str) -> Result<Vec<String>> {
        let path = path.to_string();
        self.session_mut()
            .guarded(GuardPolicy::retrying(), move |session| {
                let path = path.clone();
                Box::pin(async move {
                    let sftp = session.sftp().await?;
                    let file = sftp.open_with_flags(&path, OpenFlags::READ).await?;
                    let mut lines = Vec::new();
                    let mut reader = BufReader::new(file).lines();
                    while let Some(line) = reader.next_line().await? {
                        lines.push(line);
                    }
                    Ok(lines)
                })
            })
            .await
    }

    /// Stream a local file to `remote_path` in fixed-size chunks.
    pub async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> Result<()> {
        let local_path = local_path.to_path_buf();
        let remote_path = remote_path.to_string();
        self.session_mut()
            .guarded(GuardPolicy::retrying(), move |session| {
                let local_path = local_path.clone();
                let remote_path = remote_path.clone();
                Box::pin(async move {
                    tracing::debug!(
                        host = %session.target().host,
                        local = %local_path.display(),
                        remote = %remote_path,
                        "uploading file"
                    );
                    let sftp = session.sftp().await?;
                    upload_chunked(sftp, &local_path, &remote_path).await
                })
            })
            .await
    }

    /// Recursively mirror the contents of a local directory under
    /// `remote_base`, creating remote directories as needed.
    pub async fn upload_tree(&mut self, local_path: &Path, remote_base: &str) -> Result<()> {
        let local_path = local_path.to_path_buf();
        let remote_base = remote_base.to_string();
        self.session_mut()
            .guarded(GuardPolicy::retrying(), move |session| {
                let local_path = local_path.clone();
                let remote_base = remote_base.clone();
                Box::pin(async move {
                    tracing::debug!(
                        host = %session.target().host,
                        local = %local_path.display(),
                        remote = %remote_base,
                        "uploading directory tree"
                    );
                    let sftp = session.sftp().await?;
                    upload_tree_inner(sftp, local_path, remote_base).await
                })
            })
            .await
    }
}

async fn upload_chunked(sftp: &SftpSession, local_path: &Path, remote_path: &str) -> Result<()> {
    let mut local = tokio::fs::File::open(local_path).await?;
    let mut remote = sftp
        .open_with_flags(
            remote_path,
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
        )
        .await?;

    let copy_result = async {
        let mut chunk = vec![0u8; UPLOAD_CHUNK_SIZE];
        loop {
            let n = local.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            remote.write_all(&chunk[..n]).await?;
        }
        remote.flush().await?;
        Ok::<(), std::io::Error>(())
    }
    .await;
    let close_result = remote.shutdown().await;
    copy_result?;
    close_result?;
    Ok(())
}

fn upload_tree_inner(
    sftp: &SftpSession,
    local_dir: PathBuf,
    remote_dir: String,
) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        // Creation failure usually means the directory is already there;
        // a missing directory fails the first upload into it anyway.
        if let Err(e) = sftp.create_dir(&remote_dir).await {
            tracing::debug!(remote = %remote_dir, error = %e, "remote directory not created");
        }

        let mut entries = tokio::fs::read_dir(&local_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == "." || name == ".." {
                continue;
            }

            let remote_path = format!("{remote_dir}/{name}");
            let metadata = entry.metadata().await?;

            if metadata.is_dir() {
                upload_tree_inner(sftp, entry.path(), remote_path).await?;
            } else if metadata.is_file() {
                upload_chunked(sftp, &entry.path(), &remote_path).await?;
            }
        }

        Ok(())
    })
}
