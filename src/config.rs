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

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote base directory under which provisioning runs stage their
    /// scripts and payloads.
    pub staging_dir: String,

    /// When set, connection details (host and private key) are written to
    /// this local directory on handle construction. Troubleshooting only;
    /// leave unset in normal operation.
    pub debug_connection_dir: Option<PathBuf>,

    /// Tick interval for the polling loop that drives a provisioning
    /// sequence forward, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            staging_dir: "/tmp/bstrap".to_string(),
            debug_connection_dir: None,
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // Expand tilde in path
        let expanded_path = expand_tilde(path);

        if !expanded_path.exists() {
            tracing::debug!(
                "Config file not found at {:?}, using defaults",
                expanded_path
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&expanded_path)
            .await
            .with_context(|| format!("Failed to read configuration file at {expanded_path:?}. Please check file permissions and ensure the file is accessible."))?;

        let config: Config = serde_yaml::from_str(&content).with_context(|| {
            format!("Failed to parse YAML configuration file at {expanded_path:?}. Please check the YAML syntax is valid.")
        })?;

        Ok(config)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let scratch = tempfile::tempdir().unwrap();
        let config = Config::load(&scratch.path().join("nope.yaml")).await.unwrap();
        assert_eq!(config.staging_dir, "/tmp/bstrap");
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(config.debug_connection_dir.is_none());
    }

    #[tokio::test]
    async fn partial_file_keeps_defaults_for_the_rest() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("config.yaml");
        std::fs::write(&path, "staging_dir: /srv/stage\n").unwrap();

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.staging_dir, "/srv/stage");
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[tokio::test]
    async fn full_file_is_honored() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("config.yaml");
        std::fs::write(
            &path,
            "staging_dir: /srv/stage\ndebug_connection_dir: /tmp/debug\npoll_interval_ms: 250\n",
        )
        .unwrap();

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.staging_dir, "/srv/stage");
        assert_eq!(
            config.debug_connection_dir,
            Some(PathBuf::from("/tmp/debug"))
        );
        assert_eq!(config.poll_interval_ms, 250);
    }

    #[tokio::test]
    async fn invalid_yaml_is_an_error() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("config.yaml");
        std::fs::write(&path, "staging_dir: [unterminated\n").unwrap();

        assert!(Config::load(&path).await.is_err());
    }
}
