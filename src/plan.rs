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

//! Provisioning plan assembly.
//!
//! A provisioning request registers the remote work it needs as an ordered
//! list of steps over one shared [`Remote`] and hands back the resulting
//! [`TaskRunner`] for the caller to poll. Steps run strictly in order;
//! later steps may consume artifacts written by earlier ones.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::remote::{Remote, ScriptInvocation};
use crate::runner::{Step, TaskRunner};

/// Builds the step sequence for one provisioning operation.
pub struct PlanBuilder {
    remote: Arc<Mutex<Remote>>,
    steps: Vec<Step>,
}

impl PlanBuilder {
    pub fn new(remote: Remote) -> Self {
        Self {
            remote: Arc::new(Mutex::new(remote)),
            steps: Vec::new(),
        }
    }

    /// Handle to the shared remote, for custom steps that need it.
    pub fn remote(&self) -> Arc<Mutex<Remote>> {
        Arc::clone(&self.remote)
    }

    pub fn mkdir(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let remote = Arc::clone(&self.remote);
        self.steps.push(Step::new(format!("mkdir {path}"), move || async move {
            remote.lock().await.mkdir(&path).await
        }));
        self
    }

    pub fn write_file(
        mut self,
        path: impl Into<String>,
        data: Vec<u8>,
        mode: Option<u32>,
    ) -> Self {
        let path = path.into();
        let remote = Arc::clone(&self.remote);
        self.steps
            .push(Step::new(format!("write {path}"), move || async move {
                remote.lock().await.write_file(&path, &data, mode).await
            }));
        self
    }

    pub fn write_json(mut self, path: impl Into<String>, value: serde_json::Value) -> Self {
        let path = path.into();
        let remote = Arc::clone(&self.remote);
        self.steps
            .push(Step::new(format!("write {path}"), move || async move {
                remote.lock().await.write_json(&path, &value).await
            }));
        self
    }

    pub fn upload_file(mut self, local: PathBuf, remote_path: impl Into<String>) -> Self {
        let remote_path = remote_path.into();
        let remote = Arc::clone(&self.remote);
        self.steps
            .push(Step::new(format!("upload {remote_path}"), move || async move {
                remote.lock().await.upload_file(&local, &remote_path).await
            }));
        self
    }

    pub fn upload_tree(mut self, local: PathBuf, remote_base: impl Into<String>) -> Self {
        let remote_base = remote_base.into();
        let remote = Arc::clone(&self.remote);
        self.steps.push(Step::new(
            format!("upload tree {remote_base}"),
            move || async move {
                remote.lock().await.upload_tree(&local, &remote_base).await
            },
        ));
        self
    }

    pub fn run_script(mut self, invocation: ScriptInvocation) -> Self {
        let remote = Arc::clone(&self.remote);
        self.steps.push(Step::new(
            format!("run {}", invocation.name),
            move || async move {
                remote.lock().await.run_script(&invocation).await.map(|_| ())
            },
        ));
        self
    }

    /// Append an arbitrary step, for work the canned shapes don't cover.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> TaskRunner {
        TaskRunner::new(self.steps)
    }
}
