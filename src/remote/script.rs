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

//! The wrapped-script execution protocol.
//!
//! A script body is wrapped in a standard header, persisted to the remote
//! working directory with its output redirected into a paired log file,
//! then executed. Persisting is the default so failed runs can be
//! inspected after the fact; inline execution skips the on-disk trace for
//! lightweight checks. Other tooling inspects `<dir>/<name>` and
//! `<dir>/<name>.log` after a failure, so the naming is part of the
//! operational contract.

use crate::error::Result;
use crate::remote::exec::CommandResult;
use crate::remote::Remote;

/// Persisted scripts stay readable by everyone so the artifacts can be
/// pulled apart after a failed run.
const SCRIPT_MODE: u32 = 0o755;

/// One script to execute on the target.
#[derive(Debug, Clone)]
pub struct ScriptInvocation {
    /// Identifies the script in filenames and logs.
    pub name: String,
    /// The shell text to run.
    pub body: String,
    /// Remote directory the script runs in (and is persisted to).
    pub working_dir: String,
    /// Whether to write the wrapped script to the remote host first.
    pub persist: bool,
    /// Explicit log path; derived from the script path when absent.
    pub log_path: Option<String>,
}

impl ScriptInvocation {
    pub fn new(
        name: impl Into<String>,
        body: impl Into<String>,
        working_dir: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            working_dir: working_dir.into(),
            persist: true,
            log_path: None,
        }
    }

    /// Execute the wrapped text directly, leaving no trace on the host.
    pub fn inline(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<String>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// The script body wrapped in the standard header.
    pub fn wrapped(&self) -> String {
        format!("#!/bin/bash -x\ncd {}\n{}", self.working_dir, self.body)
    }

    /// Where the persisted script lands on the host.
    pub fn script_path(&self) -> String {
        format!("{}/{}", self.working_dir, self.name)
    }

    /// The log file paired with the persisted script.
    pub fn resolved_log_path(&self) -> String {
        self.log_path
            .clone()
            .unwrap_or_else(|| format!("{}.log", self.script_path()))
    }
}

impl Remote {
    /// Execute `invocation` on the target.
    ///
    /// With `persist` set, the wrapped script is written to
    /// `<working_dir>/<name>` with execute permission and run with both
    /// output streams redirected into the paired log, which is also what a
    /// failure reports from. Inline invocations execute the wrapped text
    /// directly with no log fallback.
    pub async fn run_script(&mut self, invocation: &ScriptInvocation) -> Result<CommandResult> {
        tracing::info!(
            host = %self.target().host,
            script = %invocation.name,
            persist = invocation.persist,
            "executing remote script"
        );

        let wrapped = invocation.wrapped();
        if invocation.persist {
            let script_path = invocation.script_path();
            self.write_file(&script_path, wrapped.as_bytes(), Some(SCRIPT_MODE))
                .await?;
            let log_path = invocation.resolved_log_path();
            let command = format!("{script_path} > {log_path} 2>&1");
            self.execute(&command, Some(&log_path)).await
        } else {
            self.execute(&wrapped, None).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_script_carries_header_and_workdir() {
        let invocation = ScriptInvocation::new("bootstrap", "echo ok", "/srv/stage");
        let wrapped = invocation.wrapped();
        assert!(wrapped.starts_with("#!/bin/bash -x\n"));
        assert!(wrapped.contains("cd /srv/stage\n"));
        assert!(wrapped.ends_with("echo ok"));
    }

    #[test]
    fn persisted_paths_follow_the_naming_convention() {
        let invocation = ScriptInvocation::new("bootstrap", "echo ok", "/srv/stage");
        assert!(invocation.persist);
        assert_eq!(invocation.script_path(), "/srv/stage/bootstrap");
        assert_eq!(invocation.resolved_log_path(), "/srv/stage/bootstrap.log");
    }

    #[test]
    fn explicit_log_path_wins() {
        let invocation = ScriptInvocation::new("bootstrap", "echo ok", "/srv/stage")
            .with_log_path("/var/log/bootstrap.log");
        assert_eq!(invocation.resolved_log_path(), "/var/log/bootstrap.log");
    }

    #[test]
    fn inline_invocations_do_not_persist() {
        let invocation = ScriptInvocation::new("probe", "test -f /ready", "/tmp").inline();
        assert!(!invocation.persist);
    }
}
