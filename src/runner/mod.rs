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

//! Externally driven step scheduler for one provisioning operation.
//!
//! A multi-minute remote bootstrap must not pin a worker for its whole
//! duration. [`TaskRunner`] holds the operation as an ordered sequence of
//! steps and lets an external poller advance it one step per tick:
//! `start()` once, `step()` until `done()`. The step boundaries are the
//! only externally observable suspension points; whatever a step does
//! internally runs to completion within that one `step()` call.

use std::collections::VecDeque;
use std::future::Future;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::error::Result;

/// Driving the runner outside its start/step/done contract.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RunnerError {
    #[error("task runner has not been started")]
    NotStarted,

    #[error("task runner was already started")]
    AlreadyStarted,

    #[error("task runner already ran to completion")]
    Completed,
}

type StepFuture = BoxFuture<'static, Result<()>>;

/// One unit of work in a provisioning sequence.
///
/// The name shows up in step-boundary logs and nowhere else.
pub struct Step {
    name: String,
    work: Box<dyn FnOnce() -> StepFuture + Send>,
}

impl Step {
    pub fn new<F, Fut>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            work: Box::new(move || Box::pin(work())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Running,
    Done,
}

/// One logical provisioning operation as a finite, ordered step sequence.
pub struct TaskRunner {
    steps: VecDeque<Step>,
    state: State,
    total: usize,
}

impl TaskRunner {
    pub fn new(steps: Vec<Step>) -> Self {
        let total = steps.len();
        Self {
            steps: steps.into(),
            state: State::NotStarted,
            total,
        }
    }

    /// Begin iteration. Valid exactly once, before any `step()` call.
    /// An empty sequence completes here.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::NotStarted => {
                self.state = if self.steps.is_empty() {
                    State::Done
                } else {
                    State::Running
                };
                tracing::info!(steps = self.total, "provisioning sequence started");
                Ok(())
            }
            State::Running => Err(RunnerError::AlreadyStarted.into()),
            State::Done => Err(RunnerError::Completed.into()),
        }
    }

    /// Execute exactly one pending step and report whether the sequence is
    /// now complete.
    ///
    /// A failing step propagates its error; the runner does not retry at
    /// this level (retry, where it applies, lives in the connection
    /// guard). The caller is expected to stop polling a failed sequence.
    pub async fn step(&mut self) -> Result<bool> {
        match self.state {
            State::NotStarted => return Err(RunnerError::NotStarted.into()),
            State::Done => return Err(RunnerError::Completed.into()),
            State::Running => {}
        }

        let Some(step) = self.steps.pop_front() else {
            self.state = State::Done;
            return Ok(true);
        };

        let index = self.total - self.steps.len();
        tracing::info!(step = %step.name, index, total = self.total, "running provisioning step");
        (step.work)().await?;

        if self.steps.is_empty() {
            self.state = State::Done;
            tracing::info!(steps = self.total, "provisioning sequence complete");
        }
        Ok(self.done())
    }

    pub fn started(&self) -> bool {
        self.state != State::NotStarted
    }

    pub fn done(&self) -> bool {
        self.state == State::Done
    }

    /// Steps not yet executed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("state", &self.state)
            .field("remaining", &self.steps.len())
            .field("total", &self.total)
            .finish()
    }
}
