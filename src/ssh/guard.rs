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

//! Connection guard: the single place retry, reconnect, and close
//! decisions are made for operations using the long-lived session.
//!
//! Callers never re-implement retry logic; they pick a [`GuardPolicy`] and
//! hand the operation to [`Session::guarded`].

use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::ssh::session::Session;

/// Per-call policy for operations wrapped around the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    /// On a transient transport failure, force-reconnect and retry the
    /// operation exactly once. A second failure propagates.
    pub retry_on_transport_error: bool,
    /// On any non-transport failure, close the transport before
    /// propagating so the next call starts from a fresh connection.
    pub close_on_error: bool,
    /// Close the transport after the call, success or failure. For
    /// one-shot operations that should not keep a connection warm.
    pub close_when_done: bool,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            retry_on_transport_error: false,
            close_on_error: true,
            close_when_done: false,
        }
    }
}

impl GuardPolicy {
    /// The policy used by the remote file operations, which are invoked
    /// repeatedly over a multi-step run and expect the occasional blip.
    pub fn retrying() -> Self {
        Self {
            retry_on_transport_error: true,
            ..Self::default()
        }
    }

    pub fn one_shot() -> Self {
        Self {
            close_when_done: true,
            ..Self::default()
        }
    }
}

/// What the guard does with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    RetryAfterReconnect,
    CloseAndPropagate,
    Propagate,
}

fn recovery_for(error: &Error, policy: GuardPolicy) -> Recovery {
    if error.is_transport() {
        if policy.retry_on_transport_error {
            Recovery::RetryAfterReconnect
        } else {
            Recovery::Propagate
        }
    } else if policy.close_on_error {
        Recovery::CloseAndPropagate
    } else {
        Recovery::Propagate
    }
}

impl Session {
    /// Run `op` against this session under `policy`.
    ///
    /// `op` may be invoked twice: once normally, and once more after a
    /// forced reconnect when the first attempt died to a transport fault
    /// and the policy allows the retry.
    pub async fn guarded<T, F>(&mut self, policy: GuardPolicy, mut op: F) -> Result<T>
    where
        F: for<'a> FnMut(&'a mut Session) -> BoxFuture<'a, Result<T>>,
    {
        let result = self.run_guarded(policy, &mut op).await;
        if policy.close_when_done {
            self.close().await;
        }
        result
    }

    async fn run_guarded<T, F>(&mut self, policy: GuardPolicy, op: &mut F) -> Result<T>
    where
        F: for<'a> FnMut(&'a mut Session) -> BoxFuture<'a, Result<T>>,
    {
        match op(self).await {
            Ok(value) => Ok(value),
            Err(e) => match recovery_for(&e, policy) {
                Recovery::RetryAfterReconnect => {
                    tracing::warn!(
                        host = %self.target().host,
                        error = %e,
                        "transport failure, reconnecting for one retry"
                    );
                    self.force_reconnect().await?;
                    op(self).await
                }
                Recovery::CloseAndPropagate => {
                    if !self.is_closed() {
                        tracing::debug!(
                            host = %self.target().host,
                            "closing session after failed operation"
                        );
                        self.close().await;
                    }
                    Err(e)
                }
                Recovery::Propagate => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::RemoteTarget;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn unreachable_target() -> RemoteTarget {
        // Port 1 on loopback refuses immediately; nothing listens there.
        RemoteTarget::new(
            "127.0.0.1".to_string(),
            1,
            "root".to_string(),
            "not a real key".to_string(),
        )
    }

    fn transport_error() -> Error {
        Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))
    }

    #[test]
    fn default_policy_matches_documented_flags() {
        let policy = GuardPolicy::default();
        assert!(!policy.retry_on_transport_error);
        assert!(policy.close_on_error);
        assert!(!policy.close_when_done);
    }

    #[test]
    fn transport_errors_retry_only_when_asked() {
        let err = transport_error();
        assert_eq!(
            recovery_for(&err, GuardPolicy::retrying()),
            Recovery::RetryAfterReconnect
        );
        assert_eq!(recovery_for(&err, GuardPolicy::default()), Recovery::Propagate);
    }

    #[test]
    fn non_transport_errors_close_by_default() {
        let err = Error::CommandDidntExit;
        assert_eq!(
            recovery_for(&err, GuardPolicy::default()),
            Recovery::CloseAndPropagate
        );
        let no_close = GuardPolicy {
            close_on_error: false,
            ..GuardPolicy::default()
        };
        assert_eq!(recovery_for(&err, no_close), Recovery::Propagate);
    }

    #[tokio::test]
    async fn transport_error_without_retry_runs_op_once() {
        let mut session = Session::new(unreachable_target());
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        let result: Result<()> = session
            .guarded(GuardPolicy::default(), move |_session| {
                let counted = Arc::clone(&counted);
                Box::pin(async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Err(transport_error())
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_attempts_reconnect_before_second_try() {
        let mut session = Session::new(unreachable_target());
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        let result: Result<()> = session
            .guarded(GuardPolicy::retrying(), move |_session| {
                let counted = Arc::clone(&counted);
                Box::pin(async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Err(transport_error())
                })
            })
            .await;

        // The reconnect itself fails against the unreachable target, so the
        // op never gets its second run and the connect error surfaces.
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_transport_error_propagates_unchanged() {
        let mut session = Session::new(unreachable_target());

        let result: Result<()> = session
            .guarded(GuardPolicy::default(), |_session| {
                Box::pin(async { Err(Error::CommandDidntExit) })
            })
            .await;

        assert!(matches!(result, Err(Error::CommandDidntExit)));
    }

    #[tokio::test]
    async fn success_passes_through() {
        let mut session = Session::new(unreachable_target());

        let result = session
            .guarded(GuardPolicy::one_shot(), |_session| {
                Box::pin(async { Ok(42usize) })
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert!(session.is_closed());
    }
}
