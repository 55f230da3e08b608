//! Hook sequencing with rollback, deadlines and aggregate stop errors.
//!
//! # Responsibilities
//! - Run on_start hooks in construction order
//! - Roll back started hooks when one fails
//! - Run on_stop hooks in reverse start order, collecting every failure
//!
//! # Design Decisions
//! - Rollback gets its own deadline (the configured stop timeout) so an
//!   exhausted start budget does not skip cleanup
//! - Stop after a completed stop is a no-op

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::kernel::{DeadlineExceeded, HookError, HookFailure, KernelError, StartError, StopError};
use crate::lifecycle::hooks::{HookContext, HookFn, HookPhase, OwnedHook};
use crate::observability::metrics;

/// Application lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Registered,
    Resolving,
    Resolved,
    Failed,
    Starting,
    Running,
    StartFailed,
    Stopping,
    Stopped,
    StopFailed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Registered => "registered",
            LifecycleState::Resolving => "resolving",
            LifecycleState::Resolved => "resolved",
            LifecycleState::Failed => "failed",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::StartFailed => "start-failed",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::StopFailed => "stop-failed",
        };
        f.write_str(name)
    }
}

/// Owns every hook collected during construction.
pub(crate) struct Coordinator {
    hooks: Vec<OwnedHook>,
    /// Indices into `hooks` whose start completed, in start order.
    started: Vec<usize>,
    state: LifecycleState,
    rollback_timeout: Duration,
}

impl Coordinator {
    pub(crate) fn new(hooks: Vec<OwnedHook>, rollback_timeout: Duration) -> Self {
        Self {
            hooks,
            started: Vec::new(),
            state: LifecycleState::Resolved,
            rollback_timeout,
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.state
    }

    pub(crate) fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) async fn start(&mut self, timeout: Duration) -> Result<(), KernelError> {
        if self.state != LifecycleState::Resolved {
            return Err(KernelError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        self.state = LifecycleState::Starting;
        let deadline = Instant::now() + timeout;
        tracing::info!(hooks = self.hooks.len(), ?timeout, "Starting application");

        for index in 0..self.hooks.len() {
            let owner = self.hooks[index].owner.clone();
            if let Some(on_start) = self.hooks[index].hook.on_start.take() {
                tracing::debug!(component = %owner, "Running start hook");
                if let Err(error) = invoke(&owner, HookPhase::Start, on_start, deadline, timeout).await {
                    tracing::error!(component = %owner, error = %error, "Start hook failed, rolling back");
                    self.rollback().await;
                    self.state = LifecycleState::StartFailed;
                    return Err(StartError {
                        component: owner,
                        source: error,
                    }
                    .into());
                }
            }
            self.started.push(index);
        }

        self.state = LifecycleState::Running;
        tracing::info!(started = self.started.len(), "Application running");
        Ok(())
    }

    /// Best-effort stop of everything started so far. Errors are logged only.
    async fn rollback(&mut self) {
        let timeout = self.rollback_timeout;
        let deadline = Instant::now() + timeout;

        while let Some(index) = self.started.pop() {
            let owner = self.hooks[index].owner.clone();
            if let Some(on_stop) = self.hooks[index].hook.on_stop.take() {
                tracing::debug!(component = %owner, "Rolling back");
                if let Err(error) = invoke(&owner, HookPhase::Stop, on_stop, deadline, timeout).await {
                    tracing::warn!(component = %owner, error = %error, "Rollback stop hook failed");
                }
            }
        }
    }

    pub(crate) async fn stop(&mut self, timeout: Duration) -> Result<(), KernelError> {
        match self.state {
            LifecycleState::Running => {}
            LifecycleState::Stopped | LifecycleState::StopFailed => {
                tracing::debug!(state = %self.state, "Stop requested after stop; ignoring");
                return Ok(());
            }
            LifecycleState::Resolved => {
                self.state = LifecycleState::Stopped;
                return Ok(());
            }
            // Rollback already ran.
            LifecycleState::StartFailed => return Ok(()),
            state => {
                return Err(KernelError::InvalidState {
                    operation: "stop",
                    state,
                })
            }
        }

        self.state = LifecycleState::Stopping;
        let deadline = Instant::now() + timeout;
        tracing::info!(hooks = self.started.len(), ?timeout, "Stopping application");

        let mut failures = Vec::new();
        while let Some(index) = self.started.pop() {
            let owner = self.hooks[index].owner.clone();
            if let Some(on_stop) = self.hooks[index].hook.on_stop.take() {
                tracing::debug!(component = %owner, "Running stop hook");
                if let Err(error) = invoke(&owner, HookPhase::Stop, on_stop, deadline, timeout).await {
                    tracing::error!(component = %owner, error = %error, "Stop hook failed");
                    failures.push(HookFailure {
                        component: owner,
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            self.state = LifecycleState::Stopped;
            tracing::info!("Application stopped");
            Ok(())
        } else {
            self.state = LifecycleState::StopFailed;
            Err(StopError { failures }.into())
        }
    }
}

async fn invoke(
    component: &str,
    phase: HookPhase,
    hook: HookFn,
    deadline: Instant,
    timeout: Duration,
) -> Result<(), HookError> {
    let ctx = HookContext::new(component, phase, deadline);
    let began = std::time::Instant::now();

    let result = match tokio::time::timeout_at(deadline, hook(ctx)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(cause)) => Err(HookError::Failed(cause)),
        Err(_) => Err(HookError::DeadlineExceeded(DeadlineExceeded {
            component: component.to_string(),
            phase,
            timeout,
        })),
    };

    metrics::record_hook(component, phase, began.elapsed(), result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::hooks::{Hook, Lifecycle};
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    fn recorded(owner: &str, journal: &Journal, fail_start: bool) -> Vec<OwnedHook> {
        let mut lifecycle = Lifecycle::new(owner);
        let (on_start, on_stop) = (journal.clone(), journal.clone());
        let (a, b) = (owner.to_string(), owner.to_string());
        lifecycle.append(
            Hook::new()
                .on_start(move |_| async move {
                    on_start.lock().unwrap().push(format!("start {}", a));
                    if fail_start {
                        return Err("boom".into());
                    }
                    Ok(())
                })
                .on_stop(move |_| async move {
                    on_stop.lock().unwrap().push(format!("stop {}", b));
                    Ok(())
                }),
        );
        lifecycle.into_hooks()
    }

    #[tokio::test]
    async fn start_then_stop_reverses_order() {
        let journal = Journal::default();
        let mut hooks = recorded("a", &journal, false);
        hooks.extend(recorded("b", &journal, false));

        let mut coordinator = Coordinator::new(hooks, Duration::from_secs(1));
        coordinator.start(Duration::from_secs(1)).await.unwrap();
        assert_eq!(coordinator.state(), LifecycleState::Running);
        coordinator.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(coordinator.state(), LifecycleState::Stopped);

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["start a", "start b", "stop b", "stop a"]
        );
    }

    #[tokio::test]
    async fn failed_start_rolls_back_earlier_hooks_only() {
        let journal = Journal::default();
        let mut hooks = recorded("a", &journal, false);
        hooks.extend(recorded("b", &journal, true));
        hooks.extend(recorded("c", &journal, false));

        let mut coordinator = Coordinator::new(hooks, Duration::from_secs(1));
        let err = coordinator.start(Duration::from_secs(1)).await.unwrap_err();
        match err {
            KernelError::Start(start) => assert_eq!(start.component, "b"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(coordinator.state(), LifecycleState::StartFailed);
        assert_eq!(*journal.lock().unwrap(), vec!["start a", "start b", "stop a"]);

        // Nothing left to stop.
        coordinator.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(journal.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut coordinator = Coordinator::new(Vec::new(), Duration::from_secs(1));
        coordinator.start(Duration::from_secs(1)).await.unwrap();
        let err = coordinator.start(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, KernelError::InvalidState { operation: "start", .. }));
    }

    #[tokio::test]
    async fn slow_hook_exceeds_deadline() {
        let mut lifecycle = Lifecycle::new("slow");
        lifecycle.append(Hook::new().on_start(|_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }));

        let mut coordinator = Coordinator::new(lifecycle.into_hooks(), Duration::from_secs(1));
        let err = coordinator.start(Duration::from_millis(20)).await.unwrap_err();
        match err {
            KernelError::Start(StartError {
                component,
                source: HookError::DeadlineExceeded(exceeded),
            }) => {
                assert_eq!(component, "slow");
                assert_eq!(exceeded.phase, HookPhase::Start);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
