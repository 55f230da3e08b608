//! Kernel error taxonomy.
//!
//! Resolution errors are returned before any hook runs. Start errors name the
//! first failing component; stop errors carry every failing component.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::{HookPhase, LifecycleState};

/// Error type accepted from constructors and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Any failure surfaced by the kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("{type_name} is already registered")]
    RegistrationConflict { type_name: String },

    #[error("registration is closed: the container has already been resolved")]
    RegistrationClosed,

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("{requester} depends on {missing}, which has no provider")]
    UnresolvedDependency { requester: String, missing: String },

    #[error("{interface} is bound {} times ({}); expected exactly one binding", .candidates.len(), .candidates.join(", "))]
    AmbiguousBinding {
        interface: String,
        candidates: Vec<String>,
    },

    #[error("{requester} expects group {group:?} of {expected}, but its members are {found}")]
    GroupMismatch {
        requester: String,
        group: String,
        expected: String,
        found: String,
    },

    #[error("constructor for {component} failed: {source}")]
    Constructor {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot {operation} while the application is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Stop(#[from] StopError),
}

/// A dependency cycle, listed in traversal order.
///
/// `path` holds each participant exactly once; the display form repeats the
/// first entry to close the loop (`A -> B -> C -> A`).
#[derive(Debug, Error)]
#[error("dependency cycle detected: {}", render_cycle(.path))]
pub struct CycleError {
    pub path: Vec<String>,
}

fn render_cycle(path: &[String]) -> String {
    let mut rendered = path.join(" -> ");
    if let Some(first) = path.first() {
        rendered.push_str(" -> ");
        rendered.push_str(first);
    }
    rendered
}

/// Failure of a single start or stop hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Failed(BoxError),

    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),
}

/// A hook did not return before its phase deadline.
#[derive(Debug, Error)]
#[error("{phase} hook for {component} exceeded its {timeout:?} deadline")]
pub struct DeadlineExceeded {
    pub component: String,
    pub phase: HookPhase,
    pub timeout: Duration,
}

/// Start aborted at `component`; every earlier hook was rolled back.
#[derive(Debug, Error)]
#[error("start failed in {component}: {source}")]
pub struct StartError {
    pub component: String,
    #[source]
    pub source: HookError,
}

/// One failed stop hook, attributed to its owner.
#[derive(Debug)]
pub struct HookFailure {
    pub component: String,
    pub error: HookError,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.error)
    }
}

/// Every stop hook that failed during one stop cycle, in the order they ran.
#[derive(Debug, Error)]
#[error("stop failed for {} component(s): {}", .failures.len(), render_failures(.failures))]
pub struct StopError {
    pub failures: Vec<HookFailure>,
}

impl StopError {
    /// Owners of the failed hooks, in stop order.
    pub fn components(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.component.as_str()).collect()
    }
}

fn render_failures(failures: &[HookFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
