//! Start/stop hooks attached while a component is being constructed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::time::Instant;

use crate::kernel::BoxError;

/// Which half of the lifecycle a hook belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Start,
    Stop,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::Start => "start",
            HookPhase::Stop => "stop",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passed to every hook invocation.
///
/// Components with background work should wait for it to unwind no later
/// than [`deadline`](Self::deadline).
#[derive(Clone, Debug)]
pub struct HookContext {
    component: Arc<str>,
    phase: HookPhase,
    deadline: Instant,
}

impl HookContext {
    pub(crate) fn new(component: &str, phase: HookPhase, deadline: Instant) -> Self {
        Self {
            component: Arc::from(component),
            phase,
            deadline,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the phase deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

pub(crate) type HookFn =
    Box<dyn FnOnce(HookContext) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

fn boxed<F, Fut>(f: F) -> HookFn
where
    F: FnOnce(HookContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Box::new(move |ctx| f(ctx).boxed())
}

/// A start/stop callback pair. Either side may be absent.
///
/// `on_start` must not block on background work: spawn it and return.
#[derive(Default)]
pub struct Hook {
    pub(crate) on_start: Option<HookFn>,
    pub(crate) on_stop: Option<HookFn>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_start = Some(boxed(f));
        self
    }

    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_stop = Some(boxed(f));
        self
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Hook collector handed to a constructor.
///
/// Every hook appended here is owned by the component being built.
#[derive(Debug)]
pub struct Lifecycle {
    owner: String,
    hooks: Vec<Hook>,
}

impl Lifecycle {
    pub(crate) fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            hooks: Vec::new(),
        }
    }

    /// Attach a hook to the component under construction.
    pub fn append(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Identity of the component under construction.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn into_hooks(self) -> Vec<OwnedHook> {
        let owner = self.owner;
        self.hooks
            .into_iter()
            .map(|hook| OwnedHook {
                owner: owner.clone(),
                hook,
            })
            .collect()
    }
}

/// A hook tagged with its owning component.
#[derive(Debug)]
pub(crate) struct OwnedHook {
    pub(crate) owner: String,
    pub(crate) hook: Hook,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hooks_keep_owner_and_order() {
        let mut lifecycle = Lifecycle::new("db");
        lifecycle.append(Hook::new().on_start(|_| async { Ok(()) }));
        lifecycle.append(Hook::new().on_stop(|ctx| async move {
            assert_eq!(ctx.phase(), HookPhase::Stop);
            Ok(())
        }));
        assert_eq!(lifecycle.owner(), "db");

        let hooks = lifecycle.into_hooks();
        assert_eq!(hooks.len(), 2);
        assert!(hooks.iter().all(|h| h.owner == "db"));
        assert!(hooks[0].hook.on_start.is_some() && hooks[0].hook.on_stop.is_none());
        assert!(hooks[1].hook.on_start.is_none() && hooks[1].hook.on_stop.is_some());
    }

    #[tokio::test]
    async fn context_reports_remaining_time() {
        let ctx = HookContext::new("db", HookPhase::Start, Instant::now() + Duration::from_secs(5));
        assert!(ctx.remaining() > Duration::from_secs(4));
        assert_eq!(ctx.component(), "db");

        let expired = HookContext::new("db", HookPhase::Start, Instant::now());
        assert_eq!(expired.remaining(), Duration::ZERO);
    }
}
