//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use service_kernel::{BoxError, Hook};

/// Ordered record of hook invocations across components.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// A hook that records `start <name>` / `stop <name>`.
    pub fn hook(&self, name: &str) -> Hook {
        self.hook_with(name, None, None)
    }

    /// Like [`hook`](Self::hook) but start and/or stop fail with the given
    /// message after recording.
    pub fn hook_with(
        &self,
        name: &str,
        start_error: Option<&'static str>,
        stop_error: Option<&'static str>,
    ) -> Hook {
        let (on_start, on_stop) = (self.clone(), self.clone());
        let (a, b) = (name.to_string(), name.to_string());
        Hook::new()
            .on_start(move |_| async move {
                on_start.push(format!("start {}", a));
                match start_error {
                    Some(message) => Err(BoxError::from(message)),
                    None => Ok(()),
                }
            })
            .on_stop(move |_| async move {
                on_stop.push(format!("stop {}", b));
                match stop_error {
                    Some(message) => Err(BoxError::from(message)),
                    None => Ok(()),
                }
            })
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
#[allow(dead_code)]
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
