//! Helpers for testing applications built on the kernel.
//!
//! `TestApp` resolves, starts and stops an application and panics with the
//! full error chain when any step fails. `RecordingLogger` stands in for the
//! `dyn Logger` binding and keeps every record for assertions.

use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::LifecycleConfig;
use crate::kernel::{App, AppBuilder, KernelError};
use crate::observability::{Field, Level, Logger};

/// One captured log call.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: Vec<Field>,
}

/// `Logger` that stores records in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<Record>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Whether any record's message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|r| r.message.contains(needle))
    }

    pub fn count(&self, level: Level) -> usize {
        self.lock().iter().filter(|r| r.level == level).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, message: &str, fields: &[Field]) {
        self.lock().push(Record {
            level,
            message: message.to_string(),
            fields: fields.to_vec(),
        });
    }
}

/// `err` followed by every source, one per line.
pub fn error_chain(err: &dyn Error) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str("\n  caused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// A resolved application with a recording logger bound as `dyn Logger`.
pub struct TestApp {
    app: App,
    logger: Arc<RecordingLogger>,
    timeout: Duration,
}

impl TestApp {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Register with `register`, then resolve. Panics on any error.
    pub fn new<F>(register: F) -> Self
    where
        F: FnOnce(&AppBuilder) -> Result<(), KernelError>,
    {
        match Self::try_new(register) {
            Ok(app) => app,
            Err(e) => panic!("test application failed to resolve: {}", error_chain(&e)),
        }
    }

    pub fn try_new<F>(register: F) -> Result<Self, KernelError>
    where
        F: FnOnce(&AppBuilder) -> Result<(), KernelError>,
    {
        let timeout = Self::DEFAULT_TIMEOUT;
        let builder = AppBuilder::with_lifecycle(LifecycleConfig {
            start_timeout_ms: timeout.as_millis() as u64,
            stop_timeout_ms: timeout.as_millis() as u64,
        });
        builder.supply(RecordingLogger::new())?;
        builder.bind::<dyn Logger, RecordingLogger>()?;
        register(&builder)?;

        let app = builder.resolve()?;
        let logger = app
            .get::<RecordingLogger>()
            .unwrap_or_else(|| Arc::new(RecordingLogger::new()));
        Ok(Self {
            app,
            logger,
            timeout,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    pub fn logger(&self) -> &Arc<RecordingLogger> {
        &self.logger
    }

    /// The component registered or bound for `T`. Panics if there is none.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        match self.app.get::<T>() {
            Some(component) => component,
            None => panic!("no component registered for {}", std::any::type_name::<T>()),
        }
    }

    pub async fn require_start(&mut self) {
        if let Err(e) = self.app.start(self.timeout).await {
            panic!("test application failed to start: {}", error_chain(&e));
        }
    }

    pub async fn require_stop(&mut self) {
        if let Err(e) = self.app.stop(self.timeout).await {
            panic!("test application failed to stop: {}", error_chain(&e));
        }
    }
}

impl std::fmt::Debug for TestApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestApp")
            .field("app", &self.app)
            .field("timeout", &self.timeout)
            .finish()
    }
}
