//! Startup tasks.
//!
//! # Responsibilities
//! - Run one-off initialization (migrations, cache warmup) during resolve
//! - Order it against other components through the graph
//!
//! # Design Decisions
//! - A task is a constructor of a marker component; dependents that must run
//!   after it declare `Arc<Marker>`
//! - Fail fast: a task error aborts resolution like any constructor error

use crate::kernel::{AppBuilder, BoxError, Dependencies, KernelError};

impl AppBuilder {
    /// Register `task` to run once its dependencies `D` are built.
    ///
    /// `M` is a marker type that other constructors can depend on.
    pub fn startup_task<M, D, F>(&self, task: F) -> Result<(), KernelError>
    where
        M: Default + Send + Sync + 'static,
        D: Dependencies,
        F: FnOnce(D) -> Result<(), BoxError> + Send + 'static,
    {
        self.provide::<M, D, _>(move |deps, lifecycle| {
            tracing::info!(task = lifecycle.owner(), "Running startup task");
            task(deps)?;
            Ok(M::default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Migrated;

    struct Store;

    #[test]
    fn task_runs_before_dependents() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let app = AppBuilder::new();

        let log = journal.clone();
        app.provide(move |(_m,): (Arc<Migrated>,), _| {
            log.lock().unwrap().push("store");
            Ok(Store)
        })
        .unwrap();
        let log = journal.clone();
        app.startup_task::<Migrated, (), _>(move |()| {
            log.lock().unwrap().push("migrate");
            Ok(())
        })
        .unwrap();

        app.resolve().unwrap();
        assert_eq!(*journal.lock().unwrap(), vec!["migrate", "store"]);
    }

    #[test]
    fn failed_task_aborts_resolve() {
        let app = AppBuilder::new();
        app.startup_task::<Migrated, (), _>(|()| Err("schema locked".into()))
            .unwrap();
        match app.resolve().unwrap_err() {
            KernelError::Constructor { component, source } => {
                assert!(component.ends_with("Migrated"));
                assert_eq!(source.to_string(), "schema locked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
