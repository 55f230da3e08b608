//! Service kernel library.
//!
//! Components are registered on an [`AppBuilder`] with their constructors,
//! resolved into a dependency graph, built in dependency order and run
//! through start/stop hooks until the process is asked to terminate.
//!
//! ```no_run
//! use std::sync::Arc;
//! use service_kernel::{AppBuilder, Hook};
//!
//! struct Database;
//! struct Repository {
//!     db: Arc<Database>,
//! }
//!
//! # async fn demo() -> Result<(), service_kernel::KernelError> {
//! let app = AppBuilder::new();
//! app.provide(|(), lifecycle| {
//!     lifecycle.append(Hook::new().on_stop(|_| async { Ok(()) }));
//!     Ok(Database)
//! })?;
//! app.provide(|(db,): (Arc<Database>,), _| Ok(Repository { db }))?;
//! app.run().await
//! # }
//! ```

// Core
pub mod kernel;
pub mod lifecycle;

// Cross-cutting concerns
pub mod config;
pub mod observability;

// Collaborator modules
pub mod cache;
pub mod http;
pub mod messaging;
pub mod testing;

pub use kernel::{
    App, AppBuilder, BoxError, Dependencies, Dependency, Group, GroupKey, KernelError, Upcast,
};
pub use lifecycle::{Hook, HookContext, Lifecycle, LifecycleState, Shutdown};
