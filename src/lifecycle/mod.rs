//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Construction (hooks.rs):
//!     constructor → Lifecycle::append(Hook) → hooks in construction order
//!
//! Start (coordinator.rs):
//!     hooks 1..n on_start, forward → first failure aborts
//!     → on_stop of every started hook, reverse (rollback) → StartError
//!
//! Stop (coordinator.rs):
//!     started hooks on_stop, reverse → every failure collected → StopError
//!
//! Termination (signals.rs, shutdown.rs):
//!     SIGTERM/SIGINT or Shutdown::trigger → App::run proceeds to stop
//! ```
//!
//! # Design Decisions
//! - One deadline per phase; a hook past it counts as failed
//! - Stop never short-circuits
//! - A hook is started once its on_start future resolves; work it spawned is
//!   its own business

pub mod coordinator;
pub mod hooks;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use coordinator::LifecycleState;
pub use hooks::{Hook, HookContext, HookPhase, Lifecycle};
pub use shutdown::Shutdown;
