//! Dependency-injection kernel.
//!
//! # Data Flow
//! ```text
//! Registration (registry.rs):
//!     AppBuilder::provide / supply / bind / register_group_member
//!     → Registry (mutex-guarded, append-only until sealed)
//!
//! Resolution (graph.rs):
//!     Registry → depth-first walk in registration order
//!     → cycle / unresolved / ambiguity checks
//!     → Graph (topological postorder)
//!
//! Instantiation (app.rs):
//!     Graph order → constructors run once each
//!     → bindings upcast concrete instances (binding.rs)
//!     → groups collect members in registration order (group.rs)
//!     → hooks collected per constructor (lifecycle)
//! ```
//!
//! # Design Decisions
//! - Dependencies are declared by type through `Dependencies` tuples, never
//!   discovered at run time
//! - Every singleton is stored once as `Arc<T>`; dependents hold clones
//! - Interface substitution goes through `Upcast`, so a concrete type that does
//!   not implement the contract fails to compile

pub mod app;
pub mod binding;
pub mod error;
pub mod graph;
pub mod group;
pub mod inject;
pub mod registry;
pub mod types;

pub use app::App;
pub use binding::Upcast;
pub use error::{
    BoxError, CycleError, DeadlineExceeded, HookError, HookFailure, KernelError, StartError,
    StopError,
};
pub use graph::Graph;
pub use group::{Group, GroupKey};
pub use inject::{Dependencies, Dependency, Instances, Requirement, Target};
pub use registry::AppBuilder;
pub use types::{NodeKey, TypeKey};
