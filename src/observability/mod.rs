//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Kernel and modules produce:
//!     → tracing events (registration, resolution order, hooks, failures)
//!     → logging.rs (Logger contract for components, backed by tracing)
//!     → metrics.rs (hook durations, failures, component count)
//!
//! Consumers:
//!     → stdout (JSON or text, per [logging])
//!     → Metrics endpoint (Prometheus scrape, per [observability])
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing by default
//! - Components log through the `Logger` contract so tests can swap it
//! - Metrics are cheap (atomic increments) and no-ops without an exporter

pub mod logging;
pub mod metrics;

pub use logging::{Field, Level, Logger, TracingLogger};
