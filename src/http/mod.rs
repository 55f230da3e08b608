//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! Constructors registered with as_handler()
//!     → group "http.handlers" (registration order)
//!     → server.rs (merge routes, wrap in request-id/trace/timeout layers)
//!     → on_start: bind + spawn axum::serve
//!     → on_stop: graceful drain, bounded by the hook deadline
//! ```
//!
//! # Design Decisions
//! - The server depends on the handler group, so every handler is built
//!   before it
//! - Zero handlers is valid: every request gets 404

pub mod handler;
pub mod server;

use std::sync::Arc;

use crate::config::{ConfigSource, HttpConfig};
use crate::kernel::{AppBuilder, Group, KernelError};
use crate::lifecycle::Hook;
use crate::observability::Logger;

pub use handler::{as_handler, HttpHandlers, RouteHandler};
pub use server::HttpServer;

/// Register the `HttpServer` component.
///
/// Requires a `dyn Logger` binding; reads `[http]` from the `ConfigSource`
/// when one is registered.
pub fn module(app: &AppBuilder) -> Result<(), KernelError> {
    app.provide(
        |(config, logger, handlers): (
            Option<Arc<ConfigSource>>,
            Arc<dyn Logger>,
            Group<HttpHandlers>,
        ),
         lifecycle| {
            let settings = match config {
                Some(source) => source.section::<HttpConfig>()?,
                None => HttpConfig::default(),
            };
            let server = HttpServer::new(settings, &handlers, logger)?;

            let (starting, stopping) = (server.clone(), server.clone());
            lifecycle.append(
                Hook::new()
                    .on_start(move |_| async move { starting.start().await.map(drop) })
                    .on_stop(move |ctx| async move { stopping.stop(ctx.deadline()).await }),
            );
            Ok(server)
        },
    )
}
