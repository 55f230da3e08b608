//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Build the Axum router from every registered handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind on start, drain gracefully on stop

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::http::handler::RouteHandler;
use crate::kernel::BoxError;
use crate::observability::{Field, Logger};

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
    address: SocketAddr,
}

struct Inner {
    config: HttpConfig,
    router: Router,
    logger: Arc<dyn Logger>,
    running: Mutex<Option<Running>>,
}

/// HTTP server component. Cloning shares the same server.
#[derive(Clone)]
pub struct HttpServer {
    inner: Arc<Inner>,
}

impl HttpServer {
    /// Fails when two handlers register overlapping routes.
    pub fn new(
        config: HttpConfig,
        handlers: &[Arc<dyn RouteHandler>],
        logger: Arc<dyn Logger>,
    ) -> Result<Self, BoxError> {
        let router = Self::build_router(&config, handlers)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                router,
                logger,
                running: Mutex::new(None),
            }),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &HttpConfig, handlers: &[Arc<dyn RouteHandler>]) -> Result<Router, BoxError> {
        let mut router = Router::new();
        for (index, handler) in handlers.iter().enumerate() {
            router = merge_routes(router, handler.routes())
                .map_err(|reason| format!("HTTP handler #{index} conflicts with an earlier handler: {reason}"))?;
        }

        Ok(router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(config.request_timeout())),
        ))
    }

    pub fn config(&self) -> &HttpConfig {
        &self.inner.config
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().as_ref().map(|running| running.address)
    }

    /// Bind the configured address and serve in a background task.
    pub async fn start(&self) -> Result<SocketAddr, BoxError> {
        if let Some(address) = self.local_addr() {
            return Ok(address);
        }

        let listener = TcpListener::bind(&self.inner.config.address).await?;
        let address = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();
        let router = self.inner.router.clone();

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        *self.lock() = Some(Running {
            shutdown,
            task,
            address,
        });
        self.inner
            .logger
            .info("HTTP server listening", &[Field::new("address", address.to_string())]);
        Ok(address)
    }

    /// Stop accepting connections and wait for in-flight requests, up to
    /// `deadline`. The serve task is aborted if it has not drained by then.
    pub async fn stop(&self, deadline: Instant) -> Result<(), BoxError> {
        let running = self.lock().take();
        let Some(Running {
            shutdown,
            mut task,
            address,
        }) = running
        else {
            return Ok(());
        };

        let _ = shutdown.send(());
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(Ok(()))) => {
                self.inner
                    .logger
                    .info("HTTP server stopped", &[Field::new("address", address.to_string())]);
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                task.abort();
                Err(format!("HTTP server on {} did not drain before the deadline", address).into())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.inner.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `Router::merge` panics on overlapping routes; surface that as an error.
fn merge_routes(router: Router, routes: Router) -> Result<Router, String> {
    panic::catch_unwind(AssertUnwindSafe(move || router.merge(routes))).map_err(|payload| {
        payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "overlapping routes".to_string())
    })
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("address", &self.inner.config.address)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::TracingLogger;
    use std::time::Duration;

    fn config() -> HttpConfig {
        HttpConfig {
            address: "127.0.0.1:0".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn zero_handlers_serves_not_found() {
        let server = HttpServer::new(config(), &[], Arc::new(TracingLogger::new())).unwrap();
        let address = server.start().await.unwrap();

        let response = reqwest::get(format!("http://{}/anything", address)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        server.stop(Instant::now() + Duration::from_secs(5)).await.unwrap();
        assert!(server.local_addr().is_none());
    }

    struct Health;

    impl RouteHandler for Health {
        fn routes(&self) -> Router {
            Router::new().route("/health", axum::routing::get(|| async { "ok" }))
        }
    }

    #[test]
    fn overlapping_routes_are_rejected() {
        let handlers: Vec<Arc<dyn RouteHandler>> = vec![Arc::new(Health), Arc::new(Health)];
        let err = HttpServer::new(config(), &handlers, Arc::new(TracingLogger::new())).unwrap_err();
        assert!(err.to_string().contains("handler #1"));
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let server = HttpServer::new(config(), &[], Arc::new(TracingLogger::new())).unwrap();
        server.stop(Instant::now()).await.unwrap();
    }
}
