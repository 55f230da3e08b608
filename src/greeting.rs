//! Example greeting service and its HTTP routes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use service_kernel::http::{as_handler, RouteHandler};
use service_kernel::observability::{Field, Logger};
use service_kernel::{AppBuilder, KernelError};

pub struct GreetingService {
    logger: Arc<dyn Logger>,
}

impl GreetingService {
    pub fn greet(&self, name: &str) -> String {
        self.logger
            .info("Handling greet request", &[Field::new("name", name)]);
        format!("Hello, {}!", name)
    }
}

pub struct GreetingHandler {
    service: Arc<GreetingService>,
}

impl RouteHandler for GreetingHandler {
    fn routes(&self) -> Router {
        Router::new()
            .route("/greet/{name}", get(greet))
            .route("/health", get(health))
            .with_state(self.service.clone())
    }
}

async fn greet(State(service): State<Arc<GreetingService>>, Path(name): Path<String>) -> Json<Value> {
    Json(json!({ "message": service.greet(&name) }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub fn module(app: &AppBuilder) -> Result<(), KernelError> {
    app.provide(|(logger,): (Arc<dyn Logger>,), _| Ok(GreetingService { logger }))?;
    as_handler(app, |(service,): (Arc<GreetingService>,), _| {
        Ok(GreetingHandler { service })
    })
}
