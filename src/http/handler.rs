//! Route handler contract and registration helper.

use std::sync::Arc;

use axum::Router;

use crate::contract;
use crate::kernel::{AppBuilder, BoxError, Dependencies, GroupKey, KernelError};
use crate::lifecycle::Lifecycle;

/// A component that contributes routes to the HTTP server.
///
/// Handlers carry their own state (`Router::with_state`) and return a
/// stateless router. Overlapping paths between handlers make router
/// assembly panic, as `Router::merge` does.
pub trait RouteHandler: Send + Sync {
    fn routes(&self) -> Router;
}
contract!(RouteHandler);

/// Group collecting every [`RouteHandler`].
pub struct HttpHandlers;

impl GroupKey for HttpHandlers {
    const NAME: &'static str = "http.handlers";
    type Member = dyn RouteHandler;
}

/// Register `ctor` as a member of [`HttpHandlers`].
pub fn as_handler<H, D, F>(app: &AppBuilder, ctor: F) -> Result<(), KernelError>
where
    H: RouteHandler + 'static,
    D: Dependencies,
    F: FnOnce(D, &mut Lifecycle) -> Result<H, BoxError> + Send + 'static,
{
    app.register_group_member::<HttpHandlers, D, _>(move |deps, lifecycle| {
        let handler: Arc<dyn RouteHandler> = Arc::new(ctor(deps, lifecycle)?);
        Ok(handler)
    })
}
