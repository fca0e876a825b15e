//! The user lookup service: `GET /user?id=…` backed by the read-through cache.
//!
//! ```text
//! GET /user?id=1&id=x&id=2
//!
//! [{"id":1,"name":"John Doe"},{"id":0,"name":""},{"id":2,"name":"Jane Doe"}]
//! ```
//!
//! Each `id` is resolved concurrently through the shared cache, falling back
//! to the [`DataStore`] on a miss. The JSON array follows the order of the
//! `id` parameters. Ids that are not integers come back as the zero user.

use std::sync::Arc;

use tracing::{debug, error};

use crate::cache::ReadThrough;
use crate::resolver::{FanOutResolver, ResolveError};
use crate::router::Router;
use crate::store::{DataStore, User};
use crate::{Request, Response, StatusCode};

/// Serves user lookups from a cache in front of a data store.
pub struct UserService<C, S> {
    resolver: FanOutResolver<C>,
    store: Arc<S>,
}

impl<C, S> UserService<C, S>
where
    C: ReadThrough<i64, User> + 'static,
    S: DataStore + 'static,
{
    pub fn new(resolver: FanOutResolver<C>, store: Arc<S>) -> Self {
        Self { resolver, store }
    }

    pub fn resolver(&self) -> &FanOutResolver<C> {
        &self.resolver
    }

    /// Registers `/user` for every method and `GET /healthz` on `router`.
    pub fn mount(self: Arc<Self>, router: &mut Router) {
        router.any("/user", move |req: Request| {
            let service = Arc::clone(&self);
            async move { service.get_users(&req).await }
        });
        router.get("/healthz", |_req: Request| async {
            Response::new(StatusCode::Ok).body("ok")
        });
    }

    /// Handles `/user`. Only the query string is read.
    pub async fn get_users(&self, request: &Request) -> Response {
        let ids: Vec<&str> = request.query_params("id").collect();
        if ids.first().is_none_or(|id| id.is_empty()) {
            return Response::new(StatusCode::BadRequest).body("Missing user id");
        }

        let store = Arc::clone(&self.store);
        let fetch = Arc::new(move |id: &i64| store.get_user(*id));

        let resolution = match self.resolver.resolve_raw(ids.as_slice(), fetch).await {
            Ok(resolution) => resolution,
            Err(e @ ResolveError::DeadlineExceeded { .. }) => {
                error!(error = %e, ids = ids.len(), "user lookup timed out");
                return Response::new(StatusCode::GatewayTimeout).body(e.to_string());
            }
            Err(e) => {
                error!(error = %e, ids = ids.len(), "user lookup failed");
                return Response::new(StatusCode::InternalServerError)
                    .body("Internal Server Error");
            }
        };

        debug!(
            requested = ids.len(),
            skipped = resolution.skipped.len(),
            stats = ?self.resolver.cache().stats(),
            "users resolved"
        );

        Response::new(StatusCode::Ok)
            .json(&resolution.values)
            .unwrap_or_else(|e| {
                error!(error = %e, "failed to encode users");
                Response::new(StatusCode::InternalServerError).body("Internal Server Error")
            })
    }
}
