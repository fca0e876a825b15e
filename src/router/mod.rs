//! Request routing: map a method and exact path to a handler.
//!
//! Paths are compared literally after trailing-slash normalization, so
//! `/user/` and `/user` are the same route. The first registered route whose
//! method and path both match wins; a route added with [`Router::any`] matches
//! every method. A path that is registered only for other
//! methods gets `405 Method Not Allowed`; an unknown path gets `404 Not Found`.
//!
//! Every dispatch emits one `info` record with method, path, status and
//! elapsed time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::info;

use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler.
pub type Handler =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Implemented for every `Fn(Request) -> impl Future<Output = Response> + Send`
/// that is `Send + Sync + 'static`.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler, boxing the returned future.
    fn call(&self, request: Request) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(request))
    }
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

struct Route {
    /// `None` matches every method.
    method: Option<Method>,
    path: String,
    handler: Handler,
}

/// HTTP request router.
///
/// # Examples
///
/// ```rust,no_run
/// use readthrough::{Request, Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/healthz", |_req: Request| async { Response::new(StatusCode::Ok).body("ok") });
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `GET` requests to `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for requests to `path` with any method.
    pub fn any(&mut self, path: &str, handler: impl IntoHandler) {
        self.push(None, path, handler);
    }

    /// Register a handler for `method` requests to `path`.
    pub fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        self.push(Some(method), path, handler);
    }

    fn push(&mut self, method: Option<Method>, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |req| handler.call(req));
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route and return its response.
    pub async fn route(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = normalize(request.path()).to_owned();

        let mut path_known = false;
        let mut handler = None;
        for route in self.routes.iter().filter(|r| r.path == path) {
            path_known = true;
            if route.method.as_ref().is_none_or(|m| *m == method) {
                handler = Some(Arc::clone(&route.handler));
                break;
            }
        }

        let response = match handler {
            Some(handler) => handler(request).await,
            None if path_known => Response::new(StatusCode::MethodNotAllowed),
            None => Response::new(StatusCode::NotFound),
        };

        info!(
            "{} {} - {} ({:?})",
            method,
            path,
            response.status().as_u16(),
            start.elapsed()
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn normalize_trailing_slash() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/user/"), "/user");
        assert_eq!(normalize("/user"), "/user");
    }

    #[test]
    fn router_starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let mut router = Router::new();
        router.get("/user", |_req: Request| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/users")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let mut router = Router::new();
        router.get("/user", |_req: Request| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("POST", "/user")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn query_string_and_trailing_slash_do_not_affect_match() {
        let mut router = Router::new();
        router.get("/user", |req: Request| async move {
            let ids = req.query_params("id").count();
            Response::new(StatusCode::Ok).body(ids.to_string())
        });
        let res = router.route(make_request("GET", "/user/?id=1&id=2")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_bytes(), b"2");
    }

    #[tokio::test]
    async fn any_route_accepts_every_method() {
        let mut router = Router::new();
        router.any("/user", |req: Request| async move {
            Response::new(StatusCode::Ok).body(req.method().to_string())
        });
        for method in ["GET", "POST", "DELETE"] {
            let res = router.route(make_request(method, "/user")).await;
            assert_eq!(res.status(), StatusCode::Ok);
            assert_eq!(res.body_bytes(), method.as_bytes());
        }
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_req: Request| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_req: Request| async {
            Response::new(StatusCode::NoContent)
        });
        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }
}
