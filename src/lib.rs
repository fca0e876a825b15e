//! # readthrough
//!
//! A concurrent read-through cache and an ordered fan-out resolver, served
//! over a small async HTTP/1.1 stack.
//!
//! - [`cache`]: get-or-compute memoization, safe under concurrent access.
//! - [`resolver`]: resolve many keys in parallel, return them in request order.
//! - [`service`]: `GET /user?id=…` wired to a slow [`store`] through the cache.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use readthrough::cache::KeyedCache;
//! use readthrough::resolver::FanOutResolver;
//! use readthrough::service::UserService;
//! use readthrough::store::{MockStore, User};
//! use readthrough::{Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = FanOutResolver::new(Arc::new(KeyedCache::<i64, User>::new()));
//!     let store = Arc::new(MockStore::seeded(Duration::from_millis(100)));
//!
//!     let mut router = Router::new();
//!     Arc::new(UserService::new(resolver, store)).mount(&mut router);
//!     let router = Arc::new(router);
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server
//!         .run(move |req| {
//!             let router = Arc::clone(&router);
//!             async move { router.route(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod http;
pub mod logging;
pub mod resolver;
pub mod router;
pub mod server;
pub mod service;
pub mod store;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
