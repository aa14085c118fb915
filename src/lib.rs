//! # routechain
//!
//! **routechain** is an ordered, cooperative request-routing engine. Routes
//! are registered on a [`Router`] with a path pattern, method set and
//! content-type constraints; each incoming request walks the sorted route
//! list, and every matching route's handler gets a turn until one of them
//! ends the response.
//!
//! ## Overview
//!
//! - **[`router`]** - route registration, ordering, path pattern compilation
//!   and path normalisation
//! - **[`negotiation`]** - `Accept` / `Content-Type` parsing and matching
//! - **[`context`]** - the per-request [`RoutingContext`]: chain control,
//!   parameters, value store, response writer and response callbacks
//! - **[`http_types`]** - transport-agnostic [`Request`] and
//!   [`CompletedResponse`]
//! - **[`handlers`]** - stock handlers (response time header, access log)
//! - **[`runtime_config`]** / **[`logging`]** - environment-driven setup
//!
//! ## Request Flow
//!
//! ```text
//! Router::handle(request)
//!   -> RoutingContext over the current route snapshot
//!   -> next(): first matching route's handler runs
//!        Outcome::Next     -> keep scanning after that route
//!        Outcome::Pending  -> handler ended the response or resumes later
//!        Outcome::Fail / Err / panic -> failure chain from the same cursor
//!   -> routes exhausted: 404, or the failure's status via the default
//!      failure responder
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use http::{Method, StatusCode};
//! use routechain::{Outcome, Request, Router};
//!
//! # fn main() -> Result<(), routechain::RouterError> {
//! let router = Router::new();
//!
//! router.get("/pets/:id")?.produces("application/json").handler(|ctx| {
//!     let id = ctx.path_param("id").unwrap_or_default();
//!     if id == "0" {
//!         return Ok(Outcome::Fail(StatusCode::BAD_REQUEST.into()));
//!     }
//!     ctx.response().end_json(&serde_json::json!({ "id": id }))?;
//!     Ok(Outcome::Pending)
//! });
//!
//! let ok = router
//!     .handle(Request::new(Method::GET, "/pets/7"))
//!     .wait(Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(ok.body_str(), r#"{"id":"7"}"#);
//!
//! let bad = router
//!     .handle(Request::new(Method::GET, "/pets/0"))
//!     .wait(Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(bad.status, StatusCode::BAD_REQUEST);
//! assert_eq!(bad.body_str(), "Bad Request");
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Route mutation publishes a fresh sorted snapshot; a request in flight
//! keeps the snapshot it started with. Handlers may continue the chain from
//! any thread or `may` coroutine through [`RoutingContext::next`] or a
//! [`Continuation`]; [`Route::blocking_handler`] does that for you.

mod blocking;
pub mod context;
pub mod error;
mod failure;
pub mod handlers;
pub mod http_types;
pub mod ids;
pub mod logging;
pub mod negotiation;
pub mod router;
pub mod runtime_config;

pub use context::{
    CallbackId, ChainState, Continuation, Failure, HandlerResult, Outcome, PendingResponse,
    Response, RoutingContext,
};
pub use error::{HttpStatusError, RouterError};
pub use http_types::{CompletedResponse, Request};
pub use ids::RequestId;
pub use negotiation::MediaType;
pub use router::{HandlerFn, HandlerKind, Route, Router};
pub use runtime_config::RuntimeConfig;
