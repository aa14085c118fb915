//! # Routing Context
//!
//! A [`RoutingContext`] is created for every dispatched request and carries
//! everything the handler chain shares: the cursor over the route snapshot,
//! merged query and path parameters, the negotiated content type, the failure
//! being handled, a typed value store, the response writer and the two
//! response callback registries.
//!
//! Handlers drive the chain by returning an [`Outcome`]:
//!
//! - `Outcome::Next` resumes matching after the current step
//! - `Outcome::Fail(..)` (or `Err(..)`, or a panic) enters the failure chain
//! - `Outcome::Pending` means the handler ended the response, or will
//!   continue later through the context or a [`Continuation`]
//!
//! ```rust
//! use std::time::Duration;
//! use routechain::{Outcome, Request, Router};
//! use http::Method;
//!
//! # fn main() -> Result<(), routechain::RouterError> {
//! let router = Router::new();
//! router.get("/slow")?.handler(|ctx| {
//!     let continuation = ctx.continuation();
//!     std::thread::spawn(move || {
//!         continuation.context().put("worker", "thread");
//!         continuation.next();
//!     });
//!     Ok(Outcome::Pending)
//! });
//! router.get("/slow")?.handler(|ctx| {
//!     let worker = ctx.get::<&str>("worker").map(|w| *w).unwrap_or_default();
//!     ctx.response().end_with(worker);
//!     Ok(Outcome::Pending)
//! });
//!
//! let pending = router.handle(Request::new(Method::GET, "/slow"));
//! let response = pending.wait(Duration::from_secs(5)).unwrap();
//! assert_eq!(response.body_str(), "thread");
//! # Ok(())
//! # }
//! ```

mod callbacks;
mod core;
mod outcome;
mod response;

pub use callbacks::{Callback, CallbackId};
pub(crate) use core::panic_message;
pub use core::{ChainState, Continuation, PendingResponse, RoutingContext};
pub use outcome::{Failure, HandlerResult, Outcome};
pub use response::Response;
