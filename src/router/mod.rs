//! # Router Module
//!
//! Route registration, path matching and the ordered route list that the
//! dispatch chain walks.
//!
//! ## Overview
//!
//! - [`Router`] owns the routes and is the dispatch entry point
//!   ([`Router::handle`]).
//! - [`Route`] is one match-and-handle unit: a path spec, method set,
//!   `consumes`/`produces` declarations, and its success/failure handlers.
//! - [`pattern`] compiles path specs and normalises request paths.
//!
//! ## Ordering
//!
//! Routes are kept sorted by `(last, order, registration sequence)`. `order`
//! defaults to the registration sequence and can only be changed until the
//! first handler is attached. Disabled routes keep their position and are
//! skipped while matching.
//!
//! ## Concurrency
//!
//! The sorted list is published as an immutable snapshot on every structural
//! change; each dispatch walks the snapshot it started with.

mod core;
pub mod pattern;
mod route;

pub use core::{ExceptionHandler, ParamVec, Router, MAX_INLINE_PARAMS};
pub(crate) use core::RouterShared;
pub use route::{HandlerFn, HandlerKind, Route};
pub(crate) use route::MatchInput;
