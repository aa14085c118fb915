//! # Content Negotiation
//!
//! Evaluates a route's `consumes` / `produces` declarations against the
//! request's `Content-Type` and `Accept` headers.
//!
//! ## Media ranges
//!
//! Every declaration and every header entry is parsed into a [`MediaType`]:
//! `type/subtype` with optional `;key=value` parameters. Either side may be
//! the wildcard `*`, and a bare token without a `/` (e.g. `json`) is read as
//! `*/json`. Matching is wildcard-aware on both sides and ignores parameters.
//!
//! ## Selection
//!
//! For `produces`, each `Accept` entry that matches at least one declared
//! type competes with its quality value (`q`, default `1.0`). The highest
//! quality wins; ties go to the entry that appears first in the header, not
//! to the declaration order on the route.
//!
//! ```rust
//! use routechain::negotiation::{parse_accept, select_produced, MediaType};
//!
//! let produces = vec![MediaType::parse("application/json"), MediaType::parse("text/plain")];
//! let accept = parse_accept("text/html,text/plain;q=0.9,application/json");
//! let chosen = select_produced(&accept, &produces).map(|m| m.raw().to_string());
//! assert_eq!(chosen.as_deref(), Some("application/json"));
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{
    consumes_match, parse_accept, select_produced, split_header_values, MediaType, Negotiation,
};
