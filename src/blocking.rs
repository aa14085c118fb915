//! Blocking-handler adapter.
//!
//! A blocking handler is moved off the thread that advanced the chain onto a
//! `may` coroutine. The chain is suspended until the coroutine returns, then
//! resumes with whatever the handler returned.

use std::sync::Arc;

use may::coroutine;
use tracing::{debug, error};

use crate::context::{HandlerResult, Outcome, RoutingContext};
use crate::router::HandlerFn;

/// Stack size for blocking-handler coroutines (64 KB).
pub(crate) const DEFAULT_STACK_SIZE: usize = 0x10000;

pub(crate) fn wrap<F>(handler: F, stack_size: usize) -> HandlerFn
where
    F: Fn(&RoutingContext) -> HandlerResult + Send + Sync + 'static,
{
    let handler: HandlerFn = Arc::new(handler);
    Arc::new(move |ctx: &RoutingContext| {
        let continuation = ctx.continuation();
        let handler = Arc::clone(&handler);

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (Arc'd handler and context) and
        // panics are caught before they reach the scheduler.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    let ctx = continuation.context().clone();
                    debug!(request_id = %ctx.request_id(), stack_size, "Blocking handler start");
                    let result = ctx.invoke(&handler);
                    continuation.resolve(result);
                })
        };

        match spawned {
            Ok(_detached) => Ok(Outcome::Pending),
            Err(e) => {
                error!(
                    request_id = %ctx.request_id(),
                    error = %e,
                    stack_size,
                    "Failed to spawn blocking handler coroutine"
                );
                Err(anyhow::Error::new(e).context("failed to spawn blocking handler"))
            }
        }
    })
}
