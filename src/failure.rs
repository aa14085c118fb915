//! Default Failure Responder.
//!
//! Terminal fallback for a chain that ran out of routes: a plain 404 when no
//! failure was recorded, otherwise the failure's status (explicit, or taken
//! from an [`HttpStatusError`](crate::HttpStatusError) cause, else 500).
//!
//! Before writing, the responder lets the router's exception handler observe
//! the cause and the per-status error handler customise the response. The
//! default body is the status's reason phrase and is only written if the
//! response is still open. The resolved failure is recorded on the context
//! only when the responder answers; a chain that ended its response and then
//! ran out of routes reports no failure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use tracing::{debug, error, info};

use crate::context::{panic_message, Failure, Outcome, RoutingContext};
use crate::http_types::reason_phrase;

impl RoutingContext {
    pub(crate) fn respond_unhandled(&self, failure: Failure) {
        let status = failure.effective_status();
        if !self.terminate() {
            debug!(request_id = %self.request_id(), "Chain already terminated");
            return;
        }

        let router = Arc::clone(&self.inner.router);

        if let (Some(cause), Some(observe)) = (failure.error(), router.exception_handler()) {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| observe(cause))) {
                error!(
                    request_id = %self.request_id(),
                    panic_message = %panic_message(panic.as_ref()),
                    "Exception handler panicked"
                );
            }
        }

        if self.response().ended() {
            debug!(
                request_id = %self.request_id(),
                status = status.as_u16(),
                "Response already ended; default failure response skipped"
            );
            return;
        }
        self.record_failure(failure.clone().with_resolved_status(status));

        if let Some(handler) = router.error_handler(status) {
            match self.invoke(&handler) {
                Ok(Outcome::Pending) => return,
                Ok(_) => {}
                Err(err) => error!(
                    request_id = %self.request_id(),
                    status = status.as_u16(),
                    error = %err,
                    "Error handler failed; writing default response"
                ),
            }
            if self.response().ended() {
                return;
            }
        }

        let response = self.response();
        if response.headers_written() {
            response.end();
        } else {
            response
                .set_status(status)
                .header(CONTENT_TYPE, "text/plain; charset=utf-8");
            response.end_with(reason_phrase(status));
        }
        info!(
            request_id = %self.request_id(),
            method = %self.method(),
            path = %self.normalized_path(),
            status = status.as_u16(),
            cause = ?failure.error().map(ToString::to_string),
            "Default failure response written"
        );
    }
}
