use std::fmt;
use std::sync::Arc;

use http::StatusCode;

use crate::error::HttpStatusError;

/// What a handler wants the chain to do after it returns.
#[derive(Debug)]
pub enum Outcome {
    /// Continue matching from the next route (or the next handler on this one)
    Next,
    /// Enter the failure chain with this failure
    Fail(Failure),
    /// The handler ended the response, or will continue the chain later via
    /// the context or a [`Continuation`](crate::Continuation)
    Pending,
}

/// Result every handler returns. `Err` is a failure with the error as cause.
pub type HandlerResult = anyhow::Result<Outcome>;

/// Failure record: an optional status code and an optional cause.
#[derive(Clone, Default)]
pub struct Failure {
    status: Option<StatusCode>,
    cause: Option<Arc<anyhow::Error>>,
}

impl Failure {
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            cause: None,
        }
    }

    pub fn cause(cause: impl Into<anyhow::Error>) -> Self {
        Self {
            status: None,
            cause: Some(Arc::new(cause.into())),
        }
    }

    pub fn with_status(status: StatusCode, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            status: Some(status),
            cause: Some(Arc::new(cause.into())),
        }
    }

    pub(crate) fn with_resolved_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Explicit status, if one was given.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    #[must_use]
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.cause.as_deref()
    }

    /// Status the default responder writes: the explicit status, else the
    /// status of an [`HttpStatusError`] cause, else 500.
    #[must_use]
    pub fn effective_status(&self) -> StatusCode {
        self.status
            .or_else(|| {
                self.cause
                    .as_deref()
                    .and_then(|e| e.downcast_ref::<HttpStatusError>())
                    .map(HttpStatusError::status)
            })
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("status", &self.status)
            .field("cause", &self.cause.as_deref().map(ToString::to_string))
            .finish()
    }
}

impl From<StatusCode> for Failure {
    fn from(status: StatusCode) -> Self {
        Failure::status(status)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(cause: anyhow::Error) -> Self {
        Failure::cause(cause)
    }
}
