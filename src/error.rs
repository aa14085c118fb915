use std::fmt;

use http::StatusCode;

/// Route configuration error
///
/// Returned synchronously by the `Router`/`Route` call that caused it. The
/// engine never recovers from these; the configuration call simply fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Path specification is empty or does not start with `/`
    InvalidPath {
        /// The rejected path specification
        path: String,
    },
    /// The same `:name` appears more than once in a parameterised path
    DuplicateParameter {
        /// The repeated parameter name
        name: String,
        /// The full path specification
        path: String,
    },
    /// A path (exact, prefix, parameterised or regex) was already set on the route
    PathAlreadySet {
        /// The path specification that is already in place
        existing: String,
    },
    /// The regular expression could not be compiled
    InvalidRegex {
        /// The rejected pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },
    /// Sub-router mount point is not a literal path starting with `/`
    InvalidMountPoint {
        /// The rejected mount point
        path: String,
    },
    /// The operation is not allowed in the route's current state
    InvalidState {
        /// What was attempted
        reason: &'static str,
    },
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::InvalidPath { path } => {
                write!(f, "invalid route path '{}': path must start with /", path)
            }
            RouterError::DuplicateParameter { name, path } => {
                write!(
                    f,
                    "cannot use identifier '{}' more than once in path '{}'",
                    name, path
                )
            }
            RouterError::PathAlreadySet { existing } => {
                write!(f, "route already has a path specification: {}", existing)
            }
            RouterError::InvalidRegex { pattern, reason } => {
                write!(f, "invalid route regex '{}': {}", pattern, reason)
            }
            RouterError::InvalidMountPoint { path } => write!(
                f,
                "invalid mount point '{}': must start with / and contain no '*' or ':'",
                path
            ),
            RouterError::InvalidState { reason } => write!(f, "invalid route state: {}", reason),
        }
    }
}

impl std::error::Error for RouterError {}

/// Failure cause that carries its own HTTP status.
///
/// When a handler fails with this error (directly or via `?`), the failure
/// chain and the default responder use its status instead of 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatusError {
    status: StatusCode,
    message: Option<String>,
}

impl HttpStatusError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
        }
    }

    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.status, msg),
            None => write!(f, "{}", self.status),
        }
    }
}

impl std::error::Error for HttpStatusError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_parameter_message_names_identifier() {
        let err = RouterError::DuplicateParameter {
            name: "abc".into(),
            path: "/blah/:abc/:abc".into(),
        };
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn test_http_status_error_survives_anyhow() {
        let err: anyhow::Error = HttpStatusError::new(StatusCode::FORBIDDEN).into();
        let status = err.downcast_ref::<HttpStatusError>().map(|e| e.status());
        assert_eq!(status, Some(StatusCode::FORBIDDEN));
    }
}
