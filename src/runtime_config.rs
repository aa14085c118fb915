//! # Runtime Configuration Module
//!
//! Environment variable based configuration for the router.
//!
//! ## Environment Variables
//!
//! ### `ROUTECHAIN_STACK_SIZE`
//!
//! Stack size for the `may` coroutines that run blocking handlers. Accepts
//! decimal (`65536`) or hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! ### `ROUTECHAIN_REQUEST_ID_HEADER`
//!
//! Request header whose value is reused as the request id when it holds a
//! valid ULID. Default: `x-request-id`.
//!
//! ## Usage
//!
//! ```rust
//! use routechain::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

use crate::blocking::DEFAULT_STACK_SIZE;

pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for blocking-handler coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
    /// Header carrying an upstream request id
    pub request_id_header: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("ROUTECHAIN_STACK_SIZE")
            .ok()
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        let request_id_header = env::var("ROUTECHAIN_REQUEST_ID_HEADER")
            .ok()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_REQUEST_ID_HEADER.to_string());
        RuntimeConfig {
            stack_size,
            request_id_header,
        }
    }

    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    #[must_use]
    pub fn with_request_id_header(mut self, header: impl Into<String>) -> Self {
        self.request_id_header = header.into();
        self
    }
}

/// Decimal or `0x`-prefixed hex. Zero is rejected.
fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    let parsed = match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    };
    parsed.filter(|size| *size > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_decimal_and_hex() {
        assert_eq!(parse_size("32768"), Some(32768));
        assert_eq!(parse_size("0x8000"), Some(0x8000));
        assert_eq!(parse_size("0X4000"), Some(0x4000));
        assert_eq!(parse_size(" 1024 "), Some(1024));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("0xZZ"), None);
        assert_eq!(parse_size("0"), None);
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.stack_size, 0x10000);
        assert_eq!(config.request_id_header, "x-request-id");
    }

    #[test]
    fn test_builder_overrides() {
        let config = RuntimeConfig::default()
            .with_stack_size(0x8000)
            .with_request_id_header("x-correlation-id");
        assert_eq!(config.stack_size, 0x8000);
        assert_eq!(config.request_id_header, "x-correlation-id");
    }
}
