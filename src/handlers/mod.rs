//! Stock handlers built on the response callback registries.
//!
//! Mount them on a catch-all route ahead of the application's routes:
//!
//! ```rust
//! use routechain::handlers::{access_logger, response_time};
//! use routechain::Router;
//!
//! let router = Router::new();
//! router.route().order(-100).unwrap().handler(response_time());
//! router.route().order(-99).unwrap().handler(access_logger());
//! ```

mod logger;
mod response_time;

pub use logger::access_logger;
pub use response_time::{response_time, RESPONSE_TIME_HEADER};
