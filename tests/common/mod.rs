#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use http::Method;
use routechain::{CompletedResponse, Request, Router, RuntimeConfig};

pub const WAIT: Duration = Duration::from_secs(5);

static TRACING_INIT: Once = Once::new();
static MAY_INIT: Once = Once::new();

/// Route test logs through the libtest writer so they only show on failure.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("routechain=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Ensures May coroutines are configured only once
pub fn setup_may_runtime() {
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
    });
}

pub fn router() -> Router {
    init_tracing();
    Router::with_config(RuntimeConfig::default())
}

pub fn get(path: &str) -> Request {
    Request::new(Method::GET, path)
}

/// Dispatch and wait for the response.
pub fn dispatch(router: &Router, request: Request) -> CompletedResponse {
    router
        .handle(request)
        .wait(WAIT)
        .expect("response within timeout")
}

/// Shared, ordered record of what ran.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
