//! Router core module - route registration and the published route snapshot.
//!
//! Dispatches never lock the route list: every structural change (add,
//! remove, clear, reorder) builds a new sorted `Vec` and publishes it through
//! an [`ArcSwap`]. A dispatch keeps the `Arc` it started with, so a
//! concurrent mutation never changes the list under an in-flight chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::{Method, StatusCode};
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, info};

use super::route::{HandlerFn, Route};
use crate::context::{HandlerResult, PendingResponse, RoutingContext};
use crate::error::RouterError;
use crate::http_types::Request;
use crate::runtime_config::RuntimeConfig;

/// Maximum number of path/query parameters before heap allocation.
/// Most routes carry ≤4 path params (e.g. `/users/:id/posts/:post`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the compiled route
/// (known at registration); values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Callback for failure causes that reach the default responder.
pub type ExceptionHandler = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

pub(crate) struct RouterShared {
    routes: ArcSwap<Vec<Route>>,
    /// Serialises writers; readers only touch `routes`
    write_lock: Mutex<()>,
    sequence: AtomicU64,
    error_handlers: RwLock<HashMap<u16, HandlerFn>>,
    exception_handler: RwLock<Option<ExceptionHandler>>,
    pub(crate) config: RuntimeConfig,
}

impl RouterShared {
    fn publish<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Vec<Route>),
    {
        let _guard = self.write_lock.lock();
        let mut routes: Vec<Route> = Vec::clone(&self.routes.load());
        mutate(&mut routes);
        routes.sort_by_cached_key(Route::sort_key);
        self.routes.store(Arc::new(routes));
    }

    fn add(&self, route: Route) {
        debug!(route = %route, "Route added");
        self.publish(|routes| routes.push(route));
    }

    pub(crate) fn remove(&self, route: &Route) {
        let seq = route.seq();
        let mut removed = false;
        self.publish(|routes| {
            let before = routes.len();
            routes.retain(|r| r.seq() != seq);
            removed = routes.len() != before;
        });
        if removed {
            info!(route = %route, "Route removed");
        } else {
            debug!(route = %route, "Route was not registered; remove ignored");
        }
    }

    pub(crate) fn resort(&self) {
        self.publish(|_| {});
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Route>> {
        self.routes.load_full()
    }

    pub(crate) fn error_handler(&self, status: StatusCode) -> Option<HandlerFn> {
        self.error_handlers
            .read()
            .get(&status.as_u16())
            .map(Arc::clone)
    }

    pub(crate) fn exception_handler(&self) -> Option<ExceptionHandler> {
        self.exception_handler.read().as_ref().map(Arc::clone)
    }
}

/// Ordered collection of routes plus the dispatch entry point.
///
/// Cloning a `Router` is cheap and yields a handle to the same routes.
///
/// ```rust
/// use routechain::{Outcome, Request, Router};
/// use http::Method;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), routechain::RouterError> {
/// let router = Router::new();
/// router.route().handler(|ctx| {
///     ctx.response().write("hello ");
///     Ok(Outcome::Next)
/// });
/// router.get("/greet/:name")?.handler(|ctx| {
///     let name = ctx.path_param("name").unwrap_or_default();
///     ctx.response().end_with(name);
///     Ok(Outcome::Pending)
/// });
///
/// let pending = router.handle(Request::new(Method::GET, "/greet/tim"));
/// let response = pending.wait(Duration::from_secs(1)).expect("response");
/// assert_eq!(response.body_str(), "hello tim");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Router {
    pub(crate) shared: Arc<RouterShared>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! method_routes {
    ($($name:ident, $regex_name:ident => $method:expr;)*) => {
        $(
            #[doc = concat!("Route for `", stringify!($method), "` on an exact, prefix or parameterised path.")]
            ///
            /// # Errors
            ///
            /// See [`Router::route_path`].
            pub fn $name(&self, path: &str) -> Result<Route, RouterError> {
                self.route_method(Some($method), path)
            }

            #[doc = concat!("Route for `", stringify!($method), "` on a regex path.")]
            ///
            /// # Errors
            ///
            /// See [`Router::route_with_regex`].
            pub fn $regex_name(&self, pattern: &str) -> Result<Route, RouterError> {
                self.route_method_with_regex(Some($method), pattern)
            }
        )*
    };
}

impl Router {
    /// Create a router configured from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            shared: Arc::new(RouterShared {
                routes: ArcSwap::from_pointee(Vec::new()),
                write_lock: Mutex::new(()),
                sequence: AtomicU64::new(0),
                error_handlers: RwLock::new(HashMap::new()),
                exception_handler: RwLock::new(None),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    fn register<F>(&self, configure: F) -> Result<Route, RouterError>
    where
        F: FnOnce(&Route) -> Result<(), RouterError>,
    {
        let seq = self.shared.sequence.fetch_add(1, Ordering::SeqCst);
        let route = Route::new(&self.shared, seq);
        configure(&route)?;
        self.shared.add(route.clone());
        Ok(route)
    }

    /// A route matching every path and method.
    #[must_use]
    pub fn route(&self) -> Route {
        let seq = self.shared.sequence.fetch_add(1, Ordering::SeqCst);
        let route = Route::new(&self.shared, seq);
        self.shared.add(route.clone());
        route
    }

    /// A route for an exact, prefix or parameterised path, any method.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidPath`] or [`RouterError::DuplicateParameter`];
    /// nothing is registered on error.
    pub fn route_path(&self, path: &str) -> Result<Route, RouterError> {
        self.route_method(None, path)
    }

    /// A route for an optional method and a path.
    ///
    /// # Errors
    ///
    /// See [`Router::route_path`].
    pub fn route_method(&self, method: Option<Method>, path: &str) -> Result<Route, RouterError> {
        self.register(|route| {
            route.path(path)?;
            if let Some(method) = method {
                route.method(method);
            }
            Ok(())
        })
    }

    /// A route whose path is a regular expression, any method.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidRegex`]; nothing is registered on error.
    pub fn route_with_regex(&self, pattern: &str) -> Result<Route, RouterError> {
        self.route_method_with_regex(None, pattern)
    }

    /// A regex route for an optional method.
    ///
    /// # Errors
    ///
    /// See [`Router::route_with_regex`].
    pub fn route_method_with_regex(
        &self,
        method: Option<Method>,
        pattern: &str,
    ) -> Result<Route, RouterError> {
        self.register(|route| {
            route.path_regex(pattern)?;
            if let Some(method) = method {
                route.method(method);
            }
            Ok(())
        })
    }

    method_routes! {
        get, get_with_regex => Method::GET;
        head, head_with_regex => Method::HEAD;
        options, options_with_regex => Method::OPTIONS;
        put, put_with_regex => Method::PUT;
        post, post_with_regex => Method::POST;
        delete, delete_with_regex => Method::DELETE;
        trace, trace_with_regex => Method::TRACE;
        connect, connect_with_regex => Method::CONNECT;
        patch, patch_with_regex => Method::PATCH;
    }

    /// Mount `router` below `mount_point`.
    ///
    /// Requests for `mount_point` and everything under it run through
    /// `router` with the mount point stripped from the path, then continue
    /// here if `router` does not finish them. Mounting a router that is
    /// already on the chain is skipped at dispatch time.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidMountPoint`] unless `mount_point` starts with
    /// `/` and contains no `*` or `:`; nothing is registered on error.
    pub fn mount_sub_router(&self, mount_point: &str, router: &Router) -> Result<Route, RouterError> {
        if !mount_point.starts_with('/') || mount_point.contains(['*', ':']) {
            return Err(RouterError::InvalidMountPoint {
                path: mount_point.to_string(),
            });
        }
        let spec = format!("{}/*", mount_point.trim_end_matches('/'));
        let route = self.register(|route| {
            route.path(&spec)?;
            route.sub_router(router)?;
            Ok(())
        })?;
        info!(mount_point = %mount_point, "Sub-router mounted");
        Ok(route)
    }

    /// Routes in chain order, including disabled ones.
    #[must_use]
    pub fn get_routes(&self) -> Vec<Route> {
        Vec::clone(&self.shared.snapshot())
    }

    /// Remove every route. In-flight dispatches finish on their snapshot.
    pub fn clear(&self) -> &Self {
        let dropped = self.shared.snapshot().len();
        self.shared.publish(Vec::clear);
        info!(routes_dropped = dropped, "Routing table cleared");
        self
    }

    /// Observe every failure cause that reaches the default responder.
    pub fn exception_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&anyhow::Error) + Send + Sync + 'static,
    {
        *self.shared.exception_handler.write() = Some(Arc::new(handler));
        self
    }

    /// Customise the terminal response for `status`.
    ///
    /// Runs when an unhandled failure (or the unmatched 404) resolves to
    /// `status` and the response is still open. If it leaves the response
    /// open without returning [`Outcome::Pending`](crate::Outcome::Pending),
    /// the default status response is written afterwards.
    pub fn error_handler<F>(&self, status: StatusCode, handler: F) -> &Self
    where
        F: Fn(&RoutingContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.shared
            .error_handlers
            .write()
            .insert(status.as_u16(), Arc::new(handler));
        self
    }

    /// Dispatch a request through the chain.
    ///
    /// The chain starts on the calling thread and runs until a handler
    /// suspends it; the returned handle yields the response once it ends.
    #[must_use]
    pub fn handle(&self, request: Request) -> PendingResponse {
        let (context, pending) = RoutingContext::start(Arc::clone(&self.shared), request);
        context.next();
        pending
    }
}
