use std::fmt;
use std::sync::{Arc, Weak};

use http::Method;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::core::{ParamVec, Router, RouterShared};
use super::pattern::PathMatcher;
use crate::blocking;
use crate::context::{HandlerResult, Outcome, RoutingContext};
use crate::error::RouterError;
use crate::negotiation::{consumes_match, MediaType, Negotiation};

/// Handler stored on a route: one step of the success or failure chain.
pub type HandlerFn = Arc<dyn Fn(&RoutingContext) -> HandlerResult + Send + Sync>;

/// Which chain a handler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Success,
    Failure,
}

pub(crate) struct RouteConfig {
    matcher: Option<PathMatcher>,
    methods: SmallVec<[Method; 4]>,
    consumes: Vec<MediaType>,
    produces: Vec<MediaType>,
    order: i32,
    last: bool,
    enabled: bool,
    active: bool,
    handlers: Vec<HandlerFn>,
    failure_handlers: Vec<HandlerFn>,
}

pub(crate) struct RouteInner {
    /// Registration sequence; final tie-breaker in the chain order
    seq: u64,
    router: Weak<RouterShared>,
    config: RwLock<RouteConfig>,
}

/// What a route contributed when it matched a request.
#[derive(Debug, Default)]
pub(crate) struct RouteMatch {
    pub(crate) params: ParamVec,
    pub(crate) acceptable: Option<MediaType>,
}

/// Request attributes consulted while matching.
pub(crate) struct MatchInput<'a> {
    pub(crate) method: &'a Method,
    pub(crate) path: &'a str,
    pub(crate) content_type: Option<&'a str>,
    pub(crate) accept: Option<&'a str>,
}

/// One registered match-and-handle unit.
///
/// `Route` is a cheap handle; clones refer to the same route. Configuration
/// methods are fluent and take `&self`, so a route can be built in one
/// expression:
///
/// ```rust
/// use routechain::{Outcome, Router};
///
/// # fn main() -> Result<(), routechain::RouterError> {
/// let router = Router::new();
/// router
///     .get("/pets/:id")?
///     .produces("application/json")
///     .handler(|ctx| {
///         let id = ctx.path_param("id").unwrap_or_default();
///         ctx.response().end_with(format!("{{\"id\":\"{id}\"}}"));
///         Ok(Outcome::Pending)
///     });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Route {
    pub(crate) inner: Arc<RouteInner>,
}

impl Route {
    pub(crate) fn new(router: &Arc<RouterShared>, seq: u64) -> Self {
        let order = i32::try_from(seq).unwrap_or(i32::MAX);
        Self {
            inner: Arc::new(RouteInner {
                seq,
                router: Arc::downgrade(router),
                config: RwLock::new(RouteConfig {
                    matcher: None,
                    methods: SmallVec::new(),
                    consumes: Vec::new(),
                    produces: Vec::new(),
                    order,
                    last: false,
                    enabled: true,
                    active: false,
                    handlers: Vec::new(),
                    failure_handlers: Vec::new(),
                }),
            }),
        }
    }

    /// Set an exact (`/a/b`), prefix (`/a*`) or parameterised (`/a/:id`) path.
    ///
    /// # Errors
    ///
    /// Fails if the route already has a path, the path does not start with
    /// `/`, or a parameter name repeats.
    pub fn path(&self, spec: &str) -> Result<&Self, RouterError> {
        self.set_matcher(|| PathMatcher::compile(spec))
    }

    /// Match the normalised path against a regular expression.
    ///
    /// # Errors
    ///
    /// Fails if the route already has a path or the regex does not compile.
    pub fn path_regex(&self, pattern: &str) -> Result<&Self, RouterError> {
        self.set_matcher(|| PathMatcher::compile_regex(pattern))
    }

    fn set_matcher<F>(&self, compile: F) -> Result<&Self, RouterError>
    where
        F: FnOnce() -> Result<PathMatcher, RouterError>,
    {
        let mut config = self.inner.config.write();
        if let Some(existing) = &config.matcher {
            return Err(RouterError::PathAlreadySet {
                existing: existing.describe(),
            });
        }
        config.matcher = Some(compile()?);
        Ok(self)
    }

    /// Accept `method`. A route without methods accepts every method.
    pub fn method(&self, method: Method) -> &Self {
        let mut config = self.inner.config.write();
        if !config.methods.contains(&method) {
            config.methods.push(method);
        }
        self
    }

    /// Require the request `Content-Type` to match `content_type`.
    pub fn consumes(&self, content_type: &str) -> &Self {
        self.inner
            .config
            .write()
            .consumes
            .push(MediaType::parse(content_type));
        self
    }

    /// Declare a content type this route can produce.
    pub fn produces(&self, content_type: &str) -> &Self {
        self.inner
            .config
            .write()
            .produces
            .push(MediaType::parse(content_type));
        self
    }

    /// Set the chain position. Lower runs first.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidState`] once a handler has been attached.
    pub fn order(&self, order: i32) -> Result<&Self, RouterError> {
        {
            let mut config = self.inner.config.write();
            if config.active {
                return Err(RouterError::InvalidState {
                    reason: "cannot change order after route is active",
                });
            }
            config.order = order;
            config.last = false;
        }
        self.republish();
        Ok(self)
    }

    /// Move the route behind every route not marked `last`.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidState`] once a handler has been attached.
    pub fn last(&self) -> Result<&Self, RouterError> {
        {
            let mut config = self.inner.config.write();
            if config.active {
                return Err(RouterError::InvalidState {
                    reason: "cannot change order after route is active",
                });
            }
            config.last = true;
        }
        self.republish();
        Ok(self)
    }

    pub fn enable(&self) -> &Self {
        self.inner.config.write().enabled = true;
        self
    }

    /// Skip this route during matching. It keeps its place in the chain.
    pub fn disable(&self) -> &Self {
        self.inner.config.write().enabled = false;
        self
    }

    /// Detach from the router. Dispatches started afterwards never see it.
    pub fn remove(&self) -> &Self {
        match self.inner.router.upgrade() {
            Some(router) => router.remove(self),
            None => debug!(route = %self, "Route outlived its router; nothing to remove"),
        }
        self
    }

    /// Append a success-chain handler and freeze the route's order.
    pub fn handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&RoutingContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.attach(HandlerKind::Success, Arc::new(handler))
    }

    /// Append a success-chain handler that runs on a `may` coroutine instead
    /// of the thread that advanced the chain.
    pub fn blocking_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&RoutingContext) -> HandlerResult + Send + Sync + 'static,
    {
        let stack_size = self
            .inner
            .router
            .upgrade()
            .map_or(blocking::DEFAULT_STACK_SIZE, |r| r.config.stack_size);
        self.attach(HandlerKind::Success, blocking::wrap(handler, stack_size))
    }

    /// Append a failure-chain handler and freeze the route's order.
    pub fn failure_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&RoutingContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.attach(HandlerKind::Failure, Arc::new(handler))
    }

    /// Hand matching requests to `router`, which sees the path with this
    /// route's prefix stripped. Both chains pass through: success and
    /// failure handlers of `router` run in place of this route, and when
    /// `router` runs out of routes the chain resumes after this one.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidState`] if the route already has handlers or
    /// its path is not a prefix (`/api/*`). A route without a path mounts at
    /// `/`.
    pub fn sub_router(&self, router: &Router) -> Result<&Self, RouterError> {
        let mount = {
            let config = self.inner.config.read();
            if config.active {
                return Err(RouterError::InvalidState {
                    reason: "sub-router route cannot carry other handlers",
                });
            }
            match &config.matcher {
                None => String::new(),
                Some(PathMatcher::Prefix { prefix }) => prefix.trim_end_matches('/').to_string(),
                Some(_) => {
                    return Err(RouterError::InvalidState {
                        reason: "sub-router requires a prefix path",
                    })
                }
            }
        };

        let child = Arc::clone(&router.shared);
        let mount_sub_router: HandlerFn = Arc::new(move |ctx: &RoutingContext| -> HandlerResult {
            ctx.enter_sub_router(&child, &mount);
            Ok(Outcome::Next)
        });
        self.attach(HandlerKind::Success, Arc::clone(&mount_sub_router));
        self.attach(HandlerKind::Failure, mount_sub_router);
        Ok(self)
    }

    fn attach(&self, kind: HandlerKind, handler: HandlerFn) -> &Self {
        let mut config = self.inner.config.write();
        match kind {
            HandlerKind::Success => config.handlers.push(handler),
            HandlerKind::Failure => config.failure_handlers.push(handler),
        }
        config.active = true;
        self
    }

    /// The literal path of an exact, prefix (without `*`) or parameterised
    /// route. `None` for regex routes and routes without a path.
    #[must_use]
    pub fn get_path(&self) -> Option<String> {
        self.inner
            .config
            .read()
            .matcher
            .as_ref()
            .and_then(|m| m.path().map(str::to_string))
    }

    #[must_use]
    pub fn get_order(&self) -> i32 {
        self.inner.config.read().order
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.inner.config.read().last
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.config.read().enabled
    }

    /// True once a success or failure handler is attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.config.read().active
    }

    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        self.inner.config.read().methods.to_vec()
    }

    /// Whether two handles refer to the same route.
    #[must_use]
    pub fn same_route(&self, other: &Route) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn seq(&self) -> u64 {
        self.inner.seq
    }

    pub(crate) fn sort_key(&self) -> (bool, i32, u64) {
        let config = self.inner.config.read();
        (config.last, config.order, self.inner.seq)
    }

    pub(crate) fn handler_at(&self, kind: HandlerKind, idx: usize) -> Option<HandlerFn> {
        let config = self.inner.config.read();
        let list = match kind {
            HandlerKind::Success => &config.handlers,
            HandlerKind::Failure => &config.failure_handlers,
        };
        list.get(idx).map(Arc::clone)
    }

    /// Evaluate this route's predicates.
    ///
    /// The failure chain only looks at method and path; content negotiation
    /// is skipped there.
    pub(crate) fn try_match(&self, input: &MatchInput<'_>, kind: HandlerKind) -> Option<RouteMatch> {
        let config = self.inner.config.read();
        if !config.enabled {
            return None;
        }
        if !config.methods.is_empty() && !config.methods.contains(input.method) {
            return None;
        }
        let params = match &config.matcher {
            Some(matcher) => matcher.matches(input.path)?,
            None => ParamVec::new(),
        };
        if kind == HandlerKind::Failure {
            return Some(RouteMatch {
                params,
                acceptable: None,
            });
        }

        if !consumes_match(input.content_type, &config.consumes) {
            return None;
        }
        let acceptable = match Negotiation::evaluate(input.accept, &config.produces) {
            Negotiation::NotApplicable => None,
            Negotiation::Selected(media) => Some(media),
            Negotiation::Rejected => return None,
        };
        Some(RouteMatch { params, acceptable })
    }

    fn republish(&self) {
        if let Some(router) = self.inner.router.upgrade() {
            router.resort();
        } else {
            warn!(route = %self, "Route order changed after its router was dropped");
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.inner.config.read();
        let path = config
            .matcher
            .as_ref()
            .map_or_else(|| "any".to_string(), PathMatcher::describe);
        write!(f, "Route[#{} {} order:{}", self.inner.seq, path, config.order)?;
        if config.last {
            f.write_str(" last")?;
        }
        if !config.methods.is_empty() {
            let methods: Vec<&str> = config.methods.iter().map(Method::as_str).collect();
            write!(f, " methods:[{}]", methods.join(","))?;
        }
        write!(
            f,
            " handlers:{} failureHandlers:{}]",
            config.handlers.len(),
            config.failure_handlers.len()
        )
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
