//! Dispatch state machine.
//!
//! ```text
//! MATCHING --(route matched)--> SUCCESS --(next)--> SUCCESS ... --(exhausted)--> 404
//!                                  |
//!                          (fail / Err / panic)
//!                                  v
//!                               FAILURE --(next)--> FAILURE ... --(exhausted)--> default responder
//!                                  |
//!                        (failure handler Err / panic)
//!                                  v
//!                          default responder (original failure)
//! ```
//!
//! The engine never advances on its own: every step is triggered by a
//! handler's returned [`Outcome`], an explicit [`RoutingContext::next`] /
//! [`RoutingContext::fail`], or a [`Continuation`] fired from another thread
//! or coroutine. No lock is held while a handler runs, so handlers may call
//! back into the context synchronously.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use http::{Method, StatusCode};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::callbacks::{CallbackId, CallbackRegistry};
use super::outcome::{Failure, HandlerResult, Outcome};
use super::response::{Response, ResponseState};
use crate::error::RouterError;
use crate::http_types::{CompletedResponse, Request};
use crate::ids::RequestId;
use crate::negotiation::MediaType;
use crate::router::pattern::normalize_path;
use crate::router::{HandlerFn, HandlerKind, MatchInput, ParamVec, Route, RouterShared};

/// Where the chain currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Created, no route entered yet
    Matching,
    /// Running success handlers
    Success,
    /// Running failure handlers
    Failure,
    /// The engine has finished with this request (404, default failure
    /// response, or abort)
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureSource {
    /// `fail(...)` or `Outcome::Fail`
    Explicit,
    /// `Err` or panic out of a handler
    Raised,
}

/// One router's position in the chain. Entering a mounted sub-router pushes
/// a frame; exhausting it resumes the parent where it left off.
struct Frame {
    router: Arc<RouterShared>,
    routes: Arc<Vec<Route>>,
    /// Accumulated mount point; empty for the root router
    mount: String,
    /// Path this frame's routes are matched against
    path: String,
    /// Index of the next route to examine
    cursor: usize,
    /// Route whose handlers are running
    current: Option<usize>,
    /// Next handler index on `current`
    next_handler: usize,
}

impl Frame {
    fn new(router: Arc<RouterShared>, mount: String, path: String) -> Self {
        let routes = router.snapshot();
        Self {
            router,
            routes,
            mount,
            path,
            cursor: 0,
            current: None,
            next_handler: 0,
        }
    }

    fn current_route(&self) -> Option<&Route> {
        self.current.and_then(|idx| self.routes.get(idx))
    }
}

struct DispatchState {
    chain: ChainState,
    /// Never empty while the chain runs; the root router is at the bottom
    frames: Vec<Frame>,
    /// Incremented on every handler invocation
    visit: u64,
    /// The current visit has already been continued or failed
    continued: bool,
    failure: Option<Failure>,
    /// Method and path being routed; they differ from the request after a
    /// reroute
    method: Method,
    normalized_path: String,
    query_params: ParamVec,
    path_params: ParamVec,
    acceptable: Option<MediaType>,
    aborted: bool,
}

enum Step {
    Invoke {
        handler: HandlerFn,
        visit: u64,
    },
    Exhausted,
    Halted,
}

pub(crate) struct ContextInner {
    request_id: RequestId,
    request: Request,
    accept: Option<String>,
    pub(crate) router: Arc<RouterShared>,
    started: Instant,
    state: Mutex<DispatchState>,
    pub(crate) response: Mutex<ResponseState>,
    data: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    pub(crate) pre_response: CallbackRegistry,
    pub(crate) post_body: CallbackRegistry,
    completion: Mutex<Option<mpsc::Sender<CompletedResponse>>>,
}

/// Per-request state threaded through the handler chain.
///
/// Cheap to clone; clones share the same request. Handlers receive a
/// reference and may clone it into timers, threads or coroutines to continue
/// the chain later.
#[derive(Clone)]
pub struct RoutingContext {
    pub(crate) inner: Arc<ContextInner>,
}

/// Continuation bound to one handler invocation.
///
/// Consuming it continues the chain exactly once. If the chain has already
/// moved past that invocation, it does nothing.
pub struct Continuation {
    ctx: RoutingContext,
    visit: u64,
}

/// Handle to a dispatched request's eventual response.
pub struct PendingResponse {
    context: RoutingContext,
    receiver: mpsc::Receiver<CompletedResponse>,
}

fn set_param(params: &mut ParamVec, name: Arc<str>, value: String) {
    match params.iter_mut().find(|(k, _)| *k == name) {
        Some(slot) => slot.1 = value,
        None => params.push((name, value)),
    }
}

fn parse_query(query: Option<&str>) -> ParamVec {
    let mut params = ParamVec::new();
    if let Some(query) = query {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            set_param(&mut params, Arc::from(name.as_ref()), value.into_owned());
        }
    }
    params
}

/// Path seen by a router mounted at `mount` below a router matching `path`.
fn strip_mount(path: &str, mount: &str) -> String {
    match path.strip_prefix(mount) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        Some(rest) => format!("/{rest}"),
        None => path.to_string(),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl RoutingContext {
    pub(crate) fn start(router: Arc<RouterShared>, request: Request) -> (Self, PendingResponse) {
        let request_id =
            RequestId::from_header_or_new(request.header(&router.config.request_id_header));
        let normalized_path = normalize_path(request.path());
        let accept = request.accept();
        let query_params = parse_query(request.query());
        let method = request.method().clone();
        let root = Frame::new(Arc::clone(&router), String::new(), normalized_path.clone());
        let (tx, rx) = mpsc::channel();

        debug!(
            request_id = %request_id,
            method = %method,
            path = %request.path(),
            normalized_path = %normalized_path,
            routes = root.routes.len(),
            "Dispatch start"
        );

        let context = RoutingContext {
            inner: Arc::new(ContextInner {
                request_id,
                request,
                accept,
                router,
                started: Instant::now(),
                state: Mutex::new(DispatchState {
                    chain: ChainState::Matching,
                    frames: vec![root],
                    visit: 0,
                    continued: false,
                    failure: None,
                    method,
                    normalized_path,
                    query_params,
                    path_params: ParamVec::new(),
                    acceptable: None,
                    aborted: false,
                }),
                response: Mutex::new(ResponseState::default()),
                data: Mutex::new(HashMap::new()),
                pre_response: CallbackRegistry::new("pre_response"),
                post_body: CallbackRegistry::new("post_body"),
                completion: Mutex::new(Some(tx)),
            }),
        };
        let pending = PendingResponse {
            context: context.clone(),
            receiver: rx,
        };
        (context, pending)
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.inner.request_id
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// Method being routed. Same as the request's unless rerouted.
    #[must_use]
    pub fn method(&self) -> Method {
        self.inner.state.lock().method.clone()
    }

    /// Request path after normalisation; what root route paths are matched
    /// against. Reflects the latest [`RoutingContext::reroute`].
    #[must_use]
    pub fn normalized_path(&self) -> String {
        self.inner.state.lock().normalized_path.clone()
    }

    /// Where the router running the current route is mounted. `None` on the
    /// root router.
    #[must_use]
    pub fn mount_point(&self) -> Option<String> {
        let state = self.inner.state.lock();
        state
            .frames
            .last()
            .map(|frame| frame.mount.clone())
            .filter(|mount| !mount.is_empty())
    }

    /// Time since the dispatch started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    // ---------------------------------------------------------------------
    // Chain control
    // ---------------------------------------------------------------------

    /// Resume matching after the current step.
    ///
    /// Acts on whatever step is current when it is called. Code that may run
    /// after the chain has moved on should hold a [`Continuation`] instead.
    pub fn next(&self) {
        self.advance(None);
    }

    /// Enter the failure chain. Accepts a [`StatusCode`], an
    /// [`anyhow::Error`] or a full [`Failure`].
    pub fn fail(&self, failure: impl Into<Failure>) {
        self.apply_failure(None, failure.into(), FailureSource::Explicit);
    }

    /// Enter the failure chain with `cause`.
    pub fn fail_with(&self, cause: impl Into<anyhow::Error>) {
        self.fail(Failure::cause(cause));
    }

    /// Token that continues the chain from the current step, exactly once.
    #[must_use]
    pub fn continuation(&self) -> Continuation {
        Continuation {
            ctx: self.clone(),
            visit: self.inner.state.lock().visit,
        }
    }

    #[must_use]
    pub fn chain_state(&self) -> ChainState {
        self.inner.state.lock().chain
    }

    /// Status recorded by the failure that is being handled.
    ///
    /// `None` outside the failure chain or when the failure carries only a
    /// cause.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.inner
            .state
            .lock()
            .failure
            .as_ref()
            .and_then(Failure::status_code)
    }

    #[must_use]
    pub fn failure(&self) -> Option<Failure> {
        self.inner.state.lock().failure.clone()
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.inner.state.lock().failure.is_some()
    }

    /// Route whose handler is running.
    #[must_use]
    pub fn current_route(&self) -> Option<Route> {
        let state = self.inner.state.lock();
        state.frames.last().and_then(Frame::current_route).cloned()
    }

    /// Restart routing as if the request had arrived as `method` `path`.
    ///
    /// `path` may carry a query string, which replaces the query parameters.
    /// The failure, path parameters, negotiated type, response status and
    /// headers and both callback registries are reset, then matching starts
    /// again from the first route of the root router. [`Self::request`] still
    /// returns the request as received.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidPath`] if `path` does not start with `/`;
    /// [`RouterError::InvalidState`] if the request was aborted or the
    /// response headers are already written.
    pub fn reroute(&self, method: Method, path: &str) -> Result<(), RouterError> {
        if !path.starts_with('/') {
            return Err(RouterError::InvalidPath {
                path: path.to_string(),
            });
        }
        if self.is_aborted() {
            return Err(RouterError::InvalidState {
                reason: "cannot reroute an aborted request",
            });
        }
        {
            let mut response = self.inner.response.lock();
            if response.headers_written || response.committing || response.ended {
                return Err(RouterError::InvalidState {
                    reason: "cannot reroute after the response headers were written",
                });
            }
            response.status = StatusCode::OK;
            response.headers.clear();
        }
        self.inner.pre_response.reset();
        self.inner.post_body.reset();

        let (target, query) = match path.split_once('?') {
            Some((target, query)) => (target, Some(query)),
            None => (path, None),
        };
        let normalized_path = normalize_path(target);
        {
            let mut state = self.inner.state.lock();
            info!(
                request_id = %self.inner.request_id,
                from_method = %state.method,
                from = %state.normalized_path,
                method = %method,
                to = %normalized_path,
                "Rerouting"
            );
            let root = Frame::new(
                Arc::clone(&self.inner.router),
                String::new(),
                normalized_path.clone(),
            );
            state.frames.clear();
            state.frames.push(root);
            state.method = method;
            state.normalized_path = normalized_path;
            state.query_params = parse_query(query);
            state.path_params.clear();
            state.acceptable = None;
            state.failure = None;
            state.chain = ChainState::Matching;
            // Continuations handed out before the reroute go stale
            state.visit += 1;
            state.continued = false;
        }
        self.next();
        Ok(())
    }

    /// Push a frame for `child`, mounted at `mount` below the current router.
    pub(crate) fn enter_sub_router(&self, child: &Arc<RouterShared>, mount: &str) {
        let mut state = self.inner.state.lock();
        if state.frames.iter().any(|frame| Arc::ptr_eq(&frame.router, child)) {
            warn!(
                request_id = %self.inner.request_id,
                mount_point = %mount,
                "Router is already on the chain; sub-router skipped"
            );
            return;
        }
        let Some(parent) = state.frames.last() else {
            return;
        };
        let path = strip_mount(&parent.path, mount);
        let mount_point = format!("{}{}", parent.mount, mount);
        debug!(
            request_id = %self.inner.request_id,
            mount_point = %mount_point,
            path = %path,
            "Entering sub-router"
        );
        state
            .frames
            .push(Frame::new(Arc::clone(child), mount_point, path));
    }

    /// Tear the request down without going through the chain, e.g. when the
    /// client disconnected. Stored data and pending callbacks are dropped and
    /// later `next()`/`fail()` calls are ignored.
    pub fn abort(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.aborted {
                return;
            }
            state.aborted = true;
            state.chain = ChainState::Terminated;
        }
        self.inner.data.lock().clear();
        self.inner.pre_response.clear();
        self.inner.post_body.clear();
        self.inner.response.lock().ended = true;
        self.inner.completion.lock().take();
        info!(
            request_id = %self.inner.request_id,
            elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Request aborted"
        );
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.state.lock().aborted
    }

    pub(crate) fn advance(&self, token: Option<u64>) {
        if self.claim(token) {
            self.run_chain();
        }
    }

    /// Mark the current step as continued. False if the chain is finished or
    /// `token` no longer names the current step.
    fn claim(&self, token: Option<u64>) -> bool {
        let mut state = self.inner.state.lock();
        if state.aborted || state.chain == ChainState::Terminated {
            debug!(request_id = %self.inner.request_id, "next() after chain terminated ignored");
            return false;
        }
        if let Some(visit) = token {
            if visit != state.visit || state.continued {
                debug!(
                    request_id = %self.inner.request_id,
                    visit,
                    current_visit = state.visit,
                    "Stale continuation ignored"
                );
                return false;
            }
        }
        state.continued = true;
        true
    }

    fn run_chain(&self) {
        loop {
            let (handler, visit) = match self.find_next() {
                Step::Invoke { handler, visit } => (handler, visit),
                Step::Exhausted => {
                    self.finish_chain();
                    return;
                }
                Step::Halted => return,
            };

            match self.invoke(&handler) {
                Ok(Outcome::Next) => {
                    if !self.claim(Some(visit)) {
                        return;
                    }
                }
                Ok(Outcome::Pending) => return,
                Ok(Outcome::Fail(failure)) => {
                    self.apply_failure(Some(visit), failure, FailureSource::Explicit);
                    return;
                }
                Err(err) => {
                    self.apply_failure(Some(visit), Failure::cause(err), FailureSource::Raised);
                    return;
                }
            }
        }
    }

    fn find_next(&self) -> Step {
        let inner = &self.inner;
        let mut guard = inner.state.lock();
        let state = &mut *guard;
        if state.aborted || state.chain == ChainState::Terminated {
            return Step::Halted;
        }
        let kind = if state.failure.is_some() {
            HandlerKind::Failure
        } else {
            HandlerKind::Success
        };
        let content_type = inner.request.content_type();
        let accept = inner.accept.as_deref();

        loop {
            let depth = state.frames.len();
            let Some(frame) = state.frames.last_mut() else {
                return Step::Exhausted;
            };

            // Remaining handlers on the route we are already in
            if let Some(handler) = frame
                .current_route()
                .and_then(|route| route.handler_at(kind, frame.next_handler))
            {
                frame.next_handler += 1;
                return Self::enter(state, handler, kind);
            }

            let input = MatchInput {
                method: &state.method,
                path: &frame.path,
                content_type,
                accept,
            };

            while let Some(route) = frame.routes.get(frame.cursor) {
                let idx = frame.cursor;
                frame.cursor += 1;

                let Some(handler) = route.handler_at(kind, 0) else {
                    continue;
                };
                let Some(matched) = route.try_match(&input, kind) else {
                    continue;
                };

                debug!(
                    request_id = %inner.request_id,
                    route = %route,
                    chain = ?kind,
                    path_params = ?matched.params,
                    "Route matched"
                );
                for (name, value) in matched.params {
                    set_param(&mut state.path_params, name, value);
                }
                if let Some(acceptable) = matched.acceptable {
                    state.acceptable = Some(acceptable);
                }
                frame.current = Some(idx);
                frame.next_handler = 1;
                return Self::enter(state, handler, kind);
            }

            frame.current = None;
            if depth == 1 {
                return Step::Exhausted;
            }
            state.frames.pop();
            debug!(
                request_id = %inner.request_id,
                "Sub-router exhausted; resuming parent"
            );
        }
    }

    fn enter(state: &mut DispatchState, handler: HandlerFn, kind: HandlerKind) -> Step {
        state.chain = match kind {
            HandlerKind::Success => ChainState::Success,
            HandlerKind::Failure => ChainState::Failure,
        };
        state.visit += 1;
        state.continued = false;
        Step::Invoke {
            handler,
            visit: state.visit,
        }
    }

    /// Run a handler, turning a panic into an error.
    pub(crate) fn invoke(&self, handler: &HandlerFn) -> HandlerResult {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(self))) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %self.inner.request_id,
                    panic_message = %message,
                    "Handler panicked"
                );
                Err(anyhow::anyhow!("handler panicked: {message}"))
            }
        }
    }

    pub(crate) fn apply_failure(&self, token: Option<u64>, failure: Failure, source: FailureSource) {
        let escalate = {
            let mut state = self.inner.state.lock();
            if state.aborted || state.chain == ChainState::Terminated {
                debug!(
                    request_id = %self.inner.request_id,
                    failure = ?failure,
                    "fail() after chain terminated ignored"
                );
                return;
            }
            if let Some(visit) = token {
                if visit != state.visit || state.continued {
                    warn!(
                        request_id = %self.inner.request_id,
                        failure = ?failure,
                        "Failure reported by a step that already continued; ignored"
                    );
                    return;
                }
            }
            state.continued = true;

            if source == FailureSource::Raised && state.chain == ChainState::Failure {
                error!(
                    request_id = %self.inner.request_id,
                    error = ?failure,
                    original = ?state.failure,
                    "Failure handler failed; escalating original failure"
                );
                Some(state.failure.clone().unwrap_or(failure))
            } else {
                warn!(
                    request_id = %self.inner.request_id,
                    status = failure.effective_status().as_u16(),
                    failure = ?failure,
                    "Entering failure chain"
                );
                state.failure = Some(failure);
                state.chain = ChainState::Failure;
                if let Some(frame) = state.frames.last_mut() {
                    frame.current = None;
                }
                None
            }
        };

        match escalate {
            Some(original) => self.respond_unhandled(original),
            None => self.run_chain(),
        }
    }

    fn finish_chain(&self) {
        let failure = self.inner.state.lock().failure.clone();
        match failure {
            Some(failure) => self.respond_unhandled(failure),
            None => {
                debug!(
                    request_id = %self.inner.request_id,
                    path = %self.normalized_path(),
                    "No route matched"
                );
                self.respond_unhandled(Failure::status(StatusCode::NOT_FOUND));
            }
        }
    }

    /// Mark the chain finished. False if it was already finished.
    pub(crate) fn terminate(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.aborted || state.chain == ChainState::Terminated {
            return false;
        }
        state.chain = ChainState::Terminated;
        if let Some(frame) = state.frames.last_mut() {
            frame.current = None;
        }
        true
    }

    /// Record the failure the default responder is answering.
    pub(crate) fn record_failure(&self, failure: Failure) {
        self.inner.state.lock().failure = Some(failure);
    }

    // ---------------------------------------------------------------------
    // Parameters and negotiation
    // ---------------------------------------------------------------------

    /// Query and path parameters merged; a path parameter overrides a query
    /// parameter of the same name.
    #[must_use]
    pub fn params(&self) -> ParamVec {
        let state = self.inner.state.lock();
        let mut merged = state.query_params.clone();
        for (name, value) in &state.path_params {
            set_param(&mut merged, Arc::clone(name), value.clone());
        }
        merged
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        self.path_param(name).or_else(|| self.query_param(name))
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.clone())
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.clone())
    }

    /// Content type chosen by the most recent route with `produces`.
    #[must_use]
    pub fn acceptable_content_type(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .acceptable
            .as_ref()
            .map(|m| m.raw().to_string())
    }

    // ---------------------------------------------------------------------
    // Value store
    // ---------------------------------------------------------------------

    /// Store a request-scoped value. The last write for a key wins.
    pub fn put<T>(&self, key: impl Into<String>, value: T) -> &Self
    where
        T: Any + Send + Sync,
    {
        self.inner.data.lock().insert(key.into(), Arc::new(value));
        self
    }

    /// Value stored under `key`, if present and of type `T`.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.inner.data.lock().get(key).map(Arc::clone)?;
        value.downcast::<T>().ok()
    }

    /// Remove and return the value under `key` if it is of type `T`.
    pub fn remove<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let mut data = self.inner.data.lock();
        if !data.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        data.remove(key).and_then(|v| v.downcast::<T>().ok())
    }

    #[must_use]
    pub fn data_keys(&self) -> Vec<String> {
        self.inner.data.lock().keys().cloned().collect()
    }

    // ---------------------------------------------------------------------
    // Response and callbacks
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn response(&self) -> Response<'_> {
        Response::new(self)
    }

    /// Run `callback` right before the response headers are committed.
    pub fn add_pre_response_callback<F>(&self, callback: F) -> CallbackId
    where
        F: FnOnce(&RoutingContext) + Send + 'static,
    {
        self.inner.pre_response.add(Box::new(callback))
    }

    /// False if `id` is unknown, already removed, or has already fired.
    pub fn remove_pre_response_callback(&self, id: CallbackId) -> bool {
        self.inner.pre_response.remove(id)
    }

    /// Run `callback` after the response body has been fully written.
    pub fn add_post_body_callback<F>(&self, callback: F) -> CallbackId
    where
        F: FnOnce(&RoutingContext) + Send + 'static,
    {
        self.inner.post_body.add(Box::new(callback))
    }

    /// False if `id` is unknown, already removed, or has already fired.
    pub fn remove_post_body_callback(&self, id: CallbackId) -> bool {
        self.inner.post_body.remove(id)
    }

    pub(crate) fn deliver(&self, completed: CompletedResponse) {
        info!(
            request_id = %self.inner.request_id,
            method = %self.inner.request.method(),
            path = %self.inner.request.path(),
            status = completed.status.as_u16(),
            body_bytes = completed.body.len(),
            latency_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Response ended"
        );
        if let Some(tx) = self.inner.completion.lock().take() {
            if tx.send(completed).is_err() {
                debug!(request_id = %self.inner.request_id, "Response receiver dropped");
            }
        }
    }
}

impl fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingContext")
            .field("request_id", &self.inner.request_id)
            .field("method", &self.method())
            .field("path", &self.normalized_path())
            .field("chain", &self.chain_state())
            .finish()
    }
}

impl Continuation {
    #[must_use]
    pub fn context(&self) -> &RoutingContext {
        &self.ctx
    }

    /// Whether the chain is still waiting on this step.
    #[must_use]
    pub fn is_current(&self) -> bool {
        let state = self.ctx.inner.state.lock();
        !state.aborted
            && state.chain != ChainState::Terminated
            && state.visit == self.visit
            && !state.continued
    }

    pub fn next(self) {
        self.ctx.advance(Some(self.visit));
    }

    pub fn fail(self, failure: impl Into<Failure>) {
        self.ctx
            .apply_failure(Some(self.visit), failure.into(), FailureSource::Explicit);
    }

    /// Continue with a handler result produced off the dispatch thread.
    pub fn resolve(self, result: HandlerResult) {
        match result {
            Ok(Outcome::Next) => self.next(),
            Ok(Outcome::Pending) => {}
            Ok(Outcome::Fail(failure)) => self.fail(failure),
            Err(err) => {
                self.ctx
                    .apply_failure(Some(self.visit), Failure::cause(err), FailureSource::Raised);
            }
        }
    }
}

impl PendingResponse {
    #[must_use]
    pub fn context(&self) -> &RoutingContext {
        &self.context
    }

    /// Block until the response ends or `timeout` passes.
    ///
    /// `None` on timeout, or if the request was aborted.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> Option<CompletedResponse> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// The response, if it has already ended.
    #[must_use]
    pub fn try_take(&self) -> Option<CompletedResponse> {
        self.receiver.try_recv().ok()
    }

    /// Abort the underlying request (client went away).
    pub fn abort(&self) {
        self.context.abort();
    }
}
