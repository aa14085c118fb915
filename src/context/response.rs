use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::core::RoutingContext;
use crate::http_types::CompletedResponse;

pub(crate) struct ResponseState {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
    /// Pre-response callbacks are running
    pub(crate) committing: bool,
    pub(crate) headers_written: bool,
    pub(crate) ended: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            committing: false,
            headers_written: false,
            ended: false,
        }
    }
}

/// Writer for the response of one request.
///
/// Status and headers can be changed until the headers are committed by the
/// first `write` or `end`. Pre-response callbacks run at commit time and may
/// still set headers; post-body callbacks run once `end` has delivered the
/// response.
pub struct Response<'a> {
    ctx: &'a RoutingContext,
}

impl<'a> Response<'a> {
    pub(crate) fn new(ctx: &'a RoutingContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.ctx.inner.response.lock().status
    }

    pub fn set_status(&self, status: StatusCode) -> &Self {
        let mut state = self.ctx.inner.response.lock();
        if state.headers_written {
            warn!(
                request_id = %self.ctx.request_id(),
                status = status.as_u16(),
                "Status change after headers were written ignored"
            );
        } else {
            state.status = status;
        }
        self
    }

    /// Set a header, replacing any previous value. Invalid names or values
    /// are logged and skipped.
    pub fn header<K, V>(&self, name: K, value: V) -> &Self
    where
        HeaderName: TryFrom<K>,
        HeaderValue: TryFrom<V>,
    {
        let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value))
        else {
            warn!(request_id = %self.ctx.request_id(), "Invalid response header skipped");
            return self;
        };
        let mut state = self.ctx.inner.response.lock();
        if state.headers_written {
            warn!(
                request_id = %self.ctx.request_id(),
                header = %name,
                "Header set after headers were written ignored"
            );
        } else {
            state.headers.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<String> {
        self.ctx
            .inner
            .response
            .lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Append to the body, committing headers first if needed.
    /// False once the response has ended.
    pub fn write(&self, chunk: impl AsRef<[u8]>) -> bool {
        self.write_chunk(chunk.as_ref(), false)
    }

    /// End the response. False if it had already ended.
    pub fn end(&self) -> bool {
        self.write_chunk(&[], true)
    }

    pub fn end_with(&self, chunk: impl AsRef<[u8]>) -> bool {
        self.write_chunk(chunk.as_ref(), true)
    }

    /// Serialize `value` as the body and end the response.
    ///
    /// Content type is the negotiated one when a route declared `produces`,
    /// otherwise `application/json`.
    pub fn end_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<bool> {
        let body = serde_json::to_vec(value)?;
        let content_type = self
            .ctx
            .acceptable_content_type()
            .unwrap_or_else(|| "application/json".to_string());
        if !self.ctx.inner.response.lock().headers.contains_key(CONTENT_TYPE) {
            self.header(CONTENT_TYPE, content_type);
        }
        Ok(self.end_with(body))
    }

    #[must_use]
    pub fn ended(&self) -> bool {
        self.ctx.inner.response.lock().ended
    }

    #[must_use]
    pub fn headers_written(&self) -> bool {
        self.ctx.inner.response.lock().headers_written
    }

    fn write_chunk(&self, chunk: &[u8], end: bool) -> bool {
        {
            let mut state = self.ctx.inner.response.lock();
            if state.ended {
                debug!(request_id = %self.ctx.request_id(), "Write after response ended ignored");
                return false;
            }
            if end {
                state.ended = true;
            }
        }

        self.commit_headers();

        let completed = {
            let mut state = self.ctx.inner.response.lock();
            state.body.extend_from_slice(chunk);
            end.then(|| CompletedResponse {
                status: state.status,
                headers: state.headers.clone(),
                body: state.body.clone(),
            })
        };

        if let Some(completed) = completed {
            self.ctx.deliver(completed);
            self.ctx.inner.post_body.fire(self.ctx);
        }
        true
    }

    /// Run pre-response callbacks once, then freeze status and headers.
    fn commit_headers(&self) {
        {
            let mut state = self.ctx.inner.response.lock();
            if state.headers_written || state.committing {
                return;
            }
            state.committing = true;
        }
        self.ctx.inner.pre_response.fire(self.ctx);
        let mut state = self.ctx.inner.response.lock();
        state.committing = false;
        state.headers_written = true;
    }
}
