use std::time::Instant;

use http::header::HeaderName;

use crate::context::{HandlerResult, Outcome, RoutingContext};

pub const RESPONSE_TIME_HEADER: HeaderName = HeaderName::from_static("x-response-time");

/// Handler that adds an `x-response-time: <ms>ms` header measured from the
/// moment it ran until the headers are committed.
pub fn response_time() -> impl Fn(&RoutingContext) -> HandlerResult + Send + Sync + 'static {
    |ctx: &RoutingContext| {
        let start = Instant::now();
        ctx.add_pre_response_callback(move |ctx| {
            let elapsed_ms = start.elapsed().as_millis();
            ctx.response()
                .header(RESPONSE_TIME_HEADER, format!("{elapsed_ms}ms"));
        });
        Ok(Outcome::Next)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::Method;

    use super::*;
    use crate::{Request, Router};

    #[test]
    fn test_header_added_before_commit() {
        let router = Router::new();
        router.route().handler(response_time());
        router.route().handler(|ctx| {
            ctx.response().end_with("ok");
            Ok(Outcome::Pending)
        });

        let response = router
            .handle(Request::new(Method::GET, "/anything"))
            .wait(Duration::from_secs(1))
            .expect("response");
        let value = response.header("x-response-time").expect("header");
        assert!(value.ends_with("ms"));
    }
}
