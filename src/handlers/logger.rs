use tracing::info;

use crate::context::{HandlerResult, Outcome, RoutingContext};

/// Handler that logs one access line per request once the body is written.
pub fn access_logger() -> impl Fn(&RoutingContext) -> HandlerResult + Send + Sync + 'static {
    |ctx: &RoutingContext| {
        ctx.add_post_body_callback(|ctx| {
            let response = ctx.response();
            info!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.request().path(),
                route = ?ctx.current_route().and_then(|r| r.get_path()),
                status = response.status().as_u16(),
                content_type = ?response.header_value("content-type"),
                latency_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Access"
            );
        });
        Ok(Outcome::Next)
    }
}
