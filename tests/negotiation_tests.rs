mod common;

use common::{dispatch, get, router};
use http::{Method, StatusCode};
use routechain::{Outcome, Request, Router};

/// Route producing JSON and plain text that echoes the negotiated type.
fn echo_negotiated(router: &Router) {
    router
        .get("/thing")
        .unwrap()
        .produces("application/json")
        .produces("text/plain")
        .handler(|ctx| {
            let chosen = ctx.acceptable_content_type().unwrap_or_default();
            ctx.response().end_with(chosen);
            Ok(Outcome::Pending)
        });
}

fn negotiate(router: &Router, accept: &str) -> String {
    dispatch(router, get("/thing").with_header("accept", accept))
        .body_str()
        .into_owned()
}

#[test]
fn test_equal_quality_earliest_accept_entry_wins() {
    let router = router();
    echo_negotiated(&router);
    assert_eq!(
        negotiate(&router, "text/html,text/plain,application/json"),
        "text/plain"
    );
}

#[test]
fn test_higher_quality_wins() {
    let router = router();
    echo_negotiated(&router);
    assert_eq!(
        negotiate(&router, "text/html,text/plain;q=0.9,application/json"),
        "application/json"
    );
}

#[test]
fn test_wildcard_accept() {
    let router = router();
    echo_negotiated(&router);
    assert_eq!(negotiate(&router, "*/*"), "application/json");
    assert_eq!(negotiate(&router, "text/*"), "text/plain");
}

#[test]
fn test_no_accept_header_selects_first_produces() {
    let router = router();
    echo_negotiated(&router);
    assert_eq!(
        dispatch(&router, get("/thing")).body_str(),
        "application/json"
    );
}

#[test]
fn test_unacceptable_is_no_match() {
    let router = router();
    echo_negotiated(&router);
    let response = dispatch(&router, get("/thing").with_header("accept", "image/png"));
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_zero_quality_refuses_type() {
    let router = router();
    echo_negotiated(&router);
    assert_eq!(
        negotiate(&router, "application/json;q=0,text/plain;q=0.1"),
        "text/plain"
    );
}

#[test]
fn test_next_route_sees_latest_negotiation() {
    let router = router();
    router
        .route()
        .produces("text/html")
        .handler(|_| Ok(Outcome::Next));
    router.route().handler(|ctx| {
        ctx.response()
            .end_with(ctx.acceptable_content_type().unwrap_or_default());
        Ok(Outcome::Pending)
    });
    let response = dispatch(&router, get("/").with_header("accept", "text/html"));
    assert_eq!(response.body_str(), "text/html");
}

#[test]
fn test_end_json_uses_negotiated_type() {
    let router = router();
    router
        .get("/doc")
        .unwrap()
        .produces("application/vnd.api+json")
        .handler(|ctx| {
            ctx.response().end_json(&serde_json::json!({ "a": 1 }))?;
            Ok(Outcome::Pending)
        });
    let response = dispatch(&router, get("/doc"));
    assert_eq!(
        response.header("content-type"),
        Some("application/vnd.api+json")
    );
}

fn upload_router() -> Router {
    let router = router();
    router
        .post("/upload")
        .unwrap()
        .consumes("application/json")
        .consumes("text/*")
        .handler(|ctx| {
            ctx.response().end_with("accepted");
            Ok(Outcome::Pending)
        });
    router
}

fn upload(router: &Router, content_type: Option<&str>) -> StatusCode {
    let mut request = Request::new(Method::POST, "/upload").with_body("{}");
    if let Some(content_type) = content_type {
        request = request.with_header("content-type", content_type);
    }
    dispatch(router, request).status
}

#[test]
fn test_consumes_matches_ignoring_parameters() {
    let router = upload_router();
    assert_eq!(
        upload(&router, Some("application/json; charset=utf-8")),
        StatusCode::OK
    );
    assert_eq!(upload(&router, Some("text/csv")), StatusCode::OK);
}

#[test]
fn test_consumes_mismatch_or_missing_header() {
    let router = upload_router();
    assert_eq!(upload(&router, Some("image/png")), StatusCode::NOT_FOUND);
    assert_eq!(upload(&router, None), StatusCode::NOT_FOUND);
}
