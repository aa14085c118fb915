mod common;

use std::thread;
use std::time::Duration;

use common::{dispatch, get, router, Trace, WAIT};
use http::StatusCode;
use routechain::handlers::{access_logger, response_time, RESPONSE_TIME_HEADER};
use routechain::Outcome;

#[test]
fn test_callbacks_from_every_route_fire_in_order() {
    let router = router();
    let trace = Trace::default();

    for label in ["r1", "r2", "r3"] {
        let trace = trace.clone();
        router.route().handler(move |ctx| {
            let pre = trace.clone();
            ctx.add_pre_response_callback(move |_| pre.push(format!("pre:{label}")));
            let post = trace.clone();
            ctx.add_post_body_callback(move |_| post.push(format!("post:{label}")));
            Ok(Outcome::Next)
        });
    }
    {
        let trace = trace.clone();
        router.route().handler(move |ctx| {
            trace.push("end");
            ctx.response().end_with("x");
            Ok(Outcome::Pending)
        });
    }

    let pending = router.handle(get("/"));
    pending.wait(WAIT).unwrap();
    assert_eq!(
        trace.entries(),
        vec!["end", "pre:r1", "pre:r2", "pre:r3", "post:r1", "post:r2", "post:r3"]
    );
}

#[test]
fn test_post_body_runs_after_response_delivered() {
    let router = router();
    let (tx, rx) = std::sync::mpsc::channel();
    router.route().handler(move |ctx| {
        let tx = tx.clone();
        ctx.add_post_body_callback(move |ctx| {
            let _ = tx.send(ctx.response().ended());
        });
        ctx.response().end();
        Ok(Outcome::Pending)
    });

    dispatch(&router, get("/"));
    assert_eq!(rx.recv_timeout(WAIT).ok(), Some(true));
}

#[test]
fn test_callback_removed_from_another_thread_before_fire() {
    let router = router();
    let trace = Trace::default();
    {
        let trace = trace.clone();
        router.route().handler(move |ctx| {
            let kept = trace.clone();
            ctx.add_pre_response_callback(move |_| kept.push("kept"));
            let dropped = trace.clone();
            let id = ctx.add_pre_response_callback(move |_| dropped.push("dropped"));

            let ctx = ctx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                let removed = ctx.remove_pre_response_callback(id);
                ctx.response().end_with(format!("removed={removed}"));
            });
            Ok(Outcome::Pending)
        });
    }

    let response = dispatch(&router, get("/"));
    assert_eq!(response.body_str(), "removed=true");
    assert_eq!(trace.entries(), vec!["kept"]);
}

#[test]
fn test_remove_after_fire_returns_false() {
    let router = router();
    router.route().handler(|ctx| {
        let id = ctx.add_post_body_callback(|_| {});
        ctx.response().end();
        let removed = ctx.remove_post_body_callback(id);
        ctx.put("removed", removed);
        Ok(Outcome::Pending)
    });

    let pending = router.handle(get("/"));
    pending.wait(WAIT).unwrap();
    assert_eq!(
        pending.context().get::<bool>("removed").map(|v| *v),
        Some(false)
    );
}

#[test]
fn test_pre_response_runs_for_default_failure_response() {
    let router = router();
    let trace = Trace::default();
    {
        let trace = trace.clone();
        router.route().handler(move |ctx| {
            let trace = trace.clone();
            ctx.add_pre_response_callback(move |ctx| {
                trace.push(format!("status:{}", ctx.response().status().as_u16()));
            });
            Ok(Outcome::Fail(StatusCode::BAD_REQUEST.into()))
        });
    }

    let response = dispatch(&router, get("/"));
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(trace.entries(), vec!["status:400"]);
}

#[test]
fn test_next_after_end_keeps_advancing_chain() {
    let router = router();
    let trace = Trace::default();
    {
        let trace = trace.clone();
        router.route().handler(move |ctx| {
            ctx.response().end_with("early");
            let trace = trace.clone();
            ctx.add_post_body_callback(move |_| trace.push("late registration"));
            Ok(Outcome::Next)
        });
    }
    {
        let trace = trace.clone();
        router.route().handler(move |_| {
            trace.push("second route");
            Ok(Outcome::Next)
        });
    }

    let response = dispatch(&router, get("/"));
    assert_eq!(response.body_str(), "early");
    assert_eq!(trace.entries(), vec!["second route"]);
}

#[test]
fn test_stock_handlers() {
    let router = router();
    router.route().order(-2).unwrap().handler(response_time());
    router.route().order(-1).unwrap().handler(access_logger());
    router.get("/ping").unwrap().handler(|ctx| {
        ctx.response().end_with("pong");
        Ok(Outcome::Pending)
    });

    let response = dispatch(&router, get("/ping"));
    assert_eq!(response.body_str(), "pong");
    let header = response.header(RESPONSE_TIME_HEADER.as_str()).unwrap();
    assert!(header.ends_with("ms"));
    assert!(header.trim_end_matches("ms").parse::<u128>().is_ok());
}
