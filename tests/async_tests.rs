mod common;

use std::thread;
use std::time::Duration;

use common::{dispatch, get, router, setup_may_runtime, Trace, WAIT};
use http::StatusCode;
use routechain::{ChainState, Outcome};

#[test]
fn test_next_from_another_thread() {
    let router = router();
    router.get("/slow").unwrap().handler(|ctx| {
        let ctx = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            ctx.response().write("thread;");
            ctx.next();
        });
        Ok(Outcome::Pending)
    });
    router.get("/slow").unwrap().handler(|ctx| {
        ctx.response().end_with("done");
        Ok(Outcome::Pending)
    });

    let response = dispatch(&router, get("/slow"));
    assert_eq!(response.body_str(), "thread;done");
}

#[test]
fn test_continuation_from_may_coroutine() {
    setup_may_runtime();
    let router = router();
    router.get("/co").unwrap().handler(|ctx| {
        let continuation = ctx.continuation();
        let _coroutine = may::go!(move || {
            may::coroutine::sleep(Duration::from_millis(5));
            continuation.context().put("from", "coroutine");
            continuation.next();
        });
        Ok(Outcome::Pending)
    });
    router.get("/co").unwrap().handler(|ctx| {
        let from = ctx.get::<&str>("from").map(|v| *v).unwrap_or_default();
        ctx.response().end_with(from);
        Ok(Outcome::Pending)
    });

    let response = dispatch(&router, get("/co"));
    assert_eq!(response.body_str(), "coroutine");
}

#[test]
fn test_async_fail_enters_failure_chain() {
    let router = router();
    router.get("/x").unwrap().handler(|ctx| {
        let continuation = ctx.continuation();
        thread::spawn(move || continuation.fail(StatusCode::TOO_MANY_REQUESTS));
        Ok(Outcome::Pending)
    });
    router.route().failure_handler(|ctx| {
        let status = ctx.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ctx.response()
            .set_status(status)
            .end_with(format!("slow down ({})", status.as_u16()));
        Ok(Outcome::Pending)
    });

    let response = dispatch(&router, get("/x"));
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.body_str(), "slow down (429)");
}

#[test]
fn test_continuation_fires_once() {
    let router = router();
    let trace = Trace::default();
    router.get("/x").unwrap().handler(|ctx| {
        let first = ctx.continuation();
        let second = ctx.continuation();
        thread::spawn(move || {
            first.next();
            second.next();
        });
        Ok(Outcome::Pending)
    });
    for label in ["a", "b"] {
        let trace = trace.clone();
        router.get("/x").unwrap().handler(move |ctx| {
            trace.push(label);
            ctx.response().end();
            Ok(Outcome::Pending)
        });
    }

    let pending = router.handle(get("/x"));
    pending.wait(WAIT).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(trace.entries(), vec!["a"]);
    assert_eq!(pending.context().chain_state(), ChainState::Success);
}

#[test]
fn test_blocking_handler_runs_on_coroutine() {
    setup_may_runtime();
    let router = router();
    let caller = thread::current().id();
    router.get("/block").unwrap().blocking_handler(move |ctx| {
        thread::sleep(Duration::from_millis(5));
        ctx.put("same_thread", thread::current().id() == caller);
        Ok(Outcome::Next)
    });
    router.get("/block").unwrap().handler(|ctx| {
        let same = ctx.get::<bool>("same_thread").map(|v| *v);
        ctx.response().end_with(format!("{same:?}"));
        Ok(Outcome::Pending)
    });

    let response = dispatch(&router, get("/block"));
    assert_eq!(response.body_str(), "Some(false)");
}

#[test]
fn test_blocking_handler_error_reaches_failure_chain() {
    setup_may_runtime();
    let router = router();
    router
        .get("/block")
        .unwrap()
        .blocking_handler(|_| Err(anyhow::anyhow!("disk on fire")));
    router.route().failure_handler(|ctx| {
        let message = ctx
            .failure()
            .and_then(|f| f.error().map(ToString::to_string))
            .unwrap_or_default();
        ctx.response()
            .set_status(StatusCode::INTERNAL_SERVER_ERROR)
            .end_with(message);
        Ok(Outcome::Pending)
    });

    let response = dispatch(&router, get("/block"));
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body_str(), "disk on fire");
}

#[test]
fn test_suspended_chain_stays_pending() {
    let router = router();
    router.get("/hang").unwrap().handler(|_| Ok(Outcome::Pending));
    let pending = router.handle(get("/hang"));
    assert!(pending.wait(Duration::from_millis(20)).is_none());
    assert_eq!(pending.context().chain_state(), ChainState::Success);
    pending.abort();
    assert_eq!(pending.context().chain_state(), ChainState::Terminated);
}

#[test]
fn test_concurrent_dispatches_are_independent() {
    let router = router();
    router.get("/echo/:n").unwrap().handler(|ctx| {
        let n = ctx.path_param("n").unwrap_or_default();
        ctx.put("n", n);
        let ctx = ctx.clone();
        thread::spawn(move || {
            let stored = ctx.get::<String>("n").map(|v| v.to_string());
            ctx.response().end_with(stored.unwrap_or_default());
        });
        Ok(Outcome::Pending)
    });

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let router = router.clone();
            thread::spawn(move || {
                let body = dispatch(&router, get(&format!("/echo/{i}")))
                    .body_str()
                    .into_owned();
                (i, body)
            })
        })
        .collect();

    for handle in handles {
        let (i, body) = handle.join().unwrap();
        assert_eq!(body, i.to_string());
    }
}
