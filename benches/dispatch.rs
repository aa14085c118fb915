use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use routechain::router::pattern::{normalize_path, PathMatcher};
use routechain::{Outcome, Request, Router, RuntimeConfig};

fn zoo_router() -> Router {
    let router = Router::with_config(RuntimeConfig::default());
    let paths = [
        "/",
        "/zoo/animals",
        "/zoo/animals/:id",
        "/zoo/animals/:id/toys/:toy_id",
        "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
        "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
        "/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i",
    ];
    router.route().handler(|_| Ok(Outcome::Next));
    for path in paths {
        router
            .get(path)
            .expect("valid path")
            .produces("application/json")
            .handler(|ctx| {
                ctx.response().end_with("{}");
                Ok(Outcome::Pending)
            });
    }
    router
}

fn bench_pattern_match(c: &mut Criterion) {
    let matcher =
        PathMatcher::compile("/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id")
            .expect("valid path");
    c.bench_function("pattern_match", |b| {
        b.iter(|| {
            let path = normalize_path(black_box("/zoo/cats/animals/123/habitats/88/sections/5"));
            black_box(matcher.matches(&path));
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let router = zoo_router();
    let test_paths = [
        "/zoo/animals/123",
        "/zoo/animals/123/toys/456",
        "/zoo/cats/animals/123/habitats/88/sections/5",
        "/complex/1/2/3/4/5/6/7/8/9",
        "/missing",
    ];
    c.bench_function("dispatch", |b| {
        b.iter(|| {
            for path in test_paths {
                let request = Request::new(Method::GET, path).with_header("accept", "*/*");
                let response = router.handle(request).wait(Duration::from_secs(1));
                black_box(response);
            }
        })
    });
}

criterion_group!(benches, bench_pattern_match, bench_dispatch);
criterion_main!(benches);
