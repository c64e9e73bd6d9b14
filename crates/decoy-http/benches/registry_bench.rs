use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use decoy_http::predicate::StringMatcher;
use decoy_http::request::{path_matches, CapturedRequest, RequestSpecification};
use decoy_http::stub::{respond_with, Stub, StubConfiguration, StubRegistry};
use decoy_http::ResponseDefinition;
use hyper::{HeaderMap, Method, Uri};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn exact_registry(count: usize) -> StubRegistry {
    let registry = StubRegistry::new();
    for id in 0..count {
        let stub = Stub::new(
            StubConfiguration::named(format!("stub-{id}")),
            RequestSpecification::text()
                .method(Method::GET)
                .path(format!("/api/v1/endpoint{id}"))
                .build(),
            respond_with(|_| ResponseDefinition::text("ok")),
        );
        registry.add(Arc::new(stub)).unwrap();
    }
    registry
}

fn regex_registry(count: usize) -> StubRegistry {
    let registry = StubRegistry::new();
    for id in 0..count {
        let matcher = StringMatcher::Matches(format!(r"^/api/v{id}/users/\d+$"));
        let stub = Stub::new(
            StubConfiguration::named(format!("regex-{id}")),
            RequestSpecification::text()
                .path_matcher(path_matches(&matcher, true).unwrap())
                .build(),
            respond_with(|_| ResponseDefinition::text("ok")),
        );
        registry.add(Arc::new(stub)).unwrap();
    }
    registry
}

fn get(path: &str) -> CapturedRequest {
    let uri: Uri = path.parse().unwrap();
    CapturedRequest::from_parts(Method::GET, uri, HeaderMap::new(), "")
}

fn bench_exact_matching(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("registry_exact");

    for count in [10, 100, 1000].iter() {
        let registry = exact_registry(*count);
        let first = get("/api/v1/endpoint0");
        let middle = get(&format!("/api/v1/endpoint{}", count / 2));
        let miss = get("/not/registered");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("match_first", count), count, |b, _| {
            b.iter(|| runtime.block_on(registry.find_matching_stub(black_box(&first), false)));
        });
        group.bench_with_input(BenchmarkId::new("match_middle", count), count, |b, _| {
            b.iter(|| runtime.block_on(registry.find_matching_stub(black_box(&middle), false)));
        });
        group.bench_with_input(BenchmarkId::new("no_match", count), count, |b, _| {
            b.iter(|| runtime.block_on(registry.find_matching_stub(black_box(&miss), false)));
        });
    }

    group.finish();
}

fn bench_regex_matching(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("registry_regex");

    for count in [10, 100].iter() {
        let registry = regex_registry(*count);
        let last = get(&format!("/api/v{}/users/42", count - 1));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("match_last", count), count, |b, _| {
            b.iter(|| runtime.block_on(registry.find_matching_stub(black_box(&last), false)));
        });
    }

    group.finish();
}

fn bench_registration(c: &mut Criterion) {
    c.bench_function("register_1000", |b| {
        b.iter(|| black_box(exact_registry(1000)));
    });
}

criterion_group!(benches, bench_exact_matching, bench_regex_matching, bench_registration);
criterion_main!(benches);
