extern crate criterion;
extern crate knowledge_engine;

use criterion::*;
use knowledge_engine::reasoner::matching::find_matches;
use knowledge_engine::reasoner::rule::StaticBindingSetHandler;
use knowledge_engine::*;
use std::sync::Arc;

// ?s0 ?p0 ?o0 . ?s1 ?p1 ?o1 . ...
fn generic_pattern(size: usize) -> GraphPattern {
    (0..size)
        .map(|i| {
            format!("?s{i} ?p{i} ?o{i}")
                .parse::<TriplePattern>()
                .expect("generic triple pattern")
        })
        .collect()
}

fn sensor_store(sensors: usize) -> RuleStore {
    let data: BindingSet = (0..sensors)
        .map(|i| {
            let id = format!("<https://example.org/sensor{}>", i);
            let value = format!("\"{}\"", i % 30);
            Binding::new().with("s", &id).with("v", &value)
        })
        .collect();
    let consequent = shared::parser::parse_graph_pattern_str(
        "?s <https://example.org/type> <https://example.org/Sensor> . ?s <https://example.org/hasValue> ?v",
    )
    .expect("sensor pattern");

    let mut store = RuleStore::new();
    store.add_rule(
        Rule::with_handler(
            GraphPattern::new(),
            consequent,
            Arc::new(StaticBindingSetHandler::new(data)),
        )
        .expect("data rule"),
    );
    store
}

fn matching_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_matches");
    for size in [2, 3, 4, 5] {
        let pattern = generic_pattern(size);
        group.bench_with_input(BenchmarkId::new("all", size), &pattern, |b, p| {
            b.iter(|| find_matches(black_box(p), black_box(p), MatchFlags::empty()))
        });
        group.bench_with_input(BenchmarkId::new("only_biggest", size), &pattern, |b, p| {
            b.iter(|| find_matches(black_box(p), black_box(p), MatchFlags::ONLY_BIGGEST))
        });
    }
    group.finish();
}

fn plan_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let store = sensor_store(1_000);
    let objective = Arc::new(
        Rule::objective(
            shared::parser::parse_graph_pattern_str(
                "?x <https://example.org/type> <https://example.org/Sensor> . ?x <https://example.org/hasValue> ?y",
            )
            .expect("objective pattern"),
        )
        .expect("objective"),
    );

    let mut group = c.benchmark_group("sample-size-example");
    group.sample_size(10);

    group.bench_function("build_plan", |b| {
        b.iter(|| ReasonerPlan::new(&store, objective.clone()).expect("plan"))
    });

    group.bench_function("execute_plan", |b| {
        b.iter(|| {
            let mut plan = ReasonerPlan::new(&store, objective.clone()).expect("plan");
            runtime
                .block_on(plan.execute(BindingSet::new()))
                .expect("execution")
        })
    });
    group.finish();
}

criterion_group!(benches, matching_benchmark, plan_benchmark);
criterion_main!(benches);
