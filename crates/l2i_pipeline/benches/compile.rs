use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use l2i_core::{Deployment, Profile};
use l2i_emit::Backend;
use l2i_pipeline::Pipeline;
use serde_json::{json, Value};

fn intent(id: usize, flows: usize) -> Value {
    let tiers = ["best_effort", "low", "medium", "high"];
    let flows: Vec<Value> = (0..flows)
        .map(|i| {
            json!({
                "id": format!("f{}", i),
                "src": format!("10.0.{}.{}", id, i % 250),
                "dst": "10.1.0.1",
                "port": if i % 2 == 0 { "p1" } else { "p2" },
                "dst_port": 5000 + i,
                "priority": tiers[i % tiers.len()],
                "bandwidth": {"min_mbps": 0.01, "max_mbps": 0.02},
                "latency_max_ms": 20
            })
        })
        .collect();
    json!({
        "id": format!("s{}", id),
        "flows": flows,
        "meters": [{"id": "m0", "flow": "f0", "rate_mbps": 5.0}],
        "multicast": [{"id": id + 1, "members": ["p1", "p2"], "replicas": 2}]
    })
}

fn bench_compile(c: &mut Criterion) {
    let deployment = Deployment::single("A", Profile::embedded("p4").expect("embedded profile"));
    let pipeline = Pipeline::new();
    let mut group = c.benchmark_group("compile");

    for flows in [1usize, 16, 128] {
        let docs: Vec<Value> = (0..4).map(|id| intent(id, flows)).collect();
        group.bench_with_input(BenchmarkId::new("p4_four_specs", flows), &docs, |b, docs| {
            b.iter(|| {
                let result = pipeline.compile(black_box(docs), &deployment);
                let plan = result.plan().expect("plan");
                black_box(pipeline.emit(plan, &Backend::ALL))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
