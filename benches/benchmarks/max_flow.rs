use criterion::{BenchmarkId, Criterion, SamplingMode, criterion_group};
use flowcut_rs::edmonds_karp::EdmondsKarp;
use flowcut_rs::max_flow::MaxFlow;
use flowcut_rs::push_relabel::PushRelabel;
use flowcut_rs::residual_graph::ResidualGraph;
use rand::{RngExt, SeedableRng, rngs::StdRng};

fn random_dag_triples(node_count: i64, edge_count: usize) -> Vec<(i64, i64, i64)> {
    let mut rng = StdRng::seed_from_u64(0xF10C);
    let mut triples: Vec<(i64, i64, i64)> = (0..edge_count)
        .map(|_| {
            let u = rng.random_range(0..node_count - 1);
            let v = rng.random_range(u + 1..node_count);
            (u, v, rng.random_range(1..=100))
        })
        .collect();
    // source and sink must exist regardless of the draw
    triples.push((0, node_count / 2, 50));
    triples.push((node_count / 2, node_count - 1, 50));
    triples
}

fn bench_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("max flow on random DAGs");
    group.sampling_mode(SamplingMode::Flat);
    for node_count in [100i64, 400, 1600] {
        let triples = random_dag_triples(node_count, 8 * node_count as usize);
        group.bench_function(BenchmarkId::new("PushRelabel", node_count), |b| {
            b.iter(|| {
                let graph = ResidualGraph::from_triples(&triples, true).unwrap();
                let mut solver = PushRelabel::new(graph, 0, node_count - 1).unwrap();
                solver.run().unwrap()
            })
        });
        group.bench_function(BenchmarkId::new("EdmondsKarp", node_count), |b| {
            b.iter(|| {
                let graph = ResidualGraph::from_triples(&triples, true).unwrap();
                let mut solver = EdmondsKarp::new(graph, 0, node_count - 1).unwrap();
                solver.run().unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(max_flow, bench_solvers);
