use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Instant;
use tunegraph_core::{Catalog, CatalogRecord, Edge, Recommender, SimilarityGraph};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let n: u32 = args
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(100_000);
    let avg_degree: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(40);
    let queries: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let k: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(10);
    println!(
        "benchmark: tracks={}, avg_degree={}, queries={}, k={}",
        n, avg_degree, queries, k
    );
    anyhow::ensure!(n > 1, "need at least two tracks");
    anyhow::ensure!(queries > 0, "need at least one query");

    let mut rng = StdRng::seed_from_u64(42);
    let records = (0..n).map(|i| CatalogRecord {
        external_id: format!("track{i:08}"),
        index: i,
        display_name: format!("Song {i}"),
    });
    let edge_total = n as usize * avg_degree / 2;
    let edges: Vec<Edge> = (0..edge_total)
        .map(|_| {
            let src = rng.gen_range(0..n);
            let mut dst = rng.gen_range(0..n);
            if dst == src {
                dst = (dst + 1) % n;
            }
            Edge {
                src,
                dst,
                weight: rng.gen_range(0.0..100.0),
            }
        })
        .collect();

    let start = Instant::now();
    let rec = Recommender::new(
        Catalog::from_records(records)?,
        SimilarityGraph::from_edges(n, edges)?,
    )?;
    println!(
        "built {} tracks / {} edges in {} ms",
        n,
        rec.graph().edge_count(),
        start.elapsed().as_millis()
    );

    let mut times = Vec::with_capacity(queries);
    for _ in 0..queries {
        let id = format!("track{:08}", rng.gen_range(0..n));
        let start = Instant::now();
        let out = rec.get_recommendations(&id, k)?;
        times.push(start.elapsed());
        std::hint::black_box(out);
    }

    times.sort();
    let p =
        |pct: f32| times[(pct * times.len() as f32).clamp(0.0, (times.len() - 1) as f32) as usize];
    let mean = times.iter().map(|d| d.as_secs_f64()).sum::<f64>() / times.len() as f64;
    println!(
        "p50 {:.1} us, p95 {:.1} us, p99 {:.1} us, mean {:.1} us",
        p(0.50).as_secs_f64() * 1e6,
        p(0.95).as_secs_f64() * 1e6,
        p(0.99).as_secs_f64() * 1e6,
        mean * 1e6
    );
    Ok(())
}
