use azhound::{client::memory::MemoryClient, collector::Collector};
use azhound_core::{Envelope, Group, ListQuery, TenantContext};
use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::{StreamExt, stream::FuturesUnordered};
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug)]
struct CollectBenchParams {
    pages: usize,
    items_per_page: usize,
    stream_buffer_size: usize,
    concurrency: usize,
}

impl CollectBenchParams {
    const fn items(&self) -> u64 {
        (self.pages * self.items_per_page) as u64
    }
}

fn fixture(params: &CollectBenchParams) -> MemoryClient {
    let mut client = MemoryClient::new(TenantContext::new(
        "6c12b0b0-0000-4000-8000-000000000001",
        "Contoso",
    ));
    for page in 0..params.pages {
        let value = (0..params.items_per_page)
            .map(|i| {
                json!({
                    "id": format!("{page:04}-{i:04}"),
                    "displayName": format!("group {page}/{i}"),
                    "securityEnabled": true,
                    "onPremisesSyncEnabled": null,
                })
            })
            .collect();
        client = client.with_page(value);
    }
    client
}

fn collect_bench(c: &mut Criterion) {
    let page_cases = [(10, 100), (100, 100), (10, 999)];
    let buffer_cases = [1, 16, 256];
    let concurrency_cases = [1, 4, 16];

    // Generate cartesian product of all param combinations
    let mut cases = Vec::new();
    for &(pages, items_per_page) in &page_cases {
        for &stream_buffer_size in &buffer_cases {
            for &concurrency in &concurrency_cases {
                cases.push(CollectBenchParams {
                    pages,
                    items_per_page,
                    stream_buffer_size,
                    concurrency,
                });
            }
        }
    }
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for params in &cases {
        let client = Arc::new(fixture(params));
        let collector = Collector::new(client, params.stream_buffer_size).unwrap();

        let mut group = c.benchmark_group("collector/groups");
        group.throughput(Throughput::Elements(
            params.items() * params.concurrency as u64,
        ));

        group.bench_function(
            format!(
                "items/{}/buf/{}/conc/{}",
                params.items(),
                params.stream_buffer_size,
                params.concurrency,
            ),
            |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let collector = collector.clone();
                    async move {
                        let start = Instant::now();

                        for _ in 0..iters {
                            run_collect_bench(&collector, params).await;
                        }

                        start.elapsed()
                    }
                });
            },
        );

        group.finish();
    }
}

async fn run_collect_bench(collector: &Collector<MemoryClient>, params: &CollectBenchParams) {
    let mut tasks = FuturesUnordered::new();

    for _ in 0..params.concurrency {
        let collector = collector.clone();
        let expected = params.items();

        tasks.push(tokio::spawn(async move {
            let (mut envelopes, handle) = collector
                .collect::<Group>(ListQuery::new(), CancellationToken::new())
                .into_parts();

            while let Some(envelope) = envelopes.next().await {
                let envelope: Envelope<Group> = envelope;
                black_box(envelope);
            }

            let summary = handle.finish().await.unwrap();
            assert_eq!(summary.count, expected, "{summary}");
        }));
    }

    // Wait for all runs to complete
    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

criterion_group!(collect_benches, collect_bench);
criterion_main!(collect_benches);
