use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{Envelope, EnvelopeId, NewEnvelope};
use pipeline::{Dispatcher, PipelineConfig};
use projections::{InMemoryReadModelStore, ProjectorRegistry};
use tokio_util::sync::CancellationToken;

fn host_envelope(id: i64, host: i64) -> Envelope {
    NewEnvelope::new(
        format!("agent-{host}"),
        "host.discovered",
        serde_json::json!({
            "hostname": format!("node{host:02}"),
            "ip_addresses": ["10.0.0.1"],
            "cpu_count": 8
        }),
    )
    .with_id(EnvelopeId::new(id))
}

fn dispatcher(config: PipelineConfig) -> (Dispatcher, pipeline::IngressSender) {
    let registry = Arc::new(ProjectorRegistry::default_registry().unwrap());
    Dispatcher::new(registry, Arc::new(InMemoryReadModelStore::new()), config)
}

fn bench_dispatch_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (dispatcher, _sender) = dispatcher(PipelineConfig::default());
    let mut next_id = 0;

    c.bench_function("dispatcher/dispatch_host_discovered", |b| {
        b.iter(|| {
            next_id += 1;
            let envelope = host_envelope(next_id, next_id % 50);
            rt.block_on(dispatcher.dispatch(&envelope));
        });
    });
}

fn bench_pool_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("dispatcher/pool_1000_envelopes_8_workers", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (dispatcher, sender) = dispatcher(PipelineConfig::default());
                let run = tokio::spawn(dispatcher.run(CancellationToken::new()));
                for id in 1..=1000 {
                    sender.enqueue_wait(host_envelope(id, id % 50)).await.unwrap();
                }
                drop(sender);
                run.await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_dispatch_single, bench_pool_throughput);
criterion_main!(benches);
