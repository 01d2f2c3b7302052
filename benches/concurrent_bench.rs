// benches/concurrent_bench.rs

//! Concurrent access benchmarks.
//!
//! Measures the server's performance under concurrent workloads, exercising
//! per-shard lock contention and scalability characteristics.

use astra_cache::config::Config;
use astra_cache::core::errors::CacheError;
use astra_cache::core::protocol::RespValue;
use astra_cache::core::state::ServerState;
use astra_cache::core::{Command, handler};
use bytes::Bytes;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::task;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

#[derive(Clone)]
struct BenchContext {
    state: Arc<ServerState>,
    session_id: u64,
}

impl BenchContext {
    async fn new() -> Self {
        let env_filter = EnvFilter::new("warn");
        let (filter, reload_handle) = reload::Layer::new(env_filter);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();

        let server_init =
            ServerState::initialize(Config::default(), Arc::new(reload_handle)).expect("failed to initialize server state");

        Self { state: server_init.state, session_id: 1 }
    }

    async fn run(&self, argv: &[&str]) -> Result<RespValue, CacheError> {
        let argv: Vec<Bytes> = argv.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect();
        let command = Command::parse(argv)?;
        handler::execute(&self.state, command, self.session_id).await
    }
}

pub fn bench_concurrent_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_reads");

    group.bench_function("10_concurrent_gets", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..100 {
                    ctx.run(&["SET", &format!("key{i}"), &format!("value{i}")]).await.unwrap();
                }

                let start = std::time::Instant::now();
                let mut handles = vec![];
                for _ in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        for i in 0..10 {
                            let key = format!("key{}", i % 100);
                            black_box(ctx_clone.run(&["GET", &key]).await.unwrap());
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("100_concurrent_gets", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..100 {
                    ctx.run(&["SET", &format!("key{i}"), &format!("value{i}")]).await.unwrap();
                }

                let start = std::time::Instant::now();
                let mut handles = vec![];
                for _ in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        for i in 0..100 {
                            let key = format!("key{}", i % 100);
                            black_box(ctx_clone.run(&["GET", &key]).await.unwrap());
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

pub fn bench_concurrent_writes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_writes");

    group.bench_function("10_concurrent_sets", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();
                let mut handles = vec![];
                for i in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        for j in 0..10 {
                            let key = format!("key{i}_{j}");
                            let value = format!("value{i}_{j}");
                            ctx_clone.run(&["SET", &key, &value]).await.unwrap();
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("same_key_concurrent_incr", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                ctx.run(&["SET", "counter", "0"]).await.unwrap();

                let start = std::time::Instant::now();
                let mut handles = vec![];
                for _ in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        black_box(ctx_clone.run(&["INCR", "counter"]).await.unwrap());
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

pub fn bench_mixed_workloads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("mixed_workloads");

    group.bench_function("read_heavy_workload", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..100 {
                    ctx.run(&["SET", &format!("key{i}"), &format!("value{i}")]).await.unwrap();
                }

                let start = std::time::Instant::now();
                let mut handles = vec![];
                for _ in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        // 80% reads, 20% writes
                        for i in 0..100 {
                            if i % 5 == 0 {
                                let key = format!("write_key{i}");
                                let value = format!("write_value{i}");
                                black_box(ctx_clone.run(&["SET", &key, &value]).await.unwrap());
                            } else {
                                let key = format!("key{}", i % 100);
                                black_box(ctx_clone.run(&["GET", &key]).await.unwrap());
                            }
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("write_heavy_workload", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;

                let start = std::time::Instant::now();
                let mut handles = vec![];
                for _ in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        // 20% reads, 80% writes
                        for i in 0..100 {
                            if i % 5 == 0 {
                                let key = format!("read_key{}", i % 10);
                                black_box(ctx_clone.run(&["GET", &key]).await.unwrap_or(RespValue::Null));
                            } else {
                                let key = format!("write_key{i}");
                                let value = format!("write_value{i}");
                                black_box(ctx_clone.run(&["SET", &key, &value]).await.unwrap());
                            }
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

pub fn bench_concurrent_hash_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_hash_operations");

    group.bench_function("concurrent_hash_sets", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();
                let mut handles = vec![];
                for i in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        for j in 0..10 {
                            let field = format!("field{i}_{j}");
                            let value = format!("value{i}_{j}");
                            ctx_clone.run(&["HSET", "myhash", &field, &value]).await.unwrap();
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("concurrent_hash_gets", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..100 {
                    ctx.run(&["HSET", "myhash", &format!("field{i}"), &format!("value{i}")])
                        .await
                        .unwrap();
                }

                let start = std::time::Instant::now();
                let mut handles = vec![];
                for _ in 0..iters {
                    let ctx_clone = ctx.clone();
                    handles.push(task::spawn(async move {
                        for i in 0..10 {
                            let field = format!("field{}", i % 100);
                            black_box(ctx_clone.run(&["HGET", "myhash", &field]).await.unwrap());
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_concurrent_reads,
    bench_concurrent_writes,
    bench_mixed_workloads,
    bench_concurrent_hash_operations
);
criterion_main!(benches);
