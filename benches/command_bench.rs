// benches/command_bench.rs

//! Command execution benchmarks.
//!
//! Measures the performance of representative commands across each data
//! type under different workloads and data sizes.

use astra_cache::config::Config;
use astra_cache::core::errors::CacheError;
use astra_cache::core::protocol::RespValue;
use astra_cache::core::state::ServerState;
use astra_cache::core::{Command, handler};
use bytes::Bytes;
use criterion::{Criterion, criterion_group, criterion_main};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

/// A minimal in-process server, built the same way the integration suite's
/// `TestContext` is, without any network plumbing.
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

pub fn bench_string_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("string_operations");

    group.bench_function("set_get_small", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let key = format!("key{i}");
                    let value = format!("value{i}");
                    ctx.run(&["SET", &key, &value]).await.unwrap();
                    ctx.run(&["GET", &key]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("set_get_large", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let value = "x".repeat(1024);
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let key = format!("key{i}");
                    ctx.run(&["SET", &key, &value]).await.unwrap();
                    ctx.run(&["GET", &key]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("incr_operations", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                ctx.run(&["SET", "counter", "0"]).await.unwrap();
                let start = std::time::Instant::now();
                for _ in 0..iters {
                    ctx.run(&["INCR", "counter"]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

pub fn bench_hash_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hash_operations");

    group.bench_function("hset_hget_small", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let field = format!("field{i}");
                    let value = format!("value{i}");
                    ctx.run(&["HSET", "myhash", &field, &value]).await.unwrap();
                    ctx.run(&["HGET", "myhash", &field]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("hset_hget_large_hash", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..100 {
                    ctx.run(&["HSET", "largehash", &format!("field{i}"), &format!("value{i}")])
                        .await
                        .unwrap();
                }
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let field = format!("field{}", i % 100);
                    let value = format!("newvalue{i}");
                    ctx.run(&["HSET", "largehash", &field, &value]).await.unwrap();
                    ctx.run(&["HGET", "largehash", &field]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

pub fn bench_list_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("list_operations");

    group.bench_function("lpush_lpop", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let value = format!("value{i}");
                    ctx.run(&["LPUSH", "mylist", &value]).await.unwrap();
                    ctx.run(&["LPOP", "mylist"]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("lpush_lrange", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..100 {
                    ctx.run(&["LPUSH", "mylist", &format!("value{i}")]).await.unwrap();
                }
                let start = std::time::Instant::now();
                for _ in 0..iters {
                    ctx.run(&["LRANGE", "mylist", "0", "99"]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

pub fn bench_set_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("set_operations");

    group.bench_function("sadd_sismember", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let member = format!("member{i}");
                    ctx.run(&["SADD", "myset", &member]).await.unwrap();
                    ctx.run(&["SISMEMBER", "myset", &member]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("sadd_smembers_large", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..1000 {
                    ctx.run(&["SADD", "largeset", &format!("member{i}")]).await.unwrap();
                }
                let start = std::time::Instant::now();
                for _ in 0..iters {
                    ctx.run(&["SMEMBERS", "largeset"]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

pub fn bench_sorted_set_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sorted_set_operations");

    group.bench_function("zadd_zscore", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();
                for i in 0..iters {
                    let member = format!("member{i}");
                    ctx.run(&["ZADD", "myzset", &i.to_string(), &member]).await.unwrap();
                    ctx.run(&["ZSCORE", "myzset", &member]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("zadd_zrange_large", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                for i in 0..1000 {
                    ctx.run(&["ZADD", "largezset", &i.to_string(), &format!("member{i}")])
                        .await
                        .unwrap();
                }
                let start = std::time::Instant::now();
                for _ in 0..iters {
                    ctx.run(&["ZRANGE", "largezset", "0", "99"]).await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_string_operations,
    bench_hash_operations,
    bench_list_operations,
    bench_set_operations,
    bench_sorted_set_operations
);
criterion_main!(benches);
