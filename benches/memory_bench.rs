// benches/memory_bench.rs

//! Memory usage benchmarks.
//!
//! Measures memory consumption patterns across data structures, reading the
//! shard accounting `Db` already tracks rather than a process-wide sampler.

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

    fn memory_usage(&self) -> usize {
        self.state.db.get_current_memory()
    }

    async fn flush(&self) {
        self.state.db.clear_all_shards().await;
    }
}

pub fn bench_string_memory_usage(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("string_memory_usage");

    group.bench_function("memory_growth_small_strings", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["SET", &format!("key{i}"), &format!("value{i}")]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.bench_function("memory_growth_large_strings", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();
                let value = "x".repeat(1024);

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["SET", &format!("key{i}"), &value]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.bench_function("memory_growth_very_large_strings", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();
                let value = "x".repeat(1024 * 1024);

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["SET", &format!("key{i}"), &value]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.finish();
}

pub fn bench_hash_memory_usage(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hash_memory_usage");

    group.bench_function("memory_growth_small_hash", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["HSET", "myhash", &format!("field{i}"), &format!("value{i}")])
                        .await
                        .unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.bench_function("memory_growth_large_hash", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let field = format!("field{i:04}");
                    let value = format!("value{i:04}");
                    ctx.run(&["HSET", "largehash", &field, &value]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.bench_function("multiple_small_hashes", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let hash_key = format!("hash{}", i / 10);
                    let field = format!("field{}", i % 10);
                    let value = format!("value{i}");
                    ctx.run(&["HSET", &hash_key, &field, &value]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.finish();
}

pub fn bench_list_memory_usage(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("list_memory_usage");

    group.bench_function("memory_growth_small_list", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["LPUSH", "mylist", &format!("value{i}")]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.bench_function("memory_growth_large_list", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["LPUSH", "largelist", &format!("value{i:04}")]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.finish();
}

pub fn bench_set_memory_usage(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("set_memory_usage");

    group.bench_function("memory_growth_small_set", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["SADD", "myset", &format!("member{i}")]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.bench_function("memory_growth_large_set", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    ctx.run(&["SADD", "largeset", &format!("member{i:04}")]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.finish();
}

pub fn bench_sorted_set_memory_usage(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sorted_set_memory_usage");

    group.bench_function("memory_growth_small_zset", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let member = format!("member{i}");
                    ctx.run(&["ZADD", "myzset", &i.to_string(), &member]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.bench_function("memory_growth_large_zset", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let initial_memory = ctx.memory_usage();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let member = format!("member{i:04}");
                    ctx.run(&["ZADD", "largezset", &i.to_string(), &member]).await.unwrap();
                }
                let duration = start.elapsed();

                let memory_growth = ctx.memory_usage().saturating_sub(initial_memory);
                black_box(memory_growth);
                duration
            })
        });
    });

    group.finish();
}

pub fn bench_memory_efficiency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("memory_efficiency");

    group.bench_function("string_vs_hash_storage", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();

                for i in 0..iters {
                    ctx.run(&["SET", &format!("user:{i}:name"), &format!("User{i}")]).await.unwrap();
                    ctx.run(&["SET", &format!("user:{i}:email"), &format!("user{i}@example.com")])
                        .await
                        .unwrap();
                    ctx.run(&["SET", &format!("user:{i}:age"), &format!("{}", i % 100)]).await.unwrap();
                }
                let string_memory = ctx.memory_usage();

                ctx.flush().await;

                for i in 0..iters {
                    let user_key = format!("user:{i}");
                    ctx.run(&["HSET", &user_key, "name", &format!("User{i}")]).await.unwrap();
                    ctx.run(&["HSET", &user_key, "email", &format!("user{i}@example.com")]).await.unwrap();
                    ctx.run(&["HSET", &user_key, "age", &format!("{}", i % 100)]).await.unwrap();
                }
                let hash_memory = ctx.memory_usage();

                let duration = start.elapsed();
                let efficiency_ratio = string_memory as f64 / hash_memory.max(1) as f64;
                black_box(efficiency_ratio);
                duration
            })
        });
    });

    group.bench_function("list_vs_set_storage", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let ctx = BenchContext::new().await;
                let start = std::time::Instant::now();

                for i in 0..iters {
                    ctx.run(&["LPUSH", "mylist", &format!("item{i}")]).await.unwrap();
                }
                let list_memory = ctx.memory_usage();

                ctx.flush().await;

                for i in 0..iters {
                    ctx.run(&["SADD", "myset", &format!("item{i}")]).await.unwrap();
                }
                let set_memory = ctx.memory_usage();

                let duration = start.elapsed();
                let efficiency_ratio = list_memory as f64 / set_memory.max(1) as f64;
                black_box(efficiency_ratio);
                duration
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_string_memory_usage,
    bench_hash_memory_usage,
    bench_list_memory_usage,
    bench_set_memory_usage,
    bench_sorted_set_memory_usage,
    bench_memory_efficiency
);
criterion_main!(benches);
