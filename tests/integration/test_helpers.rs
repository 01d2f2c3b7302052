// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests.

use astra_cache::config::Config;
use astra_cache::core::errors::CacheError;
use astra_cache::core::protocol::RespValue;
use astra_cache::core::state::ServerState;
use astra_cache::core::{Command, handler};
use bytes::Bytes;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

/// A complete in-process test environment backed by a real `ServerState`,
/// without any network plumbing.
pub struct TestContext {
    pub state: Arc<ServerState>,
    pub session_id: u64,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let env_filter = EnvFilter::new("warn");
        let (filter, reload_handle) = reload::Layer::new(env_filter);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();

        let server_init =
            ServerState::initialize(config, Arc::new(reload_handle)).expect("failed to initialize server state");

        Self {
            state: server_init.state,
            session_id: 1,
        }
    }

    pub async fn execute(&self, command: Command) -> Result<RespValue, CacheError> {
        handler::execute(&self.state, command, self.session_id).await
    }

    /// Parses `argv` the way the connection layer would and runs it.
    pub async fn run(&self, argv: &[&str]) -> Result<RespValue, CacheError> {
        let argv: Vec<Bytes> = argv.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect();
        let command = Command::parse(argv)?;
        self.execute(command).await
    }
}

pub fn bulk(s: &str) -> RespValue {
    RespValue::BulkString(Bytes::copy_from_slice(s.as_bytes()))
}
