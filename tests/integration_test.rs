// tests/integration_test.rs

//! Entry point for the integration test suite; `cargo test` only compiles
//! `tests/*.rs` as roots, so this file pulls in `tests/integration/` as a
//! module tree.

#[path = "integration/mod.rs"]
mod integration;
