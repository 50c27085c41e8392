//! Unit tests for the spawn CLI
//!
//! These tests use mocked ports and run fast without network or cloud access.

mod architecture;
mod helpers;
mod mocks;
mod run_pipeline_service;
