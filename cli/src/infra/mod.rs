//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, HTTP,
//! the history file, the manifest cache, terminal handling and the cloud
//! backends.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod backend;
pub mod command_runner;
pub mod config;
pub mod event_stream;
pub mod history;
pub mod http;
pub mod manifest;
pub mod signal;
pub mod terminal;
