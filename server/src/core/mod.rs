//! Core application infrastructure: CLI, configuration, constants, shutdown

pub mod cli;
pub mod config;
pub mod constants;
pub mod shutdown;
