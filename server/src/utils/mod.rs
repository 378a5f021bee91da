//! Shared utilities

pub mod crypto;
pub mod retry;
pub mod time;
