//! API route handlers

pub mod connection;
pub mod health;
pub mod products;
pub mod sync;
pub mod webhooks;
