//! Repository functions over the PostgreSQL pool

pub mod product;
pub mod store;
pub mod webhook;
