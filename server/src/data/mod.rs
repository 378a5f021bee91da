//! Data layer: PostgreSQL service, repositories, and row types

pub mod postgres;
pub mod types;

pub use postgres::{PgPool, PostgresError, PostgresService};
