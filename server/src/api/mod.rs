//! API server and routes

pub mod auth;
pub mod middleware;
pub mod routes;
mod server;
pub mod state;
pub mod types;

pub use server::ApiServer;
pub use state::ApiState;
