//! Domain services: provider client, sync, embeddings, webhooks, scheduler

pub mod embeddings;
pub mod scheduler;
pub mod sync;
pub mod wc;
pub mod webhooks;
