// src/services/mod.rs
pub mod extract;
pub mod gateway;
#[cfg(test)]
pub mod mock;
pub mod pipeline;
pub mod revision_locks;
pub mod templates;

pub use gateway::{ChatMessage, ChatTransport, GatewayClient};
pub use pipeline::PromptPipeline;
pub use revision_locks::RevisionLocks;
