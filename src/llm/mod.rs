//! The AI categorization loop: a chat-endpoint client, the system prompt,
//! and the orchestrator that batches uncategorized entries and applies the
//! model's suggestions back through the Accountant tool surface.

pub mod categorizer;
pub mod client;
pub mod prompts;
pub mod types;

pub use categorizer::{CategorizationOrchestrator, CategorizationSummary};
pub use client::{ChatClient, ChatEndpoint};
pub use types::{Categorization, CategorizationResponse};
