//! Conversational product search.
//!
//! A message is classified into an [`Intent`], grounded in either the catalog (product search),
//! the store profile (store info) or nothing (general), and answered by a language model.
//!
//! # Safety Principle
//!
//! The model only phrases replies. Which products it may mention and the no-match wording are
//! decided here before and after the call.

pub mod chat;
pub mod intent;
pub mod llm;
pub mod prompt;

pub use chat::{ChatError, ChatOrchestrator, ChatReply, ReplySource, DEGRADED_REPLY, FALLBACK_REPLY};
pub use intent::{Intent, IntentClassifier};
pub use llm::{client_from_config, HttpLlmClient, LlmClient};
pub use prompt::{PromptRenderer, BROWSE_ALL_POINTER, NO_MATCHES_SENTENCE};
