//! Session and streaming engine for chatting with a local Ollama server.
//!
//! [`ChatOrchestrator`] owns one [`SessionState`] and runs turns against a
//! [`ChatBackend`]; [`OllamaClient`] is the HTTP implementation. Front-ends
//! render whatever the session and the current [`ChatTurn`] expose.

pub mod config;
pub mod controllers;
pub mod error;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_helpers;

pub use config::{ConfigError, ModelConfigBuilder};
pub use controllers::{ChatOrchestrator, ChatTurn, TurnOutcome, TurnStart, TurnState};
pub use error::{BackendError, BackendResult};
pub use models::{
    ChatMessage, ChatStatistics, ConversationHistory, ErrorEntry, ErrorLevel, ErrorStore,
    ModelConfig, Role, SamplingParams, SessionState,
};
pub use services::{
    AvailabilityReport, ChatBackend, ErrorCollectorLayer, IN_PROGRESS_MARKER, ModelInfo,
    OllamaClient, PartialResponse,
};
