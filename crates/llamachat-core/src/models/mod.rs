pub mod chat_stats;
pub mod error_store;
pub mod history;
pub mod message;
pub mod model_config;
pub mod session_state;

pub use chat_stats::{ChatStatistics, format_duration, format_thousands};
pub use error_store::{ErrorEntry, ErrorLevel, ErrorStore};
pub use history::ConversationHistory;
pub use message::{ChatMessage, Role};
pub use model_config::{ModelConfig, SamplingParams};
pub use session_state::SessionState;
