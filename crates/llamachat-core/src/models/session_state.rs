use uuid::Uuid;

use super::chat_stats::ChatStatistics;
use super::history::ConversationHistory;
use super::message::ChatMessage;
use super::model_config::ModelConfig;

/// Everything one chat session knows: history, statistics, model settings
/// and whether the configured model is installed.
///
/// Owned by the orchestrator and mutated only by the turn in progress.
#[derive(Debug, Clone)]
pub struct SessionState {
    id: Uuid,
    history: ConversationHistory,
    stats: ChatStatistics,
    config: ModelConfig,
    model_available: bool,
}

impl SessionState {
    pub fn new(config: ModelConfig, model_available: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            history: ConversationHistory::new(),
            stats: ChatStatistics::new(),
            config,
            model_available,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn stats(&self) -> &ChatStatistics {
        &self.stats
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn model_available(&self) -> bool {
        self.model_available
    }

    pub fn set_model_available(&mut self, available: bool) {
        self.model_available = available;
    }

    pub fn set_temperature(&mut self, temperature: f32) -> f32 {
        self.config.set_temperature(temperature)
    }

    pub(crate) fn push_user_message(&mut self, text: &str) {
        self.history.push(ChatMessage::user(text));
    }

    /// Commit a successful reply: the assistant message and its statistics
    /// are always updated together.
    pub(crate) fn complete_exchange(&mut self, user_text: &str, reply: String) {
        let assistant = ChatMessage::assistant(reply);
        self.stats.record_exchange(&ChatMessage::user(user_text), &assistant);
        self.history.push(assistant);
    }

    /// Start over: empty history and fresh statistics. Model settings and
    /// availability survive.
    pub fn reset(&mut self) {
        self.history.clear();
        self.stats = ChatStatistics::new();
    }
}
