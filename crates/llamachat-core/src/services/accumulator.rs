use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backend::ChatBackend;
use crate::error::BackendError;
use crate::models::{ChatMessage, ConversationHistory, ModelConfig};

/// Appended to partial text while a response is still streaming
pub const IN_PROGRESS_MARKER: char = '▌';

/// Snapshot of the response accumulated so far
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResponse {
    text: String,
    fragments: usize,
}

impl PartialResponse {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Text plus the in-progress marker, for live display
    pub fn display(&self) -> String {
        let mut display = String::with_capacity(self.text.len() + IN_PROGRESS_MARKER.len_utf8());
        display.push_str(&self.text);
        display.push(IN_PROGRESS_MARKER);
        display
    }
}

/// How a generation ended
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The stream ended normally; may still be empty
    Completed(String),
    /// The stream failed; `partial` holds whatever arrived before the error
    Failed { partial: String, error: BackendError },
}

impl GenerationOutcome {
    /// Text safe to commit as an assistant reply
    pub fn reply(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Completed(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            GenerationOutcome::Completed(text) => text,
            GenerationOutcome::Failed { partial, .. } => partial,
        }
    }
}

/// Events of one generation: any number of `Partial`, then one `Finished`
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Partial(PartialResponse),
    Finished(GenerationOutcome),
}

pub type GenerationStream = BoxStream<'static, GenerationEvent>;

/// System prompt followed by the whole history, in order
pub fn build_outbound_messages(
    system_prompt: &str,
    history: &ConversationHistory,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages
}

/// Drives streaming completions and accumulates their text
#[derive(Clone)]
pub struct ResponseAccumulator {
    backend: Arc<dyn ChatBackend>,
}

impl ResponseAccumulator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Start a generation for `history`.
    ///
    /// The returned stream is lazy: nothing is sent until it is polled.
    pub fn generate(&self, history: &ConversationHistory, config: &ModelConfig) -> GenerationStream {
        let backend = self.backend.clone();
        let messages = build_outbound_messages(config.system_prompt(), history);
        let model = config.model_name().to_string();
        let sampling = config.sampling();

        Box::pin(async_stream::stream! {
            let mut fragments = match backend.open_stream(&model, messages, sampling).await {
                Ok(fragments) => fragments,
                Err(error) => {
                    warn!(model = %model, error = ?error, "Failed to start generation");
                    yield GenerationEvent::Finished(GenerationOutcome::Failed {
                        partial: String::new(),
                        error,
                    });
                    return;
                }
            };

            let mut buffer = String::new();
            let mut count = 0usize;

            while let Some(item) = fragments.next().await {
                match item {
                    Ok(fragment) => {
                        buffer.push_str(&fragment);
                        count += 1;
                        yield GenerationEvent::Partial(PartialResponse {
                            text: buffer.clone(),
                            fragments: count,
                        });
                    }
                    Err(error) => {
                        let error = classify(backend.host(), count, error);
                        warn!(model = %model, fragments = count, error = ?error, "Generation failed");
                        yield GenerationEvent::Finished(GenerationOutcome::Failed {
                            partial: buffer,
                            error,
                        });
                        return;
                    }
                }
            }

            info!(model = %model, fragments = count, chars = buffer.chars().count(), "Generation complete");
            yield GenerationEvent::Finished(GenerationOutcome::Completed(buffer));
        })
    }

    /// Run a generation to the end, handing each partial to `on_partial`
    pub async fn generate_with(
        &self,
        history: &ConversationHistory,
        config: &ModelConfig,
        mut on_partial: impl FnMut(&PartialResponse),
    ) -> GenerationOutcome {
        let mut events = self.generate(history, config);
        while let Some(event) = events.next().await {
            match event {
                GenerationEvent::Partial(partial) => on_partial(&partial),
                GenerationEvent::Finished(outcome) => return outcome,
            }
        }
        debug!("Generation stream ended without an outcome");
        GenerationOutcome::Completed(String::new())
    }
}

/// Keep the error kind consistent with how much text was delivered,
/// whatever the backend reported.
fn classify(host: &str, delivered: usize, error: BackendError) -> BackendError {
    match error {
        BackendError::StreamInterrupted { message, .. } if delivered == 0 => {
            BackendError::connection(host, message)
        }
        BackendError::Connection { message, .. } if delivered > 0 => {
            BackendError::stream_failure(host, delivered, message)
        }
        other => other,
    }
}
