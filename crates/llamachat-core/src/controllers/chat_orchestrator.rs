use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BackendError, BackendResult};
use crate::models::{ModelConfig, SessionState};
use crate::services::{
    AvailabilityReport, ChatBackend, GenerationEvent, GenerationOutcome, GenerationStream,
    ModelAvailabilityChecker, ModelInfo, PartialResponse, ResponseAccumulator,
};

/// Lifecycle of one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingModel,
    Streaming,
    Completed,
    Failed,
}

/// How a submitted turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Nothing to send; the session was not touched
    Ignored,
    /// The model is not installed yet; the session was not touched
    AwaitingModel,
    /// The reply was committed to history and statistics
    Completed { reply: String },
    /// The user message stays in history without a reply.
    ///
    /// `partial` is whatever arrived before the failure; it is never
    /// committed. `error` is `None` when the backend ended the stream
    /// cleanly without any text.
    Failed {
        partial: String,
        error: Option<BackendError>,
    },
}

impl TurnOutcome {
    pub fn state(&self) -> TurnState {
        match self {
            TurnOutcome::Ignored => TurnState::Idle,
            TurnOutcome::AwaitingModel => TurnState::AwaitingModel,
            TurnOutcome::Completed { .. } => TurnState::Completed,
            TurnOutcome::Failed { .. } => TurnState::Failed,
        }
    }
}

/// Result of [`ChatOrchestrator::begin_turn`]
pub enum TurnStart<'a> {
    /// The turn ended before reaching the backend
    Rejected(TurnOutcome),
    Streaming(ChatTurn<'a>),
}

/// Owns the session and runs one turn at a time against the backend.
pub struct ChatOrchestrator {
    session: SessionState,
    checker: ModelAvailabilityChecker,
    accumulator: ResponseAccumulator,
}

impl ChatOrchestrator {
    /// Create an orchestrator assuming the model is not yet known to be installed.
    pub fn new(config: ModelConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            session: SessionState::new(config, false),
            checker: ModelAvailabilityChecker::new(backend.clone()),
            accumulator: ResponseAccumulator::new(backend),
        }
    }

    /// Create an orchestrator and run the initial availability check.
    pub async fn start(
        config: ModelConfig,
        backend: Arc<dyn ChatBackend>,
    ) -> (Self, AvailabilityReport) {
        let mut orchestrator = Self::new(config, backend);
        let report = orchestrator.refresh_availability().await;
        info!(
            session = %orchestrator.session.id(),
            model = %orchestrator.session.config().model_name(),
            available = report.available,
            "Session started"
        );
        (orchestrator, report)
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Re-ask the backend whether the model is installed
    pub async fn refresh_availability(&mut self) -> AvailabilityReport {
        let report = self.checker.check_availability(self.session.config()).await;
        self.session.set_model_available(report.available);
        report
    }

    pub async fn ensure_available(&mut self) -> AvailabilityReport {
        self.checker.ensure_available(&mut self.session).await
    }

    pub async fn model_info(&self) -> BackendResult<ModelInfo> {
        self.checker.model_info(self.session.config()).await
    }

    /// Returns the temperature actually stored after clamping
    pub fn set_temperature(&mut self, temperature: f32) -> f32 {
        let applied = self.session.set_temperature(temperature);
        debug!(requested = temperature, applied, "Temperature changed");
        applied
    }

    pub fn clear(&mut self) {
        self.session.reset();
        info!(session = %self.session.id(), "Chat cleared");
    }

    /// Start a turn for `user_text`.
    ///
    /// On `Streaming` the user message is already in history; drive the
    /// returned [`ChatTurn`] to completion to commit the reply.
    pub fn begin_turn(&mut self, user_text: &str) -> TurnStart<'_> {
        if user_text.trim().is_empty() {
            return TurnStart::Rejected(TurnOutcome::Ignored);
        }
        if !self.session.model_available() {
            warn!(
                model = %self.session.config().model_name(),
                "Model not available, message not sent"
            );
            return TurnStart::Rejected(TurnOutcome::AwaitingModel);
        }

        self.session.push_user_message(user_text);
        let events = self
            .accumulator
            .generate(self.session.history(), self.session.config());
        debug!(
            session = %self.session.id(),
            history = self.session.history().len(),
            "Turn started"
        );

        TurnStart::Streaming(ChatTurn {
            session: &mut self.session,
            user_text: user_text.to_string(),
            events,
            partial: None,
            outcome: None,
        })
    }

    /// Run a whole turn without observing partial output
    pub async fn submit(&mut self, user_text: &str) -> TurnOutcome {
        match self.begin_turn(user_text) {
            TurnStart::Rejected(outcome) => outcome,
            TurnStart::Streaming(turn) => turn.finish().await,
        }
    }
}

/// A turn whose response is streaming.
///
/// Holds the orchestrator's session exclusively, so no second turn can start
/// until this one is finished or dropped. Dropping it early abandons the
/// response; the user message stays in history.
pub struct ChatTurn<'a> {
    session: &'a mut SessionState,
    user_text: String,
    events: GenerationStream,
    partial: Option<PartialResponse>,
    outcome: Option<GenerationOutcome>,
}

impl ChatTurn<'_> {
    pub fn state(&self) -> TurnState {
        TurnState::Streaming
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn session(&self) -> &SessionState {
        &*self.session
    }

    /// Latest partial response, if any fragment arrived yet
    pub fn partial(&self) -> Option<&PartialResponse> {
        self.partial.as_ref()
    }

    /// Wait for the next fragment. Returns `None` once the stream has ended.
    pub async fn next_partial(&mut self) -> Option<&PartialResponse> {
        if self.outcome.is_some() {
            return None;
        }
        match self.events.next().await {
            Some(GenerationEvent::Partial(partial)) => {
                self.partial = Some(partial);
                self.partial.as_ref()
            }
            Some(GenerationEvent::Finished(outcome)) => {
                self.outcome = Some(outcome);
                None
            }
            None => {
                self.outcome = Some(GenerationOutcome::Completed(String::new()));
                None
            }
        }
    }

    /// Drain the rest of the stream and commit the result to the session.
    pub async fn finish(mut self) -> TurnOutcome {
        while self.next_partial().await.is_some() {}

        let outcome = self
            .outcome
            .take()
            .unwrap_or(GenerationOutcome::Completed(String::new()));

        match outcome {
            GenerationOutcome::Completed(reply) if !reply.is_empty() => {
                self.session.complete_exchange(&self.user_text, reply.clone());
                info!(
                    session = %self.session.id(),
                    exchanges = self.session.stats().total_exchanges(),
                    "Exchange completed"
                );
                TurnOutcome::Completed { reply }
            }
            GenerationOutcome::Completed(_) => {
                warn!(session = %self.session.id(), "Model returned an empty response");
                TurnOutcome::Failed {
                    partial: String::new(),
                    error: None,
                }
            }
            GenerationOutcome::Failed { partial, error } => TurnOutcome::Failed {
                partial,
                error: Some(error),
            },
        }
    }
}
