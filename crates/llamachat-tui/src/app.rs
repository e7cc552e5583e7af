use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{FutureExt, Stream, StreamExt};
use llamachat_core::models::model_config::TEMPERATURE_STEP;
use llamachat_core::{
    AvailabilityReport, ChatOrchestrator, ErrorEntry, ErrorStore, ModelInfo, TurnOutcome,
    TurnStart, TurnState,
};
use ratatui::DefaultTerminal;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing::debug;

use crate::ui::{self, ChatView};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_ERROR_ENTRIES: usize = 200;

/// User intents decoded from key presses
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Send,
    Input(char),
    Backspace,
    Clear,
    Download,
    ModelInfo,
    Refresh,
    TemperatureUp,
    TemperatureDown,
    ToggleErrorLog,
    Quit,
}

impl Action {
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        match key.code {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Enter => Some(Action::Send),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Up if alt => Some(Action::TemperatureUp),
            KeyCode::Down if alt => Some(Action::TemperatureDown),
            KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
                'c' => Some(Action::Quit),
                'l' => Some(Action::Clear),
                'd' => Some(Action::Download),
                'o' => Some(Action::ModelInfo),
                'r' => Some(Action::Refresh),
                'e' => Some(Action::ToggleErrorLog),
                _ => None,
            },
            KeyCode::Char(c) if !alt => Some(Action::Input(c)),
            _ => None,
        }
    }
}

/// One-line message for the status bar
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Presentation-only state; the session itself lives in the orchestrator
#[derive(Debug, Default)]
pub struct UiState {
    pub input: String,
    pub notice: Option<Notice>,
    /// Text of the last interrupted response, shown but never committed
    pub interrupted: Option<String>,
    pub model_info: Option<ModelInfo>,
    /// Set while a blocking backend call (download, info) is running
    pub busy: Option<String>,
    pub show_error_log: bool,
    pub should_quit: bool,
}

pub struct App {
    orchestrator: ChatOrchestrator,
    ui: UiState,
    error_rx: Receiver<ErrorEntry>,
    errors: ErrorStore,
}

impl App {
    pub fn new(orchestrator: ChatOrchestrator, error_rx: Receiver<ErrorEntry>) -> Self {
        Self {
            orchestrator,
            ui: UiState::default(),
            error_rx,
            errors: ErrorStore::new(MAX_ERROR_ENTRIES),
        }
    }

    pub async fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        let mut events = EventStream::new();
        let mut tick = tokio::time::interval(TICK_RATE);

        while !self.ui.should_quit {
            self.errors.drain_from(&self.error_rx);
            terminal.draw(|frame| ui::draw(frame, &self.idle_view()))?;

            tokio::select! {
                _ = tick.tick() => {}
                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) => {
                        if let Some(action) = Action::from_key(key) {
                            self.handle(action, &mut |view: ChatView<'_>| {
                                terminal.draw(|frame| ui::draw(frame, &view))?;
                                Ok(())
                            })
                            .await?;
                            if matches!(action, Action::Send | Action::Download | Action::ModelInfo) {
                                self.discard_queued_keys(&mut events)?;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
            }
        }
        Ok(())
    }

    /// Keys typed while a blocking call ran are dropped, except a quit request
    fn discard_queued_keys<S>(&mut self, events: &mut S) -> anyhow::Result<()>
    where
        S: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        while let Some(Some(event)) = events.next().now_or_never() {
            if let Event::Key(key) = event? {
                if Action::from_key(key) == Some(Action::Quit) {
                    self.ui.should_quit = true;
                }
            }
        }
        Ok(())
    }

    fn idle_view(&self) -> ChatView<'_> {
        ChatView {
            session: self.orchestrator.session(),
            state: TurnState::Idle,
            partial: None,
            ui: &self.ui,
            errors: &self.errors,
        }
    }

    /// Apply one action. `redraw` is called whenever progress should be
    /// shown before the action finishes.
    pub async fn handle<F>(&mut self, action: Action, redraw: &mut F) -> anyhow::Result<()>
    where
        F: FnMut(ChatView<'_>) -> anyhow::Result<()>,
    {
        match action {
            Action::Input(c) => self.ui.input.push(c),
            Action::Backspace => {
                self.ui.input.pop();
            }
            Action::Send => self.send(redraw).await?,
            Action::Clear => {
                self.orchestrator.clear();
                self.ui.interrupted = None;
                self.ui.notice = Some(Notice::info("Chat cleared"));
            }
            Action::Download => {
                let model = self.orchestrator.session().config().model_name().to_string();
                self.ui.busy = Some(format!("Loading model '{}'... this may take a while", model));
                redraw(self.idle_view())?;
                let report = self.orchestrator.ensure_available().await;
                self.ui.busy = None;
                self.apply_report(report);
            }
            Action::ModelInfo => {
                self.ui.busy = Some("Fetching model info...".to_string());
                redraw(self.idle_view())?;
                let result = self.orchestrator.model_info().await;
                self.ui.busy = None;
                match result {
                    Ok(info) => {
                        self.ui.model_info = Some(info);
                        self.ui.notice = None;
                    }
                    Err(e) => {
                        self.ui.model_info = None;
                        self.ui.notice = Some(Notice::error(e.user_message()));
                    }
                }
            }
            Action::Refresh => {
                let report = self.orchestrator.refresh_availability().await;
                self.apply_report(report);
            }
            Action::TemperatureUp | Action::TemperatureDown => {
                let current = self.orchestrator.session().config().temperature();
                let delta = if action == Action::TemperatureUp {
                    TEMPERATURE_STEP
                } else {
                    -TEMPERATURE_STEP
                };
                self.orchestrator.set_temperature(current + delta);
            }
            Action::ToggleErrorLog => self.ui.show_error_log = !self.ui.show_error_log,
            Action::Quit => self.ui.should_quit = true,
        }
        Ok(())
    }

    async fn send<F>(&mut self, redraw: &mut F) -> anyhow::Result<()>
    where
        F: FnMut(ChatView<'_>) -> anyhow::Result<()>,
    {
        let text = std::mem::take(&mut self.ui.input);

        let outcome = match self.orchestrator.begin_turn(&text) {
            TurnStart::Rejected(outcome) => outcome,
            TurnStart::Streaming(mut turn) => {
                self.ui.interrupted = None;
                self.ui.notice = None;
                redraw(ChatView {
                    session: turn.session(),
                    state: turn.state(),
                    partial: None,
                    ui: &self.ui,
                    errors: &self.errors,
                })?;
                while turn.next_partial().await.is_some() {
                    self.errors.drain_from(&self.error_rx);
                    redraw(ChatView {
                        session: turn.session(),
                        state: turn.state(),
                        partial: turn.partial(),
                        ui: &self.ui,
                        errors: &self.errors,
                    })?;
                }
                turn.finish().await
            }
        };

        debug!(state = ?outcome.state(), "Turn finished");
        match outcome {
            TurnOutcome::Ignored | TurnOutcome::Completed { .. } => {}
            TurnOutcome::AwaitingModel => {
                self.ui.input = text;
                self.ui.notice = Some(Notice::error(self.missing_model_hint()));
            }
            TurnOutcome::Failed { partial, error } => {
                if !partial.is_empty() {
                    self.ui.interrupted = Some(partial);
                }
                let message = match error {
                    Some(e) => e.user_message(),
                    None => "The model returned an empty response".to_string(),
                };
                self.ui.notice = Some(Notice::error(message));
            }
        }
        Ok(())
    }

    pub fn apply_report(&mut self, report: AvailabilityReport) {
        self.ui.notice = Some(match (report.available, report.error) {
            (true, _) => Notice::info(format!(
                "Model '{}' is ready",
                self.orchestrator.session().config().model_name()
            )),
            (false, Some(e)) => Notice::error(e.user_message()),
            (false, None) => Notice::error(self.missing_model_hint()),
        });
    }

    fn missing_model_hint(&self) -> String {
        format!(
            "Model '{}' is not installed. Press Ctrl-D to download it.",
            self.orchestrator.session().config().model_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use llamachat_core::services::{BoxFuture, ChatBackend, FragmentStream};
    use llamachat_core::{
        BackendError, BackendResult, ChatMessage, ModelConfig, SamplingParams,
    };
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::mpsc::sync_channel;

    const HOST: &str = "http://localhost:11434";

    /// Replies with fixed fragments; optionally pretends the model is missing
    struct CannedBackend {
        installed: bool,
        fragments: Vec<BackendResult<String>>,
    }

    impl ChatBackend for CannedBackend {
        fn host(&self) -> &str {
            HOST
        }

        fn list_models(&self) -> BoxFuture<'static, BackendResult<BTreeSet<String>>> {
            let mut models = BTreeSet::new();
            if self.installed {
                models.insert("gpt-oss:20b".to_string());
            }
            Box::pin(async move { Ok(models) })
        }

        fn describe_model(&self, name: &str) -> BoxFuture<'static, BackendResult<ModelInfo>> {
            let err = BackendError::NotFound(name.to_string());
            Box::pin(async move { Err(err) })
        }

        fn request_download(&self, _name: &str) -> BoxFuture<'static, BackendResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn open_stream(
            &self,
            _model: &str,
            _messages: Vec<ChatMessage>,
            _sampling: SamplingParams,
        ) -> BoxFuture<'static, BackendResult<FragmentStream>> {
            let items = self.fragments.clone();
            Box::pin(async move { Ok(Box::pin(stream::iter(items)) as FragmentStream) })
        }
    }

    async fn app(installed: bool, fragments: Vec<BackendResult<String>>) -> App {
        let backend = Arc::new(CannedBackend { installed, fragments });
        let (orchestrator, report) =
            ChatOrchestrator::start(ModelConfig::new(HOST, "gpt-oss:20b"), backend).await;
        let (_tx, rx) = sync_channel(8);
        let mut app = App::new(orchestrator, rx);
        app.apply_report(report);
        app
    }

    fn ok(parts: &[&str]) -> Vec<BackendResult<String>> {
        parts.iter().map(|p| Ok(p.to_string())).collect()
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(Action::from_key(key(KeyCode::Enter, KeyModifiers::NONE)), Some(Action::Send));
        assert_eq!(
            Action::from_key(key(KeyCode::Char('l'), KeyModifiers::CONTROL)),
            Some(Action::Clear)
        );
        assert_eq!(
            Action::from_key(key(KeyCode::Char('o'), KeyModifiers::CONTROL)),
            Some(Action::ModelInfo)
        );
        assert_eq!(
            Action::from_key(key(KeyCode::Up, KeyModifiers::ALT)),
            Some(Action::TemperatureUp)
        );
        assert_eq!(
            Action::from_key(key(KeyCode::Char('C'), KeyModifiers::SHIFT)),
            Some(Action::Input('C'))
        );
        assert_eq!(Action::from_key(key(KeyCode::Up, KeyModifiers::NONE)), None);
        assert_eq!(Action::from_key(key(KeyCode::Esc, KeyModifiers::NONE)), Some(Action::Quit));
    }

    #[tokio::test]
    async fn test_send_redraws_each_partial() {
        let mut app = app(true, ok(&["Hel", "lo, ", "World"])).await;
        for c in "Hi".chars() {
            app.handle(Action::Input(c), &mut |_| Ok(())).await.unwrap();
        }

        let mut frames: Vec<(TurnState, Option<String>)> = Vec::new();
        app.handle(Action::Send, &mut |view: ChatView<'_>| {
            frames.push((view.state, view.partial.map(|p| p.text().to_string())));
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|(state, _)| *state == TurnState::Streaming));
        assert_eq!(frames[2].1.as_deref(), Some("Hello, "));
        assert!(app.ui.input.is_empty());
        assert_eq!(app.orchestrator.session().stats().total_exchanges(), 1);
    }

    #[tokio::test]
    async fn test_send_without_model_keeps_input() {
        let mut app = app(false, ok(&["unused"])).await;
        assert!(app.ui.notice.as_ref().unwrap().text.contains("Ctrl-D"));
        app.ui.input = "Hallo".to_string();

        app.handle(Action::Send, &mut |_| Ok(())).await.unwrap();

        assert_eq!(app.ui.input, "Hallo");
        assert!(app.orchestrator.session().history().is_empty());

        app.handle(Action::Download, &mut |_| Ok(())).await.unwrap();
        assert!(app.orchestrator.session().model_available());
        assert!(!app.ui.notice.as_ref().unwrap().is_error);
    }

    #[tokio::test]
    async fn test_interrupted_partial_is_shown_not_committed() {
        let mut fragments = ok(&["Hal"]);
        fragments.push(Err(BackendError::StreamInterrupted {
            fragments: 1,
            message: "reset".to_string(),
        }));
        let mut app = app(true, fragments).await;
        app.ui.input = "Hi".to_string();

        app.handle(Action::Send, &mut |_| Ok(())).await.unwrap();

        assert_eq!(app.ui.interrupted.as_deref(), Some("Hal"));
        assert!(app.ui.notice.as_ref().unwrap().is_error);
        assert_eq!(app.orchestrator.session().history().len(), 1);

        app.handle(Action::Clear, &mut |_| Ok(())).await.unwrap();
        assert!(app.ui.interrupted.is_none());
        assert!(app.orchestrator.session().history().is_empty());
    }

    #[tokio::test]
    async fn test_temperature_keys_step_and_clamp() {
        let mut app = app(true, Vec::new()).await;
        app.handle(Action::TemperatureUp, &mut |_| Ok(())).await.unwrap();
        let temp = app.orchestrator.session().config().temperature();
        assert!((temp - 0.8).abs() < 1e-6);

        for _ in 0..30 {
            app.handle(Action::TemperatureDown, &mut |_| Ok(())).await.unwrap();
        }
        assert_eq!(app.orchestrator.session().config().temperature(), 0.0);
    }

    #[tokio::test]
    async fn test_model_info_failure_sets_notice() {
        let mut app = app(true, Vec::new()).await;
        app.handle(Action::ModelInfo, &mut |_| Ok(())).await.unwrap();

        assert!(app.ui.model_info.is_none());
        assert!(app.ui.busy.is_none());
        assert!(app.ui.notice.as_ref().unwrap().text.contains("not installed"));
    }

    #[tokio::test]
    async fn test_queued_keys_are_dropped_but_quit_is_kept() {
        let mut app = app(true, Vec::new()).await;
        let mut queued = stream::iter(vec![
            Ok(Event::Key(key(KeyCode::Char('x'), KeyModifiers::NONE))),
            Ok(Event::Key(key(KeyCode::Enter, KeyModifiers::NONE))),
            Ok(Event::Key(key(KeyCode::Char('c'), KeyModifiers::CONTROL))),
        ]);

        app.discard_queued_keys(&mut queued).unwrap();

        assert!(app.ui.input.is_empty());
        assert!(app.ui.should_quit);
        assert!(queued.next().await.is_none());
    }

    #[tokio::test]
    async fn test_draining_stops_at_pending_input() {
        let mut app = app(true, Vec::new()).await;
        let mut queued = stream::iter(vec![Ok(Event::Key(key(
            KeyCode::Char('x'),
            KeyModifiers::NONE,
        )))])
        .chain(stream::pending());

        app.discard_queued_keys(&mut queued).unwrap();
        assert!(!app.ui.should_quit);
    }
}
