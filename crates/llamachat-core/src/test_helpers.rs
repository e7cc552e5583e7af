//! Shared test helpers for the session engine unit tests.
//!
//! Provides `ScriptedBackend`, a fully in-memory implementation of
//! [`ChatBackend`] whose responses are queued up front and whose calls are
//! recorded for assertions.

use futures::stream;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};

use crate::error::{BackendError, BackendResult};
use crate::models::{ChatMessage, SamplingParams};
use crate::services::backend::{BoxFuture, ChatBackend, FragmentStream, ModelInfo};

pub const TEST_HOST: &str = "http://localhost:11434";

/// What the next `open_stream` call produces
pub enum StreamScript {
    /// Fragments delivered in order, then a clean end
    Fragments(Vec<&'static str>),
    /// `open_stream` itself fails
    OpenError(BackendError),
    /// Fragments delivered, then the stream yields this error
    FailAfter(Vec<&'static str>, BackendError),
}

/// One recorded `open_stream` call
#[derive(Debug, Clone)]
pub struct OpenedStream {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

/// In-memory mock of [`ChatBackend`] for unit tests.
pub struct ScriptedBackend {
    pub installed: Mutex<BTreeSet<String>>,
    /// If set, `list_models` returns this error.
    pub list_error: Mutex<Option<BackendError>>,
    /// If set, `request_download` returns this error.
    pub download_error: Mutex<Option<BackendError>>,
    pub info: Mutex<Option<ModelInfo>>,
    pub streams: Mutex<VecDeque<StreamScript>>,
    pub opened: Mutex<Vec<OpenedStream>>,
    pub list_calls: Mutex<usize>,
    pub downloads: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            installed: Mutex::new(BTreeSet::new()),
            list_error: Mutex::new(None),
            download_error: Mutex::new(None),
            info: Mutex::new(None),
            streams: Mutex::new(VecDeque::new()),
            opened: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(models: &[&str]) -> Self {
        let backend = Self::new();
        *backend.installed.lock() = models.iter().map(|m| m.to_string()).collect();
        backend
    }

    pub fn unreachable() -> Self {
        let backend = Self::new();
        *backend.list_error.lock() = Some(BackendError::connection(TEST_HOST, "connection refused"));
        backend
    }

    pub fn push_stream(&self, script: StreamScript) {
        self.streams.lock().push_back(script);
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn last_opened(&self) -> Option<OpenedStream> {
        self.opened.lock().last().cloned()
    }
}

fn fragments(items: Vec<&'static str>) -> Vec<BackendResult<String>> {
    items.into_iter().map(|s| Ok(s.to_string())).collect()
}

impl ChatBackend for ScriptedBackend {
    fn host(&self) -> &str {
        TEST_HOST
    }

    fn list_models(&self) -> BoxFuture<'static, BackendResult<BTreeSet<String>>> {
        *self.list_calls.lock() += 1;
        let result = match self.list_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(self.installed.lock().clone()),
        };
        Box::pin(async move { result })
    }

    fn describe_model(&self, name: &str) -> BoxFuture<'static, BackendResult<ModelInfo>> {
        let result = self
            .info
            .lock()
            .clone()
            .filter(|info| info.name == name)
            .ok_or_else(|| BackendError::NotFound(name.to_string()));
        Box::pin(async move { result })
    }

    fn request_download(&self, name: &str) -> BoxFuture<'static, BackendResult<()>> {
        self.downloads.lock().push(name.to_string());
        let result = match self.download_error.lock().clone() {
            Some(err) => Err(err),
            None => {
                self.installed.lock().insert(name.to_string());
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn open_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        sampling: SamplingParams,
    ) -> BoxFuture<'static, BackendResult<FragmentStream>> {
        self.opened.lock().push(OpenedStream {
            model: model.to_string(),
            messages,
            sampling,
        });

        let script = self
            .streams
            .lock()
            .pop_front()
            .unwrap_or(StreamScript::Fragments(Vec::new()));

        let result: BackendResult<FragmentStream> = match script {
            StreamScript::Fragments(items) => Ok(Box::pin(stream::iter(fragments(items)))),
            StreamScript::OpenError(err) => Err(err),
            StreamScript::FailAfter(items, err) => {
                let mut items = fragments(items);
                items.push(Err(err));
                Ok(Box::pin(stream::iter(items)))
            }
        };
        Box::pin(async move { result })
    }
}
