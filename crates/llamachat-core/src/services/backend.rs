use futures::stream::BoxStream;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use crate::error::BackendResult;
use crate::models::{ChatMessage, SamplingParams};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Incremental text fragments of one streaming completion, in arrival order
pub type FragmentStream = BoxStream<'static, BackendResult<String>>;

/// Metadata about an installed model
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: Option<u64>,
    pub family: Option<String>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

impl ModelInfo {
    /// Size in GiB, the unit the sidebar shows
    pub fn size_gb(&self) -> Option<f64> {
        self.size_bytes
            .map(|bytes| bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Interface to the model server.
///
/// Implementations are pure pass-throughs; deciding what a failure means for
/// the session is left to the caller.
pub trait ChatBackend: Send + Sync + 'static {
    /// Base URL of the backend, used in error messages
    fn host(&self) -> &str;

    /// Names of all installed models
    fn list_models(&self) -> BoxFuture<'static, BackendResult<BTreeSet<String>>>;

    /// Metadata for one model, or `NotFound`
    fn describe_model(&self, name: &str) -> BoxFuture<'static, BackendResult<ModelInfo>>;

    /// Fetch a model into the backend. Resolves once the download finished.
    fn request_download(&self, name: &str) -> BoxFuture<'static, BackendResult<()>>;

    /// Start a streaming chat completion.
    ///
    /// Fails with `Connection` before the first fragment; once fragments have
    /// been yielded, the stream itself reports `StreamInterrupted`.
    fn open_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        sampling: SamplingParams,
    ) -> BoxFuture<'static, BackendResult<FragmentStream>>;
}
