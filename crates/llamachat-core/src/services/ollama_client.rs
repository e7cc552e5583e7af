//! Ollama HTTP implementation of [`ChatBackend`].

use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use rig::agent::MultiTurnStreamItem;
use rig::client::{CompletionClient, Nothing};
use rig::completion::Message;
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::backend::{BoxFuture, ChatBackend, FragmentStream, ModelInfo};
use super::ndjson::LineBuffer;
use crate::error::{BackendError, BackendResult};
use crate::models::{ChatMessage, Role, SamplingParams};

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ShowRequest {
    model: String,
}

#[derive(Debug, Default, Deserialize)]
struct ShowResponse {
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    details: ShowDetails,
}

#[derive(Debug, Default, Deserialize)]
struct ShowDetails {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    parameter_size: Option<String>,
    #[serde(default)]
    quantization_level: Option<String>,
}

#[derive(Debug, Serialize)]
struct PullRequest {
    model: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), host)
    }

    pub fn with_client(client: reqwest::Client, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.host, path)
    }
}

impl ChatBackend for OllamaClient {
    fn host(&self) -> &str {
        &self.host
    }

    fn list_models(&self) -> BoxFuture<'static, BackendResult<BTreeSet<String>>> {
        let client = self.client.clone();
        let host = self.host.clone();
        let url = self.endpoint("tags");

        Box::pin(async move {
            let models = fetch_tags(&client, &url, &host).await?;
            debug!(count = models.len(), "Listed installed Ollama models");
            Ok(models.into_iter().map(|m| m.name).collect())
        })
    }

    fn describe_model(&self, name: &str) -> BoxFuture<'static, BackendResult<ModelInfo>> {
        let client = self.client.clone();
        let host = self.host.clone();
        let show_url = self.endpoint("show");
        let tags_url = self.endpoint("tags");
        let name = name.to_string();

        Box::pin(async move {
            let response = client
                .post(&show_url)
                .json(&ShowRequest {
                    model: name.clone(),
                })
                .send()
                .await
                .map_err(|e| BackendError::connection(&host, e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(BackendError::NotFound(name));
            }
            if !status.is_success() {
                let detail = error_detail(response).await;
                warn!(model = %name, status = %status, detail = %detail, "Ollama /api/show returned error");
                return Err(BackendError::connection(
                    &host,
                    format!("{}: {}", status, detail),
                ));
            }

            let show: ShowResponse = response.json().await.map_err(|e| {
                BackendError::connection(&host, format!("invalid /api/show response: {}", e))
            })?;

            // /api/show does not always report a size; the tags listing does
            let size_bytes = match show.size {
                Some(size) => Some(size),
                None => match fetch_tags(&client, &tags_url, &host).await {
                    Ok(models) => models.into_iter().find(|m| m.name == name).and_then(|m| m.size),
                    Err(e) => {
                        debug!(model = %name, error = ?e, "Could not look up model size");
                        None
                    }
                },
            };

            Ok(ModelInfo {
                name,
                size_bytes,
                family: show.details.family,
                parameter_size: show.details.parameter_size,
                quantization_level: show.details.quantization_level,
            })
        })
    }

    fn request_download(&self, name: &str) -> BoxFuture<'static, BackendResult<()>> {
        let client = self.client.clone();
        let host = self.host.clone();
        let url = self.endpoint("pull");
        let name = name.to_string();

        Box::pin(async move {
            info!(model = %name, "Pulling model");

            let response = client
                .post(&url)
                .json(&PullRequest {
                    model: name.clone(),
                    stream: true,
                })
                .send()
                .await
                .map_err(|e| BackendError::connection(&host, e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let detail = error_detail(response).await;
                return Err(BackendError::download(
                    &name,
                    format!("{}: {}", status, detail),
                ));
            }

            let mut body = response.bytes_stream();
            let mut lines = LineBuffer::new();
            let mut succeeded = false;

            loop {
                let (batch, eof) = match body.next().await {
                    Some(Ok(chunk)) => match lines.push(&chunk) {
                        Ok(batch) => (batch, false),
                        Err(e) => return Err(BackendError::download(&name, e.to_string())),
                    },
                    Some(Err(e)) => return Err(BackendError::download(&name, e.to_string())),
                    None => (lines.finish().into_iter().collect(), true),
                };

                for line in batch {
                    let progress: PullProgress = match serde_json::from_str(&line) {
                        Ok(progress) => progress,
                        Err(e) => {
                            warn!(model = %name, error = ?e, "Skipping malformed pull progress line");
                            continue;
                        }
                    };

                    if let Some(error) = progress.error {
                        return Err(BackendError::download(&name, error));
                    }

                    let status = progress.status.unwrap_or_default();
                    if status == "success" {
                        succeeded = true;
                    }

                    match (progress.total, progress.completed) {
                        (Some(total), Some(completed)) if total > 0 => {
                            let percent = completed as f64 / total as f64 * 100.0;
                            debug!(model = %name, status = %status, percent = %format!("{:.1}", percent), "Pull progress");
                        }
                        _ => debug!(model = %name, status = %status, "Pull progress"),
                    }
                }

                if eof {
                    break;
                }
            }

            if !succeeded {
                return Err(BackendError::download(
                    &name,
                    "pull ended before the model was complete",
                ));
            }

            info!(model = %name, "Model pulled");
            Ok(())
        })
    }

    fn open_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        sampling: SamplingParams,
    ) -> BoxFuture<'static, BackendResult<FragmentStream>> {
        let host = self.host.clone();
        let model = model.to_string();

        Box::pin(async move {
            let conversation = RigConversation::from_messages(messages)
                .ok_or_else(|| BackendError::connection(&host, "no message to send"))?;

            let client = rig::providers::ollama::Client::builder()
                .api_key(Nothing)
                .base_url(&host)
                .build()
                .map_err(|e| BackendError::connection(&host, e.to_string()))?;

            let mut builder = client
                .agent(&model)
                .temperature(widen(sampling.temperature))
                .additional_params(json!({
                    "top_p": widen(sampling.top_p),
                    "top_k": sampling.top_k,
                }));
            if let Some(preamble) = &conversation.preamble {
                builder = builder.preamble(preamble);
            }
            let agent = builder.build();

            debug!(
                model = %model,
                history = conversation.history.len(),
                temperature = sampling.temperature,
                "Opening chat stream"
            );

            let stream = agent
                .stream_prompt(conversation.prompt)
                .with_history(conversation.history)
                .await;

            let items = stream.map(|item| match item {
                Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(
                    text,
                ))) => Ok(Some(text.text)),
                // reasoning, tool calls and the final summary carry no reply text
                Ok(_) => Ok(None),
                Err(e) => Err(e.to_string()),
            });
            Ok(classify_fragments(host, model, items))
        })
    }
}

/// Outbound messages reshaped for a rig agent: system text becomes the
/// preamble, the last turn becomes the prompt, everything before it history.
struct RigConversation {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

impl RigConversation {
    fn from_messages(messages: Vec<ChatMessage>) -> Option<Self> {
        let mut preamble = Vec::new();
        let mut turns = Vec::new();
        for message in messages {
            match message.role() {
                Role::System => preamble.push(message.content().to_string()),
                Role::User => turns.push(Message::user(message.content())),
                Role::Assistant => turns.push(Message::assistant(message.content())),
            }
        }

        let prompt = turns.pop()?;
        Some(Self {
            preamble: (!preamble.is_empty()).then(|| preamble.join("\n\n")),
            history: turns,
            prompt,
        })
    }
}

/// Widen through the shortest decimal form so 0.7 stays 0.7 on the wire
fn widen(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

/// Turn a stream of optional text pieces into reply fragments.
///
/// Failures are classified by [`BackendError::stream_failure`]: before the
/// first fragment they are connection errors, afterwards interruptions. A
/// missing model reported before any output maps to `NotFound`.
pub(crate) fn classify_fragments<S>(host: String, model: String, items: S) -> FragmentStream
where
    S: Stream<Item = Result<Option<String>, String>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut items = Box::pin(items);
        let mut delivered = 0usize;

        while let Some(item) = items.next().await {
            match item {
                Ok(Some(text)) if !text.is_empty() => {
                    delivered += 1;
                    yield Ok(text);
                }
                Ok(_) => {}
                Err(message) => {
                    if delivered == 0 && message.to_ascii_lowercase().contains("not found") {
                        yield Err(BackendError::NotFound(model.clone()));
                    } else {
                        yield Err(BackendError::stream_failure(&host, delivered, message));
                    }
                    return;
                }
            }
        }
        debug!(fragments = delivered, "Chat stream done");
    })
}

async fn fetch_tags(
    client: &reqwest::Client,
    url: &str,
    host: &str,
) -> BackendResult<Vec<TagModel>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| BackendError::connection(host, e.to_string()))?;

    if !response.status().is_success() {
        return Err(BackendError::connection(
            host,
            format!("Ollama API returned status: {}", response.status()),
        ));
    }

    let tags: TagsResponse = response.json().await.map_err(|e| {
        BackendError::connection(host, format!("invalid /api/tags response: {}", e))
    })?;
    Ok(tags.models)
}

/// Best-effort extraction of Ollama's `{"error": "..."}` body
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) if !text.trim().is_empty() => text.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}
