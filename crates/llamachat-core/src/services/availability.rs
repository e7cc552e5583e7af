use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backend::{ChatBackend, ModelInfo};
use crate::error::{BackendError, BackendResult};
use crate::models::{ModelConfig, SessionState};

/// Result of an availability check.
///
/// `available` is always resolvable; `error` carries the message the UI
/// should show when the backend could not be asked or the download failed.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityReport {
    pub available: bool,
    pub error: Option<BackendError>,
}

impl AvailabilityReport {
    fn available() -> Self {
        Self {
            available: true,
            error: None,
        }
    }

    fn unavailable(error: Option<BackendError>) -> Self {
        Self {
            available: false,
            error,
        }
    }
}

/// Decides whether the configured model is installed and fetches it on
/// request. Never retries on its own.
#[derive(Clone)]
pub struct ModelAvailabilityChecker {
    backend: Arc<dyn ChatBackend>,
}

impl ModelAvailabilityChecker {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn check_availability(&self, config: &ModelConfig) -> AvailabilityReport {
        match self.backend.list_models().await {
            Ok(models) => {
                let available = models.contains(config.model_name());
                debug!(
                    model = %config.model_name(),
                    installed = models.len(),
                    available,
                    "Checked model availability"
                );
                if available {
                    AvailabilityReport::available()
                } else {
                    AvailabilityReport::unavailable(None)
                }
            }
            Err(e) => {
                warn!(host = %config.host(), error = ?e, "Could not connect to Ollama");
                AvailabilityReport::unavailable(Some(e))
            }
        }
    }

    /// Make sure the session's model is installed, downloading it if needed.
    ///
    /// Flips `model_available` on success; leaves it false on any failure.
    pub async fn ensure_available(&self, session: &mut SessionState) -> AvailabilityReport {
        if session.model_available() {
            return AvailabilityReport::available();
        }

        let report = self.check_availability(session.config()).await;
        if report.available {
            session.set_model_available(true);
            return report;
        }
        if report.error.is_some() {
            // Backend unreachable; a download would fail the same way
            return report;
        }

        let model = session.config().model_name().to_string();
        info!(model = %model, "Model not installed, requesting download");

        match self.backend.request_download(&model).await {
            Ok(()) => {
                info!(model = %model, "Model is now available");
                session.set_model_available(true);
                AvailabilityReport::available()
            }
            Err(e) => {
                warn!(model = %model, error = ?e, "Model download failed");
                AvailabilityReport::unavailable(Some(e))
            }
        }
    }

    pub async fn model_info(&self, config: &ModelConfig) -> BackendResult<ModelInfo> {
        self.backend
            .describe_model(config.model_name())
            .await
            .inspect_err(|e| warn!(model = %config.model_name(), error = ?e, "Failed to fetch model info"))
    }
}
