use anyhow::Context;
use clap::Parser;
use llamachat_core::{ChatBackend, ChatOrchestrator, ConfigError, ModelConfig, OllamaClient};
use llamachat_core::config::ModelConfigBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod app;
mod logging;
mod ui;

use app::App;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat with a local Ollama model in the terminal.
///
/// Unset options fall back to OLLAMA_HOST, OLLAMA_MODEL and
/// LLAMACHAT_SYSTEM_PROMPT.
#[derive(Parser, Debug)]
#[command(name = "llamachat", version)]
struct Cli {
    /// Ollama base URL
    #[arg(long)]
    host: Option<String>,

    /// Model to chat with
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature (0.0 to 2.0)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Replace the default system prompt
    #[arg(long)]
    system_prompt: Option<String>,

    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn model_config(&self) -> Result<ModelConfig, ConfigError> {
        self.apply(ModelConfigBuilder::from_env()).build()
    }

    fn apply(&self, mut builder: ModelConfigBuilder) -> ModelConfigBuilder {
        if let Some(host) = &self.host {
            builder = builder.host(host);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(prompt) = &self.system_prompt {
            builder = builder.system_prompt(prompt);
        }
        builder
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // A .env file in the working directory fills in OLLAMA_* settings
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.model_config().context("Invalid configuration")?;
    let error_rx = logging::init(cli.log_file.as_deref())?;

    tracing::info!(host = %config.host(), model = %config.model_name(), "Starting llamachat");

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let backend: Arc<dyn ChatBackend> = Arc::new(OllamaClient::with_client(client, config.host()));
    let (orchestrator, report) = ChatOrchestrator::start(config, backend).await;

    let mut app = App::new(orchestrator, error_rx);
    app.apply_report(report);

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal).await;
    ratatui::restore();

    tracing::info!("llamachat exited");
    result
}
