pub mod accumulator;
pub mod availability;
pub mod backend;
pub mod error_collector_layer;
pub mod ndjson;
pub mod ollama_client;

pub use accumulator::{
    GenerationEvent, GenerationOutcome, GenerationStream, IN_PROGRESS_MARKER, PartialResponse,
    ResponseAccumulator, build_outbound_messages,
};
pub use availability::{AvailabilityReport, ModelAvailabilityChecker};
pub use backend::{BoxFuture, ChatBackend, FragmentStream, ModelInfo};
pub use error_collector_layer::ErrorCollectorLayer;
pub use ollama_client::OllamaClient;
