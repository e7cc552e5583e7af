pub mod chat_orchestrator;

pub use chat_orchestrator::{ChatOrchestrator, ChatTurn, TurnOutcome, TurnStart, TurnState};
