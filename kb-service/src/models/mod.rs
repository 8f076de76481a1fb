//! Domain models for the knowledge-base service.

pub mod chat;
pub mod decision;
pub mod turn;
pub mod workflow;

pub use chat::{ChatReply, SourceDocument};
pub use decision::{Route, RouterDecision};
pub use turn::{Role, Transcript, Turn};
pub use workflow::{Agent, StepDecision, WorkflowStep};
