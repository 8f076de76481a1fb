//! Routing and answering workflow.

pub mod direct;
pub mod graph;
pub mod parse;
pub mod prompts;
pub mod retrieval;
pub mod router;

pub use direct::DirectAnswerer;
pub use graph::{GraphState, Workflow};
pub use retrieval::RetrievalAnswerer;
pub use router::Router;
