//! Reply shapes produced by the workflow.

use serde::{Deserialize, Serialize};

use super::workflow::WorkflowStep;

/// A document the answer was grounded on, in the wire shape the chat UI reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub page_content: String,
    /// Source URL.
    pub metadata: String,
}

/// Terminal output of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub answer_text: String,
    pub source_documents: Vec<SourceDocument>,
    pub workflow_steps: Vec<WorkflowStep>,
}

impl ChatReply {
    pub fn source_urls(&self) -> Vec<&str> {
        self.source_documents
            .iter()
            .map(|d| d.metadata.as_str())
            .collect()
    }
}
