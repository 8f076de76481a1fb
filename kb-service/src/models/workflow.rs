//! Audit trail of which component handled a message.

use serde::{Deserialize, Serialize};

/// Logical component that took part in answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Agent {
    RouterAgent,
    KnowledgeAgent,
    InternalProcessingAgent,
    System,
}

/// Outcome recorded against a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepDecision {
    WebSearch,
    AnswerDirectly,
    Fallback,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub agent: Agent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<StepDecision>,
}

impl WorkflowStep {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            decision: None,
        }
    }

    pub fn decided(agent: Agent, decision: StepDecision) -> Self {
        Self {
            agent,
            decision: Some(decision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_without_decision_omits_field() {
        let json = serde_json::to_value(WorkflowStep::new(Agent::KnowledgeAgent)).unwrap();
        assert_eq!(json, serde_json::json!({ "agent": "KnowledgeAgent" }));
    }

    #[test]
    fn step_with_decision() {
        let json = serde_json::to_value(WorkflowStep::decided(
            Agent::RouterAgent,
            StepDecision::WebSearch,
        ))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "agent": "RouterAgent", "decision": "WebSearch" })
        );
    }
}
