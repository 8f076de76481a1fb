//! The answer graph: `Route -> {Retrieve, Direct} -> Done`.
//!
//! Each message runs the graph exactly once. Stage failures that have a
//! canned answer are recovered here; everything else propagates.

use super::direct::DirectAnswerer;
use super::prompts::{FETCH_FAILED_ANSWER, RETRIEVAL_UNREADABLE_ANSWER};
use super::retrieval::{RetrievalAnswerer, RetrievalOutcome};
use super::router::Router;
use crate::error::KbError;
use crate::models::{
    Agent, ChatReply, Route, RouterDecision, StepDecision, Transcript, WorkflowStep,
};
use crate::services::metrics;

/// Position in the answer graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphState {
    Route,
    Retrieve { url: String },
    /// `fallback` holds the router's canned text when its output was unparseable.
    Direct { fallback: Option<String> },
    Done(ChatReply),
}

/// Transition out of `Route`.
pub fn next(decision: &RouterDecision) -> GraphState {
    match decision.route {
        Route::WebSearch => GraphState::Retrieve {
            url: decision.payload.clone(),
        },
        Route::AnswerDirectly => GraphState::Direct {
            fallback: decision.fallback.then(|| decision.payload.clone()),
        },
    }
}

fn router_step(decision: &RouterDecision) -> WorkflowStep {
    let outcome = match (decision.fallback, decision.route) {
        (true, _) => StepDecision::Fallback,
        (false, Route::WebSearch) => StepDecision::WebSearch,
        (false, Route::AnswerDirectly) => StepDecision::AnswerDirectly,
    };
    WorkflowStep::decided(Agent::RouterAgent, outcome)
}

pub struct Workflow {
    router: Router,
    retrieval: RetrievalAnswerer,
    direct: DirectAnswerer,
}

impl Workflow {
    pub fn new(router: Router, retrieval: RetrievalAnswerer, direct: DirectAnswerer) -> Self {
        Self {
            router,
            retrieval,
            direct,
        }
    }

    /// Answer `question` against the session's `transcript`.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self, transcript: &Transcript, question: &str) -> Result<ChatReply, KbError> {
        let history = transcript.conversation();
        let mut steps = Vec::with_capacity(2);
        let mut state = GraphState::Route;

        loop {
            state = match state {
                GraphState::Route => {
                    let decision = self.router.decide(history, question).await?;
                    steps.push(router_step(&decision));
                    next(&decision)
                }
                GraphState::Retrieve { url } => {
                    let (answer_text, source_documents, step) =
                        match self.retrieval.answer(history, question, &url).await? {
                            RetrievalOutcome::Answered { answer, source } => {
                                (answer, vec![source], WorkflowStep::new(Agent::KnowledgeAgent))
                            }
                            RetrievalOutcome::FetchFailed(_) => {
                                metrics::record_fallback("fetch_failed");
                                (
                                    FETCH_FAILED_ANSWER.to_string(),
                                    Vec::new(),
                                    WorkflowStep::decided(
                                        Agent::InternalProcessingAgent,
                                        StepDecision::Fallback,
                                    ),
                                )
                            }
                            RetrievalOutcome::Unreadable => {
                                metrics::record_fallback("retrieval_unreadable");
                                (
                                    RETRIEVAL_UNREADABLE_ANSWER.to_string(),
                                    Vec::new(),
                                    WorkflowStep::decided(Agent::System, StepDecision::Error),
                                )
                            }
                        };
                    steps.push(step);
                    GraphState::Done(ChatReply {
                        answer_text,
                        source_documents,
                        workflow_steps: std::mem::take(&mut steps),
                    })
                }
                GraphState::Direct { fallback } => {
                    let (answer_text, step) = match self.direct.answer(history, question).await {
                        Ok(answer) => (answer, WorkflowStep::new(Agent::InternalProcessingAgent)),
                        Err(e) => match fallback {
                            // The router already failed; its apology is the only answer left.
                            Some(apology) => {
                                tracing::warn!(error = %e, "Direct answer failed after router fallback");
                                metrics::record_fallback("router_unparseable");
                                (apology, WorkflowStep::decided(Agent::System, StepDecision::Error))
                            }
                            None => return Err(e),
                        },
                    };
                    steps.push(step);
                    GraphState::Done(ChatReply {
                        answer_text,
                        source_documents: Vec::new(),
                        workflow_steps: std::mem::take(&mut steps),
                    })
                }
                GraphState::Done(reply) => return Ok(reply),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_search_transitions_to_retrieve() {
        assert_eq!(
            next(&RouterDecision::web_search("https://a.example/x")),
            GraphState::Retrieve {
                url: "https://a.example/x".to_string()
            }
        );
    }

    #[test]
    fn answer_directly_transitions_to_direct() {
        assert_eq!(
            next(&RouterDecision::answer_directly("hi")),
            GraphState::Direct { fallback: None }
        );
    }

    #[test]
    fn fallback_carries_apology_into_direct() {
        assert_eq!(
            next(&RouterDecision::fallback("sorry")),
            GraphState::Direct {
                fallback: Some("sorry".to_string())
            }
        );
    }

    #[test]
    fn router_step_reflects_decision() {
        assert_eq!(
            router_step(&RouterDecision::fallback("sorry")).decision,
            Some(StepDecision::Fallback)
        );
        assert_eq!(
            router_step(&RouterDecision::web_search("https://a.example")).decision,
            Some(StepDecision::WebSearch)
        );
        assert_eq!(
            router_step(&RouterDecision::answer_directly("x")).decision,
            Some(StepDecision::AnswerDirectly)
        );
    }
}
