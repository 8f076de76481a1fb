//! Router decision record.

use serde::{Deserialize, Serialize};

/// Next action chosen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    AnswerDirectly,
    WebSearch,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::AnswerDirectly => "ANSWER_DIRECTLY",
            Route::WebSearch => "WEB_SEARCH",
        }
    }
}

/// Parsed router output. For `AnswerDirectly` the payload is answer text,
/// for `WebSearch` it is the URL to retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterDecision {
    pub route: Route,
    pub payload: String,
    /// Set when the raw model output could not be parsed and this decision
    /// is the canned fallback.
    pub fallback: bool,
}

impl RouterDecision {
    pub fn answer_directly(payload: impl Into<String>) -> Self {
        Self {
            route: Route::AnswerDirectly,
            payload: payload.into(),
            fallback: false,
        }
    }

    pub fn web_search(url: impl Into<String>) -> Self {
        Self {
            route: Route::WebSearch,
            payload: url.into(),
            fallback: false,
        }
    }

    pub fn fallback(payload: impl Into<String>) -> Self {
        Self {
            route: Route::AnswerDirectly,
            payload: payload.into(),
            fallback: true,
        }
    }
}
