//! Lenient extraction of the JSON object a model was asked to emit.
//!
//! Models wrap JSON in prose or markdown fences often enough that a strict
//! parse of the raw text is useless. The contract for every structured call
//! is `{"routerDecision": ..., "message": ..., "contextAnswer"?: ...}`.

use serde::Deserialize;
use thiserror::Error;

use crate::models::RouterDecision;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("output is empty")]
    Empty,

    #[error("output is not a valid decision object: {0}")]
    InvalidJson(String),

    #[error("unknown routerDecision {0:?}")]
    UnknownRoute(String),

    #[error("WEB_SEARCH target is not an absolute http(s) URL: {0:?}")]
    InvalidUrl(String),

    #[error("contextAnswer is missing or empty")]
    MissingAnswer,
}

/// The structured reply every routing or answering prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReply {
    pub router_decision: String,
    pub message: String,
    #[serde(default)]
    pub context_answer: Option<String>,
}

const FENCE: &str = "```";

/// Byte offsets of fences that open a line (after optional indentation).
/// Backticks inside a line, such as inline code in a JSON string, are not fences.
fn line_fences(s: &str) -> Vec<usize> {
    s.match_indices(FENCE)
        .map(|(i, _)| i)
        .filter(|&i| {
            let line_start = s[..i].rfind('\n').map_or(0, |n| n + 1);
            s[line_start..i].trim().is_empty()
        })
        .collect()
}

/// Contents of the innermost fenced code block, or `text` if there is none.
fn strip_fences(text: &str) -> &str {
    let mut s = text.trim();
    loop {
        let fences = line_fences(s);
        let (Some(&open), Some(&close)) = (fences.first(), fences.last()) else {
            return s;
        };
        if close < open + FENCE.len() {
            return s;
        }
        let mut inner = &s[open + FENCE.len()..close];

        // Drop an info string such as `json` on the opening fence line.
        if let Some(newline) = inner.find('\n') {
            let tag = inner[..newline].trim();
            if tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                inner = &inner[newline + 1..];
            }
        }
        s = inner.trim();
    }
}

/// Best-effort slice of `raw` holding a JSON object.
///
/// Trims, unwraps the innermost fenced block, then narrows to the span
/// between the first `{` and the last `}` when both are present in order.
pub fn extract_json_object(raw: &str) -> &str {
    let text = strip_fences(raw);
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Strict parse of the extracted object into the reply contract.
pub fn parse_model_reply(raw: &str) -> Result<ModelReply, ParseError> {
    // JSON-mode replies are usually already clean.
    if let Ok(reply) = serde_json::from_str(raw.trim()) {
        return Ok(reply);
    }
    let candidate = extract_json_object(raw);
    if candidate.is_empty() {
        return Err(ParseError::Empty);
    }
    serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// True for absolute `http`/`https` URLs that name a host.
pub fn is_web_url(candidate: &str) -> bool {
    match url::Url::parse(candidate) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Interpret router output. Callers substitute the canned fallback on error.
pub fn parse_router_decision(raw: &str) -> Result<RouterDecision, ParseError> {
    let reply = parse_model_reply(raw)?;
    match reply.router_decision.trim() {
        "ANSWER_DIRECTLY" => Ok(RouterDecision::answer_directly(reply.message)),
        "WEB_SEARCH" => {
            let target = reply.message.trim();
            if is_web_url(target) {
                Ok(RouterDecision::web_search(target))
            } else {
                Err(ParseError::InvalidUrl(reply.message))
            }
        }
        other => Err(ParseError::UnknownRoute(other.to_string())),
    }
}

/// Extract the grounded answer from a retrieval reply.
pub fn parse_context_answer(raw: &str) -> Result<String, ParseError> {
    let reply = parse_model_reply(raw)?;
    match reply.context_answer {
        Some(answer) if !answer.trim().is_empty() => Ok(answer),
        _ => Err(ParseError::MissingAnswer),
    }
}
