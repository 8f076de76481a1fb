//! Prompt text for each workflow stage.

/// Shown when the router's output cannot be interpreted.
pub const ROUTER_FALLBACK_ANSWER: &str =
    "Sorry, I couldn't process your question right now. Please try rephrasing it.";

/// Shown when the chosen page could not be fetched.
pub const FETCH_FAILED_ANSWER: &str = "I couldn't find relevant information in the provided \
sources for this question. I'll answer based on my general knowledge.";

/// Shown when a grounded answer was generated but could not be read.
pub const RETRIEVAL_UNREADABLE_ANSWER: &str =
    "I found a relevant source but couldn't read the answer generated from it. Please try again.";

const ROUTER_INSTRUCTIONS: &str = r#"You are a routing specialist for a knowledge-base assistant. Your only task is to read the user's latest question and the chat history and decide the best next action.

Options:
1. WEB_SEARCH: choose this only when the question needs specific information from a page that is certainly in the sitemap below. Pick the single most relevant URL from the list.
2. ANSWER_DIRECTLY: choose this when general knowledge is enough or when no URL in the sitemap clearly matches the question. Put a short answer in "message".

Respond with a single JSON object and nothing else:
{"routerDecision": "WEB_SEARCH" | "ANSWER_DIRECTLY", "message": "<URL for WEB_SEARCH, answer text for ANSWER_DIRECTLY>"}

Example:
{"routerDecision": "WEB_SEARCH", "message": "https://ajuda.infinitepay.io/pt-BR/articles/3359956-quais-sao-as-taxas-da-infinitepay"}

Sitemap URLs available:
"#;

/// System instruction for the router with the candidate URLs, one per line.
pub fn router_system_prompt(candidate_urls: &[String]) -> String {
    let mut prompt = String::from(ROUTER_INSTRUCTIONS);
    if candidate_urls.is_empty() {
        prompt.push_str("(none)");
    } else {
        prompt.push_str(&candidate_urls.join("\n"));
    }
    prompt
}

pub const RETRIEVAL_SYSTEM_PROMPT: &str = "You answer questions using only the page content \
you are given. If the answer is not in the content, say that you couldn't find relevant \
information in the provided source. Do not make up an answer. Always mention the URL you \
consulted.";

/// Grounded prompt carrying the fetched page verbatim.
pub fn retrieval_prompt(question: &str, source_url: &str, content: &str) -> String {
    format!(
        r#"Source URL: {source_url}

Page content:
"""
{content}
"""

Question: {question}

Respond with a single JSON object and nothing else:
{{"routerDecision": "WEB_SEARCH", "message": "{source_url}", "contextAnswer": "<your answer, based only on the page content>"}}"#
    )
}

pub const DIRECT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question \
using your general knowledge, without mentioning external sources or a knowledge base. If you \
don't know the answer, say that you don't have information on the subject.";
