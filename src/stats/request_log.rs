//! Request logging formatter

use crate::api::{ChatMessage, InboundRequest};

/// Format a request log message in compact format
pub fn format_request_log(request: &InboundRequest, request_id: &str) -> String {
    let mut parts = vec![
        format!("id={}", request_id),
        format!("msgs={}", request.messages.len()),
    ];

    if let Some(conversation) = request.body.get("conversation_id").and_then(|c| c.as_str()) {
        parts.push(format!("conv={}", conversation));
    }

    if let Some(msg) = last_user_message(&request.messages) {
        parts.push(format!("\"{}\"", msg));
    }

    format!("→ {}", parts.join(" "))
}

/// The question being asked: the most recent user message, normalized and truncated
fn last_user_message(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| truncate_message(&normalize_whitespace(&m.content)))
}

/// Convert newlines and tabs to single spaces, collapse multiple spaces
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate message according to rules:
/// - If <= 100 chars: show all
/// - If > 100 chars: first 25 + " ... " + last 75
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;
    const ELLIPSIS: &str = " ... ";

    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = chars[..PREFIX_LEN].iter().collect();
    let suffix: String = chars[chars.len() - SUFFIX_LEN..].iter().collect();

    format!("{}{}{}", prefix, ELLIPSIS, suffix)
}
