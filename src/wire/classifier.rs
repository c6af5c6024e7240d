//! Decodes frame payloads into typed events

use serde_json::Value;

use super::event::{ContentEvent, Event};

/// Prefix of every payload line
pub const DATA_PREFIX: &str = "data:";

/// Classify every `data:` sub-payload of a frame, in order.
///
/// Malformed payloads become [`Event::Raw`]; classification never fails.
pub fn classify(frame: &str) -> Vec<Event> {
    split_payloads(frame)
        .iter()
        .flat_map(|payload| classify_payload(payload))
        .collect()
}

/// Split a frame into sub-payloads. A line starting with `data:` opens a new
/// payload; other lines continue the current one.
fn split_payloads(frame: &str) -> Vec<String> {
    let mut payloads = Vec::new();
    let mut current: Option<String> = None;

    for line in frame.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            payloads.extend(current.take());
            current = Some(rest.to_string());
        } else if line.trim().is_empty() {
            continue;
        } else if let Some(open) = current.as_mut() {
            open.push('\n');
            open.push_str(line);
        } else {
            current = Some(line.to_string());
        }
    }
    payloads.extend(current);

    payloads
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn classify_payload(payload: &str) -> Vec<Event> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => vec![event_from_value(payload, value)],
        Err(_) => split_inline(payload).unwrap_or_else(|| {
            tracing::warn!(payload = %payload, "Failed to parse JSON payload, passing through");
            vec![Event::Raw(payload.to_string())]
        }),
    }
}

/// Handle several JSON values glued together on one line
/// (`{..}data:{..}`). Only applies when every piece parses.
fn split_inline(payload: &str) -> Option<Vec<Event>> {
    if !payload.contains(DATA_PREFIX) {
        return None;
    }

    let pieces: Vec<&str> = payload
        .split(DATA_PREFIX)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if pieces.len() < 2 {
        return None;
    }

    pieces
        .into_iter()
        .map(|piece| {
            serde_json::from_str::<Value>(piece)
                .ok()
                .map(|value| event_from_value(piece, value))
        })
        .collect()
}

/// Any boolean ends the stream; the emitter always writes the terminal as `true`.
fn event_from_value(text: &str, value: Value) -> Event {
    match value {
        Value::Bool(_) => Event::Terminal,
        Value::Object(map) => Event::Content(ContentEvent::from_upstream(text, &map)),
        _ => Event::Raw(text.to_string()),
    }
}
