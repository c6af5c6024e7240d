//! Summary formatting for different output formats

use super::StreamSummary;
use crate::config::StatsFormat;

/// Format a summary according to the configured format
pub fn format_summary(summary: &StreamSummary, format: StatsFormat) -> String {
    match format {
        StatsFormat::Pretty => format_pretty(summary),
        StatsFormat::Json => format_json(summary),
        StatsFormat::Compact => format_compact(summary),
    }
}

/// Pretty box format for terminal output
fn format_pretty(s: &StreamSummary) -> String {
    let reason = s.fallback_reason.as_deref().unwrap_or("none");

    format!(
        r#"┌──────────────────────────────────────────────────────────────────┐
│ Mediated Stream                                                  │
├──────────────────────────────────────────────────────────────────┤
│ Request: {:56}│
│ Time:    {:56}│
├──────────────────────────────────────────────────────────────────┤
│ Source:   {:55}│
│ Fallback: {:55}│
│ Events:   primary {:6} │ secondary {:6} │ frames {:6}      │
│ Answer:   {:49} chars│
├──────────────────────────────────────────────────────────────────┤
│ Outcome:  {:55}│
│ Duration: {:53.1}ms│
└──────────────────────────────────────────────────────────────────┘
"#,
        truncate(&s.request_id, 56),
        s.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        s.source.to_string(),
        truncate(reason, 55),
        s.primary_events,
        s.secondary_events,
        s.frames_emitted,
        s.answer_chars,
        format!("{:?}", s.outcome).to_lowercase(),
        s.duration_ms,
    )
}

/// JSON format for structured logging
fn format_json(s: &StreamSummary) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "{}".to_string())
}

/// Compact single-line format
fn format_compact(s: &StreamSummary) -> String {
    let fallback = match &s.fallback_reason {
        Some(reason) => format!(" fallback=({})", reason),
        None => String::new(),
    };

    format!(
        "[{}] id={} source={}{} events={}/{} frames={} answer={}c {:?} dur={:.1}ms",
        s.timestamp.format("%H:%M:%S"),
        s.request_id,
        s.source,
        fallback,
        s.primary_events,
        s.secondary_events,
        s.frames_emitted,
        s.answer_chars,
        s.outcome,
        s.duration_ms
    )
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
