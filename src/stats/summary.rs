//! End-of-stream summary for one mediated request

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which backend produced the content the client saw last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Primary,
    Secondary,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Primary => write!(f, "primary"),
            Source::Secondary => write!(f, "secondary"),
        }
    }
}

/// How the response body ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Terminal frame sent
    Completed,
    /// Client went away before the terminal frame
    Aborted,
}

/// Collected facts about a request/response cycle
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    /// Correlation id shared by every content event of the response
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: Source,
    /// Set when the response switched to the secondary backend
    pub fallback_reason: Option<String>,
    pub primary_events: usize,
    pub secondary_events: usize,
    pub frames_emitted: usize,
    /// Length in characters of the last answer sent
    pub answer_chars: usize,
    pub outcome: Outcome,
    pub duration_ms: f64,
}
