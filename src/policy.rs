//! Decides when a primary response is abandoned for the secondary backend

use std::fmt;

use crate::config::FallbackConfig;
use crate::wire::ContentEvent;

/// Why a content event triggered the switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The primary reported the "no answer available" status
    SentinelRetcode(i64),
    /// The cumulative answer contains a configured phrase
    Phrase(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::SentinelRetcode(code) => write!(f, "retcode {}", code),
            FallbackReason::Phrase(phrase) => write!(f, "phrase \"{}\"", phrase),
        }
    }
}

/// Fallback trigger policy. Pure: the decision depends only on the event.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    sentinel_retcode: i64,
    phrases: Vec<String>,
}

impl FallbackPolicy {
    /// Empty phrases are dropped; they would match every answer.
    pub fn new<I, S>(sentinel_retcode: i64, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sentinel_retcode,
            phrases: phrases
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(config.sentinel_retcode, config.phrases.iter().cloned())
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Check the sentinel first, then phrases in configured order
    pub fn evaluate(&self, event: &ContentEvent) -> Option<FallbackReason> {
        if event.retcode() == self.sentinel_retcode {
            return Some(FallbackReason::SentinelRetcode(event.retcode()));
        }

        let answer = event.answer_text();
        self.phrases
            .iter()
            .find(|phrase| answer.contains(phrase.as_str()))
            .map(|phrase| FallbackReason::Phrase(phrase.clone()))
    }

    pub fn should_fallback(&self, event: &ContentEvent) -> bool {
        self.evaluate(event).is_some()
    }
}
