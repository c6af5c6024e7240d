//! Typed events decoded from frame payloads

use serde_json::{Map, Value};

use crate::api::{AnswerData, ContentEnvelope, RETCODE_OK};

/// One logical event of the client-facing stream
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Status code, message and answer data
    Content(ContentEvent),
    /// The literal `true` payload; ends the stream
    Terminal,
    /// Payload that is not a JSON object or boolean, forwarded verbatim
    Raw(String),
}

impl Event {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    /// Text that follows `data:` on the wire
    pub fn to_payload(&self) -> String {
        match self {
            Self::Content(content) => content.to_payload(),
            Self::Terminal => "true".to_string(),
            Self::Raw(text) => text.clone(),
        }
    }
}

/// A content event. Events decoded from upstream keep their original text so
/// they are forwarded byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEvent {
    retcode: i64,
    retmsg: String,
    data: AnswerData,
    original: Option<String>,
}

impl ContentEvent {
    /// Successful event carrying a cumulative answer
    pub fn answer(answer: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            retcode: RETCODE_OK,
            retmsg: String::new(),
            data: AnswerData {
                answer: answer.into(),
                reference: Vec::new(),
                id: id.into(),
            },
            original: None,
        }
    }

    /// Failure event with a non-zero status code and a readable message
    pub fn error(
        retcode: i64,
        message: impl Into<String>,
        answer: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            retcode,
            retmsg: message.into(),
            ..Self::answer(answer, id)
        }
    }

    /// Decode an upstream object. Missing or mistyped fields read as defaults.
    pub fn from_upstream(original: &str, object: &Map<String, Value>) -> Self {
        let data = object.get("data").and_then(Value::as_object);
        let text = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            retcode: object
                .get("retcode")
                .and_then(Value::as_i64)
                .unwrap_or(RETCODE_OK),
            retmsg: object
                .get("retmsg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            data: AnswerData {
                answer: text("answer"),
                reference: data
                    .and_then(|d| d.get("reference"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                id: text("id"),
            },
            original: Some(original.to_string()),
        }
    }

    pub fn retcode(&self) -> i64 {
        self.retcode
    }

    pub fn retmsg(&self) -> &str {
        &self.retmsg
    }

    /// The cumulative answer so far
    pub fn answer_text(&self) -> &str {
        &self.data.answer
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn to_payload(&self) -> String {
        match &self.original {
            Some(text) => text.clone(),
            None => serde_json::to_string(&ContentEnvelope {
                retcode: self.retcode,
                retmsg: &self.retmsg,
                data: &self.data,
            })
            .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answer_payload_shape() {
        let event = ContentEvent::answer("BC", "req-1");
        let payload: Value = serde_json::from_str(&event.to_payload()).unwrap();
        assert_eq!(
            payload,
            json!({"retcode": 0, "retmsg": "", "data": {"answer": "BC", "reference": [], "id": "req-1"}})
        );
    }

    #[test]
    fn test_error_payload_shape() {
        let event = ContentEvent::error(1, "An error occurred: boom", "", "req-1");
        let payload: Value = serde_json::from_str(&event.to_payload()).unwrap();
        assert_eq!(payload["retcode"], 1);
        assert_eq!(payload["retmsg"], "An error occurred: boom");
        assert_eq!(payload["data"]["answer"], "");
        assert_eq!(payload["data"]["id"], "req-1");
    }

    #[test]
    fn test_from_upstream_keeps_original_text() {
        let original = r#"{"retcode": 0, "retmsg": "", "data": {"answer": "A", "reference": [{"doc": 1}], "id": "x", "prompt": "p"}}"#;
        let Value::Object(map) = serde_json::from_str(original).unwrap() else {
            panic!("expected object");
        };
        let event = ContentEvent::from_upstream(original, &map);
        assert_eq!(event.retcode(), 0);
        assert_eq!(event.answer_text(), "A");
        assert_eq!(event.id(), "x");
        assert_eq!(event.to_payload(), original);
    }

    #[test]
    fn test_from_upstream_defaults() {
        let original = r#"{"retcode":"oops","data":true}"#;
        let Value::Object(map) = serde_json::from_str(original).unwrap() else {
            panic!("expected object");
        };
        let event = ContentEvent::from_upstream(original, &map);
        assert_eq!(event.retcode(), 0);
        assert_eq!(event.retmsg(), "");
        assert_eq!(event.answer_text(), "");
    }

    #[test]
    fn test_event_payloads() {
        assert_eq!(Event::Terminal.to_payload(), "true");
        assert_eq!(Event::Raw("not-json".to_string()).to_payload(), "not-json");
        assert!(Event::Terminal.is_terminal());
    }
}
