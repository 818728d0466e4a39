use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

/// Answer payload for a single question.
///
/// Serialized untagged so the persisted JSON carries the plain value
/// (`true`, `"renewable"`, `["gri", "tcfd"]`, `null`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Flag(bool),
    Text(String),
    Choices(Vec<String>),
    Empty,
}

impl ResponseValue {
    /// `false` counts as an answer; blank text, an empty list and null do not.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Self::Flag(_) => true,
            Self::Text(text) => !text.is_empty(),
            Self::Choices(choices) => !choices.is_empty(),
            Self::Empty => false,
        }
    }
}

impl From<bool> for ResponseValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for ResponseValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ResponseValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for ResponseValue {
    fn from(value: Vec<String>) -> Self {
        Self::Choices(value)
    }
}

/// A user's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub question_id: QuestionId,
    pub value: ResponseValue,
    pub answered_at: DateTime<Utc>,
}

impl Response {
    #[must_use]
    pub fn new(
        question_id: QuestionId,
        value: impl Into<ResponseValue>,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id,
            value: value.into(),
            answered_at,
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.value.is_answered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn false_is_a_valid_answer() {
        assert!(ResponseValue::Flag(false).is_answered());
    }

    #[test]
    fn blank_values_are_unanswered() {
        assert!(!ResponseValue::Text(String::new()).is_answered());
        assert!(!ResponseValue::Choices(Vec::new()).is_answered());
        assert!(!ResponseValue::Empty.is_answered());
    }

    #[test]
    fn values_deserialize_from_plain_json() {
        let parse = |raw: &str| serde_json::from_str::<ResponseValue>(raw).unwrap();
        assert_eq!(parse("false"), ResponseValue::Flag(false));
        assert_eq!(parse("\"grid\""), ResponseValue::Text("grid".into()));
        assert_eq!(
            parse("[\"gri\",\"tcfd\"]"),
            ResponseValue::Choices(vec!["gri".into(), "tcfd".into()])
        );
        assert_eq!(parse("null"), ResponseValue::Empty);
    }

    #[test]
    fn response_serializes_in_camel_case() {
        let response = Response::new(QuestionId::new("q1"), true, fixed_now());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["questionId"], "q1");
        assert_eq!(json["value"], true);
        assert_eq!(json["answeredAt"], "2023-11-14T22:13:20Z");
    }
}
