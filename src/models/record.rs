//! Record types for the formatting pipeline.
//!
//! These types fix the data flow: RawExample → PreferenceRecord →
//! SupervisedRecord. Every transformation produces a new value; nothing is
//! mutated after construction.

use serde::{Deserialize, Serialize};

/// One row of the source preference dataset.
///
/// All three fields are required; a dataset line missing any of them fails at
/// parse time with the offending line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExample {
    /// The user prompt
    pub prompt: String,

    /// The response preferred by the annotator
    pub chosen_response: String,

    /// The response ranked below the chosen one
    pub rejected_response: String,
}

/// Message role in a chat transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The conversation prefix shared by both sides of a preference pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceInput {
    pub messages: Vec<ChatMessage>,
}

/// A preference pair in the wire shape the fine-tuning service consumes.
///
/// Invariants: `input.messages` holds the user turn(s) from the source row in
/// original order; `preferred_output` and `non_preferred_output` each hold
/// exactly one assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub input: PreferenceInput,
    pub preferred_output: Vec<ChatMessage>,
    pub non_preferred_output: Vec<ChatMessage>,
}

/// A supervised training example derived from the preferred side of a pair.
///
/// `messages` is `input.messages` followed by `preferred_output`. The rejected
/// side never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisedRecord {
    pub messages: Vec<ChatMessage>,
}

/// Per-split counters reported after formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitReport {
    /// Rows read from the source file
    pub raw_examples: usize,

    /// Preference records written
    pub preference_written: usize,

    /// Supervised records written
    pub supervised_written: usize,

    /// Records skipped during the supervised conversion
    pub supervised_failed: usize,
}

/// Counters for a full formatting run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatStats {
    pub train: SplitReport,
    pub validation: SplitReport,

    /// Total runtime in seconds
    pub runtime_secs: f64,
}

impl FormatStats {
    /// Total records written across both splits and both formats.
    pub fn total_written(&self) -> usize {
        self.train.preference_written
            + self.train.supervised_written
            + self.validation.preference_written
            + self.validation.supervised_written
    }

    /// Total records skipped during supervised conversion.
    pub fn total_failed(&self) -> usize {
        self.train.supervised_failed + self.validation.supervised_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let user = ChatMessage::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "hello");

        let assistant = ChatMessage::assistant("hi");
        assert_eq!(assistant.role, Role::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("x")).unwrap();
        assert!(json.contains(r#""role":"user""#));

        let json = serde_json::to_string(&ChatMessage::assistant("y")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }

    #[test]
    fn test_preference_record_round_trip() {
        let record = PreferenceRecord {
            input: PreferenceInput {
                messages: vec![ChatMessage::user("c#")],
            },
            preferred_output: vec![ChatMessage::assistant("A")],
            non_preferred_output: vec![ChatMessage::assistant("B")],
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: PreferenceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_preference_record_wire_keys() {
        let record = PreferenceRecord {
            input: PreferenceInput {
                messages: vec![ChatMessage::user("q")],
            },
            preferred_output: vec![ChatMessage::assistant("a")],
            non_preferred_output: vec![ChatMessage::assistant("b")],
        };

        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert!(value.get("input").is_some());
        assert!(value.get("preferred_output").is_some());
        assert!(value.get("non_preferred_output").is_some());
        assert!(value["input"].get("messages").is_some());
    }

    #[test]
    fn test_raw_example_missing_field_fails() {
        let result: Result<RawExample, _> =
            serde_json::from_str(r#"{"prompt": "p", "chosen_response": "a"}"#);
        assert!(result.is_err());
    }
}
