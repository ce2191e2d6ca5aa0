//! Preference formatting: RawExample → PreferenceRecord.
//!
//! The prompt becomes a single user message; the chosen and rejected responses
//! become singleton assistant messages under `preferred_output` and
//! `non_preferred_output`. No reordering, truncation, or content mutation.

use crate::models::{
    ChatMessage, FormatConfig, FormatError, PreferenceInput, PreferenceRecord, RawExample,
};

/// Stateless formatter carrying the validation policy.
#[derive(Debug, Clone, Default)]
pub struct PreferenceFormatter {
    policy: FormatConfig,
}

impl PreferenceFormatter {
    pub fn new(policy: FormatConfig) -> Self {
        Self { policy }
    }

    /// Format one raw example into a preference record.
    ///
    /// Empty strings pass through unless the strict policy is on, in which
    /// case an empty prompt is rejected.
    pub fn format(&self, example: &RawExample) -> Result<PreferenceRecord, FormatError> {
        if self.policy.strict && example.prompt.is_empty() {
            return Err(FormatError::EmptyPrompt);
        }

        Ok(PreferenceRecord {
            input: PreferenceInput {
                messages: vec![ChatMessage::user(&example.prompt)],
            },
            preferred_output: vec![ChatMessage::assistant(&example.chosen_response)],
            non_preferred_output: vec![ChatMessage::assistant(&example.rejected_response)],
        })
    }

    /// Format a whole split in source order.
    ///
    /// The first format failure aborts the split; only the supervised
    /// conversion step tolerates per-record failures.
    pub fn format_split(
        &self,
        examples: &[RawExample],
    ) -> Result<Vec<PreferenceRecord>, FormatError> {
        examples.iter().map(|e| self.format(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn example(prompt: &str, chosen: &str, rejected: &str) -> RawExample {
        RawExample {
            prompt: prompt.to_string(),
            chosen_response: chosen.to_string(),
            rejected_response: rejected.to_string(),
        }
    }

    #[test]
    fn test_format_shape() {
        let formatter = PreferenceFormatter::default();
        let record = formatter.format(&example("c#", "A", "B")).unwrap();

        assert_eq!(record.input.messages, vec![ChatMessage::user("c#")]);
        assert_eq!(record.preferred_output, vec![ChatMessage::assistant("A")]);
        assert_eq!(
            record.non_preferred_output,
            vec![ChatMessage::assistant("B")]
        );
    }

    #[test]
    fn test_format_fixed_roles() {
        let formatter = PreferenceFormatter::default();
        let record = formatter.format(&example("q", "good", "bad")).unwrap();

        assert_eq!(record.input.messages[0].role, Role::User);
        assert_eq!(record.preferred_output.len(), 1);
        assert_eq!(record.preferred_output[0].role, Role::Assistant);
        assert_eq!(record.non_preferred_output.len(), 1);
        assert_eq!(record.non_preferred_output[0].role, Role::Assistant);
    }

    #[test]
    fn test_empty_strings_pass_through() {
        let formatter = PreferenceFormatter::default();
        let record = formatter.format(&example("", "", "")).unwrap();

        assert_eq!(record.input.messages[0].content, "");
        assert_eq!(record.preferred_output[0].content, "");
        assert_eq!(record.non_preferred_output[0].content, "");
    }

    #[test]
    fn test_strict_rejects_empty_prompt() {
        let formatter = PreferenceFormatter::new(FormatConfig { strict: true });

        assert_eq!(
            formatter.format(&example("", "a", "b")),
            Err(FormatError::EmptyPrompt)
        );
        assert!(formatter.format(&example("p", "a", "b")).is_ok());
    }

    #[test]
    fn test_format_split_preserves_order() {
        let formatter = PreferenceFormatter::default();
        let examples: Vec<RawExample> = (0..5)
            .map(|i| example(&format!("p{i}"), &format!("a{i}"), &format!("b{i}")))
            .collect();

        let records = formatter.format_split(&examples).unwrap();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.input.messages[0].content, format!("p{i}"));
        }
    }

    #[test]
    fn test_format_split_aborts_on_error() {
        let formatter = PreferenceFormatter::new(FormatConfig { strict: true });
        let examples = vec![example("ok", "a", "b"), example("", "a", "b")];

        assert!(formatter.format_split(&examples).is_err());
    }
}
