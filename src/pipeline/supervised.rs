//! Supervised conversion: PreferenceRecord → SupervisedRecord.
//!
//! Keeps the shared input and the preferred response, drops the rejected side
//! entirely. Applied exactly once per record; the output type does not feed
//! back into this step.

use crate::models::{FormatError, PreferenceRecord, SupervisedRecord};
use tracing::warn;

/// Derive a supervised record from the preferred branch of a preference pair.
///
/// `messages` is `input.messages` followed by the single preferred message.
pub fn derive(record: &PreferenceRecord) -> Result<SupervisedRecord, FormatError> {
    if record.input.messages.is_empty() {
        return Err(FormatError::EmptyInput);
    }
    if record.preferred_output.len() != 1 {
        return Err(FormatError::PreferredArity(record.preferred_output.len()));
    }

    let mut messages = record.input.messages.clone();
    messages.extend(record.preferred_output.iter().cloned());

    Ok(SupervisedRecord { messages })
}

/// Outcome of converting a sequence of preference records.
///
/// Successes keep source order; each failure keeps the index of the record
/// that produced it.
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub records: Vec<SupervisedRecord>,
    pub failures: Vec<(usize, FormatError)>,
}

impl ConversionReport {
    pub fn success_count(&self) -> usize {
        self.records.len()
    }
}

/// Convert a whole split, skipping malformed records.
///
/// Per-record failures are logged with their ordinal and collected; conversion
/// continues with the next record.
pub fn derive_all(records: &[PreferenceRecord]) -> ConversionReport {
    let mut report = ConversionReport::default();

    for (index, record) in records.iter().enumerate() {
        match derive(record) {
            Ok(supervised) => report.records.push(supervised),
            Err(e) => {
                warn!(index = index, error = %e, "Skipping record in supervised conversion");
                report.failures.push((index, e));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, PreferenceInput};

    fn pair(prompt: &str, chosen: &str, rejected: &str) -> PreferenceRecord {
        PreferenceRecord {
            input: PreferenceInput {
                messages: vec![ChatMessage::user(prompt)],
            },
            preferred_output: vec![ChatMessage::assistant(chosen)],
            non_preferred_output: vec![ChatMessage::assistant(rejected)],
        }
    }

    #[test]
    fn test_derive_concatenates() {
        let record = pair("c#", "A", "B");
        let supervised = derive(&record).unwrap();

        assert_eq!(
            supervised.messages,
            vec![ChatMessage::user("c#"), ChatMessage::assistant("A")]
        );
        assert_eq!(supervised.messages.len(), record.input.messages.len() + 1);
    }

    #[test]
    fn test_derive_drops_rejected() {
        let supervised = derive(&pair("q", "keep", "drop")).unwrap();

        assert!(supervised.messages.iter().all(|m| m.content != "drop"));
    }

    #[test]
    fn test_derive_rejects_empty_input() {
        let mut record = pair("p", "a", "b");
        record.input.messages.clear();

        assert_eq!(derive(&record), Err(FormatError::EmptyInput));
    }

    #[test]
    fn test_derive_rejects_wrong_preferred_arity() {
        let mut record = pair("p", "a", "b");
        record.preferred_output.push(ChatMessage::assistant("a2"));

        assert_eq!(derive(&record), Err(FormatError::PreferredArity(2)));
    }

    #[test]
    fn test_derive_all_skips_and_counts() {
        let good = pair("p0", "a0", "b0");
        let mut bad = pair("p1", "a1", "b1");
        bad.preferred_output.clear();
        let also_good = pair("p2", "a2", "b2");

        let report = derive_all(&[good, bad, also_good]);

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 1);
        assert_eq!(report.failures[0].1, FormatError::PreferredArity(0));
        // Neighbors are untouched
        assert_eq!(report.records[0].messages[0].content, "p0");
        assert_eq!(report.records[1].messages[0].content, "p2");
    }

    #[test]
    fn test_derive_all_clean_split() {
        let records: Vec<PreferenceRecord> = (0..4)
            .map(|i| pair(&format!("p{i}"), &format!("a{i}"), &format!("b{i}")))
            .collect();

        let report = derive_all(&records);
        assert_eq!(report.success_count(), 4);
        assert!(report.failures.is_empty());
    }
}
