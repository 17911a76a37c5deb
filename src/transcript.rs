use serde::{Deserialize, Serialize};

/// Opening line of every cycle unless configured otherwise.
pub const DEFAULT_GREETING: &str = "How have you been feeling lately?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

/// One chat turn. Serializes as `{ "text": ..., "type": "user" | "bot" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    #[serde(rename = "type")]
    pub speaker: Speaker,
}

impl TranscriptEntry {
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            speaker: Speaker::User,
        }
    }

    pub fn bot<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            speaker: Speaker::Bot,
        }
    }
}

/// Append-only list of turns that always starts with the greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    greeting: String,
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new<S: Into<String>>(greeting: S) -> Self {
        let greeting = greeting.into();
        Self {
            entries: vec![TranscriptEntry::bot(greeting.clone())],
            greeting,
        }
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    /// Drops every turn except a fresh greeting.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.push(TranscriptEntry::bot(self.greeting.clone()));
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_wire_format() {
        let json = serde_json::to_value(TranscriptEntry::user("A week")).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "A week", "type": "user" }));

        let entry: TranscriptEntry =
            serde_json::from_str(r#"{"text":"Hi","type":"bot"}"#).unwrap();
        assert_eq!(entry, TranscriptEntry::bot("Hi"));
    }

    #[test]
    fn test_reset_keeps_only_greeting() {
        let mut transcript = Transcript::new("Hello?");
        transcript.push(TranscriptEntry::user("hey"));
        transcript.push(TranscriptEntry::bot("why?"));
        assert_eq!(transcript.len(), 3);

        transcript.reset();
        assert_eq!(transcript.entries(), &[TranscriptEntry::bot("Hello?")]);
    }
}
