use serde::{Deserialize, Serialize};
use std::fmt;

/// Text used when the model returns nothing
pub const FALLBACK_SUMMARY: &str = "No summary available.";

/// Narrative multi-day forecast summary
///
/// Never blank: deserialized text goes through the same fallback as [`Summary::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Summary(String);

impl Summary {
    /// Wraps generated text, substituting the fallback for blank output
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            Self(FALLBACK_SUMMARY.to_string())
        } else {
            Self(text)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first `max_chars` characters, never splitting a character
    #[must_use]
    pub fn prefix(&self, max_chars: usize) -> &str {
        match self.0.char_indices().nth(max_chars) {
            Some((byte_index, _)) => &self.0[..byte_index],
            None => &self.0,
        }
    }
}

impl From<String> for Summary {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Summary> for String {
    fn from(summary: Summary) -> Self {
        summary.0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
