//! Passages, page provenance and ranking candidates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page a passage was extracted from.
///
/// Stores hand back integers, strings or nothing at all; a missing
/// annotation becomes `Unknown`, which renders as `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawPageNumber", into = "RawPageNumber")]
pub enum PageNumber {
    Number(i64),
    Label(String),
    Unknown,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPageNumber {
    Int(i64),
    Text(String),
}

impl PageNumber {
    pub const UNKNOWN: &'static str = "unknown";

    /// Interpret a textual page annotation
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == Self::UNKNOWN {
            Self::Unknown
        } else if let Ok(n) = trimmed.parse::<i64>() {
            Self::Number(n)
        } else {
            Self::Label(trimmed.to_string())
        }
    }

    /// Interpret an optional JSON metadata value (`page_number` key)
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Number(n)) => match n.as_i64() {
                Some(n) => Self::Number(n),
                // Floats like 3.0 show up from loosely typed writers
                None => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| Self::Number(f as i64))
                    .unwrap_or_else(|| Self::Label(n.to_string())),
            },
            Some(serde_json::Value::String(s)) => Self::parse(s),
            _ => Self::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<RawPageNumber> for PageNumber {
    fn from(raw: RawPageNumber) -> Self {
        match raw {
            RawPageNumber::Int(n) => Self::Number(n),
            RawPageNumber::Text(s) => Self::parse(&s),
        }
    }
}

impl From<PageNumber> for RawPageNumber {
    fn from(page: PageNumber) -> Self {
        match page {
            PageNumber::Number(n) => Self::Int(n),
            PageNumber::Label(s) => Self::Text(s),
            PageNumber::Unknown => Self::Text(PageNumber::UNKNOWN.to_string()),
        }
    }
}

impl From<i64> for PageNumber {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for PageNumber {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<usize> for PageNumber {
    fn from(n: usize) -> Self {
        Self::Number(n as i64)
    }
}

impl From<&str> for PageNumber {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Label(s) => f.write_str(s),
            Self::Unknown => f.write_str(Self::UNKNOWN),
        }
    }
}

/// An immutable unit of retrieved text with its page provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub page_number: PageNumber,
}

impl Passage {
    pub fn new(text: impl Into<String>, page_number: impl Into<PageNumber>) -> Self {
        Self {
            text: text.into(),
            page_number: page_number.into(),
        }
    }

    /// Split into the `(text, page)` pair handed to callers
    pub fn into_pair(self) -> (String, PageNumber) {
        (self.text, self.page_number)
    }
}

/// Which ranking signal produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// The store's own top-k search
    Lexical,
    /// Dense re-embedding of the whole collection
    Semantic,
}

/// A passage tagged with the path that found it
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub passage: Passage,
    pub source: Source,
}

impl Candidate {
    pub fn new(passage: Passage, source: Source) -> Self {
        Self { passage, source }
    }
}

/// Candidate paired with its similarity during one rescoring pass
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    /// Raw cosine similarity against the query, `None` if it could not be embedded
    pub similarity: Option<f32>,
    /// Similarity plus any source bias; the sort key
    pub score: f32,
}

impl ScoredCandidate {
    pub fn text(&self) -> &str {
        &self.candidate.passage.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page_numbers() {
        assert_eq!(PageNumber::parse("3"), PageNumber::Number(3));
        assert_eq!(PageNumber::parse("unknown"), PageNumber::Unknown);
        assert_eq!(PageNumber::parse(""), PageNumber::Unknown);
        assert_eq!(PageNumber::parse("iv"), PageNumber::Label("iv".to_string()));
    }

    #[test]
    fn test_page_from_metadata() {
        assert_eq!(PageNumber::from_json(Some(&json!(7))), PageNumber::Number(7));
        assert_eq!(PageNumber::from_json(Some(&json!(7.0))), PageNumber::Number(7));
        assert_eq!(PageNumber::from_json(Some(&json!("12"))), PageNumber::Number(12));
        assert_eq!(PageNumber::from_json(Some(&json!(null))), PageNumber::Unknown);
        assert_eq!(PageNumber::from_json(None), PageNumber::Unknown);
    }

    #[test]
    fn test_page_serializes_like_metadata() {
        assert_eq!(serde_json::to_value(PageNumber::Number(3)).unwrap(), json!(3));
        assert_eq!(
            serde_json::to_value(PageNumber::Unknown).unwrap(),
            json!("unknown")
        );

        let parsed: PageNumber = serde_json::from_value(json!("A-1")).unwrap();
        assert_eq!(parsed, PageNumber::Label("A-1".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(PageNumber::Number(3).to_string(), "3");
        assert_eq!(PageNumber::Unknown.to_string(), "unknown");
    }
}
