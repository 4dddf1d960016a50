//! The intermediate representation shared by every conversion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unicode text of one document after extraction.
///
/// Paragraph and page boundaries are carried as `\n`. No formatting
/// metadata survives extraction. The value is immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextModel(String);

impl TextModel {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Join extracted units (pages, paragraphs) with a single newline.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = String::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(part.as_ref());
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of Unicode scalar values.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn lines(&self) -> std::str::Lines<'_> {
        self.0.lines()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for TextModel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TextModel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TextModel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_are_newline_joined() {
        let t = TextModel::from_parts(["page one", "page two", ""]);
        assert_eq!(t.as_str(), "page one\npage two\n");
    }

    #[test]
    fn no_parts_is_empty() {
        let t = TextModel::from_parts(Vec::<String>::new());
        assert!(t.is_empty());
    }

    #[test]
    fn char_count_is_unicode_aware() {
        assert_eq!(TextModel::new("héllo").char_count(), 5);
    }
}
