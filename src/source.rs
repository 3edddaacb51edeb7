//! Source text handling: byte offsets, line tables and locations.
//!
//! All positional information in the crate is a byte offset into the original
//! source. The line table is built once at construction; translating an
//! offset into a `(line, column)` pair walks that table. Columns are counted
//! in UTF-16 code units to stay compatible with the conventional diagnostic
//! format.

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Source {
    description: String,
    content: String,
    /// Byte offsets of the first character of every line.
    line_offsets: Vec<usize>,
}

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Source {
    pub fn new(description: impl Into<String>, content: impl Into<String>) -> Source {
        let content = content.into();
        let mut line_offsets = vec![0];
        for (idx, b) in content.bytes().enumerate() {
            if b == b'\n' {
                line_offsets.push(idx + 1);
            }
        }

        Source {
            description: description.into(),
            content,
            line_offsets,
        }
    }

    /// Wrap expression text with the conventional `<input>` description.
    pub fn from_text(content: impl Into<String>) -> Source {
        Source::new("<input>", content)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Translate a byte offset into a 1-based line and UTF-16 column.
    pub fn location_of(&self, offset: usize) -> Location {
        let offset = offset.min(self.content.len());
        let line_idx = match self.line_offsets.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_offsets[line_idx];

        let column = self.content[line_start..offset]
            .chars()
            .map(char::len_utf16)
            .sum::<usize>();

        Location {
            line: line_idx + 1,
            column: column + 1,
        }
    }

    /// The text of the given 1-based line, without its terminator.
    pub fn snippet(&self, line: usize) -> Option<&str> {
        if line == 0 || line > self.line_offsets.len() {
            return None;
        }

        let start = self.line_offsets[line - 1];
        let end = self
            .line_offsets
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.content.len());

        Some(&self.content[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_of_first_line() {
        let source = Source::from_text("a && b");

        assert_eq!(source.location_of(0), Location { line: 1, column: 1 });
        assert_eq!(source.location_of(2), Location { line: 1, column: 3 });
    }

    #[test]
    fn test_location_of_second_line() {
        let source = Source::from_text("a &&\nb");

        assert_eq!(source.location_of(5), Location { line: 2, column: 1 });
    }

    #[test]
    fn test_location_counts_utf16_units() {
        // '𝕊' is two UTF-16 code units, four UTF-8 bytes.
        let source = Source::from_text("'𝕊' + x");

        assert_eq!(source.location_of(6), Location { line: 1, column: 5 });
    }

    #[test]
    fn test_snippet() {
        let source = Source::from_text("a &&\nb");

        assert_eq!(source.snippet(1), Some("a &&"));
        assert_eq!(source.snippet(2), Some("b"));
        assert_eq!(source.snippet(3), None);
    }
}
