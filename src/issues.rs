//! Compile-time issue collection and rendering.
//!
//! Parser, checker and validators all report through [`Issues`]. A producer
//! succeeds only when its issue list stayed empty; rendering follows the
//! conventional one-line `ERROR:` format with a caret snippet.

use std::{error::Error, fmt::Display};

use crate::source::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    /// Byte offset into the source the issue is anchored at.
    pub offset: usize,
}

impl Issue {
    pub fn error(message: impl Into<String>, offset: usize) -> Issue {
        Issue {
            severity: Severity::Error,
            message: message.into(),
            offset,
        }
    }

    pub fn warning(message: impl Into<String>, offset: usize) -> Issue {
        Issue {
            severity: Severity::Warning,
            message: message.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Issues {
    source: Source,
    items: Vec<Issue>,
}

impl Issues {
    pub fn new(source: Source) -> Issues {
        Issues {
            source,
            items: vec![],
        }
    }

    pub fn push(&mut self, issue: Issue) {
        self.items.push(issue);
    }

    pub fn report(&mut self, message: impl Into<String>, offset: usize) {
        self.items.push(Issue::error(message, offset));
    }

    /// `true` when no error-severity issue has been reported.
    pub fn is_empty(&self) -> bool {
        self.items
            .iter()
            .all(|issue| issue.severity != Severity::Error)
    }

    pub fn items(&self) -> &[Issue] {
        &self.items
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn extend(&mut self, other: Issues) {
        self.items.extend(other.items);
    }

    fn format_issue(&self, issue: &Issue) -> String {
        let location = self.source.location_of(issue.offset);
        let severity = match issue.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };

        let mut out = format!(
            "{}: {}:{}:{}: {}",
            severity,
            self.source.description(),
            location.line,
            location.column,
            issue.message
        );

        if let Some(snippet) = self.source.snippet(location.line) {
            let caret_pad = ".".repeat(location.column.saturating_sub(1));
            out.push_str(&format!("\n | {snippet}\n | {caret_pad}^"));
        }

        out
    }
}

impl Display for Issues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .items
            .iter()
            .map(|issue| self.format_issue(issue))
            .collect::<Vec<_>>()
            .join("\n");
        f.write_str(&rendered)
    }
}

impl Error for Issues {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_single_issue() {
        let mut issues = Issues::new(Source::from_text("timestamp('bad')"));
        issues.report("could not parse timestamp", 10);

        assert_eq!(
            issues.to_string(),
            "ERROR: <input>:1:11: could not parse timestamp\n \
             | timestamp('bad')\n \
             | ..........^"
        );
    }

    #[test]
    fn test_empty_means_success() {
        let mut issues = Issues::new(Source::from_text("1 + 2"));
        assert!(issues.is_empty());

        issues.push(Issue::warning("suspicious", 0));
        assert!(issues.is_empty());

        issues.report("broken", 0);
        assert!(!issues.is_empty());
    }
}
