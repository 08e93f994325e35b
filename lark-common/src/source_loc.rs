//! Source location tracking for error reporting
//!
//! Syntax tree nodes arrive from the upstream parser with a line and column;
//! those positions are carried through IR generation into diagnostics and
//! IR instructions so that every reported problem points back at the source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in a source file (line and column are 1-based, 0 means unknown)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Create a dummy location for synthesized code and tests
    pub fn dummy() -> Self {
        Self::new(0, 0)
    }

    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(SourceLocation::new(3, 14).to_string(), "3:14");
        assert_eq!(SourceLocation::dummy().to_string(), "<unknown>");
    }

    #[test]
    fn test_location_roundtrips_through_json() {
        let loc: SourceLocation = serde_json::from_str(r#"{"line": 7, "column": 2}"#).unwrap();
        assert_eq!(loc, SourceLocation::new(7, 2));
        assert!(loc.is_known());
    }
}
