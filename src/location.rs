//! Byte positions and their line/column rendering for diagnostics.

use std::fmt;

/// Line/column pair, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Line/column of a byte position in the input.
pub fn line_col(input: &str, position: usize) -> LineCol {
    let position = position.min(input.len());
    let prefix = &input[..position];
    let line = prefix.matches('\n').count() + 1;
    let column = match prefix.rfind('\n') {
        Some(nl) => position - nl,
        None => position + 1,
    };
    LineCol { line, column }
}

/// Short preview of the input at the given position, used in error reports.
pub fn position_context(input: &str, position: usize) -> String {
    let rest = &input[position.min(input.len())..];
    let mut end = rest.len().min(16);
    while !rest.is_char_boundary(end) {
        end += 1;
    }
    if end < rest.len() {
        format!("{}...", &rest[..end])
    } else {
        rest[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_of_position() {
        let input = "one\ntwo\nthree";
        assert_eq!(line_col(input, 0), LineCol { line: 1, column: 1 });
        assert_eq!(line_col(input, 3), LineCol { line: 1, column: 4 });
        assert_eq!(line_col(input, 4), LineCol { line: 2, column: 1 });
        assert_eq!(line_col(input, 9), LineCol { line: 3, column: 2 });
    }

    #[test]
    fn context_is_clipped() {
        assert_eq!(position_context("short", 0), "short");
        assert_eq!(
            position_context("a very long remainder of input", 2),
            "very long remain..."
        );
    }
}
