//! Code-point indexed view of an input text with on-demand
//! line/column computation.
//!
//! The engine addresses text by code point, not by byte. `SourceText`
//! pre-decodes the input once and keeps the byte offset of every code
//! point so that regex-based operators can still run against the
//! original UTF-8 buffer.

/// An input text, decoded to code points, with position lookup helpers.
pub struct SourceText {
    raw: String,
    chars: Vec<char>,
    /// Byte offset of each code point in `raw`; one extra entry for the
    /// end of the buffer.
    byte_offsets: Vec<usize>,
    /// Code-point offsets of line starts, for binary-search lookup.
    line_starts: Vec<usize>,
}

impl SourceText {
    pub fn new(text: &str) -> Self {
        let mut chars = Vec::new();
        let mut byte_offsets = Vec::new();
        let mut line_starts = vec![0];
        for (byte_pos, c) in text.char_indices() {
            byte_offsets.push(byte_pos);
            chars.push(c);
            if c == '\n' {
                line_starts.push(chars.len());
            }
        }
        byte_offsets.push(text.len());
        SourceText {
            raw: text.to_string(),
            chars,
            byte_offsets,
            line_starts,
        }
    }

    /// Number of code points.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The code point at `pos`, if in bounds.
    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).copied()
    }

    /// The text between two code-point offsets.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        &self.raw[self.byte_offsets[start]..self.byte_offsets[end]]
    }

    /// The remainder of the text from a code-point offset, as UTF-8.
    /// Used to anchor regex matches at the current position.
    pub fn tail(&self, pos: usize) -> &str {
        &self.raw[self.byte_offsets[pos]..]
    }

    /// 1-based (line, column) for a code-point offset. An offset equal
    /// to `len()` reports the column one past the last character.
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let line_idx = self
            .line_starts
            .partition_point(|&start| start <= pos)
            .saturating_sub(1);
        (line_idx + 1, pos - self.line_starts[line_idx] + 1)
    }

    /// 1-based column only.
    pub fn colno(&self, pos: usize) -> usize {
        self.line_col(pos).1
    }
}

/// Format a parse failure the way every stage reports them:
/// `<path>:<line> Unexpected <thing> at column <col>`, or
/// `<path>:<line> <custom>` when the failure carries its own message.
pub(crate) fn format_unexpected(
    src: &SourceText,
    path: &str,
    errpos: usize,
    custom: Option<&str>,
) -> String {
    let (line, col) = src.line_col(errpos);
    let msg = match custom {
        Some(s) => s.to_string(),
        None => {
            let thing = match src.char_at(errpos) {
                None => "end of input".to_string(),
                Some(c) => format!("{c:?}").replace('\'', "\""),
            };
            format!("Unexpected {thing} at column {col}")
        }
    };
    format!("{path}:{line} {msg}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_unexpected() {
        let t = SourceText::new("ad");
        assert_eq!(
            format_unexpected(&t, "<string>", 1, None),
            "<string>:1 Unexpected \"d\" at column 2"
        );
        assert_eq!(
            format_unexpected(&t, "<string>", 2, None),
            "<string>:1 Unexpected end of input at column 3"
        );
        assert_eq!(
            format_unexpected(&t, "f.g", 0, Some("Bad predicate value")),
            "f.g:1 Bad predicate value"
        );
    }

    #[test]
    fn test_line_col_lookup() {
        let t = SourceText::new("ab\ncd\n");
        assert_eq!(t.line_col(0), (1, 1));
        assert_eq!(t.line_col(1), (1, 2));
        assert_eq!(t.line_col(2), (1, 3));
        assert_eq!(t.line_col(3), (2, 1));
        assert_eq!(t.line_col(5), (2, 3));
    }

    #[test]
    fn test_end_of_input_column() {
        let t = SourceText::new("ab");
        assert_eq!(t.line_col(2), (1, 3));
    }

    #[test]
    fn test_code_point_indexing() {
        let t = SourceText::new("aéz");
        assert_eq!(t.len(), 3);
        assert_eq!(t.char_at(1), Some('é'));
        assert_eq!(t.slice(1, 3), "éz");
        assert_eq!(t.tail(2), "z");
    }
}
