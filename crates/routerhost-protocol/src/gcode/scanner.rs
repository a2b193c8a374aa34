//! Structured line scanner
//!
//! Scans one line of a G-code program into letter/value words with
//! explicit column tracking. A word is an ASCII letter immediately
//! followed by a numeric literal ("X10.5", "F4"). A semicolon starts a
//! comment that runs to the end of the line.

/// One letter/value word scanned from a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    /// The word letter, as written (e.g. 'X', 'F').
    pub letter: char,
    /// The numeric value following the letter.
    pub value: f32,
    /// 1-based column of the letter within the line.
    pub column: usize,
}

/// A malformed token, reported with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    /// 1-based column where the problem starts.
    pub column: usize,
    /// Human-readable description.
    pub message: String,
}

/// Scanner over a single line.
pub struct LineScanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LineScanner<'a> {
    /// Create a scanner over one line (no trailing newline).
    pub fn new(line: &'a str) -> Self {
        Self {
            bytes: line.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos] == b' ' || self.bytes[self.pos] == b'\t')
        {
            self.pos += 1;
        }
    }

    /// 1-based column of the next unread byte.
    pub fn column(&self) -> usize {
        self.pos + 1
    }

    /// Next significant byte without consuming it, or `None` at end of
    /// line or at the start of a comment.
    pub fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        match self.bytes.get(self.pos) {
            Some(b';') | None => None,
            Some(&b) => Some(b),
        }
    }

    /// True once everything before the comment marker is consumed.
    pub fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Everything from the current position to the end of the line,
    /// including any comment text. Used by the echo operation, which
    /// copies raw bytes.
    pub fn remainder(&self) -> &'a str {
        // The scanner is only ever constructed over valid UTF-8 and
        // advances on ASCII boundaries.
        std::str::from_utf8(&self.bytes[self.pos.min(self.bytes.len())..]).unwrap_or("")
    }

    /// Scan the next letter/value word. Returns `None` at end of line or
    /// comment start.
    pub fn next_word(&mut self) -> Option<Result<Word, ScanError>> {
        let b = self.peek()?;
        let column = self.column();

        if !b.is_ascii_alphabetic() {
            // Consume the offending byte so the caller can continue with
            // the rest of the line and report a single diagnostic.
            self.pos += 1;
            return Some(Err(ScanError {
                column,
                message: format!("expected a word letter, found '{}'", b as char),
            }));
        }
        self.pos += 1;

        match self.number(column) {
            Ok(value) => Some(Ok(Word {
                letter: b as char,
                value,
                column,
            })),
            Err(e) => Some(Err(e)),
        }
    }

    /// Scan the numeric literal that follows a word letter.
    fn number(&mut self, word_column: usize) -> Result<f32, ScanError> {
        let start = self.pos;
        if matches!(self.bytes.get(self.pos), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        while matches!(self.bytes.get(self.pos), Some(b'0'..=b'9') | Some(b'.')) {
            self.pos += 1;
        }

        let literal = &self.bytes[start..self.pos];
        if literal.is_empty() || literal == b"+" || literal == b"-" {
            return Err(ScanError {
                column: word_column,
                message: "word letter without a numeric value".to_string(),
            });
        }

        std::str::from_utf8(literal)
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .ok_or_else(|| ScanError {
                column: word_column,
                message: format!(
                    "malformed numeric literal '{}'",
                    String::from_utf8_lossy(literal)
                ),
            })
    }

    /// Consume bare axis letters (X, Y, Z) with no numeric values, as the
    /// home operation accepts, and return the axis bitmask. Stops at the
    /// first byte outside 'X'..='Z'.
    pub fn axis_letters(&mut self) -> u8 {
        let mut mask = 0u8;
        loop {
            self.skip_whitespace();
            match self.bytes.get(self.pos) {
                Some(&b) if (b'X'..=b'Z').contains(&b) => {
                    mask |= 1 << (b - b'X');
                    self.pos += 1;
                }
                _ => break,
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_with_columns() {
        let mut s = LineScanner::new("  X10.5 \t Y5 F4");
        let x = s.next_word().unwrap().unwrap();
        assert_eq!((x.letter, x.value, x.column), ('X', 10.5, 3));
        let y = s.next_word().unwrap().unwrap();
        assert_eq!((y.letter, y.value, y.column), ('Y', 5.0, 11));
        let f = s.next_word().unwrap().unwrap();
        assert_eq!((f.letter, f.value), ('F', 4.0));
        assert!(s.next_word().is_none());
    }

    #[test]
    fn test_negative_values_scan_cleanly() {
        // Rejecting negatives is the translator's policy, not the
        // scanner's.
        let mut s = LineScanner::new("X-3.5");
        let w = s.next_word().unwrap().unwrap();
        assert_eq!(w.value, -3.5);
    }

    #[test]
    fn test_comment_terminates_scan() {
        let mut s = LineScanner::new("X1 ; the rest is ignored Y2");
        assert!(s.next_word().unwrap().is_ok());
        assert!(s.next_word().is_none());
        assert!(s.at_end());
    }

    #[test]
    fn test_bare_letter_is_an_error() {
        let mut s = LineScanner::new("X Y2");
        let err = s.next_word().unwrap().unwrap_err();
        assert_eq!(err.column, 1);
        // Scanning continues after the error.
        let y = s.next_word().unwrap().unwrap();
        assert_eq!((y.letter, y.value), ('Y', 2.0));
    }

    #[test]
    fn test_non_letter_consumed_on_error() {
        let mut s = LineScanner::new("?X1");
        assert!(s.next_word().unwrap().is_err());
        let x = s.next_word().unwrap().unwrap();
        assert_eq!(x.letter, 'X');
    }

    #[test]
    fn test_axis_letters() {
        let mut s = LineScanner::new(" XZ");
        assert_eq!(s.axis_letters(), 0b101);

        let mut s = LineScanner::new("");
        assert_eq!(s.axis_letters(), 0);

        let mut s = LineScanner::new("ZYX");
        assert_eq!(s.axis_letters(), 0b111);

        let mut s = LineScanner::new("X Z");
        assert_eq!(s.axis_letters(), 0b101);
    }
}
