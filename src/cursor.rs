//! Positioned reads and ASCII integer token scanning over an in-memory
//! byte stream.

use alloc::string::String;

use crate::error::PnmError;

/// Why an integer token could not be produced. The caller decides whether
/// this is a header or a pixel-data error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenError {
    /// Input ended where a token was expected.
    Eof,
    /// The next token starts with a non-digit byte, or overflows u32.
    NonNumeric(u8),
}

#[derive(Clone)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_position(&mut self, pos: usize) -> Result<(), PnmError> {
        if pos > self.data.len() {
            return Err(PnmError::UnexpectedEof);
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, PnmError> {
        let b = self.data.get(self.pos).copied().ok_or(PnmError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn read_slice(&mut self, n: usize) -> Result<&'a [u8], PnmError> {
        let end = self.pos.checked_add(n).ok_or(PnmError::UnexpectedEof)?;
        let slice = self.data.get(self.pos..end).ok_or(PnmError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    /// Consume bytes up to and including the next line terminator
    /// (`\n`, `\r` or `\r\n`). Stops at end of input.
    pub(crate) fn skip_line(&mut self) {
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'\n' {
                return;
            }
            if b == b'\r' {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
                return;
            }
        }
    }

    /// Read a `#` comment line: consumes the leading `#`, the text and the
    /// line terminator, returning the text trimmed of surrounding space.
    pub(crate) fn read_comment_line(&mut self) -> String {
        debug_assert_eq!(self.peek(), Some(b'#'));
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'\n' || b == b'\r' {
                break;
            }
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.data[start..self.pos])
            .trim()
            .into();
        self.skip_line();
        text
    }

    /// Scan the next whitespace-delimited decimal integer, skipping `#`
    /// comments (to end of line) between tokens.
    ///
    /// Unlike the classic netpbm readers this never substitutes 0 for a
    /// malformed token: a non-digit start or a value overflowing u32 is
    /// reported to the caller.
    pub(crate) fn next_int(&mut self) -> Result<u32, TokenError> {
        loop {
            match self.peek() {
                None => return Err(TokenError::Eof),
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'#') => self.skip_line(),
                Some(_) => break,
            }
        }

        let first = self.data[self.pos];
        if !first.is_ascii_digit() {
            return Err(TokenError::NonNumeric(first));
        }

        let mut value: u64 = 0;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            value = value * 10 + u64::from(b - b'0');
            if value > u64::from(u32::MAX) {
                return Err(TokenError::NonNumeric(first));
            }
            self.pos += 1;
        }
        Ok(value as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_skip_whitespace_and_comments() {
        let mut c = Cursor::new(b"  12 # skip me\n\t34\n56");
        assert_eq!(c.next_int(), Ok(12));
        assert_eq!(c.next_int(), Ok(34));
        assert_eq!(c.next_int(), Ok(56));
        assert_eq!(c.next_int(), Err(TokenError::Eof));
    }

    #[test]
    fn non_numeric_token_is_an_error_not_zero() {
        let mut c = Cursor::new(b" abc 12");
        assert_eq!(c.next_int(), Err(TokenError::NonNumeric(b'a')));
    }

    #[test]
    fn token_overflowing_u32_is_rejected() {
        let mut c = Cursor::new(b"99999999999");
        assert!(matches!(c.next_int(), Err(TokenError::NonNumeric(_))));
    }

    #[test]
    fn comment_line_is_trimmed() {
        let mut c = Cursor::new(b"#  made with gimp \nrest");
        assert_eq!(c.read_comment_line(), "made with gimp");
        assert_eq!(c.peek(), Some(b'r'));
    }
}
