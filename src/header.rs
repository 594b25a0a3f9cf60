//! PNM header grammar: magic byte, variant digit, comment lines and the
//! width/height/maxValue token stream.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::cursor::{Cursor, TokenError};
use crate::error::PnmError;

/// One of the six concrete PNM variants: {PBM, PGM, PPM} x {ASCII, RAW}.
///
/// Everything the variant implies — band count, wire digit, family and
/// encoding names — is a pure function of this enum; nothing is stored
/// twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// P1 — bitmap, ASCII `0`/`1` tokens.
    PbmAscii,
    /// P2 — graymap, ASCII decimal tokens.
    PgmAscii,
    /// P3 — pixmap, ASCII decimal tokens, RGB interleaved.
    PpmAscii,
    /// P4 — bitmap, packed bits, MSB first, row-padded.
    PbmRaw,
    /// P5 — graymap, one byte per sample.
    PgmRaw,
    /// P6 — pixmap, one byte per sample, RGB interleaved.
    PpmRaw,
}

impl Variant {
    pub(crate) fn from_digit(d: u8) -> Option<Variant> {
        match d {
            b'1' => Some(Variant::PbmAscii),
            b'2' => Some(Variant::PgmAscii),
            b'3' => Some(Variant::PpmAscii),
            b'4' => Some(Variant::PbmRaw),
            b'5' => Some(Variant::PgmRaw),
            b'6' => Some(Variant::PpmRaw),
            _ => None,
        }
    }

    /// The wire digit, `b'1'..=b'6'`.
    pub const fn digit(self) -> u8 {
        match self {
            Variant::PbmAscii => b'1',
            Variant::PgmAscii => b'2',
            Variant::PpmAscii => b'3',
            Variant::PbmRaw => b'4',
            Variant::PgmRaw => b'5',
            Variant::PpmRaw => b'6',
        }
    }

    /// Number of bands: 1 for PBM/PGM, 3 for PPM.
    pub const fn channels(self) -> usize {
        match self {
            Variant::PpmAscii | Variant::PpmRaw => 3,
            _ => 1,
        }
    }

    pub const fn is_raw(self) -> bool {
        matches!(self, Variant::PbmRaw | Variant::PgmRaw | Variant::PpmRaw)
    }

    /// True for the 1-bit bitmap family (PBM).
    pub const fn is_bitmap(self) -> bool {
        matches!(self, Variant::PbmAscii | Variant::PbmRaw)
    }

    /// Family name: `"PBM"`, `"PGM"` or `"PPM"`.
    pub const fn family_name(self) -> &'static str {
        match self {
            Variant::PbmAscii | Variant::PbmRaw => "PBM",
            Variant::PgmAscii | Variant::PgmRaw => "PGM",
            Variant::PpmAscii | Variant::PpmRaw => "PPM",
        }
    }

    /// Encoding name: `"ASCII"` or `"RAWBITS"`.
    pub const fn encoding_name(self) -> &'static str {
        if self.is_raw() { "RAWBITS" } else { "ASCII" }
    }

    /// The raw sibling of this variant (digit + 3).
    pub const fn to_raw(self) -> Variant {
        match self {
            Variant::PbmAscii => Variant::PbmRaw,
            Variant::PgmAscii => Variant::PgmRaw,
            Variant::PpmAscii => Variant::PpmRaw,
            raw => raw,
        }
    }

    /// The ASCII sibling of this variant (digit - 3).
    pub const fn to_ascii(self) -> Variant {
        match self {
            Variant::PbmRaw => Variant::PbmAscii,
            Variant::PgmRaw => Variant::PgmAscii,
            Variant::PpmRaw => Variant::PpmAscii,
            ascii => ascii,
        }
    }
}

/// Sample container implied by a header's maximum sample value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    /// Packed 1-bit samples, 8 per byte (PBM only).
    Bit,
    U8,
    U16,
    U32,
}

/// Parsed PNM header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub variant: Variant,
    pub width: u32,
    pub height: u32,
    /// Declared maximum sample value. Always 1 for PBM.
    pub max_value: u32,
}

impl Header {
    /// Container for one sample: `Bit` for PBM, otherwise the smallest of
    /// u8/u16/u32 that holds `max_value`.
    pub fn sample_type(&self) -> SampleType {
        if self.variant.is_bitmap() {
            SampleType::Bit
        } else if self.max_value < 0x100 {
            SampleType::U8
        } else if self.max_value < 0x1_0000 {
            SampleType::U16
        } else {
            SampleType::U32
        }
    }

    /// Bytes per packed bitmap row: `ceil(width / 8)`.
    pub(crate) fn packed_row_bytes(width: u32) -> usize {
        (width as usize + 7) / 8
    }
}

fn header_token(result: Result<u32, TokenError>, what: &str) -> Result<u32, PnmError> {
    match result {
        Ok(v) => Ok(v),
        Err(TokenError::Eof) => Err(PnmError::MalformedHeader(format!(
            "input ended before {what}"
        ))),
        Err(TokenError::NonNumeric(b)) => Err(PnmError::MalformedHeader(format!(
            "expected {what} but found byte 0x{b:02x}"
        ))),
    }
}

/// Parse the header grammar, collecting leading `#` comment lines into
/// `comments`. On success the cursor rests on the first pixel-data byte.
pub(crate) fn parse_header(
    cursor: &mut Cursor<'_>,
    comments: &mut Vec<String>,
) -> Result<Header, PnmError> {
    let magic = cursor
        .read_u8()
        .map_err(|_| PnmError::MalformedHeader("empty input".into()))?;
    if magic != b'P' {
        return Err(PnmError::MalformedHeader(format!(
            "expected magic byte 'P' but found 0x{magic:02x}"
        )));
    }

    let digit = cursor
        .read_u8()
        .map_err(|_| PnmError::MalformedHeader("input ended before variant digit".into()))?;
    let variant = Variant::from_digit(digit).ok_or_else(|| {
        PnmError::MalformedHeader(format!(
            "variant digit must be '1'..='6', found 0x{digit:02x}"
        ))
    })?;

    consume_magic_line(cursor)?;

    // Leading comment block. Comments appearing later, between numeric
    // tokens, are skipped by the token scanner and not collected.
    loop {
        match cursor.peek() {
            Some(b'#') => comments.push(cursor.read_comment_line()),
            Some(b) if b.is_ascii_whitespace() => {
                // Blank space before the dimension tokens.
                if peek_past_whitespace(cursor) == Some(b'#') {
                    skip_whitespace(cursor);
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    let width = header_token(cursor.next_int(), "width")?;
    let height = header_token(cursor.next_int(), "height")?;
    if width == 0 || height == 0 {
        return Err(PnmError::MalformedHeader(format!(
            "dimensions must be non-zero, found {width}x{height}"
        )));
    }

    // PBM has an implicit maxValue of 1 and no third token.
    let max_value = if variant.is_bitmap() {
        1
    } else {
        let v = header_token(cursor.next_int(), "maxValue")?;
        if v == 0 {
            return Err(PnmError::MalformedHeader("maxValue must be non-zero".into()));
        }
        v
    };

    // Exactly one separator byte between the last header token and pixel
    // data.
    match cursor.read_u8() {
        Ok(b) if b.is_ascii_whitespace() => {}
        Ok(b) => {
            return Err(PnmError::MalformedHeader(format!(
                "expected whitespace separator before pixel data, found 0x{b:02x}"
            )));
        }
        Err(_) => return Err(PnmError::UnexpectedEof),
    }

    Ok(Header {
        variant,
        width,
        height,
        max_value,
    })
}

/// Consume the remainder of the magic-number line: optional spaces, an
/// optional trailing comment, then one line terminator.
fn consume_magic_line(cursor: &mut Cursor<'_>) -> Result<(), PnmError> {
    loop {
        match cursor.read_u8() {
            Ok(b'\n') => return Ok(()),
            Ok(b'\r') => {
                if cursor.peek() == Some(b'\n') {
                    let _ = cursor.read_u8();
                }
                return Ok(());
            }
            Ok(b' ') | Ok(b'\t') => continue,
            Ok(b'#') => {
                cursor.skip_line();
                return Ok(());
            }
            Ok(b) => {
                return Err(PnmError::MalformedHeader(format!(
                    "expected line terminator after variant digit, found 0x{b:02x}"
                )));
            }
            Err(_) => return Err(PnmError::UnexpectedEof),
        }
    }
}

fn skip_whitespace(cursor: &mut Cursor<'_>) {
    while let Some(b) = cursor.peek() {
        if !b.is_ascii_whitespace() {
            break;
        }
        let _ = cursor.read_u8();
    }
}

fn peek_past_whitespace(cursor: &Cursor<'_>) -> Option<u8> {
    let mut probe = cursor.clone();
    skip_whitespace(&mut probe);
    probe.peek()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn parse(data: &[u8]) -> Result<(Header, Vec<String>), PnmError> {
        let mut cursor = Cursor::new(data);
        let mut comments = Vec::new();
        parse_header(&mut cursor, &mut comments).map(|h| (h, comments))
    }

    #[test]
    fn minimal_ppm_header() {
        let (h, comments) = parse(b"P6\n2 3\n255\n\0\0\0\0\0\0").unwrap();
        assert_eq!(h.variant, Variant::PpmRaw);
        assert_eq!((h.width, h.height, h.max_value), (2, 3, 255));
        assert_eq!(h.sample_type(), SampleType::U8);
        assert!(comments.is_empty());
    }

    #[test]
    fn pbm_has_implicit_max_value() {
        let (h, _) = parse(b"P4\n16 2\n\0\0\0\0").unwrap();
        assert_eq!(h.max_value, 1);
        assert_eq!(h.sample_type(), SampleType::Bit);
    }

    #[test]
    fn leading_comments_are_collected() {
        let (h, comments) = parse(b"P5\n# one\n#  two \n4 4\n255\n").unwrap();
        assert_eq!(comments, ["one", "two"]);
        assert_eq!(h.variant, Variant::PgmRaw);
    }

    #[test]
    fn comment_between_tokens_is_skipped_not_collected() {
        let (h, comments) = parse(b"P5\n4 # mid\n4\n65535\n").unwrap();
        assert_eq!((h.width, h.height, h.max_value), (4, 4, 65535));
        assert_eq!(h.sample_type(), SampleType::U16);
        assert!(comments.is_empty());
    }

    #[test]
    fn bad_magic_is_fatal() {
        assert!(matches!(
            parse(b"Q6\n1 1\n255\n"),
            Err(PnmError::MalformedHeader(_))
        ));
    }

    #[test]
    fn variant_digit_out_of_range() {
        assert!(matches!(
            parse(b"P7\n1 1\n255\n"),
            Err(PnmError::MalformedHeader(_))
        ));
        assert!(matches!(
            parse(b"P0\n1 1\n255\n"),
            Err(PnmError::MalformedHeader(_))
        ));
    }

    #[test]
    fn non_numeric_width_is_malformed_not_zero() {
        assert!(matches!(
            parse(b"P6\nx 3\n255\n"),
            Err(PnmError::MalformedHeader(_))
        ));
    }

    #[test]
    fn truncated_header_is_malformed() {
        assert!(matches!(parse(b"P6\n4"), Err(PnmError::MalformedHeader(_))));
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(
            parse(b"P6\n0 3\n255\n"),
            Err(PnmError::MalformedHeader(_))
        ));
    }

    #[test]
    fn variant_digit_round_trip() {
        for d in b'1'..=b'6' {
            assert_eq!(Variant::from_digit(d).unwrap().digit(), d);
        }
        assert_eq!(Variant::PbmAscii.to_raw(), Variant::PbmRaw);
        assert_eq!(Variant::PpmRaw.to_ascii(), Variant::PpmAscii);
    }
}
