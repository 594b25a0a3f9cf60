//! PNM metadata value object and its attribute-tree interchange form.
//!
//! The model mirrors the header exactly — family and encoding names are
//! derived from the stored [`Variant`], never stored alongside it — plus the
//! ordered comment list that rides along a decode/encode cycle.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::PnmError;
use crate::header::{Header, Variant};

/// Image metadata synchronized with [`Header`] in both directions: decoding
/// populates it, encoding reads the max value, raw preference and comments
/// from it.
#[derive(Clone, Debug)]
pub struct PnmMetadata {
    variant: Variant,
    width: u32,
    height: u32,
    max_value: u32,
    max_sample_bits: u32,
    comments: Vec<String>,
}

impl Default for PnmMetadata {
    fn default() -> Self {
        PnmMetadata::new(Variant::PgmRaw)
    }
}

impl PnmMetadata {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            width: 0,
            height: 0,
            max_value: 0,
            max_sample_bits: 0,
            comments: Vec::new(),
        }
    }

    pub(crate) fn from_header(header: &Header) -> Self {
        let mut meta = PnmMetadata::new(header.variant);
        meta.width = header.width;
        meta.height = header.height;
        meta.set_max_value(header.max_value);
        meta
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    /// Bits needed for `max_value`: `ceil(log2(max_value + 1))`. Derived,
    /// never set independently.
    pub fn max_sample_bits(&self) -> u32 {
        self.max_sample_bits
    }

    /// `"PBM"`, `"PGM"` or `"PPM"` — a pure function of the variant.
    pub fn family_name(&self) -> &'static str {
        self.variant.family_name()
    }

    /// `"ASCII"` or `"RAWBITS"` — a pure function of the variant.
    pub fn encoding_name(&self) -> &'static str {
        self.variant.encoding_name()
    }

    pub fn is_raw(&self) -> bool {
        self.variant.is_raw()
    }

    pub fn set_variant(&mut self, variant: Variant) {
        self.variant = variant;
    }

    pub fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    /// Set the maximum sample value, recomputing `max_sample_bits`.
    pub fn set_max_value(&mut self, max_value: u32) {
        self.max_value = max_value;
        let mut v = max_value;
        let mut bits = 0;
        while v > 0 {
            v >>= 1;
            bits += 1;
        }
        self.max_sample_bits = bits;
    }

    /// Append a comment. Embedded line breaks (`\n`, `\r`, form feed) are
    /// replaced with spaces so each entry stays one logical line.
    pub fn add_comment(&mut self, comment: &str) {
        let scrubbed: String = comment
            .chars()
            .map(|c| match c {
                '\n' | '\r' | '\x0c' => ' ',
                c => c,
            })
            .collect();
        self.comments.push(scrubbed);
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Serialize to the generic named-field attribute tree.
    ///
    /// Field order: `FormatName`, `Variant`, `Width`, `Height`,
    /// `MaximumSample`, then one `Comment` per entry.
    pub fn to_tree(&self) -> Vec<MetaField> {
        let mut fields = Vec::with_capacity(5 + self.comments.len());
        fields.push(MetaField::new("FormatName", self.family_name()));
        fields.push(MetaField::new("Variant", self.encoding_name()));
        fields.push(MetaField::new("Width", self.width.to_string()));
        fields.push(MetaField::new("Height", self.height.to_string()));
        fields.push(MetaField::new("MaximumSample", self.max_value.to_string()));
        for c in &self.comments {
            fields.push(MetaField::new("Comment", c.clone()));
        }
        fields
    }

    /// Merge fields from an attribute tree. Unknown field names and
    /// unparseable values are hard errors, and nothing is applied partially:
    /// values are staged locally and committed only after every field has
    /// been validated.
    pub fn merge_tree(&mut self, fields: &[MetaField]) -> Result<(), PnmError> {
        let mut family: Option<&str> = None;
        let mut encoding: Option<&str> = None;
        let mut width: Option<u32> = None;
        let mut height: Option<u32> = None;
        let mut max_value: Option<u32> = None;
        let mut comments: Vec<&str> = Vec::new();

        for field in fields {
            let value = field.value.as_str();
            match field.name.as_str() {
                "FormatName" => family = Some(value),
                "Variant" => encoding = Some(value),
                "Width" => width = Some(parse_dimension("Width", value)?),
                "Height" => height = Some(parse_dimension("Height", value)?),
                "MaximumSample" => {
                    max_value = Some(parse_dimension("MaximumSample", value)?);
                }
                "Comment" => comments.push(value),
                other => {
                    return Err(PnmError::UnsupportedMetadataField(other.into()));
                }
            }
        }

        let raw = match encoding {
            Some("RAWBITS") => true,
            Some("ASCII") => false,
            Some(other) => {
                return Err(PnmError::MalformedHeader(format!(
                    "metadata Variant must be ASCII or RAWBITS, found {other:?}"
                )));
            }
            None => self.variant.is_raw(),
        };
        let ascii_variant = match family {
            Some("PBM") => Variant::PbmAscii,
            Some("PGM") => Variant::PgmAscii,
            Some("PPM") => Variant::PpmAscii,
            Some(other) => {
                return Err(PnmError::MalformedHeader(format!(
                    "metadata FormatName must be PBM, PGM or PPM, found {other:?}"
                )));
            }
            None => self.variant.to_ascii(),
        };

        self.variant = if raw {
            ascii_variant.to_raw()
        } else {
            ascii_variant
        };
        if let Some(w) = width {
            self.width = w;
        }
        if let Some(h) = height {
            self.height = h;
        }
        if let Some(v) = max_value {
            self.set_max_value(v);
        }
        for c in comments {
            self.add_comment(c);
        }

        Ok(())
    }
}

fn parse_dimension(name: &str, value: &str) -> Result<u32, PnmError> {
    value.trim().parse().map_err(|_| {
        PnmError::MalformedHeader(format!("metadata {name} has non-numeric value {value:?}"))
    })
}

/// One named field of the generic attribute tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaField {
    pub name: String,
    pub value: String,
}

impl MetaField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_sample_bits_tracks_max_value() {
        let mut meta = PnmMetadata::new(Variant::PgmRaw);
        meta.set_max_value(1);
        assert_eq!(meta.max_sample_bits(), 1);
        meta.set_max_value(255);
        assert_eq!(meta.max_sample_bits(), 8);
        meta.set_max_value(256);
        assert_eq!(meta.max_sample_bits(), 9);
        meta.set_max_value(4095);
        assert_eq!(meta.max_sample_bits(), 12);
        meta.set_max_value(65535);
        assert_eq!(meta.max_sample_bits(), 16);
    }

    #[test]
    fn comments_become_single_lines() {
        let mut meta = PnmMetadata::default();
        meta.add_comment("a#b\nc");
        assert_eq!(meta.comments(), ["a#b c"]);
        assert!(!meta.comments()[0].contains('\n'));
    }

    #[test]
    fn names_derive_from_variant() {
        let meta = PnmMetadata::new(Variant::PpmAscii);
        assert_eq!(meta.family_name(), "PPM");
        assert_eq!(meta.encoding_name(), "ASCII");
        let meta = PnmMetadata::new(Variant::PbmRaw);
        assert_eq!(meta.family_name(), "PBM");
        assert_eq!(meta.encoding_name(), "RAWBITS");
    }

    #[test]
    fn tree_round_trip() {
        let mut meta = PnmMetadata::new(Variant::PpmRaw);
        meta.set_width(640);
        meta.set_height(480);
        meta.set_max_value(255);
        meta.add_comment("scanline order");

        let mut restored = PnmMetadata::default();
        restored.merge_tree(&meta.to_tree()).unwrap();
        assert_eq!(restored.variant(), Variant::PpmRaw);
        assert_eq!(restored.width(), 640);
        assert_eq!(restored.height(), 480);
        assert_eq!(restored.max_value(), 255);
        assert_eq!(restored.comments(), ["scanline order"]);
    }

    #[test]
    fn unknown_field_is_a_hard_error() {
        let mut meta = PnmMetadata::default();
        let err = meta
            .merge_tree(&[MetaField::new("Gamma", "2.2")])
            .unwrap_err();
        assert!(matches!(err, PnmError::UnsupportedMetadataField(name) if name == "Gamma"));
    }

    #[test]
    fn failed_merge_leaves_metadata_untouched() {
        let mut meta = PnmMetadata::new(Variant::PgmRaw);
        meta.set_width(7);
        meta.set_height(9);
        meta.set_max_value(255);

        let err = meta
            .merge_tree(&[
                MetaField::new("Comment", "left behind"),
                MetaField::new("Height", "3"),
                MetaField::new("Width", "wide"),
            ])
            .unwrap_err();
        assert!(matches!(err, PnmError::MalformedHeader(_)));
        assert_eq!(meta.width(), 7);
        assert_eq!(meta.height(), 9);
        assert!(meta.comments().is_empty());
    }

    #[test]
    fn format_name_alone_keeps_encoding() {
        let mut meta = PnmMetadata::new(Variant::PgmRaw);
        meta.merge_tree(&[MetaField::new("FormatName", "PPM")]).unwrap();
        assert_eq!(meta.variant(), Variant::PpmRaw);
        meta.merge_tree(&[MetaField::new("Variant", "ASCII")]).unwrap();
        assert_eq!(meta.variant(), Variant::PpmAscii);
    }
}
