use alloc::string::String;
use enough::StopReason;

/// Errors from PNM decoding, encoding and metadata interchange.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PnmError {
    /// Bad magic or variant byte, or a width/height/maxValue token that is
    /// missing or non-numeric.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A missing or non-numeric sample token in ASCII pixel data.
    #[error("malformed pixel data: {0}")]
    MalformedPixelData(String),

    /// Band count or sample depth this format family cannot carry.
    #[error("unsupported sample layout: {0}")]
    UnsupportedLayout(String),

    /// Image index other than 0. A PNM stream holds exactly one image.
    #[error("image index {0} out of range for single-image stream")]
    IndexOutOfRange(usize),

    /// Unknown field name while merging an attribute tree.
    #[error("unsupported metadata field: {0}")]
    UnsupportedMetadataField(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for PnmError {
    fn from(r: StopReason) -> Self {
        PnmError::Cancelled(r)
    }
}
