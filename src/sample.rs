//! Sample grids: the decoder's output buffer and the encoder's input view.
//!
//! Both sides describe their memory layout explicitly (container, strides,
//! band offsets, packed-bit row offset) so the codec can pick bulk row
//! transfers when the layout already matches the wire and fall back to
//! per-sample walks when it does not.

use alloc::vec::Vec;

#[cfg(feature = "rgb")]
use rgb::AsPixels as _;

#[cfg(feature = "rgb")]
use crate::error::PnmError;

/// A rectangular region in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersect with the image bounds `(0, 0, width, height)`.
    pub(crate) fn clip(&self, width: u32, height: u32) -> Region {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        Region::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub(crate) const fn full(width: u32, height: u32) -> Region {
        Region::new(0, 0, width, height)
    }
}

/// Decoded sample storage, in the smallest container the header implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Samples {
    /// Packed 1-bit samples: 8 per byte, MSB first, each row independently
    /// zero-padded to a byte boundary.
    Bits(Vec<u8>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Bits(v) | Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
            Samples::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoded image: a described-layout sample grid.
///
/// `width`/`height` are the full buffer dimensions — when a decode request
/// carries a destination offset the buffer is sized `offset + scaled region`
/// and the pixels land at the offset, with the area before it zeroed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Samples,
    width: u32,
    height: u32,
    channels: usize,
    row_stride: usize,
}

impl SampleBuffer {
    pub(crate) fn new(
        samples: Samples,
        width: u32,
        height: u32,
        channels: usize,
        row_stride: usize,
    ) -> Self {
        Self {
            samples,
            width,
            height,
            channels,
            row_stride,
        }
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bands per pixel: 1 for PBM/PGM output, 3 (or the requested band
    /// subset length) for PPM.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Elements per row for integer containers; bytes per row for `Bits`.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Read one sample, widened to u32. Mostly useful in tests and for
    /// callers that do not care about the container type.
    pub fn sample(&self, x: u32, y: u32, band: usize) -> Option<u32> {
        if x >= self.width || y >= self.height || band >= self.channels {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        match &self.samples {
            Samples::Bits(data) => {
                let byte = *data.get(y * self.row_stride + (x >> 3))?;
                Some(u32::from(byte >> (7 - (x & 7)) & 1))
            }
            Samples::U8(data) => data
                .get(y * self.row_stride + x * self.channels + band)
                .map(|&v| u32::from(v)),
            Samples::U16(data) => data
                .get(y * self.row_stride + x * self.channels + band)
                .map(|&v| u32::from(v)),
            Samples::U32(data) => data
                .get(y * self.row_stride + x * self.channels + band)
                .copied(),
        }
    }

    /// Borrow this buffer as an encoder source with the matching layout.
    pub fn as_source(&self) -> SampleSource<'_> {
        match &self.samples {
            Samples::Bits(data) => {
                SampleSource::bilevel(data, self.width, self.height)
                    .with_row_stride(self.row_stride)
            }
            Samples::U8(data) => SampleSource::interleaved_u8(
                data,
                self.width,
                self.height,
                self.channels,
            )
            .with_row_stride(self.row_stride),
            Samples::U16(data) => SampleSource::interleaved_u16(
                data,
                self.width,
                self.height,
                self.channels,
            )
            .with_row_stride(self.row_stride),
            Samples::U32(data) => SampleSource::interleaved_u32(
                data,
                self.width,
                self.height,
                self.channels,
            )
            .with_row_stride(self.row_stride),
        }
    }

    /// Typed view of an 8-bit RGB buffer.
    #[cfg(feature = "rgb")]
    pub fn as_rgb8(&self) -> Result<&[rgb::RGB8], PnmError> {
        match &self.samples {
            Samples::U8(data) if self.channels == 3 => Ok(data.as_pixels()),
            _ => Err(PnmError::UnsupportedLayout(alloc::format!(
                "rgb8 view needs a 3-band u8 buffer, this one is {}-band",
                self.channels
            ))),
        }
    }

    /// Zero-copy [`imgref::ImgRef`] view of an 8-bit RGB buffer.
    #[cfg(feature = "imgref")]
    pub fn as_imgref_rgb8(&self) -> Result<imgref::ImgRef<'_, rgb::RGB8>, PnmError> {
        let pixels = self.as_rgb8()?;
        Ok(imgref::ImgRef::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }
}

/// Borrowed sample data for encoding.
#[derive(Clone, Copy, Debug)]
pub enum SampleData<'a> {
    /// Packed 1-bit rows.
    Bits(&'a [u8]),
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl SampleData<'_> {
    /// Bits in one container element.
    pub(crate) fn container_bits(&self) -> u32 {
        match self {
            SampleData::Bits(_) => 1,
            SampleData::U8(_) => 8,
            SampleData::U16(_) => 16,
            SampleData::U32(_) => 32,
        }
    }
}

/// An encoder input: a sample grid plus the layout description the encoder
/// needs to choose between streaming whole rows and resynthesizing samples.
///
/// Strides are in container elements (bits for `Bits` data are addressed via
/// `bit_offset`; `row_stride` stays in bytes for packed rows).
#[derive(Clone, Debug)]
pub struct SampleSource<'a> {
    data: SampleData<'a>,
    width: u32,
    height: u32,
    channels: usize,
    sample_bits: u8,
    pixel_stride: usize,
    row_stride: usize,
    band_offsets: Vec<usize>,
    bit_offset: usize,
    palette: Option<&'a [[u8; 3]]>,
}

impl<'a> SampleSource<'a> {
    fn new(
        data: SampleData<'a>,
        width: u32,
        height: u32,
        channels: usize,
        sample_bits: u8,
        pixel_stride: usize,
        row_stride: usize,
    ) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            sample_bits,
            pixel_stride,
            row_stride,
            band_offsets: (0..channels).collect(),
            bit_offset: 0,
            palette: None,
        }
    }

    /// Packed 1-bit rows, `ceil(width / 8)` bytes each.
    pub fn bilevel(data: &'a [u8], width: u32, height: u32) -> Self {
        let row_bytes = (width as usize + 7) / 8;
        Self::new(SampleData::Bits(data), width, height, 1, 1, 1, row_bytes)
    }

    /// Single-band 8-bit samples, one per byte.
    pub fn gray8(data: &'a [u8], width: u32, height: u32) -> Self {
        Self::interleaved_u8(data, width, height, 1)
    }

    /// Single-band 16-bit samples.
    pub fn gray16(data: &'a [u16], width: u32, height: u32) -> Self {
        Self::interleaved_u16(data, width, height, 1)
    }

    /// Three-band pixel-interleaved 8-bit samples (R, G, B, R, G, B, ...).
    pub fn rgb8(data: &'a [u8], width: u32, height: u32) -> Self {
        Self::interleaved_u8(data, width, height, 3)
    }

    /// Three-band pixel-interleaved 16-bit samples.
    pub fn rgb16(data: &'a [u16], width: u32, height: u32) -> Self {
        Self::interleaved_u16(data, width, height, 3)
    }

    /// 8-bit palette indices with a color lookup table. Encodes as PPM
    /// through the palette (or as inverted PBM for a 1-bit palette, see
    /// [`with_sample_bits`](Self::with_sample_bits)).
    pub fn indexed8(
        data: &'a [u8],
        width: u32,
        height: u32,
        palette: &'a [[u8; 3]],
    ) -> Self {
        let mut source = Self::interleaved_u8(data, width, height, 1);
        source.palette = Some(palette);
        source
    }

    pub fn interleaved_u8(data: &'a [u8], width: u32, height: u32, channels: usize) -> Self {
        Self::new(
            SampleData::U8(data),
            width,
            height,
            channels,
            8,
            channels,
            width as usize * channels,
        )
    }

    pub fn interleaved_u16(data: &'a [u16], width: u32, height: u32, channels: usize) -> Self {
        Self::new(
            SampleData::U16(data),
            width,
            height,
            channels,
            16,
            channels,
            width as usize * channels,
        )
    }

    pub fn interleaved_u32(data: &'a [u32], width: u32, height: u32, channels: usize) -> Self {
        Self::new(
            SampleData::U32(data),
            width,
            height,
            channels,
            32,
            channels,
            width as usize * channels,
        )
    }

    /// Declare the significant bits per sample (e.g. 12-bit data carried in
    /// u16 containers). Defaults to the container width.
    pub fn with_sample_bits(mut self, bits: u8) -> Self {
        self.sample_bits = bits;
        self
    }

    /// Override the per-pixel band offsets (default: band index order).
    pub fn with_band_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.band_offsets = offsets;
        self
    }

    /// Override the element distance between consecutive pixels.
    pub fn with_pixel_stride(mut self, stride: usize) -> Self {
        self.pixel_stride = stride;
        self
    }

    /// Override the row stride (elements, or bytes for packed rows).
    pub fn with_row_stride(mut self, stride: usize) -> Self {
        self.row_stride = stride;
        self
    }

    /// Bits to skip at the start of each packed row.
    pub fn with_bit_offset(mut self, bits: usize) -> Self {
        self.bit_offset = bits;
        self
    }

    /// Attach a palette (mainly for bilevel sources whose index 1 is
    /// brighter than index 0 — PNM's bitmap convention is 1 = black, so
    /// such sources are written inverted).
    pub fn with_palette(mut self, palette: &'a [[u8; 3]]) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_bits(&self) -> u8 {
        self.sample_bits
    }

    pub(crate) fn data(&self) -> SampleData<'a> {
        self.data
    }

    pub(crate) fn pixel_stride(&self) -> usize {
        self.pixel_stride
    }

    pub(crate) fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub(crate) fn band_offsets(&self) -> &[usize] {
        &self.band_offsets
    }

    pub(crate) fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    pub(crate) fn palette(&self) -> Option<&'a [[u8; 3]]> {
        self.palette
    }

    /// True when a 1-bit palette maps index 1 to a brighter color than
    /// index 0, i.e. the opposite of PNM's "1 = black" convention.
    pub(crate) fn is_inverted_bilevel(&self) -> bool {
        match self.palette {
            Some(palette) if self.sample_bits == 1 && palette.len() >= 2 => {
                palette[1][0] > palette[0][0]
            }
            _ => false,
        }
    }

    /// Read one sample, widened to u32. Out-of-bounds reads return 0; the
    /// encoder validates dimensions before walking.
    pub(crate) fn sample(&self, x: u32, y: u32, band: usize) -> u32 {
        let (x, y) = (x as usize, y as usize);
        match self.data {
            SampleData::Bits(data) => {
                let bit = self.bit_offset + x;
                let idx = y * self.row_stride + (bit >> 3);
                data.get(idx)
                    .map(|&b| u32::from(b >> (7 - (bit & 7)) & 1))
                    .unwrap_or(0)
            }
            SampleData::U8(data) => {
                let idx = y * self.row_stride + x * self.pixel_stride + self.band_offsets[band];
                data.get(idx).map(|&v| u32::from(v)).unwrap_or(0)
            }
            SampleData::U16(data) => {
                let idx = y * self.row_stride + x * self.pixel_stride + self.band_offsets[band];
                data.get(idx).map(|&v| u32::from(v)).unwrap_or(0)
            }
            SampleData::U32(data) => {
                let idx = y * self.row_stride + x * self.pixel_stride + self.band_offsets[band];
                data.get(idx).copied().unwrap_or(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn region_clip_intersects_bounds() {
        let r = Region::new(4, 4, 10, 10).clip(8, 6);
        assert_eq!(r, Region::new(4, 4, 4, 2));
        let r = Region::new(10, 0, 4, 4).clip(8, 8);
        assert!(r.is_empty());
    }

    #[test]
    fn packed_buffer_sample_reads_bits_msb_first() {
        // One row: 0b1010_0000, width 4.
        let buf = SampleBuffer::new(Samples::Bits(vec![0xA0]), 4, 1, 1, 1);
        assert_eq!(buf.sample(0, 0, 0), Some(1));
        assert_eq!(buf.sample(1, 0, 0), Some(0));
        assert_eq!(buf.sample(2, 0, 0), Some(1));
        assert_eq!(buf.sample(3, 0, 0), Some(0));
        assert_eq!(buf.sample(4, 0, 0), None);
    }

    #[test]
    fn interleaved_source_applies_band_offsets() {
        let data = [10u8, 20, 30, 40, 50, 60];
        let source = SampleSource::rgb8(&data, 2, 1).with_band_offsets(vec![2, 1, 0]);
        assert_eq!(source.sample(0, 0, 0), 30);
        assert_eq!(source.sample(0, 0, 2), 10);
        assert_eq!(source.sample(1, 0, 0), 60);
    }

    #[test]
    fn bilevel_source_honors_bit_offset() {
        let data = [0b0001_0000u8];
        let source = SampleSource::bilevel(&data, 4, 1).with_bit_offset(3);
        assert_eq!(source.sample(0, 0, 0), 1);
        assert_eq!(source.sample(1, 0, 0), 0);
    }

    #[test]
    fn inverted_bilevel_detection() {
        let white_is_one = [[0, 0, 0], [255, 255, 255]];
        let black_is_one = [[255, 255, 255], [0, 0, 0]];
        let data = [0u8];
        assert!(
            SampleSource::bilevel(&data, 1, 1)
                .with_palette(&white_is_one)
                .is_inverted_bilevel()
        );
        assert!(
            !SampleSource::bilevel(&data, 1, 1)
                .with_palette(&black_is_one)
                .is_inverted_bilevel()
        );
        assert!(!SampleSource::bilevel(&data, 1, 1).is_inverted_bilevel());
    }
}
