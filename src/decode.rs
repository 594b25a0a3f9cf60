//! PNM decoding: header access and pixel reads with region clipping,
//! subsampling, band selection and destination placement.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;

use crate::cursor::{Cursor, TokenError};
use crate::error::PnmError;
use crate::header::{parse_header, Header, SampleType, Variant};
use crate::limits::Limits;
use crate::metadata::PnmMetadata;
use crate::sample::{Region, SampleBuffer, Samples};

/// Parameters for a partial decode.
///
/// The default request decodes the whole image at full resolution with all
/// bands in source order.
pub struct DecodeRequest<'a> {
    region: Option<Region>,
    scale_x: u32,
    scale_y: u32,
    source_bands: Option<Vec<usize>>,
    dest_bands: Option<Vec<usize>>,
    dest_x: u32,
    dest_y: u32,
    image_index: usize,
    limits: Limits,
    progress: Option<&'a dyn Fn(f32)>,
}

impl Default for DecodeRequest<'_> {
    fn default() -> Self {
        Self {
            region: None,
            scale_x: 1,
            scale_y: 1,
            source_bands: None,
            dest_bands: None,
            dest_x: 0,
            dest_y: 0,
            image_index: 0,
            limits: Limits::default(),
            progress: None,
        }
    }
}

impl<'a> DecodeRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode only this region of the source, clipped to the image bounds.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Keep every `scale_x`-th column and every `scale_y`-th row of the
    /// region, starting at its origin. Zero strides are rejected at decode
    /// time.
    pub fn with_subsampling(mut self, scale_x: u32, scale_y: u32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Copy `source_bands[i]` of each pixel into output band
    /// `dest_bands[i]`. The lists must be the same length.
    pub fn with_bands(mut self, source_bands: Vec<usize>, dest_bands: Vec<usize>) -> Self {
        self.source_bands = Some(source_bands);
        self.dest_bands = Some(dest_bands);
        self
    }

    /// Place the decoded region at `(x, y)` in the output buffer instead of
    /// its origin. The buffer grows to `offset + scaled region` and the area
    /// outside the placed pixels stays zero.
    pub fn with_dest_offset(mut self, x: u32, y: u32) -> Self {
        self.dest_x = x;
        self.dest_y = y;
        self
    }

    /// Select an image by index. PNM streams hold exactly one image, so any
    /// index other than 0 fails with [`PnmError::IndexOutOfRange`].
    pub fn with_image_index(mut self, index: usize) -> Self {
        self.image_index = index;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Observe per-row progress as a percentage in `0.0..=100.0`. The
    /// callback is informational only and never affects control flow.
    pub fn on_progress(mut self, callback: &'a dyn Fn(f32)) -> Self {
        self.progress = Some(callback);
        self
    }

    fn scales(&self) -> Result<(u32, u32), PnmError> {
        if self.scale_x == 0 || self.scale_y == 0 {
            return Err(PnmError::UnsupportedLayout(
                "subsampling strides must both be at least 1".into(),
            ));
        }
        Ok((self.scale_x, self.scale_y))
    }
}

/// Streaming PNM decoder over an in-memory byte slice.
///
/// The header is parsed once and cached; repeated header queries reposition
/// the cursor at the recorded pixel-data start instead of re-consuming
/// header bytes, so width/height/metadata may be read any number of times
/// before (or between) pixel reads.
pub struct PnmDecoder<'a> {
    cursor: Cursor<'a>,
    header: Option<Header>,
    metadata: Option<PnmMetadata>,
    data_offset: usize,
}

impl<'a> PnmDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            header: None,
            metadata: None,
            data_offset: 0,
        }
    }

    /// Parse the header, or return the cached copy. Either way the cursor
    /// is left at the first pixel-data byte.
    pub fn read_header(&mut self) -> Result<Header, PnmError> {
        if let Some(header) = self.header {
            self.cursor.set_position(self.data_offset)?;
            return Ok(header);
        }
        let mut comments = Vec::new();
        let header = parse_header(&mut self.cursor, &mut comments)?;
        let mut metadata = PnmMetadata::from_header(&header);
        for c in &comments {
            metadata.add_comment(c);
        }
        self.data_offset = self.cursor.position();
        self.header = Some(header);
        self.metadata = Some(metadata);
        Ok(header)
    }

    pub fn width(&mut self) -> Result<u32, PnmError> {
        Ok(self.read_header()?.width)
    }

    pub fn height(&mut self) -> Result<u32, PnmError> {
        Ok(self.read_header()?.height)
    }

    pub fn variant(&mut self) -> Result<Variant, PnmError> {
        Ok(self.read_header()?.variant)
    }

    pub fn max_value(&mut self) -> Result<u32, PnmError> {
        Ok(self.read_header()?.max_value)
    }

    /// Header-derived metadata including any comments collected from the
    /// header block.
    pub fn metadata(&mut self) -> Result<&PnmMetadata, PnmError> {
        self.read_header()?;
        match &self.metadata {
            Some(m) => Ok(m),
            // read_header always populates it on success
            None => Err(PnmError::UnexpectedEof),
        }
    }

    /// Number of images in the stream. Always 1 for PNM.
    pub fn num_images(&self) -> usize {
        1
    }

    /// Decode the full image at full resolution.
    pub fn decode(&mut self, stop: &dyn Stop) -> Result<SampleBuffer, PnmError> {
        self.decode_with(&DecodeRequest::new(), stop)
    }

    /// Decode with region clipping, subsampling, band selection and
    /// destination placement.
    pub fn decode_with(
        &mut self,
        request: &DecodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<SampleBuffer, PnmError> {
        if request.image_index != 0 {
            return Err(PnmError::IndexOutOfRange(request.image_index));
        }

        let header = self.read_header()?;
        request.limits.check(header.width, header.height)?;

        let (scale_x, scale_y) = request.scales()?;
        let region = request
            .region
            .unwrap_or(Region::full(header.width, header.height))
            .clip(header.width, header.height);
        if region.is_empty() {
            return Err(PnmError::UnsupportedLayout(
                "source region is empty after clipping".into(),
            ));
        }

        let channels = header.variant.channels();
        let (source_bands, dest_bands) = resolve_bands(request, channels)?;
        if header.variant.is_bitmap() && (source_bands != [0] || dest_bands != [0]) {
            return Err(PnmError::UnsupportedLayout(
                "bitmap images carry a single band at index 0".into(),
            ));
        }
        let out_channels = source_bands.len();

        let out_w = ceil_div(region.width, scale_x);
        let out_h = ceil_div(region.height, scale_y);
        let buf_w = request
            .dest_x
            .checked_add(out_w)
            .ok_or(PnmError::DimensionsTooLarge {
                width: header.width,
                height: header.height,
            })?;
        let buf_h = request
            .dest_y
            .checked_add(out_h)
            .ok_or(PnmError::DimensionsTooLarge {
                width: header.width,
                height: header.height,
            })?;

        // Raw PGM/PPM samples are always one byte on the wire, whatever the
        // header declares; a declared maxValue above 255 is clamped to the
        // byte container here.
        let sample_type = if header.variant.is_raw() && !header.variant.is_bitmap() {
            SampleType::U8
        } else {
            header.sample_type()
        };

        let row_stride = match sample_type {
            SampleType::Bit => Header::packed_row_bytes(buf_w),
            _ => checked_elems(buf_w, out_channels, &header)?,
        };
        let elem_size: usize = match sample_type {
            SampleType::Bit | SampleType::U8 => 1,
            SampleType::U16 => 2,
            SampleType::U32 => 4,
        };
        let total = row_stride
            .checked_mul(buf_h as usize)
            .ok_or(PnmError::DimensionsTooLarge {
                width: header.width,
                height: header.height,
            })?;
        let bytes = total
            .checked_mul(elem_size)
            .ok_or(PnmError::DimensionsTooLarge {
                width: header.width,
                height: header.height,
            })?;
        request.limits.check_memory(bytes)?;

        let no_transform = region == Region::full(header.width, header.height)
            && scale_x == 1
            && scale_y == 1
            && request.source_bands.is_none()
            && request.dest_x == 0
            && request.dest_y == 0;

        let plan = Plan {
            header,
            region,
            scale_x,
            scale_y,
            source_bands,
            dest_bands,
            out_channels,
            out_w,
            out_h,
            dest_x: request.dest_x,
            dest_y: request.dest_y,
            row_stride,
            total,
            no_transform,
        };

        let samples = match (header.variant, sample_type) {
            (Variant::PbmRaw, _) => self.decode_pbm_raw(&plan, request, stop)?,
            (Variant::PbmAscii, _) => self.decode_pbm_ascii(&plan, request, stop)?,
            (v, SampleType::U8) if v.is_raw() => self.decode_raw_bytes(&plan, request, stop)?,
            (_, SampleType::U8) => {
                Samples::U8(self.decode_ascii(&plan, request, stop, |v| v as u8)?)
            }
            (_, SampleType::U16) => {
                Samples::U16(self.decode_ascii(&plan, request, stop, |v| v as u16)?)
            }
            (_, SampleType::U32) => Samples::U32(self.decode_ascii(&plan, request, stop, |v| v)?),
            (_, SampleType::Bit) => unreachable!(),
        };

        Ok(SampleBuffer::new(
            samples,
            buf_w,
            buf_h,
            plan.out_channels,
            row_stride,
        ))
    }

    fn decode_pbm_raw(
        &mut self,
        plan: &Plan,
        request: &DecodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<Samples, PnmError> {
        let src_row_bytes = Header::packed_row_bytes(plan.header.width);

        if plan.no_transform {
            stop.check()?;
            let needed = src_row_bytes
                .checked_mul(plan.header.height as usize)
                .ok_or(PnmError::DimensionsTooLarge {
                    width: plan.header.width,
                    height: plan.header.height,
                })?;
            let bulk = self.cursor.read_slice(needed)?.to_vec();
            report(request, 100.0);
            return Ok(Samples::Bits(bulk));
        }

        let mut out = vec![0u8; plan.total];
        for r in 0..plan.out_h {
            stop.check()?;
            let src_y = plan.region.y + r * plan.scale_y;
            self.cursor
                .set_position(self.data_offset + src_y as usize * src_row_bytes)?;
            // Only the prefix covering the last kept column needs to exist.
            let last_x = plan.region.x + (plan.out_w - 1) * plan.scale_x;
            let row = self.cursor.read_slice(last_x as usize / 8 + 1)?;

            let out_row = (plan.dest_y + r) as usize * plan.row_stride;
            for i in 0..plan.out_w {
                let src_x = (plan.region.x + i * plan.scale_x) as usize;
                let bit = row[src_x >> 3] >> (7 - (src_x & 7)) & 1;
                let dst_bit = (plan.dest_x + i) as usize;
                out[out_row + (dst_bit >> 3)] |= bit << (7 - (dst_bit & 7));
            }
            report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
        }
        Ok(Samples::Bits(out))
    }

    fn decode_pbm_ascii(
        &mut self,
        plan: &Plan,
        request: &DecodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<Samples, PnmError> {
        let mut out = vec![0u8; plan.total];
        let mut consumed: u64 = 0;
        for r in 0..plan.out_h {
            stop.check()?;
            let src_y = plan.region.y + r * plan.scale_y;
            let out_row = (plan.dest_y + r) as usize * plan.row_stride;
            for i in 0..plan.out_w {
                let src_x = plan.region.x + i * plan.scale_x;
                let index = u64::from(src_y) * u64::from(plan.header.width) + u64::from(src_x);
                skip_tokens(&mut self.cursor, index - consumed)?;
                let bit = pixel_token(&mut self.cursor)?;
                consumed = index + 1;
                if bit > 1 {
                    return Err(PnmError::MalformedPixelData(format!(
                        "bitmap sample must be 0 or 1, found {bit}"
                    )));
                }
                let dst_bit = (plan.dest_x + i) as usize;
                out[out_row + (dst_bit >> 3)] |= (bit as u8) << (7 - (dst_bit & 7));
            }
            report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
        }
        Ok(Samples::Bits(out))
    }

    /// Raw PGM/PPM: one byte per sample, pixel-interleaved.
    fn decode_raw_bytes(
        &mut self,
        plan: &Plan,
        request: &DecodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<Samples, PnmError> {
        let channels = plan.header.variant.channels();
        let src_row_bytes = plan.header.width as usize * channels;

        if plan.no_transform {
            stop.check()?;
            let needed = src_row_bytes
                .checked_mul(plan.header.height as usize)
                .ok_or(PnmError::DimensionsTooLarge {
                    width: plan.header.width,
                    height: plan.header.height,
                })?;
            let bulk = self.cursor.read_slice(needed)?.to_vec();
            report(request, 100.0);
            return Ok(Samples::U8(bulk));
        }

        let mut out = vec![0u8; plan.total];
        for r in 0..plan.out_h {
            stop.check()?;
            let src_y = plan.region.y + r * plan.scale_y;
            self.cursor
                .set_position(self.data_offset + src_y as usize * src_row_bytes)?;
            let last_x = (plan.region.x + (plan.out_w - 1) * plan.scale_x) as usize;
            let row = self.cursor.read_slice(last_x * channels + channels)?;

            let out_row = (plan.dest_y + r) as usize * plan.row_stride;
            for i in 0..plan.out_w {
                let src_px = (plan.region.x + i * plan.scale_x) as usize * channels;
                let dst_px =
                    out_row + (plan.dest_x + i) as usize * plan.out_channels;
                for (sb, db) in plan.source_bands.iter().zip(&plan.dest_bands) {
                    out[dst_px + db] = row[src_px + sb];
                }
            }
            report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
        }
        Ok(Samples::U8(out))
    }

    /// ASCII PGM/PPM: one decimal token per sample. Tokens for skipped
    /// pixels are scanned and discarded, since text has no random access.
    fn decode_ascii<T: Copy + Default>(
        &mut self,
        plan: &Plan,
        request: &DecodeRequest<'_>,
        stop: &dyn Stop,
        cast: impl Fn(u32) -> T,
    ) -> Result<Vec<T>, PnmError> {
        let channels = plan.header.variant.channels();
        let mut out = vec![T::default(); plan.total];
        let mut pixel = [0u32; 3];
        let mut consumed: u64 = 0;

        for r in 0..plan.out_h {
            stop.check()?;
            let src_y = plan.region.y + r * plan.scale_y;
            let out_row = (plan.dest_y + r) as usize * plan.row_stride;
            for i in 0..plan.out_w {
                let src_x = plan.region.x + i * plan.scale_x;
                let index = (u64::from(src_y) * u64::from(plan.header.width)
                    + u64::from(src_x))
                    * channels as u64;
                skip_tokens(&mut self.cursor, index - consumed)?;
                for slot in pixel.iter_mut().take(channels) {
                    *slot = pixel_token(&mut self.cursor)?;
                }
                consumed = index + channels as u64;

                let dst_px = out_row + (plan.dest_x + i) as usize * plan.out_channels;
                for (sb, db) in plan.source_bands.iter().zip(&plan.dest_bands) {
                    out[dst_px + db] = cast(pixel[*sb]);
                }
            }
            report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
        }
        Ok(out)
    }
}

/// Precomputed geometry for one decode call.
struct Plan {
    header: Header,
    region: Region,
    scale_x: u32,
    scale_y: u32,
    source_bands: Vec<usize>,
    dest_bands: Vec<usize>,
    out_channels: usize,
    out_w: u32,
    out_h: u32,
    dest_x: u32,
    dest_y: u32,
    row_stride: usize,
    total: usize,
    no_transform: bool,
}

fn resolve_bands(
    request: &DecodeRequest<'_>,
    channels: usize,
) -> Result<(Vec<usize>, Vec<usize>), PnmError> {
    match (&request.source_bands, &request.dest_bands) {
        (None, None) => Ok(((0..channels).collect(), (0..channels).collect())),
        (Some(src), Some(dst)) => {
            if src.len() != dst.len() || src.is_empty() {
                return Err(PnmError::UnsupportedLayout(format!(
                    "band lists must be non-empty and equal length, found {} and {}",
                    src.len(),
                    dst.len()
                )));
            }
            for &b in src {
                if b >= channels {
                    return Err(PnmError::UnsupportedLayout(format!(
                        "source band {b} out of range for {channels}-band image"
                    )));
                }
            }
            for &b in dst {
                if b >= src.len() {
                    return Err(PnmError::UnsupportedLayout(format!(
                        "destination band {b} out of range for {}-band output",
                        src.len()
                    )));
                }
            }
            Ok((src.clone(), dst.clone()))
        }
        _ => unreachable!("with_bands sets both lists"),
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    ((u64::from(a) + u64::from(b) - 1) / u64::from(b)) as u32
}

fn checked_elems(width: u32, channels: usize, header: &Header) -> Result<usize, PnmError> {
    (width as usize)
        .checked_mul(channels)
        .ok_or(PnmError::DimensionsTooLarge {
            width: header.width,
            height: header.height,
        })
}

fn report(request: &DecodeRequest<'_>, percent: f32) {
    if let Some(cb) = request.progress {
        cb(percent);
    }
}

fn pixel_token(cursor: &mut Cursor<'_>) -> Result<u32, PnmError> {
    match cursor.next_int() {
        Ok(v) => Ok(v),
        Err(TokenError::Eof) => Err(PnmError::UnexpectedEof),
        Err(TokenError::NonNumeric(b)) => Err(PnmError::MalformedPixelData(format!(
            "expected decimal sample token, found byte 0x{b:02x}"
        ))),
    }
}

fn skip_tokens(cursor: &mut Cursor<'_>, count: u64) -> Result<(), PnmError> {
    for _ in 0..count {
        pixel_token(cursor)?;
    }
    Ok(())
}

/// Parse only the header of a PNM stream.
pub fn probe(data: &[u8]) -> Result<Header, PnmError> {
    let mut cursor = Cursor::new(data);
    let mut comments = Vec::new();
    parse_header(&mut cursor, &mut comments)
}

/// Decode a whole PNM image with default parameters.
pub fn decode(data: &[u8], stop: &dyn Stop) -> Result<SampleBuffer, PnmError> {
    PnmDecoder::new(data).decode(stop)
}
