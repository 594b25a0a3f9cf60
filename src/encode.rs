//! PNM encoding: variant auto-selection, header emission and pixel
//! serialization with region, subsampling and band-subset support.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;

use crate::error::PnmError;
use crate::header::{Header, Variant};
use crate::metadata::PnmMetadata;
use crate::sample::{Region, SampleData, SampleSource};

/// ASCII output wraps after this many sample tokens on one line.
const ASCII_WRAP: u32 = 16;
/// Palette-expanded PPM wraps after five pixel groups (15 samples) so line
/// breaks always fall on pixel boundaries.
const ASCII_WRAP_GROUPED: u32 = 15;

/// Parameters for a partial encode.
///
/// The default request encodes the whole source at full resolution with all
/// bands, choosing raw or ASCII from the metadata (raw when none is given).
pub struct EncodeRequest<'a> {
    region: Option<Region>,
    scale_x: u32,
    scale_y: u32,
    offset_x: u32,
    offset_y: u32,
    source_bands: Option<Vec<usize>>,
    raw: Option<bool>,
    progress: Option<&'a dyn Fn(f32)>,
}

impl Default for EncodeRequest<'_> {
    fn default() -> Self {
        Self {
            region: None,
            scale_x: 1,
            scale_y: 1,
            offset_x: 0,
            offset_y: 0,
            source_bands: None,
            raw: None,
            progress: None,
        }
    }
}

impl<'a> EncodeRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode only this region of the source, clipped to its bounds.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Keep every `scale_x`-th column and every `scale_y`-th row.
    pub fn with_subsampling(mut self, scale_x: u32, scale_y: u32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Shift the subsampling grid origin by `(x, y)` within the region; the
    /// region shrinks by the same amount.
    pub fn with_grid_offset(mut self, x: u32, y: u32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Write only these source bands, in the given order. One band yields
    /// PGM (or PBM for 1-bit data), three yield PPM.
    pub fn with_source_bands(mut self, bands: Vec<usize>) -> Self {
        self.source_bands = Some(bands);
        self
    }

    /// Force raw (`true`) or ASCII (`false`) encoding, overriding the
    /// metadata preference. Raw is infeasible above 8 bits per sample and
    /// falls back to ASCII.
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Observe per-row progress as a percentage in `0.0..=100.0`.
    pub fn on_progress(mut self, callback: &'a dyn Fn(f32)) -> Self {
        self.progress = Some(callback);
        self
    }
}

/// PNM encoder. Metadata, when attached, contributes the raw-vs-ASCII
/// preference, a maximum-value floor and the comment lines; the variant
/// family always follows the sample data itself.
#[derive(Default)]
pub struct PnmEncoder<'m> {
    metadata: Option<&'m PnmMetadata>,
}

impl<'m> PnmEncoder<'m> {
    pub fn new() -> Self {
        Self { metadata: None }
    }

    pub fn with_metadata(mut self, metadata: &'m PnmMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Serialize `source` as a PNM byte stream.
    pub fn encode(
        &self,
        source: &SampleSource<'_>,
        request: &EncodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<Vec<u8>, PnmError> {
        let plan = self.plan(source, request)?;
        let mut out = Vec::new();
        self.write_header(&mut out, &plan);
        if plan.variant.is_raw() {
            out.push(b'\n');
            if plan.variant.is_bitmap() {
                self.write_pbm_raw(&mut out, source, &plan, request, stop)?;
            } else {
                self.write_gray_rgb_raw(&mut out, source, &plan, request, stop)?;
            }
        } else {
            self.write_ascii(&mut out, source, &plan, request, stop)?;
        }
        Ok(out)
    }

    /// Resolve variant, geometry and band selection. Fails before a single
    /// output byte is produced.
    fn plan(
        &self,
        source: &SampleSource<'_>,
        request: &EncodeRequest<'_>,
    ) -> Result<EncodePlan, PnmError> {
        if request.scale_x == 0 || request.scale_y == 0 {
            return Err(PnmError::UnsupportedLayout(
                "subsampling strides must both be at least 1".into(),
            ));
        }

        let container = source.data().container_bits();
        let declared = u32::from(source.sample_bits());
        if declared == 0 || declared > container {
            return Err(PnmError::UnsupportedLayout(format!(
                "{declared}-bit samples do not fit a {container}-bit container"
            )));
        }

        if source.band_offsets().len() != source.channels() {
            return Err(PnmError::UnsupportedLayout(format!(
                "{} band offsets for a {}-band source",
                source.band_offsets().len(),
                source.channels()
            )));
        }

        // An indexed source with more than one bit per index expands through
        // its palette into 8-bit RGB.
        let expand_palette = source.palette().is_some() && declared > 1;
        if expand_palette && source.channels() != 1 {
            return Err(PnmError::UnsupportedLayout(
                "palette sources must have a single index band".into(),
            ));
        }
        let base_channels = if expand_palette { 3 } else { source.channels() };
        let bits = if expand_palette { 8 } else { declared };

        let bands: Vec<usize> = match &request.source_bands {
            None => (0..base_channels).collect(),
            Some(bands) => {
                for &b in bands {
                    if b >= base_channels {
                        return Err(PnmError::UnsupportedLayout(format!(
                            "source band {b} out of range for {base_channels}-band source"
                        )));
                    }
                }
                bands.clone()
            }
        };

        let ascii_variant = match (bands.len(), bits) {
            (1, 1) => Variant::PbmAscii,
            (1, _) => Variant::PgmAscii,
            (3, _) => Variant::PpmAscii,
            (n, _) => {
                return Err(PnmError::UnsupportedLayout(format!(
                    "band count must be 1 or 3, found {n}"
                )));
            }
        };

        let max_value = if ascii_variant.is_bitmap() {
            1
        } else {
            let derived = ((1u64 << bits) - 1) as u32;
            let floor = self.metadata.map(|m| m.max_value()).unwrap_or(0);
            derived.max(floor)
        };

        let raw_preferred = request
            .raw
            .or(self.metadata.map(|m| m.is_raw()))
            .unwrap_or(true);
        // Raw PGM/PPM carries one byte per sample; anything wider must fall
        // back to ASCII. Packed bitmaps are always raw-feasible.
        let raw = raw_preferred && (ascii_variant.is_bitmap() || max_value <= 0xFF);
        let variant = if raw { ascii_variant.to_raw() } else { ascii_variant };

        let mut region = request
            .region
            .unwrap_or(Region::full(source.width(), source.height()));
        region.x = region.x.saturating_add(request.offset_x);
        region.y = region.y.saturating_add(request.offset_y);
        region.width = region.width.saturating_sub(request.offset_x);
        region.height = region.height.saturating_sub(request.offset_y);
        let region = region.clip(source.width(), source.height());
        if region.is_empty() {
            return Err(PnmError::UnsupportedLayout(
                "source region is empty after clipping".into(),
            ));
        }

        let out_w = ceil_div(region.width, request.scale_x);
        let out_h = ceil_div(region.height, request.scale_y);

        Ok(EncodePlan {
            variant,
            region,
            scale_x: request.scale_x,
            scale_y: request.scale_y,
            bands,
            expand_palette,
            invert_bits: source.is_inverted_bilevel(),
            max_value,
            out_w,
            out_h,
        })
    }

    fn write_header(&self, out: &mut Vec<u8>, plan: &EncodePlan) {
        out.push(b'P');
        out.push(plan.variant.digit());
        out.extend_from_slice(b"\n# written by zenpnm");
        if let Some(metadata) = self.metadata {
            for comment in metadata.comments() {
                out.push(b'\n');
                out.extend_from_slice(b"# ");
                out.extend_from_slice(comment.as_bytes());
            }
        }
        out.push(b'\n');
        push_int(out, plan.out_w);
        out.push(b' ');
        push_int(out, plan.out_h);
        if !plan.variant.is_bitmap() {
            out.push(b'\n');
            push_int(out, plan.max_value);
        }
    }

    fn write_pbm_raw(
        &self,
        out: &mut Vec<u8>,
        source: &SampleSource<'_>,
        plan: &EncodePlan,
        request: &EncodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<(), PnmError> {
        let row_bytes = Header::packed_row_bytes(plan.out_w);

        if plan.is_full_width(source) {
            if let SampleData::Bits(data) = source.data() {
                if source.bit_offset() == 0 {
                    // Rows already match the wire layout bit for bit.
                    let pad_mask = trailing_bit_mask(plan.out_w);
                    for r in 0..plan.out_h {
                        stop.check()?;
                        let start = (plan.region.y + r) as usize * source.row_stride();
                        let row = data.get(start..start + row_bytes).ok_or_else(|| {
                            PnmError::UnsupportedLayout(
                                "sample data shorter than its declared layout".into(),
                            )
                        })?;
                        if plan.invert_bits {
                            let at = out.len();
                            out.extend(row.iter().map(|&b| !b));
                            // Padding bits stay zero even after inversion.
                            if let Some(last) = out.get_mut(at + row_bytes - 1) {
                                *last &= pad_mask;
                            }
                        } else {
                            out.extend_from_slice(row);
                        }
                        report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
                    }
                    return Ok(());
                }
            }
        }

        let mut row = vec![0u8; row_bytes];
        for r in 0..plan.out_h {
            stop.check()?;
            row.iter_mut().for_each(|b| *b = 0);
            let src_y = plan.region.y + r * plan.scale_y;
            for i in 0..plan.out_w {
                let src_x = plan.region.x + i * plan.scale_x;
                let mut bit = source.sample(src_x, src_y, 0) as u8 & 1;
                if plan.invert_bits {
                    bit ^= 1;
                }
                row[(i >> 3) as usize] |= bit << (7 - (i & 7));
            }
            out.extend_from_slice(&row);
            report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
        }
        Ok(())
    }

    fn write_gray_rgb_raw(
        &self,
        out: &mut Vec<u8>,
        source: &SampleSource<'_>,
        plan: &EncodePlan,
        request: &EncodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<(), PnmError> {
        let channels = plan.bands.len();

        if plan.is_full_width(source)
            && !plan.expand_palette
            && source.sample_bits() == 8
            && source.pixel_stride() == channels
            && identity_bands(&plan.bands)
            && source.band_offsets() == plan.bands.as_slice()
        {
            if let SampleData::U8(data) = source.data() {
                let row_bytes = plan.out_w as usize * channels;
                for r in 0..plan.out_h {
                    stop.check()?;
                    let start = (plan.region.y + r) as usize * source.row_stride();
                    let row = data.get(start..start + row_bytes).ok_or_else(|| {
                        PnmError::UnsupportedLayout(
                            "sample data shorter than its declared layout".into(),
                        )
                    })?;
                    out.extend_from_slice(row);
                    report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
                }
                return Ok(());
            }
        }

        for r in 0..plan.out_h {
            stop.check()?;
            let src_y = plan.region.y + r * plan.scale_y;
            for i in 0..plan.out_w {
                let src_x = plan.region.x + i * plan.scale_x;
                for &band in &plan.bands {
                    let v = plan.fetch(source, src_x, src_y, band)?;
                    out.push(v as u8);
                }
            }
            report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
        }
        Ok(())
    }

    fn write_ascii(
        &self,
        out: &mut Vec<u8>,
        source: &SampleSource<'_>,
        plan: &EncodePlan,
        request: &EncodeRequest<'_>,
        stop: &dyn Stop,
    ) -> Result<(), PnmError> {
        let wrap = if plan.expand_palette && plan.bands.len() == 3 {
            ASCII_WRAP_GROUPED
        } else {
            ASCII_WRAP
        };
        let bitmap = plan.variant.is_bitmap();

        // The newline ending the previous line doubles as the single
        // header/data separator for the first row.
        for r in 0..plan.out_h {
            stop.check()?;
            out.push(b'\n');
            let src_y = plan.region.y + r * plan.scale_y;
            let mut count: u32 = 0;
            for i in 0..plan.out_w {
                let src_x = plan.region.x + i * plan.scale_x;
                for &band in &plan.bands {
                    if count > 0 {
                        out.push(if count % wrap == 0 { b'\n' } else { b' ' });
                    }
                    let mut v = plan.fetch(source, src_x, src_y, band)?;
                    if bitmap {
                        v &= 1;
                        if plan.invert_bits {
                            v ^= 1;
                        }
                    }
                    push_int(out, v);
                    count += 1;
                }
            }
            report(request, 100.0 * (r + 1) as f32 / plan.out_h as f32);
        }
        out.push(b'\n');
        Ok(())
    }
}

struct EncodePlan {
    variant: Variant,
    region: Region,
    scale_x: u32,
    scale_y: u32,
    /// Selected bands, in output order. Indexes into the palette-expanded
    /// RGB bands when `expand_palette` is set.
    bands: Vec<usize>,
    expand_palette: bool,
    invert_bits: bool,
    max_value: u32,
    out_w: u32,
    out_h: u32,
}

impl EncodePlan {
    /// Whole rows at unit stride: the precondition for streaming source
    /// rows straight to the output.
    fn is_full_width(&self, source: &SampleSource<'_>) -> bool {
        self.region.x == 0
            && self.region.width == source.width()
            && self.scale_x == 1
            && self.scale_y == 1
    }

    /// One output sample, read through the palette when expanding.
    fn fetch(
        &self,
        source: &SampleSource<'_>,
        x: u32,
        y: u32,
        band: usize,
    ) -> Result<u32, PnmError> {
        if self.expand_palette {
            let palette = source.palette().unwrap_or(&[]);
            let index = source.sample(x, y, 0) as usize;
            let entry = palette.get(index).ok_or_else(|| {
                PnmError::MalformedPixelData(format!(
                    "palette index {index} out of range for {} entries",
                    palette.len()
                ))
            })?;
            Ok(u32::from(entry[band]))
        } else {
            Ok(source.sample(x, y, band))
        }
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    ((u64::from(a) + u64::from(b) - 1) / u64::from(b)) as u32
}

/// Mask keeping the used bits of the last packed byte in a `width`-bit row.
fn trailing_bit_mask(width: u32) -> u8 {
    match width % 8 {
        0 => 0xFF,
        used => 0xFF << (8 - used),
    }
}

fn identity_bands(bands: &[usize]) -> bool {
    bands.iter().enumerate().all(|(i, &b)| i == b)
}

fn push_int(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(format!("{value}").as_bytes());
}

fn report(request: &EncodeRequest<'_>, percent: f32) {
    if let Some(cb) = request.progress {
        cb(percent);
    }
}

/// Encode a whole source with default parameters (raw output).
pub fn encode(source: &SampleSource<'_>, stop: &dyn Stop) -> Result<Vec<u8>, PnmError> {
    PnmEncoder::new().encode(source, &EncodeRequest::new(), stop)
}
