use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};

use enough::{Stop, StopReason, Unstoppable};
use zenpnm::*;

/// Allows a fixed number of checks, then reports cancellation.
struct StopAfter(AtomicU32);

impl StopAfter {
    fn new(checks: u32) -> Self {
        Self(AtomicU32::new(checks))
    }
}

impl Stop for StopAfter {
    fn check(&self) -> Result<(), StopReason> {
        let left = self.0.load(Ordering::Relaxed);
        if left == 0 {
            return Err(StopReason::Cancelled);
        }
        self.0.store(left - 1, Ordering::Relaxed);
        Ok(())
    }
}

/// 5x5 gray fixture where sample(x, y) == y * 16 + x.
fn gray5x5() -> Vec<u8> {
    let mut header = b"P5\n5 5\n255\n".to_vec();
    for y in 0..5u8 {
        for x in 0..5u8 {
            header.push(y * 16 + x);
        }
    }
    header
}

#[test]
fn pbm_bit_pattern_decodes_exactly() {
    // 10x2 raw bitmap, two bytes per row.
    let mut data = b"P4\n10 2\n".to_vec();
    data.extend_from_slice(&[0b1011_0101, 0b0100_0000, 0b1111_1111, 0b1100_0000]);

    let buffer = decode(&data, &Unstoppable).unwrap();
    assert_eq!(buffer.row_stride(), 2);
    let expected = [1, 0, 1, 1, 0, 1, 0, 1, 0, 1];
    for (x, &bit) in expected.iter().enumerate() {
        assert_eq!(buffer.sample(x as u32, 0, 0), Some(bit), "x={x}");
    }
    for x in 0..10 {
        assert_eq!(buffer.sample(x, 1, 0), Some(1));
    }
}

#[test]
fn gray_subsampling_selects_even_offsets() {
    let data = gray5x5();
    let buffer = PnmDecoder::new(&data)
        .decode_with(&DecodeRequest::new().with_subsampling(2, 2), &Unstoppable)
        .unwrap();
    assert_eq!((buffer.width(), buffer.height()), (3, 3));
    assert_eq!(
        buffer.samples(),
        &Samples::U8(vec![0, 2, 4, 32, 34, 36, 64, 66, 68])
    );
}

#[test]
fn rgb_subsampling_selects_even_offsets() {
    let mut data = b"P6\n3 3\n255\n".to_vec();
    for y in 0..3u8 {
        for x in 0..3u8 {
            data.extend_from_slice(&[x, y, x + y]);
        }
    }
    let buffer = PnmDecoder::new(&data)
        .decode_with(&DecodeRequest::new().with_subsampling(2, 2), &Unstoppable)
        .unwrap();
    assert_eq!((buffer.width(), buffer.height()), (2, 2));
    assert_eq!(
        buffer.samples(),
        &Samples::U8(vec![0, 0, 0, 2, 0, 2, 0, 2, 2, 2, 2, 4])
    );
}

#[test]
fn bitmap_subsampling_packs_fresh_rows() {
    let mut data = b"P4\n5 5\n".to_vec();
    data.extend_from_slice(&[0b1010_1000; 5]);
    let buffer = PnmDecoder::new(&data)
        .decode_with(&DecodeRequest::new().with_subsampling(2, 2), &Unstoppable)
        .unwrap();
    assert_eq!((buffer.width(), buffer.height()), (3, 3));
    assert_eq!(buffer.samples(), &Samples::Bits(vec![0b1110_0000; 3]));
}

#[test]
fn ascii_subsampling_skips_tokens() {
    let data = b"P2\n3 1\n255\n1 2 3\n";
    let buffer = PnmDecoder::new(data)
        .decode_with(&DecodeRequest::new().with_subsampling(2, 1), &Unstoppable)
        .unwrap();
    assert_eq!(buffer.samples(), &Samples::U8(vec![1, 3]));
}

#[test]
fn clipped_region_decodes_in_place() {
    let data = gray5x5();
    let buffer = PnmDecoder::new(&data)
        .decode_with(
            &DecodeRequest::new().with_region(Region::new(1, 1, 3, 3)),
            &Unstoppable,
        )
        .unwrap();
    assert_eq!((buffer.width(), buffer.height()), (3, 3));
    assert_eq!(
        buffer.samples(),
        &Samples::U8(vec![17, 18, 19, 33, 34, 35, 49, 50, 51])
    );
}

#[test]
fn region_is_clipped_to_image_bounds() {
    let data = gray5x5();
    let buffer = PnmDecoder::new(&data)
        .decode_with(
            &DecodeRequest::new().with_region(Region::new(3, 3, 10, 10)),
            &Unstoppable,
        )
        .unwrap();
    assert_eq!((buffer.width(), buffer.height()), (2, 2));
    assert_eq!(buffer.samples(), &Samples::U8(vec![51, 52, 67, 68]));
}

#[test]
fn empty_region_is_rejected() {
    let data = gray5x5();
    let err = PnmDecoder::new(&data)
        .decode_with(
            &DecodeRequest::new().with_region(Region::new(9, 9, 2, 2)),
            &Unstoppable,
        )
        .unwrap_err();
    assert!(matches!(err, PnmError::UnsupportedLayout(_)));
}

#[test]
fn band_remap_and_subset() {
    let data = b"P6\n2 1\n255\n\x01\x02\x03\x04\x05\x06";
    let buffer = PnmDecoder::new(data)
        .decode_with(
            &DecodeRequest::new().with_bands(vec![2, 1, 0], vec![0, 1, 2]),
            &Unstoppable,
        )
        .unwrap();
    assert_eq!(buffer.samples(), &Samples::U8(vec![3, 2, 1, 6, 5, 4]));

    let buffer = PnmDecoder::new(data)
        .decode_with(
            &DecodeRequest::new().with_bands(vec![1], vec![0]),
            &Unstoppable,
        )
        .unwrap();
    assert_eq!(buffer.channels(), 1);
    assert_eq!(buffer.samples(), &Samples::U8(vec![2, 5]));
}

#[test]
fn band_index_out_of_range_is_rejected() {
    let data = b"P6\n1 1\n255\n\x01\x02\x03";
    let err = PnmDecoder::new(data)
        .decode_with(
            &DecodeRequest::new().with_bands(vec![3], vec![0]),
            &Unstoppable,
        )
        .unwrap_err();
    assert!(matches!(err, PnmError::UnsupportedLayout(_)));
}

#[test]
fn dest_offset_places_pixels_with_zero_border() {
    let data = b"P5\n2 1\n255\n\x07\x09";
    let buffer = PnmDecoder::new(data)
        .decode_with(&DecodeRequest::new().with_dest_offset(2, 1), &Unstoppable)
        .unwrap();
    assert_eq!((buffer.width(), buffer.height()), (4, 2));
    assert_eq!(buffer.samples(), &Samples::U8(vec![0, 0, 0, 0, 0, 0, 7, 9]));
}

#[test]
fn bitmap_dest_offset_is_bit_accurate() {
    let mut data = b"P4\n4 1\n".to_vec();
    data.push(0b1101_0000);
    let buffer = PnmDecoder::new(&data)
        .decode_with(&DecodeRequest::new().with_dest_offset(3, 0), &Unstoppable)
        .unwrap();
    assert_eq!((buffer.width(), buffer.height()), (7, 1));
    assert_eq!(buffer.samples(), &Samples::Bits(vec![0b0001_1010]));
    for x in 0..3 {
        assert_eq!(buffer.sample(x, 0, 0), Some(0));
    }
    assert_eq!(buffer.sample(3, 0, 0), Some(1));
    assert_eq!(buffer.sample(5, 0, 0), Some(0));
    assert_eq!(buffer.sample(6, 0, 0), Some(1));
}

#[test]
fn fast_path_matches_general_path() {
    // Passing an explicit identity band list forces the general path; the
    // bulk-read path must be byte-identical to it.
    let fixtures: [&[u8]; 3] = [
        b"P4\n10 2\n\xb5\x40\xff\xc0",
        b"P5\n3 2\n255\n\x01\x02\x03\x04\x05\x06",
        b"P6\n2 2\n255\n\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c",
    ];
    for data in fixtures {
        let fast = PnmDecoder::new(data).decode(&Unstoppable).unwrap();
        let channels = fast.channels();
        let identity: Vec<usize> = (0..channels).collect();
        let general = PnmDecoder::new(data)
            .decode_with(
                &DecodeRequest::new().with_bands(identity.clone(), identity),
                &Unstoppable,
            )
            .unwrap();
        assert_eq!(fast, general);
    }
}

#[test]
fn header_queries_are_idempotent() {
    let data = b"P5\n3 2\n255\n\x01\x02\x03\x04\x05\x06";
    let mut decoder = PnmDecoder::new(data);
    for _ in 0..3 {
        let header = decoder.read_header().unwrap();
        assert_eq!((header.width, header.height), (3, 2));
    }
    assert_eq!(decoder.width().unwrap(), 3);
    assert_eq!(decoder.variant().unwrap(), Variant::PgmRaw);
    // Pixel reads still start at the right offset afterwards.
    let buffer = decoder.decode(&Unstoppable).unwrap();
    assert_eq!(
        buffer.samples(),
        &Samples::U8(vec![1, 2, 3, 4, 5, 6])
    );
    // And again: decoding twice from one decoder works too.
    let again = decoder.decode(&Unstoppable).unwrap();
    assert_eq!(buffer, again);
}

#[test]
fn limits_are_enforced() {
    let data = gray5x5();
    let err = PnmDecoder::new(&data)
        .decode_with(
            &DecodeRequest::new().with_limits(Limits {
                max_pixels: Some(16),
                ..Limits::default()
            }),
            &Unstoppable,
        )
        .unwrap_err();
    assert!(matches!(err, PnmError::LimitExceeded(_)));

    let err = PnmDecoder::new(&data)
        .decode_with(
            &DecodeRequest::new().with_limits(Limits {
                max_memory_bytes: Some(8),
                ..Limits::default()
            }),
            &Unstoppable,
        )
        .unwrap_err();
    assert!(matches!(err, PnmError::LimitExceeded(_)));
}

#[test]
fn image_index_other_than_zero_is_rejected() {
    let data = b"P5\n1 1\n255\n\x00";
    let err = PnmDecoder::new(data)
        .decode_with(&DecodeRequest::new().with_image_index(1), &Unstoppable)
        .unwrap_err();
    assert!(matches!(err, PnmError::IndexOutOfRange(1)));
    assert_eq!(PnmDecoder::new(data).num_images(), 1);
}

#[test]
fn malformed_ascii_sample_is_an_error_not_zero() {
    let data = b"P2\n2 2\n255\n12 x 3 4\n";
    let err = PnmDecoder::new(data).decode(&Unstoppable).unwrap_err();
    assert!(matches!(err, PnmError::MalformedPixelData(_)));
}

#[test]
fn bitmap_ascii_sample_above_one_is_rejected() {
    let data = b"P1\n2 1\n0 2\n";
    let err = PnmDecoder::new(data).decode(&Unstoppable).unwrap_err();
    assert!(matches!(err, PnmError::MalformedPixelData(_)));
}

#[test]
fn truncated_raw_data_is_eof() {
    let data = b"P5\n4 4\n255\n\x01\x02";
    let err = PnmDecoder::new(data).decode(&Unstoppable).unwrap_err();
    assert!(matches!(err, PnmError::UnexpectedEof));
}

#[test]
fn raw_max_value_above_byte_range_is_clamped() {
    // The raw grammar has no 16-bit samples; the declared maxValue is
    // clamped to the byte container.
    let data = b"P5\n2 1\n65535\n\xaa\xbb";
    let mut decoder = PnmDecoder::new(data);
    assert_eq!(decoder.max_value().unwrap(), 65535);
    let buffer = decoder.decode(&Unstoppable).unwrap();
    assert_eq!(buffer.samples(), &Samples::U8(vec![0xAA, 0xBB]));
}

#[test]
fn progress_is_monotonic_and_reaches_one_hundred() {
    let data = gray5x5();
    let seen = RefCell::new(Vec::new());
    let callback = |p: f32| seen.borrow_mut().push(p);
    PnmDecoder::new(&data)
        .decode_with(
            &DecodeRequest::new()
                .with_subsampling(1, 2)
                .on_progress(&callback),
            &Unstoppable,
        )
        .unwrap();
    let seen = seen.into_inner();
    assert_eq!(seen.len(), 3);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().copied(), Some(100.0));
}

#[test]
fn decode_cancels_between_rows() {
    let data = gray5x5();
    // Subsampling forces the row-by-row path; three output rows mean three
    // checks, and the budget runs out on the third.
    let stop = StopAfter::new(2);
    let err = PnmDecoder::new(&data)
        .decode_with(&DecodeRequest::new().with_subsampling(1, 2), &stop)
        .unwrap_err();
    assert!(matches!(err, PnmError::Cancelled(_)));

    // With budget to spare the same decode succeeds.
    let buffer = PnmDecoder::new(&data)
        .decode_with(&DecodeRequest::new().with_subsampling(1, 2), &StopAfter::new(8))
        .unwrap();
    assert_eq!(buffer.height(), 3);
}

#[test]
fn encode_cancels_between_rows() {
    let pixels: Vec<u8> = (0..16).collect();
    let source = SampleSource::gray8(&pixels, 4, 4);
    let stop = StopAfter::new(2);
    let err = PnmEncoder::new()
        .encode(&source, &EncodeRequest::new(), &stop)
        .unwrap_err();
    assert!(matches!(err, PnmError::Cancelled(_)));
}

#[test]
fn encoder_region_and_grid_offset() {
    let mut pixels = Vec::new();
    for y in 0..4u8 {
        for x in 0..4u8 {
            pixels.push(y * 4 + x);
        }
    }
    let source = SampleSource::gray8(&pixels, 4, 4);

    let encoded = PnmEncoder::new()
        .encode(
            &source,
            &EncodeRequest::new().with_region(Region::new(1, 1, 2, 2)),
            &Unstoppable,
        )
        .unwrap();
    let buffer = decode(&encoded, &Unstoppable).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (2, 2));
    assert_eq!(buffer.samples(), &Samples::U8(vec![5, 6, 9, 10]));

    let encoded = PnmEncoder::new()
        .encode(
            &source,
            &EncodeRequest::new().with_grid_offset(1, 1),
            &Unstoppable,
        )
        .unwrap();
    let buffer = decode(&encoded, &Unstoppable).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (3, 3));
    assert_eq!(
        buffer.samples(),
        &Samples::U8(vec![5, 6, 7, 9, 10, 11, 13, 14, 15])
    );
}

#[test]
fn encoder_subsampling_and_band_subset() {
    let mut pixels = Vec::new();
    for y in 0..4u8 {
        for x in 0..4u8 {
            pixels.extend_from_slice(&[x, y, x + y]);
        }
    }
    let source = SampleSource::rgb8(&pixels, 4, 4);

    let encoded = PnmEncoder::new()
        .encode(
            &source,
            &EncodeRequest::new().with_subsampling(2, 2),
            &Unstoppable,
        )
        .unwrap();
    let buffer = decode(&encoded, &Unstoppable).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (2, 2));
    assert_eq!(
        buffer.samples(),
        &Samples::U8(vec![0, 0, 0, 2, 0, 2, 0, 2, 2, 2, 2, 4])
    );

    // A single selected band writes a graymap.
    let encoded = PnmEncoder::new()
        .encode(
            &source,
            &EncodeRequest::new().with_source_bands(vec![1]),
            &Unstoppable,
        )
        .unwrap();
    assert_eq!(encoded[1], b'5');
    let buffer = decode(&encoded, &Unstoppable).unwrap();
    assert_eq!(buffer.channels(), 1);
    assert_eq!(buffer.sample(2, 3, 0), Some(3));
}

#[test]
fn ascii_output_wraps_long_lines() {
    let pixels: Vec<u8> = (0..40).collect();
    let encoded = PnmEncoder::new()
        .encode(
            &SampleSource::gray8(&pixels, 40, 1),
            &EncodeRequest::new().with_raw(false),
            &Unstoppable,
        )
        .unwrap();
    // No line longer than 16 samples' worth of tokens.
    let text = std::str::from_utf8(&encoded).unwrap();
    let longest = text
        .lines()
        .filter(|l| !l.starts_with(['P', '#']))
        .map(|l| l.split_whitespace().count())
        .max()
        .unwrap();
    assert!(longest <= 16, "longest line had {longest} tokens");
    assert_eq!(
        decode(&encoded, &Unstoppable).unwrap().samples(),
        &Samples::U8(pixels)
    );
}
