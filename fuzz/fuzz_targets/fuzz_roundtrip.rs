#![no_main]
use libfuzzer_sys::fuzz_target;
use zenpnm::*;

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(16 << 20),
        ..Limits::default()
    };
    let mut decoder = PnmDecoder::new(data);
    let Ok(decoded) = decoder.decode_with(
        &DecodeRequest::new().with_limits(limits),
        &enough::Unstoppable,
    ) else {
        return;
    };
    let Ok(metadata) = decoder.metadata() else {
        return;
    };

    // Re-encode in the same variant; decoding again must produce the same
    // sample grid.
    let metadata = metadata.clone();
    let Ok(reencoded) = PnmEncoder::new().with_metadata(&metadata).encode(
        &decoded.as_source(),
        &EncodeRequest::new(),
        &enough::Unstoppable,
    ) else {
        return;
    };
    let decoded2 = match decode(&reencoded, &enough::Unstoppable) {
        Ok(d) => d,
        Err(e) => panic!("re-encoded data failed to decode: {e}"),
    };

    assert_eq!(decoded.width(), decoded2.width());
    assert_eq!(decoded.height(), decoded2.height());
    assert_eq!(decoded.channels(), decoded2.channels());
    // Sample-wise comparison: the container may widen (a raw stream with an
    // over-declared maxValue re-encodes as ASCII), but values must match.
    for y in 0..decoded.height() {
        for x in 0..decoded.width() {
            for band in 0..decoded.channels() {
                assert_eq!(
                    decoded.sample(x, y, band),
                    decoded2.sample(x, y, band),
                    "roundtrip sample mismatch at ({x}, {y}, {band})"
                );
            }
        }
    }
});
