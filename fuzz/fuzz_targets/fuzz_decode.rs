#![no_main]
use libfuzzer_sys::fuzz_target;
use zenpnm::{DecodeRequest, Limits, PnmDecoder};

fuzz_target!(|data: &[u8]| {
    // Header probing must never panic
    let _ = zenpnm::probe(data);

    // Bounded decode must never panic
    let limits = Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(16 << 20),
        ..Limits::default()
    };
    let _ = PnmDecoder::new(data).decode_with(
        &DecodeRequest::new().with_limits(limits),
        &enough::Unstoppable,
    );
});
