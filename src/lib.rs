//! # zenpnm
//!
//! Decoder and encoder for the PNM family of raster formats: PBM, PGM and
//! PPM, each in ASCII and raw encodings (P1 through P6).
//!
//! ## Features
//!
//! - Partial decode: region clipping, subsampling strides, band selection
//!   and destination placement, for all six variants
//! - Idempotent header access: width/height/metadata may be queried any
//!   number of times before pixel reads
//! - Encoding with automatic variant selection from the sample layout, raw
//!   output falling back to ASCII above 8 bits per sample, and round-trip
//!   comment preservation
//! - Cooperative row-granular cancellation via [`enough::Stop`] and
//!   per-row progress callbacks
//!
//! ## Non-Goals
//!
//! - PAM (P7) and PFM — only the six classic variants
//! - Compression or color management
//!
//! ## Usage
//!
//! ```no_run
//! use zenpnm::{DecodeRequest, PnmDecoder, PnmEncoder, EncodeRequest};
//! use enough::Unstoppable;
//!
//! let data: &[u8] = &[]; // your PNM bytes
//!
//! // Probe without decoding pixels
//! let header = zenpnm::probe(data)?;
//! println!("{}x{} {:?}", header.width, header.height, header.variant);
//!
//! // Decode a clipped, subsampled region
//! let mut decoder = PnmDecoder::new(data);
//! let buffer = decoder.decode_with(
//!     &DecodeRequest::new()
//!         .with_region(zenpnm::Region::new(0, 0, 64, 64))
//!         .with_subsampling(2, 2),
//!     &Unstoppable,
//! )?;
//!
//! // Re-encode, keeping comments and the raw/ASCII preference
//! let metadata = decoder.metadata()?.clone();
//! let encoded = PnmEncoder::new()
//!     .with_metadata(&metadata)
//!     .encode(&buffer.as_source(), &EncodeRequest::new(), &Unstoppable)?;
//! # let _ = encoded;
//! # Ok::<(), zenpnm::PnmError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod cursor;
mod decode;
mod encode;
mod error;
mod header;
mod limits;
mod metadata;
mod sample;

// Re-exports
pub use decode::{decode, probe, DecodeRequest, PnmDecoder};
pub use encode::{encode, EncodeRequest, PnmEncoder};
pub use enough::{Stop, Unstoppable};
pub use error::PnmError;
pub use header::{Header, SampleType, Variant};
pub use limits::Limits;
pub use metadata::{MetaField, PnmMetadata};
pub use sample::{Region, SampleBuffer, SampleData, SampleSource, Samples};
