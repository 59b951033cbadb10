// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Chunk codecs for the visual transport
//!
//! Encoders stage a (possibly transformed) copy of the response stream, then
//! serve display-sized parts from the staged copy. Part indexing is modular so
//! the display loop may cycle indefinitely.
//!
//! | format     | part                                         |
//! |------------|----------------------------------------------|
//! | `plain`    | raw slice                                    |
//! | `base64`   | `p{i}of{n} {data}`                           |
//! | `legacy`   | `UR:BYTES/{i}OF{n}/{tag}/{data}`             |
//! | `fountain` | `ur:crypto-psbt/{seq}-{len}/{bytewords}`     |
//!
//! Each format has a matching decoder accepting parts in any order.

use std::{io::Read, path::Path};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::Error;

pub mod bc32;
pub mod fountain;
mod legacy;
mod plain;
mod staging;
mod text;

pub use legacy::{LegacyDecoder, LegacyEncoder};
pub use plain::{PlainDecoder, PlainEncoder};
pub use staging::Staging;
pub use text::{TextDecoder, TextEncoder};

pub use fountain::{FountainDecoder, FountainEncoder};

/// Transport formats
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    Plain,
    Base64,
    Legacy,
    Fountain,
}

/// Part encoder over a staged response
pub trait ChunkCodec: Send {
    /// Transport format
    fn format(&self) -> Format;

    /// Number of parts, a hint only for infinite encoders
    fn len(&self) -> usize;

    /// Check whether the staged payload is empty
    fn is_empty(&self) -> bool;

    /// Whether parts may be generated without bound
    fn is_infinite(&self) -> bool {
        false
    }

    /// Adjusted data bytes per part
    fn part_len(&self) -> usize;

    /// Fetch part `index`, finite encoders wrap modulo [ChunkCodec::len]
    fn get(&mut self, index: usize) -> Result<Vec<u8>, Error>;

    /// Fetch the whole payload as one block, empty when longer than `max_len`
    fn get_full(&mut self, max_len: usize) -> Result<Vec<u8>, Error>;

    /// Fetch the first `count` parts
    fn take_parts(&mut self, count: usize) -> Result<Vec<Vec<u8>>, Error> {
        (0..count).map(|i| self.get(i)).collect()
    }
}

/// Part decoder
pub trait PartDecoder {
    /// Accept a part, returning whether the payload is complete
    fn receive(&mut self, part: &[u8]) -> Result<bool, Error>;

    /// Check whether all parts have been received
    fn is_complete(&self) -> bool;

    /// Reassemble the payload
    fn result(&self) -> Result<Vec<u8>, Error>;
}

/// Create an encoder for `format` over the provided stream
pub fn encoder(
    format: Format,
    r: &mut dyn Read,
    part_len: usize,
    staging_dir: Option<&Path>,
) -> Result<Box<dyn ChunkCodec>, Error> {
    let e: Box<dyn ChunkCodec> = match format {
        Format::Plain => Box::new(PlainEncoder::new(r, part_len, staging_dir)?),
        Format::Base64 => Box::new(TextEncoder::new(r, part_len, staging_dir)?),
        Format::Legacy => Box::new(LegacyEncoder::new(r, part_len, staging_dir)?),
        Format::Fountain => Box::new(FountainEncoder::new(r, part_len, staging_dir)?),
    };

    #[cfg(feature = "log")]
    log::debug!(
        "{} encoder: {} parts of {} bytes",
        format,
        e.len(),
        e.part_len()
    );

    Ok(e)
}

/// Create a decoder for `format`
pub fn decoder(format: Format) -> Box<dyn PartDecoder> {
    match format {
        Format::Plain => Box::new(PlainDecoder::default()),
        Format::Base64 => Box::new(TextDecoder::default()),
        Format::Legacy => Box::new(LegacyDecoder::default()),
        Format::Fountain => Box::new(FountainDecoder::default()),
    }
}

/// Adjust a requested part length for per-part prefix overhead, then balance
/// parts so the last part is not degenerate
pub fn fit_part_len(total: u64, requested: usize, max_prefix: usize) -> usize {
    let mut p = requested.max(1);
    if p > 2 * max_prefix {
        p -= max_prefix;
    }

    if total == 0 {
        return p;
    }

    let count = div_ceil(total, p as u64);
    div_ceil(total, count) as usize
}

/// Number of parts needed for `total` bytes, at least one
pub fn part_count(total: u64, part_len: usize) -> usize {
    div_ceil(total, part_len.max(1) as u64).max(1) as usize
}

pub(crate) fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Staged copy served as fixed size slices
pub(crate) struct Chunked {
    pub staging: Staging,
    pub part_len: usize,
    pub count: usize,
}

impl Chunked {
    pub fn new(staging: Staging, requested: usize, max_prefix: usize) -> Self {
        let part_len = fit_part_len(staging.len(), requested, max_prefix);
        let count = part_count(staging.len(), part_len);

        Self {
            staging,
            part_len,
            count,
        }
    }

    /// Wrapped part index
    pub fn index(&self, i: usize) -> usize {
        i % self.count
    }

    /// Slice for part `i`
    pub fn slice(&mut self, i: usize) -> Result<Vec<u8>, Error> {
        let offset = (self.index(i) * self.part_len) as u64;
        self.staging.slice(offset, self.part_len)
    }
}

/// CBOR byte string header (major type 2) for a `len` byte payload
pub(crate) fn cbor_bytes_header(len: u64) -> Vec<u8> {
    const MAJOR: u8 = 2 << 5;

    match len {
        0..=23 => vec![MAJOR | len as u8],
        24..=0xff => vec![MAJOR | 24, len as u8],
        0x100..=0xffff => [&[MAJOR | 25][..], &(len as u16).to_be_bytes()].concat(),
        0x1_0000..=0xffff_ffff => [&[MAJOR | 26][..], &(len as u32).to_be_bytes()].concat(),
        _ => [&[MAJOR | 27][..], &len.to_be_bytes()].concat(),
    }
}

/// Unwrap a CBOR byte string
pub(crate) fn cbor_unwrap_bytes(data: &[u8]) -> Result<Vec<u8>, Error> {
    match serde_cbor::from_slice(data) {
        Ok(serde_cbor::Value::Bytes(b)) => Ok(b),
        Ok(_) => Err(Error::InvalidPart("expected CBOR byte string".into())),
        Err(e) => Err(Error::InvalidPart(e.to_string())),
    }
}

/// Split a `{prefix}{a}{sep}{b}` index header, returning `(a, b, rest)`
pub(crate) fn parse_index(
    s: &str,
    prefix: &str,
    sep: &str,
    end: char,
) -> Option<(usize, usize, String)> {
    let s = s.strip_prefix(prefix)?;
    let (head, rest) = s.split_once(end)?;
    let (a, b) = head.split_once(sep)?;

    Some((a.parse().ok()?, b.parse().ok()?, rest.to_string()))
}
