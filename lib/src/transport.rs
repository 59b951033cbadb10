// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Chunked transport helpers
//!
//! Parts are exchanged as text lines, `plain` parts are hex encoded so
//! binary payloads survive line based I/O.

use std::path::Path;

use log::{debug, trace};

use qrsign_core::encoder::{decoder, encoder, Format};

use crate::Error;

/// Encode `data` into transport parts.
///
/// `count` defaults to the encoder part count, infinite (fountain) encoders
/// produce as many parts as requested.
pub fn encode_parts(
    format: Format,
    data: &[u8],
    part_len: usize,
    count: Option<usize>,
    staging_dir: &Path,
) -> Result<Vec<String>, Error> {
    let mut e = encoder(format, &mut &data[..], part_len, Some(staging_dir))?;

    let n = count.unwrap_or_else(|| e.len());

    debug!(
        "encoding {} bytes as {} {} parts ({} data bytes per part)",
        data.len(),
        n,
        format,
        e.part_len()
    );

    let parts = e.take_parts(n)?;

    parts.into_iter().map(|p| render_part(format, p)).collect()
}

/// Render an encoded part as a text line
pub fn render_part(format: Format, part: Vec<u8>) -> Result<String, Error> {
    match format {
        Format::Plain => Ok(hex::encode(part)),
        _ => String::from_utf8(part).map_err(|e| Error::InvalidPart(e.to_string())),
    }
}

/// Reassemble a payload from transport parts, stopping once complete
pub fn decode_parts<I, S>(format: Format, lines: I) -> Result<Vec<u8>, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut dec = decoder(format);
    let mut received = 0;

    for l in lines {
        let l = l.as_ref().trim();
        if l.is_empty() {
            continue;
        }

        let part = match format {
            Format::Plain => hex::decode(l).map_err(|e| Error::InvalidPart(e.to_string()))?,
            _ => l.as_bytes().to_vec(),
        };

        let complete = dec.receive(&part)?;
        received += 1;

        trace!("part {}: complete: {}", received, complete);

        // Plain parts carry no count, read to the end of input
        if complete && format != Format::Plain {
            break;
        }
    }

    if !dec.is_complete() {
        return Err(Error::Incomplete(received));
    }

    Ok(dec.result()?)
}
