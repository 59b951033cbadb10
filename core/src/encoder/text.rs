// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Text-safe format, base64 staged copy with `p{i}of{n} ` part headers

use std::{
    collections::BTreeMap,
    io::{Read, Write},
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine};

use super::{parse_index, ChunkCodec, Chunked, Format, PartDecoder, Staging};
use crate::Error;

/// Per-part header overhead
pub const MAX_PREFIX_LEN: usize = 8;

/// Input block size, a multiple of 3 so blocks encode without padding
const BLOCK_LEN: usize = 3 * 256;

/// Base64 chunked encoder
pub struct TextEncoder {
    inner: Chunked,
}

impl TextEncoder {
    pub fn new(r: &mut dyn Read, part_len: usize, staging_dir: Option<&Path>) -> Result<Self, Error> {
        let mut staging = Staging::create(staging_dir, "b64")?;

        let mut buff = [0u8; BLOCK_LEN];
        loop {
            let n = read_block(r, &mut buff)?;
            if n == 0 {
                break;
            }

            staging
                .write_all(STANDARD.encode(&buff[..n]).as_bytes())
                .map_err(|e| Error::storage("write staging", e))?;

            if n < BLOCK_LEN {
                break;
            }
        }

        Ok(Self {
            inner: Chunked::new(staging, part_len, MAX_PREFIX_LEN),
        })
    }
}

impl ChunkCodec for TextEncoder {
    fn format(&self) -> Format {
        Format::Base64
    }

    fn len(&self) -> usize {
        self.inner.count
    }

    fn is_empty(&self) -> bool {
        self.inner.staging.is_empty()
    }

    fn part_len(&self) -> usize {
        self.inner.part_len
    }

    fn get(&mut self, index: usize) -> Result<Vec<u8>, Error> {
        let i = self.inner.index(index);
        let data = self.inner.slice(i)?;

        let mut p = format!("p{}of{} ", i + 1, self.inner.count).into_bytes();
        p.extend_from_slice(&data);
        Ok(p)
    }

    fn get_full(&mut self, max_len: usize) -> Result<Vec<u8>, Error> {
        if (max_len as u64) < self.inner.staging.len() {
            return Ok(vec![]);
        }
        self.inner.staging.read_all()
    }
}

/// Fill `buff` from the stream, short only at end of stream
pub(crate) fn read_block<R: Read + ?Sized>(r: &mut R, buff: &mut [u8]) -> Result<usize, Error> {
    let mut n = 0;
    while n < buff.len() {
        match r.read(&mut buff[n..]) {
            Ok(0) => break,
            Ok(v) => n += v,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::storage("read response", e)),
        }
    }
    Ok(n)
}

/// Base64 chunked decoder
#[derive(Default)]
pub struct TextDecoder {
    count: Option<usize>,
    parts: BTreeMap<usize, String>,
}

impl PartDecoder for TextDecoder {
    fn receive(&mut self, part: &[u8]) -> Result<bool, Error> {
        let s = std::str::from_utf8(part).map_err(|e| Error::InvalidPart(e.to_string()))?;
        let s = s.trim_end_matches(['\r', '\n']);

        let (i, n, data) = parse_index(s, "p", "of", ' ')
            .ok_or_else(|| Error::InvalidPart("missing pNofM header".into()))?;

        if i == 0 || i > n {
            return Err(Error::InvalidPart(format!("index {i} out of range")));
        }

        match self.count {
            Some(c) if c != n => {
                return Err(Error::InvalidPart(format!("part count {n} != {c}")));
            }
            _ => self.count = Some(n),
        }

        self.parts.insert(i - 1, data);

        Ok(self.is_complete())
    }

    fn is_complete(&self) -> bool {
        self.count == Some(self.parts.len())
    }

    fn result(&self) -> Result<Vec<u8>, Error> {
        if !self.is_complete() {
            return Err(Error::InvalidPart("missing parts".into()));
        }

        let s: String = self.parts.values().map(|s| s.as_str()).collect();
        STANDARD
            .decode(s)
            .map_err(|e| Error::InvalidPart(e.to_string()))
    }
}
