// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Legacy single-tag format for older scanners
//!
//! The staged copy is the bc32 encoding of the payload wrapped in a CBOR byte
//! string, the tag is the bc32 encoding of `SHA256(cbor)`. Every part repeats
//! the full header so this is only suitable for small payloads.

use std::{
    collections::BTreeMap,
    io::{Read, Write},
    path::Path,
};

use sha2::{Digest, Sha256};

use super::{
    bc32::{self, Bc32Writer},
    cbor_bytes_header, cbor_unwrap_bytes,
    text::read_block,
    ChunkCodec, Chunked, Format, PartDecoder, Staging,
};
use crate::Error;

/// Per-part header overhead
pub const MAX_PREFIX_LEN: usize = 73;

const PREFIX: &str = "UR:BYTES/";

/// Legacy format encoder
pub struct LegacyEncoder {
    inner: Chunked,
    tag: String,
}

impl LegacyEncoder {
    pub fn new(r: &mut dyn Read, part_len: usize, staging_dir: Option<&Path>) -> Result<Self, Error> {
        // CBOR framing needs the payload length up front
        let mut raw = Staging::create(staging_dir, "raw")?;
        let n = raw.fill(r)?;

        let mut staging = Staging::create(staging_dir, "bc32")?;

        let header = cbor_bytes_header(n);
        let mut h = Sha256::new().chain_update(&header);

        let mut w = Bc32Writer::new(&mut staging);
        w.write_all(&header)
            .map_err(|e| Error::storage("write staging", e))?;

        let mut rd = raw.reader()?;
        let mut buff = [0u8; 512];
        loop {
            let n = read_block(&mut rd, &mut buff)?;
            if n == 0 {
                break;
            }

            h.update(&buff[..n]);
            w.write_all(&buff[..n])
                .map_err(|e| Error::storage("write staging", e))?;
        }

        w.finish().map_err(|e| Error::storage("write staging", e))?;

        let tag = bc32::encode(&h.finalize());

        Ok(Self {
            inner: Chunked::new(staging, part_len, MAX_PREFIX_LEN),
            tag,
        })
    }

    /// Checksum tag repeated in each part
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl ChunkCodec for LegacyEncoder {
    fn format(&self) -> Format {
        Format::Legacy
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
        if self.inner.count == 1 {
            let mut p = PREFIX.as_bytes().to_vec();
            p.extend(self.inner.staging.read_all()?);
            return Ok(p);
        }

        let i = self.inner.index(index);
        let data = self.inner.slice(i)?;

        let mut p = format!("{}{}OF{}/{}/", PREFIX, i + 1, self.inner.count, self.tag).into_bytes();
        p.extend_from_slice(&data);
        Ok(p)
    }

    fn get_full(&mut self, max_len: usize) -> Result<Vec<u8>, Error> {
        if (max_len as u64) < self.inner.staging.len() + PREFIX.len() as u64 {
            return Ok(vec![]);
        }

        let mut p = PREFIX.as_bytes().to_vec();
        p.extend(self.inner.staging.read_all()?);
        Ok(p)
    }
}

/// Legacy format decoder
#[derive(Default)]
pub struct LegacyDecoder {
    count: Option<usize>,
    tag: Option<String>,
    parts: BTreeMap<usize, String>,
}

impl PartDecoder for LegacyDecoder {
    fn receive(&mut self, part: &[u8]) -> Result<bool, Error> {
        let s = std::str::from_utf8(part).map_err(|e| Error::InvalidPart(e.to_string()))?;
        let s = s.trim();

        let body = match s.get(..PREFIX.len()) {
            Some(p) if p.eq_ignore_ascii_case(PREFIX) => &s[PREFIX.len()..],
            _ => return Err(Error::InvalidPart("missing UR:BYTES prefix".into())),
        };

        let fields: Vec<&str> = body.split('/').collect();

        let (i, n, tag, data) = match fields[..] {
            [data] => (1, 1, None, data),
            [index, tag, data] => {
                let index = index.to_ascii_uppercase();
                let (i, n) = index
                    .split_once("OF")
                    .and_then(|(i, n)| Some((i.parse::<usize>().ok()?, n.parse::<usize>().ok()?)))
                    .ok_or_else(|| Error::InvalidPart(format!("invalid index '{index}'")))?;
                (i, n, Some(tag.to_ascii_lowercase()), data)
            }
            _ => return Err(Error::InvalidPart("unexpected field count".into())),
        };

        if i == 0 || i > n {
            return Err(Error::InvalidPart(format!("index {i} out of range")));
        }

        if self.count.map(|c| c != n).unwrap_or(false)
            || (self.tag.is_some() && tag.is_some() && self.tag != tag)
        {
            return Err(Error::InvalidPart("part belongs to another payload".into()));
        }

        self.count = Some(n);
        if tag.is_some() {
            self.tag = tag;
        }
        self.parts.insert(i - 1, data.to_ascii_lowercase());

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
        let cbor = bc32::decode(&s)?;

        if let Some(tag) = &self.tag {
            let calc: [u8; 32] = Sha256::digest(&cbor).into();
            if &bc32::encode(&calc) != tag {
                return Err(Error::InvalidPart("checksum tag mismatch".into()));
            }
        }

        cbor_unwrap_bytes(&cbor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(data: &[u8], part_len: usize) -> (tempfile::TempDir, LegacyEncoder) {
        let d = tempfile::tempdir().unwrap();
        let e = LegacyEncoder::new(&mut &data[..], part_len, Some(d.path())).unwrap();
        (d, e)
    }

    #[test]
    fn single_part() {
        let (_d, mut e) = encode(b"hi", 300);

        assert_eq!(e.len(), 1);

        let p = e.get(0).unwrap();
        assert!(p.starts_with(b"UR:BYTES/"));
        assert!(!p[9..].contains(&b'/'));
        assert_eq!(e.get(3).unwrap(), p);
    }

    #[test]
    fn multi_part_headers() {
        let data = vec![0x42u8; 500];
        let (_d, mut e) = encode(&data, 200);

        let tag = e.tag().to_string();
        assert_eq!(tag.len(), 58);

        let n = e.len();
        assert!(n > 1);

        let p = String::from_utf8(e.get(0).unwrap()).unwrap();
        assert!(p.starts_with(&format!("UR:BYTES/1OF{n}/{tag}/")));
    }

    #[test]
    fn full_needs_prefix_room() {
        let (_d, mut e) = encode(b"abc", 300);
        let staged = e.inner.staging.len() as usize;

        assert!(e.get_full(staged + 8).unwrap().is_empty());
        assert!(!e.get_full(staged + 9).unwrap().is_empty());
    }

    #[test]
    fn decode_any_order() {
        let data: Vec<u8> = (0..700u32).map(|i| (i % 256) as u8).collect();
        let (_d, mut e) = encode(&data, 200);

        let mut parts = e.take_parts(e.len()).unwrap();
        parts.rotate_left(2);

        let mut dec = LegacyDecoder::default();
        for p in &parts {
            dec.receive(p).unwrap();
        }

        assert_eq!(dec.result().unwrap(), data);
    }

    #[test]
    fn decode_rejects_tampered_tag() {
        let data = vec![7u8; 300];
        let (_d, mut e) = encode(&data, 200);
        let tag = e.tag().to_string();

        let mut dec = LegacyDecoder::default();
        for p in e.take_parts(e.len()).unwrap() {
            let s = String::from_utf8(p).unwrap().replace(&tag, &"q".repeat(tag.len()));
            dec.receive(s.as_bytes()).unwrap();
        }

        assert!(matches!(dec.result(), Err(Error::InvalidPart(_))));
    }
}
