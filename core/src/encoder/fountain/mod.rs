// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Fountain coded multi-part format
//!
//! The message (the payload as a CBOR byte string) is split into `seq_len`
//! equal fragments. Parts `1..=seq_len` carry single fragments, later parts
//! carry the XOR of a pseudo-randomly chosen fragment set seeded from the
//! sequence number and message checksum, so the encoder never runs out of
//! parts and a scanner may start at any point.
//!
//! Parts render as `ur:crypto-psbt/{seq}-{seq_len}/{bytewords}` where the
//! body is the minimal bytewords encoding of
//! `[seq, seq_len, message_len, checksum, fragment]`.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{Read, Write},
    path::Path,
};

use serde_cbor::Value;

use super::{
    cbor_bytes_header, cbor_unwrap_bytes, div_ceil, fit_part_len, text::read_block, ChunkCodec,
    Format, PartDecoder, Staging,
};
use crate::Error;

pub mod bytewords;
mod sampler;
mod xoshiro;

use bytewords::CRC32;
pub use sampler::Sampler;
pub use xoshiro::Xoshiro256;

/// Per-part header overhead
pub const MAX_PREFIX_LEN: usize = 22;

/// Smallest fragment the encoder will produce for multi-part messages
pub const MIN_FRAGMENT_LEN: usize = 10;

/// Largest message accepted by the decoder
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

const UR_TYPE: &str = "ur:crypto-psbt/";

/// Pick the fragment length giving the fewest fragments no longer than `max_len`
pub fn nominal_fragment_len(message_len: usize, min_len: usize, max_len: usize) -> usize {
    let max_count = message_len / min_len.max(1);

    let mut fragment_len = 0;
    for count in 1..=max_count {
        fragment_len = div_ceil(message_len as u64, count as u64) as usize;
        if fragment_len <= max_len {
            break;
        }
    }

    if fragment_len == 0 {
        message_len
    } else {
        fragment_len
    }
}

/// Fragment indexes mixed into part `seq_num`
pub fn choose_fragments(seq_num: u32, seq_len: usize, checksum: u32) -> BTreeSet<usize> {
    if seq_num as usize <= seq_len {
        return BTreeSet::from([seq_num as usize - 1]);
    }

    let mut seed = [0u8; 8];
    seed[..4].copy_from_slice(&seq_num.to_be_bytes());
    seed[4..].copy_from_slice(&checksum.to_be_bytes());

    let mut rng = Xoshiro256::from_seed(&seed);

    // Degree follows a 1/i distribution
    let weights: Vec<f64> = (1..=seq_len).map(|i| 1.0 / i as f64).collect();
    let degree = Sampler::new(&weights).next(&mut rng) + 1;

    let mut remaining: Vec<usize> = (0..seq_len).collect();
    let mut chosen = BTreeSet::new();
    while chosen.len() < degree {
        let i = rng.next_int(0, remaining.len() as u64 - 1) as usize;
        chosen.insert(remaining.remove(i));
    }

    chosen
}

fn xor_into(a: &mut [u8], b: &[u8]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x ^= y;
    }
}

/// Fountain encoder over a staged message
pub struct FountainEncoder {
    staging: Staging,
    payload_len: u64,
    message_len: usize,
    fragment_len: usize,
    seq_len: usize,
    checksum: u32,
}

impl FountainEncoder {
    pub fn new(r: &mut dyn Read, part_len: usize, staging_dir: Option<&Path>) -> Result<Self, Error> {
        let mut raw = Staging::create(staging_dir, "raw")?;
        let payload_len = raw.fill(r)?;

        let mut staging = Staging::create(staging_dir, "msg")?;

        let header = cbor_bytes_header(payload_len);
        let mut crc = CRC32.digest();
        crc.update(&header);

        staging
            .write_all(&header)
            .map_err(|e| Error::storage("write staging", e))?;

        let mut rd = raw.reader()?;
        let mut buff = [0u8; 512];
        loop {
            let n = read_block(&mut rd, &mut buff)?;
            if n == 0 {
                break;
            }

            crc.update(&buff[..n]);
            staging
                .write_all(&buff[..n])
                .map_err(|e| Error::storage("write staging", e))?;
        }

        let message_len = staging.len() as usize;
        let max_len = fit_part_len(message_len as u64, part_len, MAX_PREFIX_LEN);
        let fragment_len = nominal_fragment_len(message_len, MIN_FRAGMENT_LEN, max_len);
        let seq_len = div_ceil(message_len as u64, fragment_len as u64) as usize;

        Ok(Self {
            staging,
            payload_len,
            message_len,
            fragment_len,
            seq_len,
            checksum: crc.finalize(),
        })
    }

    /// Message checksum
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    fn fragment(&mut self, i: usize) -> Result<Vec<u8>, Error> {
        let mut f = self.staging.slice((i * self.fragment_len) as u64, self.fragment_len)?;
        f.resize(self.fragment_len, 0);
        Ok(f)
    }

    /// Build the CBOR body for part `seq_num`
    fn part_body(&mut self, seq_num: u32) -> Result<Vec<u8>, Error> {
        let mut data = vec![0u8; self.fragment_len];
        for i in choose_fragments(seq_num, self.seq_len, self.checksum) {
            let f = self.fragment(i)?;
            xor_into(&mut data, &f);
        }

        let v = Value::Array(vec![
            Value::Integer(seq_num as i128),
            Value::Integer(self.seq_len as i128),
            Value::Integer(self.message_len as i128),
            Value::Integer(self.checksum as i128),
            Value::Bytes(data),
        ]);

        serde_cbor::to_vec(&v).map_err(|e| Error::InvalidPart(e.to_string()))
    }
}

impl ChunkCodec for FountainEncoder {
    fn format(&self) -> Format {
        Format::Fountain
    }

    fn len(&self) -> usize {
        self.seq_len
    }

    fn is_empty(&self) -> bool {
        self.payload_len == 0
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn part_len(&self) -> usize {
        self.fragment_len
    }

    /// Fetch part `index`, sequence numbers are 32-bit so `index` must be
    /// below `u32::MAX`
    fn get(&mut self, index: usize) -> Result<Vec<u8>, Error> {
        let seq_num = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .ok_or_else(|| Error::InvalidPart(format!("part index {index} out of range")))?;
        let body = self.part_body(seq_num)?;

        let p = format!(
            "{}{}-{}/{}",
            UR_TYPE,
            seq_num,
            self.seq_len,
            bytewords::encode_minimal(&body)
        );
        Ok(p.into_bytes())
    }

    fn get_full(&mut self, _max_len: usize) -> Result<Vec<u8>, Error> {
        Ok(vec![])
    }
}

/// Message parameters shared by all parts
#[derive(Copy, Clone, PartialEq, Debug)]
struct Params {
    seq_len: usize,
    message_len: usize,
    checksum: u32,
    fragment_len: usize,
}

/// Fountain decoder, accepts simple and mixed parts in any order
#[derive(Default)]
pub struct FountainDecoder {
    params: Option<Params>,
    simple: BTreeMap<usize, Vec<u8>>,
    mixed: Vec<(BTreeSet<usize>, Vec<u8>)>,
}

fn as_uint(v: &Value) -> Option<u64> {
    match v {
        Value::Integer(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

impl FountainDecoder {
    /// Number of fragments recovered so far
    pub fn recovered(&self) -> usize {
        self.simple.len()
    }

    fn parse(part: &[u8]) -> Result<(u32, Params, Vec<u8>), Error> {
        let s = std::str::from_utf8(part).map_err(|e| Error::InvalidPart(e.to_string()))?;
        let s = s.trim().to_ascii_lowercase();

        let body = s
            .strip_prefix(UR_TYPE)
            .ok_or_else(|| Error::InvalidPart("missing ur:crypto-psbt prefix".into()))?;
        let (seq, words) = body
            .split_once('/')
            .ok_or_else(|| Error::InvalidPart("missing sequence header".into()))?;
        let (seq_num, seq_len) = seq
            .split_once('-')
            .and_then(|(a, b)| Some((a.parse::<u32>().ok()?, b.parse::<usize>().ok()?)))
            .ok_or_else(|| Error::InvalidPart(format!("invalid sequence '{seq}'")))?;

        let cbor = bytewords::decode_minimal(words)?;
        let v: Value = serde_cbor::from_slice(&cbor).map_err(|e| Error::InvalidPart(e.to_string()))?;

        let (header, data) = match v {
            Value::Array(mut a) if a.len() == 5 => match a.pop() {
                Some(Value::Bytes(d)) => (a, d),
                _ => return Err(Error::InvalidPart("expected fragment bytes".into())),
            },
            _ => return Err(Error::InvalidPart("expected part array".into())),
        };

        let h: Vec<u64> = header
            .iter()
            .map(as_uint)
            .collect::<Option<_>>()
            .ok_or_else(|| Error::InvalidPart("invalid part header".into()))?;

        if h[0] != seq_num as u64 || h[1] != seq_len as u64 || seq_num == 0 || seq_len == 0 {
            return Err(Error::InvalidPart("sequence header mismatch".into()));
        }

        let message_len = usize::try_from(h[2])
            .ok()
            .filter(|n| *n <= MAX_MESSAGE_LEN)
            .ok_or_else(|| Error::InvalidPart(format!("message length {} too large", h[2])))?;

        let params = Params {
            seq_len,
            message_len,
            checksum: u32::try_from(h[3]).map_err(|e| Error::InvalidPart(e.to_string()))?,
            fragment_len: data.len(),
        };

        // Headers must match what the encoder derives from the message length,
        // bounding seq_len before any per-fragment allocation
        if params.fragment_len == 0
            || (seq_len > 1 && params.fragment_len < MIN_FRAGMENT_LEN)
            || div_ceil(message_len as u64, params.fragment_len as u64) != seq_len as u64
        {
            return Err(Error::InvalidPart("inconsistent sequence parameters".into()));
        }

        Ok((seq_num, params, data))
    }

    fn absorb(&mut self, indexes: BTreeSet<usize>, data: Vec<u8>) {
        let mut queue = vec![(indexes, data)];

        while let Some((mut idx, mut data)) = queue.pop() {
            let simple = &self.simple;
            idx.retain(|i| match simple.get(i) {
                Some(f) => {
                    xor_into(&mut data, f);
                    false
                }
                None => true,
            });

            for (m, d) in &self.mixed {
                if m.len() < idx.len() && m.is_subset(&idx) {
                    idx = &idx - m;
                    xor_into(&mut data, d);
                }
            }

            match idx.first().copied() {
                None => (),
                Some(i) if idx.len() == 1 => {
                    self.simple.insert(i, data);
                    queue.extend(std::mem::take(&mut self.mixed));
                }
                Some(_) => {
                    if self.mixed.iter().any(|(m, _)| *m == idx) {
                        continue;
                    }

                    let (supersets, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.mixed)
                        .into_iter()
                        .partition(|(m, _)| idx.is_subset(m));
                    self.mixed = rest;

                    for (m, mut d) in supersets {
                        xor_into(&mut d, &data);
                        queue.push((&m - &idx, d));
                    }

                    self.mixed.push((idx, data));
                }
            }
        }
    }
}

impl PartDecoder for FountainDecoder {
    fn receive(&mut self, part: &[u8]) -> Result<bool, Error> {
        let (seq_num, params, data) = Self::parse(part)?;

        match self.params {
            Some(p) if p != params => {
                return Err(Error::InvalidPart("part belongs to another message".into()));
            }
            _ => self.params = Some(params),
        }

        if !self.is_complete() {
            let indexes = choose_fragments(seq_num, params.seq_len, params.checksum);
            self.absorb(indexes, data);
        }

        #[cfg(feature = "log")]
        log::trace!(
            "fountain part {}: {}/{} fragments",
            seq_num,
            self.simple.len(),
            params.seq_len
        );

        Ok(self.is_complete())
    }

    fn is_complete(&self) -> bool {
        match &self.params {
            Some(p) => self.simple.len() == p.seq_len,
            None => false,
        }
    }

    fn result(&self) -> Result<Vec<u8>, Error> {
        let p = match &self.params {
            Some(p) if self.is_complete() => p,
            _ => return Err(Error::InvalidPart("missing fragments".into())),
        };

        let mut msg: Vec<u8> = self.simple.values().flatten().copied().collect();
        msg.truncate(p.message_len);

        if CRC32.checksum(&msg) != p.checksum {
            return Err(Error::InvalidPart("message checksum mismatch".into()));
        }

        cbor_unwrap_bytes(&msg)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(data: &[u8], part_len: usize) -> (tempfile::TempDir, FountainEncoder) {
        let d = tempfile::tempdir().unwrap();
        let e = FountainEncoder::new(&mut &data[..], part_len, Some(d.path())).unwrap();
        (d, e)
    }

    #[test]
    fn fragment_lengths() {
        assert_eq!(nominal_fragment_len(12_345, 10, 1955), 1764);
        assert_eq!(nominal_fragment_len(12_345, 10, 30_000), 12_345);
        assert_eq!(nominal_fragment_len(5, 10, 2), 5);
    }

    #[test]
    fn simple_parts_first() {
        for s in 1..=4 {
            assert_eq!(choose_fragments(s, 4, 0x1234), BTreeSet::from([s as usize - 1]));
        }

        for s in 5..50 {
            let f = choose_fragments(s, 4, 0x1234);
            assert!(!f.is_empty() && f.len() <= 4);
            assert!(f.iter().all(|i| *i < 4));
            assert_eq!(f, choose_fragments(s, 4, 0x1234));
        }
    }

    #[test]
    fn part_format() {
        let (_d, mut e) = encode(&[0xabu8; 100], 60);

        assert!(e.is_infinite());
        assert!(e.get_full(usize::MAX).unwrap().is_empty());

        let n = e.len();
        assert!(n > 1);

        let p = String::from_utf8(e.get(0).unwrap()).unwrap();
        assert!(p.starts_with(&format!("ur:crypto-psbt/1-{n}/")));

        // Parts beyond seq_len keep coming
        let p = String::from_utf8(e.get(n + 3).unwrap()).unwrap();
        assert!(p.starts_with(&format!("ur:crypto-psbt/{}-{n}/", n + 4)));
    }

    #[test]
    fn decode_simple_parts() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 13) as u8).collect();
        let (_d, mut e) = encode(&data, 200);

        let mut parts = e.take_parts(e.len()).unwrap();
        parts.reverse();

        let mut dec = FountainDecoder::default();
        for p in &parts {
            dec.receive(p).unwrap();
        }

        assert!(dec.is_complete());
        assert_eq!(dec.result().unwrap(), data);
    }

    #[test]
    fn decode_from_mixed_parts() {
        let data = b"fountain codes let the scanner start anywhere".repeat(20);
        let (_d, mut e) = encode(&data, 100);
        let n = e.len();

        // Skip the first simple part, recovery must come from mixed parts
        let mut dec = FountainDecoder::default();
        let mut i = 1;
        while !dec.is_complete() {
            dec.receive(&e.get(i).unwrap()).unwrap();
            i += 1;
            assert!(i < 20 * n, "decoder did not converge");
        }

        assert_eq!(dec.result().unwrap(), data);
    }

    #[test]
    fn rejects_foreign_parts() {
        let (_d1, mut a) = encode(b"first payload, long enough to split into parts", 30);
        let (_d2, mut b) = encode(b"second payload, also long enough to split up", 30);

        let mut dec = FountainDecoder::default();
        dec.receive(&a.get(0).unwrap()).unwrap();

        assert!(matches!(dec.receive(&b.get(1).unwrap()), Err(Error::InvalidPart(_))));
    }

    /// Hand-built part with arbitrary header fields
    fn raw_part(
        seq_num: u32,
        seq_len: u64,
        message_len: u64,
        checksum: u32,
        fragment: &[u8],
    ) -> Vec<u8> {
        let v = Value::Array(vec![
            Value::Integer(seq_num as i128),
            Value::Integer(seq_len as i128),
            Value::Integer(message_len as i128),
            Value::Integer(checksum as i128),
            Value::Bytes(fragment.to_vec()),
        ]);
        let body = serde_cbor::to_vec(&v).unwrap();

        format!("{}{}-{}/{}", UR_TYPE, seq_num, seq_len, bytewords::encode_minimal(&body)).into_bytes()
    }

    #[test]
    fn rejects_oversized_sequences() {
        let tests: &[(u32, u64, u64, &[u8])] = &[
            // fragment_len * seq_len overflows
            (1, u64::MAX, 0, &[0, 0]),
            // mixed part over a huge fragment set
            (u32::MAX, u32::MAX as u64 - 1, 100, &[0, 0]),
            // message too large
            (1, 1, (MAX_MESSAGE_LEN + 1) as u64, &[0u8; 10]),
            // fragments too short for a multi-part message
            (1, 10, 20, &[0, 0]),
            // seq_len does not match message and fragment lengths
            (1, 5, 20, &[0u8; 10]),
            // empty fragment
            (1, 1, 0, &[]),
        ];

        for (seq_num, seq_len, message_len, fragment) in tests {
            let p = raw_part(*seq_num, *seq_len, *message_len, 0, fragment);

            let mut dec = FountainDecoder::default();
            assert!(
                matches!(dec.receive(&p), Err(Error::InvalidPart(_))),
                "seq {seq_num}-{seq_len}, message_len {message_len}"
            );
            assert!(!dec.is_complete());
        }
    }

    #[test]
    fn accepts_encoder_headers() {
        let (_d, mut e) = encode(&[0x11u8; 300], 50);

        let mut dec = FountainDecoder::default();
        for i in 0..e.len() {
            dec.receive(&e.get(i).unwrap()).unwrap();
        }
        assert_eq!(dec.result().unwrap(), vec![0x11u8; 300]);
    }

    #[test]
    fn sequence_numbers_do_not_wrap() {
        let (_d, mut e) = encode(&[0x22u8; 100], 40);

        let last = String::from_utf8(e.get(u32::MAX as usize - 1).unwrap()).unwrap();
        assert!(last.starts_with(&format!("ur:crypto-psbt/{}-", u32::MAX)));

        assert!(matches!(e.get(u32::MAX as usize), Err(Error::InvalidPart(_))));
        assert!(matches!(e.get(usize::MAX), Err(Error::InvalidPart(_))));
    }

    #[test]
    fn rejects_corrupt_words() {
        let (_d, mut e) = encode(b"some data", 100);
        let mut p = e.get(0).unwrap();
        let last = p.len() - 1;
        p[last] = if p[last] == b'a' { b'e' } else { b'a' };

        let mut dec = FountainDecoder::default();
        assert!(dec.receive(&p).is_err());
    }
}
