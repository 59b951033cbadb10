// Copyright (c) 2022-2023 The MobileCoin Foundation

//! bc32, bech32 data encoding with an empty human readable part
//!
//! Data is regrouped into 5-bit symbols from the bech32 alphabet followed by
//! a 6 symbol bech32 checksum over `hrp_expand("") || symbols`.

use std::io::{self, Write};

use crate::Error;

/// bech32 alphabet
pub const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const GENERATOR: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];

const CHECKSUM_LEN: usize = 6;

fn polymod_step(chk: u32, v: u8) -> u32 {
    let b = chk >> 25;
    let mut c = ((chk & 0x01ff_ffff) << 5) ^ v as u32;
    for (i, g) in GENERATOR.iter().enumerate() {
        if (b >> i) & 1 == 1 {
            c ^= g;
        }
    }
    c
}

/// Initial checksum state, `hrp_expand("") = [0]`
fn polymod_init() -> u32 {
    polymod_step(1, 0)
}

/// Streaming bc32 encoder
pub struct Bc32Writer<W: Write> {
    inner: W,
    acc: u32,
    bits: u32,
    chk: u32,
    written: u64,
}

impl<W: Write> Bc32Writer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            acc: 0,
            bits: 0,
            chk: polymod_init(),
            written: 0,
        }
    }

    fn emit(&mut self, v: u8) -> io::Result<()> {
        self.chk = polymod_step(self.chk, v);
        self.inner.write_all(&[CHARSET[v as usize]])?;
        self.written += 1;
        Ok(())
    }

    /// Flush partial symbols and write the checksum, returning the encoded length
    pub fn finish(mut self) -> io::Result<(u64, W)> {
        if self.bits > 0 {
            let v = ((self.acc << (5 - self.bits)) & 0x1f) as u8;
            self.emit(v)?;
        }

        let mut chk = self.chk;
        for _ in 0..CHECKSUM_LEN {
            chk = polymod_step(chk, 0);
        }
        chk ^= 1;

        for i in 0..CHECKSUM_LEN {
            let v = ((chk >> (5 * (5 - i))) & 0x1f) as usize;
            self.inner.write_all(&[CHARSET[v]])?;
        }

        self.inner.flush()?;

        Ok((self.written + CHECKSUM_LEN as u64, self.inner))
    }
}

impl<W: Write> Write for Bc32Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for b in buf {
            self.acc = (self.acc << 8) | *b as u32;
            self.bits += 8;

            while self.bits >= 5 {
                self.bits -= 5;
                let v = ((self.acc >> self.bits) & 0x1f) as u8;
                self.emit(v)?;
            }

            self.acc &= (1 << self.bits) - 1;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Encode bytes to a bc32 string
pub fn encode(data: &[u8]) -> String {
    let mut w = Bc32Writer::new(Vec::with_capacity(data.len() * 8 / 5 + 8));

    // Writes to a Vec are infallible
    let _ = w.write_all(data);
    let v = w.finish().map(|(_, v)| v).unwrap_or_default();

    v.into_iter().map(char::from).collect()
}

/// Decode a bc32 string, checking the checksum
pub fn decode(s: &str) -> Result<Vec<u8>, Error> {
    if s.len() < CHECKSUM_LEN {
        return Err(Error::InvalidPart("bc32 string too short".into()));
    }

    let mut chk = polymod_init();
    let mut values = Vec::with_capacity(s.len());

    for c in s.bytes() {
        let c = c.to_ascii_lowercase();
        let v = CHARSET
            .iter()
            .position(|x| *x == c)
            .ok_or_else(|| Error::InvalidPart(format!("invalid bc32 character '{}'", c as char)))?;

        chk = polymod_step(chk, v as u8);
        values.push(v as u8);
    }

    if chk != 1 {
        return Err(Error::InvalidPart("bc32 checksum mismatch".into()));
    }

    values.truncate(values.len() - CHECKSUM_LEN);

    let mut out = Vec::with_capacity(values.len() * 5 / 8);
    let (mut acc, mut bits) = (0u32, 0u32);

    for v in values {
        acc = (acc << 5) | v as u32;
        bits += 5;

        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }

        acc &= (1 << bits) - 1;
    }

    if bits >= 5 || acc != 0 {
        return Err(Error::InvalidPart("bc32 invalid padding".into()));
    }

    Ok(out)
}
