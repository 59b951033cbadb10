// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Compact unsigned integers, used for length prefixes
//!
//! ## Encoding
//!
//! ```text
//! value < 0xfd          -> [value]
//! value <= 0xffff       -> [0xfd, u16 LE]
//! value <= 0xffff_ffff  -> [0xfe, u32 LE]
//! otherwise             -> [0xff, u64 LE]
//! ```
//!
//! Decoding rejects non-minimal encodings.

use std::io::{Read, Write};

use encdec::{DecodeOwned, Encode};

use crate::Error;

/// Compact unsigned integer
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct CompactUint(pub u64);

impl CompactUint {
    /// Read a compact integer from the provided stream
    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<u64, Error> {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag).map_err(Error::from_io)?;

        let n = match tag[0] {
            0xfd => 2,
            0xfe => 4,
            0xff => 8,
            v => return Ok(v as u64),
        };

        let mut b = [0u8; 8];
        r.read_exact(&mut b[..n]).map_err(Error::from_io)?;

        let v = u64::from_le_bytes(b);
        check_minimal(v, n)?;

        Ok(v)
    }

    /// Write a compact integer to the provided stream
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, Error> {
        let mut b = [0u8; 9];
        let n = self.encode(&mut b)?;
        w.write_all(&b[..n])?;
        Ok(n)
    }
}

impl From<u64> for CompactUint {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<usize> for CompactUint {
    fn from(v: usize) -> Self {
        Self(v as u64)
    }
}

fn check_minimal(v: u64, n: usize) -> Result<(), Error> {
    let min = match n {
        2 => 0xfd,
        4 => 0x1_0000,
        _ => 0x1_0000_0000,
    };

    if v < min {
        return Err(Error::InvalidEncoding);
    }

    Ok(())
}

impl Encode for CompactUint {
    type Error = Error;

    fn encode_len(&self) -> Result<usize, Error> {
        let n = match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        };
        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Error> {
        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(Error::InvalidLength);
        }

        let v = self.0;
        match n {
            1 => buff[0] = v as u8,
            3 => {
                buff[0] = 0xfd;
                buff[1..3].copy_from_slice(&(v as u16).to_le_bytes());
            }
            5 => {
                buff[0] = 0xfe;
                buff[1..5].copy_from_slice(&(v as u32).to_le_bytes());
            }
            _ => {
                buff[0] = 0xff;
                buff[1..9].copy_from_slice(&v.to_le_bytes());
            }
        }

        Ok(n)
    }
}

impl DecodeOwned for CompactUint {
    type Output = Self;

    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Error> {
        let mut r = buff;
        let v = Self::read_from(&mut r)?;
        Ok((Self(v), buff.len() - r.len()))
    }
}
