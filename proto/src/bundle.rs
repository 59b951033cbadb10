// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Signed extension install bundles
//!
//! ## Encoding
//!
//! ```text
//! compact(num_sigs) || { compact(sig_len) || sig }* || compact(payload_len) || payload
//! ```
//!
//! On the wire a bundle follows the [IMPORT_APP_PREFIX] and a single space.
//! The [BundleHeader] may be parsed from a stream without buffering the
//! payload, leaving the stream positioned at the first payload byte.

use std::io::{Read, Write};

use encdec::{DecodeOwned, Encode};

use crate::{compact::CompactUint, Error, IMPORT_APP_PREFIX, MAX_SIGS, MAX_SIG_LEN};

/// Bundle header, signatures and declared payload length
#[derive(Clone, PartialEq, Debug)]
pub struct BundleHeader {
    /// DER encoded signatures over the payload signing digest
    pub sigs: Vec<Vec<u8>>,
    /// Length of the payload following the header
    pub payload_len: u64,
}

impl BundleHeader {
    /// Read a bundle header from the provided stream
    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Self, Error> {
        let count = CompactUint::read_from(r)?;
        if count == 0 {
            return Err(Error::NoSignatures);
        }
        if count > MAX_SIGS as u64 {
            return Err(Error::TooManySignatures(count));
        }

        let mut sigs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let sig_len = CompactUint::read_from(r)?;
            if sig_len >= MAX_SIG_LEN as u64 {
                return Err(Error::SignatureTooLong(sig_len));
            }

            let mut sig = vec![0u8; sig_len as usize];
            r.read_exact(&mut sig).map_err(Error::from_io)?;
            sigs.push(sig);
        }

        let payload_len = CompactUint::read_from(r)?;

        #[cfg(feature = "log")]
        log::debug!(
            "bundle header: {} signatures, {} byte payload",
            sigs.len(),
            payload_len
        );

        Ok(Self { sigs, payload_len })
    }
}

impl Encode for BundleHeader {
    type Error = Error;

    fn encode_len(&self) -> Result<usize, Error> {
        let mut n = CompactUint::from(self.sigs.len()).encode_len()?;
        for s in &self.sigs {
            n += CompactUint::from(s.len()).encode_len()? + s.len();
        }
        n += CompactUint(self.payload_len).encode_len()?;
        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Error> {
        if buff.len() < self.encode_len()? {
            return Err(Error::InvalidLength);
        }

        let mut index = CompactUint::from(self.sigs.len()).encode(buff)?;

        for s in &self.sigs {
            index += CompactUint::from(s.len()).encode(&mut buff[index..])?;
            buff[index..][..s.len()].copy_from_slice(s);
            index += s.len();
        }

        index += CompactUint(self.payload_len).encode(&mut buff[index..])?;

        Ok(index)
    }
}

impl DecodeOwned for BundleHeader {
    type Output = Self;

    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Error> {
        let mut r = buff;
        let h = Self::read_from(&mut r)?;
        Ok((h, buff.len() - r.len()))
    }
}

/// Complete install bundle with payload
#[derive(Clone, PartialEq, Debug)]
pub struct Bundle {
    pub sigs: Vec<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Bundle {
    /// Create a new bundle
    pub fn new(sigs: Vec<Vec<u8>>, payload: Vec<u8>) -> Self {
        Self { sigs, payload }
    }

    /// Fetch the header for this bundle
    pub fn header(&self) -> BundleHeader {
        BundleHeader {
            sigs: self.sigs.clone(),
            payload_len: self.payload.len() as u64,
        }
    }

    /// Read a full bundle (without command prefix) from a stream
    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Self, Error> {
        let h = BundleHeader::read_from(r)?;

        let mut payload = vec![];
        r.take(h.payload_len)
            .read_to_end(&mut payload)
            .map_err(Error::from_io)?;
        if payload.len() as u64 != h.payload_len {
            return Err(Error::UnexpectedEof);
        }

        Ok(Self {
            sigs: h.sigs,
            payload,
        })
    }

    /// Write the bundle as a complete host command, including prefix
    pub fn write_command<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, Error> {
        let h = self.header();

        let mut buff = vec![0u8; h.encode_len()?];
        let n = h.encode(&mut buff)?;

        w.write_all(IMPORT_APP_PREFIX)?;
        w.write_all(b" ")?;
        w.write_all(&buff[..n])?;
        w.write_all(&self.payload)?;

        Ok(IMPORT_APP_PREFIX.len() + 1 + n + self.payload.len())
    }

    /// Encode the bundle as a complete host command
    pub fn to_command(&self) -> Result<Vec<u8>, Error> {
        let mut v = Vec::new();
        self.write_command(&mut v)?;
        Ok(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::encode_decode;

    fn sample() -> Bundle {
        Bundle::new(vec![vec![0x30; 70], vec![0x31; 71]], b"print('hi')".to_vec())
    }

    #[test]
    fn encode_decode_header() {
        let b = sample();
        let mut buff = [0u8; 256];
        encode_decode(&mut buff, &b.header());
    }

    #[test]
    fn parse_command() {
        let b = sample();
        let cmd = b.to_command().unwrap();

        assert!(cmd.starts_with(b"importapp "));

        let mut r = &cmd[IMPORT_APP_PREFIX.len() + 1..];
        let decoded = Bundle::read_from(&mut r).unwrap();

        assert_eq!(decoded, b);
        assert!(r.is_empty());
    }

    #[test]
    fn header_leaves_payload() {
        let b = sample();
        let cmd = b.to_command().unwrap();

        let mut r = &cmd[IMPORT_APP_PREFIX.len() + 1..];
        let h = BundleHeader::read_from(&mut r).unwrap();

        assert_eq!(h.payload_len, b.payload.len() as u64);
        assert_eq!(r, &b.payload[..]);
    }

    #[test]
    fn reject_no_signatures() {
        let r = BundleHeader::decode_owned(&[0x00, 0x01, 0xaa]);
        assert!(matches!(r, Err(Error::NoSignatures)));
    }

    #[test]
    fn reject_long_signature() {
        let mut d = vec![0x01, MAX_SIG_LEN as u8];
        d.extend_from_slice(&[0u8; MAX_SIG_LEN]);
        d.push(0x00);

        let r = BundleHeader::decode_owned(&d);
        assert!(matches!(r, Err(Error::SignatureTooLong(74))));
    }

    #[test]
    fn reject_too_many_signatures() {
        let r = BundleHeader::decode_owned(&[MAX_SIGS as u8 + 1]);
        assert!(matches!(r, Err(Error::TooManySignatures(17))));
    }

    #[test]
    fn reject_truncated_payload() {
        let b = sample();
        let cmd = b.to_command().unwrap();

        let mut r = &cmd[IMPORT_APP_PREFIX.len() + 1..cmd.len() - 1];
        assert!(matches!(Bundle::read_from(&mut r), Err(Error::UnexpectedEof)));
    }
}
