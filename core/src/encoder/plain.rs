// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Plain format, unframed slices of the staged copy

use std::{io::Read, path::Path};

use super::{ChunkCodec, Chunked, Format, PartDecoder, Staging};
use crate::Error;

/// Plain encoder
pub struct PlainEncoder {
    inner: Chunked,
}

impl PlainEncoder {
    pub fn new(r: &mut dyn Read, part_len: usize, staging_dir: Option<&Path>) -> Result<Self, Error> {
        let mut staging = Staging::create(staging_dir, "plain")?;
        staging.fill(r)?;

        Ok(Self {
            inner: Chunked::new(staging, part_len, 0),
        })
    }
}

impl ChunkCodec for PlainEncoder {
    fn format(&self) -> Format {
        Format::Plain
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
        self.inner.slice(index)
    }

    fn get_full(&mut self, max_len: usize) -> Result<Vec<u8>, Error> {
        if (max_len as u64) < self.inner.staging.len() {
            return Ok(vec![]);
        }
        self.inner.staging.read_all()
    }
}

/// Plain decoder, parts must be received in order
#[derive(Default)]
pub struct PlainDecoder {
    data: Vec<u8>,
    received: usize,
}

impl PartDecoder for PlainDecoder {
    fn receive(&mut self, part: &[u8]) -> Result<bool, Error> {
        self.data.extend_from_slice(part);
        self.received += 1;
        Ok(true)
    }

    fn is_complete(&self) -> bool {
        self.received > 0
    }

    fn result(&self) -> Result<Vec<u8>, Error> {
        Ok(self.data.clone())
    }
}
