// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Staging files for encoder sessions

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::Error;

static SESSION: AtomicU64 = AtomicU64::new(0);

/// Session scoped staging file, removed on drop
pub struct Staging {
    path: PathBuf,
    file: File,
    len: u64,
}

impl Staging {
    /// Create a staging file in `dir`
    pub fn create(dir: Option<&Path>, tag: &str) -> Result<Self, Error> {
        let dir = dir.ok_or_else(|| Error::Configuration("encoder staging location required".into()))?;

        fs::create_dir_all(dir).map_err(|e| Error::storage("create staging dir", e))?;

        let n = SESSION.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("qrsign-{}-{}.{}", std::process::id(), n, tag));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::storage("create staging", e))?;

        Ok(Self { path, file, len: 0 })
    }

    /// Copy a stream into staging, returning the number of bytes written
    pub fn fill<R: Read + ?Sized>(&mut self, r: &mut R) -> Result<u64, Error> {
        let n = io::copy(r, self).map_err(|e| Error::storage("write staging", e))?;
        Ok(n)
    }

    /// Staged length
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read up to `buff.len()` bytes at `offset`, returning the number read
    pub fn read_at(&mut self, offset: u64, buff: &mut [u8]) -> Result<usize, Error> {
        let n = buff.len().min(self.len.saturating_sub(offset) as usize);

        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut buff[..n]))
            .map_err(|e| Error::storage("read staging", e))?;

        Ok(n)
    }

    /// Read `len` bytes at `offset`, truncated at the end of staging
    pub fn slice(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, Error> {
        let mut b = vec![0u8; len];
        let n = self.read_at(offset, &mut b)?;
        b.truncate(n);
        Ok(b)
    }

    /// Read the whole staged contents
    pub fn read_all(&mut self) -> Result<Vec<u8>, Error> {
        self.slice(0, self.len as usize)
    }

    /// Reader over the staged contents
    pub fn reader(&mut self) -> Result<impl Read + '_, Error> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::storage("read staging", e))?;
        Ok((&mut self.file).take(self.len))
    }
}

impl Write for Staging {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(self.len))?;
        let n = self.file.write(buf)?;
        self.len += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
