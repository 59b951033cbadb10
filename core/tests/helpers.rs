#![allow(unused)]

use std::{
    collections::HashSet,
    io::{self, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use tempfile::TempDir;

use qrsign_core::{
    encoder::ChunkCodec,
    proto::{bundle::Bundle, hash::app_digest},
    router::Prompt,
    storage::{FsStorage, Storage},
    Config, Device,
};

/// Secret for the built-in extension trust key
pub const TRUST_SECRET: [u8; 32] = [0x31; 32];

pub fn init_logging() {
    let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Default::default());
}

pub async fn accept(_p: Prompt) -> bool {
    true
}

pub async fn decline(_p: Prompt) -> bool {
    false
}

pub fn fs_storage() -> (TempDir, Arc<FsStorage>) {
    let d = tempfile::tempdir().unwrap();
    let s = FsStorage::new(d.path()).unwrap();
    (d, Arc::new(s))
}

pub fn test_config(root: &Path) -> Config {
    Config {
        storage_root: root.to_path_buf(),
        staging_dir: Some(root.join("staging")),
        user_timeout: 5,
        ..Default::default()
    }
}

/// PIN used by provisioned test devices
pub const TEST_PIN: &[u8] = b"1234";

/// Fresh device with no secret, host commands are refused
pub fn blank_device() -> (TempDir, Arc<FsStorage>, Device) {
    let (d, storage) = fs_storage();
    let device = Device::new(test_config(d.path()), storage.clone()).unwrap();
    (d, storage, device)
}

/// Provisioned and unlocked device
pub fn test_device() -> (TempDir, Arc<FsStorage>, Device) {
    let (d, storage, mut device) = blank_device();
    device.secrets().provision(TEST_PIN).unwrap();
    (d, storage, device)
}

pub fn trust_signer() -> SigningKey {
    SigningKey::from_slice(&TRUST_SECRET).unwrap()
}

/// DER signature over the extension digest of `payload`
pub fn sign_app(key: &SigningKey, payload: &[u8]) -> Vec<u8> {
    let s: Signature = key.sign_prehash(&app_digest(payload)).unwrap();
    s.to_der().as_bytes().to_vec()
}

pub fn install_cmd(sigs: Vec<Vec<u8>>, payload: &[u8]) -> Vec<u8> {
    Bundle::new(sigs, payload.to_vec()).to_command().unwrap()
}

/// Fetch every part of a finite codec
pub fn all_parts(codec: &mut dyn ChunkCodec) -> Vec<Vec<u8>> {
    let n = codec.len();
    codec.take_parts(n).unwrap()
}

/// Filesystem storage with injectable write failures
pub struct FailingStorage {
    inner: FsStorage,
    failing: Mutex<HashSet<String>>,
}

impl FailingStorage {
    pub fn new(inner: FsStorage) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Fail writes and removals of `name`
    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    fn check(&self, name: &str) -> io::Result<()> {
        match self.failing.lock().unwrap().contains(name) {
            true => Err(io::Error::new(io::ErrorKind::Other, "injected failure")),
            false => Ok(()),
        }
    }
}

impl Storage for FailingStorage {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read(name)
    }

    fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        self.check(name)?;
        self.inner.write(name, data)
    }

    fn create(&self, name: &str) -> io::Result<Box<dyn Write + Send>> {
        self.check(name)?;
        self.inner.create(name)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        self.check(to)?;
        self.inner.rename(from, to)
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        self.check(name)?;
        self.inner.remove(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }
}
