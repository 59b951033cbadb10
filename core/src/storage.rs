// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Persistent storage surface shared by the [SecretStore][crate::keystore::SecretStore]
//! and the [AppInstaller][crate::apps::AppInstaller]
//!
//! Entries are addressed by `/`-separated names relative to the storage root.

use std::{
    collections::HashSet,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

#[cfg(feature = "log")]
use log::{debug, warn};

/// Storage backend
pub trait Storage: Send + Sync {
    /// Root directory of this store
    fn root(&self) -> &Path;

    /// Read an entry, `None` if it does not exist
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Replace an entry atomically
    fn write(&self, name: &str, data: &[u8]) -> io::Result<()>;

    /// Create (or truncate) an entry for streaming writes
    fn create(&self, name: &str) -> io::Result<Box<dyn Write + Send>>;

    /// Rename an entry, replacing any existing destination
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    /// Remove an entry, succeeding if it does not exist
    fn remove(&self, name: &str) -> io::Result<()>;

    /// Check whether an entry exists
    fn exists(&self, name: &str) -> bool;
}

/// Filesystem backed [Storage]
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open a store at the provided root, creating the directory if required
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> PathBuf {
        name.split('/')
            .filter(|p| !p.is_empty() && *p != "." && *p != "..")
            .fold(self.root.clone(), |p, n| p.join(n))
    }

    fn parent_dir(&self, name: &str) -> io::Result<PathBuf> {
        let p = self.path(name);
        if let Some(d) = p.parent() {
            fs::create_dir_all(d)?;
        }
        Ok(p)
    }
}

impl Storage for FsStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(name)) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let p = self.parent_dir(name)?;
        let tmp = p.with_extension("swp");

        let mut f = fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
        drop(f);

        fs::rename(&tmp, &p)
    }

    fn create(&self, name: &str) -> io::Result<Box<dyn Write + Send>> {
        let p = self.parent_dir(name)?;
        Ok(Box::new(fs::File::create(p)?))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let to = self.parent_dir(to)?;
        fs::rename(self.path(from), to)
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.path(name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

/// Result of a [wipe] sweep
#[derive(Debug, Default)]
pub struct WipeReport {
    /// Number of files and directories removed
    pub removed: usize,
    /// Entries that could not be removed
    pub failures: Vec<(PathBuf, io::Error)>,
    /// Whether the root directory ended empty
    pub root_empty: bool,
}

impl WipeReport {
    /// Check the sweep completed without failures
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Frame {
    dir: PathBuf,
    children: Vec<PathBuf>,
    retained: bool,
}

/// Delete everything under `root` except entries whose name is in `blacklist`.
///
/// Children are removed before their parents and a directory is only removed
/// once it is empty. Blacklisted directories are retained with their contents.
/// Individual failures are collected in the report and do not stop the sweep.
/// The root directory itself is never removed.
pub fn wipe(root: &Path, blacklist: &HashSet<String>) -> WipeReport {
    let mut report = WipeReport::default();

    let children = match list_dir(root) {
        Ok(c) => c,
        Err(e) => {
            report.failures.push((root.to_path_buf(), e));
            return report;
        }
    };

    let mut stack = vec![Frame {
        dir: root.to_path_buf(),
        children,
        retained: false,
    }];

    while let Some(frame) = stack.last_mut() {
        // Descend into or remove the next child
        if let Some(child) = frame.children.pop() {
            let blacklisted = child
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| blacklist.contains(n))
                .unwrap_or(false);

            if blacklisted {
                frame.retained = true;
                continue;
            }

            let is_dir = fs::symlink_metadata(&child)
                .map(|m| m.is_dir())
                .unwrap_or(false);

            if is_dir {
                match list_dir(&child) {
                    Ok(children) => stack.push(Frame {
                        dir: child,
                        children,
                        retained: false,
                    }),
                    Err(e) => {
                        frame.retained = true;
                        report.failures.push((child, e));
                    }
                }
            } else if let Err(e) = fs::remove_file(&child) {
                frame.retained = true;
                report.failures.push((child, e));
            } else {
                report.removed += 1;
            }

            continue;
        }

        // All children handled, finish this directory
        let Frame { dir, retained, .. } = match stack.pop() {
            Some(f) => f,
            None => break,
        };

        let parent = match stack.last_mut() {
            Some(p) => p,
            None => {
                report.root_empty = !retained;
                break;
            }
        };

        if retained {
            parent.retained = true;
        } else if let Err(e) = fs::remove_dir(&dir) {
            parent.retained = true;
            report.failures.push((dir, e));
        } else {
            report.removed += 1;
        }
    }

    #[cfg(feature = "log")]
    {
        debug!(
            "wipe {}: removed {} entries, root empty: {}",
            root.display(),
            report.removed,
            report.root_empty
        );
        for (p, e) in &report.failures {
            warn!("wipe failed to remove {}: {}", p.display(), e);
        }
    }

    report
}

fn list_dir(p: &Path) -> io::Result<Vec<PathBuf>> {
    fs::read_dir(p)?
        .map(|e| e.map(|e| e.path()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn atomic_write_read_remove() {
        let d = tempfile::tempdir().unwrap();
        let s = FsStorage::new(d.path()).unwrap();

        assert_eq!(s.read("a/b").unwrap(), None);

        s.write("a/b", b"hello").unwrap();
        assert_eq!(s.read("a/b").unwrap().as_deref(), Some(&b"hello"[..]));
        assert!(!d.path().join("a/b.swp").exists());

        s.remove("a/b").unwrap();
        s.remove("a/b").unwrap();
        assert!(!s.exists("a/b"));
    }

    #[test]
    fn names_stay_under_root() {
        let d = tempfile::tempdir().unwrap();
        let s = FsStorage::new(d.path()).unwrap();

        assert_eq!(s.path("../../etc/passwd"), d.path().join("etc/passwd"));
    }

    #[test]
    fn stream_then_rename() {
        let d = tempfile::tempdir().unwrap();
        let s = FsStorage::new(d.path()).unwrap();

        let mut w = s.create("x/tmp").unwrap();
        w.write_all(b"abc").unwrap();
        w.write_all(b"def").unwrap();
        drop(w);

        s.rename("x/tmp", "y/final").unwrap();
        assert_eq!(s.read("y/final").unwrap().as_deref(), Some(&b"abcdef"[..]));
        assert!(!s.exists("x/tmp"));
    }

    #[test]
    fn wipe_nested_dirs() {
        let d = tempfile::tempdir().unwrap();
        fs::create_dir_all(d.path().join("a/b/c")).unwrap();
        fs::write(d.path().join("a/b/c/f"), b"1").unwrap();
        fs::write(d.path().join("a/g"), b"2").unwrap();
        fs::create_dir_all(d.path().join("empty")).unwrap();

        let r = wipe(d.path(), &HashSet::new());

        assert!(r.is_complete());
        assert!(r.root_empty);
        assert_eq!(r.removed, 6);
        assert!(d.path().exists());
    }

    #[test]
    fn wipe_missing_root() {
        let d = tempfile::tempdir().unwrap();
        let r = wipe(&d.path().join("missing"), &HashSet::new());

        assert!(!r.is_complete());
        assert!(!r.root_empty);
    }
}
