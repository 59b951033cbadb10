use std::{collections::HashSet, fs};

use qrsign_core::{keystore::SecretStore, storage::wipe, PinState};

mod helpers;
use helpers::*;

fn populate(root: &std::path::Path) {
    fs::create_dir_all(root.join("test1")).unwrap();
    fs::create_dir_all(root.join("test2")).unwrap();

    fs::write(root.join("f0"), b"0").unwrap();
    fs::write(root.join("test1/f1"), b"1").unwrap();
    fs::write(root.join("test2/f2"), b"2").unwrap();
}

#[test]
fn wipe_retains_blacklisted_names() {
    init_logging();

    let d = tempfile::tempdir().unwrap();
    populate(d.path());

    let blacklist: HashSet<String> = ["f1", "test2"].iter().map(|s| s.to_string()).collect();
    let r = wipe(d.path(), &blacklist);

    assert!(r.is_complete());
    assert!(!r.root_empty);

    assert!(!d.path().join("f0").exists());
    assert_eq!(fs::read(d.path().join("test1/f1")).unwrap(), b"1");
    assert_eq!(fs::read(d.path().join("test2/f2")).unwrap(), b"2");
}

#[test]
fn wipe_everything() {
    let d = tempfile::tempdir().unwrap();
    populate(d.path());

    let r = wipe(d.path(), &HashSet::new());

    assert!(r.is_complete());
    assert!(r.root_empty);
    assert_eq!(r.removed, 5);

    for p in ["f0", "test1/f1", "test2/f2", "test1", "test2"] {
        assert!(!d.path().join(p).exists(), "{p}");
    }
    assert!(d.path().exists());
}

#[test]
fn store_wipe_forgets_secret() {
    let (d, storage) = fs_storage();
    populate(d.path());

    let mut s = SecretStore::new(storage, 10);
    s.provision(b"1234").unwrap();

    let r = s.factory_wipe(&HashSet::new());

    assert!(r.root_empty);
    assert_eq!(s.state(), PinState::FactoryReset);
    assert!(s.verify_pin(b"1234").is_err());
}
