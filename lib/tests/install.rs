use std::sync::Arc;

use k256::ecdsa::SigningKey;

use qrsign::{
    core::{
        consts::EXTENSION_STAGED,
        router::Prompt,
        storage::{FsStorage, Storage},
        Config, Device,
    },
    decode_parts, encode_parts, sign_bundle,
};

async fn accept(_p: Prompt) -> bool {
    true
}

/// Bundles built by the host library install on the device
#[tokio::test]
async fn host_signed_bundle_installs() -> anyhow::Result<()> {
    let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Default::default());

    let d = tempfile::tempdir()?;
    let storage = Arc::new(FsStorage::new(d.path())?);

    let config = Config {
        storage_root: d.path().to_path_buf(),
        staging_dir: Some(d.path().join("tmp")),
        ..Default::default()
    };
    let mut device = Device::new(config, storage.clone())?;
    device.secrets().provision(b"1234")?;

    let payload = b"import ui\nui.show('hi')\n".repeat(50);
    let key = SigningKey::from_slice(&[0x31; 32])?;
    let cmd = sign_bundle(&payload, &[key])?.to_command()?;

    let reply = device.handle(&cmd, &accept).await;
    assert_eq!(reply.error(), None);

    assert_eq!(storage.read(EXTENSION_STAGED)?, Some(payload));

    Ok(())
}

/// Device responses reassemble with the host decoder
#[tokio::test]
async fn device_reply_decodes_on_host() -> anyhow::Result<()> {
    let d = tempfile::tempdir()?;
    let storage = Arc::new(FsStorage::new(d.path())?);

    let config = Config {
        storage_root: d.path().to_path_buf(),
        staging_dir: Some(d.path().join("tmp")),
        part_len: 40,
        ..Default::default()
    };
    let format = config.format;
    let mut device = Device::new(config, storage)?;
    device.secrets().provision(b"1234")?;

    let reply = device.handle(b"getrandom 64", &accept).await;
    let mut codec = reply.into_codec().ok_or_else(|| anyhow::anyhow!("expected data"))?;

    let n = codec.len();
    let lines = codec
        .take_parts(n)?
        .into_iter()
        .map(String::from_utf8)
        .collect::<Result<Vec<_>, _>>()?;
    assert!(lines.len() > 1);

    let hex = decode_parts(format, &lines)?;
    assert_eq!(hex.len(), 128);

    // Host re-encoding of the same data yields the same parts
    let again = encode_parts(format, &hex, 40, None, &d.path().join("tmp"))?;
    assert_eq!(again, lines);

    Ok(())
}
