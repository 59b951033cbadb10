// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command line utility for QRSign devices and extension bundles

use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use clap::Parser;
use k256::ecdsa::{SigningKey, VerifyingKey};
use log::{debug, error, info, warn, LevelFilter};
use rand_core::OsRng;

use qrsign::{
    bundle::{parse_signing_key, parse_verifying_key},
    core::{apps::default_trust_key, encoder::Format, Config, Device, HostReply},
    decode_parts, encode_parts, render_part, sign_bundle, verify_bundle, Verdict,
};

mod helpers;
use helpers::*;

/// QRSign command line utility
#[derive(Clone, Debug, Parser)]
struct Options {
    /// Device configuration file (JSON)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Override the device storage root
    #[clap(long)]
    storage_root: Option<PathBuf>,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// Generate an extension signing key
    Keygen,

    /// Build a signed extension install bundle
    SignApp {
        /// Extension payload
        payload: PathBuf,

        /// Hex encoded signing key, may be repeated
        #[clap(long = "key", value_parser = parse_signing_key, required = true)]
        keys: Vec<SigningKey>,

        /// Output file for the `importapp` command (hex to stdout if omitted)
        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Verify a signed extension install bundle
    VerifyApp {
        /// `importapp` command file
        bundle: PathBuf,

        /// Hex encoded trust key, defaults to the built-in key
        #[clap(long, value_parser = parse_verifying_key)]
        pubkey: Option<VerifyingKey>,

        /// Print the report as JSON
        #[clap(long)]
        json: bool,
    },

    /// Encode a file as transport parts
    Encode {
        /// Input file
        file: PathBuf,

        /// Transport format
        #[clap(long, default_value = "base64")]
        format: Format,

        /// Requested part length
        #[clap(long, default_value = "300")]
        part_len: usize,

        /// Number of parts to print (defaults to the encoder part count)
        #[clap(long)]
        parts: Option<usize>,

        /// Staging directory
        #[clap(long, default_value = "./tmp")]
        staging_dir: PathBuf,
    },

    /// Reassemble transport parts read line-by-line from stdin
    Decode {
        /// Transport format
        #[clap(long, default_value = "base64")]
        format: Format,

        /// Output file (stdout if omitted)
        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Run a host command against a local device
    Exec {
        /// Host command, e.g. `getrandom 16`
        #[clap(required = true)]
        command: Vec<String>,

        /// Device PIN, host commands require an unlocked device
        #[clap(long)]
        pin: String,

        /// Accept all confirmation prompts
        #[clap(long)]
        yes: bool,

        /// Number of parts to print for infinite formats
        #[clap(long)]
        parts: Option<usize>,
    },

    /// Provision a new device secret under the provided PIN
    Provision {
        #[clap(long)]
        pin: String,
    },

    /// Attempt to unlock the device
    Unlock {
        #[clap(long)]
        pin: String,
    },

    /// Show the antiphishing word for a partial PIN
    Word {
        #[clap(long)]
        pin_part: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())?;

    // Load device configuration
    let mut config = match &args.config {
        Some(p) => Config::from_json(&fs::read_to_string(p)?)?,
        None => Config::default(),
    };
    if let Some(r) = &args.storage_root {
        config.storage_root = r.clone();
    }

    debug!("Executing command: {:?}", args.cmd);

    execute(config, args.cmd).await
}

async fn execute(config: Config, cmd: Actions) -> anyhow::Result<()> {
    match cmd {
        Actions::Keygen => {
            let sk = SigningKey::random(&mut OsRng);

            println!("secret: {}", hex::encode(sk.to_bytes()));
            println!("public: {}", hex::encode(sk.verifying_key().to_sec1_bytes()));
        }
        Actions::SignApp {
            payload,
            keys,
            output,
        } => {
            let payload = fs::read(payload)?;
            let cmd = sign_bundle(&payload, &keys)?.to_command()?;

            info!("bundle: {} signatures, {} bytes", keys.len(), cmd.len());

            match output {
                Some(p) => fs::write(p, &cmd)?,
                None => println!("{}", hex::encode(&cmd)),
            }
        }
        Actions::VerifyApp {
            bundle,
            pubkey,
            json,
        } => {
            let key = match pubkey {
                Some(k) => k,
                None => default_trust_key()?,
            };

            let v = verify_bundle(&fs::read(bundle)?, &key)?;

            match json {
                true => println!("{}", serde_json::to_string_pretty(&v)?),
                false => {
                    info!("digest: {}", v.digest);
                    info!("payload: {} bytes", v.payload_len);
                    info!("signatures: {}/{} valid", v.valid, v.signatures);
                    info!("verdict: {}", v.verdict);
                }
            }

            if v.verdict != Verdict::Trusted {
                return Err(anyhow::anyhow!("bundle is not trusted"));
            }
        }
        Actions::Encode {
            file,
            format,
            part_len,
            parts,
            staging_dir,
        } => {
            let data = fs::read(file)?;

            let mut stdout = io::stdout().lock();
            for p in encode_parts(format, &data, part_len, parts, &staging_dir)? {
                writeln!(stdout, "{p}")?;
            }
        }
        Actions::Decode { format, output } => {
            let lines = io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?;
            let data = decode_parts(format, &lines)?;

            info!("decoded {} bytes", data.len());

            match output {
                Some(p) => fs::write(p, &data)?,
                None => io::stdout().write_all(&data)?,
            }
        }
        Actions::Exec {
            command,
            pin,
            yes,
            parts,
        } => {
            let mut device = Device::from_config(config)?;
            device.boot()?;

            device.secrets().unlock(pin.as_bytes())?;

            let confirm = TerminalConfirm { assume_yes: yes };
            let reply = device.handle(command.join(" ").as_bytes(), &confirm).await;

            let (meta, mut codec) = match reply {
                HostReply::Error(e) => {
                    println!("{e}");
                    return Ok(());
                }
                HostReply::Response { meta, codec } => (meta, codec),
            };

            info!("{}", meta.title);
            if let Some(n) = &meta.note {
                info!("{}", n);
            }

            let n = match codec.is_infinite() {
                true => parts.unwrap_or(codec.len()),
                false => codec.len(),
            };

            let format = codec.format();
            let mut stdout = io::stdout().lock();
            for p in codec.take_parts(n)? {
                writeln!(stdout, "{}", render_part(format, p)?)?;
            }

            if device.take_reboot_request() {
                info!("rebooting");
                device.boot()?;
            }
        }
        Actions::Provision { pin } => {
            let mut device = Device::from_config(config)?;
            device.boot()?;

            device.secrets().provision(pin.as_bytes())?;
            info!("device provisioned, state: {}", device.state());
        }
        Actions::Unlock { pin } => {
            let mut device = Device::from_config(config)?;
            device.boot()?;

            match device.secrets().unlock(pin.as_bytes()) {
                Ok(()) => info!("unlocked"),
                Err(e) => {
                    error!("{}", e);

                    if let Ok(n) = device.secrets().attempts_remaining() {
                        warn!("{} attempts remaining", n);
                    }

                    return Err(e.into());
                }
            }
        }
        Actions::Word { pin_part } => {
            let mut device = Device::from_config(config)?;
            device.boot()?;

            let w = device.secrets().antiphishing_word(pin_part.as_bytes())?;
            println!("{w}");
        }
    }

    Ok(())
}
