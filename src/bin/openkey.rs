use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

use openkey::adapters::FileKeyStore;
use openkey::ports::KeyStore;
use openkey::{api::Role, Context};

#[derive(Parser, Debug)]
#[command(name = "openkey")]
#[command(about = "Key management for openkey smart cards", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct DeriveArgs {
    /// Master key in hex format
    #[arg(long)]
    master_key: String,

    /// Application id in hex (e.g. ff77f0)
    #[arg(long, value_parser = parse_aid, default_value = "ff77f0")]
    aid: u32,

    /// Key number inside the application
    #[arg(long, default_value_t = 0)]
    key_no: u8,

    /// Card-specific context data in hex, usually the card UID
    #[arg(long)]
    data: String,

    /// Output length in bytes
    #[arg(long, default_value_t = 16)]
    length: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive a key and print it as hex
    Derive(DeriveArgs),

    /// Derive a password-hardened key; the password is read from stdin
    DerivePassword {
        #[command(flatten)]
        derive: DeriveArgs,

        /// PBKDF2 iteration count
        #[arg(long, default_value_t = 4096)]
        iterations: u32,
    },

    /// Generate or load producer key material under PATH
    BootstrapProducer { path: PathBuf },

    /// Generate or load manager key material under PATH
    BootstrapManager {
        path: PathBuf,

        /// Card slot to claim (1-13); reserved slots fall back to the lowest free one
        #[arg(long, default_value_t = 1)]
        preferred_slot: u8,
    },

    /// Report which roles have key material
    Status {
        /// Producer storage path
        #[arg(long)]
        producer: Option<PathBuf>,

        /// Manager storage path
        #[arg(long)]
        manager: Option<PathBuf>,
    },
}

fn parse_aid(value: &str) -> Result<u32, String> {
    let digits = value.trim_start_matches("0x");
    let aid = u32::from_str_radix(digits, 16).map_err(|e| format!("invalid application id: {e}"))?;
    if aid > 0x00FF_FFFF {
        return Err("application id must fit in 24 bits".to_string());
    }
    Ok(aid)
}

fn decode_inputs(args: &DeriveArgs) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
    let master = hex::decode(&args.master_key).context("invalid master key hex")?;
    let data = hex::decode(&args.data).context("invalid data hex")?;
    Ok((master, data))
}

fn read_password() -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    io::stdin()
        .read_to_end(&mut buf)
        .context("failed to read password from stdin")?;
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(buf)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Derive(args) => {
            let (master, data) = decode_inputs(&args)?;
            let mut key = vec![0u8; args.length];
            openkey::kdf(&master, args.aid, args.key_no, &data, &mut key)
                .context("key derivation failed")?;
            println!("{}", hex::encode(&key));
        }

        Commands::DerivePassword { derive, iterations } => {
            let (master, data) = decode_inputs(&derive)?;
            let password = read_password()?;
            let mut key = vec![0u8; derive.length];
            openkey::pbkdf(
                &master,
                derive.aid,
                derive.key_no,
                &data,
                &password,
                iterations,
                &mut key,
            )
            .context("password key derivation failed")?;
            println!("{}", hex::encode(&key));
        }

        Commands::BootstrapProducer { path } => {
            let mut ctx = Context::new()?;
            ctx.add_role(Role::Producer, &path)?;
            let existed = ctx
                .bootstrap_producer()
                .with_context(|| format!("failed to bootstrap producer at {}", path.display()))?;
            if existed {
                println!("producer already bootstrapped");
            } else {
                println!("producer bootstrapped");
            }
        }

        Commands::BootstrapManager {
            path,
            preferred_slot,
        } => {
            let mut ctx = Context::new()?;
            ctx.add_role(Role::Manager, &path)?;
            let existed = ctx
                .bootstrap_manager(preferred_slot)
                .with_context(|| format!("failed to bootstrap manager at {}", path.display()))?;
            let slot = ctx
                .manager_slot()
                .context("manager material missing after bootstrap")?;
            if existed {
                println!("manager already bootstrapped, slot {slot}");
            } else {
                println!("manager bootstrapped, slot {slot}");
            }
        }

        Commands::Status { producer, manager } => {
            let store = FileKeyStore::new();
            if let Some(path) = &producer {
                let material = store
                    .load_producer(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let state = if material.is_some() { "bootstrapped" } else { "missing" };
                println!("producer: {state}");
            }
            if let Some(path) = &manager {
                let material = store
                    .load_manager(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                match material {
                    Some(material) => println!("manager: bootstrapped, slot {}", material.slot),
                    None => println!("manager: missing"),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;

    #[test]
    fn test_cli_version_parameter() {
        let mut cmd = Command::cargo_bin("openkey").unwrap();
        let assert = cmd.arg("--version").assert();
        assert.success();
    }

    #[test]
    fn test_parse_aid() {
        assert_eq!(super::parse_aid("ff77f0"), Ok(0xFF77F0));
        assert_eq!(super::parse_aid("0xFF77F0"), Ok(0xFF77F0));
        assert!(super::parse_aid("1000000").is_err());
        assert!(super::parse_aid("openkey").is_err());
    }

    const MASTER: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const UID: &str = "04a1b2c3d4e5f6";

    fn openkey() -> Command {
        Command::cargo_bin("openkey").unwrap()
    }

    fn stdout_of(cmd: &mut Command) -> String {
        let output = cmd.assert().success().get_output().stdout.clone();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_derive_prints_hex_key() {
        let args = [
            "derive",
            "--master-key",
            MASTER,
            "--data",
            UID,
            "--key-no",
            "1",
        ];
        let out = stdout_of(openkey().args(args));
        let key = out.trim();
        assert_eq!(key.len(), 32);
        assert!(hex::decode(key).is_ok());

        let again = stdout_of(openkey().args(args));
        assert_eq!(again, out);
    }

    #[test]
    fn test_derive_password_reads_stdin() {
        let args = [
            "derive-password",
            "--master-key",
            MASTER,
            "--data",
            UID,
            "--iterations",
            "16",
        ];
        let with_1234 = stdout_of(openkey().args(args).write_stdin("1234\n"));
        let with_0000 = stdout_of(openkey().args(args).write_stdin("0000\n"));
        assert_ne!(with_1234, with_0000);
    }

    #[test]
    fn test_derive_rejects_bad_hex() {
        openkey()
            .args(["derive", "--master-key", "zz", "--data", UID])
            .assert()
            .failure();
    }

    #[test]
    fn test_bootstrap_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let producer = dir.path().join("producer");
        let manager = dir.path().join("manager");

        let out = stdout_of(openkey().arg("bootstrap-producer").arg(&producer));
        assert_eq!(out.trim(), "producer bootstrapped");
        let out = stdout_of(openkey().arg("bootstrap-producer").arg(&producer));
        assert_eq!(out.trim(), "producer already bootstrapped");

        let out = stdout_of(
            openkey()
                .arg("bootstrap-manager")
                .arg(&manager)
                .args(["--preferred-slot", "0"]),
        );
        assert_eq!(out.trim(), "manager bootstrapped, slot 1");

        let out = stdout_of(
            openkey()
                .arg("status")
                .arg("--producer")
                .arg(&producer)
                .arg("--manager")
                .arg(dir.path().join("nobody")),
        );
        assert_eq!(out, "producer: bootstrapped\nmanager: missing\n");
    }
}
