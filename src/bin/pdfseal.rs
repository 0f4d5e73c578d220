//! pdfseal command line
//!
//! Usage:
//!   pdfseal generate <PIN> <PUBLIC_DIR> <PRIVATE_DIR> [--bits N]
//!   pdfseal sign <INPUT> <OUTPUT> --pin <PIN> [--key-dir DIR]... [--reason TEXT] [--location TEXT]
//!   pdfseal verify <PUBLIC_KEY> <PDF>
//!   pdfseal info <PDF>
//!
//! `--verbose` (or `-v`) anywhere turns on debug logging; otherwise `RUST_LOG`
//! applies with a default of `warn`.
//!
//! Exit status: 0 success, 1 signature invalid or made with another key,
//! 2 bad arguments or input, 3 removable media problem, 4 key/PIN/crypto
//! failure, 5 unreadable or unsigned document, 6 unsupported platform,
//! 7 file-system error.

use pdfseal::keys::{load_public_key, KeyStore};
use pdfseal::media::{platform_provider, FixedMedia, MediaProvider};
use pdfseal::signatures::{inspect, sign_file_with, SignOptions, VerificationResult};
use pdfseal::{Error, ErrorKind, SealConfig};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
usage:
  pdfseal generate <PIN> <PUBLIC_DIR> <PRIVATE_DIR> [--bits N]
  pdfseal sign <INPUT> <OUTPUT> --pin <PIN> [--key-dir DIR]... [--reason TEXT] [--location TEXT]
  pdfseal verify <PUBLIC_KEY> <PDF>
  pdfseal info <PDF>
options:
  -v, --verbose   debug logging";

enum Command {
    Generate {
        pin: String,
        public_dir: PathBuf,
        private_dir: PathBuf,
        bits: Option<usize>,
    },
    Sign {
        input: PathBuf,
        output: PathBuf,
        pin: String,
        key_dirs: Vec<PathBuf>,
        reason: Option<String>,
        location: Option<String>,
    },
    Verify {
        public_key: PathBuf,
        pdf: PathBuf,
    },
    Info {
        pdf: PathBuf,
    },
}

struct Args {
    command: Command,
    verbose: bool,
}

impl Args {
    fn parse(args: &[String]) -> std::result::Result<Self, String> {
        let mut positional = Vec::new();
        let mut verbose = false;
        let mut pin = None;
        let mut bits = None;
        let mut key_dirs = Vec::new();
        let mut reason = None;
        let mut location = None;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--verbose" | "-v" => verbose = true,
                "--pin" => pin = Some(take_value(args, &mut i)?),
                "--key-dir" => key_dirs.push(PathBuf::from(take_value(args, &mut i)?)),
                "--reason" => reason = Some(take_value(args, &mut i)?),
                "--location" => location = Some(take_value(args, &mut i)?),
                "--bits" => {
                    let raw = take_value(args, &mut i)?;
                    bits = Some(raw.parse().map_err(|_| format!("invalid key size {:?}", raw))?);
                },
                flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
                _ => positional.push(args[i].clone()),
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        let name = positional.next().ok_or("missing command")?;
        let mut next = |what: &str| positional.next().ok_or(format!("missing {}", what));
        let command = match name.as_str() {
            "generate" => Command::Generate {
                pin: next("PIN")?,
                public_dir: next("public key directory")?.into(),
                private_dir: next("private key directory")?.into(),
                bits,
            },
            "sign" => Command::Sign {
                input: next("input PDF")?.into(),
                output: next("output PDF")?.into(),
                pin: pin.ok_or("sign needs --pin")?,
                key_dirs,
                reason,
                location,
            },
            "verify" => Command::Verify {
                public_key: next("public key")?.into(),
                pdf: next("PDF")?.into(),
            },
            "info" => Command::Info {
                pdf: next("PDF")?.into(),
            },
            other => return Err(format!("unknown command {:?}", other)),
        };
        if let Some(extra) = positional.next() {
            return Err(format!("unexpected argument {:?}", extra));
        }
        Ok(Self { command, verbose })
    }
}

/// The value following the option at `args[*i]`.
fn take_value(args: &[String], i: &mut usize) -> std::result::Result<String, String> {
    let option = &args[*i];
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} needs a value", option))
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match Args::parse(&args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("error: {}\n{}", message, USAGE);
            return ExitCode::from(2);
        },
    };

    let level = if args.verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(level);
    let mut logger = env_logger::Builder::from_env(env);
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match run(args.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e))
        },
    }
}

/// Run one command; `Ok(false)` means a signature did not verify.
fn run(command: Command) -> pdfseal::Result<bool> {
    match command {
        Command::Generate {
            pin,
            public_dir,
            private_dir,
            bits,
        } => {
            let mut config = SealConfig::new();
            if let Some(bits) = bits {
                config = config.with_key_bits(bits);
            }
            let created = KeyStore::new(config).create(&pin, &public_dir, &private_dir)?;
            println!("public key:  {}", created.public_key_path.display());
            println!("private key: {}", created.private_key_path.display());
            Ok(true)
        },
        Command::Sign {
            input,
            output,
            pin,
            key_dirs,
            reason,
            location,
        } => {
            let provider: Box<dyn MediaProvider> = if key_dirs.is_empty() {
                platform_provider()?
            } else {
                Box::new(FixedMedia::new(key_dirs))
            };
            log::debug!("looking for the private key with the {} provider", provider.name());

            let store = KeyStore::default();
            let private_key = store.retrieve(provider.as_ref(), &pin)?;
            let mut options = SignOptions::default();
            if let Some(reason) = reason {
                options = options.with_reason(reason);
            }
            if let Some(location) = location {
                options = options.with_location(location);
            }
            sign_file_with(&private_key, &input, &output, store.config(), options)?;
            println!("signed {}", output.display());
            Ok(true)
        },
        Command::Verify { public_key, pdf } => {
            let public_key = load_public_key(&public_key)?;
            let valid = pdfseal::verify(&public_key, &pdf)?;
            println!("{}", if valid { "signature valid" } else { "signature INVALID" });
            Ok(valid)
        },
        Command::Info { pdf } => {
            let result = inspect(&pdf)?;
            print_info(&result);
            Ok(result.status.is_ok())
        },
    }
}

fn print_info(result: &VerificationResult) {
    let info = &result.signature_info;
    let show = |label: &str, value: &Option<String>| {
        if let Some(value) = value {
            println!("{:<14}{}", label, value);
        }
    };
    println!("{:<14}{}", "Field:", info.field_name);
    show("Signer:", &info.signer_name);
    show("Signed at:", &info.signing_time);
    show("Reason:", &info.reason);
    show("Location:", &info.location);
    show("Certificate:", &info.certificate_cn);
    show("Issuer:", &info.certificate_issuer);
    show("Valid from:", &info.valid_from);
    show("Valid to:", &info.valid_to);
    if let Some(digest) = info.digest_algorithm {
        println!("{:<14}{}", "Digest:", digest.name());
    }
    println!("{:<14}{:?}", "Byte range:", info.byte_range);
    println!("{:<14}{}", "Timestamp:", if info.has_timestamp { "yes" } else { "no" });
    println!("{:<14}{:?}", "Status:", result.status);
    for message in &result.messages {
        println!("  - {}", message);
    }
}

fn exit_code(error: &Error) -> u8 {
    match error.kind() {
        ErrorKind::InputValidation => 2,
        ErrorKind::MediaDiscovery => 3,
        ErrorKind::Cryptographic => 4,
        ErrorKind::Document => 5,
        ErrorKind::Platform => 6,
        ErrorKind::Io => 7,
    }
}
