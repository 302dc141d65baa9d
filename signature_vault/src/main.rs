//! Signature Vault - CLI
//!
//! Command-line front end: enrol signature images and verify pairs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};

use signature_vault::{Outcome, SignatureVault, VerifierConfig};

#[derive(Parser)]
#[command(name = "sigvault")]
#[command(author = "Karen Tonoyan")]
#[command(version = signature_vault::VERSION)]
#[command(about = "Signature Vault - encrypted signature images with similarity matching")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Key file (overrides the configuration)
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a signature image in place, or into --output
    Enroll {
        /// Signature image (PNG/JPEG)
        path: PathBuf,

        /// Write the encrypted asset here and leave the source untouched
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two enrolled signatures
    Verify {
        first: PathBuf,
        second: PathBuf,

        /// Match threshold, 0-100
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print the phase trail
        #[arg(long)]
        trace: bool,
    },

    /// Report whether files are encrypted under the current key
    Status {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show the key location and fingerprint (creates the key on first run)
    Key,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(cli: &Cli) -> anyhow::Result<VerifierConfig> {
    let mut config = match &cli.config {
        Some(path) => VerifierConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => VerifierConfig::default(),
    };
    if let Some(key) = &cli.key {
        config.key_path = key.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    let key_path = config.key_path.clone();
    let vault = SignatureVault::bootstrap(config).with_context(|| {
        format!(
            "cannot open key store {}; no asset was touched",
            key_path.display()
        )
    })?;

    match cli.command {
        Commands::Enroll { path, output } => {
            let asset = match output {
                Some(dest) => vault.enroll_copy(&path, &dest)?,
                None => vault.enroll(&path)?,
            };
            println!("🔐 Enrolled: {}", asset.path().display());
        }

        Commands::Verify {
            first,
            second,
            threshold,
            trace,
        } => {
            let threshold = threshold.unwrap_or(vault.config().threshold);
            let report = vault.verify_detailed(&first, &second, threshold);

            if trace {
                println!("🧭 Phases: {:?}", report.trail);
                println!("   At: {}", report.verified_at.to_rfc3339());
            }
            if !report.at_rest() {
                eprintln!("⚠️ Left in plaintext, re-encrypt manually:");
                for path in &report.unrestored {
                    eprintln!("   - {}", path.display());
                }
            }

            return Ok(match &report.outcome {
                Outcome::Match(_) => {
                    println!("✅ {}", report.outcome);
                    ExitCode::SUCCESS
                }
                Outcome::NoMatch(_) => {
                    println!("❌ {}", report.outcome);
                    ExitCode::from(1)
                }
                Outcome::Error(_) => {
                    eprintln!("⛔ {}", report.outcome);
                    ExitCode::from(2)
                }
            });
        }

        Commands::Status { paths } => {
            for path in paths {
                match vault.status(&path) {
                    Ok(state) => println!("{:<10} {}", state, path.display()),
                    Err(e) => println!("{:<10} {} ({})", "error", path.display(), e),
                }
            }
        }

        Commands::Key => {
            println!("🔑 Key file:    {}", vault.config().key_path.display());
            println!("   Fingerprint: {}", vault.key_fingerprint());
            println!("   Cipher:      {}", vault.config().cipher.name());
        }
    }

    Ok(ExitCode::SUCCESS)
}
