//! `transit` — command-line front end for the transit client.
//!
//! Startup sequence:
//! 1. Parse arguments.
//! 2. Load and validate [`VaultConfig`] from `VAULT_*` environment variables.
//! 3. Initialise structured logging on stderr.
//! 4. Run the requested operation and print its payload on stdout.
//!
//! Ctrl-C while waiting between retries cancels the call.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use transit_client::telemetry::{self, LogFormat};
use transit_client::{TransitClient, VaultConfig};

#[derive(Debug, Parser)]
#[command(name = "transit", version, about = "Encrypt and decrypt with a Vault transit key")]
struct Cli {
    /// Log line format.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    log_format: Format,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt PLAINTEXT and print the ciphertext token.
    Encrypt { key: String, plaintext: String },
    /// Decrypt CIPHERTEXT and print the recovered plaintext.
    Decrypt { key: String, ciphertext: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = VaultConfig::from_env().map_err(|e| {
        // Logging is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    let format = match cli.log_format {
        Format::Json => LogFormat::Json,
        Format::Text => LogFormat::Text,
    };
    telemetry::init(&cfg.log_level, format)?;
    debug!(version = env!("CARGO_PKG_VERSION"), addr = %cfg.addr, "transit starting");

    // -----------------------------------------------------------------------
    // 3. Client
    // -----------------------------------------------------------------------
    let client = TransitClient::new(cfg)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    // -----------------------------------------------------------------------
    // 4. Operation
    // -----------------------------------------------------------------------
    let outcome = match &cli.command {
        Command::Encrypt { key, plaintext } => {
            client.encrypt_with_cancel(key, plaintext, &cancel).await
        }
        Command::Decrypt { key, ciphertext } => {
            client.decrypt_with_cancel(key, ciphertext, &cancel).await
        }
    };

    match outcome {
        Ok(result) => {
            debug!(
                lease_id = %result.lease_id,
                renewable = result.renewable,
                lease_duration_secs = result.lease_duration.as_secs(),
                retries_used = result.retries_used,
                "transit call succeeded"
            );
            println!("{}", result.payload);
            Ok(())
        }
        Err(e) => {
            error!(
                kind = e.kind(),
                status = ?e.status_code(),
                attempts = ?e.attempts(),
                error = %e,
                "transit call failed"
            );
            Err(e.into())
        }
    }
}
