//! TokenVault CLI - Command line interface for card tokenization.
//!
//! This tool issues and validates tokens, seals and opens transport
//! envelopes, generates master keys and runs the demo HTTP server.

mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use tokenvault_common::TokenVaultConfig;
use tokenvault_crypto::{KeySource, MasterKey, SecretMaterial};
use tokenvault_tokenize::{
    AlgorithmType, CofTokenizer, FpeTokenizer, SimpleTokenizer, TokenizationAlgorithm,
    TokenizationContext,
};
use tokenvault_transport::{Envelope, RequestBinding};

#[derive(Parser)]
#[command(name = "tokenvault")]
#[command(about = "TokenVault - Payment card tokenization")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize a card number.
    Tokenize {
        /// Card number (whitespace is ignored).
        #[arg(long)]
        card: String,

        /// Merchant identifier.
        #[arg(short, long)]
        merchant: String,

        /// Algorithm: SIMPLE, COF or FPE.
        #[arg(short, long, default_value = "FPE")]
        algorithm: String,

        /// Card-on-file contract identifier.
        #[arg(long)]
        contract: Option<String>,

        /// Platform identifier.
        #[arg(long)]
        platform: Option<String>,

        /// Customer identifier.
        #[arg(long)]
        customer: Option<String>,
    },

    /// Check a token against an algorithm's format.
    Validate {
        /// Algorithm: SIMPLE, COF or FPE.
        #[arg(short, long)]
        algorithm: String,

        /// Token to check.
        token: String,
    },

    /// Seal a JSON body into a transport envelope.
    Seal {
        /// Plaintext body.
        #[arg(short, long)]
        body: String,

        #[command(flatten)]
        binding: BindingArgs,
    },

    /// Open a transport envelope.
    Open {
        /// Envelope JSON.
        #[arg(short, long)]
        envelope: String,

        #[command(flatten)]
        binding: BindingArgs,
    },

    /// Generate a new base64 master key.
    GenKey,

    /// Run the HTTP server.
    Serve {
        /// Listen address.
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

/// Request attributes an envelope is bound to.
#[derive(clap::Args)]
struct BindingArgs {
    /// HTTP method.
    #[arg(long, default_value = "POST")]
    method: String,

    /// Request path.
    #[arg(short, long)]
    path: String,

    /// Correlation id (X-Request-ID).
    #[arg(long)]
    request_id: Option<String>,

    /// Session id (X-Session-ID).
    #[arg(long)]
    session_id: Option<String>,
}

impl BindingArgs {
    fn binding(&self, correlation_id: &str) -> RequestBinding {
        RequestBinding::new(
            self.method.to_ascii_uppercase(),
            self.path.as_str(),
            correlation_id,
            self.session_id.as_deref().unwrap_or(""),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Tokenize {
            card,
            merchant,
            algorithm,
            contract,
            platform,
            customer,
        } => cmd_tokenize(&config, card, merchant, &algorithm, contract, platform, customer),

        Commands::Validate { algorithm, token } => cmd_validate(&config, &algorithm, &token),

        Commands::Seal { body, binding } => cmd_seal(&config, &body, &binding),

        Commands::Open { envelope, binding } => cmd_open(&config, &envelope, &binding),

        Commands::GenKey => cmd_gen_key(),

        Commands::Serve { addr } => cmd_serve(config, addr).await,
    }
}

/// Load configuration from file (if any) and apply environment overrides.
fn load_config(path: Option<&PathBuf>) -> Result<TokenVaultConfig> {
    let mut config = match path {
        Some(path) => TokenVaultConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TokenVaultConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid environment override")?;
    Ok(config)
}

/// Load the master key and install it as process-wide secret material.
fn load_secrets(config: &TokenVaultConfig) -> Result<Arc<SecretMaterial>> {
    let source = KeySource::from_settings(&config.secrets);
    debug!(source = ?source, "Loading master key");

    let secrets = SecretMaterial::from_source(&source).context("Master key unavailable")?;
    Ok(secrets.install_global()?)
}

/// Build a strategy; only COF needs the master key.
fn algorithm_for(
    config: &TokenVaultConfig,
    name: &str,
) -> Result<Arc<dyn TokenizationAlgorithm>> {
    let kind: AlgorithmType = name.parse()?;
    Ok(match kind {
        AlgorithmType::Simple => Arc::new(SimpleTokenizer::new()),
        AlgorithmType::Fpe => Arc::new(FpeTokenizer::new()),
        AlgorithmType::Cof => Arc::new(CofTokenizer::new(load_secrets(config)?)),
    })
}

fn cmd_tokenize(
    config: &TokenVaultConfig,
    card: String,
    merchant: String,
    algorithm: &str,
    contract: Option<String>,
    platform: Option<String>,
    customer: Option<String>,
) -> Result<()> {
    let algorithm = algorithm_for(config, algorithm)?;

    let mut ctx = match contract {
        Some(contract) => TokenizationContext::card_on_file(card, merchant, contract),
        None => TokenizationContext::new(card, merchant),
    };
    if let Some(platform) = platform {
        ctx = ctx.with_platform(platform);
    }
    if let Some(customer) = customer {
        ctx = ctx.with_customer(customer);
    }

    let token = algorithm.tokenize(&ctx).context("Tokenization failed")?;
    info!(
        algorithm = %algorithm.algorithm_type(),
        card = %ctx.card_number.masked(),
        "Token issued"
    );

    println!("{}", token);
    Ok(())
}

fn cmd_validate(config: &TokenVaultConfig, algorithm: &str, token: &str) -> Result<()> {
    let algorithm = algorithm_for(config, algorithm)?;
    algorithm.ensure_valid(token)?;

    println!(
        "Token is a valid {} token ({})",
        algorithm.algorithm_type(),
        algorithm.token_format()
    );
    Ok(())
}

fn cmd_seal(config: &TokenVaultConfig, body: &str, args: &BindingArgs) -> Result<()> {
    let secrets = load_secrets(config)?;

    // A sealed request is only accepted with the same X-Request-ID
    let correlation_id = args
        .request_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let binding = args.binding(&correlation_id);

    let envelope = Envelope::seal(secrets.transport_key(), body.as_bytes(), &binding.aad())
        .context("Failed to seal body")?;

    if args.request_id.is_none() {
        eprintln!("X-Request-ID: {}", correlation_id);
    }
    println!("{}", serde_json::to_string(&envelope)?);
    Ok(())
}

fn cmd_open(config: &TokenVaultConfig, envelope: &str, args: &BindingArgs) -> Result<()> {
    let secrets = load_secrets(config)?;

    let envelope = Envelope::from_slice(envelope.as_bytes()).context("Invalid envelope")?;
    let binding = args.binding(args.request_id.as_deref().unwrap_or(""));

    let plaintext = envelope
        .open(secrets.transport_key(), &binding.aad())
        .context("Failed to open envelope")?;

    println!("{}", String::from_utf8_lossy(&plaintext));
    Ok(())
}

fn cmd_gen_key() -> Result<()> {
    let encoded = Zeroizing::new(MasterKey::generate().to_base64());
    println!("{}", encoded.as_str());
    Ok(())
}

async fn cmd_serve(config: TokenVaultConfig, addr: SocketAddr) -> Result<()> {
    let secrets = load_secrets(&config)?;
    server::serve(config, secrets, addr).await
}
