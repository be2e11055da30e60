//! contract-signer - administrative CLI for the contract signing system.
//!
//! Identity generation and rotation are explicit here; the signing path never
//! replaces a valid identity on its own.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use contract_core::config::SigningConfig;
use contract_core::types::{ContractDocument, SignatureMetadata};
use contract_core::DocumentRenderer;
use identity::{
    inspect_document, verify_document, CertificateManager, DocumentSigner, SigningIdentity,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "contract-signer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding the signing key and certificate (overrides configuration)
    #[arg(long, global = true)]
    certificate_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Signing identity management
    #[command(subcommand)]
    Identity(IdentityCommands),

    /// Render a contract JSON file to PDF
    Render {
        /// Contract document in JSON
        contract: PathBuf,
        /// Output PDF
        output: PathBuf,
    },

    /// Sign a PDF with the configured identity
    Sign {
        input: PathBuf,
        output: PathBuf,
        /// Signer display name
        #[arg(long)]
        signer_name: String,
        /// Signer email
        #[arg(long)]
        signer_email: String,
        /// Signing request the signature belongs to
        #[arg(long)]
        request_id: Option<Uuid>,
    },

    /// Verify a signed PDF against the configured identity
    Verify { input: PathBuf },
}

#[derive(Subcommand, Debug)]
enum IdentityCommands {
    /// Load the identity, creating it when missing or expired
    Init,
    /// Replace the identity with a new one
    Rotate,
    /// Print the current identity
    Show,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contract_signer=info,signing_engine=info,identity=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = SigningConfig::from_env().context("Failed to load signing configuration")?;
    if let Some(dir) = cli.certificate_dir {
        config.certificate_dir = dir;
    }

    match cli.command {
        Commands::Identity(command) => identity_command(&config, command)?,
        Commands::Render { contract, output } => render(&config, &contract, &output)?,
        Commands::Sign {
            input,
            output,
            signer_name,
            signer_email,
            request_id,
        } => {
            let metadata = SignatureMetadata {
                signer_name,
                signer_email,
                signed_at: Utc::now(),
                reason: config.signature_reason.clone(),
                location: config.signature_location.clone(),
                request_id: request_id.unwrap_or_else(Uuid::new_v4),
            };
            sign(&config, &input, &output, &metadata)?
        }
        Commands::Verify { input } => return verify(&config, &input),
    }
    Ok(ExitCode::SUCCESS)
}

fn identity_command(config: &SigningConfig, command: IdentityCommands) -> Result<()> {
    let manager = CertificateManager::from_config(config);
    let identity = match command {
        IdentityCommands::Init => manager.load_or_generate()?,
        IdentityCommands::Rotate => {
            let identity = manager.generate()?;
            info!(serial = %identity.serial(), "Identity rotated from CLI");
            identity
        }
        IdentityCommands::Show => manager.load()?,
    };
    print_identity(&manager, &identity);
    Ok(())
}

fn print_identity(manager: &CertificateManager, identity: &SigningIdentity) {
    println!("subject:     {}", identity.display_name());
    println!("serial:      {}", identity.serial());
    println!("not before:  {}", identity.not_before());
    println!("not after:   {}", identity.not_after());
    println!("fingerprint: {}", identity.fingerprint());
    println!("key:         {}", manager.key_path().display());
    println!("certificate: {}", manager.certificate_path().display());
}

fn render(config: &SigningConfig, contract: &Path, output: &Path) -> Result<()> {
    let json = fs::read_to_string(contract)
        .with_context(|| format!("Failed to read {}", contract.display()))?;
    let document: ContractDocument =
        serde_json::from_str(&json).context("Failed to parse contract JSON")?;

    let bytes = DocumentRenderer::new(config.render.clone()).render(&document)?;
    fs::write(output, &bytes).with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        contract_id = %document.contract_id,
        bytes = bytes.len(),
        output = %output.display(),
        "Rendered contract"
    );
    Ok(())
}

fn sign(
    config: &SigningConfig,
    input: &Path,
    output: &Path,
    metadata: &SignatureMetadata,
) -> Result<()> {
    let document = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let manager = Arc::new(CertificateManager::from_config(config));
    let outcome = DocumentSigner::new(manager, config.mode).sign(&document, metadata)?;
    fs::write(output, &outcome.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if outcome.is_signed() {
        println!("signed: {}", output.display());
    } else {
        println!("unsigned (development mode): {}", output.display());
    }
    Ok(())
}

fn verify(config: &SigningConfig, input: &Path) -> Result<ExitCode> {
    let document = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let identity = CertificateManager::from_config(config).load()?;

    let attributes = match inspect_document(&document) {
        Ok(attributes) => attributes,
        Err(e) => bail!("{} carries no contract signature: {}", input.display(), e),
    };
    println!("signer:     {} <{}>", attributes.signer_name, attributes.signer_email);
    println!("signed at:  {}", attributes.signed_at);
    println!("request:    {}", attributes.request_id);

    if verify_document(&document, &identity) {
        println!("signature:  valid");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("signature:  INVALID for certificate {}", identity.serial());
        Ok(ExitCode::FAILURE)
    }
}
