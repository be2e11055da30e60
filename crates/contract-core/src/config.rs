//! Configuration for the contract signing system.
//!
//! Loaded once at startup and handed to the service explicitly.

use crate::render::RenderDefaults;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Whether signing failures may degrade to unsigned output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMode {
    /// Missing identity or signing failures log a warning and return the
    /// unsigned document.
    #[default]
    Development,
    /// Every identity or signing failure is returned to the caller.
    Production,
}

/// Subject of the self-signed certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub display_name: String,
    pub organization: String,
    pub validity_days: i64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            display_name: "Contract Signing Service".to_string(),
            organization: "Rental Administration".to_string(),
            validity_days: 365,
        }
    }
}

/// Signing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub mode: SigningMode,
    /// Directory holding the private key and certificate.
    pub certificate_dir: PathBuf,
    pub key_file_name: String,
    pub certificate_file_name: String,
    /// Allow the signing path to create an identity when none exists.
    pub auto_generate_identity: bool,
    pub identity: IdentitySettings,
    /// Days a signing request stays open.
    pub retention_days: u32,
    pub sweep_interval_secs: u64,
    /// Prefix of the link sent to recipients; the request id is appended.
    pub signing_base_url: String,
    /// Where rendered and signed documents are written.
    pub document_dir: PathBuf,
    pub signature_reason: String,
    pub signature_location: String,
    pub render: RenderDefaults,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            mode: SigningMode::Development,
            certificate_dir: PathBuf::from("./certs"),
            key_file_name: "signing-key.pem".to_string(),
            certificate_file_name: "signing-cert.pem".to_string(),
            auto_generate_identity: true,
            identity: IdentitySettings::default(),
            retention_days: 7,
            sweep_interval_secs: 300,
            signing_base_url: "http://localhost:3000/contracts/sign".to_string(),
            document_dir: PathBuf::from("./documents"),
            signature_reason: "Aceptación del contrato de arrendamiento".to_string(),
            signature_location: "Bogotá D.C., Colombia".to_string(),
            render: RenderDefaults::default(),
        }
    }
}

impl SigningConfig {
    /// Load configuration from the environment.
    ///
    /// Reads `.env` when present, then an optional file named by
    /// `SIGNING_CONFIG_FILE`, then `SIGNING_*` variables (nested keys use
    /// `__`, e.g. `SIGNING_IDENTITY__DISPLAY_NAME`).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Ok(path) = env::var("SIGNING_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("SIGNING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_settings(settings)
    }

    /// Deserialize and validate already-collected settings.
    pub fn from_settings(settings: config::Config) -> Result<Self> {
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_file_name == self.certificate_file_name {
            return Err(Error::Config {
                message: "key and certificate file names must differ".to_string(),
            });
        }
        if self.identity.validity_days <= 0 {
            return Err(Error::Config {
                message: "identity validity must be at least one day".to_string(),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config {
                message: "sweep interval must be positive".to_string(),
            });
        }
        if self.signing_base_url.trim().is_empty() {
            return Err(Error::Config {
                message: "signing base URL is required".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.mode == SigningMode::Production
    }

    pub fn key_path(&self) -> PathBuf {
        self.certificate_dir.join(&self.key_file_name)
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.certificate_dir.join(&self.certificate_file_name)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days as i64)
    }

    /// Link sent to the recipient of a signing request.
    pub fn signing_url(&self, request_id: uuid::Uuid) -> String {
        format!("{}/{}", self.signing_base_url.trim_end_matches('/'), request_id)
    }

    /// Configuration for tests: development mode rooted at `dir`.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            certificate_dir: dir.join("certs"),
            document_dir: dir.join("documents"),
            ..Self::default()
        }
    }
}
