//! Signing identity: an ECDSA P-256 key pair and its self-signed certificate.
//!
//! The identity is persisted as two PEM files. Loading and generation for one
//! key path are serialized process-wide, and both files are written to
//! temporary names and renamed into place, so concurrent first-time
//! initialization produces exactly one identity.

use chrono::{DateTime, Duration, Utc};
use contract_core::config::{IdentitySettings, SigningConfig};
use contract_core::{Error, Result};
use dashmap::DashMap;
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_ASN1,
    ECDSA_P256_SHA256_ASN1_SIGNING,
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, RwLock};
use ::time::OffsetDateTime;
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

/// Locks keyed by absolute key path, shared by every manager in the process.
static PATH_LOCKS: LazyLock<DashMap<PathBuf, Arc<Mutex<()>>>> = LazyLock::new(DashMap::new);

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    PATH_LOCKS
        .entry(key)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// A loaded key pair plus certificate.
#[derive(Clone)]
pub struct SigningIdentity {
    display_name: String,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    certificate_pem: String,
    certificate_der: Vec<u8>,
    public_key: Vec<u8>,
    private_key_pem: String,
    key_pair: Arc<EcdsaKeyPair>,
}

impl SigningIdentity {
    /// Parse an identity from its two PEM artifacts.
    ///
    /// The certificate must carry a valid self-signature and the key must match
    /// the certificate's public key.
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str) -> Result<Self> {
        let pkcs8 = rcgen::KeyPair::from_pem(private_key_pem)
            .map_err(|e| Error::certificate(format!("invalid private key PEM: {}", e)))?
            .serialize_der();

        let (_, pem) = parse_x509_pem(certificate_pem.as_bytes())
            .map_err(|e| Error::certificate(format!("invalid certificate PEM: {}", e)))?;
        if pem.label != "CERTIFICATE" {
            return Err(Error::certificate(format!(
                "expected a CERTIFICATE block, found {}",
                pem.label
            )));
        }
        let certificate_der = pem.contents;

        let (_, cert) = parse_x509_certificate(&certificate_der)
            .map_err(|e| Error::certificate(format!("invalid certificate: {}", e)))?;
        cert.verify_signature(None)
            .map_err(|e| Error::certificate(format!("certificate self-signature invalid: {}", e)))?;

        let public_key = cert.public_key().subject_public_key.data.to_vec();
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &ECDSA_P256_SHA256_ASN1_SIGNING,
            &pkcs8,
            &SystemRandom::new(),
        )
        .map_err(|e| Error::certificate(format!("unsupported private key: {}", e)))?;

        if key_pair.public_key().as_ref() != public_key.as_slice() {
            return Err(Error::certificate(
                "private key does not match certificate",
            ));
        }

        let validity = cert.validity();
        let not_before = timestamp(validity.not_before.timestamp())?;
        let not_after = timestamp(validity.not_after.timestamp())?;
        let display_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();
        let serial = cert.raw_serial_as_string();

        Ok(Self {
            display_name,
            serial,
            not_before,
            not_after,
            certificate_pem: certificate_pem.to_string(),
            certificate_der: certificate_der.clone(),
            public_key,
            private_key_pem: private_key_pem.to_string(),
            key_pair: Arc::new(key_pair),
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Certificate serial number as colon-separated hex.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    /// Uncompressed SEC1 public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// SHA-256 of the DER certificate, hex encoded.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.certificate_der))
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now < self.not_after
    }

    /// ECDSA P-256/SHA-256 signature over `message`, DER encoded.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .key_pair
            .sign(&SystemRandom::new(), message)
            .map_err(|_| Error::signing("ECDSA signing failed"))?;
        Ok(signature.as_ref().to_vec())
    }

    /// Check a DER signature against this identity's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, &self.public_key)
            .verify(message, signature)
            .is_ok()
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("display_name", &self.display_name)
            .field("serial", &self.serial)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::certificate(format!("certificate time {} out of range", secs)))
}

fn offset_time(at: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| Error::certificate(format!("certificate time out of range: {}", e)))
}

/// Source of the identity used by the signing path.
///
/// [`CertificateManager`] keeps a self-signed identity on disk; an externally
/// issued certificate can be plugged in behind the same trait.
pub trait IdentityProvider: Send + Sync {
    /// The current identity.
    fn identity(&self) -> Result<Arc<SigningIdentity>>;

    /// Replace the identity with a freshly generated one.
    fn rotate(&self) -> Result<Arc<SigningIdentity>>;
}

/// Manages the self-signed identity stored under one directory.
pub struct CertificateManager {
    key_path: PathBuf,
    certificate_path: PathBuf,
    settings: IdentitySettings,
    /// Whether `identity()` may create a missing identity.
    auto_generate: bool,
    cached: RwLock<Option<Arc<SigningIdentity>>>,
}

impl CertificateManager {
    /// Create a manager for the given artifact paths.
    pub fn new(
        key_path: impl Into<PathBuf>,
        certificate_path: impl Into<PathBuf>,
        settings: IdentitySettings,
    ) -> Self {
        Self {
            key_path: key_path.into(),
            certificate_path: certificate_path.into(),
            settings,
            auto_generate: true,
            cached: RwLock::new(None),
        }
    }

    /// Create a manager using the default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, settings: IdentitySettings) -> Self {
        let defaults = SigningConfig::default();
        Self::new(
            dir.as_ref().join(defaults.key_file_name),
            dir.as_ref().join(defaults.certificate_file_name),
            settings,
        )
    }

    pub fn from_config(config: &SigningConfig) -> Self {
        Self::new(
            config.key_path(),
            config.certificate_path(),
            config.identity.clone(),
        )
        .with_auto_generate(config.auto_generate_identity)
    }

    pub fn with_auto_generate(mut self, auto_generate: bool) -> Self {
        self.auto_generate = auto_generate;
        self
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn certificate_path(&self) -> &Path {
        &self.certificate_path
    }

    /// Load the identity from disk without ever generating one.
    pub fn load(&self) -> Result<SigningIdentity> {
        let lock = path_lock(&self.key_path);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        self.read_artifacts()?.ok_or_else(|| {
            Error::certificate(format!(
                "no signing identity at {}",
                self.key_path.display()
            ))
        })
    }

    /// Load the identity, generating and persisting a new one when the
    /// artifacts are missing, unreadable or expired.
    pub fn load_or_generate(&self) -> Result<SigningIdentity> {
        let lock = path_lock(&self.key_path);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        match self.read_artifacts() {
            Ok(Some(identity)) if identity.is_valid_at(Utc::now()) => {
                debug!(
                    path = %self.key_path.display(),
                    serial = %identity.serial(),
                    "Loaded signing identity"
                );
                return Ok(identity);
            }
            Ok(Some(identity)) => {
                warn!(
                    path = %self.key_path.display(),
                    not_after = %identity.not_after(),
                    "Signing certificate expired, generating a new identity"
                );
            }
            Ok(None) => {
                info!(path = %self.key_path.display(), "No signing identity found, generating one");
            }
            Err(e) => {
                warn!(
                    path = %self.key_path.display(),
                    error = %e,
                    "Signing identity unreadable, generating a new one"
                );
            }
        }

        self.generate_locked()
    }

    /// Unconditionally generate and persist a new identity, replacing any
    /// existing one. Administrative operation only.
    pub fn generate(&self) -> Result<SigningIdentity> {
        let lock = path_lock(&self.key_path);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        warn!(path = %self.key_path.display(), "Regenerating signing identity");
        self.generate_locked()
    }

    fn generate_locked(&self) -> Result<SigningIdentity> {
        let (key_pem, certificate_pem) = generate_pems(&self.settings, Utc::now())?;
        self.write_artifacts(&key_pem, &certificate_pem)?;

        let identity = SigningIdentity::from_pem(&key_pem, &certificate_pem)?;
        info!(
            path = %self.key_path.display(),
            serial = %identity.serial(),
            not_after = %identity.not_after(),
            "Generated signing identity"
        );
        Ok(identity)
    }

    /// `Ok(None)` when neither artifact exists.
    fn read_artifacts(&self) -> Result<Option<SigningIdentity>> {
        let key_exists = self.key_path.exists();
        let certificate_exists = self.certificate_path.exists();

        match (key_exists, certificate_exists) {
            (false, false) => Ok(None),
            (true, true) => {
                let key_pem = fs::read_to_string(&self.key_path)?;
                let certificate_pem = fs::read_to_string(&self.certificate_path)?;
                SigningIdentity::from_pem(&key_pem, &certificate_pem).map(Some)
            }
            _ => Err(Error::certificate(format!(
                "incomplete signing identity at {} / {}",
                self.key_path.display(),
                self.certificate_path.display()
            ))),
        }
    }

    fn write_artifacts(&self, key_pem: &str, certificate_pem: &str) -> Result<()> {
        for path in [&self.key_path, &self.certificate_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let key_tmp = self.key_path.with_extension("pem.tmp");
        let certificate_tmp = self.certificate_path.with_extension("pem.tmp");
        write_private(&key_tmp, key_pem.as_bytes())?;
        write_private(&certificate_tmp, certificate_pem.as_bytes())?;

        // Certificate first: a crash between the renames leaves a new
        // certificate beside the old key, which fails the key match on the
        // next load and is regenerated by `load_or_generate`.
        fs::rename(&certificate_tmp, &self.certificate_path)?;
        fs::rename(&key_tmp, &self.key_path)?;
        Ok(())
    }

    fn cache(&self, identity: SigningIdentity) -> Arc<SigningIdentity> {
        let identity = Arc::new(identity);
        let mut cached = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(identity.clone());
        identity
    }
}

impl IdentityProvider for CertificateManager {
    fn identity(&self) -> Result<Arc<SigningIdentity>> {
        {
            let cached = self.cached.read().unwrap_or_else(|e| e.into_inner());
            if let Some(identity) = cached.as_ref() {
                if identity.is_valid_at(Utc::now()) {
                    return Ok(identity.clone());
                }
            }
        }

        let identity = if self.auto_generate {
            self.load_or_generate()?
        } else {
            self.load()?
        };
        Ok(self.cache(identity))
    }

    fn rotate(&self) -> Result<Arc<SigningIdentity>> {
        let identity = self.generate()?;
        Ok(self.cache(identity))
    }
}

/// Create a fresh key pair and self-signed certificate as PEM strings.
fn generate_pems(settings: &IdentitySettings, now: DateTime<Utc>) -> Result<(String, String)> {
    let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
        .map_err(|e| Error::certificate(format!("key generation failed: {}", e)))?;

    let mut params = rcgen::CertificateParams::new(Vec::<String>::new())
        .map_err(|e| Error::certificate(format!("invalid certificate parameters: {}", e)))?;

    let mut name = rcgen::DistinguishedName::new();
    name.push(rcgen::DnType::CommonName, settings.display_name.as_str());
    name.push(rcgen::DnType::OrganizationName, settings.organization.as_str());
    params.distinguished_name = name;

    params.not_before = offset_time(now)?;
    params.not_after = offset_time(now + Duration::days(settings.validity_days))?;

    // Positive 128-bit serial
    let mut serial = rand::random::<[u8; 16]>();
    serial[0] &= 0x7f;
    params.serial_number = Some(rcgen::SerialNumber::from_slice(&serial));

    params.is_ca = rcgen::IsCa::NoCa;
    params.key_usages = vec![
        rcgen::KeyUsagePurpose::DigitalSignature,
        rcgen::KeyUsagePurpose::ContentCommitment,
    ];

    let certificate = params
        .self_signed(&key_pair)
        .map_err(|e| Error::certificate(format!("certificate signing failed: {}", e)))?;

    Ok((key_pair.serialize_pem(), certificate.pem()))
}

/// Write a file readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn settings() -> IdentitySettings {
        IdentitySettings {
            display_name: "Test Signer".to_string(),
            organization: "Test Org".to_string(),
            validity_days: 365,
        }
    }

    #[test]
    fn test_generate_creates_valid_identity() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());

        let identity = manager.load_or_generate().unwrap();
        assert_eq!(identity.display_name(), "Test Signer");
        assert!(identity.is_valid_at(Utc::now()));
        let validity = identity.not_after() - identity.not_before();
        assert_eq!(validity.num_days(), 365);
        assert!(manager.key_path().exists());
        assert!(manager.certificate_path().exists());
        assert!(identity.certificate_pem().starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_second_call_loads_same_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());

        let first = manager.load_or_generate().unwrap();
        let key_bytes = fs::read(manager.key_path()).unwrap();
        let cert_bytes = fs::read(manager.certificate_path()).unwrap();

        let second = manager.load_or_generate().unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(fs::read(manager.key_path()).unwrap(), key_bytes);
        assert_eq!(fs::read(manager.certificate_path()).unwrap(), cert_bytes);
    }

    #[test]
    fn test_generate_replaces_identity() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());

        let first = manager.load_or_generate().unwrap();
        let rotated = manager.generate().unwrap();
        assert_ne!(first.fingerprint(), rotated.fingerprint());
        assert_eq!(manager.load().unwrap().fingerprint(), rotated.fingerprint());
    }

    #[test]
    fn test_load_without_artifacts_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());

        assert!(matches!(manager.load(), Err(Error::Certificate { .. })));
        assert!(!manager.key_path().exists());
    }

    #[test]
    fn test_corrupt_artifacts_are_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());
        let original = manager.load_or_generate().unwrap();

        fs::write(manager.certificate_path(), "not a certificate").unwrap();
        assert!(manager.load().is_err());

        let regenerated = manager.load_or_generate().unwrap();
        assert_ne!(original.fingerprint(), regenerated.fingerprint());
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = CertificateManager::in_dir(dir_a.path(), settings())
            .load_or_generate()
            .unwrap();
        let b = CertificateManager::in_dir(dir_b.path(), settings())
            .load_or_generate()
            .unwrap();

        let err = SigningIdentity::from_pem(a.private_key_pem(), b.certificate_pem()).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_interrupted_rotation_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());
        let old = manager.load_or_generate().unwrap();

        // new certificate renamed into place, old key still on disk
        let (_, new_certificate) = generate_pems(&settings(), Utc::now()).unwrap();
        fs::write(manager.certificate_path(), &new_certificate).unwrap();
        assert!(manager.load().is_err());

        let recovered = manager.load_or_generate().unwrap();
        assert_ne!(recovered.fingerprint(), old.fingerprint());
        assert_eq!(
            fs::read_to_string(manager.key_path()).unwrap(),
            recovered.private_key_pem()
        );
        assert!(manager.load().is_ok());
    }

    #[test]
    fn test_missing_half_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());
        manager.load_or_generate().unwrap();

        fs::remove_file(manager.key_path()).unwrap();
        let err = manager.load().unwrap_err();
        assert!(err.to_string().contains("incomplete"));
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());
        manager.load_or_generate().unwrap();

        let mode = fs::metadata(manager.key_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_concurrent_initialization_yields_one_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                thread::spawn(move || {
                    CertificateManager::in_dir(&path, settings())
                        .load_or_generate()
                        .unwrap()
                        .fingerprint()
                })
            })
            .collect();

        let fingerprints: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(fingerprints.iter().all(|f| f == &fingerprints[0]));
    }

    #[test]
    fn test_sign_and_verify_message() {
        let dir = tempfile::tempdir().unwrap();
        let identity = CertificateManager::in_dir(dir.path(), settings())
            .load_or_generate()
            .unwrap();

        let signature = identity.sign(b"message").unwrap();
        assert!(identity.verify(b"message", &signature));
        assert!(!identity.verify(b"other message", &signature));
    }

    #[test]
    fn test_provider_caches_identity() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings());

        let first = manager.identity().unwrap();
        let second = manager.identity().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let rotated = manager.rotate().unwrap();
        assert_ne!(first.fingerprint(), rotated.fingerprint());
        assert!(Arc::ptr_eq(&rotated, &manager.identity().unwrap()));
    }

    #[test]
    fn test_provider_without_auto_generate() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertificateManager::in_dir(dir.path(), settings()).with_auto_generate(false);

        assert!(matches!(manager.identity(), Err(Error::Certificate { .. })));
        assert!(!manager.key_path().exists());
    }
}
