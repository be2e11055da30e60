//! Document signing and verification.
//!
//! A signature covers the SHA-256 digest of the exact bytes handed in plus the
//! signer metadata, serialized as canonical signed attributes. The result is
//! embedded in the document by [`crate::envelope`].

use crate::certificate::{IdentityProvider, SigningIdentity};
use crate::envelope::{self, SignatureEnvelope};
use chrono::{DateTime, SecondsFormat, Utc};
use contract_core::config::SigningMode;
use contract_core::types::SignatureMetadata;
use contract_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const ATTRIBUTES_VERSION: u32 = 1;

/// Attributes covered by the signature. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAttributes {
    pub version: u32,
    /// Hex SHA-256 of the covered bytes.
    pub digest: String,
    pub byte_length: usize,
    pub signer_name: String,
    pub signer_email: String,
    /// RFC 3339, second precision.
    pub signed_at: String,
    pub reason: String,
    pub location: String,
    pub request_id: Uuid,
    /// Hex SHA-256 of the signing certificate.
    pub certificate_fingerprint: String,
}

impl SignedAttributes {
    fn new(digest: &[u8], byte_length: usize, metadata: &SignatureMetadata, identity: &SigningIdentity) -> Self {
        Self {
            version: ATTRIBUTES_VERSION,
            digest: hex::encode(digest),
            byte_length,
            signer_name: metadata.signer_name.clone(),
            signer_email: metadata.signer_email.clone(),
            signed_at: metadata
                .signed_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            reason: metadata.reason.clone(),
            location: metadata.location.clone(),
            request_id: metadata.request_id,
            certificate_fingerprint: identity.fingerprint(),
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn signed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.signed_at)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }
}

/// A document with an embedded signature.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub bytes: Vec<u8>,
    /// DER ECDSA signature over the signed attributes.
    pub signature: Vec<u8>,
    /// SHA-256 of the original document.
    pub digest: Vec<u8>,
}

/// Sign `document` with `identity`, embedding the signature object.
pub fn sign_document(
    document: &[u8],
    identity: &SigningIdentity,
    metadata: &SignatureMetadata,
) -> Result<SignedDocument> {
    if !document.starts_with(b"%PDF-") {
        return Err(Error::signing("input is not a PDF document"));
    }

    let digest = Sha256::digest(document).to_vec();
    let attributes = SignedAttributes::new(&digest, document.len(), metadata, identity).to_bytes()?;
    let signature = identity.sign(&attributes)?;

    let envelope = SignatureEnvelope {
        byte_length: document.len(),
        digest: digest.clone(),
        attributes,
        signature: signature.clone(),
        certificate: identity.certificate_der().to_vec(),
    };
    let bytes = envelope::append(document, &envelope)?;

    debug!(
        request_id = %metadata.request_id,
        signer = %metadata.signer_email,
        bytes = bytes.len(),
        "Document signed"
    );

    Ok(SignedDocument {
        bytes,
        signature,
        digest,
    })
}

/// Read the signed attributes of `signed` without checking them.
pub fn inspect_document(signed: &[u8]) -> Result<SignedAttributes> {
    let envelope = envelope::extract(signed)?;
    Ok(serde_json::from_slice(&envelope.attributes)?)
}

/// True when `signed` carries a signature by `identity` over its unmodified
/// original bytes.
pub fn verify_document(signed: &[u8], identity: &SigningIdentity) -> bool {
    match check_document(signed, identity) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Signature verification failed");
            false
        }
    }
}

fn check_document(signed: &[u8], identity: &SigningIdentity) -> Result<()> {
    let envelope = envelope::extract(signed)?;

    if envelope.certificate != identity.certificate_der() {
        return Err(Error::signing("document was signed by a different certificate"));
    }
    if !identity.verify(&envelope.attributes, &envelope.signature) {
        return Err(Error::signing("signature does not match"));
    }

    let attributes: SignedAttributes = serde_json::from_slice(&envelope.attributes)?;
    let covered = &signed[..envelope.byte_length];
    let digest = Sha256::digest(covered);

    if attributes.version != ATTRIBUTES_VERSION {
        return Err(Error::signing(format!(
            "unsupported signature version {}",
            attributes.version
        )));
    }
    if attributes.byte_length != envelope.byte_length
        || attributes.digest != hex::encode(digest)
        || envelope.digest != digest.to_vec()
    {
        return Err(Error::signing("document content was modified"));
    }
    if attributes.certificate_fingerprint != identity.fingerprint() {
        return Err(Error::signing("certificate fingerprint mismatch"));
    }
    Ok(())
}

/// Result of [`DocumentSigner::sign`].
#[derive(Debug, Clone)]
pub struct SigningOutcome {
    pub bytes: Vec<u8>,
    /// `None` when development mode fell back to the unsigned document.
    pub signature: Option<Vec<u8>>,
}

impl SigningOutcome {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Signs documents with the provider's current identity, applying the
/// degradation policy of the configured [`SigningMode`].
#[derive(Clone)]
pub struct DocumentSigner {
    provider: Arc<dyn IdentityProvider>,
    mode: SigningMode,
}

impl DocumentSigner {
    pub fn new(provider: Arc<dyn IdentityProvider>, mode: SigningMode) -> Self {
        Self { provider, mode }
    }

    pub fn mode(&self) -> SigningMode {
        self.mode
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Sign `document`.
    ///
    /// In production every failure is returned. In development a missing
    /// identity or a signing failure logs a warning and yields the unsigned
    /// document.
    pub fn sign(&self, document: &[u8], metadata: &SignatureMetadata) -> Result<SigningOutcome> {
        let result = self
            .provider
            .identity()
            .and_then(|identity| sign_document(document, &identity, metadata));

        match (result, self.mode) {
            (Ok(signed), _) => Ok(SigningOutcome {
                bytes: signed.bytes,
                signature: Some(signed.signature),
            }),
            (Err(e), SigningMode::Production) => Err(e),
            (Err(e), SigningMode::Development) => {
                warn!(
                    request_id = %metadata.request_id,
                    error = %e,
                    "Signing unavailable, returning unsigned document"
                );
                Ok(SigningOutcome {
                    bytes: document.to_vec(),
                    signature: None,
                })
            }
        }
    }

    /// Verify `signed` against the provider's current identity.
    pub fn verify(&self, signed: &[u8]) -> Result<bool> {
        let identity = self.provider.identity()?;
        Ok(verify_document(signed, &identity))
    }
}
