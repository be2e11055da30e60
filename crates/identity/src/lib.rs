//! Identity Library
//!
//! Self-signed signing identities, PDF signature embedding and verification.

pub mod certificate;
pub mod envelope;
pub mod signer;

pub use certificate::{CertificateManager, IdentityProvider, SigningIdentity};
pub use signer::{
    inspect_document, sign_document, verify_document, DocumentSigner, SignedAttributes,
    SignedDocument, SigningOutcome,
};
