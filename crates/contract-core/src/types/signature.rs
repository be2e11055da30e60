//! Metadata embedded alongside a document signature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who signed, when and why. Carried into the signer and embedded in the
/// signed document; never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    pub signer_name: String,
    pub signer_email: String,
    pub signed_at: DateTime<Utc>,
    pub reason: String,
    pub location: String,
    /// Signing request that produced this signature.
    pub request_id: Uuid,
}
