//! Signature request lifecycle types.
//!
//! A request starts `Pending` and ends in exactly one of the absorbing states
//! `Signed`, `Rejected` or `Expired`.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Status of a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    /// Waiting for the recipient.
    Pending,
    /// Document signed by the recipient.
    Signed,
    /// Recipient declined to sign.
    Rejected,
    /// Retention period elapsed before a decision.
    Expired,
}

impl SigningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SigningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "signed" => Ok(Self::Signed),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            other => Err(Error::validation(
                "status",
                format!("unknown signing status '{}'", other),
            )),
        }
    }
}

/// Who is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub email: String,
}

impl Recipient {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// One signature request for one contract.
///
/// Fields are private so the status only moves through the `mark_*` methods and
/// `expires_at` stays fixed after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    id: Uuid,
    contract_id: String,
    recipient_id: String,
    recipient_email: String,
    status: SigningStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    signed_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    signature_blob: Option<Vec<u8>>,
    source_document_path: String,
    signed_document_path: Option<String>,
}

impl SigningRequest {
    /// Create a new pending request expiring `retention` after `created_at`.
    pub fn new(
        id: Uuid,
        contract_id: impl Into<String>,
        recipient: &Recipient,
        source_document_path: impl Into<String>,
        created_at: DateTime<Utc>,
        retention: Duration,
    ) -> Self {
        Self {
            id,
            contract_id: contract_id.into(),
            recipient_id: recipient.id.clone(),
            recipient_email: recipient.email.clone(),
            status: SigningStatus::Pending,
            created_at,
            expires_at: created_at + retention,
            signed_at: None,
            rejected_at: None,
            signature_blob: None,
            source_document_path: source_document_path.into(),
            signed_document_path: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    pub fn recipient_email(&self) -> &str {
        &self.recipient_email
    }

    pub fn status(&self) -> SigningStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn signed_at(&self) -> Option<DateTime<Utc>> {
        self.signed_at
    }

    pub fn rejected_at(&self) -> Option<DateTime<Utc>> {
        self.rejected_at
    }

    pub fn signature_blob(&self) -> Option<&[u8]> {
        self.signature_blob.as_deref()
    }

    pub fn source_document_path(&self) -> &str {
        &self.source_document_path
    }

    pub fn signed_document_path(&self) -> Option<&str> {
        self.signed_document_path.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the retention period has elapsed at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Fail unless the request is still pending.
    pub fn ensure_pending(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::AlreadyTerminal {
                request_id: self.id,
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Fail unless the request can be signed at `now`.
    ///
    /// Checks expiry directly so an overdue request that the sweep has not
    /// reached yet is still refused.
    pub fn ensure_signable(&self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        if self.is_overdue(now) {
            return Err(Error::ExpiredRequest {
                request_id: self.id,
                expires_at: self.expires_at,
            });
        }
        Ok(())
    }

    /// Transition `Pending -> Signed`.
    pub fn mark_signed(
        &mut self,
        now: DateTime<Utc>,
        signed_document_path: impl Into<String>,
        signature_blob: Option<Vec<u8>>,
    ) -> Result<()> {
        self.ensure_signable(now)?;
        self.status = SigningStatus::Signed;
        self.signed_at = Some(now);
        self.signed_document_path = Some(signed_document_path.into());
        self.signature_blob = signature_blob;
        Ok(())
    }

    /// Transition `Pending -> Rejected`.
    pub fn mark_rejected(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = SigningStatus::Rejected;
        self.rejected_at = Some(now);
        Ok(())
    }

    /// Transition `Pending -> Expired` when overdue. Returns whether it changed.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != SigningStatus::Pending || !self.is_overdue(now) {
            return false;
        }
        self.status = SigningStatus::Expired;
        true
    }
}

/// Persisted shape of a signing request, shared with the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequestRecord {
    pub id: Uuid,
    pub contract_id: String,
    pub recipient_id: String,
    pub recipient_email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub signed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    /// Base64 of the raw signature bytes.
    pub signature_data: Option<String>,
    pub pdf_path: String,
    pub signed_pdf_path: Option<String>,
}

impl From<&SigningRequest> for SigningRequestRecord {
    fn from(request: &SigningRequest) -> Self {
        Self {
            id: request.id,
            contract_id: request.contract_id.clone(),
            recipient_id: request.recipient_id.clone(),
            recipient_email: request.recipient_email.clone(),
            status: request.status.as_str().to_string(),
            created_at: request.created_at,
            expires_at: request.expires_at,
            signed_at: request.signed_at,
            rejected_at: request.rejected_at,
            signature_data: request
                .signature_blob
                .as_ref()
                .map(|b| base64::engine::general_purpose::STANDARD.encode(b)),
            pdf_path: request.source_document_path.clone(),
            signed_pdf_path: request.signed_document_path.clone(),
        }
    }
}

impl TryFrom<SigningRequestRecord> for SigningRequest {
    type Error = Error;

    fn try_from(record: SigningRequestRecord) -> Result<Self> {
        let signature_blob = record
            .signature_data
            .map(|data| {
                base64::engine::general_purpose::STANDARD
                    .decode(data.as_bytes())
                    .map_err(|e| {
                        Error::validation("signature_data", format!("invalid base64: {}", e))
                    })
            })
            .transpose()?;

        Ok(Self {
            id: record.id,
            contract_id: record.contract_id,
            recipient_id: record.recipient_id,
            recipient_email: record.recipient_email,
            status: record.status.parse()?,
            created_at: record.created_at,
            expires_at: record.expires_at,
            signed_at: record.signed_at,
            rejected_at: record.rejected_at,
            signature_blob,
            source_document_path: record.pdf_path,
            signed_document_path: record.signed_pdf_path,
        })
    }
}
