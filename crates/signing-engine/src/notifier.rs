//! Notifications sent to signing request recipients.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Sent when a signing request is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInvitation {
    pub request_id: Uuid,
    pub contract_id: String,
    pub recipient_email: String,
    pub signing_url: String,
    /// Expiry as a Spanish long date, e.g. "26 de octubre de 2026".
    pub formatted_expiry_date: String,
}

/// Sent after a request is signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocumentNotice {
    pub request_id: Uuid,
    pub contract_id: String,
    pub recipient_email: String,
    pub signed_document_bytes: Vec<u8>,
    /// False when development mode produced an unsigned document.
    pub cryptographically_signed: bool,
}

/// Delivers signing notifications (email or otherwise).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SigningNotifier: Send + Sync {
    async fn signing_requested(&self, invitation: &SigningInvitation) -> Result<()>;

    async fn document_signed(&self, notice: &SignedDocumentNotice) -> Result<()>;
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl SigningNotifier for LogNotifier {
    async fn signing_requested(&self, invitation: &SigningInvitation) -> Result<()> {
        info!(
            request_id = %invitation.request_id,
            recipient = %invitation.recipient_email,
            url = %invitation.signing_url,
            expires = %invitation.formatted_expiry_date,
            "Signing invitation"
        );
        Ok(())
    }

    async fn document_signed(&self, notice: &SignedDocumentNotice) -> Result<()> {
        info!(
            request_id = %notice.request_id,
            recipient = %notice.recipient_email,
            bytes = notice.signed_document_bytes.len(),
            signed = notice.cryptographically_signed,
            "Signed document ready"
        );
        Ok(())
    }
}
