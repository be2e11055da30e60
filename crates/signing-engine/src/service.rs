//! Orchestration of the signing workflow.

use chrono::Duration;
use contract_core::config::SigningConfig;
use contract_core::format::long_date;
use contract_core::types::{Recipient, SigningRequest};
use contract_core::{Error, Result};
use identity::{DocumentSigner, IdentityProvider, SigningIdentity};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::contracts::ContractSource;
use crate::documents::DocumentStore;
use crate::notifier::{SignedDocumentNotice, SigningInvitation, SigningNotifier};
use crate::repository::SigningRequestRepository;
use crate::state_machine::{SignedRequest, SigningRequestStateMachine};

/// Entry point used by the application: creates requests, signs, rejects,
/// sweeps and notifies recipients.
pub struct SigningService {
    config: SigningConfig,
    machine: SigningRequestStateMachine,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn SigningNotifier>,
}

impl SigningService {
    pub fn new(
        config: SigningConfig,
        repository: Arc<dyn SigningRequestRepository>,
        contracts: Arc<dyn ContractSource>,
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn SigningNotifier>,
    ) -> Self {
        Self::with_clock(
            config,
            repository,
            contracts,
            documents,
            identity,
            notifier,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        config: SigningConfig,
        repository: Arc<dyn SigningRequestRepository>,
        contracts: Arc<dyn ContractSource>,
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn SigningNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let signer = DocumentSigner::new(identity.clone(), config.mode);
        let machine = SigningRequestStateMachine::new(
            &config, repository, contracts, documents, signer, clock,
        );
        Self {
            config,
            machine,
            identity,
            notifier,
        }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Create a request using the configured retention period.
    pub async fn request_signature(
        &self,
        contract_id: &str,
        recipient: &Recipient,
    ) -> Result<SigningRequest> {
        self.request_signature_with_retention(contract_id, recipient, self.config.retention())
            .await
    }

    /// Create a request and send the invitation. A failed invitation is logged;
    /// the request stays created.
    pub async fn request_signature_with_retention(
        &self,
        contract_id: &str,
        recipient: &Recipient,
        retention: Duration,
    ) -> Result<SigningRequest> {
        let request = self.machine.create(contract_id, recipient, retention).await?;

        let invitation = SigningInvitation {
            request_id: request.id(),
            contract_id: request.contract_id().to_string(),
            recipient_email: request.recipient_email().to_string(),
            signing_url: self.config.signing_url(request.id()),
            formatted_expiry_date: long_date(request.expires_at().date_naive()),
        };
        if let Err(e) = self.notifier.signing_requested(&invitation).await {
            warn!(
                request_id = %request.id(),
                error = %Error::Notification(e),
                "Failed to send signing invitation"
            );
        }

        Ok(request)
    }

    /// Sign a request and deliver the signed document.
    pub async fn sign(&self, request_id: Uuid) -> Result<SignedRequest> {
        let signed = match self.machine.sign(request_id).await {
            Ok(signed) => signed,
            Err(e) => {
                if matches!(e, Error::Certificate { .. } | Error::Signing { .. }) {
                    error!(request_id = %request_id, error = %e, "Signing failed");
                }
                return Err(e);
            }
        };

        let notice = SignedDocumentNotice {
            request_id,
            contract_id: signed.request.contract_id().to_string(),
            recipient_email: signed.request.recipient_email().to_string(),
            signed_document_bytes: signed.document.clone(),
            cryptographically_signed: signed.cryptographically_signed,
        };
        if let Err(e) = self.notifier.document_signed(&notice).await {
            warn!(
                request_id = %request_id,
                error = %Error::Notification(e),
                "Failed to deliver signed document"
            );
        }

        Ok(signed)
    }

    pub async fn reject(&self, request_id: Uuid) -> Result<SigningRequest> {
        self.machine.reject(request_id).await
    }

    pub async fn expire_sweep(&self) -> Result<usize> {
        self.machine.expire_sweep().await
    }

    pub async fn get(&self, request_id: Uuid) -> Result<SigningRequest> {
        self.machine.get(request_id).await
    }

    pub async fn list_for_contract(&self, contract_id: &str) -> Result<Vec<SigningRequest>> {
        self.machine.list_for_contract(contract_id).await
    }

    /// Advisory check of a signed request's document against the current
    /// identity.
    pub async fn verify(&self, request_id: Uuid) -> Result<bool> {
        let request = self.machine.get(request_id).await?;
        let locator = request.signed_document_path().ok_or_else(|| {
            Error::not_found("Signed document", request_id)
        })?;
        let document = self.machine.load_document(locator).await?;

        let valid = self.machine.signer().verify(&document)?;
        if !valid {
            warn!(request_id = %request_id, "Signed document failed verification");
        }
        Ok(valid)
    }

    /// Replace the signing identity. Documents signed earlier keep verifying
    /// only against the identity that signed them.
    pub fn rotate_identity(&self) -> Result<Arc<SigningIdentity>> {
        let identity = self.identity.rotate()?;
        info!(
            serial = %identity.serial(),
            not_after = %identity.not_after(),
            "Signing identity rotated"
        );
        Ok(identity)
    }
}
