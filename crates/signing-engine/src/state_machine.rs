//! Lifecycle of signing requests.
//!
//! `Pending -> {Signed, Rejected, Expired}`; terminal states are absorbing.
//! Transitions on one request are serialized by a per-request lock, and every
//! write goes through the repository's conditional update so that a second
//! writer can never move a request out of a terminal state.

use chrono::{DateTime, Duration, Utc};
use contract_core::config::SigningConfig;
use contract_core::types::{ContractDocument, Recipient, SignatureMetadata, SigningRequest};
use contract_core::{DocumentRenderer, Error, Result};
use dashmap::DashMap;
use identity::{DocumentSigner, SigningOutcome};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::contracts::ContractSource;
use crate::documents::{document_name, DocumentStore};
use crate::repository::SigningRequestRepository;

/// A request that was just signed, with the document that was produced.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub request: SigningRequest,
    pub document: Vec<u8>,
    /// False when development mode fell back to the unsigned document.
    pub cryptographically_signed: bool,
}

/// Per-key async locks. An entry lives only while some caller holds or waits
/// on it, so every caller for a key shares one mutex and the map stays bounded
/// by the number of in-flight operations.
struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn get(&self, key: &K) -> Arc<Mutex<()>> {
        self.locks.entry(key.clone()).or_default().clone()
    }

    /// Hand back a lock obtained from [`KeyedLocks::get`], removing the entry
    /// when no other caller still references it.
    fn release(&self, key: &K, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Drives signing requests through their lifecycle.
pub struct SigningRequestStateMachine {
    repository: Arc<dyn SigningRequestRepository>,
    contracts: Arc<dyn ContractSource>,
    documents: Arc<dyn DocumentStore>,
    renderer: DocumentRenderer,
    signer: DocumentSigner,
    clock: Arc<dyn Clock>,
    signature_reason: String,
    signature_location: String,
    request_locks: KeyedLocks<Uuid>,
    contract_locks: KeyedLocks<String>,
}

impl SigningRequestStateMachine {
    pub fn new(
        config: &SigningConfig,
        repository: Arc<dyn SigningRequestRepository>,
        contracts: Arc<dyn ContractSource>,
        documents: Arc<dyn DocumentStore>,
        signer: DocumentSigner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            contracts,
            documents,
            renderer: DocumentRenderer::new(config.render.clone()),
            signer,
            clock,
            signature_reason: config.signature_reason.clone(),
            signature_location: config.signature_location.clone(),
            request_locks: KeyedLocks::new(),
            contract_locks: KeyedLocks::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn signer(&self) -> &DocumentSigner {
        &self.signer
    }

    /// Open a new pending request for `contract_id`.
    ///
    /// The contract is rendered and stored up front. A pending request that is
    /// already overdue is expired first; any other pending request blocks
    /// creation.
    pub async fn create(
        &self,
        contract_id: &str,
        recipient: &Recipient,
        retention: Duration,
    ) -> Result<SigningRequest> {
        if retention < Duration::zero() {
            return Err(Error::validation("retention", "must not be negative"));
        }
        if recipient.email.trim().is_empty() {
            return Err(Error::validation("recipient.email", "is required"));
        }

        let key = contract_id.to_string();
        let lock = self.contract_locks.get(&key);
        let result = {
            let _guard = lock.lock().await;
            self.create_locked(contract_id, recipient, retention).await
        };
        self.contract_locks.release(&key, lock);
        result
    }

    async fn create_locked(
        &self,
        contract_id: &str,
        recipient: &Recipient,
        retention: Duration,
    ) -> Result<SigningRequest> {
        let contract = self.load_contract(contract_id).await?;
        let now = self.clock.now();

        if let Some(existing) = self.pending_for(contract_id).await? {
            if !existing.is_overdue(now) {
                return Err(Error::PendingRequestExists {
                    contract_id: contract_id.to_string(),
                    request_id: existing.id(),
                });
            }
            self.expire_request(existing.id(), now).await?;
        }

        let id = Uuid::new_v4();
        let document = self.render(contract).await?;
        let locator = self
            .documents
            .put(&document_name(contract_id, id, false), &document)
            .await
            .map_err(Error::Storage)?;

        let request = SigningRequest::new(id, contract_id, recipient, locator, now, retention);
        let inserted = self
            .repository
            .insert(&request)
            .await
            .map_err(Error::Repository)?;
        if !inserted {
            let existing = self.pending_for(contract_id).await?;
            return Err(match existing {
                Some(existing) => Error::PendingRequestExists {
                    contract_id: contract_id.to_string(),
                    request_id: existing.id(),
                },
                None => Error::Repository(anyhow::anyhow!(
                    "signing request {} was not stored",
                    id
                )),
            });
        }

        info!(
            request_id = %id,
            contract_id = %contract_id,
            recipient = %recipient.email,
            expires_at = %request.expires_at(),
            "Signing request created"
        );
        Ok(request)
    }

    /// Sign a pending, unexpired request.
    ///
    /// Expiry is checked against the clock here; a request that is overdue but
    /// not yet swept fails with `ExpiredRequest` and stays pending.
    pub async fn sign(&self, request_id: Uuid) -> Result<SignedRequest> {
        let lock = self.request_locks.get(&request_id);
        let result = {
            let _guard = lock.lock().await;
            self.sign_locked(request_id).await
        };
        self.request_locks.release(&request_id, lock);
        result
    }

    async fn sign_locked(&self, request_id: Uuid) -> Result<SignedRequest> {
        let mut request = self.load_request(request_id).await?;
        let now = self.clock.now();
        request.ensure_signable(now)?;

        let contract = self.load_contract(request.contract_id()).await?;
        let signer_name = contract
            .party_by_email(request.recipient_email())
            .map(|party| party.full_name.clone())
            .unwrap_or_else(|| request.recipient_email().to_string());
        let metadata = SignatureMetadata {
            signer_name,
            signer_email: request.recipient_email().to_string(),
            signed_at: now,
            reason: self.signature_reason.clone(),
            location: self.signature_location.clone(),
            request_id,
        };

        let outcome = self.render_and_sign(contract, metadata).await?;
        let locator = self
            .documents
            .put(
                &document_name(request.contract_id(), request_id, true),
                &outcome.bytes,
            )
            .await
            .map_err(Error::Storage)?;

        let cryptographically_signed = outcome.is_signed();
        request.mark_signed(now, locator, outcome.signature)?;
        self.commit(&request).await?;

        info!(
            request_id = %request_id,
            contract_id = %request.contract_id(),
            signed = cryptographically_signed,
            "Signing request signed"
        );
        Ok(SignedRequest {
            request,
            document: outcome.bytes,
            cryptographically_signed,
        })
    }

    /// Reject a pending request.
    pub async fn reject(&self, request_id: Uuid) -> Result<SigningRequest> {
        let lock = self.request_locks.get(&request_id);
        let result = {
            let _guard = lock.lock().await;
            self.reject_locked(request_id).await
        };
        self.request_locks.release(&request_id, lock);
        result
    }

    async fn reject_locked(&self, request_id: Uuid) -> Result<SigningRequest> {
        let mut request = self.load_request(request_id).await?;
        request.mark_rejected(self.clock.now())?;
        self.commit(&request).await?;

        info!(
            request_id = %request_id,
            contract_id = %request.contract_id(),
            "Signing request rejected"
        );
        Ok(request)
    }

    /// Move every overdue pending request to `Expired`. Returns how many
    /// changed; a second run over the same data returns zero.
    pub async fn expire_sweep(&self) -> Result<usize> {
        let now = self.clock.now();
        let overdue = self
            .repository
            .find_overdue(now)
            .await
            .map_err(Error::Repository)?;

        let mut expired = 0;
        for request in &overdue {
            if self.expire_request(request.id(), now).await? {
                expired += 1;
            }
        }

        if expired > 0 {
            info!(expired, candidates = overdue.len(), "Expired overdue signing requests");
        } else {
            debug!(candidates = overdue.len(), "Expiry sweep found nothing to expire");
        }
        Ok(expired)
    }

    async fn expire_request(&self, request_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let lock = self.request_locks.get(&request_id);
        let result = {
            let _guard = lock.lock().await;
            self.expire_locked(request_id, now).await
        };
        self.request_locks.release(&request_id, lock);
        result
    }

    async fn expire_locked(&self, request_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let Some(mut request) = self
            .repository
            .get(request_id)
            .await
            .map_err(Error::Repository)?
        else {
            return Ok(false);
        };
        if !request.mark_expired(now) {
            return Ok(false);
        }
        let changed = self
            .repository
            .update_if_pending(&request)
            .await
            .map_err(Error::Repository)?;
        if changed {
            info!(
                request_id = %request_id,
                contract_id = %request.contract_id(),
                expires_at = %request.expires_at(),
                "Signing request expired"
            );
        }
        Ok(changed)
    }

    pub async fn get(&self, request_id: Uuid) -> Result<SigningRequest> {
        self.load_request(request_id).await
    }

    pub async fn list_for_contract(&self, contract_id: &str) -> Result<Vec<SigningRequest>> {
        self.repository
            .list_by_contract(contract_id)
            .await
            .map_err(Error::Repository)
    }

    /// Read a stored document by locator.
    pub async fn load_document(&self, locator: &str) -> Result<Vec<u8>> {
        self.documents.get(locator).await.map_err(Error::Storage)
    }

    /// Write a transitioned request, reporting the stored status when another
    /// writer got there first.
    async fn commit(&self, request: &SigningRequest) -> Result<()> {
        let updated = self
            .repository
            .update_if_pending(request)
            .await
            .map_err(Error::Repository)?;
        if updated {
            return Ok(());
        }

        let current = self.load_request(request.id()).await?;
        warn!(
            request_id = %request.id(),
            status = %current.status(),
            "Signing request changed concurrently"
        );
        current.ensure_pending()?;
        Err(Error::Repository(anyhow::anyhow!(
            "conditional update of signing request {} did not apply",
            request.id()
        )))
    }

    async fn load_request(&self, request_id: Uuid) -> Result<SigningRequest> {
        self.repository
            .get(request_id)
            .await
            .map_err(Error::Repository)?
            .ok_or_else(|| Error::not_found("Signing request", request_id))
    }

    async fn load_contract(&self, contract_id: &str) -> Result<ContractDocument> {
        self.contracts
            .get_contract(contract_id)
            .await
            .map_err(Error::Repository)?
            .ok_or_else(|| Error::not_found("Contract", contract_id))
    }

    async fn pending_for(&self, contract_id: &str) -> Result<Option<SigningRequest>> {
        self.repository
            .find_pending_by_contract(contract_id)
            .await
            .map_err(Error::Repository)
    }

    async fn render(&self, contract: ContractDocument) -> Result<Vec<u8>> {
        let renderer = self.renderer.clone();
        tokio::task::spawn_blocking(move || renderer.render(&contract))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("render task failed: {}", e))))?
    }

    async fn render_and_sign(
        &self,
        contract: ContractDocument,
        metadata: SignatureMetadata,
    ) -> Result<SigningOutcome> {
        let renderer = self.renderer.clone();
        let signer = self.signer.clone();
        tokio::task::spawn_blocking(move || {
            let document = renderer.render(&contract)?;
            signer.sign(&document, &metadata)
        })
        .await
        .map_err(|e| Error::signing(format!("signing task failed: {}", e)))?
    }
}
