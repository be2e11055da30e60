//! Persistence of signing requests.

use anyhow::Result;
use chrono::{DateTime, Utc};
use contract_core::types::{SigningRequest, SigningStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage backend for signing requests.
///
/// Implementations enforce the two guarantees the lifecycle relies on: at most
/// one pending request per contract, and writes that only land while the
/// stored request is still pending.
#[async_trait::async_trait]
pub trait SigningRequestRepository: Send + Sync {
    /// Store a new request. Returns `false` when another pending request
    /// already exists for the same contract.
    async fn insert(&self, request: &SigningRequest) -> Result<bool>;

    async fn get(&self, id: Uuid) -> Result<Option<SigningRequest>>;

    /// The pending request for a contract, if any.
    async fn find_pending_by_contract(&self, contract_id: &str) -> Result<Option<SigningRequest>>;

    /// All requests for a contract, oldest first.
    async fn list_by_contract(&self, contract_id: &str) -> Result<Vec<SigningRequest>>;

    /// Pending requests whose `expires_at` is at or before `now`.
    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<SigningRequest>>;

    /// Persist `request` only if the stored copy is still pending. Returns
    /// whether the write happened.
    async fn update_if_pending(&self, request: &SigningRequest) -> Result<bool>;
}

/// In-memory repository for tests and single-process use.
pub struct MemorySigningRequestRepository {
    requests: Arc<RwLock<HashMap<Uuid, SigningRequest>>>,
}

impl MemorySigningRequestRepository {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

impl Default for MemorySigningRequestRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SigningRequestRepository for MemorySigningRequestRepository {
    async fn insert(&self, request: &SigningRequest) -> Result<bool> {
        let mut requests = self.requests.write().await;

        let conflict = requests.values().any(|existing| {
            existing.contract_id() == request.contract_id()
                && existing.status() == SigningStatus::Pending
        });
        if conflict || requests.contains_key(&request.id()) {
            return Ok(false);
        }

        requests.insert(request.id(), request.clone());
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> Result<Option<SigningRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_pending_by_contract(&self, contract_id: &str) -> Result<Option<SigningRequest>> {
        let requests = self.requests.read().await;
        Ok(requests
            .values()
            .find(|r| r.contract_id() == contract_id && r.status() == SigningStatus::Pending)
            .cloned())
    }

    async fn list_by_contract(&self, contract_id: &str) -> Result<Vec<SigningRequest>> {
        let requests = self.requests.read().await;
        let mut matching: Vec<_> = requests
            .values()
            .filter(|r| r.contract_id() == contract_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.created_at(), r.id()));
        Ok(matching)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<SigningRequest>> {
        let requests = self.requests.read().await;
        let mut overdue: Vec<_> = requests
            .values()
            .filter(|r| r.status() == SigningStatus::Pending && r.is_overdue(now))
            .cloned()
            .collect();
        overdue.sort_by_key(|r| r.expires_at());
        Ok(overdue)
    }

    async fn update_if_pending(&self, request: &SigningRequest) -> Result<bool> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id()) {
            Some(stored) if stored.status() == SigningStatus::Pending => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
