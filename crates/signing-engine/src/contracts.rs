//! Source of contract data for rendering.

use anyhow::Result;
use contract_core::types::ContractDocument;
use dashmap::DashMap;

/// Looks up the contract a signing request refers to.
#[async_trait::async_trait]
pub trait ContractSource: Send + Sync {
    async fn get_contract(&self, contract_id: &str) -> Result<Option<ContractDocument>>;
}

/// In-memory contract source.
#[derive(Default)]
pub struct MemoryContractSource {
    contracts: DashMap<String, ContractDocument>,
}

impl MemoryContractSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contract: ContractDocument) {
        self.contracts.insert(contract.contract_id.clone(), contract);
    }

    pub fn remove(&self, contract_id: &str) -> Option<ContractDocument> {
        self.contracts.remove(contract_id).map(|(_, contract)| contract)
    }
}

#[async_trait::async_trait]
impl ContractSource for MemoryContractSource {
    async fn get_contract(&self, contract_id: &str) -> Result<Option<ContractDocument>> {
        Ok(self
            .contracts
            .get(contract_id)
            .map(|entry| entry.value().clone()))
    }
}
