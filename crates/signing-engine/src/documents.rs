//! Storage for rendered and signed documents.

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores document bytes under a name and returns a locator for them.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes` as `name`, replacing any previous content, and return
    /// the locator recorded on the signing request.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String>;

    async fn get(&self, locator: &str) -> Result<Vec<u8>>;
}

/// File name for a request's document. Contract ids are reduced to
/// filename-safe characters.
pub fn document_name(contract_id: &str, request_id: uuid::Uuid, signed: bool) -> String {
    let contract: String = contract_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if signed {
        format!("{}-{}-signed.pdf", contract, request_id)
    } else {
        format!("{}-{}.pdf", contract, request_id)
    }
}

/// Documents stored as files under one directory.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let path = self.root.join(name);
        let tmp = self.root.join(format!(".{}.tmp", name));
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move document into {}", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Stored document");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>> {
        tokio::fs::read(locator)
            .await
            .with_context(|| format!("Failed to read document {}", locator))
    }
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<String, Vec<u8>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let locator = format!("memory://{}", name);
        self.documents.insert(locator.clone(), bytes.to_vec());
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>> {
        self.documents
            .get(locator)
            .map(|entry| entry.value().clone())
            .with_context(|| format!("Document {} not found", locator))
    }
}
