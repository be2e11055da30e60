//! Signing Engine Library
//!
//! Signing request lifecycle, persistence and notification collaborators, and
//! the service that ties them to rendering and signing.

pub mod clock;
pub mod contracts;
pub mod documents;
pub mod notifier;
pub mod repository;
pub mod repository_pg;
pub mod service;
pub mod state_machine;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use contracts::{ContractSource, MemoryContractSource};
pub use documents::{DocumentStore, FsDocumentStore, MemoryDocumentStore};
pub use notifier::{LogNotifier, SignedDocumentNotice, SigningInvitation, SigningNotifier};
pub use repository::{MemorySigningRequestRepository, SigningRequestRepository};
pub use repository_pg::PgSigningRequestRepository;
pub use service::SigningService;
pub use state_machine::{SignedRequest, SigningRequestStateMachine};
pub use sweeper::{spawn_expiry_sweeper, spawn_expiry_sweeper_every, ExpirySweeper};
