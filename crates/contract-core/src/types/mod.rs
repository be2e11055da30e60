//! Core types for the contract signing system.

pub mod contract;
pub mod signature;
pub mod signing_request;

pub use contract::{ContractDocument, Party, PricingTerms, PropertyDescriptor};
pub use signature::SignatureMetadata;
pub use signing_request::{Recipient, SigningRequest, SigningRequestRecord, SigningStatus};
