//! Contract Signing: rental contract rendering and electronic signatures
//!
//! This is the root crate that provides benchmark and integration test access
//! to the workspace crates. For actual functionality, use them directly:
//!
//! - `contract-core`: Types, errors, configuration, amount formatting, PDF rendering
//! - `identity`: Signing identity lifecycle, document signing and verification
//! - `signing-engine`: Signing request lifecycle, collaborators, sweeper
//! - `signing-cli`: The `contract-signer` administrative binary

// Re-export for benchmarks
pub use contract_core as core;
pub use identity;
pub use signing_engine as engine;
