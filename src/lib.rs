//! candymint - client-side orchestrator for a fixed-supply candy
//! machine mint
//!
//! This library exposes the orchestration core for embedding and
//! integration testing; the `candymint` binary is one thin presentation
//! layer over it.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod logging;
pub mod machine;
pub mod orchestrator;
pub mod tx_builder;
pub mod wallet;

pub use error::MintError;
pub use orchestrator::{MintOrchestrator, MintState, MintStatus};

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
