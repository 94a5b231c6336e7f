//! Error types for the mint orchestration pipeline
//!
//! A single taxonomy covers the whole lifecycle: configuration, remote
//! state reads, transaction assembly, signing, submission and
//! confirmation. Every failure from the lower layers is converted into a
//! `MintError` and absorbed at the orchestrator boundary; nothing in this
//! crate treats a mint failure as process-fatal.

use thiserror::Error;

/// Error type for all mint orchestration operations
///
/// Insufficient funds is intentionally *not* a variant: it is a soft
/// disable carried by [`crate::eligibility::BlockingReason`], never an
/// exception.
#[derive(Error, Debug)]
pub enum MintError {
    /// Missing or invalid configuration (machine address, keypair path)
    ///
    /// Fatal to the session; shown to the user once.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Machine or guard account read failed
    ///
    /// Recoverable by retrying the availability refresh.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The guard account declares a guard kind this client cannot
    /// assemble arguments for
    ///
    /// Building proceeds only when every enabled guard is understood;
    /// silently omitting required arguments would surface later as an
    /// opaque on-chain rejection.
    #[error("Unsupported guard: {0}")]
    UnsupportedGuard(String),

    /// The signer declined to sign the transaction
    ///
    /// Soft failure; the attempt is discarded.
    #[error("Signing rejected by wallet: {0}")]
    UserRejected(String),

    /// Transport-level failure talking to the remote ledger
    ///
    /// Submission outcome may be uncertain: a transaction that failed to
    /// confirm can still land on-chain.
    #[error("Network error: {0}")]
    Network(String),

    /// Confirmation wait exceeded the configured ceiling
    ///
    /// The transaction may still land; callers must not report it as
    /// definitively dropped.
    #[error("Confirmation timed out: {0}")]
    Timeout(String),

    /// The remote program rejected the transaction
    ///
    /// Carries the program's message verbatim when available.
    #[error("Transaction rejected on-chain: {0}")]
    OnChainRejection(String),

    /// Internal invariant violation or unexpected state
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MintError {
    /// Check if the failed operation is worth re-initiating
    ///
    /// "Retryable" here always means a brand-new attempt (fresh asset
    /// identity, fresh refresh); no layer in this crate retries
    /// automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(_) => true,
            Self::Network(_) => true,
            Self::Timeout(_) => true,

            Self::Config(_) => false,
            Self::UnsupportedGuard(_) => false,
            Self::UserRejected(_) => false,
            Self::OnChainRejection(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Get the error category for log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Fetch(_) => "fetch",
            Self::UnsupportedGuard(_) => "guard",
            Self::UserRejected(_) => "rejected",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::OnChainRejection(_) => "onchain",
            Self::Internal(_) => "internal",
        }
    }
}

// Convenience constructors for common failure sites
impl MintError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    pub fn fetch(reason: impl Into<String>) -> Self {
        Self::Fetch(reason.into())
    }

    /// Machine account does not resolve on the remote ledger
    pub fn machine_not_found(address: impl std::fmt::Display) -> Self {
        Self::Fetch(format!("machine account {address} not found"))
    }

    pub fn unsupported_guard(kinds: impl Into<String>) -> Self {
        Self::UnsupportedGuard(kinds.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MintError::Fetch("machine account abc not found".to_string());
        assert_eq!(err.to_string(), "Fetch error: machine account abc not found");

        let err = MintError::UnsupportedGuard("allow_list".to_string());
        assert_eq!(err.to_string(), "Unsupported guard: allow_list");
    }

    #[test]
    fn test_error_retryability() {
        assert!(MintError::Fetch("test".to_string()).is_retryable());
        assert!(MintError::Network("test".to_string()).is_retryable());
        assert!(MintError::Timeout("test".to_string()).is_retryable());

        assert!(!MintError::Config("test".to_string()).is_retryable());
        assert!(!MintError::UserRejected("test".to_string()).is_retryable());
        assert!(!MintError::OnChainRejection("test".to_string()).is_retryable());
        assert!(!MintError::UnsupportedGuard("test".to_string()).is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(MintError::Config("test".to_string()).category(), "config");
        assert_eq!(
            MintError::OnChainRejection("test".to_string()).category(),
            "onchain"
        );
        assert_eq!(MintError::UserRejected("test".to_string()).category(), "rejected");
    }

    #[test]
    fn test_convenience_constructors() {
        let err = MintError::machine_not_found("9xQe");
        assert!(matches!(err, MintError::Fetch(_)));
        assert!(err.to_string().contains("9xQe"));

        let err = MintError::unsupported_guard("token_gate");
        assert!(matches!(err, MintError::UnsupportedGuard(_)));
    }
}
