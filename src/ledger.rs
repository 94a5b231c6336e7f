//! Remote ledger RPC abstraction
//!
//! The orchestration core never talks to `solana-client` directly; it
//! goes through the [`LedgerRpc`] trait so the mint pipeline can be
//! driven against a mock in tests. [`SolanaLedger`] is the production
//! implementation.
//!
//! Submission semantics follow the design contract:
//! - preflight simulation is skipped (the remote guard checks are the
//!   source of truth; a stale local account cache makes simulation a
//!   source of false negatives)
//! - success is only reported at finalized commitment
//! - a confirmation that never arrives within the ceiling maps to
//!   `Timeout`, and the transaction may still land afterwards

use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_request::RpcError,
};
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::VersionedTransaction,
};
use solana_transaction_status::TransactionConfirmationStatus;
use std::time::Duration;
use tracing::debug;

use crate::error::MintError;

/// Interval between confirmation status polls
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Narrow contract this system needs from the remote ledger
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Read an account by address; `None` when the address does not
    /// resolve on the ledger
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, MintError>;

    /// Read the lamport balance of an address
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, MintError>;

    /// Fetch a recent blockhash for transaction assembly
    async fn latest_blockhash(&self) -> Result<Hash, MintError>;

    /// Submit a signed transaction with preflight skipped
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, MintError>;

    /// Wait until the signature reaches finalized commitment
    ///
    /// Weaker commitment levels are never reported as success.
    async fn confirm_finalized(&self, signature: &Signature) -> Result<(), MintError>;
}

/// Production implementation over the nonblocking Solana RPC client
pub struct SolanaLedger {
    client: RpcClient,
    confirm_timeout: Duration,
}

impl SolanaLedger {
    pub fn new(endpoint: String, request_timeout: Duration, confirm_timeout: Duration) -> Self {
        // Reads run at confirmed commitment for fresh counters; the
        // confirmation wait below enforces finalized independently.
        let client = RpcClient::new_with_timeout_and_commitment(
            endpoint,
            request_timeout,
            CommitmentConfig::confirmed(),
        );
        Self {
            client,
            confirm_timeout,
        }
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, MintError> {
        let response = self
            .client
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(classify_client_error)?;
        debug!(address = %address, found = response.value.is_some(), "Account fetched");
        Ok(response.value)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, MintError> {
        let response = self
            .client
            .get_balance_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(classify_client_error)?;
        Ok(response.value)
    }

    async fn latest_blockhash(&self) -> Result<Hash, MintError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(classify_client_error)
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, MintError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            ..RpcSendTransactionConfig::default()
        };
        let signature = self
            .client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(classify_client_error)?;
        debug!(signature = %signature, "Transaction submitted");
        Ok(signature)
    }

    async fn confirm_finalized(&self, signature: &Signature) -> Result<(), MintError> {
        let wait = async {
            loop {
                let statuses = self
                    .client
                    .get_signature_statuses(&[*signature])
                    .await
                    .map_err(classify_client_error)?;

                if let Some(Some(status)) = statuses.value.into_iter().next() {
                    if let Some(err) = status.err {
                        return Err(MintError::OnChainRejection(err.to_string()));
                    }
                    // Weaker commitment levels are insufficient for an
                    // irreversible mint confirmation.
                    if matches!(
                        status.confirmation_status,
                        Some(TransactionConfirmationStatus::Finalized)
                    ) {
                        return Ok(());
                    }
                }

                tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(self.confirm_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(MintError::Timeout(format!(
                "finalized confirmation not reached within {}s; the transaction may still land",
                self.confirm_timeout.as_secs()
            ))),
        }
    }
}

/// Map a client error onto the mint error taxonomy
///
/// Preflight is skipped, so an RPC response error at submission carries
/// the node's own rejection; its message is forwarded verbatim.
fn classify_client_error(err: ClientError) -> MintError {
    match err.kind {
        ClientErrorKind::TransactionError(tx_err) => MintError::OnChainRejection(tx_err.to_string()),
        ClientErrorKind::SigningError(sign_err) => MintError::UserRejected(sign_err.to_string()),
        ClientErrorKind::RpcError(RpcError::RpcResponseError { message, .. }) => {
            MintError::OnChainRejection(message)
        }
        other => MintError::Network(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::transaction::TransactionError;

    #[test]
    fn test_transaction_error_maps_to_onchain_rejection() {
        let err = ClientError::from(ClientErrorKind::TransactionError(
            TransactionError::AlreadyProcessed,
        ));
        let mapped = classify_client_error(err);
        assert!(matches!(mapped, MintError::OnChainRejection(_)));
    }

    #[test]
    fn test_rpc_response_error_forwards_message() {
        let err = ClientError::from(ClientErrorKind::RpcError(RpcError::RpcResponseError {
            code: -32002,
            message: "custom program error: 0x178d".to_string(),
            data: solana_client::rpc_request::RpcResponseErrorData::Empty,
        }));
        match classify_client_error(err) {
            MintError::OnChainRejection(msg) => assert!(msg.contains("0x178d")),
            other => panic!("expected OnChainRejection, got {other:?}"),
        }
    }

    #[test]
    fn test_transport_errors_map_to_network() {
        let err = ClientError::from(ClientErrorKind::Custom("connection refused".to_string()));
        assert!(matches!(classify_client_error(err), MintError::Network(_)));
    }
}
