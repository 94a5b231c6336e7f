//! Mint transaction execution
//!
//! Compiles, signs, submits and confirms one built instruction plan.
//! Failures are surfaced verbatim to the caller; there is no retry at
//! this layer. Retrying means a brand-new attempt with a fresh asset
//! identity, because the ledger is content-addressed by that identity
//! and reuse after a partial failure would collide.

use solana_sdk::{
    message::{v0, VersionedMessage},
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::MintError;
use crate::ledger::LedgerRpc;
use crate::tx_builder::InstructionPlan;

/// Submits built mint transactions and awaits finalized confirmation
pub struct MintExecutor {
    ledger: Arc<dyn LedgerRpc>,
}

impl MintExecutor {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    /// Sign with the payer and the attempt's asset identity, submit with
    /// preflight skipped, and wait for finalized commitment
    ///
    /// # Errors
    ///
    /// - `UserRejected` when the signer declines
    /// - `Network` / `Timeout` when the submission or confirmation
    ///   outcome is uncertain
    /// - `OnChainRejection` when the remote program declines, with its
    ///   message forwarded verbatim
    pub async fn submit_and_confirm(
        &self,
        plan: &InstructionPlan,
        payer: &Keypair,
        asset: &Keypair,
    ) -> Result<Signature, MintError> {
        let started = Instant::now();

        let blockhash = self.ledger.latest_blockhash().await?;
        let message = v0::Message::try_compile(&payer.pubkey(), &plan.instructions, &[], blockhash)
            .map_err(|e| MintError::internal(format!("message compile failed: {e}")))?;

        // A remote or hardware signer declining surfaces as a signer
        // error here; the attempt is discarded, never retried.
        let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer, asset])
            .map_err(|e| MintError::UserRejected(e.to_string()))?;

        let signature = self.ledger.send_transaction(&tx).await?;
        info!(signature = %signature, "Mint transaction submitted, awaiting finalization");

        if let Err(err) = self.ledger.confirm_finalized(&signature).await {
            warn!(
                signature = %signature,
                category = err.category(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Mint confirmation failed"
            );
            return Err(err);
        }

        info!(
            signature = %signature,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Mint transaction finalized"
        );
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solana_sdk::{account::Account, hash::Hash, pubkey::Pubkey};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubLedger {
        sends: AtomicUsize,
        confirms: AtomicUsize,
        fail_send: bool,
        fail_confirm: bool,
    }

    #[async_trait]
    impl LedgerRpc for StubLedger {
        async fn get_account(&self, _address: &Pubkey) -> Result<Option<Account>, MintError> {
            Ok(None)
        }

        async fn get_balance(&self, _address: &Pubkey) -> Result<u64, MintError> {
            Ok(0)
        }

        async fn latest_blockhash(&self) -> Result<Hash, MintError> {
            Ok(Hash::new_from_array([7u8; 32]))
        }

        async fn send_transaction(
            &self,
            tx: &VersionedTransaction,
        ) -> Result<Signature, MintError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail_send {
                return Err(MintError::Network("connection reset".to_string()));
            }
            Ok(tx.signatures[0])
        }

        async fn confirm_finalized(&self, _signature: &Signature) -> Result<(), MintError> {
            self.confirms.fetch_add(1, Ordering::SeqCst);
            if self.fail_confirm {
                return Err(MintError::Timeout("ceiling reached".to_string()));
            }
            Ok(())
        }
    }

    fn plan_for(payer: &Pubkey, asset: &Pubkey) -> InstructionPlan {
        let snapshot = crate::machine::MachineSnapshot {
            address: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            mint_authority: Pubkey::new_unique(),
            collection_mint: Pubkey::new_unique(),
            items_loaded: 10,
            items_redeemed: 0,
        };
        crate::tx_builder::build_mint_instructions(&snapshot, None, asset, payer)
            .expect("plan builds")
    }

    #[tokio::test]
    async fn test_submit_and_confirm_success() {
        let ledger = Arc::new(StubLedger::default());
        let executor = MintExecutor::new(ledger.clone());
        let payer = Keypair::new();
        let asset = Keypair::new();
        let plan = plan_for(&payer.pubkey(), &asset.pubkey());

        let signature = executor
            .submit_and_confirm(&plan, &payer, &asset)
            .await
            .expect("mint succeeds");
        assert_ne!(signature, Signature::default());
        assert_eq!(ledger.sends.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.confirms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_failure_surfaces_without_retry() {
        let ledger = Arc::new(StubLedger {
            fail_send: true,
            ..StubLedger::default()
        });
        let executor = MintExecutor::new(ledger.clone());
        let payer = Keypair::new();
        let asset = Keypair::new();
        let plan = plan_for(&payer.pubkey(), &asset.pubkey());

        let err = executor
            .submit_and_confirm(&plan, &payer, &asset)
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::Network(_)));
        assert_eq!(ledger.sends.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.confirms.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confirm_timeout_surfaces() {
        let ledger = Arc::new(StubLedger {
            fail_confirm: true,
            ..StubLedger::default()
        });
        let executor = MintExecutor::new(ledger.clone());
        let payer = Keypair::new();
        let asset = Keypair::new();
        let plan = plan_for(&payer.pubkey(), &asset.pubkey());

        let err = executor
            .submit_and_confirm(&plan, &payer, &asset)
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::Timeout(_)));
        assert_eq!(ledger.sends.load(Ordering::SeqCst), 1);
    }
}
