//! Mint orchestration state machine
//!
//! Sequences the reader, evaluator, builder and executor behind a small
//! observable status surface:
//!
//! `Idle → LoadingAvailability → {Disabled, Ready} → Minting →
//! {Minted, Failed}`, with `Minted` and `Failed` re-entering
//! `{Disabled, Ready}` on the next availability refresh.
//!
//! Availability refresh is an explicit, idempotent operation invoked on
//! defined triggers (startup, post-mint, wallet (re)connection), never
//! implicitly. Entry into `Minting` is serialized by an atomic flag: a
//! second activation while an attempt is in flight is a no-op, not a
//! queued retry. Every component failure is absorbed here into a
//! user-visible message plus a state; the worst case is a stuck
//! `Disabled` with an explanation.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::eligibility::{evaluate, EligibilityState};
use crate::executor::MintExecutor;
use crate::ledger::LedgerRpc;
use crate::logging::MintPipelineLogger;
use crate::machine::{GuardConfig, MachineReader, MachineSnapshot};
use crate::tx_builder::build_mint_instructions;
use crate::wallet::WalletManager;

/// Orchestrator state, observable by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintState {
    Idle,
    LoadingAvailability,
    Ready,
    Disabled,
    Minting,
    Minted,
    Failed,
}

/// Snapshot of the observable surface
///
/// `minted_asset` and `last_signature` survive the post-mint refresh so
/// the presentation layer can keep showing the result after counters
/// re-derive.
#[derive(Debug, Clone)]
pub struct MintStatus {
    pub state: MintState,
    pub count_total: u64,
    pub count_minted: u64,
    pub count_remaining: u64,
    pub cost_sol: f64,
    pub mint_disabled: bool,
    pub minted_asset: Option<Pubkey>,
    pub last_signature: Option<Signature>,
    pub message: Option<String>,
}

struct OrchestratorInner {
    state: MintState,
    snapshot: Option<MachineSnapshot>,
    guard: Option<GuardConfig>,
    eligibility: Option<EligibilityState>,
    wallet: Option<WalletManager>,
    minted_asset: Option<Pubkey>,
    last_signature: Option<Signature>,
    message: Option<String>,
}

/// The mint orchestrator
pub struct MintOrchestrator {
    machine_address: Pubkey,
    ledger: Arc<dyn LedgerRpc>,
    reader: MachineReader,
    executor: MintExecutor,
    inner: RwLock<OrchestratorInner>,
    /// Serializes entry into `Minting`; at most one attempt in flight
    mint_in_flight: AtomicBool,
}

impl MintOrchestrator {
    pub fn new(ledger: Arc<dyn LedgerRpc>, machine_address: Pubkey) -> Self {
        Self {
            machine_address,
            reader: MachineReader::new(Arc::clone(&ledger)),
            executor: MintExecutor::new(Arc::clone(&ledger)),
            ledger,
            inner: RwLock::new(OrchestratorInner {
                state: MintState::Idle,
                snapshot: None,
                guard: None,
                eligibility: None,
                wallet: None,
                minted_asset: None,
                last_signature: None,
                message: None,
            }),
            mint_in_flight: AtomicBool::new(false),
        }
    }

    pub fn machine_address(&self) -> Pubkey {
        self.machine_address
    }

    /// Connect a wallet and re-run availability so balance gating
    /// reflects the new identity
    pub async fn connect_wallet(&self, wallet: WalletManager) -> MintStatus {
        {
            let mut inner = self.inner.write().await;
            inner.wallet = Some(wallet);
        }
        self.refresh_availability().await
    }

    /// Disconnect the wallet; balance becomes unknown and gating is
    /// re-derived
    ///
    /// An already-submitted transaction cannot be cancelled by this and
    /// may still land on-chain.
    pub async fn disconnect_wallet(&self) -> MintStatus {
        {
            let mut inner = self.inner.write().await;
            inner.wallet = None;
        }
        self.refresh_availability().await
    }

    /// Explicit, idempotent availability refresh
    ///
    /// Fetches the machine snapshot, guard configuration and wallet
    /// balance, re-evaluates eligibility and lands in `Ready` or
    /// `Disabled`. While a mint attempt is in flight the refresh is
    /// skipped; the post-mint refresh re-derives everything anyway.
    pub async fn refresh_availability(&self) -> MintStatus {
        if self.mint_in_flight.load(Ordering::Acquire) {
            debug!("Availability refresh skipped while mint in flight");
            return self.status().await;
        }

        {
            let mut inner = self.inner.write().await;
            inner.state = MintState::LoadingAvailability;
        }

        let snapshot = match self.reader.fetch_machine_snapshot(&self.machine_address).await {
            Ok(snapshot) => snapshot,
            Err(err) => return self.disable_with_message(err.to_string()).await,
        };

        let guard = match self.reader.fetch_guard_config(&snapshot.mint_authority).await {
            Ok(guard) => guard,
            Err(err) => return self.disable_with_message(err.to_string()).await,
        };

        let wallet_pubkey = self.inner.read().await.wallet.as_ref().map(|w| w.pubkey());
        let balance = match wallet_pubkey {
            Some(pubkey) => match self.ledger.get_balance(&pubkey).await {
                Ok(balance) => Some(balance),
                Err(err) => {
                    // Unknown balance disables nothing; the funds gate
                    // only applies to a known balance.
                    warn!(error = %err, "Balance check failed; treating balance as unknown");
                    None
                }
            },
            None => None,
        };

        let eligibility = evaluate(&snapshot, guard.as_ref(), balance);

        let mut inner = self.inner.write().await;
        if self.mint_in_flight.load(Ordering::Acquire) {
            // A mint started while we were fetching; its completion
            // refresh supersedes this one.
            debug!("Discarding refresh results gathered during an in-flight mint");
            return Self::status_of(&inner);
        }
        inner.snapshot = Some(snapshot);
        inner.guard = guard;
        inner.eligibility = Some(eligibility);
        inner.state = if eligibility.mint_enabled {
            MintState::Ready
        } else {
            MintState::Disabled
        };
        inner.message = eligibility.blocking_reason.map(|reason| reason.to_string());
        Self::status_of(&inner)
    }

    /// The single mint entry point
    ///
    /// No-ops with a user-visible message when no wallet is connected or
    /// no snapshot/guard pair is loaded; no-ops silently (returning the
    /// current status) when an attempt is already in flight. Otherwise
    /// runs one attempt with a fresh asset identity and re-derives
    /// availability afterwards, success or failure.
    pub async fn activate_mint(&self) -> MintStatus {
        let wallet = self.inner.read().await.wallet.clone();
        let Some(wallet) = wallet else {
            let mut inner = self.inner.write().await;
            inner.message = Some("Please connect your wallet.".to_string());
            return Self::status_of(&inner);
        };

        if self
            .mint_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Mint already in flight; activation is a no-op");
            return self.status().await;
        }

        let (snapshot, guard, eligibility) = {
            let inner = self.inner.read().await;
            (
                inner.snapshot.clone(),
                inner.guard.clone(),
                inner.eligibility,
            )
        };

        let Some(snapshot) = snapshot else {
            self.mint_in_flight.store(false, Ordering::Release);
            let mut inner = self.inner.write().await;
            inner.message = Some(
                "There was an error fetching the machine state. Refresh availability and try again."
                    .to_string(),
            );
            return Self::status_of(&inner);
        };

        if !eligibility.map(|e| e.mint_enabled).unwrap_or(false) {
            self.mint_in_flight.store(false, Ordering::Release);
            let mut inner = self.inner.write().await;
            inner.message = eligibility
                .and_then(|e| e.blocking_reason)
                .map(|reason| reason.to_string())
                .or_else(|| Some("Minting is currently disabled.".to_string()));
            return Self::status_of(&inner);
        }

        {
            let mut inner = self.inner.write().await;
            inner.state = MintState::Minting;
            inner.message = None;
        }

        // Fresh identity, owned by this attempt; a failed attempt's
        // identity is discarded, never reused.
        let asset = Keypair::new();
        let logger = MintPipelineLogger::new();
        logger.log_mint_attempt(
            &self.machine_address.to_string(),
            &asset.pubkey().to_string(),
        );
        let started = Instant::now();

        let outcome = match build_mint_instructions(
            &snapshot,
            guard.as_ref(),
            &asset.pubkey(),
            &wallet.pubkey(),
        ) {
            Ok(plan) => {
                self.executor
                    .submit_and_confirm(&plan, wallet.keypair(), &asset)
                    .await
            }
            Err(err) => Err(err),
        };

        let completed_status = {
            let mut inner = self.inner.write().await;
            match outcome {
                Ok(signature) => {
                    logger.log_mint_success(
                        &asset.pubkey().to_string(),
                        &signature.to_string(),
                        started.elapsed().as_millis() as u64,
                    );
                    inner.state = MintState::Minted;
                    inner.minted_asset = Some(asset.pubkey());
                    inner.last_signature = Some(signature);
                    inner.message = Some("Mint was successful!".to_string());
                }
                Err(err) => {
                    logger.log_mint_failure(
                        err.category(),
                        &err.to_string(),
                        started.elapsed().as_millis() as u64,
                    );
                    inner.state = MintState::Failed;
                    inner.message = Some(err.to_string());
                }
            }
            Self::status_of(&inner)
        };

        self.mint_in_flight.store(false, Ordering::Release);

        // Post-mint trigger: re-derive counters after success or failure.
        self.refresh_availability().await;

        completed_status
    }

    /// Current observable status
    pub async fn status(&self) -> MintStatus {
        Self::status_of(&*self.inner.read().await)
    }

    async fn disable_with_message(&self, message: String) -> MintStatus {
        let mut inner = self.inner.write().await;
        inner.state = MintState::Disabled;
        inner.message = Some(message);
        Self::status_of(&inner)
    }

    fn status_of(inner: &OrchestratorInner) -> MintStatus {
        let (count_total, count_minted) = inner
            .snapshot
            .as_ref()
            .map(|s| (s.items_loaded, s.items_redeemed))
            .unwrap_or((0, 0));
        let (count_remaining, cost_sol, mint_enabled) = inner
            .eligibility
            .map(|e| (e.remaining, e.cost_sol, e.mint_enabled))
            .unwrap_or((count_total.saturating_sub(count_minted), 0.0, false));

        MintStatus {
            state: inner.state,
            count_total,
            count_minted,
            count_remaining,
            cost_sol,
            mint_disabled: !mint_enabled,
            minted_asset: inner.minted_asset,
            last_signature: inner.last_signature,
            message: inner.message.clone(),
        }
    }
}
