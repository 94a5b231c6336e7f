//! Mint eligibility evaluation
//!
//! Pure function of the latest machine snapshot, guard configuration and
//! wallet balance. Re-evaluated on every availability refresh; never
//! cached across one.
//!
//! Amounts are compared in integer lamports. The SOL figure exists for
//! display only, derived with the ledger's fixed 10^9 unit constant.

use solana_sdk::native_token::lamports_to_sol;

use crate::machine::{GuardConfig, MachineSnapshot};

/// Why minting is currently disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingReason {
    /// No items remaining
    SoldOut,
    /// Known wallet balance below the guard-declared cost
    InsufficientFunds,
}

impl std::fmt::Display for BlockingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SoldOut => write!(f, "sold out"),
            Self::InsufficientFunds => write!(f, "insufficient funds"),
        }
    }
}

/// Derived eligibility state; recomputed, never persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EligibilityState {
    /// Items still mintable
    pub remaining: u64,
    /// Guard-declared cost; 0 when the machine is ungated
    pub cost_lamports: u64,
    /// Display-only SOL figure
    pub cost_sol: f64,
    /// Can the user mint right now
    pub mint_enabled: bool,
    /// Set whenever `mint_enabled` is false
    pub blocking_reason: Option<BlockingReason>,
}

/// Evaluate eligibility from the current remote state
///
/// `wallet_balance_lamports` is `None` while no wallet is connected or
/// the balance read failed; the funds gate only applies to a known
/// balance.
pub fn evaluate(
    snapshot: &MachineSnapshot,
    guard: Option<&GuardConfig>,
    wallet_balance_lamports: Option<u64>,
) -> EligibilityState {
    // Malformed counters from the remote side must not underflow.
    let remaining = snapshot.items_loaded.saturating_sub(snapshot.items_redeemed);

    let cost_lamports = guard
        .and_then(|g| g.guards.sol_payment.as_ref())
        .map(|payment| payment.lamports)
        .unwrap_or(0);

    let blocking_reason = if remaining == 0 {
        Some(BlockingReason::SoldOut)
    } else if matches!(wallet_balance_lamports, Some(balance) if balance < cost_lamports) {
        Some(BlockingReason::InsufficientFunds)
    } else {
        None
    };

    EligibilityState {
        remaining,
        cost_lamports,
        cost_sol: lamports_to_sol(cost_lamports),
        mint_enabled: blocking_reason.is_none(),
        blocking_reason,
    }
}
