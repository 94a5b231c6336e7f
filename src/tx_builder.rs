//! Mint transaction assembly
//!
//! Builds the ordered instruction sequence for one mint attempt: a
//! compute-unit-limit directive followed by the mint instruction. The
//! ordering is mandatory; without the raised budget the mint can exhaust
//! the default compute allowance mid-execution on the remote program.
//!
//! Guard argument forwarding is guard-kind-specific. For a sol payment
//! guard the only thing forwarded is the payment destination, as a
//! writable account; the amount lives in the guard's own stored
//! configuration and is never re-specified by the client. A guard set
//! containing kinds this client cannot assemble arguments for refuses to
//! build at all.

use borsh::BorshSerialize;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};
use std::str::FromStr;

use crate::error::MintError;
use crate::machine::{GuardConfig, MachineSnapshot};

/// Fixed compute budget for a mint transaction
pub const MINT_COMPUTE_UNIT_LIMIT: u32 = 600_000;

pub static CANDY_MACHINE_PROGRAM_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::from_str("CndyV3LdqHUfDLmE5naZjVN8rBZz4tqhdefbAnjHG3JR").expect("static program id")
});

pub static CANDY_GUARD_PROGRAM_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::from_str("Guard1JwRhJkVH6XZhzoYxeBVQe872VH6QggF4BWmS9g").expect("static program id")
});

pub static TOKEN_METADATA_PROGRAM_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::from_str("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s").expect("static program id")
});

/// Anchor method discriminator: `sha256("global:<name>")[..8]`
fn method_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Argument block for a guard-wrapped mint
///
/// Per-guard arguments travel in the serialized `mint_args` block and
/// the instruction's trailing accounts. Payment amounts are never part
/// of either.
#[derive(BorshSerialize)]
struct GuardedMintArgs {
    mint_args: Vec<u8>,
    label: Option<String>,
}

/// Ordered instruction sequence for one mint attempt
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    /// The ordered list of instructions for the transaction
    pub instructions: Vec<Instruction>,
}

impl InstructionPlan {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }
}

/// Build the instruction sequence for minting one fresh asset
///
/// `asset` is the attempt-owned identity of the token being minted; it
/// must sign the transaction alongside the payer.
///
/// # Errors
///
/// Returns `MintError::UnsupportedGuard` when the guard set enables a
/// kind this client cannot assemble arguments for; no sequence is
/// produced in that case.
pub fn build_mint_instructions(
    snapshot: &MachineSnapshot,
    guard: Option<&GuardConfig>,
    asset: &Pubkey,
    payer: &Pubkey,
) -> Result<InstructionPlan, MintError> {
    if let Some(guard) = guard {
        if !guard.guards.unsupported.is_empty() {
            let names: Vec<&str> = guard
                .guards
                .unsupported
                .iter()
                .map(|kind| kind.name())
                .collect();
            return Err(MintError::unsupported_guard(names.join(", ")));
        }
    }

    let mut instructions = Vec::with_capacity(2);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
        MINT_COMPUTE_UNIT_LIMIT,
    ));
    instructions.push(match guard {
        Some(guard) => guarded_mint_instruction(snapshot, guard, asset, payer)?,
        None => direct_mint_instruction(snapshot, asset, payer),
    });

    sanity_check_ix_order(&instructions)?;

    Ok(InstructionPlan::new(instructions))
}

/// Mint through the guard program, which evaluates its preconditions and
/// CPIs into the machine program
fn guarded_mint_instruction(
    snapshot: &MachineSnapshot,
    guard: &GuardConfig,
    asset: &Pubkey,
    payer: &Pubkey,
) -> Result<Instruction, MintError> {
    let mut accounts = vec![
        AccountMeta::new_readonly(guard.address, false),
        AccountMeta::new_readonly(*CANDY_MACHINE_PROGRAM_ID, false),
        AccountMeta::new(snapshot.address, false),
        AccountMeta::new(find_authority_pda(&snapshot.address), false),
        AccountMeta::new(*payer, true),
        AccountMeta::new(*payer, true), // minter
    ];
    accounts.extend(asset_and_collection_accounts(snapshot, asset, payer));

    // Guard-specific trailing accounts, in guard order. Sol payment
    // forwards the destination only.
    if let Some(payment) = &guard.guards.sol_payment {
        accounts.push(AccountMeta::new(payment.destination, false));
    }

    let args = GuardedMintArgs {
        mint_args: Vec::new(),
        label: None,
    };
    let mut data = method_discriminator("mint_v2").to_vec();
    let encoded = borsh::to_vec(&args)
        .map_err(|e| MintError::internal(format!("mint argument encoding failed: {e}")))?;
    data.extend_from_slice(&encoded);

    Ok(Instruction {
        program_id: *CANDY_GUARD_PROGRAM_ID,
        accounts,
        data,
    })
}

/// Mint directly against the machine program (ungated machine; the
/// payer is the mint authority)
fn direct_mint_instruction(
    snapshot: &MachineSnapshot,
    asset: &Pubkey,
    payer: &Pubkey,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new(snapshot.address, false),
        AccountMeta::new(find_authority_pda(&snapshot.address), false),
        AccountMeta::new_readonly(*payer, true), // mint authority
        AccountMeta::new(*payer, true),
    ];
    accounts.extend(asset_and_collection_accounts(snapshot, asset, payer));

    Instruction {
        program_id: *CANDY_MACHINE_PROGRAM_ID,
        accounts,
        data: method_discriminator("mint_v2").to_vec(),
    }
}

/// Accounts shared by both mint paths: the fresh asset, its token-side
/// derivations, the collection wiring and the program/sysvar tail
fn asset_and_collection_accounts(
    snapshot: &MachineSnapshot,
    asset: &Pubkey,
    payer: &Pubkey,
) -> Vec<AccountMeta> {
    let token = spl_associated_token_account::get_associated_token_address(payer, asset);
    let authority_pda = find_authority_pda(&snapshot.address);

    vec![
        AccountMeta::new(*asset, true),
        AccountMeta::new_readonly(*payer, true), // asset mint authority
        AccountMeta::new(find_metadata_pda(asset), false),
        AccountMeta::new(find_master_edition_pda(asset), false),
        AccountMeta::new(token, false),
        AccountMeta::new(find_token_record_pda(asset, &token), false),
        AccountMeta::new_readonly(
            find_collection_delegate_record(
                &snapshot.collection_mint,
                &snapshot.authority,
                &authority_pda,
            ),
            false,
        ),
        AccountMeta::new_readonly(snapshot.collection_mint, false),
        AccountMeta::new(find_metadata_pda(&snapshot.collection_mint), false),
        AccountMeta::new_readonly(find_master_edition_pda(&snapshot.collection_mint), false),
        AccountMeta::new_readonly(snapshot.authority, false),
        AccountMeta::new_readonly(*TOKEN_METADATA_PROGRAM_ID, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
        AccountMeta::new_readonly(sysvar::slot_hashes::id(), false),
    ]
}

fn find_authority_pda(machine: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"candy_machine", machine.as_ref()],
        &CANDY_MACHINE_PROGRAM_ID,
    )
    .0
}

fn find_metadata_pda(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

fn find_master_edition_pda(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

fn find_token_record_pda(mint: &Pubkey, token: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"token_record",
            token.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

fn find_collection_delegate_record(
    collection_mint: &Pubkey,
    update_authority: &Pubkey,
    delegate: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            collection_mint.as_ref(),
            b"collection_delegate",
            update_authority.as_ref(),
            delegate.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Validate plan shape (debug/test only)
///
/// Expected: exactly one compute-budget directive at position 0,
/// followed by exactly one mint instruction.
#[cfg(debug_assertions)]
fn sanity_check_ix_order(instructions: &[Instruction]) -> Result<(), MintError> {
    if instructions.len() != 2 {
        return Err(MintError::internal(format!(
            "mint plan must hold exactly 2 instructions, got {}",
            instructions.len()
        )));
    }

    // SetComputeUnitLimit carries discriminant 2
    let budget = &instructions[0];
    let is_cu_limit = budget.program_id == solana_sdk::compute_budget::id()
        && budget.data.first() == Some(&2);
    if !is_cu_limit {
        return Err(MintError::internal(
            "mint plan must start with a compute-unit-limit directive",
        ));
    }

    let mint = &instructions[1];
    if mint.program_id != *CANDY_GUARD_PROGRAM_ID && mint.program_id != *CANDY_MACHINE_PROGRAM_ID {
        return Err(MintError::internal(format!(
            "unexpected mint instruction program {}",
            mint.program_id
        )));
    }

    Ok(())
}

#[cfg(not(debug_assertions))]
#[inline]
fn sanity_check_ix_order(_instructions: &[Instruction]) -> Result<(), MintError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{GuardSet, SolPayment};

    fn snapshot() -> MachineSnapshot {
        MachineSnapshot {
            address: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            mint_authority: Pubkey::new_unique(),
            collection_mint: Pubkey::new_unique(),
            items_loaded: 100,
            items_redeemed: 50,
        }
    }

    fn payment_guard(lamports: u64, destination: Pubkey) -> GuardConfig {
        GuardConfig {
            address: Pubkey::new_unique(),
            guards: GuardSet {
                sol_payment: Some(SolPayment {
                    lamports,
                    destination,
                }),
                ..GuardSet::default()
            },
        }
    }

    #[test]
    fn test_plan_shape_is_budget_then_mint() {
        let snapshot = snapshot();
        let destination = Pubkey::new_unique();
        let guard = payment_guard(500_000_000, destination);
        let asset = Pubkey::new_unique();
        let payer = Pubkey::new_unique();

        let plan = build_mint_instructions(&snapshot, Some(&guard), &asset, &payer)
            .expect("plan builds");

        assert_eq!(plan.instructions.len(), 2);
        assert_eq!(
            plan.instructions[0].program_id,
            solana_sdk::compute_budget::id()
        );
        assert_eq!(plan.instructions[0].data[0], 2); // SetComputeUnitLimit
        assert_eq!(plan.instructions[1].program_id, *CANDY_GUARD_PROGRAM_ID);
    }

    #[test]
    fn test_payment_guard_forwards_destination_not_amount() {
        let snapshot = snapshot();
        let destination = Pubkey::new_unique();
        let lamports = 500_000_000u64;
        let guard = payment_guard(lamports, destination);
        let asset = Pubkey::new_unique();
        let payer = Pubkey::new_unique();

        let plan = build_mint_instructions(&snapshot, Some(&guard), &asset, &payer)
            .expect("plan builds");
        let mint_ix = &plan.instructions[1];

        let destination_meta = mint_ix
            .accounts
            .iter()
            .find(|meta| meta.pubkey == destination)
            .expect("destination forwarded as an account");
        assert!(destination_meta.is_writable);
        assert!(!destination_meta.is_signer);

        // The amount must never be re-specified by the client.
        let amount_bytes = lamports.to_le_bytes();
        assert!(!mint_ix
            .data
            .windows(amount_bytes.len())
            .any(|window| window == amount_bytes));
    }

    #[test]
    fn test_asset_identity_signs_the_mint() {
        let snapshot = snapshot();
        let asset = Pubkey::new_unique();
        let payer = Pubkey::new_unique();

        let plan =
            build_mint_instructions(&snapshot, None, &asset, &payer).expect("plan builds");
        let mint_ix = &plan.instructions[1];

        let asset_meta = mint_ix
            .accounts
            .iter()
            .find(|meta| meta.pubkey == asset)
            .expect("asset account present");
        assert!(asset_meta.is_signer);
        assert!(asset_meta.is_writable);
    }

    #[test]
    fn test_ungated_machine_mints_directly() {
        let snapshot = snapshot();
        let asset = Pubkey::new_unique();
        let payer = Pubkey::new_unique();

        let plan =
            build_mint_instructions(&snapshot, None, &asset, &payer).expect("plan builds");

        assert_eq!(plan.instructions[1].program_id, *CANDY_MACHINE_PROGRAM_ID);
    }

    #[test]
    fn test_unsupported_guard_refuses_to_build() {
        let snapshot = snapshot();
        let guard = GuardConfig {
            address: Pubkey::new_unique(),
            guards: GuardSet {
                unsupported: vec![crate::machine::GuardKind::AllowList],
                ..GuardSet::default()
            },
        };
        let asset = Pubkey::new_unique();
        let payer = Pubkey::new_unique();

        let result = build_mint_instructions(&snapshot, Some(&guard), &asset, &payer);
        match result {
            Err(MintError::UnsupportedGuard(msg)) => assert!(msg.contains("allow_list")),
            other => panic!("expected UnsupportedGuard, got {other:?}"),
        }
    }

    #[test]
    fn test_sanity_check_rejects_missing_budget() {
        let snapshot = snapshot();
        let asset = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let mint_only = vec![direct_mint_instruction(&snapshot, &asset, &payer)];

        assert!(sanity_check_ix_order(&mint_only).is_err());
    }

    #[test]
    fn test_method_discriminator_is_stable() {
        // Anchor's global namespace hash for mint_v2; ties the data
        // prefix to the deployed program's dispatch table.
        let d = method_discriminator("mint_v2");
        assert_eq!(d.len(), 8);
        assert_ne!(d, [0u8; 8]);
        assert_eq!(d, method_discriminator("mint_v2"));
        assert_ne!(d, method_discriminator("mint"));
    }
}
