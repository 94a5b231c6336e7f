//! Candy machine and guard account state
//!
//! Read-only views over the two remote accounts the orchestrator cares
//! about: the machine (supply counters, collection wiring) and the
//! optional guard (payment preconditions). Both are decoded directly
//! from raw account data: the 8-byte anchor discriminator is validated,
//! then only the prefix this client needs is read.
//!
//! Guard kinds are a closed set. The two lowest feature bits (bot tax,
//! sol payment) are fully decoded; any other enabled guard is recorded
//! as unsupported so the transaction builder can refuse to assemble an
//! incomplete instruction instead of failing opaquely on-chain.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use solana_sdk::{account::Account, pubkey::Pubkey};
use std::sync::Arc;
use tracing::debug;

use crate::error::MintError;
use crate::ledger::LedgerRpc;

static MACHINE_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| account_discriminator("CandyMachine"));
static GUARD_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| account_discriminator("CandyGuard"));

/// Anchor account discriminator: `sha256("account:<Name>")[..8]`
fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("account:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Immutable snapshot of the machine account at fetch time
///
/// Superseded, never mutated, by the next fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    /// Machine account address
    pub address: Pubkey,
    /// Collection update authority
    pub authority: Pubkey,
    /// Mint authority; the guard account address when the machine is gated
    pub mint_authority: Pubkey,
    /// Collection the minted assets belong to
    pub collection_mint: Pubkey,
    /// Total supply declared by the machine
    pub items_loaded: u64,
    /// Already minted
    pub items_redeemed: u64,
}

impl MachineSnapshot {
    /// Decode a snapshot from raw machine account data
    pub fn parse(address: Pubkey, data: &[u8]) -> Result<Self, MintError> {
        if data.len() < 8 || data[..8] != *MACHINE_DISCRIMINATOR {
            return Err(MintError::fetch(format!(
                "account {address} is not a candy machine account"
            )));
        }

        let mut input = &data[8..];
        let _version = read_u8(&mut input)?;
        let _token_standard = read_u8(&mut input)?;
        let _features = read_bytes::<6>(&mut input)?;
        let authority = read_pubkey(&mut input)?;
        let mint_authority = read_pubkey(&mut input)?;
        let collection_mint = read_pubkey(&mut input)?;
        let items_redeemed = read_u64(&mut input)?;
        // First field of the machine's data block; the hidden-section
        // line counter is not parsed (see DESIGN.md).
        let items_available = read_u64(&mut input)?;

        Ok(Self {
            address,
            authority,
            mint_authority,
            collection_mint,
            items_loaded: items_available,
            items_redeemed,
        })
    }
}

/// Immutable snapshot of the guard account configuration at fetch time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Guard account address (the machine's mint authority)
    pub address: Pubkey,
    /// Enabled guards
    pub guards: GuardSet,
}

/// Decoded guard set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardSet {
    /// Bot tax: penalizes invalid mint transactions; no client arguments
    pub bot_tax: Option<BotTax>,
    /// Required payment in native units
    pub sol_payment: Option<SolPayment>,
    /// Enabled guard kinds this client cannot assemble arguments for
    pub unsupported: Vec<GuardKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotTax {
    pub lamports: u64,
    pub last_instruction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolPayment {
    /// Amount enforced by the guard's own stored configuration
    pub lamports: u64,
    /// Treasury the payment is routed to
    pub destination: Pubkey,
}

/// Guard feature slots defined by the on-chain program, in bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    BotTax,
    SolPayment,
    TokenPayment,
    StartDate,
    ThirdPartySigner,
    TokenGate,
    Gatekeeper,
    EndDate,
    AllowList,
    MintLimit,
    NftPayment,
    RedeemedAmount,
    AddressGate,
    NftGate,
    NftBurn,
    TokenBurn,
    FreezeSolPayment,
    FreezeTokenPayment,
    ProgramGate,
    Allocation,
    Token2022Payment,
}

impl GuardKind {
    pub fn from_bit(bit: u32) -> Option<Self> {
        use GuardKind::*;
        match bit {
            0 => Some(BotTax),
            1 => Some(SolPayment),
            2 => Some(TokenPayment),
            3 => Some(StartDate),
            4 => Some(ThirdPartySigner),
            5 => Some(TokenGate),
            6 => Some(Gatekeeper),
            7 => Some(EndDate),
            8 => Some(AllowList),
            9 => Some(MintLimit),
            10 => Some(NftPayment),
            11 => Some(RedeemedAmount),
            12 => Some(AddressGate),
            13 => Some(NftGate),
            14 => Some(NftBurn),
            15 => Some(TokenBurn),
            16 => Some(FreezeSolPayment),
            17 => Some(FreezeTokenPayment),
            18 => Some(ProgramGate),
            19 => Some(Allocation),
            20 => Some(Token2022Payment),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        use GuardKind::*;
        match self {
            BotTax => "bot_tax",
            SolPayment => "sol_payment",
            TokenPayment => "token_payment",
            StartDate => "start_date",
            ThirdPartySigner => "third_party_signer",
            TokenGate => "token_gate",
            Gatekeeper => "gatekeeper",
            EndDate => "end_date",
            AllowList => "allow_list",
            MintLimit => "mint_limit",
            NftPayment => "nft_payment",
            RedeemedAmount => "redeemed_amount",
            AddressGate => "address_gate",
            NftGate => "nft_gate",
            NftBurn => "nft_burn",
            TokenBurn => "token_burn",
            FreezeSolPayment => "freeze_sol_payment",
            FreezeTokenPayment => "freeze_token_payment",
            ProgramGate => "program_gate",
            Allocation => "allocation",
            Token2022Payment => "token_2022_payment",
        }
    }
}

impl GuardSet {
    /// Decode a guard set from guard account data past the discriminator
    ///
    /// Layout: base pubkey, bump, authority pubkey, then a u64 feature
    /// bitmask followed by enabled guard payloads in bit order. Bot tax
    /// and sol payment occupy the lowest bits, so their payloads precede
    /// any guard this client does not decode.
    pub fn parse(mut input: &[u8]) -> Result<Self, MintError> {
        let _base = read_pubkey(&mut input)?;
        let _bump = read_u8(&mut input)?;
        let _authority = read_pubkey(&mut input)?;
        let features = read_u64(&mut input)?;

        let mut set = GuardSet::default();
        for bit in 0..64u32 {
            if features & (1u64 << bit) == 0 {
                continue;
            }
            match GuardKind::from_bit(bit) {
                Some(GuardKind::BotTax) => {
                    set.bot_tax = Some(BotTax {
                        lamports: read_u64(&mut input)?,
                        last_instruction: read_bool(&mut input)?,
                    });
                }
                Some(GuardKind::SolPayment) => {
                    set.sol_payment = Some(SolPayment {
                        lamports: read_u64(&mut input)?,
                        destination: read_pubkey(&mut input)?,
                    });
                }
                Some(kind) => set.unsupported.push(kind),
                None => {
                    return Err(MintError::fetch(format!(
                        "guard account declares unknown feature bit {bit}"
                    )));
                }
            }
        }
        Ok(set)
    }
}

/// Remote state reader over the machine and guard accounts
///
/// Pure reads; no mutation beyond the network calls themselves.
pub struct MachineReader {
    ledger: Arc<dyn LedgerRpc>,
}

impl MachineReader {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    /// Fetch and decode the machine account
    pub async fn fetch_machine_snapshot(
        &self,
        address: &Pubkey,
    ) -> Result<MachineSnapshot, MintError> {
        let account: Account = self
            .ledger
            .get_account(address)
            .await?
            .ok_or_else(|| MintError::machine_not_found(address))?;
        let snapshot = MachineSnapshot::parse(*address, &account.data)?;
        debug!(
            machine = %address,
            items_loaded = snapshot.items_loaded,
            items_redeemed = snapshot.items_redeemed,
            "Machine snapshot fetched"
        );
        Ok(snapshot)
    }

    /// Fetch and decode the guard account behind the machine's mint
    /// authority
    ///
    /// `Ok(None)` is a valid outcome: the account may be absent, or the
    /// mint authority may be a plain wallet (ungated machine). Only a
    /// transport failure or a malformed guard account is an error.
    pub async fn fetch_guard_config(
        &self,
        mint_authority: &Pubkey,
    ) -> Result<Option<GuardConfig>, MintError> {
        let Some(account) = self.ledger.get_account(mint_authority).await? else {
            debug!(mint_authority = %mint_authority, "No guard account; machine is ungated");
            return Ok(None);
        };
        if account.data.len() < 8 || account.data[..8] != *GUARD_DISCRIMINATOR {
            debug!(mint_authority = %mint_authority, "Mint authority is not a guard account");
            return Ok(None);
        }
        let guards = GuardSet::parse(&account.data[8..])?;
        Ok(Some(GuardConfig {
            address: *mint_authority,
            guards,
        }))
    }
}

// Cursor readers over borsh-encoded (little-endian) account data.

fn read_bytes<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], MintError> {
    if input.len() < N {
        return Err(MintError::fetch("truncated account data"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&input[..N]);
    *input = &input[N..];
    Ok(out)
}

fn read_u8(input: &mut &[u8]) -> Result<u8, MintError> {
    Ok(read_bytes::<1>(input)?[0])
}

fn read_bool(input: &mut &[u8]) -> Result<bool, MintError> {
    Ok(read_u8(input)? != 0)
}

fn read_u64(input: &mut &[u8]) -> Result<u64, MintError> {
    Ok(u64::from_le_bytes(read_bytes::<8>(input)?))
}

fn read_pubkey(input: &mut &[u8]) -> Result<Pubkey, MintError> {
    Ok(Pubkey::new_from_array(read_bytes::<32>(input)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_account_data(
        authority: &Pubkey,
        mint_authority: &Pubkey,
        collection_mint: &Pubkey,
        items_redeemed: u64,
        items_available: u64,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&*MACHINE_DISCRIMINATOR);
        data.push(1); // version
        data.push(0); // token standard
        data.extend_from_slice(&[0u8; 6]); // features
        data.extend_from_slice(authority.as_ref());
        data.extend_from_slice(mint_authority.as_ref());
        data.extend_from_slice(collection_mint.as_ref());
        data.extend_from_slice(&items_redeemed.to_le_bytes());
        data.extend_from_slice(&items_available.to_le_bytes());
        // trailing machine data this client does not read
        data.extend_from_slice(&[0xAA; 32]);
        data
    }

    fn guard_set_data(features: u64, payloads: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(Pubkey::new_unique().as_ref()); // base
        data.push(255); // bump
        data.extend_from_slice(Pubkey::new_unique().as_ref()); // authority
        data.extend_from_slice(&features.to_le_bytes());
        data.extend_from_slice(payloads);
        data
    }

    #[test]
    fn test_parse_machine_snapshot() {
        let address = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let mint_authority = Pubkey::new_unique();
        let collection = Pubkey::new_unique();
        let data = machine_account_data(&authority, &mint_authority, &collection, 42, 100);

        let snapshot = MachineSnapshot::parse(address, &data).expect("parse");
        assert_eq!(snapshot.authority, authority);
        assert_eq!(snapshot.mint_authority, mint_authority);
        assert_eq!(snapshot.collection_mint, collection);
        assert_eq!(snapshot.items_redeemed, 42);
        assert_eq!(snapshot.items_loaded, 100);
    }

    #[test]
    fn test_parse_rejects_wrong_discriminator() {
        let mut data = machine_account_data(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            0,
            100,
        );
        data[0] ^= 0xFF;
        let result = MachineSnapshot::parse(Pubkey::new_unique(), &data);
        assert!(matches!(result, Err(MintError::Fetch(_))));
    }

    #[test]
    fn test_parse_rejects_truncated_data() {
        let data = MACHINE_DISCRIMINATOR.to_vec();
        let result = MachineSnapshot::parse(Pubkey::new_unique(), &data);
        assert!(matches!(result, Err(MintError::Fetch(_))));
    }

    #[test]
    fn test_parse_guard_set_with_sol_payment() {
        let destination = Pubkey::new_unique();
        let mut payloads = Vec::new();
        // bot tax: lamports + last_instruction
        payloads.extend_from_slice(&10_000_000u64.to_le_bytes());
        payloads.push(1);
        // sol payment: lamports + destination
        payloads.extend_from_slice(&500_000_000u64.to_le_bytes());
        payloads.extend_from_slice(destination.as_ref());

        let data = guard_set_data(0b11, &payloads);
        let set = GuardSet::parse(&data).expect("parse");

        let bot_tax = set.bot_tax.expect("bot tax enabled");
        assert_eq!(bot_tax.lamports, 10_000_000);
        assert!(bot_tax.last_instruction);

        let payment = set.sol_payment.expect("sol payment enabled");
        assert_eq!(payment.lamports, 500_000_000);
        assert_eq!(payment.destination, destination);
        assert!(set.unsupported.is_empty());
    }

    #[test]
    fn test_parse_guard_set_records_unsupported_kinds() {
        // allow_list (bit 8) and mint_limit (bit 9), no payment guards
        let data = guard_set_data((1 << 8) | (1 << 9), &[]);
        let set = GuardSet::parse(&data).expect("parse");
        assert!(set.sol_payment.is_none());
        assert_eq!(
            set.unsupported,
            vec![GuardKind::AllowList, GuardKind::MintLimit]
        );
    }

    #[test]
    fn test_parse_guard_set_rejects_unknown_feature_bit() {
        let data = guard_set_data(1 << 40, &[]);
        let result = GuardSet::parse(&data);
        assert!(matches!(result, Err(MintError::Fetch(_))));
    }

    #[test]
    fn test_guard_kind_bit_mapping_is_closed() {
        for bit in 0..=20 {
            assert!(GuardKind::from_bit(bit).is_some());
        }
        assert!(GuardKind::from_bit(21).is_none());
    }
}
