//! The layered storage cache and its read-through façade over the host
//! database (spec components E "ResultCache" and F "Storage").

use crate::account::Account;
use crate::db::Database;
use crate::errors::{ExceptionalHalt, VMError};
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An event emitted by LOGi, staged in the cache until the transaction
/// commits. Serializable so a host can hand the staged log set back to the
/// caller without this crate owning the host's own log representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// The staged-mutation record of one call frame (spec §3 `ResultCache`).
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    /// First-observed value of every account touched in this frame, for
    /// account-level diffing by the host.
    pub original_accounts: FxHashMap<Address, Account>,
    /// The mutable working copy; all reads/writes hit this first.
    pub cached_accounts: FxHashMap<Address, Account>,
    /// Accounts created in this frame (or an ancestor that committed into
    /// it) — needed both to discard on revert and for EIP-6780's
    /// same-transaction SELFDESTRUCT rule.
    pub new_contract_accounts: FxHashSet<Address>,
    pub logs: Vec<Log>,
    /// Addresses scheduled for destruction at frame commit, paired with
    /// their beneficiary.
    pub destructs: FxHashMap<Address, Address>,
    /// Opaque per-slot byte blobs for stateful precompiles.
    pub data_block_cache: FxHashMap<(Address, U256), Vec<u8>>,
    pub transient_original: FxHashMap<(Address, U256), U256>,
    pub transient_cached: FxHashMap<(Address, U256), U256>,
    /// EIP-2929 warm/cold tracking, shared across the whole transaction.
    pub accessed_addresses: FxHashSet<Address>,
    pub accessed_storage_slots: FxHashSet<(Address, U256)>,
    /// Accumulated refund counter (pre-cap); capped once at transaction end
    /// per EIP-3529.
    pub refunded_gas: i64,
}

impl ResultCache {
    pub fn add_accessed_address(&mut self, address: Address) -> bool {
        self.accessed_addresses.insert(address)
    }

    pub fn is_address_warm(&self, address: Address) -> bool {
        self.accessed_addresses.contains(&address)
    }

    pub fn add_accessed_storage_slot(&mut self, address: Address, slot: U256) -> bool {
        self.accessed_storage_slots.insert((address, slot))
    }

    pub fn is_slot_warm(&self, address: Address, slot: U256) -> bool {
        self.accessed_storage_slots.contains(&(address, slot))
    }

    /// Merges a completed child frame's cache into this (the parent's)
    /// cache: account/slot updates in the child supersede the parent's for
    /// the keys touched, logs are appended, destructs and new-accounts are
    /// unioned. Called only on the child's non-reverting, successful exit.
    pub fn merge_child(&mut self, child: ResultCache) {
        for (addr, account) in child.cached_accounts {
            self.cached_accounts.insert(addr, account);
        }
        for (addr, account) in child.original_accounts {
            self.original_accounts.entry(addr).or_insert(account);
        }
        self.new_contract_accounts.extend(child.new_contract_accounts);
        self.logs.extend(child.logs);
        self.destructs.extend(child.destructs);
        self.data_block_cache.extend(child.data_block_cache);
        self.transient_cached.extend(child.transient_cached);
        for (k, v) in child.transient_original {
            self.transient_original.entry(k).or_insert(v);
        }
        self.accessed_addresses.extend(child.accessed_addresses);
        self.accessed_storage_slots.extend(child.accessed_storage_slots);
        self.refunded_gas += child.refunded_gas;
    }
}

/// Read-through façade the interpreter actually calls into: `ResultCache`
/// plus a handle to the host's persistent view. One `Storage` is built per
/// outer `Execute()`; nested frames share it by reference (there is no
/// per-frame `Storage` clone — isolation is achieved by forking the
/// `ResultCache` specifically, see [`Storage::fork`]).
pub struct Storage<'a> {
    pub cache: ResultCache,
    pub db: &'a dyn Database,
}

impl<'a> Storage<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self {
            cache: ResultCache::default(),
            db,
        }
    }

    /// Account fetch per spec §4.5: cache first, then the host, recording
    /// both the original and cached snapshot on first sight. Missing
    /// accounts materialize as empty.
    pub fn get_account(&mut self, address: Address) -> Result<Account, VMError> {
        if let Some(account) = self.cache.cached_accounts.get(&address) {
            return Ok(account.clone());
        }
        let account = self
            .db
            .get_account(address)
            .map_err(VMError::Database)?;
        self.cache
            .original_accounts
            .insert(address, account.clone());
        self.cache
            .cached_accounts
            .insert(address, account.clone());
        Ok(account)
    }

    fn mutate_account(&mut self, address: Address, f: impl FnOnce(&mut Account)) -> Result<(), VMError> {
        let _ = self.get_account(address)?;
        #[allow(clippy::expect_used, reason = "get_account just inserted this key")]
        let account = self
            .cache
            .cached_accounts
            .get_mut(&address)
            .expect("get_account just populated this entry");
        f(account);
        Ok(())
    }

    /// SLOAD read path.
    pub fn get_storage(&mut self, address: Address, slot: U256) -> Result<U256, VMError> {
        let account = self.get_account(address)?;
        if let Some(value) = account.slots.get(&slot) {
            return Ok(*value);
        }
        let value = self
            .db
            .get_storage_value(address, slot)
            .map_err(VMError::Database)?;
        self.mutate_account(address, |a| {
            a.slots.insert(slot, value);
        })?;
        Ok(value)
    }

    /// SSTORE write path: original (if unseen) is materialized by the read
    /// above before this is called by opcode handlers, which always read
    /// the current value first to build the gas state machine's inputs.
    pub fn set_storage(&mut self, address: Address, slot: U256, value: U256) -> Result<(), VMError> {
        self.mutate_account(address, |a| {
            a.slots.insert(slot, value);
        })
    }

    /// The "original" value for the SSTORE gas state machine: the value
    /// observed the first time this frame (or an ancestor merged into it)
    /// touched the slot, independent of later writes in the same frame.
    pub fn get_original_storage(&mut self, address: Address, slot: U256) -> Result<U256, VMError> {
        if let Some(account) = self.cache.original_accounts.get(&address) {
            if let Some(value) = account.slots.get(&slot) {
                return Ok(*value);
            }
        }
        let value = self
            .db
            .get_storage_value(address, slot)
            .map_err(VMError::Database)?;
        self.cache
            .original_accounts
            .entry(address)
            .or_default()
            .slots
            .entry(slot)
            .or_insert(value);
        Ok(value)
    }

    pub fn get_transient(&self, address: Address, slot: U256) -> U256 {
        self.cache
            .transient_cached
            .get(&(address, slot))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_transient(&mut self, address: Address, slot: U256, value: U256) {
        self.cache
            .transient_original
            .entry((address, slot))
            .or_insert_with(U256::zero);
        self.cache.transient_cached.insert((address, slot), value);
    }

    /// `Transfer(from, to, value)` per spec §4.5.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VMError> {
        if value.is_zero() {
            // Still materializes both accounts in the cache (a zero-value
            // CALL still touches its target for EIP-2929 purposes) but
            // changes no balances.
            self.get_account(from)?;
            self.get_account(to)?;
            return Ok(());
        }
        let from_account = self.get_account(from)?;
        if from_account.balance < value {
            return Err(ExceptionalHalt::InsufficientBalance.into());
        }
        self.mutate_account(from, |a| {
            a.balance = a.balance.saturating_sub(value);
        })?;
        self.mutate_account(to, |a| {
            a.balance = a.balance.saturating_add(value);
        })?;
        Ok(())
    }

    pub fn increment_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        let account = self.get_account(address)?;
        let new_nonce = account
            .nonce
            .checked_add(1)
            .ok_or(ExceptionalHalt::NonceOverflow)?;
        self.mutate_account(address, |a| a.nonce = new_nonce)?;
        Ok(new_nonce)
    }

    pub fn set_code(&mut self, address: Address, contract: crate::account::Contract) -> Result<(), VMError> {
        self.mutate_account(address, |a| a.contract = Some(contract))?;
        Ok(())
    }

    /// Forks the cache for a nested frame: a deep clone so the child's
    /// mutations are invisible to the parent unless explicitly merged back
    /// in via [`ResultCache::merge_child`].
    pub fn fork(&self) -> ResultCache {
        self.cache.clone()
    }

    pub fn log(&mut self, address: Address, topics: Vec<H256>, data: Bytes) {
        self.cache.logs.push(Log { address, topics, data });
    }

    pub fn schedule_destruct(&mut self, address: Address, beneficiary: Address) {
        self.cache.destructs.insert(address, beneficiary);
    }

    pub fn was_created_this_transaction(&self, address: Address) -> bool {
        self.cache.new_contract_accounts.contains(&address)
    }

    pub fn mark_created_this_transaction(&mut self, address: Address) {
        self.cache.new_contract_accounts.insert(address);
    }
}

/// Computes the canonical Keccak-256 hash of a byte slice. This is the one
/// concrete hashing primitive the interpreter core carries directly (for
/// SHA3 and contract-code hashing); see SPEC_FULL.md §1.
pub fn keccak256(data: &[u8]) -> H256 {
    use sha3::{Digest, Keccak256};
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_slice(&hasher.finalize())
}

pub type ContractCode = Arc<[u8]>;
