//! The host boundary: the `Database` trait the interpreter reads persistent
//! state through (spec §6's `IExternalStorage`), plus an in-memory
//! reference implementation for tests.

use crate::account::{Account, Contract};
use crate::errors::DatabaseError;
use crate::storage::keccak256;
use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;
use rustc_hash::FxHashMap;

/// Host-supplied view of persistent world state. Every method is
/// synchronous; a host backed by a disk-resident trie should do its own
/// internal caching, same as `ethrex-levm::db::Database`.
pub trait Database: Send + Sync {
    fn get_account(&self, address: Address) -> Result<Account, DatabaseError>;
    fn get_storage_value(&self, address: Address, key: U256) -> Result<U256, DatabaseError>;
    fn get_block_hash(&self, block_number: u64) -> Result<H256, DatabaseError>;

    /// Keccak-256 of a code blob, used to populate `Account::code_hash` on
    /// deployment. Given directly rather than recomputed so a host backed by
    /// a code-hash-keyed store can avoid re-hashing.
    fn hash_of_code(&self, code: &[u8]) -> H256 {
        keccak256(code)
    }

    /// `CREATE` address derivation (spec §4.8): `keccak256(rlp([sender,
    /// nonce]))[12..]`, where `nonce` is the creating account's nonce at the
    /// time of the CREATE (pre-increment value). Overridable so a host with
    /// its own RLP/trie stack can avoid depending on this crate's choice of
    /// RLP encoder.
    fn create_address(&self, caller: Address, nonce: u64) -> Result<Address, DatabaseError> {
        Ok(StandardAddressDeriver.create_address(caller, nonce))
    }

    /// `CREATE2` address derivation (spec §4.8):
    /// `keccak256(0xff ++ sender ++ salt ++ keccak256(initCode))[12..]`.
    fn create_fixed_address(
        &self,
        caller: Address,
        salt: U256,
        init_code: &[u8],
    ) -> Result<Address, DatabaseError> {
        Ok(StandardAddressDeriver.create2_address(caller, salt, init_code))
    }

    fn account_exists(&self, address: Address) -> Result<bool, DatabaseError> {
        Ok(!self.get_account(address)?.is_empty())
    }

    fn account_empty(&self, address: Address) -> Result<bool, DatabaseError> {
        Ok(self.get_account(address)?.is_empty())
    }
}

/// The crate's own convenience address-derivation logic, used as the default
/// body of [`Database::create_address`]/[`Database::create_fixed_address`]
/// so the library works standalone without a host overriding them (spec
/// §4.8/§6a).
pub struct StandardAddressDeriver;

impl StandardAddressDeriver {
    pub fn create_address(&self, sender: Address, nonce: u64) -> Address {
        let mut stream = RlpStream::new_list(2);
        stream.append(&sender.as_bytes());
        stream.append(&nonce);
        let hash = keccak256(&stream.out());
        Address::from_slice(&hash.as_bytes()[12..])
    }

    pub fn create2_address(&self, sender: Address, salt: U256, init_code: &[u8]) -> Address {
        let init_code_hash = keccak256(init_code);
        let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
        buf.push(0xff);
        buf.extend_from_slice(sender.as_bytes());
        let mut salt_bytes = [0u8; 32];
        salt.to_big_endian(&mut salt_bytes);
        buf.extend_from_slice(&salt_bytes);
        buf.extend_from_slice(init_code_hash.as_bytes());
        let hash = keccak256(&buf);
        Address::from_slice(&hash.as_bytes()[12..])
    }
}

/// A plain in-memory `Database`, useful for unit tests and for embedding
/// this crate without a full host stack. Missing accounts are synthesized
/// as empty per spec §4.5.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    pub accounts: FxHashMap<Address, Account>,
    pub block_hashes: FxHashMap<u64, H256>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, address: Address, account: Account) -> Self {
        self.accounts.insert(address, account);
        self
    }

    pub fn add_contract(&mut self, address: Address, code: Vec<u8>, code_hash: H256) {
        let entry = self.accounts.entry(address).or_default();
        entry.contract = Some(Contract::new(code.into(), code_hash));
    }
}

impl Database for InMemoryDatabase {
    fn get_account(&self, address: Address) -> Result<Account, DatabaseError> {
        Ok(self.accounts.get(&address).cloned().unwrap_or_default())
    }

    fn get_storage_value(&self, address: Address, key: U256) -> Result<U256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .and_then(|a| a.slots.get(&key))
            .copied()
            .unwrap_or_default())
    }

    fn get_block_hash(&self, block_number: u64) -> Result<H256, DatabaseError> {
        Ok(self
            .block_hashes
            .get(&block_number)
            .copied()
            .unwrap_or_default())
    }
}
