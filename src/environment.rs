//! Per-call context: block, transaction, and message environment (spec
//! component G), plus the `Fork` gate used throughout gas metering and
//! opcode availability.

use ethereum_types::{Address, H256, U256};

/// Forks supported by this interpreter, Frontier through Cancun/Dencun.
/// Anything past Cancun (Prague, Osaka, Amsterdam, ...) is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fork {
    Frontier,
    Homestead,
    Tangerine,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    MuirGlacier,
    Berlin,
    London,
    ArrowGlacier,
    GrayGlacier,
    Paris,
    Shanghai,
    Cancun,
}

impl Fork {
    pub const LATEST: Fork = Fork::Cancun;
}

#[derive(Debug, Clone)]
pub struct BlockEnv {
    pub number: u64,
    pub coinbase: Address,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub base_fee_per_gas: U256,
    pub difficulty: U256,
    pub prev_randao: Option<H256>,
    pub blob_base_fee: U256,
    pub excess_blob_gas: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionEnv {
    pub origin: Address,
    pub gas_price: U256,
    /// `None` for a contract-creation transaction.
    pub to: Option<Address>,
    pub value: U256,
    pub data: bytes::Bytes,
    pub blob_versioned_hashes: Vec<H256>,
    pub access_list: Vec<(Address, Vec<H256>)>,
}

/// The message (as opposed to the transaction) that opened the *current*
/// call frame: who is calling, whom, with how much value.
#[derive(Debug, Clone)]
pub struct MessageEnv {
    pub caller: Address,
    pub to: Address,
    pub value: U256,
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub block: BlockEnv,
    pub tx: TransactionEnv,
    pub fork: Fork,
    pub chain_id: u64,
}
