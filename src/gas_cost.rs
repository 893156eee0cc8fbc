//! Gas cost tables and dynamic-cost calculators (spec component H, §4.6).
//!
//! Three surfaces: a constant per-opcode table (the bare `u64` consts
//! below), dynamic calculators (free functions taking the values they need
//! to size a cost), and the CALL-family/SSTORE state machines.

use crate::constants::{CALL_STIPEND_DIVISOR, MAX_REFUND_QUOTIENT, WORD_SIZE_IN_BYTES_U64};
use crate::environment::{Fork, TransactionEnv};
use crate::errors::{InternalError, VMError};
use crate::memory;
use ethereum_types::U256;

// --- Constant per-opcode costs -------------------------------------------

pub const ZERO: u64 = 0;
pub const JUMPDEST: u64 = 1;
pub const BASE: u64 = 2; // ADDRESS, ORIGIN, CALLER, ... environment getters
pub const VERYLOW: u64 = 3; // ADD, SUB, PUSH*, DUP*, SWAP*, MLOAD, MSTORE, ...
pub const LOW: u64 = 5; // MUL, DIV, SDIV, MOD, SMOD, SIGNEXTEND
pub const MID: u64 = 8; // ADDMOD, MULMOD, JUMP
pub const HIGH: u64 = 10; // JUMPI
pub const BLOCKHASH: u64 = 20;
pub const WARM_STORAGE_READ: u64 = 100;

/// EIP-2929 cold-storage-slot surcharge (SLOAD first touch, and the cold
/// component of SSTORE's first touch). Distinct from
/// [`COLD_ADDRESS_ACCESS_COST`], which prices a cold *account* touch
/// (BALANCE/EXTCODE*/CALL) instead of a cold *slot* touch.
pub const COLD_STORAGE_ACCESS_COST: u64 = 2100;

/// EIP-2929 cold-account surcharge for BALANCE/EXTCODESIZE/EXTCODEHASH/
/// EXTCODECOPY/the CALL family — see [`warm_cold`].
pub const COLD_ADDRESS_ACCESS_COST: u64 = 2600;

pub const ADD: u64 = VERYLOW;
pub const SUB: u64 = VERYLOW;
pub const MUL: u64 = LOW;
pub const DIV: u64 = LOW;
pub const SDIV: u64 = LOW;
pub const MOD: u64 = LOW;
pub const SMOD: u64 = LOW;
pub const ADDMOD: u64 = MID;
pub const MULMOD: u64 = MID;
pub const SIGNEXTEND: u64 = LOW;

pub const LT: u64 = VERYLOW;
pub const GT: u64 = VERYLOW;
pub const SLT: u64 = VERYLOW;
pub const SGT: u64 = VERYLOW;
pub const EQ: u64 = VERYLOW;
pub const ISZERO: u64 = VERYLOW;
pub const AND: u64 = VERYLOW;
pub const OR: u64 = VERYLOW;
pub const XOR: u64 = VERYLOW;
pub const NOT: u64 = VERYLOW;
pub const BYTE: u64 = VERYLOW;
pub const SHL: u64 = VERYLOW;
pub const SHR: u64 = VERYLOW;
pub const SAR: u64 = VERYLOW;

pub const POP: u64 = 2;
pub const MLOAD: u64 = VERYLOW;
pub const MSTORE: u64 = VERYLOW;
pub const MSTORE8: u64 = VERYLOW;
pub const PC: u64 = BASE;
pub const MSIZE: u64 = BASE;
pub const GAS: u64 = BASE;
pub const TLOAD: u64 = 100;
pub const TSTORE: u64 = 100;
pub const MCOPY_STATIC: u64 = VERYLOW;
pub const PUSH0: u64 = BASE;
pub const PUSH: u64 = VERYLOW;
pub const DUP: u64 = VERYLOW;
pub const SWAP: u64 = VERYLOW;

pub const CALLDATALOAD: u64 = VERYLOW;
pub const CALLDATASIZE: u64 = BASE;
pub const CALLDATACOPY_STATIC: u64 = VERYLOW;
pub const CODESIZE: u64 = BASE;
pub const CODECOPY_STATIC: u64 = VERYLOW;
pub const GASPRICE: u64 = BASE;
pub const RETURNDATASIZE: u64 = BASE;
pub const RETURNDATACOPY_STATIC: u64 = VERYLOW;
pub const BLOBHASH: u64 = VERYLOW;
pub const BLOBBASEFEE: u64 = BASE;
pub const ADDRESS: u64 = BASE;
pub const ORIGIN: u64 = BASE;
pub const CALLER: u64 = BASE;
pub const CALLVALUE: u64 = BASE;
pub const COINBASE: u64 = BASE;
pub const TIMESTAMP: u64 = BASE;
pub const NUMBER: u64 = BASE;
pub const DIFFICULTY: u64 = BASE;
pub const GASLIMIT: u64 = BASE;
pub const CHAINID: u64 = BASE;
pub const SELFBALANCE: u64 = 5;
pub const BASEFEE: u64 = BASE;

pub const JUMP: u64 = MID;
pub const JUMPI: u64 = HIGH;

// --- Dynamic calculators ---------------------------------------------------

/// EXP: 10 base plus 50 per byte of the exponent.
pub fn exp(exponent: U256) -> Result<u64, VMError> {
    let exponent_byte_size = (exponent.bits() as u64).div_ceil(8);
    let dynamic = exponent_byte_size
        .checked_mul(50)
        .ok_or(InternalError::Overflow)?;
    10u64.checked_add(dynamic).ok_or(InternalError::Overflow.into())
}

/// SHA3: 30 base, 6 per word of input, plus memory expansion.
pub fn sha3(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    let minimum_word_size = (size as u64).div_ceil(WORD_SIZE_IN_BYTES_U64);
    let dynamic = minimum_word_size
        .checked_mul(6)
        .ok_or(InternalError::Overflow)?;
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    30u64
        .checked_add(dynamic)
        .and_then(|g| g.checked_add(mem))
        .ok_or(InternalError::Overflow.into())
}

/// Shared shape for the COPY family (CALLDATACOPY, CODECOPY, RETURNDATACOPY,
/// EXTCODECOPY): static cost + 3 per word copied + memory expansion.
pub fn copy(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    let minimum_word_size = (size as u64).div_ceil(WORD_SIZE_IN_BYTES_U64);
    let dynamic = minimum_word_size
        .checked_mul(3)
        .ok_or(InternalError::Overflow)?;
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    dynamic.checked_add(mem).ok_or(InternalError::Overflow.into())
}

pub fn mload(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    MLOAD.checked_add(mem).ok_or(InternalError::Overflow.into())
}

pub fn mstore(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    MSTORE.checked_add(mem).ok_or(InternalError::Overflow.into())
}

pub fn mstore8(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    MSTORE8.checked_add(mem).ok_or(InternalError::Overflow.into())
}

pub fn mcopy(new_memory_size: usize, current_memory_size: usize, size: usize) -> Result<u64, VMError> {
    let minimum_word_size = (size as u64).div_ceil(WORD_SIZE_IN_BYTES_U64);
    let dynamic = minimum_word_size
        .checked_mul(3)
        .ok_or(InternalError::Overflow)?;
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    MCOPY_STATIC
        .checked_add(dynamic)
        .and_then(|g| g.checked_add(mem))
        .ok_or(InternalError::Overflow.into())
}

/// LOGi: 375 per topic (+375 base) + 8 per byte of data + memory expansion.
pub fn log(new_memory_size: usize, current_memory_size: usize, size: usize, topic_count: u64) -> Result<u64, VMError> {
    let base = 375u64
        .checked_mul(topic_count.checked_add(1).ok_or(InternalError::Overflow)?)
        .ok_or(InternalError::Overflow)?;
    let data_cost = (size as u64).checked_mul(8).ok_or(InternalError::Overflow)?;
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    base.checked_add(data_cost)
        .and_then(|g| g.checked_add(mem))
        .ok_or(InternalError::Overflow.into())
}

/// BALANCE/EXTCODESIZE/EXTCODEHASH: warm or cold *account* access, no
/// memory term. Not for SLOAD — see [`sload`].
pub fn warm_cold(was_cold: bool) -> u64 {
    if was_cold { COLD_ADDRESS_ACCESS_COST } else { WARM_STORAGE_READ }
}

/// SLOAD: warm or cold *storage-slot* access. Cold costs
/// [`COLD_STORAGE_ACCESS_COST`] (2100), not the account-access
/// [`COLD_ADDRESS_ACCESS_COST`] (2600) `warm_cold` charges.
pub fn sload(was_cold: bool) -> u64 {
    if was_cold { COLD_STORAGE_ACCESS_COST } else { WARM_STORAGE_READ }
}

pub fn extcodecopy(new_memory_size: usize, current_memory_size: usize, size: usize, was_cold: bool) -> Result<u64, VMError> {
    let c = copy(new_memory_size, current_memory_size, size)?;
    c.checked_add(warm_cold(was_cold)).ok_or(InternalError::Overflow.into())
}

/// CREATE: 32000 base + 2 per word of init code + memory expansion.
pub fn create(new_memory_size: usize, current_memory_size: usize, init_code_size: usize) -> Result<u64, VMError> {
    let words = (init_code_size as u64).div_ceil(WORD_SIZE_IN_BYTES_U64);
    let dynamic = words.checked_mul(2).ok_or(InternalError::Overflow)?;
    let mem = memory::expansion_cost(new_memory_size, current_memory_size)?;
    32000u64
        .checked_add(dynamic)
        .and_then(|g| g.checked_add(mem))
        .ok_or(InternalError::Overflow.into())
}

/// CREATE2: CREATE's cost plus 6 per word (hashing the init code for the
/// address derivation).
pub fn create2(new_memory_size: usize, current_memory_size: usize, init_code_size: usize) -> Result<u64, VMError> {
    let words = (init_code_size as u64).div_ceil(WORD_SIZE_IN_BYTES_U64);
    let hashing = words.checked_mul(6).ok_or(InternalError::Overflow)?;
    let base = create(new_memory_size, current_memory_size, init_code_size)?;
    base.checked_add(hashing).ok_or(InternalError::Overflow.into())
}

/// SELFDESTRUCT: 5000 base + 25000 if crediting a previously-empty account
/// with a non-zero transfer + 2600 if the recipient is cold.
pub fn selfdestruct(recipient_is_empty: bool, sender_balance_is_nonzero: bool, recipient_is_cold: bool) -> Result<u64, VMError> {
    let mut cost = 5000u64;
    if recipient_is_empty && sender_balance_is_nonzero {
        cost = cost.checked_add(25000).ok_or(InternalError::Overflow)?;
    }
    if recipient_is_cold {
        cost = cost.checked_add(COLD_ADDRESS_ACCESS_COST).ok_or(InternalError::Overflow)?;
    }
    Ok(cost)
}

/// The SSTORE three-value state machine (spec §4.6). Returns the gas to
/// charge; refund bookkeeping is the caller's responsibility (see
/// [`sstore_refund_delta`]).
pub fn sstore(original: U256, current: U256, new: U256, was_cold: bool) -> Result<u64, VMError> {
    let cold_surcharge = if was_cold { COLD_STORAGE_ACCESS_COST } else { 0 };
    let base = if new == current {
        WARM_STORAGE_READ
    } else if current == original {
        if original.is_zero() { 20000 } else { 2900 }
    } else {
        WARM_STORAGE_READ
    };
    base.checked_add(cold_surcharge).ok_or(InternalError::Overflow.into())
}

/// Change in accumulated refund caused by one SSTORE, per EIP-3529 (Berlin
/// onward; this crate implements only the post-EIP-3529 schedule — see
/// DESIGN.md).
pub fn sstore_refund_delta(original: U256, current: U256, new: U256) -> i64 {
    use crate::constants::SSTORE_CLEARS_SCHEDULE_REFUND as CLEAR_REFUND;
    let clear_refund = CLEAR_REFUND as i64;
    if new == current {
        return 0;
    }
    let mut delta = 0i64;
    if current == original {
        if !original.is_zero() && new.is_zero() {
            delta += clear_refund;
        }
    } else {
        if !original.is_zero() {
            if current.is_zero() {
                delta -= clear_refund;
            } else if new.is_zero() {
                delta += clear_refund;
            }
        }
        if original == new {
            let restore_refund = if original.is_zero() {
                WARM_STORAGE_READ as i64 - 2000 // cold-then-warm baseline
            } else {
                2900 - WARM_STORAGE_READ as i64
            };
            delta += restore_refund;
        }
    }
    delta
}

/// Caps the total accumulated refund to `gas_used / MAX_REFUND_QUOTIENT`.
pub fn apply_refund_cap(gas_used: u64, refund: u64) -> u64 {
    refund.min(gas_used / MAX_REFUND_QUOTIENT)
}

/// CALL-family base cost and the EIP-150 "all but one 64th" forwarding cap.
pub struct CallCost {
    pub base_cost: u64,
    pub stipend: u64,
}

#[allow(clippy::too_many_arguments)]
pub fn call(
    was_cold: bool,
    transfers_value: bool,
    is_call_to_new_account: bool,
    requested_gas: u64,
    gas_left_after_base: u64,
) -> Result<CallCost, VMError> {
    let mut base_cost = warm_cold(was_cold);
    if transfers_value {
        base_cost = base_cost.checked_add(9000).ok_or(InternalError::Overflow)?;
    }
    if transfers_value && is_call_to_new_account {
        base_cost = base_cost.checked_add(25000).ok_or(InternalError::Overflow)?;
    }
    let available = gas_left_after_base.saturating_sub(base_cost);
    let capped = available.saturating_sub(available / CALL_STIPEND_DIVISOR);
    let mut stipend = requested_gas.min(capped);
    if transfers_value {
        // The classic "call stipend": an extra 2300 gas is always available
        // to the callee when value is transferred, letting it at least emit
        // a log, even if the caller forwarded 0.
        stipend = stipend.checked_add(2300).ok_or(InternalError::Overflow)?;
    }
    Ok(CallCost { base_cost, stipend })
}

/// EIP-150 all-but-one-64th cap applied directly to the caller's remaining
/// gas: unlike CALL (which forwards at most a *requested* amount), CREATE
/// and CREATE2 always forward the maximum the rule allows.
pub fn max_message_call_gas(gas_left: u64) -> u64 {
    gas_left.saturating_sub(gas_left / CALL_STIPEND_DIVISOR)
}

/// EIP-170 contract-code-storage cost: 200 gas per byte of deployed code.
pub fn code_deposit(code_len: usize) -> Result<u64, VMError> {
    (code_len as u64).checked_mul(200).ok_or(InternalError::Overflow.into())
}

/// Intrinsic gas for an outer transaction (§4.6, §6a): 21000 base, +32000
/// for contract creation, +4/+16 gas per zero/non-zero calldata byte, plus
/// the EIP-2930 access-list and EIP-3860 init-code surcharges when the
/// active fork supports them.
pub fn intrinsic_gas(tx: &TransactionEnv, fork: Fork) -> Result<u64, VMError> {
    let mut gas = 21000u64;
    if tx.to.is_none() {
        gas = gas.checked_add(32000).ok_or(InternalError::Overflow)?;
        if fork >= Fork::Shanghai {
            let words = (tx.data.len() as u64).div_ceil(WORD_SIZE_IN_BYTES_U64);
            let init_code_cost = words.checked_mul(2).ok_or(InternalError::Overflow)?;
            gas = gas.checked_add(init_code_cost).ok_or(InternalError::Overflow)?;
        }
    }
    for byte in tx.data.iter() {
        let per_byte = if *byte == 0 { 4 } else { 16 };
        gas = gas.checked_add(per_byte).ok_or(InternalError::Overflow)?;
    }
    if fork >= Fork::Berlin {
        for (_, storage_keys) in &tx.access_list {
            gas = gas.checked_add(2400).ok_or(InternalError::Overflow)?;
            let slots = storage_keys
                .len()
                .checked_mul(1900)
                .ok_or(InternalError::Overflow)? as u64;
            gas = gas.checked_add(slots).ok_or(InternalError::Overflow)?;
        }
    }
    Ok(gas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sstore_fresh_slot_creation() {
        let zero = U256::zero();
        let forty_two = U256::from(42);
        let gas = sstore(zero, zero, forty_two, true).unwrap();
        assert_eq!(gas, 20000 + 2100);
    }

    #[test]
    fn sstore_dirty_slot_is_warm_base_only() {
        let forty_two = U256::from(42);
        let forty_three = U256::from(43);
        let gas = sstore(U256::zero(), forty_two, forty_three, false).unwrap();
        assert_eq!(gas, WARM_STORAGE_READ);
    }

    #[test]
    fn exp_scales_with_exponent_byte_size() {
        assert_eq!(exp(U256::zero()).unwrap(), 10);
        assert_eq!(exp(U256::from(255)).unwrap(), 10 + 50);
        assert_eq!(exp(U256::from(256)).unwrap(), 10 + 100);
    }

    #[test]
    fn call_stipend_forwards_at_most_63_64ths() {
        let cc = call(false, false, false, u64::MAX, 64_000).unwrap();
        // base_cost = 100 (warm, no value transfer); available = 63_900
        assert_eq!(cc.base_cost, 100);
        assert_eq!(cc.stipend, 63_900 - 63_900 / 64);
    }

    #[test]
    fn intrinsic_gas_charges_calldata_bytes() {
        let mut tx = TransactionEnv::default();
        tx.to = Some(Default::default());
        tx.data = bytes::Bytes::from_static(&[0x00, 0x01]);
        assert_eq!(intrinsic_gas(&tx, Fork::Cancun).unwrap(), 21000 + 4 + 16);
    }
}
