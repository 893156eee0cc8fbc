//! Small helpers shared by the opcode handlers: word/address conversions
//! and size conversions that would otherwise be repeated inline at every
//! call site.

use crate::errors::{InternalError, VMError};
use ethereum_types::{Address, U256};

/// Interprets the low 20 bytes of a word as an address, as EVM opcodes that
/// read an address off the stack do (the upper 12 bytes are conventionally
/// zero, but are silently discarded rather than validated).
pub fn word_to_address(word: U256) -> Address {
    let mut bytes = [0u8; 32];
    word.to_big_endian(&mut bytes);
    #[allow(clippy::indexing_slicing)]
    Address::from_slice(&bytes[12..])
}

pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Converts a `U256` length/offset operand to `usize`, failing rather than
/// silently truncating when it cannot fit (the caller treats this as an
/// internal bug: opcode handlers are expected to bound these against gas
/// before conversion).
pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    if value > U256::from(usize::MAX) {
        return Err(InternalError::TypeConversion.into());
    }
    Ok(value.as_usize())
}

/// Converts a `(offset, size)` stack pair to `usize`, treating a zero size
/// as always representable regardless of the paired offset (an EVM
/// convention: `CALLDATACOPY`/`RETURNDATACOPY`/... with `size == 0` never
/// touch memory or fail on an absurd offset).
pub fn size_offset_to_usize(offset: U256, size: U256) -> Result<(usize, usize), VMError> {
    let size = u256_to_usize(size)?;
    if size == 0 {
        return Ok((0, 0));
    }
    Ok((u256_to_usize(offset)?, size))
}
