//! Numeric constants shared across the interpreter.

/// Maximum depth of nested CALL/CREATE frames.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Maximum number of elements on the EVM stack.
pub const STACK_LIMIT: usize = 1024;

/// Size of an EVM word, in bytes.
pub const WORD_SIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

/// Divisor in the quadratic memory expansion cost formula.
pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;

/// EIP-3860: max allowed size of CREATE/CREATE2 init code.
pub const INIT_CODE_MAX_SIZE: usize = 49152;

/// EIP-170: max allowed size of deployed contract code.
pub const MAX_CODE_SIZE: usize = 24576;

/// EIP-3541: deployed code may not start with this byte.
pub const INVALID_CONTRACT_PREFIX: u8 = 0xEF;

/// Values pushed by closure opcodes (CALL, CREATE, ...) on success/failure.
pub const SUCCESS_FOR_RETURN: u8 = 1;
pub const FAIL_FOR_RETURN: u8 = 0;

/// EIP-150: only 63/64 of remaining gas may be forwarded to a sub-call.
pub const CALL_STIPEND_DIVISOR: u64 = 64;

/// EIP-3529: refunds are capped to gas_used / 5 post-Berlin.
pub const MAX_REFUND_QUOTIENT: u64 = 5;

/// Gas refunded to the sender when a storage slot returns to its original zero value.
pub const SSTORE_CLEARS_SCHEDULE_REFUND: u64 = 4800;

/// Number of stateless precompiled contracts (addresses 0x01..=0x09).
pub const LAST_STATELESS_PRECOMPILE_ADDRESS: u64 = 0x09;
