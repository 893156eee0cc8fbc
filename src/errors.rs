//! Error taxonomy for the interpreter.
//!
//! Three enums, not one: [`ExceptionalHalt`] are expected, data-dependent
//! outcomes of running arbitrary bytecode (they consume all remaining gas
//! and end the frame); [`InternalError`] are invariant violations that
//! should be unreachable in a correct build; [`VMError`] is what the
//! interpreter loop and closure machinery actually propagate.

use ethereum_types::Address;
use thiserror::Error;

/// A halt caused by the bytecode itself: out-of-gas, stack misuse, invalid
/// jumps, and the like. All remaining gas is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExceptionalHalt {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    #[error("out of gas")]
    OutOfGas,
    #[error("invalid jump destination")]
    InvalidJump,
    #[error("write protection: state-mutating opcode under STATICCALL")]
    WriteProtection,
    #[error("return data copy out of bounds")]
    OutOfBounds,
    #[error("insufficient balance for transfer")]
    InsufficientBalance,
    #[error("call/create depth exceeded the maximum of 1024")]
    DepthOverflow,
    #[error("out of memory")]
    OutOfMemory,
    #[error("precompile input is malformed")]
    PrecompileError,
    #[error("contract creation collided with an existing account")]
    AccountAlreadyExists,
    #[error("init code size exceeds the EIP-3860 limit")]
    InitCodeTooLarge,
    #[error("deployed code exceeds the EIP-170 limit")]
    ContractCodeTooLarge,
    #[error("deployed code starts with the EIP-3541 reserved byte 0xef")]
    InvalidContractPrefix,
    #[error("nonce overflowed u64::MAX")]
    NonceOverflow,
}

/// A violation of an invariant the implementation itself is responsible
/// for upholding. Never expected to surface from correct code; still
/// `Result`-propagated rather than panicking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("arithmetic overflow in gas accounting")]
    Overflow,
    #[error("arithmetic underflow in gas accounting")]
    Underflow,
    #[error("type conversion failed")]
    TypeConversion,
    #[error("indexed past a bound the caller should have checked")]
    Slicing,
    #[error("accessed a call frame that does not exist")]
    NoCallFrame,
    #[error("msg was not a contract creation but a contract address was expected")]
    ExpectedCreate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("failed to read account {0:#x}: {1}")]
    AccountRead(Address, String),
    #[error("backing store error: {0}")]
    Custom(String),
}

/// Top-level error type threaded through the interpreter loop and the
/// closure machinery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    #[error(transparent)]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// Raised by the REVERT opcode. Carries no payload itself; the frame's
    /// `output` field (set before returning this error) is the revert data.
    #[error("execution reverted")]
    RevertOpcode,
}

impl VMError {
    /// Whether this error should consume all remaining gas (true for every
    /// variant except an opcode-level REVERT, which refunds unused gas).
    pub fn should_consume_all_gas(&self) -> bool {
        !matches!(self, VMError::RevertOpcode)
    }
}

/// The outcome of a single opcode handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpcodeResult {
    /// Keep running; PC already advanced as appropriate.
    Continue,
    /// Terminate the current frame successfully (STOP/RETURN/SELFDESTRUCT/
    /// implicit end of code).
    Halt,
}

/// Why a frame stopped, from the point of view of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

/// The result of running one call frame to completion, consumed by the
/// closure machinery to decide whether to merge or discard the child's
/// staged cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_used: u64,
    pub output: bytes::Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}
