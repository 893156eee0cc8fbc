//! One activation record of the interpreter: the execution context for a
//! single CALL/CALLCODE/DELEGATECALL/STATICCALL/CREATE/CREATE2 (spec §3's
//! "frame / closure", component D+G).

use crate::account::Contract;
use crate::errors::{ExceptionalHalt, InternalError, VMError};
use crate::memory::Memory;
use crate::stack::Stack;
use bytes::Bytes;
use ethereum_types::{Address, U256};

/// Which closure opcode produced this frame; carried mainly for tracing
/// and for the execution-trace ("Note") recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    External,
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Who invoked this frame (the address CALLER resolves to).
    pub msg_sender: Address,
    /// The storage/identity address this frame runs as (ADDRESS, SELFBALANCE,
    /// SSTORE/SLOAD target). For DELEGATECALL/CALLCODE this stays the
    /// caller's address even though `bytecode` is borrowed from elsewhere.
    pub to: Address,
    /// The address whose code is actually executing (differs from `to`
    /// under DELEGATECALL/CALLCODE).
    pub code_address: Address,
    pub bytecode: Contract,
    pub value: U256,
    pub calldata: Bytes,
    pub is_static: bool,
    pub kind: CallKind,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub depth: usize,
    /// Whether entering this frame should move `value` from sender to
    /// recipient (false for DELEGATECALL/CALLCODE, which keep value fixed).
    pub should_transfer_value: bool,
    pub is_create: bool,
    /// Where in the *parent's* memory the return data should land, and how
    /// many bytes of it (0 means "don't copy", as for CREATE).
    pub ret_offset: usize,
    pub ret_size: usize,

    pub pc: usize,
    pub stack: Stack,
    pub memory: Memory,
    /// Data returned by the most recently completed child call, exposed via
    /// RETURNDATASIZE/RETURNDATACOPY.
    pub sub_return_data: Bytes,
    /// This frame's own RETURN/REVERT payload, set just before halting.
    pub output: Bytes,
}

#[allow(clippy::too_many_arguments)]
impl CallFrame {
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Contract,
        value: U256,
        calldata: Bytes,
        is_static: bool,
        kind: CallKind,
        gas_limit: u64,
        depth: usize,
        should_transfer_value: bool,
        is_create: bool,
        ret_offset: usize,
        ret_size: usize,
        stack: Stack,
        memory: Memory,
    ) -> Self {
        Self {
            msg_sender,
            to,
            code_address,
            bytecode,
            value,
            calldata,
            is_static,
            kind,
            gas_limit,
            gas_used: 0,
            depth,
            should_transfer_value,
            is_create,
            ret_offset,
            ret_size,
            pc: 0,
            stack,
            memory,
            sub_return_data: Bytes::new(),
            output: Bytes::new(),
        }
    }

    #[inline]
    pub fn remaining_gas(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    /// Charges `amount` against this frame's remaining gas, failing with
    /// `OutOfGas` rather than letting gas go negative (spec invariant: gas
    /// remaining never goes negative; rejection happens before any state
    /// mutation from the charging opcode).
    #[inline]
    pub fn increase_consumed_gas(&mut self, amount: u64) -> Result<(), VMError> {
        let new_used = self
            .gas_used
            .checked_add(amount)
            .ok_or(InternalError::Overflow)?;
        if new_used > self.gas_limit {
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        self.gas_used = new_used;
        Ok(())
    }

    #[inline]
    pub fn next_opcode(&self) -> u8 {
        self.bytecode.opcode_at(self.pc)
    }

    /// Reads `N` bytes of immediate PUSH data starting at `offset`,
    /// zero-filling past the end of code (a halt will discard the pushed
    /// value anyway, so zero-fill is a harmless simplification).
    pub fn read_code<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.bytecode.code.get(offset + i).copied().unwrap_or(0);
        }
        out
    }
}

/// Copies a completed child frame's return data into the parent's memory at
/// `offset`, truncating or zero-padding to exactly `size` bytes.
pub fn copy_return_data_into(memory: &mut Memory, offset: usize, size: usize, data: &Bytes) {
    if size == 0 {
        return;
    }
    let to_copy = size.min(data.len());
    let _ = memory.store_data_zero_padded(offset, &data[..to_copy], size);
}
