use crate::{
    constants::WORD_SIZE,
    errors::{ExceptionalHalt, InternalError, OpcodeResult, VMError},
    gas_cost, memory,
    utils::u256_to_usize,
    vm::VM,
};
use ethereum_types::U256;

// Stack, Memory, Storage, and Flow Operations
// Opcodes: KECCAK256, POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE, JUMP,
// JUMPI, PC, MSIZE, GAS, JUMPDEST, TLOAD, TSTORE, MCOPY, DUPn, SWAPn, LOGn

/// EIP-2200's "sentry" requirement: SSTORE may not run with 2300 gas or
/// less left, so a callee that only received the stipend can never drain
/// the caller's remaining gas via storage writes.
const SSTORE_SENTRY_GAS: u64 = 2300;

impl<'a> VM<'a> {
    // KECCAK256 operation
    pub fn op_keccak256(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let [offset, size] = *call_frame.stack.pop()?;
        let (offset, size) = crate::utils::size_offset_to_usize(offset, size)?;
        let new_memory_size = memory::calculate_memory_size(offset, size)?;
        let cost = gas_cost::sha3(new_memory_size, call_frame.memory.len(), size)?;
        call_frame.increase_consumed_gas(cost)?;

        let data = call_frame.memory.load_range(offset, size)?;
        let hash = crate::storage::keccak256(&data);
        call_frame.stack.push(U256::from_big_endian(hash.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }

    // POP operation
    #[inline]
    pub fn op_pop(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::POP)?;
        call_frame.stack.pop1()?;
        Ok(OpcodeResult::Continue)
    }

    // MLOAD operation
    pub fn op_mload(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let offset = u256_to_usize(call_frame.stack.pop1()?)?;
        let new_memory_size = memory::calculate_memory_size(offset, WORD_SIZE)?;
        let cost = gas_cost::mload(new_memory_size, call_frame.memory.len())?;
        call_frame.increase_consumed_gas(cost)?;

        let value = call_frame.memory.load_word(offset)?;
        call_frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    // MSTORE operation
    pub fn op_mstore(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let [offset, value] = *call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;
        let new_memory_size = memory::calculate_memory_size(offset, WORD_SIZE)?;
        let cost = gas_cost::mstore(new_memory_size, call_frame.memory.len())?;
        call_frame.increase_consumed_gas(cost)?;

        call_frame.memory.store_word(offset, value)?;
        Ok(OpcodeResult::Continue)
    }

    // MSTORE8 operation
    pub fn op_mstore8(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let [offset, value] = *call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;
        let new_memory_size = memory::calculate_memory_size(offset, 1)?;
        let cost = gas_cost::mstore8(new_memory_size, call_frame.memory.len())?;
        call_frame.increase_consumed_gas(cost)?;

        let byte = value.byte(0);
        call_frame.memory.store_data(offset, &[byte])?;
        Ok(OpcodeResult::Continue)
    }

    // SLOAD operation
    pub fn op_sload(&mut self) -> Result<OpcodeResult, VMError> {
        let slot = self.current_call_frame.stack.pop1()?;
        let address = self.current_call_frame.to;

        let was_cold = self.storage.cache.add_accessed_storage_slot(address, slot);
        self.current_call_frame
            .increase_consumed_gas(gas_cost::sload(was_cold))?;

        let value = self.storage.get_storage(address, slot)?;
        self.current_call_frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    // SSTORE operation
    pub fn op_sstore(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }
        if self.current_call_frame.remaining_gas() <= SSTORE_SENTRY_GAS {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let [slot, new_value] = *self.current_call_frame.stack.pop()?;
        let address = self.current_call_frame.to;

        let was_cold = self.storage.cache.add_accessed_storage_slot(address, slot);
        let original = self.storage.get_original_storage(address, slot)?;
        let current = self.storage.get_storage(address, slot)?;

        let cost = gas_cost::sstore(original, current, new_value, was_cold)?;
        self.current_call_frame.increase_consumed_gas(cost)?;

        let refund_delta = gas_cost::sstore_refund_delta(original, current, new_value);
        self.storage.cache.refunded_gas = self
            .storage
            .cache
            .refunded_gas
            .saturating_add(refund_delta);

        self.storage.set_storage(address, slot, new_value)?;
        Ok(OpcodeResult::Continue)
    }

    // JUMP operation
    pub fn op_jump(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::JUMP)?;
        let dest = call_frame.stack.pop1()?;
        self.jump(dest)?;
        Ok(OpcodeResult::Continue)
    }

    // JUMPI operation
    pub fn op_jumpi(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::JUMPI)?;
        let [dest, condition] = *call_frame.stack.pop()?;
        if !condition.is_zero() {
            self.jump(dest)?;
        }
        Ok(OpcodeResult::Continue)
    }

    /// Shared jump-target validation for JUMP/JUMPI: the destination must be
    /// a JUMPDEST byte that is not inside another instruction's PUSH data.
    fn jump(&mut self, dest: U256) -> Result<(), VMError> {
        let dest = u256_to_usize(dest).map_err(|_| ExceptionalHalt::InvalidJump)?;
        if !self.current_call_frame.bytecode.is_valid_jump(dest) {
            return Err(ExceptionalHalt::InvalidJump.into());
        }
        self.current_call_frame.pc = dest;
        Ok(())
    }

    // PC operation
    pub fn op_pc(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::PC)?;
        // PC has already been advanced past this opcode's own byte by the
        // interpreter loop, so the value observed here is one less than
        // the current pc.
        let pc = call_frame.pc.checked_sub(1).ok_or(InternalError::Underflow)?;
        call_frame.stack.push(U256::from(pc))?;
        Ok(OpcodeResult::Continue)
    }

    // MSIZE operation
    pub fn op_msize(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::MSIZE)?;
        call_frame.stack.push(U256::from(call_frame.memory.len()))?;
        Ok(OpcodeResult::Continue)
    }

    // GAS operation
    pub fn op_gas(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::GAS)?;
        // Gas remaining is observed *after* this opcode's own cost, per the
        // Yellow Paper (the value GAS pushes already excludes its own fee).
        call_frame.stack.push(U256::from(call_frame.remaining_gas()))?;
        Ok(OpcodeResult::Continue)
    }

    // JUMPDEST operation
    #[inline]
    pub fn op_jumpdest(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::JUMPDEST)?;
        Ok(OpcodeResult::Continue)
    }

    // TLOAD operation (EIP-1153)
    pub fn op_tload(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::TLOAD)?;
        let slot = call_frame.stack.pop1()?;
        let address = call_frame.to;
        let value = self.storage.get_transient(address, slot);
        self.current_call_frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    // TSTORE operation (EIP-1153)
    pub fn op_tstore(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::TSTORE)?;
        let [slot, value] = *call_frame.stack.pop()?;
        let address = call_frame.to;
        self.storage.set_transient(address, slot, value);
        Ok(OpcodeResult::Continue)
    }

    // MCOPY operation (EIP-5656)
    pub fn op_mcopy(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let [dest_offset, src_offset, size] = *call_frame.stack.pop()?;
        let dest_offset = u256_to_usize(dest_offset)?;
        let src_offset = u256_to_usize(src_offset)?;
        let size = u256_to_usize(size)?;

        let new_memory_size = memory::calculate_memory_size(dest_offset.max(src_offset), size)?;
        let cost = gas_cost::mcopy(new_memory_size, call_frame.memory.len(), size)?;
        call_frame.increase_consumed_gas(cost)?;

        call_frame.memory.copy_within(src_offset, dest_offset, size)?;
        Ok(OpcodeResult::Continue)
    }

    // Generic DUPn operation: duplicates the element `N` positions below
    // the top (1-indexed, matching DUP1..DUP16).
    #[inline]
    pub fn op_dup<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::DUP)?;
        call_frame.stack.dup(N)?;
        Ok(OpcodeResult::Continue)
    }

    // Generic SWAPn operation: exchanges the top with the element `N`
    // positions below it (1-indexed, matching SWAP1..SWAP16).
    #[inline]
    pub fn op_swap<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::SWAP)?;
        call_frame.stack.swap(N)?;
        Ok(OpcodeResult::Continue)
    }

    // Generic LOGn operation: emits an event with `N` indexed topics.
    pub fn op_log<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }

        let call_frame = &mut self.current_call_frame;
        let [offset, size] = *call_frame.stack.pop()?;
        let topics_words = call_frame.stack.pop::<N>()?;
        let (offset, size) = crate::utils::size_offset_to_usize(offset, size)?;

        let new_memory_size = memory::calculate_memory_size(offset, size)?;
        let cost = gas_cost::log(new_memory_size, call_frame.memory.len(), size, N as u64)?;
        call_frame.increase_consumed_gas(cost)?;

        let data = call_frame.memory.load_range(offset, size)?;
        let mut bytes = [0u8; 32];
        let topics = topics_words
            .iter()
            .map(|word| {
                word.to_big_endian(&mut bytes);
                ethereum_types::H256::from_slice(&bytes)
            })
            .collect();

        let address = call_frame.to;
        self.storage.log(address, topics, data);
        Ok(OpcodeResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::Contract,
        call_frame::{CallFrame, CallKind},
        db::InMemoryDatabase,
        environment::{BlockEnv, Environment, Fork, TransactionEnv},
        memory::Memory,
        stack::Stack,
        storage::Storage,
    };
    use ethereum_types::{Address, H256};

    fn test_env() -> Environment {
        Environment {
            block: BlockEnv {
                number: 1,
                coinbase: Address::zero(),
                timestamp: 0,
                gas_limit: 30_000_000,
                base_fee_per_gas: U256::zero(),
                difficulty: U256::zero(),
                prev_randao: Some(H256::zero()),
                blob_base_fee: U256::zero(),
                excess_blob_gas: None,
            },
            tx: TransactionEnv::default(),
            fork: Fork::Cancun,
            chain_id: 1,
        }
    }

    fn frame_with_code(code: Vec<u8>, gas_limit: u64) -> CallFrame {
        CallFrame::new(
            Address::zero(),
            Address::repeat_byte(1),
            Address::repeat_byte(1),
            Contract::new(code.into(), H256::zero()),
            U256::zero(),
            bytes::Bytes::new(),
            false,
            CallKind::External,
            gas_limit,
            0,
            false,
            false,
            0,
            0,
            Stack::new(),
            Memory::new(),
        )
    }

    #[test]
    fn jump_to_push_data_is_invalid() {
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(vec![0x60, 0x5b, 0x00], 1_000_000);
        let mut vm = VM::new(storage, test_env(), frame);
        vm.current_call_frame.stack.push(U256::from(1)).unwrap();
        let err = vm.op_jump().unwrap_err();
        assert_eq!(err, ExceptionalHalt::InvalidJump.into());
    }

    #[test]
    fn sstore_sentry_gas_rejects_low_remaining_gas() {
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(vec![0x00], SSTORE_SENTRY_GAS);
        let mut vm = VM::new(storage, test_env(), frame);
        vm.current_call_frame.stack.push(U256::from(1)).unwrap();
        vm.current_call_frame.stack.push(U256::zero()).unwrap();
        let err = vm.op_sstore().unwrap_err();
        assert_eq!(err, ExceptionalHalt::OutOfGas.into());
    }

    #[test]
    fn mstore_then_mload_roundtrips() {
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(vec![0x00], 1_000_000);
        let mut vm = VM::new(storage, test_env(), frame);
        vm.current_call_frame.stack.push(U256::from(7)).unwrap();
        vm.current_call_frame.stack.push_zero().unwrap();
        vm.op_mstore().unwrap();
        vm.current_call_frame.stack.push_zero().unwrap();
        vm.op_mload().unwrap();
        assert_eq!(vm.current_call_frame.stack.peek().unwrap(), U256::from(7));
    }
}
