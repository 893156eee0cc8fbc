use crate::{
    errors::{InternalError, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    utils::{address_to_word, size_offset_to_usize, u256_to_usize, word_to_address},
    vm::VM,
};
use ethereum_types::U256;

// Environmental Information (16)
// Opcodes: ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD,
// CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE,
// EXTCODECOPY, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH

impl<'a> VM<'a> {
    // ADDRESS operation
    pub fn op_address(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::ADDRESS)?;
        let addr = address_to_word(call_frame.to);
        call_frame.stack.push(addr)?;
        Ok(OpcodeResult::Continue)
    }

    // BALANCE operation
    pub fn op_balance(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let was_cold = !self.storage.cache.add_accessed_address(address);
        self.current_call_frame
            .increase_consumed_gas(gas_cost::warm_cold(was_cold))?;

        let balance = self.storage.get_account(address)?.balance;
        self.current_call_frame.stack.push(balance)?;
        Ok(OpcodeResult::Continue)
    }

    // ORIGIN operation
    pub fn op_origin(&mut self) -> Result<OpcodeResult, VMError> {
        let origin = address_to_word(self.env.tx.origin);
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::ORIGIN)?;
        call_frame.stack.push(origin)?;
        Ok(OpcodeResult::Continue)
    }

    // CALLER operation
    pub fn op_caller(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::CALLER)?;
        let caller = address_to_word(call_frame.msg_sender);
        call_frame.stack.push(caller)?;
        Ok(OpcodeResult::Continue)
    }

    // CALLVALUE operation
    pub fn op_callvalue(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::CALLVALUE)?;
        call_frame.stack.push(call_frame.value)?;
        Ok(OpcodeResult::Continue)
    }

    // CALLDATALOAD operation
    pub fn op_calldataload(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::CALLDATALOAD)?;

        let offset = call_frame.stack.pop1()?;
        let calldata_len = call_frame.calldata.len();

        // An offset past the end of calldata produces an all-zero word;
        // this also covers offsets too large to fit in a usize.
        let Ok(offset) = u256_to_usize(offset) else {
            call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        };
        if offset >= calldata_len {
            call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        let mut data = [0u8; 32];
        let available = calldata_len.saturating_sub(offset);
        let copy_size = available.min(32);
        #[allow(clippy::indexing_slicing, reason = "copy_size bounded by available above")]
        data[..copy_size].copy_from_slice(&call_frame.calldata[offset..offset + copy_size]);

        call_frame.stack.push(U256::from_big_endian(&data))?;
        Ok(OpcodeResult::Continue)
    }

    // CALLDATASIZE operation
    pub fn op_calldatasize(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::CALLDATASIZE)?;
        call_frame.stack.push(U256::from(call_frame.calldata.len()))?;
        Ok(OpcodeResult::Continue)
    }

    // CALLDATACOPY operation
    pub fn op_calldatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let [dest_offset, calldata_offset, size] = *call_frame.stack.pop()?;
        let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
        let calldata_offset = u256_to_usize(calldata_offset).unwrap_or(usize::MAX);

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let cost = gas_cost::copy(new_memory_size, call_frame.memory.len(), size)?;
        call_frame.increase_consumed_gas(cost)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let slice = slice_with_zero_pad(&call_frame.calldata, calldata_offset, size);
        call_frame
            .memory
            .store_data_zero_padded(dest_offset, &slice, size)?;
        Ok(OpcodeResult::Continue)
    }

    // CODESIZE operation
    pub fn op_codesize(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::CODESIZE)?;
        call_frame
            .stack
            .push(U256::from(call_frame.bytecode.code.len()))?;
        Ok(OpcodeResult::Continue)
    }

    // CODECOPY operation
    pub fn op_codecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let [dest_offset, code_offset, size] = *call_frame.stack.pop()?;
        let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
        let code_offset = u256_to_usize(code_offset).unwrap_or(usize::MAX);

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let cost = gas_cost::copy(new_memory_size, call_frame.memory.len(), size)?;
        call_frame.increase_consumed_gas(cost)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let slice = slice_with_zero_pad(&call_frame.bytecode.code, code_offset, size);
        call_frame
            .memory
            .store_data_zero_padded(dest_offset, &slice, size)?;
        Ok(OpcodeResult::Continue)
    }

    // GASPRICE operation
    pub fn op_gasprice(&mut self) -> Result<OpcodeResult, VMError> {
        let gas_price = self.env.tx.gas_price;
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::GASPRICE)?;
        call_frame.stack.push(gas_price)?;
        Ok(OpcodeResult::Continue)
    }

    // EXTCODESIZE operation
    pub fn op_extcodesize(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let was_cold = !self.storage.cache.add_accessed_address(address);
        self.current_call_frame
            .increase_consumed_gas(gas_cost::warm_cold(was_cold))?;

        let code_len = self
            .storage
            .get_account(address)?
            .contract
            .map(|c| c.code_size())
            .unwrap_or(0);
        self.current_call_frame.stack.push(U256::from(code_len))?;
        Ok(OpcodeResult::Continue)
    }

    // EXTCODECOPY operation
    pub fn op_extcodecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let [address, dest_offset, offset, size] = *self.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
        let offset = u256_to_usize(offset).unwrap_or(usize::MAX);

        let current_memory_size = self.current_call_frame.memory.len();
        let was_cold = !self.storage.cache.add_accessed_address(address);
        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let cost = gas_cost::extcodecopy(new_memory_size, current_memory_size, size, was_cold)?;
        self.current_call_frame.increase_consumed_gas(cost)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let code = self
            .storage
            .get_account(address)?
            .contract
            .unwrap_or_else(crate::account::Contract::empty)
            .code;
        let slice = slice_with_zero_pad(&code, offset, size);
        self.current_call_frame
            .memory
            .store_data_zero_padded(dest_offset, &slice, size)?;
        Ok(OpcodeResult::Continue)
    }

    // RETURNDATASIZE operation
    pub fn op_returndatasize(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::RETURNDATASIZE)?;
        call_frame
            .stack
            .push(U256::from(call_frame.sub_return_data.len()))?;
        Ok(OpcodeResult::Continue)
    }

    // RETURNDATACOPY operation
    pub fn op_returndatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        use crate::errors::ExceptionalHalt;

        let call_frame = &mut self.current_call_frame;
        let [dest_offset, returndata_offset, size] = *call_frame.stack.pop()?;
        let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
        let returndata_offset =
            u256_to_usize(returndata_offset).map_err(|_| ExceptionalHalt::OutOfBounds)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let cost = gas_cost::copy(new_memory_size, call_frame.memory.len(), size)?;
        call_frame.increase_consumed_gas(cost)?;

        let sub_return_data_len = call_frame.sub_return_data.len();
        let copy_limit = returndata_offset
            .checked_add(size)
            .ok_or(InternalError::Overflow)?;
        if copy_limit > sub_return_data_len {
            return Err(ExceptionalHalt::OutOfBounds.into());
        }

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        #[allow(clippy::indexing_slicing, reason = "copy_limit checked above")]
        let slice = call_frame.sub_return_data[returndata_offset..copy_limit].to_vec();
        call_frame.memory.store_data(dest_offset, &slice)?;
        Ok(OpcodeResult::Continue)
    }

    // EXTCODEHASH operation
    pub fn op_extcodehash(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let was_cold = !self.storage.cache.add_accessed_address(address);
        self.current_call_frame
            .increase_consumed_gas(gas_cost::warm_cold(was_cold))?;

        let account = self.storage.get_account(address)?;
        // An account is empty per EIP-161 when it has no code, zero nonce,
        // and zero balance; EXTCODEHASH of an empty or nonexistent account
        // is zero rather than keccak256(b"").
        if account.is_empty() {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }
        let hash = account
            .contract
            .map(|c| c.code_hash)
            .unwrap_or_default();
        self.current_call_frame
            .stack
            .push(U256::from_big_endian(hash.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }
}

/// Reads `size` bytes starting at `offset` from `data`, zero-padding past
/// its end. Shared by CALLDATACOPY/CODECOPY/EXTCODECOPY's slow paths.
fn slice_with_zero_pad(data: &[u8], offset: usize, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    if offset >= data.len() {
        return out;
    }
    let available = data.len().saturating_sub(offset);
    let copy_size = available.min(size);
    #[allow(clippy::indexing_slicing, reason = "copy_size bounded by available and size above")]
    out[..copy_size].copy_from_slice(&data[offset..offset + copy_size]);
    out
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

    fn frame_with_calldata(calldata: Vec<u8>) -> CallFrame {
        CallFrame::new(
            Address::zero(),
            Address::repeat_byte(1),
            Address::repeat_byte(1),
            Contract::new(vec![0x00].into(), H256::zero()),
            U256::zero(),
            calldata.into(),
            false,
            CallKind::External,
            1_000_000,
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
    fn calldataload_past_end_is_zero() {
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_calldata(vec![0xAA]);
        let mut vm = VM::new(storage, test_env(), frame);
        vm.current_call_frame.stack.push(U256::from(100)).unwrap();
        vm.op_calldataload().unwrap();
        assert_eq!(vm.current_call_frame.stack.peek().unwrap(), U256::zero());
    }

    #[test]
    fn calldataload_reads_and_zero_pads_tail() {
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_calldata(vec![0xFF]);
        let mut vm = VM::new(storage, test_env(), frame);
        vm.current_call_frame.stack.push_zero().unwrap();
        vm.op_calldataload().unwrap();
        let expected = U256::from(0xFFu8) << 248;
        assert_eq!(vm.current_call_frame.stack.peek().unwrap(), expected);
    }

    #[test]
    fn extcodehash_of_empty_account_is_zero() {
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_calldata(vec![]);
        let mut vm = VM::new(storage, test_env(), frame);
        vm.current_call_frame
            .stack
            .push(address_to_word(Address::repeat_byte(9)))
            .unwrap();
        vm.op_extcodehash().unwrap();
        assert_eq!(vm.current_call_frame.stack.peek().unwrap(), U256::zero());
    }
}
