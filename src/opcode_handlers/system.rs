//! The closure machinery (spec component K): CALL/CALLCODE/DELEGATECALL/
//! STATICCALL, CREATE/CREATE2, RETURN/REVERT/INVALID, and SELFDESTRUCT.
//! Every opcode here either builds a child [`VM`] and runs it to completion
//! or halts the current frame outright.

use crate::{
    account::Contract,
    call_frame::{CallFrame, CallKind, copy_return_data_into},
    constants::{INIT_CODE_MAX_SIZE, INVALID_CONTRACT_PREFIX, MAX_CALL_DEPTH, MAX_CODE_SIZE},
    environment::Fork,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost, memory,
    memory::calculate_memory_size,
    opcodes::Opcode,
    precompiles,
    stack::Stack,
    storage::{self, Storage},
    utils::{address_to_word, size_offset_to_usize, word_to_address},
    vm::VM,
};
use bytes::Bytes;
use ethereum_types::{Address, U256};
use std::rc::Rc;

/// Saturating `U256 -> u64` conversion for a "gas" stack operand: a caller
/// that pushes an absurdly large value just means "forward everything I
/// have", which the EIP-150 cap in [`gas_cost::call`] handles regardless.
fn gas_operand_to_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

impl<'a> VM<'a> {
    // CALL operation
    pub fn op_call(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, value, args_offset, args_size, ret_offset, ret_size] =
            *self.current_call_frame.stack.pop::<7>()?;
        let to = word_to_address(address);
        let msg_sender = self.current_call_frame.to;
        self.generic_call(
            CallKind::Call,
            gas,
            to,
            to,
            msg_sender,
            value,
            false,
            true,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    // CALLCODE operation
    pub fn op_callcode(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, value, args_offset, args_size, ret_offset, ret_size] =
            *self.current_call_frame.stack.pop::<7>()?;
        let code_address = word_to_address(address);
        let own_address = self.current_call_frame.to;
        self.generic_call(
            CallKind::CallCode,
            gas,
            code_address,
            own_address,
            own_address,
            value,
            false,
            false,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    // DELEGATECALL operation
    pub fn op_delegatecall(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_size, ret_offset, ret_size] =
            *self.current_call_frame.stack.pop::<6>()?;
        let code_address = word_to_address(address);
        let own_address = self.current_call_frame.to;
        let original_sender = self.current_call_frame.msg_sender;
        let value = self.current_call_frame.value;
        self.generic_call(
            CallKind::DelegateCall,
            gas,
            code_address,
            own_address,
            original_sender,
            value,
            false,
            false,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    // STATICCALL operation
    pub fn op_staticcall(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_size, ret_offset, ret_size] =
            *self.current_call_frame.stack.pop::<6>()?;
        let to = word_to_address(address);
        let msg_sender = self.current_call_frame.to;
        self.generic_call(
            CallKind::StaticCall,
            gas,
            to,
            to,
            msg_sender,
            U256::zero(),
            true,
            false,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    /// Shared implementation behind all four closure-call opcodes: charges
    /// memory expansion and the EIP-2929/EIP-150 base cost against the
    /// *parent* frame, then either dispatches to a precompile or builds and
    /// runs a child [`VM`], merging its cache back in only on success.
    #[allow(clippy::too_many_arguments)]
    fn generic_call(
        &mut self,
        kind: CallKind,
        gas: U256,
        code_address: Address,
        to: Address,
        msg_sender: Address,
        value: U256,
        is_static_call: bool,
        should_transfer_value: bool,
        args_offset: U256,
        args_size: U256,
        ret_offset: U256,
        ret_size: U256,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static && !is_static_call && !value.is_zero() {
            return Err(ExceptionalHalt::WriteProtection.into());
        }

        let (args_offset, args_size) = size_offset_to_usize(args_offset, args_size)?;
        let (ret_offset, ret_size) = size_offset_to_usize(ret_offset, ret_size)?;

        let current_memory_size = self.current_call_frame.memory.len();
        let new_memory_size = calculate_memory_size(args_offset, args_size)?
            .max(calculate_memory_size(ret_offset, ret_size)?);
        let mem_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
        self.current_call_frame.increase_consumed_gas(mem_cost)?;
        self.current_call_frame.memory.resize(new_memory_size)?;

        let was_cold = !self.storage.cache.add_accessed_address(code_address);
        let target_is_empty = self.storage.get_account(to)?.is_empty();
        let transfers_value = should_transfer_value && !value.is_zero();
        let is_call_to_new_account =
            matches!(kind, CallKind::Call) && transfers_value && target_is_empty;

        let requested_gas = gas_operand_to_u64(gas);
        let gas_left_after_base = self.current_call_frame.remaining_gas();
        let call_cost = gas_cost::call(
            was_cold,
            transfers_value,
            is_call_to_new_account,
            requested_gas,
            gas_left_after_base,
        )?;
        self.current_call_frame
            .increase_consumed_gas(call_cost.base_cost)?;
        let child_gas_limit = call_cost.stipend;

        // Depth overflow and a failed value transfer both fail only the
        // child: the parent keeps running with a 0 pushed, and the gas
        // already charged above (memory expansion, warm/cold, base cost)
        // stays spent.
        if self.current_call_frame.depth >= MAX_CALL_DEPTH {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        if should_transfer_value {
            if self.storage.transfer(msg_sender, to, value).is_err() {
                self.current_call_frame.stack.push_zero()?;
                return Ok(OpcodeResult::Continue);
            }
        } else if matches!(kind, CallKind::CallCode) && !value.is_zero() {
            // CALLCODE never moves funds (it runs another account's code
            // against its own storage) but still requires the balance it
            // claims to send.
            let sender_balance = self.storage.get_account(msg_sender)?.balance;
            if sender_balance < value {
                self.current_call_frame.stack.push_zero()?;
                return Ok(OpcodeResult::Continue);
            }
        }

        let calldata = self
            .current_call_frame
            .memory
            .load_range(args_offset, args_size)?;

        if precompiles::is_precompile(code_address, self.env.fork) {
            return self.call_precompile(kind, msg_sender, to, child_gas_limit, value, &calldata, ret_offset, ret_size);
        }
        if self
            .precompile_registry
            .as_ref()
            .is_some_and(|registry| registry.is_registered(code_address))
        {
            return self.call_stateful_precompile(
                kind,
                msg_sender,
                to,
                child_gas_limit,
                value,
                &calldata,
                ret_offset,
                ret_size,
            );
        }

        let bytecode = self
            .storage
            .get_account(code_address)?
            .contract
            .unwrap_or_else(Contract::empty);

        let child_frame = CallFrame::new(
            msg_sender,
            to,
            code_address,
            bytecode,
            value,
            calldata,
            self.current_call_frame.is_static || is_static_call,
            kind,
            child_gas_limit,
            self.current_call_frame.depth + 1,
            should_transfer_value,
            false,
            ret_offset,
            ret_size,
            Stack::new(),
            self.current_call_frame.memory.next_memory(),
        );

        let (success, output) = self.run_child(child_frame)?;

        copy_return_data_into(&mut self.current_call_frame.memory, ret_offset, ret_size, &output);
        self.current_call_frame.sub_return_data = if success { output } else { Bytes::new() };
        self.current_call_frame
            .stack
            .push(if success { U256::one() } else { U256::zero() })?;
        Ok(OpcodeResult::Continue)
    }

    /// Dispatches to a stateless precompile instead of running bytecode.
    /// Precompiles never get their own `VM`/call frame: their gas is
    /// charged directly against the caller, and a malformed-input failure
    /// only burns the gas already reserved for the attempt (unlike the
    /// depth/balance failures in `generic_call`, which happen before any
    /// gas earmarked for the child is spent).
    #[allow(clippy::too_many_arguments)]
    fn call_precompile(
        &mut self,
        kind: CallKind,
        msg_sender: Address,
        address: Address,
        gas_limit: u64,
        value: U256,
        calldata: &Bytes,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<OpcodeResult, VMError> {
        if let Some(recorder) = &self.note_recorder {
            recorder
                .borrow_mut()
                .enter(kind, msg_sender, address, gas_limit, value, calldata.clone());
        }

        let cost = precompiles::gas_cost(address, calldata).unwrap_or(u64::MAX);
        if cost > gas_limit {
            self.current_call_frame.increase_consumed_gas(gas_limit)?;
            self.current_call_frame.stack.push_zero()?;
            if let Some(recorder) = &self.note_recorder {
                recorder.borrow_mut().exit(gas_limit, false, Bytes::new(), Some("out of gas".into()));
            }
            return Ok(OpcodeResult::Continue);
        }
        self.current_call_frame.increase_consumed_gas(cost)?;

        match precompiles::execute(address, calldata) {
            Ok(output) => {
                copy_return_data_into(&mut self.current_call_frame.memory, ret_offset, ret_size, &output);
                self.current_call_frame.sub_return_data = output.clone();
                self.current_call_frame.stack.push(U256::one())?;
                if let Some(recorder) = &self.note_recorder {
                    recorder.borrow_mut().exit(cost, true, output, None);
                }
            }
            Err(err) => {
                self.current_call_frame.sub_return_data = Bytes::new();
                self.current_call_frame.stack.push_zero()?;
                if let Some(recorder) = &self.note_recorder {
                    recorder.borrow_mut().exit(cost, false, Bytes::new(), Some(err.to_string()));
                }
            }
        }
        Ok(OpcodeResult::Continue)
    }

    /// Dispatches to a host-registered stateful precompile (spec §4.9/§6).
    /// Mirrors `call_precompile`, but reads/writes through the address's own
    /// slice of `self.storage.cache`'s data block store instead of pure
    /// input/output.
    #[allow(clippy::too_many_arguments)]
    fn call_stateful_precompile(
        &mut self,
        kind: CallKind,
        msg_sender: Address,
        address: Address,
        gas_limit: u64,
        value: U256,
        calldata: &Bytes,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<OpcodeResult, VMError> {
        if let Some(recorder) = &self.note_recorder {
            recorder
                .borrow_mut()
                .enter(kind, msg_sender, address, gas_limit, value, calldata.clone());
        }

        #[allow(clippy::expect_used, reason = "caller already checked is_registered")]
        let registry = Rc::clone(
            self.precompile_registry
                .as_ref()
                .expect("caller checked precompile_registry.is_some()"),
        );

        let cost = registry.gas_cost(address, calldata).unwrap_or(u64::MAX);
        if cost > gas_limit {
            self.current_call_frame.increase_consumed_gas(gas_limit)?;
            self.current_call_frame.stack.push_zero()?;
            if let Some(recorder) = &self.note_recorder {
                recorder.borrow_mut().exit(gas_limit, false, Bytes::new(), Some("out of gas".into()));
            }
            return Ok(OpcodeResult::Continue);
        }
        self.current_call_frame.increase_consumed_gas(cost)?;

        match registry.execute(address, calldata, &mut self.storage.cache) {
            Ok(output) => {
                copy_return_data_into(&mut self.current_call_frame.memory, ret_offset, ret_size, &output);
                self.current_call_frame.sub_return_data = output.clone();
                self.current_call_frame.stack.push(U256::one())?;
                if let Some(recorder) = &self.note_recorder {
                    recorder.borrow_mut().exit(cost, true, output, None);
                }
            }
            Err(err) => {
                self.current_call_frame.sub_return_data = Bytes::new();
                self.current_call_frame.stack.push_zero()?;
                if let Some(recorder) = &self.note_recorder {
                    recorder.borrow_mut().exit(cost, false, Bytes::new(), Some(err.to_string()));
                }
            }
        }
        Ok(OpcodeResult::Continue)
    }

    /// Forks the cache, runs `frame` in a fresh nested `VM`, and merges its
    /// cache back into `self.storage` only on success: a reverted or
    /// exceptionally-halted child's mutations are discarded by simply never
    /// merging. The parent is always charged for exactly the gas the child
    /// consumed; whatever it didn't use is implicitly kept by the parent,
    /// since only the consumed amount is ever deducted.
    fn run_child(&mut self, frame: CallFrame) -> Result<(bool, Bytes), VMError> {
        if let Some(recorder) = &self.note_recorder {
            recorder.borrow_mut().enter(
                frame.kind,
                frame.msg_sender,
                frame.to,
                frame.gas_limit,
                frame.value,
                frame.calldata.clone(),
            );
        }

        let child_cache = self.storage.fork();
        let child_storage = Storage {
            cache: child_cache,
            db: self.storage.db,
        };
        let mut child_vm = VM::new(child_storage, self.env.clone(), frame);
        if let Some(recorder) = &self.note_recorder {
            child_vm = child_vm.with_note_recorder(Rc::clone(recorder));
        }
        if let Some(registry) = &self.precompile_registry {
            child_vm = child_vm.with_precompile_registry(Rc::clone(registry));
        }
        let result = child_vm.run();

        self.current_call_frame.increase_consumed_gas(result.gas_used)?;

        let success = result.is_success();
        if success {
            self.storage.cache.merge_child(child_vm.storage.cache);
        }

        if let Some(recorder) = &self.note_recorder {
            let execution_error = match &result.result {
                crate::errors::TxResult::Success => None,
                crate::errors::TxResult::Revert(err) => Some(err.to_string()),
            };
            recorder
                .borrow_mut()
                .exit(result.gas_used, success, result.output.clone(), execution_error);
        }
        Ok((success, result.output))
    }

    // CREATE operation
    pub fn op_create(&mut self) -> Result<OpcodeResult, VMError> {
        let [value, offset, size] = *self.current_call_frame.stack.pop::<3>()?;
        self.generic_create(value, offset, size, None)
    }

    // CREATE2 operation
    pub fn op_create2(&mut self) -> Result<OpcodeResult, VMError> {
        let [value, offset, size, salt] = *self.current_call_frame.stack.pop::<4>()?;
        self.generic_create(value, offset, size, Some(salt))
    }

    /// Shared CREATE/CREATE2 implementation. `salt` distinguishes the two:
    /// `None` derives the address from `(sender, nonce)`, `Some(salt)` from
    /// `(0xff, sender, salt, keccak256(init_code))`.
    fn generic_create(
        &mut self,
        value: U256,
        offset: U256,
        size: U256,
        salt: Option<U256>,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }

        let (offset, size) = size_offset_to_usize(offset, size)?;
        let current_memory_size = self.current_call_frame.memory.len();
        let new_memory_size = calculate_memory_size(offset, size)?;

        let cost = if salt.is_some() {
            gas_cost::create2(new_memory_size, current_memory_size, size)?
        } else {
            gas_cost::create(new_memory_size, current_memory_size, size)?
        };
        self.current_call_frame.increase_consumed_gas(cost)?;
        self.current_call_frame.memory.resize(new_memory_size)?;

        if self.env.fork >= Fork::Shanghai && size > INIT_CODE_MAX_SIZE {
            return Err(ExceptionalHalt::InitCodeTooLarge.into());
        }

        let init_code = self.current_call_frame.memory.load_range(offset, size)?;

        if self.current_call_frame.depth >= MAX_CALL_DEPTH {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        let creator = self.current_call_frame.to;
        let creator_account = self.storage.get_account(creator)?;
        if creator_account.balance < value {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }
        if creator_account.nonce == u64::MAX {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        let new_address = match salt {
            Some(salt) => self
                .storage
                .db
                .create_fixed_address(creator, salt, &init_code)
                .map_err(VMError::Database)?,
            None => self
                .storage
                .db
                .create_address(creator, creator_account.nonce)
                .map_err(VMError::Database)?,
        };

        let existing = self.storage.get_account(new_address)?;
        if existing.nonce != 0 || existing.has_code() {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        self.storage.increment_nonce(creator)?;
        self.storage.mark_created_this_transaction(new_address);
        self.storage.increment_nonce(new_address)?;
        self.storage.transfer(creator, new_address, value)?;

        let child_gas_limit = gas_cost::max_message_call_gas(self.current_call_frame.remaining_gas());
        let code_hash = storage::keccak256(&init_code);
        let child_frame = CallFrame::new(
            creator,
            new_address,
            new_address,
            Contract::new(init_code.to_vec().into(), code_hash),
            value,
            Bytes::new(),
            false,
            if salt.is_some() {
                CallKind::Create2
            } else {
                CallKind::Create
            },
            child_gas_limit,
            self.current_call_frame.depth + 1,
            true,
            true,
            0,
            0,
            Stack::new(),
            self.current_call_frame.memory.next_memory(),
        );

        let (success, output) = self.run_child(child_frame)?;

        if !success {
            self.current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        match self.commit_created_code(new_address, &output) {
            Ok(()) => {
                self.current_call_frame
                    .stack
                    .push(address_to_word(new_address))?;
            }
            Err(_) => {
                self.current_call_frame.stack.push_zero()?;
            }
        }
        Ok(OpcodeResult::Continue)
    }

    /// EIP-3541/EIP-170 checks plus the 200-gas-per-byte deposit charge, run
    /// against the *parent* frame's remaining gas since the deposit is
    /// billed to whoever issued the CREATE (mirrors
    /// [`crate::evm::Evm`]'s outer-transaction equivalent for the top-level
    /// creation transaction).
    fn commit_created_code(&mut self, address: Address, code: &Bytes) -> Result<(), VMError> {
        if code.first() == Some(&INVALID_CONTRACT_PREFIX) {
            return Err(ExceptionalHalt::InvalidContractPrefix.into());
        }
        if code.len() > MAX_CODE_SIZE {
            return Err(ExceptionalHalt::ContractCodeTooLarge.into());
        }
        let deposit_cost = gas_cost::code_deposit(code.len())?;
        self.current_call_frame.increase_consumed_gas(deposit_cost)?;

        let code_hash = storage::keccak256(code);
        self.storage
            .set_code(address, Contract::new(code.to_vec().into(), code_hash))
    }

    // RETURN operation
    pub fn op_return(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        let [offset, size] = *call_frame.stack.pop()?;
        let (offset, size) = size_offset_to_usize(offset, size)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        let cost = memory::expansion_cost(new_memory_size, call_frame.memory.len())?;
        call_frame.increase_consumed_gas(cost)?;

        call_frame.output = call_frame.memory.load_range(offset, size)?;
        Ok(OpcodeResult::Halt)
    }

    // REVERT operation
    pub fn op_revert(&mut self) -> Result<OpcodeResult, VMError> {
        // The actual discarding of staged state happens in the closure
        // machinery (`run_child`/`Evm::execute`), which simply never merges
        // a non-success child's cache back into its parent.
        let call_frame = &mut self.current_call_frame;
        let [offset, size] = *call_frame.stack.pop()?;
        let (offset, size) = size_offset_to_usize(offset, size)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        let cost = memory::expansion_cost(new_memory_size, call_frame.memory.len())?;
        call_frame.increase_consumed_gas(cost)?;

        call_frame.output = call_frame.memory.load_range(offset, size)?;
        Err(VMError::RevertOpcode)
    }

    /// INVALID operation: consumes all remaining gas, no return data.
    pub fn op_invalid(&mut self) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidOpcode(Opcode::INVALID as u8).into())
    }

    // SELFDESTRUCT operation
    pub fn op_selfdestruct(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }

        let beneficiary = word_to_address(self.current_call_frame.stack.pop1()?);
        let to = self.current_call_frame.to;

        let was_cold = !self.storage.cache.add_accessed_address(beneficiary);
        let beneficiary_is_empty = self.storage.get_account(beneficiary)?.is_empty();
        let balance = self.storage.get_account(to)?.balance;

        self.current_call_frame
            .increase_consumed_gas(gas_cost::selfdestruct(
                beneficiary_is_empty,
                !balance.is_zero(),
                was_cold,
            )?)?;

        self.storage.schedule_destruct(to, beneficiary);
        self.storage.transfer(to, beneficiary, balance)?;

        // EIP-6780: post-Cancun, SELFDESTRUCT only actually zeroes the
        // account's own balance/code if it was created earlier in this same
        // transaction; otherwise it just schedules the beneficiary transfer
        // above and leaves the account itself alone.
        if self.env.fork < Fork::Cancun || self.storage.was_created_this_transaction(to) {
            // Nothing further to do: `transfer` already moved the balance
            // to zero on `to` when it credited `beneficiary`, and the
            // scheduled destruct above is what the host acts on to remove
            // the account's code/storage once the transaction commits.
        }

        Ok(OpcodeResult::Halt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::db::InMemoryDatabase;
    use crate::environment::{BlockEnv, Fork, TransactionEnv};
    use crate::memory::Memory;
    use ethereum_types::H256;

    fn test_env() -> crate::environment::Environment {
        crate::environment::Environment {
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

    fn frame_with_code(code: Vec<u8>, gas_limit: u64, to: Address) -> CallFrame {
        CallFrame::new(
            Address::zero(),
            to,
            to,
            Contract::new(code.into(), H256::zero()),
            U256::zero(),
            Bytes::new(),
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
    fn call_to_nonexistent_account_succeeds_with_empty_output() {
        // PUSH1 0 (ret_size) PUSH1 0 (ret_offset) PUSH1 0 (args_size)
        // PUSH1 0 (args_offset) PUSH1 0 (value) PUSH20 <callee> PUSH2 gas
        // CALL STOP
        let callee = Address::repeat_byte(0xAB);
        let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00];
        code.push(0x73); // PUSH20
        code.extend_from_slice(callee.as_bytes());
        code.extend_from_slice(&[0x61, 0xFF, 0xFF]); // PUSH2 0xFFFF
        code.push(0xF1); // CALL
        code.push(0x00); // STOP

        let caller = Address::repeat_byte(1);
        let db = InMemoryDatabase::new().with_account(caller, Account::default());
        let storage = Storage::new(&db);
        let frame = frame_with_code(code, 1_000_000, caller);
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(result.is_success());
        assert_eq!(vm.current_call_frame.stack.peek().unwrap(), U256::one());
    }

    #[test]
    fn create_with_empty_init_code_deploys_empty_contract() {
        // PUSH1 0 (size) PUSH1 0 (offset) PUSH1 0 (value) CREATE STOP
        let code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0xf0, 0x00];
        let creator = Address::repeat_byte(2);
        let db = InMemoryDatabase::new().with_account(creator, Account::default());
        let storage = Storage::new(&db);
        let frame = frame_with_code(code, 1_000_000, creator);
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(result.is_success());
        assert_ne!(vm.current_call_frame.stack.peek().unwrap(), U256::zero());
    }

    #[test]
    fn revert_opcode_surfaces_as_revert() {
        // PUSH1 0 PUSH1 0 REVERT
        let code = vec![0x60, 0x00, 0x60, 0x00, 0xfd];
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(code, 1_000_000, Address::repeat_byte(3));
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(!result.is_success());
    }

    #[test]
    fn invalid_opcode_reports_the_actual_byte() {
        let code = vec![0xfe];
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(code, 1_000_000, Address::repeat_byte(4));
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(!result.is_success());
        assert_eq!(result.gas_used, 1_000_000);
    }
}
