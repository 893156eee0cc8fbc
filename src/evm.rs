//! The public entry point (spec component M): wraps [`vm::VM`] with the
//! outer-transaction concerns the interpreter loop itself knows nothing
//! about — intrinsic gas, the sender→recipient value transfer, and
//! committing newly deployed code once a CREATE transaction succeeds.

use crate::account::Contract;
use crate::call_frame::{CallFrame, CallKind};
use crate::constants::{INVALID_CONTRACT_PREFIX, MAX_CODE_SIZE};
use crate::db::Database;
use crate::environment::Environment;
use crate::errors::{ContextResult, ExceptionalHalt, TxResult, VMError};
use crate::gas_cost;
use crate::memory::Memory;
use crate::note::{Note, NoteRecorder};
use crate::precompiles::PrecompileRegistry;
use crate::stack::Stack;
use crate::storage::{Log, Storage};
use crate::vm::VM;
use bytes::Bytes;
use ethereum_types::{Address, H256};
use std::cell::RefCell;
use std::rc::Rc;

/// Outcome of one outer `Execute()` call, already net of the EIP-3529
/// refund cap.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub success: bool,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// Set only for a successful contract-creation transaction.
    pub created_address: Option<Address>,
}

/// The crate's façade: one `Evm` per host database, one [`Evm::execute`]
/// call per outer transaction.
pub struct Evm<'a> {
    db: &'a dyn Database,
    /// Host-registered stateful precompiles (spec §4.9/§6), shared across
    /// every call/create frame of every transaction run through this `Evm`.
    precompiles: Option<Rc<PrecompileRegistry>>,
}

impl<'a> Evm<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db, precompiles: None }
    }

    /// Builds an `Evm` whose reserved address range (0x100..=0x1ff) is
    /// backed by `registry`'s host-defined precompiles, in addition to the
    /// nine fixed stateless ones every fork carries.
    pub fn with_precompiles(db: &'a dyn Database, registry: PrecompileRegistry) -> Self {
        Self {
            db,
            precompiles: Some(Rc::new(registry)),
        }
    }

    /// Runs one outer transaction to completion. `gas_limit` is the
    /// transaction's own gas limit (distinct from the block's, which lives
    /// on `env.block.gas_limit`).
    #[tracing::instrument(skip(self, env), fields(origin = ?env.tx.origin, fork = ?env.fork))]
    pub fn execute(&self, env: Environment, gas_limit: u64) -> Result<ExecutionReport, VMError> {
        self.execute_inner(env, gas_limit, None).map(|(report, _)| report)
    }

    /// Same as [`Evm::execute`], but also records a [`Note`] execution
    /// trace of the whole call tree (spec §6). Costs an extra clone of
    /// each frame's calldata/return data; skip it on any hot path that
    /// doesn't need the trace.
    #[tracing::instrument(skip(self, env), fields(origin = ?env.tx.origin, fork = ?env.fork))]
    pub fn execute_with_trace(
        &self,
        env: Environment,
        gas_limit: u64,
    ) -> Result<(ExecutionReport, Note), VMError> {
        let recorder = Rc::new(RefCell::new(NoteRecorder::new()));
        let (report, note) = self.execute_inner(env, gas_limit, Some(Rc::clone(&recorder)))?;
        #[allow(clippy::expect_used, reason = "execute_inner always closes its root frame's note")]
        let note = note.expect("root note recorded when tracing is requested");
        Ok((report, note))
    }

    fn execute_inner(
        &self,
        env: Environment,
        gas_limit: u64,
        note_recorder: Option<Rc<RefCell<NoteRecorder>>>,
    ) -> Result<(ExecutionReport, Option<Note>), VMError> {
        let mut storage = Storage::new(self.db);

        let intrinsic = gas_cost::intrinsic_gas(&env.tx, env.fork)?;
        if intrinsic > gas_limit {
            tracing::debug!(intrinsic, gas_limit, "intrinsic gas exceeds tx gas limit");
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        storage.cache.add_accessed_address(env.tx.origin);
        if let Some(to) = env.tx.to {
            storage.cache.add_accessed_address(to);
        }

        let is_create = env.tx.to.is_none();
        let origin_nonce = storage.get_account(env.tx.origin)?.nonce;

        let (to, code_address, bytecode, calldata) = if is_create {
            let new_address = self
                .db
                .create_address(env.tx.origin, origin_nonce)
                .map_err(VMError::Database)?;
            let init_code = Contract::new(env.tx.data.to_vec().into(), H256::zero());
            (new_address, new_address, init_code, Bytes::new())
        } else {
            #[allow(clippy::expect_used, reason = "is_create is false, so to is Some")]
            let to = env.tx.to.expect("checked is_create above");
            let contract = storage
                .get_account(to)?
                .contract
                .unwrap_or_else(Contract::empty);
            (to, to, contract, env.tx.data.clone())
        };

        storage.increment_nonce(env.tx.origin)?;
        if is_create {
            storage.mark_created_this_transaction(to);
        }
        storage.transfer(env.tx.origin, to, env.tx.value)?;

        let frame_gas_limit = gas_limit.saturating_sub(intrinsic);
        let frame = CallFrame::new(
            env.tx.origin,
            to,
            code_address,
            bytecode,
            env.tx.value,
            calldata,
            false,
            if is_create { CallKind::Create } else { CallKind::Call },
            frame_gas_limit,
            0,
            false,
            is_create,
            0,
            0,
            Stack::new(),
            Memory::new(),
        );

        if let Some(recorder) = &note_recorder {
            recorder.borrow_mut().enter(
                if is_create { CallKind::Create } else { CallKind::External },
                env.tx.origin,
                to,
                frame_gas_limit,
                env.tx.value,
                env.tx.data.clone(),
            );
        }

        let mut vm = VM::new(storage, env, frame);
        if let Some(recorder) = &note_recorder {
            vm = vm.with_note_recorder(Rc::clone(recorder));
        }
        if let Some(registry) = &self.precompiles {
            vm = vm.with_precompile_registry(Rc::clone(registry));
        }
        let mut result = vm.run();

        let mut created_address = None;
        if is_create && result.is_success() {
            created_address = self.commit_deployment(&mut vm, to, frame_gas_limit, &mut result);
        }

        let total_gas_used = intrinsic.saturating_add(result.gas_used);
        let refund = if result.is_success() {
            let pending = vm.storage.cache.refunded_gas.max(0) as u64;
            gas_cost::apply_refund_cap(total_gas_used, pending)
        } else {
            0
        };

        tracing::debug!(
            success = result.is_success(),
            gas_used = total_gas_used,
            refund,
            "transaction executed"
        );

        let root_note = note_recorder.map(|recorder| {
            let execution_error = match &result.result {
                TxResult::Success => None,
                TxResult::Revert(err) => Some(err.to_string()),
            };
            #[allow(clippy::expect_used, reason = "enter() above pushed exactly one root frame")]
            recorder
                .borrow_mut()
                .exit(result.gas_used, result.is_success(), result.output.clone(), execution_error)
                .expect("root frame closes on its own exit, nothing left to pop")
        });

        Ok((
            ExecutionReport {
                success: result.is_success(),
                gas_used: total_gas_used.saturating_sub(refund),
                gas_refunded: refund,
                output: result.output,
                logs: if result.is_success() {
                    vm.storage.cache.logs.clone()
                } else {
                    Vec::new()
                },
                created_address,
            },
            root_note,
        ))
    }

    /// EIP-3541/EIP-170 deployed-code checks, the 200-gas-per-byte deposit
    /// charge, and writing the final code into the cache, run only once the
    /// init code itself has returned successfully.
    fn commit_deployment(
        &self,
        vm: &mut VM<'a>,
        address: Address,
        frame_gas_limit: u64,
        result: &mut ContextResult,
    ) -> Option<Address> {
        let code = result.output.clone();

        if code.first() == Some(&INVALID_CONTRACT_PREFIX) {
            *result = ContextResult {
                result: TxResult::Revert(ExceptionalHalt::InvalidContractPrefix.into()),
                gas_used: frame_gas_limit,
                output: Bytes::new(),
            };
            return None;
        }
        if code.len() > MAX_CODE_SIZE {
            *result = ContextResult {
                result: TxResult::Revert(ExceptionalHalt::ContractCodeTooLarge.into()),
                gas_used: frame_gas_limit,
                output: Bytes::new(),
            };
            return None;
        }

        let deposit_cost = match gas_cost::code_deposit(code.len()) {
            Ok(cost) => cost,
            Err(err) => {
                *result = ContextResult {
                    result: TxResult::Revert(err),
                    gas_used: frame_gas_limit,
                    output: Bytes::new(),
                };
                return None;
            }
        };

        if vm
            .current_call_frame
            .increase_consumed_gas(deposit_cost)
            .is_err()
        {
            *result = ContextResult {
                result: TxResult::Revert(ExceptionalHalt::OutOfGas.into()),
                gas_used: frame_gas_limit,
                output: Bytes::new(),
            };
            return None;
        }

        result.gas_used = vm.current_call_frame.gas_used;
        let code_hash = self.db.hash_of_code(&code);
        // Infallible: `address`'s account was already materialized in the
        // cache earlier in `execute`.
        let _ = vm
            .storage
            .set_code(address, Contract::new(code.to_vec().into(), code_hash));
        Some(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatabase;
    use crate::environment::{BlockEnv, Fork, TransactionEnv};
    use ethereum_types::U256;

    fn test_env(tx: TransactionEnv) -> Environment {
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
            tx,
            fork: Fork::Cancun,
            chain_id: 1,
        }
    }

    #[test]
    fn create_transaction_deploys_returned_code() {
        // Init code: PUSH1 1 PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 RETURN
        // (deploys a single-byte contract containing 0x01)
        let init_code = vec![
            0x60, 0x01, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3,
        ];
        let mut tx = TransactionEnv::default();
        tx.data = Bytes::from(init_code);
        let db = InMemoryDatabase::new();
        let evm = Evm::new(&db);
        let report = evm.execute(test_env(tx), 1_000_000).unwrap();
        assert!(report.success);
        let created = report.created_address.expect("contract was deployed");
        assert_ne!(created, Address::zero());
    }

    #[test]
    fn call_with_insufficient_intrinsic_gas_errors() {
        let mut tx = TransactionEnv::default();
        tx.to = Some(Address::repeat_byte(9));
        let db = InMemoryDatabase::new();
        let evm = Evm::new(&db);
        let err = evm.execute(test_env(tx), 100).unwrap_err();
        assert_eq!(err, ExceptionalHalt::OutOfGas.into());
    }

    #[test]
    fn traced_call_records_nested_frame() {
        // Callee: PUSH1 0 PUSH1 0 RETURN (returns empty data, but still a
        // real CALL for the trace to capture).
        let callee = Address::repeat_byte(0xAB);
        let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00];
        code.push(0x73); // PUSH20
        code.extend_from_slice(callee.as_bytes());
        code.extend_from_slice(&[0x61, 0xFF, 0xFF]); // PUSH2 0xFFFF (gas)
        code.push(0xF1); // CALL
        code.push(0x00); // STOP

        let caller = Address::repeat_byte(1);
        let mut db = InMemoryDatabase::new();
        db.accounts.insert(caller, crate::account::Account::default());
        db.add_contract(caller, code, H256::zero());

        let mut tx = TransactionEnv::default();
        tx.to = Some(caller);
        let evm = Evm::new(&db);
        let (report, note) = evm.execute_with_trace(test_env(tx), 1_000_000).unwrap();

        assert!(report.success);
        assert_eq!(note.sub_notes.len(), 1);
        assert_eq!(note.sub_notes[0].to, callee);
        assert_eq!(note.node_count(), 2);
    }

    struct EchoPrecompile;

    impl crate::precompiles::StatefulPrecompile for EchoPrecompile {
        fn gas_cost(&self, _input: &[u8]) -> Result<u64, VMError> {
            Ok(100)
        }

        fn execute(
            &self,
            input: &[u8],
            data: &mut dyn crate::precompiles::DataBlockStorage,
        ) -> Result<Bytes, VMError> {
            let slot = ethereum_types::U256::zero();
            let address = Address::zero();
            let mut stored = data.get_data_block(address, slot);
            stored.extend_from_slice(input);
            data.set_data_block(address, slot, stored.clone());
            Ok(Bytes::from(stored))
        }
    }

    #[test]
    fn call_through_reaches_registered_stateful_precompile() {
        // Caller: PUSH1 2 (ret_size) PUSH1 0 (ret_offset) PUSH1 2 (args_size)
        // PUSH1 0 (args_offset) PUSH1 0 (value) PUSH20 <stateful addr>
        // PUSH2 0xFFFF (gas) CALL STOP. Calldata memory is pre-seeded via
        // MSTORE8s so the precompile echoes back two bytes.
        let mut stateful_bytes = [0u8; 20];
        stateful_bytes[18] = 0x01;
        stateful_bytes[19] = 0x10;
        let stateful_address = Address::from(stateful_bytes);

        let mut code = vec![
            0x60, 0xAB, 0x60, 0x00, 0x53, // MSTORE8 0, 0xAB
            0x60, 0xCD, 0x60, 0x01, 0x53, // MSTORE8 1, 0xCD
        ];
        code.extend_from_slice(&[0x60, 0x02, 0x60, 0x00, 0x60, 0x02, 0x60, 0x00, 0x60, 0x00]);
        code.push(0x73); // PUSH20
        code.extend_from_slice(stateful_address.as_bytes());
        code.extend_from_slice(&[0x61, 0xFF, 0xFF]); // PUSH2 gas
        code.push(0xF1); // CALL
        code.push(0x00); // STOP

        let caller = Address::repeat_byte(5);
        let mut db = InMemoryDatabase::new();
        db.accounts.insert(caller, crate::account::Account::default());
        db.add_contract(caller, code, H256::zero());

        let mut registry = PrecompileRegistry::new();
        registry
            .register(stateful_address, Box::new(EchoPrecompile))
            .unwrap();

        let mut tx = TransactionEnv::default();
        tx.to = Some(caller);
        let evm = Evm::with_precompiles(&db, registry);
        let report = evm.execute(test_env(tx), 1_000_000).unwrap();

        assert!(report.success);
    }
}
