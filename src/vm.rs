//! The interpreter driver (spec components I/J): owns the active call
//! frame, the storage façade, and the per-fork opcode dispatch table, and
//! runs bytecode to completion one frame at a time. Nested CALL/CREATE
//! frames (component K, the closure machinery) are driven from
//! `opcode_handlers::system`, which builds a child `VM` and calls
//! [`VM::run`] recursively.

use crate::call_frame::CallFrame;
use crate::errors::{ContextResult, TxResult, VMError};
use crate::note::NoteRecorder;
use crate::opcodes::OpCodeFn;
use crate::environment::Environment;
use crate::precompiles::PrecompileRegistry;
use crate::storage::Storage;
use bytes::Bytes;
use std::cell::RefCell;
use std::rc::Rc;

pub struct VM<'a> {
    pub storage: Storage<'a>,
    pub env: Environment,
    pub current_call_frame: CallFrame,
    pub(crate) opcode_table: [OpCodeFn<'a>; 256],
    /// Shared with every frame in the same call tree; `None` unless the
    /// host opted into tracing via `Evm::execute_with_trace` (spec §6's
    /// "Note" recorder, component M).
    pub(crate) note_recorder: Option<Rc<RefCell<NoteRecorder>>>,
    /// Shared with every frame in the same call tree; `None` unless the
    /// host registered stateful precompiles via `Evm::with_precompiles`
    /// (spec §4.9/§6 component L).
    pub(crate) precompile_registry: Option<Rc<PrecompileRegistry>>,
}

impl<'a> VM<'a> {
    pub fn new(storage: Storage<'a>, env: Environment, current_call_frame: CallFrame) -> Self {
        let opcode_table = Self::build_opcode_table(env.fork);
        Self {
            storage,
            env,
            current_call_frame,
            opcode_table,
            note_recorder: None,
            precompile_registry: None,
        }
    }

    pub fn with_note_recorder(mut self, recorder: Rc<RefCell<NoteRecorder>>) -> Self {
        self.note_recorder = Some(recorder);
        self
    }

    pub fn with_precompile_registry(mut self, registry: Rc<PrecompileRegistry>) -> Self {
        self.precompile_registry = Some(registry);
        self
    }

    /// Runs the current frame to completion: fetch, advance PC past the
    /// opcode byte, dispatch, repeat, until a handler halts or errors.
    ///
    /// The PC is advanced *before* the handler runs, not after: this is
    /// what lets `op_push::<N>` read its immediate data starting at the
    /// (already-advanced) PC and `op_pc` report its own address by
    /// subtracting one.
    pub fn run(&mut self) -> ContextResult {
        loop {
            let opcode = self.current_call_frame.next_opcode();
            self.current_call_frame.pc = self.current_call_frame.pc.wrapping_add(1);

            let handler = self.opcode_table[opcode as usize];
            match handler.call(self) {
                Ok(crate::errors::OpcodeResult::Continue) => continue,
                Ok(crate::errors::OpcodeResult::Halt) => return self.exit_success(),
                Err(err) => return self.exit_with_error(err),
            }
        }
    }

    fn exit_success(&self) -> ContextResult {
        ContextResult {
            result: TxResult::Success,
            gas_used: self.current_call_frame.gas_used,
            output: self.current_call_frame.output.clone(),
        }
    }

    /// On any error the frame stops immediately. A REVERT keeps its output
    /// and only the gas actually consumed up to that point; every other
    /// error consumes all gas granted to the frame and produces no output
    /// (spec §4.3/§4.7: exceptional halts forfeit the whole gas budget).
    fn exit_with_error(&mut self, err: VMError) -> ContextResult {
        if err.should_consume_all_gas() {
            self.current_call_frame.gas_used = self.current_call_frame.gas_limit;
            ContextResult {
                result: TxResult::Revert(err),
                gas_used: self.current_call_frame.gas_limit,
                output: Bytes::new(),
            }
        } else {
            ContextResult {
                result: TxResult::Revert(err),
                gas_used: self.current_call_frame.gas_used,
                output: self.current_call_frame.output.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Contract;
    use crate::call_frame::CallKind;
    use crate::db::InMemoryDatabase;
    use crate::environment::{BlockEnv, Fork, TransactionEnv};
    use crate::memory::Memory;
    use crate::stack::Stack;
    use ethereum_types::{Address, H256, U256};

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
    fn add_two_pushed_values() {
        // PUSH1 1 PUSH1 2 ADD STOP
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x00], 1_000_000);
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(result.is_success());
        assert_eq!(vm.current_call_frame.stack.peek().unwrap(), U256::from(3));
        assert_eq!(result.gas_used, 3 + 3 + 3);
    }

    #[test]
    fn invalid_opcode_consumes_all_gas() {
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(vec![0xfe], 100);
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(!result.is_success());
        assert_eq!(result.gas_used, 100);
    }

    #[test]
    fn return_opcode_yields_output() {
        // PUSH1 0x2a PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
        let code = vec![
            0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ];
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(code, 1_000_000);
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(result.is_success());
        assert_eq!(result.output.len(), 32);
        assert_eq!(U256::from_big_endian(&result.output), U256::from(0x2a));
    }

    #[test]
    fn revert_opcode_preserves_output_and_partial_gas() {
        // PUSH1 0x2a PUSH1 0 MSTORE PUSH1 32 PUSH1 0 REVERT
        let code = vec![
            0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xfd,
        ];
        let db = InMemoryDatabase::new();
        let storage = Storage::new(&db);
        let frame = frame_with_code(code, 1_000_000);
        let mut vm = VM::new(storage, test_env(), frame);
        let result = vm.run();
        assert!(!result.is_success());
        assert_eq!(result.output.len(), 32);
        assert!(result.gas_used < 1_000_000);
    }
}
