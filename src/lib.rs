//! corevm: a stack-based bytecode interpreter for the Ethereum Virtual
//! Machine, Frontier through Cancun/Dencun.
//!
//! ```text
//!                 ┌─────────────┐
//!                 │   evm::Evm  │  public Execute() entry (component M)
//!                 └──────┬──────┘
//!                        │ intrinsic gas, value transfer, deploy commit
//!                 ┌──────▼──────┐
//!                 │   vm::VM    │  interpreter loop + closure driver (I/J/K)
//!                 └──┬───────┬──┘
//!          ┌─────────┘       └─────────┐
//!   opcode_handlers/*            storage::Storage ── db::Database (host)
//!   stack/memory/account/gas_cost        │
//!                                  precompiles
//! ```
//!
//! Modules map directly onto the components above: [`stack`] is the
//! operand stack, [`memory`] the byte-addressable scratch space,
//! [`account`] the code/jumpdest model, [`storage`] the staged-mutation
//! cache and its read-through façade over [`db::Database`],
//! [`environment`] the block/tx/fork context, [`gas_cost`] every constant
//! and dynamic gas calculator, [`opcodes`]/[`opcode_handlers`] the
//! instruction table and its handlers, [`precompiles`] the fixed
//! precompiles plus the pluggable stateful [`precompiles::PrecompileRegistry`],
//! [`note`] the opt-in execution-trace recorder, and [`vm`] the frame
//! driver the rest of this crate is built around.

pub mod account;
pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod evm;
pub mod gas_cost;
pub mod memory;
pub mod note;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod stack;
pub mod storage;
pub mod utils;
pub mod vm;

pub use evm::{Evm, ExecutionReport};
pub use note::{Note, NoteKind};
