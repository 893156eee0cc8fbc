//! Account and contract-code data model (spec components D and part of E).

use bitvec::prelude::{BitVec, Lsb0};
use ethereum_types::{H256, U256};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Immutable bytecode plus a lazily computed jump-destination bitmap.
///
/// The bitmap is built once, on first use, by a linear scan that marks
/// every byte occupied by the data payload of a PUSH1..PUSH32 as "not a
/// valid jump target" even if its value happens to equal 0x5B (JUMPDEST).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub code: Arc<[u8]>,
    pub code_hash: H256,
    #[serde(skip)]
    jump_dests: Arc<OnceLock<BitVec<u8, Lsb0>>>,
}

impl Contract {
    pub fn new(code: Arc<[u8]>, code_hash: H256) -> Self {
        Self {
            code,
            code_hash,
            jump_dests: Arc::new(OnceLock::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Arc::from(Vec::new().into_boxed_slice()), H256::zero())
    }

    pub fn code_size(&self) -> u64 {
        self.code.len() as u64
    }

    /// Returns `STOP` (0x00) for any PC at or past the end of the code, so
    /// execution halts cleanly when code lacks an explicit terminator.
    pub fn opcode_at(&self, pc: usize) -> u8 {
        self.code.get(pc).copied().unwrap_or(0x00)
    }

    fn jump_dest_bitmap(&self) -> &BitVec<u8, Lsb0> {
        self.jump_dests.get_or_init(|| {
            let mut bits = BitVec::repeat(false, self.code.len());
            let mut pc = 0usize;
            while pc < self.code.len() {
                let op = self.code[pc];
                if (0x60..=0x7f).contains(&op) {
                    // PUSH1 (0x60) .. PUSH32 (0x7f): skip the data bytes.
                    #[allow(clippy::arithmetic_side_effects, reason = "op is in 0x60..=0x7f")]
                    let data_len = (op - 0x5f) as usize;
                    pc = pc.saturating_add(1).saturating_add(data_len);
                } else {
                    if op == 0x5b {
                        bits.set(pc, true);
                    }
                    pc = pc.saturating_add(1);
                }
            }
            bits
        })
    }

    /// True iff `pc` points at a JUMPDEST byte that is not inside PUSH data.
    pub fn is_valid_jump(&self, pc: usize) -> bool {
        pc < self.code.len() && *self.jump_dest_bitmap().get(pc).as_deref().unwrap_or(&false)
    }
}

/// `{address, balance, contract?, slots}` per spec §3. EOAs are accounts
/// with `contract: None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub contract: Option<Contract>,
    pub slots: FxHashMap<U256, U256>,
}

impl Account {
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.contract.is_none()
    }

    pub fn has_code(&self) -> bool {
        self.contract.as_ref().is_some_and(|c| !c.code.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_data_is_not_a_jumpdest() {
        // PUSH1 0x5B STOP
        let code: Arc<[u8]> = Arc::from(vec![0x60, 0x5b, 0x00].into_boxed_slice());
        let contract = Contract::new(code, H256::zero());
        assert!(!contract.is_valid_jump(1));
    }

    #[test]
    fn real_jumpdest_is_valid() {
        let code: Arc<[u8]> = Arc::from(vec![0x5b, 0x00].into_boxed_slice());
        let contract = Contract::new(code, H256::zero());
        assert!(contract.is_valid_jump(0));
    }

    #[test]
    fn opcode_past_end_is_stop() {
        let code: Arc<[u8]> = Arc::from(vec![0x00].into_boxed_slice());
        let contract = Contract::new(code, H256::zero());
        assert_eq!(contract.opcode_at(50), 0x00);
    }
}
