use crate::{
    environment::Fork,
    errors::{InternalError, OpcodeResult, VMError},
    gas_cost,
    utils::u256_to_usize,
    vm::VM,
};
use ethereum_types::U256;

// Block Information Operations
// Opcodes: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT,
// CHAINID, SELFBALANCE, BASEFEE, BLOBHASH, BLOBBASEFEE

impl<'a> VM<'a> {
    // BLOCKHASH operation
    pub fn op_blockhash(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::BLOCKHASH)?;
        let block_number = self.current_call_frame.stack.pop1()?;

        // Only the last 256 block hashes are available, matching the real
        // chain's BLOCKHASH window; anything else resolves to zero.
        let current = U256::from(self.env.block.number);
        let hash = if block_number >= current || current.saturating_sub(block_number) > U256::from(256) {
            U256::zero()
        } else {
            let n = u64::try_from(u256_to_usize(block_number)?).map_err(|_| InternalError::TypeConversion)?;
            U256::from_big_endian(
                self.storage
                    .db
                    .get_block_hash(n)
                    .map_err(VMError::Database)?
                    .as_bytes(),
            )
        };
        self.current_call_frame.stack.push(hash)?;
        Ok(OpcodeResult::Continue)
    }

    // COINBASE operation
    pub fn op_coinbase(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::COINBASE)?;
        let coinbase = crate::utils::address_to_word(self.env.block.coinbase);
        self.current_call_frame.stack.push(coinbase)?;
        Ok(OpcodeResult::Continue)
    }

    // TIMESTAMP operation
    pub fn op_timestamp(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::TIMESTAMP)?;
        self.current_call_frame
            .stack
            .push(U256::from(self.env.block.timestamp))?;
        Ok(OpcodeResult::Continue)
    }

    // NUMBER operation
    pub fn op_number(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::NUMBER)?;
        self.current_call_frame
            .stack
            .push(U256::from(self.env.block.number))?;
        Ok(OpcodeResult::Continue)
    }

    // PREVRANDAO operation (post-Merge; pre-Merge forks expose DIFFICULTY on
    // the same opcode byte).
    pub fn op_prevrandao(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::DIFFICULTY)?;
        let value = if self.env.fork >= Fork::Paris {
            self.env
                .block
                .prev_randao
                .map(|h| U256::from_big_endian(h.as_bytes()))
                .unwrap_or_default()
        } else {
            self.env.block.difficulty
        };
        self.current_call_frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    // GASLIMIT operation
    pub fn op_gaslimit(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::GASLIMIT)?;
        self.current_call_frame
            .stack
            .push(U256::from(self.env.block.gas_limit))?;
        Ok(OpcodeResult::Continue)
    }

    // CHAINID operation
    pub fn op_chainid(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::CHAINID)?;
        self.current_call_frame
            .stack
            .push(U256::from(self.env.chain_id))?;
        Ok(OpcodeResult::Continue)
    }

    // SELFBALANCE operation
    pub fn op_selfbalance(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::SELFBALANCE)?;
        let address = self.current_call_frame.to;
        let balance = self.storage.get_account(address)?.balance;
        self.current_call_frame.stack.push(balance)?;
        Ok(OpcodeResult::Continue)
    }

    // BASEFEE operation
    pub fn op_basefee(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::BASEFEE)?;
        self.current_call_frame
            .stack
            .push(self.env.block.base_fee_per_gas)?;
        Ok(OpcodeResult::Continue)
    }

    // BLOBHASH operation (EIP-4844)
    pub fn op_blobhash(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::BLOBHASH)?;
        let index = self.current_call_frame.stack.pop1()?;
        let hash = u256_to_usize(index)
            .ok()
            .and_then(|i| self.env.tx.blob_versioned_hashes.get(i))
            .map(|h| U256::from_big_endian(h.as_bytes()))
            .unwrap_or_default();
        self.current_call_frame.stack.push(hash)?;
        Ok(OpcodeResult::Continue)
    }

    // BLOBBASEFEE operation (EIP-7516)
    pub fn op_blobbasefee(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::BLOBBASEFEE)?;
        self.current_call_frame
            .stack
            .push(self.env.block.blob_base_fee)?;
        Ok(OpcodeResult::Continue)
    }
}
