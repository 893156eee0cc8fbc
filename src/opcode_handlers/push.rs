use crate::{
    errors::{InternalError, OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

// Push Operations
// Opcodes: PUSH0, PUSH1 ... PUSH32

impl<'a> VM<'a> {
    // Generic PUSH operation, optimized at compile time for the given N.
    #[inline]
    pub fn op_push<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas_cost::PUSH)?;

        let data = call_frame.read_code::<N>(call_frame.pc);
        call_frame.stack.push(U256::from_big_endian(&data))?;

        // Advance the PC by the number of bytes in this instruction's payload.
        call_frame.pc = call_frame
            .pc
            .checked_add(N)
            .ok_or(InternalError::Overflow)?;

        Ok(OpcodeResult::Continue)
    }

    // PUSH0
    #[inline]
    pub fn op_push0(&mut self) -> Result<OpcodeResult, VMError> {
        self.current_call_frame
            .increase_consumed_gas(gas_cost::PUSH0)?;
        self.current_call_frame.stack.push_zero()?;
        Ok(OpcodeResult::Continue)
    }
}
