//! Frame and miscellaneous lowerings: `leave`, `lea`, `nop`, `hlt`.

use reil_asm::Instruction;

use super::{operand, TranslationBuffer, Translator};
use crate::error::TranslationError;
use crate::instruction::{X86Instruction, X86Operand};

impl Translator {
    /// `leave`: tear down the current stack frame.
    pub(crate) fn lower_leave(
        &self,
        tb: &mut TranslationBuffer<'_>,
        _insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let sp = tb.temporal(self.sp.size());

        tb.add(Instruction::str(&self.bp, &self.sp));
        tb.add(Instruction::ldm(&self.sp, &self.bp));
        tb.add(Instruction::add(&self.sp, &self.ws, &sp));
        tb.add(Instruction::str(&sp, &self.sp));

        Ok(())
    }

    /// `lea dst, [mem]`: the effective address without the load.
    pub(crate) fn lower_lea(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let source = operand(insn, 1)?;
        let X86Operand::Memory(mem) = source else {
            return Err(TranslationError::UnsupportedOperand {
                operand: source.to_string(),
            });
        };

        let addr = tb.effective_address(mem);

        tb.write(operand(insn, 0)?, &addr)
    }

    /// `nop`.
    pub(crate) fn lower_nop(
        &self,
        tb: &mut TranslationBuffer<'_>,
        _insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        tb.add(Instruction::nop());

        Ok(())
    }

    /// `hlt`: an analysis boundary; translated as an unknown effect.
    pub(crate) fn lower_hlt(
        &self,
        tb: &mut TranslationBuffer<'_>,
        _insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        tb.add(Instruction::unkn());

        Ok(())
    }
}
