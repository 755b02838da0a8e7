//! Data transfer lowerings: `mov`, `movzx`, `xchg`, `push`, `pop`.

use reil_asm::Instruction;

use super::{operand, TranslationBuffer, Translator};
use crate::error::TranslationError;
use crate::instruction::X86Instruction;

impl Translator {
    /// `mov dst, src`. No flags affected.
    pub(crate) fn lower_mov(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let src = tb.read(operand(insn, 1)?)?;

        tb.write(operand(insn, 0)?, &src)
    }

    /// `movzx dst, src`. The `STR` into the wider destination zero-extends.
    pub(crate) fn lower_movzx(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let src = tb.read(operand(insn, 1)?)?;

        tb.write(operand(insn, 0)?, &src)
    }

    /// `xchg a, b` via one temporary. No flags affected.
    pub(crate) fn lower_xchg(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let saved = tb.temporal(rhs.size());

        tb.add(Instruction::str(&lhs, &saved));

        tb.write(operand(insn, 0)?, &rhs)?;
        tb.write(operand(insn, 1)?, &saved)
    }

    /// `push src`: decrement the stack pointer, then store.
    pub(crate) fn lower_push(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let src = tb.read(operand(insn, 0)?)?;

        let sp = tb.temporal(self.sp.size());

        tb.add(Instruction::sub(&self.sp, &self.ws, &sp));
        tb.add(Instruction::str(&sp, &self.sp));
        tb.add(Instruction::stm(&src, &self.sp));

        Ok(())
    }

    /// `pop dst`: load, then increment the stack pointer.
    pub(crate) fn lower_pop(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let dst = tb.read(operand(insn, 0)?)?;

        let sp = tb.temporal(self.sp.size());

        tb.add(Instruction::ldm(&self.sp, &dst));
        tb.add(Instruction::add(&self.sp, &self.ws, &sp));
        tb.add(Instruction::str(&sp, &self.sp));

        Ok(())
    }
}
