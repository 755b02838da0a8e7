//! Bit and byte lowerings: `test` and the `setcc` family.
//!
//! Flag updates here are part of the instruction's semantic result and are
//! emitted in both translation modes.

use reil_asm::Instruction;

use super::{operand, TranslationBuffer, Translator};
use crate::error::TranslationError;
use crate::instruction::X86Instruction;

impl Translator {
    /// `test a, b`: `and` with the result discarded. OF = CF = 0,
    /// SF/ZF/PF from the result, AF undefined.
    pub(crate) fn lower_test(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let result = tb.temporal(lhs.size());

        tb.add(Instruction::and(&lhs, &rhs, &result));

        self.clear_flag(tb, &self.flags.of);
        self.clear_flag(tb, &self.flags.cf);

        self.update_sf(tb, &lhs, &result);
        self.update_zf(tb, &lhs, &result);
        self.update_pf(tb, &result);

        self.undefine_flag(tb, &self.flags.af);

        Ok(())
    }

    /// `sete dst`: ZF = 1.
    pub(crate) fn lower_sete(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let one = tb.immediate(1, 1);
        let equal = tb.temporal(operand(insn, 0)?.size());

        tb.add(Instruction::and(&self.flags.zf, &one, &equal));

        tb.write(operand(insn, 0)?, &equal)
    }

    /// `setne dst`: ZF = 0.
    pub(crate) fn lower_setne(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let one = tb.immediate(1, 1);
        let not_equal = tb.temporal(operand(insn, 0)?.size());

        tb.add(Instruction::xor(&self.flags.zf, &one, &not_equal));

        tb.write(operand(insn, 0)?, &not_equal)
    }

    /// `setb dst`: CF = 1.
    pub(crate) fn lower_setb(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        tb.write(operand(insn, 0)?, &self.flags.cf)
    }

    /// `setbe dst`: CF = 1 or ZF = 1.
    pub(crate) fn lower_setbe(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let below_or_equal = tb.temporal(operand(insn, 0)?.size());

        tb.add(Instruction::or(
            &self.flags.cf,
            &self.flags.zf,
            &below_or_equal,
        ));

        tb.write(operand(insn, 0)?, &below_or_equal)
    }

    /// `setae dst`: CF = 0.
    pub(crate) fn lower_setae(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let above_or_equal = tb.temporal(operand(insn, 0)?.size());

        tb.add(Instruction::bisz(&self.flags.cf, &above_or_equal));

        tb.write(operand(insn, 0)?, &above_or_equal)
    }

    /// `setg dst`: ZF = 0 and SF = OF.
    pub(crate) fn lower_setg(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let one = tb.immediate(1, 1);

        let sign_diff = tb.temporal(8);
        let signs_match = tb.temporal(1);
        let not_zero = tb.temporal(1);
        let greater = tb.temporal(operand(insn, 0)?.size());

        tb.add(Instruction::sub(&self.flags.sf, &self.flags.of, &sign_diff));
        tb.add(Instruction::bisz(&sign_diff, &signs_match));
        tb.add(Instruction::xor(&self.flags.zf, &one, &not_zero));
        tb.add(Instruction::and(&signs_match, &not_zero, &greater));

        tb.write(operand(insn, 0)?, &greater)
    }
}
