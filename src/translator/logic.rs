//! Logical lowerings: `and`, `or`, `xor`, `not`.
//!
//! The bitwise instructions clear OF and CF, derive SF/ZF/PF from the
//! result, and leave AF undefined. `not` touches no flags.

use reil_asm::Instruction;

use super::{operand, TranslationBuffer, Translator};
use crate::error::TranslationError;
use crate::instruction::X86Instruction;

impl Translator {
    /// `and dst, src`.
    pub(crate) fn lower_and(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::and(&lhs, &rhs, &result));

        if self.is_full() {
            self.clear_flag(tb, &self.flags.of);
            self.clear_flag(tb, &self.flags.cf);

            self.update_sf(tb, &lhs, &result);
            self.update_zf(tb, &lhs, &result);
            self.update_pf(tb, &result);

            self.undefine_flag(tb, &self.flags.af);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `or dst, src`.
    pub(crate) fn lower_or(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::or(&lhs, &rhs, &result));

        if self.is_full() {
            self.clear_flag(tb, &self.flags.of);
            self.clear_flag(tb, &self.flags.cf);

            self.update_sf(tb, &lhs, &result);
            self.update_zf(tb, &lhs, &result);
            self.update_pf(tb, &result);

            self.undefine_flag(tb, &self.flags.af);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `xor dst, src`.
    pub(crate) fn lower_xor(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::xor(&lhs, &rhs, &result));

        if self.is_full() {
            self.clear_flag(tb, &self.flags.of);
            self.clear_flag(tb, &self.flags.cf);

            self.update_sf(tb, &lhs, &result);
            self.update_zf(tb, &lhs, &result);
            self.update_pf(tb, &result);

            self.undefine_flag(tb, &self.flags.af);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `not dst`: complement via `xor` against an all-ones mask. No flags.
    pub(crate) fn lower_not(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;

        let mask = tb.immediate((1i128 << value.size()) - 1, value.size());
        let result = tb.temporal(value.size() * 2);

        tb.add(Instruction::xor(&value, &mask, &result));

        tb.write(operand(insn, 0)?, &result)
    }
}
