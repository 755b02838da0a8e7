//! Flag-control lowerings: `cld`, `clc`, `stc`, `std`.
//!
//! These write their flag unconditionally in both translation modes.

use super::{TranslationBuffer, Translator};
use crate::error::TranslationError;
use crate::instruction::X86Instruction;

impl Translator {
    /// `cld`: DF ← 0.
    pub(crate) fn lower_cld(
        &self,
        tb: &mut TranslationBuffer<'_>,
        _insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        self.clear_flag(tb, &self.flags.df);

        Ok(())
    }

    /// `clc`: CF ← 0.
    pub(crate) fn lower_clc(
        &self,
        tb: &mut TranslationBuffer<'_>,
        _insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        self.clear_flag(tb, &self.flags.cf);

        Ok(())
    }

    /// `stc`: CF ← 1.
    pub(crate) fn lower_stc(
        &self,
        tb: &mut TranslationBuffer<'_>,
        _insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        self.set_flag(tb, &self.flags.cf);

        Ok(())
    }

    /// `std`: DF ← 1.
    pub(crate) fn lower_std(
        &self,
        tb: &mut TranslationBuffer<'_>,
        _insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        self.set_flag(tb, &self.flags.df);

        Ok(())
    }
}
