//! Flag-derivation micro-programs.
//!
//! Each x86 status flag is computed by a small reusable builder that the
//! arithmetic and logic lowerings compose. All of them take the operands
//! and the (usually double-width) result of the computation and leave the
//! flag register holding a single bit.

use reil_asm::{Instruction, Operand, Register, Width};

use super::{TranslationBuffer, Translator};

impl Translator {
    /// Extract bit `bit` of `value` into a fresh 1-bit temporary.
    pub(crate) fn extract_bit(
        &self,
        tb: &mut TranslationBuffer<'_>,
        value: &Operand,
        bit: Width,
    ) -> Operand {
        debug_assert!(bit < value.size());

        let shifted = tb.temporal(value.size());
        let extracted = tb.temporal(1);

        let shift = tb.immediate(-i128::from(bit), value.size());
        let one = tb.immediate(1, value.size());

        tb.add(Instruction::bsh(value, &shift, &shifted));
        tb.add(Instruction::and(&shifted, &one, &extracted));

        extracted
    }

    /// Extract the sign bit of `value`.
    pub(crate) fn extract_sign_bit(
        &self,
        tb: &mut TranslationBuffer<'_>,
        value: &Operand,
    ) -> Operand {
        self.extract_bit(tb, value, value.size() - 1)
    }

    /// SF: sign bit of the result, restricted to the operand width.
    pub(crate) fn update_sf(
        &self,
        tb: &mut TranslationBuffer<'_>,
        operand: &Operand,
        result: &Operand,
    ) {
        let sign = tb.temporal(result.size());

        let mask = tb.immediate(1i128 << (operand.size() - 1), result.size());
        let shift = tb.immediate(-i128::from(operand.size() - 1), result.size());

        tb.add(Instruction::and(result, &mask, &sign));
        tb.add(Instruction::bsh(&sign, &shift, &self.flags.sf));
    }

    /// ZF: the result's low `operand.size()` bits are all zero.
    pub(crate) fn update_zf(
        &self,
        tb: &mut TranslationBuffer<'_>,
        operand: &Operand,
        result: &Operand,
    ) {
        let low = tb.temporal(operand.size());

        let mask = tb.immediate((1i128 << operand.size()) - 1, result.size());

        tb.add(Instruction::and(result, &mask, &low));
        tb.add(Instruction::bisz(&low, &self.flags.zf));
    }

    /// CF: the carry bit, i.e. bit `operand.size()` of the double-width
    /// result.
    pub(crate) fn update_cf(
        &self,
        tb: &mut TranslationBuffer<'_>,
        operand: &Operand,
        result: &Operand,
    ) {
        let carry = tb.temporal(result.size());

        let mask = tb.immediate(1i128 << operand.size(), result.size());
        let shift = tb.immediate(-i128::from(operand.size()), result.size());

        tb.add(Instruction::and(result, &mask, &carry));
        tb.add(Instruction::bsh(&carry, &shift, &self.flags.cf));
    }

    /// OF after an addition:
    /// `(sign(a) ^ sign(b) ^ 1) & (sign(a) ^ sign(result))`.
    pub(crate) fn update_of(
        &self,
        tb: &mut TranslationBuffer<'_>,
        lhs: &Operand,
        rhs: &Operand,
        result: &Operand,
    ) {
        debug_assert_eq!(lhs.size(), rhs.size());

        let one = tb.immediate(1, 1);

        let lhs_sign = self.extract_sign_bit(tb, lhs);
        let rhs_sign = self.extract_sign_bit(tb, rhs);
        let result_sign = self.extract_bit(tb, result, lhs.size() - 1);

        let same_sign = tb.temporal(1);
        let operands_agree = tb.temporal(1);
        let result_flipped = tb.temporal(1);
        let overflow = tb.temporal(1);

        tb.add(Instruction::xor(&lhs_sign, &rhs_sign, &same_sign));
        tb.add(Instruction::xor(&same_sign, &one, &operands_agree));
        tb.add(Instruction::xor(&lhs_sign, &result_sign, &result_flipped));
        tb.add(Instruction::and(&operands_agree, &result_flipped, &overflow));

        tb.add(Instruction::str(&overflow, &self.flags.of));
    }

    /// OF after a subtraction: the addition rule with the subtrahend's
    /// sign inverted.
    pub(crate) fn update_of_sub(
        &self,
        tb: &mut TranslationBuffer<'_>,
        lhs: &Operand,
        rhs: &Operand,
        result: &Operand,
    ) {
        debug_assert_eq!(lhs.size(), rhs.size());

        let one = tb.immediate(1, 1);

        let lhs_sign = self.extract_sign_bit(tb, lhs);
        let rhs_sign_raw = self.extract_sign_bit(tb, rhs);
        let result_sign = self.extract_bit(tb, result, lhs.size() - 1);

        let rhs_sign = tb.temporal(1);
        tb.add(Instruction::xor(&rhs_sign_raw, &one, &rhs_sign));

        let same_sign = tb.temporal(1);
        let operands_agree = tb.temporal(1);
        let result_flipped = tb.temporal(1);
        let overflow = tb.temporal(1);

        tb.add(Instruction::xor(&lhs_sign, &rhs_sign, &same_sign));
        tb.add(Instruction::xor(&same_sign, &one, &operands_agree));
        tb.add(Instruction::xor(&lhs_sign, &result_sign, &result_flipped));
        tb.add(Instruction::and(&operands_agree, &result_flipped, &overflow));

        tb.add(Instruction::str(&overflow, &self.flags.of));
    }

    /// AF derivation.
    // TODO derive AF from the nibble carry of operands and result.
    pub(crate) fn update_af(&self, _tb: &mut TranslationBuffer<'_>, _result: &Operand) {}

    /// PF derivation.
    // TODO derive PF from the parity of the result's low byte.
    pub(crate) fn update_pf(&self, _tb: &mut TranslationBuffer<'_>, _result: &Operand) {}

    /// Force a flag to 0.
    pub(crate) fn clear_flag(&self, tb: &mut TranslationBuffer<'_>, flag: &Register) {
        let zero = tb.immediate(0, flag.size());

        tb.add(Instruction::str(&zero, flag));
    }

    /// Force a flag to 1.
    pub(crate) fn set_flag(&self, tb: &mut TranslationBuffer<'_>, flag: &Register) {
        let one = tb.immediate(1, flag.size());

        tb.add(Instruction::str(&one, flag));
    }

    /// Leave a flag architecturally undefined.
    ///
    /// Undefined flags are pinned to 0: every consumer of this IR observes
    /// them as cleared, and downstream differential tests rely on that.
    pub(crate) fn undefine_flag(&self, tb: &mut TranslationBuffer<'_>, flag: &Register) {
        let zero = tb.immediate(0, flag.size());

        tb.add(Instruction::str(&zero, flag));
    }
}
