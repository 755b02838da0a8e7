//! Shift and rotate lowerings: `shr`, `shl`/`sal`, `sar`, `rol`, `ror`,
//! `rcl`, `rcr`.
//!
//! `sar` expands into an intra-instruction loop; the rotates emulate the
//! wrap-around with a double-width (`rcl`) or quadruple-width (`rcr`)
//! shift and an `or` of the two halves. Rotation counts are masked to 5
//! bits in 32-bit mode and 6 bits in 64-bit mode, and the through-carry
//! rotates additionally reduce 8/16-bit counts mod 9/17.

use reil_asm::{Instruction, Width};

use super::{operand, TranslationBuffer, Translator};
use crate::arch::ArchitectureMode;
use crate::error::TranslationError;
use crate::instruction::X86Instruction;

/// Rotate-count mask for the architecture mode.
const fn rotate_count_mask(mode: ArchitectureMode) -> i128 {
    match mode {
        ArchitectureMode::Bits32 => 0x1f,
        ArchitectureMode::Bits64 => 0x3f,
    }
}

/// Through-carry rotates reduce sub-word counts mod `width + 1`.
fn through_carry_modulus(size: Width) -> Result<Option<i128>, TranslationError> {
    match size {
        8 => Ok(Some(9)),
        16 => Ok(Some(17)),
        32 | 64 => Ok(None),
        _ => Err(TranslationError::InvalidOperandSize { size }),
    }
}

impl Translator {
    /// `shr dst, count`: logical right shift. CF holds the last bit
    /// shifted out.
    // TODO OF derivation for 1-bit shifts.
    pub(crate) fn lower_shr(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let count = tb.read(operand(insn, 1)?)?;
        let size = value.size();

        let one = tb.immediate(1, size);
        let all_ones = tb.immediate((1i128 << size) - 1, size);
        let right_one = tb.immediate(-1, size);

        let count_ext = tb.temporal(size);
        let count_m1 = tb.temporal(size);
        let count_m1_not = tb.temporal(size);
        let count_m1_neg = tb.temporal(size);
        let partial = tb.temporal(size);
        let last_bit = tb.temporal(size);
        let result = tb.temporal(size);

        // Widen the count, subtract one, and negate it through explicit
        // two's complement so the shift runs rightwards.
        tb.add(Instruction::str(&count, &count_ext));
        tb.add(Instruction::sub(&count_ext, &one, &count_m1));
        tb.add(Instruction::xor(&count_m1, &all_ones, &count_m1_not));
        tb.add(Instruction::add(&count_m1_not, &one, &count_m1_neg));

        // Shift all but the last position, pick CF off the LSB, then
        // finish the shift.
        tb.add(Instruction::bsh(&value, &count_m1_neg, &partial));
        tb.add(Instruction::and(&partial, &one, &last_bit));
        tb.add(Instruction::str(&last_bit, &self.flags.cf));
        tb.add(Instruction::bsh(&partial, &right_one, &result));

        if self.is_full() {
            self.update_sf(tb, &value, &result);
            self.update_zf(tb, &value, &result);
            self.update_pf(tb, &result);

            self.undefine_flag(tb, &self.flags.af);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `shl`/`sal dst, count`: left shift. CF holds the last bit shifted
    /// out.
    // TODO OF derivation for 1-bit shifts.
    pub(crate) fn lower_shl(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let count = tb.read(operand(insn, 1)?)?;
        let size = value.size();

        let one = tb.immediate(1, size);

        let count_ext = tb.temporal(size);
        let count_m1 = tb.temporal(size);
        let partial = tb.temporal(size);
        let last_bit = tb.temporal(size);
        let result = tb.temporal(size);

        tb.add(Instruction::str(&count, &count_ext));
        tb.add(Instruction::sub(&count_ext, &one, &count_m1));

        tb.add(Instruction::bsh(&value, &count_m1, &partial));
        tb.add(Instruction::and(&partial, &one, &last_bit));
        tb.add(Instruction::str(&last_bit, &self.flags.cf));
        tb.add(Instruction::bsh(&partial, &one, &result));

        if self.is_full() {
            self.update_sf(tb, &value, &result);
            self.update_zf(tb, &value, &result);
            self.update_pf(tb, &result);

            self.undefine_flag(tb, &self.flags.af);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `sar dst, count`: arithmetic right shift as an intra-instruction
    /// loop, shifting one position per pass and reinjecting the preserved
    /// sign bit until the counter runs out.
    pub(crate) fn lower_sar(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let count = tb.read(operand(insn, 1)?)?;
        let size = value.size();

        let sign_mask = tb.immediate(1i128 << (size - 1), size);
        let one = tb.immediate(1, size);
        let right_one = tb.immediate(-1, size);

        let counter = tb.temporal(size);
        let shifting = tb.temporal(size);
        let sign = tb.temporal(size);
        let shifted = tb.temporal(size);
        let counter_zero = tb.temporal(size);
        let keep_going = tb.temporal(size);
        let result = tb.temporal(size);

        let head = tb.label("loop");

        tb.add(Instruction::str(&count, &counter));
        tb.add(Instruction::str(&value, &shifting));
        tb.add(Instruction::and(&value, &sign_mask, &sign));

        tb.mark(head);

        // CF tracks the LSB of the unshifted source on every pass.
        tb.add(Instruction::and(&value, &one, &result));
        tb.add(Instruction::str(&result, &self.flags.cf));

        tb.add(Instruction::bsh(&shifting, &right_one, &shifted));
        tb.add(Instruction::or(&shifted, &sign, &shifting));

        tb.add(Instruction::sub(&counter, &one, &counter));
        tb.add(Instruction::bisz(&counter, &counter_zero));
        tb.add(Instruction::xor(&counter_zero, &one, &keep_going));
        tb.jump(&keep_going, head);

        tb.add(Instruction::str(&shifting, &result));

        if self.is_full() {
            self.update_sf(tb, &value, &result);
            self.update_zf(tb, &value, &result);
            self.update_pf(tb, &result);

            self.undefine_flag(tb, &self.flags.af);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `rol dst, count`.
    pub(crate) fn lower_rol(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let count_src = tb.read(operand(insn, 1)?)?;
        let size = value.size();

        let size_imm = tb.immediate(i128::from(size), size);
        let count_mask = tb.immediate(rotate_count_mask(self.arch_mode), size);

        let count = tb.temporal(size);
        let count_masked = tb.temporal(size);
        let temp_count = tb.temporal(size);

        let extended = tb.temporal(size * 2);
        let rotated = tb.temporal(size * 2);
        let rotated_low = tb.temporal(size);
        let rotated_high = tb.temporal(size);

        let result = tb.temporal(size);
        let result_msb = tb.temporal(1);

        let count_m1 = tb.temporal(1);
        let count_is_one = tb.temporal(1);

        let one = tb.immediate(1, size);
        let high_shift = tb.immediate(-i128::from(size), size * 2);
        let msb_shift = tb.immediate(-i128::from(size + 1), size);

        tb.add(Instruction::str(&count_src, &count));
        tb.add(Instruction::and(&count, &count_mask, &count_masked));
        tb.add(Instruction::modulo(&count_masked, &size_imm, &temp_count));

        // Rotate through the double-width temporary.
        tb.add(Instruction::str(&value, &extended));
        tb.add(Instruction::bsh(&extended, &temp_count, &rotated));
        tb.add(Instruction::bsh(&rotated, &high_shift, &rotated_high));
        tb.add(Instruction::str(&rotated, &rotated_low));
        tb.add(Instruction::or(&rotated_low, &rotated_high, &result));

        // CF takes the bit rotated into the low position.
        tb.add(Instruction::str(&result, &self.flags.cf));

        // OF is computed for a single-bit rotate, then unconditionally
        // undefined at the join point.
        let undef_of = tb.label("undef_of");

        tb.add(Instruction::sub(&count_masked, &one, &count_m1));
        tb.add(Instruction::bisz(&count_m1, &count_is_one));
        tb.jump(&count_is_one, undef_of);

        tb.add(Instruction::bsh(&result, &msb_shift, &result_msb));
        tb.add(Instruction::xor(&result_msb, &self.flags.cf, &self.flags.of));

        tb.mark(undef_of);
        self.undefine_flag(tb, &self.flags.of);

        tb.write(operand(insn, 0)?, &result)
    }

    /// `ror dst, count`.
    pub(crate) fn lower_ror(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let count_src = tb.read(operand(insn, 1)?)?;
        let size = value.size();

        let size_imm = tb.immediate(i128::from(size), size);
        let count_mask = tb.immediate(rotate_count_mask(self.arch_mode), size);

        let count = tb.temporal(size);
        let temp_count = tb.temporal(size);

        let extended = tb.temporal(size * 2);
        let rotated = tb.temporal(size * 2);
        let rotated_low = tb.temporal(size);
        let rotated_high = tb.temporal(size);

        let result = tb.temporal(size);
        let result_msb = tb.temporal(1);
        let result_msb_prev = tb.temporal(1);

        let count_masked = tb.temporal(size);
        let count_m1 = tb.temporal(1);
        let count_is_one = tb.temporal(1);
        let count_mod = tb.temporal(size);

        let zero = tb.immediate(0, size);
        let one = tb.immediate(1, size);
        let high_shift = tb.immediate(-i128::from(size), size * 2);
        let msb_shift = tb.immediate(-i128::from(size + 1), size);
        let msb_pos = tb.immediate(i128::from(size - 1), size);
        let msb_prev_pos = tb.immediate(i128::from(size - 2), size);

        tb.add(Instruction::str(&count_src, &count));
        tb.add(Instruction::and(&count, &count_mask, &count_masked));
        tb.add(Instruction::modulo(&count_masked, &size_imm, &count_mod));
        tb.add(Instruction::sub(&zero, &count_mod, &temp_count));

        // Pre-shift the value into the high half, then rotate rightwards.
        tb.add(Instruction::bsh(&value, &size_imm, &extended));
        tb.add(Instruction::bsh(&extended, &temp_count, &rotated));
        tb.add(Instruction::bsh(&rotated, &high_shift, &rotated_high));
        tb.add(Instruction::str(&rotated, &rotated_low));
        tb.add(Instruction::or(&rotated_low, &rotated_high, &result));

        // CF takes the bit rotated into the top position.
        tb.add(Instruction::bsh(&result, &msb_pos, &self.flags.cf));

        // OF is computed for a single-bit rotate, then unconditionally
        // undefined at the join point.
        let undef_of = tb.label("undef_of");

        tb.add(Instruction::sub(&count_masked, &one, &count_m1));
        tb.add(Instruction::bisz(&count_m1, &count_is_one));
        tb.jump(&count_is_one, undef_of);

        tb.add(Instruction::bsh(&result, &msb_shift, &result_msb));
        tb.add(Instruction::bsh(&result, &msb_prev_pos, &result_msb_prev));
        tb.add(Instruction::xor(&result_msb, &result_msb_prev, &self.flags.of));

        tb.mark(undef_of);
        self.undefine_flag(tb, &self.flags.of);

        tb.write(operand(insn, 0)?, &result)
    }

    /// `rcl dst, count`: rotate through CF by widening the value with the
    /// carry bit at the top.
    pub(crate) fn lower_rcl(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let count_src = tb.read(operand(insn, 1)?)?;
        let size = value.size();

        let modulus = through_carry_modulus(size)?;
        let count_mask = match size {
            64 => tb.immediate(0x3f, size),
            _ => tb.immediate(0x1f, size),
        };

        let count = tb.temporal(size);
        let count_masked = tb.temporal(size);
        let temp_count = tb.temporal(size);

        tb.add(Instruction::str(&count_src, &count));
        tb.add(Instruction::and(&count, &count_mask, &count_masked));

        match modulus {
            Some(modulus) => {
                let modulus = tb.immediate(modulus, size);
                tb.add(Instruction::modulo(&count_masked, &modulus, &temp_count));
            }
            None => tb.add(Instruction::str(&count_masked, &temp_count)),
        }

        let carry_ext = tb.temporal(size * 2);
        let carry_shifted = tb.temporal(size * 2);

        let value_ext = tb.temporal(size * 2);
        let with_carry = tb.temporal(size * 2);
        let rotated = tb.temporal(size * 2);
        let rotated_low = tb.temporal(size);
        let rotated_high = tb.temporal(size);

        let result = tb.temporal(size);
        let result_msb = tb.temporal(1);

        let count_m1 = tb.temporal(1);
        let count_is_one = tb.temporal(1);

        let one = tb.immediate(1, size);
        let high_shift = tb.immediate(-i128::from(size + 1), size * 2);
        let msb_shift = tb.immediate(-i128::from(size + 1), size);
        let carry_pos = tb.immediate(i128::from(size), size * 2);

        // Concatenate CF above the value.
        tb.add(Instruction::str(&value, &value_ext));
        tb.add(Instruction::str(&self.flags.cf, &carry_ext));
        tb.add(Instruction::bsh(&carry_ext, &carry_pos, &carry_shifted));
        tb.add(Instruction::or(&carry_shifted, &value_ext, &with_carry));

        tb.add(Instruction::bsh(&with_carry, &temp_count, &rotated));
        tb.add(Instruction::bsh(&rotated, &high_shift, &rotated_high));
        tb.add(Instruction::str(&rotated, &rotated_low));
        tb.add(Instruction::or(&rotated_low, &rotated_high, &result));

        tb.add(Instruction::str(&result, &self.flags.cf));

        // OF is computed for a single-bit rotate, then unconditionally
        // undefined at the join point.
        let undef_of = tb.label("undef_of");

        tb.add(Instruction::sub(&count, &one, &count_m1));
        tb.add(Instruction::bisz(&count_m1, &count_is_one));
        tb.jump(&count_is_one, undef_of);

        tb.add(Instruction::bsh(&result, &msb_shift, &result_msb));
        tb.add(Instruction::xor(&result_msb, &self.flags.cf, &self.flags.of));

        tb.mark(undef_of);
        self.undefine_flag(tb, &self.flags.of);

        tb.write(operand(insn, 0)?, &result)
    }

    /// `rcr dst, count`: rotate through CF, run in a quadruple-width
    /// buffer so the right shift cannot drop bits.
    // XXX OF uses the pre-rotate carry; audit against hardware.
    pub(crate) fn lower_rcr(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let count_src = tb.read(operand(insn, 1)?)?;
        let size = value.size();

        let modulus = through_carry_modulus(size)?;
        let count_mask = match size {
            64 => tb.immediate(0x3f, size),
            _ => tb.immediate(0x1f, size),
        };

        let count = tb.temporal(size);
        let count_masked = tb.temporal(size);

        tb.add(Instruction::str(&count_src, &count));

        match modulus {
            Some(modulus) => {
                let raw_masked = tb.temporal(size);
                let modulus = tb.immediate(modulus, size);
                tb.add(Instruction::and(&count, &count_mask, &raw_masked));
                tb.add(Instruction::modulo(&raw_masked, &modulus, &count_masked));
            }
            None => tb.add(Instruction::and(&count, &count_mask, &count_masked)),
        }

        let temp_count = tb.temporal(size);
        let zero = tb.immediate(0, size);

        tb.add(Instruction::sub(&zero, &count_masked, &temp_count));

        let carry_ext = tb.temporal(size * 4);

        let shifted_one = tb.temporal(size * 4);
        let with_carry = tb.temporal(size * 4);
        let positioned = tb.temporal(size * 4);
        let rotated = tb.temporal(size * 4);
        let rotated_low = tb.temporal(size);
        let rotated_high = tb.temporal(size);
        let rotated_high_raw = tb.temporal(size);

        let result = tb.temporal(size);
        let result_msb = tb.temporal(1);

        let count_m1 = tb.temporal(1);
        let count_is_one = tb.temporal(1);

        let carry_old = tb.temporal(1);

        let size_imm = tb.immediate(i128::from(size), size);
        let neg_size = tb.immediate(-i128::from(size), size);
        let one = tb.immediate(1, size);
        let msb_shift = tb.immediate(-i128::from(size - 1), size);
        let left_one = tb.immediate(1, size * 2);
        let right_one = tb.immediate(-1, size * 2);

        tb.add(Instruction::str(&self.flags.cf, &carry_old));

        // Concatenate CF below the value, then park the pair in the upper
        // half of the wide buffer.
        tb.add(Instruction::bsh(&value, &left_one, &shifted_one));
        tb.add(Instruction::str(&self.flags.cf, &carry_ext));
        tb.add(Instruction::or(&carry_ext, &shifted_one, &with_carry));
        tb.add(Instruction::bsh(&with_carry, &size_imm, &positioned));

        tb.add(Instruction::bsh(&positioned, &temp_count, &rotated));
        tb.add(Instruction::bsh(&rotated, &neg_size, &rotated_high_raw));
        tb.add(Instruction::bsh(&rotated_high_raw, &right_one, &rotated_high));
        tb.add(Instruction::str(&rotated, &rotated_low));
        tb.add(Instruction::or(&rotated_low, &rotated_high, &result));

        tb.add(Instruction::str(&rotated_high_raw, &self.flags.cf));

        // OF is computed for a single-bit rotate, then unconditionally
        // undefined at the join point.
        let undef_of = tb.label("undef_of");

        tb.add(Instruction::sub(&count, &one, &count_m1));
        tb.add(Instruction::bisz(&count_m1, &count_is_one));
        tb.jump(&count_is_one, undef_of);

        tb.add(Instruction::bsh(&value, &msb_shift, &result_msb));
        tb.add(Instruction::xor(&result_msb, &carry_old, &self.flags.of));

        tb.mark(undef_of);
        self.undefine_flag(tb, &self.flags.of);

        tb.write(operand(insn, 0)?, &result)
    }
}
