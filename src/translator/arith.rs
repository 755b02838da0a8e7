//! Binary arithmetic lowerings: `add`, `adc`, `sub`, `sbb`, `mul`, `imul`,
//! `div`, `inc`, `dec`, `neg`, `cmp`.
//!
//! Additions and subtractions compute into a double-width temporary so the
//! carry position stays addressable by the flag micro-programs. The
//! widening multiply/divide forms pick their implicit registers from
//! per-width tables.

use reil_asm::{Instruction, Operand, Register, Width};

use super::{operand, TranslationBuffer, Translator};
use crate::arch::ArchitectureMode;
use crate::error::TranslationError;
use crate::instruction::X86Instruction;

/// `mul`: width → (implicit multiplicand, low destination, high destination).
fn mul_registers(size: Width) -> Result<(Register, Register, Register), TranslationError> {
    let (implicit, low, high) = match size {
        8 => ("al", "al", "ah"),
        16 => ("ax", "ax", "dx"),
        32 => ("eax", "eax", "edx"),
        64 => ("rax", "rax", "rdx"),
        _ => return Err(TranslationError::InvalidOperandSize { size }),
    };

    Ok((
        Register::new(implicit, size),
        Register::new(low, size),
        Register::new(high, size),
    ))
}

/// One-operand `imul`: width → (implicit multiplicand, low, high).
///
/// FIXME: for the 16/32/64-bit forms the product halves land swapped (the
/// low half goes to `dx`/`edx`/`rdx`).
fn imul_registers(size: Width) -> Result<(Register, Register, Register), TranslationError> {
    let (implicit, low, high) = match size {
        8 => ("al", "al", "ah"),
        16 => ("ax", "dx", "ax"),
        32 => ("eax", "edx", "eax"),
        64 => ("rax", "rdx", "rax"),
        _ => return Err(TranslationError::InvalidOperandSize { size }),
    };

    Ok((
        Register::new(implicit, size),
        Register::new(low, size),
        Register::new(high, size),
    ))
}

/// `div`: width → (dividend high, dividend low, quotient, remainder).
fn div_registers(
    size: Width,
) -> Result<(Register, Register, Register, Register), TranslationError> {
    let (high, low, quotient, remainder) = match size {
        8 => ("ah", "al", "al", "ah"),
        16 => ("dx", "ax", "ax", "dx"),
        32 => ("edx", "eax", "eax", "edx"),
        64 => ("rdx", "rax", "rax", "rdx"),
        _ => return Err(TranslationError::InvalidOperandSize { size }),
    };

    Ok((
        Register::new(high, size),
        Register::new(low, size),
        Register::new(quotient, size),
        Register::new(remainder, size),
    ))
}

impl Translator {
    /// `add dst, src`. OF/SF/ZF/AF/CF/PF from the result.
    pub(crate) fn lower_add(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::add(&lhs, &rhs, &result));

        if self.is_full() {
            self.update_of(tb, &lhs, &rhs, &result);
            self.update_sf(tb, &lhs, &result);
            self.update_zf(tb, &lhs, &result);
            self.update_af(tb, &result);
            self.update_cf(tb, &lhs, &result);
            self.update_pf(tb, &result);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `adc dst, src`: `add` with CF folded in as a widened third term.
    pub(crate) fn lower_adc(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let sum = tb.temporal(rhs.size() * 2);
        let carry = tb.temporal(rhs.size() * 2);
        let result = tb.temporal(rhs.size() * 2);

        tb.add(Instruction::add(&lhs, &rhs, &sum));
        tb.add(Instruction::str(&self.flags.cf, &carry));
        tb.add(Instruction::add(&sum, &carry, &result));

        if self.is_full() {
            self.update_of(tb, &lhs, &rhs, &result);
            self.update_sf(tb, &lhs, &result);
            self.update_zf(tb, &lhs, &result);
            self.update_af(tb, &result);
            self.update_cf(tb, &lhs, &result);
            self.update_pf(tb, &result);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `sub dst, src`. OF/SF/ZF/AF/PF/CF from the result.
    pub(crate) fn lower_sub(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::sub(&lhs, &rhs, &result));

        if self.is_full() {
            self.update_of_sub(tb, &lhs, &rhs, &result);
            self.update_sf(tb, &lhs, &result);
            self.update_zf(tb, &lhs, &result);
            self.update_af(tb, &result);
            self.update_pf(tb, &result);
            self.update_cf(tb, &lhs, &result);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `sbb dst, src`.
    ///
    /// FIXME: the borrow is parked in a temporary but never folded into the
    /// difference, and OF comes out wrong for some inputs.
    pub(crate) fn lower_sbb(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let difference = tb.temporal(lhs.size() * 2);
        let borrow = tb.temporal(lhs.size() * 2);
        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::sub(&lhs, &rhs, &difference));
        tb.add(Instruction::str(&self.flags.cf, &borrow));
        tb.add(Instruction::sub(&lhs, &rhs, &result));

        if self.is_full() {
            self.update_of_sub(tb, &lhs, &rhs, &result);
            self.update_sf(tb, &lhs, &result);
            self.update_zf(tb, &lhs, &result);
            self.update_af(tb, &result);
            self.update_pf(tb, &result);
            self.update_cf(tb, &lhs, &result);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `mul src`: unsigned widening multiply against the accumulator.
    /// CF = OF = (high half ≠ 0); SF/ZF/AF/PF undefined.
    pub(crate) fn lower_mul(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let src = tb.read(operand(insn, 0)?)?;
        let size = src.size();

        let (implicit, low, high) = mul_registers(size)?;

        let result = tb.temporal(size * 2);
        let high_shift = tb.immediate(-i128::from(size), size * 2);

        tb.add(Instruction::mul(&src, &implicit, &result));

        // Writing a 32-bit half must still zero-extend the full registers.
        if self.arch_mode == ArchitectureMode::Bits64 && size == 32 {
            let zero = tb.immediate(0, 64);

            tb.add(Instruction::str(&zero, Register::new("rdx", 64)));
            tb.add(Instruction::str(&zero, Register::new("rax", 64)));
        }

        tb.add(Instruction::bsh(&result, &high_shift, &high));
        tb.add(Instruction::str(&result, &low));

        if self.is_full() {
            let one = tb.immediate(1, 1);
            let high_half = tb.temporal(size * 2);
            let high_is_zero = tb.temporal(1);

            tb.add(Instruction::bsh(&result, &high_shift, &high_half));
            tb.add(Instruction::bisz(&high_half, &high_is_zero));
            tb.add(Instruction::xor(&high_is_zero, &one, &self.flags.of));
            tb.add(Instruction::xor(&high_is_zero, &one, &self.flags.cf));

            self.undefine_flag(tb, &self.flags.sf);
            self.undefine_flag(tb, &self.flags.zf);
            self.undefine_flag(tb, &self.flags.af);
            self.undefine_flag(tb, &self.flags.pf);
        }

        Ok(())
    }

    /// `imul` in its one-, two-, and three-operand forms.
    ///
    /// FIXME: make this a signed multiply.
    // TODO derive CF/OF from the truncation of the product.
    pub(crate) fn lower_imul(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let (lhs, rhs, implicit_dsts) = match insn.operands.len() {
            1 => {
                let src = tb.read(operand(insn, 0)?)?;
                let (implicit, low, high) = imul_registers(src.size())?;

                (src, Operand::from(implicit), Some((low, high)))
            }
            2 => {
                let lhs = tb.read(operand(insn, 0)?)?;
                let rhs = tb.read(operand(insn, 1)?)?;

                (lhs, rhs, None)
            }
            3 => {
                let lhs = tb.read(operand(insn, 1)?)?;
                let rhs = tb.read(operand(insn, 2)?)?;

                (lhs, rhs, None)
            }
            _ => {
                return Err(TranslationError::UnsupportedOperand {
                    operand: insn.to_string(),
                })
            }
        };

        let high_shift = tb.immediate(-i128::from(lhs.size()), lhs.size() * 2);
        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::mul(&lhs, &rhs, &result));

        match implicit_dsts {
            Some((low, high)) => {
                tb.add(Instruction::bsh(&result, &high_shift, &high));
                tb.add(Instruction::str(&result, &low));
            }
            None => tb.write(operand(insn, 0)?, &result)?,
        }

        if self.is_full() {
            self.undefine_flag(tb, &self.flags.sf);
            self.undefine_flag(tb, &self.flags.zf);
            self.undefine_flag(tb, &self.flags.af);
            self.undefine_flag(tb, &self.flags.pf);
        }

        Ok(())
    }

    /// `div src`: unsigned divide of the `high:low` register pair.
    /// All six status flags are undefined.
    pub(crate) fn lower_div(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let divisor = tb.read(operand(insn, 0)?)?;
        let size = divisor.size();

        let (high, low, quotient_dst, remainder_dst) = div_registers(size)?;

        let low_shift = tb.immediate(i128::from(size), size * 2);

        let divisor_ext = tb.temporal(size * 2);
        let high_ext = tb.temporal(size * 2);
        let low_ext = tb.temporal(size * 2);
        let high_shifted = tb.temporal(size * 2);
        let dividend = tb.temporal(size * 2);
        let quotient = tb.temporal(size * 2);
        let remainder = tb.temporal(size * 2);

        // Zero-extend the three inputs to the dividend width.
        tb.add(Instruction::str(&divisor, &divisor_ext));
        tb.add(Instruction::str(&high, &high_ext));
        tb.add(Instruction::str(&low, &low_ext));

        // Concatenate high:low.
        tb.add(Instruction::bsh(&high_ext, &low_shift, &high_shifted));
        tb.add(Instruction::or(&high_shifted, &low_ext, &dividend));

        tb.add(Instruction::div(&dividend, &divisor_ext, &quotient));
        tb.add(Instruction::modulo(&dividend, &divisor_ext, &remainder));
        tb.add(Instruction::str(&quotient, &quotient_dst));
        tb.add(Instruction::str(&remainder, &remainder_dst));

        if self.is_full() {
            self.undefine_flag(tb, &self.flags.cf);
            self.undefine_flag(tb, &self.flags.of);
            self.undefine_flag(tb, &self.flags.sf);
            self.undefine_flag(tb, &self.flags.zf);
            self.undefine_flag(tb, &self.flags.af);
            self.undefine_flag(tb, &self.flags.pf);
        }

        Ok(())
    }

    /// `inc dst`: add 1 without touching CF.
    pub(crate) fn lower_inc(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;

        let one = tb.immediate(1, value.size());
        let result = tb.temporal(value.size() * 2);

        tb.add(Instruction::add(&value, &one, &result));

        if self.is_full() {
            self.update_of(tb, &value, &one, &result);
            self.update_sf(tb, &value, &result);
            self.update_zf(tb, &value, &result);
            self.update_af(tb, &result);
            self.update_pf(tb, &result);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `dec dst`: subtract 1 without touching CF.
    pub(crate) fn lower_dec(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;

        let one = tb.immediate(1, value.size());
        let result = tb.temporal(value.size() * 2);

        tb.add(Instruction::sub(&value, &one, &result));

        if self.is_full() {
            self.update_of_sub(tb, &value, &one, &result);
            self.update_sf(tb, &value, &result);
            self.update_zf(tb, &value, &result);
            self.update_af(tb, &result);
            self.update_pf(tb, &result);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `neg dst`: two's complement. CF = (src ≠ 0) in every translation
    /// mode; the remaining flags follow the result in FULL.
    pub(crate) fn lower_neg(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let value = tb.read(operand(insn, 0)?)?;
        let size = value.size();

        let mask = tb.immediate((1i128 << size) - 1, size);
        let one = tb.immediate(1, size);
        let one_bit = tb.immediate(1, 1);

        let inverted = tb.temporal(size);
        let result = tb.temporal(size);
        let is_zero = tb.temporal(1);

        tb.add(Instruction::xor(&value, &mask, &inverted));
        tb.add(Instruction::add(&inverted, &one, &result));

        tb.add(Instruction::bisz(&value, &is_zero));
        tb.add(Instruction::xor(&is_zero, &one_bit, &self.flags.cf));

        if self.is_full() {
            self.update_of_sub(tb, &value, &value, &result);
            self.update_sf(tb, &value, &result);
            self.update_zf(tb, &value, &result);
            self.update_af(tb, &result);
            self.update_pf(tb, &result);
        }

        tb.write(operand(insn, 0)?, &result)
    }

    /// `cmp a, b`: subtraction with the result discarded. The six status
    /// flags are updated in both translation modes.
    pub(crate) fn lower_cmp(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let lhs = tb.read(operand(insn, 0)?)?;
        let rhs = tb.read(operand(insn, 1)?)?;

        let result = tb.temporal(lhs.size() * 2);

        tb.add(Instruction::sub(&lhs, &rhs, &result));

        self.update_cf(tb, &lhs, &result);
        self.update_of_sub(tb, &lhs, &rhs, &result);
        self.update_sf(tb, &lhs, &result);
        self.update_zf(tb, &lhs, &result);
        self.update_af(tb, &result);
        self.update_pf(tb, &result);

        Ok(())
    }
}
