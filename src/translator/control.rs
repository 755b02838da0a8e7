//! Control-transfer lowerings: `jmp`, the conditional jumps, `call`,
//! `ret`, and the `loop` family.
//!
//! REIL jump targets are packed addresses, i.e. the native address shifted
//! left by the 8-bit sub-instruction index. Immediate targets are packed
//! at translation time; register-indirect targets are zero-extended into a
//! wider temporary and shifted at run time.

use reil_asm::{Immediate, Instruction, Operand, Register};

use super::{operand, TranslationBuffer, Translator};
use crate::error::TranslationError;
use crate::instruction::{X86Instruction, X86Operand};

impl Translator {
    /// Turn a branch operand into a packed REIL target of width
    /// `operand.size() + 8`.
    fn target_address(
        &self,
        tb: &mut TranslationBuffer<'_>,
        target: &Operand,
    ) -> Result<Operand, TranslationError> {
        let size = target.size() + 8;

        match target {
            Operand::Register(_) => {
                let extended = tb.temporal(size);
                let packed = tb.temporal(size);
                let shift = Immediate::new(8, size);

                tb.add(Instruction::str(target, &extended));
                tb.add(Instruction::bsh(&extended, shift, &packed));

                Ok(packed)
            }
            Operand::Immediate(imm) => Ok(Operand::imm(imm.value() << 8, size)),
            Operand::Empty => Err(TranslationError::UnsupportedOperand {
                operand: target.to_string(),
            }),
        }
    }

    /// Packed address of the instruction that follows `insn`; the
    /// fall-through target of the `loop` family.
    fn end_address(&self, insn: &X86Instruction) -> Operand {
        let end = (i128::from(insn.address) + i128::from(insn.size)) << 8;

        Operand::imm(end, self.arch_mode.address_size() + 8)
    }

    /// `jmp target`: an unconditionally-taken `JCC`.
    pub(crate) fn lower_jmp(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let taken = tb.immediate(1, 1);

        tb.add(Instruction::jcc(&taken, &target));

        Ok(())
    }

    /// `ja`/`jnbe`: CF = 0 and ZF = 0.
    pub(crate) fn lower_ja(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let one = tb.immediate(1, 1);

        let no_carry = tb.temporal(1);
        let not_zero = tb.temporal(1);
        let above = tb.temporal(1);

        tb.add(Instruction::xor(&self.flags.cf, &one, &no_carry));
        tb.add(Instruction::xor(&self.flags.zf, &one, &not_zero));
        tb.add(Instruction::and(&no_carry, &not_zero, &above));
        tb.add(Instruction::jcc(&above, &target));

        Ok(())
    }

    /// `jae`: CF = 0.
    pub(crate) fn lower_jae(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let no_carry = tb.temporal(1);

        tb.add(Instruction::bisz(&self.flags.cf, &no_carry));
        tb.add(Instruction::jcc(&no_carry, &target));

        Ok(())
    }

    /// `jb`/`jc`: CF = 1.
    pub(crate) fn lower_jb(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        tb.add(Instruction::jcc(&self.flags.cf, &target));

        Ok(())
    }

    /// `jbe`: CF = 1 or ZF = 1.
    pub(crate) fn lower_jbe(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let below_or_equal = tb.temporal(1);

        tb.add(Instruction::or(
            &self.flags.cf,
            &self.flags.zf,
            &below_or_equal,
        ));
        tb.add(Instruction::jcc(&below_or_equal, &target));

        Ok(())
    }

    /// `je`/`jz`: ZF = 1.
    pub(crate) fn lower_je(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        tb.add(Instruction::jcc(&self.flags.zf, &target));

        Ok(())
    }

    /// `jne`/`jnz`: ZF = 0.
    pub(crate) fn lower_jne(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let one = tb.immediate(1, 1);

        let not_zero = tb.temporal(1);

        tb.add(Instruction::xor(&self.flags.zf, &one, &not_zero));
        tb.add(Instruction::jcc(&not_zero, &target));

        Ok(())
    }

    /// `jnc`: CF = 0, spelled with an inverted carry bit.
    pub(crate) fn lower_jnc(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let one = tb.immediate(1, 1);

        let no_carry = tb.temporal(1);

        tb.add(Instruction::xor(&self.flags.cf, &one, &no_carry));
        tb.add(Instruction::jcc(&no_carry, &target));

        Ok(())
    }

    /// `jg`: ZF = 0 and SF = OF.
    pub(crate) fn lower_jg(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let one = tb.immediate(1, 1);

        let sign_diff = tb.temporal(8);
        let signs_match = tb.temporal(1);
        let not_zero = tb.temporal(1);
        let greater = tb.temporal(1);

        tb.add(Instruction::sub(&self.flags.sf, &self.flags.of, &sign_diff));
        tb.add(Instruction::bisz(&sign_diff, &signs_match));
        tb.add(Instruction::xor(&self.flags.zf, &one, &not_zero));
        tb.add(Instruction::and(&signs_match, &not_zero, &greater));
        tb.add(Instruction::jcc(&greater, &target));

        Ok(())
    }

    /// `jge`: SF = OF.
    pub(crate) fn lower_jge(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let sign_diff = tb.temporal(8);
        let signs_match = tb.temporal(1);

        tb.add(Instruction::sub(&self.flags.sf, &self.flags.of, &sign_diff));
        tb.add(Instruction::bisz(&sign_diff, &signs_match));
        tb.add(Instruction::jcc(&signs_match, &target));

        Ok(())
    }

    /// `jl`: SF ≠ OF.
    pub(crate) fn lower_jl(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let one = tb.immediate(1, 1);

        let sign_diff = tb.temporal(8);
        let signs_match = tb.temporal(1);
        let less = tb.temporal(1);

        tb.add(Instruction::sub(&self.flags.sf, &self.flags.of, &sign_diff));
        tb.add(Instruction::bisz(&sign_diff, &signs_match));
        tb.add(Instruction::xor(&signs_match, &one, &less));
        tb.add(Instruction::jcc(&less, &target));

        Ok(())
    }

    /// `jle`: ZF = 1 or SF ≠ OF.
    pub(crate) fn lower_jle(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let one = tb.immediate(1, 1);

        let sign_diff = tb.temporal(8);
        let signs_match = tb.temporal(1);
        let less = tb.temporal(1);
        let less_or_equal = tb.temporal(1);

        tb.add(Instruction::sub(&self.flags.sf, &self.flags.of, &sign_diff));
        tb.add(Instruction::bisz(&sign_diff, &signs_match));
        tb.add(Instruction::xor(&signs_match, &one, &less));
        tb.add(Instruction::or(&less, &self.flags.zf, &less_or_equal));
        tb.add(Instruction::jcc(&less_or_equal, &target));

        Ok(())
    }

    /// `jo`: OF = 1.
    pub(crate) fn lower_jo(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        tb.add(Instruction::jcc(&self.flags.of, &target));

        Ok(())
    }

    /// `jno`: OF = 0.
    pub(crate) fn lower_jno(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let no_overflow = tb.temporal(1);

        tb.add(Instruction::bisz(&self.flags.of, &no_overflow));
        tb.add(Instruction::jcc(&no_overflow, &target));

        Ok(())
    }

    /// `js`: SF = 1.
    pub(crate) fn lower_js(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        tb.add(Instruction::jcc(&self.flags.sf, &target));

        Ok(())
    }

    /// `jns`: SF = 0.
    pub(crate) fn lower_jns(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let not_sign = tb.temporal(1);

        tb.add(Instruction::bisz(&self.flags.sf, &not_sign));
        tb.add(Instruction::jcc(&not_sign, &target));

        Ok(())
    }

    /// `jecxz`: jump when `ecx` is zero. The 32-bit counter is tested in
    /// both architecture modes.
    pub(crate) fn lower_jecxz(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let counter_zero = tb.temporal(1);
        let counter = Register::new("ecx", 32);

        tb.add(Instruction::bisz(&counter, &counter_zero));
        tb.add(Instruction::jcc(&counter_zero, &target));

        Ok(())
    }

    /// `call target`: push the return address, then jump.
    pub(crate) fn lower_call(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;

        let taken = tb.immediate(1, 1);
        let length = tb.immediate(i128::from(insn.size), self.sp.size());

        let sp = tb.temporal(self.sp.size());
        let return_addr = tb.temporal(self.sp.size());

        tb.add(Instruction::sub(&self.sp, &self.ws, &sp));
        tb.add(Instruction::str(&sp, &self.sp));
        tb.add(Instruction::add(&self.ip, &length, &return_addr));
        tb.add(Instruction::stm(&return_addr, &self.sp));
        tb.add(Instruction::jcc(&taken, &target));

        Ok(())
    }

    /// `ret` / `ret imm`: pop the return address, optionally release an
    /// immediate-sized argument block, and end with `RET`.
    pub(crate) fn lower_ret(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let sp = tb.temporal(self.sp.size());
        let return_addr = tb.temporal(self.sp.size());

        tb.add(Instruction::ldm(&self.sp, &return_addr));
        tb.add(Instruction::add(&self.sp, &self.ws, &sp));
        tb.add(Instruction::str(&sp, &self.sp));

        if let Some(op) = insn.operands.first() {
            let X86Operand::Immediate { value, .. } = op else {
                return Err(TranslationError::UnsupportedOperand {
                    operand: op.to_string(),
                });
            };

            let mask = (1i128 << self.sp.size()) - 1;
            let released = tb.immediate(i128::from(*value) & mask, self.sp.size());

            let adjusted = tb.temporal(self.sp.size());

            tb.add(Instruction::add(&self.sp, &released, &adjusted));
            tb.add(Instruction::str(&adjusted, &self.sp));
        }

        // TODO replace the RET marker with a JCC through the popped
        // address once consumers accept register-indirect packed targets.
        tb.add(Instruction::ret());

        Ok(())
    }

    /// `loop target`: decrement the counter and branch back while it is
    /// non-zero.
    pub(crate) fn lower_loop(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let counter = self.arch_mode.loop_counter();

        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;
        let end = self.end_address(insn);

        let decremented = tb.temporal(counter.size());
        let exit_cond = tb.temporal(1);

        let one = tb.immediate(1, counter.size());

        let stop_looping = tb.label("stop_looping");

        tb.add(Instruction::str(&counter, &decremented));
        tb.add(Instruction::sub(&decremented, &one, &counter));
        tb.add(Instruction::bisz(&counter, &exit_cond));
        tb.jump(&exit_cond, stop_looping);
        tb.add(Instruction::jcc(&one, &target));
        tb.mark(stop_looping);
        tb.add(Instruction::jcc(&one, &end));

        Ok(())
    }

    /// `loope`/`loopz`: loop while the counter is non-zero and ZF = 1.
    pub(crate) fn lower_loope(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let counter = self.arch_mode.loop_counter();

        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;
        let end = self.end_address(insn);

        let decremented = tb.temporal(counter.size());

        let counter_zero = tb.temporal(1);
        let counter_not_zero = tb.temporal(1);
        let zf_zero = tb.temporal(1);
        let zf_not_zero = tb.temporal(1);
        let branch_cond = tb.temporal(1);

        let one = tb.immediate(1, counter.size());
        let one_bit = tb.immediate(1, 1);

        let keep_looping = tb.label("keep_looping");

        tb.add(Instruction::str(&counter, &decremented));
        tb.add(Instruction::sub(&decremented, &one, &counter));
        tb.add(Instruction::bisz(&counter, &counter_zero));
        tb.add(Instruction::bisz(&self.flags.zf, &zf_zero));
        tb.add(Instruction::xor(&zf_zero, &one_bit, &zf_not_zero));
        tb.add(Instruction::xor(&counter_zero, &one_bit, &counter_not_zero));
        tb.add(Instruction::and(&counter_not_zero, &zf_not_zero, &branch_cond));
        tb.jump(&branch_cond, keep_looping);
        tb.add(Instruction::jcc(&one, &end));
        tb.mark(keep_looping);
        tb.add(Instruction::jcc(&one, &target));

        Ok(())
    }

    /// `loopne`/`loopnz`: loop while the counter is non-zero and ZF = 0.
    pub(crate) fn lower_loopne(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        let counter = self.arch_mode.loop_counter();

        let target = tb.read(operand(insn, 0)?)?;
        let target = self.target_address(tb, &target)?;
        let end = self.end_address(insn);

        let decremented = tb.temporal(counter.size());

        let counter_zero = tb.temporal(1);
        let counter_not_zero = tb.temporal(1);
        let zf_zero = tb.temporal(1);
        let branch_cond = tb.temporal(1);

        let one = tb.immediate(1, counter.size());
        let one_bit = tb.immediate(1, 1);

        let keep_looping = tb.label("keep_looping");

        tb.add(Instruction::str(&counter, &decremented));
        tb.add(Instruction::sub(&decremented, &one, &counter));
        tb.add(Instruction::bisz(&counter, &counter_zero));
        tb.add(Instruction::bisz(&self.flags.zf, &zf_zero));
        tb.add(Instruction::xor(&counter_zero, &one_bit, &counter_not_zero));
        tb.add(Instruction::and(&counter_not_zero, &zf_zero, &branch_cond));
        tb.jump(&branch_cond, keep_looping);
        tb.add(Instruction::jcc(&one, &end));
        tb.mark(keep_looping);
        tb.add(Instruction::jcc(&one, &target));

        Ok(())
    }
}
