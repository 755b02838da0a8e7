//! x86 → REIL translation engine.
//!
//! [`Translator`] is the long-lived façade: it owns the architecture and
//! translation modes, the flag-register handles, the stack/base/instruction
//! pointer bindings, and the temporary namer. Each call to
//! [`translate`](Translator::translate) builds a fresh
//! [`TranslationBuffer`], runs the lowering for the instruction's mnemonic,
//! finalizes the buffer, and width-checks the result.
//!
//! The namer mutates monotonically across calls, so a translator is meant
//! to be confined to one thread; independent translators can run
//! concurrently.

use itertools::Itertools;
use reil_asm::{Immediate, Instruction, Register};
use tracing::{error, info};

use crate::arch::ArchitectureMode;
use crate::checks::check_operand_sizes;
use crate::error::TranslationError;
use crate::instruction::{X86Instruction, X86Operand};
use crate::namer::TempNamer;

mod arith;
mod bitbyte;
mod buffer;
mod control;
mod flagctl;
mod flags;
mod logic;
mod misc;
mod shift;
mod transfer;

pub use buffer::{Label, TranslationBuffer};

/// Translation completeness mode.
///
/// The modes differ only in the emission of result-dependent flag
/// micro-programs: LITE drops them, keeping translations short for
/// consumers that track no flag state. Flags that are part of an
/// instruction's semantic result (the CF produced by `neg` or a shift, the
/// full flag set of `cmp` and `test`) are emitted in both modes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TranslationMode {
    /// Emit every flag update.
    #[default]
    Full,
    /// Skip result-dependent flag updates.
    Lite,
}

/// Single-bit flag register handles, shared by every lowering.
#[derive(Debug)]
pub(crate) struct FlagRegisters {
    pub af: Register,
    pub cf: Register,
    pub df: Register,
    pub of: Register,
    pub pf: Register,
    pub sf: Register,
    pub zf: Register,
}

impl FlagRegisters {
    fn new() -> Self {
        Self {
            af: Register::new("af", 1),
            cf: Register::new("cf", 1),
            df: Register::new("df", 1),
            of: Register::new("of", 1),
            pf: Register::new("pf", 1),
            sf: Register::new("sf", 1),
            zf: Register::new("zf", 1),
        }
    }
}

/// x86 → REIL translator façade.
#[derive(Debug)]
pub struct Translator {
    arch_mode: ArchitectureMode,
    translation_mode: TranslationMode,
    namer: TempNamer,
    flags: FlagRegisters,
    sp: Register,
    bp: Register,
    ip: Register,
    ws: Immediate,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(ArchitectureMode::default(), TranslationMode::default())
    }
}

impl Translator {
    /// Translator for the given architecture and translation modes.
    pub fn new(arch_mode: ArchitectureMode, translation_mode: TranslationMode) -> Self {
        Self {
            sp: arch_mode.stack_pointer(),
            bp: arch_mode.base_pointer(),
            ip: arch_mode.instruction_pointer(),
            ws: Immediate::new(arch_mode.word_size(), arch_mode.address_size()),
            namer: TempNamer::new(),
            flags: FlagRegisters::new(),
            arch_mode,
            translation_mode,
        }
    }

    /// Architecture mode this translator lowers for.
    pub const fn architecture_mode(&self) -> ArchitectureMode {
        self.arch_mode
    }

    /// Current translation mode.
    pub const fn translation_mode(&self) -> TranslationMode {
        self.translation_mode
    }

    /// Switch between FULL and LITE translation.
    pub fn set_translation_mode(&mut self, mode: TranslationMode) {
        self.translation_mode = mode;
    }

    /// Restart the temporary name sequence. Translating the same
    /// instruction after equivalent resets yields identical output.
    pub fn reset(&self) {
        self.namer.reset();
    }

    pub(crate) fn is_full(&self) -> bool {
        self.translation_mode == TranslationMode::Full
    }

    /// Lower one decoded instruction into its REIL micro-op sequence.
    ///
    /// A mnemonic with no lowering rule produces a single `UNKN` micro-op
    /// and succeeds; any other failure is logged with the instruction
    /// bytes and propagated.
    pub fn translate(
        &self,
        instruction: &X86Instruction,
    ) -> Result<Vec<Instruction>, TranslationError> {
        let translated = match self.lower_instruction(instruction) {
            Ok(sequence) => sequence,
            Err(TranslationError::UnsupportedMnemonic(mnemonic)) => {
                info!(
                    %mnemonic,
                    instruction = %instruction,
                    bytes = %hex_bytes(&instruction.bytes),
                    "instruction not supported"
                );

                vec![Instruction::unkn()]
            }
            Err(err) => {
                error!(
                    instruction = %instruction,
                    bytes = %hex_bytes(&instruction.bytes),
                    %err,
                    "failed to translate x86 to REIL"
                );

                return Err(err);
            }
        };

        for microop in &translated {
            if let Err(err) = check_operand_sizes(microop, self.arch_mode.address_size()) {
                error!(microop = %microop, instruction = %instruction, "invalid operand size");

                return Err(err);
            }
        }

        Ok(translated)
    }

    fn lower_instruction(
        &self,
        instruction: &X86Instruction,
    ) -> Result<Vec<Instruction>, TranslationError> {
        let mut tb = TranslationBuffer::new(&self.namer, self.arch_mode);

        self.lower(&mut tb, instruction)?;

        tb.finalize(instruction.address)
    }

    fn lower(
        &self,
        tb: &mut TranslationBuffer<'_>,
        insn: &X86Instruction,
    ) -> Result<(), TranslationError> {
        match insn.mnemonic.as_str() {
            // Data transfer
            "mov" => self.lower_mov(tb, insn),
            "movzx" => self.lower_movzx(tb, insn),
            "xchg" => self.lower_xchg(tb, insn),
            "push" => self.lower_push(tb, insn),
            "pop" => self.lower_pop(tb, insn),

            // Binary arithmetic
            "add" => self.lower_add(tb, insn),
            "adc" => self.lower_adc(tb, insn),
            "sub" => self.lower_sub(tb, insn),
            "sbb" => self.lower_sbb(tb, insn),
            "mul" => self.lower_mul(tb, insn),
            "imul" => self.lower_imul(tb, insn),
            "div" => self.lower_div(tb, insn),
            "inc" => self.lower_inc(tb, insn),
            "dec" => self.lower_dec(tb, insn),
            "neg" => self.lower_neg(tb, insn),
            "cmp" => self.lower_cmp(tb, insn),

            // Logical
            "and" => self.lower_and(tb, insn),
            "or" => self.lower_or(tb, insn),
            "xor" => self.lower_xor(tb, insn),
            "not" => self.lower_not(tb, insn),

            // Shifts and rotates
            "shr" => self.lower_shr(tb, insn),
            "shl" | "sal" => self.lower_shl(tb, insn),
            "sar" => self.lower_sar(tb, insn),
            "rol" => self.lower_rol(tb, insn),
            "ror" => self.lower_ror(tb, insn),
            "rcl" => self.lower_rcl(tb, insn),
            "rcr" => self.lower_rcr(tb, insn),

            // Bit and byte
            "test" => self.lower_test(tb, insn),
            "sete" => self.lower_sete(tb, insn),
            "setne" => self.lower_setne(tb, insn),
            "setb" => self.lower_setb(tb, insn),
            "setbe" => self.lower_setbe(tb, insn),
            "setae" => self.lower_setae(tb, insn),
            "setg" => self.lower_setg(tb, insn),

            // Control transfer
            "jmp" => self.lower_jmp(tb, insn),
            "ja" | "jnbe" => self.lower_ja(tb, insn),
            "jae" => self.lower_jae(tb, insn),
            "jb" | "jc" => self.lower_jb(tb, insn),
            "jbe" => self.lower_jbe(tb, insn),
            "je" | "jz" => self.lower_je(tb, insn),
            "jne" | "jnz" => self.lower_jne(tb, insn),
            "jnc" => self.lower_jnc(tb, insn),
            "jg" => self.lower_jg(tb, insn),
            "jge" => self.lower_jge(tb, insn),
            "jl" => self.lower_jl(tb, insn),
            "jle" => self.lower_jle(tb, insn),
            "jo" => self.lower_jo(tb, insn),
            "jno" => self.lower_jno(tb, insn),
            "js" => self.lower_js(tb, insn),
            "jns" => self.lower_jns(tb, insn),
            "jecxz" => self.lower_jecxz(tb, insn),
            "call" => self.lower_call(tb, insn),
            "ret" => self.lower_ret(tb, insn),
            "loop" => self.lower_loop(tb, insn),
            "loope" | "loopz" => self.lower_loope(tb, insn),
            "loopne" | "loopnz" => self.lower_loopne(tb, insn),

            // Flag control
            "cld" => self.lower_cld(tb, insn),
            "clc" => self.lower_clc(tb, insn),
            "stc" => self.lower_stc(tb, insn),
            "std" => self.lower_std(tb, insn),

            // Enter/leave and miscellaneous
            "leave" => self.lower_leave(tb, insn),
            "lea" => self.lower_lea(tb, insn),
            "nop" => self.lower_nop(tb, insn),
            "hlt" => self.lower_hlt(tb, insn),

            other => Err(TranslationError::UnsupportedMnemonic(other.to_string())),
        }
    }
}

/// Fetch the `index`-th explicit operand or fail the lowering.
pub(crate) fn operand<'i>(
    insn: &'i X86Instruction,
    index: usize,
) -> Result<&'i X86Operand, TranslationError> {
    insn.operands
        .get(index)
        .ok_or_else(|| TranslationError::MissingOperand {
            mnemonic: insn.mnemonic.clone(),
            index,
        })
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).join(" ")
}
