//! Post-translation operand-size validator.
//!
//! Lowerings are trusted to emit width-consistent micro-ops; this pass is
//! the backstop that turns a width bug into a loud failure instead of a
//! silently wrong IR stream.

use reil_asm::{Instruction, Opcode, Width};

use crate::error::TranslationError;

/// Check one emitted micro-op against the per-opcode width rules.
pub fn check_operand_sizes(
    microop: &Instruction,
    arch_size: Width,
) -> Result<(), TranslationError> {
    let ok = match microop.opcode() {
        // op0: source 1, op1: source 2, op2: destination register.
        // Sources must agree in width; the destination may be wider so
        // carries and remainders stay representable.
        Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Div
        | Opcode::Mod
        | Opcode::And
        | Opcode::Or
        | Opcode::Xor => microop.op0().size() == microop.op1().size(),

        // op0: source address. Addresses are always architecture-sized.
        Opcode::Ldm => microop.op0().size() == arch_size,

        // op2: destination address.
        Opcode::Stm => microop.op2().size() == arch_size,

        // op2 should be arch_size + 8 (packed target); the assertion stays
        // disabled for parity with the original translator.
        // FIXME enable once every producer is audited.
        Opcode::Jcc => true,

        Opcode::Bsh
        | Opcode::Str
        | Opcode::Bisz
        | Opcode::Undef
        | Opcode::Unkn
        | Opcode::Nop
        | Opcode::Ret => true,
    };

    if ok {
        Ok(())
    } else {
        Err(TranslationError::InvalidOperandWidth {
            microop: microop.clone(),
        })
    }
}
