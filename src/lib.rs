//! x86 → REIL translator.
//!
//! Lowers decoded x86/x86-64 instructions into sequences of REIL micro-ops
//! that make every register read, memory access, flag update, and
//! control-flow transfer explicit. The produced IR is suitable for symbolic
//! execution, taint tracking, and static analysis.

pub mod arch;
pub mod checks;
pub mod error;
pub mod instruction;
pub mod namer;
pub mod translator;

pub mod prelude {
    //! Re-exports of the types needed to drive a translation.

    pub use reil_asm::{Address, Immediate, Instruction, Opcode, Operand, Register, Width};

    pub use crate::arch::ArchitectureMode;
    pub use crate::error::TranslationError;
    pub use crate::instruction::{MemoryOperand, X86Instruction, X86Operand};
    pub use crate::translator::{TranslationMode, Translator};
}
