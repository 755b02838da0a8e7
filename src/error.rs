//! Translator error taxonomy.
//!
//! Only [`TranslationError::UnsupportedMnemonic`] is recovered from (the
//! façade swallows it and emits a single `UNKN` micro-op). Every other
//! variant means the decoder handed over something outside the translation
//! contract, or the translation itself is buggy; those are logged and
//! re-raised rather than papered over with wrong micro-ops.

use reil_asm::{Instruction, Width};
use thiserror::Error;

/// Errors raised while lowering an x86 instruction to REIL.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// No lowering rule exists for the mnemonic. Recovered by the façade.
    #[error("instruction not supported: {0}")]
    UnsupportedMnemonic(String),

    /// An operand kind the lowering cannot consume (e.g. an immediate as a
    /// write destination).
    #[error("unsupported operand kind: {operand}")]
    UnsupportedOperand {
        /// Rendering of the offending operand.
        operand: String,
    },

    /// The lowering expected an operand the decoder did not provide.
    #[error("missing operand {index} for {mnemonic}")]
    MissingOperand {
        /// Mnemonic of the offending instruction.
        mnemonic: String,
        /// Index of the absent operand.
        index: usize,
    },

    /// An operand width outside the implicit-operand tables (not 8, 16, 32,
    /// or 64 bits).
    #[error("invalid operand size: {size}")]
    InvalidOperandSize {
        /// The width that has no table entry.
        size: Width,
    },

    /// A finalized translation still referenced a label that was never
    /// placed. Internal lowering bug.
    #[error("unresolved label: {0}")]
    UnresolvedLabel(&'static str),

    /// The post-translation width check rejected an emitted micro-op.
    /// Internal lowering bug.
    #[error("invalid operand width: {microop}")]
    InvalidOperandWidth {
        /// The offending micro-op.
        microop: Instruction,
    },
}
