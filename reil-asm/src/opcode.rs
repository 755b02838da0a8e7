use core::fmt;

/// REIL opcode taxonomy.
///
/// The slot conventions for each opcode are fixed:
///
/// | group | op0 | op1 | op2 |
/// |---|---|---|---|
/// | arithmetic / bitwise | source 1 | source 2 | destination register |
/// | `Bsh` | value | shift count (negative = right) | destination register |
/// | `Str` | source | empty | destination register |
/// | `Bisz` | value | empty | destination register |
/// | `Ldm` | source address | empty | destination register |
/// | `Stm` | value | empty | destination address |
/// | `Jcc` | condition | empty | target address |
/// | `Undef` | empty | empty | destination register |
/// | `Nop`, `Unkn`, `Ret` | empty | empty | empty |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    /// Integer addition. The destination may be wider than the sources so
    /// the carry bit stays observable.
    Add,
    /// Bitwise and.
    And,
    /// Boolean "is zero": writes 1 to the destination if the source is 0.
    Bisz,
    /// Bit shift by a variable amount. A positive count shifts left, a
    /// negative count shifts right; this sign convention is part of the IR
    /// contract.
    Bsh,
    /// Unsigned integer division.
    Div,
    /// Conditional jump to a packed REIL address.
    Jcc,
    /// Load from memory.
    Ldm,
    /// Unsigned integer remainder.
    Mod,
    /// Integer multiplication, double-width result.
    Mul,
    /// No operation.
    Nop,
    /// Bitwise or.
    Or,
    /// Return marker; ends the expansion of a `ret`-like instruction.
    Ret,
    /// Store to memory.
    Stm,
    /// Register-to-register copy. Zero-extends when widening, truncates
    /// when narrowing.
    Str,
    /// Integer subtraction.
    Sub,
    /// Marks the destination register as holding an undefined value.
    Undef,
    /// Unknown effect; placeholder for untranslatable instructions.
    Unkn,
    /// Bitwise exclusive or.
    Xor,
}

impl Opcode {
    /// Lowercase REIL mnemonic.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::And => "and",
            Opcode::Bisz => "bisz",
            Opcode::Bsh => "bsh",
            Opcode::Div => "div",
            Opcode::Jcc => "jcc",
            Opcode::Ldm => "ldm",
            Opcode::Mod => "mod",
            Opcode::Mul => "mul",
            Opcode::Nop => "nop",
            Opcode::Or => "or",
            Opcode::Ret => "ret",
            Opcode::Stm => "stm",
            Opcode::Str => "str",
            Opcode::Sub => "sub",
            Opcode::Undef => "undef",
            Opcode::Unkn => "unkn",
            Opcode::Xor => "xor",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
