//! Decoder-facing x86 instruction model.
//!
//! The decoder itself lives outside this crate; these types are the contract
//! it fulfills. Register names are canonical lowercase (`rax`, `eax`, `ax`,
//! `al`, ..., flag names `af cf df of pf sf zf`).

use core::fmt;

use reil_asm::Width;

/// A memory operand: `base + index * scale + displacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryOperand {
    /// Base register, if any.
    pub base: Option<String>,
    /// Index register, if any.
    pub index: Option<String>,
    /// Scale applied to the index; a zero scale disables the index term.
    pub scale: u64,
    /// Constant displacement.
    pub displacement: i64,
    /// Width of the access, in bits.
    pub size: Width,
}

impl fmt::Display for MemoryOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;

        write!(f, "[")?;
        if let Some(base) = &self.base {
            write!(f, "{base}")?;
            wrote = true;
        }
        if let Some(index) = &self.index {
            if self.scale != 0 {
                if wrote {
                    write!(f, "+")?;
                }
                write!(f, "{index}*{}", self.scale)?;
                wrote = true;
            }
        }
        if self.displacement != 0 || !wrote {
            if self.displacement < 0 {
                write!(f, "-{:#x}", self.displacement.unsigned_abs())?;
            } else if wrote {
                write!(f, "+{:#x}", self.displacement)?;
            } else {
                write!(f, "{:#x}", self.displacement)?;
            }
        }
        write!(f, "]")
    }
}

/// An operand of a decoded x86 instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum X86Operand {
    /// Immediate value.
    Immediate {
        /// Operand value.
        value: u64,
        /// Width in bits.
        size: Width,
    },
    /// Architectural register.
    Register {
        /// Canonical lowercase register name.
        name: String,
        /// Width in bits.
        size: Width,
    },
    /// Memory access.
    Memory(MemoryOperand),
}

impl X86Operand {
    /// Shorthand for an immediate operand.
    pub const fn imm(value: u64, size: Width) -> Self {
        X86Operand::Immediate { value, size }
    }

    /// Shorthand for a register operand.
    pub fn reg<N: Into<String>>(name: N, size: Width) -> Self {
        X86Operand::Register {
            name: name.into(),
            size,
        }
    }

    /// Operand width in bits.
    pub fn size(&self) -> Width {
        match self {
            X86Operand::Immediate { size, .. } => *size,
            X86Operand::Register { size, .. } => *size,
            X86Operand::Memory(mem) => mem.size,
        }
    }
}

impl fmt::Display for X86Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            X86Operand::Immediate { value, .. } => write!(f, "{value:#x}"),
            X86Operand::Register { name, .. } => write!(f, "{name}"),
            X86Operand::Memory(mem) => mem.fmt(f),
        }
    }
}

/// A decoded x86 instruction, as handed over by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct X86Instruction {
    /// Lowercase mnemonic, prefix-free (`mov`, `add`, `jne`, ...).
    pub mnemonic: String,
    /// Explicit operands, destination first.
    pub operands: Vec<X86Operand>,
    /// Native address of the instruction.
    pub address: u64,
    /// Encoded length in bytes.
    pub size: u64,
    /// Raw instruction bytes.
    pub bytes: Vec<u8>,
}

impl X86Instruction {
    /// Build an instruction record.
    pub fn new<M: Into<String>>(
        mnemonic: M,
        operands: Vec<X86Operand>,
        address: u64,
        size: u64,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            operands,
            address,
            size,
            bytes,
        }
    }
}

impl fmt::Display for X86Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.address, self.mnemonic)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {operand}")?;
            } else {
                write!(f, ", {operand}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_operands_in_order() {
        let insn = X86Instruction::new(
            "mov",
            vec![X86Operand::reg("eax", 32), X86Operand::imm(0x12345678, 32)],
            0x400000,
            5,
            vec![0xb8, 0x78, 0x56, 0x34, 0x12],
        );
        assert_eq!(insn.to_string(), "0x400000: mov eax, 0x12345678");
    }

    #[test]
    fn memory_operand_display() {
        let mem = MemoryOperand {
            base: Some("ebx".into()),
            index: Some("esi".into()),
            scale: 4,
            displacement: -8,
            size: 32,
        };
        assert_eq!(mem.to_string(), "[ebx+esi*4-0x8]");

        let absolute = MemoryOperand {
            base: None,
            index: None,
            scale: 0,
            displacement: 0x601040,
            size: 32,
        };
        assert_eq!(absolute.to_string(), "[0x601040]");
    }
}
