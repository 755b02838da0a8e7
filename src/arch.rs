//! Architecture description tables: register widths, sub-register aliasing,
//! and the per-mode pointer/stack/counter bindings.

use reil_asm::{Register, Width};

/// x86 operating mode of the translator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchitectureMode {
    /// 32-bit protected mode.
    #[default]
    Bits32,
    /// 64-bit long mode.
    Bits64,
}

impl ArchitectureMode {
    /// Width of an address, in bits. Equal to the architecture size.
    pub const fn address_size(&self) -> Width {
        match self {
            ArchitectureMode::Bits32 => 32,
            ArchitectureMode::Bits64 => 64,
        }
    }

    /// Bytes moved by an implicit stack push or pop.
    pub const fn word_size(&self) -> i128 {
        match self {
            ArchitectureMode::Bits32 => 4,
            ArchitectureMode::Bits64 => 8,
        }
    }

    /// Stack pointer register for this mode.
    pub fn stack_pointer(&self) -> Register {
        match self {
            ArchitectureMode::Bits32 => Register::new("esp", 32),
            ArchitectureMode::Bits64 => Register::new("rsp", 64),
        }
    }

    /// Frame base pointer register for this mode.
    pub fn base_pointer(&self) -> Register {
        match self {
            ArchitectureMode::Bits32 => Register::new("ebp", 32),
            ArchitectureMode::Bits64 => Register::new("rbp", 64),
        }
    }

    /// Instruction pointer register for this mode.
    pub fn instruction_pointer(&self) -> Register {
        match self {
            ArchitectureMode::Bits32 => Register::new("eip", 32),
            ArchitectureMode::Bits64 => Register::new("rip", 64),
        }
    }

    /// Counter register used by the `loop` family.
    pub fn loop_counter(&self) -> Register {
        match self {
            ArchitectureMode::Bits32 => Register::new("ecx", 32),
            ArchitectureMode::Bits64 => Register::new("rcx", 64),
        }
    }
}

/// Width in bits of an architectural register, by canonical lowercase name.
pub fn register_size(name: &str) -> Option<Width> {
    let size = match name {
        // 64-bit general purpose
        "rax" | "rbx" | "rcx" | "rdx" | "rdi" | "rsi" | "rbp" | "rsp" | "r8" | "r9" | "r10"
        | "r11" | "r12" | "r13" | "r14" | "r15" | "rip" => 64,
        // 32-bit general purpose
        "eax" | "ebx" | "ecx" | "edx" | "edi" | "esi" | "ebp" | "esp" | "r8d" | "r9d" | "r10d"
        | "r11d" | "r12d" | "r13d" | "r14d" | "r15d" | "eip" => 32,
        // 16-bit general purpose
        "ax" | "bx" | "cx" | "dx" | "di" | "si" | "bp" | "sp" | "r8w" | "r9w" | "r10w" | "r11w"
        | "r12w" | "r13w" | "r14w" | "r15w" => 16,
        // 8-bit general purpose
        "al" | "bl" | "cl" | "dl" | "ah" | "bh" | "ch" | "dh" | "dil" | "sil" | "bpl" | "spl"
        | "r8b" | "r9b" | "r10b" | "r11b" | "r12b" | "r13b" | "r14b" | "r15b" => 8,
        // flags
        "af" | "cf" | "df" | "of" | "pf" | "sf" | "zf" => 1,
        _ => return None,
    };

    Some(size)
}

/// 64-bit parent register and bit offset of a sub-register.
///
/// The translation buffer consults this for the long-mode zero-extension
/// rule: a write to a 32-bit register clears the full 64-bit parent first.
pub fn register_alias(name: &str) -> Option<(&'static str, Width)> {
    let (parent, offset) = match name {
        "eax" | "ax" | "al" => ("rax", 0),
        "ah" => ("rax", 8),
        "ebx" | "bx" | "bl" => ("rbx", 0),
        "bh" => ("rbx", 8),
        "ecx" | "cx" | "cl" => ("rcx", 0),
        "ch" => ("rcx", 8),
        "edx" | "dx" | "dl" => ("rdx", 0),
        "dh" => ("rdx", 8),
        "edi" | "di" | "dil" => ("rdi", 0),
        "esi" | "si" | "sil" => ("rsi", 0),
        "ebp" | "bp" | "bpl" => ("rbp", 0),
        "esp" | "sp" | "spl" => ("rsp", 0),
        "r8d" | "r8w" | "r8b" => ("r8", 0),
        "r9d" | "r9w" | "r9b" => ("r9", 0),
        "r10d" | "r10w" | "r10b" => ("r10", 0),
        "r11d" | "r11w" | "r11b" => ("r11", 0),
        "r12d" | "r12w" | "r12b" => ("r12", 0),
        "r13d" | "r13w" | "r13b" => ("r13", 0),
        "r14d" | "r14w" | "r14b" => ("r14", 0),
        "r15d" | "r15w" | "r15b" => ("r15", 0),
        "eip" => ("rip", 0),
        _ => return None,
    };

    Some((parent, offset))
}
