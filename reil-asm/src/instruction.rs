use core::fmt;

use crate::{pack, Address, Opcode, Operand};

/// A REIL micro-op: an opcode, exactly three operand slots, and a packed
/// address.
///
/// The associated constructors are the only way well-formed micro-ops are
/// built; they fill the unused slots with [`Operand::Empty`] according to
/// the slot conventions documented on [`Opcode`]. The address is assigned
/// by the owning translation buffer when a translation is finalized and is
/// zero until then.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    opcode: Opcode,
    operands: [Operand; 3],
    address: Address,
}

macro_rules! ternary_op {
    ($(#[$doc:meta])* $name:ident, $opcode:expr) => {
        $(#[$doc])*
        pub fn $name<A, B, C>(src1: A, src2: B, dst: C) -> Self
        where
            A: Into<Operand>,
            B: Into<Operand>,
            C: Into<Operand>,
        {
            Self::new($opcode, [src1.into(), src2.into(), dst.into()])
        }
    };
}

impl Instruction {
    fn new(opcode: Opcode, operands: [Operand; 3]) -> Self {
        Self {
            opcode,
            operands,
            address: 0,
        }
    }

    ternary_op!(
        /// `dst <- src1 + src2`.
        add,
        Opcode::Add
    );
    ternary_op!(
        /// `dst <- src1 - src2`.
        sub,
        Opcode::Sub
    );
    ternary_op!(
        /// `dst <- src1 * src2`.
        mul,
        Opcode::Mul
    );
    ternary_op!(
        /// `dst <- src1 / src2` (unsigned).
        div,
        Opcode::Div
    );
    ternary_op!(
        /// `dst <- src1 % src2` (unsigned).
        modulo,
        Opcode::Mod
    );
    ternary_op!(
        /// `dst <- src1 & src2`.
        and,
        Opcode::And
    );
    ternary_op!(
        /// `dst <- src1 | src2`.
        or,
        Opcode::Or
    );
    ternary_op!(
        /// `dst <- src1 ^ src2`.
        xor,
        Opcode::Xor
    );
    ternary_op!(
        /// `dst <- src1 << count` for a positive count, `src1 >> -count`
        /// for a negative one.
        bsh,
        Opcode::Bsh
    );

    /// `dst <- src`, zero-extending or truncating to the destination width.
    pub fn str<A, C>(src: A, dst: C) -> Self
    where
        A: Into<Operand>,
        C: Into<Operand>,
    {
        Self::new(Opcode::Str, [src.into(), Operand::Empty, dst.into()])
    }

    /// `dst <- (src == 0) ? 1 : 0`.
    pub fn bisz<A, C>(src: A, dst: C) -> Self
    where
        A: Into<Operand>,
        C: Into<Operand>,
    {
        Self::new(Opcode::Bisz, [src.into(), Operand::Empty, dst.into()])
    }

    /// `dst <- memory[addr]`, reading `dst.size` bits.
    pub fn ldm<A, C>(addr: A, dst: C) -> Self
    where
        A: Into<Operand>,
        C: Into<Operand>,
    {
        Self::new(Opcode::Ldm, [addr.into(), Operand::Empty, dst.into()])
    }

    /// `memory[addr] <- value`, writing `value.size` bits.
    pub fn stm<A, C>(value: A, addr: C) -> Self
    where
        A: Into<Operand>,
        C: Into<Operand>,
    {
        Self::new(Opcode::Stm, [value.into(), Operand::Empty, addr.into()])
    }

    /// Jump to the packed address `target` when `cond` is non-zero.
    pub fn jcc<A, C>(cond: A, target: C) -> Self
    where
        A: Into<Operand>,
        C: Into<Operand>,
    {
        Self::new(Opcode::Jcc, [cond.into(), Operand::Empty, target.into()])
    }

    /// Mark `dst` as holding an undefined value.
    pub fn undef<C: Into<Operand>>(dst: C) -> Self {
        Self::new(Opcode::Undef, [Operand::Empty, Operand::Empty, dst.into()])
    }

    /// No operation.
    pub fn nop() -> Self {
        Self::new(Opcode::Nop, [Operand::Empty, Operand::Empty, Operand::Empty])
    }

    /// Unknown effect.
    pub fn unkn() -> Self {
        Self::new(Opcode::Unkn, [Operand::Empty, Operand::Empty, Operand::Empty])
    }

    /// Return marker.
    pub fn ret() -> Self {
        Self::new(Opcode::Ret, [Operand::Empty, Operand::Empty, Operand::Empty])
    }

    /// Opcode of this micro-op.
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The three operand slots.
    pub const fn operands(&self) -> &[Operand; 3] {
        &self.operands
    }

    /// First operand slot.
    pub const fn op0(&self) -> &Operand {
        &self.operands[0]
    }

    /// Second operand slot.
    pub const fn op1(&self) -> &Operand {
        &self.operands[1]
    }

    /// Third operand slot.
    pub const fn op2(&self) -> &Operand {
        &self.operands[2]
    }

    /// Packed address of this micro-op.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Assign the packed address `(native << 8) | index`.
    pub fn locate(&mut self, native: u64, index: u8) {
        self.address = pack(native, index);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (native, index) = crate::unpack(self.address);
        write!(
            f,
            "{native:08x}.{index:02x}: {:<5} [{}, {}, {}]",
            self.opcode, self.operands[0], self.operands[1], self.operands[2]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_fill_unused_slots() {
        let op = Instruction::str(Operand::imm(0, 64), Operand::reg("rax", 64));
        assert_eq!(op.opcode(), Opcode::Str);
        assert!(op.op1().is_empty());
        assert!(!op.op2().is_empty());

        let op = Instruction::undef(Operand::reg("of", 1));
        assert!(op.op0().is_empty() && op.op1().is_empty());
        assert_eq!(*op.op2(), Operand::reg("of", 1));

        let op = Instruction::nop();
        assert!(op.operands().iter().all(Operand::is_empty));
    }

    #[test]
    fn locate_packs_the_address() {
        let mut op = Instruction::add(
            Operand::reg("eax", 32),
            Operand::imm(1, 32),
            Operand::reg("t0", 64),
        );
        assert_eq!(op.address(), 0);

        op.locate(0x400010, 3);
        assert_eq!(op.address(), (0x400010 << 8) | 3);
    }

    #[test]
    fn display_lists_all_slots() {
        let mut op = Instruction::jcc(Operand::imm(1, 1), Operand::imm(0x400100 << 8, 40));
        op.locate(0x4000f0, 1);
        assert_eq!(op.to_string(), "004000f0.01: jcc   [0x1:1, empty, 0x40010000:40]");
    }
}
