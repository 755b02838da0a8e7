//! Per-instruction translation buffer.
//!
//! A buffer is constructed for each input instruction, mutated only by the
//! lowering routine for that instruction's mnemonic, then finalized into a
//! plain micro-op sequence and discarded. Labels are a buffer-internal
//! construct: lowerings that need intra-instruction control flow place
//! marks and pending jumps, and the finalization pass rewrites every
//! pending jump into a `JCC` against the packed address of the micro-op
//! that follows the mark. Labels never appear in the produced IR.

use reil_asm::{Instruction, Operand, Width};

use crate::arch::{self, ArchitectureMode};
use crate::error::TranslationError;
use crate::instruction::{MemoryOperand, X86Operand};
use crate::namer::TempNamer;

/// Handle to an intra-instruction jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    id: usize,
    name: &'static str,
}

enum Entry {
    Op(Instruction),
    Mark(Label),
    PendingJcc { cond: Operand, label: Label },
}

/// Accumulates the micro-op expansion of a single x86 instruction.
pub struct TranslationBuffer<'a> {
    namer: &'a TempNamer,
    mode: ArchitectureMode,
    entries: Vec<Entry>,
    labels: usize,
}

impl<'a> TranslationBuffer<'a> {
    /// Empty buffer drawing temporary names from `namer`.
    pub fn new(namer: &'a TempNamer, mode: ArchitectureMode) -> Self {
        Self {
            namer,
            mode,
            entries: Vec::new(),
            labels: 0,
        }
    }

    /// Architecture mode the buffer lowers for.
    pub const fn mode(&self) -> ArchitectureMode {
        self.mode
    }

    /// Append a micro-op.
    pub fn add(&mut self, microop: Instruction) {
        self.entries.push(Entry::Op(microop));
    }

    /// Allocate a label. The label is dangling until [`mark`](Self::mark)
    /// places it.
    pub fn label(&mut self, name: &'static str) -> Label {
        let id = self.labels;
        self.labels += 1;
        Label { id, name }
    }

    /// Place `label` at the current position; it resolves to the packed
    /// address of the next micro-op appended.
    pub fn mark(&mut self, label: Label) {
        self.entries.push(Entry::Mark(label));
    }

    /// Append a conditional jump to an intra-instruction label.
    pub fn jump<C: Into<Operand>>(&mut self, cond: C, label: Label) {
        self.entries.push(Entry::PendingJcc {
            cond: cond.into(),
            label,
        });
    }

    /// Fresh uniquely-named temporary of the given width.
    pub fn temporal(&self, size: Width) -> Operand {
        Operand::reg(self.namer.next(), size)
    }

    /// Immediate operand. A negative value used as a `BSH` count selects a
    /// right shift.
    pub fn immediate(&self, value: i128, size: Width) -> Operand {
        Operand::imm(value, size)
    }

    /// Lower an x86 operand into an IR operand, emitting the load for
    /// memory operands.
    pub fn read(&mut self, operand: &X86Operand) -> Result<Operand, TranslationError> {
        match operand {
            X86Operand::Immediate { value, size } => Ok(Operand::imm(*value as i128, *size)),
            X86Operand::Register { name, size } => Ok(Operand::reg(name.clone(), *size)),
            X86Operand::Memory(mem) => {
                let addr = self.effective_address(mem);
                let value = self.temporal(mem.size);
                self.add(Instruction::ldm(&addr, &value));
                Ok(value)
            }
        }
    }

    /// Store `value` into an x86 destination operand.
    ///
    /// In 64-bit mode a write to a 32-bit register first clears the 64-bit
    /// parent, making x86's implicit zero-extension explicit. A memory
    /// store whose value width differs from the destination width goes
    /// through a destination-sized temporary first.
    pub fn write<V: Into<Operand>>(
        &mut self,
        operand: &X86Operand,
        value: V,
    ) -> Result<(), TranslationError> {
        let value = value.into();

        match operand {
            X86Operand::Register { name, size } => {
                if self.mode == ArchitectureMode::Bits64 && *size == 32 {
                    if let Some((parent, _)) = arch::register_alias(name) {
                        if let Some(parent_size) = arch::register_size(parent) {
                            let zero = self.immediate(0, parent_size);
                            self.add(Instruction::str(&zero, Operand::reg(parent, parent_size)));
                        }
                    }
                }

                self.add(Instruction::str(&value, Operand::reg(name.clone(), *size)));
                Ok(())
            }
            X86Operand::Memory(mem) => {
                let addr = self.effective_address(mem);

                if value.size() != mem.size {
                    let narrowed = self.temporal(mem.size);
                    self.add(Instruction::str(&value, &narrowed));
                    self.add(Instruction::stm(&narrowed, &addr));
                } else {
                    self.add(Instruction::stm(&value, &addr));
                }
                Ok(())
            }
            X86Operand::Immediate { .. } => Err(TranslationError::UnsupportedOperand {
                operand: operand.to_string(),
            }),
        }
    }

    /// Lower `base + index * scale + displacement` into a width-consistent
    /// chain of address-size temporaries and return the final address
    /// operand.
    pub fn effective_address(&mut self, mem: &MemoryOperand) -> Operand {
        let size = self.mode.address_size();

        let mut addr: Option<Operand> = None;

        if let Some(base) = &mem.base {
            addr = Some(Operand::reg(base.clone(), size));
        }

        if let Some(index) = &mem.index {
            if mem.scale != 0 {
                let index = Operand::reg(index.clone(), size);
                let scale = self.immediate(mem.scale as i128, size);
                let scaled = self.temporal(size);

                self.add(Instruction::mul(&index, &scale, &scaled));

                addr = match addr {
                    Some(base) => {
                        let sum = self.temporal(size);
                        self.add(Instruction::add(&base, &scaled, &sum));
                        Some(sum)
                    }
                    None => Some(scaled),
                };
            }
        }

        if mem.displacement != 0 {
            let disp = self.immediate(mem.displacement as i128, size);

            addr = match addr {
                Some(base) => {
                    let sum = self.temporal(size);
                    self.add(Instruction::add(&base, &disp, &sum));
                    Some(sum)
                }
                None => Some(disp),
            };
        }

        addr.unwrap_or_else(|| self.immediate(0, size))
    }

    /// Resolve labels, assign packed addresses, and return the finished
    /// micro-op sequence.
    pub fn finalize(self, address: u64) -> Result<Vec<Instruction>, TranslationError> {
        let target_size = self.mode.address_size() + 8;

        // A label resolves to the index of the micro-op that follows its
        // mark.
        let mut resolved: Vec<Option<usize>> = vec![None; self.labels];
        let mut index = 0;
        for entry in &self.entries {
            match entry {
                Entry::Mark(label) => resolved[label.id] = Some(index),
                Entry::Op(_) | Entry::PendingJcc { .. } => index += 1,
            }
        }

        debug_assert!(index <= usize::from(u8::MAX) + 1);

        let mut sequence = Vec::with_capacity(index);
        for entry in self.entries {
            let mut microop = match entry {
                Entry::Op(microop) => microop,
                Entry::Mark(_) => continue,
                Entry::PendingJcc { cond, label } => {
                    let target = resolved[label.id]
                        .ok_or(TranslationError::UnresolvedLabel(label.name))?;
                    let packed = ((address as i128) << 8) | target as i128;
                    Instruction::jcc(cond, Operand::imm(packed, target_size))
                }
            };

            microop.locate(address, sequence.len() as u8);
            sequence.push(microop);
        }

        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reil_asm::{unpack, Opcode};

    fn buffer(namer: &TempNamer) -> TranslationBuffer<'_> {
        TranslationBuffer::new(namer, ArchitectureMode::Bits32)
    }

    #[test]
    fn finalize_assigns_sequential_packed_addresses() {
        let namer = TempNamer::new();
        let mut tb = buffer(&namer);

        tb.add(Instruction::nop());
        tb.add(Instruction::nop());
        tb.add(Instruction::nop());

        let seq = tb.finalize(0x400010).unwrap();
        let addresses: Vec<_> = seq.iter().map(|op| unpack(op.address())).collect();
        assert_eq!(
            addresses,
            vec![(0x400010, 0), (0x400010, 1), (0x400010, 2)]
        );
    }

    #[test]
    fn labels_resolve_to_the_following_microop() {
        let namer = TempNamer::new();
        let mut tb = buffer(&namer);

        let head = tb.label("head");
        tb.add(Instruction::nop());
        tb.mark(head);
        tb.add(Instruction::nop());
        tb.jump(Operand::imm(1, 1), head);

        let seq = tb.finalize(0x1000).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[2].opcode(), Opcode::Jcc);

        let Operand::Immediate(target) = seq[2].op2() else {
            panic!("unresolved jump target: {}", seq[2]);
        };
        assert_eq!(target.value(), (0x1000 << 8) | 1);
        assert_eq!(target.size(), 32 + 8);
    }

    #[test]
    fn unplaced_label_is_an_error() {
        let namer = TempNamer::new();
        let mut tb = buffer(&namer);

        let nowhere = tb.label("nowhere");
        tb.jump(Operand::imm(1, 1), nowhere);

        assert!(matches!(
            tb.finalize(0),
            Err(TranslationError::UnresolvedLabel("nowhere"))
        ));
    }

    #[test]
    fn effective_address_chains_terms() {
        let namer = TempNamer::new();
        let mut tb = buffer(&namer);

        let addr = tb.effective_address(&MemoryOperand {
            base: Some("ebx".into()),
            index: Some("esi".into()),
            scale: 4,
            displacement: 8,
            size: 32,
        });

        // index * scale, base + scaled, addr + displacement
        let seq = tb.finalize(0).unwrap();
        assert_eq!(
            seq.iter().map(Instruction::opcode).collect::<Vec<_>>(),
            vec![Opcode::Mul, Opcode::Add, Opcode::Add]
        );
        assert_eq!(addr, *seq[2].op2());
        assert!(seq.iter().all(|op| {
            op.operands()
                .iter()
                .filter(|o| !o.is_empty())
                .all(|o| o.size() == 32)
        }));
    }

    #[test]
    fn effective_address_of_nothing_is_zero() {
        let namer = TempNamer::new();
        let mut tb = buffer(&namer);

        let addr = tb.effective_address(&MemoryOperand {
            base: None,
            index: None,
            scale: 0,
            displacement: 0,
            size: 32,
        });

        assert_eq!(addr, Operand::imm(0, 32));
    }

    #[test]
    fn dword_register_write_in_long_mode_clears_the_parent() {
        let namer = TempNamer::new();
        let mut tb = TranslationBuffer::new(&namer, ArchitectureMode::Bits64);

        tb.write(&X86Operand::reg("eax", 32), Operand::imm(1, 32))
            .unwrap();

        let seq = tb.finalize(0).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(*seq[0].op0(), Operand::imm(0, 64));
        assert_eq!(*seq[0].op2(), Operand::reg("rax", 64));
        assert_eq!(*seq[1].op2(), Operand::reg("eax", 32));
    }

    #[test]
    fn mismatched_memory_store_goes_through_a_temporary() {
        let namer = TempNamer::new();
        let mut tb = buffer(&namer);

        let dst = X86Operand::Memory(MemoryOperand {
            base: Some("ebp".into()),
            index: None,
            scale: 0,
            displacement: -4,
            size: 16,
        });
        tb.write(&dst, Operand::reg("t9", 32)).unwrap();

        let seq = tb.finalize(0).unwrap();
        let opcodes: Vec<_> = seq.iter().map(Instruction::opcode).collect();
        assert_eq!(opcodes, vec![Opcode::Add, Opcode::Str, Opcode::Stm]);
        assert_eq!(seq[1].op2().size(), 16);
    }

    #[test]
    fn immediate_write_destination_is_rejected() {
        let namer = TempNamer::new();
        let mut tb = buffer(&namer);

        let err = tb
            .write(&X86Operand::imm(1, 32), Operand::imm(0, 32))
            .unwrap_err();
        assert!(matches!(err, TranslationError::UnsupportedOperand { .. }));
    }
}
