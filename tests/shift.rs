use reil_x86::prelude::*;

fn reg(name: &str, size: Width) -> X86Operand {
    X86Operand::reg(name, size)
}

fn imm(value: u64, size: Width) -> X86Operand {
    X86Operand::imm(value, size)
}

fn insn(mnemonic: &str, operands: Vec<X86Operand>) -> X86Instruction {
    X86Instruction::new(mnemonic, operands, 0x400000, 3, vec![0xc1, 0xe0, 0x04])
}

#[test]
fn sar_expands_into_an_intra_instruction_loop() {
    let translator = Translator::default();

    let ops = translator
        .translate(&insn("sar", vec![reg("eax", 32), reg("cl", 8)]))
        .unwrap();

    // A resolved backward edge: some JCC targets an earlier micro-op of
    // this same instruction.
    let back_edge = ops
        .iter()
        .enumerate()
        .find_map(|(index, op)| match (op.opcode(), op.op2()) {
            (Opcode::Jcc, Operand::Immediate(target)) => {
                let value = target.value() as u64;
                (value >> 8 == 0x400000 && (value & 0xff) < index as u64).then_some(value)
            }
            _ => None,
        });
    assert!(back_edge.is_some(), "no backward edge found");

    // CF is written inside the loop.
    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::Str && *op.op2() == Operand::reg("cf", 1)));

    // The final micro-op writes the shifted value back.
    let last = ops.last().unwrap();
    assert_eq!(last.opcode(), Opcode::Str);
    assert_eq!(*last.op2(), Operand::reg("eax", 32));
}

#[test]
fn sar_reinjects_the_preserved_sign_bit() {
    let translator = Translator::new(ArchitectureMode::Bits32, TranslationMode::Lite);

    let ops = translator
        .translate(&insn("sar", vec![reg("eax", 32), imm(3, 8)]))
        .unwrap();

    // Sign bit filtered out front...
    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::And && *op.op1() == Operand::imm(0x8000_0000, 32)));

    // ...and or-ed back after every single-bit shift.
    let shift = ops
        .iter()
        .position(|op| op.opcode() == Opcode::Bsh && *op.op1() == Operand::imm(-1, 32))
        .expect("single-bit shift not found");
    assert_eq!(ops[shift + 1].opcode(), Opcode::Or);
}

#[test]
fn shl_and_sal_lower_identically() {
    let shl = Translator::default();
    let sal = Translator::default();

    let shl_ops = shl
        .translate(&insn("shl", vec![reg("eax", 32), imm(4, 8)]))
        .unwrap();
    let sal_ops = sal
        .translate(&insn("sal", vec![reg("eax", 32), imm(4, 8)]))
        .unwrap();

    assert_eq!(shl_ops, sal_ops);
}

#[test]
fn shr_saves_the_last_bit_out_in_cf() {
    let translator = Translator::new(ArchitectureMode::Bits32, TranslationMode::Lite);

    let ops = translator
        .translate(&insn("shr", vec![reg("eax", 32), reg("cl", 8)]))
        .unwrap();

    // Shift by count-1, pick the LSB into CF, then shift once more.
    let save = ops
        .iter()
        .position(|op| op.opcode() == Opcode::Str && *op.op2() == Operand::reg("cf", 1))
        .expect("CF write not found");
    assert_eq!(ops[save - 1].opcode(), Opcode::And);
    assert_eq!(ops[save + 1].opcode(), Opcode::Bsh);
    assert_eq!(*ops[save + 1].op1(), Operand::imm(-1, 32));

    // CF still emitted in LITE: it is part of the shift's result.
    assert!(save > 0);
}

#[test]
fn rotate_counts_are_masked_per_mode() {
    let narrow = Translator::default();
    let wide = Translator::new(ArchitectureMode::Bits64, TranslationMode::Full);

    let narrow_ops = narrow
        .translate(&insn("rol", vec![reg("eax", 32), reg("cl", 8)]))
        .unwrap();
    let wide_ops = wide
        .translate(&insn("rol", vec![reg("rax", 64), reg("cl", 8)]))
        .unwrap();

    assert!(narrow_ops
        .iter()
        .any(|op| op.opcode() == Opcode::And && *op.op1() == Operand::imm(0x1f, 32)));
    assert!(wide_ops
        .iter()
        .any(|op| op.opcode() == Opcode::And && *op.op1() == Operand::imm(0x3f, 64)));
}

#[test]
fn rol_reduces_the_count_mod_width() {
    let translator = Translator::default();

    let ops = translator
        .translate(&insn("rol", vec![reg("eax", 32), reg("cl", 8)]))
        .unwrap();

    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::Mod && *op.op1() == Operand::imm(32, 32)));
}

#[test]
fn rol_computes_of_then_always_undefines_it() {
    let translator = Translator::default();

    let ops = translator
        .translate(&insn("rol", vec![reg("eax", 32), imm(1, 8)]))
        .unwrap();

    let of_writes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter_map(|(index, op)| (*op.op2() == Operand::reg("of", 1)).then_some(index))
        .collect();

    // One computed value, then the unconditional undefine at the join.
    assert_eq!(of_writes.len(), 2);
    assert_eq!(ops[of_writes[0]].opcode(), Opcode::Xor);
    assert_eq!(ops[of_writes[1]].opcode(), Opcode::Str);
    assert_eq!(*ops[of_writes[1]].op0(), Operand::imm(0, 1));

    // The skip edge jumps straight to the undefine.
    let skip = ops
        .iter()
        .find_map(|op| match (op.opcode(), op.op2()) {
            (Opcode::Jcc, Operand::Immediate(target)) => Some(target.value() as u64 & 0xff),
            _ => None,
        })
        .expect("no intra-instruction jump");
    assert_eq!(skip as usize, of_writes[1]);
}

#[test]
fn ror_rotates_through_the_high_half() {
    let translator = Translator::new(ArchitectureMode::Bits32, TranslationMode::Lite);

    let ops = translator
        .translate(&insn("ror", vec![reg("eax", 32), imm(4, 8)]))
        .unwrap();

    // The value is parked in the upper half before the rotate shift.
    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::Bsh
            && *op.op1() == Operand::imm(32, 32)
            && op.op2().size() == 64));

    // The count is negated to shift rightwards.
    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::Sub && *op.op0() == Operand::imm(0, 32)));
}

#[test]
fn byte_rcl_reduces_the_count_mod_nine() {
    let translator = Translator::default();

    let ops = translator
        .translate(&insn("rcl", vec![reg("al", 8), reg("cl", 8)]))
        .unwrap();

    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::Mod && *op.op1() == Operand::imm(9, 8)));
}

#[test]
fn word_rcr_reduces_the_count_mod_seventeen() {
    let translator = Translator::default();

    let ops = translator
        .translate(&insn("rcr", vec![reg("ax", 16), reg("cl", 8)]))
        .unwrap();

    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::Mod && *op.op1() == Operand::imm(17, 16)));
}

#[test]
fn rcl_concatenates_the_carry_above_the_value() {
    let translator = Translator::new(ArchitectureMode::Bits32, TranslationMode::Lite);

    let ops = translator
        .translate(&insn("rcl", vec![reg("eax", 32), imm(1, 8)]))
        .unwrap();

    // CF copied into a double-width temporary and shifted to bit 32.
    let insert = ops
        .iter()
        .position(|op| {
            op.opcode() == Opcode::Str && *op.op0() == Operand::reg("cf", 1) && op.op2().size() == 64
        })
        .expect("carry widening not found");
    assert_eq!(ops[insert + 1].opcode(), Opcode::Bsh);
    assert_eq!(*ops[insert + 1].op1(), Operand::imm(32, 64));
    assert_eq!(ops[insert + 2].opcode(), Opcode::Or);
}

#[test]
fn rcr_runs_in_a_quadruple_width_buffer() {
    let translator = Translator::new(ArchitectureMode::Bits32, TranslationMode::Lite);

    let ops = translator
        .translate(&insn("rcr", vec![reg("eax", 32), imm(2, 8)]))
        .unwrap();

    assert!(ops.iter().any(|op| op.op2().size() == 128));

    // The pre-rotate carry is saved for the OF derivation.
    assert!(ops
        .iter()
        .any(|op| op.opcode() == Opcode::Str
            && *op.op0() == Operand::reg("cf", 1)
            && op.op2().size() == 1));
}
