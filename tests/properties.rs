use std::collections::HashSet;

use quickcheck::{Arbitrary, Gen, TestResult};
use quickcheck_macros::quickcheck;
use reil_x86::arch::register_alias;
use reil_x86::prelude::*;

const SIZES: [Width; 3] = [8, 16, 32];

fn register_pool(size: Width) -> &'static [&'static str] {
    match size {
        8 => &["al", "bl", "cl", "dl"],
        16 => &["ax", "bx", "cx", "dx"],
        _ => &["eax", "ebx", "ecx", "edx", "esi", "edi"],
    }
}

fn any_register(g: &mut Gen, size: Width) -> X86Operand {
    X86Operand::reg(*g.choose(register_pool(size)).unwrap(), size)
}

fn any_source(g: &mut Gen, size: Width) -> X86Operand {
    if bool::arbitrary(g) {
        any_register(g, size)
    } else {
        let mask = ((1u128 << size) - 1) as u64;
        X86Operand::imm(u64::arbitrary(g) & mask, size)
    }
}

/// A random instruction drawn from the supported two-operand, one-operand,
/// and shift/rotate forms, with width-consistent operands.
#[derive(Debug, Clone)]
struct AnyInstruction(X86Instruction);

impl Arbitrary for AnyInstruction {
    fn arbitrary(g: &mut Gen) -> Self {
        let size = *g.choose(&SIZES).unwrap();

        let (mnemonic, operands) = match *g.choose(&[0, 1, 2]).unwrap() {
            0 => {
                let mnemonic = *g
                    .choose(&[
                        "add", "adc", "sub", "sbb", "and", "or", "xor", "cmp", "test", "mov",
                    ])
                    .unwrap();

                (mnemonic, vec![any_register(g, size), any_source(g, size)])
            }
            1 => {
                let mnemonic = *g.choose(&["inc", "dec", "neg", "not", "push"]).unwrap();

                (mnemonic, vec![any_register(g, size)])
            }
            _ => {
                let mnemonic = *g
                    .choose(&["shl", "shr", "sar", "rol", "ror", "rcl", "rcr"])
                    .unwrap();
                let count = u64::from(u8::arbitrary(g) % 32);

                (
                    mnemonic,
                    vec![any_register(g, size), X86Operand::imm(count, 8)],
                )
            }
        };

        AnyInstruction(X86Instruction::new(
            mnemonic,
            operands,
            0x40_0000 + u64::from(u16::arbitrary(g)),
            2,
            vec![0x90, 0x90],
        ))
    }
}

fn shape(ops: &[Instruction]) -> Vec<(Opcode, Vec<Operand>)> {
    ops.iter()
        .map(|op| (op.opcode(), op.operands().to_vec()))
        .collect()
}

fn temporaries(ops: &[Instruction]) -> HashSet<String> {
    ops.iter()
        .flat_map(|op| op.operands().iter())
        .filter_map(|operand| match operand {
            Operand::Register(reg) => {
                let name = reg.name();
                name.strip_prefix('t')
                    .filter(|rest| rest.chars().all(|c| c.is_ascii_digit()))
                    .map(|_| name.to_string())
            }
            _ => None,
        })
        .collect()
}

#[quickcheck]
fn translations_are_width_well_formed(any: AnyInstruction) -> bool {
    // `translate` re-checks every emitted micro-op against the width
    // rules, so success is the property.
    [ArchitectureMode::Bits32, ArchitectureMode::Bits64]
        .into_iter()
        .all(|mode| {
            Translator::new(mode, TranslationMode::Full)
                .translate(&any.0)
                .is_ok()
        })
}

#[quickcheck]
fn reset_makes_translation_deterministic(any: AnyInstruction) -> bool {
    let translator = Translator::default();

    let first = translator.translate(&any.0).unwrap();
    translator.reset();
    let second = translator.translate(&any.0).unwrap();

    first == second
}

#[quickcheck]
fn temporaries_never_collide_across_translations(a: AnyInstruction, b: AnyInstruction) -> bool {
    let translator = Translator::default();

    let first = translator.translate(&a.0).unwrap();
    let second = translator.translate(&b.0).unwrap();

    temporaries(&first).is_disjoint(&temporaries(&second))
}

#[quickcheck]
fn lite_is_a_subsequence_of_full(any: AnyInstruction) -> bool {
    let full = Translator::new(ArchitectureMode::Bits32, TranslationMode::Full)
        .translate(&any.0)
        .unwrap();
    let lite = Translator::new(ArchitectureMode::Bits32, TranslationMode::Lite)
        .translate(&any.0)
        .unwrap();

    let full = shape(&full);
    let mut remaining = full.iter();

    shape(&lite)
        .iter()
        .all(|op| remaining.any(|candidate| candidate == op))
}

#[quickcheck]
fn no_microop_references_an_unresolved_target(any: AnyInstruction) -> bool {
    let ops = Translator::default().translate(&any.0).unwrap();

    ops.iter()
        .filter(|op| op.opcode() == Opcode::Jcc)
        .all(|op| !op.op2().is_empty())
}

#[quickcheck]
fn dword_register_writes_in_long_mode_zero_extend(any: AnyInstruction) -> TestResult {
    let translator = Translator::new(ArchitectureMode::Bits64, TranslationMode::Full);
    let ops = translator.translate(&any.0).unwrap();

    let writes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter_map(|(index, op)| match (op.opcode(), op.op2()) {
            (Opcode::Str, Operand::Register(reg))
                if reg.size() == 32 && register_alias(reg.name()).is_some() =>
            {
                Some(index)
            }
            _ => None,
        })
        .collect();

    if writes.is_empty() {
        return TestResult::discard();
    }

    for index in writes {
        let (parent, _) = match ops[index].op2() {
            Operand::Register(reg) => register_alias(reg.name()).unwrap(),
            _ => unreachable!(),
        };

        let cleared = index > 0
            && ops[index - 1].opcode() == Opcode::Str
            && *ops[index - 1].op0() == Operand::imm(0, 64)
            && *ops[index - 1].op2() == Operand::reg(parent, 64);

        if !cleared {
            return TestResult::failed();
        }
    }

    TestResult::passed()
}

#[quickcheck]
fn immediate_branch_targets_keep_a_zero_sub_index(target: u32) -> bool {
    let translator = Translator::default();

    let source = X86Instruction::new(
        "jmp",
        vec![X86Operand::imm(u64::from(target), 32)],
        0x400000,
        5,
        vec![0xe9; 5],
    );
    let ops = translator.translate(&source).unwrap();

    match ops.last().map(Instruction::op2) {
        Some(Operand::Immediate(imm)) => imm.value() & 0xff == 0,
        _ => false,
    }
}

#[quickcheck]
fn intra_instruction_targets_carry_a_valid_sub_index(count: u8) -> bool {
    let translator = Translator::default();

    let source = X86Instruction::new(
        "sar",
        vec![
            X86Operand::reg("eax", 32),
            X86Operand::imm(u64::from(count % 32), 8),
        ],
        0x400000,
        3,
        vec![0xc1, 0xf8, count],
    );
    let ops = translator.translate(&source).unwrap();

    ops.iter()
        .filter(|op| op.opcode() == Opcode::Jcc)
        .all(|op| match op.op2() {
            Operand::Immediate(imm) => {
                let value = imm.value() as u64;
                value >> 8 == 0x400000 && (value & 0xff) < ops.len() as u64
            }
            _ => false,
        })
}
