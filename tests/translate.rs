//! End-to-end translation tests over the public API.
//!
//! These exercise the whole pipeline: assemble a raw method body, translate
//! it, and check the structural guarantees the front end makes — idempotent
//! block registration, reference-count conservation, merge-shape checking,
//! and branch folding.

use std::collections::HashSet;

use jitfront::cfg::ControlFlowAssembler;
use jitfront::prelude::*;

mod common;
use common::{translate_with, BodyWriter};

/// Every op reachable from any statement root, deduplicated.
fn all_ops(translation: &Translation) -> Vec<IlOp> {
    let mut ops = Vec::new();
    let mut worklist: Vec<NodeId> = Vec::new();
    for (_, block) in translation.cfg.blocks_in_order() {
        for top in block.treetops() {
            worklist.push(top.root);
        }
    }
    let mut seen = HashSet::new();
    while let Some(id) = worklist.pop() {
        if !seen.insert(id) {
            continue;
        }
        let node = translation.arena.node(id);
        ops.push(node.op);
        worklist.extend(node.children.iter().copied());
    }
    ops
}

/// Discards the graph and checks that every retain found its release.
fn assert_balanced(translation: Translation) {
    let Translation {
        mut cfg, mut arena, ..
    } = translation;
    cfg.discard(&mut arena);
    assert_eq!(arena.live_count(), 0);
    assert_eq!(arena.retains(), arena.releases());
}

#[test]
fn registering_a_target_twice_yields_the_same_block() {
    let mut assembler = ControlFlowAssembler::new();
    let first = assembler.target(5);
    let second = assembler.target(5);
    assert_eq!(first, second);

    // the entry block is pre-registered at offset zero
    assert_eq!(assembler.target(0), assembler.entry());
}

#[test]
fn straight_line_translation_balances_refcounts() {
    let code = BodyWriter::new()
        .op(Opcode::Iload0)
        .op(Opcode::Iload1)
        .op(Opcode::Iadd)
        .op(Opcode::Iconst2)
        .op(Opcode::Imul)
        .op(Opcode::Ireturn)
        .finish();
    let translation = translate_with(&code, &TranslationConfig::conservative()).unwrap();
    assert_eq!(translation.cfg.len(), 1);
    assert_balanced(translation);
}

#[test]
fn branching_translation_balances_refcounts() {
    // if (a < b) return a; return b;
    let code = BodyWriter::new()
        .op(Opcode::Iload0)
        .op(Opcode::Iload1)
        .op(Opcode::IfIcmpge)
        .branch(5)
        .op(Opcode::Iload0)
        .op(Opcode::Ireturn)
        .op(Opcode::Iload1)
        .op(Opcode::Ireturn)
        .finish();
    let translation = translate_with(&code, &TranslationConfig::conservative()).unwrap();
    assert_eq!(translation.cfg.len(), 3);
    assert_balanced(translation);
}

#[test]
fn loop_head_runs_an_interruptibility_checkpoint() {
    // while (a > 0) a -= 1;
    let code = BodyWriter::new()
        .op(Opcode::Iload0)
        .op(Opcode::Ifle)
        .branch(9)
        .op(Opcode::Iinc)
        .byte(0)
        .byte(0xff) // -1
        .op(Opcode::Goto)
        .branch(-7)
        .op(Opcode::Return)
        .finish();
    let translation = translate_with(&code, &TranslationConfig::conservative()).unwrap();

    let (_, head) = translation
        .cfg
        .blocks_in_order()
        .find(|(_, block)| block.start() == 0)
        .unwrap();
    assert!(head.flags().contains(BlockFlags::NEEDS_CHECKPOINT));
    assert_eq!(
        translation.arena.node(head.treetops()[0].root).op,
        IlOp::AsyncCheck
    );
    assert_balanced(translation);
}

#[test]
fn inconsistent_merge_depth_is_rejected() {
    // the ifeq path reaches offset 7 with an empty stack, the goto path with
    // one pending value
    let code = BodyWriter::new()
        .op(Opcode::Iload0)
        .op(Opcode::Ifeq)
        .branch(6)
        .op(Opcode::Iconst1)
        .op(Opcode::Goto)
        .branch(2)
        .op(Opcode::Return)
        .finish();
    let result = translate_with(&code, &TranslationConfig::conservative());
    assert!(matches!(result, Err(Error::StackShapeMismatch { .. })));
}

#[test]
fn folded_branch_emits_no_comparison() {
    // ifeq on a nonzero constant can never be taken
    let code = BodyWriter::new()
        .op(Opcode::Iconst1)
        .op(Opcode::Ifeq)
        .branch(4)
        .op(Opcode::Iconst0)
        .op(Opcode::Ireturn)
        .finish();
    let translation = translate_with(&code, &TranslationConfig::conservative()).unwrap();
    assert!(!all_ops(&translation).contains(&IlOp::IfCmp));
    assert_balanced(translation);
}

#[test]
fn folded_taken_branch_becomes_a_goto() {
    let code = BodyWriter::new()
        .op(Opcode::Iconst0)
        .op(Opcode::Ifeq)
        .branch(5)
        .op(Opcode::Iconst0)
        .op(Opcode::Ireturn)
        .op(Opcode::Return)
        .finish();
    let translation = translate_with(&code, &TranslationConfig::conservative()).unwrap();
    let ops = all_ops(&translation);
    assert!(!ops.contains(&IlOp::IfCmp));
    assert!(ops.contains(&IlOp::Goto));
    assert_balanced(translation);
}

#[test]
fn tracing_reports_every_instruction() {
    let code = BodyWriter::new()
        .op(Opcode::Iconst0)
        .op(Opcode::Ireturn)
        .finish();
    let mut config = TranslationConfig::conservative();
    config.tracing = TracingConfig::full();
    let translation = translate_with(&code, &config).unwrap();

    let mnemonics: Vec<&str> = translation
        .trace
        .events()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Instruction { mnemonic, .. } => Some(*mnemonic),
            _ => None,
        })
        .collect();
    assert_eq!(mnemonics, ["iconst_0", "ireturn"]);
}

/// Minimal xorshift generator; the tests only need determinism.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

/// Emits a random but stack-valid straight-line int program.
fn random_program(seed: u64, length: usize) -> Vec<u8> {
    let mut rng = Rng(seed | 1);
    let mut writer = BodyWriter::new();
    let mut depth = 0usize;

    for _ in 0..length {
        match rng.below(7) {
            0 | 1 if depth < 6 => {
                let constant = [
                    Opcode::Iconst0,
                    Opcode::Iconst1,
                    Opcode::Iconst2,
                    Opcode::Iconst3,
                    Opcode::Iconst4,
                    Opcode::Iconst5,
                ][rng.below(6) as usize];
                writer = writer.op(constant);
                depth += 1;
            }
            2 if depth >= 2 => {
                let arith = [Opcode::Iadd, Opcode::Isub, Opcode::Imul][rng.below(3) as usize];
                writer = writer.op(arith);
                depth -= 1;
            }
            3 if depth >= 1 => {
                writer = writer.op(Opcode::Ineg);
            }
            4 if depth >= 1 && depth < 6 => {
                writer = writer.op(Opcode::Dup);
                depth += 1;
            }
            5 if depth >= 2 => {
                writer = writer.op(Opcode::Swap);
            }
            6 if depth >= 1 => {
                writer = writer.op(Opcode::Pop);
                depth -= 1;
            }
            _ => {}
        }
    }

    if depth == 0 {
        writer = writer.op(Opcode::Iconst0);
        depth = 1;
    }
    while depth > 1 {
        writer = writer.op(Opcode::Iadd);
        depth -= 1;
    }
    writer.op(Opcode::Ireturn).finish()
}

#[test]
fn random_programs_conserve_references() {
    for seed in 1..=50u64 {
        let code = random_program(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15), 40);
        let translation = translate_with(&code, &TranslationConfig::conservative())
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
        assert_balanced(translation);
    }
}
