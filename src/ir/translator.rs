//! The bytecode-to-IR translation driver.
//!
//! [`Translator::translate`] walks one verified method body front to back,
//! simulating the operand stack and growing expression trees until a statement
//! boundary forces them into the current block. Block boundaries come from a
//! prescan over the decoded instructions: every branch target becomes a block,
//! backward targets are marked for an interruptibility checkpoint, and code
//! between an unconditional transfer and the next registered target is dead
//! and skipped entirely.
//!
//! Shorthand bytecodes are canonicalized during the walk (`iload_2` is a
//! plain local load, `iinc` a load/add/store triple, the zero-compare branch
//! forms get an explicit constant operand), so the IR vocabulary stays small.
//!
//! With field analysis enabled the translator consults the cross-compilation
//! [`FieldInfoCache`]: loads of fields proven always-initialized are marked
//! non-null, loads with a single observed stored type carry an exact-type
//! mark that devirtualizes calls dispatched on them, and `arraylength` over a
//! field with a proven constant dimension folds to that constant.

use std::sync::Arc;

use crate::bytecode::{BytecodeCursor, Opcode, OpcodeRecord, Operands};
use crate::cfg::ControlFlowGraph;
use crate::config::TranslationConfig;
use crate::fields::{ClassFieldInfo, FieldInfoCache, FieldKey};
use crate::ir::arena::{NodeArena, NodeId};
use crate::ir::builder::TreeBuilder;
use crate::ir::deopt::{DeoptRecorder, TransitionDecision};
use crate::ir::node::{
    ArrayElem, ArraySpec, BranchSpec, CallKind, ClassRef, CmpKind, Condition, ConvKind, FieldRef,
    IlOp, MethodRef, NodeFlags, Payload, SwitchSpec, ValueType,
};
use crate::resolver::{ClassId, FieldDescriptor, Literal, MethodDescriptor, Resolver};
use crate::Result;

/// One diagnostic event collected during translation.
#[derive(Clone, Debug)]
pub enum TraceEvent {
    /// An instruction was translated.
    Instruction {
        /// Byte index of the instruction.
        offset: usize,
        /// Canonical opcode spelling.
        mnemonic: &'static str,
    },
    /// Statement generation moved to the block starting at `offset`.
    BlockEntry {
        /// Byte index of the block's first instruction.
        offset: usize,
    },
    /// The simulated stack was persisted ahead of a control transfer.
    StackPersist {
        /// Byte index of the transferring instruction.
        offset: usize,
    },
    /// A cached field fact drove a speculative simplification.
    Speculation {
        /// Byte index of the access site.
        offset: usize,
        /// What was speculated.
        detail: String,
    },
}

/// Diagnostic events of one translation, in emission order.
#[derive(Clone, Debug, Default)]
pub struct TraceLog {
    events: Vec<TraceEvent>,
}

impl TraceLog {
    /// The collected events.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Everything one successful translation produced.
pub struct Translation {
    /// The linked control-flow graph.
    pub cfg: ControlFlowGraph,
    /// The arena owning every IR node of the graph.
    pub arena: NodeArena,
    /// Recorded deoptimization transition points.
    pub deopt: DeoptRecorder,
    /// Diagnostic events, empty unless tracing was enabled.
    pub trace: TraceLog,
}

/// Translates method bodies against one resolver and configuration.
pub struct Translator<'a, R: Resolver> {
    resolver: &'a R,
    config: &'a TranslationConfig,
    cache: Option<&'a FieldInfoCache>,
}

impl<'a, R: Resolver> Translator<'a, R> {
    /// Creates a translator without a field-info cache.
    ///
    /// Field speculation needs cached analysis results, so without a cache
    /// every field access translates conservatively even when
    /// `config.field_analysis` is set.
    pub fn new(resolver: &'a R, config: &'a TranslationConfig) -> Self {
        Translator {
            resolver,
            config,
            cache: None,
        }
    }

    /// Attaches the cross-compilation field-info cache.
    #[must_use]
    pub fn with_cache(mut self, cache: &'a FieldInfoCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Translates one verified method body into a control-flow graph of
    /// expression trees.
    ///
    /// # Errors
    /// Any decoding or simulation failure aborts the translation of this
    /// method; see [`Error`](crate::Error) for the cases.
    pub fn translate(&self, code: &[u8]) -> Result<Translation> {
        let cursor = BytecodeCursor::new(code)?;
        let records = cursor.decode_all()?;

        let mut builder =
            TreeBuilder::new(self.config.heuristics.clone(), self.config.deopt_recording);
        let mut trace = TraceLog::default();

        for record in &records {
            for target in record.branch_targets() {
                if target <= record.offset {
                    builder.assembler.mark_backward_target(target);
                } else {
                    builder.assembler.target(target);
                }
            }
        }

        let entry = builder.current_block();
        builder.open_block(entry);
        let mut reachable = true;

        for record in &records {
            let at = record.offset;
            match builder.assembler.block_at(at) {
                Some(block) if block != builder.current_block() || !reachable => {
                    if reachable {
                        // falling into a jump target: both paths must agree on
                        // the persisted shape
                        builder.persist_for_branch();
                        builder.reconcile(at)?;
                        if self.config.tracing.stack {
                            trace.push(TraceEvent::StackPersist { offset: at });
                        }
                    } else {
                        let shape = builder.assembler.block(block).entry_shape().cloned();
                        if let Some(shape) = shape {
                            builder.stack.restore(&mut builder.arena, &shape);
                        }
                        reachable = true;
                    }
                    builder.open_block(block);
                    if self.config.tracing.translation {
                        trace.push(TraceEvent::BlockEntry { offset: at });
                    }
                }
                Some(_) => {}
                None if !reachable => continue,
                None => {}
            }

            if self.config.tracing.translation {
                trace.push(TraceEvent::Instruction {
                    offset: at,
                    mnemonic: record.opcode.mnemonic(),
                });
            }
            reachable = self.dispatch(&mut builder, record, &mut trace)?;
        }

        if reachable {
            return Err(malformed_error!("control flow runs off the end of the body"));
        }

        let (mut arena, assembler, deopt) = builder.finish();
        let cfg = assembler.join(&mut arena);
        Ok(Translation {
            cfg,
            arena,
            deopt,
            trace,
        })
    }

    /// Translates one instruction; returns whether the next instruction is
    /// reachable from this one.
    fn dispatch(
        &self,
        builder: &mut TreeBuilder,
        record: &OpcodeRecord,
        trace: &mut TraceLog,
    ) -> Result<bool> {
        use Opcode::*;

        let at = record.offset;
        match record.opcode {
            Nop => {}

            AconstNull => {
                builder.push_new(IlOp::Null, ValueType::Reference, Vec::new(), Payload::None);
            }
            IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5 => {
                let value = record.opcode as i32 - Iconst0 as i32;
                builder.push_new(IlOp::Const, ValueType::Int, Vec::new(), Payload::Int(value));
            }
            Lconst0 | Lconst1 => {
                let value = i64::from(record.opcode as u8 - Lconst0 as u8);
                builder.push_new(IlOp::Const, ValueType::Long, Vec::new(), Payload::Long(value));
            }
            Fconst0 | Fconst1 | Fconst2 => {
                let value = f32::from(record.opcode as u8 - Fconst0 as u8);
                builder.push_new(
                    IlOp::Const,
                    ValueType::Float,
                    Vec::new(),
                    Payload::Float(value),
                );
            }
            Dconst0 | Dconst1 => {
                let value = f64::from(record.opcode as u8 - Dconst0 as u8);
                builder.push_new(
                    IlOp::Const,
                    ValueType::Double,
                    Vec::new(),
                    Payload::Double(value),
                );
            }
            Bipush | Sipush => {
                let value = match record.operands {
                    Operands::Immediate(value) => value,
                    _ => return Err(malformed_error!("missing immediate at byte {at}")),
                };
                builder.push_new(IlOp::Const, ValueType::Int, Vec::new(), Payload::Int(value));
            }
            Ldc | LdcW | Ldc2W => self.gen_constant_load(builder, record)?,

            Iload | Iload0 | Iload1 | Iload2 | Iload3 => {
                self.gen_local_load(builder, record, ValueType::Int);
            }
            Lload | Lload0 | Lload1 | Lload2 | Lload3 => {
                self.gen_local_load(builder, record, ValueType::Long);
            }
            Fload | Fload0 | Fload1 | Fload2 | Fload3 => {
                self.gen_local_load(builder, record, ValueType::Float);
            }
            Dload | Dload0 | Dload1 | Dload2 | Dload3 => {
                self.gen_local_load(builder, record, ValueType::Double);
            }
            Aload | Aload0 | Aload1 | Aload2 | Aload3 => {
                self.gen_local_load(builder, record, ValueType::Reference);
            }

            Iaload => self.gen_element_load(builder, at, ValueType::Int)?,
            Laload => self.gen_element_load(builder, at, ValueType::Long)?,
            Faload => self.gen_element_load(builder, at, ValueType::Float)?,
            Daload => self.gen_element_load(builder, at, ValueType::Double)?,
            Aaload => self.gen_element_load(builder, at, ValueType::Reference)?,
            Baload | Caload | Saload => self.gen_element_load(builder, at, ValueType::Int)?,

            Istore | Istore0 | Istore1 | Istore2 | Istore3 | Lstore | Lstore0 | Lstore1
            | Lstore2 | Lstore3 | Fstore | Fstore0 | Fstore1 | Fstore2 | Fstore3 | Dstore
            | Dstore0 | Dstore1 | Dstore2 | Dstore3 | Astore | Astore0 | Astore1 | Astore2
            | Astore3 => {
                let local = local_index(record);
                let value = builder.pop(at)?;
                let store = builder.arena.create(
                    IlOp::LocalStore,
                    None,
                    vec![value.node],
                    Payload::Local(local),
                );
                builder.gen_treetop(store, at, None);
            }

            Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore => {
                let value = builder.pop(at)?;
                let index = builder.pop(at)?;
                let array = builder.pop(at)?;
                let store = builder.arena.create(
                    IlOp::ElemStore,
                    None,
                    vec![array.node, index.node, value.node],
                    Payload::None,
                );
                builder.gen_treetop(store, at, None);
            }

            Pop => {
                for value in builder.stack.pop_words(1, at)? {
                    builder.discard(value, at);
                }
            }
            Pop2 => {
                for value in builder.stack.pop_words(2, at)? {
                    builder.discard(value, at);
                }
            }
            Dup => builder.stack.dup(&mut builder.arena, at)?,
            DupX1 => builder.stack.dup_x1(&mut builder.arena, at)?,
            DupX2 => builder.stack.dup_x2(&mut builder.arena, at)?,
            Dup2 => builder.stack.dup2(&mut builder.arena, at)?,
            Dup2X1 => builder.stack.dup2_x1(&mut builder.arena, at)?,
            Dup2X2 => builder.stack.dup2_x2(&mut builder.arena, at)?,
            Swap => builder.stack.swap(at)?,

            Iadd | Isub | Imul | Idiv | Irem | Ishl | Ishr | Iushr | Iand | Ior | Ixor => {
                builder.gen_binary(binary_op(record.opcode), ValueType::Int, Payload::None, at)?;
            }
            Ladd | Lsub | Lmul | Ldiv | Lrem | Lshl | Lshr | Lushr | Land | Lor | Lxor => {
                builder.gen_binary(binary_op(record.opcode), ValueType::Long, Payload::None, at)?;
            }
            Fadd | Fsub | Fmul | Fdiv | Frem => {
                builder.gen_binary(binary_op(record.opcode), ValueType::Float, Payload::None, at)?;
            }
            Dadd | Dsub | Dmul | Ddiv | Drem => {
                builder.gen_binary(
                    binary_op(record.opcode),
                    ValueType::Double,
                    Payload::None,
                    at,
                )?;
            }
            Ineg => {
                builder.gen_unary(IlOp::Neg, ValueType::Int, Payload::None, at)?;
            }
            Lneg => {
                builder.gen_unary(IlOp::Neg, ValueType::Long, Payload::None, at)?;
            }
            Fneg => {
                builder.gen_unary(IlOp::Neg, ValueType::Float, Payload::None, at)?;
            }
            Dneg => {
                builder.gen_unary(IlOp::Neg, ValueType::Double, Payload::None, at)?;
            }

            Iinc => {
                let (local, delta) = match record.operands {
                    Operands::LocalIncrement { local, delta } => (local, delta),
                    _ => return Err(malformed_error!("missing iinc operands at byte {at}")),
                };
                // desugared to an explicit load/add/store triple
                let load = builder.arena.create(
                    IlOp::LocalLoad,
                    Some(ValueType::Int),
                    Vec::new(),
                    Payload::Local(local),
                );
                builder.arena.retain(load);
                let increment = builder.arena.create(
                    IlOp::Const,
                    Some(ValueType::Int),
                    Vec::new(),
                    Payload::Int(i32::from(delta)),
                );
                builder.arena.retain(increment);
                let sum = builder.arena.create(
                    IlOp::Add,
                    Some(ValueType::Int),
                    vec![load, increment],
                    Payload::None,
                );
                builder.arena.retain(sum);
                let store = builder.arena.create(
                    IlOp::LocalStore,
                    None,
                    vec![sum],
                    Payload::Local(local),
                );
                builder.gen_treetop(store, at, None);
            }

            I2l | I2f | I2d | L2i | L2f | L2d | F2i | F2l | F2d | D2i | D2l | D2f | I2b | I2c
            | I2s => {
                let kind = conversion_kind(record.opcode);
                builder.gen_unary(IlOp::Conv, kind.result(), Payload::Conversion(kind), at)?;
            }

            Lcmp => {
                builder.gen_binary(IlOp::Cmp, ValueType::Int, Payload::Cmp(CmpKind::Long), at)?;
            }
            Fcmpl => {
                builder.gen_binary(IlOp::Cmp, ValueType::Int, Payload::Cmp(CmpKind::FloatL), at)?;
            }
            Fcmpg => {
                builder.gen_binary(IlOp::Cmp, ValueType::Int, Payload::Cmp(CmpKind::FloatG), at)?;
            }
            Dcmpl => {
                builder.gen_binary(IlOp::Cmp, ValueType::Int, Payload::Cmp(CmpKind::DoubleL), at)?;
            }
            Dcmpg => {
                builder.gen_binary(IlOp::Cmp, ValueType::Int, Payload::Cmp(CmpKind::DoubleG), at)?;
            }

            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge
            | IfIcmpgt | IfIcmple | IfAcmpeq | IfAcmpne | Ifnull | Ifnonnull => {
                return self.gen_conditional(builder, record, trace);
            }

            Goto | GotoW => {
                let target = branch_target(record)?;
                builder.persist_for_branch();
                if self.config.tracing.stack {
                    trace.push(TraceEvent::StackPersist { offset: at });
                }
                let block = builder.reconcile(target)?;
                builder.assembler.edge(builder.current_block(), block);
                let goto = builder
                    .arena
                    .create(IlOp::Goto, None, Vec::new(), Payload::Target(target));
                builder.gen_treetop(goto, at, None);
                builder.stack.discard_all(&mut builder.arena);
                return Ok(false);
            }

            Tableswitch | Lookupswitch => return self.gen_switch(builder, record, trace),

            Ireturn | Lreturn | Freturn | Dreturn | Areturn => {
                let value = builder.pop(at)?;
                let ret = builder.arena.create(
                    IlOp::ReturnValue,
                    None,
                    vec![value.node],
                    Payload::None,
                );
                builder.gen_treetop(ret, at, None);
                builder.stack.discard_all(&mut builder.arena);
                return Ok(false);
            }
            Return => {
                let ret = builder
                    .arena
                    .create(IlOp::ReturnVoid, None, Vec::new(), Payload::None);
                builder.gen_treetop(ret, at, None);
                builder.stack.discard_all(&mut builder.arena);
                return Ok(false);
            }

            Getstatic => {
                let index = pool_index(record)?;
                let (dtype, target) = self.field_site(index, at)?;
                let descriptor = target.clone();
                let node = builder.push_new(
                    IlOp::StaticLoad,
                    dtype,
                    Vec::new(),
                    Payload::Field(FieldRef { index, target }),
                );
                if let Some(descriptor) = descriptor {
                    self.speculate_load(builder, node, &descriptor, at, trace);
                }
            }
            Putstatic => {
                let index = pool_index(record)?;
                let (_, target) = self.field_site(index, at)?;
                let value = builder.pop(at)?;
                let store = builder.arena.create(
                    IlOp::StaticStore,
                    None,
                    vec![value.node],
                    Payload::Field(FieldRef { index, target }),
                );
                builder.gen_treetop(store, at, None);
            }
            Getfield => {
                let index = pool_index(record)?;
                let (dtype, target) = self.field_site(index, at)?;
                let descriptor = target.clone();
                let object = builder.pop(at)?;
                let node = builder.push_new(
                    IlOp::FieldLoad,
                    dtype,
                    vec![object.node],
                    Payload::Field(FieldRef { index, target }),
                );
                if let Some(descriptor) = descriptor {
                    self.speculate_load(builder, node, &descriptor, at, trace);
                }
            }
            Putfield => {
                let index = pool_index(record)?;
                let (_, target) = self.field_site(index, at)?;
                let value = builder.pop(at)?;
                let object = builder.pop(at)?;
                let store = builder.arena.create(
                    IlOp::FieldStore,
                    None,
                    vec![object.node, value.node],
                    Payload::Field(FieldRef { index, target }),
                );
                builder.gen_treetop(store, at, None);
            }

            Invokevirtual => self.gen_call(builder, record, CallKind::Virtual, trace)?,
            Invokespecial => self.gen_call(builder, record, CallKind::Special, trace)?,
            Invokestatic => self.gen_call(builder, record, CallKind::Static, trace)?,
            Invokeinterface => self.gen_call(builder, record, CallKind::Interface, trace)?,

            New => {
                let index = pool_index(record)?;
                let target = self
                    .resolver
                    .resolve_class(index)
                    .into_resolved()
                    .map(Arc::new);
                let node = builder.arena.create(
                    IlOp::New,
                    Some(ValueType::Reference),
                    Vec::new(),
                    Payload::Class(ClassRef { index, target }),
                );
                self.gen_anchored_value(builder, node, at, None);
            }
            Newarray => {
                let element = match record.operands {
                    Operands::ElementType(code) => ArrayElem::Primitive(code),
                    _ => return Err(malformed_error!("missing element type at byte {at}")),
                };
                let count = builder.pop(at)?;
                let node = builder.arena.create(
                    IlOp::NewArray,
                    Some(ValueType::Reference),
                    vec![count.node],
                    Payload::NewArray(Box::new(ArraySpec {
                        elem: element,
                        dims: 1,
                    })),
                );
                self.gen_anchored_value(builder, node, at, None);
            }
            Anewarray => {
                let index = pool_index(record)?;
                let target = self
                    .resolver
                    .resolve_class(index)
                    .into_resolved()
                    .map(Arc::new);
                let count = builder.pop(at)?;
                let node = builder.arena.create(
                    IlOp::NewArray,
                    Some(ValueType::Reference),
                    vec![count.node],
                    Payload::NewArray(Box::new(ArraySpec {
                        elem: ArrayElem::Class(ClassRef { index, target }),
                        dims: 1,
                    })),
                );
                self.gen_anchored_value(builder, node, at, None);
            }
            Multianewarray => {
                let (pool, dims) = match record.operands {
                    Operands::PoolAndDims { pool, dims } => (pool, dims),
                    _ => return Err(malformed_error!("missing array shape at byte {at}")),
                };
                if dims == 0 {
                    return Err(malformed_error!(
                        "zero-dimension array allocation at byte {at}"
                    ));
                }
                let target = self
                    .resolver
                    .resolve_class(pool)
                    .into_resolved()
                    .map(Arc::new);
                let mut counts = Vec::with_capacity(usize::from(dims));
                for _ in 0..dims {
                    counts.push(builder.pop(at)?.node);
                }
                counts.reverse();
                let node = builder.arena.create(
                    IlOp::NewArray,
                    Some(ValueType::Reference),
                    counts,
                    Payload::NewArray(Box::new(ArraySpec {
                        elem: ArrayElem::Class(ClassRef {
                            index: pool,
                            target,
                        }),
                        dims,
                    })),
                );
                self.gen_anchored_value(builder, node, at, None);
            }

            Arraylength => self.gen_arraylength(builder, at, trace)?,

            Athrow => {
                let exception = builder.pop(at)?;
                let throw = builder.arena.create(
                    IlOp::Throw,
                    None,
                    vec![exception.node],
                    Payload::None,
                );
                builder.gen_treetop(throw, at, None);
                builder.stack.discard_all(&mut builder.arena);
                return Ok(false);
            }

            Checkcast => {
                let index = pool_index(record)?;
                let target = self
                    .resolver
                    .resolve_class(index)
                    .into_resolved()
                    .map(Arc::new);
                builder.gen_unary(
                    IlOp::CheckCast,
                    ValueType::Reference,
                    Payload::Class(ClassRef { index, target }),
                    at,
                )?;
            }
            Instanceof => {
                let index = pool_index(record)?;
                let target = self
                    .resolver
                    .resolve_class(index)
                    .into_resolved()
                    .map(Arc::new);
                builder.gen_unary(
                    IlOp::InstanceOf,
                    ValueType::Int,
                    Payload::Class(ClassRef { index, target }),
                    at,
                )?;
            }

            Monitorenter | Monitorexit => {
                let op = if record.opcode == Monitorenter {
                    IlOp::MonitorEnter
                } else {
                    IlOp::MonitorExit
                };
                let object = builder.pop(at)?;
                let statement = builder
                    .arena
                    .create(op, None, vec![object.node], Payload::None);
                builder.gen_treetop(statement, at, None);
            }

            // the decoder rejects these before dispatch
            Wide | Jsr | Ret | JsrW | Invokedynamic => unreachable!(),
        }
        Ok(true)
    }

    fn gen_constant_load(&self, builder: &mut TreeBuilder, record: &OpcodeRecord) -> Result<()> {
        let at = record.offset;
        let index = pool_index(record)?;
        let literal = self
            .resolver
            .constant(index)
            .ok_or_else(|| malformed_error!("pool index {index} at byte {at} is not a constant"))?;
        match literal {
            Literal::Int(value) => {
                builder.push_new(IlOp::Const, ValueType::Int, Vec::new(), Payload::Int(value));
            }
            Literal::Long(value) => {
                builder.push_new(IlOp::Const, ValueType::Long, Vec::new(), Payload::Long(value));
            }
            Literal::Float(value) => {
                builder.push_new(
                    IlOp::Const,
                    ValueType::Float,
                    Vec::new(),
                    Payload::Float(value),
                );
            }
            Literal::Double(value) => {
                builder.push_new(
                    IlOp::Const,
                    ValueType::Double,
                    Vec::new(),
                    Payload::Double(value),
                );
            }
            Literal::Str(value) => {
                builder.push_new(
                    IlOp::Const,
                    ValueType::Reference,
                    Vec::new(),
                    Payload::Str(value),
                );
            }
            Literal::Class(class) => {
                builder.push_new(
                    IlOp::Const,
                    ValueType::Reference,
                    Vec::new(),
                    Payload::Class(ClassRef {
                        index,
                        target: Some(class),
                    }),
                );
            }
        }
        Ok(())
    }

    fn gen_local_load(&self, builder: &mut TreeBuilder, record: &OpcodeRecord, dtype: ValueType) {
        let local = local_index(record);
        builder.push_new(IlOp::LocalLoad, dtype, Vec::new(), Payload::Local(local));
    }

    fn gen_element_load(
        &self,
        builder: &mut TreeBuilder,
        at: usize,
        dtype: ValueType,
    ) -> Result<()> {
        let index = builder.pop(at)?;
        let array = builder.pop(at)?;
        builder.push_new(
            IlOp::ElemLoad,
            dtype,
            vec![array.node, index.node],
            Payload::None,
        );
        Ok(())
    }

    /// Two-way compare-and-branch, zero/null comparands made explicit.
    ///
    /// When both operands are integer constants the comparison is decided
    /// here: a taken fold emits a plain jump and kills the fallthrough, an
    /// untaken fold emits nothing and never registers the dead taken edge.
    fn gen_conditional(
        &self,
        builder: &mut TreeBuilder,
        record: &OpcodeRecord,
        trace: &mut TraceLog,
    ) -> Result<bool> {
        let at = record.offset;
        let target = branch_target(record)?;
        let cond = branch_condition(record.opcode);

        let (lhs, rhs) = if two_operand_branch(record.opcode) {
            let rhs = builder.pop(at)?.node;
            let lhs = builder.pop(at)?.node;
            (lhs, rhs)
        } else {
            let lhs = builder.pop(at)?.node;
            let rhs = if reference_branch(record.opcode) {
                builder
                    .arena
                    .create(IlOp::Null, Some(ValueType::Reference), Vec::new(), Payload::None)
            } else {
                builder.arena.create(
                    IlOp::Const,
                    Some(ValueType::Int),
                    Vec::new(),
                    Payload::Int(0),
                )
            };
            builder.arena.retain(rhs);
            (lhs, rhs)
        };

        let folded = {
            let left = builder.arena.node(lhs);
            let right = builder.arena.node(rhs);
            match (left.op, left.payload.as_int(), right.op, right.payload.as_int()) {
                (IlOp::Const, Some(a), IlOp::Const, Some(b)) => {
                    Some(cond.evaluate(i64::from(a), i64::from(b)))
                }
                _ => None,
            }
        };

        if let Some(taken) = folded {
            builder.arena.release(lhs);
            builder.arena.release(rhs);
            if self.config.tracing.translation {
                trace.push(TraceEvent::Speculation {
                    offset: at,
                    detail: format!(
                        "constant comparison decided, branch {}",
                        if taken { "taken" } else { "not taken" }
                    ),
                });
            }
            if !taken {
                return Ok(true);
            }
            builder.persist_for_branch();
            let block = builder.reconcile(target)?;
            builder.assembler.edge(builder.current_block(), block);
            let goto = builder
                .arena
                .create(IlOp::Goto, None, Vec::new(), Payload::Target(target));
            builder.gen_treetop(goto, at, None);
            builder.stack.discard_all(&mut builder.arena);
            return Ok(false);
        }

        builder.persist_for_branch();
        if self.config.tracing.stack {
            trace.push(TraceEvent::StackPersist { offset: at });
        }
        let block = builder.reconcile(target)?;
        builder.assembler.edge(builder.current_block(), block);
        let branch = builder.arena.create(
            IlOp::IfCmp,
            None,
            vec![lhs, rhs],
            Payload::Branch(BranchSpec { cond, target }),
        );
        builder.gen_treetop(branch, at, None);

        // the conditional ends the block; translation continues in the
        // fallthrough block, which must agree on the persisted shape too
        builder.assembler.target(record.next);
        let fallthrough = builder.reconcile(record.next)?;
        builder.open_block(fallthrough);
        Ok(true)
    }

    fn gen_switch(
        &self,
        builder: &mut TreeBuilder,
        record: &OpcodeRecord,
        trace: &mut TraceLog,
    ) -> Result<bool> {
        let at = record.offset;
        let selector = builder.pop(at)?;
        builder.persist_for_branch();
        if self.config.tracing.stack {
            trace.push(TraceEvent::StackPersist { offset: at });
        }

        let (default, cases) = match &record.operands {
            Operands::TableSwitch {
                default,
                low,
                targets,
            } => (
                *default,
                targets
                    .iter()
                    .enumerate()
                    .map(|(position, &target)| (low + position as i32, target))
                    .collect::<Vec<_>>(),
            ),
            Operands::LookupSwitch { default, pairs } => (*default, pairs.clone()),
            _ => return Err(malformed_error!("missing jump table at byte {at}")),
        };

        let current = builder.current_block();
        let block = builder.reconcile(default)?;
        builder.assembler.edge(current, block);
        for &(_, target) in &cases {
            let block = builder.reconcile(target)?;
            builder.assembler.edge(current, block);
        }

        let switch = builder.arena.create(
            IlOp::Switch,
            None,
            vec![selector.node],
            Payload::Switch(Box::new(SwitchSpec { default, cases })),
        );
        builder.gen_treetop(switch, at, None);
        builder.stack.discard_all(&mut builder.arena);
        Ok(false)
    }

    fn gen_call(
        &self,
        builder: &mut TreeBuilder,
        record: &OpcodeRecord,
        kind: CallKind,
        trace: &mut TraceLog,
    ) -> Result<()> {
        let at = record.offset;
        let index = match record.operands {
            Operands::Pool(index) => index,
            Operands::PoolAndCount { pool, .. } => pool,
            _ => return Err(malformed_error!("missing call site operand at byte {at}")),
        };
        let shape = self
            .resolver
            .call_shape(index)
            .ok_or_else(|| malformed_error!("pool index {index} at byte {at} is not a method"))?;
        let target = self
            .resolver
            .resolve_method(index)
            .into_resolved()
            .map(Arc::new);

        let argc = usize::from(shape.arg_values);
        let mut arguments = Vec::with_capacity(argc);
        for _ in 0..argc {
            arguments.push(builder.pop(at)?.node);
        }
        arguments.reverse();

        // the popped arguments sit in the slots just above the remaining
        // stack; record them before gen_treetop persists that remainder
        if self.config.deopt_recording
            && builder.recorder.classify(IlOp::Call, builder.stack.depth(), target.as_deref())
                == TransitionDecision::Record
        {
            builder
                .recorder
                .record_arguments(at, builder.stack.depth() as u16, shape.arg_values);
        }

        let devirtualized = self.config.field_analysis
            && kind == CallKind::Virtual
            && arguments.first().is_some_and(|&receiver| {
                builder.arena.node(receiver).flags.contains(NodeFlags::EXACT_TYPE)
            });

        let call = builder.arena.create(
            IlOp::Call,
            shape.return_value,
            arguments,
            Payload::Method(MethodRef {
                kind,
                index,
                target: target.clone(),
            }),
        );
        if devirtualized {
            builder
                .arena
                .node_mut(call)
                .flags
                .insert(NodeFlags::DEVIRTUALIZED);
            if self.config.tracing.field_analysis {
                trace.push(TraceEvent::Speculation {
                    offset: at,
                    detail: "virtual dispatch on exactly-typed receiver".to_string(),
                });
            }
        }

        if shape.return_value.is_some() {
            self.gen_anchored_value(builder, call, at, target.as_deref());
        } else {
            builder.gen_treetop(call, at, target.as_deref());
        }
        Ok(())
    }

    /// Sequences a value-producing statement (call result, allocation) and
    /// pushes its value.
    ///
    /// The anchored mark keeps a later `pop` of the unused value from
    /// sequencing the operation a second time.
    fn gen_anchored_value(
        &self,
        builder: &mut TreeBuilder,
        node: NodeId,
        at: usize,
        target: Option<&MethodDescriptor>,
    ) {
        builder.gen_treetop(node, at, target);
        builder.push(node);
        builder.arena.node_mut(node).flags.insert(NodeFlags::ANCHORED);
    }

    fn gen_arraylength(
        &self,
        builder: &mut TreeBuilder,
        at: usize,
        trace: &mut TraceLog,
    ) -> Result<()> {
        let array = builder.pop(at)?;

        let folded = self.cached_constant_length(builder, array.node);
        if let Some(length) = folded {
            // the proven fact covers both the null check and the length read
            builder.arena.release(array.node);
            builder.push_new(
                IlOp::Const,
                ValueType::Int,
                Vec::new(),
                Payload::Int(length),
            );
            if self.config.tracing.field_analysis {
                trace.push(TraceEvent::Speculation {
                    offset: at,
                    detail: format!("array length folded to {length}"),
                });
            }
            return Ok(());
        }

        builder.push_new(IlOp::ArrayLength, ValueType::Int, vec![array.node], Payload::None);
        Ok(())
    }

    /// The cached outermost dimension length of a field-load operand, when the
    /// cached facts are strong enough to fold it.
    fn cached_constant_length(&self, builder: &TreeBuilder, array: NodeId) -> Option<i32> {
        let node = builder.arena.node(array);
        if !matches!(node.op, IlOp::FieldLoad | IlOp::StaticLoad) {
            return None;
        }
        let descriptor = match &node.payload {
            Payload::Field(field) => field.target.as_ref()?,
            _ => return None,
        };
        if !descriptor.is_array() {
            return None;
        }
        let info = self.field_info(descriptor.class)?;
        let entry = info.get(&FieldKey::of(descriptor))?;
        if !entry.type_validity.initialized() {
            return None;
        }
        let array_info = entry.array.as_ref()?;
        if !array_info.dimension_validity.initialized() {
            return None;
        }
        *array_info.lengths.first()?
    }

    fn speculate_load(
        &self,
        builder: &mut TreeBuilder,
        node: NodeId,
        descriptor: &FieldDescriptor,
        at: usize,
        trace: &mut TraceLog,
    ) {
        let Some(info) = self.field_info(descriptor.class) else {
            return;
        };
        let Some(entry) = info.get(&FieldKey::of(descriptor)) else {
            return;
        };
        if !entry.type_validity.initialized() {
            return;
        }

        let mut flags = NodeFlags::empty();
        if descriptor.value_type() == ValueType::Reference {
            flags |= NodeFlags::KNOWN_NON_NULL;
        }
        if entry.exact_type.is_some() {
            flags |= NodeFlags::EXACT_TYPE;
        }
        if flags.is_empty() {
            return;
        }
        builder.arena.node_mut(node).flags.insert(flags);
        if self.config.tracing.field_analysis {
            trace.push(TraceEvent::Speculation {
                offset: at,
                detail: format!("field load marked {flags:?}"),
            });
        }
    }

    fn field_info(&self, class: ClassId) -> Option<Arc<ClassFieldInfo>> {
        if !self.config.field_analysis {
            return None;
        }
        self.cache?
            .analyze_or_get(class, self.resolver, &self.config.analysis)
    }

    /// Resolves a field-access site: stack value category plus descriptor.
    fn field_site(
        &self,
        index: u16,
        at: usize,
    ) -> Result<(ValueType, Option<Arc<FieldDescriptor>>)> {
        match self.resolver.resolve_field(index).into_resolved() {
            Some(descriptor) => Ok((descriptor.value_type(), Some(Arc::new(descriptor)))),
            None => {
                let dtype = self.resolver.field_shape(index).ok_or_else(|| {
                    malformed_error!("pool index {index} at byte {at} is not a field")
                })?;
                Ok((dtype, None))
            }
        }
    }
}

fn pool_index(record: &OpcodeRecord) -> Result<u16> {
    match record.operands {
        Operands::Pool(index) => Ok(index),
        Operands::PoolAndCount { pool, .. } => Ok(pool),
        Operands::PoolAndDims { pool, .. } => Ok(pool),
        _ => Err(malformed_error!(
            "missing pool operand at byte {}",
            record.offset
        )),
    }
}

fn branch_target(record: &OpcodeRecord) -> Result<usize> {
    match record.operands {
        Operands::Branch { target } => Ok(target),
        _ => Err(malformed_error!(
            "missing branch target at byte {}",
            record.offset
        )),
    }
}

/// Local index of a load/store, short forms decoded from the opcode byte.
///
/// The short-form groups are four-aligned within their own range: loads start
/// at `iload_0` (0x1a), stores at `istore_0` (0x3b).
fn local_index(record: &OpcodeRecord) -> u16 {
    match record.operands {
        Operands::Local(local) => local,
        _ => {
            let byte = record.opcode as u8;
            debug_assert!((0x1a..=0x2d).contains(&byte) || (0x3b..=0x4e).contains(&byte));
            let base = if byte >= 0x3b { 0x3b } else { 0x1a };
            u16::from((byte - base) % 4)
        }
    }
}

fn binary_op(opcode: Opcode) -> IlOp {
    use Opcode::*;
    match opcode {
        Iadd | Ladd | Fadd | Dadd => IlOp::Add,
        Isub | Lsub | Fsub | Dsub => IlOp::Sub,
        Imul | Lmul | Fmul | Dmul => IlOp::Mul,
        Idiv | Ldiv | Fdiv | Ddiv => IlOp::Div,
        Irem | Lrem | Frem | Drem => IlOp::Rem,
        Ishl | Lshl => IlOp::Shl,
        Ishr | Lshr => IlOp::Shr,
        Iushr | Lushr => IlOp::Ushr,
        Iand | Land => IlOp::And,
        Ior | Lor => IlOp::Or,
        Ixor | Lxor => IlOp::Xor,
        _ => unreachable!(),
    }
}

fn conversion_kind(opcode: Opcode) -> ConvKind {
    use Opcode::*;
    match opcode {
        I2l => ConvKind::I2l,
        I2f => ConvKind::I2f,
        I2d => ConvKind::I2d,
        L2i => ConvKind::L2i,
        L2f => ConvKind::L2f,
        L2d => ConvKind::L2d,
        F2i => ConvKind::F2i,
        F2l => ConvKind::F2l,
        F2d => ConvKind::F2d,
        D2i => ConvKind::D2i,
        D2l => ConvKind::D2l,
        D2f => ConvKind::D2f,
        I2b => ConvKind::I2b,
        I2c => ConvKind::I2c,
        I2s => ConvKind::I2s,
        _ => unreachable!(),
    }
}

fn branch_condition(opcode: Opcode) -> Condition {
    use Opcode::*;
    match opcode {
        Ifeq | IfIcmpeq | IfAcmpeq | Ifnull => Condition::Eq,
        Ifne | IfIcmpne | IfAcmpne | Ifnonnull => Condition::Ne,
        Iflt | IfIcmplt => Condition::Lt,
        Ifge | IfIcmpge => Condition::Ge,
        Ifgt | IfIcmpgt => Condition::Gt,
        Ifle | IfIcmple => Condition::Le,
        _ => unreachable!(),
    }
}

/// Whether the branch compares two popped operands.
fn two_operand_branch(opcode: Opcode) -> bool {
    use Opcode::*;
    matches!(
        opcode,
        IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple | IfAcmpeq | IfAcmpne
    )
}

/// Whether the one-operand branch compares against null instead of zero.
fn reference_branch(opcode: Opcode) -> bool {
    matches!(opcode, Opcode::Ifnull | Opcode::Ifnonnull)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Opcode;
    use crate::cfg::BlockFlags;
    use crate::ir::node::SlotId;
    use crate::test::{create_field, create_method, BytecodeWriter, FixtureResolver};

    fn translate(code: &[u8]) -> Translation {
        let resolver = FixtureResolver::new();
        let config = TranslationConfig::conservative();
        Translator::new(&resolver, &config).translate(code).unwrap()
    }

    fn translate_with(resolver: &FixtureResolver, config: &TranslationConfig, code: &[u8]) -> Translation {
        Translator::new(resolver, config).translate(code).unwrap()
    }

    fn statement_ops(translation: &Translation) -> Vec<Vec<IlOp>> {
        translation
            .cfg
            .blocks_in_order()
            .map(|(_, block)| {
                block
                    .treetops()
                    .iter()
                    .map(|top| translation.arena.node(top.root).op)
                    .collect()
            })
            .collect()
    }

    fn assert_balanced(mut translation: Translation) {
        translation.cfg.discard(&mut translation.arena);
        assert_eq!(translation.arena.live_count(), 0);
        assert_eq!(translation.arena.retains(), translation.arena.releases());
    }

    #[test]
    fn test_trivial_return() {
        let code = BytecodeWriter::new()
            .op(Opcode::Iconst0)
            .op(Opcode::Ireturn)
            .finish();
        let translation = translate(&code);
        assert_eq!(translation.cfg.len(), 1);
        assert_eq!(statement_ops(&translation), vec![vec![IlOp::ReturnValue]]);
        assert_balanced(translation);
    }

    #[test]
    fn test_arithmetic_builds_one_tree() {
        // return (a + b) * a
        let code = BytecodeWriter::new()
            .op(Opcode::Iload0)
            .op(Opcode::Iload1)
            .op(Opcode::Iadd)
            .op(Opcode::Iload0)
            .op(Opcode::Imul)
            .op(Opcode::Ireturn)
            .finish();
        let translation = translate(&code);
        assert_eq!(statement_ops(&translation), vec![vec![IlOp::ReturnValue]]);

        let (_, entry) = translation.cfg.blocks_in_order().next().unwrap();
        let ret = entry.treetops()[0].root;
        let mul = translation.arena.node(ret).children[0];
        assert_eq!(translation.arena.node(mul).op, IlOp::Mul);
        assert_balanced(translation);
    }

    #[test]
    fn test_dup_commons_the_subtree() {
        // x * x via dup: both multiplication operands are one node
        let code = BytecodeWriter::new()
            .op(Opcode::Iload0)
            .op(Opcode::Dup)
            .op(Opcode::Imul)
            .op(Opcode::Ireturn)
            .finish();
        let translation = translate(&code);
        let (_, entry) = translation.cfg.blocks_in_order().next().unwrap();
        let ret = entry.treetops()[0].root;
        let mul = translation.arena.node(ret).children[0];
        let children = translation.arena.node(mul).children.clone();
        assert_eq!(children[0], children[1]);
        assert_balanced(translation);
    }

    #[test]
    fn test_conditional_splits_blocks_and_reconciles() {
        // if (a >= b) return a; return b;
        let mut writer = BytecodeWriter::new()
            .op(Opcode::Iload0)
            .op(Opcode::Iload1);
        writer = writer.op(Opcode::IfIcmplt).branch(5);
        let code = writer
            .op(Opcode::Iload0)
            .op(Opcode::Ireturn)
            .op(Opcode::Iload1)
            .op(Opcode::Ireturn)
            .finish();
        let translation = translate(&code);
        assert_eq!(translation.cfg.len(), 3);
        let ops = statement_ops(&translation);
        assert_eq!(ops[0], vec![IlOp::IfCmp]);
        assert_eq!(ops[1], vec![IlOp::ReturnValue]);
        assert_eq!(ops[2], vec![IlOp::ReturnValue]);
        assert_balanced(translation);
    }

    #[test]
    fn test_backward_branch_gets_checkpoint() {
        // 0: iload_0  1: ifle +? -> exit  4: iinc 0 -1  7: goto 0  10: return
        let code = BytecodeWriter::new()
            .op(Opcode::Iload0)
            .op(Opcode::Ifle)
            .branch(9)
            .op(Opcode::Iinc)
            .byte(0)
            .byte(0xff)
            .op(Opcode::Goto)
            .branch(-7)
            .op(Opcode::Return)
            .finish();
        let translation = translate(&code);

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
    fn test_dead_code_after_goto_is_skipped() {
        // goto 4; nop (dead); return
        let code = BytecodeWriter::new()
            .op(Opcode::Goto)
            .branch(4)
            .op(Opcode::Nop)
            .op(Opcode::Return)
            .finish();
        let translation = translate(&code);
        // entry (goto) and the return target; the dead nop starts no block
        assert_eq!(translation.cfg.len(), 2);
        assert_balanced(translation);
    }

    #[test]
    fn test_constant_fold_kills_untaken_branch() {
        // iconst_1; ifeq +4 (never taken); iconst_0; ireturn
        let code = BytecodeWriter::new()
            .op(Opcode::Iconst1)
            .op(Opcode::Ifeq)
            .branch(4)
            .op(Opcode::Iconst0)
            .op(Opcode::Ireturn)
            .finish();
        let translation = translate(&code);
        let ops = statement_ops(&translation);
        // no comparison node anywhere; the branch target block exists from the
        // prescan but receives no edge
        assert!(ops.iter().flatten().all(|&op| op != IlOp::IfCmp));
        assert_balanced(translation);
    }

    #[test]
    fn test_constant_fold_takes_decided_branch() {
        // iconst_0; ifeq +4 (always taken); iconst_0; ireturn (dead); return @6
        let code = BytecodeWriter::new()
            .op(Opcode::Iconst0)
            .op(Opcode::Ifeq)
            .branch(5)
            .op(Opcode::Iconst0)
            .op(Opcode::Ireturn)
            .op(Opcode::Return)
            .finish();
        let translation = translate(&code);
        let ops = statement_ops(&translation);
        assert!(ops.iter().flatten().all(|&op| op != IlOp::IfCmp));
        assert!(ops.iter().flatten().any(|&op| op == IlOp::Goto));
        assert_balanced(translation);
    }

    #[test]
    fn test_call_persists_stack_and_records_site() {
        // iload_0; invokestatic m (leaves an int below the call? no: arg)
        let mut callee = create_method(7, "callee");
        callee.flags = crate::resolver::MethodFlags::STATIC;
        callee.arg_values = 1;
        callee.return_value = Some(ValueType::Int);
        let resolver = FixtureResolver::new().with_method(2, callee);

        let code = BytecodeWriter::new()
            .op(Opcode::Iconst5)
            .op(Opcode::Iload0)
            .op(Opcode::Invokestatic)
            .short(2)
            .op(Opcode::Iadd)
            .op(Opcode::Ireturn)
            .finish();
        let config = TranslationConfig::speculative();
        let translation = translate_with(&resolver, &config, &code);

        // the constant below the arguments was persisted for the call site
        assert_eq!(translation.deopt.live_slots(2), Some(&[SlotId(0)][..]));
        // the argument slot sits right above the remaining stack
        assert_eq!(translation.deopt.argument_slot(2, 0), Some(SlotId(1)));
        let ops = statement_ops(&translation);
        assert!(ops[0].contains(&IlOp::SlotStore));
        assert!(ops[0].contains(&IlOp::Treetop));
        assert_balanced(translation);
    }

    #[test]
    fn test_discarded_call_result_is_sequenced_once() {
        let mut callee = create_method(7, "callee");
        callee.flags = crate::resolver::MethodFlags::STATIC;
        callee.arg_values = 0;
        callee.return_value = Some(ValueType::Int);
        let resolver = FixtureResolver::new().with_method(2, callee);

        let code = BytecodeWriter::new()
            .op(Opcode::Invokestatic)
            .short(2)
            .op(Opcode::Pop)
            .op(Opcode::Return)
            .finish();
        let config = TranslationConfig::conservative();
        let translation = translate_with(&resolver, &config, &code);

        let calls = translation
            .cfg
            .blocks_in_order()
            .flat_map(|(_, block)| block.treetops())
            .filter(|top| {
                let root = translation.arena.node(top.root);
                root.op == IlOp::Call
                    || (root.op == IlOp::Treetop
                        && translation.arena.node(root.children[0]).op == IlOp::Call)
            })
            .count();
        assert_eq!(calls, 1);
        assert_balanced(translation);
    }

    #[test]
    fn test_unresolved_field_uses_pool_shape() {
        let resolver = FixtureResolver::new().with_field_shape(4, ValueType::Long);
        let code = BytecodeWriter::new()
            .op(Opcode::Getstatic)
            .short(4)
            .op(Opcode::Lreturn)
            .finish();
        let config = TranslationConfig::conservative();
        let translation = translate_with(&resolver, &config, &code);
        let (_, entry) = translation.cfg.blocks_in_order().next().unwrap();
        let ret = entry.treetops()[0].root;
        let load = translation.arena.node(ret).children[0];
        assert_eq!(translation.arena.node(load).op, IlOp::StaticLoad);
        assert_eq!(translation.arena.node(load).dtype, Some(ValueType::Long));
        assert_balanced(translation);
    }

    #[test]
    fn test_field_store_after_load_anchors_the_load() {
        let field = create_field(1, b"I");
        let resolver = FixtureResolver::new().with_field(3, field);

        // aload_0; getfield #3; aload_0; iconst_1; putfield #3; ireturn-ish
        let code = BytecodeWriter::new()
            .op(Opcode::Aload0)
            .op(Opcode::Getfield)
            .short(3)
            .op(Opcode::Aload0)
            .op(Opcode::Iconst1)
            .op(Opcode::Putfield)
            .short(3)
            .op(Opcode::Ireturn)
            .finish();
        let config = TranslationConfig::conservative();
        let translation = translate_with(&resolver, &config, &code);
        let ops = &statement_ops(&translation)[0];
        let anchor = ops.iter().position(|&op| op == IlOp::Anchor).unwrap();
        let store = ops.iter().position(|&op| op == IlOp::FieldStore).unwrap();
        assert!(anchor < store);
        assert_balanced(translation);
    }

    #[test]
    fn test_switch_edges_cover_all_cases() {
        #[rustfmt::skip]
        let code = vec![
            0x1a,                   // iload_0
            0xaa,                   // tableswitch @1
            0x00, 0x00,             // pad
            0x00, 0x00, 0x00, 0x17, // default => 24
            0x00, 0x00, 0x00, 0x00, // low 0
            0x00, 0x00, 0x00, 0x01, // high 1
            0x00, 0x00, 0x00, 0x17, // case 0 => 24
            0x00, 0x00, 0x00, 0x18, // case 1 => 25
            0xb1,                   // return @24
            0xb1,                   // return @25
        ];
        let translation = translate(&code);
        let (_, entry) = translation
            .cfg
            .blocks_in_order()
            .find(|(_, block)| block.start() == 0)
            .unwrap();
        assert_eq!(entry.successors().len(), 2); // 24 shared by default and case 0
        assert_balanced(translation);
    }

    #[test]
    fn test_iinc_desugars_to_store() {
        let code = BytecodeWriter::new()
            .op(Opcode::Iinc)
            .byte(2)
            .byte(3)
            .op(Opcode::Return)
            .finish();
        let translation = translate(&code);
        let ops = &statement_ops(&translation)[0];
        assert_eq!(ops[0], IlOp::LocalStore);
        assert_balanced(translation);
    }

    #[test]
    fn test_short_form_stores_pick_their_own_local() {
        // the store group is four-aligned at istore_0, not at iload_0
        let code = BytecodeWriter::new()
            .op(Opcode::Iconst0)
            .op(Opcode::Istore0)
            .op(Opcode::Iconst1)
            .op(Opcode::Istore3)
            .op(Opcode::AconstNull)
            .op(Opcode::Astore0)
            .op(Opcode::Return)
            .finish();
        let translation = translate(&code);
        let (_, entry) = translation.cfg.blocks_in_order().next().unwrap();
        let locals: Vec<u16> = entry
            .treetops()
            .iter()
            .filter_map(|top| {
                let node = translation.arena.node(top.root);
                match (node.op, &node.payload) {
                    (IlOp::LocalStore, Payload::Local(local)) => Some(*local),
                    _ => None,
                }
            })
            .collect();
        assert_eq!(locals, vec![0, 3, 0]);
        assert_balanced(translation);
    }

    #[test]
    fn test_running_off_the_end_is_malformed() {
        let code = BytecodeWriter::new().op(Opcode::Iconst0).finish();
        let resolver = FixtureResolver::new();
        let config = TranslationConfig::conservative();
        let err = Translator::new(&resolver, &config)
            .translate(&code)
            .err()
            .unwrap();
        assert!(matches!(err, crate::Error::Malformed { .. }));
    }

    #[test]
    fn test_tracing_collects_instruction_events() {
        let code = BytecodeWriter::new()
            .op(Opcode::Iconst0)
            .op(Opcode::Ireturn)
            .finish();
        let resolver = FixtureResolver::new();
        let mut config = TranslationConfig::conservative();
        config.tracing = crate::config::TracingConfig::full();
        let translation = Translator::new(&resolver, &config).translate(&code).unwrap();
        let mnemonics: Vec<&str> = translation
            .trace
            .events()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Instruction { mnemonic, .. } => Some(*mnemonic),
                _ => None,
            })
            .collect();
        assert_eq!(mnemonics, vec!["iconst_0", "ireturn"]);
    }
}
