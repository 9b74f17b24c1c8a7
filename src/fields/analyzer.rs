//! Speculative field-lattice analysis.
//!
//! The analyzer peeks into a class's initializer methods and builds, per
//! field, the strongest [`FieldValidity`] claim the observed stores justify.
//! Only code that runs before an instance can leak is scanned: the static
//! initializer, the constructors, and the one private initializer method every
//! constructor delegates to first, when such a method exists.
//!
//! The trust model is all or nothing at the class level. Anything that could
//! let a field change behind the analysis's back (a native method anywhere in
//! the class, inner classes, a reflective call in scanned code, a static-final
//! store outside the static initializer) vetoes the class permanently.
//! Transient obstacles (class not yet initialized, a method body missing or
//! too long to peek, undecodable bytecode) abort the attempt without
//! prejudice; a later compile may retry.
//!
//! Scanned bodies are translated with the conservative configuration, so the
//! analyzer consumes the same IR the compiler does and never recurses into
//! itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::bytecode::{BytecodeCursor, FlowKind, Opcode, Operands};
use crate::config::{AnalysisConfig, TranslationConfig};
use crate::fields::escape::{classify_load, LoadUse, UseSites};
use crate::fields::info::{ArrayInfo, ClassFieldInfo, EntryFlags, FieldKey, FieldLatticeEntry};
use crate::fields::lattice::FieldValidity;
use crate::ir::{ArrayElem, IlOp, NodeArena, NodeId, Payload, Translator};
use crate::resolver::{
    ClassId, ClassMetadata, FieldDescriptor, FieldFlags, MethodFlags, MethodId, NumericWrapper,
    Resolution, Resolver, ScannedMethod,
};

/// Result of one analysis attempt.
#[derive(Clone, Debug)]
pub enum AnalysisOutcome {
    /// The class was scanned to completion; the collection may be empty.
    Complete(ClassFieldInfo),
    /// The class can never be trusted; the veto is permanent.
    Vetoed,
    /// A transient obstacle stopped the attempt; retry on a later compile.
    Aborted,
}

/// Why a scan stopped early.
enum Interrupt {
    Veto,
    Abort,
}

type ScanResult<T> = std::result::Result<T, Interrupt>;

/// Which initializer a store was observed in; decides the creation state.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanContext {
    StaticInitializer,
    FirstInitializer,
    Constructor,
}

/// Shape of a stored value, as far as the IR tree reveals it.
#[derive(Default)]
struct StoredShape {
    exact: Option<Arc<[u8]>>,
    array: Option<ArrayInfo>,
    null: bool,
}

/// Read-side facts collected across all scanned methods, applied after the
/// store lattice has settled so a load never masquerades as a store.
#[derive(Default)]
struct ReadFacts {
    escaped: HashMap<FieldKey, Arc<FieldDescriptor>>,
    assumptions: Vec<(FieldKey, Arc<FieldDescriptor>, NumericWrapper)>,
}

/// Analyzes one class's initializers against one resolver.
pub struct FieldAnalyzer<'a, R: Resolver> {
    resolver: &'a R,
    config: &'a AnalysisConfig,
}

impl<'a, R: Resolver> FieldAnalyzer<'a, R> {
    /// Creates an analyzer with the given peek limits.
    pub fn new(resolver: &'a R, config: &'a AnalysisConfig) -> Self {
        FieldAnalyzer { resolver, config }
    }

    /// Runs the analysis for `class`.
    pub fn analyze(&self, class: ClassId) -> AnalysisOutcome {
        match self.run(class) {
            Ok(info) => AnalysisOutcome::Complete(info),
            Err(Interrupt::Veto) => AnalysisOutcome::Vetoed,
            Err(Interrupt::Abort) => AnalysisOutcome::Aborted,
        }
    }

    fn run(&self, class: ClassId) -> ScanResult<ClassFieldInfo> {
        let metadata = match self.resolver.class_metadata(class) {
            Resolution::Resolved(metadata) => metadata,
            Resolution::Unresolved => return Err(Interrupt::Veto),
        };
        if metadata.inner_classes > 0 {
            return Err(Interrupt::Veto);
        }
        if metadata
            .methods
            .iter()
            .any(|method| method.descriptor.flags.contains(MethodFlags::NATIVE))
        {
            return Err(Interrupt::Veto);
        }
        if !metadata.initialized {
            return Err(Interrupt::Abort);
        }

        let constructors: Vec<&ScannedMethod> = metadata
            .methods
            .iter()
            .filter(|method| method.descriptor.flags.contains(MethodFlags::CONSTRUCTOR))
            .collect();
        let privileged = self.privileged_initializer(&metadata, &constructors)?;

        let mut entries: HashMap<FieldKey, FieldLatticeEntry> = HashMap::new();
        let mut reads = ReadFacts::default();
        let mut scanned: HashSet<MethodId> = HashSet::new();
        let mut privileged_stored: HashSet<FieldKey> = HashSet::new();

        if let Some(clinit) = metadata
            .methods
            .iter()
            .find(|method| method.descriptor.flags.contains(MethodFlags::CLASS_INITIALIZER))
        {
            scanned.insert(clinit.descriptor.method);
            self.scan_method(
                &mut entries,
                &mut reads,
                clinit,
                ScanContext::StaticInitializer,
                class,
            )?;
        }

        if let Some(method) = privileged {
            scanned.insert(method.descriptor.method);
            privileged_stored = self.scan_method(
                &mut entries,
                &mut reads,
                method,
                ScanContext::FirstInitializer,
                class,
            )?;
        }

        for constructor in &constructors {
            if !scanned.insert(constructor.descriptor.method) {
                continue;
            }
            let stored = self.scan_method(
                &mut entries,
                &mut reads,
                constructor,
                ScanContext::Constructor,
                class,
            )?;

            // a field the shared first initializer stores is stored on behalf
            // of every constructor, including this one
            for (key, entry) in entries.iter_mut() {
                if entry.type_validity == FieldValidity::AlwaysInitialized
                    && !stored.contains(key)
                    && !privileged_stored.contains(key)
                {
                    entry.demote();
                }
            }
        }

        for (key, descriptor) in &reads.escaped {
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| FieldLatticeEntry::new(FieldValidity::Invalid, descriptor));
            entry.flags.remove(EntryFlags::NEVER_READ);
            if descriptor.is_array() {
                entry.demote();
            }
        }
        for (key, descriptor, wrapper) in &reads.assumptions {
            entries
                .entry(key.clone())
                .or_insert_with(|| FieldLatticeEntry::new(FieldValidity::Invalid, descriptor))
                .assume_wrapper(*wrapper);
        }

        entries.retain(|_, entry| entry.retainable());
        Ok(ClassFieldInfo::from_entries(entries))
    }

    /// The one initializer method whose stores count as running in every
    /// constructor, when all constructors agree on it.
    ///
    /// Each constructor's own candidate is the target of its first same-class
    /// `invokespecial` along the straight-line entry prefix, the leading
    /// superclass-constructor call skipped; with no such call the constructor
    /// is its own candidate. The privilege holds only when every constructor
    /// names the same candidate, and a private candidate is additionally
    /// rejected when any non-constructor method of the class calls it.
    fn privileged_initializer<'m>(
        &self,
        metadata: &'m ClassMetadata,
        constructors: &[&'m ScannedMethod],
    ) -> ScanResult<Option<&'m ScannedMethod>> {
        let Some((first, rest)) = constructors.split_first() else {
            return Ok(None);
        };
        let candidate = self.first_initializer(metadata.id, first)?;
        for constructor in rest {
            if self.first_initializer(metadata.id, constructor)? != candidate {
                return Ok(None);
            }
        }

        let Some(method) = metadata
            .methods
            .iter()
            .find(|method| method.descriptor.method == candidate)
        else {
            return Ok(None);
        };
        if !method.descriptor.flags.contains(MethodFlags::CONSTRUCTOR)
            && self.called_outside_constructors(metadata, candidate)?
        {
            return Ok(None);
        }
        Ok(Some(method))
    }

    /// One constructor's first-initializer candidate.
    fn first_initializer(
        &self,
        class: ClassId,
        constructor: &ScannedMethod,
    ) -> ScanResult<MethodId> {
        let own = constructor.descriptor.method;
        let body = self.peek_body(constructor)?;
        let cursor = BytecodeCursor::new(body).map_err(|_| Interrupt::Abort)?;

        let mut at = 0;
        let mut skipped_super = false;
        while at < cursor.len() {
            let record = cursor.decode(at).map_err(|_| Interrupt::Abort)?;
            at = record.next;
            match record.opcode {
                Opcode::Invokespecial => {
                    let pool = match record.operands {
                        Operands::Pool(pool) => pool,
                        _ => return Err(Interrupt::Abort),
                    };
                    let Some(target) = self.resolver.resolve_method(pool).into_resolved() else {
                        return Ok(own);
                    };
                    if target.class != class {
                        if target.flags.contains(MethodFlags::CONSTRUCTOR) && !skipped_super {
                            skipped_super = true;
                            continue;
                        }
                        return Ok(own);
                    }
                    if target.flags.contains(MethodFlags::CONSTRUCTOR)
                        || (target.flags.contains(MethodFlags::PRIVATE)
                            && !target.flags.contains(MethodFlags::STATIC))
                    {
                        return Ok(target.method);
                    }
                    return Ok(own);
                }
                Opcode::Invokevirtual | Opcode::Invokestatic | Opcode::Invokeinterface => {
                    return Ok(own);
                }
                // the candidate must dominate every path; stop at the first
                // transfer of any kind
                _ if record.flow() != FlowKind::Normal => return Ok(own),
                _ => {}
            }
        }
        Ok(own)
    }

    /// Whether any non-initializer method of the class calls `candidate`.
    fn called_outside_constructors(
        &self,
        metadata: &ClassMetadata,
        candidate: MethodId,
    ) -> ScanResult<bool> {
        for method in &metadata.methods {
            let flags = method.descriptor.flags;
            if flags.contains(MethodFlags::CONSTRUCTOR)
                || flags.contains(MethodFlags::CLASS_INITIALIZER)
                || flags.contains(MethodFlags::ABSTRACT)
                || method.descriptor.method == candidate
            {
                continue;
            }
            let body = self.peek_body(method)?;
            let cursor = BytecodeCursor::new(body).map_err(|_| Interrupt::Abort)?;
            for record in cursor.decode_all().map_err(|_| Interrupt::Abort)? {
                let pool = match (record.opcode, record.operands) {
                    (
                        Opcode::Invokevirtual | Opcode::Invokespecial | Opcode::Invokestatic,
                        Operands::Pool(pool),
                    ) => pool,
                    (Opcode::Invokeinterface, Operands::PoolAndCount { pool, .. }) => pool,
                    _ => continue,
                };
                if self
                    .resolver
                    .resolve_method(pool)
                    .into_resolved()
                    .is_some_and(|target| target.method == candidate)
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Translates one initializer and folds its stores and loads into the
    /// lattice. Returns the keys this method stored.
    fn scan_method(
        &self,
        entries: &mut HashMap<FieldKey, FieldLatticeEntry>,
        reads: &mut ReadFacts,
        method: &ScannedMethod,
        context: ScanContext,
        class: ClassId,
    ) -> ScanResult<HashSet<FieldKey>> {
        let body = self.peek_body(method)?;
        let config = TranslationConfig::conservative();
        let mut translation = Translator::new(self.resolver, &config)
            .translate(body)
            .map_err(|_| Interrupt::Abort)?;

        let mut stored = HashSet::new();
        let mut loads: Vec<(NodeId, Arc<FieldDescriptor>)> = Vec::new();
        let mut worklist: Vec<NodeId> = Vec::new();

        let entry_block = translation.cfg.entry();
        for (block_id, block) in translation.cfg.blocks_in_order() {
            for top in block.treetops() {
                let node = translation.arena.node(top.root);
                if matches!(node.op, IlOp::FieldStore | IlOp::StaticStore) {
                    if let Payload::Field(field) = &node.payload {
                        if let Some(descriptor) = &field.target {
                            if descriptor.class == class && tracked(descriptor) {
                                if context != ScanContext::StaticInitializer
                                    && descriptor
                                        .flags
                                        .contains(FieldFlags::STATIC | FieldFlags::FINAL)
                                {
                                    return Err(Interrupt::Veto);
                                }
                                let value = match node.op {
                                    IlOp::FieldStore => node.children[1],
                                    _ => node.children[0],
                                };
                                let state = match context {
                                    ScanContext::StaticInitializer if block_id == entry_block => {
                                        FieldValidity::InitializedStatically
                                    }
                                    ScanContext::StaticInitializer
                                    | ScanContext::Constructor => {
                                        FieldValidity::NotAlwaysInitialized
                                    }
                                    ScanContext::FirstInitializer => {
                                        FieldValidity::AlwaysInitialized
                                    }
                                };
                                let shape = self.stored_shape(&translation.arena, value);
                                record_store(entries, descriptor, state, shape);
                                stored.insert(FieldKey::of(descriptor));
                            }
                        }
                    }
                }
                worklist.push(top.root);
            }
        }

        translation.arena.begin_pass();
        while let Some(id) = worklist.pop() {
            if !translation.arena.mark_visited(id) {
                continue;
            }
            let node = translation.arena.node(id);
            match node.op {
                IlOp::Call => {
                    if let Payload::Method(call) = &node.payload {
                        if call
                            .target
                            .as_ref()
                            .is_some_and(|target| target.flags.contains(MethodFlags::REFLECTIVE))
                        {
                            return Err(Interrupt::Veto);
                        }
                    }
                }
                IlOp::FieldLoad | IlOp::StaticLoad => {
                    if let Payload::Field(field) = &node.payload {
                        if let Some(descriptor) = &field.target {
                            if descriptor.class == class && tracked(descriptor) {
                                loads.push((id, Arc::clone(descriptor)));
                            }
                        }
                    }
                }
                _ => {}
            }
            worklist.extend(node.children.iter().copied());
        }

        let uses = UseSites::collect(&mut translation.arena, &translation.cfg);
        for (load, descriptor) in loads {
            let key = FieldKey::of(&descriptor);
            match classify_load(&translation.arena, &uses, load, &descriptor, &key) {
                LoadUse::PassThrough => {}
                LoadUse::Refines(recognized) => {
                    reads
                        .assumptions
                        .push((key, descriptor, recognized.wrapper()));
                }
                LoadUse::Escaping => {
                    reads.escaped.entry(key).or_insert(descriptor);
                }
            }
        }
        Ok(stored)
    }

    fn peek_body<'m>(&self, method: &'m ScannedMethod) -> ScanResult<&'m [u8]> {
        let body = method.body.as_deref().ok_or(Interrupt::Abort)?;
        if body.len() > self.config.max_peek_bytecode_len {
            return Err(Interrupt::Abort);
        }
        Ok(body)
    }

    /// What the stored tree says about the value: an exact allocation type, a
    /// literal-dimensioned array shape, or the null placeholder.
    fn stored_shape(&self, arena: &NodeArena, value: NodeId) -> StoredShape {
        let node = arena.node(value);
        match node.op {
            IlOp::Null => StoredShape {
                null: true,
                ..StoredShape::default()
            },
            IlOp::New => match &node.payload {
                Payload::Class(class) => StoredShape {
                    exact: class
                        .target
                        .as_ref()
                        .map(|descriptor| Arc::from(descriptor.type_signature())),
                    ..StoredShape::default()
                },
                _ => StoredShape::default(),
            },
            IlOp::NewArray => match &node.payload {
                Payload::NewArray(spec) if spec.dims <= self.config.max_array_dimensions => {
                    let lengths = node
                        .children
                        .iter()
                        .map(|&dim| {
                            let dim = arena.node(dim);
                            if dim.op == IlOp::Const {
                                dim.payload.as_int()
                            } else {
                                None
                            }
                        })
                        .collect();
                    let element = match &spec.elem {
                        ArrayElem::Primitive(code) => {
                            primitive_signature(*code).map(Arc::from)
                        }
                        ArrayElem::Class(class) => class
                            .target
                            .as_ref()
                            .map(|descriptor| Arc::from(descriptor.type_signature())),
                    };
                    StoredShape {
                        array: Some(ArrayInfo {
                            dimension_validity: FieldValidity::Invalid,
                            lengths,
                            element,
                        }),
                        ..StoredShape::default()
                    }
                }
                _ => StoredShape::default(),
            },
            _ => StoredShape::default(),
        }
    }
}

/// Whether the lattice tracks this field at all. Anything package-visible can
/// be stored from code the analyzer never sees.
fn tracked(descriptor: &FieldDescriptor) -> bool {
    descriptor
        .flags
        .intersects(FieldFlags::PRIVATE | FieldFlags::FINAL)
}

fn primitive_signature(code: u8) -> Option<&'static [u8]> {
    Some(match code {
        4 => b"Z",
        5 => b"C",
        6 => b"F",
        7 => b"D",
        8 => b"B",
        9 => b"S",
        10 => b"I",
        11 => b"J",
        _ => return None,
    })
}

/// Folds one observed store into the lattice.
///
/// The first store creates the entry at the context-determined state; every
/// later store is a reassignment that clears `IMMUTABLE` and demotes exactly
/// one step, except the single allowed null-to-array morph. Payload facts only
/// survive agreement.
fn record_store(
    entries: &mut HashMap<FieldKey, FieldLatticeEntry>,
    descriptor: &FieldDescriptor,
    state: FieldValidity,
    shape: StoredShape,
) {
    let key = FieldKey::of(descriptor);
    let Some(entry) = entries.get_mut(&key) else {
        let mut entry = FieldLatticeEntry::new(state, descriptor);
        if shape.null {
            entry.flags |= EntryFlags::CAN_BECOME_ARRAY;
        }
        entry.exact_type = shape.exact;
        if let Some(mut array) = shape.array {
            array.dimension_validity = state;
            entry.array = Some(array);
        }
        entries.insert(key, entry);
        return;
    };

    entry.flags.remove(EntryFlags::IMMUTABLE);

    if entry.flags.contains(EntryFlags::CAN_BECOME_ARRAY) && entry.array.is_none() {
        if let Some(mut array) = shape.array {
            array.dimension_validity = entry.type_validity;
            entry.array = Some(array);
            entry.flags.remove(EntryFlags::CAN_BECOME_ARRAY);
            return;
        }
    }

    entry.demote();
    if entry.exact_type != shape.exact {
        entry.exact_type = None;
    }
    match (&mut entry.array, shape.array) {
        (Some(old), Some(new)) if old.lengths.len() == new.lengths.len() => {
            for (slot, incoming) in old.lengths.iter_mut().zip(new.lengths) {
                if *slot != incoming {
                    *slot = None;
                }
            }
            if old.element != new.element {
                old.element = None;
            }
        }
        (Some(old), _) => {
            old.lengths.iter_mut().for_each(|slot| *slot = None);
            old.element = None;
        }
        (None, _) => {}
    }
}
