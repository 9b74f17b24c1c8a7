//! # jitfront Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! and traits in the crate. Import it to wire a resolver to the translator
//! without spelling out every module path.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all jitfront operations
pub use crate::Error;

/// The result type used throughout jitfront
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The bytecode-to-IR translator and its output
pub use crate::ir::{TraceEvent, TraceLog, Translation, Translator};

/// Translation modes, deoptimization heuristics, and tracing switches
pub use crate::config::{AnalysisConfig, DeoptHeuristics, TracingConfig, TranslationConfig};

// ================================================================================================
// Symbol Resolution
// ================================================================================================

/// The resolution boundary to the enclosing VM
pub use crate::resolver::{Resolution, Resolver};

/// Identities and descriptors handed across the resolution boundary
pub use crate::resolver::{
    CallShape, ClassDescriptor, ClassId, ClassMetadata, FieldDescriptor, FieldFlags, Literal,
    MethodDescriptor, MethodFlags, MethodId, NumericWrapper, RecognizedMethod, ScannedMethod,
};

// ================================================================================================
// Bytecode and Control Flow
// ================================================================================================

/// Instruction decoding
pub use crate::bytecode::{BytecodeCursor, FlowKind, Opcode, OpcodeRecord, Operands};

/// Basic blocks and the assembled graph
pub use crate::cfg::{Block, BlockFlags, BlockId, ControlFlowGraph, TreeTop};

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Node storage and identity
pub use crate::ir::{IrNode, NodeArena, NodeId};

/// The node vocabulary
pub use crate::ir::{IlOp, NodeFlags, Payload, SlotId, ValueType};

/// Call-site transition recording
pub use crate::ir::{DeoptRecorder, TransitionDecision};

// ================================================================================================
// Field Analysis
// ================================================================================================

/// The initializer scanner and its per-attempt outcome
pub use crate::fields::{AnalysisOutcome, FieldAnalyzer};

/// The published per-field records and their lattice
pub use crate::fields::{
    ArrayInfo, ClassFieldInfo, EntryFlags, FieldKey, FieldLatticeEntry, FieldValidity,
    MeetSemiLattice,
};

/// The cross-compilation cache
pub use crate::fields::{CacheOutcome, FieldInfoCache};
