// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # jitfront
//!
//! The bytecode-to-IR front end of a JVM-style just-in-time compiler: it turns
//! verified stack-machine bytecode into a control-flow graph of expression
//! trees, and backs the translation with a speculative field analysis that
//! lets the generated IR assume more than the bytecode guarantees.
//!
//! ## Features
//!
//! - **Tree-building translation** - Stack traffic becomes tree edges; only
//!   statements survive, and duplicated values share one node
//! - **Control-flow discovery** - Branch targets become basic blocks with
//!   explicit fallthroughs and checkpointed loop heads
//! - **Transition recording** - Call sites capture the operand-stack layout
//!   needed to resume in a non-speculative execution mode
//! - **Speculative field lattice** - Initializer scanning proves fields
//!   non-null, exactly typed, or constant-length, cached across compilations
//! - **Escape classification** - Loaded field values are tracked through
//!   their consuming trees to tell a harmless read from a leak
//!
//! ## Quick Start
//!
//! Translation needs two things: the raw method body and a [`resolver::Resolver`]
//! that answers constant-pool queries. Unresolved symbols do not stop the
//! front end; the affected sites just translate to guarded accesses.
//!
//! ```rust
//! use jitfront::config::TranslationConfig;
//! use jitfront::ir::{Translator, ValueType};
//! use jitfront::resolver::{
//!     CallShape, ClassDescriptor, ClassId, ClassMetadata, FieldDescriptor, Literal,
//!     MethodDescriptor, Resolution, Resolver,
//! };
//!
//! /// A resolver that knows no symbols.
//! struct NoSymbols;
//!
//! impl Resolver for NoSymbols {
//!     fn resolve_method(&self, _: u16) -> Resolution<MethodDescriptor> {
//!         Resolution::Unresolved
//!     }
//!     fn resolve_field(&self, _: u16) -> Resolution<FieldDescriptor> {
//!         Resolution::Unresolved
//!     }
//!     fn resolve_class(&self, _: u16) -> Resolution<ClassDescriptor> {
//!         Resolution::Unresolved
//!     }
//!     fn constant(&self, _: u16) -> Option<Literal> {
//!         None
//!     }
//!     fn call_shape(&self, _: u16) -> Option<CallShape> {
//!         None
//!     }
//!     fn field_shape(&self, _: u16) -> Option<ValueType> {
//!         None
//!     }
//!     fn class_metadata(&self, _: ClassId) -> Resolution<ClassMetadata> {
//!         Resolution::Unresolved
//!     }
//! }
//!
//! let code = [0x1a, 0x1b, 0x60, 0xac]; // iload_0; iload_1; iadd; ireturn
//! let config = TranslationConfig::conservative();
//! let translation = Translator::new(&NoSymbols, &config).translate(&code)?;
//! assert_eq!(translation.cfg.len(), 1);
//! # Ok::<(), jitfront::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`bytecode`] - Opcode table and instruction decoding
//! - [`cfg`] - Basic blocks, edges, and block assembly
//! - [`ir`] - The node arena, the operand-stack simulation, and [`ir::Translator`]
//! - [`fields`] - The field-validity lattice, the initializer scanner, and the
//!   cross-compilation cache
//! - [`resolver`] - The symbol-resolution boundary to the enclosing VM
//! - [`config`] - Translation modes, heuristics, and tracing switches
//! - [`Error`] and [`Result`] - Failure modes of decoding and translation
//!
//! ## Speculation and Deoptimization
//!
//! The front end is allowed to be wrong, never allowed to be silently wrong.
//! Every assumption taken from the field cache is attached to the IR as a node
//! flag the back end must guard, and every call site classified as resumable
//! carries the recorded stack layout needed to reconstruct the interpreter
//! state. A class whose initializers cannot be trusted is vetoed as a whole
//! rather than partially believed; see [`fields`] for the exact rules.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). A translation error
//! abandons the current method only; the enclosing compilation pipeline is
//! expected to fall back to a non-speculative execution mode.
//!
//! ```rust
//! use jitfront::Error;
//! use jitfront::bytecode::BytecodeCursor;
//!
//! assert!(matches!(BytecodeCursor::new(&[]), Err(Error::Empty)));
//! ```

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use jitfront::prelude::*;
///
/// let config = TranslationConfig::default();
/// assert!(config.field_analysis);
/// ```
pub mod prelude;

/// Opcode table and instruction decoding.
///
/// [`bytecode::BytecodeCursor`] decodes one verified method body into
/// [`bytecode::OpcodeRecord`]s with absolute branch targets; the rest of the
/// crate never touches raw code bytes.
pub mod bytecode;

/// Basic blocks and control-flow assembly.
///
/// [`cfg::ControlFlowAssembler`] registers branch targets idempotently during
/// the bytecode walk and links the finished [`cfg::ControlFlowGraph`] with
/// every fallthrough made explicit.
pub mod cfg;

/// Translation modes, heuristics, and tracing switches.
pub mod config;

/// Speculative field analysis and its cross-compilation cache.
///
/// [`fields::FieldAnalyzer`] scans a class's initializers into per-field
/// [`fields::FieldLatticeEntry`] records; [`fields::FieldInfoCache`] publishes
/// completed analyses to every compiler thread.
pub mod fields;

/// The IR and the bytecode-to-IR translation.
///
/// [`ir::Translator`] is the crate's main entry point; it drives the operand
/// stack simulation and the tree builder over a decoded method body and
/// produces an [`ir::Translation`].
pub mod ir;

/// The symbol-resolution boundary between the front end and the enclosing VM.
pub mod resolver;

/// `jitfront` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. Used consistently throughout the crate for all fallible
/// operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `jitfront` Error type
///
/// The main error type for all operations in this crate. Every variant aborts
/// translation of the current method only; nothing here is fatal to the
/// process.
pub use error::Error;
