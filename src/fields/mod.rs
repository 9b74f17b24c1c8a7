//! Speculative field analysis: the validity lattice, the initializer scanner,
//! and the cross-compilation cache.
//!
//! The translator asks this module one question: what may be assumed about a
//! field without a runtime check? The answer is a [`FieldLatticeEntry`] built
//! by [`FieldAnalyzer`] from the class's initializers and published through a
//! shared [`FieldInfoCache`]. Every claim is speculative; the running system
//! is expected to deoptimize code compiled against an entry that a later
//! store invalidates.

mod analyzer;
mod cache;
pub(crate) mod escape;
mod info;
mod lattice;

pub use analyzer::{AnalysisOutcome, FieldAnalyzer};
pub use cache::{CacheOutcome, FieldInfoCache};
pub use info::{ArrayInfo, ClassFieldInfo, EntryFlags, FieldKey, FieldLatticeEntry};
pub use lattice::{FieldValidity, MeetSemiLattice};
