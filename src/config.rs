//! Translation configuration types.
//!
//! This module provides configuration for the bytecode-to-IR front end, allowing
//! fine-grained control over speculation, deoptimization bookkeeping, field
//! analysis limits, and tracing.
//!
//! # Overview
//!
//! Configuration is organized into several interconnected structures:
//!
//! - [`TranslationConfig`] - Top-level configuration container
//! - [`DeoptHeuristics`] - Cost cutoffs for deoptimization transition points
//! - [`AnalysisConfig`] - Field-lattice analysis limits
//! - [`TracingConfig`] - Diagnostic event collection options
//!
//! All thresholds in this module are implementation policy, not semantic
//! contracts; the defaults are documented on each field and callers may tighten
//! or relax them freely.
//!
//! # Example
//!
//! ```rust
//! use jitfront::config::{TranslationConfig, DeoptHeuristics};
//!
//! // Use a preset
//! let config = TranslationConfig::speculative();
//!
//! // Or customize
//! let config = TranslationConfig {
//!     heuristics: DeoptHeuristics::new().with_max_stack_depth(8),
//!     ..TranslationConfig::default()
//! };
//! assert!(config.field_analysis);
//! ```

/// Top-level configuration for bytecode translation.
///
/// Controls which speculative facilities are active during a translation pass
/// and carries the tuning knobs for the ones that are. The configuration is
/// read-only from the translator's point of view; one instance is typically
/// shared across all translations of a compilation session.
///
/// # Default Configuration
///
/// - Field analysis enabled
/// - Deoptimization-point recording enabled
/// - Default heuristic thresholds (see [`DeoptHeuristics`])
/// - Tracing silent
///
/// # Presets
///
/// - [`speculative()`](Self::speculative) - Everything on, for hot compiles
/// - [`conservative()`](Self::conservative) - No speculation, no deopt bookkeeping
#[derive(Clone, Debug)]
pub struct TranslationConfig {
    /// Whether the translator may consult the field-info cache and run the
    /// field-lattice analyzer to drive speculative simplifications.
    ///
    /// When disabled, no analysis runs and no cached facts are consumed;
    /// every field access translates conservatively.
    pub field_analysis: bool,

    /// Whether deoptimization transition points are recorded.
    ///
    /// When disabled, no stack state is persisted at calls or allocations and
    /// the resulting code cannot hand control back to a conservative execution
    /// mode mid-method.
    pub deopt_recording: bool,

    /// Cost cutoffs applied when deciding whether a statement becomes a
    /// recorded transition point.
    pub heuristics: DeoptHeuristics,

    /// Limits for the field-lattice analyzer.
    pub analysis: AnalysisConfig,

    /// Diagnostic event collection.
    pub tracing: TracingConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        TranslationConfig::speculative()
    }
}

impl TranslationConfig {
    /// Everything enabled with default thresholds.
    ///
    /// The configuration used for hot recompiles where speculation pays off.
    #[must_use]
    pub fn speculative() -> Self {
        TranslationConfig {
            field_analysis: true,
            deopt_recording: true,
            heuristics: DeoptHeuristics::default(),
            analysis: AnalysisConfig::default(),
            tracing: TracingConfig::silent(),
        }
    }

    /// No speculation and no deoptimization bookkeeping.
    ///
    /// Produces plain, guard-free IR; suitable for cold first-time compiles
    /// and for differential testing against the speculative configuration.
    #[must_use]
    pub fn conservative() -> Self {
        TranslationConfig {
            field_analysis: false,
            deopt_recording: false,
            heuristics: DeoptHeuristics::default(),
            analysis: AnalysisConfig::default(),
            tracing: TracingConfig::silent(),
        }
    }
}

/// Cost cutoffs for deoptimization transition points.
///
/// A statement that could hand control to a conservative execution mode is only
/// recorded as a transition point when doing so is cheap enough to be worth it.
/// Sites that exceed these bounds are marked *cannot resume here* instead and
/// execution must reach the next recorded point before a transition can occur.
///
/// # Builder Pattern
///
/// ```rust
/// use jitfront::config::DeoptHeuristics;
///
/// let heuristics = DeoptHeuristics::new()
///     .with_max_stack_depth(8)
///     .with_max_target_complexity(10);
/// assert_eq!(heuristics.max_stack_depth, 8);
/// ```
///
/// # Default Values
///
/// | Threshold | Default |
/// |-----------|---------|
/// | `max_stack_depth` | 16 |
/// | `max_target_complexity` | 30 |
#[derive(Clone, Debug)]
pub struct DeoptHeuristics {
    /// Maximum simulated operand-stack depth at which a transition point is
    /// still recorded.
    ///
    /// Deeper stacks would persist proportionally more slots per point, so
    /// sites beyond this depth are marked non-resumable instead.
    pub max_stack_depth: usize,

    /// Maximum override fan-out of a call target at which the call is still
    /// recorded as a transition point.
    ///
    /// Unresolved targets are treated as exceeding this bound.
    pub max_target_complexity: u32,
}

impl DeoptHeuristics {
    /// Creates heuristics with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        DeoptHeuristics::default()
    }

    /// Sets the maximum operand-stack depth for recorded transition points.
    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Sets the maximum call-target complexity for recorded transition points.
    #[must_use]
    pub fn with_max_target_complexity(mut self, complexity: u32) -> Self {
        self.max_target_complexity = complexity;
        self
    }
}

impl Default for DeoptHeuristics {
    fn default() -> Self {
        DeoptHeuristics {
            max_stack_depth: 16,
            max_target_complexity: 30,
        }
    }
}

/// Limits for the field-lattice analyzer.
///
/// # Default Values
///
/// | Limit | Default |
/// |-------|---------|
/// | `max_peek_bytecode_len` | 8191 |
/// | `max_array_dimensions` | 2 |
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    /// Longest method body, in bytes, the analyzer will peek into.
    ///
    /// Candidate methods above this length abort the analysis attempt for the
    /// class (retryable on a later compile).
    pub max_peek_bytecode_len: usize,

    /// Deepest array shape for which per-dimension constant lengths are
    /// tracked. Fields with deeper shapes keep type validity only.
    pub max_array_dimensions: u8,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            max_peek_bytecode_len: 8191,
            max_array_dimensions: 2,
        }
    }
}

/// Diagnostic event collection options.
///
/// When a flag is set, the corresponding events are appended to the
/// [`TraceLog`](crate::ir::TraceLog) carried by the translation result. All
/// flags default to off; tracing never affects translation semantics.
///
/// # Example
///
/// ```rust
/// use jitfront::config::TracingConfig;
///
/// let tracing = TracingConfig::full();
/// assert!(tracing.translation && tracing.stack && tracing.field_analysis);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingConfig {
    /// Record one event per translated instruction and per block transition.
    pub translation: bool,

    /// Record operand-stack saves, reconciliations, and anchor insertions.
    pub stack: bool,

    /// Record field-analysis scan steps, lattice transitions, and vetoes.
    pub field_analysis: bool,
}

impl TracingConfig {
    /// No events are collected.
    #[must_use]
    pub fn silent() -> Self {
        TracingConfig::default()
    }

    /// Every event category is collected.
    #[must_use]
    pub fn full() -> Self {
        TracingConfig {
            translation: true,
            stack: true,
            field_analysis: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_nothing_loud() {
        let config = TranslationConfig::default();
        assert!(!config.tracing.translation);
        assert!(!config.tracing.stack);
        assert!(!config.tracing.field_analysis);
    }

    #[test]
    fn speculative_preset_enables_speculation() {
        let config = TranslationConfig::speculative();
        assert!(config.field_analysis);
        assert!(config.deopt_recording);
    }

    #[test]
    fn conservative_preset_disables_speculation() {
        let config = TranslationConfig::conservative();
        assert!(!config.field_analysis);
        assert!(!config.deopt_recording);
    }

    #[test]
    fn heuristic_builders_override_defaults() {
        let heuristics = DeoptHeuristics::new()
            .with_max_stack_depth(4)
            .with_max_target_complexity(2);
        assert_eq!(heuristics.max_stack_depth, 4);
        assert_eq!(heuristics.max_target_complexity, 2);
    }
}
