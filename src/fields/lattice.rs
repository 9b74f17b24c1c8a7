//! The field-confidence lattice.
//!
//! Everything the analyzer proves about a private/final field is expressed as
//! one of four ordered confidence levels. The order is precision: a higher
//! state licenses more aggressive speculation. Within one analysis run states
//! only ever move *down* — an entry is created at the level its first store
//! justifies and every later observation can at most demote it one step, which
//! makes monotonicity structural rather than checked.

use std::fmt::Debug;

/// A meet semi-lattice with a meet (greatest lower bound) operation.
///
/// The meet combines facts derived on different paths or in different
/// initializer methods. It must satisfy:
///
/// - **Idempotent**: `x.meet(x) = x`
/// - **Commutative**: `x.meet(y) = y.meet(x)`
/// - **Associative**: `x.meet(y.meet(z)) = (x.meet(y)).meet(z)`
pub trait MeetSemiLattice: Clone + Debug + PartialEq {
    /// Computes the meet (greatest lower bound) of two lattice elements.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;

    /// Returns `true` if this is the bottom element.
    ///
    /// Bottom is absorbing: once reached, further meets cannot change the
    /// value.
    fn is_bottom(&self) -> bool;
}

/// Confidence levels for a field's type (or array-dimension) facts.
///
/// Ordered by precision: `INVALID < NOT_ALWAYS_INITIALIZED <
/// ALWAYS_INITIALIZED < INITIALIZED_STATICALLY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FieldValidity {
    /// Nothing is known; the absorbing bottom element.
    Invalid = 0,
    /// The recorded facts hold whenever the field has been stored, but some
    /// instance may never store it.
    NotAlwaysInitialized = 1,
    /// Every constructor path stores the field, so the facts hold for every
    /// constructed instance.
    AlwaysInitialized = 2,
    /// The static initializer stores the field unconditionally, so the facts
    /// hold for every instance of the class, period.
    InitializedStatically = 3,
}

impl FieldValidity {
    /// The state one precision step below this one.
    ///
    /// [`Invalid`](FieldValidity::Invalid) absorbs: demoting it yields
    /// `Invalid` again. Demotion never skips a step.
    #[must_use]
    pub fn demoted(self) -> FieldValidity {
        match self {
            FieldValidity::InitializedStatically => FieldValidity::AlwaysInitialized,
            FieldValidity::AlwaysInitialized => FieldValidity::NotAlwaysInitialized,
            FieldValidity::NotAlwaysInitialized | FieldValidity::Invalid => FieldValidity::Invalid,
        }
    }

    /// Whether facts at this level may drive speculative simplifications that
    /// assume the field is initialized.
    pub fn initialized(self) -> bool {
        self >= FieldValidity::AlwaysInitialized
    }
}

impl MeetSemiLattice for FieldValidity {
    /// Meet is minimum: combined facts are only as strong as the weaker side.
    fn meet(&self, other: &Self) -> Self {
        (*self).min(*other)
    }

    fn is_bottom(&self) -> bool {
        *self == FieldValidity::Invalid
    }
}
