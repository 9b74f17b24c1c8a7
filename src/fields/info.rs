//! Per-field analysis records.
//!
//! A [`FieldKey`] identifies a field by declaring class plus signature bytes —
//! value equality, never VM identity, so records survive across compilations
//! and can be compared byte for byte. A [`FieldLatticeEntry`] carries
//! everything one analysis run proved about a field, and a [`ClassFieldInfo`]
//! is the immutable per-class collection that gets published to the
//! cross-compilation cache.

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;

use crate::fields::lattice::FieldValidity;
use crate::resolver::{ClassId, FieldDescriptor, NumericWrapper};

/// Identity of a field: declaring class plus signature bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// The declaring class.
    pub class: ClassId,
    /// The field's raw type-signature bytes.
    pub signature: Arc<[u8]>,
}

impl FieldKey {
    /// Builds a key from a resolved field descriptor.
    pub fn of(descriptor: &FieldDescriptor) -> Self {
        FieldKey {
            class: descriptor.class,
            signature: descriptor.signature.clone(),
        }
    }
}

bitflags! {
    /// Boolean facts and assumptions attached to a [`FieldLatticeEntry`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        /// The field is stored at most once; declared `final` and never
        /// reassigned within the scanned initializer set.
        const IMMUTABLE = 0x01;
        /// No scanned load lets the field's value escape.
        const NEVER_READ = 0x02;
        /// Created by a null store; may still morph into an array entry once.
        const CAN_BECOME_ARRAY = 0x04;
        /// Observed arithmetic assumes the value is exactly the decimal
        /// wrapper type.
        const DECIMAL_ASSUMED = 0x08;
        /// The declared type is the decimal wrapper.
        const DECIMAL_TYPE = 0x10;
        /// Observed arithmetic assumes the value is exactly the integer
        /// wrapper type.
        const INTEGER_ASSUMED = 0x20;
        /// The declared type is the integer wrapper.
        const INTEGER_TYPE = 0x40;
    }
}

/// Array facts of an entry: dimension confidence and constant lengths.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayInfo {
    /// Confidence in the recorded dimension facts.
    pub dimension_validity: FieldValidity,
    /// Constant length per dimension, outermost first; `None` where the
    /// stored length was not a literal.
    pub lengths: Vec<Option<i32>>,
    /// Element-type signature bytes, when known.
    pub element: Option<Arc<[u8]>>,
}

/// Everything one analysis run proved about a single field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldLatticeEntry {
    /// Confidence in the type facts.
    pub type_validity: FieldValidity,
    /// Array facts, present only for fields observed holding arrays.
    pub array: Option<ArrayInfo>,
    /// Exact runtime-type signature of every stored value, when all stores
    /// agree.
    pub exact_type: Option<Arc<[u8]>>,
    /// Boolean facts and wrapper-type assumptions.
    pub flags: EntryFlags,
}

impl FieldLatticeEntry {
    /// Creates an entry at `state` for `descriptor`.
    ///
    /// New entries assume the best until contradicted: `NEVER_READ` is set,
    /// `IMMUTABLE` follows the `final` flag, and the wrapper-type marks follow
    /// the declared type.
    pub fn new(state: FieldValidity, descriptor: &FieldDescriptor) -> Self {
        let mut flags = EntryFlags::NEVER_READ;
        if descriptor
            .flags
            .contains(crate::resolver::FieldFlags::FINAL)
        {
            flags |= EntryFlags::IMMUTABLE;
        }
        match descriptor.wrapper {
            Some(NumericWrapper::Decimal) => flags |= EntryFlags::DECIMAL_TYPE,
            Some(NumericWrapper::Integer) => flags |= EntryFlags::INTEGER_TYPE,
            None => {}
        }
        FieldLatticeEntry {
            type_validity: state,
            array: None,
            exact_type: None,
            flags,
        }
    }

    /// Demotes the entry by exactly one precision step.
    ///
    /// Both the type and (when present) the dimension confidence step down;
    /// neither ever skips a level.
    pub fn demote(&mut self) {
        self.type_validity = self.type_validity.demoted();
        if let Some(array) = &mut self.array {
            array.dimension_validity = array.dimension_validity.demoted();
        }
    }

    /// Records the wrapper-arithmetic assumption observed on a load.
    pub fn assume_wrapper(&mut self, wrapper: NumericWrapper) {
        match wrapper {
            NumericWrapper::Decimal => self.flags |= EntryFlags::DECIMAL_ASSUMED,
            NumericWrapper::Integer => self.flags |= EntryFlags::INTEGER_ASSUMED,
        }
    }

    /// Whether an observed wrapper-arithmetic assumption contradicts the
    /// declared type.
    pub fn conflicting_assumption(&self) -> bool {
        (self.flags.contains(EntryFlags::DECIMAL_ASSUMED)
            && !self.flags.contains(EntryFlags::DECIMAL_TYPE))
            || (self.flags.contains(EntryFlags::INTEGER_ASSUMED)
                && !self.flags.contains(EntryFlags::INTEGER_TYPE))
    }

    /// Whether the entry carries anything worth publishing to the cache.
    ///
    /// An entry earns its slot when either confidence level survived at
    /// `NOT_ALWAYS_INITIALIZED` or better, or the field is immutable, or it
    /// was never read and no wrapper assumption contradicts its declared
    /// type. Everything else is pruned before publication.
    pub fn retainable(&self) -> bool {
        if self.type_validity >= FieldValidity::NotAlwaysInitialized {
            return true;
        }
        if let Some(array) = &self.array {
            if array.dimension_validity >= FieldValidity::NotAlwaysInitialized {
                return true;
            }
        }
        if self.flags.contains(EntryFlags::IMMUTABLE) {
            return true;
        }
        self.flags.contains(EntryFlags::NEVER_READ) && !self.conflicting_assumption()
    }
}

/// The published per-class analysis result.
///
/// Immutable once built; the cache hands out `Arc` snapshots, so readers never
/// observe a partially populated collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassFieldInfo {
    entries: HashMap<FieldKey, FieldLatticeEntry>,
}

impl ClassFieldInfo {
    /// Builds the collection from pruned entries.
    pub(crate) fn from_entries(entries: HashMap<FieldKey, FieldLatticeEntry>) -> Self {
        ClassFieldInfo { entries }
    }

    /// The entry for `key`, if one was retained.
    pub fn get(&self, key: &FieldKey) -> Option<&FieldLatticeEntry> {
        self.entries.get(key)
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All retained entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldLatticeEntry)> {
        self.entries.iter()
    }
}
