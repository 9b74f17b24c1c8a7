//! IR node vocabulary.
//!
//! Trees are built from a deliberately small, closed operation set: bytecode
//! shorthand forms are canonicalized away during translation (`iload_2` becomes
//! a [`IlOp::LocalLoad`] with payload `Local(2)`, `iinc` becomes a
//! load/add/store triple), so every downstream consumer matches on one opcode
//! per concept instead of one per encoding.

use std::sync::Arc;

use bitflags::bitflags;

use crate::resolver::{ClassDescriptor, FieldDescriptor, MethodDescriptor};

/// Stack value categories.
///
/// Category-2 values (long/double) occupy one simulated stack entry like
/// everything else; the category only matters to the untyped stack-shuffling
/// bytecodes (`pop2`, `dup2`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 32-bit integer, including the sub-int types.
    Int,
    /// 64-bit integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Object or array reference.
    Reference,
}

impl ValueType {
    /// Whether this is a category-2 (two-word) value.
    pub fn is_category2(self) -> bool {
        matches!(self, ValueType::Long | ValueType::Double)
    }
}

/// Branch conditions of the two-way compare-and-branch node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Signed less than.
    Lt,
    /// Signed greater or equal.
    Ge,
    /// Signed greater than.
    Gt,
    /// Signed less or equal.
    Le,
}

impl Condition {
    /// Evaluates the condition over two integer constants.
    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Condition::Eq => lhs == rhs,
            Condition::Ne => lhs != rhs,
            Condition::Lt => lhs < rhs,
            Condition::Ge => lhs >= rhs,
            Condition::Gt => lhs > rhs,
            Condition::Le => lhs <= rhs,
        }
    }
}

/// Conversion bytecodes, carried as a payload of [`IlOp::Conv`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ConvKind {
    I2l,
    I2f,
    I2d,
    L2i,
    L2f,
    L2d,
    F2i,
    F2l,
    F2d,
    D2i,
    D2l,
    D2f,
    I2b,
    I2c,
    I2s,
}

impl ConvKind {
    /// The value type of the conversion result.
    pub fn result(self) -> ValueType {
        use ConvKind::*;
        match self {
            L2i | F2i | D2i | I2b | I2c | I2s => ValueType::Int,
            I2l | F2l | D2l => ValueType::Long,
            I2f | L2f | D2f => ValueType::Float,
            I2d | L2d | F2d => ValueType::Double,
        }
    }

    /// The value type of the operand.
    pub fn operand(self) -> ValueType {
        use ConvKind::*;
        match self {
            I2l | I2f | I2d | I2b | I2c | I2s => ValueType::Int,
            L2i | L2f | L2d => ValueType::Long,
            F2i | F2l | F2d => ValueType::Float,
            D2i | D2l | D2f => ValueType::Double,
        }
    }

    /// Whether this is one of the int-to-sub-int narrowing forms.
    ///
    /// These may wrap the arithmetic of a byte/char/short field without the
    /// field's value escaping.
    pub fn narrows_int(self) -> bool {
        matches!(self, ConvKind::I2b | ConvKind::I2c | ConvKind::I2s)
    }
}

/// Three-way value comparisons (`lcmp`, `fcmpl`, `fcmpg`, `dcmpl`, `dcmpg`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpKind {
    /// `lcmp`.
    Long,
    /// `fcmpl` - NaN compares as less.
    FloatL,
    /// `fcmpg` - NaN compares as greater.
    FloatG,
    /// `dcmpl`.
    DoubleL,
    /// `dcmpg`.
    DoubleG,
}

/// Dispatch flavor of a call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// `invokevirtual`.
    Virtual,
    /// `invokespecial`.
    Special,
    /// `invokestatic`.
    Static,
    /// `invokeinterface`.
    Interface,
}

/// A field access site: pool index plus descriptor when resolved.
///
/// An unresolved reference keeps only the index; the generated access runs
/// behind a resolve guard at execution time.
#[derive(Clone, Debug)]
pub struct FieldRef {
    /// Constant-pool index at the access site.
    pub index: u16,
    /// The resolved descriptor, `None` when resolution failed.
    pub target: Option<Arc<FieldDescriptor>>,
}

/// A call site: dispatch kind, pool index, descriptor when resolved.
#[derive(Clone, Debug)]
pub struct MethodRef {
    /// Dispatch flavor.
    pub kind: CallKind,
    /// Constant-pool index at the call site.
    pub index: u16,
    /// The resolved descriptor, `None` when resolution failed.
    pub target: Option<Arc<MethodDescriptor>>,
}

/// A class reference: pool index plus descriptor when resolved.
#[derive(Clone, Debug)]
pub struct ClassRef {
    /// Constant-pool index at the reference site.
    pub index: u16,
    /// The resolved descriptor, `None` when resolution failed.
    pub target: Option<Arc<ClassDescriptor>>,
}

/// Element type of an array allocation.
#[derive(Clone, Debug)]
pub enum ArrayElem {
    /// Primitive element, by `newarray` type code.
    Primitive(u8),
    /// Reference element or nested array class.
    Class(ClassRef),
}

/// Payload of an array-allocation node.
#[derive(Clone, Debug)]
pub struct ArraySpec {
    /// What the array holds.
    pub elem: ArrayElem,
    /// Number of dimension operands (children of the node).
    pub dims: u8,
}

/// Normalized jump table shared by both switch forms.
#[derive(Clone, Debug)]
pub struct SwitchSpec {
    /// Target when no case matches.
    pub default: usize,
    /// Match keys with their targets.
    pub cases: Vec<(i32, usize)>,
}

/// Compare-and-branch payload.
#[derive(Clone, Copy, Debug)]
pub struct BranchSpec {
    /// The comparison applied to the two children.
    pub cond: Condition,
    /// Byte index of the taken target.
    pub target: usize,
}

/// Identity of a pending-push persisted slot within one translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u16);

/// Per-node auxiliary payload.
#[derive(Clone, Debug)]
pub enum Payload {
    /// No payload.
    None,
    /// Int constant.
    Int(i32),
    /// Long constant.
    Long(i64),
    /// Float constant.
    Float(f32),
    /// Double constant.
    Double(f64),
    /// String constant.
    Str(Arc<str>),
    /// Local-variable index.
    Local(u16),
    /// Persisted-slot identity.
    Slot(SlotId),
    /// Field access site.
    Field(FieldRef),
    /// Call site.
    Method(MethodRef),
    /// Class reference site.
    Class(ClassRef),
    /// Conversion flavor.
    Conversion(ConvKind),
    /// Three-way comparison flavor.
    Cmp(CmpKind),
    /// Compare-and-branch condition and target.
    Branch(BranchSpec),
    /// Unconditional jump target.
    Target(usize),
    /// Jump table.
    Switch(Box<SwitchSpec>),
    /// Array allocation shape.
    NewArray(Box<ArraySpec>),
}

impl Payload {
    /// The integer value if this is an int constant payload.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Payload::Int(value) => Some(*value),
            _ => None,
        }
    }
}

bitflags! {
    /// Speculation and bookkeeping marks on a node.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// The value is provably non-null (cached field fact); the null check
        /// on this value may be elided downstream.
        const KNOWN_NON_NULL = 0x01;
        /// Virtual call with a receiver of exactly known type; dispatch may be
        /// done directly.
        const DEVIRTUALIZED = 0x02;
        /// The value has already been made observably live by an anchor
        /// statement; it must not be anchored again.
        const ANCHORED = 0x04;
        /// Transition-point candidate that failed the cost heuristic; the
        /// conservative execution mode cannot resume at this site.
        const CANNOT_RESUME = 0x08;
        /// The value's runtime type is exactly the signature cached for the
        /// loaded field; virtual dispatch on it may be devirtualized.
        const EXACT_TYPE = 0x10;
    }
}

/// The closed IR operation set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IlOp {
    /// Literal constant; payload holds the value, dtype the category.
    Const,
    /// The null reference constant.
    Null,
    /// Load of a local variable; payload `Local`.
    LocalLoad,
    /// Store to a local variable; children `[value]`, payload `Local`.
    LocalStore,
    /// Load of a pending-push persisted slot; payload `Slot`.
    SlotLoad,
    /// Store to a pending-push persisted slot; children `[value]`, payload `Slot`.
    SlotStore,
    /// Instance field load; children `[receiver]`, payload `Field`.
    FieldLoad,
    /// Instance field store; children `[receiver, value]`, payload `Field`.
    FieldStore,
    /// Static field load; payload `Field`.
    StaticLoad,
    /// Static field store; children `[value]`, payload `Field`.
    StaticStore,
    /// Array element load; children `[array, index]`.
    ElemLoad,
    /// Array element store; children `[array, index, value]`.
    ElemStore,
    /// Array length; children `[array]`.
    ArrayLength,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Rem,
    /// Negation.
    Neg,
    /// Shift left.
    Shl,
    /// Arithmetic shift right.
    Shr,
    /// Logical shift right.
    Ushr,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Numeric conversion; children `[value]`, payload `Conversion`.
    Conv,
    /// Three-way comparison; children `[lhs, rhs]`, payload `Cmp`.
    Cmp,
    /// Compare-and-branch; children `[lhs, rhs]`, payload `Branch`.
    IfCmp,
    /// Unconditional jump; payload `Target`.
    Goto,
    /// Multi-way jump; children `[selector]`, payload `Switch`.
    Switch,
    /// Return carrying a value; children `[value]`.
    ReturnValue,
    /// Void return.
    ReturnVoid,
    /// Call; children are the arguments, receiver first; payload `Method`.
    Call,
    /// Object allocation; payload `Class`.
    New,
    /// Array allocation; children are dimension counts, payload `NewArray`.
    NewArray,
    /// Type test; children `[object]`, payload `Class`.
    InstanceOf,
    /// Checked cast; children `[object]`, payload `Class`.
    CheckCast,
    /// Exception raise; children `[exception]`.
    Throw,
    /// Monitor acquisition; children `[object]`.
    MonitorEnter,
    /// Monitor release; children `[object]`.
    MonitorExit,
    /// Interruptibility checkpoint placed at backward-branch targets.
    AsyncCheck,
    /// Statement wrapper around a value; children `[value]`.
    Treetop,
    /// Keep-alive statement pinning a value's evaluation point; children `[value]`.
    Anchor,
}

impl IlOp {
    /// Whether operand order may be swapped without changing the result.
    pub fn commutative(self) -> bool {
        matches!(
            self,
            IlOp::Add | IlOp::Mul | IlOp::And | IlOp::Or | IlOp::Xor
        )
    }

    /// Whether a statement with this root mutates memory, control, or
    /// synchronization state.
    pub fn has_side_effect(self) -> bool {
        matches!(
            self,
            IlOp::LocalStore
                | IlOp::SlotStore
                | IlOp::FieldStore
                | IlOp::StaticStore
                | IlOp::ElemStore
                | IlOp::Call
                | IlOp::MonitorEnter
                | IlOp::MonitorExit
                | IlOp::Throw
        )
    }

    /// Whether this operation allocates.
    pub fn is_allocation(self) -> bool {
        matches!(self, IlOp::New | IlOp::NewArray)
    }

    /// Whether a statement with this root is a candidate deoptimization
    /// transition point.
    pub fn is_transition_candidate(self) -> bool {
        matches!(
            self,
            IlOp::Call | IlOp::New | IlOp::NewArray | IlOp::MonitorEnter | IlOp::MonitorExit
        )
    }

    /// Whether this op wraps a value purely to sequence it as a statement.
    pub fn is_wrapper(self) -> bool {
        matches!(self, IlOp::Treetop | IlOp::Anchor)
    }

    /// Whether evaluating this operation is observable: it writes memory, can
    /// trap, or can trigger class initialization.
    ///
    /// A popped tree containing an observable operation cannot be silently
    /// dropped; it must survive as a statement of its own.
    pub fn observable(self) -> bool {
        self.has_side_effect()
            || self.is_allocation()
            || matches!(
                self,
                IlOp::FieldLoad
                    | IlOp::StaticLoad
                    | IlOp::ElemLoad
                    | IlOp::ArrayLength
                    | IlOp::Div
                    | IlOp::Rem
                    | IlOp::CheckCast
            )
    }
}
