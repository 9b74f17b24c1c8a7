//! Symbol resolution at the boundary between the front end and the enclosing VM.
//!
//! The translator never touches constant pools, class files, or loader state
//! directly. Everything it needs to know about the world outside the method
//! body arrives through the [`Resolver`] trait: method/field/class descriptors
//! looked up by pool index, literal constants, and (for the field-lattice
//! analyzer) whole-class metadata with peekable method bodies.
//!
//! Resolution is allowed to fail without failing translation:
//! [`Resolution::Unresolved`] is a normal outcome that forces the translator
//! onto conservative guarded code paths, never an error.

use std::sync::Arc;

use bitflags::bitflags;

use crate::ir::ValueType;

/// Identity of a loaded class, assigned by the enclosing VM.
///
/// Value equality only; the front end never interprets the numeric value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Identity of a method within the enclosing VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

/// Outcome of a symbol lookup.
///
/// An unresolved symbol is not an error: downstream code keeps the pool index,
/// emits a resolve guard, and proceeds. Hard failures exist only for malformed
/// bytecode, never for missing symbols.
#[derive(Clone, Debug)]
pub enum Resolution<T> {
    /// The symbol is resolved and its descriptor is available.
    Resolved(T),
    /// The symbol could not be resolved at compile time.
    Unresolved,
}

impl<T> Resolution<T> {
    /// Returns `true` if the lookup produced a descriptor.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// Borrows the descriptor, if resolved.
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            Resolution::Unresolved => None,
        }
    }

    /// Consumes the resolution, yielding the descriptor if resolved.
    pub fn into_resolved(self) -> Option<T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            Resolution::Unresolved => None,
        }
    }
}

/// A literal constant from the pool (`ldc` family).
#[derive(Clone, Debug)]
pub enum Literal {
    /// 32-bit integer constant.
    Int(i32),
    /// 64-bit integer constant.
    Long(i64),
    /// 32-bit float constant.
    Float(f32),
    /// 64-bit float constant.
    Double(f64),
    /// Interned string constant.
    Str(Arc<str>),
    /// Class object constant.
    Class(Arc<ClassDescriptor>),
}

bitflags! {
    /// Access and implementation properties of a resolved method.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MethodFlags: u16 {
        /// Declared `private`.
        const PRIVATE = 0x0001;
        /// Declared `static`.
        const STATIC = 0x0002;
        /// Declared `final`, or effectively final (no override exists).
        const FINAL = 0x0004;
        /// Native or JIT-internal-native implementation.
        const NATIVE = 0x0008;
        /// Abstract, no body.
        const ABSTRACT = 0x0010;
        /// An instance constructor.
        const CONSTRUCTOR = 0x0020;
        /// The class initializer.
        const CLASS_INITIALIZER = 0x0040;
        /// At least one override exists somewhere in the loaded hierarchy.
        const OVERRIDDEN = 0x0080;
        /// Belongs to the reflection machinery of the runtime library.
        const REFLECTIVE = 0x0100;
    }
}

bitflags! {
    /// Access properties of a resolved field.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FieldFlags: u8 {
        /// Declared `private`.
        const PRIVATE = 0x01;
        /// Declared `static`.
        const STATIC = 0x02;
        /// Declared `final`.
        const FINAL = 0x04;
    }
}

/// Numeric wrapper classes the escape classifier is allowed to reason about.
///
/// Arbitrary-precision decimal and integer types whose arithmetic methods are
/// pure: calling them on a field's value does not count as the field escaping,
/// it only refines the wrapped-arithmetic-type assumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericWrapper {
    /// The arbitrary-precision decimal wrapper.
    Decimal,
    /// The arbitrary-precision integer wrapper.
    Integer,
}

/// Allow-listed operations on [`NumericWrapper`] receivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognizedMethod {
    /// Decimal `add`.
    DecimalAdd,
    /// Decimal `subtract`.
    DecimalSubtract,
    /// Decimal `multiply`.
    DecimalMultiply,
    /// Integer `add`.
    IntegerAdd,
    /// Integer `subtract`.
    IntegerSubtract,
    /// Integer `multiply`.
    IntegerMultiply,
}

impl RecognizedMethod {
    /// The wrapper class this operation belongs to.
    pub fn wrapper(self) -> NumericWrapper {
        match self {
            RecognizedMethod::DecimalAdd
            | RecognizedMethod::DecimalSubtract
            | RecognizedMethod::DecimalMultiply => NumericWrapper::Decimal,
            RecognizedMethod::IntegerAdd
            | RecognizedMethod::IntegerSubtract
            | RecognizedMethod::IntegerMultiply => NumericWrapper::Integer,
        }
    }
}

/// A resolved method, as seen through a call site.
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    /// Declaring class.
    pub class: ClassId,
    /// VM identity, stable across pool indices referring to the same method.
    pub method: MethodId,
    /// Method name, for diagnostics and traces.
    pub name: Arc<str>,
    /// Raw signature bytes.
    pub signature: Arc<[u8]>,
    /// Access and implementation properties.
    pub flags: MethodFlags,
    /// Number of operand values a call consumes, receiver included.
    ///
    /// Category-2 values (long/double) count once: the simulated operand stack
    /// holds one entry per value regardless of category.
    pub arg_values: u8,
    /// Type of the pushed result, `None` for `void`.
    pub return_value: Option<ValueType>,
    /// Override fan-out, used by the deoptimization cost heuristic.
    pub complexity: u32,
    /// Set when this is an allow-listed numeric-wrapper operation.
    pub recognized: Option<RecognizedMethod>,
}

impl MethodDescriptor {
    /// Whether two descriptors denote the same method.
    pub fn is_same_method(&self, other: &MethodDescriptor) -> bool {
        self.method == other.method
    }
}

/// The stack effect of a call site, read off the pool descriptor.
///
/// Unlike [`MethodDescriptor`], this survives resolution failure: the constant
/// pool always carries the signature, so the translator can pop the arguments
/// and type the result of a call it could not resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallShape {
    /// Number of operand values the call consumes, receiver included.
    pub arg_values: u8,
    /// Type of the pushed result, `None` for `void`.
    pub return_value: Option<ValueType>,
}

/// A resolved field, as seen through an access site.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    /// Declaring class.
    pub class: ClassId,
    /// Raw field-type signature bytes (`I`, `[J`, `Lpkg/Name;`, ...).
    pub signature: Arc<[u8]>,
    /// Access properties.
    pub flags: FieldFlags,
    /// Set when the declared type is a recognized numeric wrapper.
    pub wrapper: Option<NumericWrapper>,
}

impl FieldDescriptor {
    /// The stack value category of this field's values, derived from the
    /// leading signature byte.
    pub fn value_type(&self) -> ValueType {
        match self.signature.first() {
            Some(b'J') => ValueType::Long,
            Some(b'F') => ValueType::Float,
            Some(b'D') => ValueType::Double,
            Some(b'L') | Some(b'[') => ValueType::Reference,
            _ => ValueType::Int,
        }
    }

    /// Whether the field's declared type is an array.
    pub fn is_array(&self) -> bool {
        self.signature.first() == Some(&b'[')
    }
}

/// A resolved class.
#[derive(Clone, Debug)]
pub struct ClassDescriptor {
    /// VM identity.
    pub id: ClassId,
    /// Internal class name, for diagnostics and exact-type signatures.
    pub name: Arc<str>,
    /// Set when this class is a recognized numeric wrapper.
    pub wrapper: Option<NumericWrapper>,
}

impl ClassDescriptor {
    /// The exact-type signature bytes for values of this class (`Lname;`).
    pub fn type_signature(&self) -> Vec<u8> {
        let mut signature = Vec::with_capacity(self.name.len() + 2);
        signature.push(b'L');
        signature.extend_from_slice(self.name.as_bytes());
        signature.push(b';');
        signature
    }
}

/// One method of a class, as presented to the field-lattice analyzer.
#[derive(Clone, Debug)]
pub struct ScannedMethod {
    /// The method's descriptor.
    pub descriptor: MethodDescriptor,
    /// The method body, absent for native and abstract methods.
    pub body: Option<Arc<[u8]>>,
}

/// Whole-class metadata for the field-lattice analyzer.
#[derive(Clone, Debug)]
pub struct ClassMetadata {
    /// VM identity of the class.
    pub id: ClassId,
    /// Whether static initialization has completed.
    pub initialized: bool,
    /// Number of inner classes declared by this class.
    pub inner_classes: u32,
    /// Every declared method, constructors and the class initializer included.
    pub methods: Vec<ScannedMethod>,
}

/// The front end's window into the enclosing VM.
///
/// One resolver instance covers one compilation context: pool indices passed to
/// the `resolve_*` methods are interpreted against the class whose method is
/// being translated or peeked. Implementations must be cheap to call; results
/// are not cached by the front end.
pub trait Resolver {
    /// Resolves a method reference by pool index.
    fn resolve_method(&self, index: u16) -> Resolution<MethodDescriptor>;

    /// Resolves a field reference by pool index.
    fn resolve_field(&self, index: u16) -> Resolution<FieldDescriptor>;

    /// Resolves a class reference by pool index.
    fn resolve_class(&self, index: u16) -> Resolution<ClassDescriptor>;

    /// Fetches a literal constant by pool index.
    ///
    /// Returns `None` when the index does not denote a loadable constant; the
    /// decoder treats that as malformed input.
    fn constant(&self, index: u16) -> Option<Literal>;

    /// Fetches the stack effect of a call site by pool index.
    ///
    /// Shapes come from the pool descriptor, so one is expected even when
    /// [`resolve_method`](Resolver::resolve_method) answers `Unresolved`.
    /// Returns `None` when the index does not denote a method reference; the
    /// decoder treats that as malformed input.
    fn call_shape(&self, index: u16) -> Option<CallShape>;

    /// Fetches the value category of a field-access site by pool index.
    ///
    /// Like [`call_shape`](Resolver::call_shape), this reads the pool
    /// descriptor and survives resolution failure, so the translator can type
    /// the stack effect of an access it could not resolve. Returns `None` when
    /// the index does not denote a field reference; the decoder treats that as
    /// malformed input.
    fn field_shape(&self, index: u16) -> Option<ValueType>;

    /// Fetches the class-level metadata the field-lattice analyzer scans.
    ///
    /// `Unresolved` here means the metadata is unreadable, which permanently
    /// vetoes analysis for the class.
    fn class_metadata(&self, class: ClassId) -> Resolution<ClassMetadata>;
}
