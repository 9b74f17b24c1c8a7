use std::collections::HashMap;
use std::sync::Arc;

use crate::bytecode::Opcode;
use crate::ir::ValueType;
use crate::resolver::{
    CallShape, ClassDescriptor, ClassId, ClassMetadata, FieldDescriptor, FieldFlags, Literal,
    MethodDescriptor, MethodFlags, MethodId, Resolution, Resolver, ScannedMethod,
};

/// Assembles raw method bodies for decoder and translator tests.
pub struct BytecodeWriter {
    code: Vec<u8>,
}

impl BytecodeWriter {
    pub fn new() -> Self {
        BytecodeWriter { code: Vec::new() }
    }

    pub fn op(mut self, op: Opcode) -> Self {
        self.code.push(op as u8);
        self
    }

    pub fn byte(mut self, value: u8) -> Self {
        self.code.push(value);
        self
    }

    pub fn short(mut self, value: u16) -> Self {
        self.code.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// A signed 16-bit branch offset, relative to the branching instruction.
    pub fn branch(mut self, offset: i16) -> Self {
        self.code.extend_from_slice(&offset.to_be_bytes());
        self
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn finish(self) -> Vec<u8> {
        self.code
    }
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        BytecodeWriter::new()
    }
}

// Helper function to create a ClassDescriptor
pub fn create_class(id: u32, name: &str) -> Arc<ClassDescriptor> {
    Arc::new(ClassDescriptor {
        id: ClassId(id),
        name: Arc::from(name),
        wrapper: None,
    })
}

// Helper function to create a MethodDescriptor; adjust the public fields for
// anything beyond a plain resolved instance method
pub fn create_method(method: u32, name: &str) -> MethodDescriptor {
    MethodDescriptor {
        class: ClassId(1),
        method: MethodId(method),
        name: Arc::from(name),
        signature: Arc::from(b"()V".as_slice()),
        flags: MethodFlags::empty(),
        arg_values: 1,
        return_value: None,
        complexity: 1,
        recognized: None,
    }
}

// Helper function to create a constructor descriptor
pub fn create_constructor(method: u32) -> MethodDescriptor {
    let mut descriptor = create_method(method, "<init>");
    descriptor.flags = MethodFlags::CONSTRUCTOR;
    descriptor
}

// Helper function to create the class-initializer descriptor
pub fn create_class_initializer(method: u32) -> MethodDescriptor {
    let mut descriptor = create_method(method, "<clinit>");
    descriptor.flags = MethodFlags::STATIC | MethodFlags::CLASS_INITIALIZER;
    descriptor.arg_values = 0;
    descriptor
}

// Helper function to create a FieldDescriptor
pub fn create_field(class: u32, signature: &[u8]) -> FieldDescriptor {
    FieldDescriptor {
        class: ClassId(class),
        signature: Arc::from(signature),
        flags: FieldFlags::PRIVATE | FieldFlags::FINAL,
        wrapper: None,
    }
}

// Helper function to pair a descriptor with a peekable body
pub fn create_scanned(descriptor: MethodDescriptor, body: Vec<u8>) -> ScannedMethod {
    ScannedMethod {
        descriptor,
        body: Some(Arc::from(body.into_boxed_slice())),
    }
}

// Helper function to create ClassMetadata over a method list
pub fn create_metadata(class: u32, methods: Vec<ScannedMethod>) -> ClassMetadata {
    ClassMetadata {
        id: ClassId(class),
        initialized: true,
        inner_classes: 0,
        methods,
    }
}

/// A canned [`Resolver`] backed by plain maps.
#[derive(Default)]
pub struct FixtureResolver {
    methods: HashMap<u16, MethodDescriptor>,
    fields: HashMap<u16, FieldDescriptor>,
    classes: HashMap<u16, Arc<ClassDescriptor>>,
    constants: HashMap<u16, Literal>,
    metadata: HashMap<ClassId, ClassMetadata>,
    shapes: HashMap<u16, CallShape>,
    field_shapes: HashMap<u16, ValueType>,
}

impl FixtureResolver {
    pub fn new() -> Self {
        FixtureResolver::default()
    }

    pub fn with_method(mut self, index: u16, descriptor: MethodDescriptor) -> Self {
        self.methods.insert(index, descriptor);
        self
    }

    pub fn with_field(mut self, index: u16, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(index, descriptor);
        self
    }

    pub fn with_class(mut self, index: u16, descriptor: Arc<ClassDescriptor>) -> Self {
        self.classes.insert(index, descriptor);
        self
    }

    pub fn with_constant(mut self, index: u16, literal: Literal) -> Self {
        self.constants.insert(index, literal);
        self
    }

    pub fn with_metadata(mut self, metadata: ClassMetadata) -> Self {
        self.metadata.insert(metadata.id, metadata);
        self
    }

    /// Pins the pool shape of a call site independently of method resolution,
    /// for unresolved-call tests.
    pub fn with_call_shape(mut self, index: u16, shape: CallShape) -> Self {
        self.shapes.insert(index, shape);
        self
    }

    /// Pins the value category of a field-access site independently of field
    /// resolution, for unresolved-field tests.
    pub fn with_field_shape(mut self, index: u16, dtype: ValueType) -> Self {
        self.field_shapes.insert(index, dtype);
        self
    }
}

impl Resolver for FixtureResolver {
    fn resolve_method(&self, index: u16) -> Resolution<MethodDescriptor> {
        match self.methods.get(&index) {
            Some(descriptor) => Resolution::Resolved(descriptor.clone()),
            None => Resolution::Unresolved,
        }
    }

    fn resolve_field(&self, index: u16) -> Resolution<FieldDescriptor> {
        match self.fields.get(&index) {
            Some(descriptor) => Resolution::Resolved(descriptor.clone()),
            None => Resolution::Unresolved,
        }
    }

    fn resolve_class(&self, index: u16) -> Resolution<ClassDescriptor> {
        match self.classes.get(&index) {
            Some(descriptor) => Resolution::Resolved(descriptor.as_ref().clone()),
            None => Resolution::Unresolved,
        }
    }

    fn constant(&self, index: u16) -> Option<Literal> {
        self.constants.get(&index).cloned()
    }

    fn call_shape(&self, index: u16) -> Option<CallShape> {
        self.shapes.get(&index).copied().or_else(|| {
            self.methods.get(&index).map(|descriptor| CallShape {
                arg_values: descriptor.arg_values,
                return_value: descriptor.return_value,
            })
        })
    }

    fn field_shape(&self, index: u16) -> Option<ValueType> {
        self.field_shapes.get(&index).copied().or_else(|| {
            self.fields
                .get(&index)
                .map(FieldDescriptor::value_type)
        })
    }

    fn class_metadata(&self, class: ClassId) -> Resolution<ClassMetadata> {
        match self.metadata.get(&class) {
            Some(metadata) => Resolution::Resolved(metadata.clone()),
            None => Resolution::Unresolved,
        }
    }
}

// Helper function to create an int-returning static method whose body pushes
// a small constant and returns it
pub fn create_trivial_int_method(method: u32, name: &str) -> (MethodDescriptor, Vec<u8>) {
    let mut descriptor = create_method(method, name);
    descriptor.flags = MethodFlags::STATIC;
    descriptor.arg_values = 0;
    descriptor.return_value = Some(ValueType::Int);
    descriptor.signature = Arc::from(b"()I".as_slice());
    let body = BytecodeWriter::new()
        .op(Opcode::Iconst0)
        .op(Opcode::Ireturn)
        .finish();
    (descriptor, body)
}
