//! Shared fixtures for the integration tests: a bytecode assembler and a
//! map-backed resolver, built purely on the public API.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use jitfront::prelude::*;

/// Assembles raw method bodies.
pub struct BodyWriter {
    code: Vec<u8>,
}

impl BodyWriter {
    pub fn new() -> Self {
        BodyWriter { code: Vec::new() }
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

pub fn method(id: u32, name: &str) -> MethodDescriptor {
    MethodDescriptor {
        class: ClassId(1),
        method: MethodId(id),
        name: Arc::from(name),
        signature: Arc::from(b"()V".as_slice()),
        flags: MethodFlags::empty(),
        arg_values: 1,
        return_value: None,
        complexity: 1,
        recognized: None,
    }
}

pub fn constructor(id: u32) -> MethodDescriptor {
    let mut descriptor = method(id, "<init>");
    descriptor.flags = MethodFlags::CONSTRUCTOR;
    descriptor
}

pub fn class_initializer(id: u32) -> MethodDescriptor {
    let mut descriptor = method(id, "<clinit>");
    descriptor.flags = MethodFlags::STATIC | MethodFlags::CLASS_INITIALIZER;
    descriptor.arg_values = 0;
    descriptor
}

pub fn field(class: u32, signature: &[u8]) -> FieldDescriptor {
    FieldDescriptor {
        class: ClassId(class),
        signature: Arc::from(signature),
        flags: FieldFlags::PRIVATE | FieldFlags::FINAL,
        wrapper: None,
    }
}

pub fn scanned(descriptor: MethodDescriptor, body: Vec<u8>) -> ScannedMethod {
    ScannedMethod {
        descriptor,
        body: Some(Arc::from(body.into_boxed_slice())),
    }
}

pub fn metadata(class: u32, methods: Vec<ScannedMethod>) -> ClassMetadata {
    ClassMetadata {
        id: ClassId(class),
        initialized: true,
        inner_classes: 0,
        methods,
    }
}

/// A canned [`Resolver`] backed by plain maps.
#[derive(Default)]
pub struct MapResolver {
    methods: HashMap<u16, MethodDescriptor>,
    fields: HashMap<u16, FieldDescriptor>,
    classes: HashMap<u16, ClassDescriptor>,
    constants: HashMap<u16, Literal>,
    metadata: HashMap<ClassId, ClassMetadata>,
}

impl MapResolver {
    pub fn new() -> Self {
        MapResolver::default()
    }

    pub fn with_method(mut self, index: u16, descriptor: MethodDescriptor) -> Self {
        self.methods.insert(index, descriptor);
        self
    }

    pub fn with_field(mut self, index: u16, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(index, descriptor);
        self
    }

    pub fn with_class(mut self, index: u16, descriptor: ClassDescriptor) -> Self {
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
}

impl Resolver for MapResolver {
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
            Some(descriptor) => Resolution::Resolved(descriptor.clone()),
            None => Resolution::Unresolved,
        }
    }

    fn constant(&self, index: u16) -> Option<Literal> {
        self.constants.get(&index).cloned()
    }

    fn call_shape(&self, index: u16) -> Option<CallShape> {
        self.methods.get(&index).map(|descriptor| CallShape {
            arg_values: descriptor.arg_values,
            return_value: descriptor.return_value,
        })
    }

    fn field_shape(&self, index: u16) -> Option<ValueType> {
        self.fields.get(&index).map(FieldDescriptor::value_type)
    }

    fn class_metadata(&self, class: ClassId) -> Resolution<ClassMetadata> {
        match self.metadata.get(&class) {
            Some(metadata) => Resolution::Resolved(metadata.clone()),
            None => Resolution::Unresolved,
        }
    }
}

/// Translates `code` against an empty resolver in the given mode.
pub fn translate_with(code: &[u8], config: &TranslationConfig) -> jitfront::Result<Translation> {
    Translator::new(&MapResolver::new(), config).translate(code)
}
