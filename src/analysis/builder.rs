//! In-memory construction of class facts.
//!
//! Useful for embedding the analysis where classes are produced by some other
//! front end, and for describing fixtures without a Java compiler:
//!
//! ```
//! use mutcheck::analysis::{AccessFlags, ClassBuilder, Instruction, MethodBuilder};
//!
//! let point = ClassBuilder::new("com.acme.Point")
//!     .final_class()
//!     .field("x", "I", AccessFlags::PRIVATE | AccessFlags::FINAL)
//!     .method(
//!         MethodBuilder::constructor("(I)V")
//!             .code(vec![
//!                 Instruction::aload(0),
//!                 Instruction::invokespecial("java.lang.Object", "<init>", "()V"),
//!                 Instruction::aload(0),
//!                 Instruction::iload(1),
//!                 Instruction::putfield("com.acme.Point", "x", "I"),
//!                 Instruction::return_void(),
//!             ])
//!             .build(),
//!     )
//!     .build();
//! assert_eq!(point.fields.len(), 1);
//! ```

use super::descriptor::parse_method_descriptor;
use super::facts::{AccessFlags, ClassFacts, ExceptionHandler, FieldFacts, MethodFacts};
use super::instructions::Instruction;
use super::names::ClassName;

/// Builder for [`ClassFacts`].
pub struct ClassBuilder {
    facts: ClassFacts,
}

impl ClassBuilder {
    /// A public class extending `java.lang.Object`.
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            facts: ClassFacts {
                name: name.into(),
                super_name: Some(ClassName::new("java.lang.Object")),
                interfaces: Vec::new(),
                access: AccessFlags::PUBLIC,
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.facts.access = access;
        self
    }

    pub fn final_class(mut self) -> Self {
        self.facts.access = self.facts.access | AccessFlags::FINAL;
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.facts.access = self.facts.access | AccessFlags::ABSTRACT;
        self
    }

    pub fn interface(mut self) -> Self {
        self.facts.access = self.facts.access | AccessFlags::INTERFACE | AccessFlags::ABSTRACT;
        self
    }

    pub fn super_class(mut self, name: impl Into<ClassName>) -> Self {
        self.facts.super_name = Some(name.into());
        self
    }

    pub fn implements(mut self, name: impl Into<ClassName>) -> Self {
        self.facts.interfaces.push(name.into());
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str, access: AccessFlags) -> Self {
        self.facts.fields.push(FieldFacts {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
        });
        self
    }

    pub fn method(mut self, method: MethodFacts) -> Self {
        self.facts.methods.push(method);
        self
    }

    /// Add `public <init>()V` that only calls the superclass constructor.
    pub fn default_constructor(self) -> Self {
        let super_name = self
            .facts
            .super_name
            .clone()
            .unwrap_or_else(|| ClassName::new("java.lang.Object"));
        self.method(
            MethodBuilder::constructor("()V")
                .code(vec![
                    Instruction::aload(0),
                    Instruction::invokespecial(super_name, "<init>", "()V"),
                    Instruction::return_void(),
                ])
                .build(),
        )
    }

    pub fn build(self) -> ClassFacts {
        self.facts
    }
}

/// Builder for [`MethodFacts`].
pub struct MethodBuilder {
    facts: MethodFacts,
    explicit_locals: bool,
}

impl MethodBuilder {
    /// A public instance method.
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            facts: MethodFacts {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                access: AccessFlags::PUBLIC,
                max_locals: 0,
                instructions: Vec::new(),
                handlers: Vec::new(),
            },
            explicit_locals: false,
        }
    }

    /// A public constructor.
    pub fn constructor(descriptor: &str) -> Self {
        Self::new("<init>", descriptor)
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.facts.access = access;
        self
    }

    pub fn code(mut self, instructions: Vec<Instruction>) -> Self {
        self.facts.instructions = instructions;
        self
    }

    pub fn handler(mut self, handler: ExceptionHandler) -> Self {
        self.facts.handlers.push(handler);
        self
    }

    pub fn max_locals(mut self, max_locals: u16) -> Self {
        self.facts.max_locals = max_locals;
        self.explicit_locals = true;
        self
    }

    /// Finish the method, deriving `max_locals` from the descriptor and the
    /// highest slot used when it was not set explicitly.
    pub fn build(mut self) -> MethodFacts {
        if !self.explicit_locals {
            let receiver = usize::from(!self.facts.access.is_static());
            let params = parse_method_descriptor(&self.facts.descriptor)
                .map(|sig| sig.parameter_slots())
                .unwrap_or(0);
            let used = self
                .facts
                .instructions
                .iter()
                .filter_map(|insn| match insn {
                    Instruction::Load { kind, slot } | Instruction::Store { kind, slot } => {
                        Some(*slot as usize + if kind.is_wide() { 2 } else { 1 })
                    }
                    Instruction::Increment { slot } => Some(*slot as usize + 1),
                    _ => None,
                })
                .max()
                .unwrap_or(0);
            let needed = (receiver + params).max(used);
            self.facts.max_locals = u16::try_from(needed).unwrap_or(u16::MAX);
        }
        self.facts
    }
}
