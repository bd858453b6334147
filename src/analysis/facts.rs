//! Fact structures extracted from class files.

use std::fmt;

use super::descriptor::{parse_field_descriptor, FieldType};
use super::instructions::{Instruction, MethodRef};
use super::names::ClassName;

/// JVM access flags shared by classes, fields and methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: AccessFlags = AccessFlags(0x0001);
    pub const PRIVATE: AccessFlags = AccessFlags(0x0002);
    pub const PROTECTED: AccessFlags = AccessFlags(0x0004);
    pub const STATIC: AccessFlags = AccessFlags(0x0008);
    pub const FINAL: AccessFlags = AccessFlags(0x0010);
    pub const INTERFACE: AccessFlags = AccessFlags(0x0200);
    pub const ABSTRACT: AccessFlags = AccessFlags(0x0400);
    pub const ENUM: AccessFlags = AccessFlags(0x4000);

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    pub fn is_enum(self) -> bool {
        self.contains(Self::ENUM)
    }

    /// Visibility keyword as it would appear in source.
    pub fn visibility(self) -> &'static str {
        if self.is_public() {
            "public"
        } else if self.is_protected() {
            "protected"
        } else if self.is_private() {
            "private"
        } else {
            "package-private"
        }
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | rhs.0)
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFacts {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
}

impl FieldFacts {
    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn is_final(&self) -> bool {
        self.access.is_final()
    }

    pub fn is_array(&self) -> bool {
        self.descriptor.starts_with('[')
    }

    /// Parsed declared type, None if the descriptor is malformed.
    pub fn field_type(&self) -> Option<FieldType> {
        parse_field_descriptor(&self.descriptor).ok()
    }
}

/// Exception table entry, expressed in instruction indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First covered instruction (inclusive).
    pub start: usize,
    /// End of the covered range (exclusive).
    pub end: usize,
    /// First instruction of the handler.
    pub handler: usize,
    /// Caught type, None for `finally` blocks.
    pub catch_type: Option<ClassName>,
}

impl ExceptionHandler {
    pub fn covers(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// A declared method and its decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFacts {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    /// Size of the local-variable array.
    pub max_locals: u16,
    /// Empty for abstract and native methods.
    pub instructions: Vec<Instruction>,
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodFacts {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn is_private(&self) -> bool {
        self.access.is_private()
    }

    pub fn has_code(&self) -> bool {
        !self.instructions.is_empty()
    }

    /// Identity of this method when declared by `owner`.
    pub fn id(&self, owner: &ClassName) -> MethodRef {
        MethodRef::new(owner.clone(), &self.name, &self.descriptor)
    }
}

/// Everything the analysis needs to know about one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFacts {
    pub name: ClassName,
    /// None only for `java.lang.Object` and module descriptors.
    pub super_name: Option<ClassName>,
    pub interfaces: Vec<ClassName>,
    pub access: AccessFlags,
    pub fields: Vec<FieldFacts>,
    pub methods: Vec<MethodFacts>,
}

impl ClassFacts {
    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    pub fn is_final(&self) -> bool {
        self.access.is_final()
    }

    pub fn is_enum(&self) -> bool {
        self.access.is_enum()
    }

    /// Find a declared method by name and descriptor.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodFacts> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodFacts> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    /// Non-static fields.
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldFacts> {
        self.fields.iter().filter(|f| !f.is_static())
    }
}

impl fmt::Display for ClassFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} fields, {} methods)",
            self.name,
            self.fields.len(),
            self.methods.len()
        )
    }
}
