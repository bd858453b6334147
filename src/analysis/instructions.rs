//! Decoded JVM instructions.
//!
//! The reader collapses the ~200 JVM opcodes into the handful of shapes the
//! abstract interpreter needs. Branch targets are instruction indices, not
//! byte offsets.

use std::fmt;

use super::names::ClassName;

/// Computational kind of a value on the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl Kind {
    /// Category-2 values (long, double).
    pub fn is_wide(self) -> bool {
        matches!(self, Kind::Long | Kind::Double)
    }

    /// Kind of a primitive descriptor character.
    pub fn from_descriptor_char(c: char) -> Kind {
        match c {
            'J' => Kind::Long,
            'F' => Kind::Float,
            'D' => Kind::Double,
            _ => Kind::Int,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// Operand-stack manipulation opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOp {
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
}

/// Loadable constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Null,
    Int,
    Long,
    Float,
    Double,
    String,
    Class,
    /// Method handles, method types and dynamic constants.
    Other,
}

/// Symbolic reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: ClassName,
    pub name: String,
    pub descriptor: String,
}

impl FieldRef {
    pub fn new(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.into(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// Symbolic reference to a method. Also used as the identity of a declared method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    pub owner: ClassName,
    pub name: String,
    pub descriptor: String,
}

impl MethodRef {
    pub fn new(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.into(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Constant(Constant),
    Load { kind: Kind, slot: u16 },
    Store { kind: Kind, slot: u16 },
    /// `iinc`
    Increment { slot: u16 },
    ArrayLoad(Kind),
    ArrayStore(Kind),
    Stack(StackOp),
    /// Arithmetic, conversion and comparison: pops `pops` values and pushes `push`.
    Compute { pops: u8, push: Option<Kind> },
    /// Conditional jump popping `pops` operands.
    Branch { pops: u8, target: usize },
    Goto { target: usize },
    /// `tableswitch` / `lookupswitch`
    Switch { targets: Vec<usize>, default: usize },
    Return(Option<Kind>),
    Throw,
    GetField(FieldRef),
    PutField(FieldRef),
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    Invoke { kind: InvokeKind, method: MethodRef },
    /// `bootstrap` is the class declaring the call site's bootstrap method,
    /// when the class file names one.
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: Option<ClassName>,
    },
    New(ClassName),
    /// `newarray`, `anewarray`, `multianewarray`; `descriptor` is the resulting array type.
    NewArray { descriptor: String, dimensions: u8 },
    ArrayLength,
    /// `checkcast` with the target type as a field descriptor.
    CheckCast(String),
    InstanceOf,
    /// `monitorenter` / `monitorexit`
    Monitor,
}

impl Instruction {
    pub fn aload(slot: u16) -> Self {
        Instruction::Load {
            kind: Kind::Reference,
            slot,
        }
    }

    pub fn iload(slot: u16) -> Self {
        Instruction::Load {
            kind: Kind::Int,
            slot,
        }
    }

    pub fn astore(slot: u16) -> Self {
        Instruction::Store {
            kind: Kind::Reference,
            slot,
        }
    }

    pub fn aconst_null() -> Self {
        Instruction::Constant(Constant::Null)
    }

    pub fn iconst() -> Self {
        Instruction::Constant(Constant::Int)
    }

    pub fn dup() -> Self {
        Instruction::Stack(StackOp::Dup)
    }

    pub fn pop() -> Self {
        Instruction::Stack(StackOp::Pop)
    }

    pub fn new_object(class: impl Into<ClassName>) -> Self {
        Instruction::New(class.into())
    }

    pub fn getfield(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Instruction::GetField(FieldRef::new(owner, name, descriptor))
    }

    pub fn putfield(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Instruction::PutField(FieldRef::new(owner, name, descriptor))
    }

    pub fn getstatic(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Instruction::GetStatic(FieldRef::new(owner, name, descriptor))
    }

    pub fn putstatic(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Instruction::PutStatic(FieldRef::new(owner, name, descriptor))
    }

    pub fn invoke(kind: InvokeKind, owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Instruction::Invoke {
            kind,
            method: MethodRef::new(owner, name, descriptor),
        }
    }

    pub fn invokespecial(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Self::invoke(InvokeKind::Special, owner, name, descriptor)
    }

    pub fn invokevirtual(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Self::invoke(InvokeKind::Virtual, owner, name, descriptor)
    }

    pub fn invokestatic(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Self::invoke(InvokeKind::Static, owner, name, descriptor)
    }

    pub fn invokeinterface(owner: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Self::invoke(InvokeKind::Interface, owner, name, descriptor)
    }

    pub fn invokedynamic(bootstrap: impl Into<ClassName>, name: &str, descriptor: &str) -> Self {
        Instruction::InvokeDynamic {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            bootstrap: Some(bootstrap.into()),
        }
    }

    pub fn return_void() -> Self {
        Instruction::Return(None)
    }

    pub fn areturn() -> Self {
        Instruction::Return(Some(Kind::Reference))
    }

    /// Indices this instruction may jump to, besides falling through.
    pub fn jump_targets(&self) -> Vec<usize> {
        match self {
            Instruction::Branch { target, .. } | Instruction::Goto { target } => vec![*target],
            Instruction::Switch { targets, default } => {
                let mut all = targets.clone();
                all.push(*default);
                all
            }
            _ => Vec::new(),
        }
    }

    /// Whether execution can continue with the next instruction.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto { .. }
                | Instruction::Switch { .. }
                | Instruction::Return(_)
                | Instruction::Throw
        )
    }

    /// Rewrite branch targets through `map` (used when decoding byte offsets).
    pub(crate) fn remap_targets<F>(&mut self, mut map: F) -> anyhow::Result<()>
    where
        F: FnMut(usize) -> anyhow::Result<usize>,
    {
        match self {
            Instruction::Branch { target, .. } | Instruction::Goto { target } => {
                *target = map(*target)?;
            }
            Instruction::Switch { targets, default } => {
                for target in targets.iter_mut() {
                    *target = map(*target)?;
                }
                *default = map(*default)?;
            }
            _ => {}
        }
        Ok(())
    }
}
