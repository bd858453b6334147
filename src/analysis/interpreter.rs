//! Abstract interpretation of method bodies.
//!
//! [`interpret`] runs a worklist dataflow over a method's instructions and
//! returns the abstract frame (locals and operand stack) holding *before*
//! each instruction. Values remember enough provenance for the checkers to
//! tell `this` from other references, see where a reference came from
//! (parameter, constructor call, method return, field read), and recognise
//! nested idioms such as `unmodifiableList(new ArrayList(param))`.
//!
//! Long and double values occupy one operand-stack entry and two local
//! slots.

use std::collections::VecDeque;

use anyhow::{bail, Context, Result};

use super::descriptor::{parse_field_descriptor, parse_method_descriptor, FieldType};
use super::facts::{ClassFacts, MethodFacts};
use super::instructions::{Constant, FieldRef, Instruction, InvokeKind, Kind, MethodRef, StackOp};
use super::names::ClassName;

/// Upper bound on how often a single instruction is re-visited.
const MAX_VISITS_PER_INSTRUCTION: usize = 64;

/// How deep nested origins are remembered in call arguments.
const MAX_ORIGIN_DEPTH: usize = 3;

/// Where a reference value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Method parameter in the given local slot.
    Parameter(u16),
    /// Result of `new C(args)` once the constructor has run.
    Constructed { class: ClassName, args: Vec<Value> },
    /// Return value of a method call.
    Invocation { method: MethodRef, args: Vec<Value> },
    /// Read from a field.
    Field(FieldRef),
    /// `ldc` of a string, class or other constant.
    Constant,
    /// The exception bound at a handler entry.
    Caught,
    NewArray,
    /// Lost through merging, array loads or dynamic calls.
    Unknown,
}

/// A typed reference with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefValue {
    /// Static type when known.
    pub ty: Option<FieldType>,
    pub origin: Origin,
}

/// Abstract value held in a local slot or on the operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unset or conflicting.
    Top,
    Primitive(Kind),
    Null,
    /// The receiver of an instance method.
    This,
    /// Result of `new` whose constructor has not run yet.
    Uninitialized { class: ClassName, site: usize },
    Reference(RefValue),
}

impl Value {
    fn reference(ty: Option<FieldType>, origin: Origin) -> Value {
        Value::Reference(RefValue { ty, origin })
    }

    fn of_type(ty: FieldType, origin: Origin) -> Value {
        match ty {
            FieldType::Base(c) => Value::Primitive(Kind::from_descriptor_char(c)),
            other => Value::reference(Some(other), origin),
        }
    }

    pub fn is_this(&self) -> bool {
        matches!(self, Value::This)
    }

    pub fn is_wide(&self) -> bool {
        matches!(self, Value::Primitive(kind) if kind.is_wide())
    }

    pub fn as_reference(&self) -> Option<&RefValue> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Copy with nested origin arguments cut below `depth`.
    fn truncated(&self, depth: usize) -> Value {
        let Value::Reference(r) = self else {
            return self.clone();
        };
        let origin = match &r.origin {
            Origin::Constructed { class, args } if depth > 0 => Origin::Constructed {
                class: class.clone(),
                args: args.iter().map(|a| a.truncated(depth - 1)).collect(),
            },
            Origin::Invocation { method, args } if depth > 0 => Origin::Invocation {
                method: method.clone(),
                args: args.iter().map(|a| a.truncated(depth - 1)).collect(),
            },
            Origin::Constructed { .. } | Origin::Invocation { .. } => Origin::Unknown,
            other => other.clone(),
        };
        Value::reference(r.ty.clone(), origin)
    }

    fn merge(&self, other: &Value) -> Value {
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (Value::Null, Value::Reference(_)) | (Value::Null, Value::This) => other.clone(),
            (Value::Reference(_), Value::Null) | (Value::This, Value::Null) => self.clone(),
            (Value::Reference(a), Value::Reference(b)) => {
                let ty = if a.ty == b.ty { a.ty.clone() } else { None };
                Value::reference(ty, Origin::Unknown)
            }
            (Value::This, Value::Reference(_)) | (Value::Reference(_), Value::This) => {
                Value::reference(None, Origin::Unknown)
            }
            _ => Value::Top,
        }
    }
}

/// Abstract machine state before an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub locals: Vec<Value>,
    /// Bottom first.
    pub stack: Vec<Value>,
}

impl Frame {
    /// Value `depth` entries below the top of the stack (0 = top).
    pub fn peek(&self, depth: usize) -> Option<&Value> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.stack.get(i))
    }

    /// The top `count` stack values, bottom first.
    pub fn top(&self, count: usize) -> Option<&[Value]> {
        let start = self.stack.len().checked_sub(count)?;
        Some(&self.stack[start..])
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().context("operand stack underflow")
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .context("operand stack underflow")?;
        Ok(self.stack.split_off(start))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn local(&self, slot: u16) -> Result<Value> {
        self.locals
            .get(slot as usize)
            .cloned()
            .with_context(|| format!("local slot {} out of range", slot))
    }

    fn set_local(&mut self, slot: u16, value: Value, wide: bool) -> Result<()> {
        let slot = slot as usize;
        let needed = slot + if wide { 2 } else { 1 };
        if needed > self.locals.len() {
            bail!("local slot {} out of range", slot);
        }
        self.locals[slot] = value;
        if wide {
            self.locals[slot + 1] = Value::Top;
        }
        Ok(())
    }

    /// Replace every occurrence of an uninitialised value once its constructor ran.
    fn initialise(&mut self, from: &Value, to: &Value) {
        for value in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if *value == *from {
                *value = to.clone();
            }
        }
    }

    fn merge(&self, other: &Frame) -> Result<Frame> {
        if self.stack.len() != other.stack.len() {
            bail!(
                "operand stack height mismatch at merge ({} vs {})",
                self.stack.len(),
                other.stack.len()
            );
        }
        let locals = self
            .locals
            .iter()
            .zip(other.locals.iter())
            .map(|(a, b)| a.merge(b))
            .collect();
        let stack = self
            .stack
            .iter()
            .zip(other.stack.iter())
            .map(|(a, b)| a.merge(b))
            .collect();
        Ok(Frame { locals, stack })
    }
}

fn entry_frame(method: &MethodFacts) -> Result<Frame> {
    let signature = parse_method_descriptor(&method.descriptor)?;
    let receiver = usize::from(!method.is_static());
    let needed = receiver + signature.parameter_slots();
    let mut locals = vec![Value::Top; (method.max_locals as usize).max(needed)];

    let mut slot = 0usize;
    if !method.is_static() {
        locals[0] = Value::This;
        slot = 1;
    }
    for parameter in signature.parameters {
        let wide = parameter.is_wide();
        locals[slot] = Value::of_type(parameter, Origin::Parameter(slot as u16));
        slot += if wide { 2 } else { 1 };
    }
    Ok(Frame {
        locals,
        stack: Vec::new(),
    })
}

/// Abstract frames before each instruction of `method`; `None` marks
/// unreachable instructions. Methods without code yield an empty vector.
pub fn interpret(class: &ClassFacts, method: &MethodFacts) -> Result<Vec<Option<Frame>>> {
    let code = &method.instructions;
    if code.is_empty() {
        return Ok(Vec::new());
    }

    let mut frames: Vec<Option<Frame>> = vec![None; code.len()];
    let mut visits = vec![0usize; code.len()];
    let mut worklist = VecDeque::new();

    frames[0] = Some(entry_frame(method)?);
    worklist.push_back(0usize);

    while let Some(index) = worklist.pop_front() {
        visits[index] += 1;
        if visits[index] > MAX_VISITS_PER_INSTRUCTION {
            bail!(
                "{}.{}{}: analysis did not converge at instruction {}",
                class.name,
                method.name,
                method.descriptor,
                index
            );
        }
        let Some(before) = frames[index].clone() else {
            continue;
        };

        for handler in method.handlers.iter().filter(|h| h.covers(index)) {
            let caught = handler
                .catch_type
                .clone()
                .unwrap_or_else(|| ClassName::new("java.lang.Throwable"));
            let entry = Frame {
                locals: before.locals.clone(),
                stack: vec![Value::reference(Some(FieldType::Object(caught)), Origin::Caught)],
            };
            flow(&mut frames, &mut worklist, handler.handler, entry)?;
        }

        let instruction = &code[index];
        let after = step(&before, instruction, index)
            .with_context(|| format!("{}.{}{} at instruction {}", class.name, method.name, method.descriptor, index))?;

        for target in instruction.jump_targets() {
            flow(&mut frames, &mut worklist, target, after.clone())?;
        }
        if instruction.falls_through() {
            if index + 1 >= code.len() {
                bail!("{}.{}{}: execution falls off the end of the code", class.name, method.name, method.descriptor);
            }
            flow(&mut frames, &mut worklist, index + 1, after)?;
        }
    }

    Ok(frames)
}

fn flow(
    frames: &mut [Option<Frame>],
    worklist: &mut VecDeque<usize>,
    target: usize,
    incoming: Frame,
) -> Result<()> {
    let slot = frames
        .get_mut(target)
        .with_context(|| format!("jump target {} out of range", target))?;
    let merged = match slot {
        None => incoming,
        Some(existing) => {
            let merged = existing.merge(&incoming)?;
            if merged == *existing {
                return Ok(());
            }
            merged
        }
    };
    *slot = Some(merged);
    if !worklist.contains(&target) {
        worklist.push_back(target);
    }
    Ok(())
}

fn step(before: &Frame, instruction: &Instruction, index: usize) -> Result<Frame> {
    let mut frame = before.clone();
    match instruction {
        Instruction::Nop | Instruction::Goto { .. } => {}
        Instruction::Constant(constant) => {
            let value = match constant {
                Constant::Null => Value::Null,
                Constant::Int => Value::Primitive(Kind::Int),
                Constant::Long => Value::Primitive(Kind::Long),
                Constant::Float => Value::Primitive(Kind::Float),
                Constant::Double => Value::Primitive(Kind::Double),
                Constant::String => Value::reference(
                    Some(FieldType::Object(ClassName::new("java.lang.String"))),
                    Origin::Constant,
                ),
                Constant::Class => Value::reference(
                    Some(FieldType::Object(ClassName::new("java.lang.Class"))),
                    Origin::Constant,
                ),
                Constant::Other => Value::reference(None, Origin::Constant),
            };
            frame.push(value);
        }
        Instruction::Load { slot, .. } => {
            let value = frame.local(*slot)?;
            frame.push(value);
        }
        Instruction::Store { kind, slot } => {
            let value = frame.pop()?;
            frame.set_local(*slot, value, kind.is_wide())?;
        }
        Instruction::Increment { slot } => {
            frame.set_local(*slot, Value::Primitive(Kind::Int), false)?;
        }
        Instruction::ArrayLoad(kind) => {
            frame.pop()?;
            let array = frame.pop()?;
            let value = match kind {
                Kind::Reference => {
                    let element = array
                        .as_reference()
                        .and_then(|r| r.ty.as_ref())
                        .and_then(|ty| ty.element_type());
                    Value::reference(element, Origin::Unknown)
                }
                other => Value::Primitive(*other),
            };
            frame.push(value);
        }
        Instruction::ArrayStore(_) => {
            frame.pop_n(3)?;
        }
        Instruction::Stack(op) => stack_op(&mut frame, *op)?,
        Instruction::Compute { pops, push } => {
            frame.pop_n(*pops as usize)?;
            if let Some(kind) = push {
                frame.push(Value::Primitive(*kind));
            }
        }
        Instruction::Branch { pops, .. } => {
            frame.pop_n(*pops as usize)?;
        }
        Instruction::Switch { .. } | Instruction::Throw | Instruction::Monitor => {
            frame.pop()?;
        }
        Instruction::Return(kind) => {
            if kind.is_some() {
                frame.pop()?;
            }
        }
        Instruction::GetField(field) => {
            frame.pop()?;
            frame.push(field_value(field)?);
        }
        Instruction::GetStatic(field) => frame.push(field_value(field)?),
        Instruction::PutField(_) => {
            frame.pop_n(2)?;
        }
        Instruction::PutStatic(_) => {
            frame.pop()?;
        }
        Instruction::Invoke { kind, method } => invoke(&mut frame, *kind, method)?,
        Instruction::InvokeDynamic { descriptor, .. } => {
            let signature = parse_method_descriptor(descriptor)?;
            frame.pop_n(signature.parameters.len())?;
            if let Some(ret) = signature.return_type {
                frame.push(Value::of_type(ret, Origin::Unknown));
            }
        }
        Instruction::New(class) => frame.push(Value::Uninitialized {
            class: class.clone(),
            site: index,
        }),
        Instruction::NewArray { descriptor, dimensions } => {
            frame.pop_n(*dimensions as usize)?;
            frame.push(Value::reference(
                Some(parse_field_descriptor(descriptor)?),
                Origin::NewArray,
            ));
        }
        Instruction::ArrayLength | Instruction::InstanceOf => {
            frame.pop()?;
            frame.push(Value::Primitive(Kind::Int));
        }
        Instruction::CheckCast(target) => {
            let value = frame.pop()?;
            let narrowed = match value {
                Value::Reference(r) => {
                    Value::reference(Some(parse_field_descriptor(target)?), r.origin)
                }
                other => other,
            };
            frame.push(narrowed);
        }
    }
    Ok(frame)
}

fn field_value(field: &FieldRef) -> Result<Value> {
    let ty = parse_field_descriptor(&field.descriptor)?;
    Ok(Value::of_type(ty, Origin::Field(field.clone())))
}

fn invoke(frame: &mut Frame, kind: InvokeKind, method: &MethodRef) -> Result<()> {
    let signature = parse_method_descriptor(&method.descriptor)?;
    let args: Vec<Value> = frame
        .pop_n(signature.parameters.len())?
        .iter()
        .map(|a| a.truncated(MAX_ORIGIN_DEPTH))
        .collect();

    if kind != InvokeKind::Static {
        let receiver = frame.pop()?;
        if kind == InvokeKind::Special && method.is_constructor() {
            if let Value::Uninitialized { class, .. } = &receiver {
                let constructed = Value::reference(
                    Some(FieldType::Object(class.clone())),
                    Origin::Constructed {
                        class: class.clone(),
                        args,
                    },
                );
                frame.initialise(&receiver, &constructed);
                return Ok(());
            }
        }
    }

    if let Some(ret) = signature.return_type {
        frame.push(Value::of_type(
            ret,
            Origin::Invocation {
                method: method.clone(),
                args,
            },
        ));
    }
    Ok(())
}

fn stack_op(frame: &mut Frame, op: StackOp) -> Result<()> {
    match op {
        StackOp::Pop => {
            frame.pop()?;
        }
        StackOp::Pop2 => {
            let top = frame.pop()?;
            if !top.is_wide() {
                frame.pop()?;
            }
        }
        StackOp::Dup => {
            let top = frame.peek(0).cloned().context("operand stack underflow")?;
            frame.push(top);
        }
        StackOp::DupX1 => {
            let v1 = frame.pop()?;
            let v2 = frame.pop()?;
            frame.stack.extend([v1.clone(), v2, v1]);
        }
        StackOp::DupX2 => {
            let v1 = frame.pop()?;
            let v2 = frame.pop()?;
            if v2.is_wide() {
                frame.stack.extend([v1.clone(), v2, v1]);
            } else {
                let v3 = frame.pop()?;
                frame.stack.extend([v1.clone(), v3, v2, v1]);
            }
        }
        StackOp::Dup2 => {
            let v1 = frame.pop()?;
            if v1.is_wide() {
                frame.stack.extend([v1.clone(), v1]);
            } else {
                let v2 = frame.pop()?;
                frame.stack.extend([v2.clone(), v1.clone(), v2, v1]);
            }
        }
        StackOp::Dup2X1 => {
            let v1 = frame.pop()?;
            if v1.is_wide() {
                let v2 = frame.pop()?;
                frame.stack.extend([v1.clone(), v2, v1]);
            } else {
                let v2 = frame.pop()?;
                let v3 = frame.pop()?;
                frame.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
            }
        }
        StackOp::Dup2X2 => {
            let v1 = frame.pop()?;
            if v1.is_wide() {
                let v2 = frame.pop()?;
                if v2.is_wide() {
                    frame.stack.extend([v1.clone(), v2, v1]);
                } else {
                    let v3 = frame.pop()?;
                    frame.stack.extend([v1.clone(), v3, v2, v1]);
                }
            } else {
                let v2 = frame.pop()?;
                let v3 = frame.pop()?;
                if v3.is_wide() {
                    frame.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
                } else {
                    let v4 = frame.pop()?;
                    frame.stack.extend([v2.clone(), v1.clone(), v4, v3, v2, v1]);
                }
            }
        }
        StackOp::Swap => {
            let v1 = frame.pop()?;
            let v2 = frame.pop()?;
            frame.stack.extend([v1, v2]);
        }
    }
    Ok(())
}
