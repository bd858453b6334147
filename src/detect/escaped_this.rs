//! The `this` reference leaking out of the object.

use anyhow::Context;

use crate::analysis::{
    interpret, parse_field_descriptor, parse_method_descriptor, ClassFacts, FieldType, Frame, Instruction, Kind,
    MethodFacts,
};

use super::{CheckContext, Checker, CodeLocation, MutabilityReason, MutableReasonDetail};

/// Flags every point where `this` becomes reachable from somewhere other
/// than the object itself: call arguments (including lambdas capturing it
/// and inner-class constructors), statics, arrays and other objects' fields.
///
/// Calls made *on* `this` are fine, which covers `super(...)` and `this(...)`.
pub struct EscapedThisChecker;

impl Checker for EscapedThisChecker {
    fn name(&self) -> &'static str {
        "escaped_this"
    }

    fn check(&self, class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        let mut reasons = Vec::new();
        for method in class.methods.iter().filter(|m| !m.is_static() && m.has_code()) {
            let frames = interpret(class, method)?;
            for (index, instruction) in method.instructions.iter().enumerate() {
                let Some(frame) = frames.get(index).and_then(|f| f.as_ref()) else {
                    continue;
                };
                if let Some(how) = escape(class, instruction, frame)
                    .with_context(|| format!("{}.{} at instruction {}", class.name, method.name, index))?
                {
                    reasons.push(detail(class, method, index, &how));
                }
            }
        }
        Ok(reasons)
    }
}

/// Bootstraps whose call sites read `this` and return without keeping it:
/// record `toString`/`hashCode`/`equals` and string concatenation.
const CONTAINED_BOOTSTRAPS: [&str; 2] = ["java.lang.runtime.ObjectMethods", "java.lang.invoke.StringConcatFactory"];

/// Describes how `instruction` lets `this` escape, if it does.
fn escape(class: &ClassFacts, instruction: &Instruction, frame: &Frame) -> anyhow::Result<Option<String>> {
    let top_is_this = || frame.peek(0).is_some_and(|v| v.is_this());

    let found = match instruction {
        Instruction::Invoke { method, .. } => {
            let arity = parse_method_descriptor(&method.descriptor)?.parameters.len();
            passed_as_argument(frame, arity)?.then(|| {
                if method.is_constructor() {
                    format!("passed to the constructor of {}", method.owner)
                } else {
                    format!("passed as an argument to {}.{}", method.owner, method.name)
                }
            })
        }
        Instruction::InvokeDynamic { bootstrap: Some(owner), .. }
            if CONTAINED_BOOTSTRAPS.contains(&owner.as_str()) =>
        {
            None
        }
        Instruction::InvokeDynamic { name, descriptor, .. } => {
            let arity = parse_method_descriptor(descriptor)?.parameters.len();
            passed_as_argument(frame, arity)?.then(|| format!("captured by dynamic call site {}", name))
        }
        Instruction::PutStatic(field) => {
            top_is_this().then(|| format!("assigned to static field {}.{}", field.owner, field.name))
        }
        Instruction::ArrayStore(Kind::Reference) => top_is_this().then(|| "stored into an array".to_string()),
        Instruction::PutField(field) if top_is_this() => {
            let receiver_is_this = frame.peek(1).is_some_and(|v| v.is_this());
            if !receiver_is_this || field.owner != class.name {
                Some(format!("assigned to field {} of another object", field.name))
            } else if own_type(class, &field.descriptor) {
                None
            } else {
                Some(format!("assigned to field {} which is not of type {}", field.name, class.name))
            }
        }
        _ => None,
    };
    Ok(found)
}

fn passed_as_argument(frame: &Frame, arity: usize) -> anyhow::Result<bool> {
    if arity == 0 {
        return Ok(false);
    }
    let args = frame.top(arity).context("operand stack shorter than the call's arguments")?;
    Ok(args.iter().any(|v| v.is_this()))
}

fn own_type(class: &ClassFacts, descriptor: &str) -> bool {
    matches!(parse_field_descriptor(descriptor), Ok(FieldType::Object(name)) if name == class.name)
}

fn detail(class: &ClassFacts, method: &MethodFacts, index: usize, how: &str) -> MutableReasonDetail {
    let phase = if method.is_constructor() {
        "during construction"
    } else {
        "after construction"
    };
    MutableReasonDetail::new(
        MutabilityReason::EscapedThisReference,
        CodeLocation::method(&class.name, &method.name, &method.descriptor, Some(index)),
        format!("The 'this' reference is {} {} in [{}].", how, phase, method.name),
    )
}
