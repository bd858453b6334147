//! What gets assigned to fields.
//!
//! Every `putfield` into one of the class's own fields is inspected with the
//! abstract interpreter. The stored value's static type decides the outcome:
//! configured results first, then interfaces and abstract classes, then a
//! full analysis of the type through the session.

use anyhow::Context;

use crate::analysis::{
    interpret, parse_field_descriptor, ClassFacts, ClassName, FieldRef, FieldType, Instruction, MethodFacts, RefValue,
    Value,
};

use super::collections::{CollectionIdiom, IdiomMatch};
use super::{CheckContext, Checker, CodeLocation, Dependency, MutabilityReason, MutableReasonDetail};

pub struct MutableTypeToFieldChecker;

impl Checker for MutableTypeToFieldChecker {
    fn name(&self) -> &'static str {
        "mutable_type_to_field"
    }

    fn check(&self, class: &ClassFacts, ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        let mut reasons = Vec::new();

        for method in class.methods.iter().filter(|m| stores_own_field(class, m)) {
            let frames = interpret(class, method)?;
            for (index, instruction) in method.instructions.iter().enumerate() {
                let Instruction::PutField(field) = instruction else {
                    continue;
                };
                if field.owner != class.name {
                    continue;
                }
                let Some(frame) = frames.get(index).and_then(|f| f.as_ref()) else {
                    continue;
                };
                let value = frame
                    .peek(0)
                    .with_context(|| format!("no value on the stack for putfield at {}", index))?;
                if let Some(reason) = inspect(class, method, index, field, value, ctx)? {
                    reasons.push(reason);
                }
            }
        }

        Ok(reasons)
    }
}

fn stores_own_field(class: &ClassFacts, method: &MethodFacts) -> bool {
    method
        .instructions
        .iter()
        .any(|i| matches!(i, Instruction::PutField(f) if f.owner == class.name))
}

fn inspect(
    class: &ClassFacts,
    method: &MethodFacts,
    index: usize,
    field: &FieldRef,
    value: &Value,
    ctx: &CheckContext<'_>,
) -> anyhow::Result<Option<MutableReasonDetail>> {
    let Value::Reference(stored) = value else {
        return Ok(None);
    };
    let declared = match parse_field_descriptor(&field.descriptor)? {
        FieldType::Object(name) => name,
        _ => return Ok(None),
    };
    let location = CodeLocation::method(&class.name, &method.name, &method.descriptor, Some(index));
    let config = ctx.config();

    let idiom = config.idiom_for(&declared);
    if let Some(idiom) = idiom {
        match idiom.classify(stored) {
            IdiomMatch::CopiedAndWrapped => return Ok(None),
            IdiomMatch::WrappedWithoutCopy | IdiomMatch::CopiedWithoutWrap => {
                return Ok(Some(collection_reason(location, field, &declared, idiom)));
            }
            IdiomMatch::NotAttempted => {}
        }
    }

    let value_type = match value_class(stored, &declared) {
        Some(name) => name,
        None => return Ok(None),
    };

    let dependency = match config.hardcoded_result(&value_type) {
        Some(result) => Dependency::Resolved(result.clone()),
        None => {
            if let Some(idiom) = config.idiom_for(&value_type) {
                return Ok(Some(collection_reason(location, field, &declared, idiom)));
            }
            if let Some(facts) = ctx.class_facts(&value_type) {
                if facts.is_interface() || facts.is_abstract() {
                    return Ok(Some(MutableReasonDetail::new(
                        MutabilityReason::AbstractTypeToField,
                        location,
                        format!(
                            "Field [{}] can have an abstract type ({}) assigned to it.",
                            field.name, value_type
                        ),
                    )));
                }
            }
            ctx.mutability_of(&value_type)?
        }
    };

    let Some(reason) = dependency.reason_for(MutabilityReason::MutableTypeToField) else {
        return Ok(None);
    };
    let message = match reason {
        MutabilityReason::CyclicReference => format!(
            "Field [{}] has type {} which is part of a reference cycle: {}",
            field.name,
            value_type,
            ctx.in_progress().describe_cycle(&value_type)
        ),
        MutabilityReason::CannotAnalyse => {
            format!(
                "Field [{}] has type {} which could not be fully analysed.",
                field.name, value_type
            )
        }
        _ => format!(
            "Field [{}] can have a mutable type ({}) assigned to it.",
            field.name, value_type
        ),
    };
    Ok(Some(MutableReasonDetail::new(reason, location, message)))
}

/// The class whose mutability matters for a stored reference. Arrays are the
/// array checker's business.
fn value_class(stored: &RefValue, declared: &ClassName) -> Option<ClassName> {
    match &stored.ty {
        Some(FieldType::Object(name)) => Some(name.clone()),
        Some(FieldType::Array(_)) => None,
        Some(FieldType::Base(_)) => None,
        None => Some(declared.clone()),
    }
}

fn collection_reason(
    location: CodeLocation,
    field: &FieldRef,
    declared: &ClassName,
    idiom: &CollectionIdiom,
) -> MutableReasonDetail {
    MutableReasonDetail::new(
        MutabilityReason::AbstractCollectionTypeToField,
        location,
        format!(
            "Field [{}] is a {} that is not both copied and wrapped in an unmodifiable view. Assign {} instead.",
            field.name,
            declared.simple_name(),
            idiom.suggestion()
        ),
    )
}
