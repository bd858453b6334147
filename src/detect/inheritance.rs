//! Mutability that comes from the type hierarchy.

use crate::analysis::{ClassFacts, ClassName};

use super::{CheckContext, Checker, CodeLocation, MutabilityReason, MutableReasonDetail};

/// Superclasses that contribute no state of their own.
const NEUTRAL_SUPERCLASSES: &[&str] = &["java.lang.Object", "java.lang.Enum", "java.lang.Record"];

/// Interfaces and abstract classes can always have mutable implementations.
pub struct AbstractTypeChecker;

impl Checker for AbstractTypeChecker {
    fn name(&self) -> &'static str {
        "abstract_type"
    }

    fn check(&self, class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        let kind = if class.is_interface() {
            "an interface"
        } else if class.is_abstract() {
            "abstract"
        } else {
            return Ok(Vec::new());
        };
        Ok(vec![MutableReasonDetail::new(
            MutabilityReason::AbstractTypeInherentlyMutable,
            CodeLocation::class(&class.name),
            format!("{} is {}, implementations may be mutable.", class.name, kind),
        )])
    }
}

/// A class is no more immutable than its superclass.
pub struct InheritedMutabilityChecker;

impl Checker for InheritedMutabilityChecker {
    fn name(&self) -> &'static str {
        "inherited_mutability"
    }

    fn check(&self, class: &ClassFacts, ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        let Some(parent) = &class.super_name else {
            return Ok(Vec::new());
        };
        if is_neutral(parent) {
            return Ok(Vec::new());
        }

        let dependency = ctx.mutability_of(parent)?;
        let Some(reason) = dependency.reason_for(MutabilityReason::InheritedMutability) else {
            return Ok(Vec::new());
        };
        let message = match reason {
            MutabilityReason::CyclicReference => format!(
                "Superclass {} is part of a reference cycle: {}",
                parent,
                ctx.in_progress().describe_cycle(parent)
            ),
            MutabilityReason::CannotAnalyse => format!("Superclass {} could not be analysed.", parent),
            _ => format!("Instances of mutable superclass {} could be mutated.", parent),
        };
        Ok(vec![MutableReasonDetail::new(reason, CodeLocation::class(&class.name), message)])
    }
}

fn is_neutral(class: &ClassName) -> bool {
    NEUTRAL_SUPERCLASSES.contains(&class.as_str())
}
