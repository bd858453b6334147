//! Classes that can be subclassed.

use crate::analysis::ClassFacts;

use super::{CheckContext, Checker, CodeLocation, MutabilityReason, MutableReasonDetail};

/// Flags classes that are neither `final` nor closed off by private
/// constructors. Enums are final in all but name and pass.
pub struct FinalClassChecker;

impl Checker for FinalClassChecker {
    fn name(&self) -> &'static str {
        "final_class"
    }

    fn check(&self, class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        if class.is_final() || class.is_enum() || class.is_interface() {
            return Ok(Vec::new());
        }
        let extendable = class.constructors().any(|c| !c.is_private());
        if !extendable {
            return Ok(Vec::new());
        }
        Ok(vec![MutableReasonDetail::new(
            MutabilityReason::NotDeclaredFinal,
            CodeLocation::class(&class.name),
            format!(
                "Can be subclassed, therefore parameters declared to be {} may be mutable subclasses.",
                class.name.simple_name()
            ),
        )])
    }
}
