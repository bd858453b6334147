//! Field declaration checks: non-final and array-typed fields.

use crate::analysis::ClassFacts;

use super::{CheckContext, Checker, CodeLocation, MutabilityReason, MutableReasonDetail};

/// Non-final instance fields. Visible ones can be reassigned by anyone;
/// private ones only weaken the verdict.
pub struct NonFinalFieldChecker;

impl Checker for NonFinalFieldChecker {
    fn name(&self) -> &'static str {
        "non_final_field"
    }

    fn check(&self, class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        let reasons = class
            .instance_fields()
            .filter(|f| !f.is_final())
            .map(|field| {
                let location = CodeLocation::field(&class.name, &field.name);
                if field.access.is_private() {
                    MutableReasonDetail::new(
                        MutabilityReason::NonFinalField,
                        location,
                        format!("Private field is not declared final. [{}]", field.name),
                    )
                } else {
                    MutableReasonDetail::new(
                        MutabilityReason::PublishedNonFinalField,
                        location,
                        format!(
                            "Field is visible outside the class ({}), and is not declared final. [{}]",
                            field.access.visibility(),
                            field.name
                        ),
                    )
                }
            })
            .collect();
        Ok(reasons)
    }
}

/// Array-typed instance fields, whatever their modifiers.
pub struct ArrayFieldChecker;

impl Checker for ArrayFieldChecker {
    fn name(&self) -> &'static str {
        "array_field"
    }

    fn check(&self, class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
        Ok(class
            .instance_fields()
            .filter(|f| f.is_array())
            .map(|field| {
                let shown = field
                    .field_type()
                    .map(|t| t.display_name())
                    .unwrap_or_else(|| field.descriptor.clone());
                MutableReasonDetail::new(
                    MutabilityReason::ArrayTypeToField,
                    CodeLocation::field(&class.name, &field.name),
                    format!("Field is an array ({}). Arrays are always mutable. [{}]", shown, field.name),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AccessFlags, ClassBuilder};
    use crate::detect::testing::run_checker;

    #[test]
    fn test_public_non_final_field_is_published() {
        let class = ClassBuilder::new("com.acme.A")
            .field("x", "I", AccessFlags::PUBLIC)
            .build();
        let reasons = run_checker(&NonFinalFieldChecker, &class);
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].reason, MutabilityReason::PublishedNonFinalField);
        assert_eq!(reasons[0].location, CodeLocation::field(&class.name, "x"));
    }

    #[test]
    fn test_private_non_final_field_is_soft() {
        let class = ClassBuilder::new("com.acme.A")
            .field("x", "I", AccessFlags::PRIVATE)
            .field("y", "I", AccessFlags::PRIVATE | AccessFlags::FINAL)
            .field("COUNT", "I", AccessFlags::PUBLIC | AccessFlags::STATIC)
            .build();
        let reasons = run_checker(&NonFinalFieldChecker, &class);
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].reason, MutabilityReason::NonFinalField);
    }

    #[test]
    fn test_array_fields_flagged_regardless_of_modifiers() {
        let class = ClassBuilder::new("com.acme.A")
            .field("a", "[I", AccessFlags::PRIVATE | AccessFlags::FINAL)
            .field("b", "[[Ljava/lang/String;", AccessFlags::PUBLIC)
            .field("TABLE", "[I", AccessFlags::STATIC | AccessFlags::FINAL)
            .build();
        let reasons = run_checker(&ArrayFieldChecker, &class);
        assert_eq!(reasons.len(), 2);
        assert!(reasons.iter().all(|r| r.reason == MutabilityReason::ArrayTypeToField));
        assert!(reasons[1].message.contains("java.lang.String[][]"));
    }
}
