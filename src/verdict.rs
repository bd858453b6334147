//! Verdict aggregation.
//!
//! Turns the union of checker findings for a class into an [`IsImmutable`]
//! verdict. The verdict is computed from the reasons, never compared.

use crate::analysis::ClassName;
use crate::detect::{AnalysisError, AnalysisResult, CodeLocation, IsImmutable, MutabilityReason, MutableReasonDetail};

/// Verdict for a reason set.
///
/// `failed` marks a checker-level infrastructure failure, which wins over any
/// partial reasons.
pub fn aggregate(reasons: &[MutableReasonDetail], failed: bool) -> IsImmutable {
    if failed {
        IsImmutable::CouldNotAnalyse
    } else if reasons.is_empty() {
        IsImmutable::Immutable
    } else if reasons.iter().all(|r| r.reason.is_soft()) {
        IsImmutable::EffectivelyImmutable
    } else {
        IsImmutable::NotImmutable
    }
}

/// Build the final result for `class`.
///
/// When checkers failed, a `CannotAnalyse` detail describing each failure is
/// attached so a `CouldNotAnalyse` result always explains itself.
pub fn conclude(
    class: &ClassName,
    mut reasons: Vec<MutableReasonDetail>,
    failures: &[AnalysisError],
) -> AnalysisResult {
    for failure in failures {
        reasons.push(MutableReasonDetail::new(
            MutabilityReason::CannotAnalyse,
            CodeLocation::class(class),
            format!("{} failed: {}", failure.checker_name, failure.description),
        ));
    }
    let verdict = aggregate(&reasons, !failures.is_empty());
    AnalysisResult::new(class.clone(), verdict, reasons)
}

/// Result for a class whose bytecode could not be obtained.
pub fn could_not_analyse(class: &ClassName, description: &str) -> AnalysisResult {
    AnalysisResult::new(
        class.clone(),
        IsImmutable::CouldNotAnalyse,
        vec![MutableReasonDetail::new(
            MutabilityReason::CannotAnalyse,
            CodeLocation::class(class),
            description,
        )],
    )
}
