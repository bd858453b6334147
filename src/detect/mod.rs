//! Structural checkers and the vocabulary they report in.

mod call_graph;
mod collections;
mod escaped_this;
mod fields;
mod final_class;
mod inheritance;
mod mutable_types;
mod runner;
mod setters;
mod traits;
mod types;
mod var_stack;

pub use call_graph::{PrivateMethodCallGraph, UnknownMethod};
pub use collections::{CollectionIdiom, IdiomMatch, MethodPattern, DEFAULT_IDIOMS};
pub use escaped_this::EscapedThisChecker;
pub use fields::{ArrayFieldChecker, NonFinalFieldChecker};
pub use final_class::FinalClassChecker;
pub use inheritance::{AbstractTypeChecker, InheritedMutabilityChecker};
pub use mutable_types::MutableTypeToFieldChecker;
pub use runner::{CheckerRunner, RunOutcome};
pub use setters::SetterMethodChecker;
pub use traits::{CheckContext, Checker, Dependency};
pub use types::{AnalysisError, AnalysisResult, CodeLocation, IsImmutable, MutabilityReason, MutableReasonDetail};
pub use var_stack::{field_stores, FieldStore};

/// A fresh set of every checker, in reporting order.
pub fn checkers() -> Vec<Box<dyn Checker>> {
    vec![
        Box::new(FinalClassChecker),
        Box::new(AbstractTypeChecker),
        Box::new(InheritedMutabilityChecker),
        Box::new(NonFinalFieldChecker),
        Box::new(ArrayFieldChecker),
        Box::new(MutableTypeToFieldChecker),
        Box::new(SetterMethodChecker),
        Box::new(EscapedThisChecker),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checker_names_are_unique() {
        let checkers = checkers();
        let mut names: Vec<_> = checkers.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), checkers.len());
    }
}
