//! The checker abstraction and the context checkers run in.

use std::sync::Arc;

use crate::analysis::{AnalysisInProgress, AnalysisSession, ClassFacts, ClassName};
use crate::config::Configuration;
use crate::error::MutcheckError;

use super::{AnalysisResult, IsImmutable, MutabilityReason, MutableReasonDetail};

/// A single structural rule.
///
/// Checkers are created fresh for every class visit and never share state.
/// Anything they need to know about other classes goes through
/// [`CheckContext`].
pub trait Checker: Send + Sync {
    /// Stable identifier used in diagnostics (e.g. `"final_class"`).
    fn name(&self) -> &'static str;

    /// Inspect `class` and return the findings in instruction order.
    ///
    /// An error means the checker itself could not do its job; the runner
    /// handles it according to the exception policy.
    fn check(&self, class: &ClassFacts, ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>>;
}

/// Outcome of looking up another class from inside a checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Resolved(AnalysisResult),
    /// The class is already being analysed further up the current chain.
    Cyclic,
}

/// Soft reasons that follow a class into everything that depends on it.
const INHERITED_TAINTS: [MutabilityReason; 2] = [MutabilityReason::CyclicReference, MutabilityReason::CannotAnalyse];

impl Dependency {
    /// The reason a dependent class picks up from this outcome, if any.
    ///
    /// `hard` is reported when the dependency is not immutable. An
    /// effectively immutable dependency passes on a cycle it was part of or
    /// a class it could not analyse; its private non-final fields stay with it.
    pub fn reason_for(&self, hard: MutabilityReason) -> Option<MutabilityReason> {
        match self {
            Dependency::Cyclic => Some(MutabilityReason::CyclicReference),
            Dependency::Resolved(result) => match result.is_immutable {
                IsImmutable::Immutable => None,
                IsImmutable::NotImmutable => Some(hard),
                IsImmutable::EffectivelyImmutable => {
                    INHERITED_TAINTS.into_iter().find(|taint| result.has_reason(*taint))
                }
                IsImmutable::CouldNotAnalyse => Some(MutabilityReason::CannotAnalyse),
            },
        }
    }
}

/// What a checker can see beyond the class it is checking.
pub struct CheckContext<'a> {
    session: &'a AnalysisSession,
    in_progress: &'a AnalysisInProgress,
}

impl<'a> CheckContext<'a> {
    pub(crate) fn new(session: &'a AnalysisSession, in_progress: &'a AnalysisInProgress) -> Self {
        Self { session, in_progress }
    }

    /// Mutability of another class, resolved through the session.
    ///
    /// Only fails when the session aborts under the fail-fast policy.
    pub fn mutability_of(&self, class: &ClassName) -> Result<Dependency, MutcheckError> {
        self.session.resolve(class, self.in_progress)
    }

    /// Raw facts for another class, if the source has it.
    pub fn class_facts(&self, class: &ClassName) -> Option<Arc<ClassFacts>> {
        self.session.source().read_class(class).ok()
    }

    pub fn config(&self) -> &Configuration {
        self.session.config()
    }

    pub fn in_progress(&self) -> &AnalysisInProgress {
        self.in_progress
    }

    /// Classes the session has finished so far.
    pub fn analysed_classes(&self) -> Vec<ClassName> {
        self.session.analysed_classes()
    }
}
