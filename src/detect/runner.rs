//! Runs a set of checkers over one class.

use tracing::{debug, warn};

use crate::analysis::ClassFacts;
use crate::config::ExceptionPolicy;
use crate::error::MutcheckError;

use super::{AnalysisError, CheckContext, Checker, MutableReasonDetail};

/// Reasons gathered for one class plus the checkers that failed.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub reasons: Vec<MutableReasonDetail>,
    pub failures: Vec<AnalysisError>,
}

/// Executes checkers independently and unions their findings.
pub struct CheckerRunner {
    policy: ExceptionPolicy,
}

impl CheckerRunner {
    pub fn new(policy: ExceptionPolicy) -> Self {
        Self { policy }
    }

    /// Run every checker over `class`.
    ///
    /// Reasons are deduplicated; each checker's own ordering is kept. Under
    /// `FailFast` the first failing checker aborts the run. Aborts raised by
    /// nested lookups propagate under either policy.
    pub fn run(
        &self,
        class: &ClassFacts,
        checkers: &[Box<dyn Checker>],
        ctx: &CheckContext<'_>,
    ) -> Result<RunOutcome, MutcheckError> {
        let mut outcome = RunOutcome::default();

        for checker in checkers {
            match checker.check(class, ctx) {
                Ok(reasons) => {
                    debug!(class = %class.name, checker = checker.name(), found = reasons.len(), "checker finished");
                    for reason in reasons {
                        if !outcome.reasons.contains(&reason) {
                            outcome.reasons.push(reason);
                        }
                    }
                }
                Err(err) => {
                    let err = match err.downcast::<MutcheckError>() {
                        Ok(inner) if inner.is_abort() => return Err(inner),
                        Ok(inner) => anyhow::Error::new(inner),
                        Err(other) => other,
                    };
                    let description = format!("{:#}", err);
                    match self.policy {
                        ExceptionPolicy::FailFast => {
                            return Err(MutcheckError::Aborted {
                                class: class.name.clone(),
                                checker: checker.name().to_string(),
                                description,
                                analysed: ctx.analysed_classes(),
                            });
                        }
                        ExceptionPolicy::CarryOn => {
                            warn!(class = %class.name, checker = checker.name(), error = %description, "checker failed");
                            outcome
                                .failures
                                .push(AnalysisError::new(class.name.clone(), checker.name(), description));
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisInProgress, AnalysisSession, ClassBuilder, ClassName, InMemorySource};
    use crate::config::Configuration;
    use crate::detect::{CodeLocation, MutabilityReason};
    use std::sync::Arc;

    struct Fixed(&'static str, MutabilityReason);

    impl Checker for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn check(&self, class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
            Ok(vec![MutableReasonDetail::new(self.1, CodeLocation::class(&class.name), self.0)])
        }
    }

    struct Failing;

    impl Checker for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn check(&self, _class: &ClassFacts, _ctx: &CheckContext<'_>) -> anyhow::Result<Vec<MutableReasonDetail>> {
            anyhow::bail!("boom")
        }
    }

    fn session() -> AnalysisSession {
        AnalysisSession::new(Arc::new(InMemorySource::new()), Configuration::default())
    }

    #[test]
    fn test_carry_on_records_failure_and_keeps_going() {
        let session = session();
        let path = AnalysisInProgress::new();
        let ctx = CheckContext::new(&session, &path);
        let class = ClassBuilder::new("com.acme.A").build();
        let checkers: Vec<Box<dyn Checker>> = vec![
            Box::new(Failing),
            Box::new(Fixed("fixed", MutabilityReason::ArrayTypeToField)),
        ];

        let outcome = CheckerRunner::new(ExceptionPolicy::CarryOn)
            .run(&class, &checkers, &ctx)
            .unwrap();
        assert_eq!(outcome.reasons.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].checker_name, "failing");
        assert_eq!(outcome.failures[0].class_name, ClassName::new("com.acme.A"));
    }

    #[test]
    fn test_fail_fast_aborts_with_checker_and_class() {
        let session = session();
        let path = AnalysisInProgress::new();
        let ctx = CheckContext::new(&session, &path);
        let class = ClassBuilder::new("com.acme.A").build();
        let checkers: Vec<Box<dyn Checker>> = vec![Box::new(Failing)];

        let err = CheckerRunner::new(ExceptionPolicy::FailFast)
            .run(&class, &checkers, &ctx)
            .unwrap_err();
        match err {
            MutcheckError::Aborted { class, checker, description, .. } => {
                assert_eq!(class.as_str(), "com.acme.A");
                assert_eq!(checker, "failing");
                assert!(description.contains("boom"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_reasons_are_merged() {
        let session = session();
        let path = AnalysisInProgress::new();
        let ctx = CheckContext::new(&session, &path);
        let class = ClassBuilder::new("com.acme.A").build();
        let checkers: Vec<Box<dyn Checker>> = vec![
            Box::new(Fixed("same", MutabilityReason::NotDeclaredFinal)),
            Box::new(Fixed("same", MutabilityReason::NotDeclaredFinal)),
        ];
        let outcome = CheckerRunner::new(ExceptionPolicy::CarryOn)
            .run(&class, &checkers, &ctx)
            .unwrap();
        assert_eq!(outcome.reasons.len(), 1);
    }

    #[test]
    fn test_reason_set_does_not_depend_on_checker_order() {
        use crate::analysis::{AccessFlags, Instruction, MethodBuilder};
        use std::collections::HashSet;

        // class Bag { public int[] items; public void clear() { items = null; } }
        let class = ClassBuilder::new("com.acme.Bag")
            .field("items", "[I", AccessFlags::PUBLIC)
            .default_constructor()
            .method(
                MethodBuilder::new("clear", "()V")
                    .code(vec![
                        Instruction::aload(0),
                        Instruction::aconst_null(),
                        Instruction::putfield("com.acme.Bag", "items", "[I"),
                        Instruction::return_void(),
                    ])
                    .build(),
            )
            .build();
        let session = AnalysisSession::new(Arc::new(InMemorySource::new().with(class.clone())), Configuration::default());
        let path = AnalysisInProgress::new().push(class.name.clone());
        let ctx = CheckContext::new(&session, &path);
        let runner = CheckerRunner::new(ExceptionPolicy::CarryOn);

        let forward = runner.run(&class, &crate::detect::checkers(), &ctx).unwrap();
        let mut reversed_checkers = crate::detect::checkers();
        reversed_checkers.reverse();
        let reversed = runner.run(&class, &reversed_checkers, &ctx).unwrap();

        let a: HashSet<_> = forward.reasons.iter().collect();
        let b: HashSet<_> = reversed.reasons.iter().collect();
        assert_eq!(a, b);
        assert!(forward.reasons.iter().any(|r| r.reason == MutabilityReason::ArrayTypeToField));
        assert!(forward.reasons.iter().any(|r| r.reason == MutabilityReason::FieldCanBeReassigned));
    }
}
