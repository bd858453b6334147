//! The analysis session: memoised, cycle-aware resolution of class verdicts.
//!
//! A session owns the result cache and the list of diagnostics for one batch
//! of requests. Checkers call back into it (through
//! [`CheckContext`](crate::detect::CheckContext)) to learn about the classes
//! referenced by the class they are checking; the current chain of classes is
//! threaded through those calls as an [`AnalysisInProgress`] so mutually
//! referencing classes terminate.
//!
//! Cache and diagnostics sit behind locks, so one session may serve several
//! top-level requests from different threads. Two threads racing on the same
//! class both compute it and the last insert wins; results depend only on the
//! class bytes, so either value is correct.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use super::in_progress::AnalysisInProgress;
use super::names::ClassName;
use super::source::ClassSource;
use crate::config::{Configuration, ExceptionPolicy};
use crate::detect::{self, AnalysisError, AnalysisResult, CheckContext, CheckerRunner, Dependency};
use crate::error::MutcheckError;
use crate::verdict;

/// Checker name recorded when a class's bytecode cannot be obtained.
pub const CLASS_READER: &str = "class_reader";

pub struct AnalysisSession {
    source: Arc<dyn ClassSource>,
    config: Configuration,
    cache: RwLock<HashMap<ClassName, AnalysisResult>>,
    /// Completion order of freshly analysed classes.
    completed: Mutex<Vec<ClassName>>,
    errors: Mutex<Vec<AnalysisError>>,
}

impl AnalysisSession {
    pub fn new(source: Arc<dyn ClassSource>, config: Configuration) -> Self {
        Self {
            source,
            config,
            cache: RwLock::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn source(&self) -> &dyn ClassSource {
        self.source.as_ref()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Verdict for `class`, computing it (and its dependencies) if needed.
    pub fn analyze(&self, class: impl Into<ClassName>) -> Result<AnalysisResult, MutcheckError> {
        self.result_for(&class.into(), &AnalysisInProgress::new())
    }

    /// Analyse classes one after another. Stops at the first abort.
    pub fn analyze_all<I, C>(&self, classes: I) -> Result<Vec<AnalysisResult>, MutcheckError>
    where
        I: IntoIterator<Item = C>,
        C: Into<ClassName>,
    {
        classes.into_iter().map(|c| self.analyze(c)).collect()
    }

    /// Analyse classes on the rayon pool, returning results in input order.
    pub fn analyze_all_parallel(&self, classes: &[ClassName]) -> Result<Vec<AnalysisResult>, MutcheckError> {
        use rayon::prelude::*;

        classes.par_iter().map(|c| self.analyze(c.clone())).collect()
    }

    /// Diagnostics recorded so far, in the order they occurred.
    pub fn errors(&self) -> Vec<AnalysisError> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Classes analysed from bytecode so far, in completion order.
    pub fn analysed_classes(&self) -> Vec<ClassName> {
        self.completed.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// A previously computed result, without triggering analysis.
    pub fn cached(&self, class: &ClassName) -> Option<AnalysisResult> {
        self.cache.read().ok()?.get(class).cloned()
    }

    /// Lookup on behalf of a checker analysing another class.
    pub(crate) fn resolve(
        &self,
        class: &ClassName,
        in_progress: &AnalysisInProgress,
    ) -> Result<Dependency, MutcheckError> {
        if let Some(result) = self.config.hardcoded_result(class) {
            return Ok(Dependency::Resolved(result.clone()));
        }
        if let Some(result) = self.cached(class) {
            return Ok(Dependency::Resolved(result));
        }
        if in_progress.contains(class) {
            debug!(cycle = %in_progress.describe_cycle(class), "cyclic reference");
            return Ok(Dependency::Cyclic);
        }
        self.analyse_fresh(class, in_progress).map(Dependency::Resolved)
    }

    fn result_for(
        &self,
        class: &ClassName,
        in_progress: &AnalysisInProgress,
    ) -> Result<AnalysisResult, MutcheckError> {
        if let Some(result) = self.config.hardcoded_result(class) {
            return Ok(result.clone());
        }
        if let Some(result) = self.cached(class) {
            return Ok(result);
        }
        self.analyse_fresh(class, in_progress)
    }

    fn analyse_fresh(
        &self,
        class: &ClassName,
        in_progress: &AnalysisInProgress,
    ) -> Result<AnalysisResult, MutcheckError> {
        let facts = match self.source.read_class(class) {
            Ok(facts) => facts,
            Err(err) => return self.unreadable(class, err),
        };

        let path = in_progress.push(class.clone());
        debug!(class = %class, depth = path.depth(), "analysing");

        let checkers = detect::checkers();
        let ctx = CheckContext::new(self, &path);
        let outcome = CheckerRunner::new(self.config.exception_policy()).run(&facts, &checkers, &ctx)?;

        self.record_errors(outcome.failures.iter().cloned());
        let result = verdict::conclude(class, outcome.reasons, &outcome.failures);
        info!(class = %class, verdict = %result.is_immutable, reasons = result.reasons.len(), "analysed");

        self.store(class, &result);
        Ok(result)
    }

    fn unreadable(&self, class: &ClassName, err: MutcheckError) -> Result<AnalysisResult, MutcheckError> {
        let description = err.to_string();
        warn!(class = %class, error = %description, "cannot read class");

        if self.config.exception_policy() == ExceptionPolicy::FailFast {
            return Err(MutcheckError::Aborted {
                class: class.clone(),
                checker: CLASS_READER.to_string(),
                description,
                analysed: self.analysed_classes(),
            });
        }

        self.record_errors(std::iter::once(AnalysisError::new(class.clone(), CLASS_READER, &description)));
        let result = verdict::could_not_analyse(class, &description);
        self.store(class, &result);
        Ok(result)
    }

    fn store(&self, class: &ClassName, result: &AnalysisResult) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(class.clone(), result.clone());
        }
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(class.clone());
        }
    }

    fn record_errors(&self, new: impl IntoIterator<Item = AnalysisError>) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.extend(new);
        }
    }
}
