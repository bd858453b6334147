//! Mutcheck - static immutability analysis for compiled JVM classes.
//!
//! Mutcheck decides, from bytecode alone, whether instances of a class can
//! change state after construction. Every class gets a verdict
//! ([`IsImmutable`]) together with the concrete findings behind it: fields
//! that can be reassigned, mutable or abstract types stored into fields,
//! array fields, a `this` reference leaking out of the object, classes that
//! can be subclassed, and so on.
//!
//! # Architecture
//!
//! - `analysis`: class-file facts, the abstract interpreter and the session
//!   that resolves verdicts transitively
//! - `detect`: the checkers and the result vocabulary they report in
//! - `verdict`: turning a set of reasons into a verdict
//! - `config`: hardcoded results, presets, collection idioms, exception policy
//! - `report`: output formatting (text, JSON)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mutcheck::analysis::{AccessFlags, ClassBuilder, InMemorySource};
//! use mutcheck::IsImmutable;
//!
//! let point = ClassBuilder::new("com.acme.Point")
//!     .final_class()
//!     .field("x", "I", AccessFlags::PUBLIC | AccessFlags::FINAL)
//!     .build();
//! let source = Arc::new(InMemorySource::new().with(point));
//!
//! let result = mutcheck::analyze(source, "com.acme.Point").unwrap();
//! assert_eq!(result.is_immutable, IsImmutable::Immutable);
//! ```

use std::sync::Arc;

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod report;
pub mod verdict;

pub use analysis::{AnalysisSession, ClassName, ClassSource, ClasspathSource, InMemorySource};
pub use config::{Configuration, ExceptionPolicy, Preset};
pub use detect::{AnalysisError, AnalysisResult, CodeLocation, IsImmutable, MutabilityReason, MutableReasonDetail};
pub use error::MutcheckError;

/// Analyse one class with the out-of-the-box configuration.
pub fn analyze(
    source: Arc<dyn ClassSource>,
    class: impl Into<ClassName>,
) -> Result<AnalysisResult, MutcheckError> {
    analyze_with(source, class, Configuration::out_of_the_box())
}

/// Analyse one class with an explicit configuration.
pub fn analyze_with(
    source: Arc<dyn ClassSource>,
    class: impl Into<ClassName>,
    configuration: Configuration,
) -> Result<AnalysisResult, MutcheckError> {
    AnalysisSession::new(source, configuration).analyze(class)
}
