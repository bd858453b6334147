//! Class-file facts and the machinery that resolves verdicts from them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Classpath       │────▶│ ClassSource  │────▶│ ClassFacts    │
//! │ (dirs, jars)    │     │ (reader)     │     │ (fields,      │
//! └─────────────────┘     └──────────────┘     │  methods, code)│
//!                                              └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ Checkers     │◀───▶│AnalysisSession│
//!                         │ (detect)     │     │ (cached,      │
//!                         └──────────────┘     │  cycle-aware) │
//!                                              └───────────────┘
//! ```
//!
//! Checkers see a class through [`ClassFacts`], and method bodies through the
//! frames produced by [`interpret`]. Facts come either from compiled class
//! files ([`ClasspathSource`]) or are built in memory ([`ClassBuilder`],
//! [`InMemorySource`]).

mod builder;
mod descriptor;
mod facts;
mod in_progress;
mod instructions;
mod interpreter;
mod names;
mod reader;
mod session;
mod source;

pub use builder::{ClassBuilder, MethodBuilder};
pub use descriptor::{parse_field_descriptor, parse_method_descriptor, FieldType, MethodSignature};
pub use facts::{AccessFlags, ClassFacts, ExceptionHandler, FieldFacts, MethodFacts};
pub use in_progress::AnalysisInProgress;
pub use instructions::{Constant, FieldRef, Instruction, InvokeKind, Kind, MethodRef, StackOp};
pub use interpreter::{interpret, Frame, Origin, RefValue, Value};
pub use names::ClassName;
pub use reader::read_class_bytes;
pub use session::{AnalysisSession, CLASS_READER};
pub use source::{ClassSource, ClasspathSource, InMemorySource};
