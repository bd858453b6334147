//! One-hop call graph of a single class.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::analysis::{ClassFacts, Instruction, MethodRef};

/// The queried method is not declared by the class.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("method {0} is not declared by the analysed class")]
pub struct UnknownMethod(pub MethodRef);

/// Answers whether a private method is only ever called from constructors.
///
/// Calls are only followed one hop: a private method called from another
/// private method that is itself constructor-only does not count as
/// constructor-only.
#[derive(Debug, Clone, Default)]
pub struct PrivateMethodCallGraph {
    /// Declared methods and whether each is private.
    declared: HashMap<MethodRef, bool>,
    called_outside_constructors: HashSet<MethodRef>,
}

impl PrivateMethodCallGraph {
    pub fn build(class: &ClassFacts) -> Self {
        let mut graph = Self::default();
        for method in &class.methods {
            graph.declared.insert(method.id(&class.name), method.is_private());
            if method.is_constructor() {
                continue;
            }
            for instruction in &method.instructions {
                if let Instruction::Invoke { method: callee, .. } = instruction {
                    graph.called_outside_constructors.insert(callee.clone());
                }
            }
        }
        graph
    }

    pub fn is_only_called_from_constructor(&self, method: &MethodRef) -> Result<bool, UnknownMethod> {
        match self.declared.get(method) {
            None => Err(UnknownMethod(method.clone())),
            Some(false) => Ok(false),
            Some(true) => Ok(!self.called_outside_constructors.contains(method)),
        }
    }
}
