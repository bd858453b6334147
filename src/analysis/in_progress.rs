//! The chain of classes currently being analysed.

use im::Vector;

use super::names::ClassName;

/// Persistent path of classes whose analysis is under way, outermost first.
///
/// Pushing returns a new path and leaves the original untouched, so a nested
/// lookup never affects its siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisInProgress {
    path: Vector<ClassName>,
}

impl AnalysisInProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, class: &ClassName) -> bool {
        self.path.contains(class)
    }

    /// A new path with `class` appended.
    pub fn push(&self, class: ClassName) -> Self {
        let mut path = self.path.clone();
        path.push_back(class);
        Self { path }
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassName> {
        self.path.iter()
    }

    /// The cycle closed by revisiting `class`, as `A -> B -> A`.
    pub fn describe_cycle(&self, class: &ClassName) -> String {
        let start = self.path.index_of(class).unwrap_or(0);
        self.path
            .iter()
            .skip(start)
            .chain(std::iter::once(class))
            .map(ClassName::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
