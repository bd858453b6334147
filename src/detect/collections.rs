//! The copy-and-wrap collection idiom.
//!
//! A field of an abstract collection type is safe when the stored value is an
//! unmodifiable view over a private copy of the caller's collection:
//!
//! ```text
//! this.items = Collections.unmodifiableList(new ArrayList<>(items));
//! ```
//!
//! The registry maps a field type to the methods that make a copy and the
//! methods that wrap one. Factories such as `List.copyOf` and `List.of` do
//! both in one call. Matching is by owner and method name; descriptors are
//! ignored so every overload counts.

use std::fmt;

use once_cell::sync::Lazy;

use crate::analysis::{ClassName, MethodRef, Origin, RefValue, Value};

/// A method named by owner and name, e.g. `java.util.ArrayList.<init>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodPattern {
    pub owner: ClassName,
    pub name: String,
}

impl MethodPattern {
    pub fn new(owner: impl Into<ClassName>, name: &str) -> Self {
        Self {
            owner: owner.into(),
            name: name.to_string(),
        }
    }

    /// Parse `owner.name`, splitting at the last dot.
    pub fn parse(s: &str) -> Option<Self> {
        let (owner, name) = s.trim().rsplit_once('.')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn matches(&self, method: &MethodRef) -> bool {
        self.owner == method.owner && self.name == method.name
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Source-like call with `inner` as the only argument.
    fn render(&self, inner: &str) -> String {
        if self.is_constructor() {
            format!("new {}<>({})", self.owner.simple_name(), inner)
        } else {
            format!("{}.{}({})", self.owner.simple_name(), self.name, inner)
        }
    }
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// Registry entry: how values for fields of `field_type` are made safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionIdiom {
    pub field_type: ClassName,
    pub copy_methods: Vec<MethodPattern>,
    pub wrap_methods: Vec<MethodPattern>,
    /// Methods returning an unmodifiable copy of their arguments.
    pub copy_and_wrap_methods: Vec<MethodPattern>,
}

impl CollectionIdiom {
    pub fn new(field_type: impl Into<ClassName>) -> Self {
        Self {
            field_type: field_type.into(),
            copy_methods: Vec::new(),
            wrap_methods: Vec::new(),
            copy_and_wrap_methods: Vec::new(),
        }
    }

    pub fn copy_with(mut self, owner: &str, name: &str) -> Self {
        self.copy_methods.push(MethodPattern::new(owner, name));
        self
    }

    pub fn wrap_with(mut self, owner: &str, name: &str) -> Self {
        self.wrap_methods.push(MethodPattern::new(owner, name));
        self
    }

    pub fn copy_and_wrap_with(mut self, owner: &str, name: &str) -> Self {
        self.copy_and_wrap_methods.push(MethodPattern::new(owner, name));
        self
    }

    /// The expression a field of this type should be assigned.
    pub fn suggestion(&self) -> String {
        let copied = match self.copy_methods.first() {
            Some(copy) => copy.render("argument"),
            None => "argument".to_string(),
        };
        match self.wrap_methods.first() {
            Some(wrap) => wrap.render(&copied),
            None => copied,
        }
    }

    fn is_copy(&self, value: &Value) -> bool {
        match value.as_reference().map(|r| &r.origin) {
            Some(Origin::Constructed { class, .. }) => self
                .copy_methods
                .iter()
                .any(|m| m.is_constructor() && &m.owner == class),
            Some(Origin::Invocation { method, .. }) => self.copy_methods.iter().any(|m| m.matches(method)),
            _ => false,
        }
    }

    /// How `value` relates to the idiom.
    pub fn classify(&self, value: &RefValue) -> IdiomMatch {
        match &value.origin {
            Origin::Invocation { method, .. } if self.copy_and_wrap_methods.iter().any(|m| m.matches(method)) => {
                IdiomMatch::CopiedAndWrapped
            }
            Origin::Invocation { method, args } if self.wrap_methods.iter().any(|m| m.matches(method)) => {
                if args.first().is_some_and(|inner| self.is_copy(inner)) {
                    IdiomMatch::CopiedAndWrapped
                } else {
                    IdiomMatch::WrappedWithoutCopy
                }
            }
            _ if self.is_copy(&Value::Reference(value.clone())) => IdiomMatch::CopiedWithoutWrap,
            _ => IdiomMatch::NotAttempted,
        }
    }
}

/// Result of matching a stored value against an idiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdiomMatch {
    /// `wrap(copy(x))`: safe.
    CopiedAndWrapped,
    /// `wrap(x)`: the caller can still mutate `x`.
    WrappedWithoutCopy,
    /// `copy(x)`: the copy itself is still modifiable.
    CopiedWithoutWrap,
    NotAttempted,
}

/// Idioms for the standard `java.util` collection interfaces.
pub static DEFAULT_IDIOMS: Lazy<Vec<CollectionIdiom>> = Lazy::new(|| {
    vec![
        CollectionIdiom::new("java.util.List")
            .copy_with("java.util.ArrayList", "<init>")
            .copy_with("java.util.LinkedList", "<init>")
            .wrap_with("java.util.Collections", "unmodifiableList")
            .copy_and_wrap_with("java.util.List", "copyOf")
            .copy_and_wrap_with("java.util.List", "of"),
        CollectionIdiom::new("java.util.Set")
            .copy_with("java.util.HashSet", "<init>")
            .copy_with("java.util.LinkedHashSet", "<init>")
            .copy_with("java.util.TreeSet", "<init>")
            .wrap_with("java.util.Collections", "unmodifiableSet")
            .copy_and_wrap_with("java.util.Set", "copyOf")
            .copy_and_wrap_with("java.util.Set", "of"),
        CollectionIdiom::new("java.util.SortedSet")
            .copy_with("java.util.TreeSet", "<init>")
            .wrap_with("java.util.Collections", "unmodifiableSortedSet"),
        CollectionIdiom::new("java.util.Map")
            .copy_with("java.util.HashMap", "<init>")
            .copy_with("java.util.LinkedHashMap", "<init>")
            .copy_with("java.util.TreeMap", "<init>")
            .wrap_with("java.util.Collections", "unmodifiableMap")
            .copy_and_wrap_with("java.util.Map", "copyOf")
            .copy_and_wrap_with("java.util.Map", "of")
            .copy_and_wrap_with("java.util.Map", "ofEntries"),
        CollectionIdiom::new("java.util.SortedMap")
            .copy_with("java.util.TreeMap", "<init>")
            .wrap_with("java.util.Collections", "unmodifiableSortedMap"),
        CollectionIdiom::new("java.util.Collection")
            .copy_with("java.util.ArrayList", "<init>")
            .copy_with("java.util.HashSet", "<init>")
            .wrap_with("java.util.Collections", "unmodifiableCollection"),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FieldType;

    fn list_idiom() -> CollectionIdiom {
        DEFAULT_IDIOMS[0].clone()
    }

    fn param() -> Value {
        Value::Reference(RefValue {
            ty: Some(FieldType::Object(ClassName::new("java.util.List"))),
            origin: Origin::Parameter(1),
        })
    }

    fn copy_of(arg: Value) -> Value {
        Value::Reference(RefValue {
            ty: Some(FieldType::Object(ClassName::new("java.util.ArrayList"))),
            origin: Origin::Constructed {
                class: ClassName::new("java.util.ArrayList"),
                args: vec![arg],
            },
        })
    }

    fn wrapped(arg: Value) -> RefValue {
        RefValue {
            ty: Some(FieldType::Object(ClassName::new("java.util.List"))),
            origin: Origin::Invocation {
                method: MethodRef::new(
                    "java.util.Collections",
                    "unmodifiableList",
                    "(Ljava/util/List;)Ljava/util/List;",
                ),
                args: vec![arg],
            },
        }
    }

    #[test]
    fn test_method_pattern_parse() {
        let pattern = MethodPattern::parse("java.util.ArrayList.<init>").unwrap();
        assert_eq!(pattern.owner.as_str(), "java.util.ArrayList");
        assert_eq!(pattern.name, "<init>");
        assert!(MethodPattern::parse("noDot").is_none());
    }

    #[test]
    fn test_classify() {
        let idiom = list_idiom();
        assert_eq!(idiom.classify(&wrapped(copy_of(param()))), IdiomMatch::CopiedAndWrapped);
        assert_eq!(idiom.classify(&wrapped(param())), IdiomMatch::WrappedWithoutCopy);
        assert_eq!(
            idiom.classify(copy_of(param()).as_reference().unwrap()),
            IdiomMatch::CopiedWithoutWrap
        );
        assert_eq!(
            idiom.classify(param().as_reference().unwrap()),
            IdiomMatch::NotAttempted
        );
    }

    #[test]
    fn test_immutable_factories_copy_and_wrap() {
        let copy_of = RefValue {
            ty: Some(FieldType::Object(ClassName::new("java.util.List"))),
            origin: Origin::Invocation {
                method: MethodRef::new("java.util.List", "copyOf", "(Ljava/util/Collection;)Ljava/util/List;"),
                args: vec![param()],
            },
        };
        assert_eq!(list_idiom().classify(&copy_of), IdiomMatch::CopiedAndWrapped);

        let entries = RefValue {
            ty: Some(FieldType::Object(ClassName::new("java.util.Map"))),
            origin: Origin::Invocation {
                method: MethodRef::new(
                    "java.util.Map",
                    "ofEntries",
                    "([Ljava/util/Map$Entry;)Ljava/util/Map;",
                ),
                args: vec![],
            },
        };
        let map_idiom = DEFAULT_IDIOMS
            .iter()
            .find(|i| i.field_type.as_str() == "java.util.Map")
            .unwrap();
        assert_eq!(map_idiom.classify(&entries), IdiomMatch::CopiedAndWrapped);
        // another interface's factory does not count
        assert_eq!(list_idiom().classify(&entries), IdiomMatch::NotAttempted);
    }

    #[test]
    fn test_suggestion() {
        assert_eq!(
            list_idiom().suggestion(),
            "Collections.unmodifiableList(new ArrayList<>(argument))"
        );
    }
}
