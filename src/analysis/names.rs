//! Canonical class identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully-qualified class name in dotted form (`java.util.List`).
///
/// Slash-separated internal names (`java/util/List`) normalise to the same
/// value, so both spellings compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ClassName(String);

impl ClassName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().replace('/', "."))
    }

    /// Extract the class named by an object field descriptor (`Ljava/lang/String;`).
    ///
    /// Returns None for primitive and array descriptors.
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        descriptor
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The JVM internal form (`java/util/List`).
    pub fn internal_name(&self) -> String {
        self.0.replace('.', "/")
    }

    /// The object descriptor form (`Ljava/util/List;`).
    pub fn descriptor(&self) -> String {
        format!("L{};", self.internal_name())
    }

    /// Name without the package (`List`). Nested classes keep their `$` suffix.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Package part of the name, empty for the default package.
    pub fn package(&self) -> &str {
        self.0.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ClassName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&String> for ClassName {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl From<&ClassName> for ClassName {
    fn from(value: &ClassName) -> Self {
        value.clone()
    }
}

impl From<ClassName> for String {
    fn from(value: ClassName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slash_and_dot_spellings_are_equal() {
        let dotted = ClassName::new("java.util.List");
        let slashed = ClassName::new("java/util/List");
        assert_eq!(dotted, slashed);

        let mut set = HashSet::new();
        set.insert(dotted);
        assert!(set.contains(&slashed));
    }

    #[test]
    fn test_name_parts() {
        let name = ClassName::new("com/acme/Outer$Inner");
        assert_eq!(name.as_str(), "com.acme.Outer$Inner");
        assert_eq!(name.simple_name(), "Outer$Inner");
        assert_eq!(name.package(), "com.acme");
        assert_eq!(name.internal_name(), "com/acme/Outer$Inner");
        assert_eq!(name.descriptor(), "Lcom/acme/Outer$Inner;");
        assert_eq!(ClassName::new("Bare").package(), "");
    }

    #[test]
    fn test_from_descriptor() {
        assert_eq!(
            ClassName::from_descriptor("Ljava/lang/String;"),
            Some(ClassName::new("java.lang.String"))
        );
        assert_eq!(ClassName::from_descriptor("I"), None);
        assert_eq!(ClassName::from_descriptor("[Ljava/lang/String;"), None);
    }

    #[test]
    fn test_serde_normalises() {
        let name: ClassName = serde_json::from_str("\"java/lang/String\"").unwrap();
        assert_eq!(name.as_str(), "java.lang.String");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"java.lang.String\"");
    }
}
