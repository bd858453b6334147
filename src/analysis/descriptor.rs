//! Field and method descriptor parsing.

use anyhow::{bail, Context};

use super::names::ClassName;

/// A parsed field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Primitive type, keyed by its descriptor character (`I`, `J`, `Z`, ...).
    Base(char),
    /// Class or interface type.
    Object(ClassName),
    /// Array type, holding the full array descriptor (`[I`, `[Ljava/lang/String;`).
    Array(String),
}

impl FieldType {
    /// Whether the type occupies two local-variable slots (long, double).
    pub fn is_wide(&self) -> bool {
        matches!(self, FieldType::Base('J') | FieldType::Base('D'))
    }

    /// Component type of an array type.
    pub fn element_type(&self) -> Option<FieldType> {
        match self {
            FieldType::Array(descriptor) => parse_field_descriptor(&descriptor[1..]).ok(),
            _ => None,
        }
    }

    /// Source-like rendering (`int`, `java.util.List`, `java.lang.String[]`).
    pub fn display_name(&self) -> String {
        match self {
            FieldType::Base(c) => base_type_name(*c).to_string(),
            FieldType::Object(name) => name.to_string(),
            FieldType::Array(_) => match self.element_type() {
                Some(element) => format!("{}[]", element.display_name()),
                None => "array".to_string(),
            },
        }
    }
}

fn base_type_name(c: char) -> &'static str {
    match c {
        'B' => "byte",
        'C' => "char",
        'D' => "double",
        'F' => "float",
        'I' => "int",
        'J' => "long",
        'S' => "short",
        'Z' => "boolean",
        _ => "void",
    }
}

/// Parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub parameters: Vec<FieldType>,
    /// None for `void`.
    pub return_type: Option<FieldType>,
}

impl MethodSignature {
    /// Number of local-variable slots taken by the parameters (excluding `this`).
    pub fn parameter_slots(&self) -> usize {
        self.parameters
            .iter()
            .map(|p| if p.is_wide() { 2 } else { 1 })
            .sum()
    }
}

/// Parse a complete field descriptor.
pub fn parse_field_descriptor(descriptor: &str) -> anyhow::Result<FieldType> {
    let (ty, rest) = parse_one(descriptor)?;
    if !rest.is_empty() {
        bail!("trailing characters in field descriptor {:?}", descriptor);
    }
    Ok(ty)
}

/// Parse a method descriptor such as `(ILjava/lang/String;)V`.
pub fn parse_method_descriptor(descriptor: &str) -> anyhow::Result<MethodSignature> {
    let body = descriptor
        .strip_prefix('(')
        .with_context(|| format!("method descriptor {:?} must start with '('", descriptor))?;
    let (params, ret) = body
        .split_once(')')
        .with_context(|| format!("method descriptor {:?} has no ')'", descriptor))?;

    let mut parameters = Vec::new();
    let mut rest = params;
    while !rest.is_empty() {
        let (ty, next) = parse_one(rest)
            .with_context(|| format!("invalid parameter in {:?}", descriptor))?;
        parameters.push(ty);
        rest = next;
    }

    let return_type = if ret == "V" {
        None
    } else {
        Some(parse_field_descriptor(ret).with_context(|| format!("invalid return type in {:?}", descriptor))?)
    };

    Ok(MethodSignature {
        parameters,
        return_type,
    })
}

fn parse_one(input: &str) -> anyhow::Result<(FieldType, &str)> {
    let Some(first) = input.chars().next() else {
        bail!("empty descriptor");
    };
    match first {
        'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => Ok((FieldType::Base(first), &input[1..])),
        'L' => {
            let end = input
                .find(';')
                .with_context(|| format!("unterminated class descriptor {:?}", input))?;
            Ok((FieldType::Object(ClassName::new(&input[1..end])), &input[end + 1..]))
        }
        '[' => {
            let mut dims = 0;
            while input[dims..].starts_with('[') {
                dims += 1;
            }
            let (_, rest) = parse_one(&input[dims..])?;
            let consumed = input.len() - rest.len();
            Ok((FieldType::Array(input[..consumed].to_string()), rest))
        }
        other => bail!("unexpected descriptor character {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_descriptors() {
        assert_eq!(parse_field_descriptor("I").unwrap(), FieldType::Base('I'));
        assert_eq!(
            parse_field_descriptor("Ljava/util/List;").unwrap(),
            FieldType::Object(ClassName::new("java.util.List"))
        );
        assert_eq!(
            parse_field_descriptor("[[Ljava/lang/String;").unwrap(),
            FieldType::Array("[[Ljava/lang/String;".to_string())
        );
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_field_descriptor("II").is_err());
    }

    #[test]
    fn test_parse_method_descriptor() {
        let sig = parse_method_descriptor("(IJLjava/lang/String;[D)Ljava/util/List;").unwrap();
        assert_eq!(sig.parameters.len(), 4);
        assert_eq!(sig.parameter_slots(), 5);
        assert_eq!(
            sig.return_type,
            Some(FieldType::Object(ClassName::new("java.util.List")))
        );

        let void = parse_method_descriptor("()V").unwrap();
        assert!(void.parameters.is_empty());
        assert!(void.return_type.is_none());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(parse_field_descriptor("[I").unwrap().display_name(), "int[]");
        assert_eq!(
            parse_field_descriptor("Ljava/util/Map;").unwrap().display_name(),
            "java.util.Map"
        );
    }
}
