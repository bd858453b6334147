//! Core types for analysis results.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::ClassName;

/// Why instances of a class may be mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutabilityReason {
    FieldCanBeReassigned,
    EscapedThisReference,
    AbstractTypeToField,
    AbstractCollectionTypeToField,
    MutableTypeToField,
    PublishedNonFinalField,
    NonFinalField,
    NotDeclaredFinal,
    ArrayTypeToField,
    AbstractTypeInherentlyMutable,
    InheritedMutability,
    CyclicReference,
    CannotAnalyse,
    /// Verdict taken from configuration instead of analysis.
    Hardcoded,
}

impl MutabilityReason {
    pub const ALL: [MutabilityReason; 14] = [
        MutabilityReason::FieldCanBeReassigned,
        MutabilityReason::EscapedThisReference,
        MutabilityReason::AbstractTypeToField,
        MutabilityReason::AbstractCollectionTypeToField,
        MutabilityReason::MutableTypeToField,
        MutabilityReason::PublishedNonFinalField,
        MutabilityReason::NonFinalField,
        MutabilityReason::NotDeclaredFinal,
        MutabilityReason::ArrayTypeToField,
        MutabilityReason::AbstractTypeInherentlyMutable,
        MutabilityReason::InheritedMutability,
        MutabilityReason::CyclicReference,
        MutabilityReason::CannotAnalyse,
        MutabilityReason::Hardcoded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MutabilityReason::FieldCanBeReassigned => "field_can_be_reassigned",
            MutabilityReason::EscapedThisReference => "escaped_this_reference",
            MutabilityReason::AbstractTypeToField => "abstract_type_to_field",
            MutabilityReason::AbstractCollectionTypeToField => "abstract_collection_type_to_field",
            MutabilityReason::MutableTypeToField => "mutable_type_to_field",
            MutabilityReason::PublishedNonFinalField => "published_non_final_field",
            MutabilityReason::NonFinalField => "non_final_field",
            MutabilityReason::NotDeclaredFinal => "not_declared_final",
            MutabilityReason::ArrayTypeToField => "array_type_to_field",
            MutabilityReason::AbstractTypeInherentlyMutable => "abstract_type_inherently_mutable",
            MutabilityReason::InheritedMutability => "inherited_mutability",
            MutabilityReason::CyclicReference => "cyclic_reference",
            MutabilityReason::CannotAnalyse => "cannot_analyse",
            MutabilityReason::Hardcoded => "hardcoded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|r| r.as_str() == normalized)
    }

    /// Soft reasons only signal an unresolved dependency or a private,
    /// never-published field; they cap the verdict at `EffectivelyImmutable`.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            MutabilityReason::CyclicReference
                | MutabilityReason::CannotAnalyse
                | MutabilityReason::NonFinalField
        )
    }

    /// One-line explanation of the reason kind.
    pub fn description(&self) -> &'static str {
        match self {
            MutabilityReason::FieldCanBeReassigned => {
                "Class has a field which may be reassigned after construction."
            }
            MutabilityReason::EscapedThisReference => {
                "The 'this' reference is handed to code outside the object."
            }
            MutabilityReason::AbstractTypeToField => {
                "Abstract type (interface or abstract class) assigned to field."
            }
            MutabilityReason::AbstractCollectionTypeToField => {
                "Abstract collection type assigned to field without a defensive copy and unmodifiable wrapper."
            }
            MutabilityReason::MutableTypeToField => "Mutable type assigned to field.",
            MutabilityReason::PublishedNonFinalField => {
                "Non-final field is visible outside the class and can be reassigned."
            }
            MutabilityReason::NonFinalField => "Field is not declared final.",
            MutabilityReason::NotDeclaredFinal => {
                "Class is not declared final and can be subclassed by a mutable type."
            }
            MutabilityReason::ArrayTypeToField => "Array type assigned to field; arrays are always mutable.",
            MutabilityReason::AbstractTypeInherentlyMutable => {
                "Interfaces and abstract classes can have mutable implementations."
            }
            MutabilityReason::InheritedMutability => "Class inherits from a mutable superclass.",
            MutabilityReason::CyclicReference => {
                "Class participates in a reference cycle, so a dependency could not be fully resolved."
            }
            MutabilityReason::CannotAnalyse => "A dependency of this class could not be analysed.",
            MutabilityReason::Hardcoded => "Result was configured rather than analysed.",
        }
    }
}

impl fmt::Display for MutabilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MutabilityReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown mutability reason: {}", s))
    }
}

/// Where in the class a reason was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CodeLocation {
    Class {
        class: ClassName,
    },
    Field {
        class: ClassName,
        field: String,
    },
    Method {
        class: ClassName,
        method: String,
        descriptor: String,
        /// Instruction index within the method body.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instruction: Option<usize>,
    },
}

impl CodeLocation {
    pub fn class(class: &ClassName) -> Self {
        CodeLocation::Class { class: class.clone() }
    }

    pub fn field(class: &ClassName, field: &str) -> Self {
        CodeLocation::Field {
            class: class.clone(),
            field: field.to_string(),
        }
    }

    pub fn method(class: &ClassName, method: &str, descriptor: &str, instruction: Option<usize>) -> Self {
        CodeLocation::Method {
            class: class.clone(),
            method: method.to_string(),
            descriptor: descriptor.to_string(),
            instruction,
        }
    }

    pub fn class_name(&self) -> &ClassName {
        match self {
            CodeLocation::Class { class }
            | CodeLocation::Field { class, .. }
            | CodeLocation::Method { class, .. } => class,
        }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeLocation::Class { class } => write!(f, "{}", class),
            CodeLocation::Field { class, field } => write!(f, "{}.{}", class, field),
            CodeLocation::Method {
                class,
                method,
                descriptor,
                instruction,
            } => {
                write!(f, "{}.{}{}", class, method, descriptor)?;
                if let Some(index) = instruction {
                    write!(f, " @{}", index)?;
                }
                Ok(())
            }
        }
    }
}

/// One concrete finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutableReasonDetail {
    pub message: String,
    pub location: CodeLocation,
    pub reason: MutabilityReason,
}

impl MutableReasonDetail {
    pub fn new(reason: MutabilityReason, location: CodeLocation, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location,
            reason,
        }
    }
}

impl fmt::Display for MutableReasonDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.reason, self.message, self.location)
    }
}

/// Overall verdict for a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsImmutable {
    Immutable,
    EffectivelyImmutable,
    NotImmutable,
    CouldNotAnalyse,
}

impl IsImmutable {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsImmutable::Immutable => "IMMUTABLE",
            IsImmutable::EffectivelyImmutable => "EFFECTIVELY_IMMUTABLE",
            IsImmutable::NotImmutable => "NOT_IMMUTABLE",
            IsImmutable::CouldNotAnalyse => "COULD_NOT_ANALYSE",
        }
    }

    /// Immutable or effectively immutable.
    pub fn is_acceptable(&self) -> bool {
        matches!(self, IsImmutable::Immutable | IsImmutable::EffectivelyImmutable)
    }
}

impl fmt::Display for IsImmutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IsImmutable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "IMMUTABLE" => Ok(IsImmutable::Immutable),
            "EFFECTIVELY_IMMUTABLE" => Ok(IsImmutable::EffectivelyImmutable),
            "NOT_IMMUTABLE" | "MUTABLE" => Ok(IsImmutable::NotImmutable),
            "COULD_NOT_ANALYSE" | "COULD_NOT_ANALYZE" => Ok(IsImmutable::CouldNotAnalyse),
            _ => Err(format!("unknown verdict: {}", s)),
        }
    }
}

/// The verdict for one class together with the reasons behind it.
///
/// Equality treats `reasons` as a set: two results with the same findings in
/// a different order are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub class_name: ClassName,
    pub is_immutable: IsImmutable,
    pub reasons: Vec<MutableReasonDetail>,
}

impl AnalysisResult {
    pub fn new(class_name: ClassName, is_immutable: IsImmutable, reasons: Vec<MutableReasonDetail>) -> Self {
        Self {
            class_name,
            is_immutable,
            reasons,
        }
    }

    /// An immutable result with no reasons.
    pub fn immutable(class_name: impl Into<ClassName>) -> Self {
        Self::new(class_name.into(), IsImmutable::Immutable, Vec::new())
    }

    /// A configured result. Non-immutable verdicts carry one `Hardcoded`
    /// reason so the reason list is never empty for them.
    pub fn hardcoded(class_name: impl Into<ClassName>, verdict: IsImmutable, message: Option<&str>) -> Self {
        let class_name = class_name.into();
        let reasons = if verdict == IsImmutable::Immutable {
            Vec::new()
        } else {
            vec![MutableReasonDetail::new(
                MutabilityReason::Hardcoded,
                CodeLocation::class(&class_name),
                message.unwrap_or("Result hardcoded in configuration."),
            )]
        };
        Self::new(class_name, verdict, reasons)
    }

    pub fn has_reason(&self, reason: MutabilityReason) -> bool {
        self.reasons.iter().any(|r| r.reason == reason)
    }

    pub fn reasons_of(&self, reason: MutabilityReason) -> impl Iterator<Item = &MutableReasonDetail> {
        self.reasons.iter().filter(move |r| r.reason == reason)
    }
}

impl PartialEq for AnalysisResult {
    fn eq(&self, other: &Self) -> bool {
        if self.class_name != other.class_name || self.is_immutable != other.is_immutable {
            return false;
        }
        let mine: HashSet<_> = self.reasons.iter().collect();
        let theirs: HashSet<_> = other.reasons.iter().collect();
        mine == theirs
    }
}

impl Eq for AnalysisResult {}

/// A diagnostic recorded when a class or checker could not be analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisError {
    pub class_name: ClassName,
    pub checker_name: String,
    pub description: String,
}

impl AnalysisError {
    pub fn new(class_name: ClassName, checker_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            class_name,
            checker_name: checker_name.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.class_name, self.checker_name, self.description)
    }
}
