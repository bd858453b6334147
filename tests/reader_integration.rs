//! Integration tests for reading real class files from directories and jars.

mod common;

use std::sync::Arc;

use common::*;
use mutcheck::analysis::{read_class_bytes, ClassName, ClassSource, ClasspathSource, Instruction};
use mutcheck::{AnalysisSession, Configuration, IsImmutable, MutabilityReason, MutcheckError};

#[test]
fn test_read_assembled_class() {
    let facts = read_class_bytes(&point_class().to_bytes()).expect("should decode");

    assert_eq!(facts.name, ClassName::new("com.acme.Point"));
    assert_eq!(facts.super_name, Some(ClassName::new("java.lang.Object")));
    assert!(facts.is_final());
    assert_eq!(facts.fields.len(), 1);
    assert_eq!(facts.fields[0].name, "x");
    assert!(facts.fields[0].is_final());

    let init = facts.find_method("<init>", "(I)V").expect("constructor");
    assert_eq!(init.max_locals, 2);
    assert_eq!(init.instructions.len(), 6);
    assert_eq!(
        init.instructions[4],
        Instruction::putfield("com.acme.Point", "x", "I")
    );
    assert_eq!(
        init.instructions[1],
        Instruction::invokespecial("java.lang.Object", "<init>", "()V")
    );
}

#[test]
fn test_invokedynamic_keeps_bootstrap_owner() {
    let facts = read_class_bytes(&point_record().to_bytes()).expect("should decode");

    let to_string = facts.find_method("toString", "()Ljava/lang/String;").expect("toString");
    assert_eq!(
        to_string.instructions[1],
        Instruction::invokedynamic(
            "java.lang.runtime.ObjectMethods",
            "toString",
            "(Lcom/acme/Point;)Ljava/lang/String;"
        )
    );
}

#[test]
fn test_record_with_generated_methods_is_immutable() {
    let dir = tempfile::tempdir().unwrap();
    point_record().write_to(dir.path(), "com/acme/Point");

    let source = Arc::new(ClasspathSource::new(&[dir.path()]).unwrap());
    let session = AnalysisSession::new(source, Configuration::out_of_the_box());
    let result = session.analyze("com.acme.Point").unwrap();
    assert_eq!(result.is_immutable, IsImmutable::Immutable, "{:?}", result.reasons);
    assert!(!result.has_reason(MutabilityReason::EscapedThisReference));
}

#[test]
fn test_garbage_is_rejected() {
    assert!(read_class_bytes(b"not a class").is_err());
}

#[test]
fn test_directory_classpath_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    point_class().write_to(dir.path(), "com/acme/Point");
    counter_class().write_to(dir.path(), "com/acme/Counter");

    let source = Arc::new(ClasspathSource::new(&[dir.path()]).unwrap());
    let mut listed = source.list_classes().unwrap();
    listed.sort();
    assert_eq!(
        listed,
        vec![ClassName::new("com.acme.Counter"), ClassName::new("com.acme.Point")]
    );

    let session = AnalysisSession::new(source, Configuration::out_of_the_box());
    let point = session.analyze("com.acme.Point").unwrap();
    assert_eq!(point.is_immutable, IsImmutable::Immutable, "{:?}", point.reasons);

    let counter = session.analyze("com/acme/Counter").unwrap();
    assert_eq!(counter.is_immutable, IsImmutable::NotImmutable);
    assert!(counter.has_reason(MutabilityReason::PublishedNonFinalField));
    assert!(counter.has_reason(MutabilityReason::FieldCanBeReassigned));
    assert!(counter.has_reason(MutabilityReason::NotDeclaredFinal));
}

#[test]
fn test_jar_classpath_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("classes.jar");
    write_jar(&jar, &[("com/acme/Point", point_class().to_bytes())]);

    let source = Arc::new(ClasspathSource::new(&[&jar]).unwrap());
    assert_eq!(source.list_classes().unwrap(), vec![ClassName::new("com.acme.Point")]);

    let result = mutcheck::analyze(source, "com.acme.Point").unwrap();
    assert_eq!(result.is_immutable, IsImmutable::Immutable);
}

#[test]
fn test_earlier_classpath_entries_win() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    point_class().write_to(first.path(), "com/acme/Point");
    let mut shadow = ClassAssembler::new("com/acme/Point", "java/lang/Object");
    shadow.field(ACC_PUBLIC, "y", "I");
    shadow.write_to(second.path(), "com/acme/Point");

    let source = ClasspathSource::new(&[first.path(), second.path()]).unwrap();
    let facts = source.read_class(&ClassName::new("com.acme.Point")).unwrap();
    assert_eq!(facts.fields[0].name, "x");
}

#[test]
fn test_missing_class_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let source = ClasspathSource::new(&[dir.path()]).unwrap();
    let err = source.read_class(&ClassName::new("com.acme.Nope")).unwrap_err();
    assert!(matches!(err, MutcheckError::ClassNotFound(_)));
}

#[test]
fn test_malformed_class_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("com/acme")).unwrap();
    std::fs::write(dir.path().join("com/acme/Broken.class"), b"\xCA\xFE\xBA\xBE").unwrap();

    let source = Arc::new(ClasspathSource::new(&[dir.path()]).unwrap());
    let session = AnalysisSession::new(source, Configuration::default());
    let result = session.analyze("com.acme.Broken").unwrap();
    assert_eq!(result.is_immutable, IsImmutable::CouldNotAnalyse);
    let errors = session.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].checker_name, mutcheck::analysis::CLASS_READER);
}
