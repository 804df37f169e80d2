//! Tests for structs, enums, unions and error sets

use ziglens_compiler_semantic::{ClassType, ContextKind, DeclFlags, DeclarationKind, TypeKind};

use crate::assert_semantic_ok;

#[test]
fn struct_members_live_in_the_body() {
    let analyzed = assert_semantic_ok!(
        "const Point = struct {\n    x: i32,\n    y: i32 = 0,\n    pub fn origin() Point { return Point{ .x = 0 }; }\n};\n"
    );

    let point = analyzed.decl("Point");
    assert_eq!(point.kind, DeclarationKind::Type);
    assert_eq!(point.class_type, Some(ClassType::Struct));
    let body = analyzed.body_of("Point");
    assert_eq!(body.kind, ContextKind::Namespace);
    assert_eq!(analyzed.names_in(body), vec!["x", "y", "origin"]);
    assert!(analyzed.decl("x").flags.contains(DeclFlags::CLASS_MEMBER));
    assert_eq!(analyzed.type_of("y"), "i32");
    assert_eq!(analyzed.type_of("origin"), "fn () Point");
}

#[test]
fn enum_members_carry_ordinals() {
    let analyzed = assert_semantic_ok!("const Level = enum(u8) { low, mid = 5, high };");

    let level = analyzed.decl("Level");
    assert_eq!(level.class_type, Some(ClassType::Enum));
    match &level.ty.kind {
        TypeKind::Enum(e) => {
            assert!(e.enum_type.is_none());
            assert!(e.base.as_ref().is_some_and(|b| b.is_builtin("u8")));
        }
        other => panic!("expected an enum, got {other:?}"),
    }

    let tags: Vec<_> = ["low", "mid", "high"]
        .iter()
        .map(|name| analyzed.decl(name).tag_value)
        .collect();
    assert_eq!(tags, vec![Some(0), Some(5), Some(6)]);

    let high = analyzed.decl("high");
    assert_eq!(high.ty.value_str(), Some("high"));
    assert_eq!(high.ty.enum_type(), Some(&level.ty));
}

#[test]
fn union_fields_carry_their_payload() {
    let analyzed = assert_semantic_ok!("const Value = union(enum) { int: u32, flag: bool, none };");

    let value = analyzed.decl("Value");
    assert_eq!(value.class_type, Some(ClassType::Union));
    assert_eq!(analyzed.body_of("Value").kind, ContextKind::Class);
    match &value.ty.kind {
        TypeKind::Union(u) => assert!(u.base.as_ref().is_some_and(|b| b.is_builtin("enum"))),
        other => panic!("expected a union, got {other:?}"),
    }

    let payload = |name: &str| match &analyzed.decl(name).ty.kind {
        TypeKind::Union(u) => {
            assert!(u.union_type.is_some());
            u.data.as_ref().map(|d| d.to_string())
        }
        other => panic!("expected a union field, got {other:?}"),
    };
    assert_eq!(payload("int").as_deref(), Some("u32"));
    assert_eq!(payload("flag").as_deref(), Some("bool"));
    assert_eq!(payload("none").as_deref(), Some("void"));
}

#[test]
fn error_set_members_are_error_values() {
    let analyzed = assert_semantic_ok!("const FileError = error{ NotFound, Denied };");

    let set = analyzed.decl("FileError");
    assert!(set.ty.is_error_set());
    let body = analyzed.body_of("FileError");
    assert_eq!(body.kind, ContextKind::Enum);
    assert_eq!(analyzed.names_in(body), vec!["NotFound", "Denied"]);

    let denied = analyzed.decl("Denied");
    assert!(denied.ty.is_error_set());
    assert_eq!(denied.ty.value_str(), Some("Denied"));
}

#[test]
fn anonymous_containers_get_a_synthetic_name() {
    let analyzed = assert_semantic_ok!("fn make() type {\n    return struct { field: u8 };\n}\n");

    let anonymous: Vec<_> = analyzed
        .top
        .declarations
        .iter()
        .filter(|d| d.flags.contains(DeclFlags::ANONYMOUS))
        .collect();
    assert_eq!(anonymous.len(), 1);
    assert!(anonymous[0].identifier.as_str().starts_with("__anon_1_"));
    assert!(!anonymous[0].is_nameable());

    assert_eq!(analyzed.type_of("make"), format!("fn () {}", anonymous[0].identifier));
}

#[test]
fn doc_comments_are_attached() {
    let analyzed = assert_semantic_ok!(
        "//! Geometry helpers.\n\n/// A point in the plane.\n/// Units are pixels.\npub const Point = struct {\n    /// Horizontal offset\n    x: i32,\n};\n"
    );

    assert_eq!(
        analyzed.decl("Point").comment.as_deref(),
        Some("A point in the plane.\nUnits are pixels.")
    );
    assert_eq!(analyzed.decl("x").comment.as_deref(), Some("Horizontal offset"));
    assert!(analyzed.decl("Point").flags.contains(DeclFlags::PUBLIC));

    let module = analyzed
        .top
        .owner()
        .and_then(|id| analyzed.top.declaration(id))
        .expect("module declaration");
    assert!(module.flags.contains(DeclFlags::MODULE));
    assert_eq!(module.comment.as_deref(), Some("Geometry helpers."));
    assert_eq!(
        module.identifier.as_str(),
        "doc_comments_are_attached"
    );
}
