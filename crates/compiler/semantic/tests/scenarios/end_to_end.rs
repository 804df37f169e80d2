//! End-to-end examples: a short document in, the declarations and types the
//! analyzer derives out.

use ziglens_compiler_semantic::{ContextKind, DeclFlags, TypeKind};

use crate::{analyze, assert_semantic_ok, item_names};

#[test]
fn struct_field_access_and_member_completion() {
    let analyzed = assert_semantic_ok!(
        "const A = struct { a: u8, b: u8 };\nconst x = A{};\nconst y = x.a;\n"
    );

    assert_eq!(analyzed.type_of("x"), "A");
    assert_eq!(analyzed.type_of("y"), "u8");

    let items = analyzed.complete_after("const y = x.");
    assert_eq!(item_names(&items), vec!["a", "b"]);
}

#[test]
fn function_body_holds_its_locals() {
    let analyzed = assert_semantic_ok!("pub fn main() void { var y: u8 = 2; _ = y; }");

    let main = analyzed.decl("main");
    assert!(main.flags.contains(DeclFlags::PUBLIC));
    assert_eq!(main.ty.to_string(), "fn () void");

    let body = analyzed.scope_of("y");
    assert_eq!(body.kind, ContextKind::Other);
    assert_eq!(analyzed.names_in(body), vec!["y"]);
    let parameters = analyzed.body_of("main");
    assert_eq!(parameters.kind, ContextKind::Function);
    assert!(parameters.declarations.is_empty());

    let y = analyzed.decl("y");
    assert!(y.ty.is_builtin("u8"));
    assert_eq!(y.ty.value_str(), Some("2"));
    insta::assert_snapshot!(y.ty.to_string(), @"u8 = 2");
}

#[test]
fn enum_value_keeps_its_root() {
    let analyzed = assert_semantic_ok!(
        "const Status = enum { Ok, Err };\nconst s: Status = .Ok;\nconst t = s;\n"
    );

    let status = analyzed.decl("Status");
    let t = analyzed.decl("t");
    assert_eq!(t.ty.enum_type(), Some(&status.ty));
    assert_eq!(t.ty.value_str(), Some("Ok"));
    insta::assert_snapshot!(t.ty.to_string(), @"Status = Ok");
}

#[test]
fn comptime_parameter_binds_the_return_type() {
    let analyzed = assert_semantic_ok!(
        "fn id(comptime T: type, x: T) T { return x; }\nconst a = id(u32, 7);\n"
    );

    let id = analyzed.decl("id");
    assert_eq!(id.returned_param, Some(1));
    let a = analyzed.decl("a");
    assert!(a.ty.is_builtin("u32"));
    assert_eq!(a.ty.value_str(), Some("7"));
}

#[test]
fn string_length_is_usize() {
    let analyzed = assert_semantic_ok!("const s = \"hello\";\nconst n = s.len;\n");

    let n = analyzed.decl("n");
    assert!(n.ty.is_builtin("usize"));
    assert_eq!(n.ty.value_str(), Some("5"));
}

#[test]
fn optional_capture_unwraps_the_payload() {
    let analyzed = assert_semantic_ok!(
        "fn f() void {\n    const v: ?u8 = null;\n    if (v) |x| {\n        _ = x;\n    }\n}\n"
    );

    let x = analyzed.decl("x");
    assert!(x.flags.contains(DeclFlags::CAPTURE));
    assert_eq!(x.ty.to_string(), "u8");
    assert_eq!(analyzed.scope_of("x").kind, ContextKind::Other);
    assert!(matches!(analyzed.decl("v").ty.kind, TypeKind::Optional(_)));
}

#[test]
fn self_referential_struct_terminates() {
    let analyzed = assert_semantic_ok!("const Node = struct { next: ?*Node };");

    let node = analyzed.decl("Node");
    let next = analyzed.decl("next");
    assert_eq!(next.ty.to_string(), "?*Node");
    let inner = next
        .ty
        .optional_base()
        .map(|ptr| ptr.through_pointer())
        .expect("optional pointer");
    assert_eq!(inner.declaration(), node.ty.declaration());
}

#[test]
fn empty_container_bodies() {
    let analyzed = assert_semantic_ok!(
        "const E = enum {};\nconst U = union {};\nconst S = struct {};\n"
    );

    for name in ["E", "U", "S"] {
        let body = analyzed.body_of(name);
        assert!(body.declarations.is_empty(), "{name} has members");
    }
    assert_eq!(analyzed.body_of("E").kind, ContextKind::Enum);
    assert_eq!(analyzed.body_of("U").kind, ContextKind::Class);
    assert_eq!(analyzed.body_of("S").kind, ContextKind::Namespace);
}

#[test]
fn parser_errors_do_not_stop_analysis() {
    let analyzed = analyze!("const a: u8 = 1;\nconst b = ;\n");

    assert!(analyzed.top.problems.has_errors());
    assert!(analyzed.decl("a").ty.is_builtin("u8"));
}
