//! Tests for functions, parameters, return types and test declarations

use ziglens_compiler_semantic::{ContextKind, DeclFlags, DeclarationKind, Modifiers};

use crate::assert_semantic_ok;

#[test]
fn parameters_live_in_the_function_scope() {
    let analyzed = assert_semantic_ok!(
        "fn scale(value: u32, comptime factor: u32, extra: anytype) u32 {\n    _ = extra;\n    return value * factor;\n}\n"
    );

    let scale = analyzed.decl("scale");
    assert_eq!(scale.kind, DeclarationKind::Function);
    assert_eq!(
        scale.ty.to_string(),
        "fn (u32, comptime u32, anytype) u32"
    );

    let parameters = analyzed.body_of("scale");
    assert_eq!(parameters.kind, ContextKind::Function);
    assert_eq!(analyzed.names_in(parameters), vec!["value", "factor", "extra"]);
    assert!(analyzed.decl("value").flags.contains(DeclFlags::PARAM));
    let factor = analyzed.decl("factor");
    assert!(factor.flags.contains(DeclFlags::COMPTIME));
    assert!(factor.ty.modifiers.contains(Modifiers::COMPTIME));
    assert!(analyzed.decl("extra").ty.is_builtin("anytype"));
}

#[test]
fn inferred_error_set_wraps_the_return_type() {
    let analyzed = assert_semantic_ok!("fn read() !u8 {\n    return 1;\n}\n");

    insta::assert_snapshot!(analyzed.type_of("read"), @"fn () anyerror!u8");
}

#[test]
fn type_returning_function_yields_its_body_type() {
    let analyzed = assert_semantic_ok!(
        "fn Pair(comptime T: type) type {\n    return struct { first: T, second: T };\n}\nconst P = Pair(u8);\n"
    );

    let anonymous = analyzed
        .top
        .declarations
        .iter()
        .find(|d| d.flags.contains(DeclFlags::ANONYMOUS))
        .expect("anonymous struct");
    let pair = analyzed.decl("P");
    assert_eq!(
        pair.ty.declaration(),
        anonymous.ty.declaration()
    );
    assert_eq!(analyzed.type_of("first"), "T");
}

#[test]
fn method_call_skips_the_receiver() {
    let analyzed = assert_semantic_ok!(
        "const List = struct {\n    len: usize,\n    pub fn count(self: List) usize {\n        return self.len;\n    }\n};\nconst l = List{ .len = 3 };\nconst n = l.count();\n"
    );

    assert_eq!(analyzed.type_of("n"), "usize");
    assert_eq!(analyzed.decl("count").returned_param, None);
}

#[test]
fn generic_receiver_binds_delayed_parameters() {
    let analyzed = assert_semantic_ok!(
        "fn first(comptime T: type, items: []const T) T {\n    return items[0];\n}\nconst bytes: []const u8 = \"abc\";\nconst b = first(u8, bytes);\n"
    );

    assert!(analyzed.decl("b").ty.is_builtin("u8"));
}

#[test]
fn recursive_function_terminates() {
    let analyzed = assert_semantic_ok!(
        "fn fact(n: u32) u32 {\n    if (n == 0) {\n        return 1;\n    }\n    return n * fact(n - 1);\n}\nconst six = fact(3);\n"
    );

    assert_eq!(analyzed.type_of("fact"), "fn (u32) u32");
    assert_eq!(analyzed.type_of("six"), "u32");
}

#[test]
fn tests_are_named_but_not_nameable() {
    let analyzed = assert_semantic_ok!("test \"adds numbers\" {}\ntest {}\n");

    for name in ["test adds numbers", "test 0"] {
        let decl = analyzed.decl(name);
        assert!(decl.flags.contains(DeclFlags::TEST));
        assert!(!decl.is_nameable());
        assert!(decl.ty.is_builtin("test"));
    }
}
