//! Tests for payload, error, loop and switch captures

use ziglens_compiler_semantic::{ContextKind, DeclFlags};

use crate::assert_semantic_ok;

#[test]
fn error_union_if_captures_payload_and_error() {
    let analyzed = assert_semantic_ok!(
        "fn mayFail() !u8 {\n    return 1;\n}\nfn f() void {\n    if (mayFail()) |value| {\n        _ = value;\n    } else |err| {\n        _ = err;\n    }\n}\n"
    );

    assert_eq!(analyzed.type_of("value"), "u8");
    assert_eq!(analyzed.type_of("err"), "anyerror");
    assert_ne!(analyzed.decl("value").context, analyzed.decl("err").context);
    for name in ["value", "err"] {
        assert!(analyzed.decl(name).flags.contains(DeclFlags::CAPTURE));
        assert_eq!(analyzed.scope_of(name).kind, ContextKind::Other);
    }
}

#[test]
fn catch_captures_the_error() {
    let analyzed = assert_semantic_ok!(
        "fn mayFail() !u8 {\n    return 1;\n}\nfn f() void {\n    _ = mayFail() catch |failure| {\n        _ = failure;\n        return;\n    };\n}\n"
    );

    assert_eq!(analyzed.type_of("failure"), "anyerror");
}

#[test]
fn errdefer_captures_the_function_error_set() {
    let analyzed = assert_semantic_ok!(
        "const Oops = error{ Bad };\nfn g() Oops!void {\n    errdefer |e| {\n        _ = e;\n    }\n    return error.Bad;\n}\n"
    );

    assert_eq!(analyzed.type_of("e"), "Oops");
}

#[test]
fn for_captures_elements_and_indices() {
    let analyzed = assert_semantic_ok!(
        "fn f() void {\n    const items = [_]u8{ 1, 2 };\n    for (items, 0..) |item, index| {\n        _ = item;\n        _ = index;\n    }\n    for (0..3) |i| {\n        _ = i;\n    }\n}\n"
    );

    assert_eq!(analyzed.type_of("item"), "u8");
    assert_eq!(analyzed.type_of("index"), "usize");
    assert_eq!(analyzed.type_of("i"), "usize");
}

#[test]
fn by_reference_capture_is_a_pointer() {
    let analyzed = assert_semantic_ok!(
        "fn f() void {\n    var items = [_]u8{ 1, 2 };\n    for (&items) |*item| {\n        item.* = 0;\n    }\n}\n"
    );

    assert_eq!(analyzed.type_of("item"), "*u8");
}

#[test]
fn while_unwraps_an_optional() {
    let analyzed = assert_semantic_ok!(
        "fn f() void {\n    var next: ?u16 = null;\n    while (next) |n| {\n        _ = n;\n        next = null;\n    }\n}\n"
    );

    assert_eq!(analyzed.type_of("n"), "u16");
}

#[test]
fn switch_prong_captures_the_union_payload() {
    let analyzed = assert_semantic_ok!(
        "const Value = union(enum) { int: u32, flag: bool };\nfn f(v: Value) void {\n    switch (v) {\n        .int => |n| {\n            _ = n;\n        },\n        .flag => |b| {\n            _ = b;\n        },\n    }\n}\n"
    );

    assert_eq!(analyzed.type_of("n"), "u32");
    assert_eq!(analyzed.type_of("b"), "bool");
    assert_ne!(analyzed.decl("n").context, analyzed.decl("b").context);
}
