//! Tests for expression types and comptime folding

use ziglens_compiler_semantic::TypeKind;

use crate::assert_semantic_ok;

#[test]
fn arithmetic_on_literals_folds() {
    let analyzed = assert_semantic_ok!("const a = 1 + 2;\nconst b = 3 > 2;\nconst c = -4 * 2;\n");

    insta::assert_snapshot!(analyzed.type_of("a"), @"comptime_int = 3");
    insta::assert_snapshot!(analyzed.type_of("b"), @"bool = true");
    assert_eq!(analyzed.decl("c").ty.value_str(), Some("-8"));
}

#[test]
fn typed_operand_wins_over_literal() {
    let analyzed = assert_semantic_ok!(
        "const small: u8 = 7;\nconst sum = small + 1;\nconst big: u8 = 200;\nconst overflow = big + 100;\n"
    );

    assert_eq!(analyzed.type_of("sum"), "u8 = 8");
    assert_eq!(analyzed.type_of("overflow"), "u8");
}

#[test]
fn logical_operators_fold() {
    let analyzed = assert_semantic_ok!("const a = true and false;\nconst b = !a;\n");

    assert_eq!(analyzed.type_of("a"), "bool = false");
    assert_eq!(analyzed.type_of("b"), "bool = true");
}

#[test]
fn string_concatenation_and_indexing() {
    let analyzed = assert_semantic_ok!(
        "const joined = \"ab\" ++ \"cd\";\nconst letter = \"hello\"[1];\nconst n = joined.len;\n"
    );

    assert_eq!(analyzed.decl("joined").ty.value_str(), Some("abcd"));
    assert_eq!(analyzed.type_of("letter"), "u8 = e");
    assert_eq!(analyzed.type_of("n"), "usize = 4");
}

#[test]
fn catch_and_orelse_unwrap() {
    let analyzed = assert_semantic_ok!(
        "fn mayFail() !u8 {\n    return 1;\n}\nconst a = mayFail() catch null;\nconst maybe: ?u8 = 5;\nconst b = maybe orelse 0;\n"
    );

    assert_eq!(analyzed.type_of("a"), "?u8");
    assert!(analyzed.decl("b").ty.is_builtin("u8"));
}

#[test]
fn comptime_known_branches_are_selected() {
    let analyzed = assert_semantic_ok!(
        "const x = if (false) \"a\" else 5;\nconst word = switch (2) {\n    1 => \"one\",\n    2 => \"two\",\n    else => \"many\",\n};\n"
    );

    insta::assert_snapshot!(analyzed.type_of("x"), @"comptime_int = 5");
    assert_eq!(analyzed.decl("word").ty.value_str(), Some("two"));
}

#[test]
fn diverging_branches_merge_into_unsure() {
    let analyzed = assert_semantic_ok!(
        "fn pick(c: bool) void {\n    const m = if (c) @as(u8, 1) else true;\n    _ = m;\n}\n"
    );

    let m = analyzed.decl("m");
    assert!(matches!(m.ty.kind, TypeKind::Unsure(_)));
    assert_eq!(m.ty.to_string(), "unsure(u8, bool)");
}

#[test]
fn builtins_fold_their_operands() {
    let analyzed = assert_semantic_ok!(
        "const E = enum(u8) { a = 3, b };\nconst tag = @intFromEnum(E.b);\nconst size = @sizeOf(u32);\nconst bits = @bitSizeOf(u16);\nconst narrowed = @as(u16, 9);\n"
    );

    assert_eq!(analyzed.decl("tag").ty.value_str(), Some("4"));
    insta::assert_snapshot!(analyzed.type_of("size"), @"comptime_int = 4");
    assert_eq!(analyzed.type_of("bits"), "comptime_int = 16");
    assert_eq!(analyzed.type_of("narrowed"), "u16 = 9");
}

#[test]
fn this_names_the_enclosing_container() {
    let analyzed = assert_semantic_ok!(
        "const S = struct {\n    const Self = @This();\n    value: u8,\n};\n"
    );

    assert_eq!(analyzed.type_of("Self"), "S");
    assert_eq!(
        analyzed.decl("Self").ty.declaration(),
        analyzed.decl("S").ty.declaration()
    );
}

#[test]
fn pointers_and_slices_render_their_qualifiers() {
    let analyzed = assert_semantic_ok!(
        "const a: *const u8 = undefined;\nconst b: []const u8 = undefined;\nconst c: [*]u8 = undefined;\nconst d: [4]u8 = undefined;\n"
    );

    assert_eq!(analyzed.type_of("a"), "*const u8");
    assert_eq!(analyzed.type_of("b"), "[]const u8");
    assert_eq!(analyzed.type_of("c"), "[*]u8");
    assert_eq!(analyzed.type_of("d"), "[4]u8");
}

#[test]
fn string_repetition_folds_only_short_results() {
    let analyzed = assert_semantic_ok!(
        "const short = \"ab\" ** 3;\nconst huge = \"ab\" ** 1000000000000;\nconst overflowing = \"ab\" ** 9223372036854775807;\n"
    );

    assert_eq!(analyzed.decl("short").ty.value_str(), Some("ababab"));
    assert_eq!(analyzed.decl("huge").ty.value_str(), None);
    assert_eq!(analyzed.decl("overflowing").ty.value_str(), None);
}
