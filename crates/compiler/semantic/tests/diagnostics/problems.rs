//! Tests for the semantic problems reported by the use pass

use ziglens_compiler_diagnostics::{ProblemCode, ProblemSource, Severity};

use crate::{assert_semantic_ok, assert_semantic_problems};

#[test]
fn undefined_name() {
    let analyzed = assert_semantic_problems!("const a = missing;\n", [ProblemCode::UndefinedName]);

    let problem = analyzed.top.problems.iter().next().expect("one problem");
    assert_eq!(problem.severity, Severity::Hint);
    assert_eq!(problem.source, ProblemSource::SemanticAnalysis);
    assert_eq!(problem.range.start.column, 10);
    assert!(problem.file_path.ends_with("undefined_name.zig"));
    assert!(analyzed.render_problems().contains("Undefined name 'missing'"));
}

#[test]
fn unknown_field() {
    let analyzed = assert_semantic_problems!(
        "const P = struct { x: u8 };\nconst p = P{ .x = 1 };\nconst y = p.z;\n",
        [ProblemCode::UnknownField]
    );

    insta::assert_snapshot!(
        analyzed.top.problems.iter().next().expect("one problem").message,
        @"No field named 'z' in 'P'"
    );
}

#[test]
fn argument_type_mismatch() {
    let analyzed = assert_semantic_problems!(
        "fn takes(x: bool) void {\n    _ = x;\n}\nconst r = takes(1);\n",
        [ProblemCode::ArgumentTypeMismatch]
    );

    insta::assert_snapshot!(
        analyzed.top.problems.iter().next().expect("one problem").message,
        @"Expected type 'bool', found 'comptime_int = 1'"
    );
}

#[test]
fn method_arguments_skip_the_receiver() {
    assert_semantic_problems!(
        "const S = struct {\n    pub fn take(self: S, flag: bool) void {\n        _ = self;\n        _ = flag;\n    }\n};\nconst s = S{};\nconst r = s.take(1);\n",
        [ProblemCode::ArgumentTypeMismatch]
    );
}

#[test]
fn initializer_type_mismatch() {
    assert_semantic_problems!(
        "const P = struct { x: u8 };\nconst p = P{ .x = true };\n",
        [ProblemCode::InitializerTypeMismatch]
    );
}

#[test]
fn assignment_type_mismatch() {
    assert_semantic_problems!(
        "fn f() void {\n    var a: bool = false;\n    a = 5;\n}\n",
        [ProblemCode::AssignmentTypeMismatch]
    );
}

#[test]
fn condition_type_mismatch() {
    assert_semantic_problems!(
        "fn f(n: u8) void {\n    if (n) {}\n}\n",
        [ProblemCode::ConditionTypeMismatch]
    );
}

#[test]
fn case_type_mismatch() {
    assert_semantic_problems!(
        "fn f(n: u8) void {\n    switch (n) {\n        true => {},\n        else => {},\n    }\n}\n",
        [ProblemCode::CaseTypeMismatch]
    );
}

#[test]
fn captures_of_the_wrong_shape() {
    assert_semantic_problems!(
        "fn f(n: u8) void {\n    if (n) |v| {\n        _ = v;\n    }\n}\n",
        [ProblemCode::NonOptionalCapture]
    );
    assert_semantic_problems!(
        "fn g(n: u8) void {\n    for (n) |v| {\n        _ = v;\n    }\n}\n",
        [ProblemCode::NonIterableCapture]
    );
    assert_semantic_problems!(
        "fn h(n: ?u8) void {\n    if (n) |v| {\n        _ = v;\n    } else |e| {\n        _ = e;\n    }\n}\n",
        [ProblemCode::NonErrorCapture]
    );
}

#[test]
fn usingnamespace_needs_a_container() {
    assert_semantic_problems!(
        "const n: u8 = 1;\nusingnamespace n;\n",
        [ProblemCode::UsingNamespaceNotContainer]
    );
}

#[test]
fn problems_are_sorted_by_position() {
    assert_semantic_problems!(
        "const a = missing;\nconst b: bool = 5;\nconst c = also_missing;\n",
        [
            ProblemCode::UndefinedName,
            ProblemCode::AssignmentTypeMismatch,
            ProblemCode::UndefinedName
        ]
    );
}

#[test]
fn indeterminate_types_never_mismatch() {
    assert_semantic_ok!(
        "fn f(x: anytype) void {\n    const y: u8 = x;\n    _ = y;\n}\nfn g(comptime T: type, v: T) void {\n    const w: bool = v;\n    _ = w;\n}\n"
    );
}

#[test]
fn discard_and_builtin_names_are_not_resolved() {
    assert_semantic_ok!("fn f() void {\n    _ = u8;\n    _ = true;\n    _ = null;\n}\n");
}

#[test]
fn comptime_known_integers_narrow_only_when_they_fit() {
    assert_semantic_problems!(
        "const big: u64 = 5000;\nconst small: u8 = big;\n",
        [ProblemCode::AssignmentTypeMismatch]
    );
    assert_semantic_problems!(
        "const negative: i32 = -1;\nconst unsigned: u32 = negative;\n",
        [ProblemCode::AssignmentTypeMismatch]
    );
    let analyzed = assert_semantic_ok!("const wide: u64 = 200;\nconst narrow: u8 = wide;\n");
    assert_eq!(analyzed.type_of("narrow"), "u8 = 200");
}
