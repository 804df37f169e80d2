//! Tests for scope nesting and name visibility

use ziglens_compiler_diagnostics::ProblemCode;
use ziglens_compiler_semantic::{ContextKind, Identifier};

use crate::{ancestry, assert_semantic_ok, assert_semantic_problems};

#[test]
fn functions_see_later_top_level_declarations() {
    let analyzed = assert_semantic_ok!(
        "fn get() u8 {\n    return limit;\n}\nconst limit: u8 = 10;\nconst g = get();\n"
    );

    assert_eq!(analyzed.type_of("g"), "u8");
}

#[test]
fn blocks_only_see_earlier_locals() {
    let analyzed = assert_semantic_problems!(
        "fn f() void {\n    _ = later;\n    const later: u8 = 1;\n}\n",
        [ProblemCode::UndefinedName]
    );

    let problem = analyzed.top.problems.iter().next().expect("one problem");
    assert_eq!(problem.range.start.line, 1);
    assert!(problem.message.contains("later"));
}

#[test]
fn innermost_declaration_wins() {
    let analyzed = assert_semantic_ok!(
        "const value: u8 = 1;\nfn f() void {\n    const value: bool = true;\n    _ = value;\n}\n"
    );

    let root = analyzed.top.root();
    let name = Identifier::new("value");
    let (inner_id, inner) = analyzed
        .top
        .declarations
        .iter_enumerated()
        .find(|(_, d)| d.identifier == name && d.context != root)
        .expect("local declaration");
    assert_eq!(inner.ty.to_string(), "bool = true");

    let used: Vec<_> = analyzed
        .top
        .uses()
        .filter(|u| u.range.start.line == 3)
        .collect();
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].declaration.file, analyzed.top.file);
    assert_eq!(used[0].declaration.decl, inner_id);
}

#[test]
fn nested_blocks_chain_up_to_the_file() {
    let analyzed = assert_semantic_ok!(
        "fn f() void {\n    {\n        const inner: u8 = 1;\n        _ = inner;\n    }\n}\n"
    );

    let inner = analyzed.decl("inner");
    let kinds: Vec<_> = ancestry(&analyzed.top, inner.context)
        .into_iter()
        .map(|ctx| analyzed.top.context(ctx).expect("scope").kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ContextKind::Other,
            ContextKind::Other,
            ContextKind::Function,
            ContextKind::Global
        ]
    );
}

#[test]
fn labeled_block_initializer_gets_its_own_scope() {
    let analyzed = assert_semantic_ok!(
        "const x = blk: {\n    const tmp: u8 = 1;\n    break :blk tmp;\n};\n"
    );

    assert_eq!(analyzed.type_of("x"), "u8 = 1");
    let kinds: Vec<_> = ancestry(&analyzed.top, analyzed.decl("tmp").context)
        .into_iter()
        .map(|ctx| analyzed.top.context(ctx).expect("scope").kind)
        .collect();
    assert_eq!(
        kinds,
        vec![ContextKind::Other, ContextKind::Other, ContextKind::Global]
    );
    assert_eq!(analyzed.scope_of("x").kind, ContextKind::Global);
}

#[test]
fn union_fields_are_hidden_from_method_bodies() {
    assert_semantic_problems!(
        "const U = union {\n    a: u8,\n    pub fn get() void {\n        _ = a;\n    }\n};\n",
        [ProblemCode::UndefinedName]
    );
}

#[test]
fn struct_members_are_visible_from_method_bodies() {
    let analyzed = assert_semantic_ok!(
        "const S = struct {\n    const limit: u8 = 3;\n    pub fn get() u8 {\n        return limit;\n    }\n};\n"
    );

    let get = analyzed.decl("get");
    assert_eq!(get.ty.to_string(), "fn () u8");
}

#[test]
fn context_at_finds_the_innermost_scope() {
    let analyzed = assert_semantic_ok!(
        "fn f() void {\n    const a: u8 = 1;\n    _ = a;\n}\n"
    );

    let a = analyzed.decl("a");
    let ctx = analyzed.top.context_at(a.range.start);
    assert_eq!(ctx, a.context);
}
