//! Tests for member and identifier completion

use ziglens_compiler_diagnostics::Position;
use ziglens_compiler_semantic::{complete, CompletionKind};

use crate::{assert_semantic_ok, complete_after, item_names, TestProject};

#[test]
fn enum_members_after_the_type_name() {
    let analyzed = assert_semantic_ok!("const Status = enum { Ok, Err };\nconst s = Status.Ok;\n");

    let items = analyzed.complete_after("const s = Status.");
    assert_eq!(item_names(&items), vec!["Ok", "Err"]);
    assert!(items.iter().all(|item| item.kind == CompletionKind::Field));
    assert_eq!(items[0].detail, "Status = Ok");
}

#[test]
fn partially_typed_member_is_ignored() {
    let analyzed = assert_semantic_ok!(
        "const P = struct {\n    x: u8,\n    pub fn get() void {}\n};\nconst Outer = struct { p: P };\nconst o = Outer{ .p = P{ .x = 1 } };\nconst v = o.p.x;\n"
    );

    let items = analyzed.complete_after("const v = o.p.x");
    assert_eq!(item_names(&items), vec!["x", "get"]);
    assert_eq!(items[0].kind, CompletionKind::Field);
    assert_eq!(items[0].detail, "u8");
    assert_eq!(items[1].kind, CompletionKind::Function);
}

#[test]
fn visible_names_list_shadowed_names_once() {
    let analyzed = assert_semantic_ok!(
        "const limit: u8 = 1;\nfn f(arg: u8) void {\n    const limit: u8 = 2;\n    _ = arg;\n    _ = limit;\n}\n"
    );

    let items = analyzed.complete_after("    _ = arg;");
    assert_eq!(item_names(&items), vec!["limit", "arg", "f"]);
    assert_eq!(items[0].detail, "u8 = 2");
    assert_eq!(items[0].kind, CompletionKind::Variable);
    assert_eq!(items[2].kind, CompletionKind::Function);
}

#[test]
fn unresolvable_chain_has_no_items() {
    let analyzed = assert_semantic_ok!("const a: u8 = 1;\n");

    let items = complete(&analyzed.chain, &analyzed.top, "const b = nothing.", Position::new(1, 18));
    assert!(items.is_empty());
    let items = complete(&analyzed.chain, &analyzed.top, "const b = a.", Position::new(1, 12));
    assert!(items.is_empty());
}

#[test]
fn members_through_usingnamespace_across_files() {
    let project = TestProject::new(&[
        ("base.zig", "pub const one: u8 = 1;\npub fn helper() u8 {\n    return one;\n}\n"),
        (
            "mid.zig",
            "const std = @import(\"nowhere\");\npub usingnamespace @import(\"base.zig\");\npub const two: u8 = 2;\n",
        ),
        ("main.zig", "const mid = @import(\"mid.zig\");\nconst t = mid.two;\n"),
    ]);
    project.run_until_idle("base.zig");
    project.run_until_idle("main.zig");

    let top = project.top("main.zig");
    let items = complete_after(&project.chain, &top, &project.source("main.zig"), "const t = mid.");
    assert_eq!(item_names(&items), vec!["two", "one", "helper"]);
    assert_eq!(items[0].declaration.file, project.top("mid.zig").file);
    assert_eq!(items[1].declaration.file, project.top("base.zig").file);
}

#[test]
fn module_aliases_complete_as_modules() {
    let project = TestProject::new(&[
        ("lib.zig", "pub const x: u8 = 1;\n"),
        ("main.zig", "const lib = @import(\"lib.zig\");\nconst y = lib.x;\n"),
    ]);
    project.run_until_idle("main.zig");

    let top = project.top("main.zig");
    let items = complete_after(&project.chain, &top, &project.source("main.zig"), "const y = ");
    let lib = items
        .iter()
        .find(|item| item.name == "lib")
        .expect("lib is visible");
    assert_eq!(lib.kind, CompletionKind::Module);
    assert_eq!(lib.detail, "lib");
}
