//! Tests for `@import`, packages and `usingnamespace` across files

use ziglens_compiler_semantic::{DeclFlags, DeclarationKind, Modifiers, TypeKind};

use crate::{find_decl, TestProject};

#[test]
fn unpublished_import_is_delayed_and_scheduled() {
    let project = TestProject::new(&[
        ("a.zig", "const b = @import(\"b.zig\");\nconst y = b.B;\n"),
        ("b.zig", "pub const B = struct { y: u8 };\n"),
    ]);

    let outcome = project.run("a.zig");
    assert!(!outcome.reused);
    assert!(outcome.top.problems.is_empty());

    let b = find_decl(&outcome.top, "b");
    assert_eq!(b.kind, DeclarationKind::Alias);
    assert!(b.ty.is_delayed());
    assert!(b.ty.modifiers.contains(Modifiers::MODULE));
    assert_eq!(b.ty.to_string(), project.path("b.zig").to_string_lossy());
    assert!(outcome.top.unresolved_imports.contains(&project.path("b.zig")));
    assert_eq!(project.scheduler.pending(), vec![project.path("b.zig")]);
}

#[test]
fn circular_imports_settle() {
    let project = TestProject::new(&[
        (
            "a.zig",
            "const b = @import(\"b.zig\");\npub const A = struct { x: u8 };\nconst y = b.B;\n",
        ),
        (
            "b.zig",
            "const a = @import(\"a.zig\");\npub const B = struct { y: u8 };\nconst z = a.A;\n",
        ),
    ]);

    let jobs = project.run_until_idle("a.zig");
    assert_eq!(jobs, 3);

    let a = project.top("a.zig");
    assert!(a.unresolved_imports.is_empty());
    let b = find_decl(&a, "b");
    assert!(matches!(b.ty.kind, TypeKind::Structure(_)));
    assert!(b.ty.is_module());
    assert_eq!(b.ty.to_string(), "b");
    assert_eq!(project.type_of("a.zig", "y"), "B");
    assert_eq!(project.type_of("b.zig", "z"), "A");
    assert!(project.chain.dependents_of(&project.path("b.zig")).is_empty());
}

#[test]
fn self_import_is_the_module_itself() {
    let project = TestProject::new(&[(
        "self.zig",
        "const me = @import(\"self.zig\");\npub const value: u8 = 1;\nconst v = me.value;\n",
    )]);

    assert_eq!(project.run_until_idle("self.zig"), 1);
    assert_eq!(project.type_of("self.zig", "v"), "u8 = 1");
}

#[test]
fn packages_resolve_through_the_manifest() {
    let project = TestProject::with_manifest(
        "[packages]\nmylib = \"lib/main.zig\"\n",
        &[
            ("main.zig", "const lib = @import(\"mylib\");\nconst v = lib.answer;\n"),
            ("lib/main.zig", "//! Library root.\npub const answer = 1 + 2;\n"),
        ],
    );

    project.run_until_idle("main.zig");

    assert_eq!(project.type_of("main.zig", "v"), "comptime_int = 3");
    let lib = project.top("lib/main.zig");
    let module = lib
        .owner()
        .and_then(|id| lib.declaration(id))
        .expect("module declaration");
    assert!(module.flags.contains(DeclFlags::MODULE));
    assert_eq!(module.identifier.as_str(), "mylib");
    assert_eq!(module.comment.as_deref(), Some("Library root."));
}

#[test]
fn unknown_package_is_unknown() {
    let project = TestProject::new(&[("main.zig", "const lib = @import(\"nowhere\");\nconst v = lib.x;\n")]);

    let outcome = project.run("main.zig");
    assert!(outcome.top.problems.is_empty());
    assert!(find_decl(&outcome.top, "lib").ty.is_unknown());
    assert!(project.scheduler.pending().is_empty());
}

#[test]
fn usingnamespace_flattens_imported_members() {
    let project = TestProject::new(&[
        ("base.zig", "pub const one: u8 = 1;\npub fn helper() u8 {\n    return one;\n}\n"),
        ("mid.zig", "pub usingnamespace @import(\"base.zig\");\npub const two: u8 = 2;\n"),
        (
            "main.zig",
            "const mid = @import(\"mid.zig\");\nconst h = mid.helper();\nconst t = mid.two;\nconst o = mid.one;\n",
        ),
    ]);

    project.run_until_idle("base.zig");
    project.run_until_idle("main.zig");

    let main = project.top("main.zig");
    assert!(main.problems.is_empty(), "{:?}", main.problems);
    assert_eq!(project.type_of("main.zig", "h"), "u8");
    assert_eq!(project.type_of("main.zig", "t"), "u8 = 2");
    assert_eq!(project.type_of("main.zig", "o"), "u8 = 1");

    let mid = project.top("mid.zig");
    let root = mid.context(mid.root()).expect("root scope");
    assert_eq!(root.imported_parents.len(), 1);
}

#[test]
fn usingnamespace_is_transitive() {
    let project = TestProject::new(&[
        ("base.zig", "pub const deep: u8 = 7;\n"),
        ("mid.zig", "pub usingnamespace @import(\"base.zig\");\n"),
        ("top.zig", "pub usingnamespace @import(\"mid.zig\");\n"),
        ("main.zig", "const top = @import(\"top.zig\");\nconst d = top.deep;\n"),
    ]);

    project.run_until_idle("base.zig");
    project.run_until_idle("mid.zig");
    project.run_until_idle("main.zig");

    assert_eq!(project.type_of("main.zig", "d"), "u8 = 7");
}
