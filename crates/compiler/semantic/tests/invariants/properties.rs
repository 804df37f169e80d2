//! Structural properties every analyzed document satisfies

use ziglens_compiler_diagnostics::Range;
use ziglens_compiler_semantic::{analyze_source, ContextId};

use crate::{analyze, document_path, Analyzed};

const SAMPLE: &str = r#"//! Sample module.
const Point = struct {
    x: i32,
    y: i32 = 0,
    pub fn norm(self: Point) i32 {
        return self.x * self.x + self.y * self.y;
    }
};
const Shape = union(enum) { circle: u32, square: u32, none };
const Color = enum(u8) { red, green = 4, blue };
fn area(shape: Shape) u32 {
    return switch (shape) {
        .circle => |r| r * r * 3,
        .square => |s| s * s,
        .none => 0,
    };
}
pub fn main() void {
    const p = Point{ .x = 3 };
    const n = p.norm();
    var total: u32 = 0;
    for ([_]u32{ 1, 2, 3 }) |v| {
        total += v;
    }
    if (total > 3) {
        _ = n;
    }
    _ = area(Shape{ .circle = 2 });
    _ = Color.blue;
}
test "area" {
    _ = area(.none);
}
"#;

/// Source text covered by a single-line range.
fn text_at<'s>(source: &'s str, range: Range) -> &'s str {
    let line = source
        .lines()
        .nth(range.start.line as usize)
        .unwrap_or_default();
    &line[range.start.column as usize..range.end.column as usize]
}

fn sample() -> Analyzed {
    analyze!(SAMPLE)
}

#[test]
fn sample_has_no_problems() {
    let analyzed = sample();
    assert!(
        analyzed.top.problems.is_empty(),
        "{}",
        analyzed.render_problems()
    );
}

#[test]
fn every_declaration_is_listed_once_in_its_scope() {
    let analyzed = sample();
    let top = &analyzed.top;

    for (id, decl) in top.declarations.iter_enumerated() {
        let ctx = top.context(decl.context).expect("declaration scope exists");
        let listed = ctx.declarations.iter().filter(|&&d| d == id).count();
        assert_eq!(listed, 1, "{} listed {listed} times", decl.identifier);
    }
    for (ctx_id, ctx) in top.contexts.iter_enumerated() {
        for &id in &ctx.declarations {
            let decl = top.declaration(id).expect("listed declaration exists");
            assert_eq!(decl.context, ctx_id, "{}", decl.identifier);
        }
    }
}

#[test]
fn scope_tree_is_consistent() {
    let analyzed = sample();
    let top = &analyzed.top;

    let root = top.context(top.root()).expect("root scope");
    assert!(root.parent.is_none());
    for (id, ctx) in top.contexts.iter_enumerated() {
        for &child in &ctx.children {
            let child_ctx = top.context(child).expect("child scope exists");
            assert_eq!(child_ctx.parent, Some(id));
        }
        if let Some(parent) = ctx.parent {
            let parent_ctx = top.context(parent).expect("parent scope exists");
            assert!(parent_ctx.children.contains(&id));
        }
        if let Some(owner) = ctx.owner {
            let decl = top.declaration(owner).expect("owner exists");
            assert_eq!(decl.internal_context, Some(id), "{}", decl.identifier);
        }
    }
    let reachable: Vec<ContextId> = top.contexts.indices().collect();
    assert!(reachable
        .iter()
        .all(|&ctx| top.ancestors(ctx).last() == Some(top.root())));
}

#[test]
fn every_use_names_its_declaration() {
    let analyzed = sample();
    let top = &analyzed.top;

    let uses: Vec<_> = top.uses().collect();
    assert!(uses.len() > 20, "only {} uses", uses.len());
    for used in uses {
        let owner = analyzed
            .chain
            .top(used.declaration.file)
            .expect("declaring file is published");
        let decl = owner
            .declaration(used.declaration.decl)
            .expect("declaration exists");
        assert_eq!(
            text_at(&analyzed.source, used.range),
            decl.identifier.as_str(),
            "use at {}",
            used.range.start
        );
    }
}

#[test]
fn analysis_is_idempotent() {
    let first = sample();
    let second = sample();
    assert_eq!(first.top.dump(), second.top.dump());

    let again = analyze_source(
        &first.chain,
        &first.project,
        document_path("sample"),
        SAMPLE,
    )
    .expect("second analysis");
    assert_eq!(again.file, first.top.file);
    assert_eq!(again.dump(), first.top.dump());
    assert_eq!(again.declarations.len(), first.top.declarations.len());
    assert_eq!(again.uses().count(), first.top.uses().count());
}

#[test]
fn dump_shows_the_scope_tree() {
    let analyzed = analyze!("const S = struct { a: u8 };\nfn f(x: u8) void {\n    _ = x;\n}\n");

    insta::assert_snapshot!(analyzed.top.dump(), @r"
    Global (dump_shows_the_scope_tree)
      - dump_shows_the_scope_tree: dump_shows_the_scope_tree
      - S: S
      - f: fn (u8) void
      Namespace (S)
        - a: u8
      Function (f)
        - x: u8
        Other
    ");
}
