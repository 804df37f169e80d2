use ziglens_compiler_parser::{parse_ast, Ast, NodeIndex, NodeTag, VisitResult};

/// Parses `code` and panics with the formatted errors if there are any.
#[track_caller]
pub fn assert_parses_ok_impl(code: &str, test_name: &str) -> Ast {
    let ast = parse_ast("test.zig", code);
    if ast.error_count() > 0 {
        let errors = ast
            .errors()
            .iter()
            .map(|e| format!("{}: {}", e.range.start, e.message))
            .collect::<Vec<_>>()
            .join("\n");
        panic!("{test_name}: expected successful parse, but got errors:\n{errors}");
    }
    ast
}

/// Parses `code`, asserts that it has errors, and returns their messages.
#[track_caller]
pub fn assert_parses_err_impl(code: &str, test_name: &str) -> Vec<String> {
    let ast = parse_ast("test.zig", code);
    assert!(
        ast.error_count() > 0,
        "{test_name}: expected parse errors, but parsing succeeded:\n{}",
        ast.dump(NodeIndex::ROOT)
    );
    ast.errors().iter().map(|e| e.message.clone()).collect()
}

#[macro_export]
macro_rules! assert_parses_ok {
    ($code:expr) => {{
        let function_name = stdext::function_name!();
        $crate::common::assert_parses_ok_impl($code, function_name)
    }};
}

#[macro_export]
macro_rules! assert_parses_err {
    ($code:expr) => {{
        let function_name = stdext::function_name!();
        $crate::common::assert_parses_err_impl($code, function_name)
    }};
}

/// Wraps statements in a function body.
pub fn in_function(code: &str) -> String {
    format!("fn wrapper() void {{ {code} }}")
}

/// First node with `tag` in a depth-first walk from the root.
pub fn find_node(ast: &Ast, tag: NodeTag) -> Option<NodeIndex> {
    let mut found = None;
    ast.visit(NodeIndex::ROOT, &mut |child, _| {
        if ast.tag(child) == tag {
            found = Some(child);
            VisitResult::Break
        } else {
            VisitResult::Recurse
        }
    });
    found
}

/// Tree dump without the trailing newline.
pub fn dump(ast: &Ast) -> String {
    ast.dump(NodeIndex::ROOT).trim_end().to_string()
}
