use crate::common::{find_node, in_function};
use crate::{assert_parses_err, assert_parses_ok};
use ziglens_compiler_parser::{NodeIndex, NodeKind, NodeTag, VisitResult};

#[test]
fn while_with_continue_expression_and_payload() {
    let ast = assert_parses_ok!(&in_function("while (it.next()) |item| : (i += 1) { _ = item; } else |err| {}"));
    let node = find_node(&ast, NodeTag::While).unwrap();
    assert_eq!(ast.kind(node), NodeKind::While);
    let data = ast.while_data(node).unwrap();
    assert_eq!(ast.token_slice(data.payload_token.unwrap()), "item");
    assert_eq!(ast.tag(data.cont_expr.unwrap()), NodeTag::AssignOp);
    assert_eq!(ast.token_slice(data.error_token.unwrap()), "err");
    assert!(data.else_expr.is_some());
}

#[test]
fn for_with_multiple_inputs() {
    let ast = assert_parses_ok!(&in_function("for (items, 0..) |*item, i| { _ = i; }"));
    let node = find_node(&ast, NodeTag::For).unwrap();
    assert_eq!(ast.for_input_count(node), 2);
    assert_eq!(ast.tag(ast.for_input_at(node, 1).unwrap()), NodeTag::ForRange);
    let captures = ast.captures(ast.payload_token(node).unwrap());
    assert_eq!(captures.len(), 2);
    assert!(captures[0].by_ref);
    assert_eq!(ast.token_slice(captures[0].token), "item");
    assert!(!captures[1].by_ref);
}

#[test]
fn switch_cases_items_and_payload() {
    let ast = assert_parses_ok!(&in_function(
        "switch (u) { .a => |v| { _ = v; }, 1...3, 5 => {}, else => unreachable, }"
    ));
    let switch = find_node(&ast, NodeTag::Switch).unwrap();
    assert_eq!(ast.switch_case_count(switch), 3);
    let first = ast.switch_case_at(switch, 0).unwrap();
    assert_eq!(ast.token_slice(ast.payload_token(first).unwrap()), "v");
    let second = ast.switch_case_at(switch, 1).unwrap();
    assert_eq!(ast.switch_case_item_count(second), 2);
    assert_eq!(
        ast.tag(ast.switch_case_item_at(second, 0).unwrap()),
        NodeTag::SwitchRange
    );
    let else_case = ast.switch_case_at(switch, 2).unwrap();
    assert_eq!(ast.switch_case_item_count(else_case), 0);
}

#[test]
fn defer_and_errdefer() {
    let ast = assert_parses_ok!(&in_function("defer x.deinit(); errdefer |e| log(e);"));
    let errdefer = find_node(&ast, NodeTag::Errdefer).unwrap();
    assert_eq!(ast.kind(errdefer), NodeKind::Defer);
    assert_eq!(ast.token_slice(ast.payload_token(errdefer).unwrap()), "e");
}

#[test]
fn if_expression_in_initializer() {
    let ast = assert_parses_ok!("const a = if (c) 1 else 2;");
    let node = find_node(&ast, NodeTag::If).unwrap();
    let data = ast.if_data(node).unwrap();
    assert!(data.payload_token.is_none());
    assert_eq!(ast.token_slice(ast.main_token(data.else_expr.unwrap())), "2");
}

#[test]
fn labeled_loop_and_continue() {
    let ast = assert_parses_ok!(&in_function("outer: while (true) { continue :outer; }"));
    let node = find_node(&ast, NodeTag::While).unwrap();
    assert_eq!(ast.spelling_name(node), "outer");
    let cont = find_node(&ast, NodeTag::Continue).unwrap();
    assert_eq!(ast.token_slice(ast.break_label(cont).unwrap()), "outer");
}

#[test]
fn visit_can_stop_early() {
    let ast = assert_parses_ok!("const a = 1;\nconst b = 2;\nconst c = 3;");
    let mut seen = 0;
    let completed = ast.visit(NodeIndex::ROOT, &mut |_, _| {
        seen += 1;
        if seen == 2 {
            VisitResult::Break
        } else {
            VisitResult::Continue
        }
    });
    assert!(!completed);
    assert_eq!(seen, 2);
}

#[test]
fn bad_statement_recovers_inside_block() {
    let errors = assert_parses_err!(&in_function("const = 1; var ok = 2;"));
    assert_eq!(errors, vec!["expected a name, found '='"]);
    let ast = ziglens_compiler_parser::parse_ast("t.zig", &in_function("const = 1; var ok = 2;"));
    let decl = find_node(&ast, NodeTag::VarDecl).unwrap();
    assert_eq!(ast.spelling_name(decl), "ok");
}
