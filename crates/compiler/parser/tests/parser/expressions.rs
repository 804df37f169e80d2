use crate::common::{dump, find_node, in_function};
use crate::{assert_parses_err, assert_parses_ok};
use ziglens_compiler_parser::{NodeIndex, NodeKind, NodeTag};

// ===================
// Operators
// ===================

#[test]
fn orelse_binds_looser_than_arithmetic() {
    let ast = assert_parses_ok!("const a = b orelse c + 1;");
    insta::assert_snapshot!(dump(&ast), @r"
    Root
      VarDecl 'a'
        Orelse
          Identifier 'b'
          Add
            Identifier 'c'
            NumberLiteral 1
    ");
}

#[test]
fn catch_with_payload() {
    let ast = assert_parses_ok!(&in_function("const v = f() catch |err| return err;"));
    let catch = find_node(&ast, NodeTag::Catch).unwrap();
    assert_eq!(ast.kind(catch), NodeKind::Catch);
    let payload = ast.payload_token(catch).unwrap();
    assert_eq!(ast.token_slice(payload), "err");
}

#[test]
fn prefix_operators_nest() {
    let ast = assert_parses_ok!("const a = !-~x;");
    let decl = ast.members(NodeIndex::ROOT).next().unwrap();
    let not = NodeIndex(ast.data(decl).rhs);
    assert_eq!(ast.tag(not), NodeTag::BoolNot);
    let neg = ast.children(not)[0];
    assert_eq!(ast.tag(neg), NodeTag::Negation);
    assert_eq!(ast.tag(ast.children(neg)[0]), NodeTag::BitNot);
}

#[test]
fn array_concatenation_and_merge() {
    let ast = assert_parses_ok!("const s = \"ab\" ++ \"cd\";\nconst E = A || B;");
    assert!(find_node(&ast, NodeTag::ArrayCat).is_some());
    assert!(find_node(&ast, NodeTag::MergeErrorSets).is_some());
}

// ===================
// Postfix
// ===================

#[test]
fn postfix_chain() {
    let ast = assert_parses_ok!("const a = x.y.?.*[0][1..][2..3];");
    insta::assert_snapshot!(dump(&ast), @r"
    Root
      VarDecl 'a'
        Slice
          SliceOpen
            ArrayAccess
              Deref
                UnwrapOptional
                  FieldAccess 'y'
                    Identifier 'x'
              NumberLiteral 0
            NumberLiteral 1
          NumberLiteral 2
          NumberLiteral 3
    ");
}

#[test]
fn calls_with_zero_one_and_many_args() {
    let ast = assert_parses_ok!("const a = f();\nconst b = g(1);\nconst c = h(1, 2, 3);");
    let inits: Vec<NodeIndex> = ast
        .members(NodeIndex::ROOT)
        .map(|m| NodeIndex(ast.data(m).rhs))
        .collect();
    assert_eq!(ast.tag(inits[0]), NodeTag::CallOne);
    assert_eq!(ast.call_param_count(inits[0]), 0);
    assert_eq!(ast.call_param_count(inits[1]), 1);
    assert_eq!(ast.tag(inits[2]), NodeTag::Call);
    assert_eq!(ast.call_param_count(inits[2]), 3);
    let last = ast.call_param_at(inits[2], 2).unwrap();
    assert_eq!(ast.token_slice(ast.main_token(last)), "3");
    assert_eq!(ast.spelling_name(ast.callee(inits[2]).unwrap()), "h");
}

#[test]
fn builtin_calls() {
    let ast = assert_parses_ok!("const std = @import(\"std\");\nconst n = @as(u8, 1);");
    let import = NodeIndex(ast.data(ast.members(NodeIndex::ROOT).next().unwrap()).rhs);
    assert_eq!(ast.tag(import), NodeTag::BuiltinCall);
    assert_eq!(ast.kind(import), NodeKind::Call);
    assert_eq!(ast.spelling_name(import), "@import");
    let arg = ast.call_param_at(import, 0).unwrap();
    assert_eq!(ast.string_value(arg).as_deref(), Some("std"));
}

// ===================
// Initializers
// ===================

#[test]
fn struct_and_array_initializers() {
    let ast = assert_parses_ok!("const a = .{ .x = 1, .y = 2 };\nconst b = [_]u8{ 1, 2, 3 };\nconst c = .{};");
    let inits: Vec<NodeIndex> = ast
        .members(NodeIndex::ROOT)
        .map(|m| NodeIndex(ast.data(m).rhs))
        .collect();
    assert_eq!(ast.tag(inits[0]), NodeTag::StructInit);
    assert!(ast.init_type(inits[0]).is_none());
    assert_eq!(ast.struct_init_count(inits[0]), 2);
    let y = ast.struct_init_at(inits[0], 1).unwrap();
    assert_eq!(ast.spelling_name(y), "y");
    assert_eq!(ast.tag(inits[1]), NodeTag::ArrayInit);
    assert_eq!(ast.tag(ast.init_type(inits[1]).unwrap()), NodeTag::ArrayType);
    assert_eq!(ast.struct_init_count(inits[1]), 3);
    assert_eq!(ast.tag(inits[2]), NodeTag::StructInit);
    assert_eq!(ast.struct_init_count(inits[2]), 0);
}

#[test]
fn enum_literal_and_error_value() {
    let ast = assert_parses_ok!("const a = .Ok;\nconst b = error.Oops;");
    let a = NodeIndex(ast.data(ast.members(NodeIndex::ROOT).next().unwrap()).rhs);
    assert_eq!(ast.tag(a), NodeTag::EnumLiteral);
    assert_eq!(ast.spelling_name(a), "Ok");
    let b = find_node(&ast, NodeTag::ErrorValue).unwrap();
    assert_eq!(ast.spelling_name(b), "Oops");
}

#[test]
fn quoted_identifiers() {
    let ast = assert_parses_ok!("const @\"type\" = 1;\nconst b = @\"type\";");
    let first = ast.members(NodeIndex::ROOT).next().unwrap();
    assert_eq!(ast.spelling_name(first), "type");
}

#[test]
fn dangling_dot_is_an_error() {
    let errors = assert_parses_err!("const a = x.;");
    assert_eq!(errors, vec!["expected a field name, found ';'"]);
}
