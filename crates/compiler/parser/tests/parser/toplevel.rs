use crate::common::{dump, find_node};
use crate::{assert_parses_err, assert_parses_ok};
use ziglens_compiler_parser::{NodeIndex, NodeKind, NodeTag, TokenType};

#[test]
fn var_decls_with_and_without_type() {
    let ast = assert_parses_ok!("const a = 1;\npub var b: u8 = 2;\nvar c: i32 = undefined;");
    let names: Vec<&str> = ast
        .members(NodeIndex::ROOT)
        .map(|m| ast.spelling_name(m))
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    let b = ast.members(NodeIndex::ROOT).nth(1).unwrap();
    assert_eq!(ast.kind(b), NodeKind::VarDecl);
    assert_eq!(ast.node_range(b).start.line, 1);
    assert_eq!(ast.node_range(b).start.column, 0);
}

#[test]
fn function_with_params_and_body() {
    let ast = assert_parses_ok!("pub fn add(a: u32, b: u32) u32 { return a + b; }");
    insta::assert_snapshot!(dump(&ast), @r"
    Root
      FnDecl 'add'
        FnProto 'add'
          Param 'a'
            Identifier 'u32'
          Param 'b'
            Identifier 'u32'
          Identifier 'u32'
        Block
          Return
            Add
              Identifier 'a'
              Identifier 'b'
    ");
}

#[test]
fn extern_function_prototype() {
    let ast = assert_parses_ok!("extern \"c\" fn puts(s: [*:0]const u8) c_int;");
    let proto = ast.members(NodeIndex::ROOT).next().unwrap();
    assert_eq!(ast.tag(proto), NodeTag::FnProto);
    assert_eq!(ast.spelling_name(proto), "puts");
    assert_eq!(ast.fn_param_count(proto), 1);
}

#[test]
fn containers_with_args() {
    let ast = assert_parses_ok!(
        "const E = enum(u8) { a = 1, b };\nconst U = union(E) { a: u8, b: void };\nconst P = packed struct { x: u4 };"
    );
    let mut decls = ast.members(NodeIndex::ROOT);
    let e = decls.next().unwrap();
    let e_body = NodeIndex(ast.data(e).rhs);
    let data = ast.container_data(e_body).unwrap();
    assert_eq!(data.keyword, TokenType::KeywordEnum);
    assert_eq!(ast.spelling_name(data.arg.unwrap()), "u8");
    assert_eq!(data.members.len(), 2);
    let u = decls.next().unwrap();
    assert_eq!(ast.kind(NodeIndex(ast.data(u).rhs)), NodeKind::UnionDecl);
    let p = decls.next().unwrap();
    assert_eq!(ast.kind(NodeIndex(ast.data(p).rhs)), NodeKind::ContainerDecl);
}

#[test]
fn tagged_union_variants() {
    let ast = assert_parses_ok!("const A = union(enum) { a: u8 };\nconst B = union(enum(u8)) { a: u8 };");
    let mut decls = ast.members(NodeIndex::ROOT);
    let a = NodeIndex(ast.data(decls.next().unwrap()).rhs);
    let b = NodeIndex(ast.data(decls.next().unwrap()).rhs);
    assert_eq!(ast.tag(a), NodeTag::TaggedUnion);
    assert!(ast.container_data(a).unwrap().auto_enum_tag);
    assert_eq!(ast.tag(b), NodeTag::TaggedUnionEnumTag);
    assert_eq!(ast.spelling_name(ast.container_data(b).unwrap().arg.unwrap()), "u8");
}

#[test]
fn error_set_members() {
    let ast = assert_parses_ok!("const E = error{ OutOfMemory, Overflow };");
    let set = find_node(&ast, NodeTag::ErrorSetDecl).unwrap();
    assert_eq!(ast.kind(set), NodeKind::ErrorDecl);
    let names: Vec<&str> = ast
        .error_set_members(set)
        .into_iter()
        .map(|t| ast.token_slice(t))
        .collect();
    assert_eq!(names, vec!["OutOfMemory", "Overflow"]);
}

#[test]
fn test_decls_and_usingnamespace() {
    let ast = assert_parses_ok!("usingnamespace @import(\"a.zig\");\ntest \"adds\" {}\ntest {}\ncomptime {}");
    let tags: Vec<NodeTag> = ast.members(NodeIndex::ROOT).map(|m| ast.tag(m)).collect();
    assert_eq!(
        tags,
        vec![
            NodeTag::Usingnamespace,
            NodeTag::TestDecl,
            NodeTag::TestDecl,
            NodeTag::Comptime
        ]
    );
    let named = ast.members(NodeIndex::ROOT).nth(1).unwrap();
    assert_eq!(ast.spelling_name(named), "adds");
    let anonymous = ast.members(NodeIndex::ROOT).nth(2).unwrap();
    assert_eq!(ast.spelling_name(anonymous), "");
}

#[test]
fn doc_comments_attach_to_fields_and_decls() {
    let ast = assert_parses_ok!(
        "//! Module docs.\nconst S = struct {\n    /// Width in pixels.\n    w: u32,\n};"
    );
    assert_eq!(ast.container_doc_comment().as_deref(), Some("Module docs."));
    let field = find_node(&ast, NodeTag::ContainerField).unwrap();
    assert_eq!(ast.doc_comment(field).as_deref(), Some("Width in pixels."));
}

#[test]
fn missing_semicolon_is_reported() {
    let errors = assert_parses_err!("const a = 1\nconst b = 2;");
    assert_eq!(errors, vec!["expected ';' after declaration, found 'const'"]);
}

#[test]
fn stray_closing_brace_is_reported() {
    let errors = assert_parses_err!("}\nconst a = 1;");
    assert_eq!(errors, vec!["expected a declaration, found '}'"]);
}
