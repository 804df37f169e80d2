//! # AST Visitor
//!
//! Traversal shared by the declaration builder, the use builder and the function
//! visitor. The [`Visitor`] trait has one method per [`NodeKind`] a builder may care
//! about; every default implementation descends through [`walk_node`].
//!
//! ## Capture scopes
//!
//! Payload captures (`if (x) |v|`, `catch |e|`, `for (a) |item|`, `=> |p|`, ...)
//! open a scope that covers only part of their node. [`capture_layout`] splits such
//! a node into plain children and [`CaptureScope`]s so that every visitor agrees on
//! which children are inside which scope.

use smallvec::{smallvec, SmallVec};
use ziglens_compiler_diagnostics::Range;
use ziglens_compiler_parser::{Ast, NodeIndex, NodeKind, NodeTag, TokenIndex};

/// What a capture binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureKind {
    /// Payload of an optional or error union condition
    Payload,
    /// Error side of an error union
    Error,
    /// Element of a `for` input
    Iterable,
    /// Payload of a switch prong
    SwitchPayload,
    /// Error of the enclosing function's return type
    ErrdeferError,
}

/// A scope opened by a capture list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureScope {
    /// Node the scope is keyed by
    pub node: NodeIndex,
    pub slot: u8,
    /// First token of the capture list
    pub payload: TokenIndex,
    pub kind: CaptureKind,
    /// Expression whose type the captures unwrap
    pub source: NodeIndex,
    /// Children covered by the scope, in source order
    pub body: SmallVec<[NodeIndex; 2]>,
    pub range: Range,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Plain(NodeIndex),
    Scope(CaptureScope),
}

fn scope_range(ast: &Ast, payload: TokenIndex, body: &[NodeIndex]) -> Range {
    let start = ast.token_range(payload).start;
    let end = body
        .last()
        .map_or(ast.token_range(payload).end, |&last| ast.node_range(last).end);
    Range::new(start, end)
}

struct Layout<'a> {
    ast: &'a Ast,
    out: SmallVec<[Segment; 4]>,
}

impl Layout<'_> {
    fn plain(&mut self, node: NodeIndex) {
        self.out.push(Segment::Plain(node));
    }

    /// Pushes `body` as one scope when a capture list is present, else as plain
    /// children.
    fn covered(
        &mut self,
        node: NodeIndex,
        slot: u8,
        kind: CaptureKind,
        payload: Option<TokenIndex>,
        source: NodeIndex,
        body: SmallVec<[NodeIndex; 2]>,
    ) {
        match payload {
            Some(payload) if !body.is_empty() => {
                let range = scope_range(self.ast, payload, &body);
                self.out.push(Segment::Scope(CaptureScope {
                    node,
                    slot,
                    payload,
                    kind,
                    source,
                    body,
                    range,
                }));
            }
            _ => self.out.extend(body.into_iter().map(Segment::Plain)),
        }
    }
}

/// Children of a capturing node split by scope, or `None` for nodes without
/// capture semantics.
pub fn capture_layout(ast: &Ast, node: NodeIndex) -> Option<SmallVec<[Segment; 4]>> {
    let mut layout = Layout {
        ast,
        out: SmallVec::new(),
    };
    match ast.tag(node) {
        NodeTag::If => {
            let data = ast.if_data(node)?;
            layout.plain(data.condition);
            let then = smallvec![data.then_expr];
            layout.covered(node, 1, CaptureKind::Payload, data.payload_token, data.condition, then);
            if let Some(else_expr) = data.else_expr {
                let body = smallvec![else_expr];
                layout.covered(node, 2, CaptureKind::Error, data.error_token, data.condition, body);
            }
        }
        NodeTag::While => {
            let data = ast.while_data(node)?;
            layout.plain(data.condition);
            let mut body: SmallVec<[NodeIndex; 2]> = SmallVec::new();
            body.extend(data.cont_expr);
            body.push(data.body);
            layout.covered(node, 1, CaptureKind::Payload, data.payload_token, data.condition, body);
            if let Some(else_expr) = data.else_expr {
                let body = smallvec![else_expr];
                layout.covered(node, 2, CaptureKind::Error, data.error_token, data.condition, body);
            }
        }
        NodeTag::For => {
            let data = ast.for_data(node)?;
            for input in (0..ast.for_input_count(node)).filter_map(|i| ast.for_input_at(node, i)) {
                layout.plain(input);
            }
            let body = smallvec![data.body];
            layout.covered(node, 1, CaptureKind::Iterable, data.payload_token, node, body);
            if let Some(else_expr) = data.else_expr {
                layout.plain(else_expr);
            }
        }
        NodeTag::Catch => {
            let data = ast.data(node);
            let (lhs, rhs) = (NodeIndex(data.lhs), NodeIndex(data.rhs));
            layout.plain(lhs);
            let payload = ast.payload_token(node);
            layout.covered(node, 1, CaptureKind::Error, payload, lhs, smallvec![rhs]);
        }
        NodeTag::Errdefer => {
            let body = smallvec![NodeIndex(ast.data(node).rhs)];
            let payload = ast.payload_token(node);
            layout.covered(node, 1, CaptureKind::ErrdeferError, payload, node, body);
        }
        NodeTag::Switch => {
            let operand = NodeIndex(ast.data(node).lhs);
            layout.plain(operand);
            for case in (0..ast.switch_case_count(node)).filter_map(|i| ast.switch_case_at(node, i)) {
                for j in 0..ast.switch_case_item_count(case) {
                    if let Some(item) = ast.switch_case_item_at(case, j) {
                        layout.plain(item);
                    }
                }
                let target = smallvec![NodeIndex(ast.data(case).rhs)];
                let payload = ast.payload_token(case);
                layout.covered(case, 1, CaptureKind::SwitchPayload, payload, operand, target);
            }
        }
        _ => return None,
    }
    Some(layout.out)
}

/// Visitor over the syntax tree with one hook per declaration-relevant node kind.
pub trait Visitor {
    fn ast(&self) -> &Ast;

    /// Entry point for every node; dispatches on [`NodeKind`].
    fn visit_node(&mut self, node: NodeIndex) {
        walk_node(self, node);
    }

    fn visit_module(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_container(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_error_set(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_field(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_function(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_var_decl(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_block(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_test(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_usingnamespace(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    /// Every node without a dedicated hook.
    fn visit_expr(&mut self, node: NodeIndex) {
        walk_children(self, node);
    }

    fn visit_capture_scope(&mut self, scope: &CaptureScope) {
        walk_capture_scope(self, scope);
    }
}

pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: NodeIndex) {
    match visitor.ast().kind(node) {
        NodeKind::Module => visitor.visit_module(node),
        NodeKind::ContainerDecl | NodeKind::EnumDecl | NodeKind::UnionDecl => {
            visitor.visit_container(node)
        }
        NodeKind::ErrorDecl => visitor.visit_error_set(node),
        NodeKind::FieldDecl => visitor.visit_field(node),
        NodeKind::FunctionDecl | NodeKind::FnProto => visitor.visit_function(node),
        NodeKind::VarDecl => visitor.visit_var_decl(node),
        NodeKind::BlockDecl => visitor.visit_block(node),
        NodeKind::TestDecl => visitor.visit_test(node),
        NodeKind::Usingnamespace => visitor.visit_usingnamespace(node),
        _ => visitor.visit_expr(node),
    }
}

/// Visits the children of `node`, routing capture-covered children through
/// [`Visitor::visit_capture_scope`].
pub fn walk_children<V: Visitor + ?Sized>(visitor: &mut V, node: NodeIndex) {
    match capture_layout(visitor.ast(), node) {
        Some(segments) => {
            for segment in segments {
                match segment {
                    Segment::Plain(child) => visitor.visit_node(child),
                    Segment::Scope(scope) => visitor.visit_capture_scope(&scope),
                }
            }
        }
        None => {
            for child in visitor.ast().children(node) {
                visitor.visit_node(child);
            }
        }
    }
}

pub fn walk_capture_scope<V: Visitor + ?Sized>(visitor: &mut V, scope: &CaptureScope) {
    for &child in &scope.body {
        visitor.visit_node(child);
    }
}
