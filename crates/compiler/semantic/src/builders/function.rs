//! # Function Visitor
//!
//! Replays a function body after its declarations exist and collects what its
//! `return` statements produce. Declaration building uses the result twice:
//!
//! - a function whose syntactic return type is `type` gets the type its body
//!   actually returns, so generic-like constructors resolve at call sites;
//! - a function that always returns one of its parameters unchanged records that
//!   parameter, so calls can keep the argument's comptime value.
//!
//! Nested functions and containers are skipped; their returns belong to them.

use ziglens_compiler_parser::{Ast, NodeIndex, NodeTag};

use super::expression::ExpressionVisitor;
use crate::duchain::{ContextId, DeclFlags, DeclRef};
use crate::helpers::declaration_for_name;
use crate::identifier::Identifier;
use crate::session::{Analysis, ScopeKey, SessionTables};
use crate::types::Type;
use crate::visitor::{walk_capture_scope, walk_children, CaptureScope, Visitor};

/// What the returns of one function body produce.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionSummary {
    /// Type of the last `return`
    pub return_type: Option<Type>,
    /// Position of the parameter every `return` yields unchanged
    pub returned_param: Option<u32>,
}

pub struct FunctionVisitor<'a, 't> {
    env: Analysis<'a>,
    tables: &'t mut SessionTables,
    function: DeclRef,
    /// Parameter scope of the function
    parameters: ContextId,
    context: ContextId,
    return_type: Option<Type>,
    /// `None` until the first return; `Some(None)` once returns disagree.
    returned: Option<Option<u32>>,
}

impl<'a, 't> FunctionVisitor<'a, 't> {
    pub fn new(
        env: Analysis<'a>,
        tables: &'t mut SessionTables,
        function: DeclRef,
        parameters: ContextId,
    ) -> Self {
        Self {
            env,
            tables,
            function,
            parameters,
            context: parameters,
            return_type: None,
            returned: None,
        }
    }

    pub fn run(mut self, body: NodeIndex) -> FunctionSummary {
        let _span = tracing::trace_span!("function_body", node = %body).entered();
        self.visit_node(body);
        FunctionSummary {
            return_type: self.return_type,
            returned_param: self.returned.flatten(),
        }
    }

    fn enter<R>(&mut self, ctx: Option<ContextId>, f: impl FnOnce(&mut Self) -> R) -> R {
        let Some(ctx) = ctx else {
            return f(self);
        };
        let saved = std::mem::replace(&mut self.context, ctx);
        let result = f(self);
        self.context = saved;
        result
    }

    /// Position of the parameter `operand` names, if it names one.
    fn parameter_index(&self, operand: NodeIndex) -> Option<u32> {
        let ast = self.env.ast;
        if ast.tag(operand) != NodeTag::Identifier {
            return None;
        }
        let token = ast.main_token(operand);
        let decl = declaration_for_name(
            self.env.view,
            Identifier::new(ast.identifier_text(token)),
            ast.token_range(token).start,
            self.env.context_ref(self.context),
            None,
        )?;
        if decl.top().file != self.env.file || !decl.flags.contains(DeclFlags::PARAM) {
            return None;
        }
        let params = &self.env.current().context(self.parameters)?.declarations;
        params
            .iter()
            .position(|&id| id == decl.id())
            .and_then(|i| u32::try_from(i).ok())
    }

    fn record_return(&mut self, node: NodeIndex) {
        let mut visitor = ExpressionVisitor::new(self.env, self.tables, self.context)
            .in_function(Some(self.function));
        visitor.visit(node);
        if let Some(ty) = visitor.return_type().cloned() {
            self.return_type = Some(ty);
        }
        let operand = self.env.ast.data(node).lhs;
        let index = (operand != 0)
            .then(|| self.parameter_index(NodeIndex(operand)))
            .flatten();
        self.returned = Some(match self.returned {
            None => index,
            Some(previous) if previous == index => previous,
            Some(_) => None,
        });
    }
}

impl Visitor for FunctionVisitor<'_, '_> {
    fn ast(&self) -> &Ast {
        self.env.ast
    }

    fn visit_container(&mut self, _node: NodeIndex) {}

    fn visit_error_set(&mut self, _node: NodeIndex) {}

    fn visit_function(&mut self, _node: NodeIndex) {}

    fn visit_block(&mut self, node: NodeIndex) {
        let ctx = self.tables.context_for(ScopeKey::body(node));
        self.enter(ctx, |v| walk_children(v, node));
    }

    fn visit_var_decl(&mut self, node: NodeIndex) {
        let ctx = self.tables.context_for(ScopeKey::body(node));
        self.enter(ctx, |v| walk_children(v, node));
    }

    fn visit_capture_scope(&mut self, scope: &CaptureScope) {
        let ctx = self.tables.context_for(ScopeKey {
            node: scope.node,
            slot: scope.slot,
        });
        self.enter(ctx, |v| walk_capture_scope(v, scope));
    }

    fn visit_expr(&mut self, node: NodeIndex) {
        if self.env.ast.tag(node) == NodeTag::Return {
            self.record_return(node);
        } else {
            walk_children(self, node);
        }
    }
}
