//! # Use Builder
//!
//! Last pass of a job. Records a [`Use`] for every name and member access that
//! resolves to a declaration and reports the type checks of the language subset:
//! undefined names, unknown fields and mismatched arguments, initializers,
//! assignments, conditions and switch cases.
//!
//! All problems are hints. Whenever either side of a check has a type the
//! analyzer could not determine, nothing is reported.

use std::sync::Arc;

use ziglens_compiler_diagnostics::{Problem, ProblemCode};
use ziglens_compiler_parser::{Ast, NodeIndex, NodeTag, TokenIndex};

use super::expression::{bind_delayed, ExpressionVisitor};
use crate::duchain::{ContextId, DeclId, DeclRef, DuChain, Use};
use crate::helpers::{access_attribute, declaration_for_name};
use crate::identifier::Identifier;
use crate::session::{ParseSession, ScopeKey};
use crate::types::{can_type_be_assigned, is_builtin_type_name, Bindings, Modifiers, Type, TypeKind};
use crate::visitor::{walk_capture_scope, walk_children, walk_node, CaptureScope, Visitor};

/// Records uses and reports semantic problems for the session's document.
pub fn build(session: &mut ParseSession, chain: &DuChain) {
    let ast = session.parse();
    let root = session.top.root();
    let mut builder = UseBuilder {
        session,
        chain,
        ast,
        current: root,
        function: None,
    };
    builder.visit_node(NodeIndex::ROOT);
}

/// Value type of a member declaration: the payload for union fields.
fn field_value_type(ty: Type) -> Type {
    if let TypeKind::Union(u) = &ty.kind {
        if u.union_type.is_some() {
            return u.data.as_deref().cloned().unwrap_or_default();
        }
    }
    ty
}

fn is_container(ty: &Type) -> bool {
    matches!(
        ty.through_pointer().kind,
        TypeKind::Structure(_) | TypeKind::Enum(_) | TypeKind::Union(_)
    ) && !ty.through_pointer().modifiers.contains(Modifiers::C_INCLUDE)
}

pub struct UseBuilder<'s> {
    session: &'s mut ParseSession,
    chain: &'s DuChain,
    ast: Arc<Ast>,
    current: ContextId,
    function: Option<DeclId>,
}

impl UseBuilder<'_> {
    fn enter<R>(&mut self, ctx: Option<ContextId>, f: impl FnOnce(&mut Self) -> R) -> R {
        let Some(ctx) = ctx else {
            return f(self);
        };
        let saved = std::mem::replace(&mut self.current, ctx);
        let result = f(self);
        self.current = saved;
        result
    }

    fn eval(&mut self, node: NodeIndex, inferred: Option<Type>) -> Type {
        let ctx = self.current;
        let file = self.session.file();
        let function = self.function.map(|f| DeclRef::new(file, f));
        let (env, tables) = self.session.analysis(self.chain);
        ExpressionVisitor::new(env, tables, ctx)
            .with_inferred(inferred)
            .in_function(function)
            .visit(node)
    }

    fn report(&mut self, problem: Problem, node: NodeIndex) {
        let problem = problem
            .with_location(self.ast.node_span(node), self.ast.node_range(node))
            .with_file(self.session.document().to_string_lossy());
        self.session.tables.report(problem);
    }

    fn report_token(&mut self, problem: Problem, token: TokenIndex) {
        let problem = problem
            .with_location(self.ast.token_span(token), self.ast.token_range(token))
            .with_file(self.session.document().to_string_lossy());
        self.session.tables.report(problem);
    }

    fn record_use(&mut self, token: TokenIndex, declaration: DeclRef) {
        let range = self.ast.token_range(token);
        if let Some(ctx) = self.session.context_mut(self.current) {
            ctx.uses.push(Use { range, declaration });
        }
    }

    fn check_assignable(&mut self, code: ProblemCode, target: &Type, value: &Type, node: NodeIndex) {
        if !can_type_be_assigned(target, value) {
            self.report(
                Problem::type_mismatch(code, &target.to_string(), &value.to_string()),
                node,
            );
        }
    }

    // ---- names ----

    fn identifier(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        let token = ast.main_token(node);
        let text = ast.identifier_text(token);
        if text == "_" || is_builtin_type_name(text) {
            return;
        }
        let name = Identifier::new(text);
        let location = ast.token_range(token).start;
        let ctx = self.current;
        let found = {
            let (env, _) = self.session.analysis(self.chain);
            declaration_for_name(env.view, name, location, env.context_ref(ctx), None)
                .map(|d| d.decl_ref())
        };
        match found {
            Some(decl) => self.record_use(token, decl),
            None => self.report_token(Problem::undefined_name(text), token),
        }
    }

    /// Resolves `name` as a member of `base`, recording the use or reporting an
    /// unknown field. Returns the member's type.
    fn member(&mut self, base: &Type, token: TokenIndex) -> Option<Type> {
        let ast = Arc::clone(&self.ast);
        let text = ast.identifier_text(token);
        if matches!(base.through_pointer().kind, TypeKind::Slice(_)) && matches!(text, "len" | "ptr") {
            return None;
        }
        if !is_container(base) {
            return None;
        }
        let found = {
            let view = self.session.analysis(self.chain).0.view;
            access_attribute(view, base, Identifier::new(text)).map(|d| (d.decl_ref(), d.ty.clone()))
        };
        match found {
            Some((decl, ty)) => {
                self.record_use(token, decl);
                Some(ty)
            }
            None => {
                let owner = base.through_pointer().to_string();
                self.report_token(Problem::unknown_field(text, &owner), token);
                None
            }
        }
    }

    // ---- checks ----

    fn call(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        let signature = {
            let ctx = self.current;
            let (env, tables) = self.session.analysis(self.chain);
            ExpressionVisitor::new(env, tables, ctx).call_signature(node)
        };
        let Some((formals, shift)) = signature else {
            return;
        };
        let mut bindings = Bindings::default();
        for i in 0..ast.call_param_count(node) {
            let Some(arg) = ast.call_param_at(node, i) else {
                continue;
            };
            let Some(formal) = formals.get(i as usize + shift) else {
                break;
            };
            let formal = if bindings.is_empty() {
                formal.clone()
            } else {
                formal.substitute(&bindings)
            };
            let hint = (!formal.contains_delayed()).then(|| formal.clone().without_value());
            let actual = self.eval(arg, hint);
            bind_delayed(&formal, &actual, &mut bindings);
            if formal.contains_delayed() || formal.is_builtin("anytype") {
                continue;
            }
            self.check_assignable(
                ProblemCode::ArgumentTypeMismatch,
                &formal.without_value(),
                &actual,
                arg,
            );
        }
    }

    fn struct_init(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        let ty = match ast.init_type(node) {
            Some(t) => self.eval(t, None).without_value(),
            None => self
                .session
                .tables
                .node_types
                .get(&node)
                .cloned()
                .unwrap_or_default(),
        };
        for field in (0..ast.struct_init_count(node)).filter_map(|i| ast.struct_init_at(node, i)) {
            if ast.tag(field) != NodeTag::FieldInitializer {
                continue;
            }
            let Some(field_ty) = self.member(&ty, ast.main_token(field)) else {
                continue;
            };
            let field_ty = field_value_type(field_ty).without_value();
            let value = NodeIndex(ast.data(field).lhs);
            let actual = self.eval(value, Some(field_ty.clone()));
            self.check_assignable(ProblemCode::InitializerTypeMismatch, &field_ty, &actual, value);
        }
    }

    fn array_init(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        let declared = match ast.init_type(node) {
            Some(t) => self.eval(t, None).without_value(),
            None => self
                .session
                .tables
                .node_types
                .get(&node)
                .cloned()
                .unwrap_or_default(),
        };
        let Some(elem) = declared.element().map(|e| e.clone().without_value()) else {
            return;
        };
        for value in (0..ast.struct_init_count(node)).filter_map(|i| ast.struct_init_at(node, i)) {
            let actual = self.eval(value, Some(elem.clone()));
            self.check_assignable(ProblemCode::InitializerTypeMismatch, &elem, &actual, value);
        }
    }

    fn assign(&mut self, node: NodeIndex) {
        let data = self.ast.data(node);
        let (lhs, rhs) = (NodeIndex(data.lhs), NodeIndex(data.rhs));
        if self.ast.tag(lhs) == NodeTag::Identifier
            && self.ast.identifier_text(self.ast.main_token(lhs)) == "_"
        {
            return;
        }
        let target = self.eval(lhs, None).without_value();
        let value = self.eval(rhs, Some(target.clone()));
        self.check_assignable(ProblemCode::AssignmentTypeMismatch, &target, &value, rhs);
    }

    fn condition(&mut self, condition: NodeIndex) {
        let value = self.eval(condition, None);
        self.check_assignable(
            ProblemCode::ConditionTypeMismatch,
            &Type::builtin("bool"),
            &value,
            condition,
        );
    }

    fn switch(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        let operand = self.eval(NodeIndex(ast.data(node).lhs), None).without_value();
        for case in (0..ast.switch_case_count(node)).filter_map(|i| ast.switch_case_at(node, i)) {
            for item in (0..ast.switch_case_item_count(case)).filter_map(|i| ast.switch_case_item_at(case, i)) {
                let values = if ast.tag(item) == NodeTag::SwitchRange {
                    let data = ast.data(item);
                    vec![NodeIndex(data.lhs), NodeIndex(data.rhs)]
                } else {
                    vec![item]
                };
                for value in values {
                    let actual = self.eval(value, Some(operand.clone()));
                    self.check_assignable(ProblemCode::CaseTypeMismatch, &operand, &actual, value);
                }
            }
        }
    }
}

impl Visitor for UseBuilder<'_> {
    fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Every node that opened a scope in the declaration passes is visited
    /// inside it.
    fn visit_node(&mut self, node: NodeIndex) {
        let ctx = self.session.tables.context_for(ScopeKey::body(node));
        self.enter(ctx, |b| walk_node(b, node));
    }

    fn visit_function(&mut self, node: NodeIndex) {
        let decl = self.session.tables.node_declarations.get(&node).copied();
        let next = decl.or(self.function);
        let saved = std::mem::replace(&mut self.function, next);
        walk_children(self, node);
        self.function = saved;
    }

    fn visit_var_decl(&mut self, node: NodeIndex) {
        let data = self.ast.data(node);
        if data.lhs != 0 && data.rhs != 0 {
            let (type_expr, init) = (NodeIndex(data.lhs), NodeIndex(data.rhs));
            let declared = self.eval(type_expr, None).without_value();
            if !declared.is_builtin("type") {
                let value = self.eval(init, Some(declared.clone()));
                self.check_assignable(ProblemCode::AssignmentTypeMismatch, &declared, &value, init);
            }
        }
        walk_children(self, node);
    }

    fn visit_capture_scope(&mut self, scope: &CaptureScope) {
        let ctx = self.session.tables.context_for(ScopeKey {
            node: scope.node,
            slot: scope.slot,
        });
        self.enter(ctx, |b| walk_capture_scope(b, scope));
    }

    fn visit_expr(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        match ast.tag(node) {
            NodeTag::Identifier => self.identifier(node),
            NodeTag::FieldAccess => {
                let lhs = NodeIndex(ast.data(node).lhs);
                self.visit_node(lhs);
                let base = self.eval(lhs, None);
                self.member(&base, ast.data(node).rhs);
            }
            NodeTag::Call | NodeTag::CallOne => {
                self.call(node);
                walk_children(self, node);
            }
            NodeTag::StructInit => {
                self.struct_init(node);
                walk_children(self, node);
            }
            NodeTag::ArrayInit => {
                self.array_init(node);
                walk_children(self, node);
            }
            NodeTag::Assign => {
                self.assign(node);
                walk_children(self, node);
            }
            NodeTag::If | NodeTag::While => {
                let condition = match ast.tag(node) {
                    NodeTag::If => ast
                        .if_data(node)
                        .filter(|d| d.payload_token.is_none())
                        .map(|d| d.condition),
                    _ => ast
                        .while_data(node)
                        .filter(|d| d.payload_token.is_none())
                        .map(|d| d.condition),
                };
                if let Some(condition) = condition {
                    self.condition(condition);
                }
                walk_children(self, node);
            }
            NodeTag::Switch => {
                self.switch(node);
                walk_children(self, node);
            }
            _ => walk_children(self, node),
        }
    }
}
