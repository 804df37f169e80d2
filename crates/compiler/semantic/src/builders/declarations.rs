//! # Declaration Builder
//!
//! Builds the scope tree of a document and every declaration in it, then binds
//! declaration types through the [`ExpressionVisitor`].
//!
//! The builder runs twice over the same tree. The first pass (*prebuilding*)
//! creates all scopes and declarations with whatever types are already known; the
//! second pass finds every scope and declaration again through the session keys
//! and recomputes the types, now that forward references have a target.
//! Semantic problems are only reported by the second pass.
//!
//! Scope kinds follow the node that opens them:
//!
//! | Node | Scope |
//! |------|-------|
//! | module, struct, opaque, `@cImport` | `Namespace` (`Global` for the file) |
//! | enum, error set | `Enum` |
//! | union | `Class` |
//! | function | `Function` |
//! | block, capture, initializer holding a body | `Other` |

use std::sync::Arc;

use tracing::trace;
use ziglens_compiler_diagnostics::{Problem, ProblemCode, Range};
use ziglens_compiler_parser::{Ast, NodeIndex, NodeKind, NodeTag, TokenIndex, TokenType, VisitResult};

use super::expression::{coerce_value, ExpressionVisitor};
use super::fold;
use super::function::FunctionVisitor;
use crate::duchain::{
    ClassType, ContextId, ContextKind, DeclFlags, DeclId, DeclRef, DeclarationKind, DuChain,
};
use crate::helpers::{access_attribute, internal_context_of};
use crate::identifier::Identifier;
use crate::session::{DeclKey, ParseSession, ScopeKey};
use crate::types::{EnumType, Modifiers, Type, TypeKind, UnionType};
use crate::visitor::{walk_capture_scope, walk_children, CaptureKind, CaptureScope, Visitor};

/// Runs one declaration pass over the session's document.
pub fn build(session: &mut ParseSession, chain: &DuChain, prebuilding: bool) {
    let ast = session.parse();
    session.tables.prebuilding = prebuilding;
    let root = session.top.root();
    let mut builder = DeclarationBuilder {
        session,
        chain,
        ast,
        current: root,
        function: None,
        enum_ordinal: 0,
    };
    builder.visit_node(NodeIndex::ROOT);
    builder.session.tables.prebuilding = false;
}

/// Whether `keyword` appears among the tokens before the main token of `node`.
fn has_prefix_keyword(ast: &Ast, node: NodeIndex, keyword: TokenType) -> bool {
    (ast.first_token(node)..ast.main_token(node)).any(|t| ast.token_tag(t) == keyword)
}

/// Initializers that contain a body of their own get a scope.
fn holds_scope(ast: &Ast, node: NodeIndex) -> bool {
    let opens_scope = |n: NodeIndex| {
        matches!(
            ast.kind(n),
            NodeKind::ContainerDecl
                | NodeKind::EnumDecl
                | NodeKind::UnionDecl
                | NodeKind::ErrorDecl
                | NodeKind::BlockDecl
                | NodeKind::FunctionDecl
        )
    };
    if opens_scope(node) {
        return true;
    }
    let mut found = false;
    ast.visit(node, &mut |child, _| {
        if opens_scope(child) {
            found = true;
            VisitResult::Break
        } else {
            VisitResult::Recurse
        }
    });
    found
}

pub struct DeclarationBuilder<'s> {
    session: &'s mut ParseSession,
    chain: &'s DuChain,
    ast: Arc<Ast>,
    current: ContextId,
    /// Function whose body is being built
    function: Option<DeclId>,
    /// Tag of the next enum member without an explicit value
    enum_ordinal: i128,
}

impl DeclarationBuilder<'_> {
    fn with_context<R>(&mut self, ctx: ContextId, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.current, ctx);
        let result = f(self);
        self.current = saved;
        result
    }

    fn decl_ref(&self, id: DeclId) -> DeclRef {
        DeclRef::new(self.session.file(), id)
    }

    /// Type of `node` evaluated in the current scope.
    fn eval(&mut self, node: NodeIndex, inferred: Option<Type>, excluded: Option<DeclId>) -> Type {
        let ctx = self.current;
        let file = self.session.file();
        let function = self.function.map(|f| DeclRef::new(file, f));
        let (env, tables) = self.session.analysis(self.chain);
        ExpressionVisitor::new(env, tables, ctx)
            .with_inferred(inferred)
            .excluding(excluded.map(|d| DeclRef::new(file, d)))
            .in_function(function)
            .visit(node)
    }

    fn report_at(&mut self, problem: Problem, node: NodeIndex) {
        let problem = problem
            .with_location(self.ast.node_span(node), self.ast.node_range(node))
            .with_file(self.session.document().to_string_lossy());
        self.session.tables.report(problem);
    }

    fn update(&mut self, id: DeclId, f: impl FnOnce(&mut crate::duchain::Declaration)) {
        if let Some(decl) = self.session.declaration_mut(id) {
            f(decl);
        }
    }

    fn set_owner(&mut self, ctx: ContextId, owner: DeclId) {
        if let Some(ctx) = self.session.context_mut(ctx) {
            ctx.owner = Some(owner);
        }
        self.update(owner, |decl| decl.internal_context = Some(ctx));
    }

    fn identifier_of(&self, id: DeclId) -> Identifier {
        self.session
            .top
            .declaration(id)
            .map_or(Identifier::EMPTY, |d| d.identifier)
    }

    fn owner_type(&self, ctx: ContextId) -> Option<Type> {
        let top = &self.session.top;
        let owner = top.context(ctx)?.owner?;
        top.declaration(owner).map(|d| d.ty.clone())
    }

    // ---- containers ----

    /// Opens the body scope of a struct, enum, union or opaque bound to `decl`
    /// and declares its members.
    fn build_container(&mut self, node: NodeIndex, decl: DeclId) {
        let ast = Arc::clone(&self.ast);
        let Some(data) = ast.container_data(node) else {
            return;
        };
        let (kind, class) = match data.keyword {
            TokenType::KeywordEnum => (ContextKind::Enum, ClassType::Enum),
            TokenType::KeywordUnion => (ContextKind::Class, ClassType::Union),
            TokenType::KeywordOpaque => (ContextKind::Namespace, ClassType::Opaque),
            _ => (ContextKind::Namespace, ClassType::Struct),
        };
        let decl_ref = self.decl_ref(decl);
        let name = self.identifier_of(decl);
        let arg = data.arg.map(|a| self.eval(a, None, None).without_value());
        let ty: Type = match class {
            ClassType::Enum => TypeKind::Enum(EnumType {
                decl: decl_ref,
                name,
                base: arg.map(Box::new),
                enum_type: None,
            })
            .into(),
            ClassType::Union => {
                let base = if data.auto_enum_tag {
                    Some(Type::builtin("enum"))
                } else {
                    arg
                };
                TypeKind::Union(UnionType {
                    decl: decl_ref,
                    name,
                    base: base.map(Box::new),
                    data: None,
                    union_type: None,
                })
                .into()
            }
            ClassType::Struct | ClassType::Opaque => Type::structure(decl_ref, name),
        };
        trace!("container {} : {}", name, ty);

        let ctx = self
            .session
            .open_context(ScopeKey::body(node), kind, ast.node_range(node), self.current);
        self.update(decl, |d| {
            d.kind = DeclarationKind::Type;
            d.class_type = Some(class);
            d.ty = ty;
        });
        self.set_owner(ctx, decl);
        self.session.tables.node_declarations.insert(node, decl);

        let saved_ordinal = std::mem::replace(&mut self.enum_ordinal, 0);
        self.with_context(ctx, |b| {
            for member in ast.members(node) {
                b.visit_node(member);
            }
        });
        self.enum_ordinal = saved_ordinal;
    }

    fn build_error_set(&mut self, node: NodeIndex, decl: DeclId) {
        let ast = Arc::clone(&self.ast);
        let name = self.identifier_of(decl);
        let root: Type = TypeKind::Enum(EnumType {
            decl: self.decl_ref(decl),
            name,
            base: None,
            enum_type: None,
        })
        .into();
        let root = root.with_modifiers(Modifiers::ERROR_SET);
        let ctx = self
            .session
            .open_context(ScopeKey::body(node), ContextKind::Enum, ast.node_range(node), self.current);
        let root_ty = root.clone();
        self.update(decl, |d| {
            d.kind = DeclarationKind::Type;
            d.class_type = Some(ClassType::Enum);
            d.ty = root_ty;
        });
        self.set_owner(ctx, decl);
        self.session.tables.node_declarations.insert(node, decl);

        for token in ast.error_set_members(node) {
            let member = Identifier::new(ast.identifier_text(token));
            let id = self
                .session
                .declare(DeclKey::token(node, token), ctx, member, ast.token_range(token));
            let ty = root.as_enum_value(member);
            self.update(id, |d| {
                d.flags |= DeclFlags::CLASS_MEMBER;
                d.ty = ty;
            });
        }
    }

    /// Synthetic declaration for a container that is not bound to a name.
    fn declare_anonymous(&mut self, node: NodeIndex) -> DeclId {
        let start = self.ast.node_range(node).start;
        let name = Identifier::new(&format!("__anon_{}_{}", start.line, start.column));
        let range = self.ast.token_range(self.ast.main_token(node));
        let id = self
            .session
            .declare(DeclKey::node(node), self.current, name, range);
        self.update(id, |d| d.flags |= DeclFlags::ANONYMOUS);
        id
    }

    // ---- variables ----

    fn build_c_import(&mut self, call: NodeIndex, decl: DeclId) {
        let ast = Arc::clone(&self.ast);
        let ty = Type::structure(self.decl_ref(decl), self.identifier_of(decl))
            .with_modifiers(Modifiers::C_INCLUDE);
        let ctx = self.session.open_context(
            ScopeKey::body(call),
            ContextKind::Namespace,
            ast.node_range(call),
            self.current,
        );
        let decl_ty = ty.clone();
        self.update(decl, |d| {
            d.kind = DeclarationKind::Type;
            d.class_type = Some(ClassType::Struct);
            d.ty = decl_ty;
        });
        self.set_owner(ctx, decl);
        self.with_context(ctx, |b| {
            walk_children(b, call);
            b.eval(call, Some(ty), None);
        });

        let (headers, rest) = std::mem::take(&mut self.session.tables.c_includes)
            .into_iter()
            .partition::<Vec<_>, _>(|(owner, _)| *owner == decl);
        self.session.tables.c_includes = rest;
        for (_, header) in headers {
            self.session.add_imported_parent(ctx, header);
        }
    }

    fn var_decl_type(&mut self, node: NodeIndex, type_expr: Option<NodeIndex>, init: Option<NodeIndex>) -> Type {
        let declared = type_expr.map(|t| self.eval(t, None, None).without_value());
        let value = init.map(|i| self.eval(i, declared.clone(), None));
        trace!("var {} : {:?} = {:?}", node, declared, value);
        match (declared, value) {
            (Some(declared), Some(value)) => coerce_value(&declared, &value),
            (Some(declared), None) => declared,
            (None, Some(value)) => value,
            (None, None) => Type::unknown(),
        }
    }

    // ---- captures ----

    fn capture_types(&mut self, scope: &CaptureScope) -> Vec<(TokenIndex, Type)> {
        let ast = Arc::clone(&self.ast);
        let captures = ast.captures(scope.payload);
        let indeterminate = |ty: &Type| ty.is_unknown() || ty.is_delayed() || matches!(ty.kind, TypeKind::Unsure(_));
        let mut out = Vec::with_capacity(captures.len());
        match scope.kind {
            CaptureKind::Payload => {
                let source = self.eval(scope.source, None, None);
                let payload = match &source.through_pointer().kind {
                    TypeKind::ErrorUnion(e) => Some((*e.payload).clone()),
                    TypeKind::Optional(base) => Some((**base).clone()),
                    _ => None,
                };
                if payload.is_none() && !indeterminate(&source) {
                    self.report_at(
                        Problem::hint(
                            ProblemCode::NonOptionalCapture,
                            format!("Cannot unwrap a value of type '{source}'"),
                        ),
                        scope.source,
                    );
                }
                let payload = payload.unwrap_or_default().without_value();
                for capture in captures {
                    let ty = if capture.by_ref {
                        Type::pointer(payload.clone())
                    } else {
                        payload.clone()
                    };
                    out.push((capture.token, ty));
                }
            }
            CaptureKind::Error => {
                let source = self.eval(scope.source, None, None);
                let error = match &source.kind {
                    TypeKind::ErrorUnion(e) => Some((*e.error).clone()),
                    _ => None,
                };
                if error.is_none() && !indeterminate(&source) {
                    self.report_at(
                        Problem::hint(
                            ProblemCode::NonErrorCapture,
                            format!("Type '{source}' carries no error"),
                        ),
                        scope.source,
                    );
                }
                let error = error.unwrap_or_else(|| Type::builtin("anyerror"));
                out.extend(captures.iter().map(|c| (c.token, error.clone())));
            }
            CaptureKind::Iterable => {
                for (i, capture) in captures.iter().enumerate() {
                    let Some(input) = u32::try_from(i)
                        .ok()
                        .and_then(|i| ast.for_input_at(scope.source, i))
                    else {
                        out.push((capture.token, Type::unknown()));
                        continue;
                    };
                    let elem = if ast.tag(input) == NodeTag::ForRange {
                        Some(Type::builtin("usize"))
                    } else {
                        let iterable = self.eval(input, None, None);
                        let elem = iterable.element().cloned();
                        if elem.is_none() && !indeterminate(&iterable) {
                            self.report_at(
                                Problem::hint(
                                    ProblemCode::NonIterableCapture,
                                    format!("Cannot iterate over a value of type '{iterable}'"),
                                ),
                                input,
                            );
                        }
                        elem
                    };
                    let elem = elem.unwrap_or_default().without_value();
                    let ty = if capture.by_ref { Type::pointer(elem) } else { elem };
                    out.push((capture.token, ty));
                }
            }
            CaptureKind::SwitchPayload => {
                let operand = self.eval(scope.source, None, None).without_value();
                let item = ast.switch_case_item_at(scope.node, 0);
                let field = match (&operand.through_pointer().kind, item) {
                    (TypeKind::Union(_), Some(item)) if ast.tag(item) == NodeTag::EnumLiteral => {
                        let view = self.session.analysis(self.chain).0.view;
                        let name = Identifier::new(ast.identifier_text(ast.main_token(item)));
                        access_attribute(view, &operand, name).and_then(|d| match &d.ty.kind {
                            TypeKind::Union(u) => u.data.as_deref().cloned(),
                            _ => None,
                        })
                    }
                    _ => None,
                };
                let tag = match &operand.through_pointer().kind {
                    TypeKind::Union(u) => u.base.as_deref().cloned().unwrap_or_default(),
                    _ => Type::unknown(),
                };
                for (i, capture) in captures.iter().enumerate() {
                    let ty = match i {
                        0 => field.clone().unwrap_or_else(|| operand.clone()),
                        _ => tag.clone(),
                    };
                    let ty = if capture.by_ref { Type::pointer(ty) } else { ty };
                    out.push((capture.token, ty));
                }
            }
            CaptureKind::ErrdeferError => {
                let error = self
                    .function
                    .and_then(|f| self.session.top.declaration(f))
                    .and_then(|d| d.ty.function_type().map(|f| (*f.ret).clone()))
                    .and_then(|ret| match ret.kind {
                        TypeKind::ErrorUnion(e) => Some(*e.error),
                        _ => None,
                    })
                    .unwrap_or_else(|| Type::builtin("anyerror"));
                out.extend(captures.iter().map(|c| (c.token, error.clone())));
            }
        }
        out
    }
}

impl Visitor for DeclarationBuilder<'_> {
    fn ast(&self) -> &Ast {
        &self.ast
    }

    fn visit_module(&mut self, node: NodeIndex) {
        let root = self.session.register_root();
        let name = self.session.project().qualifier_path(self.session.document());
        let id = self.session.declare(
            DeclKey::node(NodeIndex::ROOT),
            root,
            Identifier::new(&name),
            Range::default(),
        );
        let ty = Type::structure(self.decl_ref(id), Identifier::new(&name))
            .with_modifiers(Modifiers::MODULE);
        let comment = self.ast.container_doc_comment();
        self.update(id, |d| {
            d.kind = DeclarationKind::Type;
            d.class_type = Some(ClassType::Struct);
            d.flags |= DeclFlags::MODULE;
            d.comment = comment;
            d.ty = ty;
        });
        self.set_owner(root, id);
        self.with_context(root, |b| walk_children(b, node));
    }

    fn visit_container(&mut self, node: NodeIndex) {
        let id = self.declare_anonymous(node);
        self.build_container(node, id);
    }

    fn visit_error_set(&mut self, node: NodeIndex) {
        let id = self.declare_anonymous(node);
        self.build_error_set(node, id);
    }

    fn visit_field(&mut self, node: NodeIndex) {
        walk_children(self, node);
        let ast = Arc::clone(&self.ast);
        let name_token = ast.main_token(node);
        let name = Identifier::new(ast.identifier_text(name_token));
        let id = self
            .session
            .declare(DeclKey::node(node), self.current, name, ast.token_range(name_token));
        let data = ast.data(node);
        let (type_expr, value) = (
            (data.lhs != 0).then_some(NodeIndex(data.lhs)),
            (data.rhs != 0).then_some(NodeIndex(data.rhs)),
        );
        let owner = self.owner_type(self.current).unwrap_or_default();
        let kind = self.session.top.context(self.current).map(|c| c.kind);

        let mut tag_value = None;
        let ty = match kind {
            Some(ContextKind::Enum) => {
                let base = match &owner.kind {
                    TypeKind::Enum(e) => e.base.as_deref().cloned(),
                    _ => None,
                };
                let explicit = value
                    .map(|v| self.eval(v, base, None))
                    .and_then(|v| fold::parse_int(v.value_str()?));
                let tag = explicit.unwrap_or(self.enum_ordinal);
                self.enum_ordinal = tag.saturating_add(1);
                tag_value = Some(tag);
                owner.as_enum_value(name)
            }
            Some(ContextKind::Class) => {
                let payload = type_expr.map(|t| self.eval(t, None, Some(id)).without_value());
                let mut ty = owner.clone();
                if let TypeKind::Union(u) = &mut ty.kind {
                    u.data = Some(Box::new(payload.unwrap_or_else(|| Type::builtin("void"))));
                    u.union_type = Some(Box::new(owner.clone()));
                }
                ty
            }
            _ => {
                let ty = type_expr
                    .map(|t| self.eval(t, None, Some(id)).without_value())
                    .unwrap_or_default();
                if let Some(value) = value {
                    self.eval(value, Some(ty.clone()), Some(id));
                }
                ty
            }
        };
        let comment = ast.doc_comment(node);
        self.update(id, |d| {
            d.flags |= DeclFlags::CLASS_MEMBER;
            d.comment = comment;
            d.tag_value = tag_value;
            d.ty = ty;
        });
    }

    fn visit_function(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        let Some(proto) = ast.fn_proto_data(node) else {
            return;
        };
        let Some(name_token) = proto.name_token else {
            // A function type expression.
            walk_children(self, node);
            return;
        };
        let name = Identifier::new(ast.identifier_text(name_token));
        let id = self
            .session
            .declare(DeclKey::node(node), self.current, name, ast.token_range(name_token));
        if let Some(proto_node) = ast.fn_proto(node) {
            self.session.tables.node_declarations.insert(proto_node, id);
        }
        let public = has_prefix_keyword(&ast, node, TokenType::KeywordPub);
        let comment = ast.doc_comment(node);
        self.update(id, |d| {
            d.kind = DeclarationKind::Function;
            if public {
                d.flags |= DeclFlags::PUBLIC;
            }
            d.comment = comment;
        });

        let ctx = self.session.open_context(
            ScopeKey::body(node),
            ContextKind::Function,
            ast.node_range(node),
            self.current,
        );
        self.set_owner(ctx, id);

        let (args, ret) = self.with_context(ctx, |b| {
            let mut args = Vec::new();
            for (i, param) in (0..ast.fn_param_count(node))
                .filter_map(|i| ast.fn_param_at(node, i))
                .enumerate()
            {
                walk_children(b, param);
                let data = ast.param_data(param);
                let name = data
                    .name_token
                    .map_or(Identifier::EMPTY, |t| Identifier::new(ast.identifier_text(t)));
                let range = data
                    .name_token
                    .map_or_else(|| ast.node_range(param), |t| ast.token_range(t));
                let param_id = b.session.declare(DeclKey::node(param), ctx, name, range);
                let mut ty = if data.is_anytype {
                    Type::builtin("anytype")
                } else {
                    data.type_expr
                        .map(|t| b.eval(t, None, None).without_value())
                        .unwrap_or_default()
                };
                if data.is_comptime {
                    ty = if ty.is_builtin("type") {
                        let delayed = if name.is_empty() {
                            Identifier::new(&i.to_string())
                        } else {
                            name
                        };
                        Type::delayed(delayed)
                    } else {
                        ty.with_modifiers(Modifiers::COMPTIME)
                    };
                }
                let param_ty = ty.clone();
                b.update(param_id, |d| {
                    d.flags |= DeclFlags::PARAM;
                    if data.is_comptime {
                        d.flags |= DeclFlags::COMPTIME;
                    }
                    d.ty = param_ty;
                });
                args.push(ty);
            }
            if let Some(ret) = proto.return_type {
                b.visit_node(ret);
            }
            let mut ret = proto
                .return_type
                .map_or_else(|| Type::builtin("void"), |r| b.eval(r, None, None).without_value());
            if proto.inferred_error {
                ret = Type::error_union(ret, Type::builtin("anyerror"));
            }
            (args, ret)
        });
        let returns_type = ret.is_builtin("type");
        let fn_ty = Type::function(args.clone(), ret);
        self.update(id, |d| d.ty = fn_ty);

        let Some(body) = ast.fn_body(node) else {
            return;
        };
        let saved = self.function.replace(id);
        self.with_context(ctx, |b| b.visit_node(body));
        self.function = saved;

        let function = self.decl_ref(id);
        let (env, tables) = self.session.analysis(self.chain);
        let summary = FunctionVisitor::new(env, tables, function, ctx).run(body);
        trace!("fn {} returns {:?}", name, summary);
        let computed = summary.return_type.filter(|t| !t.is_unknown());
        self.update(id, |d| {
            d.returned_param = summary.returned_param;
            if returns_type {
                if let (Some(computed), TypeKind::Function(f)) = (computed, &mut d.ty.kind) {
                    f.ret = Box::new(computed);
                }
            }
        });
    }

    fn visit_var_decl(&mut self, node: NodeIndex) {
        let ast = Arc::clone(&self.ast);
        let name_token = ast.main_token(node) + 1;
        let name = Identifier::new(ast.identifier_text(name_token));
        let id = self
            .session
            .declare(DeclKey::node(node), self.current, name, ast.token_range(name_token));
        let public = has_prefix_keyword(&ast, node, TokenType::KeywordPub);
        let comptime = has_prefix_keyword(&ast, node, TokenType::KeywordComptime);
        let comment = ast.doc_comment(node);
        self.update(id, |d| {
            if public {
                d.flags |= DeclFlags::PUBLIC;
            }
            if comptime {
                d.flags |= DeclFlags::COMPTIME;
            }
            d.comment = comment;
        });

        let data = ast.data(node);
        let type_expr = (data.lhs != 0).then_some(NodeIndex(data.lhs));
        let init = (data.rhs != 0).then_some(NodeIndex(data.rhs));

        if let Some(init) = init {
            match ast.kind(init) {
                NodeKind::ContainerDecl | NodeKind::EnumDecl | NodeKind::UnionDecl => {
                    return self.build_container(init, id);
                }
                NodeKind::ErrorDecl => return self.build_error_set(init, id),
                _ => {}
            }
            if ast.tag(init) == NodeTag::BuiltinCall {
                match ast.token_slice(ast.main_token(init)) {
                    "@cImport" => return self.build_c_import(init, id),
                    "@import" => {
                        let ty = self.eval(init, None, None);
                        self.update(id, |d| {
                            d.kind = DeclarationKind::Alias;
                            d.ty = ty;
                        });
                        return;
                    }
                    _ => {}
                }
            }
        }

        if let Some(type_expr) = type_expr {
            self.visit_node(type_expr);
        }
        let scope = init.filter(|&i| holds_scope(&ast, i)).map(|i| {
            self.session.open_context(
                ScopeKey::body(node),
                ContextKind::Other,
                ast.node_range(i),
                self.current,
            )
        });
        let ty = match scope {
            Some(ctx) => self.with_context(ctx, |b| {
                if let Some(init) = init {
                    b.visit_node(init);
                }
                b.var_decl_type(node, type_expr, init)
            }),
            None => {
                if let Some(init) = init {
                    self.visit_node(init);
                }
                self.var_decl_type(node, type_expr, init)
            }
        };
        self.update(id, |d| {
            d.kind = DeclarationKind::Instance;
            d.ty = ty;
        });
    }

    fn visit_block(&mut self, node: NodeIndex) {
        let ctx = self.session.open_context(
            ScopeKey::body(node),
            ContextKind::Other,
            self.ast.node_range(node),
            self.current,
        );
        self.with_context(ctx, |b| walk_children(b, node));
    }

    fn visit_test(&mut self, node: NodeIndex) {
        let name = self.ast.spelling_name(node);
        let identifier = if name.is_empty() {
            Identifier::new("test 0")
        } else {
            Identifier::new(&format!("test {name}"))
        };
        let range = self.ast.token_range(self.ast.main_token(node));
        let id = self
            .session
            .declare(DeclKey::node(node), self.current, identifier, range);
        self.update(id, |d| {
            d.flags |= DeclFlags::TEST;
            d.ty = Type::builtin("test");
        });
        walk_children(self, node);
    }

    fn visit_usingnamespace(&mut self, node: NodeIndex) {
        walk_children(self, node);
        let expr = NodeIndex(self.ast.data(node).lhs);
        let ty = self.eval(expr, None, None);
        let view = self.session.analysis(self.chain).0.view;
        let imported = match ty.through_pointer().kind {
            TypeKind::Structure(_) | TypeKind::Enum(_) | TypeKind::Union(_) => {
                internal_context_of(view, &ty)
            }
            _ => None,
        };
        match imported {
            Some(imported) => {
                trace!("usingnamespace {} in {:?}", ty, self.current);
                self.session.add_imported_parent(self.current, imported);
            }
            None if !(ty.is_unknown() || ty.is_delayed()) => self.report_at(
                Problem::hint(
                    ProblemCode::UsingNamespaceNotContainer,
                    format!("'usingnamespace' expects a container, found '{ty}'"),
                ),
                expr,
            ),
            None => {}
        }
    }

    fn visit_capture_scope(&mut self, scope: &CaptureScope) {
        let captures = self.capture_types(scope);
        let ctx = self.session.open_context(
            ScopeKey {
                node: scope.node,
                slot: scope.slot,
            },
            ContextKind::Other,
            scope.range,
            self.current,
        );
        for (token, ty) in captures {
            let name = Identifier::new(self.ast.identifier_text(token));
            let range = self.ast.token_range(token);
            let id = self
                .session
                .declare(DeclKey::token(scope.node, token), ctx, name, range);
            self.update(id, |d| {
                d.flags |= DeclFlags::CAPTURE;
                d.ty = ty;
            });
        }
        self.with_context(ctx, |b| walk_capture_scope(b, scope));
    }
}
