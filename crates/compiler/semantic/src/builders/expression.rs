//! # Expression Visitor
//!
//! Computes the [`Type`] of an expression node, folding comptime-known values
//! where both operands are literals or constants.
//!
//! The visitor is cheap to construct and carries a little top-down state:
//!
//! - the scope names are resolved in, swapped while visiting capture bodies and
//!   blocks;
//! - an *inferred* type, so that `.Foo` and `.{ ... }` resolve against the type
//!   the surrounding code expects;
//! - an *excluded* declaration that lookups skip, so a field's type expression
//!   never resolves to the field itself;
//! - the return and labeled-break types seen so far, which give block
//!   expressions their type.
//!
//! Every computed type is recorded in [`SessionTables::node_types`].

use std::path::PathBuf;

use smallvec::SmallVec;
use tracing::trace;
use ziglens_compiler_parser::{NodeIndex, NodeTag, PtrSize};

use super::fold;
use crate::duchain::{ContextId, DeclFlags, DeclRef};
use crate::helpers::{
    access_attribute, declaration_for_name, find_member, internal_context_of, this_type,
};
use crate::identifier::Identifier;
use crate::session::{Analysis, ScopeKey, SessionTables};
use crate::types::{
    can_type_be_assigned, is_builtin_type_name, merge_types, Bindings, Modifiers, Type, TypeKind,
};

/// `target` carrying the comptime value of `value` when the target can hold one
/// and the value fits. Enum roots turn into the matching enum value.
pub fn coerce_value(target: &Type, value: &Type) -> Type {
    match value.comptime_value {
        Some(v) if target.supports_comptime_value() && can_type_be_assigned(target, value) => {
            if matches!(&target.kind, TypeKind::Enum(e) if e.enum_type.is_none()) {
                target.as_enum_value(v)
            } else {
                target.clone().with_value(v)
            }
        }
        _ => target.clone(),
    }
}

/// Variant of `std.builtin.Type` describing `ty`.
pub fn type_info_tag(ty: &Type) -> Option<&'static str> {
    let tag = match &ty.kind {
        TypeKind::Builtin(name) => match name.as_str() {
            "type" => "Type",
            "void" => "Void",
            "bool" => "Bool",
            "noreturn" => "NoReturn",
            "comptime_int" => "ComptimeInt",
            "comptime_float" => "ComptimeFloat",
            "undefined" => "Undefined",
            "null" => "Null",
            "anyerror" => "ErrorSet",
            "anyopaque" | "opaque" => "Opaque",
            "anyframe" => "AnyFrame",
            "frame" => "Frame",
            _ if ty.is_integer() => "Int",
            _ if ty.is_float() => "Float",
            _ => return None,
        },
        TypeKind::Pointer(_) => "Pointer",
        TypeKind::Slice(s) if s.dimension > 0 => "Array",
        TypeKind::Slice(_) => "Pointer",
        TypeKind::Optional(_) => "Optional",
        TypeKind::ErrorUnion(_) => "ErrorUnion",
        TypeKind::Enum(_) if ty.is_error_set() => "ErrorSet",
        TypeKind::Enum(_) => "Enum",
        TypeKind::Union(_) => "Union",
        TypeKind::Structure(_) => "Struct",
        TypeKind::Function(_) => "Fn",
        TypeKind::Vector(_) => "Vector",
        TypeKind::Unknown | TypeKind::Delayed(_) | TypeKind::Unsure(_) => return None,
    };
    Some(tag)
}

fn is_comptime_number(ty: &Type) -> bool {
    ty.is_builtin("comptime_int") || ty.is_builtin("comptime_float")
}

/// Length of the array or slice behind `ty`, when known.
/// Longest string a `**` on a literal is folded into.
const MAX_FOLDED_STRING_LEN: usize = 4096;

fn dimension_of(ty: &Type) -> Option<u64> {
    match &ty.through_pointer().kind {
        TypeKind::Slice(s) if s.dimension > 0 => Some(s.dimension),
        TypeKind::Vector(v) => Some(v.dimension),
        _ => None,
    }
}

fn is_string_like(ty: &Type) -> bool {
    matches!(&ty.through_pointer().kind, TypeKind::Slice(s) if s.elem.is_builtin("u8"))
}

pub struct ExpressionVisitor<'a, 't> {
    env: Analysis<'a>,
    tables: &'t mut SessionTables,
    context: ContextId,
    inferred: Option<Type>,
    excluded: Option<DeclRef>,
    current_function: Option<DeclRef>,
    return_type: Option<Type>,
    breaks: Vec<(Option<Identifier>, Type)>,
}

impl<'a, 't> ExpressionVisitor<'a, 't> {
    pub fn new(env: Analysis<'a>, tables: &'t mut SessionTables, context: ContextId) -> Self {
        Self {
            env,
            tables,
            context,
            inferred: None,
            excluded: None,
            current_function: None,
            return_type: None,
            breaks: Vec::new(),
        }
    }

    pub fn with_inferred(mut self, inferred: Option<Type>) -> Self {
        self.inferred = inferred;
        self
    }

    pub fn excluding(mut self, decl: Option<DeclRef>) -> Self {
        self.excluded = decl;
        self
    }

    pub fn in_function(mut self, function: Option<DeclRef>) -> Self {
        self.current_function = function;
        self
    }

    /// Type of the last `return` visited.
    pub fn return_type(&self) -> Option<&Type> {
        self.return_type.as_ref()
    }

    /// Computes and records the type of `node`.
    pub fn visit(&mut self, node: NodeIndex) -> Type {
        let ty = self.infer(node);
        trace!("{} {:?} : {}", node, self.env.ast.tag(node), ty);
        self.tables.node_types.insert(node, ty.clone());
        ty
    }

    fn eval_with(&mut self, node: NodeIndex, inferred: Option<Type>) -> Type {
        let saved = std::mem::replace(&mut self.inferred, inferred);
        let ty = self.visit(node);
        self.inferred = saved;
        ty
    }

    fn eval(&mut self, node: NodeIndex) -> Type {
        self.eval_with(node, None)
    }

    fn in_context<R>(&mut self, ctx: Option<ContextId>, f: impl FnOnce(&mut Self) -> R) -> R {
        let Some(ctx) = ctx else {
            return f(self);
        };
        let saved = std::mem::replace(&mut self.context, ctx);
        let result = f(self);
        self.context = saved;
        result
    }

    fn scope(&self, node: NodeIndex, slot: u8) -> Option<ContextId> {
        self.tables.context_for(ScopeKey { node, slot })
    }

    fn infer(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let data = ast.data(node);
        let (lhs, rhs) = (NodeIndex(data.lhs), NodeIndex(data.rhs));
        match ast.tag(node) {
            NodeTag::NumberLiteral => {
                let text = ast.token_slice(ast.main_token(node));
                let name = if fold::is_float_literal(text) {
                    "comptime_float"
                } else {
                    "comptime_int"
                };
                Type::builtin(name).with_value(Identifier::new(text))
            }
            NodeTag::CharLiteral => {
                let value = ast.string_value(node).unwrap_or_default();
                Type::builtin("u8").with_value(Identifier::new(&value))
            }
            NodeTag::StringLiteral | NodeTag::MultilineStringLiteral => {
                Type::string_literal(&ast.string_value(node).unwrap_or_default())
            }
            NodeTag::Identifier => self.identifier(node),
            NodeTag::UnreachableLiteral => Type::builtin("unreachable"),
            NodeTag::EnumLiteral => self.enum_literal(node),
            NodeTag::ErrorValue => Type::builtin("anyerror")
                .with_value(Identifier::new(ast.identifier_text(data.rhs))),
            NodeTag::ContainerDecl
            | NodeTag::ContainerDeclArg
            | NodeTag::TaggedUnion
            | NodeTag::TaggedUnionEnumTag
            | NodeTag::ErrorSetDecl
            | NodeTag::FnDecl => self.declared_type(node),
            NodeTag::FnProto => self.fn_proto_type(node),
            NodeTag::OptionalType => Type::optional(self.eval(lhs).without_value()),
            NodeTag::PtrType => self.pointer_type(node),
            NodeTag::ArrayType | NodeTag::ArrayTypeSentinel => self.array_type(node),
            NodeTag::ErrorUnion => {
                let error = self.eval(lhs).without_value();
                Type::error_union(self.eval(rhs).without_value(), error)
            }
            NodeTag::AddressOf => Type::pointer(self.eval(lhs)),
            NodeTag::Deref => match self.eval(lhs).kind {
                TypeKind::Pointer(p) => *p.base,
                _ => Type::unknown(),
            },
            NodeTag::UnwrapOptional => self.eval(lhs).optional_base().cloned().unwrap_or_default(),
            NodeTag::FieldAccess => {
                let base = self.eval(lhs);
                self.member_type(&base, ast.identifier_text(data.rhs))
            }
            NodeTag::ArrayAccess => self.array_access(lhs, rhs),
            NodeTag::SliceOpen | NodeTag::Slice => self.slice(node),
            NodeTag::Call | NodeTag::CallOne => self.call(node),
            NodeTag::BuiltinCall => self.builtin_call(node),
            NodeTag::ArrayCat => self.array_cat(lhs, rhs),
            NodeTag::ArrayMult => self.array_mult(lhs, rhs),
            tag if tag.is_comparison() => self.comparison(tag, lhs, rhs),
            tag @ (NodeTag::BoolAnd | NodeTag::BoolOr) => self.logical(tag, lhs, rhs),
            tag if tag.is_arithmetic() => self.arithmetic(tag, lhs, rhs),
            NodeTag::BoolNot => {
                let operand = self.eval(lhs);
                let folded = match operand.value_str() {
                    Some("true") => Some("false"),
                    Some("false") => Some("true"),
                    _ => None,
                };
                folded.map_or_else(|| Type::builtin("bool"), Type::builtin)
            }
            NodeTag::Negation => self.negation(lhs),
            NodeTag::BitNot | NodeTag::NegationWrap => {
                let operand = self.eval(lhs);
                if operand.is_numeric() || is_comptime_number(&operand) {
                    operand.without_value()
                } else {
                    Type::unknown()
                }
            }
            NodeTag::Try => match self.eval(lhs).kind {
                TypeKind::ErrorUnion(e) => *e.payload,
                _ => Type::unknown(),
            },
            NodeTag::Catch => self.catch(node, lhs, rhs),
            NodeTag::Orelse => {
                let left = self.eval(lhs);
                self.visit(rhs);
                left.optional_base().cloned().unwrap_or_default()
            }
            NodeTag::MergeErrorSets => {
                self.eval(lhs);
                self.eval(rhs);
                Type::builtin("anyerror")
            }
            NodeTag::If => self.if_expr(node),
            NodeTag::Switch => self.switch_expr(node),
            NodeTag::While | NodeTag::For => self.loop_expr(node),
            NodeTag::Block => self.block(node),
            NodeTag::Return => {
                let ty = if data.lhs == 0 {
                    Type::builtin("void")
                } else {
                    self.eval(lhs)
                };
                self.return_type = Some(ty);
                Type::builtin("noreturn")
            }
            NodeTag::Break => {
                let label = ast
                    .break_label(node)
                    .map(|t| Identifier::new(ast.identifier_text(t)));
                let ty = if data.rhs == 0 {
                    Type::builtin("void")
                } else {
                    self.visit(rhs)
                };
                self.breaks.push((label, ty));
                Type::builtin("noreturn")
            }
            NodeTag::Continue => Type::builtin("noreturn"),
            NodeTag::GroupedExpression | NodeTag::Comptime | NodeTag::FieldInitializer => {
                self.visit(lhs)
            }
            NodeTag::StructInit => self.struct_init(node),
            NodeTag::ArrayInit => self.array_init(node),
            NodeTag::ForRange => {
                let start = self.eval(lhs);
                let end = (data.rhs != 0).then(|| self.eval(rhs));
                let length = end.and_then(|end| {
                    let (a, b) = (
                        fold::parse_int(start.value_str()?)?,
                        fold::parse_int(end.value_str()?)?,
                    );
                    u64::try_from(b - a).ok()
                });
                Type::slice(Type::builtin("usize"), length.unwrap_or(0))
            }
            NodeTag::SwitchRange => self.visit(lhs),
            NodeTag::Assign
            | NodeTag::AssignOp
            | NodeTag::VarDecl
            | NodeTag::Defer
            | NodeTag::Errdefer
            | NodeTag::Usingnamespace
            | NodeTag::TestDecl => Type::builtin("void"),
            _ => Type::unknown(),
        }
    }

    // ---- names ----

    fn identifier(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let token = ast.main_token(node);
        let text = ast.identifier_text(token);
        if text == "_" {
            return Type::unknown();
        }
        if is_builtin_type_name(text) {
            return Type::builtin(text);
        }
        declaration_for_name(
            self.env.view,
            Identifier::new(text),
            ast.token_range(token).start,
            self.env.context_ref(self.context),
            self.excluded,
        )
        .map_or_else(Type::unknown, |decl| decl.ty.clone())
    }

    fn declared_type(&self, node: NodeIndex) -> Type {
        self.tables
            .node_declarations
            .get(&node)
            .and_then(|&id| self.env.current().declaration(id))
            .map_or_else(Type::unknown, |decl| decl.ty.clone())
    }

    fn enum_literal(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let name = Identifier::new(ast.identifier_text(ast.main_token(node)));
        let Some(inferred) = self.inferred.clone() else {
            return Type::unknown();
        };
        let target = inferred.optional_base().cloned().unwrap_or(inferred);
        match &target.through_pointer().kind {
            TypeKind::Enum(_) | TypeKind::Union(_) => access_attribute(self.env.view, &target, name)
                .map_or_else(Type::unknown, |decl| decl.ty.clone()),
            _ => Type::unknown(),
        }
    }

    /// Type of `base.name`: the synthetic `len`/`ptr` of arrays and slices, else
    /// the member's declared type.
    pub fn member_type(&mut self, base: &Type, name: &str) -> Type {
        if let TypeKind::Slice(s) = &base.through_pointer().kind {
            match name {
                "len" => {
                    let usize_ty = Type::builtin("usize");
                    return match dimension_of(base) {
                        Some(len) => usize_ty.with_value(Identifier::new(&len.to_string())),
                        None => usize_ty,
                    };
                }
                "ptr" => {
                    return Type::pointer((*s.elem).clone().without_value())
                        .with_modifiers(Modifiers::ARRAY_POINTER)
                }
                _ => {}
            }
        }
        access_attribute(self.env.view, base, Identifier::new(name))
            .map_or_else(Type::unknown, |decl| decl.ty.clone())
    }

    // ---- type expressions ----

    fn pointer_type(&mut self, node: NodeIndex) -> Type {
        let Some(ptr) = self.env.ast.ptr_type_data(node) else {
            return Type::unknown();
        };
        let child = self.eval(ptr.child).without_value();
        let mut modifiers = Modifiers::empty();
        if ptr.is_const {
            modifiers |= Modifiers::CONST;
        }
        if ptr.is_volatile {
            modifiers |= Modifiers::VOLATILE;
        }
        let sentinel = ptr.sentinel.and_then(|s| self.eval(s).comptime_value);
        let align = ptr
            .align
            .and_then(|a| fold::parse_int(self.eval(a).value_str()?))
            .and_then(|a| u64::try_from(a).ok());
        let mut ty = match ptr.size {
            PtrSize::One => Type::pointer(child),
            PtrSize::Many | PtrSize::C => {
                Type::pointer(child).with_modifiers(Modifiers::ARRAY_POINTER)
            }
            PtrSize::Slice => Type::slice(child, 0),
        };
        match &mut ty.kind {
            TypeKind::Pointer(p) => p.align = align,
            TypeKind::Slice(s) => s.sentinel = sentinel,
            _ => {}
        }
        ty.with_modifiers(modifiers)
    }

    fn array_type(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let Some((len, sentinel, elem)) = ast.array_type_data(node) else {
            return Type::unknown();
        };
        let dimension = if ast.tag(len) == NodeTag::Identifier && ast.token_slice(ast.main_token(len)) == "_" {
            0
        } else {
            self.eval(len)
                .value_str()
                .and_then(fold::parse_int)
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(0)
        };
        let sentinel = sentinel.and_then(|s| self.eval(s).comptime_value);
        let mut ty = Type::slice(self.eval(elem).without_value(), dimension);
        if let TypeKind::Slice(s) = &mut ty.kind {
            s.sentinel = sentinel;
        }
        ty
    }

    fn fn_proto_type(&mut self, node: NodeIndex) -> Type {
        if self.tables.node_declarations.contains_key(&node) {
            return self.declared_type(node);
        }
        let ast = self.env.ast;
        let Some(proto) = ast.fn_proto_data(node) else {
            return Type::unknown();
        };
        let args = (0..ast.fn_param_count(node))
            .filter_map(|i| ast.fn_param_at(node, i))
            .map(|param| match ast.param_data(param).type_expr {
                Some(ty) => self.eval(ty).without_value(),
                None => Type::builtin("anytype"),
            })
            .collect();
        let mut ret = proto
            .return_type
            .map_or_else(|| Type::builtin("void"), |r| self.eval(r).without_value());
        if proto.inferred_error {
            ret = Type::error_union(ret, Type::builtin("anyerror"));
        }
        Type::function(args, ret)
    }

    // ---- access ----

    fn array_access(&mut self, lhs: NodeIndex, rhs: NodeIndex) -> Type {
        let base = self.eval(lhs);
        let index = self.eval_with(rhs, Some(Type::builtin("usize")));
        let Some(elem) = base.element().cloned() else {
            return Type::unknown();
        };
        let folded = base
            .value_str()
            .filter(|_| is_string_like(&base))
            .zip(index.value_str().and_then(fold::parse_int))
            .and_then(|(text, i)| text.chars().nth(usize::try_from(i).ok()?));
        match folded {
            Some(c) => elem.with_value(Identifier::new(&c.to_string())),
            None => elem.without_value(),
        }
    }

    fn slice(&mut self, node: NodeIndex) -> Type {
        let Some(data) = self.env.ast.slice_data(node) else {
            return Type::unknown();
        };
        let base = self.eval(data.sliced);
        let usize_ty = Some(Type::builtin("usize"));
        self.eval_with(data.start, usize_ty.clone());
        if let Some(end) = data.end {
            self.eval_with(end, usize_ty);
        }
        let Some(elem) = base.element().cloned() else {
            return Type::unknown();
        };
        let is_const = base.modifiers.contains(Modifiers::CONST)
            || base.through_pointer().modifiers.contains(Modifiers::CONST);
        let ty = Type::slice(elem.without_value(), 0);
        if is_const {
            ty.with_modifiers(Modifiers::CONST)
        } else {
            ty
        }
    }

    // ---- operators ----

    fn comparison(&mut self, tag: NodeTag, lhs: NodeIndex, rhs: NodeIndex) -> Type {
        let left = self.eval(lhs);
        let right = self.eval_with(rhs, Some(left.clone().without_value()));
        match (left.value_str(), right.value_str()) {
            (Some(a), Some(b)) => match fold::fold_compare(tag, a, b) {
                Some(true) => Type::builtin("true"),
                Some(false) => Type::builtin("false"),
                None => Type::builtin("bool"),
            },
            _ => Type::builtin("bool"),
        }
    }

    fn logical(&mut self, tag: NodeTag, lhs: NodeIndex, rhs: NodeIndex) -> Type {
        let left = self.eval(lhs).value_str();
        let right = self.eval(rhs).value_str();
        let folded = match (tag, left, right) {
            (NodeTag::BoolAnd, Some("false"), _) | (NodeTag::BoolOr, Some("true"), _) => left,
            (_, Some("true" | "false"), Some(r @ ("true" | "false"))) => Some(r),
            _ => None,
        };
        folded.map_or_else(|| Type::builtin("bool"), Type::builtin)
    }

    fn arithmetic(&mut self, tag: NodeTag, lhs: NodeIndex, rhs: NodeIndex) -> Type {
        let inferred = self.inferred.clone().map(Type::without_value);
        let left = self.eval_with(lhs, inferred.clone());
        let right = self.eval_with(rhs, inferred);
        let pick = if left.is_comptime_known() && !right.is_comptime_known() {
            &right
        } else if is_comptime_number(&left) && right.is_numeric() {
            &right
        } else if left.is_builtin("comptime_int") && right.is_builtin("comptime_float") {
            &right
        } else {
            &left
        };
        let result = pick.clone().without_value();
        let numeric = |t: &Type| t.is_numeric() || is_comptime_number(t);
        if !numeric(&left) || !numeric(&right) {
            return result;
        }
        let (Some(a), Some(b)) = (left.value_str(), right.value_str()) else {
            return result;
        };
        let value = if result.is_float() || result.is_builtin("comptime_float") {
            fold::parse_float(a)
                .zip(fold::parse_float(b))
                .and_then(|(a, b)| fold::fold_float(tag, a, b))
                .map(fold::format_float)
        } else {
            let folded = fold::parse_int(a)
                .zip(fold::parse_int(b))
                .and_then(|(a, b)| fold::fold_int(tag, a, b));
            let fits = |v: i128| match result.bitsize(self.env.ptr_size) {
                Some(bits) if !result.is_builtin("comptime_int") => {
                    fold::fits(v, bits, result.is_signed())
                }
                _ => true,
            };
            folded.filter(|&v| fits(v)).map(|v| v.to_string())
        };
        match value {
            Some(v) => result.with_value(Identifier::new(&v)),
            None => result,
        }
    }

    fn negation(&mut self, lhs: NodeIndex) -> Type {
        let operand = self.eval(lhs);
        if !(operand.is_signed() || operand.is_float() || is_comptime_number(&operand)) {
            return Type::unknown();
        }
        let negated = operand.value_str().and_then(|v| {
            if operand.is_float() || operand.is_builtin("comptime_float") {
                fold::parse_float(v).map(|f| fold::format_float(-f))
            } else {
                fold::parse_int(v).map(|i| (-i).to_string())
            }
        });
        let ty = operand.clone().without_value();
        match negated {
            Some(v) => ty.with_value(Identifier::new(&v)),
            None => ty,
        }
    }

    fn array_cat(&mut self, lhs: NodeIndex, rhs: NodeIndex) -> Type {
        let left = self.eval(lhs);
        let right = self.eval(rhs);
        let (Some(a), Some(b)) = (left.element(), right.element()) else {
            return Type::unknown();
        };
        if !a.equals_ignoring_value(b) {
            return Type::unknown();
        }
        let joined = left
            .value_str()
            .zip(right.value_str())
            .map(|(a, b)| format!("{a}{b}"));
        match (joined, is_string_like(&left)) {
            (Some(text), true) => Type::string_literal(&text),
            (joined, _) => {
                let dimension = dimension_of(&left)
                    .unwrap_or(0)
                    .saturating_add(dimension_of(&right).unwrap_or(0));
                let ty = Type::slice(a.clone().without_value(), dimension);
                match joined {
                    Some(text) => ty.with_value(Identifier::new(&text)),
                    None => ty,
                }
            }
        }
    }

    fn array_mult(&mut self, lhs: NodeIndex, rhs: NodeIndex) -> Type {
        let left = self.eval(lhs);
        let count = self
            .eval(rhs)
            .value_str()
            .and_then(fold::parse_int)
            .and_then(|n| usize::try_from(n).ok());
        let Some(elem) = left.element().cloned() else {
            return Type::unknown();
        };
        let folded_len = left
            .value_str()
            .zip(count)
            .and_then(|(text, n)| text.len().checked_mul(n))
            .filter(|len| *len <= MAX_FOLDED_STRING_LEN);
        match (left.value_str(), count) {
            (Some(text), Some(n)) if is_string_like(&left) && folded_len.is_some() => {
                Type::string_literal(&text.repeat(n))
            }
            (_, Some(n)) => {
                let dimension = dimension_of(&left)
                    .unwrap_or(0)
                    .checked_mul(n as u64)
                    .unwrap_or(0);
                Type::slice(elem.without_value(), dimension)
            }
            _ => Type::slice(elem.without_value(), 0),
        }
    }

    // ---- control flow ----

    fn catch(&mut self, node: NodeIndex, lhs: NodeIndex, rhs: NodeIndex) -> Type {
        let left = self.eval(lhs);
        let handler = self.scope(node, 1);
        let right = self.in_context(handler, |v| v.visit(rhs));
        match left.kind {
            TypeKind::ErrorUnion(e) => {
                let payload = *e.payload;
                if right.is_builtin("null") && !matches!(payload.kind, TypeKind::Optional(_)) {
                    Type::optional(payload)
                } else {
                    payload
                }
            }
            _ => Type::unknown(),
        }
    }

    fn if_expr(&mut self, node: NodeIndex) -> Type {
        let Some(data) = self.env.ast.if_data(node) else {
            return Type::unknown();
        };
        let condition = self.eval(data.condition);
        let taken = match condition.value_str() {
            Some("true") => Some(true),
            Some("false" | "null") => Some(false),
            _ => None,
        };
        let (then_ctx, else_ctx) = (self.scope(node, 1), self.scope(node, 2));
        let then_branch = |v: &mut Self| v.in_context(then_ctx, |v| v.visit(data.then_expr));
        let else_branch = |v: &mut Self| match data.else_expr {
            Some(else_expr) => v.in_context(else_ctx, |v| v.visit(else_expr)),
            None => Type::builtin("void"),
        };
        match taken {
            Some(true) => then_branch(self),
            Some(false) => else_branch(self),
            None => {
                let a = then_branch(self);
                let b = else_branch(self);
                merge_types(&a, &b)
            }
        }
    }

    fn is_divergent_prong(&self, target: NodeIndex) -> bool {
        let ast = self.env.ast;
        match ast.tag(target) {
            NodeTag::UnreachableLiteral => true,
            NodeTag::BuiltinCall => matches!(
                ast.token_slice(ast.main_token(target)),
                "@panic" | "@compileError"
            ),
            _ => false,
        }
    }

    fn switch_expr(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let operand = self.eval(NodeIndex(ast.data(node).lhs));
        let item_hint = Some(operand.clone().without_value());
        let cases: SmallVec<[NodeIndex; 8]> = (0..ast.switch_case_count(node))
            .filter_map(|i| ast.switch_case_at(node, i))
            .collect();

        let mut matched = None;
        let mut else_case = None;
        for &case in &cases {
            let items: SmallVec<[NodeIndex; 4]> = (0..ast.switch_case_item_count(case))
                .filter_map(|j| ast.switch_case_item_at(case, j))
                .collect();
            if items.is_empty() {
                else_case = Some(case);
            }
            for item in items {
                let item_ty = self.eval_with(item, item_hint.clone());
                if matched.is_none()
                    && operand.comptime_value.is_some()
                    && item_ty.comptime_value == operand.comptime_value
                {
                    matched = Some(case);
                }
            }
        }
        let prong = |v: &mut Self, case: NodeIndex| {
            let target = NodeIndex(v.env.ast.data(case).rhs);
            let ctx = v.scope(case, 1);
            v.in_context(ctx, |v| v.visit(target))
        };
        if operand.is_comptime_known() {
            if let Some(case) = matched.or(else_case) {
                return prong(self, case);
            }
        }
        let mut merged: Option<Type> = None;
        for case in cases {
            if self.is_divergent_prong(NodeIndex(ast.data(case).rhs)) {
                continue;
            }
            let ty = prong(self, case);
            merged = Some(match merged {
                Some(prev) => merge_types(&prev, &ty),
                None => ty,
            });
        }
        merged.unwrap_or_else(|| Type::builtin("void"))
    }

    /// Loops are statements; their bodies are still visited for returns and
    /// labeled breaks.
    fn loop_expr(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let breaks_before = self.breaks.len();
        let body_ctx = self.scope(node, 1);
        let else_ctx = self.scope(node, 2);
        let mut else_ty = None;
        if let Some(data) = ast.while_data(node) {
            self.eval(data.condition);
            self.in_context(body_ctx, |v| {
                if let Some(cont) = data.cont_expr {
                    v.visit(cont);
                }
                v.visit(data.body);
            });
            else_ty = data
                .else_expr
                .map(|e| self.in_context(else_ctx, |v| v.visit(e)));
        } else if let Some(data) = ast.for_data(node) {
            for input in (0..ast.for_input_count(node)).filter_map(|i| ast.for_input_at(node, i)) {
                self.eval(input);
            }
            self.in_context(body_ctx, |v| v.visit(data.body));
            else_ty = data.else_expr.map(|e| self.visit(e));
        }
        let mut loop_breaks = Vec::new();
        let mut kept = Vec::new();
        for (label, ty) in self.breaks.drain(breaks_before..) {
            if label.is_none() {
                loop_breaks.push(ty);
            } else {
                kept.push((label, ty));
            }
        }
        self.breaks.extend(kept);
        match else_ty {
            Some(else_ty) => loop_breaks
                .iter()
                .fold(else_ty, |acc, ty| merge_types(&acc, ty)),
            None => Type::builtin("void"),
        }
    }

    fn block(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let label = ast
            .block_label(node)
            .map(|t| Identifier::new(ast.identifier_text(t)));
        let breaks_before = self.breaks.len();
        let ctx = self.scope(node, 0);
        let diverges = self.in_context(ctx, |v| {
            let mut diverges = false;
            for statement in ast.members(node) {
                if ast.tag(statement) == NodeTag::VarDecl {
                    continue;
                }
                let ty = v.visit(statement);
                diverges |= ast.tag(statement) == NodeTag::Return
                    || matches!(ty.builtin_name(), Some("noreturn" | "trap"));
            }
            diverges
        });
        if label.is_some() {
            let mut result: Option<Type> = None;
            let mut kept = Vec::new();
            for (l, ty) in self.breaks.drain(breaks_before..) {
                if l == label {
                    result = Some(match result {
                        Some(prev) => merge_types(&prev, &ty),
                        None => ty,
                    });
                } else {
                    kept.push((l, ty));
                }
            }
            self.breaks.extend(kept);
            if let Some(result) = result {
                return result;
            }
        }
        if diverges {
            Type::builtin("noreturn")
        } else {
            Type::builtin("void")
        }
    }

    // ---- initializers ----

    fn struct_init(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let ty = match ast.init_type(node) {
            Some(t) => self.eval(t).without_value(),
            None => self.inferred.clone().map(Type::without_value).unwrap_or_default(),
        };
        for field in (0..ast.struct_init_count(node)).filter_map(|i| ast.struct_init_at(node, i)) {
            if ast.tag(field) != NodeTag::FieldInitializer {
                self.eval(field);
                continue;
            }
            let name = Identifier::new(ast.identifier_text(ast.main_token(field)));
            let field_ty = access_attribute(self.env.view, &ty, name).map(|d| d.ty.clone());
            self.eval_with(NodeIndex(ast.data(field).lhs), field_ty);
        }
        ty
    }

    fn array_init(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let declared = match ast.init_type(node) {
            Some(t) => Some(self.eval(t).without_value()),
            None => self.inferred.clone().map(Type::without_value),
        };
        let elem = declared.as_ref().and_then(|d| d.element().cloned());
        let count = ast.struct_init_count(node);
        for value in (0..count).filter_map(|i| ast.struct_init_at(node, i)) {
            self.eval_with(value, elem.clone());
        }
        match declared {
            Some(mut ty) => {
                if let TypeKind::Slice(s) = &mut ty.kind {
                    if s.dimension == 0 && ast.init_type(node).is_some() {
                        s.dimension = u64::from(count);
                    }
                }
                ty
            }
            None => Type::unknown(),
        }
    }

    // ---- calls ----

    /// Callee type, its declaration when it names one, and the receiver type of
    /// a `recv.method` callee.
    fn resolve_callee(&mut self, callee: NodeIndex) -> (Type, Option<DeclRef>, Option<Type>) {
        let ast = self.env.ast;
        match ast.tag(callee) {
            NodeTag::Identifier => {
                let token = ast.main_token(callee);
                let text = ast.identifier_text(token);
                let decl = declaration_for_name(
                    self.env.view,
                    Identifier::new(text),
                    ast.token_range(token).start,
                    self.env.context_ref(self.context),
                    self.excluded,
                );
                let ty = self.visit(callee);
                (ty, decl.map(|d| d.decl_ref()), None)
            }
            NodeTag::FieldAccess => {
                let data = ast.data(callee);
                let receiver = self.eval(NodeIndex(data.lhs));
                let name = Identifier::new(ast.identifier_text(data.rhs));
                let member = access_attribute(self.env.view, &receiver, name)
                    .map(|d| (d.ty.clone(), d.decl_ref()));
                let is_instance = matches!(
                    receiver.through_pointer().kind,
                    TypeKind::Structure(_) | TypeKind::Enum(_) | TypeKind::Union(_)
                ) && !receiver.is_module();
                match member {
                    Some((ty, decl)) => {
                        self.tables.node_types.insert(callee, ty.clone());
                        (ty, Some(decl), is_instance.then_some(receiver))
                    }
                    None => {
                        let ty = self.member_type(&receiver, name.as_str());
                        (ty, None, None)
                    }
                }
            }
            _ => (self.visit(callee), None, None),
        }
    }

    /// Formal parameter types of a call after binding `Delayed` parameters, with
    /// the number of leading formals taken by an implicit receiver.
    pub fn call_signature(&mut self, node: NodeIndex) -> Option<(Vec<Type>, usize)> {
        let callee = self.env.ast.callee(node)?;
        let (ty, _, receiver) = self.resolve_callee(callee);
        let func = ty.function_type()?;
        let actual = self.env.ast.call_param_count(node) as usize;
        let shift = usize::from(receiver.is_some() && func.args.len() == actual + 1);
        Some((func.args.clone(), shift))
    }

    fn call(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let Some(callee) = ast.callee(node) else {
            return Type::unknown();
        };
        let (callee_ty, callee_decl, receiver) = self.resolve_callee(callee);
        let Some(func) = callee_ty.function_type() else {
            for arg in (0..ast.call_param_count(node)).filter_map(|i| ast.call_param_at(node, i)) {
                self.eval(arg);
            }
            return Type::unknown();
        };
        let args: SmallVec<[NodeIndex; 4]> = (0..ast.call_param_count(node))
            .filter_map(|i| ast.call_param_at(node, i))
            .collect();
        let shift = usize::from(receiver.is_some() && func.args.len() == args.len() + 1);

        let mut bindings = Bindings::default();
        if let (1, Some(receiver), Some(first)) = (shift, &receiver, func.args.first()) {
            bind_delayed(first, receiver.through_pointer(), &mut bindings);
        }
        let mut actuals = Vec::with_capacity(args.len());
        for (i, &arg) in args.iter().enumerate() {
            let formal = func.args.get(i + shift);
            let hint = formal
                .filter(|f| !f.contains_delayed())
                .map(|f| f.clone().without_value());
            let actual = self.eval_with(arg, hint);
            if let Some(formal) = formal {
                bind_delayed(formal, &actual, &mut bindings);
            }
            actuals.push(actual);
        }

        if func.ret.contains_delayed() && callee_decl.is_some() && callee_decl == self.current_function {
            return Type::unknown();
        }
        let ret = if bindings.is_empty() {
            (*func.ret).clone()
        } else {
            func.ret.substitute(&bindings)
        };
        let returned = callee_decl
            .and_then(|d| self.env.view.declaration(d))
            .and_then(|d| d.returned_param)
            .and_then(|p| (p as usize).checked_sub(shift))
            .and_then(|i| actuals.get(i));
        match returned {
            Some(actual) => coerce_value(&ret, actual),
            None => ret,
        }
    }

    // ---- builtins ----

    fn builtin_call(&mut self, node: NodeIndex) -> Type {
        let ast = self.env.ast;
        let name = ast.token_slice(ast.main_token(node));
        let args: SmallVec<[NodeIndex; 4]> = (0..ast.call_param_count(node))
            .filter_map(|i| ast.call_param_at(node, i))
            .collect();
        let first = args.first().copied();
        match name {
            "@import" => self.import(first),
            "@cImport" => {
                let inferred = self.inferred.clone();
                if let Some(arg) = first {
                    self.eval_with(arg, inferred.clone());
                }
                inferred.unwrap_or_default()
            }
            "@cInclude" => {
                self.c_include(first);
                Type::builtin("void")
            }
            "@This" => this_type(self.env.view, self.env.context_ref(self.context)),
            "@TypeOf" => first.map_or_else(Type::unknown, |a| self.eval(a).without_value()),
            "@typeInfo" => self.type_info(first),
            "@field" => {
                let base = first.map_or_else(Type::unknown, |a| self.eval(a));
                let field = args.get(1).and_then(|&a| {
                    ast.string_value(a)
                        .or_else(|| self.eval(a).value_str().map(str::to_string))
                });
                match field {
                    Some(field) => self.member_type(&base, &field),
                    None => Type::unknown(),
                }
            }
            "@as" => {
                let target = first.map_or_else(Type::unknown, |a| self.eval(a).without_value());
                match args.get(1) {
                    Some(&value) => {
                        let value = self.eval_with(value, Some(target.clone()));
                        coerce_value(&target, &value)
                    }
                    None => target,
                }
            }
            "@intFromEnum" | "@intFromBool" | "@boolFromInt" | "@floatFromInt"
            | "@intFromFloat" | "@intCast" | "@enumFromInt" | "@truncate" | "@ptrCast"
            | "@alignCast" | "@constCast" | "@volatileCast" | "@bitCast" | "@floatCast"
            | "@ptrFromInt" | "@errorCast" => {
                let operand = first.map_or_else(Type::unknown, |a| self.eval(a));
                for &arg in args.iter().skip(1) {
                    self.eval(arg);
                }
                self.cast(name, &operand)
            }
            "@sqrt" | "@sin" | "@cos" | "@tan" | "@exp" | "@exp2" | "@log" | "@log2"
            | "@log10" | "@floor" | "@ceil" | "@trunc" | "@round" | "@min" | "@max" | "@mod"
            | "@rem" | "@abs" | "@shlExact" | "@shrExact" | "@mulAdd" | "@atomicLoad"
            | "@divTrunc" | "@divFloor" | "@divExact" | "@clz" | "@ctz" | "@popCount"
            | "@byteSwap" | "@bitReverse" => {
                let inferred = self.inferred.clone().map(Type::without_value);
                let ty = first.map_or_else(Type::unknown, |a| self.eval_with(a, inferred.clone()));
                for &arg in args.iter().skip(1) {
                    self.eval_with(arg, inferred.clone());
                }
                ty.without_value()
            }
            "@tagName" | "@errorName" => {
                let operand = first.map(|a| self.eval(a));
                let ty = Type::const_string();
                match operand.and_then(|o| o.comptime_value) {
                    Some(value) => ty.with_value(value),
                    None => ty,
                }
            }
            "@typeName" => {
                let operand = first.map(|a| self.eval(a).without_value());
                match operand.filter(|o| !o.is_unknown()) {
                    Some(o) => Type::const_string().with_value(Identifier::new(&o.to_string())),
                    None => Type::const_string(),
                }
            }
            "@embedFile" => Type::const_string(),
            "@intFromPtr" | "@returnAddress" | "@frameAddress" => Type::builtin("usize"),
            "@sizeOf" | "@bitSizeOf" => {
                let operand = first.map(|a| self.eval(a));
                let bits = operand.and_then(|o| o.bitsize(self.env.ptr_size).or_else(|| o.is_builtin("bool").then_some(1)));
                let value = bits.map(|b| if name == "@sizeOf" { b.div_ceil(8) } else { b });
                let ty = Type::builtin("comptime_int");
                match value {
                    Some(v) => ty.with_value(Identifier::new(&v.to_string())),
                    None => ty,
                }
            }
            "@alignOf" | "@offsetOf" | "@bitOffsetOf" => {
                for &arg in &args {
                    self.eval(arg);
                }
                Type::builtin("comptime_int")
            }
            "@hasField" | "@hasDecl" => self.has_member(name == "@hasField", &args),
            "@memcpy" | "@memset" | "@export" | "@breakpoint" | "@prefetch" | "@fence" => {
                for &arg in &args {
                    self.eval(arg);
                }
                Type::builtin("void")
            }
            set if set.starts_with("@set") => Type::builtin("void"),
            "@trap" => Type::builtin("noreturn"),
            "@panic" | "@compileError" | "@compileLog" => {
                for &arg in &args {
                    self.eval(arg);
                }
                Type::builtin("trap")
            }
            "@fieldParentPtr" => self.inferred.clone().map(Type::without_value).unwrap_or_default(),
            "@Vector" => {
                let length = first
                    .and_then(|a| fold::parse_int(self.eval(a).value_str()?))
                    .and_then(|n| u64::try_from(n).ok())
                    .unwrap_or(0);
                let elem = args.get(1).map_or_else(Type::unknown, |&a| self.eval(a).without_value());
                Type::vector(elem, length)
            }
            "@splat" => {
                let inferred = self.inferred.clone().filter(|t| matches!(t.kind, TypeKind::Vector(_)));
                let elem = inferred.as_ref().and_then(|t| t.element().cloned());
                if let Some(arg) = first {
                    self.eval_with(arg, elem);
                }
                inferred.map(Type::without_value).unwrap_or_default()
            }
            "@reduce" => args
                .get(1)
                .and_then(|&a| self.eval(a).element().cloned())
                .map(Type::without_value)
                .unwrap_or_default(),
            "@unionInit" => first.map_or_else(Type::unknown, |a| self.eval(a).without_value()),
            "@call" => args
                .get(1)
                .and_then(|&f| self.eval(f).function_type().map(|f| (*f.ret).clone()))
                .unwrap_or_default(),
            _ => {
                for &arg in &args {
                    self.eval(arg);
                }
                Type::unknown()
            }
        }
    }

    /// Conversion builtins. The result is the inferred target type; only the
    /// conversions below carry the operand's comptime value over.
    fn cast(&mut self, name: &str, operand: &Type) -> Type {
        let target = self.inferred.clone().map(Type::without_value);
        match name {
            "@intFromEnum" => self.int_from_enum(operand, target),
            "@intFromBool" => {
                let ty = target.unwrap_or_else(|| Type::builtin("u1"));
                match operand.value_str() {
                    Some("true") => ty.with_value(Identifier::new("1")),
                    Some("false") => ty.with_value(Identifier::new("0")),
                    _ => ty,
                }
            }
            "@boolFromInt" => match operand.value_str().and_then(fold::parse_int) {
                Some(0) => Type::builtin("false"),
                Some(_) => Type::builtin("true"),
                None => Type::builtin("bool"),
            },
            "@floatFromInt" => {
                let ty = target.unwrap_or_else(|| Type::builtin("comptime_float"));
                let value = operand
                    .value_str()
                    .and_then(fold::parse_int)
                    .filter(|_| ty.is_float() || ty.is_builtin("comptime_float"))
                    .map(|v| fold::format_float(v as f64));
                match value {
                    Some(v) => ty.with_value(Identifier::new(&v)),
                    None => ty,
                }
            }
            _ => target.unwrap_or_default(),
        }
    }

    fn int_from_enum(&mut self, operand: &Type, target: Option<Type>) -> Type {
        let base = match &operand.kind {
            TypeKind::Enum(e) => e.base.as_deref().cloned(),
            _ => None,
        };
        let ty = target
            .or(base)
            .unwrap_or_else(|| Type::builtin("comptime_int"));
        let tag = operand
            .value_str()
            .zip(operand.enum_type())
            .and_then(|(member, root)| {
                let ctx = internal_context_of(self.env.view, root)?;
                find_member(self.env.view, ctx, Identifier::new(member))?.tag_value
            });
        match tag {
            Some(tag) => ty.with_value(Identifier::new(&tag.to_string())),
            None => ty,
        }
    }

    fn has_member(&mut self, field: bool, args: &[NodeIndex]) -> Type {
        let ast = self.env.ast;
        let container = args.first().map(|&a| self.eval(a));
        let name = args.get(1).and_then(|&a| {
            ast.string_value(a)
                .or_else(|| self.eval(a).value_str().map(str::to_string))
        });
        let (Some(container), Some(name)) = (container, name) else {
            return Type::builtin("bool");
        };
        if internal_context_of(self.env.view, &container).is_none() {
            return Type::builtin("bool");
        }
        let found = access_attribute(self.env.view, &container, Identifier::new(&name))
            .is_some_and(|d| d.flags.contains(DeclFlags::CLASS_MEMBER) == field);
        Type::builtin(if found { "true" } else { "false" })
    }

    fn type_info(&mut self, arg: Option<NodeIndex>) -> Type {
        let Some(arg) = arg else {
            return Type::unknown();
        };
        let ty = self.eval(arg);
        let Some(tag) = type_info_tag(&ty) else {
            return Type::unknown();
        };
        let view = self.env.view;
        let std_type = self
            .env
            .project
            .import_path("std", self.env.document)
            .and_then(|path| view.chain().top_for_path(&path))
            .and_then(|top| top.owner().and_then(|o| top.declaration(o)).map(|d| d.ty.clone()))
            .and_then(|std| access_attribute(view, &std, Identifier::new("builtin")).map(|d| d.ty.clone()))
            .and_then(|builtin| access_attribute(view, &builtin, Identifier::new("Type")).map(|d| d.ty.clone()));
        std_type
            .and_then(|t| access_attribute(view, &t, Identifier::new(tag)).map(|d| d.ty.clone()))
            .unwrap_or_default()
    }

    // ---- imports ----

    fn import(&mut self, arg: Option<NodeIndex>) -> Type {
        let Some(name) = arg.and_then(|a| self.env.ast.string_value(a)) else {
            return Type::unknown();
        };
        match self.env.project.import_path(&name, self.env.document) {
            Some(path) => self.module_type(path),
            None => Type::unknown(),
        }
    }

    /// Type of the module declaration of `path`, or a delayed module type that
    /// schedules the target for analysis.
    pub fn module_type(&mut self, path: PathBuf) -> Type {
        if path == self.env.document {
            let top = self.env.current();
            return top
                .owner()
                .and_then(|o| top.declaration(o))
                .map_or_else(Type::unknown, |d| d.ty.clone());
        }
        let published = self.env.view.chain().top_for_path(&path);
        if let Some(ty) = published
            .as_ref()
            .and_then(|top| top.owner().and_then(|o| top.declaration(o)))
            .map(|d| d.ty.clone())
        {
            self.tables.resolved_imports.insert(path);
            return ty;
        }
        let name = Identifier::new(&path.to_string_lossy());
        self.tables.defer_import(path, self.env.priority - 1);
        Type::delayed(name).with_modifiers(Modifiers::MODULE)
    }

    fn c_include(&mut self, arg: Option<NodeIndex>) {
        let Some(header) = arg.and_then(|a| self.env.ast.string_value(a)) else {
            return;
        };
        let Some(decl) = self
            .inferred
            .as_ref()
            .filter(|t| t.modifiers.contains(Modifiers::C_INCLUDE))
            .and_then(Type::declaration)
            .filter(|d| d.file == self.env.file)
        else {
            return;
        };
        let Some(path) = self.env.project.c_include_path(&header, self.env.document) else {
            return;
        };
        match self.env.view.chain().top_for_path(&path) {
            Some(top) => {
                self.tables.c_includes.push((decl.decl, top.root_ref()));
                self.tables.resolved_imports.insert(path);
            }
            None => self.tables.defer_import(path, self.env.priority - 1),
        }
    }
}

/// Binds `Delayed` names in `formal` to the matching parts of `actual`. The
/// first binding of a name wins.
pub(crate) fn bind_delayed(formal: &Type, actual: &Type, bindings: &mut Bindings) {
    match (&formal.kind, &actual.kind) {
        (TypeKind::Delayed(name), _) if !formal.is_module() => {
            if !actual.is_unknown() {
                bindings
                    .entry(*name)
                    .or_insert_with(|| actual.clone().without_value());
            }
        }
        (TypeKind::Pointer(f), TypeKind::Pointer(a)) => bind_delayed(&f.base, &a.base, bindings),
        (TypeKind::Pointer(f), _) => bind_delayed(&f.base, actual, bindings),
        (TypeKind::Optional(f), TypeKind::Optional(a)) => bind_delayed(f, a, bindings),
        (TypeKind::Slice(f), TypeKind::Slice(a)) => bind_delayed(&f.elem, &a.elem, bindings),
        _ => {}
    }
}
