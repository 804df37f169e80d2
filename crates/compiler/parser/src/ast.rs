//! # Flat Syntax Tree
//!
//! The parser produces a flat array of `(tag, main_token, {lhs, rhs})` nodes plus an
//! `extra_data` pool for variable-arity constructs. [`Ast`] owns that array together
//! with the token list and the source, and exposes a read-only facade over it.
//!
//! Node `0` is the root. Because the root can never be a child, a `0` in a child slot
//! means "absent".
//!
//! ## Node data layout
//!
//! | Tag | main token | lhs | rhs |
//! |-----|------------|-----|-----|
//! | `Root` | first token | members start | members end |
//! | `VarDecl` | `const`/`var` | type | initializer |
//! | `FnDecl` | `fn` | proto | body |
//! | `FnProto` | `fn` | extra `[params_start, params_end, flags]` | return type |
//! | `Param` | name or first token | type | [`param_flags`] |
//! | `TestDecl` | `test` | name token | body |
//! | `ContainerDecl`, `TaggedUnion` | keyword | members start | members end |
//! | `ContainerDeclArg`, `TaggedUnionEnumTag` | keyword | argument | extra `[members_start, members_end]` |
//! | `ContainerField` | name | type | value |
//! | `ErrorSetDecl` | `error` | `{` token | `}` token |
//! | `Block` | `{` | statements start | statements end |
//! | `If` | `if` | condition | extra `[then, else, payload, error_payload]` |
//! | `While` | `while` | condition | extra `[body, else, continue, payload, error_payload]` |
//! | `For` | `for` | extra `[inputs_start, inputs_end, body, else]` | payload token |
//! | `Switch` | `switch` | operand | extra `[cases_start, cases_end]` |
//! | `SwitchCase` | `=>` | extra `[items_start, items_end]` | target |
//! | `PtrType` | first token | extra `[sentinel, align, flags]` | child |
//! | `Call` | `(` | callee | extra `[args_start, args_end]` |
//! | `BuiltinCall` | builtin | args start | args end |
//! | `StructInit`, `ArrayInit` | `{` | type | extra `[start, end]` |
//! | `Slice` | `[` | sliced | extra `[start, end, sentinel]` |
//! | `Break`, `Continue` | keyword | label token | value |

use chumsky::span::SimpleSpan;
use smallvec::SmallVec;
use ziglens_compiler_diagnostics::{Position, Range, Severity};

use crate::lexer::{Token, TokenType};
use crate::line_index::LineIndex;

pub type TokenIndex = u32;

/// Sentinel for "no token".
pub const INVALID_TOKEN: TokenIndex = u32::MAX;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub const ROOT: Self = Self(0);

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fine-grained parser tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Root,
    VarDecl,
    FnDecl,
    FnProto,
    Param,
    TestDecl,
    Usingnamespace,
    Comptime,
    ContainerDecl,
    ContainerDeclArg,
    TaggedUnion,
    TaggedUnionEnumTag,
    ContainerField,
    ErrorSetDecl,
    Block,
    Defer,
    Errdefer,

    // Leaves
    Identifier,
    NumberLiteral,
    CharLiteral,
    StringLiteral,
    MultilineStringLiteral,
    EnumLiteral,
    ErrorValue,
    UnreachableLiteral,
    Asm,

    // Prefix operators
    BoolNot,
    Negation,
    BitNot,
    NegationWrap,
    AddressOf,
    Try,
    OptionalType,

    // Types
    PtrType,
    ArrayType,
    ArrayTypeSentinel,
    ErrorUnion,

    // Binary operators
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    AddWrap,
    SubWrap,
    MulWrap,
    AddSat,
    SubSat,
    MulSat,
    Shl,
    ShlSat,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    BoolAnd,
    BoolOr,
    EqualEqual,
    BangEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    ArrayCat,
    ArrayMult,
    MergeErrorSets,
    Orelse,
    Catch,
    Assign,
    /// Compound assignment; the main token is the operator.
    AssignOp,

    // Postfix
    FieldAccess,
    Deref,
    UnwrapOptional,
    ArrayAccess,
    SliceOpen,
    Slice,
    Call,
    CallOne,
    BuiltinCall,
    StructInit,
    FieldInitializer,
    ArrayInit,
    GroupedExpression,

    // Control flow
    If,
    While,
    For,
    ForRange,
    Switch,
    SwitchCase,
    SwitchRange,
    Return,
    Break,
    Continue,
}

impl NodeTag {
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::EqualEqual
                | Self::BangEqual
                | Self::LessThan
                | Self::GreaterThan
                | Self::LessOrEqual
                | Self::GreaterOrEqual
        )
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Mul
                | Self::Div
                | Self::Mod
                | Self::AddWrap
                | Self::SubWrap
                | Self::MulWrap
                | Self::AddSat
                | Self::SubSat
                | Self::MulSat
                | Self::Shl
                | Self::ShlSat
                | Self::Shr
                | Self::BitAnd
                | Self::BitOr
                | Self::BitXor
        )
    }
}

/// Coarse node kind used for dispatch by the semantic builders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Unknown,
    Module,
    ContainerDecl,
    EnumDecl,
    UnionDecl,
    FieldDecl,
    FunctionDecl,
    ParamDecl,
    VarDecl,
    BlockDecl,
    ErrorDecl,
    TestDecl,
    Call,
    If,
    For,
    While,
    Switch,
    Defer,
    Catch,
    Usingnamespace,
    FnProto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeData {
    pub lhs: u32,
    pub rhs: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    pub tag: NodeTag,
    pub main_token: TokenIndex,
    pub data: NodeData,
}

/// First and last token of a node, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeSpan {
    pub first: TokenIndex,
    pub last: TokenIndex,
}

/// A `[start, end)` window into `extra_data`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubRange {
    pub start: u32,
    pub end: u32,
}

impl SubRange {
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod param_flags {
    pub const COMPTIME: u32 = 1;
    pub const NOALIAS: u32 = 1 << 1;
    pub const ANYTYPE: u32 = 1 << 2;
    pub const VARARGS: u32 = 1 << 3;
    pub const HAS_NAME: u32 = 1 << 4;
}

pub mod ptr_flags {
    pub const SIZE_MASK: u32 = 0b11;
    pub const CONST: u32 = 1 << 2;
    pub const VOLATILE: u32 = 1 << 3;
    pub const ALLOWZERO: u32 = 1 << 4;
}

pub mod proto_flags {
    pub const INFERRED_ERROR: u32 = 1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PtrSize {
    One,
    Many,
    Slice,
    C,
}

impl PtrSize {
    pub(crate) const fn to_bits(self) -> u32 {
        match self {
            Self::One => 0,
            Self::Many => 1,
            Self::Slice => 2,
            Self::C => 3,
        }
    }

    const fn from_bits(bits: u32) -> Self {
        match bits & ptr_flags::SIZE_MASK {
            0 => Self::One,
            1 => Self::Many,
            2 => Self::Slice,
            _ => Self::C,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PtrTypeData {
    pub size: PtrSize,
    pub sentinel: Option<NodeIndex>,
    pub align: Option<NodeIndex>,
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_allowzero: bool,
    pub child: NodeIndex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IfData {
    pub condition: NodeIndex,
    pub then_expr: NodeIndex,
    pub else_expr: Option<NodeIndex>,
    /// First token between the `|` of the payload capture.
    pub payload_token: Option<TokenIndex>,
    pub error_token: Option<TokenIndex>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WhileData {
    pub condition: NodeIndex,
    pub body: NodeIndex,
    pub else_expr: Option<NodeIndex>,
    pub cont_expr: Option<NodeIndex>,
    pub payload_token: Option<TokenIndex>,
    pub error_token: Option<TokenIndex>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForData {
    pub inputs: SubRange,
    pub body: NodeIndex,
    pub else_expr: Option<NodeIndex>,
    pub payload_token: Option<TokenIndex>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FnProtoData {
    pub name_token: Option<TokenIndex>,
    pub params: SubRange,
    pub return_type: Option<NodeIndex>,
    pub inferred_error: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamData {
    pub name_token: Option<TokenIndex>,
    pub type_expr: Option<NodeIndex>,
    pub is_comptime: bool,
    pub is_noalias: bool,
    pub is_anytype: bool,
    pub is_varargs: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerData {
    pub keyword: TokenType,
    pub arg: Option<NodeIndex>,
    /// `union(enum)` without an explicit tag type.
    pub auto_enum_tag: bool,
    pub members: SubRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceData {
    pub sliced: NodeIndex,
    pub start: NodeIndex,
    pub end: Option<NodeIndex>,
    pub sentinel: Option<NodeIndex>,
}

/// One name bound by a `|a, *b|` capture list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capture {
    pub token: TokenIndex,
    pub by_ref: bool,
}

/// Return value of a [`Ast::visit`] callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitResult {
    /// Stop the whole walk.
    Break,
    /// Skip the children of the current node.
    Continue,
    /// Descend into the children of the current node.
    Recurse,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AstError {
    pub severity: Severity,
    pub range: Range,
    pub span: SimpleSpan<usize>,
    pub message: String,
}

/// Parser output for one document. Immutable once built, so it can be shared
/// between threads.
#[derive(Debug)]
pub struct Ast {
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) tokens: Vec<Token>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) spans: Vec<NodeSpan>,
    pub(crate) extra_data: Vec<u32>,
    pub(crate) errors: Vec<AstError>,
    pub(crate) line_index: LineIndex,
}

const fn opt_node(raw: u32) -> Option<NodeIndex> {
    if raw == 0 {
        None
    } else {
        Some(NodeIndex(raw))
    }
}

const fn opt_token(raw: u32) -> Option<TokenIndex> {
    if raw == INVALID_TOKEN {
        None
    } else {
        Some(raw)
    }
}

impl Ast {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub const fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn error_count(&self) -> u32 {
        self.errors.len() as u32
    }

    pub fn error_at(&self, index: u32) -> Option<&AstError> {
        self.errors.get(index as usize)
    }

    pub fn errors(&self) -> &[AstError] {
        &self.errors
    }

    fn node(&self, n: NodeIndex) -> &Node {
        &self.nodes[n.index()]
    }

    fn extra(&self, i: u32) -> u32 {
        self.extra_data[i as usize]
    }

    fn extra_range(&self, i: u32) -> SubRange {
        SubRange {
            start: self.extra(i),
            end: self.extra(i + 1),
        }
    }

    pub fn tag(&self, n: NodeIndex) -> NodeTag {
        self.node(n).tag
    }

    pub fn main_token(&self, n: NodeIndex) -> TokenIndex {
        self.node(n).main_token
    }

    pub fn data(&self, n: NodeIndex) -> NodeData {
        self.node(n).data
    }

    pub fn kind(&self, n: NodeIndex) -> NodeKind {
        match self.tag(n) {
            NodeTag::Root => NodeKind::Module,
            NodeTag::ContainerDecl
            | NodeTag::ContainerDeclArg
            | NodeTag::TaggedUnion
            | NodeTag::TaggedUnionEnumTag => match self.token_tag(self.main_token(n)) {
                TokenType::KeywordEnum => NodeKind::EnumDecl,
                TokenType::KeywordUnion => NodeKind::UnionDecl,
                _ => NodeKind::ContainerDecl,
            },
            NodeTag::ContainerField => NodeKind::FieldDecl,
            NodeTag::FnDecl => NodeKind::FunctionDecl,
            NodeTag::FnProto => NodeKind::FnProto,
            NodeTag::Param => NodeKind::ParamDecl,
            NodeTag::VarDecl => NodeKind::VarDecl,
            NodeTag::Block => NodeKind::BlockDecl,
            NodeTag::ErrorSetDecl => NodeKind::ErrorDecl,
            NodeTag::TestDecl => NodeKind::TestDecl,
            NodeTag::Call | NodeTag::CallOne | NodeTag::BuiltinCall => NodeKind::Call,
            NodeTag::If => NodeKind::If,
            NodeTag::For => NodeKind::For,
            NodeTag::While => NodeKind::While,
            NodeTag::Switch => NodeKind::Switch,
            NodeTag::Defer | NodeTag::Errdefer => NodeKind::Defer,
            NodeTag::Catch => NodeKind::Catch,
            NodeTag::Usingnamespace => NodeKind::Usingnamespace,
            _ => NodeKind::Unknown,
        }
    }

    // ---- tokens ----

    pub fn token_tag(&self, tok: TokenIndex) -> TokenType {
        self.tokens
            .get(tok as usize)
            .map_or(TokenType::Eof, |t| t.tag)
    }

    pub fn token_slice(&self, tok: TokenIndex) -> &str {
        self.tokens
            .get(tok as usize)
            .map_or("", |t| &self.source[t.start as usize..t.end as usize])
    }

    pub fn token_span(&self, tok: TokenIndex) -> SimpleSpan<usize> {
        self.tokens.get(tok as usize).map_or_else(
            || SimpleSpan::from(self.source.len()..self.source.len()),
            |t| SimpleSpan::from(t.start as usize..t.end as usize),
        )
    }

    pub fn token_range(&self, tok: TokenIndex) -> Range {
        let span = self.token_span(tok);
        self.line_index.range(span.start, span.end)
    }

    /// Index of the token containing or immediately preceding `position`.
    pub fn token_at_position(&self, position: Position) -> Option<TokenIndex> {
        let offset = self.line_index.offset(position)? as u32;
        let idx = self.tokens.partition_point(|t| t.start <= offset);
        idx.checked_sub(1).map(|i| i as TokenIndex)
    }

    /// Identifier text of a token; `@"name"` yields `name`.
    pub fn identifier_text(&self, tok: TokenIndex) -> &str {
        let raw = self.token_slice(tok);
        raw.strip_prefix("@\"")
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(raw)
    }

    // ---- ranges ----

    pub fn node_span(&self, n: NodeIndex) -> SimpleSpan<usize> {
        let span = self.spans[n.index()];
        let start = self.token_span(span.first).start;
        let end = self.token_span(span.last).end.max(start);
        SimpleSpan::from(start..end)
    }

    pub fn node_range(&self, n: NodeIndex) -> Range {
        let span = self.node_span(n);
        self.line_index.range(span.start, span.end)
    }

    pub fn first_token(&self, n: NodeIndex) -> TokenIndex {
        self.spans[n.index()].first
    }

    pub fn last_token(&self, n: NodeIndex) -> TokenIndex {
        self.spans[n.index()].last
    }

    // ---- names ----

    /// Name introduced or referenced by `n`, or `""`.
    pub fn spelling_name(&self, n: NodeIndex) -> &str {
        let node = self.node(n);
        match node.tag {
            NodeTag::VarDecl => self.identifier_text(node.main_token + 1),
            NodeTag::FnDecl => self.spelling_name(NodeIndex(node.data.lhs)),
            NodeTag::FnProto => self
                .fn_proto_data(n)
                .and_then(|d| d.name_token)
                .map_or("", |t| self.identifier_text(t)),
            NodeTag::Param => self
                .param_data(n)
                .name_token
                .map_or("", |t| self.identifier_text(t)),
            NodeTag::ContainerField
            | NodeTag::Identifier
            | NodeTag::EnumLiteral
            | NodeTag::FieldInitializer => self.identifier_text(node.main_token),
            NodeTag::FieldAccess | NodeTag::ErrorValue => self.identifier_text(node.data.rhs),
            NodeTag::BuiltinCall => self.token_slice(node.main_token),
            NodeTag::TestDecl => match opt_token(node.data.lhs) {
                Some(tok) if self.token_tag(tok) == TokenType::StringLiteral => {
                    let raw = self.token_slice(tok);
                    raw.get(1..raw.len().saturating_sub(1)).unwrap_or("")
                }
                Some(tok) => self.identifier_text(tok),
                None => "",
            },
            NodeTag::Block | NodeTag::While | NodeTag::For => self
                .block_label(n)
                .map_or("", |t| self.identifier_text(t)),
            _ => "",
        }
    }

    /// Token of the name introduced by a declaration node.
    pub fn name_token(&self, n: NodeIndex) -> Option<TokenIndex> {
        let node = self.node(n);
        match node.tag {
            NodeTag::VarDecl => Some(node.main_token + 1),
            NodeTag::FnDecl => self.name_token(NodeIndex(node.data.lhs)),
            NodeTag::FnProto => self.fn_proto_data(n).and_then(|d| d.name_token),
            NodeTag::Param => self.param_data(n).name_token,
            NodeTag::ContainerField | NodeTag::FieldInitializer | NodeTag::EnumLiteral => {
                Some(node.main_token)
            }
            NodeTag::FieldAccess | NodeTag::ErrorValue => Some(node.data.rhs),
            NodeTag::TestDecl => opt_token(node.data.lhs),
            NodeTag::Identifier => Some(node.main_token),
            _ => None,
        }
        .filter(|&t| {
            matches!(
                self.token_tag(t),
                TokenType::Identifier | TokenType::StringLiteral
            )
        })
    }

    /// `///` comment lines directly above the node, joined by newlines.
    pub fn doc_comment(&self, n: NodeIndex) -> Option<String> {
        let first = self.first_token(n) as usize;
        let lines: Vec<&str> = self.tokens[..first.min(self.tokens.len())]
            .iter()
            .rev()
            .take_while(|t| t.tag == TokenType::DocComment)
            .map(|t| self.source[t.start as usize + 3..t.end as usize].trim())
            .collect();
        if lines.is_empty() {
            return None;
        }
        Some(lines.into_iter().rev().collect::<Vec<_>>().join("\n"))
    }

    /// All `//!` lines of the document.
    pub fn container_doc_comment(&self) -> Option<String> {
        let lines: Vec<&str> = self
            .tokens
            .iter()
            .filter(|t| t.tag == TokenType::ContainerDocComment)
            .map(|t| self.source[t.start as usize + 3..t.end as usize].trim())
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    /// Label of a labeled block or loop (`name: { ... }`).
    pub fn block_label(&self, n: NodeIndex) -> Option<TokenIndex> {
        let main = self.main_token(n);
        if main < 2 {
            return None;
        }
        (self.token_tag(main - 1) == TokenType::Colon
            && self.token_tag(main - 2) == TokenType::Identifier)
            .then_some(main - 2)
    }

    /// Label of `break :label` / `continue :label`.
    pub fn break_label(&self, n: NodeIndex) -> Option<TokenIndex> {
        match self.tag(n) {
            NodeTag::Break | NodeTag::Continue => opt_token(self.data(n).lhs),
            _ => None,
        }
    }

    // ---- variable-arity accessors ----

    pub fn sub_range(&self, n: NodeIndex) -> SubRange {
        let node = self.node(n);
        match node.tag {
            NodeTag::Root
            | NodeTag::Block
            | NodeTag::ContainerDecl
            | NodeTag::TaggedUnion
            | NodeTag::BuiltinCall => SubRange {
                start: node.data.lhs,
                end: node.data.rhs,
            },
            NodeTag::ContainerDeclArg
            | NodeTag::TaggedUnionEnumTag
            | NodeTag::Switch
            | NodeTag::Call
            | NodeTag::StructInit
            | NodeTag::ArrayInit => self.extra_range(node.data.rhs),
            NodeTag::FnProto | NodeTag::SwitchCase | NodeTag::For => {
                self.extra_range(node.data.lhs)
            }
            _ => SubRange::default(),
        }
    }

    pub fn extra_data_as_node(&self, i: u32) -> NodeIndex {
        NodeIndex(self.extra(i))
    }

    fn range_at(&self, range: SubRange, i: u32) -> Option<NodeIndex> {
        (i < range.len()).then(|| self.extra_data_as_node(range.start + i))
    }

    fn range_nodes(&self, range: SubRange) -> impl Iterator<Item = NodeIndex> + '_ {
        (range.start..range.end).map(|i| self.extra_data_as_node(i))
    }

    /// Members of the root, a container, or the statements of a block.
    pub fn members(&self, n: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        let range = match self.tag(n) {
            NodeTag::Root
            | NodeTag::Block
            | NodeTag::ContainerDecl
            | NodeTag::TaggedUnion
            | NodeTag::ContainerDeclArg
            | NodeTag::TaggedUnionEnumTag => self.sub_range(n),
            _ => SubRange::default(),
        };
        self.range_nodes(range)
    }

    pub fn fn_proto(&self, n: NodeIndex) -> Option<NodeIndex> {
        match self.tag(n) {
            NodeTag::FnDecl => Some(NodeIndex(self.data(n).lhs)),
            NodeTag::FnProto => Some(n),
            _ => None,
        }
    }

    pub fn fn_body(&self, n: NodeIndex) -> Option<NodeIndex> {
        (self.tag(n) == NodeTag::FnDecl).then(|| NodeIndex(self.data(n).rhs))
    }

    pub fn fn_proto_data(&self, n: NodeIndex) -> Option<FnProtoData> {
        let proto = self.fn_proto(n)?;
        let node = self.node(proto);
        let name = node.main_token + 1;
        Some(FnProtoData {
            name_token: (self.token_tag(name) == TokenType::Identifier).then_some(name),
            params: self.extra_range(node.data.lhs),
            return_type: opt_node(node.data.rhs),
            inferred_error: self.extra(node.data.lhs + 2) & proto_flags::INFERRED_ERROR != 0,
        })
    }

    pub fn fn_param_count(&self, n: NodeIndex) -> u32 {
        self.fn_proto_data(n).map_or(0, |d| d.params.len())
    }

    pub fn fn_param_at(&self, n: NodeIndex, i: u32) -> Option<NodeIndex> {
        self.fn_proto_data(n)
            .and_then(|d| self.range_at(d.params, i))
    }

    pub fn param_data(&self, param: NodeIndex) -> ParamData {
        let node = self.node(param);
        let flags = node.data.rhs;
        ParamData {
            name_token: (flags & param_flags::HAS_NAME != 0).then_some(node.main_token),
            type_expr: opt_node(node.data.lhs),
            is_comptime: flags & param_flags::COMPTIME != 0,
            is_noalias: flags & param_flags::NOALIAS != 0,
            is_anytype: flags & param_flags::ANYTYPE != 0,
            is_varargs: flags & param_flags::VARARGS != 0,
        }
    }

    pub fn call_param_count(&self, n: NodeIndex) -> u32 {
        match self.tag(n) {
            NodeTag::CallOne => u32::from(self.data(n).rhs != 0),
            NodeTag::Call | NodeTag::BuiltinCall => self.sub_range(n).len(),
            _ => 0,
        }
    }

    pub fn call_param_at(&self, n: NodeIndex, i: u32) -> Option<NodeIndex> {
        match self.tag(n) {
            NodeTag::CallOne if i == 0 => opt_node(self.data(n).rhs),
            NodeTag::Call | NodeTag::BuiltinCall => self.range_at(self.sub_range(n), i),
            _ => None,
        }
    }

    /// Callee expression of a `Call`/`CallOne`.
    pub fn callee(&self, n: NodeIndex) -> Option<NodeIndex> {
        matches!(self.tag(n), NodeTag::Call | NodeTag::CallOne).then(|| NodeIndex(self.data(n).lhs))
    }

    pub fn struct_init_count(&self, n: NodeIndex) -> u32 {
        match self.tag(n) {
            NodeTag::StructInit | NodeTag::ArrayInit => self.sub_range(n).len(),
            _ => 0,
        }
    }

    pub fn struct_init_at(&self, n: NodeIndex, i: u32) -> Option<NodeIndex> {
        match self.tag(n) {
            NodeTag::StructInit | NodeTag::ArrayInit => self.range_at(self.sub_range(n), i),
            _ => None,
        }
    }

    /// Type expression in front of an initializer list; `None` for `.{ ... }`.
    pub fn init_type(&self, n: NodeIndex) -> Option<NodeIndex> {
        match self.tag(n) {
            NodeTag::StructInit | NodeTag::ArrayInit => opt_node(self.data(n).lhs),
            _ => None,
        }
    }

    pub fn switch_case_count(&self, n: NodeIndex) -> u32 {
        if self.tag(n) == NodeTag::Switch {
            self.sub_range(n).len()
        } else {
            0
        }
    }

    pub fn switch_case_at(&self, n: NodeIndex, i: u32) -> Option<NodeIndex> {
        if self.tag(n) == NodeTag::Switch {
            self.range_at(self.sub_range(n), i)
        } else {
            None
        }
    }

    pub fn switch_case_item_count(&self, case: NodeIndex) -> u32 {
        if self.tag(case) == NodeTag::SwitchCase {
            self.sub_range(case).len()
        } else {
            0
        }
    }

    pub fn switch_case_item_at(&self, case: NodeIndex, i: u32) -> Option<NodeIndex> {
        if self.tag(case) == NodeTag::SwitchCase {
            self.range_at(self.sub_range(case), i)
        } else {
            None
        }
    }

    /// Payload token of `=> |x|`, `catch |e|`, or `errdefer |e|`.
    pub fn payload_token(&self, n: NodeIndex) -> Option<TokenIndex> {
        let node = self.node(n);
        match node.tag {
            NodeTag::SwitchCase | NodeTag::Catch => {
                (self.token_tag(node.main_token + 1) == TokenType::Pipe)
                    .then_some(node.main_token + 2)
            }
            NodeTag::Errdefer => opt_token(node.data.lhs),
            NodeTag::If => self.if_data(n).and_then(|d| d.payload_token),
            NodeTag::While => self.while_data(n).and_then(|d| d.payload_token),
            NodeTag::For => opt_token(node.data.rhs),
            _ => None,
        }
    }

    pub fn for_input_count(&self, n: NodeIndex) -> u32 {
        self.for_data(n).map_or(0, |d| d.inputs.len())
    }

    pub fn for_input_at(&self, n: NodeIndex, i: u32) -> Option<NodeIndex> {
        self.for_data(n).and_then(|d| self.range_at(d.inputs, i))
    }

    pub fn if_data(&self, n: NodeIndex) -> Option<IfData> {
        let node = self.node(n);
        (node.tag == NodeTag::If).then(|| IfData {
            condition: NodeIndex(node.data.lhs),
            then_expr: NodeIndex(self.extra(node.data.rhs)),
            else_expr: opt_node(self.extra(node.data.rhs + 1)),
            payload_token: opt_token(self.extra(node.data.rhs + 2)),
            error_token: opt_token(self.extra(node.data.rhs + 3)),
        })
    }

    pub fn while_data(&self, n: NodeIndex) -> Option<WhileData> {
        let node = self.node(n);
        (node.tag == NodeTag::While).then(|| WhileData {
            condition: NodeIndex(node.data.lhs),
            body: NodeIndex(self.extra(node.data.rhs)),
            else_expr: opt_node(self.extra(node.data.rhs + 1)),
            cont_expr: opt_node(self.extra(node.data.rhs + 2)),
            payload_token: opt_token(self.extra(node.data.rhs + 3)),
            error_token: opt_token(self.extra(node.data.rhs + 4)),
        })
    }

    pub fn for_data(&self, n: NodeIndex) -> Option<ForData> {
        let node = self.node(n);
        (node.tag == NodeTag::For).then(|| ForData {
            inputs: self.extra_range(node.data.lhs),
            body: NodeIndex(self.extra(node.data.lhs + 2)),
            else_expr: opt_node(self.extra(node.data.lhs + 3)),
            payload_token: opt_token(node.data.rhs),
        })
    }

    pub fn ptr_type_data(&self, n: NodeIndex) -> Option<PtrTypeData> {
        let node = self.node(n);
        (node.tag == NodeTag::PtrType).then(|| {
            let flags = self.extra(node.data.lhs + 2);
            PtrTypeData {
                size: PtrSize::from_bits(flags),
                sentinel: opt_node(self.extra(node.data.lhs)),
                align: opt_node(self.extra(node.data.lhs + 1)),
                is_const: flags & ptr_flags::CONST != 0,
                is_volatile: flags & ptr_flags::VOLATILE != 0,
                is_allowzero: flags & ptr_flags::ALLOWZERO != 0,
                child: NodeIndex(node.data.rhs),
            }
        })
    }

    /// Length, sentinel and element of `[N]T` / `[N:s]T`.
    pub fn array_type_data(&self, n: NodeIndex) -> Option<(NodeIndex, Option<NodeIndex>, NodeIndex)> {
        let node = self.node(n);
        match node.tag {
            NodeTag::ArrayType => Some((NodeIndex(node.data.lhs), None, NodeIndex(node.data.rhs))),
            NodeTag::ArrayTypeSentinel => Some((
                NodeIndex(node.data.lhs),
                opt_node(self.extra(node.data.rhs)),
                NodeIndex(self.extra(node.data.rhs + 1)),
            )),
            _ => None,
        }
    }

    pub fn array_type_sentinel(&self, n: NodeIndex) -> Option<NodeIndex> {
        self.array_type_data(n).and_then(|(_, sentinel, _)| sentinel)
    }

    pub fn slice_data(&self, n: NodeIndex) -> Option<SliceData> {
        let node = self.node(n);
        match node.tag {
            NodeTag::SliceOpen => Some(SliceData {
                sliced: NodeIndex(node.data.lhs),
                start: NodeIndex(node.data.rhs),
                end: None,
                sentinel: None,
            }),
            NodeTag::Slice => Some(SliceData {
                sliced: NodeIndex(node.data.lhs),
                start: NodeIndex(self.extra(node.data.rhs)),
                end: opt_node(self.extra(node.data.rhs + 1)),
                sentinel: opt_node(self.extra(node.data.rhs + 2)),
            }),
            _ => None,
        }
    }

    pub fn container_data(&self, n: NodeIndex) -> Option<ContainerData> {
        let node = self.node(n);
        let keyword = self.token_tag(node.main_token);
        match node.tag {
            NodeTag::ContainerDecl => Some(ContainerData {
                keyword,
                arg: None,
                auto_enum_tag: false,
                members: self.sub_range(n),
            }),
            NodeTag::TaggedUnion => Some(ContainerData {
                keyword,
                arg: None,
                auto_enum_tag: true,
                members: self.sub_range(n),
            }),
            NodeTag::ContainerDeclArg => Some(ContainerData {
                keyword,
                arg: opt_node(node.data.lhs),
                auto_enum_tag: false,
                members: self.sub_range(n),
            }),
            NodeTag::TaggedUnionEnumTag => Some(ContainerData {
                keyword,
                arg: opt_node(node.data.lhs),
                auto_enum_tag: true,
                members: self.sub_range(n),
            }),
            _ => None,
        }
    }

    /// Member name tokens of `error{A, B}`.
    pub fn error_set_members(&self, n: NodeIndex) -> Vec<TokenIndex> {
        if self.tag(n) != NodeTag::ErrorSetDecl {
            return Vec::new();
        }
        let data = self.data(n);
        (data.lhs + 1..data.rhs)
            .filter(|&t| self.token_tag(t) == TokenType::Identifier)
            .collect()
    }

    /// Names bound by the capture list starting at `first`.
    pub fn captures(&self, first: TokenIndex) -> SmallVec<[Capture; 2]> {
        let mut out = SmallVec::new();
        let mut tok = first;
        loop {
            let by_ref = self.token_tag(tok) == TokenType::Asterisk;
            if by_ref {
                tok += 1;
            }
            if self.token_tag(tok) != TokenType::Identifier {
                break;
            }
            out.push(Capture { token: tok, by_ref });
            if self.token_tag(tok + 1) != TokenType::Comma {
                break;
            }
            tok += 2;
        }
        out
    }

    /// Decoded contents of a string, character, or multiline string literal.
    pub fn string_value(&self, n: NodeIndex) -> Option<String> {
        let node = self.node(n);
        match node.tag {
            NodeTag::StringLiteral | NodeTag::CharLiteral => {
                let raw = self.token_slice(node.main_token);
                raw.get(1..raw.len().saturating_sub(1)).map(unescape)
            }
            NodeTag::MultilineStringLiteral => Some(
                (node.data.lhs..=node.data.rhs)
                    .map(|t| &self.token_slice(t)[2..])
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }

    // ---- traversal ----

    /// Direct children of `n`, in source order.
    pub fn children(&self, n: NodeIndex) -> SmallVec<[NodeIndex; 4]> {
        let mut out = SmallVec::new();
        let node = *self.node(n);
        let (lhs, rhs) = (node.data.lhs, node.data.rhs);
        let mut push = |raw: u32| {
            if let Some(child) = opt_node(raw) {
                out.push(child);
            }
        };
        match node.tag {
            NodeTag::Root
            | NodeTag::Block
            | NodeTag::ContainerDecl
            | NodeTag::TaggedUnion
            | NodeTag::BuiltinCall => {
                (lhs..rhs).for_each(|i| push(self.extra(i)));
            }
            NodeTag::ContainerDeclArg | NodeTag::TaggedUnionEnumTag => {
                push(lhs);
                let r = self.extra_range(rhs);
                (r.start..r.end).for_each(|i| push(self.extra(i)));
            }
            NodeTag::VarDecl
            | NodeTag::FnDecl
            | NodeTag::ContainerField
            | NodeTag::ArrayType
            | NodeTag::ErrorUnion
            | NodeTag::ArrayAccess
            | NodeTag::SliceOpen
            | NodeTag::ForRange
            | NodeTag::SwitchRange
            | NodeTag::CallOne
            | NodeTag::Assign
            | NodeTag::AssignOp => {
                push(lhs);
                push(rhs);
            }
            tag if is_binary(tag) => {
                push(lhs);
                push(rhs);
            }
            NodeTag::FnProto => {
                let r = self.extra_range(lhs);
                (r.start..r.end).for_each(|i| push(self.extra(i)));
                push(rhs);
            }
            NodeTag::Param
            | NodeTag::Usingnamespace
            | NodeTag::Comptime
            | NodeTag::BoolNot
            | NodeTag::Negation
            | NodeTag::BitNot
            | NodeTag::NegationWrap
            | NodeTag::AddressOf
            | NodeTag::Try
            | NodeTag::OptionalType
            | NodeTag::FieldAccess
            | NodeTag::Deref
            | NodeTag::UnwrapOptional
            | NodeTag::FieldInitializer
            | NodeTag::GroupedExpression
            | NodeTag::Return => push(lhs),
            NodeTag::TestDecl | NodeTag::Defer | NodeTag::Errdefer | NodeTag::Break => push(rhs),
            NodeTag::PtrType => {
                push(self.extra(lhs));
                push(self.extra(lhs + 1));
                push(rhs);
            }
            NodeTag::ArrayTypeSentinel => {
                push(lhs);
                push(self.extra(rhs));
                push(self.extra(rhs + 1));
            }
            NodeTag::Slice => {
                push(lhs);
                (0..3).for_each(|i| push(self.extra(rhs + i)));
            }
            NodeTag::Call => {
                push(lhs);
                let r = self.extra_range(rhs);
                (r.start..r.end).for_each(|i| push(self.extra(i)));
            }
            NodeTag::StructInit | NodeTag::ArrayInit => {
                push(lhs);
                let r = self.extra_range(rhs);
                (r.start..r.end).for_each(|i| push(self.extra(i)));
            }
            NodeTag::If => {
                push(lhs);
                push(self.extra(rhs));
                push(self.extra(rhs + 1));
            }
            NodeTag::While => {
                push(lhs);
                push(self.extra(rhs + 2));
                push(self.extra(rhs));
                push(self.extra(rhs + 1));
            }
            NodeTag::For => {
                let r = self.extra_range(lhs);
                (r.start..r.end).for_each(|i| push(self.extra(i)));
                push(self.extra(lhs + 2));
                push(self.extra(lhs + 3));
            }
            NodeTag::Switch => {
                push(lhs);
                let r = self.extra_range(rhs);
                (r.start..r.end).for_each(|i| push(self.extra(i)));
            }
            NodeTag::SwitchCase => {
                let r = self.extra_range(lhs);
                (r.start..r.end).for_each(|i| push(self.extra(i)));
                push(rhs);
            }
            _ => {}
        }
        out
    }

    /// Walks the children of `n`. The callback receives `(child, parent)` and
    /// decides whether to descend. Returns `false` if the walk was broken off.
    pub fn visit<F>(&self, n: NodeIndex, callback: &mut F) -> bool
    where
        F: FnMut(NodeIndex, NodeIndex) -> VisitResult,
    {
        for child in self.children(n) {
            match callback(child, n) {
                VisitResult::Break => return false,
                VisitResult::Continue => {}
                VisitResult::Recurse => {
                    if !self.visit(child, callback) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Indented tag tree, used by the CLI and tests.
    pub fn dump(&self, n: NodeIndex) -> String {
        let mut out = String::new();
        self.dump_into(n, 0, &mut out);
        out
    }

    fn dump_into(&self, n: NodeIndex, depth: usize, out: &mut String) {
        use std::fmt::Write;
        let name = self.spelling_name(n);
        let _ = write!(out, "{}{:?}", "  ".repeat(depth), self.tag(n));
        if !name.is_empty() {
            let _ = write!(out, " '{name}'");
        } else if matches!(
            self.tag(n),
            NodeTag::NumberLiteral | NodeTag::StringLiteral | NodeTag::CharLiteral
        ) {
            let _ = write!(out, " {}", self.token_slice(self.main_token(n)));
        }
        out.push('\n');
        for child in self.children(n) {
            self.dump_into(child, depth + 1, out);
        }
    }
}

const fn is_binary(tag: NodeTag) -> bool {
    tag.is_arithmetic()
        || tag.is_comparison()
        || matches!(
            tag,
            NodeTag::BoolAnd
                | NodeTag::BoolOr
                | NodeTag::ArrayCat
                | NodeTag::ArrayMult
                | NodeTag::MergeErrorSets
                | NodeTag::Orelse
                | NodeTag::Catch
        )
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(c) = u8::from_str_radix(&hex, 16).ok().map(char::from) {
                    out.push(c);
                }
            }
            Some('u') => {
                let code: String = chars
                    .by_ref()
                    .skip_while(|&c| c == '{')
                    .take_while(|&c| c != '}')
                    .collect();
                if let Some(c) = u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
