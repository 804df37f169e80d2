//! # Recursive-Descent Parser
//!
//! Builds the flat [`Ast`] from the token stream. Doc comment tokens stay in the
//! token array (so declarations can find their comments) but are invisible to the
//! grammar: the parser walks a list of "significant" token indices.
//!
//! Binary operators are parsed by precedence climbing with the usual table:
//!
//! | Precedence | Operators |
//! |-----------:|-----------|
//! | 10 | `or` |
//! | 20 | `and` |
//! | 30 | `== != < > <= >=` |
//! | 40 | `& ^ \| orelse catch` |
//! | 50 | `<< >> <<\|` |
//! | 60 | `+ - ++ +% -% +\| -\|` |
//! | 70 | `\|\| * / % ** *% *\|` |
//!
//! Errors are recorded and the parser recovers at the next statement or member
//! boundary, so a tree is always produced.

use chumsky::span::SimpleSpan;
use tracing::trace_span;
use ziglens_compiler_diagnostics::Severity;

use crate::ast::{
    param_flags, proto_flags, ptr_flags, Ast, AstError, Node, NodeData, NodeIndex, NodeSpan,
    NodeTag, PtrSize, TokenIndex, INVALID_TOKEN,
};
use crate::lexer::{lex, Token, TokenType};
use crate::line_index::LineIndex;

const MAX_DEPTH: u32 = 96;

#[derive(Debug)]
struct ParseFailure;

type PResult<T> = Result<T, ParseFailure>;

struct RawError {
    token: TokenIndex,
    message: String,
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    /// Indices of non-comment tokens; always ends with the EOF token.
    significant: Vec<TokenIndex>,
    pos: usize,
    depth: u32,
    nodes: Vec<Node>,
    spans: Vec<NodeSpan>,
    extra: Vec<u32>,
    errors: Vec<RawError>,
}

/// Parses `source` into a flat syntax tree. Never fails: syntax errors are attached
/// to the returned tree.
pub fn parse(name: &str, source: &str) -> Ast {
    let _span = trace_span!("parse_ast", name).entered();
    let (tokens, lex_errors) = lex(source);
    let mut parser = Parser::new(source, &tokens);

    parser.nodes.push(Node {
        tag: NodeTag::Root,
        main_token: 0,
        data: NodeData { lhs: 0, rhs: 0 },
    });
    parser.spans.push(NodeSpan { first: 0, last: 0 });
    let members = parser.parse_container_members(true);
    let (start, end) = parser.push_list(&members);
    parser.nodes[0].data = NodeData { lhs: start, rhs: end };
    parser.spans[0] = NodeSpan {
        first: 0,
        last: tokens.len().saturating_sub(1) as TokenIndex,
    };

    let line_index = LineIndex::new(source);
    let mut errors: Vec<AstError> = lex_errors
        .iter()
        .map(|e| AstError {
            severity: Severity::Error,
            range: line_index.range(e.start as usize, e.end as usize),
            span: SimpleSpan::from(e.start as usize..e.end as usize),
            message: e.to_string(),
        })
        .collect();
    errors.extend(parser.errors.iter().map(|e| {
        let token = tokens[e.token as usize];
        AstError {
            severity: Severity::Error,
            range: line_index.range(token.start as usize, token.end as usize),
            span: SimpleSpan::from(token.start as usize..token.end as usize),
            message: e.message.clone(),
        }
    }));

    let Parser {
        nodes, spans, extra, ..
    } = parser;
    Ast {
        name: name.to_string(),
        source: source.to_string(),
        tokens,
        nodes,
        spans,
        extra_data: extra,
        errors,
        line_index,
    }
}

fn binary_info(tag: TokenType) -> Option<(u8, NodeTag)> {
    use TokenType as T;
    Some(match tag {
        T::KeywordOr => (10, NodeTag::BoolOr),
        T::KeywordAnd => (20, NodeTag::BoolAnd),
        T::EqualEqual => (30, NodeTag::EqualEqual),
        T::BangEqual => (30, NodeTag::BangEqual),
        T::AngleBracketLeft => (30, NodeTag::LessThan),
        T::AngleBracketRight => (30, NodeTag::GreaterThan),
        T::AngleBracketLeftEqual => (30, NodeTag::LessOrEqual),
        T::AngleBracketRightEqual => (30, NodeTag::GreaterOrEqual),
        T::Ampersand => (40, NodeTag::BitAnd),
        T::Caret => (40, NodeTag::BitXor),
        T::Pipe => (40, NodeTag::BitOr),
        T::KeywordOrelse => (40, NodeTag::Orelse),
        T::KeywordCatch => (40, NodeTag::Catch),
        T::AngleBracketAngleBracketLeft => (50, NodeTag::Shl),
        T::AngleBracketAngleBracketLeftPipe => (50, NodeTag::ShlSat),
        T::AngleBracketAngleBracketRight => (50, NodeTag::Shr),
        T::Plus => (60, NodeTag::Add),
        T::Minus => (60, NodeTag::Sub),
        T::PlusPlus => (60, NodeTag::ArrayCat),
        T::PlusPercent => (60, NodeTag::AddWrap),
        T::MinusPercent => (60, NodeTag::SubWrap),
        T::PlusPipe => (60, NodeTag::AddSat),
        T::MinusPipe => (60, NodeTag::SubSat),
        T::PipePipe => (70, NodeTag::MergeErrorSets),
        T::Asterisk => (70, NodeTag::Mul),
        T::Slash => (70, NodeTag::Div),
        T::Percent => (70, NodeTag::Mod),
        T::AsteriskAsterisk => (70, NodeTag::ArrayMult),
        T::AsteriskPercent => (70, NodeTag::MulWrap),
        T::AsteriskPipe => (70, NodeTag::MulSat),
        _ => return None,
    })
}

const fn is_assign_op(tag: TokenType) -> bool {
    use TokenType as T;
    matches!(
        tag,
        T::AsteriskEqual
            | T::AsteriskPercentEqual
            | T::AsteriskPipeEqual
            | T::SlashEqual
            | T::PercentEqual
            | T::PlusEqual
            | T::PlusPercentEqual
            | T::PlusPipeEqual
            | T::MinusEqual
            | T::MinusPercentEqual
            | T::MinusPipeEqual
            | T::AngleBracketAngleBracketLeftEqual
            | T::AngleBracketAngleBracketLeftPipeEqual
            | T::AngleBracketAngleBracketRightEqual
            | T::AmpersandEqual
            | T::CaretEqual
            | T::PipeEqual
    )
}

fn describe(tag: TokenType, text: &str) -> String {
    match tag {
        TokenType::Eof => "end of file".to_string(),
        _ => format!("'{text}'"),
    }
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        let significant = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.tag.is_doc_comment())
            .map(|(i, _)| i as TokenIndex)
            .collect();
        Self {
            source,
            tokens,
            significant,
            pos: 0,
            depth: 0,
            nodes: Vec::new(),
            spans: Vec::new(),
            extra: Vec::new(),
            errors: Vec::new(),
        }
    }

    // ---- token cursor ----

    fn tok(&self) -> TokenIndex {
        self.tok_at(0)
    }

    fn tok_at(&self, ahead: usize) -> TokenIndex {
        let i = (self.pos + ahead).min(self.significant.len() - 1);
        self.significant[i]
    }

    fn peek(&self) -> TokenType {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> TokenType {
        self.tokens[self.tok_at(ahead) as usize].tag
    }

    fn bump(&mut self) -> TokenIndex {
        let tok = self.tok();
        if self.pos + 1 < self.significant.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tag: TokenType) -> Option<TokenIndex> {
        (self.peek() == tag).then(|| self.bump())
    }

    fn expect(&mut self, tag: TokenType, what: &str) -> PResult<TokenIndex> {
        if self.peek() == tag {
            Ok(self.bump())
        } else {
            Err(self.fail(&format!("expected {what}")))
        }
    }

    fn fail(&mut self, expected: &str) -> ParseFailure {
        let token = self.tok();
        let t = self.tokens[token as usize];
        let found = describe(t.tag, &self.source[t.start as usize..t.end as usize]);
        // One error per token keeps recovery from flooding the output.
        if self.errors.last().map(|e| e.token) != Some(token) {
            self.errors.push(RawError {
                token,
                message: format!("{expected}, found {found}"),
            });
        }
        ParseFailure
    }

    /// Last consumed significant token.
    fn prev(&self) -> TokenIndex {
        self.significant[self.pos.saturating_sub(1)]
    }

    // ---- node construction ----

    fn add(&mut self, tag: NodeTag, main_token: TokenIndex, lhs: u32, rhs: u32, first: TokenIndex) -> NodeIndex {
        let index = NodeIndex(self.nodes.len() as u32);
        let last = self.prev().max(first);
        self.nodes.push(Node {
            tag,
            main_token,
            data: NodeData { lhs, rhs },
        });
        self.spans.push(NodeSpan { first, last });
        index
    }

    fn first_of(&self, n: NodeIndex) -> TokenIndex {
        self.spans[n.index()].first
    }

    fn push_list(&mut self, items: &[u32]) -> (u32, u32) {
        let start = self.extra.len() as u32;
        self.extra.extend_from_slice(items);
        (start, self.extra.len() as u32)
    }

    fn push_extra(&mut self, items: &[u32]) -> u32 {
        let start = self.extra.len() as u32;
        self.extra.extend_from_slice(items);
        start
    }

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.fail("nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ---- recovery ----

    /// Skips to the end of the current statement: past a `;` or up to a `}` at the
    /// same nesting level.
    fn recover_statement(&mut self, stop_at_comma: bool) {
        let mut depth = 0u32;
        loop {
            match self.peek() {
                TokenType::Eof => return,
                TokenType::LBrace | TokenType::LParen | TokenType::LBracket => depth += 1,
                TokenType::RBrace | TokenType::RParen | TokenType::RBracket => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenType::Semicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                TokenType::Comma if depth == 0 && stop_at_comma => {
                    self.bump();
                    return;
                }
                _ => {}
            }
            self.bump();
        }
    }

    // ---- containers ----

    fn parse_container_members(&mut self, top_level: bool) -> Vec<u32> {
        let mut members = Vec::new();
        loop {
            match self.peek() {
                TokenType::Eof => break,
                TokenType::RBrace if !top_level => break,
                TokenType::RBrace => {
                    let _ = self.fail("expected a declaration");
                    self.bump();
                    continue;
                }
                _ => {}
            }
            let start = self.pos;
            match self.parse_container_member() {
                Ok(Some(node)) => members.push(node.0),
                Ok(None) => {}
                Err(ParseFailure) => self.recover_statement(true),
            }
            if self.pos == start {
                self.bump();
            }
        }
        members
    }

    fn parse_container_member(&mut self) -> PResult<Option<NodeIndex>> {
        let first = self.tok();
        match self.peek() {
            TokenType::Semicolon => {
                self.bump();
                Ok(None)
            }
            TokenType::KeywordTest => self.parse_test_decl().map(Some),
            TokenType::KeywordComptime if self.peek_at(1) == TokenType::LBrace => {
                let main = self.bump();
                let block = self.parse_block()?;
                Ok(Some(self.add(NodeTag::Comptime, main, block.0, 0, first)))
            }
            TokenType::KeywordPub
            | TokenType::KeywordConst
            | TokenType::KeywordVar
            | TokenType::KeywordFn
            | TokenType::KeywordExport
            | TokenType::KeywordExtern
            | TokenType::KeywordInline
            | TokenType::KeywordNoinline
            | TokenType::KeywordThreadlocal
            | TokenType::KeywordUsingnamespace => self.parse_decl(first).map(Some),
            TokenType::Identifier | TokenType::KeywordComptime => {
                self.parse_container_field(first).map(Some)
            }
            _ => Err(self.fail("expected a declaration or field")),
        }
    }

    fn parse_decl(&mut self, first: TokenIndex) -> PResult<NodeIndex> {
        self.eat(TokenType::KeywordPub);
        loop {
            match self.peek() {
                TokenType::KeywordExport
                | TokenType::KeywordInline
                | TokenType::KeywordNoinline
                | TokenType::KeywordThreadlocal => {
                    self.bump();
                }
                TokenType::KeywordExtern => {
                    self.bump();
                    self.eat(TokenType::StringLiteral);
                }
                _ => break,
            }
        }
        match self.peek() {
            TokenType::KeywordUsingnamespace => {
                let main = self.bump();
                let expr = self.parse_expr()?;
                self.expect(TokenType::Semicolon, "';'")?;
                Ok(self.add(NodeTag::Usingnamespace, main, expr.0, 0, first))
            }
            TokenType::KeywordConst | TokenType::KeywordVar => {
                let decl = self.parse_var_decl(first)?;
                self.expect(TokenType::Semicolon, "';' after declaration")?;
                Ok(decl)
            }
            TokenType::KeywordFn => self.parse_fn_decl(first),
            _ => Err(self.fail("expected 'const', 'var' or 'fn'")),
        }
    }

    fn parse_var_decl(&mut self, first: TokenIndex) -> PResult<NodeIndex> {
        let main = self.bump();
        self.expect(TokenType::Identifier, "a name")?;
        let type_expr = match self.eat(TokenType::Colon) {
            Some(_) => self.parse_type_expr()?.0,
            None => 0,
        };
        self.skip_paren_modifiers()?;
        let init = match self.eat(TokenType::Equal) {
            Some(_) => self.parse_expr()?.0,
            None => 0,
        };
        Ok(self.add(NodeTag::VarDecl, main, type_expr, init, first))
    }

    /// Skips `align(..)`, `linksection(..)`, `addrspace(..)` and `callconv(..)`.
    fn skip_paren_modifiers(&mut self) -> PResult<()> {
        while matches!(
            self.peek(),
            TokenType::KeywordAlign
                | TokenType::KeywordLinksection
                | TokenType::KeywordAddrspace
                | TokenType::KeywordCallconv
        ) {
            self.bump();
            self.expect(TokenType::LParen, "'('")?;
            self.parse_expr()?;
            self.expect(TokenType::RParen, "')'")?;
        }
        Ok(())
    }

    fn parse_fn_decl(&mut self, first: TokenIndex) -> PResult<NodeIndex> {
        let proto = self.parse_fn_proto()?;
        let main = self.nodes[proto.index()].main_token;
        if self.peek() == TokenType::LBrace {
            let body = self.parse_block()?;
            Ok(self.add(NodeTag::FnDecl, main, proto.0, body.0, first))
        } else {
            self.expect(TokenType::Semicolon, "function body or ';'")?;
            Ok(proto)
        }
    }

    fn parse_fn_proto(&mut self) -> PResult<NodeIndex> {
        let main = self.expect(TokenType::KeywordFn, "'fn'")?;
        self.eat(TokenType::Identifier);
        self.expect(TokenType::LParen, "'('")?;
        let mut params = Vec::new();
        while !matches!(self.peek(), TokenType::RParen | TokenType::Eof) {
            params.push(self.parse_param()?.0);
            if self.eat(TokenType::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenType::RParen, "')' after parameters")?;
        self.skip_paren_modifiers()?;
        let mut flags = 0;
        if self.eat(TokenType::Bang).is_some() {
            flags |= proto_flags::INFERRED_ERROR;
        }
        let return_type = if self.peek().can_start_expression() && self.peek() != TokenType::LBrace {
            self.parse_type_expr()?.0
        } else {
            return Err(self.fail("expected return type"));
        };
        let (start, end) = self.push_list(&params);
        let extra = self.push_extra(&[start, end, flags]);
        Ok(self.add(NodeTag::FnProto, main, extra, return_type, main))
    }

    fn parse_param(&mut self) -> PResult<NodeIndex> {
        let first = self.tok();
        let mut flags = 0;
        loop {
            match self.peek() {
                TokenType::KeywordComptime => flags |= param_flags::COMPTIME,
                TokenType::KeywordNoalias => flags |= param_flags::NOALIAS,
                _ => break,
            }
            self.bump();
        }
        let mut main = self.tok();
        if self.peek() == TokenType::Identifier && self.peek_at(1) == TokenType::Colon {
            main = self.bump();
            self.bump();
            flags |= param_flags::HAS_NAME;
        }
        let type_expr = match self.peek() {
            TokenType::KeywordAnytype => {
                self.bump();
                flags |= param_flags::ANYTYPE;
                0
            }
            TokenType::Ellipsis3 => {
                self.bump();
                flags |= param_flags::VARARGS;
                0
            }
            _ => self.parse_type_expr()?.0,
        };
        Ok(self.add(NodeTag::Param, main, type_expr, flags, first))
    }

    fn parse_test_decl(&mut self) -> PResult<NodeIndex> {
        let main = self.bump();
        let name = self
            .eat(TokenType::StringLiteral)
            .or_else(|| self.eat(TokenType::Identifier))
            .unwrap_or(INVALID_TOKEN);
        let body = self.parse_block()?;
        Ok(self.add(NodeTag::TestDecl, main, name, body.0, main))
    }

    fn parse_container_field(&mut self, first: TokenIndex) -> PResult<NodeIndex> {
        self.eat(TokenType::KeywordComptime);
        let name = self.expect(TokenType::Identifier, "a field name")?;
        let type_expr = match self.eat(TokenType::Colon) {
            Some(_) => self.parse_type_expr()?.0,
            None => 0,
        };
        self.skip_paren_modifiers()?;
        let value = match self.eat(TokenType::Equal) {
            Some(_) => self.parse_expr()?.0,
            None => 0,
        };
        let field = self.add(NodeTag::ContainerField, name, type_expr, value, first);
        if self.peek() != TokenType::RBrace {
            self.expect(TokenType::Comma, "',' after field")?;
        }
        Ok(field)
    }

    fn parse_container_decl(&mut self) -> PResult<NodeIndex> {
        let first = self.tok();
        if matches!(self.peek(), TokenType::KeywordPacked | TokenType::KeywordExtern) {
            self.bump();
        }
        let main = self.bump();
        let is_union = self.tokens[main as usize].tag == TokenType::KeywordUnion;
        let mut tag = NodeTag::ContainerDecl;
        let mut arg = 0;
        if self.eat(TokenType::LParen).is_some() {
            if is_union && self.eat(TokenType::KeywordEnum).is_some() {
                tag = NodeTag::TaggedUnion;
                if self.eat(TokenType::LParen).is_some() {
                    arg = self.parse_expr()?.0;
                    self.expect(TokenType::RParen, "')'")?;
                    tag = NodeTag::TaggedUnionEnumTag;
                }
            } else {
                arg = self.parse_expr()?.0;
                tag = NodeTag::ContainerDeclArg;
            }
            self.expect(TokenType::RParen, "')'")?;
        }
        self.expect(TokenType::LBrace, "'{'")?;
        let members = self.parse_container_members(false);
        self.expect(TokenType::RBrace, "'}'")?;
        let (start, end) = self.push_list(&members);
        Ok(match tag {
            NodeTag::ContainerDecl | NodeTag::TaggedUnion => self.add(tag, main, start, end, first),
            _ => {
                let extra = self.push_extra(&[start, end]);
                self.add(tag, main, arg, extra, first)
            }
        })
    }

    // ---- statements ----

    fn parse_block(&mut self) -> PResult<NodeIndex> {
        let first = self.block_start();
        let main = self.expect(TokenType::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !matches!(self.peek(), TokenType::RBrace | TokenType::Eof) {
            let start = self.pos;
            match self.parse_statement() {
                Ok(Some(node)) => statements.push(node.0),
                Ok(None) => {}
                Err(ParseFailure) => self.recover_statement(false),
            }
            if self.pos == start {
                self.bump();
            }
        }
        self.expect(TokenType::RBrace, "'}'")?;
        let (start, end) = self.push_list(&statements);
        Ok(self.add(NodeTag::Block, main, start, end, first))
    }

    /// Start token of a block, including a `label:` in front of it.
    fn block_start(&self) -> TokenIndex {
        let main = self.tok();
        if self.pos >= 2
            && self.tokens[self.significant[self.pos - 1] as usize].tag == TokenType::Colon
            && self.tokens[self.significant[self.pos - 2] as usize].tag == TokenType::Identifier
            && main >= 2
            && self.significant[self.pos - 2] == main - 2
        {
            main - 2
        } else {
            main
        }
    }

    fn parse_statement(&mut self) -> PResult<Option<NodeIndex>> {
        let first = self.tok();
        match self.peek() {
            TokenType::Semicolon => {
                self.bump();
                Ok(None)
            }
            TokenType::KeywordConst | TokenType::KeywordVar => {
                let decl = self.parse_var_decl(first)?;
                self.expect(TokenType::Semicolon, "';' after declaration")?;
                Ok(Some(decl))
            }
            TokenType::KeywordComptime
                if matches!(self.peek_at(1), TokenType::KeywordConst | TokenType::KeywordVar) =>
            {
                self.bump();
                let decl = self.parse_var_decl(first)?;
                self.expect(TokenType::Semicolon, "';' after declaration")?;
                Ok(Some(decl))
            }
            TokenType::KeywordDefer => {
                let main = self.bump();
                let body = self.parse_block_or_assign()?;
                Ok(Some(self.add(NodeTag::Defer, main, 0, body.0, first)))
            }
            TokenType::KeywordErrdefer => {
                let main = self.bump();
                let payload = self.parse_payload()?.unwrap_or(INVALID_TOKEN);
                let body = self.parse_block_or_assign()?;
                Ok(Some(self.add(NodeTag::Errdefer, main, payload, body.0, first)))
            }
            _ => {
                let expr = self.parse_assign_expr()?;
                if self.ends_with_block(expr) {
                    self.eat(TokenType::Semicolon);
                } else {
                    self.expect(TokenType::Semicolon, "';' after statement")?;
                }
                Ok(Some(expr))
            }
        }
    }

    /// Statements whose last token is a `}` don't need a trailing `;`.
    fn ends_with_block(&self, n: NodeIndex) -> bool {
        let last = self.spans[n.index()].last;
        matches!(
            self.nodes[n.index()].tag,
            NodeTag::Block
                | NodeTag::If
                | NodeTag::While
                | NodeTag::For
                | NodeTag::Switch
                | NodeTag::Comptime
        ) && self.tokens[last as usize].tag == TokenType::RBrace
    }

    fn parse_block_or_assign(&mut self) -> PResult<NodeIndex> {
        if self.peek() == TokenType::LBrace {
            return self.parse_block();
        }
        let expr = self.parse_assign_expr()?;
        self.expect(TokenType::Semicolon, "';'")?;
        Ok(expr)
    }

    fn parse_assign_expr(&mut self) -> PResult<NodeIndex> {
        let lhs = self.parse_expr()?;
        let tag = match self.peek() {
            TokenType::Equal => NodeTag::Assign,
            t if is_assign_op(t) => NodeTag::AssignOp,
            _ => return Ok(lhs),
        };
        let op = self.bump();
        let rhs = self.parse_expr()?;
        let first = self.first_of(lhs);
        Ok(self.add(tag, op, lhs.0, rhs.0, first))
    }

    /// Parses `|a, *b|` if present and returns the first token inside the bars.
    fn parse_payload(&mut self) -> PResult<Option<TokenIndex>> {
        if self.eat(TokenType::Pipe).is_none() {
            return Ok(None);
        }
        let first = self.tok();
        loop {
            self.eat(TokenType::Asterisk);
            self.expect(TokenType::Identifier, "a capture name")?;
            if self.eat(TokenType::Comma).is_none() || self.peek() == TokenType::Pipe {
                break;
            }
        }
        self.expect(TokenType::Pipe, "'|'")?;
        Ok(Some(first))
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> PResult<NodeIndex> {
        self.enter()?;
        let result = self.parse_expr_precedence(0);
        self.leave();
        result
    }

    fn parse_expr_precedence(&mut self, min: u8) -> PResult<NodeIndex> {
        let mut lhs = self.parse_prefix_expr()?;
        while let Some((precedence, tag)) = binary_info(self.peek()) {
            if precedence < min {
                break;
            }
            let op = self.bump();
            if tag == NodeTag::Catch {
                self.parse_payload()?;
            }
            let rhs = self.parse_expr_precedence(precedence + 1)?;
            let first = self.first_of(lhs);
            lhs = self.add(tag, op, lhs.0, rhs.0, first);
        }
        Ok(lhs)
    }

    fn parse_prefix_expr(&mut self) -> PResult<NodeIndex> {
        let tag = match self.peek() {
            TokenType::Bang => NodeTag::BoolNot,
            TokenType::Minus => NodeTag::Negation,
            TokenType::Tilde => NodeTag::BitNot,
            TokenType::MinusPercent => NodeTag::NegationWrap,
            TokenType::Ampersand => NodeTag::AddressOf,
            TokenType::KeywordTry => NodeTag::Try,
            _ => return self.parse_primary_expr(),
        };
        let op = self.bump();
        self.enter()?;
        let operand = self.parse_prefix_expr();
        self.leave();
        let operand = operand?;
        Ok(self.add(tag, op, operand.0, 0, op))
    }

    fn parse_primary_expr(&mut self) -> PResult<NodeIndex> {
        let first = self.tok();
        match self.peek() {
            TokenType::KeywordIf => self.parse_if(),
            TokenType::KeywordWhile | TokenType::KeywordFor | TokenType::KeywordInline => {
                self.parse_loop()
            }
            TokenType::KeywordBreak | TokenType::KeywordContinue => {
                let main = self.bump();
                let label = match self.eat(TokenType::Colon) {
                    Some(_) => self.expect(TokenType::Identifier, "a label")?,
                    None => INVALID_TOKEN,
                };
                let is_break = self.tokens[main as usize].tag == TokenType::KeywordBreak;
                let value = if is_break && self.peek().can_start_expression() {
                    self.parse_expr()?.0
                } else {
                    0
                };
                let tag = if is_break { NodeTag::Break } else { NodeTag::Continue };
                Ok(self.add(tag, main, label, value, first))
            }
            TokenType::KeywordReturn => {
                let main = self.bump();
                let value = if self.peek().can_start_expression() {
                    self.parse_expr()?.0
                } else {
                    0
                };
                Ok(self.add(NodeTag::Return, main, value, 0, first))
            }
            TokenType::KeywordComptime => {
                let main = self.bump();
                let expr = self.parse_expr()?;
                Ok(self.add(NodeTag::Comptime, main, expr.0, 0, first))
            }
            TokenType::KeywordNosuspend => {
                self.bump();
                self.parse_expr()
            }
            TokenType::Identifier
                if self.peek_at(1) == TokenType::Colon
                    && matches!(
                        self.peek_at(2),
                        TokenType::LBrace
                            | TokenType::KeywordWhile
                            | TokenType::KeywordFor
                            | TokenType::KeywordInline
                    ) =>
            {
                self.bump();
                self.bump();
                if self.peek() == TokenType::LBrace {
                    self.parse_block()
                } else {
                    self.parse_loop()
                }
            }
            TokenType::LBrace => self.parse_block(),
            _ => self.parse_curly_suffix_expr(),
        }
    }

    fn parse_curly_suffix_expr(&mut self) -> PResult<NodeIndex> {
        let ty = self.parse_type_expr()?;
        if self.peek() != TokenType::LBrace {
            return Ok(ty);
        }
        let first = self.first_of(ty);
        self.parse_init_list(ty.0, first)
    }

    /// `{ .a = x, ... }` or `{ x, y }` after an optional type.
    fn parse_init_list(&mut self, ty: u32, first: TokenIndex) -> PResult<NodeIndex> {
        let main = self.expect(TokenType::LBrace, "'{'")?;
        let is_struct = self.peek() == TokenType::RBrace
            || (self.peek() == TokenType::Period
                && self.peek_at(1) == TokenType::Identifier
                && self.peek_at(2) == TokenType::Equal);
        let mut items = Vec::new();
        while !matches!(self.peek(), TokenType::RBrace | TokenType::Eof) {
            if is_struct {
                let field_first = self.expect(TokenType::Period, "'.'")?;
                let name = self.expect(TokenType::Identifier, "a field name")?;
                self.expect(TokenType::Equal, "'='")?;
                let value = self.parse_expr()?;
                items.push(self.add(NodeTag::FieldInitializer, name, value.0, 0, field_first).0);
            } else {
                items.push(self.parse_expr()?.0);
            }
            if self.eat(TokenType::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenType::RBrace, "'}'")?;
        let (start, end) = self.push_list(&items);
        let extra = self.push_extra(&[start, end]);
        let tag = if is_struct { NodeTag::StructInit } else { NodeTag::ArrayInit };
        Ok(self.add(tag, main, ty, extra, first))
    }

    fn parse_type_expr(&mut self) -> PResult<NodeIndex> {
        self.enter()?;
        let result = self.parse_type_expr_inner();
        self.leave();
        result
    }

    fn parse_type_expr_inner(&mut self) -> PResult<NodeIndex> {
        let first = self.tok();
        match self.peek() {
            TokenType::QuestionMark => {
                let main = self.bump();
                let child = self.parse_type_expr()?;
                Ok(self.add(NodeTag::OptionalType, main, child.0, 0, first))
            }
            TokenType::Asterisk => {
                let main = self.bump();
                self.parse_ptr_rest(main, PtrSize::One, 0)
            }
            TokenType::AsteriskAsterisk => {
                let main = self.bump();
                let inner = self.parse_ptr_rest(main, PtrSize::One, 0)?;
                let extra = self.push_extra(&[0, 0, PtrSize::One.to_bits()]);
                Ok(self.add(NodeTag::PtrType, main, extra, inner.0, first))
            }
            TokenType::LBracket => {
                let main = self.bump();
                match self.peek() {
                    TokenType::Asterisk => {
                        self.bump();
                        let mut size = PtrSize::Many;
                        if self.peek() == TokenType::Identifier && self.current_text() == "c" {
                            self.bump();
                            size = PtrSize::C;
                        }
                        let sentinel = match self.eat(TokenType::Colon) {
                            Some(_) => self.parse_expr()?.0,
                            None => 0,
                        };
                        self.expect(TokenType::RBracket, "']'")?;
                        self.parse_ptr_rest(main, size, sentinel)
                    }
                    TokenType::RBracket => {
                        self.bump();
                        self.parse_ptr_rest(main, PtrSize::Slice, 0)
                    }
                    TokenType::Colon => {
                        self.bump();
                        let sentinel = self.parse_expr()?.0;
                        self.expect(TokenType::RBracket, "']'")?;
                        self.parse_ptr_rest(main, PtrSize::Slice, sentinel)
                    }
                    _ => {
                        let len = self.parse_expr()?;
                        let sentinel = match self.eat(TokenType::Colon) {
                            Some(_) => Some(self.parse_expr()?),
                            None => None,
                        };
                        self.expect(TokenType::RBracket, "']'")?;
                        let elem = self.parse_type_expr()?;
                        Ok(match sentinel {
                            None => self.add(NodeTag::ArrayType, main, len.0, elem.0, first),
                            Some(s) => {
                                let extra = self.push_extra(&[s.0, elem.0]);
                                self.add(NodeTag::ArrayTypeSentinel, main, len.0, extra, first)
                            }
                        })
                    }
                }
            }
            _ => self.parse_error_union_expr(),
        }
    }

    fn current_text(&self) -> &str {
        let t = self.tokens[self.tok() as usize];
        &self.source[t.start as usize..t.end as usize]
    }

    /// Pointer attributes and child type after the size prefix.
    fn parse_ptr_rest(&mut self, main: TokenIndex, size: PtrSize, sentinel: u32) -> PResult<NodeIndex> {
        let mut flags = size.to_bits();
        let mut align = 0;
        loop {
            match self.peek() {
                TokenType::KeywordConst => flags |= ptr_flags::CONST,
                TokenType::KeywordVolatile => flags |= ptr_flags::VOLATILE,
                TokenType::KeywordAllowzero => flags |= ptr_flags::ALLOWZERO,
                TokenType::KeywordAlign => {
                    self.bump();
                    self.expect(TokenType::LParen, "'('")?;
                    align = self.parse_expr()?.0;
                    while self.eat(TokenType::Colon).is_some() {
                        self.parse_expr()?;
                    }
                    self.expect(TokenType::RParen, "')'")?;
                    continue;
                }
                TokenType::KeywordAddrspace => {
                    self.bump();
                    self.expect(TokenType::LParen, "'('")?;
                    self.parse_expr()?;
                    self.expect(TokenType::RParen, "')'")?;
                    continue;
                }
                _ => break,
            }
            self.bump();
        }
        let child = self.parse_type_expr()?;
        let extra = self.push_extra(&[sentinel, align, flags]);
        Ok(self.add(NodeTag::PtrType, main, extra, child.0, main))
    }

    fn parse_error_union_expr(&mut self) -> PResult<NodeIndex> {
        let lhs = self.parse_suffix_expr()?;
        if self.peek() != TokenType::Bang {
            return Ok(lhs);
        }
        let op = self.bump();
        let rhs = self.parse_type_expr()?;
        let first = self.first_of(lhs);
        Ok(self.add(NodeTag::ErrorUnion, op, lhs.0, rhs.0, first))
    }

    fn parse_suffix_expr(&mut self) -> PResult<NodeIndex> {
        let mut expr = self.parse_primary_type_expr()?;
        loop {
            let first = self.first_of(expr);
            match self.peek() {
                TokenType::Period => match self.peek_at(1) {
                    TokenType::Identifier => {
                        let main = self.bump();
                        let name = self.bump();
                        expr = self.add(NodeTag::FieldAccess, main, expr.0, name, first);
                    }
                    TokenType::QuestionMark => {
                        let main = self.bump();
                        let question = self.bump();
                        expr = self.add(NodeTag::UnwrapOptional, main, expr.0, question, first);
                    }
                    _ => {
                        self.bump();
                        return Err(self.fail("expected a field name"));
                    }
                },
                TokenType::PeriodAsterisk => {
                    let main = self.bump();
                    expr = self.add(NodeTag::Deref, main, expr.0, 0, first);
                }
                TokenType::LBracket => {
                    let main = self.bump();
                    let index = self.parse_expr()?;
                    if self.eat(TokenType::Ellipsis2).is_some() {
                        let end = if matches!(self.peek(), TokenType::RBracket | TokenType::Colon) {
                            0
                        } else {
                            self.parse_expr()?.0
                        };
                        let sentinel = match self.eat(TokenType::Colon) {
                            Some(_) => self.parse_expr()?.0,
                            None => 0,
                        };
                        self.expect(TokenType::RBracket, "']'")?;
                        expr = if end == 0 && sentinel == 0 {
                            self.add(NodeTag::SliceOpen, main, expr.0, index.0, first)
                        } else {
                            let extra = self.push_extra(&[index.0, end, sentinel]);
                            self.add(NodeTag::Slice, main, expr.0, extra, first)
                        };
                    } else {
                        self.expect(TokenType::RBracket, "']'")?;
                        expr = self.add(NodeTag::ArrayAccess, main, expr.0, index.0, first);
                    }
                }
                TokenType::LParen => {
                    let main = self.bump();
                    let args = self.parse_call_args()?;
                    expr = if args.len() <= 1 {
                        let arg = args.first().copied().unwrap_or(0);
                        self.add(NodeTag::CallOne, main, expr.0, arg, first)
                    } else {
                        let (start, end) = self.push_list(&args);
                        let extra = self.push_extra(&[start, end]);
                        self.add(NodeTag::Call, main, expr.0, extra, first)
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Arguments after an already consumed `(`, including the closing `)`.
    fn parse_call_args(&mut self) -> PResult<Vec<u32>> {
        let mut args = Vec::new();
        while !matches!(self.peek(), TokenType::RParen | TokenType::Eof) {
            args.push(self.parse_expr()?.0);
            if self.eat(TokenType::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenType::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary_type_expr(&mut self) -> PResult<NodeIndex> {
        let first = self.tok();
        let leaf = |parser: &mut Self, tag: NodeTag| -> PResult<NodeIndex> {
            let main = parser.bump();
            Ok(parser.add(tag, main, 0, 0, main))
        };
        match self.peek() {
            TokenType::Builtin => {
                let main = self.bump();
                self.expect(TokenType::LParen, "'('")?;
                let args = self.parse_call_args()?;
                let (start, end) = self.push_list(&args);
                Ok(self.add(NodeTag::BuiltinCall, main, start, end, first))
            }
            TokenType::NumberLiteral => leaf(self, NodeTag::NumberLiteral),
            TokenType::CharLiteral => leaf(self, NodeTag::CharLiteral),
            TokenType::StringLiteral => leaf(self, NodeTag::StringLiteral),
            TokenType::Identifier | TokenType::KeywordAnytype | TokenType::KeywordAnyframe => {
                leaf(self, NodeTag::Identifier)
            }
            TokenType::KeywordUnreachable => leaf(self, NodeTag::UnreachableLiteral),
            TokenType::MultilineStringLiteralLine => {
                let start = self.bump();
                let mut end = start;
                while self.peek() == TokenType::MultilineStringLiteralLine {
                    end = self.bump();
                }
                Ok(self.add(NodeTag::MultilineStringLiteral, start, start, end, first))
            }
            TokenType::KeywordError => match self.peek_at(1) {
                TokenType::Period => {
                    let main = self.bump();
                    self.bump();
                    let name = self.expect(TokenType::Identifier, "an error name")?;
                    Ok(self.add(NodeTag::ErrorValue, main, 0, name, first))
                }
                TokenType::LBrace => {
                    let main = self.bump();
                    let lbrace = self.bump();
                    while self.peek() == TokenType::Identifier {
                        self.bump();
                        if self.eat(TokenType::Comma).is_none() {
                            break;
                        }
                    }
                    let rbrace = self.expect(TokenType::RBrace, "'}'")?;
                    Ok(self.add(NodeTag::ErrorSetDecl, main, lbrace, rbrace, first))
                }
                _ => {
                    self.bump();
                    Err(self.fail("expected '.' or '{' after 'error'"))
                }
            },
            TokenType::Period => match self.peek_at(1) {
                TokenType::Identifier => {
                    self.bump();
                    let name = self.bump();
                    Ok(self.add(NodeTag::EnumLiteral, name, 0, 0, first))
                }
                TokenType::LBrace => {
                    self.bump();
                    self.parse_init_list(0, first)
                }
                _ => {
                    self.bump();
                    Err(self.fail("expected a name or '{' after '.'"))
                }
            },
            TokenType::KeywordStruct
            | TokenType::KeywordEnum
            | TokenType::KeywordUnion
            | TokenType::KeywordOpaque => self.parse_container_decl(),
            TokenType::KeywordPacked | TokenType::KeywordExtern
                if matches!(
                    self.peek_at(1),
                    TokenType::KeywordStruct | TokenType::KeywordUnion | TokenType::KeywordEnum
                ) =>
            {
                self.parse_container_decl()
            }
            TokenType::KeywordFn => self.parse_fn_proto(),
            TokenType::LParen => {
                let main = self.bump();
                let expr = self.parse_expr()?;
                self.expect(TokenType::RParen, "')'")?;
                Ok(self.add(NodeTag::GroupedExpression, main, expr.0, 0, first))
            }
            TokenType::KeywordSwitch => self.parse_switch(),
            TokenType::KeywordIf => self.parse_if(),
            TokenType::KeywordComptime => {
                let main = self.bump();
                let expr = self.parse_type_expr()?;
                Ok(self.add(NodeTag::Comptime, main, expr.0, 0, first))
            }
            TokenType::KeywordAsm => {
                let main = self.bump();
                self.eat(TokenType::KeywordVolatile);
                self.expect(TokenType::LParen, "'('")?;
                let mut depth = 1u32;
                while depth > 0 && self.peek() != TokenType::Eof {
                    match self.peek() {
                        TokenType::LParen => depth += 1,
                        TokenType::RParen => depth -= 1,
                        _ => {}
                    }
                    self.bump();
                }
                Ok(self.add(NodeTag::Asm, main, 0, 0, first))
            }
            TokenType::LBrace
            | TokenType::KeywordWhile
            | TokenType::KeywordFor
            | TokenType::KeywordReturn
            | TokenType::KeywordBreak
            | TokenType::KeywordContinue => self.parse_primary_expr(),
            _ => Err(self.fail("expected an expression")),
        }
    }

    fn parse_if(&mut self) -> PResult<NodeIndex> {
        let main = self.bump();
        self.expect(TokenType::LParen, "'(' after 'if'")?;
        let condition = self.parse_expr()?;
        self.expect(TokenType::RParen, "')'")?;
        let payload = self.parse_payload()?.unwrap_or(INVALID_TOKEN);
        let then_expr = self.parse_assign_expr()?;
        let (else_expr, error) = self.parse_else()?;
        let extra = self.push_extra(&[then_expr.0, else_expr, payload, error]);
        Ok(self.add(NodeTag::If, main, condition.0, extra, main))
    }

    /// Optional `else |err| expr`; returns `(else node, error payload token)`.
    fn parse_else(&mut self) -> PResult<(u32, TokenIndex)> {
        if self.eat(TokenType::KeywordElse).is_none() {
            return Ok((0, INVALID_TOKEN));
        }
        let error = self.parse_payload()?.unwrap_or(INVALID_TOKEN);
        let body = self.parse_assign_expr()?;
        Ok((body.0, error))
    }

    fn parse_loop(&mut self) -> PResult<NodeIndex> {
        let first = self.block_start();
        self.eat(TokenType::KeywordInline);
        match self.peek() {
            TokenType::KeywordWhile => self.parse_while(first),
            TokenType::KeywordFor => self.parse_for(first),
            _ => Err(self.fail("expected 'while' or 'for'")),
        }
    }

    fn parse_while(&mut self, first: TokenIndex) -> PResult<NodeIndex> {
        let main = self.bump();
        self.expect(TokenType::LParen, "'(' after 'while'")?;
        let condition = self.parse_expr()?;
        self.expect(TokenType::RParen, "')'")?;
        let payload = self.parse_payload()?.unwrap_or(INVALID_TOKEN);
        let cont = if self.eat(TokenType::Colon).is_some() {
            self.expect(TokenType::LParen, "'('")?;
            let cont = self.parse_assign_expr()?;
            self.expect(TokenType::RParen, "')'")?;
            cont.0
        } else {
            0
        };
        let body = self.parse_assign_expr()?;
        let (else_expr, error) = self.parse_else()?;
        let extra = self.push_extra(&[body.0, else_expr, cont, payload, error]);
        Ok(self.add(NodeTag::While, main, condition.0, extra, first))
    }

    fn parse_for(&mut self, first: TokenIndex) -> PResult<NodeIndex> {
        let main = self.bump();
        self.expect(TokenType::LParen, "'(' after 'for'")?;
        let mut inputs = Vec::new();
        while !matches!(self.peek(), TokenType::RParen | TokenType::Eof) {
            let input = self.parse_expr()?;
            if self.peek() == TokenType::Ellipsis2 {
                let op = self.bump();
                let end = if matches!(self.peek(), TokenType::Comma | TokenType::RParen) {
                    0
                } else {
                    self.parse_expr()?.0
                };
                let input_first = self.first_of(input);
                inputs.push(self.add(NodeTag::ForRange, op, input.0, end, input_first).0);
            } else {
                inputs.push(input.0);
            }
            if self.eat(TokenType::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenType::RParen, "')'")?;
        let payload = self.parse_payload()?.unwrap_or(INVALID_TOKEN);
        let body = self.parse_assign_expr()?;
        let (else_expr, _) = self.parse_else()?;
        let (start, end) = self.push_list(&inputs);
        let extra = self.push_extra(&[start, end, body.0, else_expr]);
        Ok(self.add(NodeTag::For, main, extra, payload, first))
    }

    fn parse_switch(&mut self) -> PResult<NodeIndex> {
        let main = self.bump();
        self.expect(TokenType::LParen, "'(' after 'switch'")?;
        let operand = self.parse_expr()?;
        self.expect(TokenType::RParen, "')'")?;
        self.expect(TokenType::LBrace, "'{'")?;
        let mut cases = Vec::new();
        while !matches!(self.peek(), TokenType::RBrace | TokenType::Eof) {
            cases.push(self.parse_switch_case()?.0);
            if self.eat(TokenType::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenType::RBrace, "'}'")?;
        let (start, end) = self.push_list(&cases);
        let extra = self.push_extra(&[start, end]);
        Ok(self.add(NodeTag::Switch, main, operand.0, extra, main))
    }

    fn parse_switch_case(&mut self) -> PResult<NodeIndex> {
        let first = self.tok();
        self.eat(TokenType::KeywordInline);
        let mut items = Vec::new();
        if self.eat(TokenType::KeywordElse).is_none() {
            while self.peek() != TokenType::EqualAngleBracketRight {
                let item = self.parse_expr()?;
                if self.peek() == TokenType::Ellipsis3 {
                    let op = self.bump();
                    let hi = self.parse_expr()?;
                    let item_first = self.first_of(item);
                    items.push(self.add(NodeTag::SwitchRange, op, item.0, hi.0, item_first).0);
                } else {
                    items.push(item.0);
                }
                if self.eat(TokenType::Comma).is_none() {
                    break;
                }
            }
        }
        let arrow = self.expect(TokenType::EqualAngleBracketRight, "'=>'")?;
        self.parse_payload()?;
        let target = self.parse_assign_expr()?;
        let (start, end) = self.push_list(&items);
        let extra = self.push_extra(&[start, end]);
        Ok(self.add(NodeTag::SwitchCase, arrow, extra, target.0, first))
    }
}
