use logos::Logos;

/// Token kinds of the language. Whitespace and plain line comments are skipped;
/// doc comments are kept so that declarations can pick them up.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[\t\n\r ]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenType {
    #[regex(r"///[^\n]*")]
    DocComment,
    #[regex(r"//![^\n]*")]
    ContainerDocComment,

    // Literals
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"0x[0-9a-fA-F][0-9a-fA-F_]*(\.[0-9a-fA-F][0-9a-fA-F_]*)?([pP][+-]?[0-9]+)?")]
    #[regex(r"0o[0-7][0-7_]*")]
    #[regex(r"0b[01][01_]*")]
    NumberLiteral,
    #[regex(r"'(\\[^\n]|[^'\\\n])+'")]
    CharLiteral,
    #[regex(r#""(\\[^\n]|[^"\\\n])*""#)]
    StringLiteral,
    #[regex(r"\\\\[^\n]*")]
    MultilineStringLiteralLine,
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*")]
    Builtin,
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    #[regex(r#"@"(\\[^\n]|[^"\\\n])*""#)]
    Identifier,

    // Keywords
    #[token("addrspace")]
    KeywordAddrspace,
    #[token("align")]
    KeywordAlign,
    #[token("allowzero")]
    KeywordAllowzero,
    #[token("and")]
    KeywordAnd,
    #[token("anyframe")]
    KeywordAnyframe,
    #[token("anytype")]
    KeywordAnytype,
    #[token("asm")]
    KeywordAsm,
    #[token("break")]
    KeywordBreak,
    #[token("callconv")]
    KeywordCallconv,
    #[token("catch")]
    KeywordCatch,
    #[token("comptime")]
    KeywordComptime,
    #[token("const")]
    KeywordConst,
    #[token("continue")]
    KeywordContinue,
    #[token("defer")]
    KeywordDefer,
    #[token("else")]
    KeywordElse,
    #[token("enum")]
    KeywordEnum,
    #[token("errdefer")]
    KeywordErrdefer,
    #[token("error")]
    KeywordError,
    #[token("export")]
    KeywordExport,
    #[token("extern")]
    KeywordExtern,
    #[token("fn")]
    KeywordFn,
    #[token("for")]
    KeywordFor,
    #[token("if")]
    KeywordIf,
    #[token("inline")]
    KeywordInline,
    #[token("linksection")]
    KeywordLinksection,
    #[token("noalias")]
    KeywordNoalias,
    #[token("noinline")]
    KeywordNoinline,
    #[token("nosuspend")]
    KeywordNosuspend,
    #[token("opaque")]
    KeywordOpaque,
    #[token("or")]
    KeywordOr,
    #[token("orelse")]
    KeywordOrelse,
    #[token("packed")]
    KeywordPacked,
    #[token("pub")]
    KeywordPub,
    #[token("return")]
    KeywordReturn,
    #[token("struct")]
    KeywordStruct,
    #[token("switch")]
    KeywordSwitch,
    #[token("test")]
    KeywordTest,
    #[token("threadlocal")]
    KeywordThreadlocal,
    #[token("try")]
    KeywordTry,
    #[token("union")]
    KeywordUnion,
    #[token("unreachable")]
    KeywordUnreachable,
    #[token("usingnamespace")]
    KeywordUsingnamespace,
    #[token("var")]
    KeywordVar,
    #[token("volatile")]
    KeywordVolatile,
    #[token("while")]
    KeywordWhile,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(".*")]
    PeriodAsterisk,
    #[token("..")]
    Ellipsis2,
    #[token("...")]
    Ellipsis3,
    #[token("=>")]
    EqualAngleBracketRight,
    #[token("->")]
    Arrow,
    #[token("?")]
    QuestionMark,

    // Operators
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("<")]
    AngleBracketLeft,
    #[token("<=")]
    AngleBracketLeftEqual,
    #[token("<<")]
    AngleBracketAngleBracketLeft,
    #[token("<<=")]
    AngleBracketAngleBracketLeftEqual,
    #[token("<<|")]
    AngleBracketAngleBracketLeftPipe,
    #[token("<<|=")]
    AngleBracketAngleBracketLeftPipeEqual,
    #[token(">")]
    AngleBracketRight,
    #[token(">=")]
    AngleBracketRightEqual,
    #[token(">>")]
    AngleBracketAngleBracketRight,
    #[token(">>=")]
    AngleBracketAngleBracketRightEqual,
    #[token("+")]
    Plus,
    #[token("++")]
    PlusPlus,
    #[token("+=")]
    PlusEqual,
    #[token("+%")]
    PlusPercent,
    #[token("+%=")]
    PlusPercentEqual,
    #[token("+|")]
    PlusPipe,
    #[token("+|=")]
    PlusPipeEqual,
    #[token("-")]
    Minus,
    #[token("-=")]
    MinusEqual,
    #[token("-%")]
    MinusPercent,
    #[token("-%=")]
    MinusPercentEqual,
    #[token("-|")]
    MinusPipe,
    #[token("-|=")]
    MinusPipeEqual,
    #[token("*")]
    Asterisk,
    #[token("*=")]
    AsteriskEqual,
    #[token("**")]
    AsteriskAsterisk,
    #[token("*%")]
    AsteriskPercent,
    #[token("*%=")]
    AsteriskPercentEqual,
    #[token("*|")]
    AsteriskPipe,
    #[token("*|=")]
    AsteriskPipeEqual,
    #[token("/")]
    Slash,
    #[token("/=")]
    SlashEqual,
    #[token("%")]
    Percent,
    #[token("%=")]
    PercentEqual,
    #[token("&")]
    Ampersand,
    #[token("&=")]
    AmpersandEqual,
    #[token("|")]
    Pipe,
    #[token("||")]
    PipePipe,
    #[token("|=")]
    PipeEqual,
    #[token("^")]
    Caret,
    #[token("^=")]
    CaretEqual,
    #[token("~")]
    Tilde,

    Invalid,
    Eof,
}

impl TokenType {
    pub const fn is_doc_comment(self) -> bool {
        matches!(self, Self::DocComment | Self::ContainerDocComment)
    }

    /// Whether an expression can begin with this token.
    pub const fn can_start_expression(self) -> bool {
        !matches!(
            self,
            Self::RParen
                | Self::RBrace
                | Self::RBracket
                | Self::Semicolon
                | Self::Colon
                | Self::Comma
                | Self::EqualAngleBracketRight
                | Self::Equal
                | Self::KeywordElse
                | Self::KeywordCatch
                | Self::KeywordOrelse
                | Self::KeywordAnd
                | Self::KeywordOr
                | Self::Eof
                | Self::Invalid
        )
    }
}

/// A lexed token; `start..end` is its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub tag: TokenType,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexingError {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl std::fmt::Display for LexingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid token '{}'", self.text)
    }
}

/// Lexes `source` into tokens, terminated by an [`TokenType::Eof`] token.
/// Unrecognized input becomes an [`TokenType::Invalid`] token plus a [`LexingError`].
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexingError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for (result, span) in TokenType::lexer(source).spanned() {
        let start = span.start as u32;
        let end = span.end as u32;
        match result {
            Ok(tag) => tokens.push(Token { tag, start, end }),
            Err(()) => {
                errors.push(LexingError {
                    start,
                    end,
                    text: source[span].to_string(),
                });
                tokens.push(Token {
                    tag: TokenType::Invalid,
                    start,
                    end,
                });
            }
        }
    }
    let len = source.len() as u32;
    tokens.push(Token {
        tag: TokenType::Eof,
        start: len,
        end: len,
    });
    (tokens, errors)
}
