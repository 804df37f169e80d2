//! # Problem Reporting
//!
//! Problems are the diagnostics attached to a file's top context. They come either
//! from the parser or from semantic analysis; see [`ProblemSource`].

use ariadne::ReportKind;
use chumsky::span::SimpleSpan;
use std::fmt;

use crate::location::Range;

/// A problem found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Problem {
    pub source: ProblemSource,
    pub severity: Severity,
    pub code: ProblemCode,
    pub message: String,
    /// Path of the document the problem belongs to
    pub file_path: String,
    /// Byte span in the document
    pub span: SimpleSpan<usize>,
    /// Line/column range in the document
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemSource {
    Parser,
    SemanticAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

impl From<Severity> for ReportKind<'static> {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Hint => ReportKind::Advice,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemCode {
    // Parser (0-999)
    LexicalError,
    SyntaxError,

    // Name resolution (1000-1999)
    UndefinedName,
    UnknownField,
    UsingNamespaceNotContainer,

    // Captures (2000-2999)
    NonOptionalCapture,
    NonErrorCapture,
    NonIterableCapture,

    // Type checks (3000-3999)
    ArgumentTypeMismatch,
    InitializerTypeMismatch,
    AssignmentTypeMismatch,
    ConditionTypeMismatch,
    CaseTypeMismatch,
}

impl From<ProblemCode> for u32 {
    fn from(code: ProblemCode) -> Self {
        match code {
            ProblemCode::LexicalError => 1,
            ProblemCode::SyntaxError => 2,
            ProblemCode::UndefinedName => 1001,
            ProblemCode::UnknownField => 1002,
            ProblemCode::UsingNamespaceNotContainer => 1003,
            ProblemCode::NonOptionalCapture => 2001,
            ProblemCode::NonErrorCapture => 2002,
            ProblemCode::NonIterableCapture => 2003,
            ProblemCode::ArgumentTypeMismatch => 3001,
            ProblemCode::InitializerTypeMismatch => 3002,
            ProblemCode::AssignmentTypeMismatch => 3003,
            ProblemCode::ConditionTypeMismatch => 3004,
            ProblemCode::CaseTypeMismatch => 3005,
        }
    }
}

impl Problem {
    pub fn new(
        source: ProblemSource,
        severity: Severity,
        code: ProblemCode,
        message: String,
    ) -> Self {
        Self {
            source,
            severity,
            code,
            message,
            file_path: String::new(),
            span: SimpleSpan::from(0..0),
            range: Range::default(),
        }
    }

    /// A semantic hint; semantic diagnostics default to this severity.
    pub fn hint(code: ProblemCode, message: String) -> Self {
        Self::new(ProblemSource::SemanticAnalysis, Severity::Hint, code, message)
    }

    pub fn parser(severity: Severity, message: String) -> Self {
        Self::new(
            ProblemSource::Parser,
            severity,
            ProblemCode::SyntaxError,
            message,
        )
    }

    pub const fn with_location(mut self, span: SimpleSpan<usize>, range: Range) -> Self {
        self.span = span;
        self.range = range;
        self
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn undefined_name(name: &str) -> Self {
        Self::hint(
            ProblemCode::UndefinedName,
            format!("Undefined name '{name}'"),
        )
    }

    pub fn unknown_field(field: &str, owner: &str) -> Self {
        Self::hint(
            ProblemCode::UnknownField,
            format!("No field named '{field}' in '{owner}'"),
        )
    }

    pub fn type_mismatch(code: ProblemCode, expected: &str, found: &str) -> Self {
        Self::hint(
            code,
            format!("Expected type '{expected}', found '{found}'"),
        )
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        write!(f, " (at {})", self.range.start)
    }
}

/// Collection of problems for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemCollection {
    problems: Vec<Problem>,
}

impl ProblemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn extend(&mut self, problems: impl IntoIterator<Item = Problem>) {
        self.problems.extend(problems);
    }

    pub fn all(&self) -> &[Problem] {
        &self.problems
    }

    pub fn from_source(&self, source: ProblemSource) -> Vec<&Problem> {
        self.problems.iter().filter(|p| p.source == source).collect()
    }

    pub fn with_code(&self, code: ProblemCode) -> Vec<&Problem> {
        self.problems.iter().filter(|p| p.code == code).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(|p| p.severity == Severity::Error)
    }

    pub const fn len(&self) -> usize {
        self.problems.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Sort problems by position, then by severity.
    pub fn sort(&mut self) {
        self.problems.sort_by(|a, b| {
            a.range
                .start
                .cmp(&b.range.start)
                .then(a.severity.cmp(&b.severity))
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Problem> {
        self.problems.iter()
    }
}

impl From<Vec<Problem>> for ProblemCollection {
    fn from(problems: Vec<Problem>) -> Self {
        Self { problems }
    }
}

impl IntoIterator for ProblemCollection {
    type Item = Problem;
    type IntoIter = std::vec::IntoIter<Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.into_iter()
    }
}
