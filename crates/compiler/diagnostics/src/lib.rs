//! Problems reported by the parser and by semantic analysis, and the source
//! location types they are attached to.

mod diagnostics;
mod location;
mod reporting;

pub use diagnostics::{Problem, ProblemCode, ProblemCollection, ProblemSource, Severity};
pub use location::{LineEdit, Position, Range, RangeInRevision};
pub use reporting::build_problem_message;
