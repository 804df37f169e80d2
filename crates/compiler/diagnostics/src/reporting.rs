//! # Problem Rendering
//!
//! Formats problems as annotated source snippets for terminal output.

use crate::Problem;
use ariadne::{Label, Report, Source};

/// Build a formatted message for a problem in `source`
pub fn build_problem_message(source: &str, problem: &Problem, with_color: bool) -> String {
    let mut write_buffer = Vec::new();
    let code_u32: u32 = problem.code.into();
    let span = clamp(problem.span.into_range(), source.len());
    let result = Report::build(problem.severity.into(), ((), span.clone()))
        .with_config(
            ariadne::Config::new()
                .with_index_type(ariadne::IndexType::Byte)
                .with_color(with_color),
        )
        .with_code(code_u32)
        .with_message(&problem.message)
        .with_label(Label::new(((), span)).with_message(&problem.message))
        .finish()
        .write(Source::from(source), &mut write_buffer);
    match result {
        Ok(()) => String::from_utf8_lossy(&write_buffer).to_string(),
        Err(_) => problem.to_string(),
    }
}

fn clamp(range: std::ops::Range<usize>, len: usize) -> std::ops::Range<usize> {
    let start = range.start.min(len);
    start..range.end.clamp(start, len)
}
