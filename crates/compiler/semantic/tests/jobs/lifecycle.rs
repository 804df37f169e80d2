//! Tests for parse jobs: revisions, reuse, aborting and publication

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use ziglens_compiler_semantic::{AnalysisError, NoScheduler, ParseJob, TopFeatures};

use crate::{find_decl, TestProject};

fn single_file() -> TestProject {
    TestProject::new(&[("main.zig", "const a: u8 = 1;\n")])
}

#[test]
fn published_top_records_revision_and_features() {
    let project = single_file();
    let path = project.path("main.zig");

    let outcome = ParseJob::new(&path)
        .with_revision(7)
        .run(&project.chain, &project.project, &NoScheduler)
        .expect("analysis");

    assert_eq!(outcome.top.revision, 7);
    assert_eq!(outcome.top.url, path);
    assert!(outcome
        .top
        .features
        .contains(TopFeatures::ALL_DECLARATIONS_CONTEXTS_AND_USES));
    let published = project.chain.top_for_path(&path).expect("published");
    assert!(Arc::ptr_eq(&published, &outcome.top));
    assert_eq!(project.chain.analyzed_files(), vec![path]);
}

#[test]
fn attach_without_updating_reuses_the_same_revision() {
    let project = single_file();
    let path = project.path("main.zig");
    let job = ParseJob::new(&path).with_revision(3);
    let first = job
        .run(&project.chain, &project.project, &NoScheduler)
        .expect("first analysis");

    let reuse = ParseJob::new(&path)
        .with_revision(3)
        .with_features(TopFeatures::ATTACH_AST_WITHOUT_UPDATING);
    let second = reuse
        .run(&project.chain, &project.project, &NoScheduler)
        .expect("reused analysis");
    assert!(second.reused);
    assert!(Arc::ptr_eq(&first.top, &second.top));

    let newer = ParseJob::new(&path)
        .with_revision(4)
        .with_features(TopFeatures::ATTACH_AST_WITHOUT_UPDATING);
    let third = newer
        .run(&project.chain, &project.project, &NoScheduler)
        .expect("fresh analysis");
    assert!(!third.reused);
    assert_eq!(third.top.revision, 4);
    assert!(!third
        .top
        .features
        .contains(TopFeatures::ATTACH_AST_WITHOUT_UPDATING));
}

#[test]
fn aborted_job_keeps_the_previous_result() {
    let project = single_file();
    let path = project.path("main.zig");
    let previous = project.run("main.zig").top;

    let job = ParseJob::new(&path)
        .with_contents("const b: u16 = 2;\n")
        .with_abort_flag(Arc::new(AtomicBool::new(true)));
    let result = job.run(&project.chain, &project.project, &NoScheduler);

    assert!(matches!(result, Err(AnalysisError::Aborted(ref p)) if p == &path));
    let current = project.chain.top_for_path(&path).expect("still published");
    assert!(Arc::ptr_eq(&current, &previous));
}

#[test]
fn missing_document_is_unreadable() {
    let project = single_file();
    let path = project.path("missing.zig");

    let result = ParseJob::new(&path).run(&project.chain, &project.project, &NoScheduler);

    match result {
        Err(AnalysisError::UnreadableDocument { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected an unreadable document, got {other:?}"),
    }
    assert!(project.chain.top_for_path(&path).is_none());
}

#[test]
fn contents_override_the_file_on_disk() {
    let project = single_file();
    let path = project.path("main.zig");

    let outcome = ParseJob::new(&path)
        .with_contents("const b: u16 = 2;\n")
        .run(&project.chain, &project.project, &NoScheduler)
        .expect("analysis");

    assert_eq!(find_decl(&outcome.top, "b").ty.to_string(), "u16 = 2");
    assert!(outcome
        .top
        .declarations
        .iter()
        .all(|d| d.identifier.as_str() != "a"));
}

#[test]
fn invalidate_forgets_the_published_result() {
    let project = single_file();
    let path = project.path("main.zig");
    project.run("main.zig");

    project.chain.invalidate(&path);

    assert!(project.chain.top_for_path(&path).is_none());
    assert!(project.chain.file_id(&path).is_some());
    assert!(project.chain.analyzed_files().is_empty());
}

#[test]
fn dependents_are_reported_once_the_import_is_published() {
    let project = TestProject::new(&[
        ("main.zig", "const dep = @import(\"dep.zig\");\n"),
        ("dep.zig", "pub const x: u8 = 1;\n"),
    ]);

    let main = project.run("main.zig");
    assert!(main.dependents.is_empty());
    assert_eq!(
        project.chain.dependents_of(&project.path("dep.zig")),
        vec![project.path("main.zig")]
    );

    let dep = project.run("dep.zig");
    assert_eq!(dep.dependents, vec![project.path("main.zig")]);
}

#[test]
fn resolved_imports_are_recorded() {
    let project = TestProject::new(&[
        ("main.zig", "const dep = @import(\"dep.zig\");\nconst me = @import(\"main.zig\");\n"),
        ("dep.zig", "pub const x: u8 = 1;\n"),
    ]);
    project.run("dep.zig");

    let main = project.run("main.zig");
    assert!(main.top.unresolved_imports.is_empty());
    assert_eq!(
        main.top.imports.iter().cloned().collect::<Vec<_>>(),
        vec![project.path("dep.zig")]
    );
    assert_eq!(
        project.chain.importers_of(&project.path("dep.zig")),
        vec![project.path("main.zig")]
    );

    let again = project.run("main.zig");
    assert!(again.top.same_declarations(&main.top));
}
