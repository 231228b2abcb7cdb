// tests/incremental_compile.rs

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use steadybuild::errors::BuildError;
use steadybuild::fs::mock::MockFileSystem;
use steadybuild::fs::FileSystem;
use steadybuild::incremental::{
    clean_task, compile_task, decode_analysis, CompileOutcome, CompileSettings, FileAnalysisStore,
    FsOracle, GlobSourceSet, IncrementalCompile, TestDefinition,
};
use steadybuild::types::CorruptAnalysisBehaviour;
use steadybuild::watch::SourcePatterns;
use steadybuild_test_utils::fake_compiler::FakeCompiler;
use steadybuild_test_utils::init_tracing;

const ANALYSIS: &str = ".steadybuild/analysis.json";

fn paths(items: &[&str]) -> BTreeSet<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("src/A.java", "class A {}");
    fs.add_file("src/B.java", "class B extends A {}");
    fs.add_file("src/C.java", "class C {}");
    fs.add_file("README.md", "not a source");
    fs
}

fn settings(corrupt_analysis: CorruptAnalysisBehaviour) -> CompileSettings {
    CompileSettings {
        output_dir: PathBuf::from("out"),
        corrupt_analysis,
        ..CompileSettings::default()
    }
}

fn incremental(fs: &MockFileSystem, compiler: FakeCompiler) -> IncrementalCompile {
    incremental_with(fs, compiler, CorruptAnalysisBehaviour::Reset)
}

fn incremental_with(
    fs: &MockFileSystem,
    compiler: FakeCompiler,
    corrupt_analysis: CorruptAnalysisBehaviour,
) -> IncrementalCompile {
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let patterns = SourcePatterns::new(&["src/**/*.java".to_string()], &[]).unwrap();
    IncrementalCompile::new(
        settings(corrupt_analysis),
        Arc::clone(&shared),
        Box::new(GlobSourceSet::new(Arc::clone(&shared), ".", patterns)),
        Box::new(FileAnalysisStore::new(PathBuf::from(ANALYSIS), Arc::clone(&shared))),
        Box::new(FsOracle::new(Arc::clone(&shared), Vec::new())),
        Box::new(compiler),
    )
}

fn persisted(fs: &MockFileSystem) -> Vec<u8> {
    fs.read(Path::new(ANALYSIS)).unwrap()
}

fn dirty(outcome: &CompileOutcome) -> BTreeSet<PathBuf> {
    outcome
        .changes()
        .map(|c| c.dirty_sources.clone())
        .unwrap_or_default()
}

#[test]
fn test_first_pass_compiles_everything_then_up_to_date() {
    init_tracing();
    let fs = project();
    let compiler = FakeCompiler::new(fs.clone()).with_dependency("src/B.java", "src/A.java");
    let mut compile = incremental(&fs, compiler.clone());

    let first = compile.run().unwrap();
    assert!(matches!(first, CompileOutcome::Compiled(_)));
    assert_eq!(dirty(&first), paths(&["src/A.java", "src/B.java", "src/C.java"]));
    assert!(fs.exists(Path::new("out/A.class")));
    assert!(fs.exists(Path::new(ANALYSIS)));

    let second = compile.run().unwrap();
    assert_eq!(second, CompileOutcome::UpToDate);
    assert_eq!(compiler.call_count(), 1);
}

#[test]
fn test_touching_a_source_recompiles_it_and_its_dependents_only() {
    init_tracing();
    let fs = project();
    let compiler = FakeCompiler::new(fs.clone()).with_dependency("src/B.java", "src/A.java");
    let mut compile = incremental(&fs, compiler.clone());
    compile.run().unwrap();

    fs.touch("src/A.java");
    let outcome = compile.run().unwrap();

    assert_eq!(dirty(&outcome), paths(&["src/A.java", "src/B.java"]));
    assert_eq!(compiler.calls()[1], paths(&["src/A.java", "src/B.java"]));

    // The dependency was recorded again by the second pass.
    let analysis = compile.analysis();
    assert!(analysis
        .dependents(Path::new("src/A.java"))
        .contains(Path::new("src/B.java")));
}

#[test]
fn test_failed_pass_keeps_persisted_analysis_and_recovers() {
    init_tracing();
    let fs = project();
    let mut compile = incremental(&fs, FakeCompiler::new(fs.clone()));
    compile.run().unwrap();
    let before = persisted(&fs);

    fs.touch("src/C.java");
    let mut broken = incremental(&fs, FakeCompiler::new(fs.clone()).failing_after(0));
    let outcome = broken.run().unwrap();

    match &outcome {
        CompileOutcome::Failed { message, changes } => {
            assert!(message.contains("fake compiler failed"));
            assert_eq!(changes.dirty_sources, paths(&["src/C.java"]));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(persisted(&fs), before);
    // Stale artifact was deleted before the compiler ran.
    assert!(!fs.exists(Path::new("out/C.class")));
    // The in-memory analysis was reverted too.
    assert!(broken.analysis().is_known(Path::new("src/C.java")));

    let recovered = compile.run().unwrap();
    assert_eq!(dirty(&recovered), paths(&["src/C.java"]));
    assert!(fs.exists(Path::new("out/C.class")));
}

#[test]
fn test_pass_failing_midway_discards_its_output() {
    init_tracing();
    let fs = project();
    let mut compile = incremental(&fs, FakeCompiler::new(fs.clone()));
    compile.run().unwrap();
    let before = persisted(&fs);

    // A now depends on C; the pass compiles A, then fails on C.
    fs.touch("src/A.java");
    fs.touch("src/C.java");
    let mut broken = incremental(
        &fs,
        FakeCompiler::new(fs.clone())
            .with_dependency("src/A.java", "src/C.java")
            .failing_after(1),
    );
    let outcome = broken.run().unwrap();

    assert!(matches!(outcome, CompileOutcome::Failed { .. }));
    assert_eq!(dirty(&outcome), paths(&["src/A.java", "src/C.java"]));
    assert_eq!(persisted(&fs), before);
    assert!(!fs.exists(Path::new("out/A.class")));
    assert!(!fs.exists(Path::new("out/C.class")));
    assert!(fs.exists(Path::new("out/B.class")));
    assert!(broken
        .analysis()
        .source_dependencies(Path::new("src/A.java"))
        .is_empty());

    let compiler = FakeCompiler::new(fs.clone()).with_dependency("src/A.java", "src/C.java");
    let mut healthy = incremental(&fs, compiler.clone());
    let recovered = healthy.run().unwrap();
    assert_eq!(dirty(&recovered), paths(&["src/A.java", "src/C.java"]));

    // The dependency found by the recovery pass is honoured.
    fs.touch("src/C.java");
    let next = healthy.run().unwrap();
    assert_eq!(dirty(&next), paths(&["src/A.java", "src/C.java"]));
    assert_eq!(compiler.call_count(), 2);
}

#[test]
fn test_removed_source_deletes_its_artifacts_without_compiling() {
    let fs = project();
    let compiler = FakeCompiler::new(fs.clone());
    let mut compile = incremental(&fs, compiler.clone());
    compile.run().unwrap();

    fs.remove("src/C.java");
    let outcome = compile.run().unwrap();

    let changes = outcome.changes().unwrap();
    assert_eq!(changes.removed_sources_count, 1);
    assert!(changes.dirty_sources.is_empty());
    assert!(!fs.exists(Path::new("out/C.class")));
    assert_eq!(compiler.call_count(), 1);

    let saved = decode_analysis(Path::new(ANALYSIS), &persisted(&fs)).unwrap();
    assert!(!saved.is_known(Path::new("src/C.java")));
    assert!(saved.is_known(Path::new("src/A.java")));
}

#[test]
fn test_clean_removes_artifacts_and_empties_analysis() {
    let fs = project();
    let mut compile = incremental(&fs, FakeCompiler::new(fs.clone()));
    compile.run().unwrap();

    let removed = compile.clean().unwrap();

    assert_eq!(removed, 3);
    assert!(!fs.exists(Path::new("out/A.class")));
    let saved = decode_analysis(Path::new(ANALYSIS), &persisted(&fs)).unwrap();
    assert!(saved.is_empty());
}

#[test]
fn test_corrupt_analysis_reset_rebuilds_everything() {
    let fs = project();
    let compiler = FakeCompiler::new(fs.clone());
    let mut compile = incremental(&fs, compiler.clone());
    compile.run().unwrap();

    fs.add_file(ANALYSIS, "{ definitely not an analysis");
    let outcome = compile.run().unwrap();

    assert_eq!(dirty(&outcome), paths(&["src/A.java", "src/B.java", "src/C.java"]));
    assert!(decode_analysis(Path::new(ANALYSIS), &persisted(&fs)).is_ok());
}

#[test]
fn test_corrupt_analysis_fail_aborts() {
    let fs = project();
    fs.add_file(ANALYSIS, "garbage");
    let compiler = FakeCompiler::new(fs.clone());
    let mut compile = incremental_with(&fs, compiler.clone(), CorruptAnalysisBehaviour::Fail);

    assert!(matches!(compile.run(), Err(BuildError::AnalysisCorrupt { .. })));
    assert_eq!(compiler.call_count(), 0);
}

#[test]
fn test_reported_tests_are_listed() {
    let fs = project();
    let compiler = FakeCompiler::new(fs.clone())
        .with_test("src/C.java", TestDefinition::new("C", "TestCase", false));
    let mut compile = incremental(&fs, compiler);
    compile.run().unwrap();

    let tests: Vec<_> = compile.analysis().tests().collect();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].0, Path::new("src/C.java"));
    assert_eq!(tests[0].1.class_name, "C");
}

#[test]
fn test_dependency_outside_snapshot_is_not_recorded() {
    let fs = project();
    let compiler = FakeCompiler::new(fs.clone())
        .with_dependency("src/B.java", "src/Missing.java")
        .with_dependency("src/B.java", "src/B.java");
    let mut compile = incremental(&fs, compiler);
    compile.run().unwrap();

    assert!(compile
        .analysis()
        .source_dependencies(Path::new("src/B.java"))
        .is_empty());
}

#[test]
fn test_compile_and_clean_tasks_share_state() {
    let fs = project();
    let shared = Rc::new(RefCell::new(incremental(
        &fs,
        FakeCompiler::new(fs.clone()).failing_after(2),
    )));
    let compile = compile_task(&shared);
    let clean = clean_task(&shared);

    assert_eq!(compile.description(), Some("compile"));
    assert_eq!(clean.description(), Some("clean"));

    let report = compile.run().unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failure.unwrap().task, "compile");

    // Nothing was saved; clean still succeeds on the empty analysis.
    assert!(clean.run().unwrap().is_success());
    assert!(shared.borrow().analysis().is_empty());
}
