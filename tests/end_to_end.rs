// tests/end_to_end.rs

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use steadybuild::cli::CliArgs;
use steadybuild::run;
use steadybuild_test_utils::init_tracing;
use tempfile::TempDir;

const COMPILER: &str = r#"mkdir -p "$STEADYBUILD_OUTPUT_DIR"
for src in "$@"; do
  base=$(basename "$src" .java)
  echo "$src" >> compile.log
  touch "$STEADYBUILD_OUTPUT_DIR/$base.class"
  echo "@source $src"
  echo "@product $src -> $STEADYBUILD_OUTPUT_DIR/$base.class"
done
"#;

const DEFINITION: &str = r#"
[sources]
include = ["src/**/*.java"]

[compile]
cmd = "sh compile.sh"

[task.package]
cmd = "touch app.jar"
after = ["compile"]

[task.broken]
cmd = "exit 4"
after = ["compile"]
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("compile.sh"), COMPILER).unwrap();
    fs::write(dir.path().join("Steadybuild.toml"), DEFINITION).unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/A.java"), "class A {}").unwrap();
    fs::write(dir.path().join("src/B.java"), "class B {}").unwrap();
    dir
}

fn args(dir: &TempDir, tasks: &[&str]) -> CliArgs {
    CliArgs {
        config: dir.path().join("Steadybuild.toml").display().to_string(),
        log_level: None,
        dry_run: false,
        deps_only: false,
        watch: false,
        list_tests: false,
        tasks: tasks.iter().map(|t| t.to_string()).collect(),
    }
}

fn compiled(dir: &TempDir) -> Vec<String> {
    fs::read_to_string(dir.path().join("compile.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn bump(path: &Path) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();
}

#[test]
fn test_package_compiles_then_only_changes_recompile() {
    init_tracing();
    let dir = project();

    run(args(&dir, &["package"])).unwrap();
    assert_eq!(compiled(&dir), vec!["src/A.java", "src/B.java"]);
    assert!(dir.path().join("app.jar").exists());
    assert!(dir.path().join("target/classes/A.class").exists());
    assert!(dir.path().join(".steadybuild/analysis.json").exists());

    // Default task is `compile`; nothing changed.
    run(args(&dir, &[])).unwrap();
    assert_eq!(compiled(&dir).len(), 2);

    bump(&dir.path().join("src/A.java"));
    run(args(&dir, &[])).unwrap();
    assert_eq!(compiled(&dir), vec!["src/A.java", "src/B.java", "src/A.java"]);
}

#[test]
fn test_failing_task_is_reported() {
    let dir = project();

    let err = run(args(&dir, &["broken"])).unwrap_err();

    assert!(format!("{err:#}").contains("broken"));
    // Its dependency still ran first.
    assert_eq!(compiled(&dir).len(), 2);
}

#[test]
fn test_deps_only_skips_requested_task() {
    let dir = project();
    let mut deps_only = args(&dir, &["package"]);
    deps_only.deps_only = true;

    run(deps_only).unwrap();

    assert_eq!(compiled(&dir).len(), 2);
    assert!(!dir.path().join("app.jar").exists());
}

#[test]
fn test_unknown_task_fails_before_running_anything() {
    let dir = project();

    assert!(run(args(&dir, &["package", "nope"])).is_err());
    assert!(compiled(&dir).is_empty());
}

#[test]
fn test_clean_removes_compiled_output() {
    let dir = project();
    run(args(&dir, &["compile"])).unwrap();

    run(args(&dir, &["clean"])).unwrap();

    assert!(!dir.path().join("target/classes/A.class").exists());
    run(args(&dir, &["compile"])).unwrap();
    assert_eq!(compiled(&dir).len(), 4);
}
