// tests/scheduler.rs

use std::cell::RefCell;
use std::rc::Rc;

use steadybuild::dag::{run, run_dependencies_only, Dag, Task};
use steadybuild::types::ActionResult;
use steadybuild_test_utils::init_tracing;

type Log = Rc<RefCell<Vec<String>>>;

fn recording(log: &Log, name: &str, result: ActionResult) -> Task {
    let log = Rc::clone(log);
    let label = name.to_string();
    Task::new(move || {
        log.borrow_mut().push(label.clone());
        result.clone()
    })
    .described_as(name)
}

fn ok(log: &Log, name: &str) -> Task {
    recording(log, name, Ok(()))
}

fn failing(log: &Log, name: &str) -> Task {
    recording(log, name, Err(format!("{name} broke")))
}

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[test]
fn test_chain_runs_dependencies_first() {
    init_tracing();
    let log = new_log();
    let a = ok(&log, "A");
    let b = ok(&log, "B").depends_on(&[a]);
    let c = ok(&log, "C").depends_on(&[b]);

    let report = c.run().unwrap();

    assert!(report.is_success());
    assert_eq!(*log.borrow(), vec!["A", "B", "C"]);
    assert_eq!(report.invoked, vec!["A", "B", "C"]);
}

#[test]
fn test_diamond_runs_shared_dependency_once() {
    init_tracing();
    let log = new_log();
    let a = ok(&log, "A");
    let b = ok(&log, "B").depends_on(&[a.clone()]);
    let c = ok(&log, "C").depends_on(&[a]);
    let d = ok(&log, "D").depends_on(&[b, c]);

    let report = run(&d).unwrap();

    assert!(report.is_success());
    let log = log.borrow();
    assert_eq!(log.len(), 4);
    assert_eq!(log.iter().filter(|n| *n == "A").count(), 1);
    assert_eq!(log.first().map(String::as_str), Some("A"));
    assert_eq!(log.last().map(String::as_str), Some("D"));
}

#[test]
fn test_failure_skips_everything_after_it() {
    init_tracing();
    let log = new_log();
    let a = ok(&log, "A");
    let b = failing(&log, "B").depends_on(&[a]);
    let c = ok(&log, "C").depends_on(&[b]);

    let report = c.run().unwrap();

    assert!(!report.is_success());
    assert_eq!(*log.borrow(), vec!["A", "B"]);
    let failure = report.failure.clone().unwrap();
    assert_eq!(failure.task, "B");
    assert_eq!(failure.message, "B broke");
    assert_eq!(report.outcome(), Err("B broke".to_string()));
}

#[test]
fn test_dependencies_only_skips_root_action() {
    init_tracing();
    let log = new_log();
    let a = ok(&log, "A");
    let b = ok(&log, "B").depends_on(&[a]);
    let c = ok(&log, "C").depends_on(&[b]);

    let report = run_dependencies_only(&c).unwrap();

    assert!(report.is_success());
    assert_eq!(*log.borrow(), vec!["A", "B"]);
}

#[test]
fn test_dependencies_only_without_dependencies_does_nothing() {
    let log = new_log();
    let a = ok(&log, "A");

    let report = a.run_dependencies_only().unwrap();

    assert!(report.is_success());
    assert!(report.invoked.is_empty());
    assert!(log.borrow().is_empty());
}

#[test]
fn test_dependencies_only_reports_dependency_failure() {
    let log = new_log();
    let a = failing(&log, "A");
    let b = ok(&log, "B").depends_on(&[a]);

    let report = b.run_dependencies_only().unwrap();

    assert_eq!(report.outcome(), Err("A broke".to_string()));
    assert_eq!(*log.borrow(), vec!["A"]);
}

#[test]
fn test_described_as_keeps_original_untouched() {
    let log = new_log();
    let a = Task::new(|| Ok(()));
    let b = a.described_as("build things");

    assert_eq!(a.description(), None);
    assert_eq!(b.description(), Some("build things"));
    assert!(!a.same_as(&b));
    assert_eq!(b.label(), "build things");
    assert_eq!(a.label(), "<unnamed task>");

    let c = ok(&log, "C");
    let d = c.depends_on(&[a.clone()]);
    assert!(c.dependencies().is_empty());
    assert_eq!(d.dependencies().len(), 1);
    assert_eq!(d.description(), Some("C"));
}

#[test]
fn test_depends_on_ignores_duplicates() {
    let a = Task::noop();
    let b = Task::noop().depends_on(&[a.clone(), a.clone()]).depends_on(&[a]);

    assert_eq!(b.dependencies().len(), 1);
}

#[test]
fn test_interactive_flag_survives_combinators() {
    let a = Task::interactive(|| Ok(()));
    let b = a.described_as("console").depends_on(&[Task::noop()]);

    assert!(a.is_interactive());
    assert!(b.is_interactive());
    assert!(!Task::noop().is_interactive());
}

#[test]
fn test_and_left_success_skips_right() {
    let log = new_log();
    let left = ok(&log, "left");
    let right = ok(&log, "right");

    let combined = &left & &right;

    assert_eq!(combined.invoke(), Ok(()));
    assert_eq!(*log.borrow(), vec!["left"]);
}

#[test]
fn test_and_left_failure_reports_right_outcome() {
    let log = new_log();
    let left = failing(&log, "left");
    let right = ok(&log, "right");

    let combined = left.and(&right);

    assert_eq!(combined.invoke(), Ok(()));
    assert_eq!(*log.borrow(), vec!["left", "right"]);
}

#[test]
fn test_and_both_fail_reports_right_message() {
    let log = new_log();
    let left = failing(&log, "left");
    let right = failing(&log, "right");

    let combined = left & right;

    assert_eq!(combined.invoke(), Err("right broke".to_string()));
}

#[test]
fn test_and_merges_dependencies_and_flags() {
    let log = new_log();
    let shared = ok(&log, "shared");
    let only_left = ok(&log, "only-left");
    let only_right = ok(&log, "only-right");

    let left = ok(&log, "left").depends_on(&[shared.clone(), only_left.clone()]);
    let right = Task::interactive(|| Ok(())).depends_on(&[only_right.clone(), shared.clone()]);

    let combined = left.and(&right);

    assert_eq!(combined.description(), None);
    assert!(combined.is_interactive());
    let deps = combined.dependencies();
    assert_eq!(deps.len(), 3);
    assert!(deps[0].same_as(&shared));
    assert!(deps[1].same_as(&only_left));
    assert!(deps[2].same_as(&only_right));

    let report = combined.run().unwrap();
    assert!(report.is_success());
    let log = log.borrow();
    assert_eq!(log.len(), 4);
    assert_eq!(log.last().map(String::as_str), Some("left"));
    for name in ["shared", "only-left", "only-right"] {
        assert!(log.iter().any(|n| n == name), "{name} did not run");
    }
}

#[test]
fn test_running_twice_invokes_again() {
    let log = new_log();
    let a = ok(&log, "A");

    a.run().unwrap();
    a.run().unwrap();

    assert_eq!(*log.borrow(), vec!["A", "A"]);
}
