// tests/dag_graph.rs

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use steadybuild::dag::{topological_sort, Dag, Task, TaskRegistry};
use steadybuild::errors::BuildError;
use steadybuild_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

/// A graph given as an adjacency table, so cycles can be expressed.
#[derive(Clone)]
struct TableNode {
    name: &'static str,
    table: Rc<HashMap<&'static str, Vec<&'static str>>>,
}

impl TableNode {
    /// `edges` are `(node, predecessor)` pairs.
    fn new(name: &'static str, edges: &[(&'static str, &'static str)]) -> Self {
        let mut table: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for (node, pred) in edges {
            table.entry(*node).or_default().push(*pred);
        }
        Self {
            name,
            table: Rc::new(table),
        }
    }
}

impl Dag for TableNode {
    type Key = &'static str;

    fn key(&self) -> &'static str {
        self.name
    }

    fn predecessors(&self) -> Vec<Self> {
        self.table
            .get(self.name)
            .into_iter()
            .flatten()
            .map(|name| TableNode {
                name: *name,
                table: Rc::clone(&self.table),
            })
            .collect()
    }

    fn label(&self) -> String {
        self.name.to_string()
    }
}

fn names(order: &[TableNode]) -> Vec<&'static str> {
    order.iter().map(|n| n.name).collect()
}

#[test]
fn test_topological_sort_orders_predecessors_first() {
    let root = TableNode::new(
        "app",
        &[("app", "lib"), ("app", "util"), ("lib", "util")],
    );

    let order = names(&topological_sort(&root).unwrap());

    assert_eq!(order, vec!["util", "lib", "app"]);
}

#[test]
fn test_topological_sort_single_node() {
    let root = TableNode::new("alone", &[]);

    let order = names(&topological_sort(&root).unwrap());

    assert_eq!(order, vec!["alone"]);
}

#[test]
fn test_cycle_is_reported_not_looped() {
    let root = TableNode::new(
        "a",
        &[("a", "b"), ("b", "c"), ("c", "a")],
    );

    match topological_sort(&root) {
        Err(BuildError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
        }
        other => panic!("expected DagCycle, got {:?}", other.map(|o| names(&o))),
    }
}

#[test]
fn test_self_loop_is_a_cycle() {
    let root = TableNode::new("a", &[("a", "a")]);

    assert!(matches!(topological_sort(&root), Err(BuildError::DagCycle(_))));
}

#[test]
fn test_cycle_below_root_is_detected() {
    let root = TableNode::new(
        "top",
        &[("top", "x"), ("x", "y"), ("y", "x")],
    );

    assert!(matches!(topological_sort(&root), Err(BuildError::DagCycle(_))));
}

#[test]
fn test_registry_rejects_forward_reference() {
    let mut registry = TaskRegistry::new();
    let result = registry.register_after("package", Task::noop(), &["compile".to_string()]);

    match result {
        Err(BuildError::MissingDependency(msg)) => {
            assert!(msg.contains("package"));
            assert!(msg.contains("compile"));
        }
        other => panic!("expected MissingDependency, got {other:?}"),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_registry_resolves_registered_dependencies() {
    let mut registry = TaskRegistry::new();
    let compile = Task::noop().described_as("compile");
    registry.register("compile", compile.clone()).unwrap();

    let package = registry
        .register_after("package", Task::noop(), &["compile".to_string()])
        .unwrap();

    assert_eq!(package.dependencies().len(), 1);
    assert!(package.dependencies()[0].same_as(&compile));
    assert!(registry.get("package").unwrap().same_as(&package));
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["compile", "package"]);
}

#[test]
fn test_registry_rejects_duplicates_and_unknown_names() {
    let mut registry = TaskRegistry::new();
    registry.register("a", Task::noop()).unwrap();

    assert!(matches!(
        registry.register("a", Task::noop()),
        Err(BuildError::ConfigError(_))
    ));
    assert!(matches!(registry.get("nope"), Err(BuildError::TaskNotFound(_))));
}

#[test]
fn test_registry_from_config_wires_after_in_dependency_order() {
    // `a` sorts before `z` by name but depends on it.
    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").after("z").build())
        .with_task(
            "z",
            TaskConfigBuilder::new("true").description("zed").build(),
        )
        .build();

    let registry = TaskRegistry::from_config(&cfg, Path::new("."), Vec::new()).unwrap();

    let a = registry.get("a").unwrap();
    let z = registry.get("z").unwrap();
    assert_eq!(a.description(), Some("a"));
    assert_eq!(z.description(), Some("zed"));
    assert_eq!(a.dependencies().len(), 1);
    assert!(a.dependencies()[0].same_as(&z));
}

#[test]
fn test_registry_from_config_links_builtins() {
    let cfg = ConfigFileBuilder::new()
        .with_source("src/**/*.java")
        .with_compile("javac-adapter")
        .with_task(
            "package",
            TaskConfigBuilder::new("true").after("compile").build(),
        )
        .build();
    let compile = Task::noop().described_as("compile");

    let registry = TaskRegistry::from_config(
        &cfg,
        Path::new("."),
        vec![("compile".to_string(), compile.clone())],
    )
    .unwrap();

    let package = registry.get("package").unwrap();
    assert!(package.dependencies()[0].same_as(&compile));
}
