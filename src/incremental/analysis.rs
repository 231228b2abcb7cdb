// src/incremental/analysis.rs

//! The persisted relation between sources, artifacts and externals.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

static EMPTY: BTreeSet<PathBuf> = BTreeSet::new();

/// A test discovered by the compiler in one source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestDefinition {
    pub class_name: String,
    /// Superclass or marker the test was recognised by.
    pub superclass_name: String,
    /// Whether the test is a singleton entry point rather than a class.
    pub is_module: bool,
}

impl TestDefinition {
    pub fn new(
        class_name: impl Into<String>,
        superclass_name: impl Into<String>,
        is_module: bool,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            superclass_name: superclass_name.into(),
            is_module,
        }
    }
}

/// Source ↔ artifact ↔ external relation plus test registrations.
///
/// A source is *known* once it has an entry in `products`, even an empty one.
/// Every edge is stored in both directions; the mutators keep both sides in
/// step and drop sets that become empty, so two analyses describing the same
/// relation compare (and serialize) equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    products: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// source -> managed sources it references
    dependencies: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// source -> managed sources referencing it
    dependents: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// source -> externals it references
    external_dependencies: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// external -> sources referencing it
    external_dependents: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    tests: BTreeMap<PathBuf, BTreeSet<TestDefinition>>,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.dependencies.is_empty()
            && self.dependents.is_empty()
            && self.external_dependencies.is_empty()
            && self.external_dependents.is_empty()
            && self.tests.is_empty()
    }

    /// Every source that has been processed at least once.
    pub fn all_sources(&self) -> BTreeSet<PathBuf> {
        self.products.keys().cloned().collect()
    }

    /// Every artifact produced by any known source.
    pub fn all_products(&self) -> BTreeSet<PathBuf> {
        self.products.values().flatten().cloned().collect()
    }

    /// Every external that at least one known source depends on.
    pub fn all_externals(&self) -> BTreeSet<PathBuf> {
        self.external_dependents.keys().cloned().collect()
    }

    pub fn is_known(&self, source: &Path) -> bool {
        self.products.contains_key(source)
    }

    /// Artifacts of `source`, or `None` if the source was never processed.
    pub fn products(&self, source: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.products.get(source)
    }

    /// Managed sources that `source` references.
    pub fn source_dependencies(&self, source: &Path) -> &BTreeSet<PathBuf> {
        self.dependencies.get(source).unwrap_or(&EMPTY)
    }

    /// Managed sources that reference `source`.
    pub fn dependents(&self, source: &Path) -> &BTreeSet<PathBuf> {
        self.dependents.get(source).unwrap_or(&EMPTY)
    }

    pub fn external_dependencies(&self, source: &Path) -> &BTreeSet<PathBuf> {
        self.external_dependencies.get(source).unwrap_or(&EMPTY)
    }

    /// Sources that reference `external`.
    pub fn external_dependents(&self, external: &Path) -> &BTreeSet<PathBuf> {
        self.external_dependents.get(external).unwrap_or(&EMPTY)
    }

    /// All registered tests with the source that declared them.
    pub fn tests(&self) -> impl Iterator<Item = (&Path, &TestDefinition)> {
        self.tests
            .iter()
            .flat_map(|(src, defs)| defs.iter().map(move |d| (src.as_path(), d)))
    }

    /// Mark `source` as processed, with no artifacts yet.
    pub fn begin_source(&mut self, source: &Path) {
        self.products.entry(source.to_path_buf()).or_default();
    }

    pub fn add_product(&mut self, source: &Path, artifact: &Path) {
        self.products
            .entry(source.to_path_buf())
            .or_default()
            .insert(artifact.to_path_buf());
    }

    /// Record that `source` references the managed source `dependency`.
    /// Self references are ignored.
    pub fn add_source_dependency(&mut self, source: &Path, dependency: &Path) {
        if source == dependency {
            return;
        }
        self.dependencies
            .entry(source.to_path_buf())
            .or_default()
            .insert(dependency.to_path_buf());
        self.dependents
            .entry(dependency.to_path_buf())
            .or_default()
            .insert(source.to_path_buf());
    }

    pub fn add_external_dependency(&mut self, source: &Path, external: &Path) {
        self.external_dependencies
            .entry(source.to_path_buf())
            .or_default()
            .insert(external.to_path_buf());
        self.external_dependents
            .entry(external.to_path_buf())
            .or_default()
            .insert(source.to_path_buf());
    }

    pub fn add_test(&mut self, source: &Path, test: TestDefinition) {
        self.tests.entry(source.to_path_buf()).or_default().insert(test);
    }

    /// Delete everything recorded for `source`: artifacts, tests, and edges in
    /// both directions.
    pub fn remove_source(&mut self, source: &Path) {
        self.products.remove(source);
        self.tests.remove(source);
        self.remove_dependent(source);
        self.dependencies.remove(source);
        self.remove_dependencies(source);

        if let Some(externals) = self.external_dependencies.remove(source) {
            for external in externals {
                remove_edge(&mut self.external_dependents, &external, source);
            }
        }
    }

    /// Drop `source` from the dependents of every source it references.
    ///
    /// The forward edges of `source` itself are left in place.
    pub fn remove_dependent(&mut self, source: &Path) {
        let Some(deps) = self.dependencies.get(source) else {
            return;
        };
        for dep in deps {
            remove_edge(&mut self.dependents, dep, source);
        }
    }

    /// Remove every edge pointing at `source` and return the sources those
    /// edges came from (the former dependents of `source`).
    ///
    /// Each edge is consumed once: a second call returns an empty set.
    pub fn remove_dependencies(&mut self, source: &Path) -> BTreeSet<PathBuf> {
        let dependents = self.dependents.remove(source).unwrap_or_default();
        for dependent in &dependents {
            remove_edge(&mut self.dependencies, dependent, source);
        }
        dependents
    }

    /// Forget `external` and every source's reference to it.
    pub fn remove_external_dependency(&mut self, external: &Path) {
        if let Some(sources) = self.external_dependents.remove(external) {
            for source in sources {
                remove_edge(&mut self.external_dependencies, &source, external);
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn remove_edge(map: &mut BTreeMap<PathBuf, BTreeSet<PathBuf>>, from: &Path, to: &Path) {
    if let Some(set) = map.get_mut(from) {
        set.remove(to);
        if set.is_empty() {
            map.remove(from);
        }
    }
}
