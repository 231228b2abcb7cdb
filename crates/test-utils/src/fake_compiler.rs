use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use steadybuild::fs::mock::MockFileSystem;
use steadybuild::incremental::{AnalysisCallback, CompileRequest, CompilerAdapter, TestDefinition};
use steadybuild::types::ActionResult;

/// A compiler that "compiles" `src/X.java` into `<output_dir>/X.class` inside a
/// [`MockFileSystem`], reporting whatever relationships it was configured with.
///
/// Clones share the call log, so a test can keep one clone and hand the other
/// to the engine.
#[derive(Debug, Clone)]
pub struct FakeCompiler {
    fs: MockFileSystem,
    dependencies: BTreeMap<PathBuf, Vec<PathBuf>>,
    externals: BTreeMap<PathBuf, Vec<PathBuf>>,
    tests: BTreeMap<PathBuf, Vec<TestDefinition>>,
    fail_after: Option<usize>,
    calls: Arc<Mutex<Vec<BTreeSet<PathBuf>>>>,
}

impl FakeCompiler {
    pub fn new(fs: MockFileSystem) -> Self {
        Self {
            fs,
            dependencies: BTreeMap::new(),
            externals: BTreeMap::new(),
            tests: BTreeMap::new(),
            fail_after: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `source` references `dependency` whenever it is compiled.
    pub fn with_dependency(mut self, source: &str, dependency: &str) -> Self {
        self.dependencies
            .entry(PathBuf::from(source))
            .or_default()
            .push(PathBuf::from(dependency));
        self
    }

    pub fn with_external(mut self, source: &str, external: &str) -> Self {
        self.externals
            .entry(PathBuf::from(source))
            .or_default()
            .push(PathBuf::from(external));
        self
    }

    pub fn with_test(mut self, source: &str, test: TestDefinition) -> Self {
        self.tests.entry(PathBuf::from(source)).or_default().push(test);
        self
    }

    /// Compile `n` sources successfully, then fail the pass.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Source sets of every pass so far, in call order.
    pub fn calls(&self) -> Vec<BTreeSet<PathBuf>> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("call log poisoned").len()
    }

    /// Where the artifact of `source` ends up.
    pub fn artifact_for(output_dir: &Path, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output_dir.join(format!("{stem}.class"))
    }
}

impl CompilerAdapter for FakeCompiler {
    fn compile(
        &mut self,
        request: &CompileRequest<'_>,
        callback: &mut dyn AnalysisCallback,
    ) -> ActionResult {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(request.sources.clone());

        for (compiled, source) in request.sources.iter().enumerate() {
            if self.fail_after == Some(compiled) {
                debug!(source = ?source, compiled, "fake compiler failing");
                return Err(format!("fake compiler failed at {}", source.display()));
            }

            callback.begin_source(source);

            let artifact = Self::artifact_for(request.output_dir, source);
            self.fs.add_file(&artifact, "compiled");
            debug!(source = ?source, artifact = ?artifact, "fake compiler wrote artifact");
            callback.generated_product(source, &artifact);

            for dependency in self.dependencies.get(source).into_iter().flatten() {
                callback.source_dependency(source, dependency);
            }
            for external in self.externals.get(source).into_iter().flatten() {
                callback.external_dependency(source, external);
            }
            for test in self.tests.get(source).into_iter().flatten() {
                callback.found_test(source, test.clone());
            }
        }

        Ok(())
    }
}
