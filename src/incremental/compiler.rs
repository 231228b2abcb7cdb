// src/incremental/compiler.rs

//! The contract between the incremental engine and a compiler.
//!
//! A [`CompilerAdapter`] receives the dirty sources and reports what it
//! learns about each one through an [`AnalysisCallback`] while it runs.
//! [`CommandCompiler`] is an adapter that runs an external command and reads
//! those reports from its stdout.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::thread;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::exec::shell_command;
use crate::incremental::analysis::{Analysis, TestDefinition};
use crate::types::ActionResult;

/// Everything a compiler needs for one pass.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub label: &'a str,
    pub sources: &'a BTreeSet<PathBuf>,
    pub search_path: &'a [PathBuf],
    pub output_dir: &'a Path,
    pub options: &'a [String],
}

/// Receives relationships discovered during compilation, per source, as soon
/// as they are known.
pub trait AnalysisCallback {
    /// `source` is being processed. Called before any other report for it.
    fn begin_source(&mut self, source: &Path);
    fn generated_product(&mut self, source: &Path, artifact: &Path);
    fn source_dependency(&mut self, source: &Path, dependency: &Path);
    /// `external` is relative to the project root (a leading `./` is fine)
    /// or absolute.
    fn external_dependency(&mut self, source: &Path, external: &Path);
    fn found_test(&mut self, source: &Path, test: TestDefinition);
}

pub trait CompilerAdapter: Debug {
    /// Compile `request.sources`, reporting into `callback`.
    ///
    /// Must block until compilation has finished. Reports already made stay
    /// in the callback even if the pass fails.
    fn compile(&mut self, request: &CompileRequest<'_>, callback: &mut dyn AnalysisCallback)
    -> ActionResult;
}

/// Writes callback reports into an [`Analysis`].
///
/// Dependencies on sources outside the current snapshot are dropped, as are
/// self references. Every reported artifact is remembered so a failed pass
/// can remove what it wrote.
#[derive(Debug)]
pub struct AnalysisRecorder<'a> {
    analysis: &'a mut Analysis,
    sources: &'a BTreeSet<PathBuf>,
    generated: BTreeSet<PathBuf>,
}

impl<'a> AnalysisRecorder<'a> {
    pub fn new(analysis: &'a mut Analysis, sources: &'a BTreeSet<PathBuf>) -> Self {
        Self {
            analysis,
            sources,
            generated: BTreeSet::new(),
        }
    }

    /// Artifacts reported during this pass.
    pub fn generated_products(&self) -> &BTreeSet<PathBuf> {
        &self.generated
    }

    pub fn into_generated_products(self) -> BTreeSet<PathBuf> {
        self.generated
    }
}

impl AnalysisCallback for AnalysisRecorder<'_> {
    fn begin_source(&mut self, source: &Path) {
        self.analysis.begin_source(source);
    }

    fn generated_product(&mut self, source: &Path, artifact: &Path) {
        self.generated.insert(artifact.to_path_buf());
        self.analysis.add_product(source, artifact);
    }

    fn source_dependency(&mut self, source: &Path, dependency: &Path) {
        if source == dependency || !self.sources.contains(dependency) {
            debug!(source = ?source, dependency = ?dependency, "ignoring dependency outside snapshot");
            return;
        }
        self.analysis.add_source_dependency(source, dependency);
    }

    fn external_dependency(&mut self, source: &Path, external: &Path) {
        self.analysis.add_external_dependency(source, external);
    }

    fn found_test(&mut self, source: &Path, test: TestDefinition) {
        self.analysis.add_test(source, test);
    }
}

/// One line of the command compiler's report protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerRecord {
    Source(PathBuf),
    Product { source: PathBuf, artifact: PathBuf },
    Depends { source: PathBuf, dependency: PathBuf },
    External { source: PathBuf, external: PathBuf },
    Test { source: PathBuf, test: TestDefinition },
}

static RECORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@(?P<kind>source|product|depends|external|test)\s+(?P<source>.+?)(?:\s+->\s+(?P<target>.+?))?\s*$")
        .expect("record pattern is valid")
});

static TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<class>\S+)\s+extends\s+(?P<super>\S+)(?P<module>\s+module)?$")
        .expect("test pattern is valid")
});

/// Parse one stdout line. Lines that are not records yield `None`.
///
/// ```text
/// @source src/A.java
/// @product src/A.java -> out/A.class
/// @depends src/B.java -> src/A.java
/// @external src/B.java -> lib/util.jar
/// @test src/ATest.java -> ATest extends TestCase
/// @test src/Main.scala -> Main extends Properties module
/// ```
pub fn parse_record(line: &str) -> Option<CompilerRecord> {
    let caps = RECORD_RE.captures(line.trim_end())?;
    let source = PathBuf::from(&caps["source"]);
    let target = caps.name("target").map(|m| m.as_str());

    match (&caps["kind"], target) {
        ("source", None) => Some(CompilerRecord::Source(source)),
        ("product", Some(t)) => Some(CompilerRecord::Product {
            source,
            artifact: PathBuf::from(t),
        }),
        ("depends", Some(t)) => Some(CompilerRecord::Depends {
            source,
            dependency: PathBuf::from(t),
        }),
        ("external", Some(t)) => Some(CompilerRecord::External {
            source,
            external: PathBuf::from(t),
        }),
        ("test", Some(t)) => {
            let test = TEST_RE.captures(t)?;
            Some(CompilerRecord::Test {
                source,
                test: TestDefinition::new(
                    &test["class"],
                    &test["super"],
                    test.name("module").is_some(),
                ),
            })
        }
        _ => None,
    }
}

/// Forward a parsed record to the callback.
pub fn dispatch_record(record: CompilerRecord, callback: &mut dyn AnalysisCallback) {
    match record {
        CompilerRecord::Source(source) => callback.begin_source(&source),
        CompilerRecord::Product { source, artifact } => {
            callback.generated_product(&source, &artifact)
        }
        CompilerRecord::Depends { source, dependency } => {
            callback.source_dependency(&source, &dependency)
        }
        CompilerRecord::External { source, external } => {
            callback.external_dependency(&source, &external)
        }
        CompilerRecord::Test { source, test } => callback.found_test(&source, test),
    }
}

/// How many trailing stderr lines to quote in a failure message.
const STDERR_TAIL: usize = 20;

/// Adapter running an external compiler command.
///
/// The command gets the options followed by the dirty sources as arguments,
/// and `STEADYBUILD_LABEL`, `STEADYBUILD_OUTPUT_DIR`, `STEADYBUILD_SEARCH_PATH`
/// in its environment. Records on stdout (see [`parse_record`]) are passed to
/// the callback as they arrive.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    cmd: String,
    cwd: PathBuf,
}

impl CommandCompiler {
    pub fn new(cmd: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            cwd: cwd.into(),
        }
    }

    fn command_line(&self, request: &CompileRequest<'_>) -> String {
        let mut line = self.cmd.clone();
        let args = request
            .options
            .iter()
            .cloned()
            .chain(request.sources.iter().map(|s| s.to_string_lossy().into_owned()));
        for arg in args {
            line.push(' ');
            line.push_str(&shell_quote(&arg));
        }
        line
    }
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@".contains(c))
    {
        arg.to_string()
    } else if cfg!(windows) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

impl CompilerAdapter for CommandCompiler {
    fn compile(
        &mut self,
        request: &CompileRequest<'_>,
        callback: &mut dyn AnalysisCallback,
    ) -> ActionResult {
        let line = self.command_line(request);
        let search_path = std::env::join_paths(request.search_path)
            .map_err(|e| format!("invalid search path: {e}"))?;

        info!(
            label = %request.label,
            sources = request.sources.len(),
            cmd = %self.cmd,
            "starting compiler"
        );

        let mut child = shell_command(&line)
            .current_dir(&self.cwd)
            .env("STEADYBUILD_LABEL", request.label)
            .env("STEADYBUILD_OUTPUT_DIR", request.output_dir)
            .env("STEADYBUILD_SEARCH_PATH", search_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn compiler `{}`: {e}", self.cmd))?;

        // Always consume stderr so buffers don't fill; keep the tail for errors.
        let stderr_reader = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!("compiler stderr: {}", line);
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail
            })
        });

        let mut records = 0usize;
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                match parse_record(&line) {
                    Some(record) => {
                        records += 1;
                        dispatch_record(record, callback);
                    }
                    None => debug!("compiler stdout: {}", line),
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| format!("waiting for compiler `{}`: {e}", self.cmd))?;

        let stderr_tail: Vec<String> = match stderr_reader.map(|h| h.join()) {
            Some(Ok(tail)) => tail.into_iter().collect(),
            _ => Vec::new(),
        };

        let code = status.code().unwrap_or(-1);
        info!(
            label = %request.label,
            exit_code = code,
            records,
            "compiler exited"
        );

        if status.success() {
            Ok(())
        } else {
            warn!(label = %request.label, exit_code = code, "compilation failed");
            let mut message = format!("compiler `{}` exited with code {code}", self.cmd);
            if !stderr_tail.is_empty() {
                message.push('\n');
                message.push_str(&stderr_tail.join("\n"));
            }
            Err(message)
        }
    }
}
