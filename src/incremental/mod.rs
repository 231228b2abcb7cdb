// src/incremental/mod.rs

//! Incremental compilation.
//!
//! - [`analysis`]: the persisted relation between sources, artifacts,
//!   source dependencies, externals and tests.
//! - [`store`]: loading, saving and reverting that relation.
//! - [`oracle`]: existence and timestamps of sources, artifacts, externals.
//! - [`detect`]: decides which sources must be recompiled.
//! - [`compiler`]: the contract a compiler implements, plus a command adapter.
//! - [`sources`]: where the source snapshot comes from.
//! - [`compile`]: one full pass, and the `compile` / `clean` tasks.

pub mod analysis;
pub mod compile;
pub mod compiler;
pub mod detect;
pub mod oracle;
pub mod sources;
pub mod store;

pub use analysis::{Analysis, TestDefinition};
pub use compile::{clean_task, compile_task, CompileOutcome, CompileSettings, IncrementalCompile};
pub use compiler::{
    parse_record, AnalysisCallback, AnalysisRecorder, CommandCompiler, CompileRequest,
    CompilerAdapter, CompilerRecord,
};
pub use detect::{detect_changes, ConditionalAnalysis};
pub use oracle::{FsOracle, Oracle};
pub use sources::{GlobSourceSet, SourceSet};
pub use store::{
    decode_analysis, encode_analysis, AnalysisStore, FileAnalysisStore, MemoryAnalysisStore,
    DEFAULT_ANALYSIS_PATH,
};
