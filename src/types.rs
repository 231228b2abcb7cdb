use std::str::FromStr;
use serde::Deserialize;

/// Outcome of a task action.
///
/// Failure is an expected result carrying a descriptive message; it is not
/// an error of the scheduler itself.
pub type ActionResult = Result<(), String>;

/// What the compile task does when the persisted analysis cannot be read.
///
/// - `Reset`: log a warning and continue with an empty analysis (full rebuild).
/// - `Fail`: fail the compile task with the corruption message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptAnalysisBehaviour {
    Reset,
    Fail,
}

impl Default for CorruptAnalysisBehaviour {
    fn default() -> Self {
        CorruptAnalysisBehaviour::Reset
    }
}

impl FromStr for CorruptAnalysisBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reset" => Ok(CorruptAnalysisBehaviour::Reset),
            "fail" => Ok(CorruptAnalysisBehaviour::Fail),
            other => Err(format!(
                "invalid corrupt_analysis: {other} (expected \"reset\" or \"fail\")"
            )),
        }
    }
}

/// Where the analysis is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStorageMode {
    /// Persist to `[config].analysis_path`.
    File,
    /// Keep in memory only (lost on exit).
    Memory,
}

impl Default for AnalysisStorageMode {
    fn default() -> Self {
        AnalysisStorageMode::File
    }
}
