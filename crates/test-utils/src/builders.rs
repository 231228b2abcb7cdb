#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use steadybuild::config::{
    CompileSection, ConfigFile, ConfigSection, RawConfigFile, SourcesSection, TaskConfig,
};
use steadybuild::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                sources: SourcesSection::default(),
                compile: None,
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_source(mut self, pattern: &str) -> Self {
        self.config.sources.include.push(pattern.to_string());
        self
    }

    pub fn with_source_exclude(mut self, pattern: &str) -> Self {
        self.config.sources.exclude.push(pattern.to_string());
        self
    }

    /// Add a `[compile]` section with default label and output directory.
    pub fn with_compile(mut self, cmd: &str) -> Self {
        self.config.compile = Some(CompileSection {
            cmd: cmd.to_string(),
            label: "main".to_string(),
            output_dir: PathBuf::from("target/classes"),
            search_path: Vec::new(),
            options: Vec::new(),
        });
        self
    }

    pub fn with_search_path(mut self, entry: &str) -> Self {
        if let Some(compile) = self.config.compile.as_mut() {
            compile.search_path.push(PathBuf::from(entry));
        }
        self
    }

    pub fn with_analysis_path(mut self, path: &str) -> Self {
        self.config.config.analysis_path = PathBuf::from(path);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: vec![],
                description: None,
                interactive: false,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = Some(description.to_string());
        self
    }

    pub fn interactive(mut self) -> Self {
        self.task.interactive = true;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
