//! Workspace configuration for clide-lsp.
//!
//! Read once at `initialize` and static for the rest of the session.

use std::path::{Path, PathBuf};

use clide_session::trigger::{DEFAULT_MIN_WORD_LEN, DEFAULT_TRIGGER};
use clide_session::{CompileArgs, TriggerError, TriggerMatcher};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub(crate) const CONFIG_FILES: &[&str] = &["clide.toml", ".clide.toml"];

/// Errors raised while reading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

/// Project configuration loaded from `clide.toml`.
#[derive(Debug, Clone)]
pub struct ClideConfig {
    /// Root directory for the workspace.
    pub root: PathBuf,
    /// Config file path (if found).
    pub config_path: Option<PathBuf>,
    /// Compiler flags handed to every parse.
    pub compile_args: Vec<String>,
    /// Header search directories, resolved against the root.
    pub include_paths: Vec<PathBuf>,
    /// Regex deciding when a trigger character should complete.
    pub trigger: String,
    /// Identifier length that triggers completion; 0 disables.
    pub min_word_len: usize,
}

impl ClideConfig {
    fn base(root: &Path, config_path: Option<PathBuf>) -> Self {
        Self {
            root: root.to_path_buf(),
            config_path,
            compile_args: Vec::new(),
            include_paths: Vec::new(),
            trigger: DEFAULT_TRIGGER.to_string(),
            min_word_len: DEFAULT_MIN_WORD_LEN,
        }
    }

    /// Load configuration for a workspace root, falling back to defaults.
    pub fn load(root: &Path) -> Self {
        match find_config_file(root) {
            Some(path) => Self::load_file(root, &path),
            None => Self::base(root, None),
        }
    }

    /// Load an explicit config file, falling back to defaults.
    pub fn load_file(root: &Path, path: &Path) -> Self {
        match Self::try_load_file(root, path) {
            Ok(config) => config,
            Err(err) => {
                warn!("{err}; using default configuration");
                Self::base(root, Some(path.to_path_buf()))
            }
        }
    }

    pub fn try_load_file(root: &Path, path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_contents(root, Some(path.to_path_buf()), &contents)
    }

    pub fn from_contents(
        root: &Path,
        config_path: Option<PathBuf>,
        contents: &str,
    ) -> Result<Self, ConfigError> {
        let parsed: ConfigFile = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: config_path.clone().unwrap_or_else(|| root.to_path_buf()),
            source,
        })?;

        let mut config = Self::base(root, config_path);
        config.compile_args = parsed.compile.args;
        config.include_paths = parsed
            .compile
            .include_paths
            .iter()
            .map(|entry| resolve_path(root, entry))
            .collect();
        if let Some(trigger) = parsed.completion.trigger {
            config.trigger = trigger;
        }
        if let Some(min_word_len) = parsed.completion.min_word_len {
            config.min_word_len = min_word_len;
        }
        Ok(config)
    }

    /// Flags for the session: configured args, `-I` per include path, then
    /// the command-line extras.
    pub fn compile_args(&self, extra: &[String]) -> CompileArgs {
        let mut args = CompileArgs::new(self.compile_args.iter().cloned());
        for dir in &self.include_paths {
            args.push(format!("-I{}", dir.display()));
        }
        for arg in extra {
            args.push(arg.clone());
        }
        args
    }

    pub fn trigger_matcher(&self) -> Result<TriggerMatcher, ConfigError> {
        Ok(TriggerMatcher::new(&self.trigger, self.min_word_len)?)
    }
}

pub(crate) fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

fn resolve_path(root: &Path, entry: &str) -> PathBuf {
    let path = PathBuf::from(entry);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    compile: CompileSection,
    #[serde(default)]
    completion: CompletionSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompileSection {
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    include_paths: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompletionSection {
    trigger: Option<String>,
    min_word_len: Option<usize>,
}
