// Configuration is layered, later layers winning:
// built-in defaults
// treebench.toml in $HOME
// treebench.toml in $PWD
// treebench.toml in $TREEBENCH_CONFIG_PATH (if set)
// an explicit --config file
// the model description
// command line flags

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    model::EnsembleDescription,
    shim::RunMode,
    topology::{TopologyError, TopologyShape, DEFAULT_CHANNEL_CAPACITY},
};

const FILE_NAME: &str = "treebench.toml";
const PATH_VAR: &str = "TREEBENCH_CONFIG_PATH";

pub const DEFAULT_CHECKPOINT: usize = 5000;
pub const DEFAULT_MAX_PARALLEL_SAMPLES: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Shape(#[from] TopologyError),

    #[error("checkpoint interval must be at least 1")]
    Checkpoint,
}

/// When draining stops.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Completion {
    /// Until every class stream has delivered its sentinel or closed.
    #[default]
    AllSentinels,
    /// As above, but also stop after `count` rows.
    Rows { count: usize },
}

/// How a drain row is assembled.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Wait until every unfinished class has a packet, so rows line up with samples.
    #[default]
    Aligned,
    /// Poll each class once; classes without data read `NaN`.
    Poll,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TestbenchConfig {
    pub n_trees: usize,
    /// Class streams, i.e. 1 for binary classification.
    pub n_classes: usize,
    pub bank_count: usize,
    pub trees_per_bank: Option<usize>,
    pub max_parallel_samples: usize,
    /// 0 makes every channel unbounded.
    pub channel_capacity: usize,
    /// When set, records of any other length are skipped.
    pub n_features: Option<usize>,
    /// Progress is logged every `checkpoint` records.
    pub checkpoint: usize,
    pub completion: Completion,
    pub drain_mode: DrainMode,
    pub run_mode: RunMode,
}

impl Default for TestbenchConfig {
    fn default() -> Self {
        Self {
            n_trees: 1,
            n_classes: 1,
            bank_count: 1,
            trees_per_bank: None,
            max_parallel_samples: DEFAULT_MAX_PARALLEL_SAMPLES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            n_features: None,
            checkpoint: DEFAULT_CHECKPOINT,
            completion: Completion::default(),
            drain_mode: DrainMode::default(),
            run_mode: RunMode::default(),
        }
    }
}

/// One layer of configuration. Unset fields leave the layers below untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PartialConfig {
    pub n_trees: Option<usize>,
    pub n_classes: Option<usize>,
    pub bank_count: Option<usize>,
    pub trees_per_bank: Option<usize>,
    pub max_parallel_samples: Option<usize>,
    pub channel_capacity: Option<usize>,
    pub n_features: Option<usize>,
    pub checkpoint: Option<usize>,
    pub completion: Option<Completion>,
    pub drain_mode: Option<DrainMode>,
    pub run_mode: Option<RunMode>,
}

impl PartialConfig {
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl TestbenchConfig {
    pub fn update(&mut self, other: PartialConfig) {
        let PartialConfig {
            n_trees,
            n_classes,
            bank_count,
            trees_per_bank,
            max_parallel_samples,
            channel_capacity,
            n_features,
            checkpoint,
            completion,
            drain_mode,
            run_mode,
        } = other;
        self.n_trees = n_trees.unwrap_or(self.n_trees);
        self.n_classes = n_classes.unwrap_or(self.n_classes);
        self.bank_count = bank_count.unwrap_or(self.bank_count);
        self.trees_per_bank = trees_per_bank.or(self.trees_per_bank);
        self.max_parallel_samples = max_parallel_samples.unwrap_or(self.max_parallel_samples);
        self.channel_capacity = channel_capacity.unwrap_or(self.channel_capacity);
        self.n_features = n_features.or(self.n_features);
        self.checkpoint = checkpoint.unwrap_or(self.checkpoint);
        self.completion = completion.unwrap_or(self.completion);
        self.drain_mode = drain_mode.unwrap_or(self.drain_mode);
        self.run_mode = run_mode.unwrap_or(self.run_mode);
    }

    /// The model fixes the pipeline width and the record length.
    pub fn apply_model(&mut self, model: &EnsembleDescription) {
        self.n_trees = model.n_trees;
        self.n_classes = model.class_streams();
        self.n_features = Some(model.n_features);
    }

    pub fn shape(&self) -> TopologyShape {
        TopologyShape {
            n_trees: self.n_trees,
            n_classes: self.n_classes,
            bank_count: self.bank_count,
            max_parallel_samples: self.max_parallel_samples,
            trees_per_bank: self.trees_per_bank,
            channel_capacity: (self.channel_capacity > 0).then_some(self.channel_capacity),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shape().validate()?;
        if self.checkpoint == 0 {
            return Err(ConfigError::Checkpoint);
        }
        Ok(())
    }
}

/// Directories searched for `treebench.toml`, lowest priority first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths_to_check = vec![home::home_dir(), std::env::current_dir().ok()];
    if let Ok(path) = std::env::var(PATH_VAR) {
        paths_to_check.push(Some(PathBuf::from(path)));
    }
    paths_to_check.into_iter().flatten().collect()
}

/// Applies `treebench.toml` from each directory that has one, then the explicit file, which must exist.
pub fn load_layers(
    directories: &[PathBuf],
    explicit: Option<&Path>,
) -> Result<TestbenchConfig, ConfigError> {
    let mut config = TestbenchConfig::default();
    for directory in directories {
        let candidate = directory.join(FILE_NAME);
        if candidate.is_file() {
            config.update(PartialConfig::from_toml(&candidate)?);
        }
    }
    if let Some(path) = explicit {
        config.update(PartialConfig::from_toml(path)?);
    }
    Ok(config)
}

pub fn load_config(explicit: Option<&Path>) -> Result<TestbenchConfig, ConfigError> {
    load_layers(&search_paths(), explicit)
}
