use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde_derive::Deserialize;

/// Engine-wide limits shared by matching and generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// stand-in maximum for unbounded quantifiers while generating
    pub max_gen_repetition: usize,
    /// nesting depth past which alternatives avoid recursive options
    pub max_gen_depth: usize,
    pub create_match_trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_gen_repetition: 128,
            max_gen_depth: 128,
            create_match_trace: false,
        }
    }
}

/// Generator override for one named node.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub min: Option<usize>,

    /// negative means unbounded
    #[serde(default)]
    pub max: Option<i64>,

    #[serde(default)]
    pub pow: Option<f64>,

    /// one weight per alternative child, in declaration order
    #[serde(default)]
    pub dist: Option<Vec<f64>>,
}

/// Node name to override, for one rule.
pub type RuleConfig = BTreeMap<String, NodeConfig>;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GeneratorConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolConfig {
    pub grammar: PathBuf,

    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid JSON config: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Loads a `.toml` or `.json` tool config. Any other path is taken to be the
/// grammar itself, used with default settings. A relative grammar path in a
/// config file is resolved against the config file's directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ToolConfig, ConfigReadError> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);

    let read = || {
        std::fs::read_to_string(path).map_err(|source| ConfigReadError::ReadError {
            path: path.to_path_buf(),
            source,
        })
    };

    let mut config = match extension.as_deref() {
        Some("toml") => toml::from_str::<ToolConfig>(&read()?)?,
        Some("json") => serde_json::from_str::<ToolConfig>(&read()?)?,
        _ => {
            return Ok(ToolConfig {
                grammar: path.to_path_buf(),
                generator: GeneratorConfig::default(),
            })
        }
    };

    if config.grammar.is_relative() {
        if let Some(directory) = path.parent() {
            config.grammar = directory.join(&config.grammar);
        }
    }

    Ok(config)
}
