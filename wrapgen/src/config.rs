//! Configuration types for `wrapgen.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    /// XML input documents, processed in order. Later documents may
    /// redefine types registered by earlier ones.
    pub inputs: Vec<PathBuf>,
    /// Additional directories searched when resolving `<include>` paths.
    /// Each entry is tried in order after the including file's directory.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// XML schema path. Validation requires an external tool; when set the
    /// file's presence is verified up front so a bad path fails fast.
    #[serde(default)]
    pub schema: Option<PathBuf>,
    #[serde(default)]
    pub glue: Option<GlueConfig>,
    #[serde(default)]
    pub abi_check: Option<AbiCheckConfig>,
}

/// Output settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Assembly name stamped into the generated units.
    pub assembly: String,
    /// Directory the wrapper units are written to.
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    /// Object-registration mapping file, relative to `directory`.
    #[serde(default)]
    pub registration: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

/// Native glue helper output.
#[derive(Debug, Deserialize)]
pub struct GlueConfig {
    /// Shared library name the generated wrappers bind against.
    pub library: String,
    /// Glue source file path, relative to the output directory.
    #[serde(default = "default_glue_file")]
    pub file: PathBuf,
}

fn default_glue_file() -> PathBuf {
    PathBuf::from("glue.c")
}

/// ABI self-check pair: one native source and one managed source printing
/// matching size/offset tables for build-time cross-validation.
#[derive(Debug, Deserialize)]
pub struct AbiCheckConfig {
    #[serde(default = "default_abi_native")]
    pub native_file: PathBuf,
    #[serde(default = "default_abi_managed")]
    pub managed_file: PathBuf,
}

fn default_abi_native() -> PathBuf {
    PathBuf::from("abi-check.c")
}

fn default_abi_managed() -> PathBuf {
    PathBuf::from("abi-check.gen")
}

/// Load and parse a `wrapgen.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}
