//! wrapgen — XML API description → managed wrapper generator.
//!
//! Consumes XML descriptions of a native library's API surface and decides,
//! per parameter/field/return value, how values marshal between the managed
//! type system and the unmanaged C ABI: ownership transfer, array and
//! null-terminated-array handling, struct staging, callback slots, and
//! binary-compatible struct layout.
//!
//! # Quick start
//!
//! Run the full pipeline from a config (suitable for build scripts):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads wrapgen.toml, parses the XML inputs, writes wrapper units.
//! wrapgen::run(Path::new("wrapgen.toml"), None).unwrap();
//! ```
//!
//! Or keep the generated units in memory:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let cfg = wrapgen::config::load_config(Path::new("wrapgen.toml")).unwrap();
//! let output = wrapgen::generate_from_config(&cfg, Path::new(".")).unwrap();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod abi;
pub mod config;
pub mod emit;
pub mod ir;
pub mod members;
pub mod model;
pub mod params;
pub mod parse;
pub mod stats;
pub mod strategy;
pub mod symbols;

use stats::Statistics;
use symbols::SymbolTable;

/// Run the full pipeline: load config, parse the XML inputs, validate
/// every member, and write the wrapper units plus auxiliary files.
///
/// `config_path` points at a `wrapgen.toml`; `output` optionally overrides
/// the output directory from the config. Returns the directory written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let generated = generate_from_config(&cfg, base_dir)?;

    let out_dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => base_dir.join(&cfg.output.directory),
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    for (name, text) in &generated.units {
        let file = out_dir.join(format!("{name}.gen"));
        std::fs::write(&file, text)
            .with_context(|| format!("writing {}", file.display()))?;
    }
    if let (Some(glue_cfg), Some(glue)) = (&cfg.glue, &generated.glue) {
        let file = out_dir.join(&glue_cfg.file);
        std::fs::write(&file, glue).with_context(|| format!("writing {}", file.display()))?;
    }
    if let Some(abi_cfg) = &cfg.abi_check {
        if let Some(native) = &generated.abi_check_native {
            std::fs::write(out_dir.join(&abi_cfg.native_file), native)?;
        }
        if let Some(managed) = &generated.abi_check_managed {
            std::fs::write(out_dir.join(&abi_cfg.managed_file), managed)?;
        }
    }
    if let (Some(reg_path), Some(reg)) = (&cfg.output.registration, &generated.registration) {
        std::fs::write(out_dir.join(reg_path), reg)?;
    }

    info!(
        dir = %out_dir.display(),
        units = generated.units.len(),
        "wrote wrapper units"
    );

    Ok(out_dir)
}

/// Generate wrapper units from an already-loaded [`config::Config`]
/// without touching the output directory.
///
/// `base_dir` is the directory input paths are resolved against
/// (typically the config file's parent).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<emit::Output> {
    info!(
        assembly = %cfg.output.assembly,
        inputs = cfg.inputs.len(),
        "loaded configuration"
    );

    if let Some(schema) = &cfg.schema {
        let resolved = base_dir.join(schema);
        if !resolved.exists() {
            anyhow::bail!("schema file not found: {}", resolved.display());
        }
        warn!(path = %resolved.display(), "schema validation is delegated to external tooling");
    }

    let include_dirs: Vec<PathBuf> = cfg
        .include_paths
        .iter()
        .map(|dir| base_dir.join(dir))
        .collect();

    // Phase 1: populate the symbol table — built-ins, then every parsed
    // declaration (includes fold in before the documents naming them).
    let mut table = SymbolTable::with_builtins();
    let mut apis = Vec::new();
    for input in &cfg.inputs {
        let path = base_dir.join(input);
        let api = parse::parse_file(&path, &include_dirs, &mut table)?;
        apis.push(api);
    }
    table.freeze();

    // Phase 2: validate every member against the now-complete table.
    let mut statistics = Statistics::default();
    let mut output = emit::Output::default();
    for api in apis {
        let validated = members::validate(api, &table, &mut statistics);

        // Phase 3: emit everything that survived.
        let generated = emit::emit(&validated);
        output.units.extend(generated.units);
        merge_aux(&mut output.glue, generated.glue);
        merge_aux(&mut output.abi_check_native, generated.abi_check_native);
        merge_aux(&mut output.abi_check_managed, generated.abi_check_managed);
        merge_aux(&mut output.registration, generated.registration);
    }

    statistics.report();

    Ok(output)
}

fn merge_aux(target: &mut Option<String>, addition: Option<String>) {
    match (target.as_mut(), addition) {
        (Some(existing), Some(more)) => existing.push_str(&more),
        (None, Some(more)) => *target = Some(more),
        _ => {}
    }
}

/// Generate from a config file path, returning the units without writing.
pub fn generate(config_path: &Path) -> Result<emit::Output> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    generate_from_config(&cfg, base_dir)
}
