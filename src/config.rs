//! Runtime configuration for the tubeharvest binaries.
//!
//! Values come from, in order of precedence: explicit overrides (usually CLI
//! flags), process environment variables, a local `.env` file, and finally
//! built-in defaults. The `.env` parser accepts `export` prefixes, quoted
//! values and comments so the same file can be sourced from a shell.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_SEARCH_ROOT: &str = "youtube_results";
pub const DEFAULT_OUTPUT_ROOT: &str = "youtube_downloads";
pub const DEFAULT_INPUT_CSV: &str = "youtube_results/videos.csv";

/// Resolved settings shared by both pipeline stages.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Where the search step writes its listing CSVs.
    pub search_root: PathBuf,
    /// Where the harvest step writes metadata, captions and media.
    pub output_root: PathBuf,
    /// The id CSV the harvest step reads.
    pub input_csv: PathBuf,
    /// Data API key; only the search step needs one.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub search_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub input_csv: Option<PathBuf>,
    pub api_key: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    resolve_runtime_config(RuntimeOverrides::default())
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_config(&file_vars, env_var_string, overrides)
}

fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeConfig> {
    let search_root = overrides
        .search_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("SEARCH_ROOT", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_SEARCH_ROOT.to_string());
    let output_root = overrides
        .output_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("OUTPUT_ROOT", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_OUTPUT_ROOT.to_string());
    let input_csv = overrides
        .input_csv
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("INPUT_CSV", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_INPUT_CSV.to_string());
    let api_key = overrides
        .api_key
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        })
        .or_else(|| lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup))
        .filter(|value| !value.trim().is_empty());

    Ok(RuntimeConfig {
        search_root: PathBuf::from(search_root),
        output_root: PathBuf::from(output_root),
        input_csv: PathBuf::from(input_csv),
        api_key,
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
