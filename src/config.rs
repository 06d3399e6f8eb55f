//! Planner options.
//!
//! Options arrive as camelCase JSON. Every field is optional; missing fields
//! take the defaults from [`bindplan_common::limits`]. Booleans also accept
//! their string spellings so options can be forwarded from build scripts
//! that only pass strings.

use anyhow::{Context, Result, bail};
use bindplan_common::limits::{DEFAULT_KEYS_PER_SHARD, DEFAULT_STATEMENTS_PER_INIT_FUN};
use serde::{Deserialize, Deserializer, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Custom deserializer for boolean options that accepts both bool and string values.
fn deserialize_bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(Error::custom(format!(
                "invalid boolean value: '{}'. Expected true, false, 'true', or 'false'",
                s
            ))),
        },
    }
}

/// Options as written by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerOptions {
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub enable_sharding: Option<bool>,
    #[serde(default)]
    pub keys_per_shard: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub chunk_field_inits: Option<bool>,
    #[serde(default)]
    pub statements_per_init_fun: Option<usize>,
}

/// Validated options with every default applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    pub enable_sharding: bool,
    pub keys_per_shard: NonZeroUsize,
    pub chunk_field_inits: bool,
    pub statements_per_init_fun: NonZeroUsize,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            enable_sharding: false,
            keys_per_shard: NonZeroUsize::new(DEFAULT_KEYS_PER_SHARD).unwrap_or(NonZeroUsize::MIN),
            chunk_field_inits: true,
            statements_per_init_fun: NonZeroUsize::new(DEFAULT_STATEMENTS_PER_INIT_FUN)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

pub fn resolve_options(options: &PlannerOptions) -> Result<ResolvedOptions> {
    let mut resolved = ResolvedOptions::default();

    if let Some(enable_sharding) = options.enable_sharding {
        resolved.enable_sharding = enable_sharding;
    }
    if let Some(keys) = options.keys_per_shard {
        resolved.keys_per_shard = positive("keysPerShard", keys)?;
    }
    if let Some(chunk) = options.chunk_field_inits {
        resolved.chunk_field_inits = chunk;
    }
    if let Some(statements) = options.statements_per_init_fun {
        resolved.statements_per_init_fun = positive("statementsPerInitFun", statements)?;
    }

    Ok(resolved)
}

fn positive(name: &str, value: usize) -> Result<NonZeroUsize> {
    match NonZeroUsize::new(value) {
        Some(value) => Ok(value),
        None => bail!("{name} must be at least 1, got {value}"),
    }
}

pub fn parse_options(source: &str) -> Result<ResolvedOptions> {
    let options: PlannerOptions =
        serde_json::from_str(source).context("failed to parse planner options JSON")?;
    resolve_options(&options)
}

pub fn load_options(path: &Path) -> Result<ResolvedOptions> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read planner options: {}", path.display()))?;
    parse_options(&source)
        .with_context(|| format!("invalid planner options: {}", path.display()))
}
