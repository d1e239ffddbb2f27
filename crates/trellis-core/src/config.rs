use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::model::PartnershipType;

/// Environment variable that overrides `hierarchy.max_prune_passes`.
pub const MAX_PRUNE_PASSES_ENV: &str = "TRELLIS_MAX_PRUNE_PASSES";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrellisConfig {
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub links: LinkConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Upper bound on leaf-pruning passes during a safe delete.
    #[serde(default = "default_max_prune_passes")]
    pub max_prune_passes: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_prune_passes: default_max_prune_passes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Partnership type used when a partner link is created without one.
    #[serde(default = "default_partnership_type")]
    pub default_partnership_type: PartnershipType,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            default_partnership_type: default_partnership_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_max_level2")]
    pub max_level2: usize,
    #[serde(default = "default_max_level3")]
    pub max_level3: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_level2: default_max_level2(),
            max_level3: default_max_level3(),
        }
    }
}

/// Load `<root>/.trellis/config.toml`, falling back to defaults when the
/// file does not exist, then apply environment overrides.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// an environment override is not a positive integer.
pub fn load_config(root: &Path) -> Result<TrellisConfig> {
    let path = root.join(".trellis/config.toml");
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_config(&content).with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        TrellisConfig::default()
    };

    apply_env_overrides(&mut config, env::var(MAX_PRUNE_PASSES_ENV).ok())?;
    Ok(config)
}

/// Parse a config document from TOML text.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or a limit is zero.
pub fn parse_config(content: &str) -> Result<TrellisConfig> {
    let config = toml::from_str::<TrellisConfig>(content)?;
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut TrellisConfig, max_passes: Option<String>) -> Result<()> {
    if let Some(raw) = max_passes {
        let passes: usize = raw
            .trim()
            .parse()
            .with_context(|| format!("{MAX_PRUNE_PASSES_ENV} must be an integer, got '{raw}'"))?;
        config.hierarchy.max_prune_passes = passes;
    }
    validate(config)
}

fn validate(config: &TrellisConfig) -> Result<()> {
    anyhow::ensure!(
        config.hierarchy.max_prune_passes > 0,
        "hierarchy.max_prune_passes must be at least 1"
    );
    anyhow::ensure!(
        config.selection.max_level2 > 0 && config.selection.max_level3 > 0,
        "selection limits must be at least 1"
    );
    Ok(())
}

const fn default_max_prune_passes() -> usize {
    64
}

fn default_partnership_type() -> PartnershipType {
    PartnershipType::standard()
}

const fn default_max_level2() -> usize {
    10
}

const fn default_max_level3() -> usize {
    20
}
