use std::env;

use anyhow::{Context, bail};

pub const DEFAULT_MAX_TREE_DEPTH: usize = 32;
pub const DEFAULT_MAX_TREE_NODES: usize = 4096;

/// Bounds applied to ancestor tree expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyConfig {
    /// Supervisor levels expanded below the requested employee.
    pub max_tree_depth: usize,
    /// Node budget for one expanded tree. Diamond lineages are expanded once per path.
    pub max_tree_nodes: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            max_tree_nodes: DEFAULT_MAX_TREE_NODES,
        }
    }
}

impl HierarchyConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_tree_depth: env_limit("HIERARCHY_MAX_TREE_DEPTH", defaults.max_tree_depth)?,
            max_tree_nodes: env_limit("HIERARCHY_MAX_TREE_NODES", defaults.max_tree_nodes)?,
        })
    }
}

fn env_limit(name: &str, default: usize) -> anyhow::Result<usize> {
    match env::var(name) {
        Ok(raw) => parse_limit(name, &raw),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", name)),
    }
}

fn parse_limit(name: &str, raw: &str) -> anyhow::Result<usize> {
    let value: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid {} '{}'", name, raw))?;
    if value == 0 {
        bail!("{} must be at least 1", name);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_limit_accepts_positive_values() {
        assert_eq!(parse_limit("X", " 12 ").expect("valid limit"), 12);
    }

    #[test]
    fn parse_limit_rejects_zero_and_garbage() {
        assert!(parse_limit("X", "0").is_err());
        let err = parse_limit("HIERARCHY_MAX_TREE_DEPTH", "deep").expect_err("not a number");
        assert!(err.to_string().contains("HIERARCHY_MAX_TREE_DEPTH"));
    }
}
