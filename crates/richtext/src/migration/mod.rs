//! One-time rewrite of legacy namespace URIs in stored rich text.
//!
//! A namespace map is an ordered list of literal `from → to` replacements.
//! Entries apply in order, each to the output of the previous one, once per
//! stored document.

mod postgres;

pub use postgres::PgNamespaceMigrationGateway;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::MigrationError;

/// Ordered legacy URI → replacement mapping.
pub type NamespaceMap = IndexMap<String, String>;

/// Storage-side namespace rewrite.
#[async_trait]
pub trait NamespaceMigrationGateway: Send + Sync {
    /// Rewrite every stored rich text document; returns the number of
    /// documents changed. Re-running with the same map changes nothing.
    async fn migrate(&self, map: &NamespaceMap) -> Result<u64, MigrationError>;

    /// Number of documents [`NamespaceMigrationGateway::migrate`] would change.
    async fn count_pending(&self, map: &NamespaceMap) -> Result<u64, MigrationError>;
}

/// Apply the map to one document's text.
pub fn apply_namespace_map(text: &str, map: &NamespaceMap) -> String {
    map.iter()
        .filter(|(from, _)| !from.is_empty())
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MapFile {
    #[serde(default)]
    rewrite: Vec<Rewrite>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Rewrite {
    from: String,
    to: String,
}

/// Load a namespace map file.
///
/// ```toml
/// [[rewrite]]
/// from = "http://legacy.example/xmlns/xhtml"
/// to = "http://trovato.dev/xmlns/richtext/xhtml"
/// ```
pub fn load_namespace_map(path: &Path) -> Result<NamespaceMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read namespace map: {}", path.display()))?;

    parse_namespace_map(&content, path)
}

/// Parse a namespace map from a TOML string.
pub fn parse_namespace_map(content: &str, path: &Path) -> Result<NamespaceMap> {
    let file: MapFile = toml::from_str(content)
        .with_context(|| format!("failed to parse namespace map TOML at {}", path.display()))?;

    let mut seen = HashSet::new();
    let mut map = NamespaceMap::new();
    for rewrite in file.rewrite {
        if rewrite.from.is_empty() {
            anyhow::bail!("namespace map at {} has an empty 'from' value", path.display());
        }
        if !seen.insert(rewrite.from.clone()) {
            anyhow::bail!(
                "namespace map at {} rewrites '{}' more than once",
                path.display(),
                rewrite.from
            );
        }
        map.insert(rewrite.from, rewrite.to);
    }
    Ok(map)
}
