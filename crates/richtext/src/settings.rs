//! Rich text settings parsed from a TOML file.
//!
//! Every section is optional; missing values fall back to the built-in
//! defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! [embed]
//! block_view = "embed"
//! inline_view = "embed-inline"
//!
//! [normalizer]
//! root_element = "section"
//! entities = { euro = 8364 }
//!
//! [templates.callout.attributes]
//! level = "number"
//! collapsed = "boolean"
//!
//! [migration]
//! table = "richtext_field"
//! column = "data_text"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use crate::namespace::DOCBOOK;

/// Valid XML entity name (ASCII subset).
#[allow(clippy::expect_used)]
static ENTITY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9._-]*$").expect("valid regex literal")
});

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub embed: EmbedSettings,
    pub normalizer: NormalizerSettings,
    /// Per-template settings keyed by template name.
    pub templates: HashMap<String, TemplateSettings>,
    pub migration: MigrationSettings,
}

/// Default view types for embeds without a `view` attribute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedSettings {
    pub block_view: String,
    pub inline_view: String,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self {
            block_view: "embed".to_string(),
            inline_view: "embed-inline".to_string(),
        }
    }
}

impl EmbedSettings {
    pub fn default_view(&self, inline: bool) -> &str {
        if inline {
            &self.inline_view
        } else {
            &self.block_view
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerSettings {
    /// Local name of the root element the doctype normalizer accepts.
    pub root_element: String,
    /// Namespace the root element must declare.
    pub namespace: String,
    /// Additional named entities (name → Unicode code point), appended to
    /// the built-in legacy set.
    pub entities: IndexMap<String, u32>,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            root_element: "section".to_string(),
            namespace: DOCBOOK.to_string(),
            entities: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSettings {
    /// Declared parameter types; undeclared parameters are strings.
    pub attributes: HashMap<String, AttributeType>,
}

/// Declared type of a template parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Number,
    Boolean,
    Choice,
    Link,
}

/// Where stored rich text lives, for the namespace migration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationSettings {
    pub table: String,
    pub column: String,
    /// Column identifying rich text rows.
    pub marker_column: String,
    /// Value of `marker_column` on rich text rows.
    pub marker: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            table: "richtext_field".to_string(),
            column: "data_text".to_string(),
            marker_column: "field_type".to_string(),
            marker: "richtext".to_string(),
        }
    }
}

impl Settings {
    /// Parse a settings file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rich text settings: {}", path.display()))?;

        Self::parse_str(&content, path)
    }

    /// Parse settings from a TOML string.
    pub fn parse_str(content: &str, path: &Path) -> Result<Self> {
        let settings: Settings = toml::from_str(content).with_context(|| {
            format!("failed to parse rich text settings TOML at {}", path.display())
        })?;

        settings.validate(path)?;
        Ok(settings)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.embed.block_view.is_empty() || self.embed.inline_view.is_empty() {
            anyhow::bail!(
                "settings at {} have an empty default embed view",
                path.display()
            );
        }

        if self.normalizer.root_element.is_empty() {
            anyhow::bail!(
                "settings at {} have an empty 'normalizer.root_element'",
                path.display()
            );
        }

        for (name, code_point) in &self.normalizer.entities {
            if !ENTITY_NAME.is_match(name) {
                anyhow::bail!(
                    "settings at {} declare invalid entity name '{name}'",
                    path.display()
                );
            }
            if char::from_u32(*code_point).is_none() {
                anyhow::bail!(
                    "entity '{name}' in {} maps to invalid code point {code_point}",
                    path.display()
                );
            }
        }

        if let Some(name) = self.templates.keys().find(|name| name.trim().is_empty()) {
            anyhow::bail!(
                "settings at {} declare a template with an empty name '{name}'",
                path.display()
            );
        }

        Ok(())
    }
}
