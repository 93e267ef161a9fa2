//! Trovato rich text test utilities.
//!
//! Fixtures, a recording renderer and link resolver, and an in-memory
//! migration gateway for integration tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use trovato_richtext::convert::{LinkResolver, Renderer};
use trovato_richtext::error::MigrationError;
use trovato_richtext::migration::{NamespaceMap, NamespaceMigrationGateway, apply_namespace_map};

/// Document fixtures.
pub mod fixtures {
    use trovato_richtext::namespace::{CUSTOM_ATTR, DOCBOOK, XHTML_ATTR, XLINK};

    /// Wrap `body` in a `section` root declaring every rich text namespace.
    pub fn section(body: &str) -> String {
        format!(
            "<section xmlns=\"{DOCBOOK}\" xmlns:xlink=\"{XLINK}\" \
             xmlns:tvxhtml=\"{XHTML_ATTR}\" xmlns:tvcustom=\"{CUSTOM_ATTR}\">{body}</section>"
        )
    }

    /// Block embed of a content item with optional `tvconfig` values.
    pub fn content_embed(id: &str, config: &[(&str, &str)]) -> String {
        format!(
            "<tvembed xlink:href=\"content-item://{id}\" view=\"embed\">{}</tvembed>",
            config_block(config)
        )
    }

    /// Template invocation with parameters and optional `tvcontent`.
    pub fn template(name: &str, params: &[(&str, &str)], content: Option<&str>) -> String {
        let content = content
            .map(|c| format!("<tvcontent>{c}</tvcontent>"))
            .unwrap_or_default();
        format!(
            "<tvtemplate name=\"{name}\">{content}{}</tvtemplate>",
            config_block(params)
        )
    }

    fn config_block(values: &[(&str, &str)]) -> String {
        if values.is_empty() {
            return String::new();
        }
        let values: String = values
            .iter()
            .map(|(key, value)| format!("<tvvalue key=\"{key}\">{value}</tvvalue>"))
            .collect();
        format!("<tvconfig>{values}</tvconfig>")
    }
}

/// One call made to a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Template {
        name: String,
        template_type: String,
        params: Value,
        is_inline: bool,
    },
    ContentEmbed {
        id: String,
        view_type: String,
        params: Value,
        is_inline: bool,
    },
    LocationEmbed {
        id: String,
        view_type: String,
        params: Value,
        is_inline: bool,
    },
}

/// Renderer returning canned fragments and recording every call.
///
/// Unknown ids and templates render nothing. With `echo_templates`, a
/// template renders as `<div class="{name}">{content}</div>`.
#[derive(Default)]
pub struct RecordingRenderer {
    content: HashMap<String, String>,
    locations: HashMap<String, String>,
    templates: HashMap<String, String>,
    failing: HashSet<String>,
    echo_templates: bool,
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, id: &str, payload: &str) -> Self {
        self.content.insert(id.to_string(), payload.to_string());
        self
    }

    pub fn with_location(mut self, id: &str, payload: &str) -> Self {
        self.locations.insert(id.to_string(), payload.to_string());
        self
    }

    pub fn with_template(mut self, name: &str, payload: &str) -> Self {
        self.templates.insert(name.to_string(), payload.to_string());
        self
    }

    /// Fail every call for this content id or template name.
    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn echo_templates(mut self) -> Self {
        self.echo_templates = true;
        self
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    fn fail_if_configured(&self, key: &str) -> anyhow::Result<()> {
        if self.failing.contains(key) {
            anyhow::bail!("rendering '{key}' failed");
        }
        Ok(())
    }
}

impl Renderer for RecordingRenderer {
    fn render_template(
        &self,
        name: &str,
        template_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> anyhow::Result<Option<String>> {
        self.calls.lock().push(RenderCall::Template {
            name: name.to_string(),
            template_type: template_type.to_string(),
            params: params.clone(),
            is_inline,
        });
        self.fail_if_configured(name)?;

        if let Some(payload) = self.templates.get(name) {
            return Ok(Some(payload.clone()));
        }
        if self.echo_templates {
            let content = params.get("content").and_then(Value::as_str).unwrap_or("");
            return Ok(Some(format!("<div class=\"{name}\">{content}</div>")));
        }
        Ok(None)
    }

    fn render_content_embed(
        &self,
        id: &str,
        view_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> anyhow::Result<Option<String>> {
        self.calls.lock().push(RenderCall::ContentEmbed {
            id: id.to_string(),
            view_type: view_type.to_string(),
            params: params.clone(),
            is_inline,
        });
        self.fail_if_configured(id)?;
        Ok(self.content.get(id).cloned())
    }

    fn render_location_embed(
        &self,
        id: &str,
        view_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> anyhow::Result<Option<String>> {
        self.calls.lock().push(RenderCall::LocationEmbed {
            id: id.to_string(),
            view_type: view_type.to_string(),
            params: params.clone(),
            is_inline,
        });
        self.fail_if_configured(id)?;
        Ok(self.locations.get(id).cloned())
    }
}

/// Link resolver mapping ids to `/content/{id}` and `/location/{id}`.
///
/// Ids listed as missing resolve to nothing.
#[derive(Default)]
pub struct RecordingLinkResolver {
    missing: HashSet<String>,
    lookups: Mutex<Vec<String>>,
}

impl RecordingLinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing(mut self, id: &str) -> Self {
        self.missing.insert(id.to_string());
        self
    }

    /// Every lookup, as `content:{id}` or `location:{id}`.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }

    fn lookup(&self, kind: &str, id: &str) -> Option<String> {
        self.lookups.lock().push(format!("{kind}:{id}"));
        (!self.missing.contains(id)).then(|| format!("/{kind}/{id}"))
    }
}

impl LinkResolver for RecordingLinkResolver {
    fn content_url(&self, id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lookup("content", id))
    }

    fn location_url(&self, id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lookup("location", id))
    }
}

/// A stored rich text field row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredField {
    pub field_type: String,
    pub text: String,
}

/// Migration gateway over an in-memory table.
#[derive(Default)]
pub struct InMemoryMigrationGateway {
    marker: String,
    rows: Mutex<Vec<StoredField>>,
}

impl InMemoryMigrationGateway {
    /// Gateway that rewrites rows whose field type equals `marker`.
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, field_type: &str, text: &str) {
        self.rows.lock().push(StoredField {
            field_type: field_type.to_string(),
            text: text.to_string(),
        });
    }

    pub fn rows(&self) -> Vec<StoredField> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl NamespaceMigrationGateway for InMemoryMigrationGateway {
    async fn migrate(&self, map: &NamespaceMap) -> Result<u64, MigrationError> {
        let mut affected = 0;
        for row in self.rows.lock().iter_mut() {
            if row.field_type != self.marker {
                continue;
            }
            let rewritten = apply_namespace_map(&row.text, map);
            if rewritten != row.text {
                row.text = rewritten;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn count_pending(&self, map: &NamespaceMap) -> Result<u64, MigrationError> {
        let pending = self
            .rows
            .lock()
            .iter()
            .filter(|row| row.field_type == self.marker)
            .filter(|row| apply_namespace_map(&row.text, map) != row.text)
            .count();
        Ok(pending as u64)
    }
}

/// Assertion helpers for serialized documents.
pub mod assert {
    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that `needle` occurs exactly `count` times.
    pub fn occurrences(haystack: &str, needle: &str, count: usize) {
        let actual = haystack.matches(needle).count();
        assert_eq!(
            actual, count,
            "Expected '{needle}' {count} time(s), found {actual}\nActual: {haystack}"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renderer_records_calls() {
        let renderer = RecordingRenderer::new().with_content("1", "<b/>");
        assert_eq!(
            renderer
                .render_content_embed("1", "embed", &json!({}), false)
                .unwrap(),
            Some("<b/>".to_string())
        );
        assert_eq!(
            renderer
                .render_content_embed("2", "embed", &json!({}), true)
                .unwrap(),
            None
        );
        assert_eq!(renderer.calls().len(), 2);
    }

    #[test]
    fn echo_templates_wrap_content() {
        let renderer = RecordingRenderer::new().echo_templates();
        let payload = renderer
            .render_template("box", "tag", &json!({"content": "<para>x</para>"}), false)
            .unwrap();
        assert_eq!(payload.as_deref(), Some("<div class=\"box\"><para>x</para></div>"));
    }

    #[test]
    fn failing_keys_error() {
        let renderer = RecordingRenderer::new().failing("9");
        assert!(
            renderer
                .render_location_embed("9", "embed", &json!({}), false)
                .is_err()
        );
    }

    #[test]
    fn resolver_reports_missing() {
        let resolver = RecordingLinkResolver::new().with_missing("4");
        assert_eq!(resolver.content_url("3").unwrap().as_deref(), Some("/content/3"));
        assert_eq!(resolver.content_url("4").unwrap(), None);
        assert_eq!(resolver.lookups(), vec!["content:3", "content:4"]);
    }

    #[test]
    fn fixtures_build_documents() {
        let body = fixtures::content_embed("78", &[("size", "medium")]);
        assert::contains(&body, "content-item://78");
        assert::contains(&body, "<tvvalue key=\"size\">medium</tvvalue>");
        assert::contains(&fixtures::section(&body), "xmlns:xlink=");
    }
}
