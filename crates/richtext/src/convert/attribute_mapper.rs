//! Typed template parameters.
//!
//! Template parameters are stored as strings. Settings may declare a type
//! per (template, parameter); the mapper turns raw values into JSON values
//! of that type before they reach the renderer.

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Number, Value};

use crate::settings::{AttributeType, TemplateSettings};

/// Values accepted as boolean true.
const TRUE_VALUES: &[&str] = &["true", "1", "yes", "on"];

pub struct AttributeTypeMapper {
    templates: HashMap<String, TemplateSettings>,
    /// Memoized lookups keyed by (template, attribute).
    cache: RwLock<HashMap<(String, String), AttributeType>>,
}

impl AttributeTypeMapper {
    pub fn new(templates: HashMap<String, TemplateSettings>) -> Self {
        Self {
            templates,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Declared type of `attribute` on `template`; undeclared is string.
    pub fn attribute_type(&self, template: &str, attribute: &str) -> AttributeType {
        let key = (template.to_string(), attribute.to_string());
        if let Some(found) = self.cache.read().get(&key) {
            return *found;
        }

        let resolved = self
            .templates
            .get(template)
            .and_then(|t| t.attributes.get(attribute))
            .copied()
            .unwrap_or_default();
        self.cache.write().insert(key, resolved);
        resolved
    }

    /// Convert one raw value.
    pub fn map_value(&self, template: &str, attribute: &str, raw: &str) -> Value {
        match self.attribute_type(template, attribute) {
            AttributeType::Number => parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string())),
            AttributeType::Boolean => {
                let normalized = raw.trim().to_ascii_lowercase();
                Value::Bool(TRUE_VALUES.contains(&normalized.as_str()))
            }
            AttributeType::String | AttributeType::Choice | AttributeType::Link => {
                Value::String(raw.to_string())
            }
        }
    }

    /// Convert every parameter of a template invocation.
    pub fn map_params(&self, template: &str, params: &IndexMap<String, String>) -> Map<String, Value> {
        params
            .iter()
            .map(|(name, raw)| (name.clone(), self.map_value(template, name, raw)))
            .collect()
    }

    /// Number of memoized lookups.
    pub fn cached_lookups(&self) -> usize {
        self.cache.read().len()
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(integer) = raw.parse::<i64>() {
        return Some(Value::from(integer));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
