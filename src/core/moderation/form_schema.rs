// Declarative form schemas for extension providers.
//
// An extension describes its extra settings as an ordered list of fields.
// Instead of generating forms dynamically, the editor interprets the list:
// defaults on provider switch, required checks on save, projection on
// normalization and coercion of raw user input.

use super::moderation_models::{is_empty_value, Locale, LocalizedText, ModerationConfigBody};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("Provider `{0}` has no configurable fields")]
    NoSchema(String),

    #[error("Unknown field `{0}`")]
    UnknownField(String),

    #[error("`{value}` is not a valid option for `{field}`")]
    InvalidOption { field: String, value: String },
}

/// Input widget kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    TextInput,
    Paragraph,
    Select,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: LocalizedText,
    pub value: String,
}

/// One declared field of an extension provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    pub label: LocalizedText,
    pub variable: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl FieldSpec {
    pub fn label(&self, locale: Locale) -> &str {
        self.label.get(locale)
    }
}

/// Ordered field declarations of one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSchema(pub Vec<FieldSpec>);

impl FormSchema {
    #[allow(dead_code)]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.0.iter()
    }

    pub fn field(&self, variable: &str) -> Option<&FieldSpec> {
        self.0.iter().find(|f| f.variable == variable)
    }

    /// `variable -> default` for every declared field.
    pub fn defaults(&self) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .map(|f| (f.variable.clone(), f.default.clone()))
            .collect()
    }

    /// First required field (in declaration order) whose value is empty.
    pub fn first_missing_required(&self, body: &ModerationConfigBody) -> Option<&FieldSpec> {
        self.0
            .iter()
            .find(|f| f.required && is_empty_value(body.get(&f.variable)))
    }

    /// Current values of the declared fields. Absent fields stay absent.
    pub fn project(&self, body: &ModerationConfigBody) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .filter_map(|f| {
                body.get(&f.variable)
                    .map(|value| (f.variable.clone(), value.clone()))
            })
            .collect()
    }

    /// Turn raw user input into the value stored for `variable`.
    ///
    /// Select fields accept an option value (or, as a convenience, an option
    /// label in either locale). Text fields are cut to `max_length` characters.
    pub fn coerce(&self, variable: &str, raw: &str) -> Result<Value, FormError> {
        let field = self
            .field(variable)
            .ok_or_else(|| FormError::UnknownField(variable.to_string()))?;

        match field.kind {
            FieldKind::Select => {
                if raw.is_empty() {
                    return Ok(Value::String(String::new()));
                }
                field
                    .options
                    .iter()
                    .find(|o| {
                        o.value == raw || o.label.en_us == raw || o.label.zh_hans == raw
                    })
                    .map(|o| Value::String(o.value.clone()))
                    .ok_or_else(|| FormError::InvalidOption {
                        field: variable.to_string(),
                        value: raw.to_string(),
                    })
            }
            FieldKind::TextInput | FieldKind::Paragraph => {
                let text = match field.max_length {
                    Some(max) => raw.chars().take(max).collect(),
                    None => raw.to_string(),
                };
                Ok(Value::String(text))
            }
        }
    }
}
