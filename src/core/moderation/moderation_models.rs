// Moderation settings domain models.
//
// These are pure domain types with no Discord dependencies. The JSON shape
// matches what the application console stores, so `ModerationConfig` can be
// handed back to it unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Built-in provider backed by the OpenAI moderation endpoint.
pub const OPENAI_MODERATION: &str = "openai_moderation";
/// Built-in provider that blocks on a keyword list.
pub const KEYWORDS: &str = "keywords";
/// Built-in provider that delegates to an API-based extension.
pub const API: &str = "api";

/// Built-in provider keys, in display order.
pub const SYSTEM_TYPES: [&str; 3] = [OPENAI_MODERATION, KEYWORDS, API];

pub const INPUTS_CONFIG_KEY: &str = "inputs_config";
pub const OUTPUTS_CONFIG_KEY: &str = "outputs_config";
pub const KEYWORDS_KEY: &str = "keywords";
pub const API_EXTENSION_KEY: &str = "api_based_extension_id";

/// Maximum number of keyword lines kept in the draft.
pub const MAX_KEYWORD_LINES: usize = 100;
/// Maximum length (in characters) of a single keyword line.
pub const MAX_KEYWORD_LENGTH: usize = 100;

/// Returns true for `openai_moderation`, `keywords` and `api`.
pub fn is_system_type(key: &str) -> bool {
    SYSTEM_TYPES.contains(&key)
}

// ============================================================================
// LOCALIZATION
// ============================================================================

/// UI language used to pick labels and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "zh-Hans")]
    ZhHans,
}

impl Locale {
    /// Map a BCP-47-ish tag (`zh-CN`, `zh-Hans`, `en-GB`, ...) to a supported locale.
    /// Anything that is not Chinese falls back to English.
    pub fn from_tag(tag: &str) -> Self {
        if tag.to_ascii_lowercase().starts_with("zh") {
            Locale::ZhHans
        } else {
            Locale::EnUs
        }
    }

    /// Pick the string for this locale out of an (english, chinese) pair.
    pub fn pick<'a>(&self, en_us: &'a str, zh_hans: &'a str) -> &'a str {
        match self {
            Locale::EnUs => en_us,
            Locale::ZhHans => zh_hans,
        }
    }
}

/// A label as delivered by the console: one string per supported locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(rename = "en-US", default)]
    pub en_us: String,
    #[serde(rename = "zh-Hans", default)]
    pub zh_hans: String,
}

impl LocalizedText {
    #[allow(dead_code)]
    pub fn new(en_us: impl Into<String>, zh_hans: impl Into<String>) -> Self {
        Self {
            en_us: en_us.into(),
            zh_hans: zh_hans.into(),
        }
    }

    pub fn get(&self, locale: Locale) -> &str {
        locale.pick(&self.en_us, &self.zh_hans)
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Which side of the conversation a content config applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTarget {
    Inputs,
    Outputs,
}

impl ContentTarget {
    /// Key of this content config inside the configuration body.
    pub fn key(&self) -> &'static str {
        match self {
            ContentTarget::Inputs => INPUTS_CONFIG_KEY,
            ContentTarget::Outputs => OUTPUTS_CONFIG_KEY,
        }
    }
}

impl fmt::Display for ContentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentTarget::Inputs => write!(f, "inputs"),
            ContentTarget::Outputs => write!(f, "outputs"),
        }
    }
}

/// Moderation settings for one direction (user input or model output).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Reply sent instead of flagged content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_response: Option<String>,
}

impl ContentConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn enabled_with(preset_response: impl Into<String>) -> Self {
        Self {
            enabled: true,
            preset_response: Some(preset_response.into()),
        }
    }

    pub fn has_preset_response(&self) -> bool {
        self.preset_response.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// The `config` object of a moderation configuration.
///
/// `inputs_config` and `outputs_config` are typed; every other key belongs to
/// the active provider (`keywords`, `api_based_extension_id`, or whatever an
/// extension's form schema declares) and is kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationConfigBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_config: Option<ContentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_config: Option<ContentConfig>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl ModerationConfigBody {
    pub fn content(&self, target: ContentTarget) -> Option<&ContentConfig> {
        match target {
            ContentTarget::Inputs => self.inputs_config.as_ref(),
            ContentTarget::Outputs => self.outputs_config.as_ref(),
        }
    }

    pub fn set_content(&mut self, target: ContentTarget, config: ContentConfig) {
        match target {
            ContentTarget::Inputs => self.inputs_config = Some(config),
            ContentTarget::Outputs => self.outputs_config = Some(config),
        }
    }

    pub fn content_enabled(&self, target: ContentTarget) -> bool {
        self.content(target).is_some_and(|c| c.enabled)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of a provider field, if it holds one.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.to_string(), Value::String(value.into()));
    }

    pub fn keywords(&self) -> Option<&str> {
        self.text(KEYWORDS_KEY)
    }

    pub fn api_based_extension_id(&self) -> Option<&str> {
        self.text(API_EXTENSION_KEY)
    }

    /// True when the provider field is absent or holds an empty value.
    pub fn is_blank(&self, key: &str) -> bool {
        is_empty_value(self.fields.get(key))
    }

    /// Drop every provider field, keeping the two content configs.
    pub fn clear_fields(&mut self) {
        self.fields.clear();
    }
}

/// A value counts as empty when it is absent, `null`, `""` or `false`.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Bool(b)) => !b,
        Some(_) => false,
    }
}

/// A complete moderation configuration as stored by the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Key of the active provider.
    #[serde(rename = "type")]
    pub provider: String,
    #[serde(default)]
    pub config: ModerationConfigBody,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: KEYWORDS.to_string(),
            config: ModerationConfigBody {
                inputs_config: Some(ContentConfig::disabled()),
                outputs_config: Some(ContentConfig::disabled()),
                fields: BTreeMap::new(),
            },
        }
    }
}

impl ModerationConfig {
    pub fn provider_kind(&self) -> ProviderKind {
        ProviderKind::from_key(&self.provider)
    }
}

/// Classification of a provider key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAiModeration,
    Keywords,
    Api,
    /// Code-based extension supplied by the console.
    Extension,
}

impl ProviderKind {
    pub fn from_key(key: &str) -> Self {
        match key {
            OPENAI_MODERATION => ProviderKind::OpenAiModeration,
            KEYWORDS => ProviderKind::Keywords,
            API => ProviderKind::Api,
            _ => ProviderKind::Extension,
        }
    }
}

/// Last saved configuration of a guild, with who saved it and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModerationConfig {
    pub config: ModerationConfig,
    pub updated_by: u64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
