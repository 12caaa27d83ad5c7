// Provider catalog - which moderation backends can be selected.
//
// The three built-ins always come first; extension providers reported by the
// console follow in the order they were supplied. The catalog is immutable:
// when the console list changes the caller builds a new one.

use super::form_schema::FormSchema;
use super::moderation_models::{Locale, LocalizedText, API, KEYWORDS, OPENAI_MODERATION};
use serde::{Deserialize, Serialize};

/// A code-based moderation extension as listed by the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBasedExtension {
    pub name: String,
    pub label: LocalizedText,
    #[serde(default)]
    pub form_schema: Option<FormSchema>,
}

/// A selectable moderation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub key: String,
    pub name: String,
    pub form_schema: Option<FormSchema>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCatalog {
    providers: Vec<Provider>,
}

impl ProviderCatalog {
    pub fn new(extensions: &[CodeBasedExtension], locale: Locale) -> Self {
        let built_ins = [
            (
                OPENAI_MODERATION,
                locale.pick("OpenAI Moderation", "OpenAI 内容审查"),
            ),
            (KEYWORDS, locale.pick("Keywords", "关键词")),
            (API, locale.pick("API Extension", "API 扩展")),
        ];

        let providers = built_ins
            .into_iter()
            .map(|(key, name)| Provider {
                key: key.to_string(),
                name: name.to_string(),
                form_schema: None,
            })
            .chain(extensions.iter().map(|ext| Provider {
                key: ext.name.clone(),
                name: ext.label.get(locale).to_string(),
                form_schema: ext.form_schema.clone(),
            }))
            .collect();

        Self { providers }
    }

    pub fn find(&self, key: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.key == key)
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Form schema of an extension provider, if it declares one.
    pub fn schema_for(&self, key: &str) -> Option<&FormSchema> {
        self.find(key).and_then(|p| p.form_schema.as_ref())
    }
}

// ============================================================================
// OPENAI AVAILABILITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomConfigurationStatus {
    Active,
    #[default]
    NoConfigure,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomConfiguration {
    #[serde(default)]
    pub status: CustomConfigurationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaConfiguration {
    pub quota_type: String,
    #[serde(default)]
    pub is_valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub current_quota_type: Option<String>,
    #[serde(default)]
    pub quota_configurations: Vec<QuotaConfiguration>,
}

/// Workspace model provider entry, reduced to what moderation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProvider {
    pub provider: String,
    #[serde(default)]
    pub system_configuration: SystemConfiguration,
    #[serde(default)]
    pub custom_configuration: CustomConfiguration,
}

impl ModelProvider {
    /// Usable through the hosted quota: system configuration enabled and the
    /// current quota type valid.
    fn system_quota_usable(&self) -> bool {
        let system = &self.system_configuration;
        if !system.enabled {
            return false;
        }
        let Some(current) = system.current_quota_type.as_deref() else {
            return false;
        };
        system
            .quota_configurations
            .iter()
            .find(|q| q.quota_type == current)
            .is_some_and(|q| q.is_valid)
    }

    pub fn is_usable(&self) -> bool {
        self.custom_configuration.status == CustomConfigurationStatus::Active
            || self.system_quota_usable()
    }
}

/// Whether `openai_moderation` can be used by this workspace.
pub fn openai_usable(providers: &[ModelProvider]) -> bool {
    providers
        .iter()
        .find(|p| p.provider == "openai")
        .is_some_and(ModelProvider::is_usable)
}
