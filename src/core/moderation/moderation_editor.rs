// Moderation config editor - the draft state machine behind the settings form.
//
// The editor owns a private copy of a configuration, changes it through named
// intents and, on save, either hands back a normalized configuration or the
// first rule the draft breaks. It never talks to the network or to storage.

use super::form_schema::FormError;
use super::moderation_models::{
    is_system_type, ContentConfig, ContentTarget, Locale, ModerationConfig, ModerationConfigBody,
    ProviderKind, API_EXTENSION_KEY, KEYWORDS_KEY, MAX_KEYWORD_LENGTH, MAX_KEYWORD_LINES,
};
use super::provider_catalog::{Provider, ProviderCatalog};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// The first rule a draft breaks on save.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither input nor output moderation is enabled.
    #[error("At least one of input and output moderation must be enabled")]
    Condition,

    /// A required value is empty. `field` is the localized field label.
    #[error("{field} value can not be empty")]
    MissingField { field: String },

    /// An enabled content config has no preset response.
    #[error("Preset response for {which} can not be empty")]
    PresetRequired { which: ContentTarget },
}

impl ValidationError {
    /// User-facing message in the given locale.
    pub fn message(&self, locale: Locale) -> String {
        match (self, locale) {
            (ValidationError::Condition, Locale::EnUs) => {
                "Moderate INPUT and OUTPUT Content enabled at least one".to_string()
            }
            (ValidationError::Condition, Locale::ZhHans) => {
                "审查输入内容和审查输出内容至少开启一项".to_string()
            }
            (ValidationError::MissingField { field }, Locale::EnUs) => {
                format!("{field} value can not be empty")
            }
            (ValidationError::MissingField { field }, Locale::ZhHans) => format!("{field}必填"),
            (ValidationError::PresetRequired { .. }, Locale::EnUs) => {
                "Preset replies cannot be empty".to_string()
            }
            (ValidationError::PresetRequired { .. }, Locale::ZhHans) => {
                "预设回复不能为空".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SaveError {
    /// `openai_moderation` is selected but the workspace cannot use OpenAI.
    #[error("The OpenAI provider is not configured for this workspace")]
    ProviderUnavailable,

    /// The active type is neither built-in nor in the catalog.
    #[error("Unknown moderation provider `{0}`")]
    UnknownProvider(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// ============================================================================
// INTENTS
// ============================================================================

/// A discrete edit of the draft.
#[derive(Debug, Clone, PartialEq)]
pub enum EditIntent {
    SetType(String),
    SetKeywords(String),
    SetContentConfig(ContentTarget, ContentConfig),
    SetExtensionId(String),
    SetExtraFields(BTreeMap<String, Value>),
    SetEnabled(bool),
}

/// Clean up raw keyword text: cut long lines, collapse runs of blank lines,
/// keep at most `MAX_KEYWORD_LINES` lines.
pub fn sanitize_keywords(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.split('\n') {
        if !line.is_empty() {
            lines.push(line.chars().take(MAX_KEYWORD_LENGTH).collect());
        } else if lines.last().map(String::as_str) != Some("") {
            lines.push(String::new());
        }
    }

    lines.truncate(MAX_KEYWORD_LINES);
    lines.join("\n")
}

/// Reduce a configuration to the keys its provider uses.
///
/// Both content configs are always present afterwards. Running this on its own
/// output returns the same configuration.
pub fn normalize(config: &ModerationConfig, catalog: &ProviderCatalog) -> ModerationConfig {
    let body = &config.config;
    let mut fields = BTreeMap::new();

    match config.provider_kind() {
        ProviderKind::Keywords => {
            if let Some(value) = body.get(KEYWORDS_KEY) {
                fields.insert(KEYWORDS_KEY.to_string(), value.clone());
            }
        }
        ProviderKind::Api => {
            if let Some(value) = body.get(API_EXTENSION_KEY) {
                fields.insert(API_EXTENSION_KEY.to_string(), value.clone());
            }
        }
        ProviderKind::Extension => {
            if let Some(schema) = catalog.schema_for(&config.provider) {
                fields = schema.project(body);
            }
        }
        ProviderKind::OpenAiModeration => {}
    }

    ModerationConfig {
        enabled: config.enabled,
        provider: config.provider.clone(),
        config: ModerationConfigBody {
            inputs_config: Some(body.inputs_config.clone().unwrap_or_default()),
            outputs_config: Some(body.outputs_config.clone().unwrap_or_default()),
            fields,
        },
    }
}

// ============================================================================
// EDITOR
// ============================================================================

/// Editing state for one moderation configuration.
#[derive(Debug, Clone)]
pub struct ModerationConfigEditor {
    draft: ModerationConfig,
    catalog: ProviderCatalog,
    openai_usable: bool,
    locale: Locale,
}

impl ModerationConfigEditor {
    pub fn new(
        initial: ModerationConfig,
        catalog: ProviderCatalog,
        openai_usable: bool,
        locale: Locale,
    ) -> Self {
        Self {
            draft: initial,
            catalog,
            openai_usable,
            locale,
        }
    }

    pub fn draft(&self) -> &ModerationConfig {
        &self.draft
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn current_provider(&self) -> Option<&Provider> {
        self.catalog.find(&self.draft.provider)
    }

    /// False when saving is blocked because OpenAI is selected but unusable.
    pub fn can_save(&self) -> bool {
        !(self.draft.provider_kind() == ProviderKind::OpenAiModeration && !self.openai_usable)
    }

    /// Number of non-empty keyword lines.
    pub fn keyword_count(&self) -> usize {
        self.draft
            .config
            .keywords()
            .map(|k| k.split('\n').filter(|l| !l.is_empty()).count())
            .unwrap_or(0)
    }

    pub fn apply(&mut self, intent: EditIntent) {
        match intent {
            EditIntent::SetType(provider) => self.set_type(&provider),
            EditIntent::SetKeywords(raw) => self.set_keywords(&raw),
            EditIntent::SetContentConfig(target, config) => self.set_content_config(target, config),
            EditIntent::SetExtensionId(id) => self.set_extension_id(&id),
            EditIntent::SetExtraFields(patch) => self.set_extra_fields(patch),
            EditIntent::SetEnabled(enabled) => self.draft.enabled = enabled,
        }
    }

    /// Switch the active provider. Provider fields are replaced by the new
    /// provider's schema defaults (or cleared); content configs survive.
    pub fn set_type(&mut self, provider: &str) {
        self.draft.provider = provider.to_string();
        self.draft.config.clear_fields();

        if !is_system_type(provider) {
            if let Some(schema) = self.catalog.schema_for(provider) {
                self.draft.config.fields = schema.defaults();
            }
        }
    }

    pub fn set_keywords(&mut self, raw: &str) {
        self.draft
            .config
            .set_text(KEYWORDS_KEY, sanitize_keywords(raw));
    }

    pub fn set_content_config(&mut self, target: ContentTarget, config: ContentConfig) {
        self.draft.config.set_content(target, config);
    }

    pub fn set_extension_id(&mut self, id: &str) {
        self.draft.config.set_text(API_EXTENSION_KEY, id);
    }

    /// Shallow-merge `patch` into the configuration body.
    ///
    /// Values for `inputs_config` / `outputs_config` replace the content config
    /// when they parse as one and are ignored otherwise.
    pub fn set_extra_fields(&mut self, patch: BTreeMap<String, Value>) {
        for (key, value) in patch {
            let target = [ContentTarget::Inputs, ContentTarget::Outputs]
                .into_iter()
                .find(|t| t.key() == key);

            match target {
                Some(target) => match serde_json::from_value::<ContentConfig>(value) {
                    Ok(config) => self.draft.config.set_content(target, config),
                    Err(err) => {
                        tracing::warn!(key = %key, "Ignoring malformed content config: {}", err)
                    }
                },
                None => {
                    self.draft.config.fields.insert(key, value);
                }
            }
        }
    }

    /// Set one field of the active extension provider from raw user input.
    pub fn set_field_input(&mut self, variable: &str, raw: &str) -> Result<(), FormError> {
        let schema = self
            .catalog
            .schema_for(&self.draft.provider)
            .ok_or_else(|| FormError::NoSchema(self.draft.provider.clone()))?;
        let value = schema.coerce(variable, raw)?;

        let mut patch = BTreeMap::new();
        patch.insert(variable.to_string(), value);
        self.set_extra_fields(patch);
        Ok(())
    }

    /// Check the draft against the save rules, in order.
    pub fn validate(&self) -> Result<(), SaveError> {
        let draft = &self.draft;
        let body = &draft.config;
        let kind = draft.provider_kind();

        if !self.can_save() {
            return Err(SaveError::ProviderUnavailable);
        }

        if !body.content_enabled(ContentTarget::Inputs)
            && !body.content_enabled(ContentTarget::Outputs)
        {
            return Err(ValidationError::Condition.into());
        }

        if kind == ProviderKind::Keywords && body.is_blank(KEYWORDS_KEY) {
            return Err(ValidationError::MissingField {
                field: self.locale.pick("keywords", "关键词").to_string(),
            }
            .into());
        }

        if kind == ProviderKind::Api && body.is_blank(API_EXTENSION_KEY) {
            return Err(ValidationError::MissingField {
                field: self.locale.pick("API Extension", "API 扩展").to_string(),
            }
            .into());
        }

        if kind == ProviderKind::Extension && self.current_provider().is_none() {
            return Err(SaveError::UnknownProvider(draft.provider.clone()));
        }

        if kind == ProviderKind::Extension {
            if let Some(missing) = self
                .catalog
                .schema_for(&draft.provider)
                .and_then(|schema| schema.first_missing_required(body))
            {
                return Err(ValidationError::MissingField {
                    field: missing.label(self.locale).to_string(),
                }
                .into());
            }
        }

        if kind != ProviderKind::Api {
            for target in [ContentTarget::Inputs, ContentTarget::Outputs] {
                if let Some(content) = body.content(target) {
                    if content.enabled && !content.has_preset_response() {
                        return Err(ValidationError::PresetRequired { which: target }.into());
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate the draft and return its normalized form.
    ///
    /// On error the draft is untouched and editing can continue.
    pub fn save(&self) -> Result<ModerationConfig, SaveError> {
        self.validate()?;
        Ok(normalize(&self.draft, &self.catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::form_schema::{FieldKind, FieldSpec, FormSchema};
    use crate::core::moderation::moderation_models::{LocalizedText, API, KEYWORDS, OPENAI_MODERATION};
    use crate::core::moderation::provider_catalog::CodeBasedExtension;
    use serde_json::json;

    fn field(variable: &str, label: &str, required: bool, default: Value) -> FieldSpec {
        FieldSpec {
            kind: FieldKind::TextInput,
            label: LocalizedText::new(label, format!("{label}（中文）")),
            variable: variable.to_string(),
            required,
            options: Vec::new(),
            default,
            placeholder: None,
            max_length: None,
        }
    }

    fn catalog() -> ProviderCatalog {
        let cloud_guard = CodeBasedExtension {
            name: "cloud_guard".to_string(),
            label: LocalizedText::new("Cloud Guard", "云卫士"),
            form_schema: Some(FormSchema::new(vec![
                field("region", "Region", true, json!("us")),
                field("api_key", "API Key", true, json!("")),
                field("secret", "Secret", true, json!("")),
                field("note", "Note", false, json!("")),
            ])),
        };
        ProviderCatalog::new(&[cloud_guard], Locale::EnUs)
    }

    fn editor_with(config: ModerationConfig) -> ModerationConfigEditor {
        ModerationConfigEditor::new(config, catalog(), true, Locale::EnUs)
    }

    fn keywords_config(keywords: &str) -> ModerationConfig {
        let mut config = ModerationConfig {
            enabled: true,
            provider: KEYWORDS.to_string(),
            ..Default::default()
        };
        config
            .config
            .set_content(ContentTarget::Inputs, ContentConfig::enabled_with("blocked"));
        config.config.set_text(KEYWORDS_KEY, keywords);
        config
    }

    #[test]
    fn test_keywords_collapse_blank_runs() {
        assert_eq!(sanitize_keywords("a\n\n\nb"), "a\n\nb");
        assert_eq!(sanitize_keywords("a\nb"), "a\nb");
        assert_eq!(sanitize_keywords(""), "");
        assert_eq!(sanitize_keywords("\n\na"), "\na");
    }

    #[test]
    fn test_keywords_are_bounded() {
        let long_line = "x".repeat(250);
        let raw: Vec<String> = (0..300).map(|i| format!("{long_line}{i}")).collect();
        let cleaned = sanitize_keywords(&raw.join("\n"));

        let lines: Vec<&str> = cleaned.split('\n').collect();
        assert_eq!(lines.len(), MAX_KEYWORD_LINES);
        assert!(lines.iter().all(|l| l.chars().count() <= MAX_KEYWORD_LENGTH));
    }

    #[test]
    fn test_keyword_lines_cut_on_characters() {
        let line = "审".repeat(150);
        let cleaned = sanitize_keywords(&line);
        assert_eq!(cleaned.chars().count(), MAX_KEYWORD_LENGTH);
    }

    #[test]
    fn test_set_keywords_updates_draft_and_count() {
        let mut editor = editor_with(keywords_config(""));
        editor.apply(EditIntent::SetKeywords("spam\n\n\n\nscam\n".to_string()));

        assert_eq!(editor.draft().config.keywords(), Some("spam\n\nscam\n"));
        assert_eq!(editor.keyword_count(), 2);
    }

    #[test]
    fn test_set_type_to_extension_uses_schema_defaults() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_type("cloud_guard");

        let body = &editor.draft().config;
        assert_eq!(editor.draft().provider, "cloud_guard");
        assert_eq!(body.get("region"), Some(&json!("us")));
        assert_eq!(body.get("api_key"), Some(&json!("")));
        assert!(body.keywords().is_none());
        assert!(body.content_enabled(ContentTarget::Inputs));
    }

    #[test]
    fn test_switching_back_to_keywords_clears_extension_fields() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_type("cloud_guard");
        editor.set_extra_fields(BTreeMap::from([("api_key".to_string(), json!("k"))]));
        editor.set_type(KEYWORDS);

        let body = &editor.draft().config;
        assert!(body.fields.is_empty());
        assert_eq!(
            body.inputs_config,
            Some(ContentConfig::enabled_with("blocked"))
        );
    }

    #[test]
    fn test_set_extra_fields_merges_and_routes_content_configs() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_extra_fields(BTreeMap::from([
            ("region".to_string(), json!("eu")),
            (
                "outputs_config".to_string(),
                json!({ "enabled": true, "preset_response": "nope" }),
            ),
            ("inputs_config".to_string(), json!("garbage")),
        ]));

        let body = &editor.draft().config;
        assert_eq!(body.get("region"), Some(&json!("eu")));
        assert_eq!(body.keywords(), Some("spam"));
        assert_eq!(body.outputs_config, Some(ContentConfig::enabled_with("nope")));
        assert_eq!(body.inputs_config, Some(ContentConfig::enabled_with("blocked")));
        assert!(body.get("inputs_config").is_none());
    }

    #[test]
    fn test_save_requires_an_enabled_side() {
        for provider in [KEYWORDS, API, "cloud_guard", OPENAI_MODERATION] {
            let mut config = keywords_config("spam");
            config.provider = provider.to_string();
            config.config.inputs_config = Some(ContentConfig::disabled());
            config.config.outputs_config = None;

            let editor = editor_with(config);
            assert_eq!(
                editor.save(),
                Err(SaveError::Validation(ValidationError::Condition)),
                "provider {provider}"
            );
        }
    }

    #[test]
    fn test_save_requires_keywords() {
        let editor = editor_with(keywords_config(""));
        assert_eq!(
            editor.save(),
            Err(SaveError::Validation(ValidationError::MissingField {
                field: "keywords".to_string()
            }))
        );
    }

    #[test]
    fn test_missing_field_label_is_localized() {
        let editor =
            ModerationConfigEditor::new(keywords_config(""), catalog(), true, Locale::ZhHans);
        let err = editor.validate().unwrap_err();
        assert_eq!(
            err,
            SaveError::Validation(ValidationError::MissingField {
                field: "关键词".to_string()
            })
        );
        if let SaveError::Validation(v) = err {
            assert_eq!(v.message(Locale::ZhHans), "关键词必填");
        }
    }

    #[test]
    fn test_save_requires_extension_id_for_api() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_type(API);
        assert_eq!(
            editor.save(),
            Err(SaveError::Validation(ValidationError::MissingField {
                field: "API Extension".to_string()
            }))
        );

        editor.set_extension_id("ext-1");
        let saved = editor.save().unwrap();
        assert_eq!(saved.config.api_based_extension_id(), Some("ext-1"));
    }

    #[test]
    fn test_api_provider_does_not_need_preset_response() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_type(API);
        editor.set_extension_id("ext-1");
        editor.set_content_config(
            ContentTarget::Outputs,
            ContentConfig {
                enabled: true,
                preset_response: None,
            },
        );
        assert!(editor.save().is_ok());
    }

    #[test]
    fn test_first_missing_required_field_is_reported() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_type("cloud_guard");
        editor.set_extra_fields(BTreeMap::from([("secret".to_string(), json!("s"))]));

        assert_eq!(
            editor.save(),
            Err(SaveError::Validation(ValidationError::MissingField {
                field: "API Key".to_string()
            }))
        );
    }

    #[test]
    fn test_preset_response_required_in_order() {
        let mut config = keywords_config("spam");
        config.config.inputs_config = Some(ContentConfig {
            enabled: true,
            preset_response: Some(String::new()),
        });
        config.config.outputs_config = Some(ContentConfig {
            enabled: true,
            preset_response: None,
        });
        let mut editor = editor_with(config);

        assert_eq!(
            editor.save(),
            Err(SaveError::Validation(ValidationError::PresetRequired {
                which: ContentTarget::Inputs
            }))
        );

        editor.set_content_config(ContentTarget::Inputs, ContentConfig::enabled_with("in"));
        assert_eq!(
            editor.save(),
            Err(SaveError::Validation(ValidationError::PresetRequired {
                which: ContentTarget::Outputs
            }))
        );
    }

    #[test]
    fn test_openai_save_blocked_when_unusable() {
        let mut config = keywords_config("spam");
        config.provider = OPENAI_MODERATION.to_string();

        let blocked = ModerationConfigEditor::new(config.clone(), catalog(), false, Locale::EnUs);
        assert!(!blocked.can_save());
        assert_eq!(blocked.save(), Err(SaveError::ProviderUnavailable));

        let allowed = ModerationConfigEditor::new(config, catalog(), true, Locale::EnUs);
        assert!(allowed.can_save());
        let saved = allowed.save().unwrap();
        assert!(saved.config.fields.is_empty());
    }

    #[test]
    fn test_unavailable_openai_reported_before_condition() {
        let mut config = keywords_config("spam");
        config.provider = OPENAI_MODERATION.to_string();
        config.config.inputs_config = Some(ContentConfig::disabled());
        config.config.outputs_config = Some(ContentConfig::disabled());

        let editor = ModerationConfigEditor::new(config, catalog(), false, Locale::EnUs);
        assert_eq!(editor.save(), Err(SaveError::ProviderUnavailable));
    }

    #[test]
    fn test_unknown_extension_with_both_sides_disabled_fails_condition() {
        let config = ModerationConfig {
            enabled: true,
            provider: "vanished_ext".to_string(),
            ..Default::default()
        };

        let editor = ModerationConfigEditor::new(
            config,
            ProviderCatalog::new(&[], Locale::EnUs),
            true,
            Locale::EnUs,
        );
        assert_eq!(
            editor.save(),
            Err(SaveError::Validation(ValidationError::Condition))
        );
    }

    #[test]
    fn test_unknown_extension_cannot_be_saved() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_type("vanished");
        assert_eq!(
            editor.save(),
            Err(SaveError::UnknownProvider("vanished".to_string()))
        );
    }

    #[test]
    fn test_saved_config_always_has_both_content_configs() {
        let mut config = keywords_config("spam");
        config.config.outputs_config = None;
        config.config.set_text(API_EXTENSION_KEY, "stale");

        let saved = editor_with(config).save().unwrap();
        assert_eq!(saved.config.outputs_config, Some(ContentConfig::disabled()));
        assert!(saved.config.inputs_config.is_some());
        assert_eq!(saved.config.fields.len(), 1);

        let json = serde_json::to_value(&saved).unwrap();
        assert_eq!(json["config"]["outputs_config"], json!({ "enabled": false }));
    }

    #[test]
    fn test_extension_save_keeps_schema_fields_only() {
        let mut editor = editor_with(keywords_config("spam"));
        editor.set_type("cloud_guard");
        editor.set_extra_fields(BTreeMap::from([
            ("api_key".to_string(), json!("k")),
            ("secret".to_string(), json!("s")),
            ("leftover".to_string(), json!("x")),
        ]));

        let saved = editor.save().unwrap();
        let keys: Vec<&str> = saved.config.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["api_key", "note", "region", "secret"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let catalog = catalog();
        let mut config = keywords_config("spam");
        config.config.set_text("leftover", "x");
        config.config.outputs_config = None;

        let once = normalize(&config, &catalog);
        let twice = normalize(&once, &catalog);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_field_input_requires_schema() {
        let mut editor = editor_with(keywords_config("spam"));
        assert_eq!(
            editor.set_field_input("region", "eu"),
            Err(FormError::NoSchema(KEYWORDS.to_string()))
        );

        editor.set_type("cloud_guard");
        editor.set_field_input("region", "eu").unwrap();
        assert_eq!(editor.draft().config.get("region"), Some(&json!("eu")));
    }
}
