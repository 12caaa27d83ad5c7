use crate::core::moderation::{
    ContentConfig, ContentTarget, DraftView, FieldKind, FormSchema, Locale, ModerationConfig,
    ProviderKind, StoredModerationConfig, MAX_KEYWORD_LINES,
};
use poise::serenity_prelude::{self as serenity, CreateEmbed, CreateEmbedFooter};

// Discord caps embed field values at 1024 characters.
const FIELD_VALUE_LIMIT: usize = 1000;

fn clip(text: &str) -> String {
    if text.chars().count() <= FIELD_VALUE_LIMIT {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(FIELD_VALUE_LIMIT).collect();
        clipped.push('…');
        clipped
    }
}

fn describe_content(config: Option<&ContentConfig>, kind: ProviderKind) -> String {
    match config {
        Some(c) if c.enabled => {
            if kind == ProviderKind::Api {
                "✅ Enabled (reply comes from the API extension)".to_string()
            } else {
                match c.preset_response.as_deref().filter(|p| !p.is_empty()) {
                    Some(preset) => format!("✅ Enabled\nPreset reply: {}", clip(preset)),
                    None => "✅ Enabled\n⚠️ No preset reply".to_string(),
                }
            }
        }
        _ => "❌ Disabled".to_string(),
    }
}

fn describe_schema_fields(
    schema: &FormSchema,
    config: &ModerationConfig,
    locale: Locale,
) -> String {
    let lines: Vec<String> = schema
        .fields()
        .map(|field| {
            let value = match config.config.get(&field.variable) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => {
                    if field.kind == FieldKind::Select {
                        field
                            .options
                            .iter()
                            .find(|o| &o.value == s)
                            .map(|o| o.label.get(locale).to_string())
                            .unwrap_or_else(|| s.clone())
                    } else {
                        s.clone()
                    }
                }
                Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {
                    "—".to_string()
                }
                Some(other) => other.to_string(),
            };
            let marker = if field.required { "*" } else { "" };
            format!(
                "**{}{}** (`{}`): {}",
                field.label(locale),
                marker,
                field.variable,
                value
            )
        })
        .collect();

    if lines.is_empty() {
        "No fields".to_string()
    } else {
        lines.join("\n")
    }
}

/// Fields shared by the draft and saved views.
fn config_embed(
    embed: CreateEmbed,
    config: &ModerationConfig,
    provider_name: &str,
    schema: Option<&FormSchema>,
    locale: Locale,
) -> CreateEmbed {
    let kind = config.provider_kind();
    let mut embed = embed
        .field(
            "Moderation",
            if config.enabled { "✅ On" } else { "❌ Off" },
            true,
        )
        .field(
            "Provider",
            format!("{} (`{}`)", provider_name, config.provider),
            true,
        );

    match kind {
        ProviderKind::Keywords => {
            let keywords = config.config.keywords().unwrap_or_default();
            let shown = if keywords.is_empty() {
                "—".to_string()
            } else {
                format!("```\n{}\n```", clip(keywords))
            };
            embed = embed.field("Keywords", shown, false);
        }
        ProviderKind::Api => {
            let id = config
                .config
                .api_based_extension_id()
                .filter(|id| !id.is_empty())
                .unwrap_or("—");
            embed = embed.field("API Extension", format!("`{}`", id), false);
        }
        ProviderKind::Extension => {
            if let Some(schema) = schema {
                embed = embed.field(
                    "Settings",
                    clip(&describe_schema_fields(schema, config, locale)),
                    false,
                );
            }
        }
        ProviderKind::OpenAiModeration => {}
    }

    embed
        .field(
            "Input content",
            describe_content(config.config.content(ContentTarget::Inputs), kind),
            true,
        )
        .field(
            "Output content",
            describe_content(config.config.content(ContentTarget::Outputs), kind),
            true,
        )
}

/// Render an in-progress draft.
pub fn format_draft(view: &DraftView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📝 Moderation Settings (draft)")
        .color(serenity::Color::from_rgb(255, 165, 0)); // Orange

    embed = config_embed(
        embed,
        &view.draft,
        &view.provider_name,
        view.form_schema.as_ref(),
        view.locale,
    );

    if view.draft.provider_kind() == ProviderKind::Keywords {
        embed = embed.field(
            "Lines",
            format!("{}/{}", view.keyword_count, MAX_KEYWORD_LINES),
            true,
        );
    }

    if !view.can_save {
        embed = embed.description(
            "⚠️ The OpenAI provider is not configured for this workspace. \
             Set it up in the model provider settings before saving.",
        );
    }

    let providers = view
        .providers
        .iter()
        .map(|(key, name)| {
            if key == &view.draft.provider {
                format!("**{}** (`{}`) ◀", name, key)
            } else {
                format!("{} (`{}`)", name, key)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    embed
        .field("Available providers", clip(&providers), false)
        .footer(CreateEmbedFooter::new(
            "Use /moderation save to apply or /moderation cancel to discard",
        ))
}

/// Render the saved settings of a guild.
pub fn format_saved(record: Option<&StoredModerationConfig>, config: &ModerationConfig) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("🛡️ Moderation Settings")
        .color(if config.enabled {
            serenity::Color::from_rgb(0, 255, 0)
        } else {
            serenity::Color::from_rgb(255, 0, 0)
        });

    let embed = config_embed(embed, config, &config.provider, None, Locale::default());

    match record {
        Some(record) => embed
            .field(
                "Last updated",
                format!(
                    "<t:{}:R> by <@{}>",
                    record.updated_at.timestamp(),
                    record.updated_by
                ),
                false,
            )
            .timestamp(serenity::Timestamp::now()),
        None => embed.description("Never configured. Start with `/moderation edit`."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::{FieldSpec, LocalizedText};
    use serde_json::json;

    #[test]
    fn test_clip_long_text() {
        let long = "a".repeat(FIELD_VALUE_LIMIT + 10);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), FIELD_VALUE_LIMIT + 1);
        assert!(clipped.ends_with('…'));
        assert_eq!(clip("short"), "short");
    }

    #[test]
    fn test_describe_content() {
        let enabled = ContentConfig::enabled_with("Nope");
        assert_eq!(
            describe_content(Some(&enabled), ProviderKind::Keywords),
            "✅ Enabled\nPreset reply: Nope"
        );
        assert!(describe_content(Some(&enabled), ProviderKind::Api).contains("API extension"));
        assert_eq!(describe_content(None, ProviderKind::Keywords), "❌ Disabled");
    }

    #[test]
    fn test_describe_content_fits_embed_field() {
        let long = ContentConfig::enabled_with("n".repeat(6000));
        let described = describe_content(Some(&long), ProviderKind::Keywords);
        assert!(described.chars().count() <= 1024);
        assert!(described.ends_with('…'));
    }

    #[test]
    fn test_describe_schema_fields_shows_option_labels() {
        let schema = FormSchema::new(vec![FieldSpec {
            kind: FieldKind::Select,
            label: LocalizedText::new("Mode", "模式"),
            variable: "mode".to_string(),
            required: true,
            options: vec![crate::core::moderation::FieldOption {
                label: LocalizedText::new("Strict", "严格"),
                value: "strict".to_string(),
            }],
            default: json!("strict"),
            placeholder: None,
            max_length: None,
        }]);
        let mut config = ModerationConfig {
            provider: "ext".to_string(),
            ..Default::default()
        };
        config.config.set_text("mode", "strict");

        assert_eq!(
            describe_schema_fields(&schema, &config, Locale::ZhHans),
            "**模式*** (`mode`): 严格"
        );
    }
}
