// Moderation settings slash commands.
//
// Every subcommand is one editor intent: pull primitives out of the
// interaction, call the core service, render the resulting draft. No rules
// live here.

use super::formatter::{format_draft, format_saved};
use crate::core::moderation::{
    ContentConfig, ContentTarget, DraftView, EditIntent, Locale, SaveError, SessionError,
};
use crate::discord::{ApplicationContext, Context, Error};
use std::time::Duration;

const MODAL_TIMEOUT: Duration = Duration::from_secs(600);
// Discord limit for a modal text input, shared by both keyword modals.
const MODAL_TEXT_LIMIT: usize = 4000;

#[derive(Debug, poise::Modal)]
#[name = "Moderation keywords"]
struct KeywordsModal {
    #[name = "Keywords, one per line (max 100 lines)"]
    #[placeholder = "One keyword per line"]
    #[paragraph]
    #[max_length = 4000]
    keywords: Option<String>,
}

#[derive(Debug, poise::Modal)]
#[name = "Add moderation keywords"]
struct AddKeywordsModal {
    #[name = "Keywords to add, one per line"]
    #[placeholder = "Added after the current list"]
    #[paragraph]
    #[max_length = 4000]
    keywords: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum KeywordsMode {
    #[name = "Replace the list"]
    Replace,
    #[name = "Add to the list"]
    Append,
}

/// Whether the current list can be pre-filled into the replace modal.
fn fits_modal(current: Option<&str>) -> bool {
    current.map_or(0, |k| k.chars().count()) <= MODAL_TEXT_LIMIT
}

fn append_keywords(current: Option<&str>, added: &str) -> String {
    match current.filter(|k| !k.is_empty()) {
        Some(current) => format!("{}\n{}", current.trim_end_matches('\n'), added),
        None => added.to_string(),
    }
}

fn locale_of(ctx: Context<'_>) -> Locale {
    ctx.locale().map(Locale::from_tag).unwrap_or_default()
}

fn session_key(ctx: Context<'_>) -> Result<(u64, u64), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    Ok((guild_id.get(), ctx.author().id.get()))
}

async fn reply_draft(ctx: Context<'_>, view: &DraftView) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .embed(format_draft(view))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Turn a service result into a reply. Rule violations and missing sessions
/// are shown to the user; storage failures bubble up.
async fn reply_result(
    ctx: Context<'_>,
    result: Result<DraftView, SessionError>,
) -> Result<(), Error> {
    match result {
        Ok(view) => reply_draft(ctx, &view).await,
        Err(SessionError::Store(e)) => Err(Error::from(e.to_string())),
        Err(err) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("❌ {}", user_message(&err, locale_of(ctx))))
                    .ephemeral(true),
            )
            .await?;
            Ok(())
        }
    }
}

fn user_message(err: &SessionError, locale: Locale) -> String {
    match err {
        SessionError::Save(SaveError::Validation(v)) => v.message(locale),
        other => other.to_string(),
    }
}

async fn autocomplete_provider(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Ok((guild_id, user_id)) = session_key(ctx) else {
        return Vec::new();
    };
    let Ok(view) = ctx.data().moderation.view(guild_id, user_id) else {
        return Vec::new();
    };
    let partial = partial.to_lowercase();
    view.providers
        .into_iter()
        .filter(|(key, name)| {
            key.to_lowercase().contains(&partial) || name.to_lowercase().contains(&partial)
        })
        .map(|(key, _)| key)
        .collect()
}

async fn autocomplete_field(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Ok((guild_id, user_id)) = session_key(ctx) else {
        return Vec::new();
    };
    let Ok(view) = ctx.data().moderation.view(guild_id, user_id) else {
        return Vec::new();
    };
    view.form_schema
        .map(|schema| {
            schema
                .fields()
                .map(|f| f.variable.clone())
                .filter(|v| v.starts_with(partial))
                .collect()
        })
        .unwrap_or_default()
}

/// Moderation settings of this server's application.
#[poise::command(
    slash_command,
    subcommands(
        "status",
        "edit",
        "provider",
        "keywords",
        "inputs",
        "outputs",
        "extension",
        "field",
        "enabled",
        "preview",
        "save",
        "cancel"
    ),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn moderation(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - only subcommands do anything
    Ok(())
}

/// Show the saved moderation settings.
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let (guild_id, _) = session_key(ctx)?;
    let service = &ctx.data().moderation;

    let record = service
        .get_record(guild_id)
        .await
        .map_err(|e| Error::from(e.to_string()))?;
    let config = record
        .as_ref()
        .map(|r| r.config.clone())
        .unwrap_or_default();

    ctx.send(
        poise::CreateReply::default()
            .embed(format_saved(record.as_ref(), &config))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Start editing the moderation settings (discards your previous draft).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn edit(ctx: Context<'_>) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    ctx.defer_ephemeral().await?;

    let result = ctx
        .data()
        .moderation
        .begin_session(guild_id, user_id, locale_of(ctx))
        .await;
    reply_result(ctx, result).await
}

/// Choose the moderation provider.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn provider(
    ctx: Context<'_>,
    #[description = "Provider key"]
    #[autocomplete = "autocomplete_provider"]
    key: String,
) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    let result = ctx
        .data()
        .moderation
        .apply(guild_id, user_id, EditIntent::SetType(key));
    reply_result(ctx, result).await
}

/// Edit the keyword list.
///
/// Lists longer than a modal can hold are always extended with the add modal.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn keywords(
    ctx: ApplicationContext<'_>,
    #[description = "Replace the list (default) or add to it"] mode: Option<KeywordsMode>,
) -> Result<(), Error> {
    let any_ctx = Context::Application(ctx);
    let (guild_id, user_id) = session_key(any_ctx)?;
    let service = &any_ctx.data().moderation;

    let current = match service.view(guild_id, user_id) {
        Ok(view) => view.draft.config.keywords().map(str::to_string),
        Err(err) => return reply_result(any_ctx, Err(err)).await,
    };

    let append = mode == Some(KeywordsMode::Append) || !fits_modal(current.as_deref());
    let raw = if append {
        let Some(submitted) =
            poise::execute_modal::<_, _, AddKeywordsModal>(ctx, None, Some(MODAL_TIMEOUT)).await?
        else {
            return Ok(());
        };
        let added = submitted.keywords.unwrap_or_default().replace("\r\n", "\n");
        append_keywords(current.as_deref(), &added)
    } else {
        let defaults = KeywordsModal { keywords: current };
        let Some(submitted) =
            poise::execute_modal(ctx, Some(defaults), Some(MODAL_TIMEOUT)).await?
        else {
            return Ok(());
        };
        submitted.keywords.unwrap_or_default().replace("\r\n", "\n")
    };

    let result = service.apply(guild_id, user_id, EditIntent::SetKeywords(raw));
    reply_result(any_ctx, result).await
}

async fn set_content(
    ctx: Context<'_>,
    target: ContentTarget,
    enabled: bool,
    preset_response: Option<String>,
) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    let service = &ctx.data().moderation;

    // Keep the current preset reply when none is given
    let preset_response = match preset_response {
        Some(preset) => Some(preset),
        None => match service.view(guild_id, user_id) {
            Ok(view) => view
                .draft
                .config
                .content(target)
                .and_then(|c| c.preset_response.clone()),
            Err(err) => return reply_result(ctx, Err(err)).await,
        },
    };

    let config = ContentConfig {
        enabled,
        preset_response,
    };
    let result = service.apply(
        guild_id,
        user_id,
        EditIntent::SetContentConfig(target, config),
    );
    reply_result(ctx, result).await
}

/// Moderate user input.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn inputs(
    ctx: Context<'_>,
    #[description = "Moderate user input"] enabled: bool,
    #[description = "Reply sent instead of flagged input"] preset_response: Option<String>,
) -> Result<(), Error> {
    set_content(ctx, ContentTarget::Inputs, enabled, preset_response).await
}

/// Moderate model output.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn outputs(
    ctx: Context<'_>,
    #[description = "Moderate model output"] enabled: bool,
    #[description = "Reply sent instead of flagged output"] preset_response: Option<String>,
) -> Result<(), Error> {
    set_content(ctx, ContentTarget::Outputs, enabled, preset_response).await
}

/// Choose the API-based extension (API provider only).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn extension(
    ctx: Context<'_>,
    #[description = "API-based extension ID"] id: String,
) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    let result = ctx
        .data()
        .moderation
        .apply(guild_id, user_id, EditIntent::SetExtensionId(id));
    reply_result(ctx, result).await
}

/// Set a setting of the selected extension provider.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn field(
    ctx: Context<'_>,
    #[description = "Field name"]
    #[autocomplete = "autocomplete_field"]
    name: String,
    #[description = "New value (leave empty to clear)"] value: Option<String>,
) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    let result = ctx.data().moderation.set_field(
        guild_id,
        user_id,
        &name,
        value.as_deref().unwrap_or_default(),
    );
    reply_result(ctx, result).await
}

/// Turn moderation on or off for the application.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn enabled(
    ctx: Context<'_>,
    #[description = "Whether moderation is active"] on: bool,
) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    let result = ctx
        .data()
        .moderation
        .apply(guild_id, user_id, EditIntent::SetEnabled(on));
    reply_result(ctx, result).await
}

/// Show your current draft.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn preview(ctx: Context<'_>) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    let result = ctx.data().moderation.view(guild_id, user_id);
    reply_result(ctx, result).await
}

/// Validate and save your draft.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn save(ctx: Context<'_>) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;
    let service = &ctx.data().moderation;

    match service.save(guild_id, user_id).await {
        Ok(config) => {
            let record = service
                .get_record(guild_id)
                .await
                .map_err(|e| Error::from(e.to_string()))?;
            ctx.send(
                poise::CreateReply::default()
                    .content("✅ Moderation settings saved.")
                    .embed(format_saved(record.as_ref(), &config))
                    .ephemeral(true),
            )
            .await?;
            Ok(())
        }
        Err(err) => reply_result(ctx, Err(err)).await,
    }
}

/// Discard your draft.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let (guild_id, user_id) = session_key(ctx)?;

    let content = match ctx.data().moderation.cancel(guild_id, user_id) {
        Ok(()) => "🗑️ Draft discarded. Saved settings are unchanged.".to_string(),
        Err(err) => format!("❌ {}", user_message(&err, locale_of(ctx))),
    };

    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::ValidationError;

    #[test]
    fn test_validation_errors_use_locale() {
        let err = SessionError::Save(SaveError::Validation(ValidationError::Condition));
        assert_eq!(
            user_message(&err, Locale::ZhHans),
            "审查输入内容和审查输出内容至少开启一项"
        );
        assert_eq!(
            user_message(&SessionError::NoActiveSession, Locale::EnUs),
            "No moderation settings are being edited. Start with /moderation edit."
        );
    }

    #[test]
    fn test_long_keyword_lists_skip_the_prefilled_modal() {
        let line = "k".repeat(100);
        let long: Vec<&str> = std::iter::repeat(line.as_str()).take(60).collect();
        let long = long.join("\n");

        assert!(long.chars().count() > MODAL_TEXT_LIMIT);
        assert!(!fits_modal(Some(&long)));
        assert!(fits_modal(Some("spam\nscam")));
        assert!(fits_modal(None));
    }

    #[test]
    fn test_append_keywords() {
        assert_eq!(append_keywords(Some("spam\n"), "scam"), "spam\nscam");
        assert_eq!(append_keywords(Some(""), "scam"), "scam");
        assert_eq!(append_keywords(None, "scam"), "scam");
    }
}
