// Moderation settings service - editing sessions around the config editor.
//
// This service handles:
// - Loading the saved configuration of a guild
// - Building the provider catalog from the console (extensions + OpenAI status)
// - One editing session per (guild, user)
// - Persisting the normalized configuration when a session is saved
//
// NO Discord dependencies here - just pure domain logic.

use super::moderation_editor::{EditIntent, ModerationConfigEditor, SaveError};
use super::form_schema::{FormError, FormSchema};
use super::moderation_models::{Locale, ModerationConfig, StoredModerationConfig};
use super::provider_catalog::{openai_usable, CodeBasedExtension, ModelProvider, ProviderCatalog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Console API error: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No moderation settings are being edited. Start with /moderation edit.")]
    NoActiveSession,

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// PORTS
// ============================================================================

/// Where provider information comes from (the application console).
#[async_trait]
pub trait ModerationCatalogSource: Send + Sync {
    /// Code-based extensions registered for the moderation module.
    async fn fetch_extensions(&self) -> Result<Vec<CodeBasedExtension>, CatalogError>;

    /// Model providers of the workspace, used to decide if OpenAI is usable.
    async fn fetch_model_providers(&self) -> Result<Vec<ModelProvider>, CatalogError>;
}

/// Owner of the canonical (saved) configuration per guild.
#[async_trait]
pub trait ModerationConfigStore: Send + Sync {
    async fn get_config(&self, guild_id: u64)
        -> Result<Option<StoredModerationConfig>, StoreError>;

    async fn save_config(
        &self,
        guild_id: u64,
        record: StoredModerationConfig,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Read-only view of a session's draft, for display.
#[derive(Debug, Clone)]
pub struct DraftView {
    pub draft: ModerationConfig,
    pub provider_name: String,
    pub form_schema: Option<FormSchema>,
    pub providers: Vec<(String, String)>,
    pub keyword_count: usize,
    pub can_save: bool,
    pub locale: Locale,
}

impl DraftView {
    fn of(editor: &ModerationConfigEditor) -> Self {
        let provider = editor.current_provider();
        Self {
            draft: editor.draft().clone(),
            provider_name: provider
                .map(|p| p.name.clone())
                .unwrap_or_else(|| editor.draft().provider.clone()),
            form_schema: provider.and_then(|p| p.form_schema.clone()),
            providers: editor
                .catalog()
                .providers()
                .iter()
                .map(|p| (p.key.clone(), p.name.clone()))
                .collect(),
            keyword_count: editor.keyword_count(),
            can_save: editor.can_save(),
            locale: editor.locale(),
        }
    }
}

struct EditingSession {
    editor: ModerationConfigEditor,
    last_activity: DateTime<Utc>,
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationSettingsService<C: ModerationCatalogSource, S: ModerationConfigStore> {
    source: C,
    store: S,
    // (guild_id, user_id) -> open editing session
    sessions: DashMap<(u64, u64), EditingSession>,
}

impl<C: ModerationCatalogSource, S: ModerationConfigStore> ModerationSettingsService<C, S> {
    pub fn new(source: C, store: S) -> Self {
        Self {
            source,
            store,
            sessions: DashMap::new(),
        }
    }

    /// The saved configuration of a guild, or the default one.
    pub async fn get_config(&self, guild_id: u64) -> Result<ModerationConfig, StoreError> {
        Ok(self
            .store
            .get_config(guild_id)
            .await?
            .map(|record| record.config)
            .unwrap_or_default())
    }

    /// Saved configuration together with its audit fields.
    pub async fn get_record(
        &self,
        guild_id: u64,
    ) -> Result<Option<StoredModerationConfig>, StoreError> {
        self.store.get_config(guild_id).await
    }

    /// Fetch the catalog inputs. Failures degrade to the built-in providers
    /// and an unusable OpenAI provider.
    async fn load_catalog(&self, locale: Locale) -> (ProviderCatalog, bool) {
        let extensions = match self.source.fetch_extensions().await {
            Ok(extensions) => extensions,
            Err(e) => {
                tracing::warn!("Failed to fetch moderation extensions: {}", e);
                Vec::new()
            }
        };

        let openai = match self.source.fetch_model_providers().await {
            Ok(providers) => openai_usable(&providers),
            Err(e) => {
                tracing::warn!("Failed to fetch model providers: {}", e);
                false
            }
        };

        (ProviderCatalog::new(&extensions, locale), openai)
    }

    /// Start editing the guild's configuration. An already open session of the
    /// same user is replaced.
    pub async fn begin_session(
        &self,
        guild_id: u64,
        user_id: u64,
        locale: Locale,
    ) -> Result<DraftView, SessionError> {
        let current = self.get_config(guild_id).await?;
        let (catalog, openai) = self.load_catalog(locale).await;

        tracing::info!(
            guild_id,
            user_id,
            provider = %current.provider,
            extensions = catalog.providers().len().saturating_sub(3),
            openai_usable = openai,
            "Moderation editing session started"
        );

        let editor = ModerationConfigEditor::new(current, catalog, openai, locale);
        let view = DraftView::of(&editor);
        self.sessions.insert(
            (guild_id, user_id),
            EditingSession {
                editor,
                last_activity: Utc::now(),
            },
        );

        Ok(view)
    }

    fn with_session<T>(
        &self,
        guild_id: u64,
        user_id: u64,
        f: impl FnOnce(&mut ModerationConfigEditor) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut session = self
            .sessions
            .get_mut(&(guild_id, user_id))
            .ok_or(SessionError::NoActiveSession)?;
        session.last_activity = Utc::now();
        f(&mut session.editor)
    }

    #[allow(dead_code)]
    pub fn has_session(&self, guild_id: u64, user_id: u64) -> bool {
        self.sessions.contains_key(&(guild_id, user_id))
    }

    pub fn view(&self, guild_id: u64, user_id: u64) -> Result<DraftView, SessionError> {
        self.with_session(guild_id, user_id, |editor| Ok(DraftView::of(editor)))
    }

    /// Apply one edit to the user's draft.
    pub fn apply(
        &self,
        guild_id: u64,
        user_id: u64,
        intent: EditIntent,
    ) -> Result<DraftView, SessionError> {
        self.with_session(guild_id, user_id, |editor| {
            tracing::debug!(guild_id, user_id, ?intent, "Applying moderation edit");
            editor.apply(intent);
            Ok(DraftView::of(editor))
        })
    }

    /// Set one extension field from raw user input.
    pub fn set_field(
        &self,
        guild_id: u64,
        user_id: u64,
        variable: &str,
        raw: &str,
    ) -> Result<DraftView, SessionError> {
        self.with_session(guild_id, user_id, |editor| {
            editor.set_field_input(variable, raw)?;
            Ok(DraftView::of(editor))
        })
    }

    /// Validate and persist the draft. The session ends only on success.
    ///
    /// The session leaves the map before the write, so a concurrent `cancel`
    /// sees no session and a session started meanwhile is never removed here.
    pub async fn save(&self, guild_id: u64, user_id: u64) -> Result<ModerationConfig, SessionError> {
        let key = (guild_id, user_id);
        let (_, mut session) = self
            .sessions
            .remove(&key)
            .ok_or(SessionError::NoActiveSession)?;
        session.last_activity = Utc::now();

        let config = match session.editor.save() {
            Ok(config) => config,
            Err(e) => {
                self.restore(key, session);
                return Err(e.into());
            }
        };

        let record = StoredModerationConfig {
            config: config.clone(),
            updated_by: user_id,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.store.save_config(guild_id, record).await {
            tracing::error!(guild_id, user_id, "Failed to store moderation settings: {}", e);
            self.restore(key, session);
            return Err(e.into());
        }

        tracing::info!(
            guild_id,
            user_id,
            provider = %config.provider,
            enabled = config.enabled,
            "Moderation settings saved"
        );
        Ok(config)
    }

    // Put a session back after a failed save, unless a newer one took its place.
    fn restore(&self, key: (u64, u64), session: EditingSession) {
        self.sessions.entry(key).or_insert(session);
    }

    /// Discard the user's draft.
    pub fn cancel(&self, guild_id: u64, user_id: u64) -> Result<(), SessionError> {
        if self.sessions.remove(&(guild_id, user_id)).is_none() {
            return Err(SessionError::NoActiveSession);
        }

        tracing::info!(guild_id, user_id, "Moderation editing session cancelled");
        Ok(())
    }

    /// Cancel sessions without activity for longer than `max_idle`.
    /// Returns how many were dropped.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        // Idle limits past the representable time range never expire anything
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|max_idle| Utc::now().checked_sub_signed(max_idle))
        else {
            return 0;
        };
        let before = self.sessions.len();

        self.sessions
            .retain(|_, session| session.last_activity > cutoff);

        let dropped = before.saturating_sub(self.sessions.len());
        if dropped > 0 {
            tracing::info!(dropped, "Dropped idle moderation editing sessions");
        }
        dropped
    }
}

// ============================================================================
// TESTS
// ============================================================================
