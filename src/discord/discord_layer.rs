// Discord layer - commands and event handlers.

#[path = "moderation/mod.rs"]
pub mod moderation;

use crate::core::moderation::ModerationSettingsService;
use crate::infra::moderation::{ConsoleApiClient, JsonModerationStore};
use std::sync::Arc;

/// Shared state handed to every command.
pub struct Data {
    pub moderation: Arc<ModerationSettingsService<ConsoleApiClient, JsonModerationStore>>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type ApplicationContext<'a> = poise::ApplicationContext<'a, Data, Error>;
