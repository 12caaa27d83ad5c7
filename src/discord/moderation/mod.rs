// Discord adapter for the moderation settings editor.
// - `commands.rs` maps slash commands to editor intents.
// - `formatter.rs` renders drafts and saved settings as embeds.

pub mod commands;
pub mod formatter;
