// Core moderation settings module - the config editor and its sessions.
// Following the same pattern as the other core modules.

pub mod form_schema;
pub mod moderation_editor;
pub mod moderation_models;
pub mod moderation_service;
pub mod provider_catalog;

pub use form_schema::*;
pub use moderation_editor::*;
pub use moderation_models::*;
pub use moderation_service::*;
pub use provider_catalog::*;
