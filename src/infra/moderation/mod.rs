// Moderation settings infra layer.
// - `console_client.rs` talks to the application console HTTP API.
// - `json_store.rs` persists saved configurations to disk.

#[path = "console_client.rs"]
pub mod console_client;

#[path = "json_store.rs"]
pub mod json_store;

pub use console_client::ConsoleApiClient;
pub use json_store::JsonModerationStore;
