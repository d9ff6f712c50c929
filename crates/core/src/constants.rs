//! Constants used throughout the VDD core crate.
//!
//! Path names, gateway defaults and client-side limits live here so that the server, the CLI
//! and the tests agree on them.

/// Default directory for profile and history storage when none is configured.
pub const DEFAULT_DATA_DIR: &str = "vdd_data";

/// Directory name (under the data directory) holding per-user sharded folders.
pub const USERS_DIR_NAME: &str = "users";

/// Filename for a user's profile.
pub const PROFILE_FILENAME: &str = "profile.yaml";

/// Filename for a user's medical history.
pub const MEDICAL_HISTORY_FILENAME: &str = "medical_history.yaml";

/// Directory name (inside a user folder) holding one JSON file per completed analysis.
pub const ANALYSES_DIR_NAME: &str = "analyses";

/// Default chat-completions endpoint of the AI gateway.
pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";

/// Default multimodal model requested from the gateway.
pub const DEFAULT_GATEWAY_MODEL: &str = "google/gemini-2.5-flash";

/// Environment variable holding the gateway bearer credential.
pub const GATEWAY_API_KEY_VAR: &str = "AI_GATEWAY_API_KEY";

/// Upper bound on an uploaded image, in bytes (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Number of data-URI characters kept in a history record.
pub const IMAGE_PREVIEW_CHARS: usize = 100;
