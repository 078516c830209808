//! Constants used throughout the consultation core crate.
//!
//! Environment variable names live here so binaries, the CLI and error messages agree on them.

/// Azure OpenAI resource endpoint, e.g. `https://<resource>.openai.azure.com/`.
pub const ENV_AZURE_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";

/// Azure OpenAI access key.
pub const ENV_AZURE_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";

/// Azure OpenAI REST API version, e.g. `2024-12-01-preview`.
pub const ENV_AZURE_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

/// Azure OpenAI deployment name (used as the model identifier).
pub const ENV_AZURE_OPENAI_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";

/// Key-set URL used to verify bearer tokens.
pub const ENV_JWKS_URL: &str = "CLERK_JWKS_URL";

/// Listen address for the REST server.
pub const ENV_REST_ADDR: &str = "CONSULT_REST_ADDR";

/// Directory holding the pre-built frontend bundle.
pub const ENV_STATIC_DIR: &str = "CONSULT_STATIC_DIR";

/// Set to `true`, `1`, `yes` or `on` to end successful streams with a `done` event.
pub const ENV_DONE_MARKER: &str = "CONSULT_DONE_MARKER";

/// Default listen address when `CONSULT_REST_ADDR` is not set.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:8000";

/// Default frontend bundle directory, relative to the working directory.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Domain every Azure OpenAI resource endpoint lives under.
pub const AZURE_OPENAI_DOMAIN: &str = ".openai.azure.com";

/// Completion-length cap sent with every generation request.
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 5000;

/// Payload of the comment frame that opens every stream.
pub const STREAM_OPEN_COMMENT: &str = "stream-open";
