/// Upstream configuration problems, detected before any stream is opened.
///
/// The display text is returned to the caller verbatim in a JSON error body, so each message
/// names the environment variable an operator has to fix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid AZURE_OPENAI_ENDPOINT (expected https://<resource>.openai.azure.com)")]
    InvalidEndpoint,
    #[error("AZURE_OPENAI_API_KEY not set")]
    MissingApiKey,
    #[error("AZURE_OPENAI_DEPLOYMENT not set (must be Azure deployment name)")]
    MissingDeployment,
    #[error("AZURE_OPENAI_API_VERSION not set")]
    MissingApiVersion,
    #[error("invalid server address: {0}")]
    InvalidAddress(String),
}

/// Failures raised by the upstream language-model provider.
///
/// Once a stream is open these surface as a single terminal error frame; the display text is
/// the frame payload.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to connect to upstream: {0}")]
    Connection(String),
    #[error("upstream API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("upstream stream error: {0}")]
    Stream(String),
    #[error("failed to parse upstream chunk: {0}")]
    Parse(String),
    #[error("upstream provider error: {0}")]
    Provider(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
