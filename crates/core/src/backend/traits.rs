//! Backend trait definitions.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::config::UpstreamTarget;
use crate::error::UpstreamError;
use crate::prompt::{GenerationParams, PromptPair};

/// One incremental piece of generated text.
///
/// `content` is `None` for control-only chunks (role announcements, content-filter results,
/// finish markers) and for chunks whose shape did not carry any text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub content: Option<String>,
}

impl Fragment {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// A fragment with no text content.
    pub fn empty() -> Self {
        Self { content: None }
    }

    /// Text to forward, if any. Empty strings count as no text.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}

/// Ordered, finite, non-restartable sequence of fragments from one upstream call.
///
/// Owning the stream owns the upstream connection: dropping it releases the connection.
pub type FragmentStream = BoxStream<'static, Result<Fragment, UpstreamError>>;

/// A provider able to stream a chat completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Open a streaming generation call.
    ///
    /// Errors returned here happen before any fragment; errors inside the returned stream
    /// happen mid-generation.
    async fn stream(
        &self,
        target: &UpstreamTarget,
        prompt: &PromptPair,
        params: &GenerationParams,
    ) -> Result<FragmentStream, UpstreamError>;
}
