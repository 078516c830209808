//! Azure OpenAI streaming backend.
//!
//! Calls the chat-completions API of an Azure OpenAI deployment with `stream: true` and turns
//! the provider's server-sent events into [`Fragment`]s.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use reqwest_eventsource::{retry::Never, Event, EventSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{CompletionBackend, Fragment, FragmentStream};
use crate::config::UpstreamTarget;
use crate::error::UpstreamError;
use crate::prompt::{GenerationParams, PromptPair};

const DONE_SENTINEL: &str = "[DONE]";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Azure OpenAI chat-completions backend.
///
/// Holds only the HTTP client (and its connection pool). Everything request-specific arrives
/// with each call.
#[derive(Clone)]
pub struct AzureOpenAiBackend {
    client: Client,
}

impl AzureOpenAiBackend {
    /// Create a backend with its own HTTP client.
    ///
    /// No overall request timeout is set: a generation stream may legitimately run for minutes.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Connection` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Connection(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionBackend for AzureOpenAiBackend {
    fn name(&self) -> &'static str {
        "azure-openai"
    }

    async fn stream(
        &self,
        target: &UpstreamTarget,
        prompt: &PromptPair,
        params: &GenerationParams,
    ) -> Result<FragmentStream, UpstreamError> {
        let body = ChatRequest::new(prompt, params);

        let req = self
            .client
            .post(target.chat_completions_url())
            .header("api-key", target.api_key())
            .json(&body);

        let mut es = EventSource::new(req).map_err(|e| UpstreamError::Connection(e.to_string()))?;
        es.set_retry_policy(Box::new(Never));

        tracing::debug!(deployment = target.deployment(), "opened upstream event source");

        Ok(fragment_stream(es))
    }
}

/// Adapt the upstream event source into a fragment stream.
///
/// The event source is closed on `[DONE]`, on a clean end of body, and after the first error;
/// the stream yields nothing after that. Dropping the stream drops the event source, which
/// closes the connection.
fn fragment_stream(es: EventSource) -> FragmentStream {
    stream::unfold(Some(es), |state| async move {
        let mut es = state?;
        loop {
            match es.next().await {
                Some(Ok(Event::Open)) => continue,
                Some(Ok(Event::Message(message))) => {
                    if message.data.trim() == DONE_SENTINEL {
                        es.close();
                        return None;
                    }
                    return match decode_chunk(&message.data) {
                        Ok(fragment) => Some((Ok(fragment), Some(es))),
                        Err(err) => {
                            es.close();
                            Some((Err(err), None))
                        }
                    };
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
                    es.close();
                    return None;
                }
                Some(Err(err)) => {
                    es.close();
                    return Some((Err(upstream_error(err).await), None));
                }
            }
        }
    })
    .boxed()
}

/// Decode one `data:` payload of the upstream stream.
///
/// Chunks without `choices[0].delta.content` decode to an empty fragment, including chunks
/// where `choices` or its first entry is `null`. Only payloads that are not JSON at all, or that
/// carry an `error` object, are errors.
fn decode_chunk(data: &str) -> Result<Fragment, UpstreamError> {
    let chunk: ChatChunk =
        serde_json::from_str(data).map_err(|e| UpstreamError::Parse(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(UpstreamError::Provider(error.describe()));
    }

    let content = chunk
        .choices
        .into_iter()
        .flatten()
        .next()
        .flatten()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);

    Ok(Fragment { content })
}

async fn upstream_error(err: reqwest_eventsource::Error) -> UpstreamError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            UpstreamError::Api {
                status: status.as_u16(),
                message: api_error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            }
        }
        reqwest_eventsource::Error::InvalidContentType(content_type, _) => UpstreamError::Stream(
            format!("unexpected content type: {}", content_type.to_str().unwrap_or("<binary>")),
        ),
        reqwest_eventsource::Error::Transport(e) => UpstreamError::Stream(e.to_string()),
        other => UpstreamError::Stream(other.to_string()),
    }
}

/// Pull a readable message out of an error response body.
fn api_error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Some(envelope.error.describe()),
        Err(_) => Some(body.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_completion_tokens: u32,
    stream: bool,
}

impl<'a> ChatRequest<'a> {
    fn new(prompt: &'a PromptPair, params: &'a GenerationParams) -> Self {
        Self {
            model: &params.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt.system_instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user_content,
                },
            ],
            max_completion_tokens: params.max_completion_tokens,
            stream: params.stream,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Option<Vec<Option<ChunkChoice>>>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ProviderError {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}
