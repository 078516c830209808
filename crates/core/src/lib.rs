//! # Consult Core
//!
//! Core logic for streaming AI-generated consultation summaries.
//!
//! This crate contains:
//! - Startup configuration for the upstream provider and the server
//! - The visit model and prompt construction
//! - Event-stream protocol frames
//! - Upstream backends (Azure OpenAI, scripted)
//! - The streaming relay and the `ConsultationService` facade
//!
//! **No API concerns**: authentication, HTTP routing and response headers belong in
//! `api-shared` and `api-rest`.

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod prompt;
pub mod relay;
pub mod service;
pub mod visit;

pub use backend::{AzureOpenAiBackend, CompletionBackend, Fragment, FragmentStream};
pub use config::{ServerConfig, UpstreamConfig, UpstreamTarget};
pub use error::{ConfigError, ConfigResult, UpstreamError};
pub use frame::{fragment_frames, ProtocolFrame, EVENT_STREAM_CONTENT_TYPE};
pub use prompt::{GenerationParams, PromptPair, SYSTEM_PROMPT};
pub use relay::{relay, relay_fragments, FrameStream, RelayOptions};
pub use service::ConsultationService;
pub use visit::VisitRequest;

pub use consult_types::{NonEmptyText, TextError};
