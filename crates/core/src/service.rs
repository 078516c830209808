//! Consultation summary service.

use std::sync::Arc;

use crate::backend::CompletionBackend;
use crate::config::UpstreamConfig;
use crate::error::ConfigResult;
use crate::prompt::{GenerationParams, PromptPair};
use crate::relay::{relay, FrameStream, RelayOptions};
use crate::visit::VisitRequest;

/// Pure consultation operations - no API concerns
///
/// Holds only process-wide configuration and the backend handle; every call builds its own
/// prompt and its own upstream stream.
#[derive(Clone)]
pub struct ConsultationService {
    upstream: Arc<UpstreamConfig>,
    backend: Arc<dyn CompletionBackend>,
    relay_options: RelayOptions,
}

impl ConsultationService {
    pub fn new(upstream: Arc<UpstreamConfig>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            upstream,
            backend,
            relay_options: RelayOptions::default(),
        }
    }

    pub fn with_relay_options(mut self, relay_options: RelayOptions) -> Self {
        self.relay_options = relay_options;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Start a streamed summary for one visit.
    ///
    /// The upstream configuration is validated first; on failure nothing is contacted and no
    /// stream exists. On success the returned stream is lazy: the upstream call starts when the
    /// stream is first polled past its open frame.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing or malformed upstream setting.
    pub fn summarise(&self, visit: VisitRequest) -> ConfigResult<FrameStream> {
        let target = self.upstream.validate()?;
        let prompt = PromptPair::for_visit(&visit);
        let params = GenerationParams::for_deployment(target.deployment());

        tracing::info!(
            backend = self.backend.name(),
            deployment = target.deployment(),
            "starting consultation summary stream"
        );

        Ok(relay(
            self.backend.clone(),
            target,
            prompt,
            params,
            self.relay_options,
        ))
    }

    /// Build the prompt a visit would be summarised with, without contacting the provider.
    pub fn preview_prompt(&self, visit: &VisitRequest) -> PromptPair {
        PromptPair::for_visit(visit)
    }
}
