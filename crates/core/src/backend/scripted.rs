//! Scripted backend for tests and demos.
//!
//! Replays a fixed list of fragments and failures instead of calling a provider, and records
//! what it was asked so callers can assert on the prompt that would have been sent.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{CompletionBackend, Fragment, FragmentStream};
use crate::config::UpstreamTarget;
use crate::error::UpstreamError;
use crate::prompt::{GenerationParams, PromptPair};

/// One step of a scripted upstream response.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Fragment(Fragment),
    /// Mid-stream failure with the given message.
    Fail(String),
}

impl ScriptStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Fragment(Fragment::text(content))
    }

    pub fn empty() -> Self {
        Self::Fragment(Fragment::empty())
    }
}

/// Backend that replays a script.
///
/// Steps after a `Fail` are still yielded if the consumer keeps polling; a well-behaved consumer
/// stops at the first error.
#[derive(Default)]
pub struct ScriptedBackend {
    steps: Vec<ScriptStep>,
    open_error: Option<String>,
    step_delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(PromptPair, GenerationParams)>>,
    released: Arc<AtomicBool>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// A backend whose call fails before any fragment is produced.
    pub fn failing_to_open(message: impl Into<String>) -> Self {
        Self {
            open_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Sleep before each step, to simulate a slow provider.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Number of upstream calls opened so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt and parameters of the most recent call.
    pub fn last_request(&self) -> Option<(PromptPair, GenerationParams)> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Whether the most recently opened fragment stream has been dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Flags its owner's release when dropped.
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream(
        &self,
        _target: &UpstreamTarget,
        prompt: &PromptPair,
        params: &GenerationParams,
    ) -> Result<FragmentStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((prompt.clone(), params.clone()));
        }

        if let Some(message) = &self.open_error {
            return Err(UpstreamError::Connection(message.clone()));
        }

        self.released.store(false, Ordering::SeqCst);
        let guard = ReleaseGuard(self.released.clone());
        let delay = self.step_delay;
        let steps = self.steps.clone().into_iter();

        Ok(stream::unfold((steps, guard), move |(mut steps, guard)| async move {
            let step = steps.next()?;
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            let item = match step {
                ScriptStep::Fragment(fragment) => Ok(fragment),
                ScriptStep::Fail(message) => Err(UpstreamError::Stream(message)),
            };
            Some((item, (steps, guard)))
        })
        .boxed())
    }
}
