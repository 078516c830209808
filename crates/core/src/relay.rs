//! Streaming relay.
//!
//! Bridges one upstream generation call to the outbound event stream: an open comment first,
//! then the frames of every text fragment in arrival order, then either the natural end of the
//! stream or exactly one terminal error frame.
//!
//! The upstream [`FragmentStream`] is owned by the relay's stream state. It is dropped as soon
//! as the upstream ends or fails, and also when the relay stream itself is dropped (the serving
//! layer drops the body when the client disconnects), so every exit path closes the upstream
//! connection.

use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::backend::{CompletionBackend, FragmentStream};
use crate::config::UpstreamTarget;
use crate::frame::{fragment_frames, ProtocolFrame};
use crate::prompt::{GenerationParams, PromptPair};

/// Lazy, finite, non-restartable sequence of outbound frames.
pub type FrameStream = BoxStream<'static, ProtocolFrame>;

/// Relay behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOptions {
    /// Emit [`ProtocolFrame::Done`] when the upstream finishes without error.
    pub done_marker: bool,
}

/// Relay an upstream generation call as protocol frames.
///
/// Nothing happens until the stream is polled. The open frame is produced before the upstream
/// call is started; a failure to start the call becomes the terminal error frame.
pub fn relay(
    backend: Arc<dyn CompletionBackend>,
    target: UpstreamTarget,
    prompt: PromptPair,
    params: GenerationParams,
    options: RelayOptions,
) -> FrameStream {
    let body = stream::once(async move {
        match backend.stream(&target, &prompt, &params).await {
            Ok(upstream) => relay_fragments(upstream, options),
            Err(err) => {
                tracing::warn!(backend = backend.name(), error = %err, "failed to open upstream stream");
                stream::iter([ProtocolFrame::Error(err.to_string())]).boxed()
            }
        }
    })
    .flatten();

    stream::once(async { ProtocolFrame::open() })
        .chain(body)
        .boxed()
}

struct RelayState {
    upstream: Option<FragmentStream>,
    pending: VecDeque<ProtocolFrame>,
    fragments: usize,
    options: RelayOptions,
}

/// Convert upstream fragments into frames, stopping after the first upstream error.
pub fn relay_fragments(upstream: FragmentStream, options: RelayOptions) -> FrameStream {
    let state = RelayState {
        upstream: Some(upstream),
        pending: VecDeque::new(),
        fragments: 0,
        options,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((frame, state));
            }

            let next = state.upstream.as_mut()?.next().await;
            match next {
                Some(Ok(fragment)) => {
                    if let Some(text) = fragment.content() {
                        state.fragments += 1;
                        state.pending.extend(fragment_frames(text));
                    }
                }
                Some(Err(err)) => {
                    state.upstream = None;
                    tracing::warn!(fragments = state.fragments, error = %err, "upstream stream failed");
                    return Some((ProtocolFrame::Error(err.to_string()), state));
                }
                None => {
                    state.upstream = None;
                    tracing::debug!(fragments = state.fragments, "upstream stream finished");
                    if state.options.done_marker {
                        return Some((ProtocolFrame::Done, state));
                    }
                    return None;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ScriptStep, ScriptedBackend};
    use crate::config::UpstreamConfig;
    use std::time::Duration;
    use ProtocolFrame::{Data, Spacer};

    fn target() -> UpstreamTarget {
        UpstreamConfig::new(
            Some("https://foo.openai.azure.com/".into()),
            Some("k".into()),
            Some("2024-01-01".into()),
            Some("gpt-x".into()),
        )
        .validate()
        .expect("test config should validate")
    }

    fn prompt() -> PromptPair {
        PromptPair {
            system_instructions: "sys",
            user_content: "user".into(),
        }
    }

    fn data(s: &str) -> ProtocolFrame {
        Data(s.to_string())
    }

    fn start(backend: Arc<ScriptedBackend>, options: RelayOptions) -> FrameStream {
        relay(
            backend,
            target(),
            prompt(),
            GenerationParams::for_deployment("gpt-x"),
            options,
        )
    }

    #[tokio::test]
    async fn test_open_frame_comes_first() {
        let backend = Arc::new(ScriptedBackend::new(vec![ScriptStep::text("Hello")]));
        let frames: Vec<_> = start(backend, RelayOptions::default()).collect().await;

        assert_eq!(frames, vec![ProtocolFrame::open(), data("Hello")]);
    }

    #[tokio::test]
    async fn test_upstream_not_called_before_open_frame() {
        let backend = Arc::new(ScriptedBackend::new(vec![ScriptStep::text("Hello")]));
        let mut frames = start(backend.clone(), RelayOptions::default());

        assert_eq!(backend.calls(), 0);
        assert_eq!(frames.next().await, Some(ProtocolFrame::open()));
        assert_eq!(backend.calls(), 0);
        assert_eq!(frames.next().await, Some(data("Hello")));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_multi_line_fragment_is_split() {
        let backend = Arc::new(ScriptedBackend::new(vec![ScriptStep::text("a\nb\nc")]));
        let frames: Vec<_> = start(backend, RelayOptions::default()).collect().await;

        assert_eq!(
            frames,
            vec![ProtocolFrame::open(), data("a"), Spacer, data("b"), Spacer, data("c")]
        );
    }

    #[tokio::test]
    async fn test_empty_and_absent_content_is_skipped() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ScriptStep::empty(),
            ScriptStep::text(""),
            ScriptStep::text("x"),
            ScriptStep::empty(),
        ]));
        let frames: Vec<_> = start(backend, RelayOptions::default()).collect().await;

        assert_eq!(frames, vec![ProtocolFrame::open(), data("x")]);
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_terminal() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ScriptStep::text("Summary:"),
            ScriptStep::text(" looks good"),
            ScriptStep::Fail("connection reset".into()),
            ScriptStep::text("never sent"),
        ]));
        let frames: Vec<_> = start(backend.clone(), RelayOptions { done_marker: true })
            .collect()
            .await;

        assert_eq!(
            frames,
            vec![
                ProtocolFrame::open(),
                data("Summary:"),
                data(" looks good"),
                ProtocolFrame::Error("upstream stream error: connection reset".into()),
            ]
        );
        assert!(backend.released(), "upstream should be dropped after an error");
    }

    #[tokio::test]
    async fn test_open_failure_becomes_error_frame() {
        let backend = Arc::new(ScriptedBackend::failing_to_open("dns failure"));
        let frames: Vec<_> = start(backend, RelayOptions::default()).collect().await;

        assert_eq!(
            frames,
            vec![
                ProtocolFrame::open(),
                ProtocolFrame::Error("failed to connect to upstream: dns failure".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_done_marker_is_optional() {
        let backend = Arc::new(ScriptedBackend::new(vec![ScriptStep::text("ok")]));

        let without: Vec<_> = start(backend.clone(), RelayOptions::default()).collect().await;
        assert_eq!(without.last(), Some(&data("ok")));

        let with: Vec<_> = start(backend.clone(), RelayOptions { done_marker: true })
            .collect()
            .await;
        assert_eq!(with.last(), Some(&ProtocolFrame::Done));
        assert!(backend.released());
    }

    #[tokio::test]
    async fn test_dropping_relay_releases_upstream() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![
                ScriptStep::text("one"),
                ScriptStep::text("two"),
                ScriptStep::text("three"),
            ])
            .with_step_delay(Duration::from_millis(1)),
        );
        let mut frames = start(backend.clone(), RelayOptions::default());

        assert_eq!(frames.next().await, Some(ProtocolFrame::open()));
        assert_eq!(frames.next().await, Some(data("one")));
        assert!(!backend.released());

        drop(frames);
        assert!(backend.released(), "client disconnect should close the upstream");
    }

    #[tokio::test]
    async fn test_sequential_relays_share_nothing() {
        let first = Arc::new(ScriptedBackend::new(vec![ScriptStep::text("first\n")]));
        let second = Arc::new(ScriptedBackend::new(vec![ScriptStep::text("second")]));

        let a: Vec<_> = start(first, RelayOptions::default()).collect().await;
        let b: Vec<_> = start(second, RelayOptions::default()).collect().await;

        assert_eq!(a, vec![ProtocolFrame::open(), data("first"), Spacer, data("")]);
        assert_eq!(b, vec![ProtocolFrame::open(), data("second")]);
    }
}
