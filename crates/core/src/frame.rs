//! Event-stream protocol frames.
//!
//! Frames are the units written to the client connection. Turning upstream text into frames is a
//! pure function so it can be tested without any network.

use crate::constants::STREAM_OPEN_COMMENT;
use bytes::Bytes;

/// `Content-Type` of a streamed consultation response.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// One unit written to the outbound event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolFrame {
    /// `: <text>` comment line. Carries no data; used to signal the stream is live.
    Comment(String),
    /// `data: <text>` carrying one line segment (never contains `\n`).
    Data(String),
    /// Bare data line reproducing a line break between segments of one fragment.
    Spacer,
    /// Terminal `error` event. Nothing follows it.
    Error(String),
    /// Optional terminal success marker.
    Done,
}

impl ProtocolFrame {
    /// The comment frame that opens every stream.
    pub fn open() -> Self {
        Self::Comment(STREAM_OPEN_COMMENT.to_string())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Done)
    }

    /// Wire encoding of the frame.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Comment(text) => format!(": {text}\n\n").into(),
            Self::Data(text) => format!("data: {text}\n\n").into(),
            Self::Spacer => Bytes::from_static(b"data:  \n"),
            Self::Error(message) => {
                let mut out = String::from("event: error\n");
                // A message spanning lines stays one event: one data field per line.
                for line in message.split('\n') {
                    out.push_str("data: ");
                    out.push_str(line.trim_end_matches('\r'));
                    out.push('\n');
                }
                out.push('\n');
                out.into()
            }
            Self::Done => Bytes::from_static(b"event: done\ndata: [DONE]\n\n"),
        }
    }
}

/// Decompose one fragment of generated text into frames.
///
/// Every `\n`-separated segment except the last becomes a data frame followed by a spacer; the
/// last segment becomes a data frame with no spacer. Empty text yields no frames.
pub fn fragment_frames(text: &str) -> Vec<ProtocolFrame> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut segments = text.split('\n').peekable();
    let mut frames = Vec::new();
    while let Some(segment) = segments.next() {
        frames.push(ProtocolFrame::Data(segment.to_string()));
        if segments.peek().is_some() {
            frames.push(ProtocolFrame::Spacer);
        }
    }
    frames
}
