//! Turns a chunked HTTP body into an ordered stream of reply deltas.
//!
//! Network chunks are buffered as raw bytes until a full line is available,
//! so a multi-byte character split across two chunks decodes intact. Each
//! backend supplies a [`LineDecoder`] for its wire format.

use super::{ChatError, ChatResult, DeltaStream};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    /// The server reported an error inside an otherwise successful response.
    Failed(String),
}

pub trait LineDecoder: Send + 'static {
    /// Feeds one line (without its terminator). An undecodable payload is an
    /// error and ends the stream.
    fn line(&mut self, line: &str) -> ChatResult<Vec<StreamEvent>>;

    /// Called once after the body ends.
    fn finish(&mut self) -> ChatResult<Vec<StreamEvent>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.pending);
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

struct DecodeState<S, D> {
    body: S,
    lines: LineBuffer,
    decoder: D,
    queue: VecDeque<Result<String, ChatError>>,
    finished: bool,
}

impl<S, D: LineDecoder> DecodeState<S, D> {
    fn absorb(&mut self, events: ChatResult<Vec<StreamEvent>>) {
        let events = match events {
            Ok(events) => events,
            Err(err) => {
                if !self.finished {
                    self.queue.push_back(Err(err));
                    self.finished = true;
                }
                return;
            }
        };
        for event in events {
            if self.finished {
                return;
            }
            match event {
                StreamEvent::Delta(piece) => {
                    if !piece.is_empty() {
                        self.queue.push_back(Ok(piece));
                    }
                }
                StreamEvent::Done => self.finished = true,
                StreamEvent::Failed(message) => {
                    self.queue.push_back(Err(ChatError::Remote(message)));
                    self.finished = true;
                }
            }
        }
    }
}

/// Decodes `body` lazily. The stream ends after a terminator event, after the
/// first error, or when the body runs out.
pub fn decode_stream<S, B, E, D>(body: S, decoder: D) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatError> + Send + 'static,
    D: LineDecoder,
{
    let state = DecodeState {
        body,
        lines: LineBuffer::default(),
        decoder,
        queue: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(bytes.as_ref()) {
                        let events = state.decoder.line(&line);
                        state.absorb(events);
                    }
                }
                Some(Err(err)) => {
                    state.queue.push_back(Err(err.into()));
                    state.finished = true;
                }
                None => {
                    if let Some(tail) = state.lines.finish() {
                        let events = state.decoder.line(&tail);
                        state.absorb(events);
                    }
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
