//! Streams one assistant reply and accumulates it for live rendering.

use crate::ai::{ChatResult, CompletionBackend, CompletionRequest, DeltaStream};
use crate::types::ChatMessage;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

/// Appended to the partial reply while more deltas are expected.
pub const STREAMING_CURSOR: &str = "▌";

/// Concatenates deltas in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplyAccumulator {
    text: String,
    deltas: usize,
}

impl ReplyAccumulator {
    pub fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.deltas += 1;
    }

    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    /// Partial reply with the in-progress cursor.
    pub fn in_progress(&self) -> String {
        format!("{}{}", self.text, STREAMING_CURSOR)
    }

    pub fn finish(self) -> String {
        self.text
    }
}

pub struct CompletionStreamer {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    temperature: f32,
}

impl CompletionStreamer {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Opens the raw delta stream for `messages`.
    pub async fn stream(&self, messages: &[ChatMessage]) -> ChatResult<DeltaStream> {
        self.backend
            .stream(CompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
            })
            .await
    }

    /// Drives the stream to completion, calling `on_partial` with the
    /// cursor-decorated text after every delta. Any error aborts the reply;
    /// the partial text is dropped.
    pub async fn complete<F>(
        &self,
        messages: &[ChatMessage],
        mut on_partial: F,
    ) -> ChatResult<String>
    where
        F: FnMut(&str),
    {
        let mut deltas = self.stream(messages).await?;
        let mut reply = ReplyAccumulator::default();
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            reply.push(&delta);
            on_partial(&reply.in_progress());
        }
        debug!(
            model = %self.model,
            deltas = reply.delta_count(),
            "reply stream finished"
        );
        Ok(reply.finish())
    }
}
