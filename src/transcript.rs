//! Ordered, role-tagged message history for one chat session.
//!
//! The first entry is the coach persona (`Role::System`) whenever the session
//! is in use. [`Transcript::ensure_system_prompt`] restores that after a reset
//! and is cheap enough to run on every render.

use crate::types::{ChatMessage, Role};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: &str) -> Self {
        let mut transcript = Self::new();
        transcript.ensure_system_prompt(prompt);
        transcript
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Inserts `prompt` at the front unless the first message is already a
    /// system message. Returns `true` when an insertion happened.
    pub fn ensure_system_prompt(&mut self, prompt: &str) -> bool {
        if matches!(self.messages.first(), Some(first) if first.role == Role::System) {
            return false;
        }
        self.messages.insert(0, ChatMessage::system(prompt));
        true
    }

    /// Drops every message, including the system prompt.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages shown to the user; the persona instruction stays hidden.
    pub fn visible(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|msg| msg.role != Role::System)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
