//! The core models for managing a stateful chat with an LLM.
use crate::openai::Message;

/// An ordered, append-only conversation history. Each `send` call
/// builds its own transcript from the session's seed messages, so
/// transcripts are never shared across calls.
#[derive(Default, Clone)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::Role;

    #[test]
    fn test_transcript_push_appends_in_order() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());

        transcript.push(Message::new(Role::User, "Hello"));
        transcript.push(Message::new(Role::Assistant, "Hi there!"));

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[0].content, "Hello");
        assert_eq!(transcript.messages()[1].content, "Hi there!");
    }

    #[test]
    fn test_transcript_from_seed_messages() {
        let seed = vec![Message::new(Role::System, "You are a helpful assistant.")];
        let transcript = Transcript::new_with_messages(seed);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::System);
    }
}
