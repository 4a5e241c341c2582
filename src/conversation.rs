//! Chat conversation state: the message list and its transition rules.
//!
//! Messages are append-only and addressed by position; the only in-place
//! mutations are the transient flags (`simplifying`, `highlighted`) and
//! the pre-rendered highlight text written during read-aloud playback.

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: ChatRole,
    pub content: String,
    /// True for replies produced by the simplify operation.
    pub is_simplified: bool,
    /// Index of the message this one simplifies.
    pub original_index: Option<usize>,
    /// True while read-aloud playback is highlighting this message.
    pub highlighted: bool,
    /// Full message text with the currently spoken word marked up.
    pub highlighted_content: Option<String>,
    /// True while a simplify request for this message is in flight.
    pub simplifying: bool,
}

impl Message {
    pub fn user(content: String) -> Self {
        Self {
            role: ChatRole::User,
            content,
            is_simplified: false,
            original_index: None,
            highlighted: false,
            highlighted_content: None,
            simplifying: false,
        }
    }

    pub fn assistant(content: String) -> Self {
        Self {
            role: ChatRole::Assistant,
            ..Self::user(content)
        }
    }

    pub fn simplified(content: String, original_index: usize) -> Self {
        Self {
            is_simplified: true,
            original_index: Some(original_index),
            ..Self::assistant(content)
        }
    }
}

/// Fixed reply shown when a conversational request fails. Failures never
/// escape the conversation; they become ordinary entries.
pub const TROUBLE_REPLY: &str = "I had trouble processing that. Could you try again?";

/// Fixed reply shown when a simplify request fails.
pub const SIMPLIFY_TROUBLE_REPLY: &str =
    "I had trouble simplifying that text. Could you try again?";

/// The ordered message list plus the single global processing gate.
///
/// `processing` is true strictly between a submit and its resolution.
/// While it is set, further submits are rejected without touching the
/// message list. Simplify requests are not gated by it.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    processing: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn processing(&self) -> bool {
        self.processing
    }

    /// Append the user message and enter processing mode. Returns false
    /// (leaving the conversation untouched) if a submit is already in
    /// flight or the text is blank.
    pub fn submit(&mut self, text: &str) -> bool {
        if self.processing || text.trim().is_empty() {
            return false;
        }
        self.messages.push(Message::user(text.to_string()));
        self.processing = true;
        true
    }

    /// Append the assistant reply and exit processing mode.
    pub fn resolve_reply(&mut self, content: String) {
        self.messages.push(Message::assistant(content));
        self.processing = false;
    }

    /// Append the fixed trouble reply and exit processing mode.
    pub fn resolve_failure(&mut self) {
        self.messages.push(Message::assistant(TROUBLE_REPLY.to_string()));
        self.processing = false;
    }

    /// Append an assistant message without touching the processing gate,
    /// for conditions reported before any request is issued (e.g. a
    /// missing API key).
    pub fn push_notice(&mut self, content: String) {
        self.messages.push(Message::assistant(content));
    }

    /// Mark the message at `index` as having a simplify request in
    /// flight. Returns false if the index is out of range or the message
    /// is already being simplified.
    pub fn begin_simplify(&mut self, index: usize) -> bool {
        match self.messages.get_mut(index) {
            Some(msg) if !msg.simplifying => {
                msg.simplifying = true;
                true
            }
            _ => false,
        }
    }

    /// Clear the simplifying flag at `index` and append the simplified
    /// text as a new message. The original is otherwise untouched.
    pub fn resolve_simplify(&mut self, index: usize, content: String) {
        if let Some(msg) = self.messages.get_mut(index) {
            msg.simplifying = false;
        }
        self.messages.push(Message::simplified(content, index));
    }

    /// Clear the simplifying flag at `index` and append the fixed
    /// simplify-failure reply.
    pub fn resolve_simplify_failure(&mut self, index: usize) {
        if let Some(msg) = self.messages.get_mut(index) {
            msg.simplifying = false;
        }
        self.messages
            .push(Message::assistant(SIMPLIFY_TROUBLE_REPLY.to_string()));
    }

    /// Role-tagged turns for the gateway's multi-turn history, excluding
    /// the transient trouble replies.
    pub fn history(&self) -> Vec<(ChatRole, &str)> {
        self.messages
            .iter()
            .filter(|m| m.content != TROUBLE_REPLY && m.content != SIMPLIFY_TROUBLE_REPLY)
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.processing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_appends_and_gates() {
        let mut conv = Conversation::new();
        assert!(conv.submit("hello"));
        assert_eq!(conv.len(), 1);
        assert!(conv.processing());

        // Re-entrant submit is rejected without mutation
        assert!(!conv.submit("again"));
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_blank_submit_rejected() {
        let mut conv = Conversation::new();
        assert!(!conv.submit("   "));
        assert!(conv.is_empty());
        assert!(!conv.processing());
    }

    #[test]
    fn test_round_trip_appends_exactly_two() {
        let mut conv = Conversation::new();
        conv.submit("what does ubiquitous mean?");
        conv.resolve_reply("It means found everywhere.".to_string());
        assert_eq!(conv.len(), 2);
        assert!(!conv.processing());
        assert_eq!(conv.get(0).unwrap().role, ChatRole::User);
        assert_eq!(conv.get(1).unwrap().role, ChatRole::Assistant);
    }

    #[test]
    fn test_failure_becomes_conversation_entry() {
        let mut conv = Conversation::new();
        conv.submit("hello");
        conv.resolve_failure();
        assert_eq!(conv.len(), 2);
        assert!(!conv.processing());
        assert_eq!(conv.get(1).unwrap().content, TROUBLE_REPLY);
    }

    #[test]
    fn test_submit_allowed_after_resolution() {
        let mut conv = Conversation::new();
        conv.submit("one");
        conv.resolve_failure();
        assert!(conv.submit("two"));
    }

    #[test]
    fn test_simplify_only_touches_flag_and_appends() {
        let mut conv = Conversation::new();
        conv.submit("explain photosynthesis");
        conv.resolve_reply("Plants convert light into chemical energy.".to_string());

        assert!(conv.begin_simplify(1));
        assert!(conv.get(1).unwrap().simplifying);
        let before = conv.get(1).unwrap().content.clone();

        conv.resolve_simplify(1, "Plants turn light into food.".to_string());
        let original = conv.get(1).unwrap();
        assert!(!original.simplifying);
        assert_eq!(original.content, before);

        let simplified = conv.get(2).unwrap();
        assert!(simplified.is_simplified);
        assert_eq!(simplified.original_index, Some(1));
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn test_simplify_failure_clears_flag_and_appends() {
        let mut conv = Conversation::new();
        conv.submit("q");
        conv.resolve_reply("a".to_string());
        conv.begin_simplify(1);
        conv.resolve_simplify_failure(1);
        assert!(!conv.get(1).unwrap().simplifying);
        assert_eq!(conv.get(2).unwrap().content, SIMPLIFY_TROUBLE_REPLY);
    }

    #[test]
    fn test_double_simplify_rejected() {
        let mut conv = Conversation::new();
        conv.submit("q");
        conv.resolve_reply("a".to_string());
        assert!(conv.begin_simplify(1));
        assert!(!conv.begin_simplify(1));
        assert!(!conv.begin_simplify(7));
    }

    #[test]
    fn test_simplify_not_gated_by_processing() {
        let mut conv = Conversation::new();
        conv.submit("q");
        conv.resolve_reply("a".to_string());
        conv.submit("another");
        assert!(conv.processing());
        // A simplify may start while a submit is pending
        assert!(conv.begin_simplify(1));
    }
}
