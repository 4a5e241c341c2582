//! Read-aloud playback: one utterance at a time with word highlighting.
//!
//! Highlighting is driven purely by boundary-event count: each event
//! re-derives the message text with the word at the cursor wrapped in
//! the highlight markers, then advances the cursor. An engine that emits
//! fewer boundary events than there are words leaves the trailing words
//! unhighlighted; that is a known limitation of count-driven mapping,
//! not something to paper over.

use tokio::sync::mpsc;
use tracing::debug;

use crate::conversation::Conversation;
use crate::speech::{SpeechEngine, SpeechEvent, SpeechEventKind, UtteranceParams};

/// Markers wrapped around the word being spoken. The renderer turns the
/// marked word into a highlighted span; anything that prints the raw
/// text still shows a readable pair of brackets.
pub const HIGHLIGHT_OPEN: &str = "⟪";
pub const HIGHLIGHT_CLOSE: &str = "⟫";

struct PlaybackSession {
    message_index: usize,
    words: Vec<String>,
    cursor: usize,
    utterance: u64,
}

/// Coordinates at most one active utterance and the highlight state it
/// writes into the conversation.
pub struct Playback {
    engine: Option<Box<dyn SpeechEngine>>,
    events: mpsc::UnboundedSender<SpeechEvent>,
    session: Option<PlaybackSession>,
    next_utterance: u64,
}

impl Playback {
    pub fn new(
        engine: Option<Box<dyn SpeechEngine>>,
        events: mpsc::UnboundedSender<SpeechEvent>,
    ) -> Self {
        Self {
            engine,
            events,
            session: None,
            next_utterance: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Read the message at `index` aloud. Any prior utterance is fully
    /// cancelled (and its highlighting cleared) before the new session
    /// starts. Without an engine this is a no-op that stays idle.
    pub fn speak(&mut self, conversation: &mut Conversation, index: usize) {
        self.stop(conversation);

        let Some(text) = conversation.get(index).map(|m| m.content.clone()) else {
            return;
        };
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            return;
        }

        let Some(engine) = self.engine.as_mut() else {
            debug!("speak requested but no engine is available");
            return;
        };

        let utterance = self.next_utterance;
        self.next_utterance += 1;

        if let Err(err) = engine.speak(
            utterance,
            &text,
            UtteranceParams::default(),
            self.events.clone(),
        ) {
            // Engine trouble is invisible to the user; we just stay idle.
            debug!(%err, "speech engine refused utterance");
            return;
        }

        self.session = Some(PlaybackSession {
            message_index: index,
            words,
            cursor: 0,
            utterance,
        });
    }

    /// Cancel the current utterance and clear highlighting everywhere.
    pub fn stop(&mut self, conversation: &mut Conversation) {
        if let Some(engine) = self.engine.as_mut() {
            engine.cancel();
        }
        self.session = None;
        for msg in conversation.messages_mut() {
            msg.highlighted = false;
            msg.highlighted_content = None;
        }
    }

    /// Apply an engine event. Events carrying a stale utterance id are
    /// discarded, so a cancelled session can never write highlights.
    pub fn on_event(&mut self, conversation: &mut Conversation, event: SpeechEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.utterance != event.utterance {
            return;
        }

        match event.kind {
            SpeechEventKind::WordBoundary => {
                if session.cursor >= session.words.len() {
                    return;
                }
                if let Some(msg) = conversation.messages_mut().get_mut(session.message_index) {
                    msg.highlighted = true;
                    msg.highlighted_content =
                        Some(highlight_markup(&session.words, session.cursor));
                }
                session.cursor += 1;
            }
            SpeechEventKind::Finished => {
                if let Some(msg) = conversation.messages_mut().get_mut(session.message_index) {
                    msg.highlighted = false;
                    msg.highlighted_content = None;
                }
                self.session = None;
            }
        }
    }
}

/// Re-derive the full text with the word at `index` wrapped in the
/// highlight markers.
fn highlight_markup(words: &[String], index: usize) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i == index {
                format!("{HIGHLIGHT_OPEN}{word}{HIGHLIGHT_CLOSE}")
            } else {
                word.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::EngineError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeEngine {
        cancels: Arc<AtomicUsize>,
        fail: bool,
    }

    impl SpeechEngine for FakeEngine {
        fn speak(
            &mut self,
            _utterance: u64,
            _text: &str,
            _params: UtteranceParams,
            _events: mpsc::UnboundedSender<SpeechEvent>,
        ) -> Result<(), EngineError> {
            if self.fail {
                Err(EngineError::Unavailable)
            } else {
                Ok(())
            }
        }

        fn cancel(&mut self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn playback_with_engine(fail: bool) -> (Playback, Arc<AtomicUsize>) {
        let cancels = Arc::new(AtomicUsize::new(0));
        let engine = FakeEngine {
            cancels: cancels.clone(),
            fail,
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        (Playback::new(Some(Box::new(engine)), tx), cancels)
    }

    fn conversation_with_reply(text: &str) -> Conversation {
        let mut conv = Conversation::new();
        conv.submit("read this");
        conv.resolve_reply(text.to_string());
        conv
    }

    fn boundary(utterance: u64) -> SpeechEvent {
        SpeechEvent {
            utterance,
            kind: SpeechEventKind::WordBoundary,
        }
    }

    fn finished(utterance: u64) -> SpeechEvent {
        SpeechEvent {
            utterance,
            kind: SpeechEventKind::Finished,
        }
    }

    #[test]
    fn test_boundaries_highlight_words_in_order() {
        let mut conv = conversation_with_reply("Hello world");
        let (mut playback, _) = playback_with_engine(false);

        playback.speak(&mut conv, 1);
        assert!(playback.is_active());

        playback.on_event(&mut conv, boundary(0));
        assert_eq!(
            conv.get(1).unwrap().highlighted_content.as_deref(),
            Some("⟪Hello⟫ world")
        );
        assert!(conv.get(1).unwrap().highlighted);

        playback.on_event(&mut conv, boundary(0));
        assert_eq!(
            conv.get(1).unwrap().highlighted_content.as_deref(),
            Some("Hello ⟪world⟫")
        );

        playback.on_event(&mut conv, finished(0));
        let msg = conv.get(1).unwrap();
        assert!(!msg.highlighted);
        assert!(msg.highlighted_content.is_none());
        assert!(!playback.is_active());
    }

    #[test]
    fn test_extra_boundaries_are_ignored() {
        let mut conv = conversation_with_reply("one two");
        let (mut playback, _) = playback_with_engine(false);
        playback.speak(&mut conv, 1);
        for _ in 0..5 {
            playback.on_event(&mut conv, boundary(0));
        }
        assert_eq!(
            conv.get(1).unwrap().highlighted_content.as_deref(),
            Some("one ⟪two⟫")
        );
    }

    #[test]
    fn test_stop_clears_all_highlighting() {
        let mut conv = conversation_with_reply("Hello world");
        let (mut playback, cancels) = playback_with_engine(false);
        playback.speak(&mut conv, 1);
        playback.on_event(&mut conv, boundary(0));

        playback.stop(&mut conv);
        assert!(!playback.is_active());
        assert!(cancels.load(Ordering::SeqCst) >= 1);
        for msg in conv.messages() {
            assert!(!msg.highlighted);
            assert!(msg.highlighted_content.is_none());
        }
    }

    #[test]
    fn test_new_speak_discards_stale_events() {
        let mut conv = conversation_with_reply("Hello world");
        conv.push_notice("Another reply".to_string());
        let (mut playback, _) = playback_with_engine(false);

        playback.speak(&mut conv, 1);
        playback.speak(&mut conv, 2);

        // Event from the first (cancelled) utterance must not write
        playback.on_event(&mut conv, boundary(0));
        assert!(conv.get(1).unwrap().highlighted_content.is_none());
        assert!(!conv.get(1).unwrap().highlighted);

        // The live utterance still works
        playback.on_event(&mut conv, boundary(1));
        assert_eq!(
            conv.get(2).unwrap().highlighted_content.as_deref(),
            Some("⟪Another⟫ reply")
        );
    }

    #[test]
    fn test_engine_failure_is_silent_noop() {
        let mut conv = conversation_with_reply("Hello world");
        let (mut playback, _) = playback_with_engine(true);
        playback.speak(&mut conv, 1);
        assert!(!playback.is_active());
    }

    #[test]
    fn test_no_engine_is_silent_noop() {
        let mut conv = conversation_with_reply("Hello world");
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut playback = Playback::new(None, tx);
        playback.speak(&mut conv, 1);
        assert!(!playback.is_active());
    }

    #[test]
    fn test_speak_out_of_range_is_noop() {
        let mut conv = conversation_with_reply("Hello world");
        let (mut playback, _) = playback_with_engine(false);
        playback.speak(&mut conv, 9);
        assert!(!playback.is_active());
    }
}
