use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::Config;
use crate::conversation::{ChatRole, Conversation, TROUBLE_REPLY};
use crate::gemini::{ComplexityReport, GatewayError, GeminiClient, WordExplanations};
use crate::playback::Playback;
use crate::prefs::AccessibilityPrefs;
use crate::prompt;
use crate::speech::{CommandEngine, SpeechEngine, SpeechEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Structured-analysis result shown in the popup.
pub enum AnalysisView {
    Complexity(ComplexityReport),
    Words(WordExplanations),
}

enum AnalysisTask {
    Complexity(JoinHandle<Result<ComplexityReport, GatewayError>>),
    Words(JoinHandle<Result<WordExplanations, GatewayError>>),
}

const KEY_MISSING_NOTICE: &str = "Error: Gemini API key not configured. \
    Set GEMINI_API_KEY or add \"gemini_api_key\" to the easyread config file.";

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state
    pub conversation: Conversation,
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars
    pub selected: Option<usize>, // assistant message targeted by actions

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // height of chat area for scroll calculations
    pub chat_width: u16,  // width of chat area for wrap calculations

    // Analysis popup state
    pub analysis: Option<AnalysisView>,
    pub analysis_scroll: u16,

    // Read-aloud playback
    pub playback: Playback,

    // Accessibility preferences
    pub prefs: AccessibilityPrefs,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Gateway
    client: Option<GeminiClient>,

    // In-flight work
    reply_task: Option<JoinHandle<Result<String, GatewayError>>>,
    simplify_task: Option<(usize, JoinHandle<Result<String, GatewayError>>)>,
    analysis_task: Option<AnalysisTask>,
}

impl App {
    pub fn new(
        config: &Config,
        speech_events: tokio::sync::mpsc::UnboundedSender<SpeechEvent>,
    ) -> Self {
        let client = config
            .resolve_api_key()
            .map(|key| GeminiClient::new(&key, &config.resolve_model()));

        let engine: Option<Box<dyn SpeechEngine>> = CommandEngine::detect()
            .map(|e| Box::new(e) as Box<dyn SpeechEngine>);

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            conversation: Conversation::new(),
            input: String::new(),
            input_cursor: 0,
            selected: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            analysis: None,
            analysis_scroll: 0,

            playback: Playback::new(engine, speech_events),

            prefs: config.resolve_prefs(),

            animation_frame: 0,

            client,

            reply_task: None,
            simplify_task: None,
            analysis_task: None,
        }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.client.as_ref().map(|c| c.model())
    }

    /// Submit the input box as a new user turn. Rejected while a
    /// conversational request is already in flight.
    pub fn submit(&mut self) {
        let text = self.input.trim().to_string();
        // History snapshot excludes the turn being submitted
        let history: Vec<(ChatRole, String)> = self
            .conversation
            .history()
            .into_iter()
            .map(|(role, content)| (role, content.to_string()))
            .collect();

        if !self.conversation.submit(&text) {
            return;
        }
        self.input.clear();
        self.input_cursor = 0;

        match &self.client {
            Some(client) => {
                let client = client.clone();
                let prompt = prompt::chat_prompt(&text);
                self.reply_task = Some(tokio::spawn(async move {
                    client.generate_reply(&history, &prompt).await
                }));
            }
            None => {
                // No request to wait for; resolve in place
                self.conversation.resolve_reply(KEY_MISSING_NOTICE.to_string());
            }
        }
        self.scroll_to_bottom();
    }

    /// Request a simplified rewrite of the selected reply. Not gated by
    /// the conversational processing flag, but only one simplify runs at
    /// a time.
    pub fn simplify_selected(&mut self) {
        if self.simplify_task.is_some() {
            return;
        }
        let Some(index) = self.selected else {
            return;
        };
        let Some(msg) = self.conversation.get(index) else {
            return;
        };
        if msg.role != ChatRole::Assistant || msg.is_simplified {
            return;
        }
        let text = msg.content.clone();

        let Some(client) = self.client.clone() else {
            self.conversation.push_notice(KEY_MISSING_NOTICE.to_string());
            return;
        };
        if !self.conversation.begin_simplify(index) {
            return;
        }
        let task = tokio::spawn(async move {
            client
                .generate_once("simplify", &prompt::simplify_prompt(&text))
                .await
        });
        self.simplify_task = Some((index, task));
    }

    /// Request a reading-complexity report for the selected reply.
    pub fn analyze_selected(&mut self) {
        let Some((client, text)) = self.selected_action_target() else {
            return;
        };
        if self.analysis_task.is_some() {
            return;
        }
        self.analysis_task = Some(AnalysisTask::Complexity(tokio::spawn(async move {
            client.analyze_complexity(&text).await
        })));
    }

    /// Request explanations for the difficult words in the selected reply.
    pub fn explain_selected(&mut self) {
        let Some((client, text)) = self.selected_action_target() else {
            return;
        };
        if self.analysis_task.is_some() {
            return;
        }
        self.analysis_task = Some(AnalysisTask::Words(tokio::spawn(async move {
            client.explain_words(&text).await
        })));
    }

    fn selected_action_target(&mut self) -> Option<(GeminiClient, String)> {
        let index = self.selected?;
        let msg = self.conversation.get(index)?;
        if msg.role != ChatRole::Assistant {
            return None;
        }
        let text = msg.content.clone();
        match self.client.clone() {
            Some(client) => Some((client, text)),
            None => {
                self.conversation.push_notice(KEY_MISSING_NOTICE.to_string());
                None
            }
        }
    }

    pub fn speak_selected(&mut self) {
        if let Some(index) = self.selected {
            self.playback.speak(&mut self.conversation, index);
        }
    }

    pub fn stop_speaking(&mut self) {
        self.playback.stop(&mut self.conversation);
    }

    pub fn on_speech_event(&mut self, event: SpeechEvent) {
        self.playback.on_event(&mut self.conversation, event);
    }

    pub fn clear_conversation(&mut self) {
        self.playback.stop(&mut self.conversation);
        self.conversation.clear();
        self.selected = None;
        self.chat_scroll = 0;
    }

    pub fn analysis_pending(&self) -> bool {
        self.analysis_task.is_some()
    }

    /// Resolve any finished background tasks. Called from the event
    /// loop on every tick.
    pub async fn poll_tasks(&mut self) {
        if self
            .reply_task
            .as_ref()
            .is_some_and(JoinHandle::is_finished)
        {
            if let Some(task) = self.reply_task.take() {
                match task.await {
                    Ok(Ok(reply)) => self.conversation.resolve_reply(reply),
                    Ok(Err(err)) => {
                        warn!(%err, "conversational request failed");
                        self.conversation.resolve_failure();
                    }
                    Err(err) => {
                        warn!(%err, "reply task panicked");
                        self.conversation.resolve_failure();
                    }
                }
                self.select_latest_assistant();
                self.scroll_to_bottom();
            }
        }

        if self
            .simplify_task
            .as_ref()
            .is_some_and(|(_, task)| task.is_finished())
        {
            if let Some((index, task)) = self.simplify_task.take() {
                match task.await {
                    Ok(Ok(simplified)) => {
                        self.conversation.resolve_simplify(index, simplified)
                    }
                    Ok(Err(err)) => {
                        warn!(%err, "simplify request failed");
                        self.conversation.resolve_simplify_failure(index);
                    }
                    Err(err) => {
                        warn!(%err, "simplify task panicked");
                        self.conversation.resolve_simplify_failure(index);
                    }
                }
                self.select_latest_assistant();
                self.scroll_to_bottom();
            }
        }

        let analysis_done = match &self.analysis_task {
            Some(AnalysisTask::Complexity(task)) => task.is_finished(),
            Some(AnalysisTask::Words(task)) => task.is_finished(),
            None => false,
        };
        if analysis_done {
            if let Some(task) = self.analysis_task.take() {
                self.analysis_scroll = 0;
                match task {
                    AnalysisTask::Complexity(task) => match task.await {
                        Ok(Ok(report)) => {
                            self.analysis = Some(AnalysisView::Complexity(report))
                        }
                        Ok(Err(err)) => {
                            warn!(%err, "complexity request failed");
                            self.conversation.push_notice(TROUBLE_REPLY.to_string());
                        }
                        Err(err) => {
                            warn!(%err, "complexity task panicked");
                            self.conversation.push_notice(TROUBLE_REPLY.to_string());
                        }
                    },
                    AnalysisTask::Words(task) => match task.await {
                        Ok(Ok(words)) => self.analysis = Some(AnalysisView::Words(words)),
                        Ok(Err(err)) => {
                            warn!(%err, "explanation request failed");
                            self.conversation.push_notice(TROUBLE_REPLY.to_string());
                        }
                        Err(err) => {
                            warn!(%err, "explanation task panicked");
                            self.conversation.push_notice(TROUBLE_REPLY.to_string());
                        }
                    },
                }
            }
        }
    }

    // Selection over assistant messages

    pub fn select_next(&mut self) {
        let indices = self.assistant_indices();
        if indices.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(current) => indices
                .iter()
                .copied()
                .find(|&i| i > current)
                .unwrap_or_else(|| indices[0]),
            None => indices[0],
        });
    }

    pub fn select_prev(&mut self) {
        let indices = self.assistant_indices();
        if indices.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(current) => indices
                .iter()
                .rev()
                .copied()
                .find(|&i| i < current)
                .unwrap_or_else(|| indices[indices.len() - 1]),
            None => indices[indices.len() - 1],
        });
    }

    fn select_latest_assistant(&mut self) {
        self.selected = self.assistant_indices().last().copied();
    }

    fn assistant_indices(&self) -> Vec<usize> {
        self.conversation
            .messages()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == ChatRole::Assistant)
            .map(|(i, _)| i)
            .collect()
    }

    // Preference steppers, persisted as they change

    pub fn font_size_up(&mut self) {
        self.prefs.font_size_up();
        let _ = Config::save_prefs(self.prefs);
    }

    pub fn font_size_down(&mut self) {
        self.prefs.font_size_down();
        let _ = Config::save_prefs(self.prefs);
    }

    pub fn line_spacing_up(&mut self) {
        self.prefs.line_spacing_up();
        let _ = Config::save_prefs(self.prefs);
    }

    pub fn line_spacing_down(&mut self) {
        self.prefs.line_spacing_down();
        let _ = Config::save_prefs(self.prefs);
    }

    pub fn cycle_font(&mut self) {
        self.prefs.cycle_font();
        let _ = Config::save_prefs(self.prefs);
    }

    // Chat scrolling

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll so the newest message (or the thinking indicator) is
    /// visible.
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };
        let gap = self.prefs.blank_lines() as u16;

        let mut total_lines: u16 = 0;
        for msg in self.conversation.messages() {
            total_lines += 1; // Role line
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16 * (1 + gap);
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.conversation.processing() {
            total_lines += 2; // Role line + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.processing() || self.analysis_task.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn app_without_client() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = Config::new();
        let mut app = App::new(&config, tx);
        // Tests must not depend on the host's keyring or speech tools
        app.client = None;
        app.playback = {
            let (tx, _rx) = mpsc::unbounded_channel();
            Playback::new(None, tx)
        };
        app
    }

    #[test]
    fn test_submit_without_key_resolves_with_notice() {
        let mut app = app_without_client();
        app.input = "hello".to_string();
        app.submit();
        assert_eq!(app.conversation.len(), 2);
        assert!(!app.conversation.processing());
        assert!(app
            .conversation
            .get(1)
            .unwrap()
            .content
            .contains("API key not configured"));
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_blank_submit_keeps_input() {
        let mut app = app_without_client();
        app.input = "   ".to_string();
        app.submit();
        assert!(app.conversation.is_empty());
    }

    #[test]
    fn test_selection_cycles_assistant_messages() {
        let mut app = app_without_client();
        app.conversation.submit("one");
        app.conversation.resolve_reply("first".to_string());
        app.conversation.submit("two");
        app.conversation.resolve_reply("second".to_string());

        app.select_next();
        assert_eq!(app.selected, Some(1));
        app.select_next();
        assert_eq!(app.selected, Some(3));
        app.select_next(); // wraps
        assert_eq!(app.selected, Some(1));
        app.select_prev();
        assert_eq!(app.selected, Some(3));
    }

    #[test]
    fn test_clear_conversation_resets_state() {
        let mut app = app_without_client();
        app.conversation.submit("one");
        app.conversation.resolve_reply("first".to_string());
        app.selected = Some(1);
        app.clear_conversation();
        assert!(app.conversation.is_empty());
        assert_eq!(app.selected, None);
    }

    #[test]
    fn test_simplify_ignores_user_and_simplified_messages() {
        let mut app = app_without_client();
        app.conversation.submit("one");
        app.conversation.resolve_reply("first".to_string());
        app.conversation.resolve_simplify(1, "simpler".to_string());

        // User message: no-op
        app.selected = Some(0);
        app.simplify_selected();
        assert_eq!(app.conversation.len(), 3);

        // Already-simplified message: no-op
        app.selected = Some(2);
        app.simplify_selected();
        assert_eq!(app.conversation.len(), 3);
    }
}
