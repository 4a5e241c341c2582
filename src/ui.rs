use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, AnalysisView, InputMode};
use crate::conversation::{ChatRole, Message};
use crate::gemini::{ComplexityReport, WordExplanations};
use crate::playback::{HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};
use crate::prompt;

/// Turn a line of message text into spans, rendering the word wrapped in
/// the playback highlight markers as the spoken-word highlight.
fn parse_highlight_line(text: &str) -> Line<'static> {
    let Some(open) = text.find(HIGHLIGHT_OPEN) else {
        return Line::from(text.to_string());
    };
    let after_open = open + HIGHLIGHT_OPEN.len();
    let Some(close_rel) = text[after_open..].find(HIGHLIGHT_CLOSE) else {
        return Line::from(text.to_string());
    };
    let close = after_open + close_rel;

    let mut spans: Vec<Span<'static>> = Vec::new();
    if open > 0 {
        spans.push(Span::raw(text[..open].to_string()));
    }
    spans.push(Span::styled(
        text[after_open..close].to_string(),
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ));
    let rest = &text[close + HIGHLIGHT_CLOSE.len()..];
    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }
    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.analysis.is_some() || app.analysis_pending() {
        render_analysis_popup(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let prefs = &app.prefs;
    let title = Line::from(vec![
        Span::styled(" EasyRead ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(
                "Aa {}px · {:.2}x · {}",
                prefs.font_size_px,
                prefs.line_spacing,
                prefs.font_family.display_name()
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn message_lines(msg: &Message, index: usize, app: &App, lines: &mut Vec<Line<'static>>) {
    let gap = app.prefs.blank_lines();
    let selected = app.selected == Some(index);

    let mut role_spans: Vec<Span<'static>> = Vec::new();
    match msg.role {
        ChatRole::User => {
            role_spans.push(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ));
        }
        ChatRole::Assistant => {
            let style = if selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            };
            role_spans.push(Span::styled(
                if selected { "▸ EasyRead:" } else { "EasyRead:" },
                style,
            ));
            if msg.is_simplified {
                role_spans.push(Span::raw(" "));
                role_spans.push(Span::styled(
                    "[Simplified]",
                    Style::default().fg(Color::Magenta),
                ));
            }
            if msg.highlighted {
                role_spans.push(Span::raw(" "));
                role_spans.push(Span::styled(
                    "reading aloud",
                    Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
                ));
            }
        }
    }
    lines.push(Line::from(role_spans));

    // Playback rewrites the text with the spoken word marked up; fall
    // back to the plain content otherwise.
    let content = if msg.highlighted {
        msg.highlighted_content.as_ref().unwrap_or(&msg.content)
    } else {
        &msg.content
    };

    for line in content.lines() {
        if msg.highlighted {
            lines.push(parse_highlight_line(line));
        } else {
            lines.push(Line::from(line.to_string()));
        }
        for _ in 0..gap {
            lines.push(Line::default());
        }
    }

    if msg.simplifying {
        lines.push(Line::from(Span::styled(
            "Simplifying text...",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines.push(Line::default());
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = match app.model_name() {
        Some(model) => format!(" Reading Assistant · {} ", model),
        None => " Reading Assistant ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let text = if app.conversation.is_empty() && !app.conversation.processing() {
        let mut lines = vec![
            Line::from(Span::styled(
                "Welcome to EasyRead!",
                Style::default().fg(Color::Cyan).bold(),
            )),
            Line::default(),
        ];
        for line in prompt::WELCOME.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Type below and press Enter to start.",
            Style::default().fg(Color::DarkGray),
        )));
        Text::from(lines)
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for (index, msg) in app.conversation.messages().iter().enumerate() {
            message_lines(msg, index, app, &mut lines);
        }

        if app.conversation.processing() {
            lines.push(Line::from(Span::styled(
                "EasyRead:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if editing {
            " Ask for help or paste text here (Esc for commands) "
        } else {
            " Press i to type "
        });

    // Horizontal scroll keeps the cursor visible in long input
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = if app.analysis.is_some() {
        " Esc close · j/k scroll ".to_string()
    } else if app.input_mode == InputMode::Editing {
        " Enter send · Esc commands · Ctrl-C quit ".to_string()
    } else {
        let playing = if app.playback.is_active() {
            "s stop reading"
        } else {
            "r read aloud"
        };
        format!(
            " Tab select · {} · x simplify · a analyze · e explain · +/- size · [/] spacing · f font · C clear · q quit ",
            playing
        )
    };

    let mut spans = vec![Span::styled(hints, Style::default().fg(Color::DarkGray))];
    if !app.has_client() {
        spans.push(Span::styled(
            " no API key ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_analysis_popup(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 18.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let (title, lines) = match &app.analysis {
        Some(AnalysisView::Complexity(report)) => {
            (" Reading Complexity (Esc to close) ", complexity_lines(report))
        }
        Some(AnalysisView::Words(words)) => {
            (" Tricky Words (Esc to close) ", explanation_lines(words))
        }
        None => {
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            (
                " Analyzing ",
                vec![Line::from(Span::styled(
                    format!("Reading the text{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ))],
            )
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let popup = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.analysis_scroll, 0));

    frame.render_widget(popup, popup_area);
}

fn complexity_lines(report: &ComplexityReport) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Complexity score: ", Style::default().bold()),
            Span::styled(
                format!("{}/10", report.complexity_score),
                Style::default().fg(score_color(report.complexity_score)),
            ),
        ]),
        Line::default(),
    ];

    if !report.difficult_words.is_empty() {
        lines.push(Line::from(Span::styled(
            "Difficult words",
            Style::default().fg(Color::Yellow).bold(),
        )));
        for word in &report.difficult_words {
            let mut text = format!("• {} — {}", word.word, word.meaning);
            if !word.suggestion.is_empty() {
                text.push_str(&format!(" (try: {})", word.suggestion));
            }
            lines.push(Line::from(text));
        }
        lines.push(Line::default());
    }

    if !report.long_sentences.is_empty() {
        lines.push(Line::from(Span::styled(
            "Long sentences",
            Style::default().fg(Color::Yellow).bold(),
        )));
        for sentence in &report.long_sentences {
            lines.push(Line::from(format!("• {}", sentence)));
        }
        lines.push(Line::default());
    }

    if !report.suggestions.is_empty() {
        lines.push(Line::from(Span::styled(
            "Suggestions",
            Style::default().fg(Color::Yellow).bold(),
        )));
        for suggestion in &report.suggestions {
            lines.push(Line::from(format!("• {}", suggestion)));
        }
    }

    lines
}

fn explanation_lines(words: &WordExplanations) -> Vec<Line<'static>> {
    if words.explanations.is_empty() {
        return vec![Line::from(Span::styled(
            "No tricky words found in this text.",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let mut lines = Vec::new();
    for explanation in &words.explanations {
        lines.push(Line::from(Span::styled(
            explanation.word.clone(),
            Style::default().fg(Color::Yellow).bold(),
        )));
        lines.push(Line::from(format!("  {}", explanation.explanation)));
        if !explanation.alternatives.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("  simpler: {}", explanation.alternatives.join(", ")),
                Style::default().fg(Color::Green),
            )));
        }
        lines.push(Line::default());
    }
    lines
}

fn score_color(score: u8) -> Color {
    match score {
        0..=3 => Color::Green,
        4..=6 => Color::Yellow,
        _ => Color::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_highlight_line_styles_marked_word() {
        let line = parse_highlight_line("Hello ⟪world⟫ again");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "world");
        assert_eq!(line.spans[1].style.bg, Some(Color::Yellow));
    }

    #[test]
    fn test_parse_highlight_line_without_markers_is_plain() {
        let line = parse_highlight_line("Hello world");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "Hello world");
    }
}
