use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
};
use threatchat_core::format::{inline_lines, FragmentStyle};
use threatchat_core::view::safe_link;
use threatchat_core::{Bubble, Composer, Entry, Role, SourcePanel};
use unicode_width::UnicodeWidthStr;
use crate::app::{App, InputMode};

const TYPING_FRAMES: [&str; 3] = ["●∙∙", "●●∙", "●●●"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let composer_height = app.chat.composer().rows() + 2;

    let [header_area, chat_area, chips_area, composer_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(composer_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_suggestions(app, frame, chips_area);
    render_composer(app, frame, composer_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let state = if app.reset_task.is_some() {
        Span::styled(" resetting… ", Style::default().fg(Color::Magenta))
    } else if app.chat.can_send() {
        Span::styled(" ● ready ", Style::default().fg(Color::Green))
    } else {
        Span::styled(" ◌ waiting for answer ", Style::default().fg(Color::Yellow))
    };

    let header = Line::from(vec![
        Span::styled(
            " 🛡 Threat Intel Chat ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.base_url.clone(), Style::default().fg(Color::DarkGray)),
        state,
    ]);

    frame.render_widget(Paragraph::new(header), area);
}

fn role_line(role: Role, is_error: bool) -> Line<'static> {
    let (label, color) = match role {
        Role::User => ("You", Color::Cyan),
        Role::Bot if is_error => ("Assistant", Color::Red),
        Role::Bot => ("Assistant", Color::Yellow),
    };
    Line::from(Span::styled(
        format!("{} {}", role.avatar(), label),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn bubble_lines(bubble: &Bubble, selected: bool, lines: &mut Vec<Line<'static>>) {
    let is_error = bubble.role() == Role::Bot && bubble.text().starts_with('❌');
    lines.push(role_line(bubble.role(), is_error));

    let base = if is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };

    for fragments in inline_lines(bubble.text()) {
        let mut spans = vec![Span::raw("  ")];
        spans.extend(fragments.into_iter().map(|f| match f.style {
            FragmentStyle::Plain => Span::styled(f.text, base),
            FragmentStyle::Bold => Span::styled(f.text, base.add_modifier(Modifier::BOLD)),
            FragmentStyle::Code => Span::styled(
                f.text,
                Style::default().fg(Color::Green).bg(Color::Black),
            ),
        }));
        lines.push(Line::from(spans));
    }

    if let Some(panel) = bubble.sources() {
        source_lines(panel, selected, lines);
    }
}

fn source_lines(panel: &SourcePanel, selected: bool, lines: &mut Vec<Line<'static>>) {
    let toggle_style = if selected {
        Style::default()
            .bg(Color::Magenta)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Magenta)
    };
    let marker = if selected { "> " } else { "  " };
    lines.push(Line::from(vec![
        Span::raw(marker),
        Span::styled(panel.toggle_label(), toggle_style),
    ]));

    if !panel.is_expanded() {
        return;
    }

    for card in panel.cards() {
        lines.push(Line::from(vec![
            Span::raw("    • "),
            Span::styled(card.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
        ]));

        let mut meta = vec![
            Span::raw("      "),
            Span::styled(card.kind.clone(), Style::default().fg(Color::DarkGray)),
        ];
        if let Some(url) = safe_link(card) {
            meta.push(Span::styled(" · ", Style::default().fg(Color::DarkGray)));
            meta.push(Span::styled(
                url.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
            ));
        }
        lines.push(Line::from(meta));

        lines.push(Line::from(vec![
            Span::raw("      "),
            Span::styled(
                format!("{}…", card.snippet.replace('\n', " ")),
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ),
        ]));
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let selected = app.current_selection();
    let mut lines: Vec<Line<'static>> = Vec::new();

    for (idx, entry) in app.chat.messages().entries().iter().enumerate() {
        match entry {
            Entry::Bubble(bubble) => bubble_lines(bubble, selected == Some(idx), &mut lines),
            Entry::Typing(_) => {
                lines.push(role_line(Role::Bot, false));
                lines.push(Line::from(Span::styled(
                    format!("  {}", TYPING_FRAMES[usize::from(app.animation_frame % 3)]),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
        lines.push(Line::default());
    }

    // Word wrapping takes more rows than chars / width; let ratatui count them
    let text = Text::from(lines);
    let total = Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(app.chat_width);
    app.total_lines = total.min(usize::from(u16::MAX)) as u16;

    if app.chat.messages().follows_latest() {
        app.scroll = app.max_scroll();
    } else {
        app.scroll = app.scroll.min(app.max_scroll());
    }

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    frame.render_widget(chat, area);

    if app.max_scroll() > 0 {
        let mut state = ScrollbarState::new(usize::from(app.max_scroll()))
            .position(usize::from(app.scroll));
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin { vertical: 1, horizontal: 0 }),
            &mut state,
        );
    }
}

fn render_suggestions(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.chat.can_send();
    let key_style = if enabled {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default().fg(Color::Black).bg(Color::DarkGray)
    };
    let label_style = if enabled {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut spans = vec![Span::raw(" ")];
    for (i, suggestion) in app.chat.suggestions().iter().enumerate() {
        spans.push(Span::styled(format!(" F{} ", i + 1), key_style));
        spans.push(Span::styled(format!(" {}  ", suggestion.label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Display columns between the start of the cursor's line and the cursor
fn cursor_column(composer: &Composer) -> usize {
    let (line, col) = composer.cursor_position();
    composer
        .text()
        .split('\n')
        .nth(line)
        .map(|l| {
            let before: String = l.chars().take(col).collect();
            UnicodeWidthStr::width(before.as_str())
        })
        .unwrap_or(0)
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let composer = app.chat.composer();
    let editing = app.input_mode == InputMode::Editing;

    let (title, border_color) = if !app.chat.can_send() {
        (" Waiting for answer… ", Color::DarkGray)
    } else if editing {
        (" Ask (Enter to send, Alt+Enter for newline) ", Color::Yellow)
    } else {
        (" Ask (i to type) ", Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Keep the cursor visible in both directions
    let inner_width = usize::from(area.width.saturating_sub(2));
    let inner_height = usize::from(area.height.saturating_sub(2));
    let (line, _) = composer.cursor_position();
    let col = cursor_column(composer);
    let v_offset = if inner_height == 0 {
        0
    } else {
        line.saturating_sub(inner_height - 1)
    };
    let h_offset = if inner_width == 0 || col < inner_width {
        0
    } else {
        col - inner_width + 1
    };

    let input = Paragraph::new(composer.text().to_string())
        .style(Style::default().fg(Color::Cyan))
        .block(block)
        .scroll((v_offset as u16, h_offset as u16));
    frame.render_widget(input, area);

    if editing && composer.is_focused() {
        frame.set_cursor_position((
            area.x + 1 + (col - h_offset) as u16,
            area.y + 1 + (line - v_offset) as u16,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let text = if let Some(status) = &app.status {
        Span::styled(format!(" {}", status), Style::default().fg(Color::Green))
    } else {
        let hints = match app.input_mode {
            InputMode::Editing => {
                " Esc: browse │ F1-F4: suggestions │ PgUp/PgDn: scroll │ Ctrl+R: reset │ Ctrl+E: export │ Ctrl+C: quit"
            }
            InputMode::Normal => {
                " i: type │ j/k: select answer │ Enter/s: toggle sources │ 1-9: suggestions │ G: latest │ Ctrl+R: reset │ q: quit"
            }
        };
        Span::styled(hints, Style::default().fg(Color::DarkGray))
    };

    frame.render_widget(Paragraph::new(Line::from(text)), area);
}
