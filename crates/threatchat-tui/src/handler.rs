use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            if app.input_mode == InputMode::Editing {
                for c in text.chars() {
                    app.chat.composer_mut().insert_char(c);
                }
            }
        }
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }

    app.poll_tasks().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    app.status = None;

    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('r') => {
                app.start_reset();
                return;
            }
            KeyCode::Char('e') => {
                app.status = Some(match app.export_transcript() {
                    Ok(path) => format!("Transcript saved to {}", path.display()),
                    Err(e) => format!("Export failed: {}", e),
                });
                return;
            }
            KeyCode::Char('u') => {
                app.scroll_up(app.chat_height / 2);
                return;
            }
            KeyCode::Char('d') => {
                app.scroll_down(app.chat_height / 2);
            }
            _ => {}
        }
        // Unbound Ctrl chords must not fall through as typed text
        return;
    }

    // Suggestion chips
    if let KeyCode::F(n) = key.code {
        if n >= 1 {
            app.submit_suggestion(usize::from(n - 1));
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.chat.composer_mut().focus();
        }

        // Answer selection
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Enter | KeyCode::Char('s') => app.toggle_selected_sources(),

        // Scrolling
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::Char('g') => app.scroll_up(u16::MAX),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),

        KeyCode::Char(c @ '1'..='9') => {
            if let Some(n) = c.to_digit(10) {
                app.submit_suggestion(n as usize - 1);
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let composer = app.chat.composer_mut();
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            composer.blur();
            app.input_mode = InputMode::Normal;
        }
        // Many terminals only report Alt+Enter, not Shift+Enter
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            composer.insert_newline();
        }
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => composer.backspace(),
        KeyCode::Delete => composer.delete(),
        KeyCode::Left => composer.move_left(),
        KeyCode::Right => composer.move_right(),
        KeyCode::Home => composer.move_home(),
        KeyCode::End => composer.move_end(),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::Char(c) => composer.insert_char(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}
