use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use log::{info, warn};
use threatchat_core::{
    ChatBackend, ChatClient, ChatError, ChatResponse, ChatResult, Config, Entry, PendingRequest,
    RequestId,
};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub chat: ChatClient,
    pub backend: Arc<dyn ChatBackend>,
    pub base_url: String,

    // Background work
    pub query_task: Option<(RequestId, JoinHandle<ChatResult<ChatResponse>>)>,
    pub reset_task: Option<JoinHandle<ChatResult<()>>>,

    // Conversation viewport
    pub selected: Option<usize>, // entry index of a bot answer with sources
    pub scroll: u16,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_width: u16,  // inner width, for wrap calculations
    pub total_lines: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for the typing dots

    /// One-line notice shown in the footer until the next key
    pub status: Option<String>,
}

impl App {
    pub fn new(config: &Config, backend: Arc<dyn ChatBackend>, base_url: String) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            chat: ChatClient::new(config),
            backend,
            base_url,
            query_task: None,
            reset_task: None,
            selected: None,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            total_lines: 0,
            animation_frame: 0,
            status: None,
        }
    }

    /// Send whatever is in the composer.
    pub fn submit(&mut self) {
        if let Some(request) = self.chat.begin_send() {
            self.dispatch(request);
        }
    }

    /// Fire suggestion chip `idx`.
    pub fn submit_suggestion(&mut self, idx: usize) {
        if let Some(request) = self.chat.use_suggestion(idx) {
            self.dispatch(request);
        }
    }

    fn dispatch(&mut self, request: PendingRequest) {
        let backend = Arc::clone(&self.backend);
        let PendingRequest { id, question } = request;
        let handle = tokio::spawn(async move { backend.ask(&question).await });
        self.query_task = Some((id, handle));
    }

    pub fn start_reset(&mut self) {
        if self.reset_task.is_some() {
            return;
        }
        let backend = Arc::clone(&self.backend);
        self.reset_task = Some(tokio::spawn(async move { backend.reset().await }));
    }

    /// Collect finished background work and fold it into the view.
    pub async fn poll_tasks(&mut self) {
        if self
            .query_task
            .as_ref()
            .map_or(false, |(_, handle)| handle.is_finished())
        {
            if let Some((id, handle)) = self.query_task.take() {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(ChatError::Interrupted(e.to_string())),
                };
                self.chat.finish_send(id, result);
                self.input_mode = InputMode::Editing;
            }
        }

        if self
            .reset_task
            .as_ref()
            .map_or(false, |handle| handle.is_finished())
        {
            if let Some(handle) = self.reset_task.take() {
                match handle.await {
                    Ok(Err(e)) => warn!("reset request failed: {}", e),
                    Err(e) => warn!("reset task died: {}", e),
                    Ok(Ok(())) => {}
                }
                self.chat.apply_reset();
                self.selected = None;
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if !self.chat.can_send() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Entry indices of answers whose sources can be toggled
    fn selectable(&self) -> Vec<usize> {
        self.chat
            .messages()
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Entry::Bubble(b) if b.sources().is_some()))
            .map(|(i, _)| i)
            .collect()
    }

    /// The selection, if it still points at something selectable
    pub fn current_selection(&self) -> Option<usize> {
        self.selected.filter(|idx| self.selectable().contains(idx))
    }

    pub fn select_next(&mut self) {
        let items = self.selectable();
        self.selected = match self.current_selection() {
            Some(cur) => items.iter().copied().find(|i| *i > cur).or(Some(cur)),
            None => items.first().copied(),
        };
    }

    pub fn select_prev(&mut self) {
        let items = self.selectable();
        self.selected = match self.current_selection() {
            Some(cur) => items.iter().rev().copied().find(|i| *i < cur).or(Some(cur)),
            None => items.last().copied(),
        };
    }

    pub fn toggle_selected_sources(&mut self) {
        if let Some(idx) = self.current_selection() {
            self.chat.toggle_sources(idx);
            // Expanding should not yank the view to the bottom
            self.chat.messages_mut().set_follow_latest(false);
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.chat.messages_mut().set_follow_latest(false);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = (self.scroll + lines).min(max);
        if self.scroll == max {
            self.chat.messages_mut().set_follow_latest(true);
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
        self.chat.messages_mut().set_follow_latest(true);
    }

    pub fn max_scroll(&self) -> u16 {
        self.total_lines.saturating_sub(self.chat_height)
    }

    /// Write the conversation as HTML next to the config file.
    pub fn export_transcript(&mut self) -> Result<PathBuf> {
        let dir = Config::config_dir()?;
        std::fs::create_dir_all(&dir)?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = dir.join(format!("transcript-{}.html", stamp));

        let html = format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>threatchat transcript</title></head>\n<body>{}</body></html>\n",
            self.chat.messages().to_html()
        );
        std::fs::write(&path, html)?;
        info!("transcript written to {}", path.display());
        Ok(path)
    }
}
