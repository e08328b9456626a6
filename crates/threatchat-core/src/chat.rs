//! Message flow: send, render, reset.
//!
//! `ChatClient` owns the conversation view, the composer and the single-flight
//! guard. Sending is split into [`ChatClient::begin_send`] and
//! [`ChatClient::finish_send`] so a UI loop can run the network call on its own
//! task; [`ChatClient::send_message`] composes the two for callers that can
//! simply await.

use log::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::composer::Composer;
use crate::config::{Config, Suggestion};
use crate::error::ChatResult;
use crate::state::{ChatResponse, Role};
use crate::view::{MessageList, TypingId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// At most one question is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Idle,
    Awaiting { request: RequestId, typing: TypingId },
}

/// A question that has been rendered and now needs to go to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub question: String,
}

pub struct ChatClient {
    messages: MessageList,
    composer: Composer,
    pending: PendingState,
    next_request: u64,
    reset_greeting: String,
    suggestions: Vec<Suggestion>,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            messages: MessageList::with_greeting(&config.greeting),
            composer: Composer::new(),
            pending: PendingState::Idle,
            next_request: 0,
            reset_greeting: config.reset_greeting.clone(),
            suggestions: config.suggestions.clone(),
        }
    }

    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut MessageList {
        &mut self.messages
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    /// Whether the send control is enabled
    pub fn can_send(&self) -> bool {
        self.pending == PendingState::Idle
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Take the composer's question and render it as sent.
    ///
    /// Returns `None` without touching anything when the trimmed input is empty
    /// or another request is still outstanding.
    pub fn begin_send(&mut self) -> Option<PendingRequest> {
        let question = self.composer.text().trim().to_string();
        if question.is_empty() {
            return None;
        }
        if let PendingState::Awaiting { request, .. } = self.pending {
            debug!("send ignored, request {:?} still in flight", request);
            return None;
        }

        self.messages.append_message(Role::User, &question);
        self.composer.clear();

        let id = RequestId(self.next_request);
        self.next_request += 1;
        let typing = self.messages.show_typing();
        self.pending = PendingState::Awaiting { request: id, typing };

        debug!("dispatching request {:?}", id);
        Some(PendingRequest { id, question })
    }

    /// Render the outcome of request `id`. Returns false if `id` is not the
    /// request currently awaited.
    pub fn finish_send(&mut self, id: RequestId, result: ChatResult<ChatResponse>) -> bool {
        let typing = match self.pending {
            PendingState::Awaiting { request, typing } if request == id => typing,
            _ => {
                warn!("dropping result for unknown request {:?}", id);
                return false;
            }
        };

        // Placeholder goes before any response-derived bubble
        self.messages.remove_typing(typing);

        match result {
            Ok(response) => {
                info!(
                    "request {:?} answered with {} source(s)",
                    id,
                    response.sources.len()
                );
                self.messages
                    .append_bot_response(&response.answer, response.sources);
            }
            Err(e) => {
                warn!("request {:?} failed: {}", id, e);
                self.messages.append_message(Role::Bot, &e.bubble_text());
            }
        }

        self.pending = PendingState::Idle;
        self.composer.focus();
        true
    }

    /// Send the composer's question and wait for the answer.
    /// Returns false if nothing was sent.
    pub async fn send_message(&mut self, backend: &dyn ChatBackend) -> bool {
        let Some(request) = self.begin_send() else {
            return false;
        };
        let result = backend.ask(&request.question).await;
        self.finish_send(request.id, result)
    }

    /// Copy suggestion `idx` into the composer and send it.
    pub fn use_suggestion(&mut self, idx: usize) -> Option<PendingRequest> {
        let question = self.suggestions.get(idx)?.question.clone();
        self.composer.set_text(&question);
        self.begin_send()
    }

    /// Clear the view back to the reset greeting. In-flight requests are not
    /// cancelled; their answer lands in the fresh list.
    pub fn apply_reset(&mut self) {
        self.messages.replace_with_greeting(&self.reset_greeting);
    }

    /// Tell the backend to forget the conversation, then clear the view
    /// regardless of how that went.
    pub async fn reset(&mut self, backend: &dyn ChatBackend) {
        if let Err(e) = backend.reset().await {
            warn!("reset request failed: {}", e);
        }
        self.apply_reset();
    }

    pub fn toggle_sources(&mut self, idx: usize) -> bool {
        self.messages.toggle_sources(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::state::SourceCitation;
    use crate::view::Entry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted backend that records what it was asked
    struct FakeBackend {
        answer: Mutex<Option<ChatResult<ChatResponse>>>,
        asked: Mutex<Vec<String>>,
        resets: Mutex<usize>,
        reset_fails: bool,
    }

    impl FakeBackend {
        fn answering(result: ChatResult<ChatResponse>) -> Self {
            Self {
                answer: Mutex::new(Some(result)),
                asked: Mutex::new(Vec::new()),
                resets: Mutex::new(0),
                reset_fails: false,
            }
        }

        fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn ask(&self, question: &str) -> ChatResult<ChatResponse> {
            self.asked.lock().unwrap().push(question.to_string());
            self.answer
                .lock()
                .unwrap()
                .take()
                .expect("backend asked more than once")
        }

        async fn reset(&self) -> ChatResult<()> {
            *self.resets.lock().unwrap() += 1;
            if self.reset_fails {
                Err(ChatError::Status {
                    status: 500,
                    message: None,
                })
            } else {
                Ok(())
            }
        }
    }

    fn client() -> ChatClient {
        ChatClient::new(&Config::new())
    }

    fn answer(text: &str, sources: Vec<SourceCitation>) -> ChatResult<ChatResponse> {
        Ok(ChatResponse {
            answer: text.to_string(),
            sources,
        })
    }

    fn texts(client: &ChatClient) -> Vec<(Role, String)> {
        client
            .messages()
            .bubbles()
            .map(|b| (b.role(), b.text().to_string()))
            .collect()
    }

    #[test]
    fn test_begin_send_renders_user_bubble_then_typing() {
        let mut chat = client();
        chat.composer_mut().set_text("  what is T1055?  ");

        let request = chat.begin_send().unwrap();
        assert_eq!(request.question, "what is T1055?");
        assert_eq!(chat.composer().text(), "");
        assert_eq!(chat.composer().rows(), 1);
        assert!(!chat.can_send());

        let entries = chat.messages().entries();
        assert_eq!(entries.len(), 3); // greeting, user, typing
        assert!(matches!(&entries[1], Entry::Bubble(b) if b.role() == Role::User));
        assert!(matches!(entries[2], Entry::Typing(_)));
        assert_eq!(chat.messages().typing_count(), 1);
    }

    #[test]
    fn test_empty_input_is_a_no_op() {
        let mut chat = client();
        chat.composer_mut().set_text("   \n\t ");
        let before = chat.messages().len();

        assert!(chat.begin_send().is_none());
        assert_eq!(chat.messages().len(), before);
        assert_eq!(chat.composer().text(), "   \n\t ");
        assert!(chat.can_send());
    }

    #[test]
    fn test_second_send_while_awaiting_is_rejected() {
        let mut chat = client();
        chat.composer_mut().set_text("first");
        chat.begin_send().unwrap();

        chat.composer_mut().set_text("second");
        assert!(chat.begin_send().is_none());
        assert_eq!(chat.composer().text(), "second");
        assert_eq!(chat.messages().typing_count(), 1);
        assert_eq!(chat.messages().bubbles().count(), 2);
    }

    #[tokio::test]
    async fn test_send_message_success_with_sources() {
        let mut chat = client();
        let backend = FakeBackend::answering(answer(
            "**T1003** covers credential dumping",
            vec![SourceCitation {
                name: "OS Credential Dumping".to_string(),
                kind: "technique".to_string(),
                url: Some("https://attack.mitre.org/techniques/T1003/".to_string()),
                snippet: "Adversaries may attempt to dump credentials".to_string(),
            }],
        ));

        chat.composer_mut().set_text("credential dumping?");
        assert!(chat.send_message(&backend).await);

        assert_eq!(backend.asked(), vec!["credential dumping?".to_string()]);
        assert_eq!(chat.messages().typing_count(), 0);
        assert!(chat.can_send());
        assert!(chat.composer().is_focused());

        let last = chat.messages().bubbles().last().unwrap();
        assert_eq!(last.role(), Role::Bot);
        assert_eq!(
            last.markup(),
            "<strong>T1003</strong> covers credential dumping"
        );
        assert_eq!(last.sources().unwrap().cards().len(), 1);
    }

    #[tokio::test]
    async fn test_send_message_error_bubble_uses_backend_message() {
        let mut chat = client();
        let backend = FakeBackend::answering(Err(ChatError::Status {
            status: 500,
            message: Some("backend down".to_string()),
        }));

        chat.composer_mut().set_text("anything");
        chat.send_message(&backend).await;

        let bubbles = texts(&chat);
        assert_eq!(bubbles.len(), 3);
        assert_eq!(bubbles[2], (Role::Bot, "❌ backend down".to_string()));
        assert_eq!(chat.messages().typing_count(), 0);
        assert!(chat.can_send());
    }

    #[tokio::test]
    async fn test_send_message_error_without_message_uses_fallback() {
        let mut chat = client();
        let backend = FakeBackend::answering(Err(ChatError::Status {
            status: 500,
            message: None,
        }));

        chat.composer_mut().set_text("anything");
        chat.send_message(&backend).await;

        let (_, text) = texts(&chat).pop().unwrap();
        assert!(text.contains("Request failed"));
    }

    #[tokio::test]
    async fn test_empty_send_issues_no_request() {
        let mut chat = client();
        let backend = FakeBackend::answering(answer("unused", Vec::new()));

        assert!(!chat.send_message(&backend).await);
        assert!(backend.asked().is_empty());
        assert_eq!(chat.messages().len(), 1);
    }

    #[test]
    fn test_finish_with_stale_id_is_ignored() {
        let mut chat = client();
        chat.composer_mut().set_text("one");
        let first = chat.begin_send().unwrap();
        assert!(chat.finish_send(first.id, answer("a", Vec::new())));

        let before = chat.messages().len();
        assert!(!chat.finish_send(first.id, answer("again", Vec::new())));
        assert_eq!(chat.messages().len(), before);
    }

    #[test]
    fn test_suggestion_sends_preset_question() {
        let mut chat = client();
        let expected = chat.suggestions()[1].question.clone();

        let request = chat.use_suggestion(1).unwrap();
        assert_eq!(request.question, expected);
        assert_eq!(chat.composer().text(), "");
        assert!(chat.use_suggestion(99).is_none());
    }

    #[tokio::test]
    async fn test_reset_leaves_single_greeting_even_on_failure() {
        let mut chat = client();
        let mut backend = FakeBackend::answering(answer("a", Vec::new()));
        backend.reset_fails = true;

        chat.composer_mut().set_text("q");
        chat.send_message(&backend).await;
        chat.reset(&backend).await;

        assert_eq!(*backend.resets.lock().unwrap(), 1);
        assert_eq!(
            texts(&chat),
            vec![(Role::Bot, Config::new().reset_greeting)]
        );
    }

    #[test]
    fn test_reset_during_flight_keeps_answer() {
        let mut chat = client();
        chat.composer_mut().set_text("slow question");
        let request = chat.begin_send().unwrap();

        chat.apply_reset();
        assert_eq!(chat.messages().typing_count(), 0);
        assert!(!chat.can_send());

        assert!(chat.finish_send(request.id, answer("late answer", Vec::new())));
        let bubbles = texts(&chat);
        assert_eq!(bubbles.len(), 2);
        assert_eq!(bubbles[1], (Role::Bot, "late answer".to_string()));
        assert!(chat.can_send());
    }
}
