use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::error::{ChatError, ChatResult};
use crate::state::{ChatRequest, ChatResponse, ErrorBody};

/// The question-answering service behind the chat.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Ask one question; the backend keeps its own conversation history.
    async fn ask(&self, question: &str) -> ChatResult<ChatResponse>;

    /// Drop the backend's conversation history.
    async fn reset(&self) -> ChatResult<()>;
}

/// `ChatBackend` over the `/api/chat` + `/api/reset` HTTP endpoints.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> ChatResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn ask(&self, question: &str) -> ChatResult<ChatResponse> {
        let url = self.endpoint("/api/chat");
        debug!("POST {} ({} chars)", url, question.chars().count());

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { question })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        interpret_chat_response(status, &body)
    }

    async fn reset(&self) -> ChatResult<()> {
        let url = self.endpoint("/api/reset");
        debug!("POST {}", url);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Ok(())
    }
}

/// Turn a raw chat response into an answer or an error.
pub fn interpret_chat_response(status: StatusCode, body: &str) -> ChatResult<ChatResponse> {
    if !status.is_success() {
        return Err(status_error(status, body));
    }

    Ok(serde_json::from_str(body)?)
}

fn status_error(status: StatusCode, body: &str) -> ChatError {
    // Non-2xx bodies are best effort; anything unparseable gets the generic text
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty());

    ChatError::Status {
        status: status.as_u16(),
        message,
    }
}
