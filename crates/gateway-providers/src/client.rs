//! HTTP client for one OpenAI-compatible provider.

use crate::registry::Provider;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use gateway_core::{ChatChunk, ChatCompletionResponse, ChatStreamItem, GatewayError, GatewayResult};
use reqwest::{Client, StatusCode};
use reqwest_eventsource::{retry::Never, Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Stream of backend chunks, ending in `Done` on a clean finish
pub type ChatStream = BoxStream<'static, GatewayResult<ChatStreamItem>>;

/// `{base_url}/chat/completions`, unless the base already ends with it
#[must_use]
pub fn chat_completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(CHAT_COMPLETIONS_PATH) {
        base.to_string()
    } else {
        format!("{base}{CHAT_COMPLETIONS_PATH}")
    }
}

/// Live connection handle to a provider
#[derive(Debug)]
pub struct ProviderClient {
    provider: String,
    endpoint: String,
    credential: SecretString,
    http: Client,
}

impl ProviderClient {
    /// Create a client for `provider`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(provider: &Provider, connect_timeout: Duration) -> GatewayResult<Self> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            provider: provider.name.clone(),
            endpoint: chat_completions_url(&provider.base_url),
            credential: provider.credential.clone(),
            http,
        })
    }

    /// Provider name
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Chat-completions URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a non-streaming request
    ///
    /// # Errors
    /// Returns a backend error on transport failure, non-2xx status or an
    /// unparsable body
    pub async fn chat_completion(&self, body: &Value) -> GatewayResult<ChatCompletionResponse> {
        debug!(provider = %self.provider, url = %self.endpoint, "Sending chat completion");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.credential.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| self.backend_error(format!("Request failed: {e}"), None))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.map_status_error(status, &text));
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| self.backend_error(format!("Failed to parse response: {e}"), None))
    }

    /// Send a streaming request.
    ///
    /// Waits for the stream to open so that HTTP errors surface here rather
    /// than mid-stream. The returned stream yields `Done` on `[DONE]`; it ends
    /// without `Done` if the backend closes early.
    ///
    /// # Errors
    /// Returns a backend error if the stream cannot be opened
    pub async fn chat_completion_stream(&self, body: &Value) -> GatewayResult<ChatStream> {
        debug!(provider = %self.provider, url = %self.endpoint, "Starting streaming chat completion");

        let request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.credential.expose_secret())
            .json(body);

        let mut event_source = EventSource::new(request)
            .map_err(|e| self.backend_error(format!("Failed to create event source: {e}"), None))?;
        event_source.set_retry_policy(Box::new(Never));

        // Anything before Open is a connection or status failure.
        let first_message = match event_source.next().await {
            Some(Ok(Event::Open)) => None,
            Some(Ok(Event::Message(msg))) => Some(msg.data),
            Some(Err(e)) => {
                event_source.close();
                return Err(self.map_open_error(e).await);
            }
            None => return Err(self.backend_error("Stream closed before opening", None)),
        };

        trace!(provider = %self.provider, "Backend stream opened");

        let provider = self.provider.clone();
        let stream = try_stream! {
            let mut es = event_source;
            let mut pending = first_message;

            loop {
                let data = if let Some(data) = pending.take() {
                    data
                } else {
                    match es.next().await {
                        None => break,
                        Some(Ok(Event::Open)) => continue,
                        Some(Ok(Event::Message(msg))) => msg.data,
                        Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                            es.close();
                            break;
                        }
                        Some(Err(e)) => {
                            es.close();
                            error!(provider = %provider, error = %e, "Backend stream error");
                            Err(GatewayError::backend(&provider, format!("Stream error: {e}"), None))?;
                            break;
                        }
                    }
                };

                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    es.close();
                    yield ChatStreamItem::Done;
                    break;
                }

                match parse_chunk(data) {
                    Ok(chunk) => yield ChatStreamItem::Chunk(chunk),
                    Err(ChunkError::Backend(message)) => {
                        es.close();
                        Err(GatewayError::backend(&provider, message, None))?;
                    }
                    Err(ChunkError::Malformed(e)) => {
                        warn!(provider = %provider, error = %e, data = %data, "Skipping malformed chunk");
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn backend_error(&self, message: impl Into<String>, status: Option<u16>) -> GatewayError {
        GatewayError::backend(&self.provider, message, status)
    }

    fn map_status_error(&self, status: StatusCode, body: &str) -> GatewayError {
        let message = extract_error_message(body)
            .unwrap_or_else(|| format!("HTTP {status}: {}", truncate(body, 512)));
        warn!(provider = %self.provider, status = status.as_u16(), message = %message, "Backend returned error status");
        self.backend_error(message, Some(status.as_u16()))
    }

    async fn map_open_error(&self, err: reqwest_eventsource::Error) -> GatewayError {
        match err {
            reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
                let text = response.text().await.unwrap_or_default();
                self.map_status_error(status, &text)
            }
            reqwest_eventsource::Error::InvalidContentType(content_type, response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    self.backend_error(
                        format!("Unexpected content type {content_type:?} for streaming response"),
                        None,
                    )
                } else {
                    self.map_status_error(status, &text)
                }
            }
            other => self.backend_error(format!("Request failed: {other}"), None),
        }
    }
}

enum ChunkError {
    Backend(String),
    Malformed(serde_json::Error),
}

fn parse_chunk(data: &str) -> Result<ChatChunk, ChunkError> {
    let value: Value = serde_json::from_str(data).map_err(ChunkError::Malformed)?;
    if value.get("error").is_some() {
        return Err(ChunkError::Backend(
            extract_error_message(data).unwrap_or_else(|| data.to_string()),
        ));
    }
    serde_json::from_value(value).map_err(ChunkError::Malformed)
}

/// Pull a human-readable message out of an OpenAI-style error body
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        None => value
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
