//! OpenAI-compatible chat-completions client
//!
//! Serves every configured vendor that speaks the `/chat/completions` dialect
//! (OpenAI, Groq, Ollama); they differ only in base URL and credentials.

use super::{ProviderError, TextGenerator, TokenStream};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use tracing::debug;

/// Text generator backed by an OpenAI-compatible HTTP endpoint
pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature,
        })
    }

    fn request_body(&self, prompt: &str, stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "stream": stream,
        })
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending completion request");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestError(format!(
                "HTTP {}: {}",
                status, body_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = self.request_body(prompt, false);
        let response = self.send(&body).await?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::GenerationError(format!("Invalid JSON: {}", e)))?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.to_string())
            .ok_or_else(|| {
                ProviderError::GenerationError("Response has no message content".to_string())
            })
    }

    async fn complete_streaming(&self, prompt: &str) -> Result<TokenStream, ProviderError> {
        let body = self.request_body(prompt, true);
        let response = self.send(&body).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(sse_fragments(bytes))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// One line of a server-sent-events body
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// A content delta
    Delta(String),
    /// The `[DONE]` terminator
    Done,
    /// Comment, keep-alive, or an event without content
    Skip,
}

/// Parse a single SSE line of a streamed chat completion
pub fn parse_sse_line(line: &str) -> Result<SseLine, ProviderError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };

    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let json: Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::StreamError(format!("Invalid SSE payload: {}", e)))?;

    if let Some(err) = json.get("error") {
        return Err(ProviderError::StreamError(err.to_string()));
    }

    Ok(json
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .map(|c| SseLine::Delta(c.to_string()))
        .unwrap_or(SseLine::Skip))
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn a raw SSE byte stream into content fragments, splitting on newlines
/// at the byte level so multi-byte characters survive chunk boundaries.
fn sse_fragments(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TokenStream {
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    if let Err(e) = drain_lines(&mut state) {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ProviderError::StreamError(e.to_string())), state));
                }
                None => {
                    // Flush a trailing line without newline
                    state.buffer.push(b'\n');
                    let result = drain_lines(&mut state);
                    state.finished = true;
                    if let Err(e) = result {
                        return Some((Err(e), state));
                    }
                }
            }
        }
    })
    .boxed()
}

fn drain_lines(state: &mut SseState) -> Result<(), ProviderError> {
    while let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = state.buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);

        match parse_sse_line(&line)? {
            SseLine::Delta(content) => state.pending.push_back(content),
            SseLine::Done => {
                state.finished = true;
                state.buffer.clear();
                break;
            }
            SseLine::Skip => {}
        }
    }
    Ok(())
}
