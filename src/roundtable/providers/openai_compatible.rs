//! Adapter for OpenAI-compatible chat-completions endpoints.
//!
//! Google AI Studio (through its `/openai/` compatibility path), Groq, OpenRouter and
//! Cerebras all accept the same request shape, so one adapter per configured
//! [`ProviderEndpoint`] covers every provider of the default deployment.
//!
//! Requests are sent with `stream: true` and the response body is decoded as Server-Sent
//! Events: each `data:` line carries a JSON delta and `data: [DONE]` closes the stream.
//!
//! ```rust,no_run
//! use roundtable::config::{ProviderAccount, ProviderEndpoint};
//! use roundtable::persona::PersonaId;
//! use roundtable::provider::{GenerationRequest, PromptMessage, ProviderAdapter};
//! use roundtable::providers::openai_compatible::OpenAICompatibleProvider;
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = OpenAICompatibleProvider::new(ProviderEndpoint::new(
//!         "groq",
//!         "https://api.groq.com/openai/v1/",
//!         "llama-3.1-70b-versatile",
//!     ));
//!     let account = ProviderAccount::new("groq", "default", 6000).with_api_key_env("GROQ_API_KEY");
//!     let request = GenerationRequest {
//!         persona: PersonaId::Skeptic,
//!         model: None,
//!         messages: vec![PromptMessage::user("Say hello")],
//!         temperature: 0.3,
//!         max_tokens: 50,
//!     };
//!     let mut stream = provider.generate(request, &account).await.unwrap();
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk.unwrap().content);
//!     }
//! }
//! ```

use crate::roundtable::config::{ProviderAccount, ProviderEndpoint};
use crate::roundtable::error::ProviderError;
use crate::roundtable::provider::{ChunkStream, GenerationRequest, ProviderAdapter, ProviderChunk};
use crate::roundtable::providers::http_pool::get_http_client;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

/// Streams chat completions from one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleProvider {
    endpoint: ProviderEndpoint,
    request_timeout: Duration,
}

impl OpenAICompatibleProvider {
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self {
            endpoint,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        let base = &self.endpoint.base_url;
        if base.ends_with('/') {
            format!("{}chat/completions", base)
        } else {
            format!("{}/chat/completions", base)
        }
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let model = request
            .model
            .as_deref()
            .unwrap_or(self.endpoint.model.as_str());
        json!({
            "model": model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": true,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        &self.endpoint.provider
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        account: &ProviderAccount,
    ) -> Result<ChunkStream, ProviderError> {
        let api_key = account.api_key().ok_or(ProviderError::AuthFailure)?;
        let client = get_http_client(&self.endpoint.base_url)
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;

        let response = client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .timeout(self.request_timeout)
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            log::warn!(
                "{} ({}) answered HTTP {}: {}",
                self.endpoint.provider,
                account.account,
                status,
                body.chars().take(200).collect::<String>()
            );
            return Err(classify_status(status, &body));
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec())));
        Ok(sse_chunk_stream(bytes))
    }
}

/// Maps an HTTP error status to a provider error.
pub fn classify_status(status: u16, body: &str) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited,
        401 | 403 => ProviderError::AuthFailure,
        408 | 504 => ProviderError::Timeout,
        _ => ProviderError::Unknown(format!(
            "HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )),
    }
}

fn classify_transport_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if let Some(status) = err.status() {
        classify_status(status.as_u16(), "")
    } else {
        ProviderError::Unknown(err.to_string())
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

/// What one SSE `data:` line meant.
#[derive(Debug, Clone, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
    Error(String),
}

/// Incremental line decoder for an SSE body.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Ok(line) = std::str::from_utf8(&line) {
                if let Some(event) = parse_sse_line(line) {
                    events.push(event);
                }
            }
        }
        events
    }

    /// Whatever is left after the body ended without a trailing newline.
    fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        std::str::from_utf8(&rest).ok().and_then(parse_sse_line)
    }
}

fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?
        .trim();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("skipping malformed SSE payload: {}", e);
            return None;
        }
    };
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("stream error")
            .to_string();
        return Some(SseEvent::Error(message));
    }
    value["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| SseEvent::Delta(s.to_string()))
}

struct SseState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<ProviderChunk, ProviderError>>,
    finished: bool,
}

impl SseState {
    fn absorb(&mut self, event: SseEvent) {
        match event {
            SseEvent::Delta(content) => self.pending.push_back(Ok(ProviderChunk {
                content,
                is_final: false,
            })),
            SseEvent::Done => self.close(),
            SseEvent::Error(message) => {
                self.pending.push_back(Err(ProviderError::Unknown(message)));
                self.finished = true;
            }
        }
    }

    fn close(&mut self) {
        if !self.finished {
            self.pending.push_back(Ok(ProviderChunk {
                content: String::new(),
                is_final: true,
            }));
            self.finished = true;
        }
    }
}

fn sse_chunk_stream(bytes: ByteStream) -> ChunkStream {
    let state = SseState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for event in state.decoder.push(&bytes) {
                        if state.finished {
                            break;
                        }
                        state.absorb(event);
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(classify_transport_error(&e)));
                    state.finished = true;
                }
                None => {
                    if let Some(event) = state.decoder.finish() {
                        state.absorb(event);
                    }
                    state.close();
                }
            }
        }
    });
    Box::pin(stream)
}
