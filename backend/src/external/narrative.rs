//! Narrative Client
//!
//! Client for a hosted OpenAI-compatible chat-completion API. The response
//! is opaque prose: it is forwarded to callers verbatim and never parsed
//! for structure.

use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::NarrativeConfig;
use crate::error::{AppError, AppResult};

/// Incremental text fragments from the narrative service
pub type TokenStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// A system instruction plus a user message carrying serialized data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeRequest {
    pub system: String,
    pub user: String,
}

/// Seam for the narrative service so handlers can run against fakes
#[async_trait]
pub trait NarrativeClient: Send + Sync {
    /// Single completion
    async fn complete(&self, request: NarrativeRequest) -> AppResult<String>;

    /// Incremental completion; the stream ends after the upstream
    /// end-of-stream marker
    async fn stream(&self, request: NarrativeRequest) -> AppResult<TokenStream>;
}

/// Client for OpenAI-compatible chat completions
#[derive(Clone)]
pub struct OpenAiNarrativeClient {
    api_base: String,
    api_key: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Meaning of one line of an upstream event stream
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Token(String),
    Done,
    Skip,
}

fn parse_stream_line(line: &str) -> AppResult<StreamLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        // blank separators, comments, `event:` and `id:` fields
        return Ok(StreamLine::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(|e| {
        AppError::UpstreamFailure(format!("Failed to parse stream chunk: {}", e))
    })?;
    if let Some(err) = chunk.error {
        return Err(AppError::UpstreamFailure(err.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map_or(StreamLine::Skip, StreamLine::Token))
}

struct LineReader<S> {
    inner: Pin<Box<S>>,
    idle_timeout: Duration,
    buffer: Vec<u8>,
    exhausted: bool,
    finished: bool,
}

/// Turn a raw byte stream of server-sent events into text fragments.
///
/// Lines may be split across chunks. The token stream stops at `[DONE]`,
/// at the end of input, or after reporting the first error. Waiting longer
/// than `idle_timeout` for the next chunk is an error; the stream as a
/// whole has no deadline.
fn token_stream<S, B, E>(
    bytes: S,
    idle_timeout: Duration,
) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let reader = LineReader {
        inner: Box::pin(bytes),
        idle_timeout,
        buffer: Vec::new(),
        exhausted: false,
        finished: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if reader.finished {
                return None;
            }

            if let Some(pos) = reader.buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = reader.buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                match parse_stream_line(&line) {
                    Ok(StreamLine::Token(token)) => return Some((Ok(token), reader)),
                    Ok(StreamLine::Done) => return None,
                    Ok(StreamLine::Skip) => continue,
                    Err(err) => {
                        reader.finished = true;
                        return Some((Err(err), reader));
                    }
                }
            }

            if reader.exhausted {
                return None;
            }

            let idle_timeout = reader.idle_timeout;
            let Ok(next) = tokio::time::timeout(idle_timeout, reader.inner.next()).await else {
                reader.finished = true;
                let err = AppError::UpstreamFailure(format!(
                    "Stream stalled: no data for {}s",
                    idle_timeout.as_secs()
                ));
                return Some((Err(err), reader));
            };

            match next {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => {
                    reader.finished = true;
                    let err = AppError::UpstreamFailure(format!("Stream interrupted: {}", err));
                    return Some((Err(err), reader));
                }
                None => {
                    reader.exhausted = true;
                    if !reader.buffer.is_empty() {
                        reader.buffer.push(b'\n');
                    }
                }
            }
        }
    })
}

impl OpenAiNarrativeClient {
    /// Create a new narrative client.
    ///
    /// `timeout_secs` bounds connecting and a whole single completion. For
    /// streams it bounds the gap between chunks instead.
    pub fn new(config: &NarrativeConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http_client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout,
            http_client,
        })
    }

    async fn send(&self, request: &NarrativeRequest, stream: bool) -> AppResult<reqwest::Response> {
        if self.api_key.is_empty() {
            return Err(AppError::UpstreamFailure(
                "Narrative service API key is not configured".to_string(),
            ));
        }

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream,
        };

        let mut builder = self
            .http_client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body);
        if !stream {
            builder = builder.timeout(self.timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::UpstreamFailure(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::UpstreamFailure(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl NarrativeClient for OpenAiNarrativeClient {
    async fn complete(&self, request: NarrativeRequest) -> AppResult<String> {
        let response = self.send(&request, false).await?;

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamFailure(format!("Failed to parse response: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::UpstreamFailure("Response contained no text".to_string()))
    }

    async fn stream(&self, request: NarrativeRequest) -> AppResult<TokenStream> {
        let response = self.send(&request, true).await?;
        tracing::debug!(model = %self.model, "narrative stream opened");
        Ok(Box::pin(token_stream(response.bytes_stream(), self.timeout)))
    }
}
