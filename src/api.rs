use crate::config::Config;
use crate::constants::{
    MAX_OUTPUT_TOKENS, SYSTEM_INSTRUCTION, TEMPERATURE, TOP_K, TOP_P,
};
use crate::errors::{LuminaError, LuminaResult};
use crate::logging::log_api_call;
use crate::models::{ApiCallLog, Source};
use async_stream::try_stream;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::pin::Pin;
use std::time::Instant;

/// One increment of a streamed reply: some text and any citation references
/// observed in this chunk. Deduplication happens in the session manager.
#[derive(Clone, Debug)]
pub struct StreamChunk {
    pub text: String,
    pub sources: Vec<Source>,
}

/// A file encoded for inline transport to the chat API.
#[derive(Clone, Debug)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl InlineData {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        InlineData {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        }
    }
}

pub type TurnStream = Pin<Box<dyn Stream<Item = LuminaResult<StreamChunk>> + Send>>;

/// Client for the streaming chat endpoint. Holds the HTTP client and
/// credentials; sessions created from it carry the conversation context.
#[derive(Clone, Debug)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        ChatClient {
            client: Client::new(),
            api_key: config.chat_api_key.clone(),
            base_url: config.chat_api_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
        }
    }

    /// Opens a fresh session. The system instruction, sampling parameters,
    /// safety thresholds and search tool are fixed here and nowhere else.
    pub fn create_session(&self) -> ChatSession {
        ChatSession {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            endpoint: format!(
                "{}/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            ),
            history: Vec::new(),
            pending: None,
        }
    }
}

/// One logical conversation with the remote model. Completed turns accumulate
/// in `history` and are replayed as context on every request; a turn whose
/// stream fails is never committed.
#[derive(Debug)]
pub struct ChatSession {
    client: Client,
    api_key: String,
    endpoint: String,
    history: Vec<Value>,
    pending: Option<Value>,
}

impl ChatSession {
    /// Sends a user turn and returns the finite chunk stream of the reply.
    /// Consuming the stream is the only way to observe the response; it is
    /// not restartable. Call `commit_reply` once the stream completes.
    pub async fn stream_turn(
        &mut self,
        text: &str,
        attachment: Option<InlineData>,
    ) -> LuminaResult<TurnStream> {
        let mut parts = Vec::new();
        if let Some(inline) = attachment {
            parts.push(json!({
                "inlineData": {
                    "mimeType": inline.mime_type,
                    "data": inline.data,
                }
            }));
        }
        if !text.is_empty() {
            parts.push(json!({ "text": text }));
        }

        let user_content = json!({ "role": "user", "parts": parts });
        let payload = self.build_request(&user_content);
        self.pending = Some(user_content);

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        log_api_call(&ApiCallLog {
            timestamp: Utc::now(),
            endpoint: self.endpoint.clone(),
            request_summary: summarize(text),
            response_status: status.as_u16(),
            response_time_ms: started.elapsed().as_millis(),
        });

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LuminaError::api_status_error(
                status.as_u16(),
                format!("API returned error: {}", error_text),
            ));
        }

        let mut byte_stream = response.bytes_stream();

        let stream = try_stream! {
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = chunk_result?;
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // SSE framing: one "data: {json}" payload per line.
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer.drain(..=line_end);

                    if let Some(chunk) = parse_sse_line(&line) {
                        yield chunk;
                    }
                }
            }

            if let Some(chunk) = parse_sse_line(buffer.trim_end_matches('\r')) {
                yield chunk;
            }
        };

        Ok(Box::pin(stream))
    }

    /// Records the completed turn in the session context. Skipping this after
    /// a failed stream drops the unanswered user turn as well.
    pub fn commit_reply(&mut self, reply_text: &str) {
        if let Some(user_content) = self.pending.take() {
            self.history.push(user_content);
            self.history.push(json!({
                "role": "model",
                "parts": [{ "text": reply_text }],
            }));
        }
    }

    fn build_request(&self, user_content: &Value) -> Value {
        let mut contents = self.history.clone();
        contents.push(user_content.clone());

        json!({
            "contents": contents,
            "systemInstruction": {
                "parts": [{ "text": SYSTEM_INSTRUCTION }],
            },
            "generationConfig": {
                "temperature": TEMPERATURE,
                "topP": TOP_P,
                "topK": TOP_K,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
            "safetySettings": [
                { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
                { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" },
            ],
            "tools": [{ "google_search": {} }],
        })
    }
}

/// Parses a single SSE line into a chunk. Lines without a `data:` prefix,
/// end-of-stream markers and unparseable payloads all yield nothing.
fn parse_sse_line(line: &str) -> Option<StreamChunk> {
    let data = line.strip_prefix("data: ")?;

    if data.trim() == "[DONE]" {
        return None;
    }

    let json: Value = serde_json::from_str(data).ok()?;
    extract_chunk(&json)
}

fn extract_chunk(json: &Value) -> Option<StreamChunk> {
    let candidates = json["candidates"].as_array()?;

    let mut text = String::new();
    let mut sources = Vec::new();

    for candidate in candidates {
        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if let Some(t) = part["text"].as_str() {
                    text.push_str(t);
                }
            }
        }

        if let Some(chunks) = candidate["groundingMetadata"]["groundingChunks"].as_array() {
            for chunk in chunks {
                let web = &chunk["web"];
                let Some(uri) = web["uri"].as_str() else {
                    continue;
                };
                let title = web["title"].as_str().unwrap_or(uri);
                sources.push(Source {
                    uri: uri.to_string(),
                    title: title.to_string(),
                });
            }
        }
    }

    if text.is_empty() && sources.is_empty() {
        None
    } else {
        Some(StreamChunk { text, sources })
    }
}

fn summarize(text: &str) -> String {
    let mut summary: String = text.chars().take(80).collect();
    if summary.len() < text.len() {
        summary.push_str("...");
    }
    summary
}
