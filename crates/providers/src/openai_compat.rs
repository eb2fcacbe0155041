//! OpenAI-compatible generator implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, llama.cpp server, TGI's
//! OpenAI shim, and any endpoint exposing `/v1/chat/completions` or
//! `/v1/completions`.
//!
//! Supports:
//! - Chat style: the assembled prompt is sent as a single user message
//! - Completions style: the assembled prompt is sent raw
//! - Non-streaming and streaming (SSE) generation

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use versa_config::ApiStyle;
use versa_core::error::GeneratorError;
use versa_core::generator::*;

/// A text generator backed by an OpenAI-compatible HTTP API.
pub struct OpenAiCompatGenerator {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    style: ApiStyle,
    send_repetition_penalty: bool,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    /// Create a new OpenAI-compatible generator.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| GeneratorError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            style: ApiStyle::Chat,
            send_repetition_penalty: false,
            client,
        })
    }

    /// Select the endpoint shape.
    ///
    /// Completions style also sends `repetition_penalty`, which local
    /// inference servers accept and hosted chat APIs reject.
    pub fn with_style(mut self, style: ApiStyle) -> Self {
        self.style = style;
        self.send_repetition_penalty = style == ApiStyle::Completions;
        self
    }

    fn endpoint(&self) -> String {
        match self.style {
            ApiStyle::Chat => format!("{}/chat/completions", self.base_url),
            ApiStyle::Completions => format!("{}/completions", self.base_url),
        }
    }

    /// Build the JSON request body for either endpoint shape.
    fn request_body(&self, request: &GenerationRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": request.options.temperature,
            "max_tokens": request.options.max_tokens,
            "stream": stream,
        });

        match self.style {
            ApiStyle::Chat => {
                let messages = vec![ApiMessage {
                    role: "user".into(),
                    content: Some(request.prompt.clone()),
                }];
                body["messages"] = serde_json::json!(messages);
            }
            ApiStyle::Completions => {
                body["prompt"] = serde_json::json!(request.prompt);
            }
        }

        if self.send_repetition_penalty {
            body["repetition_penalty"] = serde_json::json!(request.options.repetition_penalty);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }

    async fn send(
        &self,
        body: &serde_json::Value,
        streaming: bool,
    ) -> Result<reqwest::Response, GeneratorError> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if streaming {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GeneratorError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(GeneratorError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Generator returned error");
            return Err(GeneratorError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, GeneratorError> {
        let body = self.request_body(&request, false);

        debug!(
            generator = %self.name,
            model = %self.model,
            style = ?self.style,
            prompt_chars = request.prompt.len(),
            "Sending generation request"
        );

        let response = self.send(&body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GeneratorError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .map(ApiChoice::into_text)
            .ok_or_else(|| GeneratorError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(GenerationResponse {
            text,
            model: api_response.model.unwrap_or_else(|| self.model.clone()),
            usage: api_response.usage.map(ApiUsage::into_usage),
        })
    }

    async fn stream(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, GeneratorError>>,
        GeneratorError,
    > {
        let body = self.request_body(&request, true);

        debug!(generator = %self.name, model = %self.model, "Sending streaming request");

        let response = self.send(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let generator_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(GeneratorError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                lines.push(&bytes);

                // Process complete lines
                while let Some(line) = lines.next_line() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(generator = %generator_name, error = %e, "Dropping non-UTF-8 SSE line");
                            continue;
                        }
                    };

                    match parse_sse_line(&line) {
                        SseEvent::Skip => {}
                        SseEvent::Done => {
                            let _ = tx.send(Ok(final_chunk(None))).await;
                            return;
                        }
                        SseEvent::Chunk(chunk) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() || done {
                                return; // receiver dropped or usage chunk ended the stream
                            }
                        }
                        SseEvent::Malformed(data) => {
                            trace!(
                                generator = %generator_name,
                                data = %data,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(final_chunk(None))).await;
        });

        Ok(rx)
    }
}

/// Raw SSE bytes awaiting a line break.
///
/// Bytes are decoded only once a whole line has arrived, so a multi-byte
/// character split across two network reads is never mangled.
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// The next complete line without its `\n` or `\r\n` terminator.
    fn next_line(&mut self) -> Option<Result<String, std::string::FromUtf8Error>> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8(line))
    }
}

fn final_chunk(usage: Option<Usage>) -> StreamChunk {
    StreamChunk {
        content: None,
        done: true,
        usage,
    }
}

/// One parsed line of a server-sent event stream.
#[derive(Debug)]
enum SseEvent {
    /// Blank line, comment, or a chunk with nothing to forward
    Skip,
    /// `data: [DONE]`
    Done,
    Chunk(StreamChunk),
    Malformed(String),
}

fn parse_sse_line(line: &str) -> SseEvent {
    if line.is_empty() || line.starts_with(':') {
        return SseEvent::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseEvent::Done;
    }

    let stream_resp = match serde_json::from_str::<StreamResponse>(data) {
        Ok(r) => r,
        Err(_) => return SseEvent::Malformed(data.to_string()),
    };

    // Usage arrives in the last chunk when stream_options.include_usage is set
    if let Some(usage) = stream_resp.usage {
        return SseEvent::Chunk(final_chunk(Some(usage.into_usage())));
    }

    match stream_resp.choices.into_iter().next() {
        Some(choice) => {
            let is_finish = choice.finish_reason.is_some();
            let content = choice.into_delta_text().filter(|c| !c.is_empty());
            if content.is_some() || is_finish {
                SseEvent::Chunk(StreamChunk {
                    content,
                    done: false,
                    usage: None,
                })
            } else {
                SseEvent::Skip
            }
        }
        None => SseEvent::Skip,
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

/// A choice from either endpoint: chat puts text in `message.content`,
/// completions in `text`.
#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    text: Option<String>,
}

impl ApiChoice {
    fn into_text(self) -> String {
        self.message
            .and_then(|m| m.content)
            .or(self.text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl StreamChoice {
    fn into_delta_text(self) -> Option<String> {
        self.delta.and_then(|d| d.content).or(self.text)
    }
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(style: ApiStyle) -> OpenAiCompatGenerator {
        OpenAiCompatGenerator::new("test", "http://localhost:9999/v1/", "sk-test", "m")
            .unwrap()
            .with_style(style)
    }

    #[test]
    fn completions_style_endpoint() {
        let generator = generator(ApiStyle::Completions);
        assert_eq!(generator.name(), "test");
        assert_eq!(generator.endpoint(), "http://localhost:9999/v1/completions");
    }

    #[test]
    fn trailing_slash_trimmed() {
        let generator = generator(ApiStyle::Chat);
        assert_eq!(generator.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn chat_body_wraps_prompt_in_user_message() {
        let generator = generator(ApiStyle::Chat);
        let request = GenerationRequest::new("Hello", GenerationOptions::default()).with_stop("</s>");
        let body = generator.request_body(&request, false);

        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["stop"][0], "</s>");
        assert!(body.get("prompt").is_none());
        assert!(body.get("repetition_penalty").is_none());
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn completions_body_sends_raw_prompt() {
        let generator = generator(ApiStyle::Completions);
        let request = GenerationRequest::new("Hello", GenerationOptions::default());
        let body = generator.request_body(&request, true);

        assert_eq!(body["prompt"], "Hello");
        assert!(body.get("messages").is_none());
        assert!(body.get("repetition_penalty").is_some());
        assert_eq!(body["stream"], true);
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn parse_chat_response() {
        let data = r#"{"model":"gpt-4o-mini","choices":[{"message":{"role":"assistant","content":"Hi!"}}],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.usage.as_ref().unwrap().total_tokens, 5);
        assert_eq!(parsed.choices.into_iter().next().unwrap().into_text(), "Hi!");
    }

    #[test]
    fn parse_completions_response() {
        let data = r#"{"choices":[{"text":"The answer is 1.</s>","index":0}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.model.is_none());
        assert_eq!(
            parsed.choices.into_iter().next().unwrap().into_text(),
            "The answer is 1.</s>"
        );
    }

    // --- SSE parsing tests ---

    #[test]
    fn sse_chat_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hello"));
                assert!(!chunk.done);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn sse_completions_text_delta() {
        let line = r#"data: {"choices":[{"text":" world","finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => assert_eq!(chunk.content.as_deref(), Some(" world")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn sse_finish_chunk_without_content() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                assert!(chunk.content.is_none());
                assert!(!chunk.done);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn sse_usage_ends_stream() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                assert!(chunk.done);
                assert_eq!(chunk.usage.unwrap().total_tokens, 15);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn sse_control_lines() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseEvent::Done));
        assert!(matches!(parse_sse_line(""), SseEvent::Skip));
        assert!(matches!(parse_sse_line(": keep-alive"), SseEvent::Skip));
        assert!(matches!(parse_sse_line("event: message"), SseEvent::Skip));
        assert!(matches!(
            parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":null}]}"#),
            SseEvent::Skip
        ));
        assert!(matches!(parse_sse_line("data: {oops"), SseEvent::Malformed(_)));
    }

    // --- Streaming byte handling ---

    #[test]
    fn line_buffer_keeps_split_multibyte_chars() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut lines = SseLineBuffer::default();
        lines.push(&line[..split]);
        assert!(lines.next_line().is_none());

        lines.push(&line[split..]);
        let decoded = lines.next_line().unwrap().unwrap();
        assert!(decoded.contains("héllo"));
        assert!(lines.next_line().is_none());
    }

    #[test]
    fn line_buffer_strips_crlf_and_holds_partial_tail() {
        let mut lines = SseLineBuffer::default();
        lines.push(b"data: a\r\n\r\ndata: b");

        assert_eq!(lines.next_line().unwrap().unwrap(), "data: a");
        assert_eq!(lines.next_line().unwrap().unwrap(), "");
        assert!(lines.next_line().is_none());

        lines.push(b"\n");
        assert_eq!(lines.next_line().unwrap().unwrap(), "data: b");
    }

    #[test]
    fn line_buffer_reports_invalid_utf8() {
        let mut lines = SseLineBuffer::default();
        lines.push(&[b'd', 0xFF, b'\n', b'o', b'k', b'\n']);
        assert!(lines.next_line().unwrap().is_err());
        assert_eq!(lines.next_line().unwrap().unwrap(), "ok");
    }

    /// Serve one SSE response, writing the body in two parts split at `split`.
    async fn serve_split_sse(body: &'static [u8], split: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read the whole request before answering
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(&body[..split]).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            socket.write_all(&body[split..]).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn stream_decodes_chars_split_across_reads() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"},\"finish_reason\":null}]}\n\ndata: [DONE]\n\n".as_bytes();
        let split = body.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let base_url = serve_split_sse(body, split).await;

        let generator = OpenAiCompatGenerator::new("test", base_url, "sk-test", "m").unwrap();
        let mut rx = generator
            .stream(GenerationRequest::new("Hi", GenerationOptions::default()))
            .await
            .unwrap();

        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if let Some(content) = chunk.content {
                text.push_str(&content);
            }
            if chunk.done {
                break;
            }
        }
        assert_eq!(text, "héllo");
    }
}
