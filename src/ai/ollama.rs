use super::framing::{LineDecoder, StreamEvent, decode_stream};
use super::{ChatError, ChatResult, CompletionBackend, CompletionRequest, DeltaStream};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub struct OllamaBackend {
    client: Client,
    endpoint: String,
}

impl OllamaBackend {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }
}

#[derive(serde::Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(serde::Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize, Debug)]
pub struct StreamChunkMessage {
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub struct StreamChunk {
    pub message: Option<StreamChunkMessage>,
    pub done: Option<bool>,
    pub error: Option<String>,
}

pub fn parse_ollama_stream_line(
    line_with_ws: &str,
) -> Result<Vec<StreamEvent>, serde_json::Error> {
    let line = line_with_ws.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    let parsed = serde_json::from_str::<StreamChunk>(line)?;
    if let Some(error) = parsed.error {
        return Ok(vec![StreamEvent::Failed(error)]);
    }
    let mut events = Vec::new();
    if let Some(msg) = parsed.message {
        events.push(StreamEvent::Delta(msg.content));
    }
    if parsed.done.unwrap_or(false) {
        events.push(StreamEvent::Done);
    }
    Ok(events)
}

struct JsonLines;

impl LineDecoder for JsonLines {
    fn line(&mut self, line: &str) -> ChatResult<Vec<StreamEvent>> {
        Ok(parse_ollama_stream_line(line)?)
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn stream(&self, request: CompletionRequest<'_>) -> ChatResult<DeltaStream> {
        debug!(endpoint = %self.endpoint, model = request.model, "starting ollama stream");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&OllamaChatRequest {
                model: request.model,
                messages: request.messages,
                stream: true,
                options: OllamaOptions {
                    temperature: request.temperature,
                },
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api { status, body });
        }

        Ok(decode_stream(response.bytes_stream().boxed(), JsonLines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_lines() {
        let mut acc = String::new();
        let mut done = false;
        for line in [
            r#"{"message":{"role":"assistant","content":"Hello"},"done":false}"#,
            r#"{"message":{"role":"assistant","content":" world"},"done":false}"#,
            r#"{"done":true}"#,
        ] {
            for event in parse_ollama_stream_line(line).unwrap() {
                match event {
                    StreamEvent::Delta(piece) => acc.push_str(&piece),
                    StreamEvent::Done => done = true,
                    StreamEvent::Failed(err) => panic!("unexpected failure: {err}"),
                }
            }
        }
        assert_eq!(acc, "Hello world");
        assert!(done);
    }

    #[test]
    fn reports_inline_errors() {
        assert_eq!(
            parse_ollama_stream_line(r#"{"error":"model not found"}"#).unwrap(),
            vec![StreamEvent::Failed("model not found".to_string())]
        );
        assert!(parse_ollama_stream_line("   ").unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_a_decode_error() {
        let mut decoder = JsonLines;
        assert!(parse_ollama_stream_line(r#"{"message":{"content":"半"#).is_err());
        assert!(matches!(
            decoder.line(r#"{"message":"#),
            Err(ChatError::Decode(_))
        ));
    }
}
