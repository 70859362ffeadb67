use super::framing::{LineDecoder, StreamEvent, decode_stream};
use super::{ChatError, ChatResult, CompletionBackend, CompletionRequest, DeltaStream};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub struct DeepSeekBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl DeepSeekBackend {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(serde::Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
pub struct OAIMessage {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct OAIDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct OAIChoice {
    #[serde(default)]
    pub delta: Option<OAIDelta>,
    #[serde(default)]
    pub message: Option<OAIMessage>,
}

#[derive(Deserialize)]
pub struct OAIErrorBody {
    pub message: String,
}

#[derive(Deserialize)]
pub struct OAIChunk {
    #[serde(default)]
    pub choices: Vec<OAIChoice>,
    #[serde(default)]
    pub error: Option<OAIErrorBody>,
}

/// Interprets the payload of one SSE `data` field. A payload that is not a
/// valid chunk is an error; a valid chunk without text yields `None`.
pub fn parse_sse_data(data: &str) -> Result<Option<StreamEvent>, serde_json::Error> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed == "[DONE]" {
        return Ok(Some(StreamEvent::Done));
    }

    let parsed = serde_json::from_str::<OAIChunk>(trimmed)?;
    if let Some(error) = parsed.error {
        return Ok(Some(StreamEvent::Failed(error.message)));
    }
    let Some(first) = parsed.choices.into_iter().next() else {
        return Ok(None);
    };
    if let Some(delta) = first.delta
        && let Some(piece) = delta.content
    {
        return Ok(Some(StreamEvent::Delta(piece)));
    }
    if let Some(msg) = first.message
        && let Some(content) = msg.content
    {
        return Ok(Some(StreamEvent::Delta(content)));
    }
    Ok(None)
}

/// Collects consecutive `data:` lines until a blank line ends the event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    data: Option<String>,
}

impl SseDecoder {
    fn dispatch(&mut self) -> ChatResult<Vec<StreamEvent>> {
        let Some(data) = self.data.take() else {
            return Ok(Vec::new());
        };
        Ok(parse_sse_data(&data)?.into_iter().collect())
    }
}

impl LineDecoder for SseDecoder {
    fn line(&mut self, line: &str) -> ChatResult<Vec<StreamEvent>> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let fragment = rest.strip_prefix(' ').unwrap_or(rest);
            match &mut self.data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(fragment);
                }
                None => self.data = Some(fragment.to_string()),
            }
        }
        // comments (": keep-alive") and other fields are ignored
        Ok(Vec::new())
    }

    fn finish(&mut self) -> ChatResult<Vec<StreamEvent>> {
        self.dispatch()
    }
}

#[async_trait]
impl CompletionBackend for DeepSeekBackend {
    async fn stream(&self, request: CompletionRequest<'_>) -> ChatResult<DeltaStream> {
        let Some(key) = &self.api_key else {
            return Err(ChatError::NotConfigured(
                "DEEPSEEK_API_KEY is not set".to_string(),
            ));
        };

        let endpoint = self.endpoint();
        debug!(
            endpoint = %endpoint,
            model = request.model,
            messages = request.messages.len(),
            "starting completion stream"
        );

        let response = self
            .client
            .post(&endpoint)
            .header("accept", "text/event-stream")
            .bearer_auth(key)
            .json(&ChatCompletionRequest {
                model: request.model,
                messages: request.messages,
                temperature: request.temperature,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api { status, body });
        }

        Ok(decode_stream(
            response.bytes_stream().boxed(),
            SseDecoder::default(),
        ))
    }
}
