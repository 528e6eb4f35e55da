use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::ai::model::{ChatModel, ModelQuery, ModelSelector, RequestOptions, TextStream};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Delta {
    Content {
        content: String,
    },

    Reasoning {
        #[allow(dead_code)]
        reasoning: String,
    },

    Stop {},
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    choices: Vec<CompletionChunkChoice>,
}

/// Streams the next chat completion for `messages`, yielding content
/// deltas as they arrive. The stream ends at `[DONE]` or a
/// `finish_reason` and fails if the request is cancelled mid-flight.
pub fn completion_stream(
    messages: Vec<Message>,
    options: RequestOptions,
    api_hostname: String,
    api_key: String,
    model: String,
    cancel: CancellationToken,
) -> TextStream {
    Box::pin(try_stream! {
        let mut payload = json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });
        if let Some(temperature) = options.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
        let response = reqwest::Client::new()
            .post(url)
            .bearer_auth(&api_key)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60 * 5))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        'outer: loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(anyhow!("Request cancelled")),
                chunk = stream.next() => match chunk {
                    Some(chunk) => chunk.map_err(Error::from),
                    None => break 'outer,
                },
            }?;

            // Append new data to the buffer. This is necessary to
            // handle SSE fragmentation over HTTP/2 frames.
            buffer.push_str(std::str::from_utf8(&chunk)?);

            // Process all complete SSE events from the buffer
            while let Some(event_end) = buffer.find("\n\n") {
                let event_data = buffer[..event_end].trim().to_string();
                buffer = buffer[event_end + 2..].to_string();

                // Skip empty events and anything that isn't a data event
                if event_data.is_empty() || !event_data.starts_with("data: ") {
                    continue;
                }

                // Extract the JSON payload (after "data: ")
                let data = event_data[6..].trim();

                // Data can sometimes be empty. Not sure why.
                if data.is_empty() {
                    continue;
                }

                // Handle the end of the stream
                if data == "[DONE]" {
                    break 'outer;
                }

                let chunk = serde_json::from_str::<CompletionChunk>(data).inspect_err(|e| {
                    tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
                })?;
                let choice = chunk
                    .choices
                    .first()
                    .ok_or_else(|| anyhow!("Missing choices field"))?;

                match &choice.delta {
                    Delta::Content { content } => {
                        if choice.finish_reason.is_some() {
                            break 'outer;
                        }
                        yield content.clone();
                    }
                    Delta::Reasoning { .. } => {
                        // Reasoning traces are not part of the answer
                        if choice.finish_reason.is_some() {
                            break 'outer;
                        }
                    }
                    Delta::Stop {} => {
                        break 'outer;
                    }
                }
            }
        }
    })
}

/// A chat model reachable over an OpenAI compatible HTTP API.
pub struct OpenAiModel {
    name: String,
    api_hostname: String,
    api_key: String,
}

impl OpenAiModel {
    pub fn new(name: &str, api_hostname: &str, api_key: &str) -> Self {
        Self {
            name: name.to_string(),
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_request(
        &self,
        transcript: &[Message],
        options: &RequestOptions,
        cancel: CancellationToken,
    ) -> Result<TextStream, Error> {
        Ok(completion_stream(
            transcript.to_vec(),
            options.clone(),
            self.api_hostname.clone(),
            self.api_key.clone(),
            self.name.clone(),
            cancel,
        ))
    }
}

/// The set of OpenAI compatible models the host is configured with,
/// resolvable by exact name or family prefix.
pub struct OpenAiModels {
    api_hostname: String,
    api_key: String,
    models: Vec<String>,
}

impl OpenAiModels {
    pub fn new(api_hostname: &str, api_key: &str, models: Vec<String>) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            models,
        }
    }
}

#[async_trait]
impl ModelSelector for OpenAiModels {
    async fn select(&self, query: &ModelQuery) -> Result<Vec<Arc<dyn ChatModel>>, Error> {
        let matches = self
            .models
            .iter()
            .filter(|model| {
                let family_ok = query
                    .family
                    .as_deref()
                    .is_none_or(|family| model.starts_with(family));
                let name_ok = query
                    .name
                    .as_deref()
                    .is_none_or(|name| model.as_str() == name);
                family_ok && name_ok
            })
            .map(|model| {
                Arc::new(OpenAiModel::new(model, &self.api_hostname, &self.api_key))
                    as Arc<dyn ChatModel>
            })
            .collect();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::new(Role::User, "Hello world");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"Hello world"}"#
        );
    }

    #[test]
    fn test_delta_content_deserialization() {
        let json = r#"{"content":"Hello"}"#;
        let delta: Delta = serde_json::from_str(json).unwrap();
        match delta {
            Delta::Content { content } => assert_eq!(content, "Hello"),
            _ => panic!("Expected Content variant"),
        }
    }

    #[test]
    fn test_delta_reasoning_deserialization() {
        let json = r#"{"reasoning":"Thinking..."}"#;
        let delta: Delta = serde_json::from_str(json).unwrap();
        match delta {
            Delta::Reasoning { reasoning } => assert_eq!(reasoning, "Thinking..."),
            _ => panic!("Expected Reasoning variant"),
        }
    }

    #[test]
    fn test_delta_stop_deserialization() {
        let json = r#"{}"#;
        let delta: Delta = serde_json::from_str(json).unwrap();
        match delta {
            Delta::Stop {} => {}
            _ => panic!("Expected Stop variant"),
        }
    }

    #[tokio::test]
    async fn test_completion_stream_content() {
        let mut server = mockito::Server::new_async().await;

        let sse_response = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"},\"finish_reason\":null}]}\n\n\
data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" World\"},\"finish_reason\":null}]}\n\n\
data: [DONE]\n\n";

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create_async()
            .await;

        let messages = vec![Message::new(Role::User, "Say hello")];
        let stream = completion_stream(
            messages,
            RequestOptions::default(),
            server.url(),
            "test-key".to_string(),
            "gpt-4".to_string(),
            CancellationToken::new(),
        );

        let chunks: Vec<String> = stream.try_collect().await.unwrap();

        mock.assert_async().await;
        assert_eq!(chunks.concat(), "Hello World");
    }

    #[tokio::test]
    async fn test_completion_stream_fragmented_events() {
        let mut server = mockito::Server::new_async().await;

        // A single SSE event split mid-JSON only parses once the
        // event terminator arrives
        let sse_response = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"fragmented\"},\"finish_reason\":null}]}\n\ndata: [DONE]\n\n";

        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create_async()
            .await;

        let stream = completion_stream(
            vec![Message::new(Role::User, "Hi")],
            RequestOptions::default(),
            server.url(),
            "test-key".to_string(),
            "gpt-4".to_string(),
            CancellationToken::new(),
        );

        let chunks: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), "fragmented");
    }

    #[tokio::test]
    async fn test_completion_stream_cancelled() {
        let mut server = mockito::Server::new_async().await;

        let sse_response = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"},\"finish_reason\":null}]}\n\ndata: [DONE]\n\n";

        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let stream = completion_stream(
            vec![Message::new(Role::User, "Hi")],
            RequestOptions::default(),
            server.url(),
            "test-key".to_string(),
            "gpt-4".to_string(),
            cancel,
        );

        let result: Result<Vec<String>, Error> = stream.try_collect().await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_completion_stream_http_error() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let stream = completion_stream(
            vec![Message::new(Role::User, "Hi")],
            RequestOptions::default(),
            server.url(),
            "test-key".to_string(),
            "gpt-4".to_string(),
            CancellationToken::new(),
        );

        let result: Result<Vec<String>, Error> = stream.try_collect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_selector_filters_by_family() {
        let selector = OpenAiModels::new(
            "https://api.example.com",
            "test-key",
            vec![
                "gpt-4".to_string(),
                "gpt-4.1-mini".to_string(),
                "o3-mini".to_string(),
            ],
        );

        let models = selector.select(&ModelQuery::family("gpt-4")).await.unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["gpt-4", "gpt-4.1-mini"]);
    }

    #[tokio::test]
    async fn test_selector_filters_by_name() {
        let selector = OpenAiModels::new(
            "https://api.example.com",
            "test-key",
            vec!["gpt-4".to_string(), "o3-mini".to_string()],
        );

        let models = selector.select(&ModelQuery::name("o3-mini")).await.unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["o3-mini"]);
    }

    #[tokio::test]
    async fn test_selector_default_query_returns_all() {
        let selector = OpenAiModels::new(
            "https://api.example.com",
            "test-key",
            vec!["gpt-4".to_string(), "o3-mini".to_string()],
        );

        let models = selector.select(&ModelQuery::default()).await.unwrap();
        assert_eq!(models.len(), 2);
    }

    #[tokio::test]
    async fn test_selector_no_match_returns_empty() {
        let selector = OpenAiModels::new(
            "https://api.example.com",
            "test-key",
            vec!["o3-mini".to_string()],
        );

        let models = selector.select(&ModelQuery::family("gpt-4")).await.unwrap();
        assert!(models.is_empty());
    }
}
