//! A chat session that drives an LLM to a semantically complete
//! answer across multiple rounds.
//!
//! A single model response can be cut off by token limits. The
//! session detects completion by looking for a sentinel end-marker at
//! the end of the accumulated answer and re-prompts the model to
//! continue until the marker appears or the round budget runs out.
//! Partial outputs are concatenated in order and the marker is
//! stripped from the final answer.
use std::sync::Arc;

use anyhow::{Error, Result};
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::models::Transcript;
use crate::ai::error::SessionError;
use crate::ai::model::{ChatModel, ModelQuery, ModelSelector, RequestOptions};
use crate::openai::{Message, Role};
use crate::telemetry::{self, EventSink, LogSink};

pub const DEFAULT_END_MARK: &str = "<|endofresponse|>";
pub const DEFAULT_MAX_ROUNDS: usize = 3;
pub const DEFAULT_MODEL_FAMILY: &str = "gpt-4";

/// Executes the continuation protocol for one user request at a time.
///
/// The configuration is immutable and every `send` call builds its
/// own transcript from the seed messages, so concurrent calls on the
/// same session are independent conversations.
///
/// Use `ChatSession::builder()` to construct a valid `ChatSession`.
pub struct ChatSession {
    selector: Arc<dyn ModelSelector>,
    seed: Vec<Message>,
    query: ModelQuery,
    options: RequestOptions,
    max_rounds: usize,
    end_mark: String,
    events: Arc<dyn EventSink>,
}

impl ChatSession {
    pub fn builder(selector: Arc<dyn ModelSelector>) -> ChatSessionBuilder {
        ChatSessionBuilder::new(selector)
    }

    /// Send a user message with the configured defaults and no
    /// cancellation.
    pub async fn send(&self, user_message: &str) -> Result<String, Error> {
        self.send_with(user_message, None, CancellationToken::new())
            .await
    }

    /// Send a user message, optionally overriding the configured
    /// request options. The cancellation token is forwarded to every
    /// model invocation; the session itself never polls it.
    pub async fn send_with(
        &self,
        user_message: &str,
        options: Option<RequestOptions>,
        cancel: CancellationToken,
    ) -> Result<String, Error> {
        let span = tracing::info_span!("chat_send");
        self.do_send(user_message, options, cancel)
            .instrument(span)
            .await
    }

    async fn do_send(
        &self,
        user_message: &str,
        options: Option<RequestOptions>,
        cancel: CancellationToken,
    ) -> Result<String, Error> {
        self.events.emit(telemetry::CHAT_STARTED, None);

        let candidates = self.selector.select(&self.query).await?;
        let Some(model) = candidates.first() else {
            // Query the unfiltered list purely to build the diagnostic
            let all = self.selector.select(&ModelQuery::default()).await?;
            let available = all
                .iter()
                .map(|m| m.name().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            self.events.emit(
                telemetry::NO_SUITABLE_MODEL_FOUND,
                Some(json!({ "models": available })),
            );
            return Err(SessionError::NoSuitableModel { available }.into());
        };
        self.events.emit(
            telemetry::MODEL_SELECTED,
            Some(json!({ "model": model.name() })),
        );

        let options = options.unwrap_or_else(|| self.options.clone());
        let mut transcript = Transcript::new_with_messages(self.seed.clone());
        let mut answer = String::new();
        let mut rounds = 0;

        loop {
            let prompt = if rounds == 0 {
                user_message.to_string()
            } else {
                format!(
                    "continue where you left off, or end your response with \"{}\" to finish the conversation.",
                    self.end_mark
                )
            };
            rounds += 1;

            tracing::debug!("User:\n{}", prompt);
            tracing::info!("User: {}...", first_line(&prompt));
            transcript.push(Message::new(Role::User, &prompt));
            tracing::info!("Assistant: thinking...");

            self.events.emit(telemetry::REQUEST_SENT, None);
            let raw = match self
                .next_round(model.as_ref(), &transcript, &options, cancel.clone())
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    self.events.emit(
                        telemetry::REQUEST_FAILED,
                        Some(json!({ "error": e.to_string() })),
                    );
                    tracing::error!("Failed to chat with model: {}", e);
                    return Err(e);
                }
            };

            transcript.push(Message::new(Role::Assistant, &raw));
            tracing::debug!("Assistant:\n{}", raw);
            tracing::info!("Assistant: {}...", first_line(raw.trim()));
            answer.push_str(&raw);

            // Completion is checked against the full accumulated
            // answer, not the latest round's output alone
            let complete = answer.trim().ends_with(&self.end_mark);
            if complete || rounds >= self.max_rounds {
                break;
            }
        }

        tracing::debug!("Completed in {} rounds", rounds);
        self.events
            .emit(telemetry::CHAT_COMPLETED, Some(json!({ "rounds": rounds })));
        Ok(strip_end_mark(answer, &self.end_mark))
    }

    /// Run one request/response round, consuming the streamed
    /// response fully into a single string.
    async fn next_round(
        &self,
        model: &dyn ChatModel,
        transcript: &Transcript,
        options: &RequestOptions,
        cancel: CancellationToken,
    ) -> Result<String, Error> {
        let mut stream = model
            .send_request(transcript.messages(), options, cancel)
            .await?;
        let mut raw = String::new();
        while let Some(chunk) = stream.next().await {
            raw.push_str(&chunk?);
        }
        Ok(raw)
    }
}

/// Remove the end-marker from the final answer. The comment-wrapped
/// form is stripped before the bare marker so a bare strip never
/// leaves a dangling comment token behind. First occurrence only.
fn strip_end_mark(answer: String, end_mark: &str) -> String {
    answer
        .replacen(&format!("//{}", end_mark), "", 1)
        .replacen(end_mark, "", 1)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

pub struct ChatSessionBuilder {
    selector: Arc<dyn ModelSelector>,
    seed: Vec<Message>,
    query: ModelQuery,
    options: RequestOptions,
    max_rounds: usize,
    end_mark: String,
    events: Arc<dyn EventSink>,
}

impl ChatSessionBuilder {
    pub fn new(selector: Arc<dyn ModelSelector>) -> Self {
        Self {
            selector,
            seed: Vec::new(),
            query: ModelQuery::family(DEFAULT_MODEL_FAMILY),
            options: RequestOptions::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            end_mark: DEFAULT_END_MARK.to_string(),
            events: Arc::new(LogSink),
        }
    }

    /// System or example messages prepended to every transcript.
    pub fn seed(mut self, messages: Vec<Message>) -> Self {
        self.seed = messages;
        self
    }

    pub fn model_query(mut self, query: ModelQuery) -> Self {
        self.query = query;
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn end_mark(mut self, end_mark: &str) -> Self {
        self.end_mark = end_mark.to_string();
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> ChatSession {
        ChatSession {
            selector: self.selector,
            seed: self.seed,
            query: self.query,
            options: self.options,
            max_rounds: self.max_rounds,
            end_mark: self.end_mark,
            events: self.events,
        }
    }
}
