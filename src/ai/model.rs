//! The seam between the chat session and whatever models the host
//! provides. Implementations are injected, not inherited, so the
//! session core can be tested against scripted fakes.
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::openai::Message;

/// A lazy, finite sequence of text fragments making up one model
/// response. Consumed eagerly into a single string before a round is
/// considered complete.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// Criteria for resolving a chat model. The default query matches
/// every model the selector knows about.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelQuery {
    pub family: Option<String>,
    pub name: Option<String>,
}

impl ModelQuery {
    pub fn family(family: &str) -> Self {
        Self {
            family: Some(family.to_string()),
            name: None,
        }
    }

    pub fn name(name: &str) -> Self {
        Self {
            family: None,
            name: Some(name.to_string()),
        }
    }
}

/// Options forwarded to the model call. Opaque to the session core.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A chat model that takes a full transcript and streams back the
/// next assistant response as text fragments.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Display name used in logs, telemetry, and diagnostics.
    fn name(&self) -> &str;

    /// Send the transcript and return the response stream. The
    /// cancellation token is forwarded from the caller; honoring it
    /// during the request is the implementation's responsibility.
    async fn send_request(
        &self,
        transcript: &[Message],
        options: &RequestOptions,
        cancel: CancellationToken,
    ) -> Result<TextStream, Error>;
}

/// Resolves selection criteria to zero or more candidate models.
#[async_trait]
pub trait ModelSelector: Send + Sync {
    async fn select(&self, query: &ModelQuery) -> Result<Vec<Arc<dyn ChatModel>>, Error>;
}
