//! `OpenAICompatibleClient` implements [`ClientWrapper`] for any backend speaking the
//! OpenAI Chat Completions protocol (OpenAI itself, hosted gateways, self-hosted
//! servers). Endpoint, key and model come from the [`BackendConfig`] of each call, so
//! one client instance serves every agent and the coordinator.
//!
//! # Example
//!
//! ```rust,no_run
//! use groupllm::client_wrapper::{ClientWrapper, Message};
//! use groupllm::clients::openai::OpenAICompatibleClient;
//! use groupllm::profile::BackendConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let key = std::env::var("OPEN_AI_SECRET").unwrap_or_default();
//!     let backend = BackendConfig::new("https://api.openai.com", key, "gpt-4.1-nano");
//!     let client = OpenAICompatibleClient::new();
//!
//!     match client.send_message(&backend, &[Message::user("Hello!")]).await {
//!         Ok(reply) => println!("Assistant: {}", reply.content),
//!         Err(e) => eprintln!("request failed: {}", e),
//!     }
//!     if let Some(usage) = client.get_last_usage() {
//!         println!("Tokens: {} in, {} out", usage.input_tokens, usage.output_tokens);
//!     }
//! }
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use openai_rust2 as openai_rust;

use crate::groupllm::client_wrapper::{ClientError, ClientWrapper, Message, TokenUsage};
use crate::groupllm::clients::common::{format_messages, send_and_track};
use crate::groupllm::clients::http_pool::get_http_client;
use crate::groupllm::profile::BackendConfig;

/// Path appended to each backend's base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Client wrapper for OpenAI-compatible chat completion endpoints.
///
/// The last request's [`TokenUsage`] is kept so callers can account for cost.
pub struct OpenAICompatibleClient {
    url_path: String,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl Default for OpenAICompatibleClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAICompatibleClient {
    pub fn new() -> Self {
        Self::new_with_url_path(CHAT_COMPLETIONS_PATH)
    }

    /// Use a non-standard completions path, e.g. `/chat/completions` for gateways that
    /// already include the version in their base URL.
    pub fn new_with_url_path(url_path: &str) -> Self {
        OpenAICompatibleClient {
            url_path: url_path.to_string(),
            token_usage: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ClientWrapper for OpenAICompatibleClient {
    async fn send_message(
        &self,
        backend: &BackendConfig,
        messages: &[Message],
    ) -> Result<Message, ClientError> {
        let (reply, _) = self.send_message_with_usage(backend, messages).await?;
        Ok(reply)
    }

    async fn send_message_with_usage(
        &self,
        backend: &BackendConfig,
        messages: &[Message],
    ) -> Result<(Message, Option<TokenUsage>), ClientError> {
        if !backend.is_complete() {
            return Err(format!("incomplete backend configuration: {:?}", backend).into());
        }

        let base_url = backend.endpoint.trim_end_matches('/');
        let api = openai_rust::Client::new_with_client_and_base_url(
            &backend.api_key,
            get_http_client(base_url),
            base_url,
        );

        let (content, usage) = send_and_track(
            &api,
            &backend.model,
            format_messages(messages),
            Some(self.url_path.clone()),
            &self.token_usage,
        )
        .await?;

        Ok((Message::assistant(content), Some(usage)))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
