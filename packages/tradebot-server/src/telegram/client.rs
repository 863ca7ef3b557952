//! Telegram Bot API HTTP client

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tradebot_core::Reply;

use super::types::*;
use crate::state::ReplySink;

/// HTTP client for one bot token
#[derive(Debug, Clone)]
pub struct TelegramClient {
    base_url: String,
    client: Client,
}

impl TelegramClient {
    /// Create a client for `token` against `api_url` (normally `https://api.telegram.org`)
    pub fn new(api_url: &str, token: &str) -> Self {
        Self {
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            client: Client::new(),
        }
    }

    // ========================================================================
    // Internal HTTP Methods
    // ========================================================================

    /// Call a Bot API method with a JSON body
    async fn call<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let result: ApiResult<T> = response.json().await?;
        if !result.ok {
            return Err(anyhow!(
                "{} failed: {} {}",
                method,
                status,
                result.description.unwrap_or_default()
            ));
        }

        result
            .result
            .ok_or_else(|| anyhow!("{} returned no result", method))
    }

    // ========================================================================
    // Bot API Methods
    // ========================================================================

    /// Send a text message, optionally as Markdown
    pub async fn send_message(&self, chat_id: i64, text: &str, markdown: bool) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: markdown.then_some("Markdown"),
        };
        let _: Message = self
            .call("sendMessage", &request, Duration::from_secs(10))
            .await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message"],
        };
        // Leave headroom over the server-side long-poll timeout
        self.call(
            "getUpdates",
            &request,
            Duration::from_secs(timeout_secs + 10),
        )
        .await
    }

    /// Remove any webhook so `getUpdates` is allowed
    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self
            .call(
                "deleteWebhook",
                &serde_json::json!({}),
                Duration::from_secs(10),
            )
            .await?;
        Ok(())
    }
}

impl ReplySink for TelegramClient {
    fn send_reply<'a>(&'a self, chat_id: i64, reply: &'a Reply) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.send_message(chat_id, &reply.text, reply.markdown).await {
                Ok(()) => Ok(()),
                // Tickers or prices can trip the Markdown parser; fall back to plain text
                Err(e) if reply.markdown => {
                    tracing::debug!("Markdown send failed, retrying as plain text: {}", e);
                    self.send_message(chat_id, &reply.text, false).await
                }
                Err(e) => Err(e),
            }
        })
    }
}
