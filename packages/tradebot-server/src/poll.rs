//! Long-polling mode: pull updates with `getUpdates` instead of a webhook.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;
use crate::telegram::TelegramClient;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Poll until ctrl-c. Fetch errors back off exponentially up to 30s.
pub async fn run(state: Arc<AppState>, client: TelegramClient, timeout_secs: u64) -> Result<()> {
    client.delete_webhook().await?;
    tracing::info!(timeout_secs, "Long polling for updates");

    let mut offset = 0;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down poller");
                return Ok(());
            }
            result = client.get_updates(offset, timeout_secs) => result,
        };

        let updates = match updates {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                updates
            }
            Err(e) => {
                tracing::warn!("getUpdates failed: {:#}, retrying in {:?}", e, backoff);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        for update in updates {
            offset = next_offset(offset, update.update_id);
            let update_id = update.update_id;
            if let Err(e) = state.handle_update(update).await {
                tracing::error!(update_id, "Error processing update: {:#}", e);
            }
        }
    }
}

/// Offset that acknowledges `update_id`.
fn next_offset(current: i64, update_id: i64) -> i64 {
    current.max(update_id + 1)
}
