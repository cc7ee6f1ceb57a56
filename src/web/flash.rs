//! Session-scoped flash messages.
//!
//! A flash is a transient status line shown on the next rendered page and
//! then discarded. Handlers append with [`set_success`]/[`set_error`]; the
//! next handler that renders a view drains the queue with [`take`] and feeds
//! it to the layout template.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const FLASH_KEY: &str = "flash_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

/// Append a success message to the session flash queue.
pub async fn set_success(session: &Session, text: impl Into<String>) {
    set(session, FlashKind::Success, text.into()).await;
}

/// Append an error message to the session flash queue.
pub async fn set_error(session: &Session, text: impl Into<String>) {
    set(session, FlashKind::Error, text.into()).await;
}

async fn set(session: &Session, kind: FlashKind, text: String) {
    let mut queue: Vec<FlashMessage> = match session.get(FLASH_KEY).await {
        Ok(existing) => existing.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to read flash queue from session: {}", e);
            Vec::new()
        }
    };
    queue.push(FlashMessage { kind, text });
    // Losing a transient message must not fail the request.
    if let Err(e) = session.insert(FLASH_KEY, queue).await {
        tracing::warn!("Failed to store flash message: {}", e);
    }
}

/// Drain the flash queue: returns the pending messages and clears them.
pub async fn take(session: &Session) -> Vec<FlashMessage> {
    match session.remove::<Vec<FlashMessage>>(FLASH_KEY).await {
        Ok(queue) => queue.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to drain flash queue: {}", e);
            Vec::new()
        }
    }
}
