//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Wrappers around Telegram API calls that retry transient network failures
//! using exponential backoff with jitter.
//!
//! # Usage
//!
//! ```ignore
//! use media_relay_bot::bot::resilient::{send_message_resilient, edit_or_send_resilient};
//!
//! let msg = send_message_resilient(&bot, chat_id, "⏳ Downloading...", Some(ParseMode::Html)).await?;
//! let msg = edit_or_send_resilient(&bot, chat_id, Some(msg.id), "✅ Sent!").await?;
//! ```

use anyhow::Result;
use std::future::Future;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode};
use tracing::{debug, warn};

const ERROR_NOT_MODIFIED: &str = "message is not modified";

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await
}

/// Updates a status message in place, posting a new one when that fails.
///
/// Returns the id of the message now carrying `text`. An edit rejected as
/// "not modified" keeps the existing message.
///
/// # Errors
///
/// Returns an error only when the fallback send fails as well.
pub async fn edit_or_send_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: Option<MessageId>,
    text: &str,
) -> Result<MessageId> {
    edit_or_send(
        msg_id,
        move |id| async move {
            edit_message_resilient(bot, chat_id, id, text, Some(ParseMode::Html))
                .await
                .map(|_| ())
        },
        move || async move {
            send_message_resilient(bot, chat_id, text, Some(ParseMode::Html))
                .await
                .map(|msg| msg.id)
        },
    )
    .await
}

/// Edit-else-send decision behind [`edit_or_send_resilient`].
///
/// `edit` runs only when there is a message to edit; `send` runs when there
/// is none or the edit failed for any reason other than "not modified".
///
/// # Errors
///
/// Returns the error of `send`.
pub async fn edit_or_send<E, EF, S, SF>(
    msg_id: Option<MessageId>,
    edit: E,
    send: S,
) -> Result<MessageId>
where
    E: FnOnce(MessageId) -> EF,
    EF: Future<Output = Result<()>>,
    S: FnOnce() -> SF,
    SF: Future<Output = Result<MessageId>>,
{
    if let Some(msg_id) = msg_id {
        match edit(msg_id).await {
            Ok(()) => return Ok(msg_id),
            Err(e) if e.to_string().contains(ERROR_NOT_MODIFIED) => {
                debug!("Status update skipped: {e}");
                return Ok(msg_id);
            }
            Err(e) => {
                warn!("Failed to edit status message, sending a new one: {e}");
            }
        }
    }

    send().await
}
