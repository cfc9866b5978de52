//! Telegram implementations of the relay ports.

use crate::bot::resilient::edit_or_send_resilient;
use crate::bot::views::render_notice;
use crate::relay::{
    CleanupError, DeliveryTarget, MediaFile, MediaKind, MediaSender, MediaStore, Notice,
    NotifyError, OriginId, RemoteMedia, RetrievalError, SendError, StatusChannel, StatusHandle,
};
use crate::utils::retry_telegram_operation;
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use lazy_regex::regex_is_match;
use std::path::{Path, PathBuf};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, MessageId, Recipient};
use teloxide::{ApiError, RequestError};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// Maps a Telegram failure onto the relay's retry policy.
///
/// Errors meaning the destination cannot accept posts are fatal; everything
/// else (network, rate limits, server hiccups) is worth another attempt.
#[must_use]
pub fn classify_send_error(err: &RequestError) -> SendError {
    let text = err.to_string();
    let fatal = match err {
        RequestError::Api(api) => match api {
            ApiError::ChatNotFound
            | ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::NotEnoughRightsToPostMessages
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation => true,
            ApiError::Unknown(description) => is_fatal_description(description),
            _ => false,
        },
        _ => false,
    };

    if fatal {
        SendError::FatalDestination(text)
    } else {
        SendError::Transient(text)
    }
}

fn is_fatal_description(description: &str) -> bool {
    regex_is_match!(
        r"(?i)chat not found|not a member|kicked|blocked|have no rights",
        description
    )
}

fn recipient(target: &DeliveryTarget) -> Recipient {
    match target {
        DeliveryTarget::Chat(id) => Recipient::Id(ChatId(*id)),
        DeliveryTarget::Channel(name) => Recipient::ChannelUsername(name.clone()),
    }
}

/// Posts media through the Bot API
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    /// Wraps a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MediaSender for TelegramSender {
    async fn send(
        &self,
        destination: &DeliveryTarget,
        kind: MediaKind,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), SendError> {
        let to = recipient(destination);
        let file = InputFile::file(path.to_path_buf());

        // One attempt per tick; the dispatcher owns retries.
        let result = match kind {
            MediaKind::Photo => {
                let mut req = self.bot.send_photo(to, file);
                if let Some(caption) = caption {
                    req = req.caption(caption);
                }
                req.await
            }
            MediaKind::Video => {
                let mut req = self.bot.send_video(to, file);
                if let Some(caption) = caption {
                    req = req.caption(caption);
                }
                req.await
            }
        };

        result.map(|_| ()).map_err(|e| classify_send_error(&e))
    }
}

/// Keeps one status message per submission up to date
pub struct TelegramStatusChannel {
    bot: Bot,
    offset: FixedOffset,
}

impl TelegramStatusChannel {
    /// Renders times in `offset`
    #[must_use]
    pub const fn new(bot: Bot, offset: FixedOffset) -> Self {
        Self { bot, offset }
    }
}

#[async_trait]
impl StatusChannel for TelegramStatusChannel {
    async fn notify(
        &self,
        origin: OriginId,
        notice: &Notice,
        handle: Option<StatusHandle>,
    ) -> Result<StatusHandle, NotifyError> {
        let text = render_notice(notice, self.offset);
        let msg_id = handle.map(|h| MessageId(h.0));

        edit_or_send_resilient(&self.bot, ChatId(origin.0), msg_id, &text)
            .await
            .map(|id| StatusHandle(id.0))
            .map_err(|e| NotifyError(e.to_string()))
    }
}

/// Downloads submitted files into the media folder
pub struct TelegramMediaStore {
    bot: Bot,
}

impl TelegramMediaStore {
    /// Wraps a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Local name for a download: `{kind}_{millis}_{short id}{ext}`.
///
/// The extension comes from the Telegram file path, falling back to the
/// kind's default.
#[must_use]
pub fn local_file_name(kind: MediaKind, telegram_path: &str) -> String {
    let ext = Path::new(telegram_path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map_or_else(|| kind.default_extension().to_string(), |e| format!(".{e}"));
    let short_id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!(
        "{}_{}_{}{}",
        kind.label(),
        Utc::now().timestamp_millis(),
        short_id,
        ext
    )
}

/// Flushes buffered bytes and syncs them to disk, returning the final size.
///
/// The dispatcher may open the file by path right after intake, so it must
/// be complete before the handle is dropped.
async fn seal_download(mut out: tokio::fs::File) -> std::io::Result<u64> {
    out.flush().await?;
    out.sync_all().await?;
    Ok(out.metadata().await?.len())
}

impl TelegramMediaStore {
    async fn download(
        &self,
        remote: &RemoteMedia,
        dest: &Path,
    ) -> anyhow::Result<(PathBuf, u64)> {
        let file = self.bot.get_file(FileId(remote.file_id.clone())).await?;
        let path = dest.join(local_file_name(remote.kind, &file.path));

        let mut out = tokio::fs::File::create(&path).await?;
        let written = match self.bot.download_file(&file.path, &mut out).await {
            Ok(()) => seal_download(out).await.map_err(anyhow::Error::from),
            Err(e) => {
                drop(out);
                Err(e.into())
            }
        };

        match written {
            Ok(size) => Ok((path, size)),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    debug!("Failed to remove partial download {}: {cleanup}", path.display());
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl MediaStore for TelegramMediaStore {
    async fn materialize(
        &self,
        remote: &RemoteMedia,
        dest: &Path,
    ) -> Result<MediaFile, RetrievalError> {
        tokio::fs::create_dir_all(dest).await?;

        let (path, size) = retry_telegram_operation(|| self.download(remote, dest))
            .await
            .map_err(|e| RetrievalError::Download(e.to_string()))?;

        debug!("Downloaded {} to {} ({size} bytes)", remote.kind, path.display());
        Ok(MediaFile::new(path, size))
    }

    async fn remove(&self, file: MediaFile) -> Result<(), CleanupError> {
        let path = file.into_path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(source) => Err(CleanupError { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_errors_are_fatal() {
        for api in [
            ApiError::ChatNotFound,
            ApiError::BotKicked,
            ApiError::NotEnoughRightsToPostMessages,
        ] {
            let err = classify_send_error(&RequestError::Api(api));
            assert!(matches!(err, SendError::FatalDestination(_)), "{err}");
        }
    }

    #[test]
    fn test_unknown_errors_classified_by_text() {
        let fatal = RequestError::Api(ApiError::Unknown(
            "Bad Request: bot is not a member of the channel chat".to_string(),
        ));
        assert!(matches!(
            classify_send_error(&fatal),
            SendError::FatalDestination(_)
        ));

        let transient = RequestError::Api(ApiError::Unknown(
            "Internal Server Error: restart".to_string(),
        ));
        assert!(matches!(
            classify_send_error(&transient),
            SendError::Transient(_)
        ));
    }

    #[test]
    fn test_local_file_name() {
        let name = local_file_name(MediaKind::Photo, "photos/file_7.jpeg");
        assert!(name.starts_with("photo_"));
        assert!(name.ends_with(".jpeg"));
        assert_eq!(name.split('_').count(), 3);

        let name = local_file_name(MediaKind::Video, "videos/file_8");
        assert!(name.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_sealed_download_reports_all_written_bytes() -> std::io::Result<()> {
        let path = std::env::temp_dir().join(format!("relay_{}.part", Uuid::new_v4().simple()));
        let payload = vec![7u8; 256 * 1024];

        let mut out = tokio::fs::File::create(&path).await?;
        out.write_all(&payload).await?;
        let sealed = seal_download(out).await;

        // a fresh reader sees every byte without the writer's handle
        let on_disk = tokio::fs::read(&path).await;
        tokio::fs::remove_file(&path).await?;

        assert_eq!(sealed?, payload.len() as u64);
        assert_eq!(on_disk?.len(), payload.len());
        Ok(())
    }
}
