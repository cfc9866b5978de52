use crate::bot::views::{
    help_text, main_keyboard, not_media_text, queue_report_text, welcome_text, QUEUE_BUTTON,
};
use crate::config::Settings;
use crate::relay::{Intake, MediaKind, OriginId, RemoteMedia, StatusReporter, SubmissionOutcome};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, types::ParseMode, utils::command::BotCommands};
use tracing::{debug, info};

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    /// Show the welcome message and keyboard
    #[command(description = "Запустить бота")]
    Start,
    /// Show the queue status
    #[command(description = "Показать состояние очереди медиа файлов")]
    Queue,
    /// Show usage help
    #[command(description = "Показать справку по боту")]
    Help,
}

/// Greets the user and installs the queue keyboard
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, welcome_text())
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

/// Replies with the queue report, including the requester's own items
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn queue_status(
    bot: Bot,
    msg: Message,
    reporter: Arc<StatusReporter>,
    settings: Arc<Settings>,
) -> Result<()> {
    let report = reporter.report(Some(OriginId(msg.chat.id.0))).await;
    debug!(
        "Queue report for user {}: {} pending",
        get_user_id_safe(&msg),
        report.total
    );
    bot.send_message(
        msg.chat.id,
        queue_report_text(&report, settings.display_offset()),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(main_keyboard())
    .await?;
    Ok(())
}

/// Sends usage help
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn help(bot: Bot, msg: Message, settings: Arc<Settings>) -> Result<()> {
    bot.send_message(msg.chat.id, help_text(settings.interval()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Queues the largest size of a submitted photo
///
/// Submission problems are reported to the user by the intake itself.
pub async fn handle_photo(msg: Message, intake: Arc<Intake>) {
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return;
    };
    let remote = RemoteMedia {
        file_id: photo.file.id.0.clone(),
        kind: MediaKind::Photo,
    };
    submit(&msg, &intake, remote).await;
}

/// Queues a submitted video
pub async fn handle_video(msg: Message, intake: Arc<Intake>) {
    let Some(video) = msg.video() else {
        return;
    };
    let remote = RemoteMedia {
        file_id: video.file.id.0.clone(),
        kind: MediaKind::Video,
    };
    submit(&msg, &intake, remote).await;
}

async fn submit(msg: &Message, intake: &Intake, remote: RemoteMedia) {
    let user_id = get_user_id_safe(msg);
    info!("User {user_id} submitted a {}", remote.kind);

    let caption = msg.caption().map(str::to_string);
    match intake
        .submit(OriginId(msg.chat.id.0), remote, caption)
        .await
    {
        SubmissionOutcome::Queued { id, position, .. } => {
            debug!("Submission {id} from user {user_id} queued at {position}");
        }
        SubmissionOutcome::Rejected(e) => {
            info!("Submission from user {user_id} rejected: {e}");
        }
    }
}

/// Handles everything that is neither a command nor media
///
/// The queue button shows the queue; unknown commands are ignored; any
/// other message gets a hint.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_other(
    bot: Bot,
    msg: Message,
    reporter: Arc<StatusReporter>,
    settings: Arc<Settings>,
) -> Result<()> {
    match msg.text() {
        Some(QUEUE_BUTTON) => queue_status(bot, msg, reporter, settings).await,
        Some(text) if text.starts_with('/') => {
            debug!("Ignoring unknown command: {text}");
            Ok(())
        }
        _ => {
            bot.send_message(msg.chat.id, not_media_text())
                .reply_markup(main_keyboard())
                .await?;
            Ok(())
        }
    }
}
