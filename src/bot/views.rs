//! View layer: message texts and keyboards.
//!
//! All texts are Telegram HTML; user-provided text is escaped.

use crate::relay::{MediaKind, Notice, QueueReport};
use crate::utils::{format_duration, format_size_mb, truncate_str};
use chrono::{DateTime, FixedOffset, Utc};
use html_escape::encode_text;
use std::time::Duration;
use teloxide::types::{KeyboardButton, KeyboardMarkup};

/// Text of the reply keyboard button that shows the queue
pub const QUEUE_BUTTON: &str = "Посмотреть очередь 📋";

/// Captions longer than this are shortened in status messages
const CAPTION_PREVIEW_CHARS: usize = 200;

/// Persistent keyboard with the queue button
#[must_use]
pub fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(QUEUE_BUTTON)]])
        .resize_keyboard()
        .persistent()
}

const fn emoji(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "🖼️",
        MediaKind::Video => "🎬",
    }
}

const fn title(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "Фото",
        MediaKind::Video => "Видео",
    }
}

const fn genitive(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "фото",
        MediaKind::Video => "видео",
    }
}

/// Formats a UTC timestamp for display in the configured offset
#[must_use]
pub fn format_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%d.%m.%Y %H:%M:%S")
        .to_string()
}

/// Renders a submitter notice
#[must_use]
pub fn render_notice(notice: &Notice, offset: FixedOffset) -> String {
    match notice {
        Notice::Downloading { kind } => {
            format!("⏳ Начинаю загрузку {}...", genitive(*kind))
        }
        Notice::Queued {
            kind,
            position,
            estimated_at,
            size_bytes,
            caption,
        } => {
            let mut text = format!(
                "{} <b>{} успешно добавлено в очередь!</b>\n\n\
                 🔢 Позиция в очереди: {}\n\
                 📦 Размер: {}\n\
                 🗓️ Предполагаемое время отправки: {}",
                emoji(*kind),
                title(*kind),
                position,
                format_size_mb(*size_bytes),
                format_time(*estimated_at, offset)
            );
            if let Some(caption) = caption {
                let preview = truncate_str(caption, CAPTION_PREVIEW_CHARS);
                text.push_str(&format!("\n📝 Подпись: \"{}\"", encode_text(&preview)));
            }
            text
        }
        Notice::RetrievalFailed => {
            "❌ Произошла ошибка при обработке файла. Попробуйте еще раз.".to_string()
        }
        Notice::Sent { kind } => {
            format!("{} <b>{} успешно отправлено!</b>", emoji(*kind), title(*kind))
        }
        Notice::DestinationUnreachable { .. } => "❌ <b>Ошибка при отправке в канал</b>\n\n\
             Файл не отправлен. Возможно, бот не добавлен в канал \
             или не имеет прав администратора."
            .to_string(),
        Notice::RetryScheduled { next_attempt, .. } => format!(
            "⚠️ <b>Временная ошибка при отправке файла</b>\n\n\
             Бот автоматически повторит попытку в {}.",
            format_time(*next_attempt, offset)
        ),
    }
}

/// Greeting for `/start`
#[must_use]
pub fn welcome_text() -> String {
    "Добро пожаловать! Используйте клавиатуру ниже для управления ботом \
     или отправьте фото/видео для добавления в очередь."
        .to_string()
}

/// Usage help for `/help`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn help_text(interval: Duration) -> String {
    let hours = interval.as_secs_f64() / 3600.0;
    format!(
        "🤖 <b>Бот для обработки и отправки медиа файлов</b>\n\n\
         <b>Доступные команды:</b>\n\
         📋 /queue - Показать состояние очереди\n\
         ❓ /help - Показать это сообщение\n\n\
         📝 <b>Как использовать:</b>\n\
         1️⃣ Просто отправьте фото или видео боту\n\
         2️⃣ Файл будет добавлен в очередь\n\
         3️⃣ Бот отправит файл по расписанию\n\n\
         ⏱️ Интервал отправки: {hours:.1} ч"
    )
}

/// Reply for messages that are neither media nor commands
#[must_use]
pub fn not_media_text() -> String {
    "Пожалуйста, отправьте фото или видео файл.".to_string()
}

/// Queue overview for `/queue`
#[must_use]
pub fn queue_report_text(report: &QueueReport, offset: FixedOffset) -> String {
    if report.is_empty() {
        return "🤷‍♂️ Очередь медиа файлов пуста. \
                Отправьте фото или видео, чтобы добавить их в очередь!"
            .to_string();
    }

    let mut text = format!(
        "📋 <b>Состояние очереди медиа файлов</b>\n\
         🕒 По состоянию на {}\n\n\
         📊 Всего в очереди: {} (🖼️ {} / 🎬 {})",
        format_time(report.generated_at, offset),
        report.total,
        report.photos,
        report.videos
    );

    if let (Some(wait), Some(at)) = (report.next_attempt_in, report.next_attempt_at) {
        text.push_str(&format!(
            "\n⏭️ Следующая отправка через {} ({})",
            format_duration(wait),
            format_time(at, offset)
        ));
    }

    if let Some(last) = report.last.as_ref().filter(|_| report.total > 1) {
        text.push_str(&format!(
            "\n\n<b>Последний файл в очереди:</b>\n\
             🔢 Позиция: {}\n\
             🕒 Время отправки: {}",
            last.position,
            format_time(last.estimated_at, offset)
        ));
    }

    if !report.mine.is_empty() {
        text.push_str("\n\n<b>Ваши файлы:</b>");
        for entry in &report.mine {
            text.push_str(&format!(
                "\n{} #{} - {}",
                emoji(entry.kind),
                entry.position,
                format_time(entry.estimated_at, offset)
            ));
        }
    }

    text
}
