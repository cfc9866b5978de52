use crate::bot::handlers::{self, Command};
use crate::bot::transport::{TelegramMediaStore, TelegramSender, TelegramStatusChannel};
use crate::config::Settings;
use crate::relay::{
    self, DeliveryQueue, DispatchSettings, Intake, RelayPorts, StatusReporter, SystemClock,
};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
///
/// Returns after Ctrl-C, once the relay dispatcher has stopped and any
/// in-flight delivery has finished.
pub async fn run_bot(settings: Arc<Settings>) {
    init_media_folder(&settings).await;

    let bot = Bot::new(settings.bot_token.clone());
    let ports = RelayPorts {
        store: Arc::new(TelegramMediaStore::new(bot.clone())),
        sender: Arc::new(TelegramSender::new(bot.clone())),
        status: Arc::new(TelegramStatusChannel::new(
            bot.clone(),
            settings.display_offset(),
        )),
        clock: Arc::new(SystemClock),
    };

    let destination = settings.destination();
    match &destination {
        Some(target) => info!("Broadcast mode: all media goes to {target}"),
        None => info!("Echo mode: media is sent back to the submitter"),
    }

    let queue = Arc::new(DeliveryQueue::new());
    let dispatcher = Arc::new(relay::Dispatcher::new(
        queue.clone(),
        ports.clone(),
        DispatchSettings {
            interval: settings.interval(),
            destination,
        },
    ));
    let intake = Arc::new(Intake::new(
        queue.clone(),
        dispatcher.clone(),
        ports.clone(),
        settings.media_folder(),
    ));
    let reporter = Arc::new(StatusReporter::new(
        queue,
        dispatcher.clone(),
        ports.clock.clone(),
    ));

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    let handler = setup_handler();

    info!(
        "Bot is running (interval {} ms, media folder {})...",
        settings.media_interval, settings.media_folder
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![intake, reporter, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Shutting down the relay dispatcher...");
    dispatcher.shutdown().await;
}

async fn init_media_folder(settings: &Settings) {
    let folder = settings.media_folder();
    match tokio::fs::create_dir_all(&folder).await {
        Ok(()) => info!("Media folder ready: {}", folder.display()),
        Err(e) => {
            error!("Failed to create media folder {}: {}", folder.display(), e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo))
        .branch(dptree::filter(|msg: Message| msg.video().is_some()).endpoint(handle_video))
        .branch(dptree::endpoint(handle_other))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    reporter: Arc<StatusReporter>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg).await,
        Command::Queue => handlers::queue_status(bot, msg, reporter, settings).await,
        Command::Help => handlers::help(bot, msg, settings).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_photo(msg: Message, intake: Arc<Intake>) -> Result<(), teloxide::RequestError> {
    handlers::handle_photo(msg, intake).await;
    respond(())
}

async fn handle_video(msg: Message, intake: Arc<Intake>) -> Result<(), teloxide::RequestError> {
    handlers::handle_video(msg, intake).await;
    respond(())
}

async fn handle_other(
    bot: Bot,
    msg: Message,
    reporter: Arc<StatusReporter>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_other(bot, msg, reporter, settings).await {
        error!("Message handler error: {}", e);
    }
    respond(())
}
