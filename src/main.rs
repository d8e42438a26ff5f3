use std::error::Error;

use dotenvy::dotenv;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

mod config;
mod handlers;
mod llm;
mod state;
mod utils;
mod wizard;

use config::CONFIG;
use handlers::media::has_attachment;
use handlers::{commands, wizard as wizard_handlers};
use state::AppState;
use utils::logging::init_logging;
use wizard::view::CALLBACK_PREFIX;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
    Reset,
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level);

    if let Err(err) = CONFIG.validate() {
        error!("Refusing to start: {err}");
        return Err(err.into());
    }

    let bot = Bot::new(CONFIG.bot_token.clone());
    info!(
        "Starting passport photo print bot (analysis model {}, image model {})",
        CONFIG.gemini_analysis_model, CONFIG.gemini_image_model
    );
    match CONFIG.order_recipient_chat_id {
        Some(chat_id) => info!("Orders are handed off to chat {chat_id}"),
        None => info!("ORDER_RECIPIENT_CHAT_ID is not set; orders are only logged"),
    }

    let state = AppState::new();

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(|msg: Message| has_attachment(&msg)).endpoint(handle_upload))
        .branch(
            dptree::filter(|msg: Message| msg.chat.is_private() && msg.text().is_some())
                .endpoint(handle_text),
        )
        .endpoint(ignore_message);

    let callback_handler = Update::filter_callback_query().endpoint(handle_callback_query);

    let handler = dptree::entry()
        .branch(message_handler)
        .branch(callback_handler);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    state: AppState,
    message: Message,
    command: Command,
) -> HandlerResult {
    match command {
        Command::Start => commands::start_handler(bot, state, message).await?,
        Command::Help => commands::help_handler(bot, message).await?,
        Command::Reset => commands::reset_handler(bot, state, message).await?,
    }
    Ok(())
}

async fn handle_upload(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    tokio::spawn(async move {
        if let Err(err) = wizard_handlers::upload_handler(bot, state, message).await {
            error!("upload handler failed: {err:#}");
        }
    });
    Ok(())
}

async fn handle_text(bot: Bot, message: Message) -> HandlerResult {
    if let Some(text) = message.text() {
        if text.trim_start().starts_with('/') {
            return Ok(());
        }
    }
    commands::hint_handler(bot, message).await?;
    Ok(())
}

async fn handle_callback_query(bot: Bot, state: AppState, query: CallbackQuery) -> HandlerResult {
    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    if data.starts_with(CALLBACK_PREFIX) {
        tokio::spawn(async move {
            if let Err(err) = wizard_handlers::callback_handler(bot, state, query).await {
                error!("wizard callback failed: {err:#}");
            }
        });
    }
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
