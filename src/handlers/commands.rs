use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::ReplyParameters;

use crate::handlers::responses::send_panel;
use crate::state::AppState;
use crate::utils::timing::start_message_timer;
use crate::wizard::machine::Intent;

const GREETING: &str = "Hello! I am the AI Photo Print Assistant. \
I check whether your photo meets passport photo requirements, can fix the \
background or outfit with AI, and take your print order.";

pub const HELP_TEXT: &str = "How it works:
1. Upload: send a photo (PNG, JPG, or WEBP). Sending it as a file keeps full quality.
2. Analyze: the AI checks background, lighting, framing, eyes, expression and obstructions. You can switch the background to red, blue or white, or change the outfit to a white shirt or black suit.
3. Customize: pick a photo print size or an ID photo pack, the quantity and the finish.
4. Confirm: place the order.

Commands:
/start - show the current step
/reset - discard everything and start over
/help - show this message";

const UPLOAD_HINT: &str = "Send me a photo to get started, or use /help to see how it works.";

pub async fn start_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let _timer = start_message_timer("start", &message);
    bot.send_message(message.chat.id, GREETING)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    let screen = state.screen(message.chat.id.0);
    send_panel(&bot, &state, message.chat.id, &screen).await
}

pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    let _timer = start_message_timer("help", &message);
    bot.send_message(message.chat.id, HELP_TEXT)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

pub async fn reset_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let _timer = start_message_timer("reset", &message);
    let transition = state.apply(message.chat.id.0, Intent::Reset)?;
    send_panel(&bot, &state, message.chat.id, &transition.screen).await
}

pub async fn hint_handler(bot: Bot, message: Message) -> Result<()> {
    bot.send_message(message.chat.id, UPLOAD_HINT)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_lists_every_command_and_step() {
        for command in ["/start", "/reset", "/help"] {
            assert!(HELP_TEXT.contains(command), "{command}");
        }
        for step in ["Upload", "Analyze", "Customize", "Confirm"] {
            assert!(HELP_TEXT.contains(step), "{step}");
        }
    }
}
