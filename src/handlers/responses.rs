use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

use crate::state::AppState;
use crate::wizard::view::Screen;

pub fn keyboard(screen: &Screen) -> InlineKeyboardMarkup {
    let rows = screen
        .keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    InlineKeyboardButton::callback(
                        button.label.clone(),
                        button.action.callback_data(),
                    )
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// Retries transient failures only; API refusals come back immediately.
async fn edit_panel_with_retry(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    screen: &Screen,
) -> Result<(), RequestError> {
    let mut delay = Duration::from_secs_f32(1.5);
    for attempt in 0..3 {
        let request = bot
            .edit_message_text(chat_id, message_id, screen.text.clone())
            .reply_markup(keyboard(screen));

        match request.await {
            Ok(_) => return Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => return Ok(()),
            Err(err) => {
                if attempt == 2 || matches!(err, RequestError::Api(_)) {
                    return Err(err);
                }
                warn!("edit_message_text failed: {err}");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    Ok(())
}

/// Posts a fresh panel below the conversation and remembers it.
pub async fn send_panel(bot: &Bot, state: &AppState, chat_id: ChatId, screen: &Screen) -> Result<()> {
    let sent = bot
        .send_message(chat_id, screen.text.clone())
        .reply_markup(keyboard(screen))
        .await?;
    state.set_panel_message_id(chat_id.0, sent.id);
    Ok(())
}

/// Updates the chat's panel in place, falling back to a new message when there
/// is none or it can no longer be edited.
pub async fn show_panel(bot: &Bot, state: &AppState, chat_id: ChatId, screen: &Screen) -> Result<()> {
    if let Some(message_id) = state.panel_message_id(chat_id.0) {
        match edit_panel_with_retry(bot, chat_id, message_id, screen).await {
            Ok(()) => return Ok(()),
            Err(err) => debug!("Panel {} in chat {} not editable: {err}", message_id.0, chat_id.0),
        }
    }
    send_panel(bot, state, chat_id, screen).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::view::{Action, Button};
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn keyboard_keeps_rows_and_callback_data() {
        let screen = Screen {
            text: "panel".into(),
            keyboard: vec![
                vec![
                    Button {
                        label: "−1".into(),
                        action: Action::Quantity(-1),
                    },
                    Button {
                        label: "+1".into(),
                        action: Action::Quantity(1),
                    },
                ],
                vec![Button {
                    label: "Order now".into(),
                    action: Action::Submit,
                }],
            ],
        };

        let markup = keyboard(&screen);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        let button = &markup.inline_keyboard[1][0];
        assert_eq!(button.text, "Order now");
        assert_eq!(
            button.kind,
            InlineKeyboardButtonKind::CallbackData("pp:submit".into())
        );
    }

    #[test]
    fn empty_screens_clear_the_keyboard() {
        let screen = Screen {
            text: "AI is working...".into(),
            keyboard: Vec::new(),
        };
        assert!(keyboard(&screen).inline_keyboard.is_empty());
    }
}
