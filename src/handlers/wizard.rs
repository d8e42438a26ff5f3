//! Glue between Telegram updates and the per-chat wizard.
//!
//! Every handler turns an update into an [`Intent`], applies it through
//! [`AppState::apply`] and then performs the returned [`Effect`] outside the
//! session lock. Results of AI calls come back as new intents tagged with the
//! request they answer, so a reply that lost the race is simply dropped.

use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ReplyParameters, User};
use tracing::{debug, error, info, warn};

use crate::config::CONFIG;
use crate::handlers::media::fetch_upload;
use crate::handlers::responses::{send_panel, show_panel};
use crate::llm::{analyze_passport_photo, enhance};
use crate::state::{AppState, Transition};
use crate::utils::telegram::{chat_action_for, start_chat_action_heartbeat};
use crate::utils::timing::{start_callback_timer, start_message_timer};
use crate::wizard::machine::{Effect, Intent, WizardError};
use crate::wizard::order::{order_message, Customer, PlacedOrder};
use crate::wizard::upload::PhotoPayload;
use crate::wizard::view::Action;

pub const NOT_AVAILABLE_MESSAGE: &str = "That option is not available right now.";
const UPLOAD_LOCKED_MESSAGE: &str =
    "Your photo is already on its way to the order. Use /reset to start over with a new one.";

pub fn customer_from(chat_id: ChatId, user: Option<&User>) -> Customer {
    Customer {
        chat_id: chat_id.0,
        user_id: user.and_then(|user| i64::try_from(user.id.0).ok()),
        display_name: user
            .map(|user| user.full_name())
            .unwrap_or_else(|| "Unknown customer".to_string()),
        username: user.and_then(|user| user.username.clone()),
    }
}

pub fn photo_file_name(photo: &PhotoPayload) -> &'static str {
    match photo.mime_type() {
        "image/png" => "passport_photo.png",
        "image/webp" => "passport_photo.webp",
        _ => "passport_photo.jpg",
    }
}

fn input_file(photo: &PhotoPayload) -> InputFile {
    InputFile::memory(photo.bytes().to_vec()).file_name(photo_file_name(photo))
}

pub async fn upload_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let mut timer = start_message_timer("upload", &message);
    let chat_id = message.chat.id;

    let upload = match fetch_upload(&bot, &message).await {
        Ok(upload) => upload,
        Err(err) => {
            warn!("Rejected upload in chat {}: {err}", chat_id.0);
            timer.mark_status("rejected", Some(err.to_string()));
            bot.send_message(chat_id, err.user_message())
                .reply_parameters(ReplyParameters::new(message.id))
                .await?;
            return Ok(());
        }
    };

    match state.apply(chat_id.0, Intent::FileSelected(upload)) {
        Ok(transition) => run_effects(&bot, &state, chat_id, transition, true).await,
        Err(err) => {
            timer.mark_status("not_available", Some(err.to_string()));
            bot.send_message(chat_id, UPLOAD_LOCKED_MESSAGE)
                .reply_parameters(ReplyParameters::new(message.id))
                .await?;
            Ok(())
        }
    }
}

pub async fn callback_handler(bot: Bot, state: AppState, query: CallbackQuery) -> Result<()> {
    let mut timer = start_callback_timer("wizard_callback", &query);
    let Some(message) = query.message.as_ref() else {
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };
    let chat_id = message.chat().id;

    let Some(action) = query.data.as_deref().and_then(Action::parse) else {
        timer.mark_status("unknown_action", query.data.clone());
        bot.answer_callback_query(query.id.clone())
            .text(NOT_AVAILABLE_MESSAGE)
            .await?;
        return Ok(());
    };

    let customer = customer_from(chat_id, Some(&query.from));
    match state.apply(chat_id.0, action.into_intent(customer)) {
        Ok(transition) => {
            timer.mark_status("success", Some(format!("step={}", transition.step.number())));
            if let Err(err) = bot.answer_callback_query(query.id.clone()).await {
                debug!("answer_callback_query failed: {err}");
            }
            state.set_panel_message_id(chat_id.0, message.id());
            run_effects(&bot, &state, chat_id, transition, false).await
        }
        Err(err) => {
            timer.mark_status("rejected", Some(err.to_string()));
            bot.answer_callback_query(query.id.clone())
                .text(NOT_AVAILABLE_MESSAGE)
                .await?;
            Ok(())
        }
    }
}

/// Shows each transition's screen and performs its effect until the wizard
/// settles. A finished edit also triggers the analysis of the edited photo.
pub async fn run_effects(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    mut transition: Transition,
    mut fresh_panel: bool,
) -> Result<()> {
    loop {
        // A photo awaiting analysis is shown once the request is in flight.
        let settling = matches!(transition.effect, Effect::None) && transition.needs_analysis;
        if !settling {
            if fresh_panel {
                send_panel(bot, state, chat_id, &transition.screen).await?;
            } else {
                show_panel(bot, state, chat_id, &transition.screen).await?;
            }
            fresh_panel = false;
        }

        let mut edited_photo = None;
        let intent = match transition.effect {
            Effect::None if transition.needs_analysis => Intent::AnalysisRequested,
            Effect::None => return Ok(()),
            Effect::Analyze { request, photo } => {
                let _heartbeat =
                    start_chat_action_heartbeat(bot.clone(), chat_id, chat_action_for(None));
                match analyze_passport_photo(&photo).await {
                    Ok(result) => Intent::AnalysisSucceeded { request, result },
                    Err(_) => Intent::AnalysisFailed { request },
                }
            }
            Effect::Enhance {
                request,
                enhancement,
                photo,
            } => {
                let _heartbeat = start_chat_action_heartbeat(
                    bot.clone(),
                    chat_id,
                    chat_action_for(Some(enhancement)),
                );
                match enhance(&photo, enhancement).await {
                    Ok(image) => {
                        edited_photo = Some((enhancement.label(), image.clone()));
                        Intent::EnhancementSucceeded { request, image }
                    }
                    Err(_) => Intent::EnhancementFailed { request },
                }
            }
            Effect::PlaceOrder { order, photo } => {
                if let Err(err) = hand_off_order(bot, &order, &photo).await {
                    error!("Order hand-off for chat {} failed: {err:#}", chat_id.0);
                }
                tokio::time::sleep(Duration::from_millis(CONFIG.order_confirmation_delay_ms))
                    .await;
                Intent::OrderProcessed
            }
        };

        transition = match state.apply(chat_id.0, intent) {
            Ok(next) => next,
            Err(WizardError::Superseded(request)) => {
                debug!("Dropping superseded response {request} in chat {}", chat_id.0);
                return Ok(());
            }
            Err(err) => {
                debug!("Wizard in chat {} moved on: {err}", chat_id.0);
                return Ok(());
            }
        };

        if let Some((caption, image)) = edited_photo {
            match bot
                .send_photo(chat_id, input_file(&image))
                .caption(caption)
                .await
            {
                Ok(_) => fresh_panel = true,
                Err(err) => warn!("Failed to send edited photo to chat {}: {err}", chat_id.0),
            }
        }
    }
}

/// Sends the order and its final photo to the configured recipient chat, or
/// only logs it when no recipient is set.
async fn hand_off_order(bot: &Bot, order: &PlacedOrder, photo: &PhotoPayload) -> Result<()> {
    let message = order_message(order)?;
    let Some(recipient) = CONFIG.order_recipient_chat_id else {
        info!("Order placed without a recipient chat:\n{message}");
        return Ok(());
    };

    let recipient = ChatId(recipient);
    bot.send_message(recipient, message).await?;
    bot.send_photo(recipient, input_file(photo)).await?;
    info!(
        "Order from chat {} handed off to chat {}: total {}",
        order.customer.chat_id, recipient.0, order.quote.total
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_follows_the_photo_format() {
        assert_eq!(
            photo_file_name(&PhotoPayload::new(vec![1], "image/png")),
            "passport_photo.png"
        );
        assert_eq!(
            photo_file_name(&PhotoPayload::new(vec![1], "image/jpeg")),
            "passport_photo.jpg"
        );
        assert_eq!(
            photo_file_name(&PhotoPayload::new(vec![1], "image/webp")),
            "passport_photo.webp"
        );
    }

    #[test]
    fn anonymous_customers_still_carry_the_chat() {
        let customer = customer_from(ChatId(-100), None);
        assert_eq!(customer.chat_id, -100);
        assert_eq!(customer.user_id, None);
        assert_eq!(customer.display_name, "Unknown customer");
    }
}
