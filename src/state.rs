use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use teloxide::types::MessageId;
use tracing::{debug, info};

use crate::wizard::machine::{Effect, Intent, Step, Wizard, WizardError, WizardState};
use crate::wizard::view::{render, Screen};

/// One chat's wizard plus the message that currently shows its panel.
#[derive(Debug, Default)]
pub struct ChatSession {
    pub wizard: Wizard,
    pub panel_message_id: Option<MessageId>,
}

/// The outcome of a successful transition, captured while the lock was held.
#[derive(Debug)]
pub struct Transition {
    pub effect: Effect,
    pub screen: Screen,
    pub step: Step,
    pub needs_analysis: bool,
}

#[derive(Clone, Default)]
pub struct AppState {
    pub sessions: Arc<Mutex<HashMap<i64, ChatSession>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, chat_id: i64, intent: Intent) -> Result<Transition, WizardError> {
        let name = intent.name();
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(chat_id).or_default();
        let before = session.wizard.step();

        let effect = session.wizard.apply(intent).inspect_err(|err| {
            debug!(chat_id, intent = name, "Wizard rejected intent: {err}");
        })?;

        let step = session.wizard.step();
        if step != before {
            info!(chat_id, intent = name, "Wizard moved from {before} to {step}");
        }
        Ok(Transition {
            effect,
            screen: render(session.wizard.state()),
            step,
            needs_analysis: needs_analysis(&session.wizard),
        })
    }

    pub fn screen(&self, chat_id: i64) -> Screen {
        let sessions = self.sessions.lock();
        match sessions.get(&chat_id) {
            Some(session) => render(session.wizard.state()),
            None => render(&WizardState::default()),
        }
    }

    pub fn panel_message_id(&self, chat_id: i64) -> Option<MessageId> {
        self.sessions
            .lock()
            .get(&chat_id)
            .and_then(|session| session.panel_message_id)
    }

    pub fn set_panel_message_id(&self, chat_id: i64, message_id: MessageId) {
        self.sessions
            .lock()
            .entry(chat_id)
            .or_default()
            .panel_message_id = Some(message_id);
    }
}

fn needs_analysis(wizard: &Wizard) -> bool {
    match wizard.state() {
        WizardState::Reviewing(review) => review.needs_analysis(),
        _ => false,
    }
}
