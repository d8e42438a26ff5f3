use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use teloxide::types::{CallbackQuery, Message};
use tracing::info;

/// Records how long one user interaction took, from receipt to the last reply.
#[derive(Debug)]
pub struct InteractionTimer {
    interaction: String,
    chat_id: Option<i64>,
    user_id: Option<i64>,
    detail_in: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl InteractionTimer {
    fn new(
        interaction: &str,
        chat_id: Option<i64>,
        user_id: Option<i64>,
        detail_in: Option<String>,
    ) -> Self {
        InteractionTimer {
            interaction: interaction.to_string(),
            chat_id,
            user_id,
            detail_in,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn from_message(interaction: &str, message: &Message) -> Self {
        let text = message
            .text()
            .or_else(|| message.caption())
            .map(|value| value.replace('\n', " ").chars().take(300).collect());
        let user_id = message
            .from
            .as_ref()
            .and_then(|user| i64::try_from(user.id.0).ok());
        Self::new(interaction, Some(message.chat.id.0), user_id, text)
    }

    pub fn from_callback(interaction: &str, query: &CallbackQuery) -> Self {
        let chat_id = query.message.as_ref().map(|message| message.chat().id.0);
        let user_id = i64::try_from(query.from.id.0).ok();
        Self::new(interaction, chat_id, user_id, query.data.clone())
    }

    fn log_received(&self) {
        info!(
            target: "bot.timing",
            "event=interaction_received interaction={} chat_id={:?} user_id={:?} received_at={} input={:?}",
            self.interaction,
            self.chat_id,
            self.user_id,
            self.started_at.to_rfc3339(),
            self.detail_in
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: "bot.timing",
            "event=interaction_completed interaction={} chat_id={:?} user_id={:?} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.interaction,
            self.chat_id,
            self.user_id,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for InteractionTimer {
    fn drop(&mut self) {
        self.log_completed();
    }
}

pub fn start_message_timer(interaction: &str, message: &Message) -> InteractionTimer {
    let timer = InteractionTimer::from_message(interaction, message);
    timer.log_received();
    timer
}

pub fn start_callback_timer(interaction: &str, query: &CallbackQuery) -> InteractionTimer {
    let timer = InteractionTimer::from_callback(interaction, query);
    timer.log_received();
    timer
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "bot.timing",
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "bot.timing",
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        Utc::now().to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn llm_timing_passes_the_result_through() {
        let ok = log_llm_timing("gemini", "m", "op", None, || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<(), _> = log_llm_timing("gemini", "m", "op", None, || async {
            Err(anyhow::anyhow!("boom"))
        })
        .await;
        assert_eq!(err.unwrap_err().to_string(), "boom");
    }
}
