use std::env;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_analysis_model: String,
    pub gemini_image_model: String,
    pub gemini_timeout_seconds: u64,
    pub gemini_max_attempts: usize,
    pub order_recipient_chat_id: Option<i64>,
    pub order_confirmation_delay_ms: u64,
    pub max_upload_bytes: usize,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_chat_id(name: &str, value: Option<String>) -> Result<Option<i64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| anyhow!("{name} must be a numeric Telegram chat id, got '{trimmed}'"))
}

fn normalize_base_url(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        warn!("GEMINI_BASE_URL is empty; using the public Gemini endpoint.");
        return DEFAULT_GEMINI_BASE_URL.to_string();
    }
    trimmed.to_string()
}

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

impl Config {
    /// Reads the environment. Missing credentials are reported by
    /// [`Config::validate`] so the logger can come up first.
    pub fn load() -> Result<Self> {
        let order_recipient_chat_id = parse_chat_id(
            "ORDER_RECIPIENT_CHAT_ID",
            env::var("ORDER_RECIPIENT_CHAT_ID").ok(),
        )?;

        Ok(Config {
            bot_token: env_string("BOT_TOKEN", ""),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                DEFAULT_GEMINI_BASE_URL,
            )),
            gemini_analysis_model: env_string("GEMINI_ANALYSIS_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            gemini_timeout_seconds: env_u64("GEMINI_TIMEOUT_SECONDS", 90).max(1),
            gemini_max_attempts: env_usize("GEMINI_MAX_ATTEMPTS", 1).max(1),
            order_recipient_chat_id,
            order_confirmation_delay_ms: env_u64("ORDER_CONFIRMATION_DELAY_MS", 1500),
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(anyhow!("BOT_TOKEN is required"));
        }
        if self.gemini_api_key.trim().is_empty() {
            return Err(anyhow!("GEMINI_API_KEY is required"));
        }
        Ok(())
    }
}

pub const ANALYSIS_PROMPT: &str = "Analyze this image to see if it meets standard passport photo requirements. Check for these specific criteria:
1. Background is neutral and plain (e.g., white or off-white).
2. Lighting is even with no significant shadows on the face or background.
3. The person's face is centered and looking directly at the camera.
4. Eyes are open and clearly visible.
5. The person has a neutral expression or a faint smile.
6. No hats, sunglasses, or other objects obscuring the face.

Respond ONLY with a JSON object that conforms to the provided schema. Be strict in your evaluation.";

/// `{color}` is replaced with the lowercase color name.
pub const BACKGROUND_PROMPT_TEMPLATE: &str = "Replace the background of this portrait with a solid, plain, {color} color suitable for an official ID photo. Ensure the subject's hair, clothing, and outline are preserved perfectly with no artifacts. The final image should only contain the person and the new plain background.";

pub const WHITE_SHIRT_PROMPT: &str = "Digitally and realistically replace the clothing on the person in this photo with a formal white collared shirt, suitable for a professional ID photo. Preserve the person's head, face, and the existing background. The result should look natural and high-quality.";

pub const BLACK_SUIT_PROMPT: &str = "Digitally and realistically replace the clothing on the person in this photo with a formal black suit jacket over a white collared shirt, suitable for a professional ID photo. Preserve the person's head, face, and the existing background. The result should look natural and high-quality.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_recipient_means_log_only() {
        assert_eq!(parse_chat_id("X", None).unwrap(), None);
        assert_eq!(parse_chat_id("X", Some("  ".into())).unwrap(), None);
        assert_eq!(
            parse_chat_id("X", Some("-1001234567890".into())).unwrap(),
            Some(-1001234567890)
        );
    }

    #[test]
    fn malformed_recipient_is_a_startup_error() {
        let err = parse_chat_id("ORDER_RECIPIENT_CHAT_ID", Some("@printshop".into())).unwrap_err();
        assert!(err.to_string().contains("ORDER_RECIPIENT_CHAT_ID"));
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://localhost:8080/v1beta/".into()),
            "http://localhost:8080/v1beta"
        );
        assert_eq!(normalize_base_url("  ".into()), DEFAULT_GEMINI_BASE_URL);
    }

    #[test]
    fn validation_requires_both_credentials() {
        let mut config = Config {
            bot_token: "123:abc".into(),
            log_level: "info".into(),
            gemini_api_key: String::new(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            gemini_analysis_model: "m".into(),
            gemini_image_model: "m".into(),
            gemini_timeout_seconds: 90,
            gemini_max_attempts: 1,
            order_recipient_chat_id: None,
            order_confirmation_delay_ms: 0,
            max_upload_bytes: 1,
        };
        assert!(config.validate().is_err());
        config.gemini_api_key = "key".into();
        assert!(config.validate().is_ok());
        config.bot_token = " ".into();
        assert!(config.validate().is_err());
    }
}
