use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use tracing::warn;

use crate::utils::http::get_http_client;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

const DOWNLOAD_MAX_ATTEMPTS: usize = 3;
const DOWNLOAD_BASE_DELAY_MS: u64 = 400;
const DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Strips the bot token out of Telegram file URLs before they reach the logs.
fn redact_file_url(url: &str) -> String {
    let Some(start) = url.find("/bot") else {
        return url.to_string();
    };
    let token_start = start + "/bot".len();
    match url[token_start..].find('/') {
        Some(len) => format!(
            "{}[redacted]{}",
            &url[..token_start],
            &url[token_start + len..]
        ),
        None => url.to_string(),
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Downloads an uploaded Telegram file, retrying transient failures.
pub async fn download_photo(url: &str) -> Result<Vec<u8>> {
    let client = get_http_client();
    let log_url = redact_file_url(url);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let last_attempt = attempt == DOWNLOAD_MAX_ATTEMPTS;
        let delay = Duration::from_millis(DOWNLOAD_BASE_DELAY_MS << (attempt - 1));

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "Failed to fetch photo {log_url}: timeout={} connect={} attempt={}/{}",
                    err.is_timeout(),
                    err.is_connect(),
                    attempt,
                    DOWNLOAD_MAX_ATTEMPTS
                );
                if !should_retry_error(&err) || last_attempt {
                    return Err(anyhow!("photo download failed: {}", err.without_url()));
                }
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Photo download failed for {log_url} with status {}: {}",
                status,
                truncate_for_log(&body, DOWNLOAD_ERROR_BODY_LIMIT)
            );
            if !should_retry_status(status) || last_attempt {
                return Err(anyhow!("photo download failed with status {status}"));
            }
            tokio::time::sleep(delay).await;
            continue;
        }

        return Ok(response.bytes().await?.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_heic_brand_before_infer() {
        let mut data = vec![0, 0, 0, 24];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0; 8]);
        assert_eq!(detect_mime_type(&data).as_deref(), Some("image/heic"));
    }

    #[test]
    fn detects_jpeg_magic() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1, 1];
        assert_eq!(detect_mime_type(&data).as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn redacts_bot_token_from_file_urls() {
        assert_eq!(
            redact_file_url("https://api.telegram.org/file/bot123:ABC/photos/file_1.jpg"),
            "https://api.telegram.org/file/bot[redacted]/photos/file_1.jpg"
        );
        assert_eq!(redact_file_url("https://example.com/a.jpg"), "https://example.com/a.jpg");
    }

    #[test]
    fn truncates_long_log_values() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc... (truncated)");
        assert_eq!(truncate_for_log("abc", 3), "abc");
    }
}
