use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::{info, warn};

use crate::config::CONFIG;
use crate::llm::media::download_photo;
use crate::wizard::upload::{UploadError, UploadedImage};

/// An image attached to a message, before it is downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingImage {
    pub file_id: FileId,
    pub file_name: Option<String>,
    pub declared_mime: Option<String>,
    pub size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Rejected(#[from] UploadError),
    #[error("photo download failed: {0:#}")]
    Download(anyhow::Error),
}

impl FetchError {
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Rejected(err) => err.to_string(),
            FetchError::Download(_) => {
                "I couldn't download that photo. Please send it again.".to_string()
            }
        }
    }
}

pub async fn get_file_url(bot: &Bot, file_id: &FileId) -> Result<String> {
    let file = bot.get_file(file_id.clone()).await?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        CONFIG.bot_token, file.path
    ))
}

/// Picks the largest photo size, or a document that is not declared as
/// something other than an image.
pub fn find_image(message: &Message) -> Option<IncomingImage> {
    if let Some(photo) = message.photo().and_then(|sizes| sizes.last()) {
        return Some(IncomingImage {
            file_id: photo.file.id.clone(),
            file_name: None,
            declared_mime: Some("image/jpeg".to_string()),
            size: photo.file.size as usize,
        });
    }

    let document = message.document()?;
    let declared_mime = document
        .mime_type
        .as_ref()
        .map(|mime| mime.essence_str().to_string());
    if declared_mime
        .as_deref()
        .is_some_and(|mime| !mime.starts_with("image/"))
    {
        return None;
    }
    Some(IncomingImage {
        file_id: document.file.id.clone(),
        file_name: document.file_name.clone(),
        declared_mime,
        size: document.file.size as usize,
    })
}

/// Documents that are not images still reach the wizard so the user hears why
/// they were refused.
pub fn has_attachment(message: &Message) -> bool {
    message.photo().is_some() || message.document().is_some()
}

pub async fn fetch_upload(bot: &Bot, message: &Message) -> Result<UploadedImage, FetchError> {
    let image = find_image(message).ok_or(UploadError::NotAnImage)?;
    let limit = CONFIG.max_upload_bytes;
    if image.size > limit {
        return Err(UploadError::TooLarge {
            size: image.size,
            limit,
        }
        .into());
    }

    let url = get_file_url(bot, &image.file_id)
        .await
        .map_err(FetchError::Download)?;
    let bytes = download_photo(&url).await.map_err(|err| {
        warn!("Failed to download upload for chat {}: {err:#}", message.chat.id.0);
        FetchError::Download(err)
    })?;

    let upload = UploadedImage::from_bytes(
        bytes,
        image.declared_mime.as_deref(),
        image.file_name,
        limit,
    )?;
    info!(
        "Received {} upload for chat {}: {} bytes, {}x{}",
        upload.payload.mime_type(),
        message.chat.id.0,
        upload.payload.len(),
        upload.width,
        upload.height
    );
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_explain_themselves_to_the_user() {
        let rejected = FetchError::from(UploadError::NotAnImage);
        assert_eq!(rejected.user_message(), "Please send a PNG, JPG, or WEBP image.");

        let download = FetchError::Download(anyhow::anyhow!("status 502"));
        assert!(download.user_message().contains("send it again"));
        assert!(download.to_string().contains("status 502"));
    }
}
