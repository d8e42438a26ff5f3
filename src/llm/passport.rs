//! Passport photo operations on top of the Gemini transport: compliance
//! analysis, background recoloring and costume replacement.
//!
//! Every failure collapses into one [`PhotoServiceError`] per operation; the
//! underlying cause is only logged.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::error;

use crate::config::{
    ANALYSIS_PROMPT, BACKGROUND_PROMPT_TEMPLATE, BLACK_SUIT_PROMPT, CONFIG, WHITE_SHIRT_PROMPT,
};
use crate::llm::gemini::{extract_first_image, extract_text, generate_content, inline_image_part};
use crate::utils::timing::log_llm_timing;
use crate::wizard::machine::{AnalysisResult, Enhancement};
use crate::wizard::order::{BackgroundColor, Costume};
use crate::wizard::upload::PhotoPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhotoServiceError {
    #[error("Failed to communicate with the AI analysis service.")]
    Analysis,
    #[error("Failed to communicate with the AI enhancement service.")]
    Enhancement,
    #[error("Failed to communicate with the AI costume change service.")]
    CostumeChange,
}

fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isValid": {
                "type": "BOOLEAN",
                "description": "Whether the photo is valid as a passport photo."
            },
            "issues": {
                "type": "ARRAY",
                "description": "A list of issues found with the photo. Should be empty if the photo is valid.",
                "items": { "type": "STRING" }
            }
        },
        "required": ["isValid", "issues"]
    })
}

fn build_analysis_payload(photo: &PhotoPayload) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(photo), { "text": ANALYSIS_PROMPT }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": analysis_schema()
        }
    })
}

fn build_edit_payload(photo: &PhotoPayload, prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(photo), { "text": prompt }]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"]
        }
    })
}

pub fn background_prompt(color: BackgroundColor) -> String {
    BACKGROUND_PROMPT_TEMPLATE.replace("{color}", &color.label().to_lowercase())
}

pub fn costume_prompt(costume: Costume) -> &'static str {
    match costume {
        Costume::WhiteShirt => WHITE_SHIRT_PROMPT,
        Costume::BlackSuit => BLACK_SUIT_PROMPT,
    }
}

/// Parses the model's JSON verdict. Tolerates a fenced ```json block even
/// though the schema asks for raw JSON.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    if unfenced.is_empty() {
        return Err(anyhow!("analysis response contained no text"));
    }
    let result: AnalysisResult = serde_json::from_str(unfenced)?;
    Ok(result.normalized())
}

async fn analyze(photo: &PhotoPayload) -> Result<AnalysisResult> {
    let model = CONFIG.gemini_analysis_model.as_str();
    let payload = build_analysis_payload(photo);
    log_llm_timing(
        "gemini",
        model,
        "analyze_passport_photo",
        Some(json!({ "imageBytes": photo.len() })),
        || async {
            let response = generate_content(model, payload).await?;
            parse_analysis(&extract_text(&response))
        },
    )
    .await
}

async fn edit(photo: &PhotoPayload, prompt: &str, operation: &str) -> Result<PhotoPayload> {
    let model = CONFIG.gemini_image_model.as_str();
    let payload = build_edit_payload(photo, prompt);
    log_llm_timing(
        "gemini",
        model,
        operation,
        Some(json!({ "imageBytes": photo.len() })),
        || async {
            let response = generate_content(model, payload).await?;
            extract_first_image(&response)
                .ok_or_else(|| anyhow!("No image data returned from {operation} (model: {model})"))
        },
    )
    .await
}

pub async fn analyze_passport_photo(
    photo: &PhotoPayload,
) -> Result<AnalysisResult, PhotoServiceError> {
    analyze(photo).await.map_err(|err| {
        error!("Error analyzing photo with Gemini: {err:#}");
        PhotoServiceError::Analysis
    })
}

pub async fn recolor_background(
    photo: &PhotoPayload,
    color: BackgroundColor,
) -> Result<PhotoPayload, PhotoServiceError> {
    let prompt = background_prompt(color);
    edit(photo, &prompt, "recolor_background")
        .await
        .map_err(|err| {
            error!(color = color.code(), "Error enhancing photo background with Gemini: {err:#}");
            PhotoServiceError::Enhancement
        })
}

pub async fn change_costume(
    photo: &PhotoPayload,
    costume: Costume,
) -> Result<PhotoPayload, PhotoServiceError> {
    edit(photo, costume_prompt(costume), "change_costume")
        .await
        .map_err(|err| {
            error!(costume = costume.code(), "Error changing costume with Gemini: {err:#}");
            PhotoServiceError::CostumeChange
        })
}

pub async fn enhance(
    photo: &PhotoPayload,
    enhancement: Enhancement,
) -> Result<PhotoPayload, PhotoServiceError> {
    match enhancement {
        Enhancement::Background(color) => recolor_background(photo, color).await,
        Enhancement::Costume(costume) => change_costume(photo, costume).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_verdict_with_empty_issues() {
        let result = parse_analysis(r#"{"isValid": true, "issues": []}"#).unwrap();
        assert!(result.is_valid);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn parses_fenced_json_with_issues_in_order() {
        let raw = "```json\n{\"isValid\": false, \"issues\": [\"Background is patterned\", \"Subject wears sunglasses\"]}\n```";
        let result = parse_analysis(raw).unwrap();
        assert!(!result.is_valid);
        assert_eq!(
            result.issues,
            vec!["Background is patterned", "Subject wears sunglasses"]
        );
    }

    #[test]
    fn valid_verdict_never_carries_issues() {
        let result =
            parse_analysis(r#"{"isValid": true, "issues": ["Minor shadow"]}"#).unwrap();
        assert!(result.issues.is_empty());
    }

    #[test]
    fn malformed_or_empty_verdicts_are_errors() {
        assert!(parse_analysis("").is_err());
        assert!(parse_analysis("The photo looks fine.").is_err());
        assert!(parse_analysis(r#"{"issues": []}"#).is_err());
    }

    #[test]
    fn background_prompt_names_the_color_in_lowercase() {
        let prompt = background_prompt(BackgroundColor::Blue);
        assert!(prompt.contains("solid, plain, blue color"));
        assert!(!prompt.contains("{color}"));
    }

    #[test]
    fn costume_prompts_preserve_face_and_background() {
        for costume in Costume::ALL {
            let prompt = costume_prompt(costume);
            assert!(prompt.contains("Preserve the person's head, face, and the existing background"));
        }
        assert!(costume_prompt(Costume::BlackSuit).contains("black suit jacket"));
    }

    #[test]
    fn analysis_payload_requests_json_schema() {
        let photo = PhotoPayload::new(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "image/png");
        let payload = build_analysis_payload(&photo);
        assert_eq!(payload["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            payload["generationConfig"]["responseSchema"]["required"],
            json!(["isValid", "issues"])
        );
        assert_eq!(payload["contents"][0]["parts"][1]["text"], ANALYSIS_PROMPT);

        let edit = build_edit_payload(&photo, "recolor");
        assert_eq!(edit["generationConfig"]["responseModalities"], json!(["IMAGE"]));
    }
}
