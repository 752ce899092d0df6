/// Gemini API client
///
/// Thin wrapper over the `models/{model}:generateContent` endpoint used for
/// both post text and illustrations. Every request goes through the retry
/// wrapper; interpreting the payload (fallbacks, image validation) is left to
/// the caller.

use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::content::GenerationError;
use crate::retry::{with_backoff, RetryPolicy};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: Option<String>,
}

/// Decoded binary payload of one response part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinePayload {
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        text_model: &str,
        image_model: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            text_model: text_model.to_string(),
            image_model: image_model.to_string(),
            retry,
        })
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let url = url.as_str();

        with_backoff(&self.retry, || async move {
            let response = self
                .http_client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(request)
                .send()
                .await?;

            let status = response.status();
            if status != StatusCode::OK {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(GenerationError::Status { status, body });
            }

            let body = response.text().await?;
            serde_json::from_str::<GenerateContentResponse>(&body).map_err(GenerationError::from)
        })
        .await
    }

    /// Generate text for `prompt`. Fails when the response has no text at all.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: None,
        };

        log::debug!("Requesting text from Gemini model {}", self.text_model);
        let response = self.generate_content(&self.text_model, &request).await?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(GenerationError::MissingField("candidates"))?;

        if let Some(reason) = &candidate.finish_reason {
            log::debug!("Gemini text finish_reason={}", reason);
        }

        let content = candidate
            .content
            .ok_or(GenerationError::MissingField("content"))?;

        let text: String = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::Empty);
        }

        Ok(text.to_string())
    }

    /// Generate an illustration for `prompt`.
    ///
    /// Returns every inline payload that base64-decodes to non-empty bytes, in
    /// response order. Whether the bytes are actually an image is for the
    /// caller to check.
    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<InlinePayload>, GenerationError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
        };

        log::info!("Sending image generation request to Gemini ({})", self.image_model);
        let response = self.generate_content(&self.image_model, &request).await?;

        let parts: Vec<ResponsePart> = response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .collect();

        if parts.is_empty() {
            return Err(GenerationError::MissingField("parts"));
        }

        log::info!("Received response with {} parts", parts.len());

        let total = parts.len();
        let payloads: Vec<InlinePayload> = parts
            .into_iter()
            .enumerate()
            .filter_map(|(i, part)| decode_part(i + 1, total, part))
            .collect();

        if payloads.is_empty() {
            return Err(GenerationError::NoImage);
        }

        Ok(payloads)
    }
}

fn decode_part(index: usize, total: usize, part: ResponsePart) -> Option<InlinePayload> {
    let Some(inline) = part.inline_data else {
        log::debug!("Part {}/{} has no inline data", index, total);
        return None;
    };

    let Some(data) = inline.data.filter(|d| !d.is_empty()) else {
        log::warn!("Part {}/{} has empty inline data", index, total);
        return None;
    };

    match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
        Ok(bytes) if !bytes.is_empty() => {
            log::info!("Decoded inline data from part {}: {} bytes", index, bytes.len());
            Some(InlinePayload {
                mime_type: inline.mime_type,
                bytes,
            })
        }
        Ok(_) => {
            log::warn!("Decoded inline data of part {} is empty", index);
            None
        }
        Err(e) => {
            log::warn!("Failed to decode inline data from part {}: {}", index, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn part(value: serde_json::Value) -> ResponsePart {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn image_request_asks_for_image_modality() {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: "draw".to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{"parts": [{"text": "draw"}]}],
                "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]}
            })
        );
    }

    #[test]
    fn decodes_base64_inline_data() {
        let decoded = decode_part(
            1,
            1,
            part(json!({"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}})),
        );

        assert_eq!(
            decoded,
            Some(InlinePayload {
                mime_type: Some("image/png".to_string()),
                bytes: b"hello".to_vec(),
            })
        );
    }

    #[test]
    fn skips_text_parts_and_garbage() {
        assert!(decode_part(1, 3, part(json!({"text": "here is your image"}))).is_none());
        assert!(decode_part(2, 3, part(json!({"inlineData": {"data": "%%%not base64"}}))).is_none());
        assert!(decode_part(3, 3, part(json!({"inlineData": {"mimeType": "image/png"}}))).is_none());
    }
}
