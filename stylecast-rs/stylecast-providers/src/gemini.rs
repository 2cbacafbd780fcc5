use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use stylecast_core::{
    CollaboratorError, CompletionRequest, ImageArtifact, ImageGeneration, TextCompletion,
};
use tracing::debug;

use crate::{
    ClientOptions, ProviderError, ProviderKind, checked_api_key, http_client, send_with_retry,
    split_model_id,
};

pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub(crate) fn generate_content_url(model: &str) -> String {
    format!("{GEMINI_API_BASE}/models/{model}:generateContent")
}

pub(crate) fn predict_url(model: &str) -> String {
    format!("{GEMINI_API_BASE}/models/{model}:predict")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

impl<'a> GenerateContentRequest<'a> {
    pub(crate) fn new(request: &CompletionRequest<'a>, temperature: f32) -> Self {
        let mut parts = vec![Part::Text {
            text: request.user_content,
        }];
        if let Some(image) = request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.media_type,
                    data: BASE64_STANDARD.encode(image.data),
                },
            });
        }

        Self {
            system_instruction: SystemInstruction {
                parts: vec![Part::Text {
                    text: request.system_instruction,
                }],
            },
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub(crate) fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters<'a>,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct Parameters<'a> {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    #[serde(rename = "aspectRatio", skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
}

impl<'a> PredictRequest<'a> {
    /// One image per request; batching is done by issuing several requests.
    pub(crate) fn new(prompt: &'a str, aspect_ratio: Option<&'a str>) -> Self {
        Self {
            instances: vec![Instance { prompt }],
            parameters: Parameters {
                sample_count: 1,
                aspect_ratio,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    #[serde(default)]
    pub(crate) predictions: Vec<PredictPrediction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictPrediction {
    #[serde(rename = "bytesBase64Encoded")]
    pub(crate) bytes_base64_encoded: Option<String>,
    #[serde(rename = "mimeType")]
    pub(crate) mime_type: Option<String>,
}

/// Gemini `generateContent` for text/vision and Imagen `predict` for images.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    options: ClientOptions,
}

impl GeminiClient {
    pub fn new(api_key: &str, options: ClientOptions) -> Result<Self, ProviderError> {
        let api_key = checked_api_key(ProviderKind::Gemini, api_key)?;
        Ok(Self {
            http: http_client()?,
            api_key,
            options,
        })
    }

    fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<Response, ProviderError> {
        send_with_retry(ProviderKind::Gemini, self.options.max_retries, || {
            self.http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
        })
    }

    pub fn complete_text(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        let (_, model) = split_model_id(request.model);
        debug!(
            model,
            vision = request.image.is_some(),
            "sending Gemini generateContent request"
        );

        let body = GenerateContentRequest::new(&request, self.options.temperature);
        let response: GenerateContentResponse =
            self.post(&generate_content_url(model), &body)?.json()?;

        response.text().ok_or(ProviderError::EmptyResponse {
            provider: ProviderKind::Gemini,
            what: "text",
        })
    }

    /// Submit a single-image request to the configured Imagen model.
    pub fn generate(&self, prompt: &str) -> Result<ImageArtifact, ProviderError> {
        let (_, model) = split_model_id(&self.options.image_model);
        debug!(model, "sending Imagen predict request");

        let body = PredictRequest::new(prompt, self.options.aspect_ratio.as_deref());
        let response: PredictResponse = self.post(&predict_url(model), &body)?.json()?;

        let (encoded, mime_type) = response
            .predictions
            .into_iter()
            .find_map(|prediction| {
                prediction
                    .bytes_base64_encoded
                    .map(|encoded| (encoded, prediction.mime_type))
            })
            .ok_or(ProviderError::EmptyResponse {
                provider: ProviderKind::Gemini,
                what: "image",
            })?;

        Ok(ImageArtifact {
            bytes: BASE64_STANDARD.decode(encoded.trim())?,
            media_type: mime_type,
        })
    }
}

impl TextCompletion for GeminiClient {
    fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CollaboratorError> {
        Ok(self.complete_text(request)?)
    }
}

impl ImageGeneration for GeminiClient {
    fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, CollaboratorError> {
        Ok(self.generate(prompt)?)
    }
}
