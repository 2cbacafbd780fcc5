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

pub const DEFAULT_OPENAI_IMAGE_MODEL: &str = "gpt-image-1";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const IMAGE_DETAIL: &str = "high";

/// Reasoning models only accept the default temperature.
fn supports_temperature(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    !["o1", "o3", "o4", "gpt-5"]
        .iter()
        .any(|family| model.starts_with(family))
}

/// Map an aspect ratio onto the closest size the images endpoint accepts.
pub(crate) fn image_size(aspect_ratio: Option<&str>) -> Option<&'static str> {
    match aspect_ratio?.trim() {
        "1:1" => Some("1024x1024"),
        "16:9" | "3:2" | "4:3" => Some("1536x1024"),
        "9:16" | "2:3" | "3:4" => Some("1024x1536"),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

impl<'a> ChatRequest<'a> {
    pub(crate) fn new(model: &'a str, request: &CompletionRequest<'a>, temperature: f32) -> Self {
        let user_content = match request.image {
            None => MessageContent::Text(request.user_content),
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: request.user_content,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!(
                            "data:{};base64,{}",
                            image.media_type,
                            BASE64_STANDARD.encode(image.data)
                        ),
                        detail: IMAGE_DETAIL,
                    },
                },
            ]),
        };

        Self {
            model,
            temperature: supports_temperature(model).then_some(temperature),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(request.system_instruction),
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    pub(crate) fn text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .message
            .content
            .filter(|content| !content.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'static str>,
}

impl<'a> ImagesRequest<'a> {
    pub(crate) fn new(model: &'a str, prompt: &'a str, aspect_ratio: Option<&str>) -> Self {
        // DALL-E answers with URLs unless asked for inline data.
        let response_format = model
            .to_ascii_lowercase()
            .starts_with("dall-e")
            .then_some("b64_json");
        Self {
            model,
            prompt,
            n: 1,
            size: image_size(aspect_ratio),
            response_format,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl ImagesResponse {
    pub(crate) fn first_image(self) -> Option<String> {
        self.data.into_iter().find_map(|datum| datum.b64_json)
    }
}

/// OpenAI `chat/completions` for text/vision and `images/generations` for images.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    options: ClientOptions,
}

impl OpenAiClient {
    pub fn new(api_key: &str, options: ClientOptions) -> Result<Self, ProviderError> {
        let api_key = checked_api_key(ProviderKind::OpenAi, api_key)?;
        Ok(Self {
            http: http_client()?,
            api_key,
            options,
        })
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, ProviderError> {
        let url = format!("{OPENAI_API_BASE}/{path}");
        send_with_retry(ProviderKind::OpenAi, self.options.max_retries, || {
            self.http.post(&url).bearer_auth(&self.api_key).json(body)
        })
    }

    pub fn complete_text(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        let (_, model) = split_model_id(request.model);
        debug!(
            model,
            vision = request.image.is_some(),
            "sending OpenAI chat completion request"
        );

        let body = ChatRequest::new(model, &request, self.options.temperature);
        let response: ChatResponse = self.post("chat/completions", &body)?.json()?;

        response.text().ok_or(ProviderError::EmptyResponse {
            provider: ProviderKind::OpenAi,
            what: "text",
        })
    }

    pub fn generate(&self, prompt: &str) -> Result<ImageArtifact, ProviderError> {
        let (_, model) = split_model_id(&self.options.image_model);
        debug!(model, "sending OpenAI image generation request");

        let body = ImagesRequest::new(model, prompt, self.options.aspect_ratio.as_deref());
        let response: ImagesResponse = self.post("images/generations", &body)?.json()?;
        let encoded = response
            .first_image()
            .ok_or(ProviderError::EmptyResponse {
                provider: ProviderKind::OpenAi,
                what: "image",
            })?;

        Ok(ImageArtifact {
            bytes: BASE64_STANDARD.decode(encoded.trim())?,
            media_type: Some("image/png".to_string()),
        })
    }
}

impl TextCompletion for OpenAiClient {
    fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CollaboratorError> {
        Ok(self.complete_text(request)?)
    }
}

impl ImageGeneration for OpenAiClient {
    fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, CollaboratorError> {
        Ok(self.generate(prompt)?)
    }
}
