//! Capabilities the pipelines depend on.
//!
//! Providers and storage backends implement these traits; the pipelines only
//! ever see the trait objects, never a provider's own request or error types.

use std::error::Error;
use std::path::PathBuf;

/// Opaque failure raised by a collaborator.
pub type CollaboratorError = Box<dyn Error + Send + Sync + 'static>;

/// Image content embedded inline in a completion request.
#[derive(Debug, Clone, Copy)]
pub struct InlineImage<'a> {
    pub media_type: &'a str,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Passed through to the provider untouched.
    pub model: &'a str,
    pub system_instruction: &'a str,
    pub user_content: &'a str,
    pub image: Option<InlineImage<'a>>,
}

impl<'a> CompletionRequest<'a> {
    pub fn text(model: &'a str, system_instruction: &'a str, user_content: &'a str) -> Self {
        Self {
            model,
            system_instruction,
            user_content,
            image: None,
        }
    }

    pub fn with_image(mut self, image: InlineImage<'a>) -> Self {
        self.image = Some(image);
        self
    }
}

/// Text (and optionally vision) completion.
pub trait TextCompletion: Send + Sync {
    fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    pub media_type: Option<String>,
}

/// Produces one image per call.
pub trait ImageGeneration: Send + Sync {
    fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, CollaboratorError>;
}

/// Persists generated artifacts and reports where they ended up.
pub trait ArtifactStore: Send + Sync {
    fn store(&self, index: usize, artifact: &ImageArtifact) -> Result<PathBuf, CollaboratorError>;
}

impl<T: TextCompletion + ?Sized> TextCompletion for Box<T> {
    fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CollaboratorError> {
        (**self).complete(request)
    }
}

impl<T: ImageGeneration + ?Sized> ImageGeneration for Box<T> {
    fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, CollaboratorError> {
        (**self).generate_image(prompt)
    }
}
