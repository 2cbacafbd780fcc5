use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collaborator::{ArtifactStore, ImageGeneration};
use crate::pool::run_bounded;
use crate::prompts::composed_prompt_text;
use crate::synthesizer::DEFAULT_CONCURRENCY;

pub const DEFAULT_IMAGE_COUNT: usize = 1;

/// Invalid inputs to prompt composition. Raised before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    #[error("style guide text is empty")]
    EmptyStyleGuide,
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("image count must be at least 1 (got {0})")]
    InvalidCount(usize),
}

/// A user prompt merged with a style guide, ready for an image model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt(String);

impl ComposedPrompt {
    pub fn new(style_guide: &str, user_prompt: &str) -> Result<Self, CompositionError> {
        if style_guide.trim().is_empty() {
            return Err(CompositionError::EmptyStyleGuide);
        }
        if user_prompt.trim().is_empty() {
            return Err(CompositionError::EmptyPrompt);
        }
        Ok(Self(composed_prompt_text(style_guide, user_prompt)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComposedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the N requests that did not produce a stored image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("image #{index} failed: {message}")]
pub struct GenerationFailure {
    /// One-based request number.
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    /// One-based request number.
    pub index: usize,
    pub location: PathBuf,
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error("{}", describe_total_failure(.failures))]
    Generation { failures: Vec<GenerationFailure> },
}

fn describe_total_failure(failures: &[GenerationFailure]) -> String {
    match failures {
        [single] => format!("image generation failed: {}", single.message),
        _ => format!("all {} image generation requests failed", failures.len()),
    }
}

/// Aggregate outcome of a batch of generation requests.
#[derive(Debug)]
pub struct GenerationReport {
    pub prompt: ComposedPrompt,
    pub requested: usize,
    pub saved: Vec<SavedArtifact>,
    pub failures: Vec<GenerationFailure>,
}

impl GenerationReport {
    pub fn succeeded(&self) -> usize {
        self.saved.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Merges a style guide with a prompt and fans the result out to the image model.
pub struct PromptComposer<'a> {
    generator: &'a dyn ImageGeneration,
    store: &'a dyn ArtifactStore,
    concurrency: usize,
}

impl<'a> PromptComposer<'a> {
    pub fn new(generator: &'a dyn ImageGeneration, store: &'a dyn ArtifactStore) -> Self {
        Self {
            generator,
            store,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Issue `count` independent generation requests with the same composed prompt.
    ///
    /// Failed requests are collected in the report. The call only fails as a
    /// whole when the inputs are invalid or when no request produced an image.
    ///
    /// # Errors
    ///
    /// [`ComposeError::Composition`] for an empty guide, an empty prompt or a
    /// zero count; nothing is requested in that case.
    /// [`ComposeError::Generation`] when every request failed.
    pub fn compose(
        &self,
        style_guide: &str,
        user_prompt: &str,
        count: usize,
    ) -> Result<GenerationReport, ComposeError> {
        if count < 1 {
            return Err(CompositionError::InvalidCount(count).into());
        }
        let prompt = ComposedPrompt::new(style_guide, user_prompt)?;

        info!(count, concurrency = self.concurrency, "requesting image generations");
        let outcomes = run_bounded(count, self.concurrency, "image-generation", |slot| {
            self.generate_one(slot + 1, prompt.as_str())
        });

        let mut saved = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(artifact) => saved.push(artifact),
                Err(failure) => failures.push(failure),
            }
        }

        if saved.is_empty() {
            return Err(ComposeError::Generation { failures });
        }

        info!(
            succeeded = saved.len(),
            failed = failures.len(),
            "image generation finished"
        );
        Ok(GenerationReport {
            prompt,
            requested: count,
            saved,
            failures,
        })
    }

    fn generate_one(&self, index: usize, prompt: &str) -> Result<SavedArtifact, GenerationFailure> {
        debug!(index, "requesting image");
        let artifact = self.generator.generate_image(prompt).map_err(|error| {
            warn!(index, %error, "image generation failed");
            GenerationFailure {
                index,
                message: error.to_string(),
            }
        })?;

        let location = self.store.store(index, &artifact).map_err(|error| {
            warn!(index, %error, "failed to save generated image");
            GenerationFailure {
                index,
                message: format!("failed to save image: {error}"),
            }
        })?;

        info!(index, location = %location.display(), "saved generated image");
        Ok(SavedArtifact { index, location })
    }
}
