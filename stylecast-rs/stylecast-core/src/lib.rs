//! Style-guide synthesis and prompt composition.
//!
//! [`StyleGuideSynthesizer`] turns a named artist, a named movement, or a set
//! of reference images into a markdown [`StyleGuide`] through a
//! [`TextCompletion`] collaborator. [`PromptComposer`] later merges a guide
//! with a user prompt and requests N images from an [`ImageGeneration`]
//! collaborator, tolerating partial failure.

mod collaborator;
mod composer;
mod guide;
mod image;
mod pool;
pub mod prompts;
mod synthesizer;

pub use collaborator::{
    ArtifactStore, CollaboratorError, CompletionRequest, ImageArtifact, ImageGeneration,
    InlineImage, TextCompletion,
};
pub use composer::{
    ComposeError, ComposedPrompt, CompositionError, DEFAULT_IMAGE_COUNT, GenerationFailure,
    GenerationReport, PromptComposer, SavedArtifact,
};
pub use guide::{RequiredSection, StyleGuide, SubjectKind};
pub use image::{ImageReadError, ImageSet, ReferenceImage, sniff_media_type};
pub use synthesizer::{
    AnalysisFailurePolicy, DEFAULT_CONCURRENCY, GenerationError, ImageAnalysisError,
    ImageSynthesis, StyleGuideSynthesizer, SynthesisError,
};
