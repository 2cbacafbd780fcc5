use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use stylecast_utils::{slugify, timestamp_label, unique_suffix};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collaborator::{CollaboratorError, CompletionRequest, InlineImage, TextCompletion};
use crate::guide::{StyleGuide, SubjectKind};
use crate::image::{ImageReadError, ImageSet, ReferenceImage};
use crate::pool::run_bounded;
use crate::prompts::{
    IMAGE_ANALYSIS_INSTRUCTION, SYSTEM_INSTRUCTION, named_subject_instruction,
    synthesis_instruction,
};

pub const DEFAULT_CONCURRENCY: usize = 4;
const IMAGE_SLUG_PREFIX: &str = "images";
const NAMED_FALLBACK_PREFIX: &str = "guide";
const SLUG_SUFFIX_LENGTH: usize = 4;

/// What to do when one reference image cannot be analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisFailurePolicy {
    /// Fail the whole synthesis with the first analysis error.
    #[default]
    AbortOnFirstFailure,
    /// Build the guide from the images that succeeded and report the rest.
    BestEffort,
}

impl FromStr for AnalysisFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort-on-first-failure" => Ok(Self::AbortOnFirstFailure),
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            other => Err(format!(
                "unknown analysis failure policy `{other}` (expected `abort` or `best-effort`)"
            )),
        }
    }
}

impl fmt::Display for AnalysisFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbortOnFirstFailure => f.write_str("abort"),
            Self::BestEffort => f.write_str("best-effort"),
        }
    }
}

/// One reference image the vision model could not describe.
#[derive(Debug, Error)]
#[error("analysis of image #{} ({id}) failed: {message}", .index + 1)]
pub struct ImageAnalysisError {
    /// Zero-based position in the supplied image set.
    pub index: usize,
    pub id: String,
    pub message: String,
    #[source]
    pub source: Option<CollaboratorError>,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("subject label is empty")]
    EmptySubject,
    #[error("no reference images were supplied")]
    NoImages,
    #[error("none of the {} reference images could be analysed", .failures.len())]
    NoUsableAnalyses { failures: Vec<ImageAnalysisError> },
    #[error("style guide request failed: {message}")]
    Completion {
        message: String,
        #[source]
        source: CollaboratorError,
    },
    #[error("model returned an empty style guide")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    ImageRead(#[from] ImageReadError),
    #[error(transparent)]
    ImageAnalysis(#[from] ImageAnalysisError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Outcome of image-based synthesis.
#[derive(Debug)]
pub struct ImageSynthesis {
    pub guide: StyleGuide,
    /// Number of analyses that fed the unified guide.
    pub analysed: usize,
    /// Images skipped under [`AnalysisFailurePolicy::BestEffort`].
    pub failures: Vec<ImageAnalysisError>,
}

/// Produces style guides from a named subject or from reference images.
pub struct StyleGuideSynthesizer<'a> {
    client: &'a dyn TextCompletion,
    model: String,
    policy: AnalysisFailurePolicy,
    concurrency: usize,
}

impl<'a> StyleGuideSynthesizer<'a> {
    pub fn new(client: &'a dyn TextCompletion, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            policy: AnalysisFailurePolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_policy(mut self, policy: AnalysisFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Generate a guide for a named artist or movement.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::EmptySubject`] for a blank label, and
    /// [`GenerationError::Completion`] or [`GenerationError::EmptyResponse`]
    /// when the model call fails or returns nothing.
    pub fn from_subject(
        &self,
        label: &str,
        kind: SubjectKind,
    ) -> Result<StyleGuide, SynthesisError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(GenerationError::EmptySubject.into());
        }

        info!(subject = label, %kind, model = %self.model, "generating style guide");
        let instruction = named_subject_instruction(label, kind);
        let body = self.complete_guide(&instruction)?;

        let slug = slugify(label).unwrap_or_else(|| {
            format!(
                "{NAMED_FALLBACK_PREFIX}-{}-{}",
                timestamp_label(),
                unique_suffix(SLUG_SUFFIX_LENGTH).to_ascii_lowercase()
            )
        });
        Ok(finish_guide(slug, body))
    }

    /// Analyse every image independently, then unify the analyses into one guide.
    ///
    /// # Errors
    ///
    /// Under [`AnalysisFailurePolicy::AbortOnFirstFailure`] the lowest-index
    /// analysis failure is returned as [`SynthesisError::ImageAnalysis`].
    /// [`GenerationError::NoUsableAnalyses`] is returned when no analysis
    /// succeeded, and the unification call fails like [`Self::from_subject`].
    pub fn from_images(&self, images: &ImageSet) -> Result<ImageSynthesis, SynthesisError> {
        if images.is_empty() {
            return Err(GenerationError::NoImages.into());
        }

        info!(
            images = images.len(),
            model = %self.model,
            policy = %self.policy,
            "analysing reference images"
        );

        let aborted = AtomicBool::new(false);
        let outcomes = run_bounded(images.len(), self.concurrency, "image-analysis", |index| {
            if self.policy == AnalysisFailurePolicy::AbortOnFirstFailure
                && aborted.load(Ordering::Relaxed)
            {
                return None;
            }
            let image = images.get(index)?;
            let outcome = self.analyse_image(index, image);
            if outcome.is_err() {
                aborted.store(true, Ordering::Relaxed);
            }
            Some(outcome)
        });

        let mut analyses = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(analysis) => analyses.push(analysis),
                Err(error) => {
                    warn!(index = error.index + 1, image = %error.id, "{}", error.message);
                    failures.push(error);
                }
            }
        }

        if self.policy == AnalysisFailurePolicy::AbortOnFirstFailure && !failures.is_empty() {
            return Err(failures.swap_remove(0).into());
        }
        if analyses.is_empty() {
            return Err(GenerationError::NoUsableAnalyses { failures }.into());
        }

        info!(analyses = analyses.len(), "synthesizing unified style guide");
        let body = self.complete_guide(&synthesis_instruction(&analyses))?;
        let slug = format!(
            "{IMAGE_SLUG_PREFIX}-{}-{}",
            timestamp_label(),
            unique_suffix(SLUG_SUFFIX_LENGTH).to_ascii_lowercase()
        );

        Ok(ImageSynthesis {
            guide: finish_guide(slug, body),
            analysed: analyses.len(),
            failures,
        })
    }

    fn analyse_image(
        &self,
        index: usize,
        image: &ReferenceImage,
    ) -> Result<String, ImageAnalysisError> {
        debug!(index = index + 1, image = image.id(), "requesting image analysis");
        let request = CompletionRequest::text(
            &self.model,
            SYSTEM_INSTRUCTION,
            IMAGE_ANALYSIS_INSTRUCTION,
        )
        .with_image(InlineImage {
            media_type: image.media_type(),
            data: image.data(),
        });

        match self.client.complete(request) {
            Ok(text) if !text.trim().is_empty() => {
                debug!(index = index + 1, image = image.id(), "image analysis complete");
                Ok(text)
            }
            Ok(_) => Err(ImageAnalysisError {
                index,
                id: image.id().to_string(),
                message: "model returned an empty analysis".to_string(),
                source: None,
            }),
            Err(source) => Err(ImageAnalysisError {
                index,
                id: image.id().to_string(),
                message: source.to_string(),
                source: Some(source),
            }),
        }
    }

    fn complete_guide(&self, instruction: &str) -> Result<String, GenerationError> {
        let request = CompletionRequest::text(&self.model, SYSTEM_INSTRUCTION, instruction);
        let text = self
            .client
            .complete(request)
            .map_err(|source| GenerationError::Completion {
                message: source.to_string(),
                source,
            })?;

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

fn finish_guide(slug: String, body: String) -> StyleGuide {
    let guide = StyleGuide::new(slug, body);
    let missing = guide.missing_sections();
    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        warn!(slug = guide.slug(), "style guide is missing sections: {names}");
    }
    guide
}
