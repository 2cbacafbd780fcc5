use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use stylecast_config::Config;
use stylecast_core::{AnalysisFailurePolicy, SubjectKind};
use stylecast_providers::{ClientOptions, ProviderKind, split_model_id};
use stylecast_storage::WriteMode;
use stylecast_utils::trimmed_or_none;

use crate::{Command, GenerateArgs, GuideArgs};

/// Validated unit of work, resolved from flags and configuration before any
/// collaborator is built.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Task {
    Guide(GuideTask),
    Generate(GenerateTask),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GuideSource {
    Subject { label: String, kind: SubjectKind },
    Images(Vec<PathBuf>),
}

/// Provider, model identifier and key variable for one collaborator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModelChoice {
    pub(crate) provider: ProviderKind,
    pub(crate) model: String,
    pub(crate) api_key_env_var: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GuideTask {
    pub(crate) source: GuideSource,
    pub(crate) model: ModelChoice,
    pub(crate) policy: AnalysisFailurePolicy,
    pub(crate) output_dir: PathBuf,
    pub(crate) write_mode: WriteMode,
    pub(crate) concurrency: usize,
    pub(crate) max_retries: u32,
    pub(crate) temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GenerateTask {
    pub(crate) style_guide: PathBuf,
    pub(crate) prompt: String,
    pub(crate) count: usize,
    pub(crate) model: ModelChoice,
    pub(crate) output_dir: PathBuf,
    pub(crate) dry_run: bool,
    pub(crate) concurrency: usize,
    pub(crate) max_retries: u32,
    pub(crate) aspect_ratio: Option<String>,
}

impl Task {
    pub(crate) fn resolve(command: Command, config: &Config) -> Result<Self> {
        match command {
            Command::Guide(args) => GuideTask::resolve(args, config).map(Task::Guide),
            Command::Generate(args) => GenerateTask::resolve(args, config).map(Task::Generate),
        }
    }
}

impl GuideTask {
    fn resolve(args: GuideArgs, config: &Config) -> Result<Self> {
        let GuideArgs {
            artist,
            style,
            images,
            model,
            provider,
            best_effort,
            output_dir,
            force,
        } = args;

        let images = image_paths(images);
        let source = match (artist, style) {
            (Some(label), _) => subject_source(label, SubjectKind::Artist)?,
            (None, Some(label)) => subject_source(label, SubjectKind::Style)?,
            (None, None) if !images.is_empty() => GuideSource::Images(images),
            (None, None) => bail!("one of --artist, --style or --images is required"),
        };

        let policy = if best_effort {
            AnalysisFailurePolicy::BestEffort
        } else {
            config
                .analysis_failure_policy
                .parse()
                .map_err(|message: String| anyhow!(message))
                .context("invalid analysis_failure_policy in configuration")?
        };

        let model = resolve_model(
            model.as_deref(),
            provider.as_deref(),
            &config.text.model,
            &config.text.provider,
            &config.text.api_key_env_var,
        )
        .context("could not resolve the style guide model")?;

        Ok(Self {
            source,
            model,
            policy,
            output_dir: output_dir.unwrap_or_else(|| PathBuf::from(&config.style_guide_dir)),
            write_mode: if force {
                WriteMode::Overwrite
            } else {
                WriteMode::KeepExisting
            },
            concurrency: config.max_concurrency.max(1),
            max_retries: config.max_retries,
            temperature: config.text.temperature as f32,
        })
    }

    pub(crate) fn client_options(&self) -> ClientOptions {
        ClientOptions {
            max_retries: self.max_retries,
            temperature: self.temperature,
            aspect_ratio: None,
            ..ClientOptions::for_provider(self.model.provider)
        }
    }
}

impl GenerateTask {
    fn resolve(args: GenerateArgs, config: &Config) -> Result<Self> {
        let GenerateArgs {
            style_guide,
            number,
            image_model,
            image_provider,
            output_dir,
            dry_run,
            prompt,
        } = args;

        let prompt = prompt.join(" ");
        if prompt.trim().is_empty() {
            bail!("the image prompt must not be empty");
        }
        if number < 1 {
            bail!("--number must be at least 1");
        }

        // Switching provider without naming a model picks that provider's default.
        let switched_provider = image_provider
            .as_deref()
            .and_then(|flag| flag.parse::<ProviderKind>().ok())
            .filter(|kind| image_model.is_none() && !same_provider(*kind, &config.image.provider));
        let configured_model = match switched_provider {
            Some(kind) => kind.default_image_model().to_string(),
            None => config.image.model.clone(),
        };

        let model = resolve_model(
            image_model.as_deref(),
            image_provider.as_deref(),
            &configured_model,
            &config.image.provider,
            &config.image.api_key_env_var,
        )
        .context("could not resolve the image model")?;

        Ok(Self {
            style_guide,
            prompt,
            count: number,
            model,
            output_dir: output_dir.unwrap_or_else(|| PathBuf::from(&config.image_output_dir)),
            dry_run,
            concurrency: config.max_concurrency.max(1),
            max_retries: config.max_retries,
            aspect_ratio: trimmed_or_none(Some(config.image.aspect_ratio.as_str()))
                .map(str::to_string),
        })
    }

    pub(crate) fn client_options(&self) -> ClientOptions {
        ClientOptions {
            max_retries: self.max_retries,
            image_model: self.model.model.clone(),
            aspect_ratio: self.aspect_ratio.clone(),
            ..ClientOptions::for_provider(self.model.provider)
        }
    }
}

fn subject_source(label: String, kind: SubjectKind) -> Result<GuideSource> {
    match trimmed_or_none(Some(label.as_str())) {
        Some(trimmed) => Ok(GuideSource::Subject {
            label: trimmed.to_string(),
            kind,
        }),
        None => bail!("the {kind} name must not be empty"),
    }
}

/// Trim each `--images` entry and drop the empty ones left by stray commas.
fn image_paths(images: Vec<PathBuf>) -> Vec<PathBuf> {
    images
        .into_iter()
        .filter_map(|path| match path.to_str() {
            Some(raw) => trimmed_or_none(Some(raw)).map(PathBuf::from),
            None => Some(path),
        })
        .collect()
}

fn same_provider(kind: ProviderKind, configured: &str) -> bool {
    configured.parse::<ProviderKind>().ok() == Some(kind)
}

/// Pick the provider for a model: an explicit flag wins, then a
/// `provider/model` prefix or a known model family, then the configured
/// provider. The configured key variable is only reused for the configured
/// provider.
fn resolve_model(
    model_flag: Option<&str>,
    provider_flag: Option<&str>,
    configured_model: &str,
    configured_provider: &str,
    configured_key_var: &str,
) -> Result<ModelChoice> {
    let model = trimmed_or_none(model_flag)
        .or_else(|| trimmed_or_none(Some(configured_model)))
        .ok_or_else(|| anyhow!("no model configured"))?
        .to_string();

    let provider = match trimmed_or_none(provider_flag) {
        Some(flag) => flag.parse::<ProviderKind>()?,
        None => match split_model_id(&model) {
            (Some(kind), _) => kind,
            (None, _) => configured_provider.parse::<ProviderKind>()?,
        },
    };

    let api_key_env_var = match trimmed_or_none(Some(configured_key_var)) {
        Some(var) if same_provider(provider, configured_provider) => var.to_string(),
        _ => provider.default_api_key_env_var().to_string(),
    };

    Ok(ModelChoice {
        provider,
        model,
        api_key_env_var,
    })
}
