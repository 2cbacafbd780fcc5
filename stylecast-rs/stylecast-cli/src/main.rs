use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use stylecast_config::{Config, api_key_from_env, load_or_init};
use stylecast_core::{
    ComposeError, ComposedPrompt, DEFAULT_IMAGE_COUNT, ImageSet, PromptComposer,
    StyleGuideSynthesizer,
};
use stylecast_providers::{image_client, text_client};
use stylecast_storage::{GuideStore, ImageDirectory, read_style_guide};
use stylecast_utils::ImageNameContext;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod task;

use task::{GenerateTask, GuideSource, GuideTask, ModelChoice, Task};

const LOG_ENV_VAR: &str = "STYLECAST_LOG";
const QUIET_DEPENDENCIES: &str = "reqwest=warn,hyper=warn,hyper_util=warn";

/// stylecast CLI entry point.
///
/// Writes markdown style guides for a named artist, a named movement, or a set
/// of reference images, and renders new images from a prompt in the style a
/// guide describes.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "stylecast",
    author,
    version,
    about = "Capture an artistic style in a guide, then paint new prompts with it.",
    long_about = None
)]
struct Cli {
    /// Raise log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Generate a markdown style guide.
    Guide(GuideArgs),
    /// Generate images from a prompt in the style of a saved guide.
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("subject")
        .required(true)
        .args(["artist", "style", "images"])
))]
struct GuideArgs {
    /// Artist whose style the guide should capture.
    #[arg(long, value_name = "NAME")]
    artist: Option<String>,
    /// Artistic style or movement the guide should capture.
    #[arg(long, value_name = "NAME")]
    style: Option<String>,
    /// Comma-separated reference images to distil a shared style from.
    #[arg(long, value_name = "PATHS", value_delimiter = ',', num_args = 1..)]
    images: Vec<PathBuf>,
    /// Text model, optionally prefixed with its provider (`openai/gpt-4o`).
    #[arg(long, value_name = "MODEL")]
    model: Option<String>,
    /// Provider for the text model (`gemini` or `openai`).
    #[arg(long, value_name = "PROVIDER")]
    provider: Option<String>,
    /// Keep going when some reference images cannot be analysed.
    #[arg(long)]
    best_effort: bool,
    /// Directory the guide is written to.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Overwrite an existing guide with the same name.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    /// Style guide written by `stylecast guide`.
    #[arg(long, value_name = "PATH")]
    style_guide: PathBuf,
    /// Number of images to request.
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_IMAGE_COUNT)]
    number: usize,
    /// Image model, optionally prefixed with its provider (`gemini/imagen-4.0-generate-001`).
    #[arg(long, value_name = "MODEL")]
    image_model: Option<String>,
    /// Provider for the image model (`gemini` or `openai`).
    #[arg(long, value_name = "PROVIDER")]
    image_provider: Option<String>,
    /// Directory generated images are written to.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Print the composed prompt without requesting any image.
    #[arg(long)]
    dry_run: bool,
    /// What the images should depict.
    #[arg(value_name = "PROMPT", required = true, num_args = 1..)]
    prompt: Vec<String>,
}

#[derive(Debug, Default)]
struct RunContext {
    config: Config,
    infos: Vec<String>,
    warnings: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    let context = load_context();
    init_logging(cli.verbose, &context.config.log_level);

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(error) if error.not_found() => {}
        Err(error) => warn!("failed to read .env file ({error})"),
    }
    for message in &context.infos {
        info!("{message}");
    }
    for warning in &context.warnings {
        warn!("{warning}");
    }

    match execute(cli.command, &context.config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_context() -> RunContext {
    let mut infos = Vec::new();
    let mut warnings = Vec::new();

    let config = match load_or_init() {
        Ok(outcome) => {
            if outcome.created {
                infos.push(format!(
                    "Created stylecast configuration at {}",
                    outcome.path.display()
                ));
            } else if outcome.updated {
                infos.push(format!(
                    "Added missing settings to {}",
                    outcome.path.display()
                ));
            }
            outcome.config
        }
        Err(error) => {
            warnings.push(format!(
                "failed to load stylecast configuration ({error}); falling back to defaults"
            ));
            Config::default()
        }
    };

    RunContext {
        config,
        infos,
        warnings,
    }
}

fn log_directives(verbose: u8, configured_level: &str) -> String {
    let level = match verbose {
        0 => match configured_level.trim() {
            "" => "info",
            level => level,
        },
        1 => "debug",
        _ => "trace",
    };
    format!("{level},{QUIET_DEPENDENCIES}")
}

fn init_logging(verbose: u8, configured_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(log_directives(verbose, configured_level)))
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{QUIET_DEPENDENCIES}")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(command: Command, config: &Config) -> Result<()> {
    match Task::resolve(command, config)? {
        Task::Guide(task) => run_guide(&task),
        Task::Generate(task) => run_generate(&task),
    }
}

fn api_key_for(model: &ModelChoice) -> Result<String> {
    api_key_from_env(&model.api_key_env_var).ok_or_else(|| {
        anyhow!(
            "{} is not set; export it or add it to a .env file to use {}",
            model.api_key_env_var,
            model.provider
        )
    })
}

fn run_guide(task: &GuideTask) -> Result<()> {
    let api_key = api_key_for(&task.model)?;
    let client = text_client(task.model.provider, &api_key, task.client_options())?;
    let synthesizer = StyleGuideSynthesizer::new(&*client, task.model.model.as_str())
        .with_policy(task.policy)
        .with_concurrency(task.concurrency);

    let guide = match &task.source {
        GuideSource::Subject { label, kind } => synthesizer.from_subject(label, *kind)?,
        GuideSource::Images(paths) => {
            let images = ImageSet::from_paths(paths)?;
            let synthesis = synthesizer.from_images(&images)?;
            for failure in &synthesis.failures {
                eprintln!("Warning: {failure}");
            }
            info!(
                analysed = synthesis.analysed,
                skipped = synthesis.failures.len(),
                "unified reference image analyses"
            );
            synthesis.guide
        }
    };

    let store = GuideStore::new(&task.output_dir);
    let path = store
        .write(&guide, task.write_mode)
        .with_context(|| format!("failed to save style guide `{}`", guide.slug()))?;
    println!("{}", path.display());
    Ok(())
}

fn run_generate(task: &GenerateTask) -> Result<()> {
    let guide = read_style_guide(&task.style_guide)?;

    if task.dry_run {
        let prompt = ComposedPrompt::new(guide.body(), &task.prompt)?;
        println!("{prompt}");
        return Ok(());
    }

    let api_key = api_key_for(&task.model)?;
    let generator = image_client(task.model.provider, &api_key, task.client_options())?;
    let images = ImageDirectory::new(
        &task.output_dir,
        ImageNameContext::from_prompt(&task.prompt),
    );
    let composer =
        PromptComposer::new(&*generator, &images).with_concurrency(task.concurrency);

    let report = composer
        .compose(guide.body(), &task.prompt, task.count)
        .inspect_err(|error| {
            if let ComposeError::Generation { failures } = error {
                for failure in failures {
                    eprintln!("Warning: {failure}");
                }
            }
        })?;

    for saved in &report.saved {
        println!("{}", saved.location.display());
    }
    for failure in &report.failures {
        eprintln!("Warning: {failure}");
    }
    if !report.is_complete() {
        warn!(
            succeeded = report.succeeded(),
            requested = report.requested,
            "some images could not be generated"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests;
