use super::*;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use stylecast_core::{AnalysisFailurePolicy, SubjectKind};
use stylecast_providers::ProviderKind;
use stylecast_storage::WriteMode;

static TEST_MUTEX: Mutex<()> = Mutex::new(());
static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

const UNSET_KEY_VAR: &str = "STYLECAST_CLI_TEST_UNSET_KEY";

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments parse")
}

fn resolve(args: &[&str], config: &Config) -> anyhow::Result<Task> {
    Task::resolve(parse(args).command, config)
}

fn guide_task(args: &[&str], config: &Config) -> GuideTask {
    match resolve(args, config).expect("task resolves") {
        Task::Guide(task) => task,
        other => panic!("expected a guide task, got {other:?}"),
    }
}

fn generate_task(args: &[&str], config: &Config) -> GenerateTask {
    match resolve(args, config).expect("task resolves") {
        Task::Generate(task) => task,
        other => panic!("expected a generate task, got {other:?}"),
    }
}

#[test]
fn guide_for_artist_uses_configured_text_model() {
    let task = guide_task(
        &["stylecast", "guide", "--artist", "  J. M. W. Turner "],
        &Config::default(),
    );

    assert_eq!(
        task.source,
        GuideSource::Subject {
            label: "J. M. W. Turner".to_string(),
            kind: SubjectKind::Artist,
        }
    );
    assert_eq!(task.model.provider, ProviderKind::OpenAi);
    assert_eq!(task.model.model, "gpt-4o-mini");
    assert_eq!(task.model.api_key_env_var, "OPENAI_API_KEY");
    assert_eq!(task.policy, AnalysisFailurePolicy::AbortOnFirstFailure);
    assert_eq!(task.write_mode, WriteMode::KeepExisting);
    assert_eq!(task.output_dir, PathBuf::from("style-guides"));
}

#[test]
fn guide_subject_flags_are_exclusive_and_required() {
    assert!(Cli::try_parse_from(["stylecast", "guide"]).is_err());
    assert!(
        Cli::try_parse_from(["stylecast", "guide", "--artist", "Monet", "--style", "Cubism"])
            .is_err()
    );
    assert!(
        Cli::try_parse_from(["stylecast", "guide", "--style", "Cubism", "--images", "a.png"])
            .is_err()
    );
}

#[test]
fn blank_subject_is_rejected() {
    let error = resolve(&["stylecast", "guide", "--style", "   "], &Config::default())
        .expect_err("blank style");
    assert!(error.to_string().contains("style name must not be empty"));
}

#[test]
fn images_are_split_on_commas() {
    let task = guide_task(
        &[
            "stylecast",
            "guide",
            "--images",
            "one.png,two.jpg",
            "--best-effort",
            "--force",
            "--output-dir",
            "out",
        ],
        &Config::default(),
    );

    assert_eq!(
        task.source,
        GuideSource::Images(vec![PathBuf::from("one.png"), PathBuf::from("two.jpg")])
    );
    assert_eq!(task.policy, AnalysisFailurePolicy::BestEffort);
    assert_eq!(task.write_mode, WriteMode::Overwrite);
    assert_eq!(task.output_dir, PathBuf::from("out"));
}

#[test]
fn image_paths_are_trimmed_and_blank_entries_dropped() {
    let task = guide_task(
        &["stylecast", "guide", "--images", "one.png, two.jpg , "],
        &Config::default(),
    );
    assert_eq!(
        task.source,
        GuideSource::Images(vec![PathBuf::from("one.png"), PathBuf::from("two.jpg")])
    );

    let error = resolve(&["stylecast", "guide", "--images", " , "], &Config::default())
        .expect_err("only blank image paths");
    assert!(error.to_string().contains("--images"));
}

#[test]
fn configured_failure_policy_is_honoured() {
    let mut config = Config::default();
    config.analysis_failure_policy = "best-effort".to_string();
    let task = guide_task(&["stylecast", "guide", "--images", "a.png"], &config);
    assert_eq!(task.policy, AnalysisFailurePolicy::BestEffort);

    config.analysis_failure_policy = "sometimes".to_string();
    let error = resolve(&["stylecast", "guide", "--images", "a.png"], &config)
        .expect_err("invalid policy");
    assert!(format!("{error:#}").contains("analysis_failure_policy"));
}

#[test]
fn model_family_selects_provider_and_key() {
    let task = guide_task(
        &["stylecast", "guide", "--style", "Bauhaus", "--model", "gemini-2.5-flash"],
        &Config::default(),
    );
    assert_eq!(task.model.provider, ProviderKind::Gemini);
    assert_eq!(task.model.model, "gemini-2.5-flash");
    assert_eq!(task.model.api_key_env_var, "GEMINI_API_KEY");

    let task = guide_task(
        &["stylecast", "guide", "--style", "Bauhaus", "--model", "openai/gpt-5-mini"],
        &Config::default(),
    );
    assert_eq!(task.model.provider, ProviderKind::OpenAi);
    assert_eq!(task.model.model, "openai/gpt-5-mini");
    assert_eq!(task.model.api_key_env_var, "OPENAI_API_KEY");
}

#[test]
fn provider_flag_overrides_inference() {
    let mut config = Config::default();
    config.text.api_key_env_var = "MY_OPENAI_KEY".to_string();

    let task = guide_task(
        &[
            "stylecast",
            "guide",
            "--artist",
            "Hokusai",
            "--model",
            "custom-vision",
            "--provider",
            "openai",
        ],
        &config,
    );
    assert_eq!(task.model.provider, ProviderKind::OpenAi);
    assert_eq!(task.model.api_key_env_var, "MY_OPENAI_KEY");

    let error = resolve(
        &["stylecast", "guide", "--artist", "Hokusai", "--provider", "replicate"],
        &config,
    )
    .expect_err("unknown provider");
    assert!(format!("{error:#}").contains("replicate"));
}

#[test]
fn generate_joins_prompt_words() {
    let task = generate_task(
        &[
            "stylecast",
            "generate",
            "--style-guide",
            "style-guides/turner.md",
            "-n",
            "3",
            "a",
            "lighthouse",
            "at",
            "dusk",
        ],
        &Config::default(),
    );

    assert_eq!(task.prompt, "a lighthouse at dusk");
    assert_eq!(task.count, 3);
    assert_eq!(task.style_guide, PathBuf::from("style-guides/turner.md"));
    assert_eq!(task.model.provider, ProviderKind::Gemini);
    assert_eq!(task.model.model, "imagen-4.0-generate-001");
    assert_eq!(task.output_dir, PathBuf::from("images"));
    assert_eq!(task.aspect_ratio.as_deref(), Some("1:1"));
    assert!(!task.dry_run);

    let options = task.client_options();
    assert_eq!(options.image_model, "imagen-4.0-generate-001");
    assert_eq!(options.max_retries, 2);
}

#[test]
fn generate_rejects_zero_count_and_blank_prompt() {
    let config = Config::default();
    let error = resolve(
        &["stylecast", "generate", "--style-guide", "g.md", "--number", "0", "cat"],
        &config,
    )
    .expect_err("zero count");
    assert!(error.to_string().contains("--number"));

    let error = resolve(&["stylecast", "generate", "--style-guide", "g.md", "  "], &config)
        .expect_err("blank prompt");
    assert!(error.to_string().contains("prompt must not be empty"));

    assert!(Cli::try_parse_from(["stylecast", "generate", "--style-guide", "g.md"]).is_err());
}

#[test]
fn switching_image_provider_uses_its_default_model() {
    let task = generate_task(
        &[
            "stylecast",
            "generate",
            "--style-guide",
            "g.md",
            "--image-provider",
            "openai",
            "cat",
        ],
        &Config::default(),
    );
    assert_eq!(task.model.provider, ProviderKind::OpenAi);
    assert_eq!(task.model.model, "gpt-image-1");
    assert_eq!(task.model.api_key_env_var, "OPENAI_API_KEY");
}

#[test]
fn verbosity_raises_log_level() {
    assert_eq!(log_directives(0, "warn"), format!("warn,{QUIET_DEPENDENCIES}"));
    assert_eq!(log_directives(0, " "), format!("info,{QUIET_DEPENDENCIES}"));
    assert_eq!(log_directives(1, "warn"), format!("debug,{QUIET_DEPENDENCIES}"));
    assert_eq!(log_directives(3, "warn"), format!("trace,{QUIET_DEPENDENCIES}"));

    let cli = parse(&["stylecast", "guide", "-vv", "--artist", "Monet"]);
    assert_eq!(cli.verbose, 2);
}

#[test]
fn dry_run_needs_no_api_key() {
    let dir = unique_temp_dir();
    let guide_path = dir.join("turner.md");
    fs::write(&guide_path, "# Turner\n\n## Mood\nStormy.\n").expect("write guide");

    let mut config = Config::default();
    config.image.api_key_env_var = UNSET_KEY_VAR.to_string();
    let guide_arg = guide_path.to_string_lossy().into_owned();
    let cli = parse(&[
        "stylecast",
        "generate",
        "--style-guide",
        &guide_arg,
        "--dry-run",
        "a",
        "harbour",
    ]);

    execute(cli.command, &config).expect("dry run succeeds");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_api_key_fails_before_any_request() {
    let dir = unique_temp_dir();
    let guide_path = dir.join("turner.md");
    fs::write(&guide_path, "# Turner\n").expect("write guide");

    let mut config = Config::default();
    config.image.api_key_env_var = UNSET_KEY_VAR.to_string();
    let guide_arg = guide_path.to_string_lossy().into_owned();
    let cli = parse(&["stylecast", "generate", "--style-guide", &guide_arg, "cat"]);

    let error = execute(cli.command, &config).expect_err("missing key");
    assert!(error.to_string().contains(UNSET_KEY_VAR));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_style_guide_is_reported() {
    let dir = unique_temp_dir();
    let guide_arg = dir.join("absent.md").to_string_lossy().into_owned();
    let cli = parse(&[
        "stylecast",
        "generate",
        "--style-guide",
        &guide_arg,
        "--dry-run",
        "cat",
    ]);

    let error = execute(cli.command, &Config::default()).expect_err("missing guide");
    assert!(error.to_string().contains("style guide not found"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn load_context_creates_default_config() {
    with_isolated_home(|home| {
        let context = load_context();

        assert_eq!(context.config, Config::default());
        assert!(context.warnings.is_empty());
        assert!(
            context
                .infos
                .iter()
                .any(|info| info.contains("Created stylecast configuration"))
        );
        assert!(home.join(".stylecast").join("config.toml").exists());

        let second = load_context();
        assert!(second.infos.is_empty());
        assert!(second.warnings.is_empty());
    });
}

#[test]
fn load_context_falls_back_to_defaults_on_invalid_file() {
    with_isolated_home(|home| {
        let config_dir = home.join(".stylecast");
        fs::create_dir_all(&config_dir).expect("create config dir");
        fs::write(config_dir.join("config.toml"), "max_retries = [")
            .expect("write broken config");

        let context = load_context();
        assert_eq!(context.config, Config::default());
        assert!(
            context
                .warnings
                .iter()
                .any(|warning| warning.contains("falling back to defaults"))
        );
    });
}

fn unique_temp_dir() -> PathBuf {
    let id = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "stylecast-cli-test-{}-{}",
        std::process::id(),
        id
    ));
    fs::create_dir_all(&path).expect("create unique test directory");
    path
}

fn with_isolated_home<F>(func: F)
where
    F: FnOnce(&Path),
{
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp_home = create_unique_home();
    let snapshot = EnvSnapshot::capture();
    set_home_env(&temp_home);

    func(&temp_home);

    snapshot.restore();
    let _ = fs::remove_dir_all(&temp_home);
}

fn create_unique_home() -> PathBuf {
    let id = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "stylecast-cli-test-home-{}-{}",
        std::process::id(),
        id
    ));
    fs::create_dir_all(&path).expect("create unique test home");
    path
}

fn set_home_env(path: &Path) {
    set_env("HOME", path.as_os_str());
    set_env("USERPROFILE", path.as_os_str());
}

struct EnvSnapshot {
    home: Option<OsString>,
    userprofile: Option<OsString>,
}

impl EnvSnapshot {
    fn capture() -> Self {
        Self {
            home: std::env::var_os("HOME"),
            userprofile: std::env::var_os("USERPROFILE"),
        }
    }

    fn restore(self) {
        if let Some(value) = self.home {
            set_env("HOME", &value);
        } else {
            remove_env("HOME");
        }

        if let Some(value) = self.userprofile {
            set_env("USERPROFILE", &value);
        } else {
            remove_env("USERPROFILE");
        }
    }
}

fn set_env(key: &str, value: &OsStr) {
    // SAFETY: keys and values stem from ASCII literals or temp paths without
    // interior null bytes, and callers hold TEST_MUTEX.
    unsafe { std::env::set_var(key, value) };
}

fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) };
}
