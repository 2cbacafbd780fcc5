use super::*;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use toml::Value;

static TEST_MUTEX: Mutex<()> = Mutex::new(());
static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

const TEST_KEY_VAR: &str = "STYLECAST_CONFIG_TEST_KEY";

#[test]
fn config_default_uses_documented_models() {
    let config = Config::default();
    assert_eq!(config.text.provider, "openai");
    assert_eq!(config.text.model, DEFAULT_TEXT_MODEL);
    assert_eq!(config.text.api_key_env_var, "OPENAI_API_KEY");
    assert_eq!(config.image.provider, "gemini");
    assert_eq!(config.image.model, DEFAULT_IMAGE_MODEL);
    assert_eq!(config.image.api_key_env_var, "GEMINI_API_KEY");
    assert_eq!(config.analysis_failure_policy, "abort");
    assert_eq!(config.max_concurrency, 4);
}

#[test]
fn load_or_init_creates_file_with_every_key() {
    with_isolated_home(|home| {
        let outcome = load_or_init().expect("load default config");
        assert!(outcome.created);
        assert!(!outcome.updated);
        assert_eq!(outcome.config, Config::default());
        assert_eq!(
            outcome.path,
            home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
        );

        let contents = fs::read_to_string(&outcome.path).expect("read config");
        let parsed: Value = contents.parse().expect("config is valid TOML");
        let text = parsed
            .get("text")
            .and_then(Value::as_table)
            .expect("text table exists");
        assert_eq!(
            text.get("api_key_env_var").and_then(Value::as_str),
            Some(DEFAULT_TEXT_API_KEY_ENV_VAR)
        );
        let image = parsed
            .get("image")
            .and_then(Value::as_table)
            .expect("image table exists");
        assert_eq!(
            image.get("model").and_then(Value::as_str),
            Some(DEFAULT_IMAGE_MODEL)
        );
        assert!(contents.contains("style_guide_dir ="));
        assert!(contents.contains("analysis_failure_policy = \"abort\""));
    });
}

#[test]
fn load_or_init_keeps_existing_values() {
    with_isolated_home(|home| {
        let config = Config {
            max_concurrency: 8,
            analysis_failure_policy: "best-effort".to_string(),
            ..Config::default()
        };
        let path = home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        save(&config, &path).expect("save config");

        let outcome = load_or_init().expect("load saved config");
        assert!(!outcome.created);
        assert!(!outcome.updated);
        assert_eq!(outcome.config, config);
    });
}

#[test]
fn load_or_init_backfills_missing_keys() {
    with_isolated_home(|home| {
        let config_dir = home.join(CONFIG_DIR_NAME);
        fs::create_dir_all(&config_dir).expect("create config dir");
        let path = config_dir.join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"
style_guide_dir = "guides"

[image]
provider = "openai"
"#,
        )
        .expect("write partial config");

        let outcome = load_or_init().expect("load partial config");
        assert!(!outcome.created);
        assert!(outcome.updated);
        assert_eq!(outcome.config.style_guide_dir, "guides");
        assert_eq!(outcome.config.image.provider, "openai");
        assert_eq!(outcome.config.image.model, DEFAULT_IMAGE_MODEL);
        assert_eq!(outcome.config.text, TextSettings::default());

        let contents = fs::read_to_string(&path).expect("read config");
        assert!(contents.contains("style_guide_dir = \"guides\""));
        assert!(contents.contains("[text]"));
        assert!(contents.contains("aspect_ratio = \"1:1\""));
        assert!(contents.contains("log_level = \"info\""));
    });
}

#[test]
fn invalid_file_is_reported() {
    with_isolated_home(|home| {
        let config_dir = home.join(CONFIG_DIR_NAME);
        fs::create_dir_all(&config_dir).expect("create config dir");
        fs::write(config_dir.join(CONFIG_FILE_NAME), "max_concurrency = \"many\"")
            .expect("write invalid config");

        let error = load_or_init().expect_err("invalid config");
        assert!(matches!(error, ConfigError::Deserialize(_)));
    });
}

#[test]
fn api_key_is_read_from_named_variable() {
    with_isolated_home(|_| {
        remove_env(TEST_KEY_VAR);
        assert_eq!(api_key_from_env(TEST_KEY_VAR), None);

        set_env(TEST_KEY_VAR, OsStr::new("   "));
        assert_eq!(api_key_from_env(TEST_KEY_VAR), None);

        set_env(TEST_KEY_VAR, OsStr::new(" sk-test "));
        assert_eq!(api_key_from_env(&format!(" {TEST_KEY_VAR} ")).as_deref(), Some("sk-test"));

        remove_env(TEST_KEY_VAR);
        assert_eq!(api_key_from_env(""), None);
    });
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
        "stylecast-config-test-home-{}-{}",
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
    // SAFETY: tests touching the environment hold TEST_MUTEX, and keys and
    // values never embed null bytes.
    unsafe { std::env::set_var(key, value) };
}

fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) };
}
