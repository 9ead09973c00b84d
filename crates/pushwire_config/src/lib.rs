use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub mod models;
pub use models::*;

/// Marker value that is replaced by the environment variable named after its config path.
pub const SECRET_FROM_ENV: &str = "secret_from_env";

/// Loads the application configuration.
///
/// Sources are layered in this order, later ones winning:
/// `config/default`, `config/{RUN_ENV}`, then `PUSHWIRE_*` environment variables
/// (`__` separates nested keys, e.g. `PUSHWIRE_SNS__REGION`). The directory can be moved
/// with `PUSHWIRE_CONFIG_DIR`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "PUSHWIRE".to_string());
    let config_dir = env::var("PUSHWIRE_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    load_config_from(&config_dir, &run_env, &prefix)
}

/// Loads the configuration from an explicit directory, run environment and env prefix.
pub fn load_config_from(
    config_dir: &Path,
    run_env: &str,
    prefix: &str,
) -> Result<AppConfig, ConfigError> {
    let default_path = config_dir.join("default");
    let env_path = config_dir.join(run_env);

    debug!("config: default_path: {}", default_path.display());
    debug!("config: env_path: {}", env_path.display());

    let builder = Config::builder()
        .add_source(File::from(default_path).required(false))
        .add_source(File::from(env_path).required(false))
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let raw_config: AppConfig = builder.build()?.try_deserialize()?;
    apply_env_overrides_from_marker(raw_config)
}

/// Recursively replaces all "secret_from_env" string values with environment variable values
fn inject_env_secrets(value: &mut Value) {
    fn walk(path: Vec<String>, obj: &mut Value) {
        match obj {
            Value::Object(map) => {
                for (k, v) in map.iter_mut() {
                    let mut new_path = path.clone();
                    new_path.push(k.to_string());
                    walk(new_path, v);
                }
            }
            Value::String(s) if s == SECRET_FROM_ENV => {
                let env_key = path.join("_").to_uppercase();
                if let Ok(env_val) = std::env::var(&env_key) {
                    *obj = Value::String(env_val);
                } else {
                    warn!("env var {} not found for secret_from_env", env_key);
                }
            }
            _ => {}
        }
    }

    walk(vec![], value);
}

/// Applies environment overrides based on "secret_from_env" markers in serialized config
pub fn apply_env_overrides_from_marker(config: AppConfig) -> Result<AppConfig, ConfigError> {
    let mut json = serde_json::to_value(&config)
        .map_err(|err| ConfigError::Message(format!("failed to serialize config: {err}")))?;
    inject_env_secrets(&mut json);
    serde_json::from_value(json)
        .map_err(|err| ConfigError::Message(format!("failed to rebuild config: {err}")))
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables, once.
///
/// The file is taken from `DOTENV_OVERRIDE`, else from the first command line argument when it
/// starts with `.env`, else `.env`. Returns the path that was used.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path_override = std::env::var("DOTENV_OVERRIDE").ok();
    let dotenv_path_arg = env::args().nth(1).filter(|s| s.starts_with(".env"));

    let dotenv_path = dotenv_path_override
        .or(dotenv_path_arg)
        .unwrap_or_else(|| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_config_dir() -> PathBuf {
        let dir = env::temp_dir().join(format!("pushwire-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults_without_any_source() {
        let dir = temp_config_dir();
        let config = load_config_from(&dir, "debug", "PUSHWIRE_TEST_EMPTY").unwrap();

        assert_eq!(config.server.port, 8086);
        assert!(config.database.is_none());
        assert!(config.sns.log_sent_messages);
        assert!(!config.sns.ios_sandbox_enabled);
        assert_eq!(config.sns.timeout_secs, 10);
        assert_eq!(config.dispatch.worker_count, 4);
        assert_eq!(config.dispatch.max_attempts, 3);
    }

    #[test]
    fn test_run_env_file_overrides_default_file() {
        let dir = temp_config_dir();
        fs::write(
            dir.join("default.toml"),
            r#"
            [database]
            url = "sqlite://data/pushwire.db"

            [sns]
            ios_application_arn = "test_ios_arn"
            android_application_arn = "test_android_arn"
            default_sound = "default"
            "#,
        )
        .unwrap();
        fs::write(
            dir.join("production.toml"),
            r#"
            [sns]
            ios_application_arn = "prod_ios_arn"
            ios_sandbox_enabled = true
            log_sent_messages = false
            "#,
        )
        .unwrap();

        let config = load_config_from(&dir, "production", "PUSHWIRE_TEST_LAYERS").unwrap();

        let database = config.database.unwrap();
        assert_eq!(database.url, "sqlite://data/pushwire.db");
        assert_eq!(database.device_table, "devices");
        assert_eq!(database.message_table, "push_messages");
        assert_eq!(config.sns.ios_application_arn.as_deref(), Some("prod_ios_arn"));
        assert_eq!(
            config.sns.android_application_arn.as_deref(),
            Some("test_android_arn")
        );
        assert!(config.sns.ios_sandbox_enabled);
        assert!(!config.sns.log_sent_messages);
    }

    #[test]
    fn test_environment_variables_override_files() {
        let dir = temp_config_dir();
        fs::write(
            dir.join("default.toml"),
            "[sns]\nregion = \"eu-west-1\"\n",
        )
        .unwrap();
        env::set_var("PUSHWIRE_TEST_ENV_SNS__REGION", "us-east-1");
        env::set_var("PUSHWIRE_TEST_ENV_DISPATCH__WORKER_COUNT", "8");

        let config = load_config_from(&dir, "debug", "PUSHWIRE_TEST_ENV").unwrap();

        assert_eq!(config.sns.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.dispatch.worker_count, 8);
    }

    #[test]
    fn test_secret_marker_is_replaced_from_environment() {
        env::set_var("SNS_SECRET_ACCESS_KEY", "super-secret");
        let config = AppConfig {
            sns: SnsConfig {
                secret_access_key: Some(SECRET_FROM_ENV.to_string()),
                ..SnsConfig::default()
            },
            ..AppConfig::default()
        };

        let config = apply_env_overrides_from_marker(config).unwrap();

        assert_eq!(config.sns.secret_access_key.as_deref(), Some("super-secret"));
    }
}
