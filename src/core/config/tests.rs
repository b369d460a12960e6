use super::data::{Config, ConfigKey, DEFAULT_BACKEND_URL};
use super::io::ConfigError;
use super::settings::Settings;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested/config.toml");

    let config = Config {
        backend_url: Some("https://api.example.com".to_string()),
        memories: Some(false),
        ..Default::default()
    };
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded, config);

    Config::mutate_at(&config_path, |config| {
        config.unset(ConfigKey::BackendUrl);
        Ok(())
    })
    .expect("Failed to mutate config");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load mutated config");
    assert_eq!(loaded.backend_url, None);
    assert_eq!(loaded.memories, Some(false));
}

#[test]
fn failed_mutation_leaves_file_untouched() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");

    let result = Config::mutate_at(&config_path, |config| {
        config.set(ConfigKey::PollIntervalSecs, "0")
    });

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    assert!(!config_path.exists());
}

#[test]
fn parse_errors_are_distinct_from_read_errors() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "backend_url = [").unwrap();

    let err = Config::load_from_path(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse config at"));

    let err = Config::load_from_path(temp_dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn keys_accept_both_spellings() {
    assert_eq!("backend_url".parse::<ConfigKey>().unwrap(), ConfigKey::BackendUrl);
    assert_eq!(
        "Poll-Interval-Secs".parse::<ConfigKey>().unwrap(),
        ConfigKey::PollIntervalSecs
    );
    let err = "theme".parse::<ConfigKey>().unwrap_err();
    assert!(err.to_string().contains("backend-url"));
}

#[test]
fn set_validates_values() {
    let mut config = Config::default();

    config
        .set(ConfigKey::BackendUrl, "https://api.example.com/")
        .unwrap();
    assert_eq!(config.backend_url.as_deref(), Some("https://api.example.com"));

    assert!(config.set(ConfigKey::BackendUrl, "ftp://nope").is_err());
    assert!(config.set(ConfigKey::RedirectUri, "not a url").is_err());
    assert!(config.set(ConfigKey::PollIntervalSecs, "soon").is_err());
    assert!(config.set(ConfigKey::Memories, "maybe").is_err());
    assert!(config.set(ConfigKey::GoogleClientId, "  ").is_err());

    config.set(ConfigKey::Memories, "OFF").unwrap();
    config.set(ConfigKey::PollIntervalSecs, "5").unwrap();
    assert_eq!(config.get(ConfigKey::Memories).as_deref(), Some("off"));
    assert_eq!(config.get(ConfigKey::PollIntervalSecs).as_deref(), Some("5"));
}

#[test]
fn settings_prefer_cli_then_env_then_file() {
    let config = Config {
        backend_url: Some("https://file.example.com".to_string()),
        poll_interval_secs: Some(0),
        ..Default::default()
    };

    let settings = Settings::resolve(
        &config,
        Some("https://cli.example.com"),
        Some("https://env.example.com"),
    );
    assert_eq!(settings.backend_url, "https://cli.example.com");

    let settings = Settings::resolve(&config, None, Some("https://env.example.com"));
    assert_eq!(settings.backend_url, "https://env.example.com");

    let settings = Settings::resolve(&config, None, Some("  "));
    assert_eq!(settings.backend_url, "https://file.example.com");
    assert_eq!(settings.poll_interval, Duration::from_secs(1));

    let settings = Settings::resolve(&Config::default(), None, None);
    assert_eq!(settings.backend_url, DEFAULT_BACKEND_URL);
    assert_eq!(settings.poll_interval, Duration::from_secs(30));
    assert!(settings.memories);
    assert_eq!(
        settings.redirect_uri,
        "http://localhost:3000/oauth2callback"
    );
}

#[test]
fn describe_marks_defaults() {
    let config = Config {
        memories: Some(false),
        ..Default::default()
    };
    let settings = Settings::resolve(&config, None, None);
    let text = config.describe(&settings);

    assert!(text.contains("  memories: off\n"));
    assert!(text.contains("  backend-url: http://localhost:8000 (default)\n"));
    assert!(text.contains("  google-client-id: (unset)\n"));
}
