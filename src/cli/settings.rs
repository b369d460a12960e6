use std::error::Error;
use std::path::Path;

use crate::core::config::{path_display, Config, ConfigKey, Settings};

pub fn set(key: &str, value: &[String]) -> Result<(), Box<dyn Error>> {
    println!("{}", set_at(&Config::config_path()?, key, &value.join(" "))?);
    Ok(())
}

pub fn unset(key: &str) -> Result<(), Box<dyn Error>> {
    println!("{}", unset_at(&Config::config_path()?, key)?);
    Ok(())
}

pub fn show(cli_backend_url: Option<&str>) -> Result<(), Box<dyn Error>> {
    let path = Config::config_path()?;
    let config = Config::load_from_path(&path)?;
    let env_backend_url = Settings::backend_url_from_env();
    let effective = Settings::resolve(&config, cli_backend_url, env_backend_url.as_deref());
    config.print_all(&effective);
    println!("Config file: {}", path_display(&path));
    Ok(())
}

pub(crate) fn set_at(path: &Path, key: &str, value: &str) -> Result<String, Box<dyn Error>> {
    let key: ConfigKey = key.parse()?;
    let stored = Config::mutate_at(path, |config| {
        config.set(key, value)?;
        Ok(config.get(key).unwrap_or_default())
    })?;
    Ok(format!("✅ Set {key} to: {stored}"))
}

pub(crate) fn unset_at(path: &Path, key: &str) -> Result<String, Box<dyn Error>> {
    let key: ConfigKey = key.parse()?;
    Config::mutate_at(path, |config| {
        config.unset(key);
        Ok(())
    })?;
    Ok(format!("✅ Unset {key}"))
}
