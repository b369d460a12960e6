use crate::core::config::data::{Config, ConfigKey};
use crate::core::config::settings::Settings;

impl Config {
    /// One line per key: the stored value, or the effective default.
    pub fn describe(&self, effective: &Settings) -> String {
        let mut out = String::from("Current configuration:\n");
        for key in ConfigKey::ALL {
            let line = match self.get(key) {
                Some(value) => format!("  {key}: {value}\n"),
                None => match default_for(key, effective) {
                    Some(value) => format!("  {key}: {value} (default)\n"),
                    None => format!("  {key}: (unset)\n"),
                },
            };
            out.push_str(&line);
        }
        out
    }

    pub fn print_all(&self, effective: &Settings) {
        print!("{}", self.describe(effective));
    }
}

fn default_for(key: ConfigKey, effective: &Settings) -> Option<String> {
    match key {
        ConfigKey::BackendUrl => Some(effective.backend_url.clone()),
        ConfigKey::RedirectUri => Some(effective.redirect_uri.clone()),
        ConfigKey::GoogleClientId => None,
        ConfigKey::AuthorizeUrl => Some(effective.authorize_url.clone()),
        ConfigKey::PollIntervalSecs => Some(effective.poll_interval.as_secs().to_string()),
        ConfigKey::Memories => Some(if effective.memories { "on" } else { "off" }.to_string()),
    }
}
