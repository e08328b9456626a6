use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment override for [`Config::base_url`]
pub const URL_ENV: &str = "THREATCHAT_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_GREETING: &str = "Hi! I'm your Cyber Threat Intelligence assistant. Ask me about \
MITRE ATT&CK techniques, threat groups, malware, or mitigations.";
pub const DEFAULT_RESET_GREETING: &str =
    "Chat reset! What would you like to know about cyber threats?";

/// A preset question offered as a one-key shortcut
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub label: String,
    pub question: String,
}

impl Suggestion {
    fn new(label: &str, question: &str) -> Self {
        Self {
            label: label.to_string(),
            question: question.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub greeting: String,
    pub reset_greeting: String,
    pub suggestions: Vec<Suggestion>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            reset_greeting: DEFAULT_RESET_GREETING.to_string(),
            suggestions: vec![
                Suggestion::new("T1059", "What is T1059 Command and Scripting Interpreter?"),
                Suggestion::new("APT29", "Which techniques does APT29 use?"),
                Suggestion::new("Phishing", "How do adversaries use spearphishing attachments?"),
                Suggestion::new("Cred dumping", "How can I detect OS credential dumping?"),
            ],
            request_timeout_secs: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Backend URL, with `THREATCHAT_URL` taking precedence over the file
    pub fn resolved_base_url(&self) -> String {
        std::env::var(URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("threatchat"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
