mod defaults;


use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::RelayError;
use defaults::*;

/// Top-level Relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub closing: ClosingConfig,
    #[serde(default)]
    pub followup: FollowupConfig,
    #[serde(default)]
    pub promotion: PromotionConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Webhook HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Secret echoed back by Meta during the subscription handshake.
    #[serde(default)]
    pub verify_token: String,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verify_token: String::new(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// WhatsApp Cloud API credentials and endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Permanent bearer token for the Graph API.
    #[serde(default)]
    pub access_token: String,
    /// Sender phone-number id (not the phone number itself).
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            api_version: default_graph_api_version(),
            base_url: default_graph_base_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// OpenAI-compatible completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Size of the per-contact history window sent to the provider.
    #[serde(default = "default_max_context")]
    pub max_context_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_context_messages: default_max_context(),
        }
    }
}

/// Fixed texts used by the reply pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_system_prompt")]
    pub system: String,
    /// Sent when the completion call fails or returns nothing.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    /// Stands in for the text of media, location, and other non-text messages.
    #[serde(default = "default_non_text_placeholder")]
    pub non_text_placeholder: String,
    /// Current turn used when the inbound message carried no text.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: default_system_prompt(),
            fallback_reply: default_fallback_reply(),
            non_text_placeholder: default_non_text_placeholder(),
            greeting: default_greeting(),
        }
    }
}

/// Closing-question augmentation of generated replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Chance (0.0..=1.0) of appending a question to an eligible reply.
    #[serde(default = "default_closing_probability")]
    pub probability: f64,
    /// A reply mentioning any of these already closes the loop.
    #[serde(default = "default_closing_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_closing_questions")]
    pub questions: Vec<String>,
}

impl Default for ClosingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probability: default_closing_probability(),
            keywords: default_closing_keywords(),
            questions: default_closing_questions(),
        }
    }
}

/// Silence follow-up nudges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_followup_poll_secs")]
    pub poll_interval_secs: u64,
    /// Minimum silence after the last user message before nudging.
    #[serde(default = "default_min_silence_secs")]
    pub min_silence_secs: u64,
    /// Past this age a silence episode is abandoned.
    #[serde(default = "default_max_window_secs")]
    pub max_window_secs: u64,
    #[serde(default = "default_nudges")]
    pub nudges: Vec<String>,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_followup_poll_secs(),
            min_silence_secs: default_min_silence_secs(),
            max_window_secs: default_max_window_secs(),
            nudges: default_nudges(),
        }
    }
}

impl FollowupConfig {
    pub fn min_silence(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_silence_secs as i64)
    }

    pub fn max_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_window_secs as i64)
    }
}

/// Weekly promotional template broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Day of week, e.g. "fri" or "Friday".
    #[serde(default = "default_promotion_weekday")]
    pub weekday: String,
    /// Local wall-clock time, "HH:MM".
    #[serde(default = "default_promotion_time")]
    pub time: String,
    #[serde(default = "default_promotion_template")]
    pub template: String,
    #[serde(default = "default_promotion_language")]
    pub language: String,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weekday: default_promotion_weekday(),
            time: default_promotion_time(),
            template: default_promotion_template(),
            language: default_promotion_language(),
        }
    }
}

impl PromotionConfig {
    /// Parse the configured weekday and time of day.
    pub fn schedule(&self) -> Result<(Weekday, NaiveTime), RelayError> {
        let weekday: Weekday = self.weekday.trim().parse().map_err(|_| {
            RelayError::Config(format!("invalid promotion weekday: {}", self.weekday))
        })?;
        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M").map_err(|e| {
            RelayError::Config(format!("invalid promotion time '{}': {e}", self.time))
        })?;
        Ok((weekday, time))
    }
}

impl Config {
    /// Check that everything `start` needs is present.
    pub fn validate(&self) -> Result<(), RelayError> {
        let mut missing = Vec::new();
        if self.server.verify_token.is_empty() {
            missing.push("server.verify_token (VERIFY_TOKEN)");
        }
        if self.whatsapp.access_token.is_empty() {
            missing.push("whatsapp.access_token (WHATSAPP_TOKEN)");
        }
        if self.whatsapp.phone_number_id.is_empty() {
            missing.push("whatsapp.phone_number_id (PHONE_NUMBER_ID)");
        }
        if self.provider.api_key.is_empty() {
            missing.push("provider.api_key (OPENAI_API_KEY)");
        }
        if !missing.is_empty() {
            return Err(RelayError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.promotion.enabled {
            self.promotion.schedule()?;
        }
        if self.followup.min_silence_secs > self.followup.max_window_secs {
            return Err(RelayError::Config(
                "followup.min_silence_secs must not exceed followup.max_window_secs".into(),
            ));
        }
        Ok(())
    }

    /// Overlay secrets and the listen port from environment-style variables.
    ///
    /// Non-empty values win over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("VERIFY_TOKEN") {
            self.server.verify_token = v;
        }
        if let Some(v) = get("WHATSAPP_TOKEN") {
            self.whatsapp.access_token = v;
        }
        if let Some(v) = get("PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.provider.api_key = v;
        }
        if let Some(v) = get("PORT") {
            match v.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("ignoring invalid PORT value: {v}"),
            }
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, RelayError> {
    let mut config = load_file(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn load_file(path: &str) -> Result<Config, RelayError> {
    let path = Path::new(path);
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| RelayError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
