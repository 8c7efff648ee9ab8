//! Configuration file parser for ~/.config/crowdflow/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning for each one
//! since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All sections use `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub checkout: CheckoutConfig,
    pub discovery: DiscoveryConfig,
}

/// Settings for the checkout web flow.
///
/// Custom Debug impl masks `client_id`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Base URL of the web site serving checkout pages.
    pub web_base_url: String,

    /// Stripe's cross-frame channel page. Always loaded natively.
    pub stripe_channel_url: String,

    /// OAuth client id stamped onto prepared requests.
    pub client_id: String,

    /// Publishable key handed to the payment sheet when Apple Pay is available.
    pub stripe_publishable_key: String,

    /// Merchant identifier handed to the payment sheet when Apple Pay is available.
    pub apple_merchant_identifier: String,

    /// Delay before checking the status of a racing checkout.
    pub racing_poll_delay_ms: u64,

    /// Number of status checks before a racing checkout is reported as stuck.
    pub racing_max_attempts: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            web_base_url: "https://www.kickstarter.com".to_string(),
            stripe_channel_url: "https://js.stripe.com/v2/channel.html".to_string(),
            client_id: String::new(),
            stripe_publishable_key: String::new(),
            apple_merchant_identifier: "merchant.com.kickstarter".to_string(),
            racing_poll_delay_ms: 1_000,
            racing_max_attempts: 5,
        }
    }
}

impl std::fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("web_base_url", &self.web_base_url)
            .field("stripe_channel_url", &self.stripe_channel_url)
            .field(
                "client_id",
                &(!self.client_id.is_empty()).then_some("[REDACTED]"),
            )
            .field("stripe_publishable_key", &self.stripe_publishable_key)
            .field("apple_merchant_identifier", &self.apple_merchant_identifier)
            .field("racing_poll_delay_ms", &self.racing_poll_delay_ms)
            .field("racing_max_attempts", &self.racing_max_attempts)
            .finish()
    }
}

impl CheckoutConfig {
    pub fn racing_poll_delay(&self) -> Duration {
        Duration::from_millis(self.racing_poll_delay_ms)
    }
}

/// Settings for the discovery filters screen.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Category ids the user marked as favorites.
    pub favorite_category_ids: Vec<u64>,
    pub show_starred: bool,
    pub show_recommended: bool,
    pub show_social: bool,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_SECTIONS: [(&'static str, &'static [&'static str]); 2] = [
        (
            "checkout",
            &[
                "web_base_url",
                "stripe_channel_url",
                "client_id",
                "stripe_publishable_key",
                "apple_merchant_identifier",
                "racing_poll_delay_ms",
                "racing_max_attempts",
            ],
        ),
        (
            "discovery",
            &[
                "favorite_category_ids",
                "show_starred",
                "show_recommended",
                "show_social",
            ],
        ),
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            Self::warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            web_base_url = %config.checkout.web_base_url,
            favorites = config.discovery.favorite_category_ids.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    fn warn_unknown_keys(raw: &toml::Table) {
        for (section, value) in raw {
            let Some((_, known)) = Self::KNOWN_SECTIONS.iter().find(|(name, _)| *name == section.as_str())
            else {
                tracing::warn!(key = %section, "Unknown section in config file, ignoring");
                continue;
            };
            if let Some(table) = value.as_table() {
                for key in table.keys() {
                    if !known.contains(&key.as_str()) {
                        tracing::warn!(section = %section, key = %key, "Unknown key in config file, ignoring");
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
