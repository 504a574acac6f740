use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{NotifyError, Result};
use crate::types::SubscriptionId;

/// Environment variable consulted by [`NotifierConfig::load`] when no path is given
pub const CONFIG_ENV_VAR: &str = "MSIM_NOTIFY_CONFIG";

/// Upper bound on SIM slots the notifier will track
pub const MAX_SUBSCRIPTIONS: u8 = 8;

/// Notifier configuration
///
/// Every field has a default, so a YAML file only needs to name what it
/// changes:
///
/// ```yaml
/// subscription_count: 2
/// voice_capable: true
/// vm_number_max_retries: 5
/// vm_number_retry_delay_ms: 2000
/// strings:
///   unknown: "Unknown"
/// ```
///
/// # Examples
///
/// ```
/// use rvoip_msim_notify::NotifierConfig;
///
/// let config = NotifierConfig::default();
/// assert_eq!(config.subscription_count, 2);
/// assert_eq!(config.vm_number_max_retries, 5);
/// config.validate().expect("defaults are valid");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Number of SIM slots on the device
    pub subscription_count: u8,

    /// Whether the device can place voice calls at all
    ///
    /// MWI events are ignored and missed calls are never posted on data-only
    /// devices.
    pub voice_capable: bool,

    /// Re-checks of the voicemail number before posting without it
    pub vm_number_max_retries: u32,

    /// Delay between voicemail number re-checks
    pub vm_number_retry_delay_ms: u64,

    /// How long an incoming call waits for its caller lookup before ringing
    /// with the default ringtone
    pub ring_query_timeout_ms: u64,

    /// Replay unseen missed calls from the call log at startup
    pub replay_missed_calls_at_startup: bool,

    /// User-visible strings
    pub strings: NotificationStrings,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            subscription_count: 2,
            voice_capable: true,
            vm_number_max_retries: 5,
            vm_number_retry_delay_ms: 2000,
            ring_query_timeout_ms: 500,
            replay_missed_calls_at_startup: true,
            strings: NotificationStrings::default(),
        }
    }
}

impl NotifierConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: NotifierConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading notifier config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration
    ///
    /// Priority: 1) the given path, 2) `MSIM_NOTIFY_CONFIG`, 3) defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            info!("Using notifier config from {}={}", CONFIG_ENV_VAR, env_path);
            return Self::from_file(env_path);
        }
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.subscription_count == 0 {
            return Err(NotifyError::ConfigError(
                "subscription_count must be greater than 0".to_string(),
            ));
        }

        if self.subscription_count > MAX_SUBSCRIPTIONS {
            return Err(NotifyError::ConfigError(format!(
                "subscription_count cannot exceed {}",
                MAX_SUBSCRIPTIONS
            )));
        }

        if self.vm_number_retry_delay_ms == 0 {
            return Err(NotifyError::ConfigError(
                "vm_number_retry_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.vm_number_max_retries > 100 {
            return Err(NotifyError::ConfigError(
                "vm_number_max_retries cannot exceed 100".to_string(),
            ));
        }

        if self.ring_query_timeout_ms == 0 {
            return Err(NotifyError::ConfigError(
                "ring_query_timeout_ms must be greater than 0".to_string(),
            ));
        }

        self.strings.validate()
    }

    pub fn vm_number_retry_delay(&self) -> Duration {
        Duration::from_millis(self.vm_number_retry_delay_ms)
    }

    pub fn ring_query_timeout(&self) -> Duration {
        Duration::from_millis(self.ring_query_timeout_ms)
    }

    /// All subscriptions this device has
    pub fn subscriptions(&self) -> impl Iterator<Item = SubscriptionId> {
        (0..self.subscription_count).map(SubscriptionId::new)
    }

    pub fn has_subscription(&self, subscription: SubscriptionId) -> bool {
        subscription.0 < self.subscription_count
    }
}

/// Strings shown in notifications
///
/// Templates use `{count}`, `{name}`, `{number}` and `{network}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationStrings {
    /// Shared fallback for callers and voicemail numbers nobody can identify
    pub unknown: String,
    pub private_number: String,
    pub missed_call_title: String,
    pub missed_calls_title: String,
    pub missed_calls_body: String,
    pub missed_call_ticker: String,
    pub voicemail_title: String,
    pub voicemail_title_count: String,
    pub voicemail_text: String,
    pub voicemail_no_number: String,
    pub call_forward_title: String,
    pub call_forward_text: String,
    pub network_selection_title: String,
    pub network_selection_text: String,
}

impl Default for NotificationStrings {
    fn default() -> Self {
        Self {
            unknown: "Unknown".to_string(),
            private_number: "Private number".to_string(),
            missed_call_title: "Missed call".to_string(),
            missed_calls_title: "Missed calls".to_string(),
            missed_calls_body: "{count} missed calls".to_string(),
            missed_call_ticker: "Missed call from {name}".to_string(),
            voicemail_title: "New voicemail".to_string(),
            voicemail_title_count: "New voicemail ({count})".to_string(),
            voicemail_text: "Dial {number}".to_string(),
            voicemail_no_number: "Voicemail number unknown".to_string(),
            call_forward_title: "Call forwarding".to_string(),
            call_forward_text: "Always forward is on".to_string(),
            network_selection_title: "No service".to_string(),
            network_selection_text: "Selected network ({network}) unavailable".to_string(),
        }
    }
}

impl NotificationStrings {
    fn validate(&self) -> Result<()> {
        if self.unknown.trim().is_empty() {
            return Err(NotifyError::ConfigError("strings.unknown cannot be empty".to_string()));
        }
        if !self.missed_calls_body.contains("{count}") {
            return Err(NotifyError::ConfigError(
                "strings.missed_calls_body must contain {count}".to_string(),
            ));
        }
        if !self.voicemail_text.contains("{number}") {
            return Err(NotifyError::ConfigError(
                "strings.voicemail_text must contain {number}".to_string(),
            ));
        }
        Ok(())
    }
}

/// Substitute `{placeholder}` in `template`
pub(crate) fn render(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(&format!("{{{}}}", placeholder), value)
}
