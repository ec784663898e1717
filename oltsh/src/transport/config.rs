//! OLT connection configuration.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::workflow::ProvisioningDefaults;

/// Prompt patterns for the three CLI states the session cares about.
///
/// Patterns are regexes. Unanchored patterns are anchored to the end of the
/// output when compiled (see [`compile_prompt_pattern`](crate::channel::compile_prompt_pattern)).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Login name prompt (e.g. `Username:`).
    pub login: String,

    /// Password prompt.
    pub password: String,

    /// Ready shell prompt, any mode (e.g. `ZXAN#`, `ZXAN(config-if)#`).
    ///
    /// Should be anchored to a line start: config dumps end lines with `#`
    /// and `>` too (`!</xpon>`).
    pub shell: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            login: r"(?i)(user ?name|login)\s*:".to_string(),
            password: r"(?i)password\s*:".to_string(),
            shell: r"(?m)^[\w.\-@/]+(\([\w.\-/:]+\))?[#>]".to_string(),
        }
    }
}

/// OLT connection configuration.
///
/// Everything but the credentials has a default suited to ZTE ZXAN
/// firmware. Deserializable so an external store can hand it over directly;
/// durations are given in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OltConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Telnet port (default: 23).
    pub port: u16,

    /// Username for the login handshake.
    pub username: String,

    /// Password for the login handshake.
    #[serde(deserialize_with = "secret_from_string")]
    pub password: SecretString,

    /// Login, password and shell prompt patterns.
    pub prompts: PromptConfig,

    /// TCP connect timeout.
    #[serde(rename = "connect_timeout_ms", deserialize_with = "millis")]
    pub connect_timeout: Duration,

    /// Timeout for each login handshake step.
    #[serde(rename = "login_timeout_ms", deserialize_with = "millis")]
    pub login_timeout: Duration,

    /// Default per-command timeout.
    #[serde(rename = "command_timeout_ms", deserialize_with = "millis")]
    pub command_timeout: Duration,

    /// Timeout for commands that return full configuration dumps.
    #[serde(rename = "dump_timeout_ms", deserialize_with = "millis")]
    pub dump_timeout: Duration,

    /// Commands run right after login. The first one disables pagination.
    pub on_open_commands: Vec<String>,

    /// Commands sent (without waiting for a prompt) before closing.
    pub on_close_commands: Vec<String>,

    /// Pager marker answered with a space if pagination is still active.
    pub pager_pattern: Option<String>,

    /// Output fragments that mark a command as rejected by the device.
    pub failed_when_contains: Vec<String>,

    /// Line terminator appended to every command.
    pub line_ending: String,

    /// How many bytes from the end of the buffer to search for prompts.
    pub search_depth: usize,

    /// Defaults used when building provisioning plans.
    pub provisioning: ProvisioningDefaults,
}

impl Default for OltConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 23,
            username: String::new(),
            password: SecretString::from(String::new()),
            prompts: PromptConfig::default(),
            connect_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(60),
            dump_timeout: Duration::from_secs(180),
            on_open_commands: vec![
                "terminal length 0".to_string(),
                "configure terminal".to_string(),
            ],
            on_close_commands: vec!["end".to_string(), "exit".to_string()],
            pager_pattern: Some(r"--More--".to_string()),
            failed_when_contains: vec![
                "%Error".to_string(),
                "% Error".to_string(),
                "%Code".to_string(),
                "% Invalid input".to_string(),
                "% Unknown command".to_string(),
                "% Incomplete command".to_string(),
                "% Ambiguous command".to_string(),
            ],
            line_ending: "\r\n".to_string(),
            search_depth: 1000,
            provisioning: ProvisioningDefaults::default(),
        }
    }
}

impl OltConfig {
    /// Create a configuration for a host with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that host and credentials are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing { field: "host" });
        }
        if self.username.is_empty() {
            return Err(ConfigError::Missing { field: "username" });
        }
        if self.password.expose_secret().is_empty() {
            return Err(ConfigError::Missing { field: "password" });
        }
        Ok(())
    }
}

fn secret_from_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OltConfig::new("10.0.0.2");
        assert_eq!(config.port, 23);
        assert_eq!(config.socket_addr(), "10.0.0.2:23");
        assert_eq!(config.on_open_commands[0], "terminal length 0");
        assert_eq!(config.provisioning.vlan_profile_template, "netmedia{vlan}");
    }

    #[test]
    fn test_validate_missing_credentials() {
        let mut config = OltConfig::new("10.0.0.2");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing { field: "username" })
        ));

        config.username = "admin".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing { field: "password" })
        ));

        config.password = SecretString::from("zte".to_string());
        assert!(config.validate().is_ok());

        config.host = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing { field: "host" })
        ));
    }

    #[test]
    fn test_deserialize() {
        let config: OltConfig = serde_json::from_str(
            r#"{
                "host": "olt.lab",
                "username": "admin",
                "password": "zte",
                "command_timeout_ms": 5000,
                "prompts": { "shell": "OLT-1#" },
                "provisioning": { "vlan_profile_template": "pppoe{vlan}" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.host, "olt.lab");
        assert_eq!(config.port, 23);
        assert_eq!(config.password.expose_secret(), "zte");
        assert_eq!(config.command_timeout, Duration::from_millis(5000));
        assert_eq!(config.prompts.shell, "OLT-1#");
        // Unspecified prompt fields keep their defaults
        assert!(config.prompts.login.contains("user"));
        assert_eq!(config.provisioning.vlan_profile_template, "pppoe{vlan}");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_not_in_debug() {
        let mut config = OltConfig::new("olt");
        config.password = SecretString::from("hunter2".to_string());
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
