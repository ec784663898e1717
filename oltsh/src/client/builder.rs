//! Builder for creating OLT clients.

use std::time::Duration;

use secrecy::SecretString;

use super::OltClient;
use crate::error::Result;
use crate::transport::{Connector, OltConfig, PromptConfig, TcpConnector};
use crate::workflow::ProvisioningDefaults;

/// Builder for constructing OLT clients.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use oltsh::OltClientBuilder;
///
/// # fn example() -> Result<(), oltsh::Error> {
/// let client = OltClientBuilder::new("10.0.0.2")
///     .username("admin")
///     .password("secret")
///     .command_timeout(Duration::from_secs(30))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct OltClientBuilder {
    config: OltConfig,
}

impl OltClientBuilder {
    /// Create a new client builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: OltConfig::new(host),
        }
    }

    /// Start from a complete configuration, e.g. one loaded from a store.
    pub fn from_config(config: OltConfig) -> Self {
        Self { config }
    }

    /// Set the Telnet port (default: 23).
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the login name.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = SecretString::from(password.into());
        self
    }

    /// Replace the login, password and shell prompt patterns.
    pub fn prompts(mut self, prompts: PromptConfig) -> Self {
        self.config.prompts = prompts;
        self
    }

    /// Set the shell prompt pattern only.
    pub fn shell_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.config.prompts.shell = pattern.into();
        self
    }

    /// Set the TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-step login timeout.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.config.login_timeout = timeout;
        self
    }

    /// Set the default command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the timeout for configuration dumps.
    pub fn dump_timeout(mut self, timeout: Duration) -> Self {
        self.config.dump_timeout = timeout;
        self
    }

    /// Add a command to run after login, after the built-in ones.
    pub fn on_open_command(mut self, command: impl Into<String>) -> Self {
        self.config.on_open_commands.push(command.into());
        self
    }

    /// Add a device error marker.
    pub fn failed_when_contains(mut self, marker: impl Into<String>) -> Self {
        self.config.failed_when_contains.push(marker.into());
        self
    }

    /// Set the provisioning defaults (tcont/gemport ids, VLAN profile template).
    pub fn provisioning(mut self, defaults: ProvisioningDefaults) -> Self {
        self.config.provisioning = defaults;
        self
    }

    /// Build a client that connects over TCP.
    ///
    /// This validates the configuration but does not connect; the first
    /// operation does.
    pub fn build(self) -> Result<OltClient<TcpConnector>> {
        self.build_with_connector(TcpConnector)
    }

    /// Build a client over a custom connector.
    pub fn build_with_connector<C: Connector>(self, connector: C) -> Result<OltClient<C>> {
        self.config.validate()?;
        OltClient::with_connector(self.config, connector)
    }
}
