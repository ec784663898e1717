//! OLT session management: connect, login, reconnect.
//!
//! The [`SessionManager`] owns the one Telnet session to the OLT. It hands out
//! the cached session while it is usable and rebuilds it from scratch after
//! [`invalidate`](SessionManager::invalidate). It never retries on its own;
//! retry policy belongs to the caller.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use regex::bytes::Regex;
use secrecy::ExposeSecret;

use crate::channel::{ChannelConfig, CliChannel, any_prompt, compile_prompt_pattern, last_line};
use crate::error::{ChannelError, ConfigError, Result, TransportError};
use crate::transport::{Connector, OltConfig, TcpConnector, TelnetTransport};

/// Compiled prompt patterns used by the session.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub login: Regex,
    pub password: Regex,
    pub shell: Regex,
    /// Matches any of the three; used while logging in.
    handshake: Regex,
}

impl Prompts {
    /// Compile the prompt patterns from configuration.
    pub fn compile(config: &OltConfig) -> std::result::Result<Self, ConfigError> {
        let compile = |field: &'static str, pattern: &str| {
            compile_prompt_pattern(pattern)
                .map_err(|source| ConfigError::InvalidPattern { field, source })
        };

        let login = compile("prompts.login", &config.prompts.login)?;
        let password = compile("prompts.password", &config.prompts.password)?;
        let shell = compile("prompts.shell", &config.prompts.shell)?;
        let handshake = any_prompt(&[&login, &password, &shell]).map_err(|source| {
            ConfigError::InvalidPattern {
                field: "prompts",
                source,
            }
        })?;

        Ok(Self {
            login,
            password,
            shell,
            handshake,
        })
    }
}

/// A logged-in OLT session.
///
/// Only ever created by [`SessionManager`]; dropped as soon as anything goes
/// wrong with it.
pub struct OltSession<S> {
    channel: CliChannel<S>,
    host: String,
    port: u16,
    prompt: String,
    connected: bool,
    opened_at: Instant,
    commands_sent: u64,
}

impl<S> OltSession<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    /// Whether the session can take another command.
    pub fn is_usable(&self) -> bool {
        self.connected && self.channel.is_open()
    }

    /// The shell prompt seen after login (e.g. `ZXAN(config)#`).
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Remote host and port.
    pub fn peer(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// Time since the session was established.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Number of commands sent over this session.
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    /// Send one line and read until `prompt` matches.
    ///
    /// Stale input is discarded first so a late reply to an earlier command
    /// can never be read as the answer to this one. On error the session is
    /// marked unusable and the partial output stays available through
    /// [`take_partial_output`](Self::take_partial_output).
    pub async fn exchange(
        &mut self,
        command: &str,
        prompt: &Regex,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, ChannelError> {
        let result = async {
            self.channel.discard_pending()?;
            self.channel.send(command).await?;
            self.channel.read_until(prompt, timeout).await
        }
        .await;

        self.commands_sent += 1;
        if result.is_err() {
            self.connected = false;
        }
        result
    }

    /// Output received before the last failed exchange.
    pub fn take_partial_output(&mut self) -> String {
        self.channel.take_output()
    }
}

/// Owns the single OLT session for a client.
///
/// Holding `&mut SessionManager` is what entitles a caller to talk to the
/// device; [`CommandSerializer`](crate::serializer::CommandSerializer) is the
/// only way concurrent callers get one.
pub struct SessionManager<C: Connector = TcpConnector> {
    config: OltConfig,
    prompts: Prompts,
    channel_config: ChannelConfig,
    connector: C,
    session: Option<OltSession<C::Stream>>,
    connects: u64,
}

impl SessionManager<TcpConnector> {
    /// Create a manager that connects over TCP.
    pub fn new(config: OltConfig) -> Result<Self> {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> SessionManager<C> {
    /// Create a manager using a custom connector.
    ///
    /// Compiles the prompt patterns up front; nothing is connected until the
    /// first [`ensure_connected`](Self::ensure_connected).
    pub fn with_connector(config: OltConfig, connector: C) -> Result<Self> {
        let prompts = Prompts::compile(&config)?;

        let pager = match &config.pager_pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|source| {
                ConfigError::InvalidPattern {
                    field: "pager_pattern",
                    source,
                }
            })?),
            None => None,
        };

        let channel_config = ChannelConfig {
            line_ending: config.line_ending.clone(),
            search_depth: config.search_depth,
            pager,
        };

        Ok(Self {
            config,
            prompts,
            channel_config,
            connector,
            session: None,
            connects: 0,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &OltConfig {
        &self.config
    }

    /// The compiled shell prompt.
    pub fn shell_prompt(&self) -> &Regex {
        &self.prompts.shell
    }

    /// Whether a usable session is cached.
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_usable())
    }

    /// How many sessions have been established so far.
    pub fn connection_count(&self) -> u64 {
        self.connects
    }

    /// Return the cached session, connecting and logging in if needed.
    ///
    /// The cached session is checked without blocking first: a peer that
    /// hung up while idle (the OLT's idle timeout) only shows up as EOF on
    /// the socket. Nothing has been sent at that point, so opening a fresh
    /// session is not a retry.
    pub async fn ensure_connected(&mut self) -> Result<&mut OltSession<C::Stream>> {
        if let Some(session) = self.session.as_mut().filter(|s| s.is_usable()) {
            if let Err(e) = session.channel.discard_pending() {
                debug!(
                    "cached session to {} is gone: {}",
                    self.config.socket_addr(),
                    e
                );
                session.connected = false;
            }
        }

        if !self.is_connected() {
            if self.session.take().is_some() {
                debug!("discarding unusable session to {}", self.config.socket_addr());
            }
            let session = self.open().await?;
            self.session = Some(session);
        }

        match self.session.as_mut() {
            Some(session) => Ok(session),
            None => Err(TransportError::Disconnected.into()),
        }
    }

    /// Drop the cached session so the next call reconnects from scratch.
    pub fn invalidate(&mut self) {
        if let Some(session) = self.session.take() {
            warn!(
                "invalidating session to {}:{} after {} command(s)",
                session.host, session.port, session.commands_sent
            );
        }
    }

    /// Log out gracefully and drop the session.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if session.is_usable() {
            for cmd in &self.config.on_close_commands {
                if let Err(e) = session.channel.send(cmd).await {
                    debug!("ignoring error while closing: {}", e);
                    break;
                }
            }
            if let Err(e) = session.channel.shutdown().await {
                debug!("ignoring error while closing: {}", e);
            }
        }

        info!("closed session to {}", self.config.socket_addr());
        Ok(())
    }

    /// Open a transport and run the login handshake.
    async fn open(&mut self) -> Result<OltSession<C::Stream>> {
        self.config.validate()?;

        let stream = self
            .connector
            .connect(
                &self.config.host,
                self.config.port,
                self.config.connect_timeout,
            )
            .await?;

        let mut channel = CliChannel::new(TelnetTransport::new(stream), self.channel_config.clone());
        let mut prompt = self.login(&mut channel).await?;

        for cmd in &self.config.on_open_commands {
            debug!("on-open: {}", cmd);
            channel
                .send(cmd)
                .await
                .map_err(|e| handshake_error(e, "shell", self.config.command_timeout))?;
            let data = channel
                .read_until(&self.prompts.shell, self.config.command_timeout)
                .await
                .map_err(|e| handshake_error(e, "shell", self.config.command_timeout))?;
            prompt = last_line(&data);
        }

        self.connects += 1;
        info!(
            "connected to {} as {} (session #{})",
            self.config.socket_addr(),
            self.config.username,
            self.connects
        );

        Ok(OltSession {
            channel,
            host: self.config.host.clone(),
            port: self.config.port,
            prompt,
            connected: true,
            opened_at: Instant::now(),
            commands_sent: 0,
        })
    }

    /// Answer login and password prompts until the shell prompt appears.
    ///
    /// Being asked for the login again after the password was sent means the
    /// credentials were rejected.
    async fn login(&self, channel: &mut CliChannel<C::Stream>) -> Result<String> {
        let timeout = self.config.login_timeout;
        let mut sent_username = false;
        let mut sent_password = false;

        loop {
            let data = channel
                .read_until(&self.prompts.handshake, timeout)
                .await
                .map_err(|e| {
                    let stage = match (sent_username, sent_password) {
                        (_, true) => "shell",
                        (true, false) => "password",
                        (false, false) => "login",
                    };
                    handshake_error(e, stage, timeout)
                })?;

            if self.prompts.shell.is_match(&data) {
                let prompt = last_line(&data);
                debug!("login complete, prompt {:?}", prompt);
                return Ok(prompt);
            }

            let rejected = || TransportError::AuthenticationFailed {
                user: self.config.username.clone(),
            };

            if self.prompts.password.is_match(&data) {
                if sent_password {
                    return Err(rejected().into());
                }
                channel
                    .send_hidden(self.config.password.expose_secret())
                    .await
                    .map_err(|e| handshake_error(e, "password", timeout))?;
                sent_password = true;
            } else if self.prompts.login.is_match(&data) {
                if sent_password || sent_username {
                    return Err(rejected().into());
                }
                channel
                    .send(&self.config.username)
                    .await
                    .map_err(|e| handshake_error(e, "login", timeout))?;
                sent_username = true;
            }
        }
    }
}

fn handshake_error(err: ChannelError, stage: &'static str, timeout: Duration) -> TransportError {
    match err {
        ChannelError::PatternTimeout(_) => TransportError::HandshakeTimeout { stage, timeout },
        ChannelError::Closed => TransportError::Disconnected,
        ChannelError::Transport(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeOlt, test_config};

    #[tokio::test]
    async fn test_connect_and_login() {
        let olt = FakeOlt::new();
        let mut manager = SessionManager::with_connector(test_config(), olt.connector()).unwrap();
        assert!(!manager.is_connected());

        let session = manager.ensure_connected().await.unwrap();
        assert_eq!(session.prompt(), "ZXAN(config)#");
        assert_eq!(session.peer(), ("olt.test", 23));
        assert!(manager.is_connected());
        assert_eq!(manager.connection_count(), 1);

        // Pagination is disabled first, then config mode
        assert_eq!(
            olt.commands(),
            vec!["terminal length 0", "configure terminal"]
        );
        assert_eq!(olt.logins(), vec![("admin".to_string(), "zte".to_string())]);
    }

    #[tokio::test]
    async fn test_cached_session_is_reused() {
        let olt = FakeOlt::new();
        let mut manager = SessionManager::with_connector(test_config(), olt.connector()).unwrap();

        manager.ensure_connected().await.unwrap();
        manager.ensure_connected().await.unwrap();
        assert_eq!(olt.connections(), 1);
    }

    #[tokio::test]
    async fn test_peer_closed_session_is_replaced() {
        let olt = FakeOlt::new();
        olt.respond("show card", "Rack Shelf Slot");
        olt.close_after("show card");
        let mut manager = SessionManager::with_connector(test_config(), olt.connector()).unwrap();
        let prompt = manager.shell_prompt().clone();

        let session = manager.ensure_connected().await.unwrap();
        session
            .exchange("show card", &prompt, Duration::from_secs(5))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        // Still looks connected: nothing has read the EOF yet
        assert!(manager.is_connected());

        let session = manager.ensure_connected().await.unwrap();
        let data = session
            .exchange("show card", &prompt, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&data).contains("Rack Shelf Slot"));
        assert_eq!(olt.connections(), 2);
        assert_eq!(manager.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reconnect() {
        let olt = FakeOlt::new();
        let mut manager = SessionManager::with_connector(test_config(), olt.connector()).unwrap();

        manager.ensure_connected().await.unwrap();
        manager.invalidate();
        assert!(!manager.is_connected());

        manager.ensure_connected().await.unwrap();
        assert_eq!(olt.connections(), 2);
        assert_eq!(manager.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_bad_password() {
        let olt = FakeOlt::new().with_password("other");
        let mut manager = SessionManager::with_connector(test_config(), olt.connector()).unwrap();

        let err = manager.ensure_connected().await.err().unwrap();
        assert!(matches!(
            err,
            crate::Error::Transport(TransportError::AuthenticationFailed { ref user }) if user == "admin"
        ));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let olt = FakeOlt::new();
        let mut config = test_config();
        config.username.clear();
        let mut manager = SessionManager::with_connector(config, olt.connector()).unwrap();

        let err = manager.ensure_connected().await.err().unwrap();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::Missing { field: "username" })
        ));
        assert_eq!(olt.connections(), 0);
    }

    #[tokio::test]
    async fn test_invalid_prompt_pattern() {
        let mut config = test_config();
        config.prompts.shell = "(unclosed".into();
        let err = SessionManager::with_connector(config, FakeOlt::new().connector())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::InvalidPattern { field: "prompts.shell", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_times_out_handshake() {
        let olt = FakeOlt::new().silent();
        let mut manager = SessionManager::with_connector(test_config(), olt.connector()).unwrap();

        let err = manager.ensure_connected().await.err().unwrap();
        assert!(matches!(
            err,
            crate::Error::Transport(TransportError::HandshakeTimeout { stage: "login", .. })
        ));
    }

    #[tokio::test]
    async fn test_close_sends_logout() {
        let olt = FakeOlt::new();
        let mut manager = SessionManager::with_connector(test_config(), olt.connector()).unwrap();
        manager.ensure_connected().await.unwrap();

        manager.close().await.unwrap();
        assert!(!manager.is_connected());
        olt.wait_for_command("exit").await;
        assert!(olt.commands().ends_with(&["end".to_string(), "exit".to_string()]));
    }
}
