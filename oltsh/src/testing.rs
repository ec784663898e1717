//! In-memory OLT used by the unit tests.
//!
//! Speaks just enough of the ZXAN CLI over a duplex pipe: login, the
//! config-mode prompt changes, canned responses per command, and commands
//! that never return a prompt.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};

use crate::error::TransportError;
use crate::transport::{Connector, OltConfig};

pub(crate) fn test_config() -> OltConfig {
    let mut config = OltConfig::new("olt.test");
    config.username = "admin".to_string();
    config.password = SecretString::from("zte".to_string());
    config.command_timeout = Duration::from_secs(5);
    config.login_timeout = Duration::from_secs(5);
    config
}

#[derive(Default)]
struct Shared {
    password: String,
    silent: bool,
    responses: Mutex<HashMap<String, String>>,
    hang_on: Mutex<HashSet<String>>,
    close_after: Mutex<HashSet<String>>,
    commands: Mutex<Vec<String>>,
    logins: Mutex<Vec<(String, String)>>,
    connections: AtomicUsize,
}

#[derive(Clone)]
pub(crate) struct FakeOlt {
    shared: Arc<Shared>,
}

impl FakeOlt {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                password: "zte".to_string(),
                ..Shared::default()
            }),
        }
    }

    pub fn with_password(self, password: &str) -> Self {
        let mut shared = Arc::try_unwrap(self.shared).unwrap_or_else(|_| panic!("shared"));
        shared.password = password.to_string();
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Accept connections but never say anything.
    pub fn silent(self) -> Self {
        let mut shared = Arc::try_unwrap(self.shared).unwrap_or_else(|_| panic!("shared"));
        shared.silent = true;
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Canned output for a command.
    pub fn respond(&self, command: &str, output: &str) -> &Self {
        self.shared
            .responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output.to_string());
        self
    }

    /// Never return a prompt after this command.
    pub fn hang_on(&self, command: &str) -> &Self {
        self.shared
            .hang_on
            .lock()
            .unwrap()
            .insert(command.to_string());
        self
    }

    /// Answer this command, then hang up (like an idle timeout firing).
    pub fn close_after(&self, command: &str) -> &Self {
        self.shared
            .close_after
            .lock()
            .unwrap()
            .insert(command.to_string());
        self
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            shared: self.shared.clone(),
        }
    }

    /// Every command received after login, across all connections.
    pub fn commands(&self) -> Vec<String> {
        self.shared.commands.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.shared.commands.lock().unwrap().clear();
    }

    pub fn logins(&self) -> Vec<(String, String)> {
        self.shared.logins.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub async fn wait_for_command(&self, command: &str) {
        for _ in 0..200 {
            if self.commands().iter().any(|c| c == command) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("command {:?} never arrived", command);
    }
}

pub(crate) struct FakeConnector {
    shared: Arc<Shared>,
}

impl Connector for FakeConnector {
    type Stream = DuplexStream;

    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        _timeout: Duration,
    ) -> Result<DuplexStream, TransportError> {
        self.shared.connections.fetch_add(1, Ordering::SeqCst);
        let (client, server) = tokio::io::duplex(1 << 16);
        tokio::spawn(serve(self.shared.clone(), server));
        Ok(client)
    }
}

async fn serve(shared: Arc<Shared>, stream: DuplexStream) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    if shared.silent {
        while let Ok(Some(_)) = lines.next_line().await {}
        return;
    }

    if !send(&mut writer, "\r\n\r\nUsername:".to_string()).await {
        return;
    }
    let Ok(Some(user)) = lines.next_line().await else {
        return;
    };
    if !send(&mut writer, format!("{}\r\nPassword:", user)).await {
        return;
    }
    let Ok(Some(password)) = lines.next_line().await else {
        return;
    };
    shared
        .logins
        .lock()
        .unwrap()
        .push((user.clone(), password.clone()));

    if password != shared.password {
        send(
            &mut writer,
            "\r\n%Error 20200: Bad username or password\r\nUsername:".to_string(),
        )
        .await;
        while let Ok(Some(_)) = lines.next_line().await {}
        return;
    }

    let mut mode = "";
    if !send(&mut writer, "\r\nWelcome to ZXAN product C320\r\nZXAN#".to_string()).await {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let command = line.trim().to_string();
        shared.commands.lock().unwrap().push(command.clone());

        if shared.hang_on.lock().unwrap().contains(&command) {
            continue;
        }

        mode = match command.as_str() {
            "configure terminal" => "config",
            "end" => "",
            "exit" if mode.is_empty() => return,
            "exit" if mode == "config" => "",
            "exit" => "config",
            c if c.starts_with("interface ") => "config-if",
            c if c.starts_with("pon-onu-mng ") => "gpon-onu-mng",
            _ => mode,
        };

        let output = shared
            .responses
            .lock()
            .unwrap()
            .get(&command)
            .cloned()
            .unwrap_or_default();
        let prompt = if mode.is_empty() {
            "ZXAN#".to_string()
        } else {
            format!("ZXAN({})#", mode)
        };
        let body = if output.is_empty() {
            String::new()
        } else {
            format!("{}\r\n", output.replace('\n', "\r\n"))
        };

        if !send(&mut writer, format!("{}\r\n{}{}", command, body, prompt)).await {
            return;
        }
        if shared.close_after.lock().unwrap().contains(&command) {
            return;
        }
    }
}

async fn send(writer: &mut WriteHalf<DuplexStream>, data: String) -> bool {
    writer.write_all(data.as_bytes()).await.is_ok()
}
