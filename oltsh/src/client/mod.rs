//! High-level OLT client.
//!
//! [`OltClient`] is the surface callers use. Every method takes `&self`, so a
//! client can sit in an `Arc` and be shared by any number of tasks; the
//! operations are queued on one [`CommandSerializer`] and reach the device
//! one at a time, in arrival order.

mod builder;

pub use builder::OltClientBuilder;

use std::time::Duration;

use log::{debug, warn};

use crate::error::{ProvisioningError, Result};
use crate::executor::{CommandExecutor, CommandRequest, Response};
use crate::parse::{
    self, Attenuation, OltCard, OltCardDetail, OnuDetail, OnuRecord, PortAggregate, SystemGroup,
    UnconfiguredOnu,
};
use crate::serializer::CommandSerializer;
use crate::session::SessionManager;
use crate::transport::{Connector, OltConfig, TcpConnector};
use crate::workflow::{
    OnuRegistration, ProvisioningDefaults, ProvisioningPlan, ProvisioningReport, execute_plan,
    validate_slot_port,
};

/// Client for one OLT.
///
/// # Example
///
/// ```rust,no_run
/// use oltsh::OltClientBuilder;
///
/// # async fn example() -> Result<(), oltsh::Error> {
/// let client = OltClientBuilder::new("10.0.0.2")
///     .username("admin")
///     .password("secret")
///     .build()?;
///
/// for port in client.get_onu_state().await? {
///     println!("{} {}/{} {}", port.port, port.online, port.registered, port.status);
/// }
/// # Ok(())
/// # }
/// ```
pub struct OltClient<C: Connector = TcpConnector> {
    serializer: CommandSerializer<SessionManager<C>>,
    executor: CommandExecutor,
    provisioning: ProvisioningDefaults,
    dump_timeout: Duration,
}

impl OltClient<TcpConnector> {
    /// Create a client that connects over TCP on first use.
    pub fn new(config: OltConfig) -> Result<Self> {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> OltClient<C> {
    /// Create a client using a custom connector.
    pub fn with_connector(config: OltConfig, connector: C) -> Result<Self> {
        let executor = CommandExecutor::from_config(&config);
        let provisioning = config.provisioning.clone();
        let dump_timeout = config.dump_timeout;
        let manager = SessionManager::with_connector(config, connector)?;

        Ok(Self {
            serializer: CommandSerializer::new(manager),
            executor,
            provisioning,
            dump_timeout,
        })
    }

    /// Whether a usable session is cached. Waits for the current holder.
    pub async fn is_connected(&self) -> bool {
        self.serializer.acquire().await.is_connected()
    }

    async fn execute(&self, request: CommandRequest) -> Result<Response> {
        let mut manager = self.serializer.acquire().await;
        self.executor.execute(&mut *manager, &request).await
    }

    async fn query(&self, command: String) -> Result<String> {
        let response = self.execute(CommandRequest::new(command)).await?;
        Ok(checked(response))
    }

    /// Run an arbitrary command and return the device's answer.
    ///
    /// A device error marker does not make this fail; check
    /// [`Response::failure_message`].
    pub async fn run_command(&self, command: &str) -> Result<Response> {
        self.execute(CommandRequest::new(command)).await
    }

    /// ONUs seen on a port but not yet configured (`show gpon onu uncfg`).
    pub async fn get_unconfigured_onus(&self) -> Result<Vec<UnconfiguredOnu>> {
        let output = self.query("show gpon onu uncfg".to_string()).await?;
        Ok(parse::parse_unconfigured_onus(&output))
    }

    /// Every configured ONU with its VLAN, PPPoE, bandwidth profile and live
    /// state.
    ///
    /// The configuration dump and the state table are read under one lock,
    /// so no provisioning can land between them.
    pub async fn get_all_onu_details(&self) -> Result<Vec<OnuRecord>> {
        let mut manager = self.serializer.acquire().await;

        let dump = CommandRequest::new("show running-config").with_timeout(self.dump_timeout);
        let config = checked(self.executor.execute(&mut *manager, &dump).await?);
        let state = checked(
            self.executor
                .execute(&mut *manager, &"show gpon onu state".into())
                .await?,
        );
        drop(manager);

        let mut records = parse::parse_onu_details(&config);
        parse::merge_onu_states(&mut records, &parse::parse_onu_state_entries(&state));
        debug!("parsed {} ONU record(s)", records.len());
        Ok(records)
    }

    /// Register and configure a new ONU.
    ///
    /// All steps run under one lock. See [`execute_plan`] for the failure
    /// semantics.
    pub async fn register_onu(&self, params: &OnuRegistration) -> Result<ProvisioningReport> {
        let plan = ProvisioningPlan::register(params, &self.provisioning)?;
        let mut manager = self.serializer.acquire().await;
        execute_plan(&self.executor, &mut *manager, &plan).await
    }

    /// Remove an ONU from its port.
    pub async fn delete_onu(&self, slot_port: &str, onu_id: u32) -> Result<ProvisioningReport> {
        let plan = ProvisioningPlan::delete(slot_port, onu_id)?;
        let mut manager = self.serializer.acquire().await;
        execute_plan(&self.executor, &mut *manager, &plan).await
    }

    /// Per-port ONU counts and health (`show gpon onu state`).
    pub async fn get_onu_state(&self) -> Result<Vec<PortAggregate>> {
        let output = self.query("show gpon onu state".to_string()).await?;
        Ok(parse::parse_onu_state(&output))
    }

    /// Detail dump for one ONU.
    pub async fn get_onu_detail(&self, slot_port: &str, onu_id: u32) -> Result<OnuDetail> {
        let onu = onu_interface(slot_port, onu_id)?;
        let output = self
            .query(format!("show gpon onu detail-info {}", onu))
            .await?;
        Ok(parse::parse_onu_detail(&output))
    }

    /// Optical power levels and attenuation for one ONU.
    pub async fn get_attenuation(&self, slot_port: &str, onu_id: u32) -> Result<Vec<Attenuation>> {
        let onu = onu_interface(slot_port, onu_id)?;
        let output = self
            .query(format!("show pon power attenuation {}", onu))
            .await?;
        Ok(parse::parse_attenuation_info(&output))
    }

    /// OLT identification and uptime (`show system-group`).
    pub async fn get_system_group(&self) -> Result<SystemGroup> {
        let output = self.query("show system-group".to_string()).await?;
        Ok(parse::parse_system_group(&output))
    }

    /// Installed cards (`show card`).
    pub async fn get_cards(&self) -> Result<Vec<OltCard>> {
        let output = self.query("show card".to_string()).await?;
        Ok(parse::parse_olt_cards(&output))
    }

    /// Detail for the card in one slot.
    pub async fn get_card_detail(&self, rack: u32, shelf: u32, slot: u32) -> Result<OltCardDetail> {
        let output = self
            .query(format!("show card rack {} shelf {} slot {}", rack, shelf, slot))
            .await?;
        Ok(parse::parse_olt_card_detail(&output))
    }

    /// Log out and drop the session. The next call reconnects.
    pub async fn disconnect(&self) -> Result<()> {
        self.serializer.acquire().await.close().await
    }
}

/// Output of a response, logging device rejections.
///
/// Parsers turn rejected output into empty results rather than failing.
fn checked(response: Response) -> String {
    if let Some(failure) = &response.failure_message {
        warn!("'{}' rejected by device: {}", response.command, failure);
    }
    response.result
}

fn onu_interface(slot_port: &str, onu_id: u32) -> std::result::Result<String, ProvisioningError> {
    validate_slot_port(slot_port)?;
    Ok(format!("gpon-onu_{}:{}", slot_port, onu_id))
}
