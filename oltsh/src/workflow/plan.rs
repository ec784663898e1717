//! Provisioning plans: the exact command sequences, built before any I/O.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProvisioningError;
use crate::executor::MASK;

/// Site-wide values used when building registration plans.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisioningDefaults {
    /// VLAN profile name used for PPPoE when none is given; `{vlan}` is
    /// replaced with the VLAN id.
    pub vlan_profile_template: String,

    pub tcont_id: u32,
    pub gemport_id: u32,
    pub service_port_id: u32,
    pub vport: u32,
    pub service_id: u32,
}

impl Default for ProvisioningDefaults {
    fn default() -> Self {
        Self {
            vlan_profile_template: "netmedia{vlan}".to_string(),
            tcont_id: 1,
            gemport_id: 1,
            service_port_id: 1,
            vport: 1,
            service_id: 1,
        }
    }
}

impl ProvisioningDefaults {
    fn vlan_profile(&self, vlan: u16) -> Result<String, ProvisioningError> {
        let profile = self
            .vlan_profile_template
            .replace("{vlan}", &vlan.to_string());
        token("vlan_profile_template", &profile)?;
        Ok(profile)
    }
}

/// Everything needed to register one ONU.
#[derive(Debug, Clone)]
pub struct OnuRegistration {
    pub slot_port: String,
    pub onu_id: u32,
    pub serial: String,
    pub onu_type: String,
    /// tcont bandwidth profile, e.g. `20M`.
    pub bandwidth_profile: String,
    pub vlan: Option<u16>,
    pub pppoe_username: Option<String>,
    pub pppoe_password: Option<SecretString>,
    /// Overrides the profile rendered from the template.
    pub vlan_profile: Option<String>,
    /// Defaults to the bandwidth profile.
    pub upstream_limit: Option<String>,
    /// Defaults to the bandwidth profile.
    pub downstream_limit: Option<String>,
}

impl OnuRegistration {
    pub fn new(
        slot_port: impl Into<String>,
        onu_id: u32,
        serial: impl Into<String>,
        onu_type: impl Into<String>,
        bandwidth_profile: impl Into<String>,
    ) -> Self {
        Self {
            slot_port: slot_port.into(),
            onu_id,
            serial: serial.into(),
            onu_type: onu_type.into(),
            bandwidth_profile: bandwidth_profile.into(),
            vlan: None,
            pppoe_username: None,
            pppoe_password: None,
            vlan_profile: None,
            upstream_limit: None,
            downstream_limit: None,
        }
    }

    pub fn vlan(mut self, vlan: u16) -> Self {
        self.vlan = Some(vlan);
        self
    }

    pub fn pppoe(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.pppoe_username = Some(username.into());
        self.pppoe_password = Some(SecretString::from(password.into()));
        self
    }

    pub fn vlan_profile(mut self, profile: impl Into<String>) -> Self {
        self.vlan_profile = Some(profile.into());
        self
    }

    pub fn traffic_limits(mut self, upstream: impl Into<String>, downstream: impl Into<String>) -> Self {
        self.upstream_limit = Some(upstream.into());
        self.downstream_limit = Some(downstream.into());
        self
    }

    fn validate(&self) -> Result<(), ProvisioningError> {
        validate_slot_port(&self.slot_port)?;
        validate_onu_id(self.onu_id)?;
        token("serial", &self.serial)?;
        token("onu_type", &self.onu_type)?;
        token("bandwidth_profile", &self.bandwidth_profile)?;
        for (field, value) in [
            ("upstream_limit", &self.upstream_limit),
            ("downstream_limit", &self.downstream_limit),
            ("vlan_profile", &self.vlan_profile),
        ] {
            if let Some(value) = value {
                token(field, value)?;
            }
        }
        if let Some(vlan) = self.vlan {
            if !(1..=4094).contains(&vlan) {
                return Err(invalid("vlan", format!("{} is outside 1-4094", vlan)));
            }
        }
        match (&self.pppoe_username, &self.pppoe_password) {
            (Some(username), Some(password)) => {
                token("pppoe_username", username)?;
                token("pppoe_password", password.expose_secret())?;
            }
            (Some(_), None) => return Err(invalid("pppoe_password", "required with a username")),
            (None, Some(_)) => return Err(invalid("pppoe_username", "required with a password")),
            (None, None) => {}
        }
        Ok(())
    }
}

/// The configuration context a step runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// `interface gpon-olt_<slot/port>`
    OltInterface,
    /// `interface gpon-onu_<slot/port>:<id>`
    OnuInterface,
    /// `pon-onu-mng gpon-onu_<slot/port>:<id>`
    OnuManagement,
}

/// One command of a plan.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub stage: Stage,
    command: String,
    display: String,
    secret: Option<SecretString>,
}

impl PlanStep {
    fn new(stage: Stage, command: String) -> Self {
        Self {
            stage,
            display: command.clone(),
            command,
            secret: None,
        }
    }

    fn masked(stage: Stage, command: String, display: String, secret: SecretString) -> Self {
        Self {
            stage,
            command,
            display,
            secret: Some(secret),
        }
    }

    /// Value that must be masked wherever it shows up in device output.
    pub fn secret(&self) -> Option<&SecretString> {
        self.secret.as_ref()
    }

    /// The command as sent to the device.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The command with secrets masked.
    pub fn display(&self) -> &str {
        &self.display
    }
}

/// An ordered, validated list of commands for one provisioning operation.
///
/// Steps run strictly in order; the plan starts and ends in global
/// configuration mode.
#[derive(Debug, Clone)]
pub struct ProvisioningPlan {
    operation: &'static str,
    steps: Vec<PlanStep>,
}

impl ProvisioningPlan {
    /// Plan for registering and configuring a new ONU.
    pub fn register(
        params: &OnuRegistration,
        defaults: &ProvisioningDefaults,
    ) -> Result<Self, ProvisioningError> {
        params.validate()?;

        let sp = &params.slot_port;
        let id = params.onu_id;
        let tcont = defaults.tcont_id;
        let gemport = defaults.gemport_id;
        let upstream = params
            .upstream_limit
            .as_deref()
            .unwrap_or(&params.bandwidth_profile);
        let downstream = params
            .downstream_limit
            .as_deref()
            .unwrap_or(&params.bandwidth_profile);

        let mut steps = Vec::new();
        let mut push = |stage, command: String| steps.push(PlanStep::new(stage, command));

        push(Stage::OltInterface, format!("interface gpon-olt_{}", sp));
        push(
            Stage::OltInterface,
            format!("onu {} type {} sn {}", id, params.onu_type, params.serial),
        );
        push(Stage::OltInterface, "exit".to_string());

        push(Stage::OnuInterface, format!("interface gpon-onu_{}:{}", sp, id));
        push(
            Stage::OnuInterface,
            format!("tcont {} profile {}", tcont, params.bandwidth_profile),
        );
        push(Stage::OnuInterface, format!("gemport {} tcont {}", gemport, tcont));
        push(
            Stage::OnuInterface,
            format!(
                "gemport {} traffic-limit upstream {} downstream {}",
                gemport, upstream, downstream
            ),
        );
        if let Some(vlan) = params.vlan {
            push(
                Stage::OnuInterface,
                format!(
                    "service-port {} vport {} user-vlan {} vlan {}",
                    defaults.service_port_id, defaults.vport, vlan, vlan
                ),
            );
        }
        push(Stage::OnuInterface, "exit".to_string());

        push(Stage::OnuManagement, format!("pon-onu-mng gpon-onu_{}:{}", sp, id));
        if let Some(vlan) = params.vlan {
            push(
                Stage::OnuManagement,
                format!("service {} gemport {} vlan {}", defaults.service_id, gemport, vlan),
            );
        }
        if let (Some(username), Some(password)) = (&params.pppoe_username, &params.pppoe_password) {
            let profile = match (&params.vlan_profile, params.vlan) {
                (Some(profile), _) => Some(profile.clone()),
                (None, Some(vlan)) => Some(defaults.vlan_profile(vlan)?),
                (None, None) => None,
            };
            let profile_clause = profile
                .map(|p| format!(" vlan-profile {}", p))
                .unwrap_or_default();
            let wan_ip = |password: &str| {
                format!(
                    "wan-ip 1 mode pppoe username {} password {}{} host 1",
                    username, password, profile_clause
                )
            };
            steps.push(PlanStep::masked(
                Stage::OnuManagement,
                wan_ip(password.expose_secret()),
                wan_ip(MASK),
                password.clone(),
            ));
        }
        steps.push(PlanStep::new(Stage::OnuManagement, "exit".to_string()));

        Ok(Self {
            operation: "register_onu",
            steps,
        })
    }

    /// Plan for removing an ONU from its port.
    pub fn delete(slot_port: &str, onu_id: u32) -> Result<Self, ProvisioningError> {
        validate_slot_port(slot_port)?;
        validate_onu_id(onu_id)?;

        let steps = vec![
            PlanStep::new(Stage::OltInterface, format!("interface gpon-olt_{}", slot_port)),
            PlanStep::new(Stage::OltInterface, format!("no onu {}", onu_id)),
            PlanStep::new(Stage::OltInterface, "exit".to_string()),
        ];

        Ok(Self {
            operation: "delete_onu",
            steps,
        })
    }

    /// Name of the operation (`register_onu`, `delete_onu`).
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Commands with secrets masked, in execution order.
    pub fn display_commands(&self) -> Vec<&str> {
        self.steps.iter().map(PlanStep::display).collect()
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ProvisioningError {
    ProvisioningError::InvalidRequest {
        field,
        message: message.into(),
    }
}

/// A single CLI word: non-empty, no whitespace or control characters.
fn token(field: &'static str, value: &str) -> Result<(), ProvisioningError> {
    if value.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(field, "must not contain whitespace or control characters"));
    }
    Ok(())
}

pub(crate) fn validate_slot_port(slot_port: &str) -> Result<(), ProvisioningError> {
    let parts: Vec<&str> = slot_port.split('/').collect();
    let valid = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(invalid(
            "slot_port",
            format!("'{}' is not a rack/shelf/slot path like 1/2/1", slot_port),
        ))
    }
}

fn validate_onu_id(onu_id: u32) -> Result<(), ProvisioningError> {
    if onu_id == 0 {
        return Err(invalid("onu_id", "must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> OnuRegistration {
        OnuRegistration::new("1/1/1", 4, "ZTEGC1234", "ZTE-F609", "20M")
            .vlan(200)
            .pppoe("alice", "secret")
    }

    fn commands(plan: &ProvisioningPlan) -> Vec<&str> {
        plan.steps().iter().map(PlanStep::command).collect()
    }

    #[test]
    fn test_register_plan() {
        let plan = ProvisioningPlan::register(&alice(), &ProvisioningDefaults::default()).unwrap();
        assert_eq!(plan.operation(), "register_onu");
        assert_eq!(
            commands(&plan),
            vec![
                "interface gpon-olt_1/1/1",
                "onu 4 type ZTE-F609 sn ZTEGC1234",
                "exit",
                "interface gpon-onu_1/1/1:4",
                "tcont 1 profile 20M",
                "gemport 1 tcont 1",
                "gemport 1 traffic-limit upstream 20M downstream 20M",
                "service-port 1 vport 1 user-vlan 200 vlan 200",
                "exit",
                "pon-onu-mng gpon-onu_1/1/1:4",
                "service 1 gemport 1 vlan 200",
                "wan-ip 1 mode pppoe username alice password secret vlan-profile netmedia200 host 1",
                "exit",
            ]
        );
    }

    #[test]
    fn test_last_configuration_step_is_wan_ip() {
        let plan = ProvisioningPlan::register(&alice(), &ProvisioningDefaults::default()).unwrap();
        let steps = plan.steps();
        assert_eq!(steps[steps.len() - 1].command(), "exit");
        assert_eq!(
            steps[steps.len() - 2].command(),
            "wan-ip 1 mode pppoe username alice password secret vlan-profile netmedia200 host 1"
        );
        assert_eq!(steps[steps.len() - 2].stage, Stage::OnuManagement);
    }

    #[test]
    fn test_password_masked_in_display() {
        let plan = ProvisioningPlan::register(&alice(), &ProvisioningDefaults::default()).unwrap();
        let display = plan.display_commands();
        assert!(display.iter().all(|c| !c.contains("secret")));
        assert!(display.contains(
            &"wan-ip 1 mode pppoe username alice password ****** vlan-profile netmedia200 host 1"
        ));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let defaults = ProvisioningDefaults::default();
        let a = ProvisioningPlan::register(&alice(), &defaults).unwrap();
        let b = ProvisioningPlan::register(&alice(), &defaults).unwrap();
        assert_eq!(commands(&a), commands(&b));
        assert_eq!(a.display_commands(), b.display_commands());
    }

    #[test]
    fn test_wan_ip_step_carries_password() {
        let plan = ProvisioningPlan::register(&alice(), &ProvisioningDefaults::default()).unwrap();
        let secrets: Vec<&str> = plan
            .steps()
            .iter()
            .filter_map(|s| s.secret().map(|p| p.expose_secret()))
            .collect();
        assert_eq!(secrets, vec!["secret"]);
    }

    #[test]
    fn test_rendered_template_is_validated() {
        for template in ["net media{vlan}", "netmedia{vlan}\nreboot", "{vlan}\t"] {
            let defaults = ProvisioningDefaults {
                vlan_profile_template: template.into(),
                ..ProvisioningDefaults::default()
            };
            let err = ProvisioningPlan::register(&alice(), &defaults).unwrap_err();
            assert!(matches!(
                err,
                ProvisioningError::InvalidRequest { field: "vlan_profile_template", .. }
            ));
        }

        // An explicit profile bypasses the template
        let defaults = ProvisioningDefaults {
            vlan_profile_template: "net media{vlan}".into(),
            ..ProvisioningDefaults::default()
        };
        assert!(ProvisioningPlan::register(&alice().vlan_profile("inet"), &defaults).is_ok());
    }

    #[test]
    fn test_without_vlan() {
        let params = OnuRegistration::new("1/2/1", 7, "ZTEGC0007", "ZTE-F660", "50M")
            .pppoe("bob", "pw")
            .traffic_limits("10M", "50M");
        let plan = ProvisioningPlan::register(&params, &ProvisioningDefaults::default()).unwrap();
        let cmds = commands(&plan);

        assert!(!cmds.iter().any(|c| c.starts_with("service")));
        assert!(cmds.contains(&"gemport 1 traffic-limit upstream 10M downstream 50M"));
        // No VLAN and no explicit profile: the clause is omitted
        assert!(cmds.contains(&"wan-ip 1 mode pppoe username bob password pw host 1"));
    }

    #[test]
    fn test_explicit_profile_and_template() {
        let defaults = ProvisioningDefaults {
            vlan_profile_template: "vp-{vlan}-inet".into(),
            ..ProvisioningDefaults::default()
        };
        let plan = ProvisioningPlan::register(&alice(), &defaults).unwrap();
        assert!(commands(&plan).iter().any(|c| c.contains("vlan-profile vp-200-inet ")));

        let plan = ProvisioningPlan::register(&alice().vlan_profile("custom"), &defaults).unwrap();
        assert!(commands(&plan).iter().any(|c| c.contains("vlan-profile custom ")));
    }

    #[test]
    fn test_without_pppoe() {
        let params = OnuRegistration::new("1/1/1", 4, "ZTEGC1234", "ZTE-F609", "20M").vlan(200);
        let plan = ProvisioningPlan::register(&params, &ProvisioningDefaults::default()).unwrap();
        let cmds = commands(&plan);
        assert!(!cmds.iter().any(|c| c.starts_with("wan-ip")));
        assert_eq!(cmds[cmds.len() - 2], "service 1 gemport 1 vlan 200");
    }

    #[test]
    fn test_delete_plan() {
        let plan = ProvisioningPlan::delete("1/1/1", 4).unwrap();
        assert_eq!(plan.operation(), "delete_onu");
        assert_eq!(
            commands(&plan),
            vec!["interface gpon-olt_1/1/1", "no onu 4", "exit"]
        );
        assert!(plan.steps().iter().all(|s| s.stage == Stage::OltInterface));
    }

    #[test]
    fn test_rejects_injection() {
        let params = OnuRegistration::new("1/1/1", 4, "ZTEGC1234\nreboot", "ZTE-F609", "20M");
        let err = ProvisioningPlan::register(&params, &ProvisioningDefaults::default()).unwrap_err();
        assert!(matches!(err, ProvisioningError::InvalidRequest { field: "serial", .. }));

        let params = alice().pppoe("alice", "has space");
        let err = ProvisioningPlan::register(&params, &ProvisioningDefaults::default()).unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::InvalidRequest { field: "pppoe_password", .. }
        ));
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        assert!(ProvisioningPlan::delete("1/1", 4).is_err());
        assert!(ProvisioningPlan::delete("1/a/1", 4).is_err());
        assert!(ProvisioningPlan::delete("1/1/1", 0).is_err());

        let params = alice().vlan(5000);
        assert!(matches!(
            ProvisioningPlan::register(&params, &ProvisioningDefaults::default()),
            Err(ProvisioningError::InvalidRequest { field: "vlan", .. })
        ));

        let mut params = alice();
        params.pppoe_password = None;
        assert!(ProvisioningPlan::register(&params, &ProvisioningDefaults::default()).is_err());
    }
}
