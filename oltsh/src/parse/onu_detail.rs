//! `show gpon onu detail-info gpon-onu_<slot/port>:<id>` output.

use indexmap::IndexMap;
use serde::Serialize;

use super::text::{is_rule, key_values, lookup};

/// Detail dump for a single ONU. Absent keys are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OnuDetail {
    pub interface: String,
    pub name: String,
    pub onu_type: String,
    pub state: String,
    pub admin_state: String,
    pub phase_state: String,
    pub channel: String,
    pub serial: String,
    pub description: String,
    pub distance: String,
    pub online_duration: String,
    /// Every `key: value` pair of the dump, in device order.
    pub fields: IndexMap<String, String>,
}

/// Parse the key/value section of a detail dump.
///
/// The authentication history table that follows the first rule line is
/// ignored.
pub fn parse_onu_detail(text: &str) -> OnuDetail {
    let head: Vec<&str> = text.lines().take_while(|line| !is_rule(line)).collect();
    let fields = key_values(&head.join("\n"));

    let get = |keys: &[&str]| lookup(&fields, keys).unwrap_or_default().to_string();

    OnuDetail {
        interface: get(&["ONU interface", "Interface"]),
        name: get(&["Name"]),
        onu_type: get(&["Type"]),
        state: get(&["State"]),
        admin_state: get(&["Admin state"]),
        phase_state: get(&["Phase state"]),
        channel: get(&["Configured channel", "Channel"]),
        serial: get(&["Serial number", "SN"]),
        description: get(&["Description"]),
        distance: get(&["ONU Distance", "Distance"]),
        online_duration: get(&["Online Duration"]),
        fields,
    }
}
