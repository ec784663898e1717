//! `show gpon onu state` output.
//!
//! ```text
//! OnuIndex   Admin State  OMCC State  Phase State  Channel
//! --------------------------------------------------------------
//! 1/2/1:1    enable       enable      working      1(GPON)
//! 1/2/1:2    enable       disable     LOS          1(GPON)
//! ONU Number: 2/2
//! ```

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static STATE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:gpon-onu_)?(\d+/\d+/\d+):(\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)")
        .expect("static regex")
});

/// One ONU row of the state table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnuStateEntry {
    pub slot_port: String,
    pub onu_id: u32,
    pub admin_state: String,
    pub omcc_state: String,
    pub phase_state: String,
    pub channel: String,
}

impl OnuStateEntry {
    /// An ONU is online when its phase state is `working`.
    pub fn is_online(&self) -> bool {
        self.phase_state.eq_ignore_ascii_case("working")
    }
}

/// Health of a PON port derived from its ONU counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Healthy,
    Partial,
    Down,
}

impl PortStatus {
    /// Down when nothing registered is online, partial when only some are.
    pub fn from_counts(registered: usize, online: usize) -> Self {
        if registered > 0 && online == 0 {
            PortStatus::Down
        } else if online > 0 && online < registered {
            PortStatus::Partial
        } else {
            PortStatus::Healthy
        }
    }
}

impl std::fmt::Display for PortStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PortStatus::Healthy => "healthy",
            PortStatus::Partial => "partial",
            PortStatus::Down => "down",
        };
        f.write_str(s)
    }
}

/// ONU counts for one slot/port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortAggregate {
    pub port: String,
    pub registered: usize,
    pub online: usize,
    pub offline: usize,
    pub status: PortStatus,
}

/// Parse every ONU row. Banner, header, separator and summary lines are
/// skipped.
pub fn parse_onu_state_entries(text: &str) -> Vec<OnuStateEntry> {
    text.lines()
        .filter_map(|line| {
            let caps = STATE_LINE.captures(line)?;
            Some(OnuStateEntry {
                slot_port: caps[1].to_string(),
                onu_id: caps[2].parse().ok()?,
                admin_state: caps[3].to_string(),
                omcc_state: caps[4].to_string(),
                phase_state: caps[5].to_string(),
                channel: caps[6].to_string(),
            })
        })
        .collect()
}

/// Aggregate the state table per slot/port, in order of first appearance.
pub fn parse_onu_state(text: &str) -> Vec<PortAggregate> {
    let mut counts: IndexMap<String, (usize, usize)> = IndexMap::new();

    for entry in parse_onu_state_entries(text) {
        let (registered, online) = counts.entry(entry.slot_port.clone()).or_default();
        *registered += 1;
        if entry.is_online() {
            *online += 1;
        }
    }

    counts
        .into_iter()
        .map(|(port, (registered, online))| PortAggregate {
            port,
            registered,
            online,
            offline: registered - online,
            status: PortStatus::from_counts(registered, online),
        })
        .collect()
}
