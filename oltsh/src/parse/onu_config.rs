//! ONU records from `show running-config`.
//!
//! The configuration describes each ONU in three places:
//!
//! ```text
//! interface gpon-olt_1/2/1
//!   onu 1 type ZTE-F609 sn ZTEGC1234567
//! !
//! interface gpon-onu_1/2/1:1
//!   name alice
//!   tcont 1 profile 20M
//! !
//! pon-onu-mng gpon-onu_1/2/1:1
//!   service 1 gemport 1 vlan 200
//!   wan-ip 1 mode pppoe username alice password secret vlan-profile netmedia200 host 1
//! !
//! ```
//!
//! Records are seeded from the OLT interface blocks, then each ONU block is
//! merged into the record with the same `(slot/port, id)` key only.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::onu_state::OnuStateEntry;

static OLT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^interface\s+gpon-olt_(\d+/\d+/\d+)\s*$").expect("static regex"));
static ONU_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^interface\s+gpon-onu_(\d+/\d+/\d+):(\d+)\s*$").expect("static regex")
});
static MNG_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^pon-onu-mng\s+gpon-onu_(\d+/\d+/\d+):(\d+)\s*$").expect("static regex")
});

static ONU_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^onu\s+(\d+)\s+type\s+(\S+)\s+(?:sn|loid|pw)\s+(\S+)").expect("static regex")
});
static SERVICE_VLAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^service\s+\S+\s+(?:gemport\s+\d+\s+)?vlan\s+(\d+)").expect("static regex")
});
static WAN_IP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^wan-ip\s+\d+\s+mode\s+pppoe\b").expect("static regex"));
static TCONT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^tcont\s+\d+\s+(?:name\s+\S+\s+)?profile\s+(\S+)").expect("static regex")
});

/// An ONU as configured on the OLT, optionally merged with its live state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OnuRecord {
    /// `gpon-onu_<slot/port>:<id>`
    pub interface: String,
    pub slot_port: String,
    pub onu_id: u32,
    pub onu_type: String,
    pub serial: String,
    pub name: String,
    pub description: String,
    pub vlan: Option<u16>,
    pub pppoe_username: Option<String>,
    #[serde(skip_serializing)]
    pub pppoe_password: Option<String>,
    pub vlan_profile: Option<String>,
    pub bandwidth_profile: Option<String>,
    pub admin_state: String,
    pub omcc_state: String,
    pub phase_state: String,
    pub channel: String,
}

type Key = (String, u32);

/// A top-level configuration block and its indented body.
struct Block<'a> {
    header: &'a str,
    body: Vec<&'a str>,
}

fn blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks: Vec<Block<'_>> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == "!" {
            // Closes the block; the next header starts a new one
            blocks.push(Block {
                header: "",
                body: Vec::new(),
            });
            continue;
        }
        if !raw.starts_with(char::is_whitespace) {
            blocks.push(Block {
                header: line,
                body: Vec::new(),
            });
        } else if let Some(block) = blocks.last_mut() {
            block.body.push(line.trim());
        }
    }

    blocks.retain(|b| !b.header.is_empty());
    blocks
}

/// Build ONU records from a running-config dump.
///
/// ONU blocks for IDs that have no `onu ... type ... sn ...` line under an
/// OLT interface are ignored. Records come out in configuration order.
pub fn parse_onu_details(config: &str) -> Vec<OnuRecord> {
    let blocks = blocks(config);
    let mut records: IndexMap<Key, OnuRecord> = IndexMap::new();

    // Seed from the OLT interfaces
    for block in &blocks {
        let Some(caps) = OLT_BLOCK.captures(block.header) else {
            continue;
        };
        let slot_port = &caps[1];
        for line in &block.body {
            let Some(onu) = ONU_LINE.captures(line) else {
                continue;
            };
            let Ok(onu_id) = onu[1].parse::<u32>() else {
                continue;
            };
            records
                .entry((slot_port.to_string(), onu_id))
                .or_insert_with(|| OnuRecord {
                    interface: format!("gpon-onu_{}:{}", slot_port, onu_id),
                    slot_port: slot_port.to_string(),
                    onu_id,
                    onu_type: onu[2].to_string(),
                    serial: onu[3].to_string(),
                    ..OnuRecord::default()
                });
        }
    }

    // VLAN and PPPoE from the management blocks
    for (record, block) in keyed(&blocks, &MNG_BLOCK, &mut records) {
        for line in &block.body {
            if let Some(caps) = SERVICE_VLAN.captures(line) {
                if record.vlan.is_none() {
                    record.vlan = caps[1].parse().ok();
                }
            } else if WAN_IP.is_match(line) {
                record.pppoe_username = word_after(line, "username");
                record.pppoe_password = word_after(line, "password");
                record.vlan_profile = word_after(line, "vlan-profile");
            }
        }
    }

    // Bandwidth profile and naming from the ONU interfaces
    for (record, block) in keyed(&blocks, &ONU_BLOCK, &mut records) {
        for line in &block.body {
            if let Some(caps) = TCONT.captures(line) {
                if record.bandwidth_profile.is_none() {
                    record.bandwidth_profile = Some(caps[1].to_string());
                }
            } else if let Some(name) = line.strip_prefix("name ") {
                record.name = name.trim().to_string();
            } else if let Some(description) = line.strip_prefix("description ") {
                record.description = description.trim().to_string();
            }
        }
    }

    records.into_values().collect()
}

/// Pair every block whose header matches `header` with its seeded record.
fn keyed<'r, 'b>(
    blocks: &'b [Block<'b>],
    header: &Regex,
    records: &'r mut IndexMap<Key, OnuRecord>,
) -> Vec<(&'r mut OnuRecord, &'b Block<'b>)> {
    let wanted: IndexMap<Key, &'b Block<'b>> = blocks
        .iter()
        .filter_map(|block| {
            let caps = header.captures(block.header)?;
            let onu_id = caps[2].parse::<u32>().ok()?;
            Some(((caps[1].to_string(), onu_id), block))
        })
        .collect();

    records
        .iter_mut()
        .filter_map(|(key, record)| wanted.get(key).map(|block| (record, *block)))
        .collect()
}

fn word_after(line: &str, keyword: &str) -> Option<String> {
    let mut words = line.split_whitespace();
    words.find(|w| *w == keyword)?;
    words.next().map(str::to_string)
}

/// Fill admin/OMCC/phase state and channel from `show gpon onu state` rows.
pub fn merge_onu_states(records: &mut [OnuRecord], entries: &[OnuStateEntry]) {
    let by_key: IndexMap<(&str, u32), &OnuStateEntry> = entries
        .iter()
        .map(|e| ((e.slot_port.as_str(), e.onu_id), e))
        .collect();

    for record in records {
        if let Some(entry) = by_key.get(&(record.slot_port.as_str(), record.onu_id)) {
            record.admin_state = entry.admin_state.clone();
            record.omcc_state = entry.omcc_state.clone();
            record.phase_state = entry.phase_state.clone();
            record.channel = entry.channel.clone();
        }
    }
}
