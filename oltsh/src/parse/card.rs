//! `show card` and `show card rack <r> shelf <s> slot <n>` output.

use serde::Serialize;

use super::text::{Columns, is_rule, lookup, multi_key_values};

const MISSING: &str = "-";

/// One row of the card table.
///
/// Missing numeric cells are 0, missing text cells `"-"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OltCard {
    pub rack: u32,
    pub shelf: u32,
    pub slot: u32,
    pub cfg_type: String,
    pub real_type: String,
    pub port: u32,
    pub hard_ver: String,
    pub soft_ver: String,
    pub status: String,
}

/// Parse the columnar card table.
///
/// Columns are located from the header line, so a card with an empty
/// `RealType` (an unplugged slot) keeps its remaining fields in place.
pub fn parse_olt_cards(text: &str) -> Vec<OltCard> {
    let mut columns: Option<Columns> = None;
    let mut cards = Vec::new();

    for line in text.lines() {
        if is_header(line) {
            columns = Some(Columns::from_header(line));
            continue;
        }
        let Some(cols) = &columns else {
            continue;
        };
        if is_rule(line) || !line.trim_start().starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }

        let cells = cols.split(line);
        let text_cell = |name: &str| {
            cells
                .get(name)
                .filter(|v| !v.is_empty())
                .map_or(MISSING.to_string(), |v| v.to_string())
        };
        let number_cell = |name: &str| {
            cells
                .get(name)
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(0)
        };

        cards.push(OltCard {
            rack: number_cell("Rack"),
            shelf: number_cell("Shelf"),
            slot: number_cell("Slot"),
            cfg_type: text_cell("CfgType"),
            real_type: text_cell("RealType"),
            port: number_cell("Port"),
            hard_ver: text_cell("HardVer"),
            soft_ver: text_cell("SoftVer"),
            status: text_cell("Status"),
        });
    }

    cards
}

fn is_header(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some("Rack") && line.contains("Slot")
}

/// Detail for a single card. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OltCardDetail {
    pub rack: String,
    pub shelf: String,
    pub slot: String,
    pub cfg_type: String,
    pub real_type: String,
    pub status: String,
    pub port_count: String,
    pub serial: String,
    pub hardware_version: String,
    pub software_version: String,
    pub memory_mb: String,
    pub cpu_usage: String,
    pub uptime: String,
    pub last_restart_reason: String,
}

/// Parse a card detail dump; a line may carry several `key: value` pairs.
pub fn parse_olt_card_detail(text: &str) -> OltCardDetail {
    let fields = multi_key_values(text);
    let get = |keys: &[&str]| lookup(&fields, keys).unwrap_or_default().to_string();

    OltCardDetail {
        rack: get(&["Rack"]),
        shelf: get(&["Shelf"]),
        slot: get(&["Slot"]),
        cfg_type: get(&["Config-Type", "CfgType"]),
        real_type: get(&["Real-Type", "RealType"]),
        status: get(&["Status"]),
        port_count: get(&["Port-Number", "Port"]),
        serial: get(&["Serial-Number", "SerialNumber"]),
        hardware_version: get(&["Hardware-VER", "HardVer"]),
        software_version: get(&["Software-VER", "SoftVer"]),
        memory_mb: get(&["Phy-Memory-Size(MB)", "Memory-Size(MB)"]),
        cpu_usage: get(&["Cpu-Usage(%)", "CPU-Usage(%)"]),
        uptime: get(&["Uptime"]),
        last_restart_reason: get(&["Last-Restart-Reason"]),
    }
}
