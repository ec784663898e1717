//! `show gpon onu uncfg` output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static UNCFG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(gpon-onu_(\d+/\d+/\d+):(\d+))\s+(\S+)\s+(\S+)").expect("static regex")
});

/// An ONU the OLT sees on a port but has no configuration for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnconfiguredOnu {
    pub interface: String,
    pub slot_port: String,
    pub onu_id: u32,
    pub serial: String,
    pub state: String,
}

/// One record per candidate line; headers, rules and notices are skipped.
pub fn parse_unconfigured_onus(text: &str) -> Vec<UnconfiguredOnu> {
    text.lines()
        .filter_map(|line| {
            let caps = UNCFG_LINE.captures(line)?;
            Some(UnconfiguredOnu {
                interface: caps[1].to_string(),
                slot_port: caps[2].to_string(),
                onu_id: caps[3].parse().ok()?,
                serial: caps[4].to_string(),
                state: caps[5].to_string(),
            })
        })
        .collect()
}
