//! `show system-group` output.

use serde::Serialize;

use super::text::{key_values, lookup};

const MISSING: &str = "-";

/// OLT system identification. Fields the device left out are `"-"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemGroup {
    pub description: String,
    pub object_id: String,
    pub uptime: String,
    pub contact: String,
    pub name: String,
    pub location: String,
}

pub fn parse_system_group(text: &str) -> SystemGroup {
    let fields = key_values(text);
    let get = |keys: &[&str]| {
        lookup(&fields, keys)
            .filter(|v| !v.is_empty())
            .unwrap_or(MISSING)
            .to_string()
    };

    SystemGroup {
        description: get(&["System Description", "Description"]),
        object_id: get(&["System ObjectId", "ObjectId"]),
        uptime: get(&["Started before", "System UpTime", "Uptime"]),
        contact: get(&["Contact with", "System Contact", "Contact"]),
        name: get(&["System name", "Name"]),
        location: get(&["Location", "System Location"]),
    }
}
