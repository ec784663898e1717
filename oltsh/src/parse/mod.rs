//! Structured records from ZXAN command output.
//!
//! Every parser is a pure function from text to records. Lines that do not
//! fit the expected shape are dropped and absent fields get defaults, so
//! firmware drift degrades the result instead of failing the call.

mod attenuation;
mod card;
mod onu_config;
mod onu_detail;
mod onu_state;
mod system;
mod text;
mod unconfigured;

pub use attenuation::{Attenuation, parse_attenuation_info};
pub use card::{OltCard, OltCardDetail, parse_olt_card_detail, parse_olt_cards};
pub use onu_config::{OnuRecord, merge_onu_states, parse_onu_details};
pub use onu_detail::{OnuDetail, parse_onu_detail};
pub use onu_state::{OnuStateEntry, PortAggregate, PortStatus, parse_onu_state, parse_onu_state_entries};
pub use system::{SystemGroup, parse_system_group};
pub use unconfigured::{UnconfiguredOnu, parse_unconfigured_onus};
