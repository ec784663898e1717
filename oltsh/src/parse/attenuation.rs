//! `show pon power attenuation gpon-onu_<slot/port>:<id>` output.
//!
//! ```text
//!            OLT                  ONU              Attenuation
//! --------------------------------------------------------------------------
//!  up      Rx :-20.123(dbm)      Tx:2.456(dbm)        22.579(dB)
//!
//!  down    Tx :5.678(dbm)        Rx:-18.901(dbm)      24.579(dB)
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bRx\s*:\s*(-?\d+(?:\.\d+)?)").expect("static regex"));
static TX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bTx\s*:\s*(-?\d+(?:\.\d+)?)").expect("static regex"));
static ATTENUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*\(dB\)").expect("static regex"));

/// Optical levels for one direction, in dBm (attenuation in dB).
///
/// Values the device did not report are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attenuation {
    /// `up` or `down`.
    pub direction: String,
    pub rx: f64,
    pub tx: f64,
    pub attenuation_db: f64,
}

/// One record per line starting with `up` or `down`.
pub fn parse_attenuation_info(text: &str) -> Vec<Attenuation> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let direction = line.split_whitespace().next()?.to_ascii_lowercase();
            if direction != "up" && direction != "down" {
                return None;
            }
            Some(Attenuation {
                direction,
                rx: number(&RX, line),
                tx: number(&TX, line),
                attenuation_db: number(&ATTENUATION, line),
            })
        })
        .collect()
}

fn number(pattern: &Regex, line: &str) -> f64 {
    pattern
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_directions() {
        let text = "\
           OLT                  ONU              Attenuation
--------------------------------------------------------------------------
 up      Rx :-20.123(dbm)      Tx:2.456(dbm)        22.579(dB)

 down    Tx :5.678(dbm)        Rx:-18.901(dbm)      24.579(dB)
";
        let levels = parse_attenuation_info(text);
        assert_eq!(levels.len(), 2);

        assert_eq!(levels[0].direction, "up");
        assert_eq!(levels[0].rx, -20.123);
        assert_eq!(levels[0].tx, 2.456);
        assert_eq!(levels[0].attenuation_db, 22.579);

        assert_eq!(levels[1].direction, "down");
        assert_eq!(levels[1].tx, 5.678);
        assert_eq!(levels[1].rx, -18.901);
    }

    #[test]
    fn test_missing_values_are_nan() {
        let levels = parse_attenuation_info(" up      Rx :N/A(dbm)      Tx:2.456(dbm)");
        assert!(levels[0].rx.is_nan());
        assert_eq!(levels[0].tx, 2.456);
        assert!(levels[0].attenuation_db.is_nan());
    }

    #[test]
    fn test_ignores_other_lines() {
        assert!(parse_attenuation_info("update pending\nOLT ONU").is_empty());
        assert!(parse_attenuation_info("").is_empty());
    }
}
