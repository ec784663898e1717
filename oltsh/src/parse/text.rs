//! Line-level helpers shared by the parsers.

use indexmap::IndexMap;

/// Whether a line is a separator rule (`-----`, `=====`, `!`).
pub(crate) fn is_rule(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| matches!(c, '-' | '=' | '!' | '+' | ' '))
}

/// Split `key: value` at the first colon.
///
/// Keys must start with a letter, which keeps timestamps and table rows
/// from being read as pairs.
pub(crate) fn split_pair(segment: &str) -> Option<(&str, &str)> {
    let (key, value) = segment.split_once(':')?;
    let key = key.trim();
    if !key.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((key, value.trim()))
}

/// Collect one `key: value` pair per line. The first occurrence of a key wins.
pub(crate) fn key_values(text: &str) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for line in text.lines() {
        if let Some((key, value)) = split_pair(line) {
            map.entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    map
}

/// Collect `key: value` pairs where a line may hold several of them,
/// separated by two or more spaces (`Rack: 1    Shelf: 1    Slot: 3`).
///
/// A segment that is not itself a pair continues the previous value.
pub(crate) fn multi_key_values(text: &str) -> IndexMap<String, String> {
    let mut map: IndexMap<String, String> = IndexMap::new();

    for line in text.lines() {
        if is_rule(line) {
            continue;
        }
        let mut current: Option<String> = None;
        for segment in split_wide(line) {
            match split_pair(segment).filter(|(key, _)| is_plain_key(key)) {
                Some((key, value)) => {
                    map.entry(key.to_string())
                        .or_insert_with(|| value.to_string());
                    current = Some(key.to_string());
                }
                None => {
                    if let Some(value) = current.as_ref().and_then(|k| map.get_mut(k)) {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(segment);
                    }
                }
            }
        }
    }
    map
}

fn is_plain_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '(' | ')' | '%' | '/' | '.'))
}

/// Split a line on runs of two or more whitespace characters.
fn split_wide(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = None;
    let mut gap = 0;
    let mut gap_start = 0;

    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if gap == 0 {
                gap_start = i;
            }
            gap += 1;
            continue;
        }
        if gap >= 2 {
            if let Some(s) = start.take() {
                segments.push(line[s..gap_start].trim());
            }
        }
        if start.is_none() {
            start = Some(i);
        }
        gap = 0;
    }
    if let Some(s) = start {
        segments.push(line[s..].trim());
    }
    segments.retain(|s| !s.is_empty());
    segments
}

/// Case-insensitive lookup in a key/value map.
pub(crate) fn lookup<'a>(map: &'a IndexMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|wanted| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.as_str())
    })
}

/// Column layout derived from a table header line.
///
/// Cells are cut at the header words' start offsets, so a blank cell stays
/// blank instead of shifting the rest of the row left.
#[derive(Debug, Clone)]
pub(crate) struct Columns {
    names: Vec<String>,
    starts: Vec<usize>,
}

impl Columns {
    pub fn from_header(header: &str) -> Self {
        let mut names = Vec::new();
        let mut starts = Vec::new();
        let mut in_word = false;

        for (i, c) in header.char_indices() {
            if c.is_whitespace() {
                in_word = false;
            } else if !in_word {
                in_word = true;
                starts.push(i);
                names.push(String::new());
            }
            if in_word {
                if let Some(name) = names.last_mut() {
                    name.push(c);
                }
            }
        }
        Self { names, starts }
    }

    /// Map every column name to its cell in `row`. Missing cells are empty.
    pub fn split<'a>(&self, row: &'a str) -> IndexMap<&str, &'a str> {
        let mut bounds: Vec<usize> = self.starts.iter().map(|&s| s.min(row.len())).collect();
        bounds.push(row.len());

        // A value running past its column pushes the boundary to the next gap
        for i in 1..bounds.len() - 1 {
            let mut b = bounds[i].max(bounds[i - 1]);
            while b < row.len() && !row.is_char_boundary(b) {
                b += 1;
            }
            while b > 0 && b < row.len() && !ends_word(row, b) {
                b += row[b..].chars().next().map_or(1, char::len_utf8);
            }
            bounds[i] = b;
        }

        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let cell = row.get(bounds[i]..bounds[i + 1]).unwrap_or("").trim();
                (name.as_str(), cell)
            })
            .collect()
    }
}

/// Whether `at` sits at a gap: either side is whitespace.
fn ends_word(row: &str, at: usize) -> bool {
    let before = row[..at].chars().next_back().is_none_or(char::is_whitespace);
    let after = row[at..].chars().next().is_none_or(char::is_whitespace);
    before || after
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_values_first_wins() {
        let map = key_values("Name: a\nBad line\nname2 : b\nName: c\n2024-01-01 10:00:00");
        assert_eq!(map.get("Name").map(String::as_str), Some("a"));
        assert_eq!(map.get("name2").map(String::as_str), Some("b"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_value_keeps_colons() {
        let map = key_values("ONU interface:   gpon-onu_1/2/1:1");
        assert_eq!(lookup(&map, &["onu interface"]), Some("gpon-onu_1/2/1:1"));
    }

    #[test]
    fn test_multi_key_values() {
        let map = multi_key_values(
            "Rack: 1    Shelf: 1    Slot: 3\nStatus:      INSERVICE\nUptime: 10 days 2 hours",
        );
        assert_eq!(lookup(&map, &["slot"]), Some("3"));
        assert_eq!(lookup(&map, &["status"]), Some("INSERVICE"));
        assert_eq!(lookup(&map, &["uptime"]), Some("10 days 2 hours"));
    }

    #[test]
    fn test_columns_keep_blank_cells() {
        let header = "Rack Shelf Slot CfgType RealType Port  Status";
        let row = "1    1     2    GTGO             8     OFFLINE";
        let cols = Columns::from_header(header);
        let cells = cols.split(row);
        assert_eq!(cells["Slot"], "2");
        assert_eq!(cells["CfgType"], "GTGO");
        assert_eq!(cells["RealType"], "");
        assert_eq!(cells["Port"], "8");
        assert_eq!(cells["Status"], "OFFLINE");
    }

    #[test]
    fn test_columns_overlong_value() {
        let cols = Columns::from_header("Port HardVer SoftVer Status");
        let cells = cols.split("8    V1.2.0  V2.1.0P3T INSERVICE");
        assert_eq!(cells["Port"], "8");
        assert_eq!(cells["HardVer"], "V1.2.0");
        assert_eq!(cells["SoftVer"], "V2.1.0P3T");
        assert_eq!(cells["Status"], "INSERVICE");
    }

    #[test]
    fn test_columns_short_row() {
        let cols = Columns::from_header("Rack Shelf Slot Status");
        let cells = cols.split("1    1");
        assert_eq!(cells["Shelf"], "1");
        assert_eq!(cells["Slot"], "");
        assert_eq!(cells["Status"], "");
    }

    #[test]
    fn test_is_rule() {
        assert!(is_rule("-----------"));
        assert!(is_rule("!"));
        assert!(!is_rule(""));
        assert!(!is_rule("1/2/1:1"));
    }
}
