use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::StudioError;

/// Positional identity of a grid cell.
///
/// Serialized as `"{row}_{col}"`, which is also the key format used by the
/// project document's `merges`, `hiddenCells`, and `cellData` sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.row, self.col)
    }
}

impl FromStr for CellAddress {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StudioError::Validation(format!("Invalid cell address '{s}'"));
        let (row, col) = s.split_once('_').ok_or_else(invalid)?;
        Ok(CellAddress {
            row: row.parse().map_err(|_| invalid())?,
            col: col.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for CellAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_display_uses_underscore_key() {
        assert_eq!(CellAddress::new(2, 11).to_string(), "2_11");
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert!("3".parse::<CellAddress>().is_err());
        assert!("a_1".parse::<CellAddress>().is_err());
        assert!("1_-2".parse::<CellAddress>().is_err());
        assert_eq!("4_0".parse::<CellAddress>().unwrap(), CellAddress::new(4, 0));
    }

    #[test]
    fn test_address_works_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert(CellAddress::new(0, 1), 5u32);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"0_1":5}"#);

        let back: BTreeMap<CellAddress, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&CellAddress::new(0, 1)), Some(&5));
    }

    #[test]
    fn test_ordering_is_row_major() {
        let mut cells = vec![
            CellAddress::new(1, 0),
            CellAddress::new(0, 2),
            CellAddress::new(0, 10),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                CellAddress::new(0, 2),
                CellAddress::new(0, 10),
                CellAddress::new(1, 0)
            ]
        );
    }
}
