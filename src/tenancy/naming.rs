//! Partition naming convention - the single source of truth.
//!
//! `<kind>_<32-hex principal id>` is both how partitions are created and how
//! the aggregator discovers them; no other module formats or parses these
//! names. The scheme keeps names inside Postgres' 63-byte identifier limit
//! and collision-free across the UUID space.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    Items,
    Groups,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 2] = [PartitionKind::Items, PartitionKind::Groups];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionKind::Items => "items",
            PartitionKind::Groups => "groups",
        }
    }
}

impl FromStr for PartitionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "items" => Ok(PartitionKind::Items),
            "groups" => Ok(PartitionKind::Groups),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical table name for a principal's partition of the given kind.
/// Pure and total; output contains only `[a-z0-9_]`.
pub fn partition_name(kind: PartitionKind, principal_id: Uuid) -> String {
    format!("{}_{}", kind.as_str(), principal_id.simple())
}

/// Inverse of `partition_name`: derive the owning principal id from a table
/// name. Names that do not conform exactly yield None and are ignored by
/// enumeration (the LIKE scan can over-match).
pub fn owner_of(kind: PartitionKind, table_name: &str) -> Option<Uuid> {
    let rest = table_name.strip_prefix(kind.as_str())?.strip_prefix('_')?;
    if rest.len() != 32 || !rest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return None;
    }
    Uuid::try_parse(rest).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_owner_round_trip() {
        let id = Uuid::new_v4();
        for kind in PartitionKind::ALL {
            let table = partition_name(kind, id);
            assert_eq!(owner_of(kind, &table), Some(id));
        }
    }

    #[test]
    fn names_are_distinct_per_kind_and_principal() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(
            partition_name(PartitionKind::Items, a),
            partition_name(PartitionKind::Groups, a)
        );
        assert_ne!(
            partition_name(PartitionKind::Items, a),
            partition_name(PartitionKind::Items, b)
        );
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!(owner_of(PartitionKind::Items, "items_"), None);
        assert_eq!(owner_of(PartitionKind::Items, "items_not-a-uuid"), None);
        assert_eq!(owner_of(PartitionKind::Items, "itemsxyz"), None);
        // truncated hex
        assert_eq!(owner_of(PartitionKind::Items, "items_0123abc"), None);
        // uppercase hex never appears in simple-format names
        let upper = format!("items_{}", "ABCDEF0123456789ABCDEF0123456789");
        assert_eq!(owner_of(PartitionKind::Items, &upper), None);
        // wrong kind prefix
        let id = Uuid::new_v4();
        let table = partition_name(PartitionKind::Groups, id);
        assert_eq!(owner_of(PartitionKind::Items, &table), None);
    }

    #[test]
    fn kind_parses_from_path_segments() {
        assert_eq!("items".parse::<PartitionKind>(), Ok(PartitionKind::Items));
        assert_eq!("groups".parse::<PartitionKind>(), Ok(PartitionKind::Groups));
        assert!("products".parse::<PartitionKind>().is_err());
    }
}
