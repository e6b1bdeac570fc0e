//! Sort key resolution.
//!
//! Each table is exported with the strongest ordering its catalog allows:
//! declared primary key, then the best unique index, then the first column.
//! Catalog read failures never escape; they only move the cascade down a tier.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::enumerator::dedupe_keep_order;
use crate::source::{DataSource, IndexColumn, PrimaryKeyColumn};

/// Position assigned to key columns whose sequence number cannot be parsed.
pub const UNKNOWN_POSITION: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKeyTier {
    PrimaryKey,
    UniqueIndex,
    FirstColumn,
    None,
}

impl SortKeyTier {
    /// Whether operators should be warned about the ordering of this table.
    pub fn is_degraded(self) -> bool {
        matches!(self, SortKeyTier::FirstColumn | SortKeyTier::None)
    }
}

impl fmt::Display for SortKeyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortKeyTier::PrimaryKey => "primary key",
            SortKeyTier::UniqueIndex => "unique index",
            SortKeyTier::FirstColumn => "first column",
            SortKeyTier::None => "none",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub columns: Vec<String>,
    pub tier: SortKeyTier,
}

impl SortKey {
    fn new(columns: Vec<String>, tier: SortKeyTier) -> Self {
        Self { columns, tier }
    }

    pub fn unordered() -> Self {
        Self::new(Vec::new(), SortKeyTier::None)
    }
}

/// Resolve the ordering columns for `table`.
pub fn resolve_order_columns(source: &dyn DataSource, table: &str) -> SortKey {
    match source.list_primary_keys(table) {
        Ok(rows) => {
            let columns = primary_key_columns(rows);
            if !columns.is_empty() {
                return SortKey::new(columns, SortKeyTier::PrimaryKey);
            }
            debug!("{}: no declared primary key", table);
        }
        Err(e) => debug!("{}: primary key lookup failed: {}", table, e),
    }

    match source.list_indexes(table, true) {
        Ok(rows) => {
            if let Some(columns) = best_unique_index(rows) {
                return SortKey::new(columns, SortKeyTier::UniqueIndex);
            }
            debug!("{}: no usable unique index", table);
        }
        Err(e) => debug!("{}: index lookup failed: {}", table, e),
    }

    match source.list_columns(table) {
        Ok(columns) => {
            if let Some(first) = dedupe_keep_order(columns).into_iter().next() {
                return SortKey::new(vec![first], SortKeyTier::FirstColumn);
            }
            debug!("{}: no columns reported", table);
        }
        Err(e) => debug!("{}: column lookup failed: {}", table, e),
    }

    SortKey::unordered()
}

fn parse_position(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(UNKNOWN_POSITION)
}

fn primary_key_columns(rows: Vec<PrimaryKeyColumn>) -> Vec<String> {
    let mut keyed: Vec<(i64, String)> = rows
        .into_iter()
        .filter_map(|row| {
            let position = parse_position(row.key_seq.as_deref());
            row.column_name.map(|name| (position, name))
        })
        .collect();
    keyed.sort_by_key(|(position, _)| *position);
    keyed.into_iter().map(|(_, name)| name).collect()
}

/// Flags that count as "unique": absent, zero or false.
fn is_unique_flag(raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        None => true,
        Some(flag) => flag == "0" || flag.eq_ignore_ascii_case("false"),
    }
}

fn best_unique_index(rows: Vec<IndexColumn>) -> Option<Vec<String>> {
    struct Group {
        name: String,
        unique: bool,
        columns: Vec<(i64, String)>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for row in rows {
        let (Some(index_name), Some(column_name)) = (row.index_name, row.column_name) else {
            continue;
        };
        let group = groups.entry(index_name.clone()).or_insert_with(|| Group {
            name: index_name,
            unique: true,
            columns: Vec::new(),
        });
        if !is_unique_flag(row.non_unique.as_deref()) {
            group.unique = false;
        }
        group
            .columns
            .push((parse_position(row.ordinal_position.as_deref()), column_name));
    }

    let winner = groups
        .into_values()
        .filter(|group| group.unique && !group.columns.is_empty())
        .min_by_key(|group| {
            let lower = group.name.to_lowercase();
            let is_primary = lower.contains("primary") || lower == "pk";
            (!is_primary, group.columns.len(), lower)
        })?;

    let mut columns = winner.columns;
    columns.sort_by_key(|(position, _)| *position);
    Some(columns.into_iter().map(|(_, name)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, MemoryTable};

    fn resolve(table: MemoryTable) -> SortKey {
        let name = table.name.clone();
        let source = MemorySource::new().with_table(table);
        resolve_order_columns(&source, &name)
    }

    fn index_row(index: Option<&str>, column: Option<&str>, ordinal: &str, flag: Option<&str>) -> IndexColumn {
        IndexColumn {
            index_name: index.map(str::to_string),
            column_name: column.map(str::to_string),
            ordinal_position: Some(ordinal.to_string()),
            non_unique: flag.map(str::to_string),
        }
    }

    #[test]
    fn test_primary_key_by_sequence() {
        let key = resolve(
            MemoryTable::new("Lines", &["Line", "OrderID", "Qty"])
                .with_primary_key(&[("Line", "2"), ("OrderID", "1")])
                .with_unique_index("ux_qty", &[("Qty", "1")]),
        );
        assert_eq!(key.tier, SortKeyTier::PrimaryKey);
        assert_eq!(key.columns, vec!["OrderID", "Line"]);
    }

    #[test]
    fn test_unparseable_key_sequence_sorts_last() {
        let key = resolve(
            MemoryTable::new("T", &["a", "b", "c"])
                .with_primary_key(&[("b", "x"), ("c", "2"), ("a", "")]),
        );
        assert_eq!(key.columns, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_unique_index_ordinals() {
        let key = resolve(
            MemoryTable::new("T", &["A", "B"]).with_unique_index("ux_ba", &[("B", "2"), ("A", "1")]),
        );
        assert_eq!(key.tier, SortKeyTier::UniqueIndex);
        assert_eq!(key.columns, vec!["A", "B"]);
        assert!(!key.tier.is_degraded());
    }

    #[test]
    fn test_unique_index_ranking() {
        let key = resolve(
            MemoryTable::new("T", &["a", "b", "c"])
                .with_unique_index("aaa_single", &[("a", "1")])
                .with_unique_index("PrimaryKey", &[("b", "1"), ("c", "2")]),
        );
        assert_eq!(key.columns, vec!["b", "c"]);

        let key = resolve(
            MemoryTable::new("T", &["a", "b", "c"])
                .with_unique_index("wide", &[("a", "1"), ("b", "2")])
                .with_unique_index("Narrow", &[("c", "1")])
                .with_unique_index("alpha", &[("b", "1")]),
        );
        assert_eq!(key.columns, vec!["b"]);
    }

    #[test]
    fn test_pk_named_index_wins() {
        let key = resolve(
            MemoryTable::new("T", &["a", "b"])
                .with_unique_index("a_index", &[("a", "1")])
                .with_unique_index("PK", &[("a", "1"), ("b", "2")]),
        );
        assert_eq!(key.columns, vec!["a", "b"]);
    }

    #[test]
    fn test_non_unique_groups_discarded() {
        let key = resolve(
            MemoryTable::new("T", &["x", "y"])
                .with_index_row(index_row(Some("ix_y"), Some("y"), "1", Some("1")))
                .with_index_row(index_row(Some("mixed"), Some("x"), "1", Some("0")))
                .with_index_row(index_row(Some("mixed"), Some("y"), "2", Some("yes")))
                .with_index_row(index_row(None, Some("x"), "1", None))
                .with_index_row(index_row(Some("orphan"), None, "1", None)),
        );
        assert_eq!(key.tier, SortKeyTier::FirstColumn);
        assert_eq!(key.columns, vec!["x"]);
    }

    #[test]
    fn test_unique_flag_spellings() {
        let key = resolve(
            MemoryTable::new("T", &["x", "y"])
                .with_index_row(index_row(Some("u1"), Some("y"), "1", Some("FALSE")))
                .with_index_row(index_row(Some("u1"), Some("x"), "2", None)),
        );
        assert_eq!(key.tier, SortKeyTier::UniqueIndex);
        assert_eq!(key.columns, vec!["y", "x"]);
    }

    #[test]
    fn test_first_column_fallback() {
        let key = resolve(MemoryTable::new("T", &["X", "Y", "Z"]));
        assert_eq!(key, SortKey::new(vec!["X".into()], SortKeyTier::FirstColumn));
        assert!(key.tier.is_degraded());
    }

    #[test]
    fn test_errors_move_down_the_cascade() {
        let key = resolve(
            MemoryTable::new("T", &["X", "Y"])
                .with_primary_key(&[("Y", "1")])
                .failing_primary_keys()
                .failing_indexes(),
        );
        assert_eq!(key.tier, SortKeyTier::FirstColumn);
        assert_eq!(key.columns, vec!["X"]);
    }

    #[test]
    fn test_no_columns_means_no_order() {
        let key = resolve(MemoryTable::new("Empty", &[]));
        assert_eq!(key, SortKey::unordered());

        let key = resolve(MemoryTable::new("T", &["a"]).failing_columns());
        assert_eq!(key.tier, SortKeyTier::None);
        assert!(key.columns.is_empty());
    }
}
