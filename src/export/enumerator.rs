use std::collections::HashSet;

use tracing::{debug, warn};

use crate::source::DataSource;

/// Case-insensitive name prefixes of system and temporary objects.
pub const SYSTEM_TABLE_PREFIXES: &[&str] = &["msys", "usys", "~"];

/// `MSysObjects.Type` values that denote tables: local, ODBC-linked and linked.
pub const TABLE_OBJECT_TYPES: &[i32] = &[1, 4, 6];

/// Empty names are rejected; they cannot be queried.
pub fn is_user_table_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let lower = name.to_lowercase();
    !SYSTEM_TABLE_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Drop case-insensitive duplicates, keeping the first occurrence.
pub fn dedupe_keep_order<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(Into::into)
        .filter(|name: &String| seen.insert(name.to_lowercase()))
        .collect()
}

/// List the user tables of `source` in catalog order.
///
/// The catalog object registry is consulted first. When it cannot be read or
/// yields nothing, the driver's generic table listing is used instead. A
/// failing fallback produces an empty list.
pub fn list_user_tables(source: &dyn DataSource) -> Vec<String> {
    match from_catalog(source) {
        Ok(names) if !names.is_empty() => return names,
        Ok(_) => debug!("catalog registry lists no user tables, using table listing"),
        Err(e) => debug!("catalog registry unreadable ({}), using table listing", e),
    }

    match source.list_tables() {
        Ok(names) => dedupe_keep_order(names.into_iter().filter(|n| is_user_table_name(n))),
        Err(e) => {
            warn!("table listing failed: {}", e);
            Vec::new()
        }
    }
}

fn from_catalog(source: &dyn DataSource) -> crate::error::Result<Vec<String>> {
    let mut objects: Vec<_> = source
        .list_catalog_objects()?
        .into_iter()
        .filter(|o| TABLE_OBJECT_TYPES.contains(&o.object_type))
        .filter(|o| is_user_table_name(&o.name))
        .collect();
    objects.sort_by_key(|o| o.id);
    Ok(dedupe_keep_order(objects.into_iter().map(|o| o.name)))
}
