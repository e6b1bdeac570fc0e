const FIRST_COLUMN_WARNING: &str =
    "Note: no primary key was found for some tables, so they were exported sorted by their first column.";
const NO_SORT_KEY_WARNING: &str =
    "Note: no sort key could be determined for some tables, so they were exported without ORDER BY.";

/// Build the warning paragraphs for degraded tables.
///
/// With `max_items`, each list is cut to that many names and marked with ` ...`
/// when longer. `None` lists every name.
pub fn build_warning_messages(
    tables_sorted_by_first_column: &[String],
    tables_without_sort_key: &[String],
    max_items: Option<usize>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    if !tables_sorted_by_first_column.is_empty() {
        warnings.push(paragraph(FIRST_COLUMN_WARNING, tables_sorted_by_first_column, max_items));
    }
    if !tables_without_sort_key.is_empty() {
        warnings.push(paragraph(NO_SORT_KEY_WARNING, tables_without_sort_key, max_items));
    }
    warnings
}

fn paragraph(headline: &str, tables: &[String], max_items: Option<usize>) -> String {
    let shown = max_items.map_or(tables.len(), |max| max.min(tables.len()));
    let suffix = if shown < tables.len() { " ..." } else { "" };
    format!("{}\nTables: {}{}", headline, tables[..shown].join(", "), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("T{}", i)).collect()
    }

    #[test]
    fn test_no_degradation_no_warnings() {
        assert!(build_warning_messages(&[], &[], Some(5)).is_empty());
    }

    #[test]
    fn test_truncated_lists() {
        let warnings = build_warning_messages(&names(7), &names(2), Some(5));
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].ends_with("Tables: T1, T2, T3, T4, T5 ..."));
        assert!(warnings[0].contains("first column"));
        assert!(warnings[1].ends_with("Tables: T1, T2"));
        assert!(warnings[1].contains("without ORDER BY"));
    }

    #[test]
    fn test_exact_limit_has_no_ellipsis() {
        let warnings = build_warning_messages(&names(5), &[], Some(5));
        assert!(warnings[0].ends_with("T5"));
    }

    #[test]
    fn test_full_lists() {
        let warnings = build_warning_messages(&[], &names(8), None);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].ends_with("T6, T7, T8"));
        assert!(!warnings[0].contains("..."));
    }
}
