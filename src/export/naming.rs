use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;

/// Smallest accepted name bound. It leaves room for one character of the base
/// name plus any `_<n>` suffix a single database can need.
pub const MIN_NAME_LENGTH: usize = 8;

/// Device names Windows refuses as file names, with or without an extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turn an arbitrary table name into a file name stem that is safe on every platform.
///
/// The result is never longer than `max_length` characters and, for a non-empty
/// `default_name` and a bound of at least one, never empty.
pub fn sanitize_filename(raw_name: &str, default_name: &str, max_length: usize) -> String {
    let replaced: String = raw_name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            '/' | '\\' => '_',
            c if c < '\u{20}' => '_',
            c => c,
        })
        .collect();

    let mut name = replaced.trim().trim_end_matches('.').to_string();
    if name.is_empty() {
        return truncate_chars(default_name, max_length);
    }

    let device = name.split('.').next().unwrap_or_default().to_uppercase();
    if RESERVED_NAMES.contains(&device.as_str()) {
        name.insert(0, '_');
    }

    if name.chars().count() > max_length {
        name = truncate_chars(&name, max_length)
            .trim_end_matches([' ', '.'])
            .to_string();
    }

    if name.is_empty() {
        truncate_chars(default_name, max_length)
    } else {
        name
    }
}

fn truncate_chars(name: &str, max_length: usize) -> String {
    name.chars().take(max_length).collect()
}

/// Hands out collision-free output names for one run.
///
/// Uniqueness is case-insensitive because the output directory may live on a
/// case-insensitive file system.
#[derive(Debug, Clone)]
pub struct UniqueNameAllocator {
    used: HashSet<String>,
    max_length: usize,
    default_name: String,
    extension: String,
}

impl UniqueNameAllocator {
    pub fn new(max_length: usize, default_name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            used: HashSet::new(),
            max_length,
            default_name: default_name.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(
            config.max_name_length,
            config.default_table_name.clone(),
            config.file_extension.clone(),
        )
    }

    /// Allocate a stem for `raw_name` and return the full output path inside `output_dir`.
    pub fn allocate(&mut self, output_dir: &Path, raw_name: &str) -> PathBuf {
        let stem = self.allocate_name(raw_name);
        output_dir.join(format!("{}.{}", stem, self.extension))
    }

    /// Allocate a unique stem for `raw_name` and mark it as used.
    pub fn allocate_name(&mut self, raw_name: &str) -> String {
        let base = sanitize_filename(raw_name, &self.default_name, self.max_length);
        let mut candidate = base.clone();
        let mut index = 1usize;

        while self.used.contains(&candidate.to_lowercase()) {
            let suffix = format!("_{}", index);
            let allowed = self.max_length.saturating_sub(suffix.chars().count());
            candidate = format!("{}{}", truncate_chars(&base, allowed), suffix);
            index += 1;
        }

        self.used.insert(candidate.to_lowercase());
        candidate
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(name: &str) -> String {
        sanitize_filename(name, "table", 120)
    }

    #[test]
    fn test_replaces_illegal_characters() {
        assert_eq!(sanitize("Orders"), "Orders");
        assert_eq!(sanitize("a<b>c:d\"e"), "a_b_c_d_e");
        assert_eq!(sanitize("path/to\\table"), "path_to_table");
        assert_eq!(sanitize("what?|*"), "what___");
        assert_eq!(sanitize("tab\there\u{1}"), "tab_here_");
    }

    #[test]
    fn test_trims_whitespace_and_trailing_dots() {
        assert_eq!(sanitize("  Sales  "), "Sales");
        assert_eq!(sanitize("Report..."), "Report");
        assert_eq!(sanitize("   "), "table");
        assert_eq!(sanitize("..."), "table");
        assert_eq!(sanitize(""), "table");
    }

    #[test]
    fn test_reserved_device_names() {
        assert_eq!(sanitize("CON"), "_CON");
        assert_eq!(sanitize("con"), "_con");
        assert_eq!(sanitize("nul.backup"), "_nul.backup");
        assert_eq!(sanitize("Lpt9"), "_Lpt9");
        assert_eq!(sanitize("CONSOLE"), "CONSOLE");
        assert_eq!(sanitize("COM10"), "COM10");
    }

    #[test]
    fn test_truncation() {
        let long = "x".repeat(200);
        assert_eq!(sanitize(&long).chars().count(), 120);

        let name = format!("{}. tail", "a".repeat(9));
        assert_eq!(sanitize_filename(&name, "table", 11), "aaaaaaaaa");

        let unicode = "é".repeat(130);
        assert_eq!(sanitize(&unicode).chars().count(), 120);
    }

    #[test]
    fn test_output_properties() {
        let long = "z".repeat(500);
        let inputs = ["", "CON", "a/b", "  x  ", "日本語テーブル", "\u{0}\u{1f}", long.as_str()];
        for input in inputs {
            let out = sanitize(input);
            assert!(!out.is_empty());
            assert!(out.chars().count() <= 120);
            assert!(!out
                .chars()
                .any(|c| "<>:\"/\\|?*".contains(c) || c < '\u{20}'));
        }
    }

    #[test]
    fn test_sanitize_is_identity_on_safe_names() {
        for name in ["Orders", "Order Details", "tbl_2024", "Über"] {
            let once = sanitize(name);
            assert_eq!(once, name);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn test_allocator_case_insensitive_collisions() {
        let mut allocator = UniqueNameAllocator::new(120, "table", "csv");
        assert_eq!(allocator.allocate_name("Orders"), "Orders");
        assert_eq!(allocator.allocate_name("orders"), "orders_1");
        assert_eq!(allocator.allocate_name("ORDERS"), "ORDERS_2");
        assert!(allocator.is_used("oRdErS_1"));
        assert_eq!(allocator.len(), 3);
    }

    #[test]
    fn test_allocator_collisions_after_sanitizing() {
        let mut allocator = UniqueNameAllocator::new(120, "table", "csv");
        assert_eq!(allocator.allocate_name("a/b"), "a_b");
        assert_eq!(allocator.allocate_name("a_b"), "a_b_1");
        assert_eq!(allocator.allocate_name(""), "table");
        assert_eq!(allocator.allocate_name("???."), "___");
    }

    #[test]
    fn test_allocator_respects_length_bound() {
        let mut allocator = UniqueNameAllocator::new(120, "table", "csv");
        let long = "a".repeat(150);
        let first = allocator.allocate_name(&long);
        let second = allocator.allocate_name(&long);
        assert_eq!(first.len(), 120);
        assert_eq!(second, format!("{}_1", "a".repeat(118)));

        let mut tiny = UniqueNameAllocator::new(MIN_NAME_LENGTH, "table", "csv");
        assert_eq!(tiny.allocate_name("abcdefghij"), "abcdefgh");
        assert_eq!(tiny.allocate_name("abcdefghij"), "abcdef_1");
        for _ in 0..20 {
            assert!(tiny.allocate_name("abcdefghij").chars().count() <= MIN_NAME_LENGTH);
        }
    }

    #[test]
    fn test_suffix_never_exceeds_small_bound() {
        let mut allocator = UniqueNameAllocator::new(2, "t", "csv");
        assert_eq!(allocator.allocate_name("ab"), "ab");
        assert_eq!(allocator.allocate_name("ab"), "_1");
        assert_eq!(allocator.allocate_name("AB"), "_2");
    }

    #[test]
    fn test_default_name_respects_bound() {
        assert_eq!(sanitize_filename("   ", "table", 3), "tab");
        assert_eq!(sanitize_filename("", "table", 5), "table");
        assert_eq!(sanitize_filename("...", "table", 1), "t");
    }

    #[test]
    fn test_allocator_many_distinct() {
        let mut allocator = UniqueNameAllocator::new(10, "table", "csv");
        let mut seen = HashSet::new();
        for i in 0..50 {
            let raw = if i % 2 == 0 { "Same Name Here" } else { "same name here" };
            let name = allocator.allocate_name(raw);
            assert!(name.chars().count() <= 10);
            assert!(seen.insert(name.to_lowercase()));
        }
    }

    #[test]
    fn test_allocate_returns_path() {
        let mut allocator = UniqueNameAllocator::new(120, "table", "csv");
        let path = allocator.allocate(Path::new("/out"), "Lookup");
        assert_eq!(path, Path::new("/out").join("Lookup.csv"));
    }
}
