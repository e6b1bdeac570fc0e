use crate::config::SourceConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Expands command line inputs into the list of database files to export.
pub struct SourceScanner {
    extensions: Vec<String>,
    max_depth: usize,
}

impl SourceScanner {
    pub fn new(config: &SourceConfig) -> Self {
        let max_depth = if config.recursive { config.max_depth } else { 1 };
        Self {
            extensions: config.extensions.iter().map(|e| e.to_lowercase()).collect(),
            max_depth,
        }
    }

    /// Directories are replaced by the supported files they contain, sorted by
    /// path. Other inputs are kept as given so that missing or unsupported
    /// files are reported by the export itself.
    pub fn collect_inputs(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut sources = Vec::new();
        for input in inputs {
            if input.is_dir() {
                let found = self.scan_directory(input)?;
                debug!("{}: {} database files", input.display(), found.len());
                sources.extend(found);
            } else {
                sources.push(input.clone());
            }
        }
        Ok(sources)
    }

    pub fn scan_directory(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();

        let walker = WalkDir::new(root)
            .max_depth(self.max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable entry under {}: {}", root.display(), err);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_supported(entry.path()) {
                found.push(entry.into_path());
            }
        }

        found.sort();
        Ok(found)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
