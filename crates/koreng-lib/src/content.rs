//! Content store — subjects loaded from a directory of CSV tables.
//!
//! Each `<Subject>.csv` is one table. The first row is a header; the second
//! column holds source text and the third column target text. Rows missing
//! either value are dropped. The store is read-only after loading.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use koreng_core::error::ContentError;
use koreng_core::types::{SentencePair, Subject};

const SOURCE_COLUMN: usize = 1;
const TARGET_COLUMN: usize = 2;
const TABLE_EXTENSION: &str = "csv";

#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    subjects: Vec<Arc<Subject>>,
}

impl ContentStore {
    /// Load every table under `dir`.
    ///
    /// `order` lists subject names to put first; unknown names are skipped
    /// and unlisted subjects follow in name order.
    pub fn load(dir: &Path, order: &[String]) -> Result<Self, ContentError> {
        let unavailable = |reason: String| ContentError::Unavailable {
            path: dir.to_path_buf(),
            reason,
        };

        if !dir.is_dir() {
            return Err(unavailable("directory not found".into()));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;

        let mut subjects = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| unavailable(e.to_string()))?.path();
            let is_table = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(TABLE_EXTENSION));
            if !is_table || !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("content: skipping table with non-UTF-8 name: {}", path.display());
                continue;
            };

            let file = std::fs::File::open(&path).map_err(|e| unavailable(e.to_string()))?;
            let sentences = read_table(name, file)?;
            debug!("content: loaded '{name}' ({} sentences)", sentences.len());
            subjects.push(Subject::new(name, sentences));
        }

        info!("content: {} subjects from {}", subjects.len(), dir.display());
        Ok(Self::ordered(subjects, order))
    }

    /// Build a store from in-memory subjects, keeping their order.
    pub fn from_subjects(subjects: Vec<Subject>) -> Self {
        Self {
            subjects: subjects.into_iter().map(Arc::new).collect(),
        }
    }

    fn ordered(mut subjects: Vec<Subject>, order: &[String]) -> Self {
        subjects.sort_by(|a, b| a.name.cmp(&b.name));

        let mut ordered = Vec::with_capacity(subjects.len());
        for name in order {
            if let Some(pos) = subjects.iter().position(|s| &s.name == name) {
                ordered.push(subjects.remove(pos));
            } else if !ordered.iter().any(|s: &Subject| &s.name == name) {
                warn!("content: ordered subject '{name}' has no table");
            }
        }
        ordered.extend(subjects);

        Self::from_subjects(ordered)
    }

    pub fn list_subjects(&self) -> Vec<&str> {
        self.subjects.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn get_subject(&self, name: &str) -> Result<Arc<Subject>, ContentError> {
        self.subjects
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| ContentError::UnknownSubject(name.to_string()))
    }

    pub fn sentence_count(&self, name: &str) -> Result<usize, ContentError> {
        self.get_subject(name).map(|s| s.len())
    }
}

/// Parse one table. Rows with a blank source or target cell are dropped.
pub fn read_table(subject: &str, reader: impl Read) -> Result<Vec<SentencePair>, ContentError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut pairs = Vec::new();
    for (row, record) in csv.records().enumerate() {
        let record = record.map_err(|e| ContentError::Malformed {
            subject: subject.to_string(),
            reason: e.to_string(),
        })?;

        let source = record.get(SOURCE_COLUMN).map(str::trim).unwrap_or_default();
        let target = record.get(TARGET_COLUMN).map(str::trim).unwrap_or_default();
        if source.is_empty() || target.is_empty() {
            debug!("content: '{subject}' row {} dropped (missing text)", row + 2);
            continue;
        }
        pairs.push(SentencePair::new(source, target));
    }
    Ok(pairs)
}
