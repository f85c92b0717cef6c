// src/glossary/mod.rs
//! Immutable in-memory dictionary of known financial terms.
//!
//! Built once at startup from a CSV dataset. Besides the entries themselves the
//! store owns the shared context vocabulary: keywords extracted from the union of
//! every entry's metadata, which the disambiguator uses as its co-occurrence corpus.

pub(crate) mod builtin;
pub mod keywords;

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use self::builtin::BUILTIN_TERMS;
use self::keywords::{extract_keywords, BASE_FINANCIAL_KEYWORDS};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("glossary dataset unreadable at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("glossary dataset malformed: {0}")]
    Malformed(#[from] csv::Error),
    #[error("glossary dataset is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("glossary term `{term}` on line {line} has no definition")]
    MissingDefinition { term: String, line: u64 },
    #[error("duplicate glossary term `{term}` on line {line}")]
    DuplicateTerm { term: String, line: u64 },
    #[error("glossary dataset contains no terms")]
    Empty,
}

/// Shared, lowercased keyword corpus.
#[derive(Debug, Default)]
pub struct Vocabulary {
    keywords: BTreeSet<String>,
}

impl Vocabulary {
    pub fn from_keywords<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = items
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.keywords.contains(&keyword.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub category: String,
    /// Short authoritative description; the final fallback text.
    pub definition_metadata: String,
    /// Domain-wide vocabulary, shared by every entry.
    #[serde(skip)]
    pub context_keywords: Arc<Vocabulary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analogy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct GlossaryOptions {
    pub include_builtin: bool,
}

impl Default for GlossaryOptions {
    fn default() -> Self {
        Self {
            include_builtin: true,
        }
    }
}

/// One dataset row before the vocabulary exists.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub term: String,
    pub category: String,
    pub definition: String,
    pub synonyms: Vec<String>,
    pub analogy: Option<String>,
    pub importance: Option<String>,
    pub correction: Option<String>,
    pub example: Option<String>,
    pub line: u64,
}

/// Trim, collapse inner whitespace, lowercase.
pub fn normalize_term(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug)]
pub struct GlossaryStore {
    entries: Vec<Arc<GlossaryEntry>>,
    /// normalized term or synonym -> position in `entries`
    index: HashMap<String, usize>,
    vocabulary: Arc<Vocabulary>,
}

impl GlossaryStore {
    /// Load a CSV dataset with default options (built-in seed terms included).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        Self::load_with(path, GlossaryOptions::default())
    }

    pub fn load_with<P: AsRef<Path>>(
        path: P,
        options: GlossaryOptions,
    ) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_reader(file, options)?;
        info!(
            target: "glossary",
            path = %path.display(),
            terms = store.len(),
            keywords = store.vocabulary.len(),
            "glossary loaded"
        );
        Ok(store)
    }

    pub fn from_reader<R: Read>(reader: R, options: GlossaryOptions) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = Columns::resolve(rdr.headers()?)?;
        let mut records = Vec::new();
        for (i, row) in rdr.records().enumerate() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or(i as u64 + 2);
            if let Some(rec) = columns.record(&row, line)? {
                records.push(rec);
            }
        }
        Self::from_records(records, options)
    }

    /// Build the store from already-parsed rows.
    pub fn from_records(
        mut records: Vec<RawRecord>,
        options: GlossaryOptions,
    ) -> Result<Self, DatasetError> {
        let mut seen: HashMap<String, u64> = HashMap::new();
        for rec in &records {
            if seen.insert(normalize_term(&rec.term), rec.line).is_some() {
                return Err(DatasetError::DuplicateTerm {
                    term: rec.term.clone(),
                    line: rec.line,
                });
            }
        }

        if options.include_builtin {
            let taken: BTreeSet<String> = records
                .iter()
                .flat_map(|r| std::iter::once(&r.term).chain(r.synonyms.iter()))
                .map(|s| normalize_term(s))
                .collect();
            for b in BUILTIN_TERMS {
                if taken.contains(&normalize_term(b.term)) {
                    continue;
                }
                debug!(target: "glossary", term = b.term, "adding built-in term");
                records.push(RawRecord {
                    term: b.term.to_string(),
                    category: b.category.to_string(),
                    definition: b.definition.to_string(),
                    importance: Some(b.importance.to_string()),
                    analogy: Some(b.analogy.to_string()),
                    ..RawRecord::default()
                });
            }
        }

        if records.is_empty() {
            return Err(DatasetError::Empty);
        }

        let vocabulary = Arc::new(derive_vocabulary(&records));

        let entries: Vec<Arc<GlossaryEntry>> = records
            .into_iter()
            .map(|r| {
                Arc::new(GlossaryEntry {
                    term: r.term,
                    category: r.category,
                    definition_metadata: r.definition,
                    context_keywords: vocabulary.clone(),
                    synonyms: r.synonyms,
                    analogy: r.analogy,
                    importance: r.importance,
                    correction: r.correction,
                    example: r.example,
                })
            })
            .collect();

        // Canonical terms first so a synonym never shadows a real term.
        let mut index = HashMap::with_capacity(entries.len() * 2);
        for (i, e) in entries.iter().enumerate() {
            index.insert(normalize_term(&e.term), i);
        }
        for (i, e) in entries.iter().enumerate() {
            for syn in &e.synonyms {
                index.entry(normalize_term(syn)).or_insert(i);
            }
        }

        Ok(Self {
            entries,
            index,
            vocabulary,
        })
    }

    /// Exact, case-normalized lookup over terms and synonyms.
    pub fn lookup(&self, term: &str) -> Option<&Arc<GlossaryEntry>> {
        let key = normalize_term(term);
        if key.is_empty() {
            return None;
        }
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    /// Entries in dataset order (built-in seeds last).
    pub fn all(&self) -> &[Arc<GlossaryEntry>] {
        &self.entries
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    /// Every surface form (term or synonym) with its canonical entry.
    pub fn surface_forms(&self) -> impl Iterator<Item = (&str, &Arc<GlossaryEntry>)> {
        self.entries.iter().flat_map(|e| {
            std::iter::once(e.term.as_str())
                .chain(e.synonyms.iter().map(String::as_str))
                .map(move |s| (s, e))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn derive_vocabulary(records: &[RawRecord]) -> Vocabulary {
    let mut words: BTreeSet<String> = BTreeSet::new();
    words.extend(BASE_FINANCIAL_KEYWORDS.iter().map(|s| s.to_string()));
    for r in records {
        words.insert(r.term.clone());
        words.extend(r.synonyms.iter().cloned());
        for text in [Some(&r.definition), r.analogy.as_ref(), r.example.as_ref()]
            .into_iter()
            .flatten()
        {
            words.extend(extract_keywords(text));
        }
    }
    Vocabulary::from_keywords(words)
}

/* ----------------------------
Column mapping
---------------------------- */

const TERM_ALIASES: &[&str] = &["term", "금융용어", "용어"];
const DEFINITION_ALIASES: &[&str] = &["definition", "정의"];
const CATEGORY_ALIASES: &[&str] = &["category", "분류", "카테고리"];
const SYNONYM_ALIASES: &[&str] = &["synonyms", "synonym", "동의어", "유의어"];
const ANALOGY_ALIASES: &[&str] = &["analogy", "비유"];
const IMPORTANCE_ALIASES: &[&str] = &["importance", "왜 중요?", "중요성"];
const CORRECTION_ALIASES: &[&str] = &["correction", "오해 교정"];
const EXAMPLE_ALIASES: &[&str] = &["example", "예시"];

struct Columns {
    term: usize,
    definition: usize,
    category: usize,
    synonyms: Option<usize>,
    analogy: Option<usize>,
    importance: Option<usize>,
    correction: Option<usize>,
    example: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, DatasetError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));

        Ok(Self {
            term: find(TERM_ALIASES).ok_or(DatasetError::MissingColumn("term"))?,
            definition: find(DEFINITION_ALIASES)
                .ok_or(DatasetError::MissingColumn("definition"))?,
            category: find(CATEGORY_ALIASES).ok_or(DatasetError::MissingColumn("category"))?,
            synonyms: find(SYNONYM_ALIASES),
            analogy: find(ANALOGY_ALIASES),
            importance: find(IMPORTANCE_ALIASES),
            correction: find(CORRECTION_ALIASES),
            example: find(EXAMPLE_ALIASES),
        })
    }

    /// Returns `Ok(None)` for rows without a term.
    fn record(&self, row: &csv::StringRecord, line: u64) -> Result<Option<RawRecord>, DatasetError> {
        let cell = |i: usize| row.get(i).map(str::trim).unwrap_or("");
        let optional = |i: Option<usize>| {
            i.map(cell)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let term = cell(self.term);
        if term.is_empty() {
            return Ok(None);
        }
        let definition = cell(self.definition);
        if definition.is_empty() {
            return Err(DatasetError::MissingDefinition {
                term: term.to_string(),
                line,
            });
        }
        let category = match cell(self.category) {
            "" => "기타".to_string(),
            c => c.to_string(),
        };

        let synonyms = self
            .synonyms
            .map(cell)
            .map(|raw| split_synonyms(raw, term))
            .unwrap_or_default();

        Ok(Some(RawRecord {
            term: term.to_string(),
            category,
            definition: definition.to_string(),
            synonyms,
            analogy: optional(self.analogy),
            importance: optional(self.importance),
            correction: optional(self.correction),
            example: optional(self.example),
            line,
        }))
    }
}

fn split_synonyms(raw: &str, term: &str) -> Vec<String> {
    let canonical = normalize_term(term);
    let mut out: Vec<String> = Vec::new();
    for s in raw.split([',', '\n', ';']) {
        let s = s.trim();
        if s.is_empty() || normalize_term(s) == canonical {
            continue;
        }
        if !out.iter().any(|o| normalize_term(o) == normalize_term(s)) {
            out.push(s.to_string());
        }
    }
    out
}
