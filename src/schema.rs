//! Context-scoped labels for vendor extension tags.
//!
//! The same short tag means different things under a person and under a
//! family, so every label is keyed by the level-0 record type it appears in.
//! `INDIVIDUAL` and `FAMILY` are folded onto `INDI` and `FAM`.

use crate::error::{GedcomError, Result};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

static DEFAULT_SCHEMA: Lazy<Schema> = Lazy::new(Schema::seeded);

/// Family Tree Maker fact tags, valid under both persons and families.
const FTM_FACT_COUNT: usize = 13;

const INDI_EXTENSIONS: &[(&str, &str)] = &[
    ("_MREL", "Relationship to Mother"),
    ("_FREL", "Relationship to Father"),
    ("_MILT", "Military"),
    ("_DEG", "Degree"),
    ("_ELEC", "Elected"),
    ("_EMPLOY", "Employment"),
    ("_EXCM", "Excommunication"),
    ("_FUN", "Funeral"),
    ("_MDCL", "Medical"),
    ("_HEIG", "Height"),
    ("_WEIG", "Weight"),
];

const FAM_EXTENSIONS: &[(&str, &str)] = &[
    ("_MSTAT", "Marriage Status"),
    ("_MEND", "Marriage Ending"),
    ("_SEPR", "Separation"),
];

#[derive(Debug, Clone, Default)]
pub struct Schema {
    contexts: FxHashMap<String, FxHashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct SchemaRow {
    context: String,
    tag: String,
    label: String,
}

/// Folds the long-form record names onto their short tags.
pub fn canonical_context(context: &str) -> &str {
    match context {
        "INDIVIDUAL" => "INDI",
        "FAMILY" => "FAM",
        other => other,
    }
}

impl Schema {
    /// Shared, read-only default table. Clone it before adding entries.
    pub fn defaults() -> &'static Schema {
        &DEFAULT_SCHEMA
    }

    /// A private, mutable copy of the default table.
    pub fn with_defaults() -> Self {
        DEFAULT_SCHEMA.clone()
    }

    fn seeded() -> Self {
        let mut schema = Schema::default();
        for n in 1..=FTM_FACT_COUNT {
            let tag = format!("_FA{}", n);
            schema.put("INDI", &tag, &format!("Fact {}", n));
            schema.put("FAM", &tag, &format!("Family Fact {}", n));
        }
        for (tag, label) in INDI_EXTENSIONS {
            schema.put("INDI", tag, label);
        }
        for (tag, label) in FAM_EXTENSIONS {
            schema.put("FAM", tag, label);
        }
        schema
    }

    /// Inserts or overwrites the label for `(context, tag)`.
    pub fn put(&mut self, context: &str, tag: &str, label: &str) {
        self.contexts
            .entry(canonical_context(context).to_string())
            .or_default()
            .insert(tag.to_string(), label.to_string());
    }

    pub fn get(&self, context: &str, tag: &str) -> Option<&str> {
        self.contexts
            .get(canonical_context(context))
            .and_then(|tags| tags.get(tag))
            .map(String::as_str)
    }

    pub fn contains(&self, context: &str, tag: &str) -> bool {
        self.get(context, tag).is_some()
    }

    /// True if any context knows `tag`.
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.contexts.values().any(|tags| tags.contains_key(tag))
    }

    pub fn len(&self) -> usize {
        self.contexts.values().map(|tags| tags.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extends the table from a `context,tag,label` CSV file.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let file = File::open(path).map_err(|e| GedcomError::Schema {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let added = self.extend_from_reader(BufReader::new(file), path)?;
        info!(path = %path.display(), entries = added, "Schema file loaded");
        Ok(added)
    }

    /// Lines starting with `#` are comments.
    pub fn extend_from_reader<R: Read>(&mut self, reader: R, path: &Path) -> Result<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut added = 0;
        for (row_number, result) in csv_reader.deserialize::<SchemaRow>().enumerate() {
            let row = result?;
            if row.context.is_empty() || row.tag.is_empty() || row.label.is_empty() {
                return Err(GedcomError::Schema {
                    path: path.to_path_buf(),
                    message: format!("row {} has an empty column", row_number + 1),
                });
            }
            debug!(context = %row.context, tag = %row.tag, label = %row.label, "Schema entry");
            self.put(
                &row.context.to_ascii_uppercase(),
                &row.tag.to_ascii_uppercase(),
                &row.label,
            );
            added += 1;
        }
        Ok(added)
    }
}
