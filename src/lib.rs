//! Gedwiki: GEDCOM to wiki-page XML conversion
//!
//! A GEDCOM file goes through three passes, all in memory and per file:
//!
//! 1. **Interpretation** -- A context-frame stack turns `level tag value` lines into
//!    an entity graph of people, families, sources, notes and repositories, recording
//!    cross-references as ids
//! 2. **Resolution** -- Every recorded id is followed: notes are inlined, sources
//!    give their titles to citations, repositories are copied into the sources that
//!    cite them, images get their parents
//! 3. **Serialization** -- One `<page>` element per person, family and source, each
//!    rendered into its own buffer
//!
//! # Error scoping
//!
//! Unknown tags are logged and skipped. A reference that cannot be followed, or a
//! page that cannot be printed, drops only that object's page. Only I/O failures
//! abandon a whole file, and a batch keeps going past a failed file.
//!
//! # Key Modules
//!
//! - [`parser`] -- Line splitting and file reading with BZ2 decompression
//! - [`schema`] -- Context-scoped table of custom event tags
//! - [`interpret`] -- Tag interpreter building the entity graph
//! - [`resolve`] -- Reference resolver
//! - [`serialize`] -- quick-xml page writer
//! - [`pipeline`] -- Per-file orchestration, page flags and parallel batches
//! - [`models`] -- Entity graph types
//! - [`name`] -- Personal name parsing
//! - [`stats`] -- Thread-safe atomic counters for a run
//! - [`config`] -- Namespaces, tag tables and defaults
//!
//! # Example Usage
//!
//! ```bash
//! # Convert two trees with a custom schema, dropping living people
//! gedwiki convert -i smith.ged -i jones.ged.bz2 -o pages/ --schema tags.csv --exclude-living
//! ```

pub mod config;
pub mod error;
pub mod interpret;
pub mod models;
pub mod name;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod schema;
pub mod serialize;
pub mod stats;
