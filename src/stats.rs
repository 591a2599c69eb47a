use crate::interpret::InterpretStats;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every file converted in one run
#[derive(Default)]
pub struct ConversionStats {
    pub files_converted: AtomicU64,
    pub files_failed: AtomicU64,
    pub lines_read: AtomicU64,
    pub records_defined: AtomicU64,
    pub pages_written: AtomicU64,
    pub pages_failed: AtomicU64,
    pub ignored_tags: AtomicU64,
    pub unrecognized_tags: AtomicU64,
    pub schema_events: AtomicU64,
    pub duplicate_records: AtomicU64,
    pub merged_repositories: AtomicU64,
    pub orphan_repositories: AtomicU64,
}

/// Plain copy of [`ConversionStats`] for reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub files_converted: u64,
    pub files_failed: u64,
    pub lines_read: u64,
    pub records_defined: u64,
    pub pages_written: u64,
    pub pages_failed: u64,
    pub ignored_tags: u64,
    pub unrecognized_tags: u64,
    pub schema_events: u64,
    pub duplicate_records: u64,
    pub merged_repositories: u64,
    pub orphan_repositories: u64,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_files(&self) {
        self.files_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed_files(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pages(&self, count: u64) {
        self.pages_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_failed_pages(&self, count: u64) {
        self.pages_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_merged_repositories(&self, count: u64) {
        self.merged_repositories.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_orphan_repositories(&self, count: u64) {
        self.orphan_repositories.fetch_add(count, Ordering::Relaxed);
    }

    /// Folds one file's interpreter counters in.
    pub fn add_interpret(&self, s: &InterpretStats) {
        self.lines_read.fetch_add(s.lines, Ordering::Relaxed);
        self.records_defined.fetch_add(s.records, Ordering::Relaxed);
        self.ignored_tags.fetch_add(s.ignored_tags, Ordering::Relaxed);
        self.unrecognized_tags
            .fetch_add(s.unrecognized_tags, Ordering::Relaxed);
        self.schema_events.fetch_add(s.schema_events, Ordering::Relaxed);
        self.duplicate_records
            .fetch_add(s.duplicate_records, Ordering::Relaxed);
    }

    pub fn files(&self) -> u64 {
        self.files_converted.load(Ordering::Relaxed)
    }

    pub fn failed_files(&self) -> u64 {
        self.files_failed.load(Ordering::Relaxed)
    }

    pub fn pages(&self) -> u64 {
        self.pages_written.load(Ordering::Relaxed)
    }

    pub fn failed_pages(&self) -> u64 {
        self.pages_failed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_converted: self.files(),
            files_failed: self.failed_files(),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            records_defined: self.records_defined.load(Ordering::Relaxed),
            pages_written: self.pages(),
            pages_failed: self.failed_pages(),
            ignored_tags: self.ignored_tags.load(Ordering::Relaxed),
            unrecognized_tags: self.unrecognized_tags.load(Ordering::Relaxed),
            schema_events: self.schema_events.load(Ordering::Relaxed),
            duplicate_records: self.duplicate_records.load(Ordering::Relaxed),
            merged_repositories: self.merged_repositories.load(Ordering::Relaxed),
            orphan_repositories: self.orphan_repositories.load(Ordering::Relaxed),
        }
    }
}
