//! One GEDCOM file in, one XML document out.
//!
//! Files are independent: each gets its own copy of the schema and its own
//! entity graph, so a batch fans out over rayon without shared mutable state
//! beyond the atomic run counters.

use crate::config::{DEFAULT_CUTOFF_YEAR, LIVING_YEARS};
use crate::error::Result;
use crate::interpret::{interpret, InterpretStats};
use crate::models::{Gedcom, Person, TopObject};
use crate::parser::{GedcomLine, GedcomReader};
use crate::resolve::{resolve, FailedObject, OrphanRepositoryPolicy};
use crate::schema::Schema;
use crate::serialize::{emits_page, write_document, write_page, PageFlags};
use crate::stats::ConversionStats;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub tree_id: String,
    /// Person flagged `primary`; the first person in the file when unset.
    pub primary_id: Option<String>,
    pub exclude_ids: FxHashSet<String>,
    pub exclude_living: bool,
    pub cutoff_year: i32,
    /// Year the living test counts back from.
    pub reference_year: i32,
    pub keep_unrecognized_text: bool,
    pub orphan_repositories: OrphanRepositoryPolicy,
    /// Record id to potential duplicate ids.
    pub matches: FxHashMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tree_id: "1".to_string(),
            primary_id: None,
            exclude_ids: FxHashSet::default(),
            exclude_living: false,
            cutoff_year: DEFAULT_CUTOFF_YEAR,
            reference_year: current_year(),
            keep_unrecognized_text: false,
            orphan_repositories: OrphanRepositoryPolicy::default(),
            matches: FxHashMap::default(),
        }
    }
}

/// Calendar year from the system clock, close enough for the living test.
pub fn current_year() -> i32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    1970 + (secs / 31_556_952) as i32
}

/// Per-file outcome, also the unit of the JSON run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileReport {
    pub input: String,
    pub output: Option<String>,
    pub pages: u64,
    pub failed: Vec<FailedObject>,
    pub orphan_repositories: Vec<String>,
    /// Set when the whole file was abandoned.
    pub error: Option<String>,
}

pub struct Conversion {
    pub xml: Vec<u8>,
    pub report: FileReport,
    pub interpret_stats: InterpretStats,
    pub merged_repositories: u64,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    id: String,
    matches: String,
}

/// Reads an `id,matches` CSV of potential duplicates.
pub fn load_matches(path: &Path) -> Result<FxHashMap<String, String>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut matches = FxHashMap::default();
    for row in reader.deserialize::<MatchRow>() {
        let row = row?;
        if !row.id.is_empty() && !row.matches.is_empty() {
            matches.insert(row.id, row.matches);
        }
    }
    info!(path = %path.display(), entries = matches.len(), "Potential matches loaded");
    Ok(matches)
}

pub fn is_living(person: &Person, reference_year: i32) -> bool {
    if person.has_death_event() {
        return false;
    }
    match person.birth_years().into_iter().max() {
        Some(year) => reference_year - year <= LIVING_YEARS,
        None => !person.has_dated_event(),
    }
}

pub fn page_flags(obj: &TopObject, primary_id: Option<&str>, config: &PipelineConfig) -> PageFlags {
    let id = obj.id();
    let mut flags = PageFlags {
        exclude: config.exclude_ids.contains(id),
        ..Default::default()
    };
    if let TopObject::Person(person) = obj {
        flags.primary = primary_id == Some(id);
        flags.living = is_living(person, config.reference_year);
        flags.exclude |= flags.living && config.exclude_living;
        flags.before_cutoff = person
            .birth_years()
            .into_iter()
            .min()
            .is_some_and(|year| year < config.cutoff_year);
    }
    flags
}

fn primary_person_id(gedcom: &Gedcom, config: &PipelineConfig) -> Option<String> {
    match &config.primary_id {
        Some(id) => Some(id.clone()),
        None => gedcom
            .iter()
            .find(|obj| matches!(obj, TopObject::Person(_)))
            .map(|obj| obj.id().to_string()),
    }
}

/// Prints every object that gets a page. A page that cannot be printed is
/// added to `failed` and the rest are still written.
pub fn write_pages(
    gedcom: &Gedcom,
    config: &PipelineConfig,
    failed: &mut Vec<FailedObject>,
) -> Result<Vec<Vec<u8>>> {
    let primary_id = primary_person_id(gedcom, config);
    let mut pages = Vec::with_capacity(gedcom.len());
    for obj in gedcom.iter().filter(|obj| emits_page(obj)) {
        let flags = page_flags(obj, primary_id.as_deref(), config);
        match write_page(obj, &gedcom.tree_id, &flags) {
            Ok(page) => pages.push(page),
            Err(e) if e.is_per_object() => {
                warn!(id = %obj.id(), error = %e, "Skipping page");
                failed.push(FailedObject {
                    id: obj.id().to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(pages)
}

/// Interprets, resolves and prints one line stream.
pub fn convert_lines<I>(
    lines: I,
    input: &str,
    schema: &Schema,
    config: &PipelineConfig,
) -> Result<Conversion>
where
    I: IntoIterator<Item = GedcomLine>,
{
    let (mut gedcom, interpret_stats) =
        interpret(lines, schema, &config.tree_id, config.keep_unrecognized_text);

    for (id, matches) in &config.matches {
        if let Some(obj) = gedcom.get_mut(id) {
            obj.record_mut().matches = Some(matches.clone());
        }
    }

    let resolved = resolve(&mut gedcom, config.orphan_repositories);
    let mut report = FileReport {
        input: input.to_string(),
        failed: resolved.failed,
        orphan_repositories: resolved.orphan_repositories,
        ..Default::default()
    };

    let pages = write_pages(&gedcom, config, &mut report.failed)?;
    report.pages = pages.len() as u64;
    debug!(input, pages = report.pages, failed = report.failed.len(), "File converted");

    Ok(Conversion {
        xml: write_document(&pages, &gedcom.tree_id)?,
        report,
        interpret_stats,
        merged_repositories: resolved.merged_repositories,
    })
}

pub fn convert_file(
    path: &Path,
    schema: &Schema,
    config: &PipelineConfig,
) -> anyhow::Result<Conversion> {
    let input = path.to_string_lossy();
    let reader = GedcomReader::open(&input)?;
    convert_lines(reader, &input, schema, config)
        .with_context(|| format!("Failed to convert {}", input))
}

/// `family.ged.bz2` -> `family.xml`
pub fn output_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".bz2").unwrap_or(&name);
    let stem = match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    };
    format!("{}.xml", stem)
}

fn convert_one(
    path: &Path,
    output_dir: &Path,
    schema: &Schema,
    config: &PipelineConfig,
    stats: &ConversionStats,
) -> anyhow::Result<FileReport> {
    let conversion = convert_file(path, schema, config)?;
    let out_path = output_dir.join(output_file_name(path));
    fs::write(&out_path, &conversion.xml)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    stats.inc_files();
    stats.add_interpret(&conversion.interpret_stats);
    stats.add_pages(conversion.report.pages);
    stats.add_failed_pages(conversion.report.failed.len() as u64);
    stats.add_merged_repositories(conversion.merged_repositories);
    stats.add_orphan_repositories(conversion.report.orphan_repositories.len() as u64);

    let mut report = conversion.report;
    report.output = Some(out_path.display().to_string());
    Ok(report)
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb
}

/// Converts `inputs` in parallel into `output_dir`. A file that fails is
/// reported and counted; the rest of the batch carries on.
pub fn convert_files(
    inputs: &[PathBuf],
    output_dir: &Path,
    schema: &Schema,
    config: &PipelineConfig,
    stats: &ConversionStats,
    show_progress: bool,
) -> Vec<FileReport> {
    let pb = if show_progress {
        make_progress_bar(inputs.len() as u64)
    } else {
        ProgressBar::hidden()
    };

    let reports = inputs
        .par_iter()
        .map(|path| {
            let schema = schema.clone();
            let report = match convert_one(path, output_dir, &schema, config, stats) {
                Ok(report) => report,
                Err(e) => {
                    warn!(path = %path.display(), error = format!("{:#}", e), "File abandoned");
                    stats.inc_failed_files();
                    FileReport {
                        input: path.display().to_string(),
                        error: Some(format!("{:#}", e)),
                        ..Default::default()
                    }
                }
            };
            pb.inc(1);
            report
        })
        .collect();

    pb.finish_and_clear();
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, EventKind, Image, Source};

    fn lines(text: &str) -> Vec<GedcomLine> {
        text.lines().filter_map(GedcomLine::parse).collect()
    }

    fn person_with(events: &[(&str, &str)]) -> Person {
        let mut p = Person::new("I1");
        for (i, (label, date)) in events.iter().enumerate() {
            let mut e = Event::new(format!("I1_E{}", i + 1), EventKind::Standard, label);
            if !date.is_empty() {
                e.date = Some(date.to_string());
            }
            p.events.push(e);
        }
        p
    }

    #[test]
    fn living_rules() {
        assert!(is_living(&person_with(&[("Birth", "1990")]), 2026));
        assert!(!is_living(&person_with(&[("Birth", "1850")]), 2026));
        assert!(!is_living(&person_with(&[("Birth", "1990"), ("Death", "")]), 2026));
        assert!(is_living(&person_with(&[]), 2026));
        assert!(!is_living(&person_with(&[("Marriage", "1900")]), 2026));
    }

    #[test]
    fn cutoff_and_exclusion_flags() {
        let config = PipelineConfig {
            exclude_living: true,
            reference_year: 2026,
            ..Default::default()
        };
        let old = TopObject::Person(person_with(&[("Birth", "1700")]));
        let flags = page_flags(&old, Some("I1"), &config);
        assert!(flags.primary);
        assert!(flags.before_cutoff);
        assert!(!flags.living);
        assert!(!flags.exclude);

        let young = TopObject::Person(person_with(&[("Birth", "2000")]));
        let flags = page_flags(&young, None, &config);
        assert!(!flags.primary);
        assert!(flags.living);
        assert!(flags.exclude);
    }

    #[test]
    fn output_names() {
        assert_eq!(output_file_name(Path::new("/data/family.ged")), "family.xml");
        assert_eq!(output_file_name(Path::new("family.ged.bz2")), "family.xml");
        assert_eq!(output_file_name(Path::new("noext")), "noext.xml");
    }

    #[test]
    fn convert_lines_keeps_siblings_of_failed_object() {
        let input = "0 HEAD\n\
            0 @I1@ INDI\n1 NAME Ann /Lee/\n1 BIRT\n2 DATE 1700\n\
            0 @I2@ INDI\n1 NAME Bob /Lee/\n1 NOTE @N404@\n\
            0 TRLR\n";
        let config = PipelineConfig {
            tree_id: "9".to_string(),
            reference_year: 2026,
            ..Default::default()
        };
        let conversion =
            convert_lines(lines(input), "test.ged", Schema::defaults(), &config).unwrap();
        let xml = String::from_utf8(conversion.xml).unwrap();

        assert_eq!(conversion.report.pages, 1);
        assert_eq!(conversion.report.failed.len(), 1);
        assert_eq!(conversion.report.failed[0].id, "I2");
        assert!(xml.contains(
            r#"<page namespace="108" id="I1" tree_id="9" primary="1" beforeCutoff="true">"#
        ));
        assert!(!xml.contains(r#"id="I2""#));
    }

    #[test]
    fn print_failure_costs_only_its_page() {
        let mut gedcom = Gedcom::new("9");
        gedcom.insert(TopObject::Person(Person::new("I1")));
        let mut broken = Person::new("I2");
        broken.record.images.push(Image::default());
        gedcom.insert(TopObject::Person(broken));
        gedcom.insert(TopObject::Source(Source::new("S1")));

        let mut failed = Vec::new();
        let pages = write_pages(&gedcom, &PipelineConfig::default(), &mut failed).unwrap();
        let pages: Vec<String> = pages
            .into_iter()
            .map(|page| String::from_utf8(page).unwrap())
            .collect();

        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains(r#"id="I1""#));
        assert!(pages[1].contains(r#"id="S1""#));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "I2");
        assert!(failed[0].reason.contains("image has no parent"));
    }

    #[test]
    fn matches_are_attached() {
        let input = "0 @I1@ INDI\n1 NAME Ann /Lee/\n1 DEAT Y\n";
        let mut config = PipelineConfig::default();
        config.matches.insert("I1".to_string(), "I7".to_string());
        let conversion =
            convert_lines(lines(input), "test.ged", Schema::defaults(), &config).unwrap();
        let xml = String::from_utf8(conversion.xml).unwrap();
        assert!(xml.contains(r#"potentialMatches="I7""#));
    }

    #[test]
    fn load_matches_reads_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("matches.csv");
        fs::write(&path, "id,matches\nI1, I7\nI2,\n").unwrap();
        let matches = load_matches(&path).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.get("I1").map(String::as_str), Some("I7"));
    }
}
