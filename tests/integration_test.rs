//! End-to-end tests for the GEDCOM to page XML pipeline.
//!
//! All tests share the `sample_gedcom()` fixture: a small tree with three
//! people, one family, a source held by a repository, a shared note, an
//! uncited repository and one person whose note reference is broken.
//!
//! - **Conversion** -- pages, flags, nested elements
//! - **Failure scoping** -- the broken person is dropped, everyone else printed
//! - **Batch** -- plain and BZ2 inputs through `convert_files`, stats and reports
//! - **Configuration** -- schema file, orphan repositories, unrecognized text

use bzip2::write::BzEncoder;
use bzip2::Compression;
use gedwiki::parser::GedcomReader;
use gedwiki::pipeline::{convert_file, convert_files, convert_lines, PipelineConfig};
use gedwiki::resolve::OrphanRepositoryPolicy;
use gedwiki::schema::Schema;
use gedwiki::stats::ConversionStats;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_gedcom() -> &'static str {
    r#"0 HEAD
1 SOUR FamilyTreeMaker
1 CHAR UTF-8
0 @I1@ INDI
1 NAME John /Smith/
2 _MARNM Johnny Smithers
1 SEX M
1 BIRT
2 DATE 12 MAR 1720
2 PLAC Boston
2 SOUR @S1@
3 PAGE p. 12
3 QUAY 3
1 DEAT
2 DATE 1790
1 _MILT Served in militia
1 _XYZ weird
1 FAMS @F1@
1 OBJE
2 FILE c:\photos\john.jpg
2 TITL John portrait
2 _PRIM Y
1 NOTE @N1@
1 CHAN
2 DATE 1 JAN 2001
0 @I2@ INDI
1 NAME Mary /Jones/
1 SEX F
1 BIRT
2 DATE 1995
1 FAMS @F1@
0 @I3@ INDI
1 NAME Bob /Smith/
1 FAMC @F1@
2 PEDI adopted
1 NOTE @N999@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
1 MARR
2 DATE 1745
0 @S1@ SOUR
1 TITL Boston Records
1 AUTH Town Clerk
1 REPO @R1@
2 CALN 974.4
0 @R1@ REPO
1 NAME Boston Archive
1 ADDR 1 City Hall
2 CITY Boston
0 @R2@ REPO
1 NAME Unused Library
0 @N1@ NOTE Served as a
1 CONT selectman.
0 TRLR
"#
}

fn config() -> PipelineConfig {
    PipelineConfig {
        tree_id: "42".to_string(),
        reference_year: 2026,
        ..Default::default()
    }
}

fn convert(config: &PipelineConfig) -> (String, gedwiki::pipeline::Conversion) {
    let reader = GedcomReader::from_reader(Cursor::new(sample_gedcom().as_bytes().to_vec()));
    let mut conversion = convert_lines(reader, "sample.ged", Schema::defaults(), config).unwrap();
    let xml = String::from_utf8(std::mem::take(&mut conversion.xml)).unwrap();
    (xml, conversion)
}

fn write_bz2(path: &std::path::Path, text: &str) {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(text.as_bytes()).unwrap();
    fs::write(path, encoder.finish().unwrap()).unwrap();
}

// ============================================================================
// Conversion
// ============================================================================

#[test]
fn pages_for_people_families_and_sources() {
    let (xml, conversion) = convert(&config());

    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(xml.contains(r#"<pages tree_id="42">"#));
    assert_eq!(conversion.report.pages, 4);
    assert!(xml.contains(
        r#"<page namespace="108" id="I1" tree_id="42" primary="1" beforeCutoff="true">"#
    ));
    assert!(xml.contains(r#"<page namespace="108" id="I2" tree_id="42" living="true">"#));
    assert!(xml.contains(r#"<page namespace="110" id="F1" tree_id="42">"#));
    assert!(xml.contains(r#"<page namespace="104" id="S1" tree_id="42">"#));
    assert!(!xml.contains(r#"id="N1""#));
}

#[test]
fn person_body() {
    let (xml, _) = convert(&config());

    assert!(xml.contains(r#"<name given="John" surname="Smith"/>"#));
    assert!(xml.contains(r#"<alt_name type="Married Name" given="Johnny" surname="Smithers"/>"#));
    assert!(xml.contains("<gender>M</gender>"));
    assert!(xml.contains(r#"<spouse_of_family id="F1"/>"#));
    assert!(xml.contains(r#"<event_fact id="I1_E1" type="Birth" date="12 MAR 1720" place="Boston">"#));
    assert!(xml.contains(
        r#"<source_citation source_id="S1" title="Boston Records" page="p. 12" quality="3"/>"#
    ));
    assert!(xml.contains(r#"<event_fact id="I1_E2" type="Death" date="1790"/>"#));
    assert!(xml.contains(
        r#"<event_fact id="I1_E3" type="Military" description="Served in militia"/>"#
    ));
    assert!(xml.contains(
        r#"<image parent="I1" caption="John portrait" gedcom_filename="c:\photos\john.jpg" primary="true"/>"#
    ));
    assert!(xml.contains("<note>Served as a\nselectman.</note>"));
    assert!(!xml.contains("weird"));
}

#[test]
fn family_and_source_bodies() {
    let (xml, conversion) = convert(&config());

    assert!(xml.contains(r#"<husband id="I1"/>"#));
    assert!(xml.contains(r#"<wife id="I2"/>"#));
    assert!(xml.contains(r#"<child id="I3"/>"#));
    assert!(xml.contains(r#"<event_fact id="F1_E1" type="Marriage" date="1745"/>"#));

    assert!(xml.contains("<title>Boston Records</title>"));
    assert!(xml.contains("<author>Town Clerk</author>"));
    assert!(xml.contains(
        r#"<repository name="Boston Archive" address="1 City Hall Boston" call_number="974.4"/>"#
    ));
    assert_eq!(conversion.merged_repositories, 1);
}

#[test]
fn interpreter_counters() {
    let (_, conversion) = convert(&config());
    let stats = &conversion.interpret_stats;
    assert_eq!(stats.records, 8);
    assert_eq!(stats.unrecognized_tags, 1);
    assert_eq!(stats.ignored_tags, 1);
    assert_eq!(stats.schema_events, 1);
    assert_eq!(stats.duplicate_records, 0);
}

#[test]
fn inline_source_keeps_continuation_and_page() {
    let ged = "0 @I1@ INDI\n1 NAME Ann /Lee/\n1 SOUR Parish register of\n2 CONC  St Mary\n\
               2 PAGE folio 12\n";
    let reader = GedcomReader::from_reader(Cursor::new(ged.as_bytes().to_vec()));
    let conversion = convert_lines(reader, "inline.ged", Schema::defaults(), &config()).unwrap();
    let xml = String::from_utf8(conversion.xml).unwrap();

    assert!(xml.contains("<title>Parish register of St Mary</title>"));
    assert!(xml.contains(
        r#"<source_citation source_id="_S1" title="Parish register of St Mary" page="folio 12"/>"#
    ));
}

// ============================================================================
// Failure scoping
// ============================================================================

#[test]
fn broken_reference_drops_only_its_owner() {
    let (xml, conversion) = convert(&config());

    assert_eq!(conversion.report.failed.len(), 1);
    assert_eq!(conversion.report.failed[0].id, "I3");
    assert!(conversion.report.failed[0].reason.contains("N999"));
    assert!(!xml.contains(r#"<page namespace="108" id="I3""#));
    assert!(xml.contains(r#"id="I1""#));
    assert!(xml.contains(r#"id="I2""#));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn exclusion_flags() {
    let mut config = config();
    config.exclude_living = true;
    config.exclude_ids.insert("F1".to_string());
    config.primary_id = Some("I2".to_string());
    let (xml, _) = convert(&config);

    assert!(xml.contains(r#"<page namespace="108" id="I1" tree_id="42" beforeCutoff="true">"#));
    assert!(xml.contains(
        r#"<page namespace="108" id="I2" tree_id="42" primary="1" exclude="true" living="true">"#
    ));
    assert!(xml.contains(r#"<page namespace="110" id="F1" tree_id="42" exclude="true">"#));
}

#[test]
fn orphan_repository_as_page() {
    let (xml, conversion) = convert(&config());
    assert_eq!(conversion.report.orphan_repositories, vec!["R2"]);
    assert!(!xml.contains("Unused Library"));

    let mut config = config();
    config.orphan_repositories = OrphanRepositoryPolicy::Page;
    let (xml, _) = convert(&config);
    assert!(xml.contains(r#"<page namespace="104" id="R2" tree_id="42">"#));
    assert!(xml.contains(r#"<repository name="Unused Library"/>"#));
    assert!(!xml.contains(r#"id="R1""#));
}

#[test]
fn unrecognized_text_kept_as_note() {
    let mut config = config();
    config.keep_unrecognized_text = true;
    let (xml, _) = convert(&config);
    assert!(xml.contains("<note>_XYZ: weird</note>"));
}

#[test]
fn schema_file_adds_custom_events() {
    let dir = TempDir::new().unwrap();
    let schema_path = dir.path().join("schema.csv");
    fs::write(&schema_path, "context,tag,label\n# hobbies\nINDI,_HOBBY,Hobby\n").unwrap();
    let mut schema = Schema::with_defaults();
    assert_eq!(schema.load_file(&schema_path).unwrap(), 1);

    let ged_path = dir.path().join("hobby.ged");
    fs::write(&ged_path, "0 @I1@ INDI\n1 NAME Ann /Lee/\n1 _HOBBY Chess\n").unwrap();
    let conversion = convert_file(&ged_path, &schema, &config()).unwrap();
    let xml = String::from_utf8(conversion.xml).unwrap();
    assert!(xml.contains(r#"<event_fact id="I1_E1" type="Hobby" description="Chess"/>"#));
    assert!(!Schema::defaults().contains("INDI", "_HOBBY"));
}

// ============================================================================
// Batch
// ============================================================================

#[test]
fn batch_converts_plain_and_bz2_inputs() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();

    let plain = dir.path().join("smith.ged");
    fs::write(&plain, sample_gedcom()).unwrap();
    let compressed = dir.path().join("jones.ged.bz2");
    write_bz2(&compressed, sample_gedcom());
    let missing = dir.path().join("missing.ged");

    let stats = ConversionStats::new();
    let inputs: Vec<PathBuf> = vec![plain, compressed, missing];
    let reports = convert_files(&inputs, &out, Schema::defaults(), &config(), &stats, false);

    assert_eq!(reports.len(), 3);
    assert_eq!(stats.files(), 2);
    assert_eq!(stats.failed_files(), 1);
    assert_eq!(stats.pages(), 8);
    assert_eq!(stats.failed_pages(), 2);

    for name in ["smith.xml", "jones.xml"] {
        let xml = fs::read_to_string(out.join(name)).unwrap();
        assert!(xml.contains(r#"id="I1""#), "{name} is missing I1");
    }
    assert!(!out.join("missing.xml").exists());

    let failed = reports.iter().find(|r| r.error.is_some()).unwrap();
    assert!(failed.input.ends_with("missing.ged"));

    let json = serde_json::to_string(&reports).unwrap();
    assert!(json.contains("N999"));
}
