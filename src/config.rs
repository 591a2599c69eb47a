/// Wiki namespace for person pages
pub const PERSON_NAMESPACE: i32 = 108;

/// Wiki namespace for family pages
pub const FAMILY_NAMESPACE: i32 = 110;

/// Wiki namespace for source pages (orphan repositories print here too)
pub const SOURCE_NAMESPACE: i32 = 104;

/// Notes never get their own page; the value only tags the record
pub const NOTE_NAMESPACE: i32 = 0;

pub const REPOSITORY_NAMESPACE: i32 = SOURCE_NAMESPACE;

/// People born before this year are flagged `beforeCutoff`
pub const DEFAULT_CUTOFF_YEAR: i32 = 1750;

/// A person without a death event is presumed living if born within this many years
pub const LIVING_YEARS: i32 = 110;

/// Label used for alternate names without a TYPE
pub const DEFAULT_ALT_NAME_TYPE: &str = "Alt Name";

/// Display type for EVEN/FACT records without a TYPE
pub const OTHER_EVENT_TYPE: &str = "Other";

/// Separator used when joining problems into the page attribute
pub const PROBLEM_SEPARATOR: &str = "|";

/// Tags whose whole subtree is dropped without a diagnostic.
pub const IGNORED_TAGS: &[&str] = &[
    "FORM", "_SCBK", "_TYPE", "CHAN", "RIN", "RFN", "AFN", "REFN", "_PPEXCLUDE", "_FSFTID",
    "SUBM", "_CRE", "_UPD", "MEDI",
];

/// Level-0 records that carry nothing for the wiki.
pub const SKIPPED_RECORDS: &[&str] = &["HEAD", "SUBM", "SUBN", "TRLR"];

pub const PERSON_EVENTS: &[(&str, &str)] = &[
    ("BIRT", "Birth"),
    ("CHR", "Christening"),
    ("BAPM", "Baptism"),
    ("BARM", "Bar Mitzvah"),
    ("BASM", "Bas Mitzvah"),
    ("BLES", "Blessing"),
    ("CHRA", "Adult Christening"),
    ("CONF", "Confirmation"),
    ("FCOM", "First Communion"),
    ("ORDN", "Ordination"),
    ("NATU", "Naturalization"),
    ("EMIG", "Emigration"),
    ("IMMI", "Immigration"),
    ("CENS", "Census"),
    ("PROB", "Probate"),
    ("WILL", "Will"),
    ("GRAD", "Graduation"),
    ("RETI", "Retirement"),
    ("DEAT", "Death"),
    ("BURI", "Burial"),
    ("CREM", "Cremation"),
    ("ADOP", "Adoption"),
    ("RESI", "Residence"),
    ("OCCU", "Occupation"),
    ("EDUC", "Education"),
    ("RELI", "Religion"),
    ("NATI", "Nationality"),
    ("TITL", "Title (nobility)"),
    ("DSCR", "Physical Description"),
    ("PROP", "Property"),
    ("CAST", "Caste"),
    ("NCHI", "Number of Children"),
    ("NMR", "Number of Marriages"),
    ("SSN", "Social Security Number"),
    ("EVEN", OTHER_EVENT_TYPE),
    ("FACT", OTHER_EVENT_TYPE),
];

pub const FAMILY_EVENTS: &[(&str, &str)] = &[
    ("MARR", "Marriage"),
    ("MARB", "Marriage Banns"),
    ("MARC", "Marriage Contract"),
    ("MARL", "Marriage License"),
    ("MARS", "Marriage Settlement"),
    ("ENGA", "Engagement"),
    ("DIV", "Divorce"),
    ("DIVF", "Divorce Filing"),
    ("ANUL", "Annulment"),
    ("CENS", "Census"),
    ("RESI", "Residence"),
    ("EVEN", OTHER_EVENT_TYPE),
    ("FACT", OTHER_EVENT_TYPE),
];

/// Event types that mark a person as deceased
pub const DEATH_EVENTS: &[&str] = &["Death", "Burial", "Cremation"];

/// Event types that date a person's birth
pub const BIRTH_EVENTS: &[&str] = &["Birth", "Christening", "Baptism"];

pub fn person_event_label(tag: &str) -> Option<&'static str> {
    PERSON_EVENTS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, label)| *label)
}

pub fn family_event_label(tag: &str) -> Option<&'static str> {
    FAMILY_EVENTS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, label)| *label)
}
