use crate::config::{
    BIRTH_EVENTS, DEATH_EVENTS, FAMILY_NAMESPACE, NOTE_NAMESPACE, PERSON_NAMESPACE,
    REPOSITORY_NAMESPACE, SOURCE_NAMESPACE,
};
use crate::name::Name;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

static YEAR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{3,4})\b").unwrap());

/// Strips the `@..@` delimiters from a pointer value.
pub fn pointer_id(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.len() > 2 && value.starts_with('@') && value.ends_with('@') {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

/// Appends `text` to `field`; a missing or empty field is simply set.
pub fn append(field: &mut Option<String>, text: &str, separator: &str) {
    match field {
        Some(existing) if !existing.is_empty() => {
            existing.push_str(separator);
            existing.push_str(text);
        }
        _ => *field = Some(text.to_string()),
    }
}

/// First three- or four-digit year in a GEDCOM date.
pub fn date_year(date: &str) -> Option<i32> {
    YEAR_REGEX
        .captures(date)
        .and_then(|c| c[1].parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    Note,
    Source,
}

/// Deferred reference to a Note or Source record.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub kind: CitationKind,
    pub upper_id: String,
    pub page: Option<String>,
    pub quality: Option<String>,
    pub date: Option<String>,
    pub text: Option<String>,
    pub data: Vec<Data>,
    pub note_citations: Vec<Citation>,
    pub images: Vec<Image>,
    /// Note text or source title, filled in by the resolver.
    pub resolved: Option<String>,
}

impl Citation {
    pub fn new(kind: CitationKind, upper_id: &str) -> Self {
        Self {
            kind,
            upper_id: upper_id.to_string(),
            page: None,
            quality: None,
            date: None,
            text: None,
            data: Vec::new(),
            note_citations: Vec::new(),
            images: Vec::new(),
            resolved: None,
        }
    }

    pub fn note(upper_id: &str) -> Self {
        Self::new(CitationKind::Note, upper_id)
    }

    pub fn source(upper_id: &str) -> Self {
        Self::new(CitationKind::Source, upper_id)
    }
}

/// GEDCOM `DATA` sub-record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    pub date: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    /// Id of the event, citation or record that owns the image. Required for printing.
    pub parent: Option<String>,
    pub gedcom_file_name: Option<String>,
    pub caption: Option<String>,
    pub date: Option<String>,
    pub primary: bool,
    /// Pointer to a level-0 OBJE record, when the image was cited rather than inlined.
    pub media_ref: Option<String>,
    pub note_citations: Vec<Citation>,
    pub source_citations: Vec<Citation>,
}

impl Image {
    pub fn append_caption(&mut self, text: &str) {
        append(&mut self.caption, text, " ");
    }

    /// Fills blank fields from a shared OBJE record.
    pub fn fill_from(&mut self, media: &Image) {
        if self.gedcom_file_name.is_none() {
            self.gedcom_file_name = media.gedcom_file_name.clone();
        }
        if let Some(caption) = &media.caption {
            self.append_caption(caption);
        }
        if self.date.is_none() {
            self.date = media.date.clone();
        }
        self.primary |= media.primary;
        self.note_citations
            .extend(media.note_citations.iter().cloned());
        self.source_citations
            .extend(media.source_citations.iter().cloned());
    }
}

/// Anything that owns images and therefore parents them.
pub trait EventContainer {
    fn container_id(&self) -> &str;
    fn images_mut(&mut self) -> &mut Vec<Image>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Standard,
    /// EVEN/FACT records and schema-mapped vendor tags.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub event_type: String,
    pub date: Option<String>,
    pub place: Option<String>,
    pub description: Option<String>,
    pub note_citations: Vec<Citation>,
    pub source_citations: Vec<Citation>,
    pub images: Vec<Image>,
}

impl Event {
    pub fn new(id: String, kind: EventKind, event_type: &str) -> Self {
        Self {
            id,
            kind,
            event_type: event_type.to_string(),
            date: None,
            place: None,
            description: None,
            note_citations: Vec::new(),
            source_citations: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.date.as_deref().and_then(date_year)
    }
}

impl EventContainer for Event {
    fn container_id(&self) -> &str {
        &self.id
    }

    fn images_mut(&mut self) -> &mut Vec<Image> {
        &mut self.images
    }
}

/// FAMC/FAMS on a person, or CHIL on a family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyLink {
    pub id: String,
    pub pedigree: Option<String>,
    pub mother_relation: Option<String>,
    pub father_relation: Option<String>,
}

impl FamilyLink {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

/// Fields shared by every level-0 record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub uid: Option<String>,
    pub namespace: i32,
    pub note_citations: Vec<Citation>,
    pub source_citations: Vec<Citation>,
    pub images: Vec<Image>,
    pub problems: Vec<String>,
    pub matches: Option<String>,
    /// Free text notes that need no resolution.
    pub notes: Vec<String>,
    /// Unclassified text waiting to be eaten into `notes`.
    pub ignored: Vec<String>,
}

impl Record {
    pub fn new(id: &str, namespace: i32) -> Self {
        Self {
            id: id.to_string(),
            uid: None,
            namespace,
            note_citations: Vec::new(),
            source_citations: Vec::new(),
            images: Vec::new(),
            problems: Vec::new(),
            matches: None,
            notes: Vec::new(),
            ignored: Vec::new(),
        }
    }

    pub fn add_problem(&mut self, problem: impl Into<String>) {
        let problem = problem.into();
        if !self.problems.contains(&problem) {
            self.problems.push(problem);
        }
    }
}

impl EventContainer for Record {
    fn container_id(&self) -> &str {
        &self.id
    }

    fn images_mut(&mut self) -> &mut Vec<Image> {
        &mut self.images
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub record: Record,
    pub names: Vec<Name>,
    pub gender: Option<String>,
    pub events: Vec<Event>,
    pub child_of: Vec<FamilyLink>,
    pub spouse_of: Vec<FamilyLink>,
}

impl Person {
    pub fn new(id: &str) -> Self {
        Self {
            record: Record::new(id, PERSON_NAMESPACE),
            names: Vec::new(),
            gender: None,
            events: Vec::new(),
            child_of: Vec::new(),
            spouse_of: Vec::new(),
        }
    }

    pub fn has_death_event(&self) -> bool {
        self.events
            .iter()
            .any(|e| DEATH_EVENTS.contains(&e.event_type.as_str()))
    }

    /// Years of birth-type events, in file order.
    pub fn birth_years(&self) -> Vec<i32> {
        self.events
            .iter()
            .filter(|e| BIRTH_EVENTS.contains(&e.event_type.as_str()))
            .filter_map(Event::year)
            .collect()
    }

    pub fn has_dated_event(&self) -> bool {
        self.events.iter().any(|e| e.year().is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub record: Record,
    pub husband: Option<String>,
    pub wife: Option<String>,
    pub children: Vec<FamilyLink>,
    pub events: Vec<Event>,
}

impl Family {
    pub fn new(id: &str) -> Self {
        Self {
            record: Record::new(id, FAMILY_NAMESPACE),
            husband: None,
            wife: None,
            children: Vec::new(),
            events: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub record: Record,
    pub text: Option<String>,
}

impl Note {
    pub fn new(id: &str) -> Self {
        Self {
            record: Record::new(id, NOTE_NAMESPACE),
            text: None,
        }
    }
}

/// `REPO @R1@` on a source, with the call number given at the citation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryRef {
    pub upper_id: String,
    pub call_num: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub record: Record,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication: Option<String>,
    pub abbreviation: Option<String>,
    pub text: Option<String>,
    pub repository_refs: Vec<RepositoryRef>,
    /// Owned copies of every cited repository, filled in by the resolver.
    pub repositories: Vec<Repository>,
}

impl Source {
    pub fn new(id: &str) -> Self {
        Self {
            record: Record::new(id, SOURCE_NAMESPACE),
            title: None,
            author: None,
            publication: None,
            abbreviation: None,
            text: None,
            repository_refs: Vec::new(),
            repositories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    pub record: Record,
    pub name: Option<String>,
    pub address: Option<String>,
    pub call_num: Option<String>,
}

impl Repository {
    pub fn new(id: &str) -> Self {
        Self {
            record: Record::new(id, REPOSITORY_NAMESPACE),
            name: None,
            address: None,
            call_num: None,
        }
    }

    pub fn append_name(&mut self, text: &str) {
        append(&mut self.name, text, "");
    }

    pub fn append_to_address(&mut self, text: &str) {
        append(&mut self.address, text, " ");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopObject {
    Person(Person),
    Family(Family),
    Note(Note),
    Source(Source),
    Repository(Repository),
}

impl TopObject {
    pub fn record(&self) -> &Record {
        match self {
            TopObject::Person(p) => &p.record,
            TopObject::Family(f) => &f.record,
            TopObject::Note(n) => &n.record,
            TopObject::Source(s) => &s.record,
            TopObject::Repository(r) => &r.record,
        }
    }

    pub fn record_mut(&mut self) -> &mut Record {
        match self {
            TopObject::Person(p) => &mut p.record,
            TopObject::Family(f) => &mut f.record,
            TopObject::Note(n) => &mut n.record,
            TopObject::Source(s) => &mut s.record,
            TopObject::Repository(r) => &mut r.record,
        }
    }

    pub fn id(&self) -> &str {
        &self.record().id
    }

    pub fn namespace(&self) -> i32 {
        self.record().namespace
    }

    /// GEDCOM record tag, used in diagnostics.
    pub fn context(&self) -> &'static str {
        match self {
            TopObject::Person(_) => "INDI",
            TopObject::Family(_) => "FAM",
            TopObject::Note(_) => "NOTE",
            TopObject::Source(_) => "SOUR",
            TopObject::Repository(_) => "REPO",
        }
    }
}

/// File-scoped id table. Insertion order is kept for deterministic output.
#[derive(Debug, Default)]
pub struct Gedcom {
    pub tree_id: String,
    objects: FxHashMap<String, TopObject>,
    order: Vec<String>,
    /// Level-0 OBJE records, referenced by `OBJE @O1@`.
    pub media: FxHashMap<String, Image>,
    synthetic_ids: u32,
}

impl Gedcom {
    pub fn new(tree_id: &str) -> Self {
        Self {
            tree_id: tree_id.to_string(),
            ..Default::default()
        }
    }

    /// Registers `object`. The first definition of an id wins; returns false
    /// and drops `object` when the id is already taken.
    pub fn insert(&mut self, object: TopObject) -> bool {
        let id = object.id().to_string();
        if self.objects.contains_key(&id) {
            return false;
        }
        self.order.push(id.clone());
        self.objects.insert(id, object);
        true
    }

    pub fn get(&self, id: &str) -> Option<&TopObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TopObject> {
        self.objects.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<TopObject> {
        let removed = self.objects.remove(id);
        if removed.is_some() {
            self.order.retain(|o| o != id);
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Objects in the order they were defined.
    pub fn iter(&self) -> impl Iterator<Item = &TopObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Fresh id for records that appear inline, e.g. `_N3`.
    pub fn next_synthetic_id(&mut self, prefix: char) -> String {
        self.synthetic_ids += 1;
        format!("_{}{}", prefix, self.synthetic_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_to_none_sets() {
        let mut field = None;
        append(&mut field, "X", " ");
        assert_eq!(field.as_deref(), Some("X"));
    }

    #[test]
    fn append_inserts_one_separator() {
        let mut field = Some("A".to_string());
        append(&mut field, "B", " ");
        assert_eq!(field.as_deref(), Some("A B"));

        let mut field = Some("A".to_string());
        append(&mut field, "B", "");
        assert_eq!(field.as_deref(), Some("AB"));
    }

    #[test]
    fn append_to_empty_skips_separator() {
        let mut field = Some(String::new());
        append(&mut field, "B", " ");
        assert_eq!(field.as_deref(), Some("B"));
    }

    #[test]
    fn repository_append_separators() {
        let mut repo = Repository::new("R1");
        repo.append_name("Family History ");
        repo.append_name("Library");
        repo.append_to_address("35 N West Temple");
        repo.append_to_address("Salt Lake City");
        assert_eq!(repo.name.as_deref(), Some("Family History Library"));
        assert_eq!(
            repo.address.as_deref(),
            Some("35 N West Temple Salt Lake City")
        );
    }

    #[test]
    fn image_caption_is_space_delimited() {
        let mut image = Image::default();
        image.append_caption("Wedding");
        image.append_caption("1921");
        assert_eq!(image.caption.as_deref(), Some("Wedding 1921"));
    }

    #[test]
    fn pointer_ids() {
        assert_eq!(pointer_id("@I1@"), Some("I1"));
        assert_eq!(pointer_id(" @N12@ "), Some("N12"));
        assert_eq!(pointer_id("plain text"), None);
        assert_eq!(pointer_id("@@"), None);
    }

    #[test]
    fn years_from_dates() {
        assert_eq!(date_year("12 MAR 1850"), Some(1850));
        assert_eq!(date_year("ABT 987"), Some(987));
        assert_eq!(date_year("BET 1900 AND 1910"), Some(1900));
        assert_eq!(date_year("MAR 12"), None);
    }

    #[test]
    fn gedcom_rejects_duplicate_ids() {
        let mut gedcom = Gedcom::new("1");
        assert!(gedcom.insert(TopObject::Person(Person::new("I1"))));
        assert!(!gedcom.insert(TopObject::Person(Person::new("I1"))));
        assert_eq!(gedcom.len(), 1);
    }

    #[test]
    fn gedcom_keeps_definition_order() {
        let mut gedcom = Gedcom::new("1");
        gedcom.insert(TopObject::Family(Family::new("F1")));
        gedcom.insert(TopObject::Person(Person::new("I9")));
        gedcom.insert(TopObject::Person(Person::new("I2")));
        let ids: Vec<&str> = gedcom.iter().map(TopObject::id).collect();
        assert_eq!(ids, vec!["F1", "I9", "I2"]);

        gedcom.remove("I9");
        assert_eq!(gedcom.ids(), &["F1".to_string(), "I2".to_string()]);
    }

    #[test]
    fn synthetic_ids_are_unique() {
        let mut gedcom = Gedcom::new("1");
        assert_eq!(gedcom.next_synthetic_id('N'), "_N1");
        assert_eq!(gedcom.next_synthetic_id('S'), "_S2");
    }

    #[test]
    fn namespaces_per_variant() {
        assert_eq!(TopObject::Person(Person::new("I1")).namespace(), PERSON_NAMESPACE);
        assert_eq!(TopObject::Family(Family::new("F1")).namespace(), FAMILY_NAMESPACE);
        assert_eq!(TopObject::Source(Source::new("S1")).namespace(), SOURCE_NAMESPACE);
    }

    #[test]
    fn problems_are_not_repeated() {
        let mut record = Record::new("I1", PERSON_NAMESPACE);
        record.add_problem("Missing name");
        record.add_problem("Missing name");
        assert_eq!(record.problems.len(), 1);
    }
}
