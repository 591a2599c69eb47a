//! Builds the entity graph from a stream of GEDCOM lines.
//!
//! Each open record or sub-record is a frame on a stack keyed by its level.
//! A line at level L first closes every frame at level L or deeper, attaching
//! each closed entity to its parent, and is then classified against the
//! frame on top, in this order:
//!
//! 1. **structural** tags open a new frame (events, names, citations, ...)
//! 2. **attribute** tags set a field on the current entity
//! 3. **ignorable** tags are dropped with their subtree, silently
//! 4. **schema** tags under a person or family become "Other" events
//! 5. anything else is **unrecognized**: logged and dropped
//!
//! References are only recorded here; the resolver follows them once the
//! whole file has been read.

use crate::config::{
    family_event_label, person_event_label, DEFAULT_ALT_NAME_TYPE, IGNORED_TAGS,
    OTHER_EVENT_TYPE, SKIPPED_RECORDS,
};
use crate::models::{
    append, pointer_id, Citation, CitationKind, Data, Event, EventKind, Family, FamilyLink,
    Gedcom, Image, Note, Person, Repository, RepositoryRef, Source, TopObject,
};
use crate::name::{alternate_type_label, Name};
use crate::parser::GedcomLine;
use crate::schema::Schema;
use tracing::{debug, warn};

const ADDRESS_PARTS: &[&str] = &[
    "ADR1", "ADR2", "ADR3", "CITY", "STAE", "POST", "CTRY", "PHON", "EMAIL", "FAX", "WWW",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    ChildOf,
    SpouseOf,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Title,
    Author,
    Publication,
    Abbreviation,
    Text,
    Page,
    Place,
    Address,
    Name,
    Caption,
}

impl TextField {
    fn continuation_separator(self) -> &'static str {
        match self {
            TextField::Address | TextField::Caption | TextField::Place => " ",
            TextField::Name => "",
            _ => "\n",
        }
    }
}

#[derive(Debug)]
enum Frame {
    /// A level-0 record.
    Record(TopObject),
    /// A note or repository written out in place instead of by pointer.
    Inline(TopObject),
    /// A source described in place, with the citation details that would
    /// otherwise sit under a pointer citation.
    InlineSource(Source, Citation),
    /// A level-0 OBJE record.
    Media(String, Image),
    Event(Event),
    /// The name plus alternates derived from NICK/_MARNM/_AKA below it.
    Name(Name, Vec<Name>),
    Image(Image),
    Citation(Citation),
    RepositoryRef(RepositoryRef),
    Data(Data),
    Link(LinkKind, FamilyLink),
    Text(TextField, Option<String>),
    /// Text of an unrecognized tag, kept for the record's ignored bucket.
    Unrecognized(String, Option<String>),
    Skip,
}

impl Frame {
    fn context(&self) -> &'static str {
        match self {
            Frame::Record(obj) | Frame::Inline(obj) => obj.context(),
            Frame::InlineSource(..) => "SOUR",
            Frame::Media(..) | Frame::Image(_) => "OBJE",
            Frame::Event(_) => "event",
            Frame::Name(..) => "NAME",
            Frame::Citation(c) => match c.kind {
                CitationKind::Note => "NOTE citation",
                CitationKind::Source => "SOUR citation",
            },
            Frame::RepositoryRef(_) => "REPO citation",
            Frame::Data(_) => "DATA",
            Frame::Link(LinkKind::ChildOf, _) => "FAMC",
            Frame::Link(LinkKind::SpouseOf, _) => "FAMS",
            Frame::Link(LinkKind::Child, _) => "CHIL",
            Frame::Text(..) => "text",
            Frame::Unrecognized(..) => "unrecognized",
            Frame::Skip => "skipped",
        }
    }

    fn note_citations_mut(&mut self) -> Option<&mut Vec<Citation>> {
        match self {
            Frame::Record(obj) | Frame::Inline(obj) => Some(&mut obj.record_mut().note_citations),
            Frame::InlineSource(s, _) => Some(&mut s.record.note_citations),
            Frame::Event(e) => Some(&mut e.note_citations),
            Frame::Name(n, _) => Some(&mut n.note_citations),
            Frame::Image(i) | Frame::Media(_, i) => Some(&mut i.note_citations),
            Frame::Citation(c) => Some(&mut c.note_citations),
            _ => None,
        }
    }

    fn source_citations_mut(&mut self) -> Option<&mut Vec<Citation>> {
        match self {
            Frame::Record(obj) | Frame::Inline(obj) => {
                Some(&mut obj.record_mut().source_citations)
            }
            Frame::InlineSource(s, _) => Some(&mut s.record.source_citations),
            Frame::Event(e) => Some(&mut e.source_citations),
            Frame::Name(n, _) => Some(&mut n.source_citations),
            Frame::Image(i) | Frame::Media(_, i) => Some(&mut i.source_citations),
            _ => None,
        }
    }

    fn images_mut(&mut self) -> Option<&mut Vec<Image>> {
        match self {
            Frame::Record(obj) | Frame::Inline(obj) => Some(&mut obj.record_mut().images),
            Frame::InlineSource(s, _) => Some(&mut s.record.images),
            Frame::Event(e) => Some(&mut e.images),
            Frame::Citation(c) => Some(&mut c.images),
            _ => None,
        }
    }

    fn source_mut(&mut self) -> Option<&mut Source> {
        match self {
            Frame::Record(TopObject::Source(s)) | Frame::InlineSource(s, _) => Some(s),
            _ => None,
        }
    }
}

/// Outcome of offering a line to the frame on top of the stack.
enum Action {
    Push(Frame),
    Done,
    NotHandled,
}

/// Counters for one interpreted file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterpretStats {
    pub lines: u64,
    pub records: u64,
    pub ignored_tags: u64,
    pub unrecognized_tags: u64,
    pub schema_events: u64,
    pub duplicate_records: u64,
}

/// Where the interpreter currently is, for ids and diagnostics.
#[derive(Debug, Default)]
struct Scope {
    record_id: String,
    context: &'static str,
    event_seq: u32,
}

impl Scope {
    fn next_event_id(&mut self) -> String {
        self.event_seq += 1;
        format!("{}_E{}", self.record_id, self.event_seq)
    }
}

pub struct Interpreter<'a> {
    schema: &'a Schema,
    gedcom: Gedcom,
    stack: Vec<(u32, Frame)>,
    scope: Scope,
    keep_unrecognized_text: bool,
    stats: InterpretStats,
}

impl<'a> Interpreter<'a> {
    pub fn new(schema: &'a Schema, tree_id: &str) -> Self {
        Self {
            schema,
            gedcom: Gedcom::new(tree_id),
            stack: Vec::new(),
            scope: Scope::default(),
            keep_unrecognized_text: false,
            stats: InterpretStats::default(),
        }
    }

    /// Keep the text of unrecognized tags in the record's ignored bucket.
    pub fn keep_unrecognized_text(mut self, keep: bool) -> Self {
        self.keep_unrecognized_text = keep;
        self
    }

    pub fn feed(&mut self, line: GedcomLine) {
        self.stats.lines += 1;
        self.close_to(line.level);

        if line.level == 0 {
            self.start_record(line);
            return;
        }

        let Some((_, frame)) = self.stack.last_mut() else {
            warn!(tag = %line.tag, level = line.level, "Line outside any record, skipping");
            self.stack.push((line.level, Frame::Skip));
            return;
        };
        if matches!(frame, Frame::Skip) {
            return;
        }

        match offer(frame, &line, &mut self.scope, &mut self.gedcom) {
            Action::Push(child) => self.stack.push((line.level, child)),
            Action::Done => {}
            Action::NotHandled => self.fall_through(line),
        }
    }

    pub fn finish(mut self) -> (Gedcom, InterpretStats) {
        self.close_to(0);
        (self.gedcom, self.stats)
    }

    /// Dispositions 3 to 5 for a tag no frame handler claimed.
    fn fall_through(&mut self, line: GedcomLine) {
        if IGNORED_TAGS.contains(&line.tag.as_str()) {
            self.stats.ignored_tags += 1;
            self.stack.push((line.level, Frame::Skip));
            return;
        }

        let on_record = matches!(
            self.stack.last(),
            Some((_, Frame::Record(TopObject::Person(_) | TopObject::Family(_))))
        );
        if on_record {
            let schema = self.schema;
            if let Some(label) = schema.get(self.scope.context, &line.tag) {
                debug!(tag = %line.tag, label, id = %self.scope.record_id, "Schema event");
                self.stats.schema_events += 1;
                let mut event =
                    Event::new(self.scope.next_event_id(), EventKind::Other, label);
                event.description = non_empty(&line.value);
                self.stack.push((line.level, Frame::Event(event)));
                return;
            }
        }

        let context = self
            .stack
            .last()
            .map(|(_, f)| f.context())
            .unwrap_or("file");
        warn!(
            tag = %line.tag,
            id = %self.scope.record_id,
            "Ignoring tag inside {}",
            context
        );
        self.stats.unrecognized_tags += 1;

        let frame = if self.keep_unrecognized_text {
            Frame::Unrecognized(line.tag, raw_text(&line.value))
        } else {
            Frame::Skip
        };
        self.stack.push((line.level, frame));
    }

    /// Files collected text in the ignored bucket of the enclosing record.
    fn keep_ignored(&mut self, tag: &str, text: Option<String>) {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return;
        };
        match self.stack.first_mut() {
            Some((_, Frame::Record(obj))) => {
                obj.record_mut().ignored.push(format!("{}: {}", tag, text.trim()));
            }
            _ => debug!(tag, id = %self.scope.record_id, "No record to keep text for"),
        }
    }

    fn start_record(&mut self, line: GedcomLine) {
        let tag = line.tag.as_str();
        if SKIPPED_RECORDS.contains(&tag) {
            self.stack.push((0, Frame::Skip));
            return;
        }

        let Some(id) = line.xref.as_deref() else {
            warn!(tag, "Ignoring record without an id");
            self.stack.push((0, Frame::Skip));
            return;
        };

        let frame = match tag {
            "INDI" | "INDIVIDUAL" => Frame::Record(TopObject::Person(Person::new(id))),
            "FAM" | "FAMILY" => Frame::Record(TopObject::Family(Family::new(id))),
            "SOUR" | "SOURCE" => {
                let mut source = Source::new(id);
                source.title = non_empty(&line.value);
                Frame::Record(TopObject::Source(source))
            }
            "NOTE" => {
                let mut note = Note::new(id);
                note.text = non_empty(&line.value);
                Frame::Record(TopObject::Note(note))
            }
            "REPO" | "REPOSITORY" => {
                let mut repo = Repository::new(id);
                repo.name = non_empty(&line.value);
                Frame::Record(TopObject::Repository(repo))
            }
            "OBJE" => Frame::Media(id.to_string(), Image::default()),
            _ => {
                warn!(tag, id, "Ignoring record");
                Frame::Skip
            }
        };

        let context = match &frame {
            Frame::Record(obj) => {
                self.stats.records += 1;
                obj.context()
            }
            other => other.context(),
        };
        self.scope = Scope {
            record_id: id.to_string(),
            context,
            event_seq: 0,
        };
        self.stack.push((0, frame));
    }

    /// Closes every frame at `level` or deeper.
    fn close_to(&mut self, level: u32) {
        while matches!(self.stack.last(), Some((l, _)) if *l >= level) {
            let Some((_, child)) = self.stack.pop() else {
                break;
            };
            if let Frame::Unrecognized(tag, text) = child {
                self.keep_ignored(&tag, text);
                continue;
            }
            match self.stack.last_mut() {
                Some((_, parent)) => attach(child, parent, &mut self.gedcom),
                None => self.register(child),
            }
        }
    }

    fn register(&mut self, frame: Frame) {
        match frame {
            Frame::Record(obj) => {
                let id = obj.id().to_string();
                if !self.gedcom.insert(obj) {
                    warn!(id = %id, "Duplicate record id, keeping the first definition");
                    self.stats.duplicate_records += 1;
                    if let Some(existing) = self.gedcom.get_mut(&id) {
                        existing.record_mut().add_problem("Duplicate record id");
                    }
                }
            }
            Frame::Media(id, image) => {
                if self.gedcom.media.contains_key(&id) {
                    warn!(id = %id, "Duplicate media id, keeping the first definition");
                    self.stats.duplicate_records += 1;
                } else {
                    self.gedcom.media.insert(id, image);
                }
            }
            Frame::Skip => {}
            other => warn!(context = other.context(), "Dangling frame at level 0"),
        }
    }
}

/// Runs a whole line stream through a fresh interpreter.
pub fn interpret<I>(
    lines: I,
    schema: &Schema,
    tree_id: &str,
    keep_unrecognized_text: bool,
) -> (Gedcom, InterpretStats)
where
    I: IntoIterator<Item = GedcomLine>,
{
    let mut interpreter =
        Interpreter::new(schema, tree_id).keep_unrecognized_text(keep_unrecognized_text);
    for line in lines {
        interpreter.feed(line);
    }
    interpreter.finish()
}

/// Dispositions 1 and 2: structural and attribute tags of the current frame.
fn offer(frame: &mut Frame, line: &GedcomLine, scope: &mut Scope, gedcom: &mut Gedcom) -> Action {
    match frame {
        Frame::Record(TopObject::Person(p)) => person_line(p, line, scope, gedcom),
        Frame::Record(TopObject::Family(f)) => family_line(f, line, scope, gedcom),
        Frame::Record(TopObject::Source(s)) => source_line(s, line, gedcom),
        Frame::InlineSource(s, citation) => inline_source_line(s, citation, line, gedcom),
        Frame::Record(TopObject::Note(n)) | Frame::Inline(TopObject::Note(n)) => {
            note_line(n, line, gedcom)
        }
        Frame::Record(TopObject::Repository(r)) | Frame::Inline(TopObject::Repository(r)) => {
            repository_line(r, line, gedcom)
        }
        Frame::Inline(_) => Action::NotHandled,
        Frame::Media(_, image) | Frame::Image(image) => image_line(image, line, gedcom),
        Frame::Event(event) => event_line(event, line, gedcom),
        Frame::Name(name, derived) => name_line(name, derived, line, gedcom),
        Frame::Citation(citation) => citation_line(citation, line, gedcom),
        Frame::RepositoryRef(r) => match line.tag.as_str() {
            "CALN" => {
                r.call_num = non_empty(&line.value);
                Action::Done
            }
            _ => Action::NotHandled,
        },
        Frame::Data(data) => match line.tag.as_str() {
            "DATE" => {
                data.date = non_empty(&line.value);
                Action::Done
            }
            "TEXT" => Action::Push(Frame::Text(TextField::Text, raw_text(&line.value))),
            _ => Action::NotHandled,
        },
        Frame::Link(_, link) => match line.tag.as_str() {
            "PEDI" => {
                link.pedigree = non_empty(&line.value);
                Action::Done
            }
            "_MREL" => {
                link.mother_relation = non_empty(&line.value);
                Action::Done
            }
            "_FREL" => {
                link.father_relation = non_empty(&line.value);
                Action::Done
            }
            _ => Action::NotHandled,
        },
        Frame::Text(field, value) => text_line(*field, value, line),
        Frame::Unrecognized(_, text) => match text_line(TextField::Text, text, line) {
            Action::NotHandled => Action::Push(Frame::Skip),
            handled => handled,
        },
        Frame::Skip => Action::Done,
    }
}

fn person_line(
    p: &mut Person,
    line: &GedcomLine,
    scope: &mut Scope,
    gedcom: &mut Gedcom,
) -> Action {
    match line.tag.as_str() {
        "NAME" => {
            let mut name = if p.names.is_empty() {
                Name::primary()
            } else {
                Name::alternate(DEFAULT_ALT_NAME_TYPE)
            };
            name.set_name(&line.value);
            Action::Push(Frame::Name(name, Vec::new()))
        }
        "SEX" => {
            p.gender = non_empty(&line.value);
            Action::Done
        }
        "FAMC" => link_frame(LinkKind::ChildOf, line),
        "FAMS" => link_frame(LinkKind::SpouseOf, line),
        tag => match person_event_label(tag) {
            Some(label) => Action::Push(Frame::Event(new_event(label, line, scope))),
            None => record_line(&mut p.record.uid, line, gedcom),
        },
    }
}

fn family_line(
    f: &mut Family,
    line: &GedcomLine,
    scope: &mut Scope,
    gedcom: &mut Gedcom,
) -> Action {
    match line.tag.as_str() {
        "HUSB" | "WIFE" => match pointer_id(&line.value) {
            Some(id) if line.tag == "HUSB" => {
                f.husband = Some(id.to_string());
                Action::Done
            }
            Some(id) => {
                f.wife = Some(id.to_string());
                Action::Done
            }
            None => Action::NotHandled,
        },
        "CHIL" => link_frame(LinkKind::Child, line),
        tag => match family_event_label(tag) {
            Some(label) => Action::Push(Frame::Event(new_event(label, line, scope))),
            None => record_line(&mut f.record.uid, line, gedcom),
        },
    }
}

fn source_line(s: &mut Source, line: &GedcomLine, gedcom: &mut Gedcom) -> Action {
    let value = raw_text(&line.value);
    match line.tag.as_str() {
        "TITL" | "TITLE" => Action::Push(Frame::Text(TextField::Title, value)),
        "AUTH" | "AUTHOR" => Action::Push(Frame::Text(TextField::Author, value)),
        "PUBL" => Action::Push(Frame::Text(TextField::Publication, value)),
        "ABBR" => Action::Push(Frame::Text(TextField::Abbreviation, value)),
        "TEXT" => Action::Push(Frame::Text(TextField::Text, value)),
        "REPO" => match pointer_id(&line.value) {
            Some(id) => Action::Push(Frame::RepositoryRef(RepositoryRef {
                upper_id: id.to_string(),
                call_num: None,
            })),
            None => {
                let mut repo = Repository::new(&gedcom.next_synthetic_id('R'));
                repo.name = non_empty(&line.value);
                Action::Push(Frame::Inline(TopObject::Repository(repo)))
            }
        },
        _ => record_line(&mut s.record.uid, line, gedcom),
    }
}

/// The description of an in-place source is its title, continued by
/// CONC/CONT. PAGE, QUAY, DATE and DATA belong to the citation.
fn inline_source_line(
    s: &mut Source,
    citation: &mut Citation,
    line: &GedcomLine,
    gedcom: &mut Gedcom,
) -> Action {
    match line.tag.as_str() {
        "CONC" => {
            append(&mut s.title, &line.value, "");
            Action::Done
        }
        "CONT" => {
            append(&mut s.title, &line.value, "\n");
            Action::Done
        }
        "PAGE" | "QUAY" | "DATE" | "DATA" => citation_line(citation, line, gedcom),
        _ => source_line(s, line, gedcom),
    }
}

fn note_line(n: &mut Note, line: &GedcomLine, gedcom: &mut Gedcom) -> Action {
    match line.tag.as_str() {
        "CONC" => {
            append(&mut n.text, &line.value, "");
            Action::Done
        }
        "CONT" => {
            append(&mut n.text, &line.value, "\n");
            Action::Done
        }
        _ => record_line(&mut n.record.uid, line, gedcom),
    }
}

fn repository_line(r: &mut Repository, line: &GedcomLine, gedcom: &mut Gedcom) -> Action {
    let value = non_empty(&line.value);
    match line.tag.as_str() {
        "NAME" => Action::Push(Frame::Text(TextField::Name, raw_text(&line.value))),
        "ADDR" => Action::Push(Frame::Text(TextField::Address, raw_text(&line.value))),
        "CALN" => {
            r.call_num = value;
            Action::Done
        }
        tag if ADDRESS_PARTS.contains(&tag) => {
            if let Some(value) = value {
                r.append_to_address(&value);
            }
            Action::Done
        }
        _ => record_line(&mut r.record.uid, line, gedcom),
    }
}

/// Tags every level-0 record understands.
fn record_line(uid: &mut Option<String>, line: &GedcomLine, gedcom: &mut Gedcom) -> Action {
    match line.tag.as_str() {
        "NOTE" => Action::Push(note_frame(line, gedcom)),
        "SOUR" => Action::Push(source_frame(line, gedcom)),
        "OBJE" => Action::Push(image_frame(line)),
        "_UID" | "UID" => {
            if uid.is_none() {
                *uid = non_empty(&line.value);
            }
            Action::Done
        }
        _ => Action::NotHandled,
    }
}

fn image_line(image: &mut Image, line: &GedcomLine, gedcom: &mut Gedcom) -> Action {
    let value = non_empty(&line.value);
    match line.tag.as_str() {
        "FILE" | "_FILE" => {
            image.gedcom_file_name = value;
            Action::Done
        }
        "TITL" | "TITLE" => {
            if let Some(value) = value {
                image.append_caption(&value);
            }
            Action::Done
        }
        "NOTE" | "_NOTE" => match pointer_id(&line.value) {
            Some(id) => Action::Push(Frame::Citation(Citation::note(id))),
            None => Action::Push(Frame::Text(TextField::Caption, raw_text(&line.value))),
        },
        "_PRIM" | "_PRIMARY" => {
            image.primary = is_yes(&line.value);
            Action::Done
        }
        "_DATE" | "DATE" => {
            image.date = value;
            Action::Done
        }
        "DATA" => Action::Push(Frame::Data(Data::default())),
        "SOUR" => Action::Push(source_frame(line, gedcom)),
        _ => Action::NotHandled,
    }
}

fn event_line(event: &mut Event, line: &GedcomLine, gedcom: &mut Gedcom) -> Action {
    let value = non_empty(&line.value);
    match line.tag.as_str() {
        "DATE" => {
            event.date = value;
            Action::Done
        }
        "PLAC" => Action::Push(Frame::Text(TextField::Place, raw_text(&line.value))),
        "ADDR" => Action::Push(Frame::Text(TextField::Address, raw_text(&line.value))),
        "TYPE" => {
            // Only EVEN/FACT take their label from TYPE; schema labels stay.
            if let Some(value) = value {
                if event.kind == EventKind::Other && event.event_type == OTHER_EVENT_TYPE {
                    event.event_type = value;
                } else {
                    append(&mut event.description, &value, "; ");
                }
            }
            Action::Done
        }
        "AGE" | "CAUS" | "AGNC" => {
            if let Some(value) = value {
                append(&mut event.description, &value, "; ");
            }
            Action::Done
        }
        "CONC" => {
            append(&mut event.description, &line.value, "");
            Action::Done
        }
        "CONT" => {
            append(&mut event.description, &line.value, " ");
            Action::Done
        }
        "NOTE" => Action::Push(note_frame(line, gedcom)),
        "SOUR" => Action::Push(source_frame(line, gedcom)),
        "OBJE" => Action::Push(image_frame(line)),
        _ => Action::NotHandled,
    }
}

fn name_line(
    name: &mut Name,
    derived: &mut Vec<Name>,
    line: &GedcomLine,
    gedcom: &mut Gedcom,
) -> Action {
    let value = line.value.trim();
    match line.tag.as_str() {
        "GIVN" => name.set_given(value),
        "SURN" => name.set_surname(value),
        "NPFX" => name.prefix = non_empty(value),
        "NSFX" => name.suffix = non_empty(value),
        "SPFX" => name.add_surname_prefix(value),
        "TYPE" => name.set_type(alternate_type_label(value)),
        "NICK" => derived.push(derived_name("Nickname", value)),
        "_MARNM" => derived.push(derived_name("Married Name", value)),
        "_AKA" => derived.push(derived_name(DEFAULT_ALT_NAME_TYPE, value)),
        "NOTE" => return Action::Push(note_frame(line, gedcom)),
        "SOUR" => return Action::Push(source_frame(line, gedcom)),
        _ => return Action::NotHandled,
    }
    Action::Done
}

fn citation_line(citation: &mut Citation, line: &GedcomLine, gedcom: &mut Gedcom) -> Action {
    let value = non_empty(&line.value);
    match line.tag.as_str() {
        "PAGE" => Action::Push(Frame::Text(TextField::Page, raw_text(&line.value))),
        "TEXT" => Action::Push(Frame::Text(TextField::Text, raw_text(&line.value))),
        "QUAY" => {
            citation.quality = value;
            Action::Done
        }
        "DATE" => {
            citation.date = value;
            Action::Done
        }
        "DATA" => Action::Push(Frame::Data(Data::default())),
        "NOTE" => Action::Push(note_frame(line, gedcom)),
        "OBJE" => Action::Push(image_frame(line)),
        _ => Action::NotHandled,
    }
}

fn text_line(field: TextField, value: &mut Option<String>, line: &GedcomLine) -> Action {
    match line.tag.as_str() {
        "CONC" => append(value, &line.value, ""),
        "CONT" => append(value, &line.value, field.continuation_separator()),
        tag if field == TextField::Address && ADDRESS_PARTS.contains(&tag) => {
            if let Some(part) = non_empty(&line.value) {
                append(value, &part, " ");
            }
        }
        _ => return Action::NotHandled,
    }
    Action::Done
}

fn new_event(label: &str, line: &GedcomLine, scope: &mut Scope) -> Event {
    let kind = if label == OTHER_EVENT_TYPE {
        EventKind::Other
    } else {
        EventKind::Standard
    };
    let mut event = Event::new(scope.next_event_id(), kind, label);
    // "1 BIRT Y" only asserts that the event happened.
    if !is_yes(&line.value) {
        event.description = non_empty(&line.value);
    }
    event
}

fn derived_name(name_type: &str, value: &str) -> Name {
    let mut name = Name::alternate(name_type);
    name.set_name(value);
    name
}

fn link_frame(kind: LinkKind, line: &GedcomLine) -> Action {
    match pointer_id(&line.value) {
        Some(id) => Action::Push(Frame::Link(kind, FamilyLink::new(id))),
        None => Action::NotHandled,
    }
}

fn note_frame(line: &GedcomLine, gedcom: &mut Gedcom) -> Frame {
    match pointer_id(&line.value) {
        Some(id) => Frame::Citation(Citation::note(id)),
        None => {
            let mut note = Note::new(&gedcom.next_synthetic_id('N'));
            note.text = non_empty(&line.value);
            Frame::Inline(TopObject::Note(note))
        }
    }
}

fn source_frame(line: &GedcomLine, gedcom: &mut Gedcom) -> Frame {
    match pointer_id(&line.value) {
        Some(id) => Frame::Citation(Citation::source(id)),
        None => {
            let id = gedcom.next_synthetic_id('S');
            let mut source = Source::new(&id);
            source.title = raw_text(&line.value);
            Frame::InlineSource(source, Citation::source(&id))
        }
    }
}

fn image_frame(line: &GedcomLine) -> Frame {
    Frame::Image(Image {
        media_ref: pointer_id(&line.value).map(str::to_string),
        ..Default::default()
    })
}

/// Hands a closed frame to its parent.
fn attach(child: Frame, parent: &mut Frame, gedcom: &mut Gedcom) {
    let context = parent.context();
    match child {
        Frame::Inline(obj) => {
            let id = obj.id().to_string();
            let link = match &obj {
                TopObject::Repository(r) => Frame::RepositoryRef(RepositoryRef {
                    upper_id: id.clone(),
                    call_num: r.call_num.clone(),
                }),
                _ => Frame::Citation(Citation::note(&id)),
            };
            gedcom.insert(obj);
            attach(link, parent, gedcom);
        }
        Frame::InlineSource(mut source, citation) => {
            source.title = source.title.as_deref().and_then(non_empty);
            gedcom.insert(TopObject::Source(source));
            attach(Frame::Citation(citation), parent, gedcom);
        }
        Frame::Citation(citation) => {
            let target = match citation.kind {
                CitationKind::Note => parent.note_citations_mut(),
                CitationKind::Source => parent.source_citations_mut(),
            };
            match target {
                Some(list) => list.push(citation),
                None => warn!(id = %citation.upper_id, "Citation has no home inside {}", context),
            }
        }
        Frame::Image(image) => match parent.images_mut() {
            Some(images) => images.push(image),
            None => warn!("Image has no home inside {}", context),
        },
        Frame::Event(event) => match parent {
            Frame::Record(TopObject::Person(p)) => p.events.push(event),
            Frame::Record(TopObject::Family(f)) => f.events.push(event),
            _ => warn!(id = %event.id, "Event has no home inside {}", context),
        },
        Frame::Name(name, derived) => match parent {
            Frame::Record(TopObject::Person(p)) => {
                if !name.is_empty() {
                    p.names.push(name);
                }
                p.names.extend(derived.into_iter().filter(|n| !n.is_empty()));
            }
            _ => warn!("Name has no home inside {}", context),
        },
        Frame::RepositoryRef(repo_ref) => match parent.source_mut() {
            Some(source) => source.repository_refs.push(repo_ref),
            None => warn!(
                id = %repo_ref.upper_id,
                "Repository citation has no home inside {}",
                context
            ),
        },
        Frame::Data(data) => match parent {
            Frame::Citation(c) | Frame::InlineSource(_, c) => c.data.push(data),
            Frame::Image(i) | Frame::Media(_, i) => {
                if i.date.is_none() {
                    i.date = data.date;
                }
                if let Some(text) = data.text {
                    i.append_caption(&text);
                }
            }
            _ => warn!("DATA has no home inside {}", context),
        },
        Frame::Link(kind, link) => match (kind, parent) {
            (LinkKind::ChildOf, Frame::Record(TopObject::Person(p))) => p.child_of.push(link),
            (LinkKind::SpouseOf, Frame::Record(TopObject::Person(p))) => p.spouse_of.push(link),
            (LinkKind::Child, Frame::Record(TopObject::Family(f))) => f.children.push(link),
            _ => warn!(id = %link.id, "Family link has no home inside {}", context),
        },
        Frame::Text(field, Some(value)) => apply_text(parent, field, value.trim().to_string()),
        Frame::Text(_, None) | Frame::Unrecognized(..) | Frame::Skip => {}
        Frame::Record(obj) => warn!(id = %obj.id(), "Nested level-0 record inside {}", context),
        Frame::Media(id, _) => warn!(id = %id, "Nested media record inside {}", context),
    }
}

fn apply_text(parent: &mut Frame, field: TextField, value: String) {
    match (parent, field) {
        (Frame::InlineSource(_, c), TextField::Page) => c.page = Some(value),
        (Frame::Record(TopObject::Source(s)) | Frame::InlineSource(s, _), field) => {
            let target = match field {
                TextField::Title => &mut s.title,
                TextField::Author => &mut s.author,
                TextField::Publication => &mut s.publication,
                TextField::Abbreviation => &mut s.abbreviation,
                _ => &mut s.text,
            };
            append(target, &value, "\n");
        }
        (
            Frame::Record(TopObject::Repository(r)) | Frame::Inline(TopObject::Repository(r)),
            TextField::Name,
        ) => r.append_name(&value),
        (
            Frame::Record(TopObject::Repository(r)) | Frame::Inline(TopObject::Repository(r)),
            _,
        ) => r.append_to_address(&value),
        (Frame::Event(e), TextField::Place) => append(&mut e.place, &value, " "),
        (Frame::Event(e), _) => append(&mut e.place, &value, ", "),
        (Frame::Citation(c), TextField::Page) => c.page = Some(value),
        (Frame::Citation(c), _) => append(&mut c.text, &value, "\n"),
        (Frame::Data(d), _) => append(&mut d.text, &value, "\n"),
        (Frame::Image(i) | Frame::Media(_, i), _) => i.append_caption(&value),
        (other, field) => warn!(?field, "Text has no home inside {}", other.context()),
    }
}

fn is_yes(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_uppercase().as_str(),
        "Y" | "YES" | "TRUE"
    )
}

/// Keeps trailing spaces so a following `CONC` joins correctly.
fn raw_text(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
