//! Wiki-page XML output.
//!
//! Every top-level object renders into its own buffer, so a print failure
//! costs that page and nothing else. Attributes with no value are left off.

use crate::config::PROBLEM_SEPARATOR;
use crate::error::{GedcomError, Result};
use crate::models::{
    Citation, CitationKind, Event, FamilyLink, Image, Record, Repository, TopObject,
};
use crate::name::Name;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use quick_xml::Writer;
use std::io::Write;

/// Per-page flags computed by the pipeline, not stored on the object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageFlags {
    pub primary: bool,
    pub exclude: bool,
    pub living: bool,
    pub before_cutoff: bool,
}

/// Notes are inlined where they are cited and never get a page of their own.
pub fn emits_page(obj: &TopObject) -> bool {
    !matches!(obj, TopObject::Note(_))
}

fn push_attr(element: &mut BytesStart, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        element.push_attribute((key, value));
    }
}

struct PageWriter {
    xml: Writer<Vec<u8>>,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            xml: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn start(&mut self, element: BytesStart) -> Result<()> {
        self.xml.write_event(XmlEvent::Start(element))?;
        Ok(())
    }

    fn empty(&mut self, element: BytesStart) -> Result<()> {
        self.xml.write_event(XmlEvent::Empty(element))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.xml.write_event(XmlEvent::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// `<name>text</name>`, skipped when the text is blank.
    fn text_element(&mut self, name: &str, text: Option<&str>) -> Result<()> {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        self.start(BytesStart::new(name))?;
        self.xml.write_event(XmlEvent::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Writes `element` as empty when `has_children` is false, otherwise opens it.
    fn open(&mut self, element: BytesStart, has_children: bool) -> Result<bool> {
        if has_children {
            self.start(element)?;
        } else {
            self.empty(element)?;
        }
        Ok(has_children)
    }

    fn page(&mut self, obj: &TopObject, tree_id: &str, flags: &PageFlags) -> Result<()> {
        let record = obj.record();
        let namespace = record.namespace.to_string();

        let mut page = BytesStart::new("page");
        page.push_attribute(("namespace", namespace.as_str()));
        page.push_attribute(("id", record.id.as_str()));
        push_attr(&mut page, "tree_id", Some(tree_id));
        push_attr(&mut page, "uid", record.uid.as_deref());
        if flags.primary {
            page.push_attribute(("primary", "1"));
        }
        if flags.exclude {
            page.push_attribute(("exclude", "true"));
        }
        if flags.living {
            page.push_attribute(("living", "true"));
        }
        if flags.before_cutoff {
            page.push_attribute(("beforeCutoff", "true"));
        }
        push_attr(&mut page, "potentialMatches", record.matches.as_deref());
        if !record.problems.is_empty() {
            let problems = record.problems.join(PROBLEM_SEPARATOR);
            page.push_attribute(("problems", problems.as_str()));
        }
        self.start(page)?;

        match obj {
            TopObject::Person(p) => {
                self.start(BytesStart::new("person"))?;
                for name in &p.names {
                    self.name(name)?;
                }
                self.text_element("gender", p.gender.as_deref())?;
                for link in &p.child_of {
                    self.family_link("child_of_family", link)?;
                }
                for link in &p.spouse_of {
                    self.family_link("spouse_of_family", link)?;
                }
                for event in &p.events {
                    self.event(event)?;
                }
                self.record_body(record)?;
                self.end("person")?;
            }
            TopObject::Family(f) => {
                self.start(BytesStart::new("family"))?;
                for (tag, spouse) in [("husband", &f.husband), ("wife", &f.wife)] {
                    if let Some(id) = spouse {
                        let mut element = BytesStart::new(tag);
                        element.push_attribute(("id", id.as_str()));
                        self.empty(element)?;
                    }
                }
                for child in &f.children {
                    self.family_link("child", child)?;
                }
                for event in &f.events {
                    self.event(event)?;
                }
                self.record_body(record)?;
                self.end("family")?;
            }
            TopObject::Source(s) => {
                self.start(BytesStart::new("source"))?;
                self.text_element("title", s.title.as_deref())?;
                self.text_element("author", s.author.as_deref())?;
                self.text_element("publication", s.publication.as_deref())?;
                self.text_element("abbreviation", s.abbreviation.as_deref())?;
                self.text_element("text", s.text.as_deref())?;
                for repo in &s.repositories {
                    self.repository(repo)?;
                }
                self.record_body(record)?;
                self.end("source")?;
            }
            TopObject::Repository(r) => {
                self.repository(r)?;
                self.citations(&record.source_citations, &record.id)?;
                self.images(&record.images, &record.id)?;
            }
            TopObject::Note(n) => {
                self.text_element("note", n.text.as_deref())?;
            }
        }

        self.end("page")
    }

    fn name(&mut self, name: &Name) -> Result<()> {
        let tag = name.tag();
        let mut element = BytesStart::new(tag);
        push_attr(&mut element, "type", name.name_type());
        push_attr(&mut element, "given", name.given.as_deref());
        push_attr(&mut element, "surname", name.surname.as_deref());
        push_attr(&mut element, "title_prefix", name.prefix.as_deref());
        push_attr(&mut element, "title_suffix", name.suffix.as_deref());

        let has_children = !name.source_citations.is_empty() || !name.note_citations.is_empty();
        if self.open(element, has_children)? {
            self.citations(&name.source_citations, tag)?;
            self.citations(&name.note_citations, tag)?;
            self.end(tag)?;
        }
        Ok(())
    }

    fn family_link(&mut self, tag: &str, link: &FamilyLink) -> Result<()> {
        let mut element = BytesStart::new(tag);
        element.push_attribute(("id", link.id.as_str()));
        push_attr(&mut element, "mother_relation", link.mother_relation.as_deref());
        push_attr(&mut element, "father_relation", link.father_relation.as_deref());
        push_attr(&mut element, "pedigree", link.pedigree.as_deref());
        self.empty(element)
    }

    fn event(&mut self, event: &Event) -> Result<()> {
        let mut element = BytesStart::new("event_fact");
        element.push_attribute(("id", event.id.as_str()));
        push_attr(&mut element, "type", Some(&event.event_type));
        push_attr(&mut element, "date", event.date.as_deref());
        push_attr(&mut element, "place", event.place.as_deref());
        push_attr(&mut element, "description", event.description.as_deref());

        let has_children = !event.source_citations.is_empty()
            || !event.note_citations.is_empty()
            || !event.images.is_empty();
        if self.open(element, has_children)? {
            self.citations(&event.source_citations, &event.id)?;
            self.citations(&event.note_citations, &event.id)?;
            self.images(&event.images, &event.id)?;
            self.end("event_fact")?;
        }
        Ok(())
    }

    /// Citations, inline notes and images hanging directly off a record.
    fn record_body(&mut self, record: &Record) -> Result<()> {
        self.citations(&record.source_citations, &record.id)?;
        self.citations(&record.note_citations, &record.id)?;
        for note in &record.notes {
            self.text_element("note", Some(note))?;
        }
        self.images(&record.images, &record.id)
    }

    fn citations(&mut self, citations: &[Citation], container: &str) -> Result<()> {
        for citation in citations {
            match citation.kind {
                CitationKind::Note => {
                    self.text_element("note", citation.resolved.as_deref())?;
                }
                CitationKind::Source => self.source_citation(citation, container)?,
            }
        }
        Ok(())
    }

    fn source_citation(&mut self, citation: &Citation, container: &str) -> Result<()> {
        let mut element = BytesStart::new("source_citation");
        element.push_attribute(("source_id", citation.upper_id.as_str()));
        push_attr(&mut element, "title", citation.resolved.as_deref());
        push_attr(&mut element, "page", citation.page.as_deref());
        push_attr(&mut element, "quality", citation.quality.as_deref());
        push_attr(&mut element, "date", citation.date.as_deref());

        let has_children = !citation.data.is_empty()
            || citation.text.as_deref().is_some_and(|t| !t.trim().is_empty())
            || !citation.note_citations.is_empty()
            || !citation.images.is_empty();
        if self.open(element, has_children)? {
            for data in &citation.data {
                let mut element = BytesStart::new("data");
                push_attr(&mut element, "date", data.date.as_deref());
                push_attr(&mut element, "text", data.text.as_deref());
                self.empty(element)?;
            }
            self.text_element("text", citation.text.as_deref())?;
            self.citations(&citation.note_citations, container)?;
            self.images(&citation.images, container)?;
            self.end("source_citation")?;
        }
        Ok(())
    }

    fn images(&mut self, images: &[Image], container: &str) -> Result<()> {
        for image in images {
            let parent = image.parent.as_deref().ok_or_else(|| GedcomError::Print {
                container: container.to_string(),
                reason: "image has no parent".to_string(),
            })?;
            let mut element = BytesStart::new("image");
            element.push_attribute(("parent", parent));
            push_attr(&mut element, "caption", image.caption.as_deref());
            push_attr(&mut element, "gedcom_filename", image.gedcom_file_name.as_deref());
            push_attr(&mut element, "date", image.date.as_deref());
            if image.primary {
                element.push_attribute(("primary", "true"));
            }
            if self.open(element, !image.source_citations.is_empty())? {
                self.citations(&image.source_citations, container)?;
                self.end("image")?;
            }
        }
        Ok(())
    }

    fn repository(&mut self, repo: &Repository) -> Result<()> {
        let mut element = BytesStart::new("repository");
        push_attr(&mut element, "name", repo.name.as_deref());
        push_attr(&mut element, "address", repo.address.as_deref());
        push_attr(&mut element, "call_number", repo.call_num.as_deref());
        if self.open(element, !repo.record.notes.is_empty())? {
            for note in &repo.record.notes {
                self.text_element("note", Some(note))?;
            }
            self.end("repository")?;
        }
        Ok(())
    }
}

/// Renders one `<page>`. A failure leaves no partial output behind.
pub fn write_page(obj: &TopObject, tree_id: &str, flags: &PageFlags) -> Result<Vec<u8>> {
    let mut writer = PageWriter::new();
    writer.page(obj, tree_id, flags)?;
    Ok(writer.xml.into_inner())
}

/// Wraps rendered pages in a `<pages>` document.
pub fn write_document(pages: &[Vec<u8>], tree_id: &str) -> Result<Vec<u8>> {
    let mut xml = Writer::new(Vec::new());
    xml.write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    xml.get_mut().write_all(b"\n")?;

    let mut root = BytesStart::new("pages");
    push_attr(&mut root, "tree_id", Some(tree_id));
    xml.write_event(XmlEvent::Start(root))?;
    let out = xml.get_mut();
    out.write_all(b"\n")?;
    for page in pages {
        out.write_all(page)?;
        out.write_all(b"\n")?;
    }
    xml.write_event(XmlEvent::End(BytesEnd::new("pages")))?;
    xml.get_mut().write_all(b"\n")?;
    Ok(xml.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Data, EventKind, Family, Person, Source};

    fn render(obj: &TopObject, flags: &PageFlags) -> String {
        String::from_utf8(write_page(obj, "7", flags).unwrap()).unwrap()
    }

    fn person() -> Person {
        let mut p = Person::new("I1");
        let mut name = Name::primary();
        name.set_name("John /Smith/");
        p.names.push(name);
        p
    }

    #[test]
    fn minimal_page_omits_optional_attributes() {
        let out = render(&TopObject::Person(person()), &PageFlags::default());
        assert!(out.starts_with(r#"<page namespace="108" id="I1" tree_id="7">"#));
        assert!(!out.contains("uid="));
        assert!(!out.contains("problems="));
        assert!(!out.contains("primary="));
        assert!(out.contains(r#"<name given="John" surname="Smith"/>"#));
    }

    #[test]
    fn flags_and_problems_are_emitted_in_order() {
        let mut p = person();
        p.record.uid = Some("A&B".to_string());
        p.record.matches = Some("I9,I10".to_string());
        p.record.add_problem("Missing name");
        p.record.add_problem("Duplicate record id");
        let flags = PageFlags {
            primary: true,
            exclude: true,
            living: true,
            before_cutoff: true,
        };
        let out = render(&TopObject::Person(p), &flags);
        assert!(out.starts_with(
            r#"<page namespace="108" id="I1" tree_id="7" uid="A&amp;B" primary="1" exclude="true" living="true" beforeCutoff="true" potentialMatches="I9,I10" problems="Missing name|Duplicate record id">"#
        ));
    }

    #[test]
    fn alt_name_prints_type() {
        let mut p = person();
        let mut alt = Name::alternate("Married Name");
        alt.set_name("Jones");
        p.names.push(alt);
        let out = render(&TopObject::Person(p), &PageFlags::default());
        assert!(out.contains(r#"<alt_name type="Married Name" given="Jones"/>"#));
    }

    #[test]
    fn image_without_parent_names_container() {
        let mut p = person();
        let mut event = Event::new("I1_E1".to_string(), EventKind::Standard, "Birth");
        event.images.push(Image::default());
        p.events.push(event);
        let err = write_page(&TopObject::Person(p), "7", &PageFlags::default()).unwrap_err();
        match err {
            GedcomError::Print { container, .. } => assert_eq!(container, "I1_E1"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn image_primary_only_when_true() {
        let mut p = person();
        p.record.images.push(Image {
            parent: Some("I1".to_string()),
            caption: Some("Portrait".to_string()),
            gedcom_file_name: Some("c:\\photos\\john.jpg".to_string()),
            ..Default::default()
        });
        p.record.images.push(Image {
            parent: Some("I1".to_string()),
            primary: true,
            ..Default::default()
        });
        let out = render(&TopObject::Person(p), &PageFlags::default());
        assert!(out.contains(
            r#"<image parent="I1" caption="Portrait" gedcom_filename="c:\photos\john.jpg"/>"#
        ));
        assert!(out.contains(r#"<image parent="I1" primary="true"/>"#));
    }

    #[test]
    fn image_prints_its_source_citations() {
        let mut p = person();
        let mut citation = Citation::source("S1");
        citation.resolved = Some("Census".to_string());
        citation.page = Some("sheet 3".to_string());
        p.record.images.push(Image {
            parent: Some("I1".to_string()),
            caption: Some("Farmhouse".to_string()),
            source_citations: vec![citation],
            ..Default::default()
        });
        let out = render(&TopObject::Person(p), &PageFlags::default());
        let image = out.find(r#"<image parent="I1" caption="Farmhouse">"#).unwrap();
        let cite = out
            .find(r#"<source_citation source_id="S1" title="Census" page="sheet 3"/>"#)
            .unwrap();
        let close = out.find("</image>").unwrap();
        assert!(image < cite && cite < close);
    }

    #[test]
    fn event_with_citation_and_note() {
        let mut p = person();
        let mut event = Event::new("I1_E1".to_string(), EventKind::Standard, "Birth");
        event.date = Some("1 JAN 1900".to_string());
        event.place = Some("Springfield".to_string());
        let mut citation = Citation::source("S1");
        citation.resolved = Some("Parish <Register>".to_string());
        citation.page = Some("p. 4".to_string());
        citation.data.push(Data {
            date: Some("1900".to_string()),
            text: None,
        });
        event.source_citations.push(citation);
        let mut note = Citation::note("N1");
        note.resolved = Some("Born at home".to_string());
        event.note_citations.push(note);
        p.events.push(event);

        let out = render(&TopObject::Person(p), &PageFlags::default());
        assert!(out.contains(
            r#"<event_fact id="I1_E1" type="Birth" date="1 JAN 1900" place="Springfield">"#
        ));
        assert!(out.contains(
            r#"<source_citation source_id="S1" title="Parish &lt;Register&gt;" page="p. 4">"#
        ));
        assert!(out.contains(r#"<data date="1900"/>"#));
        assert!(out.contains("<note>Born at home</note>"));
    }

    #[test]
    fn family_members() {
        let mut f = Family::new("F1");
        f.husband = Some("I1".to_string());
        f.wife = Some("I2".to_string());
        let mut child = FamilyLink::new("I3");
        child.pedigree = Some("adopted".to_string());
        f.children.push(child);
        let out = render(&TopObject::Family(f), &PageFlags::default());
        assert!(out.starts_with(r#"<page namespace="110" id="F1" tree_id="7">"#));
        assert!(out.contains(r#"<husband id="I1"/>"#));
        assert!(out.contains(r#"<wife id="I2"/>"#));
        assert!(out.contains(r#"<child id="I3" pedigree="adopted"/>"#));
    }

    #[test]
    fn source_with_merged_repository() {
        let mut s = Source::new("S1");
        s.title = Some("Census".to_string());
        let mut repo = Repository::new("R1");
        repo.name = Some("Archive".to_string());
        repo.call_num = Some("B-12".to_string());
        repo.record.notes.push("Closed Mondays".to_string());
        s.repositories.push(repo);
        let out = render(&TopObject::Source(s), &PageFlags::default());
        assert!(out.contains("<title>Census</title>"));
        assert!(out.contains(r#"<repository name="Archive" call_number="B-12">"#));
        assert!(out.contains("<note>Closed Mondays</note>"));
    }

    #[test]
    fn document_wraps_pages() {
        let page = write_page(&TopObject::Person(person()), "7", &PageFlags::default()).unwrap();
        let doc = String::from_utf8(write_document(&[page], "7").unwrap()).unwrap();
        assert!(doc.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(doc.contains(r#"<pages tree_id="7">"#));
        assert!(doc.trim_end().ends_with("</pages>"));
    }

    #[test]
    fn notes_do_not_emit_pages() {
        assert!(!emits_page(&TopObject::Note(crate::models::Note::new("N1"))));
        assert!(emits_page(&TopObject::Person(person())));
    }
}
