//! Second pass over the entity graph: follows every id recorded by the
//! interpreter now that the whole file is known.
//!
//! A reference that cannot be followed abandons only the object that made
//! it; the object is removed from the graph and reported as failed.

use crate::error::{GedcomError, Result};
use crate::models::{
    append, Citation, CitationKind, Event, EventContainer, Gedcom, Image, Record, Repository,
    Source, TopObject,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, info, warn};

/// What to do with a repository that no source cites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanRepositoryPolicy {
    /// Log and remove it.
    #[default]
    Drop,
    /// Keep it so it prints as a page of its own.
    Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedObject {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ResolveReport {
    pub failed: Vec<FailedObject>,
    pub merged_repositories: u64,
    pub orphan_repositories: Vec<String>,
}

/// Appends a bucket of loose text onto `target` and empties the bucket.
pub fn eat_ignored_bucket(target: &mut Vec<String>, bucket: &mut Vec<String>) {
    target.append(bucket);
}

/// Gives `source` its own copy of `repository`; later edits to either side stay local.
pub fn merge_repository(source: &mut Source, repository: &Repository, call_num: Option<&str>) {
    let mut copy = repository.clone();
    if let Some(call_num) = call_num {
        copy.call_num = Some(call_num.to_string());
    }
    source
        .record
        .images
        .extend(copy.record.images.drain(..));
    source.repositories.push(copy);
}

pub fn assign_image_ownership(image: &mut Image, parent_id: &str) {
    image.parent = Some(parent_id.to_string());
}

/// Keeps the first primary image of a container. Returns true if any flag was cleared.
fn enforce_single_primary(images: &mut [Image]) -> bool {
    let mut seen = false;
    let mut demoted = false;
    for image in images.iter_mut().filter(|i| i.primary) {
        if seen {
            image.primary = false;
            demoted = true;
        }
        seen = true;
    }
    demoted
}

/// Lookup tables built once from the finished graph.
pub struct Resolver {
    note_texts: FxHashMap<String, String>,
    source_titles: FxHashMap<String, String>,
    repositories: FxHashMap<String, Repository>,
    media: FxHashMap<String, Image>,
}

impl Resolver {
    /// Snapshots note texts and source titles and takes over the media table.
    /// Loose text kept on a note record joins the note's own text, since
    /// notes only print where they are cited.
    pub fn new(gedcom: &mut Gedcom) -> Self {
        let mut note_texts = FxHashMap::default();
        let mut source_titles = FxHashMap::default();
        let ids: Vec<String> = gedcom.ids().to_vec();
        for id in &ids {
            match gedcom.get_mut(id) {
                Some(TopObject::Note(n)) => {
                    for loose in n.record.ignored.drain(..) {
                        append(&mut n.text, &loose, "\n");
                    }
                    note_texts.insert(id.clone(), n.text.clone().unwrap_or_default());
                }
                Some(TopObject::Source(s)) => {
                    source_titles.insert(id.clone(), s.title.clone().unwrap_or_default());
                }
                _ => {}
            }
        }

        Self {
            note_texts,
            source_titles,
            repositories: FxHashMap::default(),
            media: std::mem::take(&mut gedcom.media),
        }
    }

    /// Flattens repository notes to text so every merged copy carries them.
    /// A repository citing a missing note is removed and returned as failed.
    pub fn collect_repositories(&mut self, gedcom: &mut Gedcom) -> Vec<FailedObject> {
        let mut failed = Vec::new();
        let ids: Vec<String> = gedcom.ids().to_vec();
        for id in &ids {
            let Some(TopObject::Repository(repo)) = gedcom.get_mut(id) else {
                continue;
            };
            match self.flatten_repository_notes(repo) {
                Ok(()) => {
                    self.repositories.insert(id.clone(), repo.clone());
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Skipping repository with unresolved note");
                    failed.push(FailedObject {
                        id: id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        for repo in &failed {
            gedcom.remove(&repo.id);
        }
        failed
    }

    fn flatten_repository_notes(&self, repo: &mut Repository) -> Result<()> {
        let record = &mut repo.record;
        for citation in std::mem::take(&mut record.note_citations) {
            let text = self.note_texts.get(&citation.upper_id).ok_or_else(|| {
                GedcomError::UnresolvedReference {
                    owner: record.id.clone(),
                    target: citation.upper_id.clone(),
                }
            })?;
            if !text.is_empty() {
                record.notes.push(text.clone());
            }
        }
        eat_ignored_bucket(&mut record.notes, &mut record.ignored);
        Ok(())
    }

    /// Resolves every citation in `citations`, including nested ones.
    pub fn resolve_citations(
        &self,
        citations: &mut [Citation],
        owner: &str,
        parent: &str,
    ) -> Result<()> {
        for citation in citations.iter_mut() {
            let table = match citation.kind {
                CitationKind::Note => &self.note_texts,
                CitationKind::Source => &self.source_titles,
            };
            let resolved = table.get(&citation.upper_id).ok_or_else(|| {
                GedcomError::UnresolvedReference {
                    owner: owner.to_string(),
                    target: citation.upper_id.clone(),
                }
            })?;
            citation.resolved = Some(resolved.clone());
            self.resolve_citations(&mut citation.note_citations, owner, parent)?;
            self.resolve_images(&mut citation.images, owner, parent)?;
        }
        Ok(())
    }

    /// Fills shared media, folds note text into captions and sets the parent.
    fn resolve_images(&self, images: &mut [Image], owner: &str, parent: &str) -> Result<()> {
        for image in images.iter_mut() {
            if let Some(media_id) = image.media_ref.clone() {
                let media = self.media.get(&media_id).ok_or_else(|| {
                    GedcomError::UnresolvedReference {
                        owner: owner.to_string(),
                        target: media_id.clone(),
                    }
                })?;
                image.fill_from(media);
            }

            self.resolve_citations(&mut image.note_citations, owner, parent)?;
            let captions: Vec<String> = image
                .note_citations
                .iter()
                .filter_map(|c| c.resolved.clone())
                .filter(|text| !text.is_empty())
                .collect();
            for caption in captions {
                image.append_caption(&caption);
            }

            self.resolve_citations(&mut image.source_citations, owner, parent)?;
            assign_image_ownership(image, parent);
        }
        Ok(())
    }

    fn resolve_container<C: EventContainer>(&self, container: &mut C, owner: &str) -> Result<bool> {
        let parent = container.container_id().to_string();
        self.resolve_images(container.images_mut(), owner, &parent)?;
        Ok(enforce_single_primary(container.images_mut()))
    }

    fn resolve_event(&self, event: &mut Event, owner: &str) -> Result<bool> {
        let parent = event.id.clone();
        self.resolve_citations(&mut event.note_citations, owner, &parent)?;
        self.resolve_citations(&mut event.source_citations, owner, &parent)?;
        self.resolve_container(event, owner)
    }

    fn resolve_record(&self, record: &mut Record) -> Result<()> {
        let owner = record.id.clone();
        self.resolve_citations(&mut record.note_citations, &owner, &owner)?;
        self.resolve_citations(&mut record.source_citations, &owner, &owner)?;
        if self.resolve_container(record, &owner)? {
            record.add_problem("Multiple primary images");
        }
        eat_ignored_bucket(&mut record.notes, &mut record.ignored);
        Ok(())
    }

    /// Resolves one object in place. Returns the repository ids it merged.
    pub fn resolve_object(&self, obj: &mut TopObject) -> Result<Vec<String>> {
        let mut merged = Vec::new();
        let owner = obj.id().to_string();
        let mut demoted = false;

        match obj {
            TopObject::Person(p) => {
                for name in &mut p.names {
                    self.resolve_citations(&mut name.note_citations, &owner, &owner)?;
                    self.resolve_citations(&mut name.source_citations, &owner, &owner)?;
                }
                for event in &mut p.events {
                    demoted |= self.resolve_event(event, &owner)?;
                }
            }
            TopObject::Family(f) => {
                for event in &mut f.events {
                    demoted |= self.resolve_event(event, &owner)?;
                }
            }
            TopObject::Source(s) => {
                for repo_ref in s.repository_refs.clone() {
                    let repo = self.repositories.get(&repo_ref.upper_id).ok_or_else(|| {
                        GedcomError::UnresolvedReference {
                            owner: owner.clone(),
                            target: repo_ref.upper_id.clone(),
                        }
                    })?;
                    merge_repository(s, repo, repo_ref.call_num.as_deref());
                    merged.push(repo_ref.upper_id);
                }
            }
            TopObject::Note(_) | TopObject::Repository(_) => {}
        }

        let record = obj.record_mut();
        self.resolve_record(record)?;
        if demoted {
            record.add_problem("Multiple primary images");
        }
        Ok(merged)
    }
}

/// Resolves the whole graph in place.
pub fn resolve(gedcom: &mut Gedcom, policy: OrphanRepositoryPolicy) -> ResolveReport {
    let mut resolver = Resolver::new(gedcom);
    let mut report = ResolveReport {
        failed: resolver.collect_repositories(gedcom),
        ..Default::default()
    };
    let mut cited_repositories = FxHashSet::default();

    let ids: Vec<String> = gedcom.ids().to_vec();
    for id in &ids {
        let Some(obj) = gedcom.get_mut(id) else {
            continue;
        };
        match resolver.resolve_object(obj) {
            Ok(merged) => {
                report.merged_repositories += merged.len() as u64;
                cited_repositories.extend(merged);
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping object with unresolved reference");
                report.failed.push(FailedObject {
                    id: id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    for failed in &report.failed {
        gedcom.remove(&failed.id);
    }

    for id in &ids {
        if !matches!(gedcom.get(id), Some(TopObject::Repository(_))) {
            continue;
        }
        if cited_repositories.contains(id) {
            debug!(id = %id, "Repository merged into its sources");
            gedcom.remove(id);
            continue;
        }
        report.orphan_repositories.push(id.clone());
        match policy {
            OrphanRepositoryPolicy::Drop => {
                warn!(id = %id, "Dropping repository that no source cites");
                gedcom.remove(id);
            }
            OrphanRepositoryPolicy::Page => {
                info!(id = %id, "Keeping uncited repository as its own page");
            }
        }
    }

    report
}
