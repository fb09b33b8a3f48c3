use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cms_core::{Aggregate, AggregateId, AggregateRoot, CmsError};
use cms_events::Event;

use crate::document::{Document, DocumentId};
use crate::search::Search;

/// Aggregate root: a named collection of uploaded documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shelf {
    id: AggregateId,
    name: String,
    documents: HashMap<DocumentId, Document>,
    unique_names: HashMap<String, DocumentId>,
    version: u64,
    created: bool,
}

impl Shelf {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn find_by_unique_name(&self, unique_name: &str) -> Option<&Document> {
        self.unique_names
            .get(unique_name)
            .and_then(|id| self.documents.get(id))
    }

    pub fn search(&self, criteria: &Search) -> Vec<&Document> {
        self.documents
            .values()
            .filter(|d| criteria.matches(d))
            .collect()
    }

    fn ensure_created(&self) -> Result<(), CmsError> {
        if !self.created {
            return Err(CmsError::NotCreated);
        }
        Ok(())
    }

    fn document_or_err(&self, id: DocumentId) -> Result<&Document, CmsError> {
        self.documents
            .get(&id)
            .ok_or_else(|| CmsError::NotFound(id.to_string()))
    }
}

impl AggregateRoot for Shelf {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShelfCommand {
    Create { name: String, occurred_at: DateTime<Utc> },
    AddDocument {
        document_id: DocumentId,
        name: String,
        unique_name: Option<String>,
        disk: String,
        path: String,
        size_bytes: u64,
        occurred_at: DateTime<Utc>,
    },
    ReplaceDocument {
        document_id: DocumentId,
        disk: String,
        path: String,
        size_bytes: u64,
        occurred_at: DateTime<Utc>,
    },
    RemoveDocument {
        document_id: DocumentId,
        delete_error: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    RenameDocument { document_id: DocumentId, new_name: String, occurred_at: DateTime<Utc> },
    MakeUnique { document_id: DocumentId, unique_name: String, occurred_at: DateTime<Utc> },
    MakeNonUnique { document_id: DocumentId, occurred_at: DateTime<Utc> },
    Tag { document_id: DocumentId, tag: String, occurred_at: DateTime<Utc> },
    Untag { document_id: DocumentId, tag: String, occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfCreated {
    pub shelf_id: AggregateId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAdded {
    pub document_id: DocumentId,
    pub name: String,
    pub unique_name: Option<String>,
    pub disk: String,
    pub path: String,
    pub size_bytes: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReplaced {
    pub document_id: DocumentId,
    pub disk: String,
    pub path: String,
    pub size_bytes: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRemoved {
    pub document_id: DocumentId,
    /// Populated when the underlying object-store delete failed; the
    /// document is still removed from the shelf either way.
    pub delete_error: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRenamed {
    pub document_id: DocumentId,
    pub new_name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMadeUnique {
    pub document_id: DocumentId,
    pub unique_name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMadeNonUnique {
    pub document_id: DocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTagged {
    pub document_id: DocumentId,
    pub tag: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUntagged {
    pub document_id: DocumentId,
    pub tag: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShelfEvent {
    Created(ShelfCreated),
    DocumentAdded(DocumentAdded),
    DocumentReplaced(DocumentReplaced),
    DocumentRemoved(DocumentRemoved),
    DocumentRenamed(DocumentRenamed),
    DocumentMadeUnique(DocumentMadeUnique),
    DocumentMadeNonUnique(DocumentMadeNonUnique),
    DocumentTagged(DocumentTagged),
    DocumentUntagged(DocumentUntagged),
}

impl Event for ShelfEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShelfEvent::Created(_) => "shelf.created",
            ShelfEvent::DocumentAdded(_) => "shelf.document.added",
            ShelfEvent::DocumentReplaced(_) => "shelf.document.replaced",
            ShelfEvent::DocumentRemoved(_) => "shelf.document.removed",
            ShelfEvent::DocumentRenamed(_) => "shelf.document.renamed",
            ShelfEvent::DocumentMadeUnique(_) => "shelf.document.made_unique",
            ShelfEvent::DocumentMadeNonUnique(_) => "shelf.document.made_non_unique",
            ShelfEvent::DocumentTagged(_) => "shelf.document.tagged",
            ShelfEvent::DocumentUntagged(_) => "shelf.document.untagged",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShelfEvent::Created(e) => e.occurred_at,
            ShelfEvent::DocumentAdded(e) => e.occurred_at,
            ShelfEvent::DocumentReplaced(e) => e.occurred_at,
            ShelfEvent::DocumentRemoved(e) => e.occurred_at,
            ShelfEvent::DocumentRenamed(e) => e.occurred_at,
            ShelfEvent::DocumentMadeUnique(e) => e.occurred_at,
            ShelfEvent::DocumentMadeNonUnique(e) => e.occurred_at,
            ShelfEvent::DocumentTagged(e) => e.occurred_at,
            ShelfEvent::DocumentUntagged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Shelf {
    type Command = ShelfCommand;
    type Event = ShelfEvent;
    type Error = CmsError;

    fn empty(id: AggregateId) -> Self {
        Self {
            id,
            name: String::new(),
            documents: HashMap::new(),
            unique_names: HashMap::new(),
            version: 0,
            created: false,
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShelfEvent::Created(e) => {
                self.name = e.name.clone();
                self.created = true;
            }
            ShelfEvent::DocumentAdded(e) => {
                let mut doc = Document::new(e.document_id, &e.name, &e.disk, &e.path, e.size_bytes);
                if let Some(unique_name) = &e.unique_name {
                    doc.set_unique_name(Some(unique_name.clone()));
                    self.unique_names.insert(unique_name.clone(), e.document_id);
                }
                self.documents.insert(e.document_id, doc);
            }
            ShelfEvent::DocumentReplaced(e) => {
                if let Some(doc) = self.documents.get_mut(&e.document_id) {
                    doc.replace_content(e.disk.clone(), e.path.clone(), e.size_bytes);
                }
            }
            ShelfEvent::DocumentRemoved(e) => {
                if let Some(doc) = self.documents.remove(&e.document_id) {
                    if let Some(unique) = doc.unique_name() {
                        self.unique_names.remove(unique);
                    }
                }
            }
            ShelfEvent::DocumentRenamed(e) => {
                if let Some(doc) = self.documents.get_mut(&e.document_id) {
                    doc.set_name(e.new_name.clone());
                }
            }
            ShelfEvent::DocumentMadeUnique(e) => {
                if let Some(doc) = self.documents.get_mut(&e.document_id) {
                    doc.set_unique_name(Some(e.unique_name.clone()));
                    self.unique_names.insert(e.unique_name.clone(), e.document_id);
                }
            }
            ShelfEvent::DocumentMadeNonUnique(e) => {
                if let Some(doc) = self.documents.get_mut(&e.document_id) {
                    if let Some(unique) = doc.unique_name() {
                        self.unique_names.remove(unique);
                    }
                    doc.set_unique_name(None);
                }
            }
            ShelfEvent::DocumentTagged(e) => {
                if let Some(doc) = self.documents.get_mut(&e.document_id) {
                    doc.add_tag(e.tag.clone());
                }
            }
            ShelfEvent::DocumentUntagged(e) => {
                if let Some(doc) = self.documents.get_mut(&e.document_id) {
                    doc.remove_tag(&e.tag);
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShelfCommand::Create { name, occurred_at } => self.handle_create(name, *occurred_at),
            ShelfCommand::AddDocument {
                document_id,
                name,
                unique_name,
                disk,
                path,
                size_bytes,
                occurred_at,
            } => self.handle_add(*document_id, name, unique_name.as_deref(), disk, path, *size_bytes, *occurred_at),
            ShelfCommand::ReplaceDocument {
                document_id,
                disk,
                path,
                size_bytes,
                occurred_at,
            } => self.handle_replace(*document_id, disk, path, *size_bytes, *occurred_at),
            ShelfCommand::RemoveDocument { document_id, delete_error, occurred_at } => {
                self.handle_remove(*document_id, delete_error.clone(), *occurred_at)
            }
            ShelfCommand::RenameDocument { document_id, new_name, occurred_at } => {
                self.handle_rename(*document_id, new_name, *occurred_at)
            }
            ShelfCommand::MakeUnique { document_id, unique_name, occurred_at } => {
                self.handle_make_unique(*document_id, unique_name, *occurred_at)
            }
            ShelfCommand::MakeNonUnique { document_id, occurred_at } => {
                self.handle_make_non_unique(*document_id, *occurred_at)
            }
            ShelfCommand::Tag { document_id, tag, occurred_at } => {
                self.handle_tag(*document_id, tag, *occurred_at)
            }
            ShelfCommand::Untag { document_id, tag, occurred_at } => {
                self.handle_untag(*document_id, tag, *occurred_at)
            }
        }
    }
}

impl Shelf {
    fn handle_create(&self, name: &str, occurred_at: DateTime<Utc>) -> Result<Vec<ShelfEvent>, CmsError> {
        if self.created {
            return Err(CmsError::AlreadyCreated);
        }
        if name.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        Ok(vec![ShelfEvent::Created(ShelfCreated {
            shelf_id: self.id,
            name: name.to_string(),
            occurred_at,
        })])
    }

    fn handle_add(
        &self,
        document_id: DocumentId,
        name: &str,
        unique_name: Option<&str>,
        disk: &str,
        path: &str,
        size_bytes: u64,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        if name.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        if let Some(unique_name) = unique_name {
            if unique_name.trim().is_empty() {
                return Err(CmsError::EmptyName);
            }
            if self.unique_names.contains_key(unique_name) {
                return Err(CmsError::DuplicateUniqueName(unique_name.to_string()));
            }
        }
        Ok(vec![ShelfEvent::DocumentAdded(DocumentAdded {
            document_id,
            name: name.to_string(),
            unique_name: unique_name.map(|s| s.to_string()),
            disk: disk.to_string(),
            path: path.to_string(),
            size_bytes,
            occurred_at,
        })])
    }

    fn handle_replace(
        &self,
        document_id: DocumentId,
        disk: &str,
        path: &str,
        size_bytes: u64,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        self.document_or_err(document_id)?;
        Ok(vec![ShelfEvent::DocumentReplaced(DocumentReplaced {
            document_id,
            disk: disk.to_string(),
            path: path.to_string(),
            size_bytes,
            occurred_at,
        })])
    }

    fn handle_remove(
        &self,
        document_id: DocumentId,
        delete_error: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        self.document_or_err(document_id)?;
        // Removal always commits, even if the backing object-store delete
        // failed: `delete_error` just rides along as a fact on the event.
        Ok(vec![ShelfEvent::DocumentRemoved(DocumentRemoved {
            document_id,
            delete_error,
            occurred_at,
        })])
    }

    fn handle_rename(
        &self,
        document_id: DocumentId,
        new_name: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        self.document_or_err(document_id)?;
        if new_name.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        Ok(vec![ShelfEvent::DocumentRenamed(DocumentRenamed {
            document_id,
            new_name: new_name.to_string(),
            occurred_at,
        })])
    }

    fn handle_make_unique(
        &self,
        document_id: DocumentId,
        unique_name: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        self.document_or_err(document_id)?;
        if unique_name.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        if let Some(&existing) = self.unique_names.get(unique_name) {
            if existing != document_id {
                return Err(CmsError::DuplicateUniqueName(unique_name.to_string()));
            }
        }
        Ok(vec![ShelfEvent::DocumentMadeUnique(DocumentMadeUnique {
            document_id,
            unique_name: unique_name.to_string(),
            occurred_at,
        })])
    }

    fn handle_make_non_unique(
        &self,
        document_id: DocumentId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        self.document_or_err(document_id)?;
        Ok(vec![ShelfEvent::DocumentMadeNonUnique(DocumentMadeNonUnique {
            document_id,
            occurred_at,
        })])
    }

    fn handle_tag(
        &self,
        document_id: DocumentId,
        tag: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        let document = self.document_or_err(document_id)?;
        if tag.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        if document.has_tag(tag) {
            return Ok(vec![]);
        }
        Ok(vec![ShelfEvent::DocumentTagged(DocumentTagged {
            document_id,
            tag: tag.to_string(),
            occurred_at,
        })])
    }

    fn handle_untag(
        &self,
        document_id: DocumentId,
        tag: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ShelfEvent>, CmsError> {
        self.ensure_created()?;
        let document = self.document_or_err(document_id)?;
        if !document.has_tag(tag) {
            return Ok(vec![]);
        }
        Ok(vec![ShelfEvent::DocumentUntagged(DocumentUntagged {
            document_id,
            tag: tag.to_string(),
            occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn created_shelf() -> Shelf {
        let mut shelf = Shelf::empty(AggregateId::new());
        let events = shelf.handle(&ShelfCommand::Create { name: "Invoices".to_string(), occurred_at: now() }).unwrap();
        for e in &events {
            shelf.apply(e);
        }
        shelf
    }

    #[test]
    fn create_twice_is_rejected() {
        let shelf = created_shelf();
        let err = shelf.handle(&ShelfCommand::Create { name: "Invoices".to_string(), occurred_at: now() }).unwrap_err();
        assert_eq!(err, CmsError::AlreadyCreated);
    }

    #[test]
    fn empty_name_is_rejected() {
        let shelf = Shelf::empty(AggregateId::new());
        let err = shelf.handle(&ShelfCommand::Create { name: "   ".to_string(), occurred_at: now() }).unwrap_err();
        assert_eq!(err, CmsError::EmptyName);
    }

    #[test]
    fn adding_a_document_before_creation_is_rejected() {
        let shelf = Shelf::empty(AggregateId::new());
        let err = shelf
            .handle(&ShelfCommand::AddDocument {
                document_id: DocumentId::new(),
                name: "a.txt".to_string(),
                unique_name: None,
                disk: "docs".to_string(),
                path: "k".to_string(),
                size_bytes: 1,
                occurred_at: now(),
            })
            .unwrap_err();
        assert_eq!(err, CmsError::NotCreated);
    }

    #[test]
    fn adding_a_document_with_a_taken_unique_name_is_rejected() {
        let mut shelf = created_shelf();
        let doc_a = DocumentId::new();
        let events = shelf
            .handle(&ShelfCommand::AddDocument {
                document_id: doc_a,
                name: "p1.pdf".to_string(),
                unique_name: Some("u".to_string()),
                disk: "docs".to_string(),
                path: "k/p1".to_string(),
                size_bytes: 1,
                occurred_at: now(),
            })
            .unwrap();
        for e in &events {
            shelf.apply(e);
        }
        assert_eq!(shelf.find_by_unique_name("u").map(|d| d.id()), Some(doc_a));

        let err = shelf
            .handle(&ShelfCommand::AddDocument {
                document_id: DocumentId::new(),
                name: "p2.pdf".to_string(),
                unique_name: Some("u".to_string()),
                disk: "docs".to_string(),
                path: "k/p2".to_string(),
                size_bytes: 1,
                occurred_at: now(),
            })
            .unwrap_err();
        assert_eq!(err, CmsError::DuplicateUniqueName("u".to_string()));
        assert_eq!(shelf.find_by_unique_name("u").map(|d| d.id()), Some(doc_a));
    }

    #[test]
    fn tagging_an_already_tagged_document_is_a_no_op() {
        let mut shelf = created_shelf();
        let doc_id = DocumentId::new();
        let events = shelf
            .handle(&ShelfCommand::AddDocument {
                document_id: doc_id,
                name: "a.txt".to_string(),
                unique_name: None,
                disk: "docs".to_string(),
                path: "k".to_string(),
                size_bytes: 1,
                occurred_at: now(),
            })
            .unwrap();
        for e in &events {
            shelf.apply(e);
        }

        let events = shelf.handle(&ShelfCommand::Tag { document_id: doc_id, tag: "finance".to_string(), occurred_at: now() }).unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            shelf.apply(e);
        }

        let events = shelf.handle(&ShelfCommand::Tag { document_id: doc_id, tag: "finance".to_string(), occurred_at: now() }).unwrap();
        assert!(events.is_empty());

        let events = shelf.handle(&ShelfCommand::Untag { document_id: doc_id, tag: "finance".to_string(), occurred_at: now() }).unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            shelf.apply(e);
        }

        let events = shelf.handle(&ShelfCommand::Untag { document_id: doc_id, tag: "finance".to_string(), occurred_at: now() }).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn duplicate_unique_name_is_rejected() {
        let mut shelf = created_shelf();
        let doc_a = DocumentId::new();
        let doc_b = DocumentId::new();
        for (id, name) in [(doc_a, "a.txt"), (doc_b, "b.txt")] {
            let events = shelf
                .handle(&ShelfCommand::AddDocument {
                    document_id: id,
                    name: name.to_string(),
                    unique_name: None,
                    disk: "docs".to_string(),
                    path: format!("k/{id}"),
                    size_bytes: 1,
                    occurred_at: now(),
                })
                .unwrap();
            for e in &events {
                shelf.apply(e);
            }
        }

        let events = shelf
            .handle(&ShelfCommand::MakeUnique { document_id: doc_a, unique_name: "slug".to_string(), occurred_at: now() })
            .unwrap();
        for e in &events {
            shelf.apply(e);
        }

        let err = shelf
            .handle(&ShelfCommand::MakeUnique { document_id: doc_b, unique_name: "slug".to_string(), occurred_at: now() })
            .unwrap_err();
        assert_eq!(err, CmsError::DuplicateUniqueName("slug".to_string()));
    }

    #[test]
    fn removal_commits_even_with_a_delete_error() {
        let mut shelf = created_shelf();
        let doc_id = DocumentId::new();
        let events = shelf
            .handle(&ShelfCommand::AddDocument {
                document_id: doc_id,
                name: "a.txt".to_string(),
                unique_name: None,
                disk: "docs".to_string(),
                path: "k".to_string(),
                size_bytes: 1,
                occurred_at: now(),
            })
            .unwrap();
        for e in &events {
            shelf.apply(e);
        }

        let events = shelf
            .handle(&ShelfCommand::RemoveDocument {
                document_id: doc_id,
                delete_error: Some("object store unavailable".to_string()),
                occurred_at: now(),
            })
            .unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            shelf.apply(e);
        }
        assert!(shelf.document(doc_id).is_none());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let shelf = created_shelf();
        let before = shelf.clone();
        let _ = shelf.handle(&ShelfCommand::Tag {
            document_id: DocumentId::new(),
            tag: "x".to_string(),
            occurred_at: now(),
        });
        assert_eq!(shelf, before);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

            #[test]
            fn version_increments_by_one_per_applied_event(names in proptest::collection::vec("[a-z]{1,8}", 1..5)) {
                let mut shelf = Shelf::empty(AggregateId::new());
                let mut expected_version = 0u64;

                let events = shelf.handle(&ShelfCommand::Create { name: "shelf".to_string(), occurred_at: now() }).unwrap();
                for e in &events {
                    shelf.apply(e);
                    expected_version += 1;
                }
                prop_assert_eq!(shelf.version(), expected_version);

                for name in names {
                    let events = shelf
                        .handle(&ShelfCommand::AddDocument {
                            document_id: DocumentId::new(),
                            name: name.clone(),
                            unique_name: None,
                            disk: "docs".to_string(),
                            path: format!("k/{name}"),
                            size_bytes: 1,
                            occurred_at: now(),
                        })
                        .unwrap();
                    for e in &events {
                        shelf.apply(e);
                        expected_version += 1;
                    }
                }

                prop_assert_eq!(shelf.version(), expected_version);
            }
        }
    }
}
