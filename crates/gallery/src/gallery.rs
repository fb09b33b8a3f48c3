use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cms_core::{Aggregate, AggregateId, AggregateRoot, CmsError};
use cms_events::Event;

use crate::image::Image;
use crate::stack::{Stack, StackId};

/// Aggregate root: a named, ordered collection of image stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gallery {
    id: AggregateId,
    name: String,
    stacks: HashMap<StackId, Stack>,
    order: Vec<StackId>,
    version: u64,
    created: bool,
}

impl Gallery {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stack(&self, id: StackId) -> Option<&Stack> {
        self.stacks.get(&id)
    }

    /// Stacks in their current sort order.
    pub fn stacks_in_order(&self) -> Vec<&Stack> {
        self.order.iter().filter_map(|id| self.stacks.get(id)).collect()
    }

    fn ensure_created(&self) -> Result<(), CmsError> {
        if !self.created {
            return Err(CmsError::NotCreated);
        }
        Ok(())
    }

    fn stack_or_err(&self, id: StackId) -> Result<&Stack, CmsError> {
        self.stacks.get(&id).ok_or_else(|| CmsError::NotFound(id.to_string()))
    }
}

impl AggregateRoot for Gallery {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GalleryCommand {
    Create { name: String, occurred_at: DateTime<Utc> },
    UploadImage {
        stack_id: StackId,
        original_name: String,
        original: Image,
        occurred_at: DateTime<Utc>,
    },
    ReplaceImage { stack_id: StackId, original: Image, occurred_at: DateTime<Utc> },
    AppendDerivedImage { stack_id: StackId, image: Image, occurred_at: DateTime<Utc> },
    DeleteStack { stack_id: StackId, occurred_at: DateTime<Utc> },
    RenameStack { stack_id: StackId, new_name: String, occurred_at: DateTime<Utc> },
    Tag { stack_id: StackId, tag: String, occurred_at: DateTime<Utc> },
    Untag { stack_id: StackId, tag: String, occurred_at: DateTime<Utc> },
    Sort { order: Vec<StackId>, occurred_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryCreated {
    pub gallery_id: AggregateId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUploaded {
    pub stack_id: StackId,
    pub original_name: String,
    pub original: Image,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReplaced {
    pub stack_id: StackId,
    pub original: Image,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedImageAppended {
    pub stack_id: StackId,
    pub image: Image,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDeleted {
    pub stack_id: StackId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRenamed {
    pub stack_id: StackId,
    pub new_name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTagged {
    pub stack_id: StackId,
    pub tag: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackUntagged {
    pub stack_id: StackId,
    pub tag: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorted {
    pub order: Vec<StackId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GalleryEvent {
    Created(GalleryCreated),
    ImageUploaded(ImageUploaded),
    ImageReplaced(ImageReplaced),
    DerivedImageAppended(DerivedImageAppended),
    StackDeleted(StackDeleted),
    StackRenamed(StackRenamed),
    StackTagged(StackTagged),
    StackUntagged(StackUntagged),
    Sorted(Sorted),
}

impl Event for GalleryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GalleryEvent::Created(_) => "gallery.created",
            GalleryEvent::ImageUploaded(_) => "gallery.image_uploaded",
            GalleryEvent::ImageReplaced(_) => "gallery.image_replaced",
            GalleryEvent::DerivedImageAppended(_) => "gallery.derived_image_appended",
            GalleryEvent::StackDeleted(_) => "gallery.stack_deleted",
            GalleryEvent::StackRenamed(_) => "gallery.stack_renamed",
            GalleryEvent::StackTagged(_) => "gallery.stack_tagged",
            GalleryEvent::StackUntagged(_) => "gallery.stack_untagged",
            GalleryEvent::Sorted(_) => "gallery.sorted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GalleryEvent::Created(e) => e.occurred_at,
            GalleryEvent::ImageUploaded(e) => e.occurred_at,
            GalleryEvent::ImageReplaced(e) => e.occurred_at,
            GalleryEvent::DerivedImageAppended(e) => e.occurred_at,
            GalleryEvent::StackDeleted(e) => e.occurred_at,
            GalleryEvent::StackRenamed(e) => e.occurred_at,
            GalleryEvent::StackTagged(e) => e.occurred_at,
            GalleryEvent::StackUntagged(e) => e.occurred_at,
            GalleryEvent::Sorted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Gallery {
    type Command = GalleryCommand;
    type Event = GalleryEvent;
    type Error = CmsError;

    fn empty(id: AggregateId) -> Self {
        Self {
            id,
            name: String::new(),
            stacks: HashMap::new(),
            order: Vec::new(),
            version: 0,
            created: false,
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GalleryEvent::Created(e) => {
                self.name = e.name.clone();
                self.created = true;
            }
            GalleryEvent::ImageUploaded(e) => {
                self.stacks.insert(e.stack_id, Stack::new(e.stack_id, &e.original_name, e.original.clone()));
                self.order.push(e.stack_id);
            }
            GalleryEvent::ImageReplaced(e) => {
                if let Some(stack) = self.stacks.get_mut(&e.stack_id) {
                    stack.reset_to(e.original.clone());
                }
            }
            GalleryEvent::DerivedImageAppended(e) => {
                if let Some(stack) = self.stacks.get_mut(&e.stack_id) {
                    stack.push_derived(e.image.clone());
                }
            }
            GalleryEvent::StackDeleted(e) => {
                self.stacks.remove(&e.stack_id);
                self.order.retain(|id| *id != e.stack_id);
            }
            GalleryEvent::StackRenamed(e) => {
                if let Some(stack) = self.stacks.get_mut(&e.stack_id) {
                    stack.set_name(e.new_name.clone());
                }
            }
            GalleryEvent::StackTagged(e) => {
                if let Some(stack) = self.stacks.get_mut(&e.stack_id) {
                    stack.add_tag(e.tag.clone());
                }
            }
            GalleryEvent::StackUntagged(e) => {
                if let Some(stack) = self.stacks.get_mut(&e.stack_id) {
                    stack.remove_tag(&e.tag);
                }
            }
            GalleryEvent::Sorted(e) => {
                self.order = e.order.clone();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GalleryCommand::Create { name, occurred_at } => self.handle_create(name, *occurred_at),
            GalleryCommand::UploadImage { stack_id, original_name, original, occurred_at } => {
                self.handle_upload(*stack_id, original_name, original.clone(), *occurred_at)
            }
            GalleryCommand::ReplaceImage { stack_id, original, occurred_at } => {
                self.handle_replace(*stack_id, original.clone(), *occurred_at)
            }
            GalleryCommand::AppendDerivedImage { stack_id, image, occurred_at } => {
                self.handle_append_derived(*stack_id, image.clone(), *occurred_at)
            }
            GalleryCommand::DeleteStack { stack_id, occurred_at } => self.handle_delete(*stack_id, *occurred_at),
            GalleryCommand::RenameStack { stack_id, new_name, occurred_at } => {
                self.handle_rename(*stack_id, new_name, *occurred_at)
            }
            GalleryCommand::Tag { stack_id, tag, occurred_at } => self.handle_tag(*stack_id, tag, *occurred_at),
            GalleryCommand::Untag { stack_id, tag, occurred_at } => self.handle_untag(*stack_id, tag, *occurred_at),
            GalleryCommand::Sort { order, occurred_at } => self.handle_sort(order.clone(), *occurred_at),
        }
    }
}

impl Gallery {
    fn handle_create(&self, name: &str, occurred_at: DateTime<Utc>) -> Result<Vec<GalleryEvent>, CmsError> {
        if self.created {
            return Err(CmsError::AlreadyCreated);
        }
        if name.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        Ok(vec![GalleryEvent::Created(GalleryCreated { gallery_id: self.id, name: name.to_string(), occurred_at })])
    }

    fn handle_upload(
        &self,
        stack_id: StackId,
        original_name: &str,
        original: Image,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        if original_name.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        if !original.is_original() {
            return Err(CmsError::StackCorrupted("uploaded image must use the 'original' variant".to_string()));
        }
        Ok(vec![GalleryEvent::ImageUploaded(ImageUploaded {
            stack_id,
            original_name: original_name.to_string(),
            original,
            occurred_at,
        })])
    }

    fn handle_replace(
        &self,
        stack_id: StackId,
        original: Image,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        self.stack_or_err(stack_id)?;
        if !original.is_original() {
            return Err(CmsError::StackCorrupted("replacement image must use the 'original' variant".to_string()));
        }
        Ok(vec![GalleryEvent::ImageReplaced(ImageReplaced { stack_id, original, occurred_at })])
    }

    fn handle_append_derived(
        &self,
        stack_id: StackId,
        image: Image,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        self.stack_or_err(stack_id)?;
        if image.is_original() {
            return Err(CmsError::StackCorrupted("derived images must not use the 'original' variant".to_string()));
        }
        Ok(vec![GalleryEvent::DerivedImageAppended(DerivedImageAppended { stack_id, image, occurred_at })])
    }

    fn handle_delete(&self, stack_id: StackId, occurred_at: DateTime<Utc>) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        self.stack_or_err(stack_id)?;
        Ok(vec![GalleryEvent::StackDeleted(StackDeleted { stack_id, occurred_at })])
    }

    fn handle_rename(
        &self,
        stack_id: StackId,
        new_name: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        self.stack_or_err(stack_id)?;
        if new_name.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        Ok(vec![GalleryEvent::StackRenamed(StackRenamed { stack_id, new_name: new_name.to_string(), occurred_at })])
    }

    fn handle_tag(&self, stack_id: StackId, tag: &str, occurred_at: DateTime<Utc>) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        let stack = self.stack_or_err(stack_id)?;
        if tag.trim().is_empty() {
            return Err(CmsError::EmptyName);
        }
        if stack.has_tag(tag) {
            return Ok(vec![]);
        }
        Ok(vec![GalleryEvent::StackTagged(StackTagged { stack_id, tag: tag.to_string(), occurred_at })])
    }

    fn handle_untag(&self, stack_id: StackId, tag: &str, occurred_at: DateTime<Utc>) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        let stack = self.stack_or_err(stack_id)?;
        if !stack.has_tag(tag) {
            return Ok(vec![]);
        }
        Ok(vec![GalleryEvent::StackUntagged(StackUntagged { stack_id, tag: tag.to_string(), occurred_at })])
    }

    /// `order` is a prefix move, not a full permutation: the listed stacks
    /// move to the front in the order given, and every stack not listed
    /// keeps its relative position after them. A listed id that isn't a
    /// known stack, or one that appears twice, is rejected.
    fn handle_sort(&self, order: Vec<StackId>, occurred_at: DateTime<Utc>) -> Result<Vec<GalleryEvent>, CmsError> {
        self.ensure_created()?;
        if !order.iter().all(|id| self.stacks.contains_key(id)) {
            return Err(CmsError::StackCorrupted("sort order must only list existing stacks".to_string()));
        }
        let mut seen = std::collections::HashSet::with_capacity(order.len());
        if !order.iter().all(|id| seen.insert(*id)) {
            return Err(CmsError::StackCorrupted("sort order must not repeat a stack".to_string()));
        }

        let moved: std::collections::HashSet<StackId> = order.iter().copied().collect();
        let mut new_order = order.clone();
        new_order.extend(self.order.iter().copied().filter(|id| !moved.contains(id)));

        if new_order == self.order {
            return Ok(vec![]);
        }

        Ok(vec![GalleryEvent::Sorted(Sorted { order: new_order, occurred_at })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn original(key: &str) -> Image {
        Image { variant: "original".to_string(), disk: "images".to_string(), path: key.to_string(), width: 100, height: 100, size_bytes: 100 }
    }

    fn created_gallery() -> Gallery {
        let mut gallery = Gallery::empty(AggregateId::new());
        let events = gallery.handle(&GalleryCommand::Create { name: "Trip".to_string(), occurred_at: now() }).unwrap();
        for e in &events {
            gallery.apply(e);
        }
        gallery
    }

    #[test]
    fn replace_resets_the_stack_to_just_the_new_original() {
        let mut gallery = created_gallery();
        let stack_id = StackId::new();
        let events = gallery
            .handle(&GalleryCommand::UploadImage { stack_id, original_name: "a.png".to_string(), original: original("k1"), occurred_at: now() })
            .unwrap();
        for e in &events {
            gallery.apply(e);
        }
        let events = gallery
            .handle(&GalleryCommand::AppendDerivedImage {
                stack_id,
                image: Image { variant: "w200".to_string(), disk: "images".to_string(), path: "k1/w200".to_string(), width: 200, height: 200, size_bytes: 50 },
                occurred_at: now(),
            })
            .unwrap();
        for e in &events {
            gallery.apply(e);
        }
        assert_eq!(gallery.stack(stack_id).unwrap().images().len(), 2);

        let events = gallery.handle(&GalleryCommand::ReplaceImage { stack_id, original: original("k2"), occurred_at: now() }).unwrap();
        for e in &events {
            gallery.apply(e);
        }

        let stack = gallery.stack(stack_id).unwrap();
        assert_eq!(stack.images().len(), 1);
        assert_eq!(stack.original().path, "k2");
    }

    #[test]
    fn sort_rejects_an_unknown_stack() {
        let mut gallery = created_gallery();
        let stack_id = StackId::new();
        let events = gallery
            .handle(&GalleryCommand::UploadImage { stack_id, original_name: "a.png".to_string(), original: original("k1"), occurred_at: now() })
            .unwrap();
        for e in &events {
            gallery.apply(e);
        }

        let err = gallery.handle(&GalleryCommand::Sort { order: vec![StackId::new()], occurred_at: now() }).unwrap_err();
        assert!(matches!(err, CmsError::StackCorrupted(_)));
    }

    #[test]
    fn sort_rejects_a_repeated_stack() {
        let mut gallery = created_gallery();
        let stack_id = StackId::new();
        let events = gallery
            .handle(&GalleryCommand::UploadImage { stack_id, original_name: "a.png".to_string(), original: original("k1"), occurred_at: now() })
            .unwrap();
        for e in &events {
            gallery.apply(e);
        }

        let err = gallery.handle(&GalleryCommand::Sort { order: vec![stack_id, stack_id], occurred_at: now() }).unwrap_err();
        assert!(matches!(err, CmsError::StackCorrupted(_)));
    }

    #[test]
    fn sort_moves_a_prefix_and_leaves_the_rest_in_place() {
        let mut gallery = created_gallery();
        let mut stacks = Vec::new();
        for name in ["a.png", "b.png", "c.png", "d.png"] {
            let stack_id = StackId::new();
            let events = gallery
                .handle(&GalleryCommand::UploadImage { stack_id, original_name: name.to_string(), original: original(name), occurred_at: now() })
                .unwrap();
            for e in &events {
                gallery.apply(e);
            }
            stacks.push(stack_id);
        }
        let [a, b, c, d] = stacks[..] else { unreachable!() };
        assert_eq!(gallery.stacks_in_order().iter().map(|s| s.id()).collect::<Vec<_>>(), vec![a, b, c, d]);

        let events = gallery.handle(&GalleryCommand::Sort { order: vec![c, a], occurred_at: now() }).unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            gallery.apply(e);
        }

        assert_eq!(gallery.stacks_in_order().iter().map(|s| s.id()).collect::<Vec<_>>(), vec![c, a, b, d]);
    }

    #[test]
    fn sort_with_the_current_order_emits_no_event() {
        let mut gallery = created_gallery();
        let mut stacks = Vec::new();
        for name in ["a.png", "b.png"] {
            let stack_id = StackId::new();
            let events = gallery
                .handle(&GalleryCommand::UploadImage { stack_id, original_name: name.to_string(), original: original(name), occurred_at: now() })
                .unwrap();
            for e in &events {
                gallery.apply(e);
            }
            stacks.push(stack_id);
        }

        let events = gallery.handle(&GalleryCommand::Sort { order: stacks.clone(), occurred_at: now() }).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn tagging_an_already_tagged_stack_is_a_no_op() {
        let mut gallery = created_gallery();
        let stack_id = StackId::new();
        let events = gallery
            .handle(&GalleryCommand::UploadImage { stack_id, original_name: "a.png".to_string(), original: original("k1"), occurred_at: now() })
            .unwrap();
        for e in &events {
            gallery.apply(e);
        }

        let events = gallery.handle(&GalleryCommand::Tag { stack_id, tag: "favorite".to_string(), occurred_at: now() }).unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            gallery.apply(e);
        }

        let events = gallery.handle(&GalleryCommand::Tag { stack_id, tag: "favorite".to_string(), occurred_at: now() }).unwrap();
        assert!(events.is_empty());

        let events = gallery.handle(&GalleryCommand::Untag { stack_id, tag: "favorite".to_string(), occurred_at: now() }).unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            gallery.apply(e);
        }

        let events = gallery.handle(&GalleryCommand::Untag { stack_id, tag: "favorite".to_string(), occurred_at: now() }).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let gallery = created_gallery();
        let before = gallery.clone();
        let _ = gallery.handle(&GalleryCommand::DeleteStack { stack_id: StackId::new(), occurred_at: now() });
        assert_eq!(gallery, before);
    }
}
