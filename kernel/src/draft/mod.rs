// Draft Store
//
// The single mutable working document. Edits land here; commits read
// from here; load and restore overwrite it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::layout::DRAFT_KEY;
use crate::store::{BlobStore, Fallback, StoreError};

/// Which collection of a map document an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Marker,
    Polygon,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Marker => "marker",
            ItemKind::Polygon => "polygon",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A marker or polygon. Everything but `id` is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Item {
    /// Build an item, discarding any `id` carried in `fields`.
    pub fn new(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Shape of the draft and of every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapDocument {
    #[serde(default)]
    pub markers: Vec<Item>,

    #[serde(default)]
    pub polygons: Vec<Item>,
}

impl MapDocument {
    pub fn items(&self, kind: ItemKind) -> &[Item] {
        match kind {
            ItemKind::Marker => &self.markers,
            ItemKind::Polygon => &self.polygons,
        }
    }

    pub fn items_mut(&mut self, kind: ItemKind) -> &mut Vec<Item> {
        match kind {
            ItemKind::Marker => &mut self.markers,
            ItemKind::Polygon => &mut self.polygons,
        }
    }
}

/// Persistent holder of the working draft.
pub struct DraftStore<S: BlobStore> {
    store: Arc<S>,
}

impl<S: BlobStore> DraftStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current draft; a missing or damaged draft heals to an empty document.
    pub fn get(&self) -> Result<MapDocument, StoreError> {
        self.store
            .load(DRAFT_KEY, MapDocument::default(), Fallback::Heal)
    }

    pub fn set(&self, document: &MapDocument) -> Result<(), StoreError> {
        self.store.save(DRAFT_KEY, document)
    }
}

impl<S: BlobStore> Clone for DraftStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}
