// Item Editor
//
// Create, update, and delete markers and polygons inside the draft.
// Every successful edit persists the whole draft.

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::draft::{DraftStore, Item, ItemKind};
use crate::store::{BlobStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: ItemKind, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Generate an opaque, process-unique item id.
pub fn generate_id(kind: ItemKind) -> String {
    format!("{}_{}", kind, Uuid::new_v4().simple())
}

pub struct ItemEditor<S: BlobStore> {
    drafts: DraftStore<S>,
}

impl<S: BlobStore> ItemEditor<S> {
    pub fn new(drafts: DraftStore<S>) -> Self {
        Self { drafts }
    }

    /// Append a new item and return its id.
    pub fn add(&self, kind: ItemKind, fields: Map<String, Value>) -> Result<String, EditError> {
        let mut draft = self.drafts.get()?;
        let id = generate_id(kind);

        draft.items_mut(kind).push(Item::new(id.clone(), fields));
        self.drafts.set(&draft)?;

        debug!(%kind, %id, "item added");
        Ok(id)
    }

    /// Replace the first item with `id`, keeping its position and id.
    ///
    /// Nothing is written when the item does not exist.
    pub fn update(
        &self,
        kind: ItemKind,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), EditError> {
        let mut draft = self.drafts.get()?;

        let slot = draft
            .items_mut(kind)
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| EditError::NotFound {
                kind,
                id: id.to_string(),
            })?;
        *slot = Item::new(id, fields);

        self.drafts.set(&draft)?;

        debug!(%kind, id, "item updated");
        Ok(())
    }

    /// Remove every item with `id`. Deleting an unknown id is not an error.
    pub fn delete(&self, kind: ItemKind, id: &str) -> Result<(), EditError> {
        let mut draft = self.drafts.get()?;
        draft.items_mut(kind).retain(|item| item.id != id);
        self.drafts.set(&draft)?;

        debug!(%kind, id, "item deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use crate::store::layout::DRAFT_KEY;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn editor() -> (Arc<MemoryBlobStore>, ItemEditor<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        let editor = ItemEditor::new(DraftStore::new(Arc::clone(&store)));
        (store, editor)
    }

    #[test]
    fn add_assigns_prefixed_unique_ids() {
        let (store, editor) = editor();

        let ids: HashSet<String> = (0..50)
            .map(|_| editor.add(ItemKind::Marker, fields(json!({"lat": 1}))).unwrap())
            .collect();

        assert_eq!(ids.len(), 50);
        assert!(ids.iter().all(|id| id.starts_with("marker_")));

        let draft = DraftStore::new(store).get().unwrap();
        assert_eq!(draft.markers.len(), 50);
        assert!(draft.polygons.is_empty());
    }

    #[test]
    fn update_replaces_in_place_and_keeps_id() {
        let (store, editor) = editor();
        let first = editor.add(ItemKind::Polygon, fields(json!({"color": "red"}))).unwrap();
        let second = editor.add(ItemKind::Polygon, fields(json!({"color": "blue"}))).unwrap();

        editor
            .update(ItemKind::Polygon, &first, fields(json!({"color": "green", "id": "hijack"})))
            .unwrap();

        let draft = DraftStore::new(store).get().unwrap();
        assert_eq!(draft.polygons[0].id, first);
        assert_eq!(draft.polygons[0].fields["color"], json!("green"));
        assert!(!draft.polygons[0].fields.contains_key("id"));
        assert_eq!(draft.polygons[1].id, second);
    }

    #[test]
    fn update_of_unknown_id_fails_without_writing() {
        let (store, editor) = editor();
        editor.add(ItemKind::Marker, Map::new()).unwrap();
        let before = store.read(DRAFT_KEY).unwrap();

        let err = editor
            .update(ItemKind::Marker, "marker_missing", Map::new())
            .unwrap_err();

        assert!(matches!(err, EditError::NotFound { kind: ItemKind::Marker, .. }));
        assert_eq!(store.read(DRAFT_KEY).unwrap(), before);
    }

    #[test]
    fn update_only_looks_in_its_own_collection() {
        let (_, editor) = editor();
        let marker = editor.add(ItemKind::Marker, Map::new()).unwrap();

        let err = editor.update(ItemKind::Polygon, &marker, Map::new()).unwrap_err();
        assert!(matches!(err, EditError::NotFound { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, editor) = editor();
        let keep = editor.add(ItemKind::Marker, Map::new()).unwrap();
        let drop = editor.add(ItemKind::Marker, Map::new()).unwrap();

        editor.delete(ItemKind::Marker, &drop).unwrap();
        editor.delete(ItemKind::Marker, &drop).unwrap();
        editor.delete(ItemKind::Marker, "never_existed").unwrap();

        let draft = DraftStore::new(store).get().unwrap();
        let ids: Vec<_> = draft.markers.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![keep.as_str()]);
    }

    #[test]
    fn mixed_edits_match_a_vec_model() {
        let (store, editor) = editor();
        let mut model: Vec<(String, Value)> = Vec::new();

        for step in 0..60u64 {
            match step % 5 {
                0 | 1 | 3 => {
                    let value = json!({"step": step});
                    let id = editor.add(ItemKind::Marker, fields(value.clone())).unwrap();
                    model.push((id, value));
                }
                2 if !model.is_empty() => {
                    let index = (step as usize * 7) % model.len();
                    let value = json!({"step": step, "updated": true});
                    let id = model[index].0.clone();
                    editor.update(ItemKind::Marker, &id, fields(value.clone())).unwrap();
                    model[index].1 = value;
                }
                4 if !model.is_empty() => {
                    let index = (step as usize * 3) % model.len();
                    let (id, _) = model.remove(index);
                    editor.delete(ItemKind::Marker, &id).unwrap();
                }
                _ => {}
            }
        }

        let draft = DraftStore::new(store).get().unwrap();
        let actual: Vec<(String, Value)> = draft
            .markers
            .iter()
            .map(|item| (item.id.clone(), Value::Object(item.fields.clone())))
            .collect();
        assert_eq!(actual, model);

        let ids: HashSet<&str> = draft.markers.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), draft.markers.len());
        assert!(draft.polygons.is_empty());
    }

    #[test]
    fn delete_removes_every_duplicate() {
        let (store, editor) = editor();
        let drafts = DraftStore::new(Arc::clone(&store));
        let mut doc = drafts.get().unwrap();
        doc.markers.push(Item::new("dup", Map::new()));
        doc.markers.push(Item::new("dup", Map::new()));
        drafts.set(&doc).unwrap();

        editor.delete(ItemKind::Marker, "dup").unwrap();

        assert!(drafts.get().unwrap().markers.is_empty());
    }
}
