//! Item store
//!
//! Arena of the items decoded from one document. Items are addressed by
//! [`ItemId`] or by their `(file, json path)` identity key; parents are found
//! by lookup, never through an owning back-pointer.

use std::collections::HashMap;
use std::path::Path;

use crate::item::{Item, ItemId};
use crate::path::{item_key, JsonPath};

#[derive(Debug, Default)]
pub struct ItemStore {
    items: Vec<Item>,
    by_key: HashMap<String, ItemId>,
    last_created: Option<ItemId>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. An item already stored under the same key is superseded.
    pub fn insert(&mut self, item: Item) -> ItemId {
        let id = ItemId(self.items.len());
        self.by_key.insert(item.key(), id);
        self.items.push(item);
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id.0)
    }

    /// Look up by `(file, json path)`
    pub fn find(&self, file: &Path, path: &JsonPath) -> Option<ItemId> {
        self.by_key.get(&item_key(file, path)).copied()
    }

    pub fn find_by_key(&self, key: &str) -> Option<ItemId> {
        self.by_key.get(key).copied()
    }

    /// The document root, when one has been decoded
    pub fn root(&self) -> Option<ItemId> {
        self.items
            .iter()
            .position(|item| item.is_root())
            .map(ItemId)
    }

    /// Structural parent: the item at `parent_json_path`
    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        let item = self.get(id)?;
        let parent_path = item.parent_json_path.as_ref()?;
        self.find(&item.file_path, parent_path)
    }

    /// Parent as shown in the tree view: transparent items are skipped
    pub fn visible_parent(&self, id: ItemId) -> Option<ItemId> {
        let mut current = self.parent(id)?;
        while self.get(current)?.is_transparent() {
            current = self.parent(current)?;
        }
        Some(current)
    }

    pub fn children(&self, id: ItemId) -> impl Iterator<Item = &Item> {
        self.get(id)
            .map(|item| item.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.get(*child))
    }

    pub fn hidden_children(&self, id: ItemId) -> impl Iterator<Item = &Item> {
        self.get(id)
            .map(|item| item.hidden_children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.get(*child))
    }

    pub fn push_child(&mut self, parent: ItemId, child: ItemId) {
        if let Some(item) = self.get_mut(parent) {
            item.children.push(child);
        }
    }

    pub fn push_hidden_child(&mut self, parent: ItemId, child: ItemId) {
        if let Some(item) = self.get_mut(parent) {
            item.hidden_children.push(child);
        }
    }

    pub fn last_created(&self) -> Option<ItemId> {
        self.last_created
    }

    pub(crate) fn set_last_created(&mut self, id: ItemId) {
        self.last_created = Some(id);
    }

    /// Recompute the collapsible state of every node
    pub fn update_collapsible(&mut self) {
        for item in &mut self.items {
            item.update_collapsible();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.by_key.clear();
        self.last_created = None;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.items.iter().enumerate().map(|(i, item)| (ItemId(i), item))
    }
}
