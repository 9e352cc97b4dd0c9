use crate::filter::Filter;
use crate::model::{Item, ItemId, ItemPatch, NewItem};
use crate::store::{
    DeleteOutcome, ItemStore, Page, StoreError, StoreResult, TextQuery, UpdateOutcome, rank_page,
    select_page,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory store: a `RwLock` around an id-ordered map.
pub struct MemoryStore {
    items: RwLock<BTreeMap<ItemId, Item>>,
    text_field: String,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new(text_field: impl Into<String>) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            text_field: text_field.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn snapshot(&self) -> StoreResult<Vec<Item>> {
        self.ensure_open()?;
        let guard = self
            .items
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.values().cloned().collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("name")
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, item: NewItem) -> StoreResult<ItemId> {
        self.ensure_open()?;
        let id = ItemId::generate();
        self.items
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .insert(id, item.into_item(id));
        Ok(id)
    }

    async fn find(&self, filters: &[Filter], page: Page) -> StoreResult<Vec<Item>> {
        Ok(select_page(self.snapshot()?, filters, page))
    }

    async fn text_search(&self, query: &TextQuery, page: Page) -> StoreResult<Vec<Item>> {
        Ok(rank_page(self.snapshot()?, query, &self.text_field, page))
    }

    async fn update(&self, id: ItemId, patch: &ItemPatch) -> StoreResult<UpdateOutcome> {
        self.ensure_open()?;
        // The write lock covers read-modify-write so concurrent patches serialize.
        let mut guard = self
            .items
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;

        let Some(current) = guard.get(&id) else {
            return Ok(UpdateOutcome {
                matched_count: 0,
                modified_count: 0,
            });
        };

        let updated = patch.apply(current)?;
        let modified = updated != *current;
        if modified {
            guard.insert(id, updated);
        }
        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn delete(&self, id: ItemId) -> StoreResult<DeleteOutcome> {
        self.ensure_open()?;
        let removed = self
            .items
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .remove(&id);
        Ok(DeleteOutcome {
            deleted_count: u64::from(removed.is_some()),
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ensure_open()
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
