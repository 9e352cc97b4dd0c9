//! Document store for the cocktail collection.
//!
//! [`ItemStore`] is the seam between the request layer and persistence. Two
//! backends ship with the crate:
//!
//! - [`MemoryStore`]: `RwLock<BTreeMap>`; tests and throwaway runs.
//! - [`RedbStore`]: single-file embedded database (feature `embedded`).
//!
//! Both return items in identifier order, which is creation order because
//! identifiers are time-prefixed.

use crate::filter::{Filter, matches_all};
use crate::model::{Item, ItemId, ItemPatch, NewItem, PayloadError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod memory;
pub mod search;

#[cfg(feature = "embedded")]
pub mod redb;

pub use memory::MemoryStore;
#[cfg(feature = "embedded")]
pub use self::redb::RedbStore;
pub use search::TextQuery;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("failed to encode document: {0}")]
    Encode(String),
    #[error("failed to decode document: {0}")]
    Decode(String),
    #[error("invalid update: {0}")]
    Patch(#[from] PayloadError),
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// Result of a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Result of a delete. Deleting a missing item yields a zero count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

/// Persistence operations over one collection.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Persist a new item and return its assigned identifier.
    async fn insert(&self, item: NewItem) -> StoreResult<ItemId>;

    /// Items satisfying every filter, in identifier order, windowed by `page`.
    async fn find(&self, filters: &[Filter], page: Page) -> StoreResult<Vec<Item>>;

    /// Full-text search over the indexed text field, best matches first.
    async fn text_search(&self, query: &TextQuery, page: Page) -> StoreResult<Vec<Item>>;

    /// Apply a partial-field update to one item.
    async fn update(&self, id: ItemId, patch: &ItemPatch) -> StoreResult<UpdateOutcome>;

    /// Remove one item.
    async fn delete(&self, id: ItemId) -> StoreResult<DeleteOutcome>;

    /// Cheap liveness probe used by readiness checks.
    async fn ping(&self) -> StoreResult<()>;

    /// Release the underlying handle. Subsequent calls fail with
    /// [`StoreError::Closed`].
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Which backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redb,
}

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file for the `redb` backend.
    #[serde(default = "default_path")]
    pub path: String,

    /// Collection (table) name.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Field indexed for text search.
    #[serde(default = "default_text_field")]
    pub text_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_path(),
            collection: default_collection(),
            text_field: default_text_field(),
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redb<P: Into<String>>(path: P) -> Self {
        Self {
            backend: StoreBackend::Redb,
            path: path.into(),
            ..Self::default()
        }
    }

    /// Open the configured backend.
    pub fn build(&self) -> StoreResult<Arc<dyn ItemStore>> {
        match self.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new(&self.text_field))),
            StoreBackend::Redb => {
                #[cfg(feature = "embedded")]
                {
                    Ok(Arc::new(RedbStore::open(
                        &self.path,
                        &self.collection,
                        &self.text_field,
                    )?))
                }
                #[cfg(not(feature = "embedded"))]
                {
                    Err(StoreError::backend("redb backend disabled at compile time"))
                }
            }
        }
    }
}

fn default_path() -> String {
    "cocktails.redb".to_string()
}

fn default_collection() -> String {
    "cocktails".to_string()
}

fn default_text_field() -> String {
    "name".to_string()
}

/// Filter and window an id-ordered item sequence.
pub(crate) fn select_page<I>(items: I, filters: &[Filter], page: Page) -> Vec<Item>
where
    I: IntoIterator<Item = Item>,
{
    items
        .into_iter()
        .filter(|item| matches_all(filters, item))
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

/// Score, rank and window a text search over an item sequence.
pub(crate) fn rank_page<I>(
    items: I,
    query: &TextQuery,
    text_field: &str,
    page: Page,
) -> Vec<Item>
where
    I: IntoIterator<Item = Item>,
{
    let mut scored: Vec<(usize, Item)> = items
        .into_iter()
        .filter_map(|item| {
            let text = item.text(text_field)?;
            query.score(&text).map(|score| (score, item))
        })
        .collect();

    // stable sort keeps id order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .map(|(_, item)| item)
        .collect()
}
