//! Redb backend for the cocktail collection.
//!
//! One table per collection, keyed by the 24-character hex id, values are
//! JSON-encoded items. Hex keys sort the same way as the raw id bytes, so a
//! table scan yields creation order.
//!
//! Redb transactions are blocking; every call hops onto the blocking pool
//! with `spawn_blocking` and holds its own clone of the database handle, so
//! [`ItemStore::close`] only releases the file once in-flight calls finish.

use crate::filter::{Filter, matches_all};
use crate::model::{Item, ItemId, ItemPatch, NewItem};
use crate::store::{
    DeleteOutcome, ItemStore, Page, StoreError, StoreResult, TextQuery, UpdateOutcome, rank_page,
};
use ::redb::{Database, ReadableTable, TableDefinition};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, RwLock};

pub struct RedbStore {
    db: RwLock<Option<Arc<Database>>>,
    table: Arc<str>,
    text_field: String,
}

impl RedbStore {
    /// Open or create the database file and make sure the table exists.
    pub fn open<P: AsRef<Path>>(path: P, collection: &str, text_field: &str) -> StoreResult<Self> {
        let db = Database::create(path.as_ref()).map_err(StoreError::backend)?;

        let write_txn = db.begin_write().map_err(StoreError::backend)?;
        {
            // opening creates the table on first use
            let _table = write_txn
                .open_table(table_def(collection))
                .map_err(StoreError::backend)?;
        }
        write_txn.commit().map_err(StoreError::backend)?;

        tracing::info!(
            path = %path.as_ref().display(),
            collection,
            "opened redb document store"
        );

        Ok(Self {
            db: RwLock::new(Some(Arc::new(db))),
            table: Arc::from(collection),
            text_field: text_field.to_string(),
        })
    }

    fn handle(&self) -> StoreResult<Arc<Database>> {
        self.db
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .clone()
            .ok_or(StoreError::Closed)
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &str) -> StoreResult<T> + Send + 'static,
    {
        let db = self.handle()?;
        let table = Arc::clone(&self.table);
        tokio::task::spawn_blocking(move || op(&db, &table))
            .await
            .map_err(StoreError::backend)?
    }
}

fn table_def(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn encode(item: &Item) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(item).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode(bytes: &[u8]) -> StoreResult<Item> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Visit items in key order until the visitor returns `false`.
fn scan(
    db: &Database,
    table: &str,
    visitor: &mut dyn FnMut(Item) -> bool,
) -> StoreResult<()> {
    let read_txn = db.begin_read().map_err(StoreError::backend)?;
    let table = read_txn
        .open_table(table_def(table))
        .map_err(StoreError::backend)?;

    for entry in table.iter().map_err(StoreError::backend)? {
        let (_, value) = entry.map_err(StoreError::backend)?;
        if !visitor(decode(value.value())?) {
            break;
        }
    }
    Ok(())
}

#[async_trait]
impl ItemStore for RedbStore {
    async fn insert(&self, item: NewItem) -> StoreResult<ItemId> {
        let id = ItemId::generate();
        let bytes = encode(&item.into_item(id))?;

        self.blocking(move |db, table| {
            let write_txn = db.begin_write().map_err(StoreError::backend)?;
            {
                let mut table = write_txn
                    .open_table(table_def(table))
                    .map_err(StoreError::backend)?;
                table
                    .insert(id.to_hex().as_str(), bytes.as_slice())
                    .map_err(StoreError::backend)?;
            }
            write_txn.commit().map_err(StoreError::backend)?;
            Ok(id)
        })
        .await
    }

    async fn find(&self, filters: &[Filter], page: Page) -> StoreResult<Vec<Item>> {
        let filters = filters.to_vec();

        self.blocking(move |db, table| {
            let mut selected = Vec::new();
            let mut skipped = 0u64;
            if page.limit == 0 {
                return Ok(selected);
            }
            scan(db, table, &mut |item| {
                if !matches_all(&filters, &item) {
                    return true;
                }
                if skipped < page.offset {
                    skipped += 1;
                    return true;
                }
                selected.push(item);
                (selected.len() as u64) < page.limit
            })?;
            Ok(selected)
        })
        .await
    }

    async fn text_search(&self, query: &TextQuery, page: Page) -> StoreResult<Vec<Item>> {
        let query = query.clone();
        let text_field = self.text_field.clone();

        self.blocking(move |db, table| {
            let mut all = Vec::new();
            scan(db, table, &mut |item| {
                all.push(item);
                true
            })?;
            Ok(rank_page(all, &query, &text_field, page))
        })
        .await
    }

    async fn update(&self, id: ItemId, patch: &ItemPatch) -> StoreResult<UpdateOutcome> {
        let patch = patch.clone();

        self.blocking(move |db, table| {
            let key = id.to_hex();
            let write_txn = db.begin_write().map_err(StoreError::backend)?;
            let outcome = {
                let mut table = write_txn
                    .open_table(table_def(table))
                    .map_err(StoreError::backend)?;

                let current = match table.get(key.as_str()).map_err(StoreError::backend)? {
                    Some(bytes) => decode(bytes.value())?,
                    None => {
                        return Ok(UpdateOutcome {
                            matched_count: 0,
                            modified_count: 0,
                        });
                    }
                };

                let updated = patch.apply(&current)?;
                let modified = updated != current;
                if modified {
                    let bytes = encode(&updated)?;
                    table
                        .insert(key.as_str(), bytes.as_slice())
                        .map_err(StoreError::backend)?;
                }
                UpdateOutcome {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                }
            };
            write_txn.commit().map_err(StoreError::backend)?;
            Ok(outcome)
        })
        .await
    }

    async fn delete(&self, id: ItemId) -> StoreResult<DeleteOutcome> {
        self.blocking(move |db, table| {
            let key = id.to_hex();
            let write_txn = db.begin_write().map_err(StoreError::backend)?;
            let removed = {
                let mut table = write_txn
                    .open_table(table_def(table))
                    .map_err(StoreError::backend)?;
                let removed = table
                    .remove(key.as_str())
                    .map_err(StoreError::backend)?
                    .is_some();
                removed
            };
            write_txn.commit().map_err(StoreError::backend)?;
            Ok(DeleteOutcome {
                deleted_count: u64::from(removed),
            })
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.blocking(|db, table| {
            let read_txn = db.begin_read().map_err(StoreError::backend)?;
            read_txn
                .open_table(table_def(table))
                .map_err(StoreError::backend)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> StoreResult<()> {
        let handle = self
            .db
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .take();
        if handle.is_some() {
            tracing::info!(collection = %self.table, "closed redb document store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::NamedTempFile;

    fn new_item(value: Value) -> NewItem {
        NewItem::from_json(value.as_object().cloned().unwrap()).unwrap()
    }

    fn open(file: &NamedTempFile) -> RedbStore {
        RedbStore::open(file.path(), "cocktails", "name").unwrap()
    }

    #[tokio::test]
    async fn insert_and_find_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let store = open(&file);

        let id = store
            .insert(new_item(json!({"name": "Aviation", "glass": "coupe"})))
            .await
            .unwrap();
        let items = store.find(&[], Page::new(0, 10)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].attributes["glass"], "coupe");
    }

    #[tokio::test]
    async fn find_stops_at_limit_after_offset() {
        let file = NamedTempFile::new().unwrap();
        let store = open(&file);
        for n in 0..6 {
            store
                .insert(new_item(json!({"name": format!("n{n}"), "even": n % 2 == 0})))
                .await
                .unwrap();
        }

        let evens = vec![Filter::new("even", vec![json!(true)])];
        let page = store.find(&evens, Page::new(1, 1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name.as_deref(), Some("n2"));
        assert!(store.find(&evens, Page::new(0, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let file = NamedTempFile::new().unwrap();
        let store = open(&file);
        let id = store.insert(new_item(json!({"name": "Bramble"}))).await.unwrap();

        let patch = ItemPatch::from_json(json!({"name": "X"}).as_object().cloned().unwrap())
            .unwrap();
        let outcome = store.update(id, &patch).await.unwrap();
        assert_eq!((outcome.matched_count, outcome.modified_count), (1, 1));

        let items = store.find(&[], Page::new(0, 10)).await.unwrap();
        assert_eq!(items[0].name.as_deref(), Some("X"));
        assert_eq!(items[0].id, id);

        assert_eq!(store.delete(id).await.unwrap().deleted_count, 1);
        assert_eq!(store.delete(id).await.unwrap().deleted_count, 0);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let file = NamedTempFile::new().unwrap();
        let id = {
            let store = open(&file);
            let id = store.insert(new_item(json!({"name": "Clover Club"}))).await.unwrap();
            store.close().await.unwrap();
            id
        };

        let store = open(&file);
        let query = TextQuery::parse("clover").unwrap();
        let hits = store.text_search(&query, Page::new(0, 5)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let file = NamedTempFile::new().unwrap();
        let store = open(&file);
        store.close().await.unwrap();
        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
    }
}
