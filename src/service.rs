//! Item query service: input validation in front of an [`ItemStore`].
//!
//! Every operation validates its input before touching the store, so client
//! mistakes (empty payloads, blank searches, missing identifiers) never cost
//! a round trip.

use crate::filter::{FilterError, parse_filters};
use crate::model::{ID_FIELD, InvalidId, Item, ItemId, ItemPatch, NewItem, PayloadError};
use crate::store::{DeleteOutcome, ItemStore, Page, StoreError, TextQuery, UpdateOutcome};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Largest page `list_items` returns.
pub const MAX_LIST_LIMIT: u64 = 100;
/// Largest page `search_items` returns.
pub const MAX_SEARCH_LIMIT: u64 = 20;

pub const DEFAULT_LIST_LIMIT: u64 = 20;
pub const DEFAULT_SEARCH_LIMIT: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request body must contain at least one field")]
    EmptyPayload,
    #[error("item id is required")]
    MissingId,
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error("search query is required")]
    EmptyQuery,
    #[error("update has no fields besides the id")]
    NoFields,
    #[error("invalid item payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("item {0} not found")]
    NotFound(ItemId),
    #[error(transparent)]
    Store(StoreError),
}

impl From<PayloadError> for ServiceError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Empty => ServiceError::EmptyPayload,
            PayloadError::NoFields => ServiceError::NoFields,
            PayloadError::Invalid(msg) => ServiceError::InvalidPayload(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            // a patch that would leave the item malformed is a client error
            StoreError::Patch(payload) => payload.into(),
            other => ServiceError::Store(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One page of items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// True when fewer items than requested came back.
    pub is_end_of_collection: bool,
}

impl ItemPage {
    fn new(items: Vec<Item>, limit: u64) -> Self {
        let is_end_of_collection = (items.len() as u64) < limit;
        Self {
            items,
            is_end_of_collection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl From<DeleteOutcome> for DeleteResult {
    fn from(outcome: DeleteOutcome) -> Self {
        Self {
            acknowledged: true,
            deleted_count: outcome.deleted_count,
        }
    }
}

/// Clamp a requested limit into `1..=max`, falling back to `default`.
pub fn clamp_limit(requested: Option<u64>, default: u64, max: u64) -> u64 {
    requested.unwrap_or(default).clamp(1, max)
}

#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn ItemStore>,
}

impl ItemService {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    /// Filtered listing. `filters` is the raw JSON parameter.
    pub async fn list_items(
        &self,
        offset: u64,
        limit: Option<u64>,
        filters: Option<&str>,
    ) -> ServiceResult<ItemPage> {
        let limit = clamp_limit(limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
        let filters = parse_filters(filters)?;

        let items = self.store.find(&filters, Page::new(offset, limit)).await?;
        tracing::debug!(
            offset,
            limit,
            filters = filters.len(),
            returned = items.len(),
            "listed items"
        );
        Ok(ItemPage::new(items, limit))
    }

    /// Full-text search. Blank queries are rejected before the store is hit.
    pub async fn search_items(
        &self,
        offset: u64,
        limit: Option<u64>,
        query: Option<&str>,
    ) -> ServiceResult<ItemPage> {
        let raw = query.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(ServiceError::EmptyQuery);
        }
        let query = TextQuery::parse(raw).ok_or(ServiceError::EmptyQuery)?;
        let limit = clamp_limit(limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);

        let items = self
            .store
            .text_search(&query, Page::new(offset, limit))
            .await?;
        tracing::debug!(offset, limit, returned = items.len(), "searched items");
        Ok(ItemPage::new(items, limit))
    }

    pub async fn create_item(&self, payload: Map<String, Value>) -> ServiceResult<InsertResult> {
        if payload.is_empty() {
            return Err(ServiceError::EmptyPayload);
        }
        let item = NewItem::from_json(payload)?;
        let id = self.store.insert(item).await?;

        tracing::info!(item_id = %id, "item created");
        Ok(InsertResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    /// Partial update. The payload must carry `_id`; it is stripped before
    /// the remaining fields are merged into the stored item.
    pub async fn update_item(
        &self,
        mut payload: Map<String, Value>,
    ) -> ServiceResult<UpdateOutcome> {
        let id = match payload.remove(ID_FIELD) {
            None | Some(Value::Null) => return Err(ServiceError::MissingId),
            Some(Value::String(s)) if s.trim().is_empty() => return Err(ServiceError::MissingId),
            Some(Value::String(s)) => ItemId::parse(&s)?,
            Some(other) => return Err(InvalidId(other.to_string()).into()),
        };
        let patch = ItemPatch::from_json(payload)?;

        let outcome = self.store.update(id, &patch).await?;
        if outcome.matched_count == 0 {
            return Err(ServiceError::NotFound(id));
        }

        tracing::info!(item_id = %id, modified = outcome.modified_count, "item updated");
        Ok(outcome)
    }

    /// Delete by id. Deleting an absent item succeeds with a zero count.
    pub async fn delete_item(&self, id: Option<&str>) -> ServiceResult<DeleteResult> {
        let raw = id.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(ServiceError::MissingId);
        }
        let id = ItemId::parse(raw)?;

        let outcome = self.store.delete(id).await?;
        tracing::info!(item_id = %id, deleted = outcome.deleted_count, "item delete requested");
        Ok(outcome.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> ItemService {
        ItemService::new(Arc::new(MemoryStore::default()))
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
        assert_eq!(clamp_limit(Some(0), 20, 100), 1);
        assert_eq!(clamp_limit(Some(500), 20, 100), 100);
        assert_eq!(clamp_limit(Some(50), 10, 20), 20);
    }

    #[tokio::test]
    async fn end_of_collection_when_short_page() {
        let svc = service();
        for name in ["A", "B", "C"] {
            svc.create_item(object(json!({"name": name}))).await.unwrap();
        }
        let page = svc.list_items(0, Some(3), None).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(!page.is_end_of_collection);

        let page = svc.list_items(0, Some(4), None).await.unwrap();
        assert!(page.is_end_of_collection);
    }

    #[tokio::test]
    async fn malformed_filters_fail() {
        let err = service().list_items(0, None, Some("[{")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Filter(_)));
    }

    #[tokio::test]
    async fn blank_search_fails_before_store() {
        let store = Arc::new(MemoryStore::default());
        store.close().await.unwrap();
        let svc = ItemService::new(store);

        // a closed store would surface as Store, so EmptyQuery proves no call happened
        assert!(matches!(
            svc.search_items(0, Some(10), Some("")).await,
            Err(ServiceError::EmptyQuery)
        ));
        assert!(matches!(
            svc.search_items(0, Some(10), None).await,
            Err(ServiceError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn update_requires_well_formed_id() {
        let svc = service();
        assert!(matches!(
            svc.update_item(object(json!({"name": "X"}))).await,
            Err(ServiceError::MissingId)
        ));
        assert!(matches!(
            svc.update_item(object(json!({"_id": "bad", "name": "X"}))).await,
            Err(ServiceError::InvalidId(_))
        ));
        assert!(matches!(
            svc.update_item(object(json!({"_id": 7, "name": "X"}))).await,
            Err(ServiceError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn update_of_unknown_item_is_not_found() {
        let svc = service();
        let id = ItemId::generate().to_hex();
        assert!(matches!(
            svc.update_item(object(json!({"_id": id, "name": "X"}))).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_with_bad_shape_is_invalid_payload() {
        let svc = service();
        let created = svc.create_item(object(json!({"name": "Julep"}))).await.unwrap();
        let err = svc
            .update_item(object(json!({"_id": created.inserted_id.to_hex(), "image": "nope"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn delete_validates_id() {
        let svc = service();
        assert!(matches!(svc.delete_item(None).await, Err(ServiceError::MissingId)));
        assert!(matches!(svc.delete_item(Some("")).await, Err(ServiceError::MissingId)));
        assert!(matches!(
            svc.delete_item(Some("xyz")).await,
            Err(ServiceError::InvalidId(_))
        ));
    }
}
