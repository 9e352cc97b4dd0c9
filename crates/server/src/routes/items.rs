use crate::error::ServerResult;
use crate::routes::json_object;
use crate::state::ServerState;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cocktails::{DeleteResult, InvalidId, ItemPage, ServiceError};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;

/// Query parameters for item listing
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    /// Number of items to skip
    #[serde(default, deserialize_with = "blank_as_none")]
    pub pagination: Option<u64>,

    /// Page size, capped at 100
    #[serde(default, deserialize_with = "blank_as_none")]
    pub limit: Option<u64>,

    /// JSON array of `{"name", "values"}` filters
    #[serde(default)]
    pub filters: Option<String>,
}

/// Query parameters for text search
#[derive(Debug, Default, Deserialize)]
pub struct SearchItemsQuery {
    /// Number of items to skip
    #[serde(default, deserialize_with = "blank_as_none")]
    pub pagination: Option<u64>,

    /// Page size, capped at 20
    #[serde(default, deserialize_with = "blank_as_none")]
    pub limit: Option<u64>,

    /// Search text
    #[serde(default)]
    pub search: Option<String>,
}

/// Numeric query parameter where `limit=` means "not given"
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// List items, optionally filtered
///
/// `GET /api/get-items?pagination=0&limit=20&filters=[{"name":"category","values":["sour"]}]`
pub async fn get_items(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<ListItemsQuery>, QueryRejection>,
) -> ServerResult<Json<ItemPage>> {
    let Query(query) = query?;
    let page = state
        .items
        .list_items(
            query.pagination.unwrap_or(0),
            query.limit,
            query.filters.as_deref(),
        )
        .await?;
    Ok(Json(page))
}

/// Full-text search over item names
///
/// `GET /api/search?pagination=0&limit=10&search=gin`
pub async fn search_items(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<SearchItemsQuery>, QueryRejection>,
) -> ServerResult<Json<ItemPage>> {
    let Query(query) = query?;
    let page = state
        .items
        .search_items(
            query.pagination.unwrap_or(0),
            query.limit,
            query.search.as_deref(),
        )
        .await?;
    Ok(Json(page))
}

/// Create an item from the JSON body
///
/// Responds `201` with `{"acknowledged": true, "insertedId": "<id>"}`.
pub async fn add_item(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> ServerResult<impl IntoResponse> {
    let payload = json_object(&body)?;
    let inserted = state.items.create_item(payload).await?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

/// Partially update the item named by `_id` in the body
pub async fn edit_item(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> ServerResult<impl IntoResponse> {
    let payload = json_object(&body)?;
    state.items.update_item(payload).await?;
    Ok(Json(json!({ "message": "Item updated" })))
}

/// Delete the item named by `id` in the body
pub async fn delete_item(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> ServerResult<Json<DeleteResult>> {
    let payload = json_object(&body)?;
    let id = match payload.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id.as_str()),
        Some(other) => return Err(ServiceError::from(InvalidId(other.to_string())).into()),
    };
    let result = state.items.delete_item(id).await?;
    Ok(Json(result))
}
