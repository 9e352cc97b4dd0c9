//! Typed cocktail records.
//!
//! Items are schema-light documents: a handful of well-known fields (`_id`,
//! `name`, `image`) plus a flattened map of extension attributes such as
//! `category`, `glass` or `tags`. The identifier is assigned by the store on
//! insert and is never accepted from a client payload.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of the identifier field in every persisted document.
pub const ID_FIELD: &str = "_id";

/// Raised when a string is not a 24-character hex identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid item id {0:?}: expected 24 hex characters")]
pub struct InvalidId(pub String);

/// Problems with a client-supplied item payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload has no fields")]
    Empty,
    #[error("payload has no fields to update")]
    NoFields,
    #[error("malformed item payload: {0}")]
    Invalid(String),
}

/// 12-byte item identifier, rendered as 24 lowercase hex characters.
///
/// Layout: 4 bytes big-endian unix seconds, 5 bytes fixed per process,
/// 3 bytes of a wrapping counter. Ordering therefore follows creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId([u8; 12]);

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

impl ItemId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let unique = PROCESS_UNIQUE.get_or_init(|| {
            let random = uuid::Uuid::new_v4();
            let mut bytes = [0u8; 5];
            bytes.copy_from_slice(&random.as_bytes()[..5]);
            bytes
        });

        let counter = COUNTER.get_or_init(|| {
            let random = uuid::Uuid::new_v4();
            let b = random.as_bytes();
            AtomicU32::new(u32::from_be_bytes([0, b[0], b[1], b[2]]))
        });
        let count = counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Parse a 24-character hex string (either case).
    pub fn parse(s: &str) -> Result<Self, InvalidId> {
        if s.len() != 24 {
            return Err(InvalidId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidId(s.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Lowercase hex form, also used as the storage key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ItemId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ItemId::parse(&s).map_err(D::Error::custom)
    }
}

/// Reference to an asset held by the media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub public_id: String,
    pub url: String,
}

/// A persisted cocktail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: ItemId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,

    /// Extension attributes (category, glass, tags, ingredients...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Item {
    /// Resolve a dotted field path such as `category` or `image.public_id`.
    pub fn field(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        let mut current = match head {
            ID_FIELD => Value::String(self.id.to_hex()),
            "name" => Value::String(self.name.clone()?),
            "image" => serde_json::to_value(self.image.as_ref()?).ok()?,
            other => self.attributes.get(other)?.clone(),
        };

        for segment in segments {
            current = match current {
                Value::Object(mut map) => map.remove(segment)?,
                Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Text content of a field for full-text matching.
    ///
    /// Strings are returned as-is; arrays contribute their string elements
    /// joined by spaces.
    pub fn text(&self, path: &str) -> Option<String> {
        match self.field(path)? {
            Value::String(s) => Some(s),
            Value::Array(values) => {
                let parts: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(" "))
                }
            }
            _ => None,
        }
    }
}

/// Client payload for a new item. Carries no identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl NewItem {
    /// Validate a raw JSON object. Any client-supplied `_id` is dropped.
    pub fn from_json(mut payload: Map<String, Value>) -> Result<Self, PayloadError> {
        payload.remove(ID_FIELD);
        if payload.is_empty() {
            return Err(PayloadError::Empty);
        }
        serde_json::from_value(Value::Object(payload))
            .map_err(|e| PayloadError::Invalid(e.to_string()))
    }

    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.name,
            image: self.image,
            attributes: self.attributes,
        }
    }
}

/// Partial-field replacement applied to an existing item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPatch {
    fields: Map<String, Value>,
}

impl ItemPatch {
    /// Build a patch from raw JSON. `_id` is stripped; at least one field
    /// must remain.
    pub fn from_json(mut fields: Map<String, Value>) -> Result<Self, PayloadError> {
        fields.remove(ID_FIELD);
        if fields.is_empty() {
            return Err(PayloadError::NoFields);
        }
        Ok(Self { fields })
    }

    /// Apply the patch, returning the updated item. The identifier is kept.
    pub fn apply(&self, item: &Item) -> Result<Item, PayloadError> {
        let mut document = match serde_json::to_value(item) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(PayloadError::Invalid("item is not an object".into())),
            Err(e) => return Err(PayloadError::Invalid(e.to_string())),
        };
        for (key, value) in &self.fields {
            document.insert(key.clone(), value.clone());
        }
        document.insert(ID_FIELD.to_string(), Value::String(item.id.to_hex()));

        serde_json::from_value(Value::Object(document))
            .map_err(|e| PayloadError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn id_round_trips_through_hex() {
        let id = ItemId::generate();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(ItemId::parse(&hex).unwrap(), id);
        assert_eq!(ItemId::parse(&hex.to_uppercase()).unwrap(), id);
    }

    #[test]
    fn id_rejects_malformed_input() {
        assert!(ItemId::parse("bad").is_err());
        assert!(ItemId::parse("").is_err());
        assert!(ItemId::parse("zzzzzzzzzzzzzzzzzzzzzzzz").is_err());
        assert!(ItemId::parse("0123456789abcdef012345678").is_err());
    }

    #[test]
    fn generated_ids_are_unique_and_ordered() {
        let ids: Vec<ItemId> = (0..64).map(|_| ItemId::generate()).collect();
        for pair in ids.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        // process-unique middle bytes
        let first = ids[0].as_bytes();
        let last = ids[63].as_bytes();
        assert_eq!(first[4..9], last[4..9]);
    }

    #[test]
    fn item_serializes_id_as_underscore_field() {
        let id = ItemId::parse("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        let item = NewItem::from_json(object(json!({"name": "Mojito", "glass": "highball"})))
            .unwrap()
            .into_item(id);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["_id"], "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(value["name"], "Mojito");
        assert_eq!(value["glass"], "highball");
        assert!(value.get("image").is_none());
    }

    #[test]
    fn new_item_strips_client_id() {
        let item = NewItem::from_json(object(json!({"_id": "abc", "name": "Negroni"}))).unwrap();
        assert!(!item.attributes.contains_key("_id"));
        assert_eq!(item.name.as_deref(), Some("Negroni"));
    }

    #[test]
    fn new_item_rejects_empty_payload() {
        assert_eq!(
            NewItem::from_json(Map::new()).unwrap_err(),
            PayloadError::Empty
        );
        assert_eq!(
            NewItem::from_json(object(json!({"_id": "65a1f0c2e4b0a1b2c3d4e5f6"}))).unwrap_err(),
            PayloadError::Empty
        );
    }

    #[test]
    fn new_item_rejects_misshapen_image() {
        let err = NewItem::from_json(object(json!({"name": "Sour", "image": 42}))).unwrap_err();
        assert!(matches!(err, PayloadError::Invalid(_)));
    }

    #[test]
    fn patch_replaces_fields_and_keeps_id() {
        let id = ItemId::generate();
        let item = NewItem::from_json(object(json!({"name": "Daiquiri", "category": "sour"})))
            .unwrap()
            .into_item(id);
        let other = ItemId::generate().to_hex();
        let patch =
            ItemPatch::from_json(object(json!({"_id": other, "name": "X", "abv": 18}))).unwrap();

        let updated = patch.apply(&item).unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.name.as_deref(), Some("X"));
        assert_eq!(updated.attributes["category"], "sour");
        assert_eq!(updated.attributes["abv"], 18);
    }

    #[test]
    fn patch_without_fields_is_rejected() {
        let err = ItemPatch::from_json(object(json!({"_id": "65a1f0c2e4b0a1b2c3d4e5f6"})))
            .unwrap_err();
        assert_eq!(err, PayloadError::NoFields);
    }

    #[test]
    fn patch_null_clears_known_field() {
        let item = NewItem::from_json(object(json!({"name": "Gimlet"})))
            .unwrap()
            .into_item(ItemId::generate());
        let patch = ItemPatch::from_json(object(json!({"name": null}))).unwrap();
        assert_eq!(patch.apply(&item).unwrap().name, None);
    }

    #[test]
    fn field_resolves_dotted_paths() {
        let item = NewItem::from_json(object(json!({
            "name": "Mai Tai",
            "image": {"public_id": "cocktails/mai", "url": "https://img/mai"},
            "tags": ["tiki", "rum"],
        })))
        .unwrap()
        .into_item(ItemId::generate());

        assert_eq!(item.field("name"), Some(json!("Mai Tai")));
        assert_eq!(item.field("image.public_id"), Some(json!("cocktails/mai")));
        assert_eq!(item.field("tags.1"), Some(json!("rum")));
        assert_eq!(item.field("missing"), None);
        assert_eq!(item.text("tags").as_deref(), Some("tiki rum"));
    }
}
