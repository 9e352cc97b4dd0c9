//! Attribute filters for item listing.
//!
//! The `filters` query parameter carries a JSON array:
//!
//! ```json
//! [{"name": "category", "values": ["sour", "tiki"]}, {"name": "glass", "values": ["coupe"]}]
//! ```
//!
//! Each filter is a set-membership predicate on one field; all filters must
//! hold for an item to be returned.

use crate::model::Item;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("failed to parse filters: {0}")]
    Parse(String),
}

/// A field restricted to a set of permitted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub values: Vec<Value>,
}

impl Filter {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Set-membership test. Array fields match when any element is permitted;
    /// a missing field only matches an explicit `null`.
    pub fn matches(&self, item: &Item) -> bool {
        match item.field(&self.name) {
            Some(Value::Array(elements)) => elements.iter().any(|e| self.permits(e)),
            Some(value) => self.permits(&value),
            None => self.permits(&Value::Null),
        }
    }

    fn permits(&self, value: &Value) -> bool {
        self.values.iter().any(|allowed| values_equal(allowed, value))
    }
}

/// Parse the raw `filters` parameter. Absent or blank input means no filters.
pub fn parse_filters(raw: Option<&str>) -> Result<Vec<Filter>, FilterError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    let filters: Vec<Filter> =
        serde_json::from_str(raw).map_err(|e| FilterError::Parse(e.to_string()))?;

    if let Some(unnamed) = filters.iter().position(|f| f.name.trim().is_empty()) {
        return Err(FilterError::Parse(format!("filter {unnamed} has an empty name")));
    }
    Ok(filters)
}

/// AND-combination of every filter. An empty slice matches everything.
pub fn matches_all(filters: &[Filter], item: &Item) -> bool {
    filters.iter().all(|f| f.matches(item))
}

// Numbers compare by value so `1` and `1.0` are the same permitted value.
// Integers compare exactly; f64 only when one side is fractional.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            if (x.is_i64() || x.is_u64()) && (y.is_i64() || y.is_u64()) {
                // one negative, one beyond i64::MAX
                return false;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => x == y,
            }
        }
        _ => a == b,
    }
}
