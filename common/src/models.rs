// Feed queue data model and item normalization

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Alias keys accepted for each canonical field, in priority order
const TITLE_KEYS: &[&str] = &["title", "name"];
const LINK_KEYS: &[&str] = &["link", "url", "href"];
const IMAGE_KEYS: &[&str] = &["image", "image_url", "imageUrl", "thumbnail"];

/// Queue document stored at the active path
///
/// `items` is always an array once parsed: a missing or non-array value is
/// read as an empty queue. Other top-level fields survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueDocument<T = Value> {
    pub items: Vec<T>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueueDocument<Value> {
    /// Parse a stored document, tolerating a missing or malformed `items` field
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(data)?;
        let mut extra = match value {
            Value::Object(map) => map,
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )))
            }
        };

        let items = match extra.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        Ok(Self { items, extra })
    }

    /// Run every raw item through the normalization transform, keeping order
    pub fn normalize(self) -> QueueDocument<CanonicalItem> {
        QueueDocument {
            items: self.items.into_iter().map(CanonicalItem::from_raw).collect(),
            extra: self.extra,
        }
    }
}

impl<T> QueueDocument<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Remove and return the head item; the remainder keeps its order
    pub fn pop_next(&mut self) -> Option<T> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }
}

impl<T: Serialize> QueueDocument<T> {
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Normalized feed entry ready for publishing
///
/// Absent canonical fields are skipped on serialization, which is what makes
/// the serialized form a valid publish payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalItem {
    /// Map a raw storage record onto the canonical shape
    ///
    /// Non-object records yield an item with no canonical fields.
    pub fn from_raw(raw: Value) -> Self {
        let mut fields = match raw {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let title = take_first_string(&mut fields, TITLE_KEYS);
        let link = take_first_string(&mut fields, LINK_KEYS);
        let image = take_first_string(&mut fields, IMAGE_KEYS);

        Self {
            title,
            link,
            image,
            extra: fields,
        }
    }

    /// Payload sent to the tweet webhook: only defined fields
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(title) = &self.title {
            payload.insert("title".to_string(), Value::String(title.clone()));
        }
        if let Some(link) = &self.link {
            payload.insert("link".to_string(), Value::String(link.clone()));
        }
        if let Some(image) = &self.image {
            payload.insert("image".to_string(), Value::String(image.clone()));
        }
        for (key, value) in &self.extra {
            payload.entry(key.clone()).or_insert_with(|| value.clone());
        }
        payload
    }
}

/// Take the first usable string among `keys`, consuming its key
///
/// `keys[0]` is the canonical name. When the value comes from an alias, an
/// unusable value under the canonical name is dropped so the field is not
/// serialized twice.
fn take_first_string(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    let key = keys.iter().find(|key| {
        matches!(fields.get(**key), Some(Value::String(s)) if !s.is_empty())
    })?;

    let value = match fields.remove(*key) {
        Some(Value::String(s)) => s,
        _ => return None,
    };
    fields.remove(keys[0]);
    Some(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
