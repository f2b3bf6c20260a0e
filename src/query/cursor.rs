// Opaque keyset pagination tokens

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position in a collection ordered by (timestamp, id)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub t: String,
    pub id: String,
}

impl Cursor {
    pub fn new(t: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            t: t.into(),
            id: id.into(),
        }
    }
}

/// Encode as base64url (no padding) over the canonical JSON of both fields
pub fn encode(cursor: &Cursor) -> String {
    // serde_json objects keep their keys sorted, giving one canonical text per cursor
    let canonical = serde_json::json!({ "t": cursor.t, "id": cursor.id }).to_string();
    URL_SAFE_NO_PAD.encode(canonical.as_bytes())
}

/// Decode a token, any malformed input reads as "no cursor"
pub fn decode(token: Option<&str>) -> Option<Cursor> {
    let token = token.filter(|t| !t.is_empty())?;
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| debug!("Ignoring cursor that is not base64url: {}", e))
        .ok()?;
    let payload: Value = serde_json::from_slice(&bytes)
        .map_err(|e| debug!("Ignoring cursor with malformed payload: {}", e))
        .ok()?;

    let field = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    Some(Cursor {
        t: field("t")?,
        id: field("id")?,
    })
}
