use serde::Serialize;
use serde_json::{Map, Value};

/// Decodes a message body as JSON.
///
/// The bytes are read as UTF-8 (invalid sequences are replaced) and parsed.
/// An empty body or anything that fails to parse becomes an empty object;
/// subscribers never see a decode error.
pub fn decode_payload(bytes: &[u8]) -> Value {
    let text = String::from_utf8_lossy(bytes);
    serde_json::from_str(&text).unwrap_or_else(|_| empty_object())
}

pub fn encode_payload<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(payload)
}

pub fn empty_object() -> Value {
    Value::Object(Map::new())
}
