use serde_json::{Map, Value};

/// An inbound payload, parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }
}

/// Reads a finite number from a JSON number or a numeric string.
pub fn number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Reads a numeric field of an object, `None` when missing, null or not numeric.
pub fn number_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(number)
}

pub fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_bytes() {
        assert_eq!(
            Payload::from_bytes(br#"{"power": 12}"#),
            Payload::Json(json!({"power": 12}))
        );
        assert_eq!(
            Payload::from_bytes(b"not json {"),
            Payload::Text("not json {".to_string())
        );
    }

    #[test]
    fn test_number() {
        assert_eq!(number(&json!(12)), Some(12.0));
        assert_eq!(number(&json!(-1.5)), Some(-1.5));
        assert_eq!(number(&json!("42.5")), Some(42.5));
        assert_eq!(number(&json!(" 7 ")), Some(7.0));
        assert_eq!(number(&json!("NaN")), None);
        assert_eq!(number(&json!("abc")), None);
        assert_eq!(number(&json!(null)), None);
        assert_eq!(number(&json!(true)), None);
    }
}
