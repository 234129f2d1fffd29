use super::action::Action;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observation as it goes over the wire: a single NDJSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Nanoseconds since the Unix epoch, encoded as a JSON string.
    #[serde(with = "nanos_string")]
    pub timestamp: i64,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl Envelope {
    pub fn data(timestamp: i64, identifier: &str, data: Value) -> Self {
        Self {
            timestamp,
            identifier: identifier.to_string(),
            data: Some(data),
            action: Some(Action::Data),
        }
    }

    /// Envelope without payload, used for the `connect` and `closing` markers.
    pub fn marker(timestamp: i64, identifier: &str, action: Action) -> Self {
        Self {
            timestamp,
            identifier: identifier.to_string(),
            data: None,
            action: Some(action),
        }
    }
}

/// Stand-in payload for an event that could not be serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadType {
    pub typename: String,
}

impl BadType {
    pub fn new(typename: impl Into<String>) -> Self {
        Self {
            typename: typename.into(),
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::json!({ "typename": self.typename })
    }
}

/// Acknowledgement body returned by the collector.
///
/// Only an explicit `"ok": false` counts as a rejection; a missing field is
/// treated like success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub ok: Option<bool>,
}

impl CheckResponse {
    pub fn is_rejection(&self) -> bool {
        self.ok == Some(false)
    }
}

mod nanos_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S>(nanos: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(nanos)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
