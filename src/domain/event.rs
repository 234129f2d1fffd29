use serde::Serialize;
use serde_json::Value;

type Encoder = Box<dyn FnOnce() -> serde_json::Result<Value> + Send>;

/// A producer's payload waiting in the backlog queue.
///
/// The value travels unserialized; the dispatcher encodes it when it writes
/// the envelope. `kind` is the payload's Rust type name and is what
/// serialization warnings are deduplicated by.
pub struct Event {
    kind: &'static str,
    encode: Encoder,
}

impl Event {
    pub fn new<T>(payload: T) -> Self
    where
        T: Serialize + Send + 'static,
    {
        Self {
            kind: std::any::type_name::<T>(),
            encode: Box::new(move || serde_json::to_value(&payload)),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn into_value(self) -> serde_json::Result<Value> {
        (self.encode)()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("kind", &self.kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_event_encodes_lazily() {
        let event = Event::new(vec![1, 2, 3]);
        assert!(event.kind().contains("Vec"));
        assert_eq!(event.into_value().unwrap(), serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_non_string_keys_fail_to_encode() {
        let mut grid = HashMap::new();
        grid.insert((1, 2), "cell");
        let event = Event::new(grid);
        assert!(event.kind().contains("HashMap"));
        assert!(event.into_value().is_err());
    }
}
