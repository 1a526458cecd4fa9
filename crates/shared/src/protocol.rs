use serde::{Deserialize, Serialize};

/// Live mutation pushed by a data source, keyed by item identity `K`.
///
/// A source delivers events one at a time, in arrival order; no other
/// ordering guarantee is part of the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ListEvent<T, K> {
    Add { item_key: K, item: T },
    Update { item_key: K, item: T },
    Delete { item_key: K },
}

impl<T, K> ListEvent<T, K> {
    pub fn item_key(&self) -> &K {
        match self {
            ListEvent::Add { item_key, .. }
            | ListEvent::Update { item_key, .. }
            | ListEvent::Delete { item_key } => item_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_encode_with_type_and_payload_tags() {
        let event: ListEvent<String, u64> = ListEvent::Delete { item_key: 9 };
        let encoded = serde_json::to_string(&event).expect("encode");
        assert_eq!(encoded, r#"{"type":"delete","payload":{"item_key":9}}"#);

        let decoded: ListEvent<String, u64> =
            serde_json::from_str(r#"{"type":"add","payload":{"item_key":1,"item":"a"}}"#)
                .expect("decode");
        assert_eq!(
            decoded,
            ListEvent::Add {
                item_key: 1,
                item: "a".to_string()
            }
        );
    }
}
