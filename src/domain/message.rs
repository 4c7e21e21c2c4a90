//! The chat message model.

use serde::{Deserialize, Serialize};

/// A single chat message, immutable once constructed by the broker.
///
/// The serialized shape is the wire contract: `id` is the sender's client
/// id and is omitted entirely when the sender is unknown (e.g. messages
/// recovered from a log written before ids were recorded). Clients use it
/// to de-duplicate their own messages out of the fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub username: String,
    pub message: String,
    /// Unix timestamp in UTC milliseconds, assigned by the broker.
    pub time: i64,
}

impl Message {
    pub fn new(id: Option<u64>, username: String, message: String, time: i64) -> Self {
        Self {
            id,
            username,
            message,
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_without_id_when_sender_unknown() {
        let msg = Message::new(None, "bob".to_string(), "hi".to_string(), 1000);

        let json = serde_json::to_value(&msg).unwrap();

        assert!(json.get("id").is_none());
        assert_eq!(json["username"], "bob");
        assert_eq!(json["message"], "hi");
        assert_eq!(json["time"], 1000);
    }

    #[test]
    fn test_serializes_sender_id_when_present() {
        let msg = Message::new(Some(3), "bob".to_string(), "hi".to_string(), 1000);

        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["id"], 3);
    }

    #[test]
    fn test_deserializes_with_missing_id_field() {
        let msg: Message =
            serde_json::from_str(r#"{"username":"bob","message":"hi","time":1000}"#).unwrap();

        assert_eq!(msg.id, None);
        assert_eq!(msg.username, "bob");
    }
}
