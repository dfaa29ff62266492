use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message kinds exchanged between the coordinator and agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TaskRequest,
    TaskResponse,
    InferenceRequest,
    MemoryUpdate,
    Heartbeat,
    ConsensusRequest,
    ConsensusVote,
}

/// A typed message with an opaque JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub kind: MessageKind,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: MessageKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            kind,
            payload,
            sent_at: Utc::now(),
        }
    }

    /// Build a reply to this message, swapping sender and recipient.
    pub fn reply(&self, kind: MessageKind, payload: serde_json::Value) -> Self {
        Self::new(self.to.clone(), self.from.clone(), kind, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_swaps_endpoints() {
        let msg = AgentMessage::new(
            "coordinator",
            "agent-1",
            MessageKind::Heartbeat,
            serde_json::Value::Null,
        );
        let reply = msg.reply(MessageKind::Heartbeat, serde_json::json!({"status": "idle"}));
        assert_eq!(reply.from, "agent-1");
        assert_eq!(reply.to, "coordinator");
        assert_eq!(reply.kind, MessageKind::Heartbeat);
    }

    #[test]
    fn test_message_serialization() {
        let msg = AgentMessage::new(
            "a",
            "b",
            MessageKind::ConsensusRequest,
            serde_json::json!({"topic": "model-choice"}),
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("consensus_request"));
        let back: AgentMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, MessageKind::ConsensusRequest);
    }
}
