//! WebSocket protocol message types
//!
//! Every message is a JSON object tagged by `type`. Connect and disconnect
//! are the socket opening and closing, so they have no message of their own.

use lookout_core::ClientInfo;
use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Set this session's display name
    UserJoined {
        #[serde(default)]
        username: Option<String>,
    },

    /// Chat line, relayed verbatim to every viewer
    ChatMessage {
        #[serde(default)]
        username: String,
        #[serde(default)]
        message: String,
    },

    /// Turn detection on or off for everyone
    ToggleProcessing { enabled: bool },

    StartRecording,

    StopRecording,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Started,
    Stopped,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current viewer list, sent to everyone on every membership change
    ClientUpdate {
        count: usize,
        clients: Vec<ClientInfo>,
    },

    /// One annotated frame
    ProcessedFrame {
        /// `data:image/jpeg;base64,...`
        frame: String,
        /// Accepted detections; zero while detection is off
        num_faces: usize,
        client_count: usize,
    },

    ProcessingStatus { enabled: bool },

    /// Sent only to the session that asked, and only on a state change
    RecordingStatus {
        status: RecordingState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },

    ChatMessage { username: String, message: String },
}

impl ServerMessage {
    pub fn client_update(clients: Vec<ClientInfo>) -> Self {
        Self::ClientUpdate {
            count: clients.len(),
            clients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_joined_parses_username() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "user_joined", "username": "alice"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::UserJoined {
                username: Some("alice".to_string())
            }
        );
    }

    #[test]
    fn user_joined_without_username_is_accepted() {
        let msg: ClientMessage = serde_json::from_value(json!({"type": "user_joined"})).unwrap();
        assert_eq!(msg, ClientMessage::UserJoined { username: None });
    }

    #[test]
    fn recording_requests_carry_no_payload() {
        let start: ClientMessage =
            serde_json::from_str(r#"{"type":"start_recording"}"#).unwrap();
        let stop: ClientMessage = serde_json::from_str(r#"{"type":"stop_recording"}"#).unwrap();
        assert_eq!(start, ClientMessage::StartRecording);
        assert_eq!(stop, ClientMessage::StopRecording);
    }

    #[test]
    fn toggle_requires_enabled() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"toggle_processing"}"#).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn processed_frame_wire_shape() {
        let msg = ServerMessage::ProcessedFrame {
            frame: "data:image/jpeg;base64,AA==".to_string(),
            num_faces: 2,
            client_count: 3,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "processed_frame",
                "frame": "data:image/jpeg;base64,AA==",
                "num_faces": 2,
                "client_count": 3,
            })
        );
    }

    #[test]
    fn stopped_status_omits_filename() {
        let msg = ServerMessage::RecordingStatus {
            status: RecordingState::Stopped,
            filename: None,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "recording_status", "status": "stopped"})
        );
    }

    #[test]
    fn client_update_counts_clients() {
        let clients = vec![ClientInfo {
            id: "abc".to_string(),
            username: "Anonymous".to_string(),
            connected_at: "2024-01-01 12:00:00".to_string(),
        }];
        let value = serde_json::to_value(ServerMessage::client_update(clients)).unwrap();
        assert_eq!(value["type"], "client_update");
        assert_eq!(value["count"], 1);
        assert_eq!(value["clients"][0]["username"], "Anonymous");
    }
}
