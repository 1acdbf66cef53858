// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::constants::{ASSISTANT_NAME, WELCOME_MESSAGE_ID};

/// A web reference backing part of an assistant reply. Unique by URI within
/// one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

/// Metadata for a file attached to a message. `preview_path` points at
/// transient local bytes and never survives a reload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub preview_path: Option<PathBuf>,
}

/// A single chat message. Text is mutable only while `streaming` is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileMeta>,
}

impl Message {
    fn new(id: String, text: String, sender: String) -> Self {
        Message {
            id,
            text,
            sender,
            timestamp: Utc::now(),
            streaming: false,
            sources: None,
            file: None,
        }
    }

    /// A message authored by the human user.
    pub fn user(sender: &str, text: &str) -> Self {
        Message::new(
            format!("user-{}", Uuid::new_v4()),
            text.to_string(),
            sender.to_string(),
        )
    }

    /// The empty assistant message a streamed reply accumulates into.
    pub fn assistant_placeholder() -> Self {
        let mut msg = Message::new(
            format!("ai-{}", Uuid::new_v4()),
            String::new(),
            ASSISTANT_NAME.to_string(),
        );
        msg.streaming = true;
        msg
    }

    /// An assistant-authored message carrying classified error text.
    pub fn assistant_error(text: &str) -> Self {
        Message::new(
            format!("error-{}", Uuid::new_v4()),
            text.to_string(),
            ASSISTANT_NAME.to_string(),
        )
    }

    /// The greeting synthesized for a user with no stored history.
    pub fn welcome(username: &str) -> Self {
        Message::new(
            WELCOME_MESSAGE_ID.to_string(),
            format!(
                "Welcome, {username}! I'm {ASSISTANT_NAME}, your AI assistant. \
                 I'm here to help you with anything. How can I impress you today?"
            ),
            ASSISTANT_NAME.to_string(),
        )
    }
}

/// A file the user is sending with the current turn. The bytes go to the API
/// inline; only `name` and `mime_type` end up in the persisted message.
#[derive(Clone, Debug)]
pub struct OutgoingAttachment {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub preview_path: Option<PathBuf>,
}

/// Output image shape. Closed set; the pixel mapping is fixed per build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1:1" => Some(AspectRatio::Square),
            "16:9" => Some(AspectRatio::Widescreen),
            "9:16" => Some(AspectRatio::Portrait),
            _ => None,
        }
    }

    /// Pixel dimensions the ratio resolves to. Consistent across calls
    /// within one build.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Widescreen => (1280, 720),
            AspectRatio::Portrait => (720, 1280),
        }
    }
}

/// One generated image in the per-user gallery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageHistoryItem {
    pub id: String,
    pub prompt: String,
    pub image_data_url: String,
    pub aspect_ratio: AspectRatio,
}

impl ImageHistoryItem {
    pub fn new(prompt: &str, image_data_url: String, aspect_ratio: AspectRatio) -> Self {
        ImageHistoryItem {
            id: format!("history-{}", Uuid::new_v4()),
            prompt: prompt.to_string(),
            image_data_url,
            aspect_ratio,
        }
    }
}

/// Prepends `item` and drops the oldest entries past `limit`.
pub fn push_capped(items: &mut Vec<ImageHistoryItem>, item: ImageHistoryItem, limit: usize) {
    items.insert(0, item);
    items.truncate(limit);
}

/// Logs details of each API call.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiCallLog {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub request_summary: String,
    pub response_status: u16,
    pub response_time_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::IMAGE_HISTORY_LIMIT;

    #[test]
    fn test_message_roundtrip_preserves_identity() {
        let mut msg = Message::user("Sara", "hello there");
        msg.file = Some(FileMeta {
            name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
            preview_path: Some(PathBuf::from("/tmp/photo.png")),
        });

        let json = serde_json::to_string(&msg).unwrap();
        let restored: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id, msg.id);
        assert_eq!(restored.sender, msg.sender);
        assert_eq!(restored.text, msg.text);
        assert_eq!(restored.timestamp, msg.timestamp);

        // Attachment keeps name and type but sheds the transient reference.
        let file = restored.file.unwrap();
        assert_eq!(file.name, "photo.png");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.preview_path, None);
    }

    #[test]
    fn test_placeholder_is_streaming_and_empty() {
        let msg = Message::assistant_placeholder();
        assert!(msg.streaming);
        assert!(msg.text.is_empty());
        assert_eq!(msg.sender, ASSISTANT_NAME);
    }

    #[test]
    fn test_sources_absent_when_none() {
        let msg = Message::user("Sara", "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("sources").is_none());
    }

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!(AspectRatio::parse("16:9"), Some(AspectRatio::Widescreen));
        assert_eq!(AspectRatio::parse("4:3"), None);
        for ratio in [
            AspectRatio::Square,
            AspectRatio::Widescreen,
            AspectRatio::Portrait,
        ] {
            assert_eq!(AspectRatio::parse(ratio.as_str()), Some(ratio));
            // The pixel mapping is stable across calls.
            assert_eq!(ratio.dimensions(), ratio.dimensions());
        }
        let (w, h) = AspectRatio::Widescreen.dimensions();
        assert!(w > h);
    }

    #[test]
    fn test_push_capped_evicts_oldest() {
        let mut items = Vec::new();
        for i in 0..IMAGE_HISTORY_LIMIT + 1 {
            let item = ImageHistoryItem::new(
                &format!("prompt {i}"),
                "data:image/jpeg;base64,AAAA".to_string(),
                AspectRatio::Square,
            );
            push_capped(&mut items, item, IMAGE_HISTORY_LIMIT);
        }
        assert_eq!(items.len(), IMAGE_HISTORY_LIMIT);
        // Newest first; "prompt 0" was the oldest and got evicted.
        assert_eq!(items[0].prompt, format!("prompt {IMAGE_HISTORY_LIMIT}"));
        assert!(items.iter().all(|i| i.prompt != "prompt 0"));
    }
}
