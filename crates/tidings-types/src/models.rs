use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Video,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// A greeting as it is released to a recipient.
/// The access password hash is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub slug: String,
    pub sender_id: Uuid,
    pub recipient_first_name: String,
    pub recipient_last_name: String,
    pub theme: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: Option<String>,
    pub video_url: Option<String>,
    pub password_hint: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Open,
    Download,
    Reply,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Download => "download",
            Self::Reply => "reply",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "download" => Some(Self::Download),
            "reply" => Some(Self::Reply),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub id: Uuid,
    pub message_id: Uuid,
    pub kind: EventKind,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who is touching a message, as they introduced themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub first_name: String,
    pub last_name: String,
}

impl Actor {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Attribution used for opens through a share link when the visitor
    /// did not give a name.
    pub fn magic_link() -> Self {
        Self::new("MagicLink", "User")
    }
}

/// What a one-time token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    /// Passwordless sign-in; scope id is a user id.
    Login,
    /// Message share link; scope id is a message id.
    Share,
}

impl TokenScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Share => "share",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analytics {
    pub id: Uuid,
    pub opens: Vec<AccessEvent>,
    pub downloads: Vec<AccessEvent>,
    pub replies: Vec<AccessEvent>,
}
