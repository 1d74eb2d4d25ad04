pub mod chats;
pub mod messages;
pub mod settings;
pub mod users;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
        }
    }

    /// Anything unrecognized reads back as plain text.
    pub fn parse(value: &str) -> Self {
        match value {
            "image" => MessageKind::Image,
            _ => MessageKind::Text,
        }
    }
}

/// A persisted message row. Immutable once created; rows only go away
/// through [`messages::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub chat_id: String,
    pub sender: String,
    pub text: String,
    pub time: String,
    pub is_read: bool,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: String,
    pub name: String,
}
