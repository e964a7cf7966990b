use serde::{Deserialize, Serialize};

use crate::utils::display_time;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Normal,
    Error,
}

/// A single chat bubble. Never mutated once created.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub body: String,
    pub sender: Sender,
    pub kind: MessageKind,
    pub timestamp: String,
}

impl Message {
    pub fn new(body: impl Into<String>, sender: Sender, kind: MessageKind) -> Self {
        Self {
            body: body.into(),
            sender,
            kind,
            timestamp: display_time(),
        }
    }

    pub fn user(body: impl Into<String>) -> Self {
        Self::new(body, Sender::User, MessageKind::Normal)
    }

    pub fn bot(body: impl Into<String>) -> Self {
        Self::new(body, Sender::Bot, MessageKind::Normal)
    }

    pub fn bot_error(body: impl Into<String>) -> Self {
        Self::new(body, Sender::Bot, MessageKind::Error)
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }
}
