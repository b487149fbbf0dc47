//! Chat turns as exchanged with a model

use serde::{Deserialize, Serialize};

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Model,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub(crate) fn new(role: Role, content: String) -> Message {
        Message { role, content }
    }

    pub(crate) fn user(content: String) -> Message {
        Message::new(Role::User, content)
    }

    pub(crate) fn model(content: String) -> Message {
        Message::new(Role::Model, content)
    }
}
