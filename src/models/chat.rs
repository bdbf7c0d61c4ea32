use chrono::Utc;
use serde::{ Deserialize, Serialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One exchange unit. Immutable once appended to a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub sequence: u64,
    pub timestamp: i64,
}

impl Turn {
    pub fn user(text: impl Into<String>, sequence: u64) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            sequence,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn assistant(text: impl Into<String>, sequence: u64) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            sequence,
            timestamp: Utc::now().timestamp(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub turns: Vec<Turn>,
}
