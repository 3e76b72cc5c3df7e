use serde::{Deserialize, Serialize};

use sqs_utils::TimestampMillis;

use crate::error::{Result, SqsError};

pub type UserId = i64;
pub type MessageId = i64;
pub type Token = String;

pub const DEFAULT_SQUAD: &str = "default";
pub const MAX_NAME_LEN: usize = 80;

/// Queue and squad names become segments of `.`-separated store keys, so only
/// `[A-Za-z0-9_-]` is accepted.
#[inline]
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(SqsError::InvalidArgument(format!("{kind} name length must be 1..={MAX_NAME_LEN}")));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(SqsError::InvalidArgument(format!("{kind} name '{name}' contains invalid characters")));
    }
    Ok(())
}

///Empty squad names fall back to [`DEFAULT_SQUAD`].
#[inline]
pub fn squad_or_default(squad_name: &str) -> &str {
    if squad_name.is_empty() {
        DEFAULT_SQUAD
    } else {
        squad_name
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub squad_name: String,
}

impl Queue {
    #[inline]
    pub fn new<N: Into<String>>(user_id: UserId, name: N) -> Self {
        Self { user_id, name: name.into(), squad_name: DEFAULT_SQUAD.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: MessageId,
    pub content: String,
}

impl Message {
    #[inline]
    pub fn new<C: Into<String>>(message_id: MessageId, content: C) -> Self {
        Self { message_id, content: content.into() }
    }
}

/// Inclusive range of message ids handed out by one allocation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIdRange {
    pub begin: MessageId,
    pub end: MessageId,
}

impl MessageIdRange {
    #[inline]
    pub fn new(begin: MessageId, end: MessageId) -> Result<Self> {
        if end < begin {
            return Err(SqsError::BrokenRange { begin, end });
        }
        Ok(Self { begin, end })
    }

    ///Range ending at the counter value returned by an increment of `size`.
    #[inline]
    pub fn from_end(end: MessageId, size: i64) -> Result<Self> {
        Self::new(end - size + 1, end)
    }

    #[inline]
    pub fn len(&self) -> i64 {
        self.end - self.begin + 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAuth {
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub access_key: String,
    pub secret_key: String,
}

/// Server side binding of a token to the queue it was issued for.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub queue_name: String,
    pub squad_name: String,
    pub node: String,
    #[serde(default)]
    pub created_at: TimestampMillis,
}

/// Credential and context a client attaches to every request after applying for a node.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseInfo {
    #[serde(default)]
    pub token: Token,
    pub queue_name: String,
    #[serde(default)]
    pub squad_name: String,
}
