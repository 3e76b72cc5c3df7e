use serde::{Deserialize, Serialize};

pub type MessageId = i64;

pub const DEFAULT_SQUAD: &str = "default";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAuth {
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: MessageId,
    pub content: String,
}

/// Inclusive range of ids reserved on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIdRange {
    pub begin: MessageId,
    pub end: MessageId,
}

/// Attached to every queue request once a node was applied for.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseInfo {
    pub token: String,
    pub queue_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub squad_name: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Reply<T> {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Serialize, Debug)]
pub(crate) struct ApplyNodeParams<'a> {
    #[serde(flatten)]
    pub auth: &'a UserAuth,
    #[serde(flatten)]
    pub base: &'a BaseInfo,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct ApplyNodeReply {
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct MessageIdParams<'a> {
    #[serde(flatten)]
    pub base: &'a BaseInfo,
    pub size: i64,
}

#[derive(Deserialize, Debug)]
pub(crate) struct MessageIdReply {
    pub message_id_begin: MessageId,
    pub message_id_end: MessageId,
}

#[derive(Serialize, Debug)]
pub(crate) struct PushParams<'a> {
    #[serde(flatten)]
    pub base: &'a BaseInfo,
    pub message_id: MessageId,
    pub content: &'a str,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct PullReply {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Serialize, Debug, Clone)]
pub(crate) struct ReceivedParams {
    #[serde(flatten)]
    pub base: BaseInfo,
    pub message_id: MessageId,
}

#[derive(Serialize, Debug)]
pub(crate) struct QueueParams<'a> {
    #[serde(flatten)]
    pub auth: &'a UserAuth,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub queue_name: &'a str,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub squad_name: String,
}
