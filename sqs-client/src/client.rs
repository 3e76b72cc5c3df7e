use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use sqs_utils::make_url;

use crate::ack::AckReporter;
use crate::error::{ClientError, Result};
use crate::options::Options;
use crate::types::{
    ApplyNodeParams, ApplyNodeReply, BaseInfo, Message, MessageId, MessageIdParams, MessageIdRange,
    MessageIdReply, PullReply, PushParams, QueueInfo, QueueParams, ReceivedParams, Reply, DEFAULT_SQUAD,
};

const APPLY_NODE: &str = "applyNode";
const APPLY_MESSAGE_ID: &str = "messageID";
const PUSH_MESSAGE: &str = "message";
const PULL_MESSAGE: &str = "messages";
const REPORT_RECEIVED: &str = "receivedMessageID";
const QUEUES: &str = "queues";
const QUEUES_LIST: &str = "queues/list";
const QUEUES_REMOVE: &str = "queues/remove";

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    opts: Options,
    endpoint: String,
    httpc: reqwest::Client,
    acks: AckReporter,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client {{ endpoint: {} }}", self.inner.endpoint)
    }
}

impl Client {
    pub fn new(opts: Options) -> Result<Self> {
        let httpc = reqwest::Client::builder().connect_timeout(opts.connect_timeout).timeout(opts.timeout).build()?;
        let acks = AckReporter::new(httpc.clone(), opts.ack_retry.clone());
        let endpoint = make_url(&opts.endpoint);
        Ok(Self { inner: Arc::new(ClientInner { opts, endpoint, httpc, acks }) })
    }

    #[inline]
    pub fn options(&self) -> &Options {
        &self.inner.opts
    }

    /// Client for one queue, an empty squad name selects [`DEFAULT_SQUAD`].
    pub fn queue(&self, name: &str, squad: &str) -> Result<QueueClient> {
        if name.is_empty() {
            return Err(ClientError::EmptyQueueName);
        }
        let squad = if squad.is_empty() { DEFAULT_SQUAD } else { squad };
        Ok(QueueClient {
            client: self.clone(),
            queue_name: name.to_owned(),
            squad_name: squad.to_owned(),
            registration: None,
        })
    }

    pub async fn add_queue(&self, name: &str) -> Result<QueueInfo> {
        let params = QueueParams { auth: &self.inner.opts.auth, queue_name: name };
        self.post::<_, QueueInfo>("add queue", &self.endpoint_url(QUEUES), &params)
            .await?
            .ok_or_else(|| empty_data("add queue"))
    }

    pub async fn list_queues(&self) -> Result<Vec<QueueInfo>> {
        let params = QueueParams { auth: &self.inner.opts.auth, queue_name: "" };
        Ok(self.post("list queues", &self.endpoint_url(QUEUES_LIST), &params).await?.unwrap_or_default())
    }

    pub async fn remove_queue(&self, name: &str) -> Result<()> {
        let params = QueueParams { auth: &self.inner.opts.auth, queue_name: name };
        self.post::<_, serde_json::Value>("remove queue", &self.endpoint_url(QUEUES_REMOVE), &params).await?;
        Ok(())
    }

    /// Number of ack reports still retrying in the background.
    #[inline]
    pub fn pending_acks(&self) -> usize {
        self.inner.acks.in_flight()
    }

    /// Cancels every ack report still retrying and waits for the tasks to finish.
    pub async fn close(&self) {
        self.inner.acks.close().await;
    }

    #[inline]
    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{path}", self.inner.endpoint)
    }

    async fn post<B, T>(&self, op: &'static str, url: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        log::debug!("{op}, url: {url}");
        let resp = self.inner.httpc.post(url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Reply<serde_json::Value>>(&text)
                .map(|r| format!("code: {}, {}", r.code, r.message))
                .unwrap_or(text);
            return Err(ClientError::Status { op, status: status.as_u16(), message });
        }
        let reply: Reply<T> = resp.json().await?;
        Ok(reply.data)
    }
}

#[inline]
fn empty_data(op: &'static str) -> ClientError {
    ClientError::Status { op, status: 200, message: "response data is empty".into() }
}

#[derive(Debug, Clone)]
struct Registration {
    node: String,
    node_url: String,
    base: BaseInfo,
}

/// Operations on one queue and squad.
///
/// Unregistered until [`QueueClient::apply_node`] succeeds; every queue
/// operation before that fails with [`ClientError::Unregistered`]. A failed
/// push or pull keeps the registration, only another `apply_node` replaces it.
#[derive(Debug)]
pub struct QueueClient {
    client: Client,
    queue_name: String,
    squad_name: String,
    registration: Option<Registration>,
}

impl QueueClient {
    #[inline]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    #[inline]
    pub fn squad_name(&self) -> &str {
        &self.squad_name
    }

    #[inline]
    pub fn serving_node(&self) -> Option<&str> {
        self.registration.as_ref().map(|r| r.node.as_str())
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    #[inline]
    fn registration(&self) -> Result<&Registration> {
        self.registration.as_ref().ok_or(ClientError::Unregistered)
    }

    /// Resolves the serving node and session token for this queue.
    pub async fn apply_node(&mut self) -> Result<&str> {
        let base = BaseInfo {
            token: String::new(),
            queue_name: self.queue_name.clone(),
            squad_name: self.squad_name.clone(),
        };
        let params = ApplyNodeParams { auth: &self.client.inner.opts.auth, base: &base };
        let reply: ApplyNodeReply = self
            .client
            .post("apply node", &self.client.endpoint_url(APPLY_NODE), &params)
            .await?
            .unwrap_or_default();
        if reply.node.is_empty() || reply.token.is_empty() {
            return Err(ClientError::Registration(format!(
                "empty node or token in response, queue: {}, squad: {}",
                self.queue_name, self.squad_name
            )));
        }
        log::info!("node applied, queue: {}, squad: {}, node: {}", self.queue_name, self.squad_name, reply.node);

        let registration = Registration {
            node_url: make_url(&reply.node),
            node: reply.node,
            base: BaseInfo { token: reply.token, ..base },
        };
        Ok(self.registration.insert(registration).node.as_str())
    }

    pub async fn apply_message_id_range(&self, size: i64) -> Result<MessageIdRange> {
        let reg = self.registration()?;
        let params = MessageIdParams { base: &reg.base, size };
        let reply: MessageIdReply = self
            .client
            .post("apply message id", &node_url(reg, APPLY_MESSAGE_ID), &params)
            .await?
            .ok_or_else(|| empty_data("apply message id"))?;
        if reply.message_id_end < reply.message_id_begin {
            return Err(ClientError::BrokenRange { begin: reply.message_id_begin, end: reply.message_id_end });
        }
        Ok(MessageIdRange { begin: reply.message_id_begin, end: reply.message_id_end })
    }

    /// Reserves one id and pushes `content` under it. A failed push is not
    /// retried and its id is never reissued.
    pub async fn push_message(&self, content: &str) -> Result<MessageId> {
        let reg = self.registration()?;
        let message_id = self.apply_message_id_range(1).await?.end;
        log::debug!("message id applied: {message_id}");
        let params = PushParams { base: &reg.base, message_id, content };
        self.client.post::<_, serde_json::Value>("push message", &node_url(reg, PUSH_MESSAGE), &params).await?;
        Ok(message_id)
    }

    /// Pulls one batch and hands it to `handler`. Once the handler succeeds the
    /// last id of the batch is reported in the background, so this returns
    /// without waiting for the ack. Returns the batch size.
    pub async fn pull_message<F, Fut, E>(&self, handler: F) -> Result<usize>
    where
        F: FnOnce(Vec<Message>) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: fmt::Display,
    {
        let reg = self.registration()?;
        let reply: PullReply =
            self.client.post("pull message", &node_url(reg, PULL_MESSAGE), &reg.base).await?.unwrap_or_default();
        let messages = reply.messages;
        let last_id = match messages.last() {
            Some(m) => m.message_id,
            None => return Ok(0),
        };
        let n = messages.len();
        handler(messages).await.map_err(|e| ClientError::Handler(e.to_string()))?;

        let params = ReceivedParams { base: reg.base.clone(), message_id: last_id };
        self.client.inner.acks.spawn(node_url(reg, REPORT_RECEIVED), params);
        Ok(n)
    }
}

#[inline]
fn node_url(reg: &Registration, path: &str) -> String {
    format!("{}/{path}", reg.node_url)
}
