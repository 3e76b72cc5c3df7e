//! HTTP surface of a serving node
//!
//! Every route is a `POST` with a JSON body and answers with the envelope
//! `{"code": 0, "message": "ok", "data": ...}`. Failures carry the error's
//! numeric code and the matching HTTP status.
use salvo::affix;
use salvo::hyper::server::conn::AddrIncoming;
use salvo::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::context::ServerContext;
use crate::error::{Result, SqsError};
use crate::types::{BaseInfo, Message, MessageId, Queue, Session, UserAuth};

#[derive(Serialize, Deserialize, Debug)]
pub struct Reply<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Deserialize, Debug)]
struct ApplyNodeParams {
    #[serde(flatten)]
    auth: UserAuth,
    queue_name: String,
    #[serde(default)]
    squad_name: String,
}

#[derive(Serialize, Debug)]
struct ApplyNodeReply {
    node: String,
    token: String,
}

#[derive(Deserialize, Debug)]
struct MessageIdParams {
    #[serde(flatten)]
    base: BaseInfo,
    #[serde(default = "MessageIdParams::size_default")]
    size: i64,
}

impl MessageIdParams {
    fn size_default() -> i64 {
        1
    }
}

#[derive(Serialize, Debug)]
struct MessageIdReply {
    message_id_begin: MessageId,
    message_id_end: MessageId,
}

#[derive(Deserialize, Debug)]
struct PushParams {
    #[serde(flatten)]
    base: BaseInfo,
    message_id: MessageId,
    content: String,
}

#[derive(Deserialize, Debug)]
struct PullParams {
    #[serde(flatten)]
    base: BaseInfo,
}

#[derive(Serialize, Debug)]
struct PullReply {
    messages: Vec<Message>,
}

#[derive(Deserialize, Debug)]
struct ReceivedParams {
    #[serde(flatten)]
    base: BaseInfo,
    message_id: MessageId,
}

#[derive(Serialize, Debug)]
struct ReceivedReply {
    updated: bool,
}

#[derive(Deserialize, Debug)]
struct QueueParams {
    #[serde(flatten)]
    auth: UserAuth,
    #[serde(default)]
    queue_name: String,
}

pub fn route(scx: ServerContext) -> Router {
    Router::new()
        .hoop(affix::inject(scx))
        .hoop(api_logger)
        .push(Router::with_path("applyNode").post(apply_node))
        .push(Router::with_path("messageID").post(apply_message_id))
        .push(Router::with_path("message").post(push_message))
        .push(Router::with_path("messages").post(pull_messages))
        .push(Router::with_path("receivedMessageID").post(report_received))
        .push(
            Router::with_path("queues")
                .post(add_queue)
                .push(Router::with_path("list").post(list_queues))
                .push(Router::with_path("remove").post(remove_queue)),
        )
}

pub async fn listen_and_serve(
    scx: ServerContext,
    listener: tokio::net::TcpListener,
    rx: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    log::info!("HTTP API Listening on {:?}, node addr: {}", listener.local_addr().ok(), scx.node_addr);
    let incoming = AddrIncoming::from_listener(listener).map_err(anyhow::Error::new)?;
    Server::new(TcpListener::bind(incoming))
        .try_serve_with_graceful_shutdown(route(scx), async {
            rx.await.ok();
        })
        .await
        .map_err(anyhow::Error::new)?;
    log::info!("HTTP API stopped");
    Ok(())
}

#[handler]
async fn api_logger(req: &mut Request) {
    log::debug!(
        "Request {}, {}, {}",
        req.remote_addr().map(|addr| addr.to_string()).unwrap_or_else(|| "[Unknown]".into()),
        req.method(),
        req.uri()
    );
}

fn ok<T: Serialize + Send>(res: &mut Response, data: T) {
    res.render(Json(Reply { code: 0, message: "ok".into(), data: Some(data) }));
}

fn fail(res: &mut Response, e: SqsError) {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        log::error!("request failed, {e}");
    } else {
        log::debug!("request rejected, {e}");
    }
    res.set_status_code(status);
    res.render(Json(Reply::<()> { code: e.code(), message: e.to_string(), data: None }));
}

fn reply<T: Serialize + Send>(res: &mut Response, r: Result<T>) {
    match r {
        Ok(data) => ok(res, data),
        Err(e) => fail(res, e),
    }
}

fn context(depot: &Depot) -> Result<ServerContext> {
    depot.obtain::<ServerContext>().cloned().ok_or_else(|| SqsError::internal("server context not injected"))
}

async fn params<T: serde::de::DeserializeOwned>(req: &mut Request) -> Result<T> {
    req.parse_json::<T>().await.map_err(|e| SqsError::InvalidArgument(e.to_string()))
}

/// The session is authoritative, the queue and squad a client sends must match it.
/// A session outlives its queue, so the queue must still exist.
async fn resolve(scx: &ServerContext, base: &BaseInfo) -> Result<Session> {
    let session = scx.storage.node.session(&base.token).await?;
    if base.queue_name != session.queue_name
        || (!base.squad_name.is_empty() && base.squad_name != session.squad_name)
    {
        return Err(SqsError::InvalidToken);
    }
    scx.storage.queue.one(session.user_id, &session.queue_name).await?;
    Ok(session)
}

#[handler]
async fn apply_node(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _apply_node(req, depot).await)
}

async fn _apply_node(req: &mut Request, depot: &Depot) -> Result<ApplyNodeReply> {
    let scx = context(depot)?;
    let p: ApplyNodeParams = params(req).await?;
    let user_id = scx.storage.user.authenticate(&p.auth).await?;
    let (node, token) = scx.storage.node.apply_node(user_id, &p.queue_name, &p.squad_name).await?;
    Ok(ApplyNodeReply { node, token })
}

#[handler]
async fn apply_message_id(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _apply_message_id(req, depot).await)
}

async fn _apply_message_id(req: &mut Request, depot: &Depot) -> Result<MessageIdReply> {
    let scx = context(depot)?;
    let p: MessageIdParams = params(req).await?;
    let session = resolve(&scx, &p.base).await?;
    let range = scx.storage.queue.apply_message_ids(session.user_id, &session.queue_name, p.size).await?;
    Ok(MessageIdReply { message_id_begin: range.begin, message_id_end: range.end })
}

#[handler]
async fn push_message(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _push_message(req, depot).await)
}

async fn _push_message(req: &mut Request, depot: &Depot) -> Result<()> {
    let scx = context(depot)?;
    let p: PushParams = params(req).await?;
    let session = resolve(&scx, &p.base).await?;
    let msg = Message::new(p.message_id, p.content);
    scx.storage.message.push(session.user_id, &session.queue_name, &msg).await
}

#[handler]
async fn pull_messages(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _pull_messages(req, depot).await)
}

async fn _pull_messages(req: &mut Request, depot: &Depot) -> Result<PullReply> {
    let scx = context(depot)?;
    let p: PullParams = params(req).await?;
    let session = resolve(&scx, &p.base).await?;
    let messages = scx.storage.message.pull(session.user_id, &session.queue_name, &session.squad_name).await?;
    Ok(PullReply { messages })
}

#[handler]
async fn report_received(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _report_received(req, depot).await)
}

async fn _report_received(req: &mut Request, depot: &Depot) -> Result<ReceivedReply> {
    let scx = context(depot)?;
    let p: ReceivedParams = params(req).await?;
    let session = resolve(&scx, &p.base).await?;
    let updated = scx
        .storage
        .squad
        .report_received(session.user_id, &session.queue_name, &session.squad_name, p.message_id)
        .await?;
    Ok(ReceivedReply { updated })
}

#[handler]
async fn add_queue(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _add_queue(req, depot).await)
}

async fn _add_queue(req: &mut Request, depot: &Depot) -> Result<Queue> {
    let scx = context(depot)?;
    let p: QueueParams = params(req).await?;
    let user_id = scx.storage.user.authenticate(&p.auth).await?;
    let queue = Queue::new(user_id, p.queue_name);
    scx.storage.queue.add(queue.clone()).await?;
    Ok(queue)
}

#[handler]
async fn list_queues(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _list_queues(req, depot).await)
}

async fn _list_queues(req: &mut Request, depot: &Depot) -> Result<Vec<Queue>> {
    let scx = context(depot)?;
    let p: QueueParams = params(req).await?;
    let user_id = scx.storage.user.authenticate(&p.auth).await?;
    scx.storage.queue.all(user_id).await
}

#[handler]
async fn remove_queue(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    reply(res, _remove_queue(req, depot).await)
}

async fn _remove_queue(req: &mut Request, depot: &Depot) -> Result<()> {
    let scx = context(depot)?;
    let p: QueueParams = params(req).await?;
    let user_id = scx.storage.user.authenticate(&p.auth).await?;
    scx.storage.queue.remove(user_id, &p.queue_name).await
}
