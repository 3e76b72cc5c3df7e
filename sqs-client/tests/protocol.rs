use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use salvo::affix;
use salvo::hyper::server::conn::AddrIncoming;
use salvo::prelude::*;
use serde_json::json;
use tokio::sync::oneshot;

use sqs::{api, ServerContext, Storage};
use sqs_client::{AckRetry, Client, ClientError, Message, Options};
use sqs_conf::Settings;

async fn start_node() -> (String, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let settings = Settings::for_test().with(|s| {
        s.node.addr.clone_from(&addr);
        s.message.pull_batch_size = 2;
    });
    let storage = Storage::new(&settings).await.unwrap();
    let scx = ServerContext::new(settings, storage).start().await.unwrap();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(api::listen_and_serve(scx, listener, rx));
    (addr, tx)
}

fn fast_options(endpoint: &str) -> Options {
    let mut opts = Options::new(endpoint, "root", "sqsrootsecret");
    opts.ack_retry = AckRetry {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(40),
        multiplier: 2.0,
        randomization_factor: 0.0,
    };
    opts
}

async fn wait_acks_settled(client: &Client) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.pending_acks() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn pull_ids(queue: &sqs_client::QueueClient) -> Vec<i64> {
    let got = Arc::new(Mutex::new(Vec::new()));
    let got1 = got.clone();
    queue
        .pull_message(|msgs: Vec<Message>| async move {
            got1.lock().unwrap().extend(msgs.into_iter().map(|m| m.message_id));
            Ok::<(), String>(())
        })
        .await
        .unwrap();
    let ids = got.lock().unwrap().clone();
    ids
}

#[tokio::test]
async fn push_pull_ack_round_trip() {
    let (addr, _tx) = start_node().await;
    let client = Client::new(fast_options(&addr)).unwrap();

    let info = client.add_queue("orders").await.unwrap();
    assert_eq!(info.name, "orders");
    let err = client.add_queue("orders").await.unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(client.list_queues().await.unwrap().len(), 1);

    let mut queue = client.queue("orders", "").unwrap();
    assert!(matches!(queue.push_message("early").await, Err(ClientError::Unregistered)));
    let node = queue.apply_node().await.unwrap().to_string();
    assert_eq!(node, addr);
    assert_eq!(queue.serving_node(), Some(addr.as_str()));

    for i in 1..=3 {
        assert_eq!(queue.push_message(&format!("m{i}")).await.unwrap(), i);
    }

    assert_eq!(pull_ids(&queue).await, vec![1, 2]);
    wait_acks_settled(&client).await;
    assert_eq!(pull_ids(&queue).await, vec![3]);
    wait_acks_settled(&client).await;
    assert!(pull_ids(&queue).await.is_empty());

    let range = queue.apply_message_id_range(5).await.unwrap();
    assert_eq!((range.begin, range.end), (4, 8));

    client.remove_queue("orders").await.unwrap();
    assert!(client.list_queues().await.unwrap().is_empty());
    client.close().await;
}

#[tokio::test]
async fn failed_handler_is_not_acknowledged() {
    let (addr, _tx) = start_node().await;
    let client = Client::new(fast_options(&addr)).unwrap();
    client.add_queue("jobs").await.unwrap();
    let mut queue = client.queue("jobs", "workers").unwrap();
    queue.apply_node().await.unwrap();
    queue.push_message("a").await.unwrap();

    let r = queue.pull_message(|_| async { Err::<(), _>("boom") }).await;
    assert!(matches!(r, Err(ClientError::Handler(ref m)) if m == "boom"));
    assert_eq!(client.pending_acks(), 0);
    assert_eq!(pull_ids(&queue).await, vec![1]);
    assert!(queue.is_registered());
    client.close().await;
}

#[tokio::test]
async fn squads_consume_independently() {
    let (addr, _tx) = start_node().await;
    let client = Client::new(fast_options(&addr)).unwrap();
    client.add_queue("events").await.unwrap();

    let mut producer = client.queue("events", "").unwrap();
    producer.apply_node().await.unwrap();
    producer.push_message("e1").await.unwrap();

    let mut blue = client.queue("events", "blue").unwrap();
    let mut green = client.queue("events", "green").unwrap();
    blue.apply_node().await.unwrap();
    green.apply_node().await.unwrap();

    assert_eq!(pull_ids(&blue).await, vec![1]);
    wait_acks_settled(&client).await;
    assert!(pull_ids(&blue).await.is_empty());
    assert_eq!(pull_ids(&green).await, vec![1]);
    client.close().await;
}

#[tokio::test]
async fn wrong_credentials_fail_registration() {
    let (addr, _tx) = start_node().await;
    let client = Client::new(Options::new(&addr, "root", "wrong")).unwrap();
    let mut queue = client.queue("orders", "").unwrap();
    let err = queue.apply_node().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!queue.is_registered());
}

struct Fake {
    addr: String,
    token: String,
    range: (i64, i64),
    ack_failures: usize,
    acks: AtomicUsize,
}

fn fake(depot: &Depot) -> Arc<Fake> {
    depot.obtain::<Arc<Fake>>().cloned().unwrap()
}

#[handler]
async fn fake_apply_node(depot: &mut Depot, res: &mut Response) {
    let f = fake(depot);
    res.render(Json(json!({"code": 0, "message": "ok", "data": {"node": f.addr, "token": f.token}})));
}

#[handler]
async fn fake_message_id(depot: &mut Depot, res: &mut Response) {
    let f = fake(depot);
    res.render(Json(
        json!({"code": 0, "message": "ok", "data": {"message_id_begin": f.range.0, "message_id_end": f.range.1}}),
    ));
}

#[handler]
async fn fake_messages(res: &mut Response) {
    let data = json!({"messages": [{"message_id": 7, "content": "a"}, {"message_id": 8, "content": "b"}]});
    res.render(Json(json!({"code": 0, "message": "ok", "data": data})));
}

#[handler]
async fn fake_received(depot: &mut Depot, res: &mut Response) {
    let f = fake(depot);
    let n = f.acks.fetch_add(1, Ordering::SeqCst);
    if n < f.ack_failures {
        res.set_status_code(StatusCode::SERVICE_UNAVAILABLE);
        res.render(Json(json!({"code": 1500, "message": "unavailable", "data": null})));
    } else {
        res.render(Json(json!({"code": 0, "message": "ok", "data": {"updated": true}})));
    }
}

async fn start_fake(token: &str, range: (i64, i64), ack_failures: usize) -> Arc<Fake> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let state =
        Arc::new(Fake { addr, token: token.into(), range, ack_failures, acks: AtomicUsize::new(0) });
    let router = Router::new()
        .hoop(affix::inject(state.clone()))
        .push(Router::with_path("applyNode").post(fake_apply_node))
        .push(Router::with_path("messageID").post(fake_message_id))
        .push(Router::with_path("messages").post(fake_messages))
        .push(Router::with_path("receivedMessageID").post(fake_received));
    let incoming = AddrIncoming::from_listener(listener).unwrap();
    tokio::spawn(async move {
        Server::new(TcpListener::bind(incoming)).serve(router).await;
    });
    state
}

#[tokio::test]
async fn ack_retries_until_accepted() {
    let f = start_fake("t", (1, 1), 3).await;
    let client = Client::new(fast_options(&f.addr)).unwrap();
    let mut queue = client.queue("orders", "").unwrap();
    queue.apply_node().await.unwrap();

    assert_eq!(pull_ids(&queue).await, vec![7, 8]);
    wait_acks_settled(&client).await;
    assert_eq!(f.acks.load(Ordering::SeqCst), 4);
    client.close().await;
}

#[tokio::test]
async fn close_cancels_pending_acks() {
    let f = start_fake("t", (1, 1), usize::MAX).await;
    let client = Client::new(fast_options(&f.addr)).unwrap();
    let mut queue = client.queue("orders", "").unwrap();
    queue.apply_node().await.unwrap();

    pull_ids(&queue).await;
    pull_ids(&queue).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.pending_acks(), 2);
    assert!(f.acks.load(Ordering::SeqCst) >= 2);

    tokio::time::timeout(Duration::from_secs(2), client.close()).await.unwrap();
    assert_eq!(client.pending_acks(), 0);
}

#[tokio::test]
async fn broken_range_is_an_integrity_error() {
    let f = start_fake("t", (5, 3), 0).await;
    let client = Client::new(fast_options(&f.addr)).unwrap();
    let mut queue = client.queue("orders", "").unwrap();
    queue.apply_node().await.unwrap();

    assert!(matches!(queue.apply_message_id_range(1).await, Err(ClientError::BrokenRange { begin: 5, end: 3 })));
    assert!(matches!(queue.push_message("x").await, Err(ClientError::BrokenRange { .. })));
    assert!(queue.is_registered());
}

#[tokio::test]
async fn empty_token_is_a_registration_failure() {
    let f = start_fake("", (1, 1), 0).await;
    let client = Client::new(fast_options(&f.addr)).unwrap();
    let mut queue = client.queue("orders", "").unwrap();
    assert!(matches!(queue.apply_node().await, Err(ClientError::Registration(_))));
    assert!(!queue.is_registered());
}
