use std::net::SocketAddr;
use std::sync::RwLock;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep, timeout};

use super::*;
use crate::relay::{RelayServer, Registry};
use crate::{db, store};

const CHAT: &str = "private_@alice_@bob";

struct RecordingUi {
    current: RwLock<Option<String>>,
    seen: mpsc::UnboundedSender<Message>,
}

impl ChatUi for RecordingUi {
    fn current_chat(&self) -> Option<String> {
        self.current.read().unwrap().clone()
    }

    fn message_arrived(&self, message: &Message) {
        let _ = self.seen.send(message.clone());
    }
}

fn recording_ui(current: Option<&str>) -> (Arc<RecordingUi>, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ui = Arc::new(RecordingUi {
        current: RwLock::new(current.map(str::to_owned)),
        seen: tx,
    });
    (ui, rx)
}

async fn start_relay() -> (SocketAddr, Arc<Registry>) {
    let server = RelayServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(server.run());
    (addr, registry)
}

async fn join(addr: SocketAddr, user_id: &str) -> BufReader<tokio::net::TcpStream> {
    let mut stream = BufReader::new(tokio::net::TcpStream::connect(addr).await.unwrap());
    stream
        .write_all(wire::handshake_line(user_id).as_bytes())
        .await
        .unwrap();
    stream
}

async fn wait_for_peers(registry: &Registry, n: usize) {
    timeout(Duration::from_secs(2), async {
        while registry.len().await != n {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry never reached the expected size");
}

fn alice_envelope() -> Envelope {
    Envelope {
        chat_id: CHAT.to_owned(),
        sender: "@alice".to_owned(),
        text: "hi".to_owned(),
        time: "10:00".to_owned(),
    }
}

#[tokio::test]
async fn incoming_message_is_persisted_and_notified() {
    let (addr, registry) = start_relay().await;
    let pool = db::memory().await.unwrap();
    let (ui, mut seen) = recording_ui(Some(CHAT));

    let agent = SyncAgent::new("@bob", pool.clone(), ui);
    agent.connect(&addr.to_string()).await.unwrap();
    let mut alice = join(addr, "@alice").await;
    wait_for_peers(&registry, 2).await;

    alice
        .write_all(wire::encode(&alice_envelope()).unwrap().as_bytes())
        .await
        .unwrap();

    let notified = timeout(Duration::from_secs(2), seen.recv())
        .await
        .expect("ui was never notified")
        .unwrap();
    assert_eq!(notified.sender, "@alice");
    assert_eq!(notified.text, "hi");
    assert!(!notified.is_read);

    let stored = store::messages::for_chat(&pool, CHAT).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, notified.id);
    assert_eq!(stored[0].sender, "@alice");
    assert_eq!(stored[0].text, "hi");
    assert_eq!(stored[0].time, "10:00");
}

#[tokio::test]
async fn background_chat_is_persisted_but_not_notified() {
    let (addr, registry) = start_relay().await;
    let pool = db::memory().await.unwrap();
    let (ui, mut seen) = recording_ui(Some("group_somewhere_else"));

    let agent = SyncAgent::new("@bob", pool.clone(), ui);
    agent.connect(&addr.to_string()).await.unwrap();
    let mut alice = join(addr, "@alice").await;
    wait_for_peers(&registry, 2).await;

    alice
        .write_all(wire::encode(&alice_envelope()).unwrap().as_bytes())
        .await
        .unwrap();

    timeout(Duration::from_secs(2), async {
        while store::messages::for_chat(&pool, CHAT).await.unwrap().is_empty() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message never reached the store");

    assert!(seen.try_recv().is_err());
}

#[tokio::test]
async fn offline_send_is_persisted_locally() {
    let pool = db::memory().await.unwrap();
    let (ui, _seen) = recording_ui(None);

    let agent = SyncAgent::new("@bob", pool.clone(), ui);
    assert!(!agent.is_connected().await);

    let id = agent.send(CHAT, "hello from the void").await.unwrap();
    let stored = store::messages::for_chat(&pool, CHAT).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].sender, "@bob");
    assert!(stored[0].is_read);
}

#[tokio::test]
async fn send_reaches_the_other_peer() {
    let (addr, registry) = start_relay().await;
    let pool = db::memory().await.unwrap();
    let (ui, _seen) = recording_ui(None);

    let agent = SyncAgent::new("@bob", pool.clone(), ui);
    agent.connect(&addr.to_string()).await.unwrap();
    assert!(agent.is_connected().await);
    let mut alice = join(addr, "@alice").await;
    wait_for_peers(&registry, 2).await;

    agent.send(CHAT, "hi alice").await.unwrap();

    let mut line = String::new();
    timeout(Duration::from_secs(2), alice.read_line(&mut line))
        .await
        .expect("nothing relayed")
        .unwrap();
    let envelope = wire::decode(line.trim_end()).unwrap();
    assert_eq!(envelope.sender, "@bob");
    assert_eq!(envelope.chat_id, CHAT);
    assert_eq!(envelope.text, "hi alice");
    assert!(!envelope.time.is_empty());
}

#[tokio::test]
async fn store_failure_does_not_kill_the_receive_loop() {
    let (addr, registry) = start_relay().await;
    let pool = db::memory().await.unwrap();
    let (ui, _seen) = recording_ui(None);

    let agent = SyncAgent::new("@bob", pool.clone(), ui);
    agent.connect(&addr.to_string()).await.unwrap();
    let mut alice = join(addr, "@alice").await;
    wait_for_peers(&registry, 2).await;

    sqlx::query("DROP TABLE messages").execute(&pool).await.unwrap();
    let mut dropped = alice_envelope();
    dropped.text = "lost".to_owned();
    alice
        .write_all(wire::encode(&dropped).unwrap().as_bytes())
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;
    db::init_schema(&pool).await.unwrap();

    let mut kept = alice_envelope();
    kept.text = "kept".to_owned();
    alice
        .write_all(wire::encode(&kept).unwrap().as_bytes())
        .await
        .unwrap();

    timeout(Duration::from_secs(2), async {
        while store::messages::for_chat(&pool, CHAT).await.unwrap().is_empty() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("receive loop died after the store failure");

    let stored = store::messages::for_chat(&pool, CHAT).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "kept");
    assert!(agent.is_connected().await);
}

#[tokio::test]
async fn close_goes_offline_but_sends_still_persist() {
    let (addr, registry) = start_relay().await;
    let pool = db::memory().await.unwrap();
    let (ui, _seen) = recording_ui(None);

    let agent = SyncAgent::new("@bob", pool.clone(), ui);
    agent.connect(&addr.to_string()).await.unwrap();
    wait_for_peers(&registry, 1).await;

    agent.close().await;
    assert!(!agent.is_connected().await);

    let id = agent.send(CHAT, "offline now").await.unwrap();
    assert!(id > 0);
    assert_eq!(store::messages::for_chat(&pool, CHAT).await.unwrap().len(), 1);
}
