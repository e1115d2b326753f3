use hickory_server::proto::op::{Message, Query, ResponseCode};
use hickory_server::proto::rr::{Name, RData, Record, RecordType};
use hickory_server::ServerFuture;
use sieve_dns::config::{Config, QueryLogType};
use sieve_dns::querylog::{LogEntry, QueryLogWriter};
use sieve_dns::resolver::{
    ChainedResolver, QueryLoggingResolver, Request, Resolver, Response, ResponseType,
};
use sieve_dns::server::{self, DnsHandler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

struct MockResolver {
    fail: AtomicBool,
}

#[async_trait::async_trait]
impl Resolver for MockResolver {
    async fn resolve(&self, request: &Request) -> anyhow::Result<Response> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("no upstream"));
        }
        let name = request.message.queries()[0].name().clone();
        let mut message = Message::new();
        message.add_answer(Record::from_rdata(
            name,
            60,
            RData::A("1.2.3.4".parse().unwrap()),
        ));
        Ok(Response {
            message,
            reason: "mock".to_string(),
            response_type: ResponseType::Resolved,
        })
    }

    fn configuration(&self) -> Vec<String> {
        Vec::new()
    }
}

struct RecordingWriter {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

#[async_trait::async_trait]
impl QueryLogWriter for RecordingWriter {
    async fn write(&mut self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }

    async fn clean_up(&mut self) {}
}

async fn query(client: &UdpSocket, id: u16) -> Message {
    let mut query_msg = Message::new();
    query_msg.add_query(Query::query(
        Name::from_ascii("example.com.").unwrap(),
        RecordType::A,
    ));
    query_msg.set_id(id);
    client.send(&query_msg.to_vec().unwrap()).await.unwrap();

    let mut buf = [0u8; 512];
    let (len, _) = client.recv_from(&mut buf).await.unwrap();
    Message::from_vec(&buf[..len]).unwrap()
}

#[tokio::test]
async fn test_queries_are_answered_and_logged() {
    let mut config = Config::default();
    config
        .client_names
        .insert("127.0.0.1".to_string(), vec!["localhost".to_string()]);

    let entries = Arc::new(Mutex::new(Vec::new()));
    let upstream = Arc::new(MockResolver {
        fail: AtomicBool::new(false),
    });
    let mut chain = QueryLoggingResolver::with_writer(
        config.query_log.clone(),
        QueryLogType::Console,
        Box::new(RecordingWriter {
            entries: entries.clone(),
        }),
    );
    chain.set_next(upstream.clone());

    let handler = DnsHandler::new(&config, Arc::new(chain));

    let mut server = ServerFuture::new(handler);
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    server.register_socket(socket);
    tokio::spawn(async move {
        let _ = server.block_until_done().await;
    });

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();

    let resp = query(&client, 1234).await;
    assert_eq!(resp.id(), 1234);
    assert_eq!(resp.response_code(), ResponseCode::NoError);
    assert_eq!(resp.answers().len(), 1);

    // Chain errors surface as SERVFAIL and are still logged.
    upstream.fail.store(true, Ordering::SeqCst);
    let resp = query(&client, 5678).await;
    assert_eq!(resp.id(), 5678);
    assert_eq!(resp.response_code(), ResponseCode::ServFail);
    assert!(resp.answers().is_empty());

    let mut logged = 0;
    for _ in 0..20 {
        logged = entries.lock().unwrap().len();
        if logged >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(logged, 2);

    let entries = entries.lock().unwrap();
    assert_eq!(entries[0].client_ip, "127.0.0.1");
    assert_eq!(entries[0].client_names, vec!["localhost".to_string()]);
    assert_eq!(entries[0].response_reason, "mock");
    assert_eq!(entries[0].answers_string(), "A (1.2.3.4)");
    assert_eq!(entries[1].response_type, ResponseType::Failed);
}

#[tokio::test]
async fn test_serve_until_shutdown() {
    // Grab a free port, then hand it to the server.
    let addr = UdpSocket::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let config = Config::default();
    let mut chain = QueryLoggingResolver::with_writer(
        config.query_log.clone(),
        QueryLogType::Console,
        Box::new(RecordingWriter {
            entries: Arc::new(Mutex::new(Vec::new())),
        }),
    );
    chain.set_next(Arc::new(MockResolver {
        fail: AtomicBool::new(false),
    }));
    let handler = DnsHandler::new(&config, Arc::new(chain));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server::serve(handler, addr, async move {
        let _ = stop_rx.await;
    }));

    // Give the server a moment to bind.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();
    let resp = tokio::time::timeout(Duration::from_secs(3), query(&client, 42))
        .await
        .unwrap();
    assert_eq!(resp.id(), 42);
    assert_eq!(resp.response_code(), ResponseCode::NoError);

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(3), serving)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
