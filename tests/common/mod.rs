//! Shared test harness: start a real coordinator on an ephemeral port and
//! speak its NDJSON wire protocol against it.

use std::time::Duration;

use serde_json::Value;
use taskfarm::{Config, ServerHandle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Start a coordinator bound to `127.0.0.1:0` with the log sink disabled
/// (zero connect attempts degrades it to stdout instantly, so tests never
/// wait on a nonexistent log viewer).
pub async fn start_server() -> ServerHandle {
    let mut config = Config::default();
    config.task_manager.interface = "127.0.0.1".to_string();
    config.task_manager.port = 0;
    config.cutelog_actions.retry_attempts = 0;
    taskfarm::serve(config).await.expect("test server should start")
}

pub async fn connect(addr: std::net::SocketAddr) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.expect("connect to test server");
    let (read, write) = stream.into_split();
    (BufReader::new(read), write)
}

pub async fn send_line(writer: &mut OwnedWriteHalf, value: &Value) {
    let mut bytes = serde_json::to_vec(value).expect("serialize test frame");
    bytes.push(b'\n');
    writer.write_all(&bytes).await.expect("write test frame");
}

/// Read one NDJSON line, or `None` on EOF.
pub async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<Value> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await.expect("read test frame");
    if n == 0 {
        return None;
    }
    Some(serde_json::from_str(line.trim_end()).expect("parse test frame as JSON"))
}

pub async fn with_timeout<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(RECV_TIMEOUT, fut)
        .await
        .expect("operation timed out")
}
