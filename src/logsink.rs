//! The log sink: one-way framed forwarding to an external log viewer.
//!
//! Grounded in `taskManager_2_logger.py`: on startup, try to connect to
//! the viewer up to `attempts` times (one per second); if it never comes
//! up, degrade permanently to local stdout for the rest of the process's
//! life (spec.md §4.7 -- "no further reconnect attempts in this version").
//! Frame format is a 4-byte big-endian length prefix followed by the UTF-8
//! JSON payload (spec.md §6).

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

enum SinkState {
    Connected(OwnedWriteHalf),
    Degraded,
}

/// Outbound connection (or degraded fallback) to the log viewer.
pub struct LogSink {
    state: Mutex<SinkState>,
}

impl LogSink {
    /// Attempt to connect to `host:port`, retrying once per second up to
    /// `attempts` times; falls back to stdout logging if all attempts fail.
    pub async fn connect(host: &str, port: u16, attempts: u32) -> Self {
        for attempt in 0..attempts {
            match TcpStream::connect((host, port)).await {
                Ok(stream) => {
                    info!(attempt, host, port, "connected to log viewer");
                    let (_read_half, write_half) = stream.into_split();
                    return Self {
                        state: Mutex::new(SinkState::Connected(write_half)),
                    };
                }
                Err(e) => {
                    debug!(attempt, host, port, error = %e, "log viewer not reachable yet");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
        warn!(host, port, attempts, "log viewer unreachable, degrading to stdout");
        Self {
            state: Mutex::new(SinkState::Degraded),
        }
    }

    /// A sink that never attempts a connection -- used in tests and
    /// wherever the log viewer is intentionally disabled.
    pub fn degraded() -> Self {
        Self {
            state: Mutex::new(SinkState::Degraded),
        }
    }

    /// Forward `value` to the viewer as-is, with no added envelope
    /// (used for decorated monitor records and relayed worker output,
    /// which already carry their own fields).
    pub async fn send_raw(&self, value: Value) {
        self.send(value).await;
    }

    /// `logInfo(msg, name)`: wrap `msg` with `{time, level: "info", name}`
    /// and forward it.
    pub async fn info(&self, msg: impl Serialize, name: Option<&str>) {
        self.send(envelope("info", msg, name)).await;
    }

    /// `logDebug(msg, name)`: wrap `msg` with `{time, level: "debug", name}`
    /// and forward it.
    pub async fn debug(&self, msg: impl Serialize, name: Option<&str>) {
        self.send(envelope("debug", msg, name)).await;
    }

    async fn send(&self, value: Value) {
        let bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize log record");
                return;
            }
        };

        let mut state = self.state.lock().await;
        match &mut *state {
            SinkState::Degraded => print_locally(&value),
            SinkState::Connected(writer) => {
                let len = (bytes.len() as u32).to_be_bytes();
                if writer.write_all(&len).await.is_err() || writer.write_all(&bytes).await.is_err()
                {
                    warn!("log viewer connection lost, degrading to stdout for remaining logs");
                    print_locally(&value);
                    *state = SinkState::Degraded;
                }
            }
        }
    }

    /// Close the outbound connection (used on graceful shutdown).
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let SinkState::Connected(writer) = &mut *state {
            let _ = writer.shutdown().await;
        }
        *state = SinkState::Degraded;
    }
}

fn envelope(level: &str, msg: impl Serialize, name: Option<&str>) -> Value {
    let value = serde_json::to_value(msg).unwrap_or(Value::Null);
    let mut obj = match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("msg".to_string(), other);
            map
        }
    };
    obj.insert("time".to_string(), json!(now_seconds()));
    obj.insert("level".to_string(), json!(level));
    obj.insert(
        "name".to_string(),
        json!(match name {
            Some(n) => format!("taskManager.{n}"),
            None => "taskManager".to_string(),
        }),
    );
    Value::Object(obj)
}

fn now_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn print_locally(value: &Value) {
    match serde_json::to_string(value) {
        Ok(text) => println!(">>>>>>>>>>>>>>>>>>>>>>>\n{text}\n<<<<<<<<<<<<<<<<<<<<<<<"),
        Err(_) => println!("{value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn degraded_sink_does_not_panic() {
        let sink = LogSink::degraded();
        sink.info("hello", None).await;
        sink.debug(json!({"a": 1}), Some("monitor")).await;
        sink.send_raw(json!({"raw": true})).await;
    }

    #[test]
    fn envelope_wraps_string_msg() {
        let value = envelope("info", "hello", None);
        assert_eq!(value["msg"], "hello");
        assert_eq!(value["level"], "info");
        assert_eq!(value["name"], "taskManager");
    }

    #[test]
    fn envelope_wraps_object_msg_and_names_subcomponent() {
        let value = envelope("debug", json!({"a": 1}), Some("dispatcher"));
        assert_eq!(value["a"], 1);
        assert_eq!(value["name"], "taskManager.dispatcher");
    }
}
