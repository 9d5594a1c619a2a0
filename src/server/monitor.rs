//! Monitor handler (spec.md §4.2): a stream of per-host load records.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use crate::protocol::{platform_tag, MonitorHello, MonitorRecord};
use crate::Context;

pub async fn handle(
    mut reader: BufReader<OwnedReadHalf>,
    _writer: OwnedWriteHalf,
    addr: SocketAddr,
    hello: Value,
    ctx: Arc<Context>,
) {
    ctx.metrics.record_monitor_connection();
    let hello: MonitorHello = match serde_json::from_value(hello) {
        Ok(h) => h,
        Err(e) => {
            debug!(error = %e, %addr, "malformed monitor hello");
            return;
        }
    };

    let platform = platform_tag(&hello.platform, &hello.cpu_type);
    ctx.registry.register_monitor(&platform, &hello.host, hello.max_load);
    info!(host = %hello.host, platform = %platform, %addr, "monitor connected");

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, host = %hello.host, "monitor read error");
                break;
            }
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        let record: MonitorRecord = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, host = %hello.host, "malformed monitor record");
                continue;
            }
        };

        let scaled = record.wl_one / (f64::from(record.num_cpus) * record.scale);
        ctx.registry.update_host_load(&hello.host, scaled);

        let decorated = match serde_json::to_value(&record) {
            Ok(Value::Object(mut map)) => {
                map.insert("name".to_string(), json!("monitor"));
                map.insert("level".to_string(), json!("debug"));
                map.insert("scaled".to_string(), json!(scaled));
                map.insert("host".to_string(), json!(hello.host));
                Value::Object(map)
            }
            _ => continue,
        };
        ctx.log_sink.send_raw(decorated).await;
    }

    ctx.registry.remove_monitor(&platform, &hello.host);
    info!(host = %hello.host, platform = %platform, "monitor disconnected");
}
