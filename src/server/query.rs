//! Query handler (spec.md §4.4): a one-shot fleet-state snapshot.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::{debug, warn};

use crate::Context;

pub async fn handle(mut writer: OwnedWriteHalf, ctx: Arc<Context>) {
    ctx.metrics.record_query_connection();
    let reply = ctx.registry.snapshot_for_query();

    match serde_json::to_vec(&reply) {
        Ok(mut bytes) => {
            bytes.push(b'\n');
            if let Err(e) = writer.write_all(&bytes).await {
                debug!(error = %e, "failed writing query reply");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize query reply"),
    }
    let _ = writer.shutdown().await;
}
