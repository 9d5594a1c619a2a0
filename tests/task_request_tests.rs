//! Integration tests for spec.md §8 scenarios 1-5: round-trip dispatch,
//! admission gating, least-loaded selection, dead-worker retry, and the
//! unspecified-platform fan-out race.

mod common;

use serde_json::json;
use tokio::time::{sleep, Duration};

use common::{connect, read_line, send_line, with_timeout, start_server};

#[tokio::test]
async fn round_trip_success() {
    let handle = start_server().await;
    let addr = handle.local_addr;

    let (_mon_r, mut mon_w) = connect(addr).await;
    send_line(
        &mut mon_w,
        &json!({"type": "monitor", "host": "A", "platform": "linux", "cpuType": "x86_64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon_w, &json!({"numCpus": 4, "wlOne": 0.4, "scale": 1.0})).await;

    let (mut worker_r, mut worker_w) = connect(addr).await;
    send_line(&mut worker_w, &json!({"type": "worker", "taskType": "build", "host": "A"})).await;

    let worker_task = tokio::spawn(async move {
        // Receives the forwarded hello frame verbatim, then replies with a
        // terminal record.
        let forwarded = with_timeout(read_line(&mut worker_r)).await.expect("forwarded hello");
        assert_eq!(forwarded["taskName"], "build-task");
        send_line(&mut worker_w, &json!({"returncode": 0, "msg": "done"})).await;
    });

    let (mut client_r, mut client_w) = connect(addr).await;
    send_line(
        &mut client_w,
        &json!({
            "type": "taskRequest",
            "taskName": "build-task",
            "workers": ["build"],
            "requiredPlatform": "linux-x86_64",
            "actions": [["echo", "ok"]],
        }),
    )
    .await;

    let reply = with_timeout(read_line(&mut client_r)).await.expect("client reply");
    assert_eq!(reply["returncode"], 0);

    worker_task.await.unwrap();
}

#[tokio::test]
async fn admission_blocks_on_overload() {
    let handle = start_server().await;
    let addr = handle.local_addr;

    let (_mon_r, mut mon_w) = connect(addr).await;
    send_line(
        &mut mon_w,
        &json!({"type": "monitor", "host": "A", "platform": "linux", "cpuType": "x86_64", "maxLoad": 1.0}),
    )
    .await;
    // wlOne/numCpus/scale => HostLoad == 1.0, not < maxLoad.
    send_line(&mut mon_w, &json!({"numCpus": 4, "wlOne": 4.0, "scale": 1.0})).await;

    let (_worker_r, mut worker_w) = connect(addr).await;
    send_line(&mut worker_w, &json!({"type": "worker", "taskType": "build", "host": "A"})).await;

    let (mut client_r, mut client_w) = connect(addr).await;
    send_line(
        &mut client_w,
        &json!({
            "type": "taskRequest",
            "taskName": "overload-task",
            "workers": ["build"],
            "requiredPlatform": "linux-x86_64",
        }),
    )
    .await;

    // No release should happen while the host is at/above maxLoad.
    let premature =
        tokio::time::timeout(Duration::from_millis(300), read_line(&mut client_r)).await;
    assert!(premature.is_err(), "task request must not be admitted while host is overloaded");

    // Reporting a lower load should let the dispatcher fire on its next scan.
    send_line(&mut mon_w, &json!({"numCpus": 4, "wlOne": 0.4, "scale": 1.0})).await;

    // The worker side consumes the forwarded hello and replies, proving
    // the request was admitted and dispatched once load dropped.
    let mut worker_r = _worker_r;
    let forwarded = with_timeout(read_line(&mut worker_r)).await.expect("forwarded hello");
    assert_eq!(forwarded["taskName"], "overload-task");
}

#[tokio::test]
async fn least_loaded_selection_prefers_lighter_host() {
    let handle = start_server().await;
    let addr = handle.local_addr;

    let (_mon_r, mut mon_w) = connect(addr).await;
    send_line(
        &mut mon_w,
        &json!({"type": "monitor", "host": "A", "platform": "linux", "cpuType": "x86_64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon_w, &json!({"numCpus": 4, "wlOne": 0.8, "scale": 1.0})).await; // HostLoad[A] = 0.2

    let (_mon2_r, mut mon2_w) = connect(addr).await;
    send_line(
        &mut mon2_w,
        &json!({"type": "monitor", "host": "B", "platform": "linux", "cpuType": "x86_64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon2_w, &json!({"numCpus": 4, "wlOne": 0.4, "scale": 1.0})).await; // HostLoad[B] = 0.1

    let (_a_r, mut a_w) = connect(addr).await;
    send_line(&mut a_w, &json!({"type": "worker", "taskType": "build", "host": "A"})).await;
    let (mut b_r, mut b_w) = connect(addr).await;
    send_line(&mut b_w, &json!({"type": "worker", "taskType": "build", "host": "B"})).await;

    let worker_task = tokio::spawn(async move {
        let forwarded = with_timeout(read_line(&mut b_r)).await.expect("B should receive the task");
        assert_eq!(forwarded["taskName"], "pick-lightest");
        send_line(&mut b_w, &json!({"returncode": 0})).await;
    });

    let (mut client_r, mut client_w) = connect(addr).await;
    send_line(
        &mut client_w,
        &json!({
            "type": "taskRequest",
            "taskName": "pick-lightest",
            "workers": ["build"],
            "requiredPlatform": "linux-x86_64",
        }),
    )
    .await;
    with_timeout(read_line(&mut client_r)).await.expect("client reply");
    worker_task.await.unwrap();
}

#[tokio::test]
async fn worker_death_while_parked_triggers_retry() {
    let handle = start_server().await;
    let addr = handle.local_addr;

    let (_mon_r, mut mon_w) = connect(addr).await;
    send_line(
        &mut mon_w,
        &json!({"type": "monitor", "host": "A", "platform": "linux", "cpuType": "x86_64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon_w, &json!({"numCpus": 4, "wlOne": 0.1, "scale": 1.0})).await;

    {
        let (_dead_r, dead_w) = connect(addr).await;
        let mut dead_w = dead_w;
        send_line(&mut dead_w, &json!({"type": "worker", "taskType": "build", "host": "A"})).await;
        // Dropping both halves closes the connection while it sits parked.
    }
    sleep(Duration::from_millis(100)).await;

    let (mut client_r, mut client_w) = connect(addr).await;
    send_line(
        &mut client_w,
        &json!({
            "type": "taskRequest",
            "taskName": "orphaned",
            "workers": ["build"],
            "requiredPlatform": "linux-x86_64",
        }),
    )
    .await;

    // No live worker remains, so the client connection closes without a reply.
    let result = with_timeout(read_line(&mut client_r)).await;
    assert!(result.is_none(), "client should observe EOF when no worker survives selection");
}

#[tokio::test]
async fn unspecified_platform_fans_out_and_fires_exactly_once() {
    let handle = start_server().await;
    let addr = handle.local_addr;

    let (_mon_x86_r, mut mon_x86_w) = connect(addr).await;
    send_line(
        &mut mon_x86_w,
        &json!({"type": "monitor", "host": "A", "platform": "linux", "cpuType": "x86_64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon_x86_w, &json!({"numCpus": 4, "wlOne": 0.1, "scale": 1.0})).await;

    let (_mon_arm_r, mut mon_arm_w) = connect(addr).await;
    send_line(
        &mut mon_arm_w,
        &json!({"type": "monitor", "host": "B", "platform": "linux", "cpuType": "aarch64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon_arm_w, &json!({"numCpus": 4, "wlOne": 0.1, "scale": 1.0})).await;

    let (mut a_r, mut a_w) = connect(addr).await;
    send_line(&mut a_w, &json!({"type": "worker", "taskType": "build", "host": "A"})).await;

    let worker_task = tokio::spawn(async move {
        let forwarded = with_timeout(read_line(&mut a_r)).await.expect("forwarded hello");
        assert_eq!(forwarded["taskName"], "any-platform");
        send_line(&mut a_w, &json!({"returncode": 0})).await;
    });

    let (mut client_r, mut client_w) = connect(addr).await;
    send_line(
        &mut client_w,
        &json!({"type": "taskRequest", "taskName": "any-platform", "workers": ["build"]}),
    )
    .await;
    with_timeout(read_line(&mut client_r)).await.expect("client reply");
    worker_task.await.unwrap();
}
