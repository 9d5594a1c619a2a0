//! Integration test for spec.md §8 scenario 6: the `workerQuery` snapshot.

mod common;

use serde_json::json;

use common::{connect, read_line, send_line, start_server, with_timeout};

#[tokio::test]
async fn query_reflects_registered_monitors_and_workers() {
    let handle = start_server().await;
    let addr = handle.local_addr;

    let (_mon1_r, mut mon1_w) = connect(addr).await;
    send_line(
        &mut mon1_w,
        &json!({"type": "monitor", "host": "A", "platform": "linux", "cpuType": "x86_64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon1_w, &json!({"numCpus": 4, "wlOne": 0.4, "scale": 1.0})).await;

    let (_mon2_r, mut mon2_w) = connect(addr).await;
    send_line(
        &mut mon2_w,
        &json!({"type": "monitor", "host": "B", "platform": "linux", "cpuType": "aarch64", "maxLoad": 1.0}),
    )
    .await;
    send_line(&mut mon2_w, &json!({"numCpus": 4, "wlOne": 0.4, "scale": 1.0})).await;

    let (_worker_r, mut worker_w) = connect(addr).await;
    send_line(
        &mut worker_w,
        &json!({"type": "worker", "taskType": "build", "host": "A", "availableTools": ["gcc"]}),
    )
    .await;

    // Give the monitor/worker handlers a moment to land their registrations.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (mut client_r, mut client_w) = connect(addr).await;
    send_line(&mut client_w, &json!({"type": "workerQuery"})).await;
    let reply = with_timeout(read_line(&mut client_r)).await.expect("query reply");

    assert_eq!(reply["type"], "workerQuery");
    assert_eq!(reply["workers"], json!(["build"]));
    assert_eq!(reply["hostTypes"]["linux-x86_64"], json!(["build"]));
    assert_eq!(reply["hostTypes"]["linux-aarch64"], json!([]));
    assert_eq!(reply["tools"]["gcc"], json!(["build"]));
    assert!(reply["hostLoads"]["A"].as_f64().unwrap() > 0.0);
}
