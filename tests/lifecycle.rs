//! End-to-end startup and shutdown tests for the log node.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::time;

use log_node::admin::TreeAdminService;
use log_node::directory::MemoryDirectory;
use log_node::gc::FixedInterval;
use log_node::net::{ListenerError, ListenerKind};
use log_node::rpc::{RegistrationError, RpcTransport};
use log_node::storage::{AdminStorage, MemoryStorageProvider, Tree, TreeType};
use log_node::{Node, NodeError, NodePhase, Registry, Shutdown};

mod common;

use common::{deps, test_config, wait_for_phase, CountingBinder, HangingProbe, RecordingDirectory, StaticProbe};

fn failing_registrar(_: &mut RpcTransport, _: &Registry) -> Result<(), RegistrationError> {
    Err("service refused to register".into())
}

#[tokio::test]
async fn unhealthy_probe_binds_nothing() {
    let binder = Arc::new(CountingBinder::default());
    let directory = RecordingDirectory::new();
    let node = Node::new(
        test_config(),
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(directory.clone())),
        TreeAdminService,
    )
    .with_probe(Arc::new(StaticProbe(false)))
    .with_binder(binder.clone());
    let state = node.state();

    let err = node.run(Shutdown::new().subscribe()).await.unwrap_err();

    assert!(matches!(err, NodeError::Unhealthy(_)));
    assert!(err.is_fatal_startup());
    assert_eq!(binder.binds(), 0);
    assert!(directory.events().is_empty());
    assert_eq!(state.borrow().phase, NodePhase::Failed);
}

#[tokio::test]
async fn hanging_probe_times_out_without_binding() {
    let binder = Arc::new(CountingBinder::default());
    let node = Node::new(
        test_config(),
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(RecordingDirectory::new())),
        TreeAdminService,
    )
    .with_probe(Arc::new(HangingProbe))
    .with_binder(binder.clone());

    let result = time::timeout(Duration::from_secs(5), node.run(Shutdown::new().subscribe()))
        .await
        .expect("health gate must not hang");

    assert!(matches!(result, Err(NodeError::Unhealthy(_))));
    assert_eq!(binder.binds(), 0);
}

#[tokio::test]
async fn registration_failure_withdraws_announcements() {
    let storage = Arc::new(MemoryStorageProvider::new());
    let directory = RecordingDirectory::new();
    let node = Node::new(
        test_config(),
        deps(storage.clone(), Arc::new(directory.clone())),
        failing_registrar,
    )
    .with_probe(Arc::new(StaticProbe(true)));
    let state = node.state();

    let err = node.run(Shutdown::new().subscribe()).await.unwrap_err();

    assert!(matches!(err, NodeError::Registration(_)));
    assert_eq!(
        directory.events(),
        vec![
            "announce log-server",
            "announce log-server-http",
            "deregister log-server-http open=true",
            "deregister log-server open=true",
        ]
    );

    let rpc_addr = state.borrow().rpc_addr.expect("rpc was bound");
    assert!(TcpStream::connect(rpc_addr).await.is_err());
    assert_eq!(state.borrow().phase, NodePhase::Failed);
    assert!(storage.admin().check_database_accessible().await.is_err());
}

#[tokio::test]
async fn deregisters_before_closing_listeners() {
    let directory = RecordingDirectory::new();
    let node = Node::new(
        test_config(),
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(directory.clone())),
        TreeAdminService,
    )
    .with_probe(Arc::new(StaticProbe(true)));
    let mut state = node.state();
    let shutdown = Shutdown::new();
    let running = tokio::spawn(node.run(shutdown.subscribe()));

    let serving = wait_for_phase(&mut state, NodePhase::Serving).await;
    let rpc_addr = serving.rpc_addr.unwrap();
    let http_addr = serving.http_addr.unwrap();

    shutdown.trigger();
    running.await.unwrap().unwrap();

    assert_eq!(
        directory.events(),
        vec![
            "announce log-server",
            "announce log-server-http",
            "deregister log-server-http open=true",
            "deregister log-server open=true",
        ]
    );
    assert!(TcpStream::connect(rpc_addr).await.is_err());
    assert!(TcpStream::connect(http_addr).await.is_err());
    assert_eq!(state.borrow().phase, NodePhase::Stopped);
}

#[tokio::test]
async fn empty_http_endpoint_still_serves_rpc() {
    let mut config = test_config();
    config.http.endpoint = String::new();
    let directory = MemoryDirectory::new();
    let node = Node::new(
        config,
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(directory.clone())),
        TreeAdminService,
    )
    .with_probe(Arc::new(StaticProbe(true)));
    let mut state = node.state();
    let shutdown = Shutdown::new();
    let running = tokio::spawn(node.run(shutdown.subscribe()));

    let serving = wait_for_phase(&mut state, NodePhase::Serving).await;
    assert!(serving.http_addr.is_none());
    let rpc_addr = serving.rpc_addr.unwrap();
    assert_eq!(directory.addresses("log-server"), vec![rpc_addr.to_string()]);
    assert!(directory.addresses("log-server-http").is_empty());

    let status = reqwest::get(format!("http://{rpc_addr}/v1/trees"))
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::OK);

    shutdown.trigger();
    running.await.unwrap().unwrap();
    assert!(directory.addresses("log-server").is_empty());
}

#[tokio::test]
async fn http_bind_failure_is_degraded() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = test_config();
    config.http.endpoint = occupied.local_addr().unwrap().to_string();
    let directory = RecordingDirectory::new();
    let node = Node::new(
        config,
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(directory.clone())),
        TreeAdminService,
    )
    .with_probe(Arc::new(StaticProbe(true)));
    let mut state = node.state();
    let shutdown = Shutdown::new();
    let running = tokio::spawn(node.run(shutdown.subscribe()));

    let serving = wait_for_phase(&mut state, NodePhase::Serving).await;
    assert!(serving.http_addr.is_none());
    assert_eq!(directory.events(), vec!["announce log-server"]);

    shutdown.trigger();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn zero_sweep_interval_is_rejected_before_binding() {
    let mut config = test_config();
    config.tree_gc.enabled = true;
    config.tree_gc.min_run_interval_secs = 0;
    let binder = Arc::new(CountingBinder::default());
    let directory = RecordingDirectory::new();
    let node = Node::new(
        config,
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(directory.clone())),
        TreeAdminService,
    )
    .with_probe(Arc::new(StaticProbe(true)))
    .with_binder(binder.clone());
    let state = node.state();
    let gc_status = node.gc_status();

    let err = node.run(Shutdown::new().subscribe()).await.unwrap_err();

    assert!(matches!(err, NodeError::Config(_)));
    assert!(err.is_fatal_startup());
    assert_eq!(binder.binds(), 0);
    assert!(directory.events().is_empty());
    assert!(gc_status.last().is_none());
    assert_eq!(state.borrow().phase, NodePhase::Failed);
}

#[tokio::test]
async fn rpc_bind_failure_is_fatal() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = test_config();
    config.rpc.endpoint = occupied.local_addr().unwrap().to_string();
    let directory = RecordingDirectory::new();
    let node = Node::new(
        config,
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(directory.clone())),
        TreeAdminService,
    )
    .with_probe(Arc::new(StaticProbe(true)));

    let err = node.run(Shutdown::new().subscribe()).await.unwrap_err();

    assert!(matches!(
        err,
        NodeError::Listener(ListenerError::Bind { kind: ListenerKind::Rpc, .. })
    ));
    assert!(err.is_fatal_startup());
    assert!(directory.events().is_empty());
}

#[tokio::test]
async fn unreachable_directory_is_fatal() {
    let node = Node::new(
        test_config(),
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(RecordingDirectory::unreachable())),
        TreeAdminService,
    )
    .with_probe(Arc::new(StaticProbe(true)));
    let state = node.state();

    let err = node.run(Shutdown::new().subscribe()).await.unwrap_err();

    assert!(matches!(err, NodeError::Announce { .. }));
    let rpc_addr = state.borrow().rpc_addr.expect("rpc was bound");
    assert!(TcpStream::connect(rpc_addr).await.is_err());
}

#[tokio::test]
async fn serves_admin_and_health_endpoints() {
    let node = Node::new(
        test_config(),
        deps(Arc::new(MemoryStorageProvider::new()), Arc::new(MemoryDirectory::new())),
        TreeAdminService,
    );
    let mut state = node.state();
    let shutdown = Shutdown::new();
    let running = tokio::spawn(node.run(shutdown.subscribe()));

    let serving = wait_for_phase(&mut state, NodePhase::Serving).await;
    let rpc = format!("http://{}", serving.rpc_addr.unwrap());
    let http = format!("http://{}", serving.http_addr.unwrap());
    let client = reqwest::Client::new();

    let health = client.get(format!("{http}/healthz")).send().await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "ok");

    let created = client
        .post(format!("{rpc}/v1/trees"))
        .json(&serde_json::json!({ "tree_type": "LOG", "display_name": "ct-log" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);

    let rejected = client
        .post(format!("{rpc}/v1/trees"))
        .json(&serde_json::json!({ "tree_type": "MAP" }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);

    let vars: serde_json::Value = client
        .get(format!("{http}/debug/vars"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(vars["health"]["state"], "healthy");

    // Admin routes live on the RPC transport only.
    let misrouted = client.get(format!("{http}/v1/trees")).send().await.unwrap();
    assert_eq!(misrouted.status(), reqwest::StatusCode::NOT_FOUND);

    shutdown.trigger();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn gc_purges_expired_trees_while_serving() {
    let storage = Arc::new(MemoryStorageProvider::new());
    storage.admin().insert_tree(Tree {
        tree_id: 42,
        tree_type: TreeType::Log,
        display_name: "expired".into(),
        create_time: UNIX_EPOCH,
        delete_time: Some(UNIX_EPOCH),
    });

    let mut config = test_config();
    config.tree_gc.enabled = true;
    config.tree_gc.delete_threshold_secs = 60;
    config.tree_gc.min_run_interval_secs = 1;
    let node = Node::new(config, deps(storage.clone(), Arc::new(MemoryDirectory::new())), TreeAdminService)
        .with_probe(Arc::new(StaticProbe(true)))
        .with_intervals(Box::new(FixedInterval));
    let gc_status = node.gc_status();
    let shutdown = Shutdown::new();
    let running = tokio::spawn(node.run(shutdown.subscribe()));

    time::timeout(Duration::from_secs(5), async {
        while gc_status.last().is_none() {
            time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("a sweep should have run");

    assert_eq!(gc_status.last().unwrap().trees_deleted, 1);
    assert!(storage.admin().get_tree(42).await.is_err());

    shutdown.trigger();
    running.await.unwrap().unwrap();
}
