mod common;

use beacon_rpc::{CoordStore, MemStore, MsgpCodec, RpcChannel, RpcController};
use common::*;
use rstest::rstest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[rstest]
#[case("alice", "pw", true, "")]
#[case("bob", "wrong", false, "bad password")]
fn test_login_remote(
    #[case] name: &str, #[case] pwd: &str, #[case] success: bool, #[case] err: &str,
) {
    setup_log();
    let store = Arc::new(MemStore::new());
    let _provider = start_provider(&store, 0, 0);

    let channel = RpcChannel::<MsgpCodec, _>::new(store);
    let mut controller = RpcController::new();
    let response = login(&channel, &mut controller, name, pwd);
    assert!(!controller.failed(), "unexpected failure: {}", controller.error_text());
    assert_eq!(response.success, success);
    assert_eq!(response.err, err);
}

#[test]
fn test_done_callback_runs_on_success_only() {
    setup_log();
    let store = Arc::new(MemStore::new());
    let _provider = start_provider(&store, 0, 0);
    let channel = RpcChannel::<MsgpCodec, _>::new(store);

    let descriptor = user_descriptor();
    let ran = Arc::new(AtomicBool::new(false));
    let ran2 = ran.clone();
    let mut controller = RpcController::new();
    let request = LoginRequest { name: "alice".to_string(), pwd: "pw".to_string() };
    let mut response = LoginResponse::default();
    channel.call_method(
        descriptor.method("Login").unwrap(),
        &mut controller,
        &request,
        &mut response,
        Some(Box::new(move || {
            ran2.store(true, Ordering::SeqCst);
        })),
    );
    assert!(!controller.failed());
    // done ran synchronously, before call_method returned
    assert!(ran.load(Ordering::SeqCst));

    // an unknown method must not run done
    let ran = Arc::new(AtomicBool::new(false));
    let ran2 = ran.clone();
    let mut controller = RpcController::new();
    channel.call_method(
        descriptor.method("Logout").unwrap(),
        &mut controller,
        &request,
        &mut response,
        Some(Box::new(move || {
            ran2.store(true, Ordering::SeqCst);
        })),
    );
    assert!(controller.failed());
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_unknown_method_closes_connection() {
    setup_log();
    let store = Arc::new(MemStore::new());
    let _provider = start_provider(&store, 0, 0);
    let channel = RpcChannel::<MsgpCodec, _>::new(store.clone());

    // Announce Logout by hand at the same endpoint: the provider never
    // registered it, so the failure below is the server-side lookup, not
    // endpoint resolution.
    let endpoint = store.get_data("/User/Login");
    assert!(!endpoint.is_empty());
    store.create("/User/Logout", endpoint.as_bytes(), true).expect("announce logout");

    let descriptor = user_descriptor();
    let mut controller = RpcController::new();
    let request = LoginRequest { name: "alice".to_string(), pwd: "pw".to_string() };
    let mut response = LoginResponse::default();
    channel.call_method(
        descriptor.method("Logout").unwrap(),
        &mut controller,
        &request,
        &mut response,
        None,
    );
    assert!(controller.failed());
    assert!(controller.error_text().contains("recv error"), "got {}", controller.error_text());
    // the failed connection was evicted
    assert_eq!(channel.pooled_connections(), 0);
}

#[test]
fn test_recv_timeout() {
    setup_log();
    let store = Arc::new(MemStore::new());
    let _provider = start_provider(&store, 0, 0);
    let channel = RpcChannel::<MsgpCodec, _>::new(store);

    let descriptor = sleep_descriptor();
    let mut controller = RpcController::new();
    controller.set_timeout_ms(500);
    let request = NapRequest { ms: 2000 };
    let mut response = NapResponse::default();
    let start = Instant::now();
    channel.call_method(
        descriptor.method("Nap").unwrap(),
        &mut controller,
        &request,
        &mut response,
        None,
    );
    let elapsed = start.elapsed();
    assert!(controller.failed());
    assert_eq!(controller.error_text(), "recv timeout!");
    assert!(elapsed >= Duration::from_millis(500), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "elapsed {:?}", elapsed);
    assert_eq!(channel.pooled_connections(), 0);
}

#[test]
fn test_connection_reuse() {
    setup_log();
    let store = Arc::new(MemStore::new());
    let _provider = start_provider(&store, 0, 0);
    let channel = RpcChannel::<MsgpCodec, _>::new(store);

    let mut controller = RpcController::new();
    assert!(login(&channel, &mut controller, "alice", "pw").success);
    assert_eq!(channel.pooled_connections(), 1);
    controller.reset();
    assert!(login(&channel, &mut controller, "alice", "pw").success);
    // back-to-back calls share one pooled connection
    assert_eq!(channel.pooled_connections(), 1);
}

#[test]
fn test_stale_connection_after_server_restart() {
    setup_log();
    let store = Arc::new(MemStore::new());
    let provider = start_provider(&store, 0, 0);
    let port = provider.local_addr().port();
    let channel = RpcChannel::<MsgpCodec, _>::new(store.clone());

    let mut controller = RpcController::new();
    assert!(login(&channel, &mut controller, "alice", "pw").success);
    assert_eq!(channel.pooled_connections(), 1);

    provider.shutdown();
    // same port, so the announced endpoint stays valid
    let _provider2 = start_provider(&store, 0, port);

    // the pooled connection is stale: this call fails and evicts it
    controller.reset();
    let _ = login(&channel, &mut controller, "alice", "pw");
    assert!(controller.failed(), "stale call should fail");
    assert!(controller.error_text().contains("error"), "got {}", controller.error_text());
    assert_eq!(channel.pooled_connections(), 0);

    // the next call dials the restarted server
    controller.reset();
    assert!(login(&channel, &mut controller, "alice", "pw").success);
    assert_eq!(channel.pooled_connections(), 1);
}

#[test]
fn test_large_response_roundtrips() {
    setup_log();
    let store = Arc::new(MemStore::new());
    let _provider = start_provider(&store, 0, 0);
    let channel = RpcChannel::<MsgpCodec, _>::new(store);

    // well past the historical 64 KiB single-read ceiling
    let size: u32 = 200 * 1024;
    let descriptor = blob_descriptor();
    let mut controller = RpcController::new();
    let request = FetchRequest { size };
    let mut response = FetchResponse::default();
    channel.call_method(
        descriptor.method("Fetch").unwrap(),
        &mut controller,
        &request,
        &mut response,
        None,
    );
    assert!(!controller.failed(), "unexpected failure: {}", controller.error_text());
    assert_eq!(response.data.len(), size as usize);
    assert!(response.data.iter().all(|b| *b == 0xAB));
}

#[test]
fn test_concurrent_callers_share_channel() {
    setup_log();
    let store = Arc::new(MemStore::new());
    let _provider = start_provider(&store, 4, 0);
    let channel = Arc::new(RpcChannel::<MsgpCodec, _>::new(store));

    let mut joins = Vec::new();
    for i in 0..8 {
        let channel = channel.clone();
        joins.push(std::thread::spawn(move || {
            let mut controller = RpcController::new();
            let response = login(&channel, &mut controller, &format!("caller-{}", i), "pw");
            assert!(!controller.failed(), "caller {} failed: {}", i, controller.error_text());
            assert!(response.success);
        }));
    }
    for join in joins {
        join.join().expect("caller thread");
    }
    // one endpoint: at most one connection survives in the pool
    assert!(channel.pooled_connections() <= 1);
}
