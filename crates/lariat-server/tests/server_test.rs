//! Server role behavior over a real socket: dispatch, failure capture,
//! heartbeats and per-request concurrency.

use std::sync::Arc;
use std::time::Duration;

use lariat_client::transport::TcpClient;
use lariat_common::error::RpcError;
use lariat_common::model::{RpcRequest, ServiceMetaInfo};
use lariat_common::serialize::Serializer;
use lariat_server::service::{FnInvoker, LocalServiceTable, ServiceInvoker};
use lariat_server::server::TcpServer;
use serde_json::json;

async fn start_server() -> ServiceMetaInfo {
    let invoker: Arc<dyn ServiceInvoker> = Arc::new(
        FnInvoker::new()
            .method("add", |params| async move {
                let a = params[0].as_i64().unwrap_or(0);
                let b = params[1].as_i64().unwrap_or(0);
                Ok(json!(a + b))
            })
            .method("boom", |_params| async move {
                Err(RpcError::RemoteExecution("the method blew up".into()))
            })
            .method("slow", |_params| async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(json!("slow"))
            }),
    );

    let table = Arc::new(LocalServiceTable::new());
    table.register("com.x.Calc", invoker).await;

    let server = TcpServer::bind("127.0.0.1:0", table).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    ServiceMetaInfo::new("com.x.Calc", "1.0", addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn request_is_dispatched_and_answered() {
    let meta = start_server().await;
    let client = TcpClient::new(Serializer::Json);

    let request = RpcRequest::new("com.x.Calc", "add")
        .with_parameters(vec!["number".into(), "number".into()], vec![json!(19), json!(23)]);
    let response = client
        .call(&request, &meta, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.result, Some(json!(42)));
    assert_eq!(response.result_type.as_deref(), Some("number"));
}

#[tokio::test]
async fn unregistered_service_comes_back_as_an_exception() {
    let meta = start_server().await;
    let client = TcpClient::new(Serializer::Json);

    let request = RpcRequest::new("com.x.Nowhere", "anything");
    let response = client
        .call(&request, &meta, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(!response.is_success());
    let exception = response.exception.unwrap();
    assert!(exception.contains("not registered"), "got: {exception}");
}

#[tokio::test]
async fn handler_failure_is_captured_and_the_connection_survives() {
    let meta = start_server().await;
    let client = TcpClient::new(Serializer::Json);

    let boom = RpcRequest::new("com.x.Calc", "boom");
    let response = client
        .call(&boom, &meta, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(!response.is_success());
    assert!(response.exception.unwrap().contains("blew up"));

    // the same connection keeps serving
    let add = RpcRequest::new("com.x.Calc", "add")
        .with_parameters(vec!["number".into(), "number".into()], vec![json!(1), json!(2)]);
    let response = client.call(&add, &meta, Duration::from_secs(2)).await.unwrap();
    assert_eq!(response.result, Some(json!(3)));
}

#[tokio::test]
async fn heartbeat_is_echoed() {
    let meta = start_server().await;
    let client = TcpClient::new(Serializer::Json);

    client.ping(&meta, Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn a_slow_method_does_not_block_a_fast_one_behind_it() {
    let meta = start_server().await;
    let client = Arc::new(TcpClient::new(Serializer::Json));

    let slow_client = client.clone();
    let slow_meta = meta.clone();
    let slow = tokio::spawn(async move {
        let request = RpcRequest::new("com.x.Calc", "slow");
        slow_client
            .call(&request, &slow_meta, Duration::from_secs(2))
            .await
            .unwrap()
    });

    // issued after the slow one, on the same pooled connection
    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = std::time::Instant::now();
    let add = RpcRequest::new("com.x.Calc", "add")
        .with_parameters(vec!["number".into(), "number".into()], vec![json!(2), json!(2)]);
    let response = client.call(&add, &meta, Duration::from_secs(2)).await.unwrap();
    assert_eq!(response.result, Some(json!(4)));
    assert!(
        started.elapsed() < Duration::from_millis(250),
        "fast call waited {:?} behind the slow one",
        started.elapsed()
    );

    assert_eq!(slow.await.unwrap().result, Some(json!("slow")));
}
