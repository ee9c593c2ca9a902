//! Failover picks a different live candidate after the first one fails.

use std::time::Duration;

use lariat_client::balancer::RandomLoadBalancer;
use lariat_client::tolerant::{FailOverTolerantStrategy, TolerantContext, TolerantStrategy};
use lariat_client::transport::TcpClient;
use lariat_common::model::{RpcRequest, RpcResponse, ServiceMetaInfo};
use lariat_common::protocol::codec::{encode, read_message};
use lariat_common::protocol::{MessageBody, MessageStatus, ProtocolMessage};
use lariat_common::serialize::Serializer;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

#[tokio::test]
async fn failover_issues_the_second_call_against_a_different_candidate() {
    // live backend identifying itself in every reply
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live_addr = listener.local_addr().unwrap();
    let live = ServiceMetaInfo::new("com.x.Foo", "1.0", live_addr.ip().to_string(), live_addr.port());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = stream.into_split();
        while let Ok(message) = read_message(&mut reader).await {
            if matches!(message.body, MessageBody::Request(_)) {
                let reply = ProtocolMessage::response(
                    Serializer::Json,
                    message.header.request_id,
                    MessageStatus::Ok,
                    RpcResponse::success(json!("live")),
                );
                writer.write_all(&encode(&reply).unwrap()).await.unwrap();
            }
        }
    });

    // dead candidate on a port that was bound once and released
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let dead = ServiceMetaInfo::new("com.x.Foo", "1.0", "127.0.0.1", dead_port);

    let transport = TcpClient::new(Serializer::Json);
    let request = RpcRequest::new("com.x.Foo", "bar");

    // the primary attempt against the dead instance fails
    let error = transport
        .call(&request, &dead, Duration::from_millis(500))
        .await
        .unwrap_err();

    let balancer = RandomLoadBalancer;
    let candidates = vec![dead.clone(), live.clone()];
    let context = TolerantContext {
        request: &request,
        candidates: &candidates,
        failed: Some(&dead),
        transport: &transport,
        balancer: &balancer,
        timeout: Duration::from_secs(2),
    };

    let response = FailOverTolerantStrategy
        .tolerate(&context, error)
        .await
        .unwrap();
    assert_eq!(response.result, Some(json!("live")));
}
