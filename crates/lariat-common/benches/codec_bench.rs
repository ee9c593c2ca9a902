// Criterion benchmarks for the lariat wire codec
//
// Run with:
//   cargo bench -p lariat-common

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lariat_common::model::{RpcRequest, RpcResponse};
use lariat_common::protocol::codec::{decode, encode};
use lariat_common::protocol::{MessageStatus, ProtocolMessage};
use lariat_common::serialize::Serializer;
use serde_json::json;

fn request_message() -> ProtocolMessage {
    let request = RpcRequest::new("com.demo.Greeter", "hello").with_parameters(
        vec!["string".into(), "object".into()],
        vec![json!("world"), json!({"tags": [1, 2, 3], "nested": {"a": true}})],
    );
    ProtocolMessage::request(Serializer::Json, 123_456_789, request)
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_encode");

    let request = request_message();
    group.bench_function("request", |b| {
        b.iter(|| encode(black_box(&request)).unwrap());
    });

    let response = ProtocolMessage::response(
        Serializer::Json,
        123_456_789,
        MessageStatus::Ok,
        RpcResponse::success(json!({"result": [1.0, 2.0, 3.0]})),
    );
    group.bench_function("response", |b| {
        b.iter(|| encode(black_box(&response)).unwrap());
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_decode");

    let bytes = encode(&request_message()).unwrap();
    group.bench_function("request", |b| {
        b.iter(|| decode(black_box(&bytes)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
