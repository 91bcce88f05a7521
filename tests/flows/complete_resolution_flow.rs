#[path = "../common/mod.rs"]
mod common;
use common::{FakeUpstream, TestClient, TestDomains, TestServer, UpstreamMode};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{RData, RecordType};
use relaydns_domain::AnswerStatus;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

fn first_a(message: &Message) -> Option<Ipv4Addr> {
    message.answers().iter().find_map(|r| match r.data() {
        RData::A(a) => Some(a.0),
        _ => None,
    })
}

async fn answering_upstream() -> FakeUpstream {
    FakeUpstream::start(UpstreamMode::Answer {
        delay: Duration::ZERO,
    })
    .await
    .expect("Failed to start upstream")
}

// ============================================================================
// Server round trips
// ============================================================================

#[tokio::test]
async fn test_udp_miss_then_cache_hit() {
    let upstream = answering_upstream().await;
    let server = TestServer::start(upstream.addr()).expect("Failed to start server");
    let client = TestClient::new(server.addr());

    for _ in 0..2 {
        let response = client.query(TestDomains::example(), RecordType::A).await.unwrap();
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert_eq!(first_a(&response), Some(TestDomains::example_ip()));
        assert_eq!(response.answers().len(), 1);
        assert!(response.name_servers().is_empty());
        assert!(response.additionals().is_empty());
    }

    assert_eq!(upstream.udp_queries(), 1);
    server.shutdown();
}

#[tokio::test]
async fn test_nxdomain_flow() {
    let upstream = answering_upstream().await;
    let server = TestServer::start(upstream.addr()).expect("Failed to start server");
    let client = TestClient::new(server.addr());

    let response = client.query(TestDomains::missing(), RecordType::A).await.unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);

    // Negative answers are cached too.
    let response = client.query(TestDomains::missing(), RecordType::A).await.unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert_eq!(upstream.udp_queries(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_large_answer_truncated_over_udp_complete_over_tcp() {
    let upstream = FakeUpstream::start(UpstreamMode::TruncateUdp)
        .await
        .expect("Failed to start upstream");
    let server = TestServer::start(upstream.addr()).expect("Failed to start server");
    let client = TestClient::new(server.addr());

    // Upstream truncates over UDP: the engine comes back over TCP once.
    let udp = client.query(TestDomains::large(), RecordType::A).await.unwrap();
    assert!(udp.truncated());
    assert!(udp.answers().is_empty());
    assert_eq!(upstream.udp_queries(), 1);
    assert_eq!(upstream.tcp_queries(), 1);

    // Client retries over TCP and is served from the cache.
    let tcp = client.query_tcp(TestDomains::large(), RecordType::A).await.unwrap();
    assert!(!tcp.truncated());
    assert_eq!(tcp.answers().len(), TestDomains::large_record_count());
    assert_eq!(upstream.tcp_queries(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_concurrent_clients_share_one_upstream_query() {
    let upstream = FakeUpstream::start(UpstreamMode::Answer {
        delay: Duration::from_millis(200),
    })
    .await
    .expect("Failed to start upstream");
    let server = TestServer::start(upstream.addr()).expect("Failed to start server");
    let addr = server.addr();

    let queries: Vec<_> = (0..8)
        .map(|_| {
            tokio::spawn(async move {
                TestClient::new(addr)
                    .query(TestDomains::example(), RecordType::A)
                    .await
            })
        })
        .collect();

    for query in queries {
        let response = query.await.unwrap().unwrap();
        assert_eq!(first_a(&response), Some(TestDomains::example_ip()));
    }
    assert_eq!(upstream.udp_queries(), 1);

    server.shutdown();
}

// ============================================================================
// Client facade next to the server
// ============================================================================

#[tokio::test]
async fn test_facade_warms_cache_for_wire_clients() {
    let upstream = answering_upstream().await;
    let server = TestServer::start(upstream.addr()).expect("Failed to start server");

    let answer = server
        .client()
        .resolve_a(TestDomains::example())
        .await
        .unwrap();
    assert_eq!(answer.status, AnswerStatus::Ok);
    assert_eq!(
        answer.addresses(),
        vec![IpAddr::V4(TestDomains::example_ip())]
    );

    let response = TestClient::new(server.addr())
        .query(TestDomains::example(), RecordType::A)
        .await
        .unwrap();
    assert_eq!(first_a(&response), Some(TestDomains::example_ip()));
    assert_eq!(upstream.udp_queries(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_facade_nodata_for_missing_type() {
    let upstream = answering_upstream().await;
    let server = TestServer::start(upstream.addr()).expect("Failed to start server");

    let answer = server
        .client()
        .resolve_mx(TestDomains::example())
        .await
        .unwrap();
    assert_eq!(answer.status, AnswerStatus::NoData);
    assert!(answer.records.is_empty());

    server.shutdown();
}
