#[path = "../common/mod.rs"]
mod common;
use common::{FakeUpstream, TestClient, TestDomains, TestServerBuilder, UpstreamMode};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use relaydns_domain::{AnswerStatus, DomainError};
use std::time::Duration;

// ============================================================================
// Failover Tests
// ============================================================================

#[tokio::test]
async fn test_silent_primary_fails_over_to_secondary() {
    let silent = FakeUpstream::start(UpstreamMode::Silent).await.unwrap();
    let healthy = FakeUpstream::start(UpstreamMode::Answer {
        delay: Duration::ZERO,
    })
    .await
    .unwrap();

    let server = TestServerBuilder::new(vec![silent.addr(), healthy.addr()])
        .timeout(Duration::from_millis(200))
        .retries(1)
        .start()
        .expect("Failed to start server");

    let answer = server
        .client()
        .resolve_a(TestDomains::example())
        .await
        .unwrap();
    assert_eq!(answer.status, AnswerStatus::Ok);
    assert_eq!(silent.udp_queries(), 1);
    assert_eq!(healthy.udp_queries(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_all_upstreams_silent_is_servfail() {
    let first = FakeUpstream::start(UpstreamMode::Silent).await.unwrap();
    let second = FakeUpstream::start(UpstreamMode::Silent).await.unwrap();

    let server = TestServerBuilder::new(vec![first.addr(), second.addr()])
        .timeout(Duration::from_millis(150))
        .retries(2)
        .start()
        .expect("Failed to start server");

    let response = TestClient::new(server.addr())
        .query(TestDomains::example(), RecordType::A)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::ServFail);
    assert_eq!(first.udp_queries() + second.udp_queries(), 3);

    // Facade callers see the terminal status as an answer, not an error.
    let answer = server
        .client()
        .resolve_aaaa(TestDomains::example())
        .await
        .unwrap();
    assert_eq!(answer.status, AnswerStatus::Timeout);

    server.shutdown();
}

#[tokio::test]
async fn test_no_recursion_serves_refused_on_miss() {
    let upstream = FakeUpstream::start(UpstreamMode::Answer {
        delay: Duration::ZERO,
    })
    .await
    .unwrap();

    let server = TestServerBuilder::new(vec![upstream.addr()])
        .recursion_available(false)
        .start()
        .expect("Failed to start server");

    let response = TestClient::new(server.addr())
        .query(TestDomains::example(), RecordType::A)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::Refused);
    assert!(!response.recursion_available());
    assert_eq!(upstream.udp_queries(), 0);

    server.shutdown();
}

#[tokio::test]
async fn test_requests_after_shutdown_fail() {
    let upstream = FakeUpstream::start(UpstreamMode::Silent).await.unwrap();
    let server = TestServerBuilder::new(vec![upstream.addr()])
        .start()
        .expect("Failed to start server");

    let client = server.client().clone();
    server.shutdown();

    assert_eq!(
        client.resolve_a(TestDomains::example()).await,
        Err(DomainError::ClientShutdown)
    );
}
