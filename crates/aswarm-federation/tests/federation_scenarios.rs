//! End-to-end federation scenarios between in-process clusters.

use std::sync::Arc;
use std::time::Duration;

use aswarm_federation::adapters::tcp::{self, FederationConnection};
use aswarm_federation::domain::codec;
use aswarm_federation::proto::federation_frame::Payload;
use aswarm_federation::proto::{Phase, SignatureType, SketchAttestation, Status};
use aswarm_federation::{
    CardinalitySketch, FederationApi, FederationConfig, FederationService, InMemorySketchStore,
    ManualClock, RequestFactory, RequestSigner, SketchConfig, StaticKeyring, TrustScore,
};
use chrono::{TimeZone, Utc};
use tokio::net::TcpListener;
use tokio::sync::watch;

const NOW: i64 = 1_700_000_040_000;
const SHARED: &[u8] = b"alpha-beta-psk";
const ALPHA_SEED: [u8; 32] = [0x11; 32];

type Beta = FederationService<InMemorySketchStore, StaticKeyring, ManualClock>;

struct Cluster {
    service: Arc<Beta>,
    store: Arc<InMemorySketchStore>,
    clock: Arc<ManualClock>,
}

/// Cluster `beta`, trusting `alpha` by HMAC and `gamma` by Ed25519.
fn beta() -> Cluster {
    let gamma_pub = RequestSigner::ed25519_from_seed(&ALPHA_SEED)
        .verifying_key_bytes()
        .unwrap();
    let keyring = StaticKeyring::new()
        .with_hmac_key("alpha", SHARED.to_vec())
        .with_ed25519_key("gamma", gamma_pub);
    let store = Arc::new(InMemorySketchStore::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let service = FederationService::new(
        FederationConfig::for_cluster("beta"),
        Arc::clone(&store),
        Arc::new(keyring),
        Arc::clone(&clock),
    )
    .unwrap();
    Cluster {
        service: Arc::new(service),
        store,
        clock,
    }
}

fn observed_iocs(range: std::ops::Range<u32>) -> SketchAttestation {
    let mut sketch = CardinalitySketch::new(SketchConfig::default()).unwrap();
    for i in range {
        sketch.add(format!("203.0.113.{}:{}", i % 255, i).as_bytes());
    }
    codec::pack(
        "ab-c2-beacon",
        "prod",
        SignatureType::Network,
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        chrono::Duration::minutes(10),
        &sketch,
        Phase::Staged,
    )
    .unwrap()
}

#[tokio::test]
async fn scenario_happy_path_alpha_to_beta() {
    let beta = beta();
    let alpha = RequestFactory::new(
        "alpha",
        RequestSigner::hmac(SHARED.to_vec()),
        Arc::clone(&beta.clock),
    );

    let request = alpha.share_sketch(observed_iocs(0..2_000), Phase::Staged).unwrap();
    let response = beta.service.share_sketch(request).await.unwrap();

    assert_eq!(response.status(), Status::Success);
    assert_eq!(beta.store.len(), 1);
    let reliability = beta.service.trust().get("alpha").unwrap().reliability;
    assert!((reliability - 0.51).abs() < 1e-9);
}

#[tokio::test]
async fn scenario_replay_attack() {
    let beta = beta();
    let alpha = RequestFactory::new(
        "alpha",
        RequestSigner::hmac(SHARED.to_vec()),
        Arc::clone(&beta.clock),
    );
    let request = alpha.share_sketch(observed_iocs(0..100), Phase::Staged).unwrap();

    let first = beta.service.share_sketch(request.clone()).await.unwrap();
    let second = beta.service.share_sketch(request).await.unwrap();

    assert_eq!(first.status(), Status::Success);
    assert_eq!(second.status(), Status::ReplayDetected);
    assert_eq!(beta.store.len(), 1);
}

#[tokio::test]
async fn scenario_untrusted_peer() {
    let beta = beta();
    beta.service.trust().set(
        "gamma",
        TrustScore {
            reliability: 0.2,
            response: 1.0,
            consensus: 1.0,
        },
    );
    let gamma = RequestFactory::new(
        "gamma",
        RequestSigner::ed25519_from_seed(&ALPHA_SEED),
        Arc::clone(&beta.clock),
    );

    let request = gamma.share_sketch(observed_iocs(0..100), Phase::Staged).unwrap();
    let response = beta.service.share_sketch(request).await.unwrap();

    assert_eq!(response.status(), Status::TrustBelowThreshold);
    assert!(beta.store.is_empty());
}

#[tokio::test]
async fn scenario_estimates_merge_across_shares() {
    let beta = beta();
    let alpha = RequestFactory::new(
        "alpha",
        RequestSigner::hmac(SHARED.to_vec()),
        Arc::clone(&beta.clock),
    );
    let gamma = RequestFactory::new(
        "gamma",
        RequestSigner::ed25519_from_seed(&ALPHA_SEED),
        Arc::clone(&beta.clock),
    );

    // Overlapping observations from two peers.
    let a = alpha.share_sketch(observed_iocs(0..3_000), Phase::Staged).unwrap();
    let g = gamma.share_sketch(observed_iocs(2_000..5_000), Phase::Staged).unwrap();
    assert_eq!(beta.service.share_sketch(a).await.unwrap().status(), Status::Success);
    assert_eq!(beta.service.share_sketch(g).await.unwrap().status(), Status::Success);

    beta.clock.advance(1);
    let request = alpha.request_sketch(0, 0).unwrap();
    let response = beta.service.request_sketch(request).await.unwrap();
    assert_eq!(response.sketches.len(), 2);

    let mut union = CardinalitySketch::new(SketchConfig::default()).unwrap();
    for attestation in &response.sketches {
        let sketch = codec::unpack(Some(attestation), &SketchConfig::default()).unwrap();
        union.merge(&sketch).unwrap();
    }
    let estimate = union.count() as f64;
    assert!((estimate - 5_000.0).abs() / 5_000.0 < 0.05, "estimate {}", estimate);
}

#[tokio::test]
async fn scenario_stream_over_loopback_tcp() {
    let beta = beta();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(tcp::serve(listener, Arc::clone(&beta.service), shutdown_rx));

    let alpha = RequestFactory::new(
        "alpha",
        RequestSigner::hmac(SHARED.to_vec()),
        Arc::clone(&beta.clock),
    );
    let mut conn = FederationConnection::connect(addr).await.unwrap();

    let share = alpha.share_sketch(observed_iocs(0..500), Phase::Staged).unwrap();
    conn.send(share.clone()).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(
        reply.payload,
        Some(Payload::ShareSketchResponse(ref r)) if r.status() == Status::Success
    ));

    conn.send(share).await.unwrap();
    let reply = conn.recv().await.unwrap().unwrap();
    assert!(matches!(
        reply.payload,
        Some(Payload::ShareSketchResponse(ref r)) if r.status() == Status::ReplayDetected
    ));

    conn.send(alpha.health_report().unwrap()).await.unwrap();
    let reply = conn.recv().await.unwrap().unwrap();
    match reply.payload {
        Some(Payload::HealthReportResponse(r)) => {
            assert_eq!(r.status(), Status::Success);
            assert_eq!(r.stats.unwrap().total_sketches, 1);
        }
        other => panic!("unexpected reply: {:?}", other),
    }

    conn.close().await.unwrap();
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(beta.store.len(), 1);
}
