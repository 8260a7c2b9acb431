// /////////////////////////////////////////////////////////////////////////////
// TailPost
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end tests driving the real `AgentSupervisor`/`BatchingSender`
//! against a `wiremock` sink and real files, plus the quantified properties
//! those scenarios are instances of.
//!
//! TailPost has no subcommands to invoke from the outside as a CLI binary —
//! it's a single long-running process — so these tests drive the production
//! types in-process instead, against a mock HTTP sink and real temp files.

mod common;

use std::io::Write as _;
use std::time::Duration;

use chrono::Utc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tailpost::infrastructure::auth::AuthAttacher;
use tailpost::infrastructure::crypto::PayloadCipher;
use tailpost::infrastructure::sender::BatchingSender;
use tailpost::infrastructure::tls::TlsContext;
use tailpost_domain::config::{RawAgentConfig, RawSecurity, TlsSettings};
use tailpost_domain::{Config, KeyMaterial, LogLine, SourceKind};

fn line(content: &str) -> LogLine {
    LogLine::new(content, "test", Utc::now())
}

fn disabled_tls() -> TlsContext {
    TlsContext::build(&TlsSettings::default()).unwrap()
}

async fn bodies_as_json(server: &MockServer) -> Vec<Vec<String>> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// --- E1: file tailing smoke test --------------------------------------------

#[tokio::test]
async fn e1_file_tailing_smoke_test() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let file = tempfile::NamedTempFile::new().unwrap();
    let config = common::base_config(server.uri(), SourceKind::File {
        path: file.path().to_str().unwrap().to_string(),
    });

    let (_addr, coordinator, handle) = common::spawn_ready_supervisor(config, Duration::from_secs(2)).await;

    let mut f = file.reopen().unwrap();
    writeln!(f, "hello").unwrap();

    // Poll for the POST to land instead of sleeping a fixed guess.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if !server.received_requests().await.unwrap().is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no request received in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers.get("content-type").unwrap(), "application/json");
    let body: Vec<String> = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body, vec!["hello".to_string()]);

    coordinator.initiate_shutdown();
    handle.await.unwrap().unwrap();
}

// --- E2: batching by size ----------------------------------------------------

#[tokio::test]
async fn e2_batching_by_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tls = disabled_tls();
    let mut sender = BatchingSender::new(
        server.uri(),
        3,
        Duration::from_secs(5),
        "test".to_string(),
        &tls,
        None,
        AuthAttacher::None,
        common::noop_metrics(),
        common::noop_tracer(),
    )
    .unwrap();
    sender.start();

    for c in ["a", "b", "c", "d", "e"] {
        sender.send(line(c)).await;
    }

    // The third line fills the batch and flushes it immediately.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        if server.received_requests().await.unwrap().len() >= 1 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    sender.stop().await;

    let bodies = bodies_as_json(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], vec!["a", "b", "c"]);
    assert_eq!(bodies[1], vec!["d", "e"]);
}

// --- E3: encryption headers --------------------------------------------------

#[tokio::test]
async fn e3_encryption_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tls = disabled_tls();
    let key = KeyMaterial::new([9u8; 32], "k7");
    let cipher = PayloadCipher::aes256gcm(&key).unwrap();

    let mut sender = BatchingSender::new(
        server.uri(),
        1,
        Duration::from_secs(5),
        "test".to_string(),
        &tls,
        Some(cipher),
        AuthAttacher::None,
        common::noop_metrics(),
        common::noop_tracer(),
    )
    .unwrap();
    sender.start();
    sender.send(line("secret")).await;
    sender.stop().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.headers.get("content-type").unwrap(), "application/octet-stream");
    assert_eq!(req.headers.get("x-encrypted").unwrap(), "true");
    assert_eq!(req.headers.get("x-key-id").unwrap(), "k7");

    let plaintext_json = serde_json::to_vec(&["secret"]).unwrap();
    assert!(req.body.len() >= 12 /* nonce */ + plaintext_json.len() + 16 /* AEAD tag */);
}

// --- E4: basic auth ------------------------------------------------------------

#[tokio::test]
async fn e4_basic_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tls = disabled_tls();
    let auth = AuthAttacher::Basic {
        user: "u".to_string(),
        pass: "p".to_string(),
    };
    let mut sender = BatchingSender::new(
        server.uri(),
        1,
        Duration::from_secs(5),
        "test".to_string(),
        &tls,
        None,
        auth,
        common::noop_metrics(),
        common::noop_tracer(),
    )
    .unwrap();
    sender.start();
    sender.send(line("x")).await;
    sender.stop().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers.get("authorization").unwrap(), "Basic dTpw");
}

// --- E5: readiness lifecycle ---------------------------------------------------

#[tokio::test]
async fn e5_readiness_lifecycle() {
    let file = tempfile::NamedTempFile::new().unwrap();
    // Port 1 is reserved and refuses connections on every platform CI runs on.
    let config = common::base_config("http://127.0.0.1:1", SourceKind::File {
        path: file.path().to_str().unwrap().to_string(),
    });
    let health_addr = common::free_local_addr();

    let supervisor = tailpost::supervisor::AgentSupervisor::new(
        config,
        common::noop_metrics(),
        common::noop_tracer(),
        common::unused_orchestrator(),
    );
    let grace = Duration::from_secs(5);
    let coordinator = tailpost_bootstrap::shutdown::ShutdownCoordinator::new(grace);
    let token = coordinator.token();
    let handle = tokio::spawn(async move { supervisor.run(health_addr, token, grace).await });

    let client = reqwest::Client::new();
    // The health listener itself may not be bound yet; a connection error
    // counts as "not ready" for this assertion.
    let immediately_ready = client
        .get(format!("http://{health_addr}/ready"))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false);
    assert!(!immediately_ready, "agent reported ready before startup finished");

    common::wait_until_ready(health_addr, Duration::from_secs(2)).await;

    let saw_not_ready = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let poller = {
        let saw_not_ready = saw_not_ready.clone();
        let client = client.clone();
        tokio::spawn(async move {
            for _ in 0..40 {
                match client.get(format!("http://{health_addr}/ready")).send().await {
                    Ok(resp) if resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE => {
                        saw_not_ready.store(true, std::sync::atomic::Ordering::SeqCst);
                    }
                    Err(_) => break, // listener closed, shutdown finished
                    _ => {}
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    };

    coordinator.initiate_shutdown();
    handle.await.unwrap().unwrap();
    let _ = poller.await;

    assert!(
        saw_not_ready.load(std::sync::atomic::Ordering::SeqCst),
        "never observed /ready go back to 503 during shutdown"
    );
}

// --- E6: file rotation -----------------------------------------------------

#[tokio::test]
async fn e6_file_rotation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("app.log");
    let rotated_path = dir.path().join("app.log.1");
    std::fs::write(&log_path, b"").unwrap();

    let config = common::base_config(server.uri(), SourceKind::File {
        path: log_path.to_str().unwrap().to_string(),
    });
    let (_addr, coordinator, handle) = common::spawn_ready_supervisor(config, Duration::from_secs(2)).await;

    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(f, "L1").unwrap();
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if server.received_requests().await.unwrap().len() >= 1 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "L1 never arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    std::fs::rename(&log_path, &rotated_path).unwrap();
    std::fs::write(&log_path, b"").unwrap();
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(f, "L2").unwrap();
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        if server.received_requests().await.unwrap().len() >= 2 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "L2 never arrived after rotation");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    coordinator.initiate_shutdown();
    handle.await.unwrap().unwrap();

    let bodies = bodies_as_json(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], vec!["L1".to_string()]);
    assert_eq!(bodies[1], vec!["L2".to_string()]);
}

// --- Quantified properties beyond what's already unit-tested alongside
// BatchingSender/crypto/auth/config/health themselves ----------------------

#[tokio::test]
async fn property_ordering_preserved_across_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tls = disabled_tls();
    let mut sender = BatchingSender::new(
        server.uri(),
        2,
        Duration::from_secs(5),
        "test".to_string(),
        &tls,
        None,
        AuthAttacher::None,
        common::noop_metrics(),
        common::noop_tracer(),
    )
    .unwrap();
    sender.start();

    let input: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    for c in &input {
        sender.send(line(c)).await;
    }
    sender.stop().await;

    let observed: Vec<String> = bodies_as_json(&server).await.into_iter().flatten().collect();
    assert_eq!(observed, input);
}

#[tokio::test]
async fn property_batch_never_exceeds_configured_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tls = disabled_tls();
    let mut sender = BatchingSender::new(
        server.uri(),
        4,
        Duration::from_secs(5),
        "test".to_string(),
        &tls,
        None,
        AuthAttacher::None,
        common::noop_metrics(),
        common::noop_tracer(),
    )
    .unwrap();
    sender.start();
    for i in 0..13 {
        sender.send(line(&i.to_string())).await;
    }
    sender.stop().await;

    for body in bodies_as_json(&server).await {
        assert!(body.len() <= 4);
    }
}

#[tokio::test]
async fn property_latency_bound_single_line_flushes_by_interval() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tls = disabled_tls();
    let flush_interval = Duration::from_millis(150);
    let mut sender = BatchingSender::new(
        server.uri(),
        10, // large enough that only the timer, not the size bound, can flush
        flush_interval,
        "test".to_string(),
        &tls,
        None,
        AuthAttacher::None,
        common::noop_metrics(),
        common::noop_tracer(),
    )
    .unwrap();
    sender.start();

    let started = tokio::time::Instant::now();
    sender.send(line("only-one")).await;

    let deadline = started + flush_interval + Duration::from_millis(100);
    loop {
        if !server.received_requests().await.unwrap().is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "flush did not occur within the latency bound");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    sender.stop().await;
}

#[tokio::test]
async fn property_shutdown_drains_pending_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tls = disabled_tls();
    let mut sender = BatchingSender::new(
        server.uri(),
        10,
        Duration::from_secs(30), // long enough that only stop() can flush
        "test".to_string(),
        &tls,
        None,
        AuthAttacher::None,
        common::noop_metrics(),
        common::noop_tracer(),
    )
    .unwrap();
    sender.start();
    sender.send(line("drain-me")).await;
    sender.stop().await; // must return only after the pending batch is flushed

    let bodies = bodies_as_json(&server).await;
    assert_eq!(bodies, vec![vec!["drain-me".to_string()]]);
}

#[tokio::test]
async fn property_nonpositive_config_coerces_and_still_delivers_quickly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let file = tempfile::NamedTempFile::new().unwrap();
    let raw = RawAgentConfig {
        server_url: server.uri(),
        batch_size: 0,
        flush_interval_secs: -1.0,
        log_source_type: "file".to_string(),
        log_path: Some(file.path().to_str().unwrap().to_string()),
        namespace: None,
        pod_name: None,
        container_name: None,
        windows_event_log_name: None,
        windows_event_log_level: None,
        macos_log_query: None,
        security: RawSecurity::default(),
    };
    let config = Config::from_raw(raw).unwrap();
    assert_eq!(config.batch_size, 1);
    assert_eq!(config.flush_interval, Duration::from_secs(1));

    let (_addr, coordinator, handle) = common::spawn_ready_supervisor(config, Duration::from_secs(2)).await;

    let mut f = file.reopen().unwrap();
    writeln!(f, "fast").unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if !server.received_requests().await.unwrap().is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "coerced config never delivered within 2s");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    coordinator.initiate_shutdown();
    handle.await.unwrap().unwrap();
}
