//! End-to-end scrapes through the router with a fake control plane.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use stacklimit_common::{ExporterError, Result};
use stacklimit_exporter::{ExporterState, exporter_router};
use stacklimit_openstack::{
    CloudConfFile, ConnectionConfig, Connector, Identity, KeystoneConnector, LimitReport,
    LimitSource, LimitValue, StaticConfig,
};
use tower::ServiceExt;

#[derive(Clone)]
enum Outcome {
    Report(LimitReport),
    Fail(fn() -> ExporterError),
}

impl Outcome {
    fn resolve(&self) -> Result<LimitReport> {
        match self {
            Self::Report(report) => Ok(report.clone()),
            Self::Fail(make) => Err(make()),
        }
    }
}

struct FakeSource {
    compute: Outcome,
    volume: Outcome,
    volume_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LimitSource for FakeSource {
    async fn compute_limits(&self) -> Result<LimitReport> {
        self.compute.resolve()
    }

    async fn volume_limits(&self) -> Result<LimitReport> {
        self.volume_calls.fetch_add(1, Ordering::SeqCst);
        self.volume.resolve()
    }
}

struct FakeControlPlane {
    compute: Outcome,
    volume: Outcome,
    connect_error: Option<fn() -> ExporterError>,
    connects: Arc<AtomicUsize>,
    volume_calls: Arc<AtomicUsize>,
    invalidations: Arc<AtomicUsize>,
}

impl FakeControlPlane {
    fn new(compute: Outcome, volume: Outcome) -> Self {
        Self {
            compute,
            volume,
            connect_error: None,
            connects: Arc::new(AtomicUsize::new(0)),
            volume_calls: Arc::new(AtomicUsize::new(0)),
            invalidations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Connector for FakeControlPlane {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn LimitSource>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = self.connect_error {
            return Err(make());
        }
        Ok(Box::new(FakeSource {
            compute: self.compute.clone(),
            volume: self.volume.clone(),
            volume_calls: Arc::clone(&self.volume_calls),
        }))
    }

    fn invalidate(&self, _config: &ConnectionConfig) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

fn connection_config() -> ConnectionConfig {
    ConnectionConfig {
        auth_url: "https://keystone.example.com:5000".to_string(),
        identity: Identity::Password {
            username: "exporter".to_string(),
            password: "secret".to_string(),
        },
        project_id: "p-123".to_string(),
        domain_id: "default".to_string(),
        region: "RegionOne".to_string(),
        interface: "public".to_string(),
        verify_tls: true,
        timeout: Duration::from_secs(5),
    }
}

fn report(entries: Vec<(&str, LimitValue)>) -> LimitReport {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn compute_report() -> LimitReport {
    report(vec![
        ("instances", LimitValue::Integer(5)),
        ("max_personality", LimitValue::Boolean(true)),
        ("name", LimitValue::Text("ignored".to_string())),
    ])
}

fn volume_report() -> LimitReport {
    report(vec![(
        "absolute",
        LimitValue::Nested(report(vec![
            ("gigabytes", LimitValue::Integer(1000)),
            ("snapshots", LimitValue::Integer(10)),
        ])),
    )])
}

fn router(connector: Arc<dyn Connector>) -> Router {
    let state = ExporterState::new(Arc::new(StaticConfig(connection_config())), connector);
    exporter_router(Arc::new(state))
}

async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn full_scrape_serves_compute_then_volume() {
    let plane = FakeControlPlane::new(
        Outcome::Report(compute_report()),
        Outcome::Report(volume_report()),
    );
    let (status, content_type, body) = get(router(Arc::new(plane)), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));
    assert_eq!(
        body,
        "openstack_compute_instances 5\nopenstack_volume_gigabytes 1000\nopenstack_volume_snapshots 10"
    );
}

#[tokio::test]
async fn repeated_scrapes_are_identical_and_reconnect() {
    let plane = Arc::new(FakeControlPlane::new(
        Outcome::Report(compute_report()),
        Outcome::Report(volume_report()),
    ));
    let connects = Arc::clone(&plane.connects);
    let router = router(plane);

    let (_, _, first) = get(router.clone(), "/metrics").await;
    let (_, _, second) = get(router, "/metrics").await;
    assert_eq!(first, second);
    assert_eq!(connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn compute_timeout_serves_no_partial_body() {
    let plane = FakeControlPlane::new(
        Outcome::Fail(|| ExporterError::upstream_timeout("compute limits request timed out")),
        Outcome::Report(volume_report()),
    );
    let (status, _, body) = get(router(Arc::new(plane)), "/metrics").await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(!body.contains("openstack_"));
    assert!(body.contains("timed out"));
}

#[tokio::test]
async fn volume_failure_discards_compute_lines() {
    let plane = FakeControlPlane::new(
        Outcome::Report(compute_report()),
        Outcome::Fail(|| ExporterError::upstream("volume limits request returned status 500")),
    );
    let (status, _, body) = get(router(Arc::new(plane)), "/metrics").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.contains("openstack_compute_instances"));
}

#[tokio::test]
async fn volume_without_absolute_is_malformed() {
    let plane = FakeControlPlane::new(
        Outcome::Report(compute_report()),
        Outcome::Report(report(vec![("gigabytes", LimitValue::Integer(1000))])),
    );
    let (status, _, body) = get(router(Arc::new(plane)), "/metrics").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.starts_with("malformed limit report"));
    assert_eq!(body.lines().count(), 1);
}

#[tokio::test]
async fn authentication_failure_invalidates_connector_state() {
    let mut plane = FakeControlPlane::new(
        Outcome::Report(compute_report()),
        Outcome::Report(volume_report()),
    );
    plane.connect_error = Some(|| ExporterError::Authentication("rejected (401)".to_string()));
    let plane = Arc::new(plane);
    let invalidations = Arc::clone(&plane.invalidations);
    let volume_calls = Arc::clone(&plane.volume_calls);

    let (status, _, _) = get(router(plane), "/metrics").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(invalidations.load(Ordering::SeqCst), 1);
    assert_eq!(volume_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_endpoint_fails_with_configuration_error() {
    let mut config = connection_config();
    config.auth_url = String::new();
    let state = ExporterState::new(
        Arc::new(StaticConfig(config)),
        Arc::new(KeystoneConnector::new()),
    );

    let (status, _, body) = get(exporter_router(Arc::new(state)), "/metrics").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with("configuration error"));
}

#[tokio::test]
async fn unreadable_config_file_fails_the_scrape() {
    let plane = Arc::new(FakeControlPlane::new(
        Outcome::Report(compute_report()),
        Outcome::Report(volume_report()),
    ));
    let connects = Arc::clone(&plane.connects);
    let state = ExporterState::new(
        Arc::new(CloudConfFile::new(
            "/nonexistent/stacklimit/cloud.conf",
            Duration::from_secs(5),
        )),
        plane,
    );

    let (status, _, _) = get(exporter_router(Arc::new(state)), "/metrics").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn liveness_does_not_touch_the_control_plane() {
    let plane = Arc::new(FakeControlPlane::new(
        Outcome::Report(compute_report()),
        Outcome::Report(volume_report()),
    ));
    let connects = Arc::clone(&plane.connects);

    let (status, _, _) = get(router(plane), "/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}
