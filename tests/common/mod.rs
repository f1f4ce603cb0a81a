//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use incident_relay::domain::{MediaAuthenticity, MediaType};
use incident_relay::infra::{
    ContentGateway, InMemoryPaymentLedger, InMemoryPinStore, IncidentDirectory,
    MediaAuthenticityChecker, MediaSource, NaiveBayesClassifier, PaymentLedger, PinningService,
    PremiumAccessService, ProofVerdict, ProofVerifier, RetryConfig, SubmissionService,
    DEFAULT_PROJECT_TAG,
};
use incident_relay::metrics::MetricsRegistry;
use incident_relay::server::{build_router, AppState, DEFAULT_MAX_UPLOAD_BYTES};

pub const BOUNDARY: &str = "relay-test-boundary";

/// Verifier that answers every proof the same way.
pub struct StubVerifier {
    pub verified: bool,
    pub body: Value,
}

#[async_trait]
impl ProofVerifier for StubVerifier {
    async fn verify(&self, _proof: Value, action: &str) -> incident_relay::Result<ProofVerdict> {
        let mut body = self.body.clone();
        if let Value::Object(map) = &mut body {
            map.insert("action".to_string(), json!(action));
        }
        Ok(ProofVerdict {
            verified: self.verified,
            body,
        })
    }
}

/// Checker that reports a fixed model confidence.
pub struct StubMediaChecker {
    pub confidence: f64,
}

#[async_trait]
impl MediaAuthenticityChecker for StubMediaChecker {
    async fn check(
        &self,
        media: MediaSource,
        media_type: MediaType,
    ) -> incident_relay::Result<MediaAuthenticity> {
        let source = match media {
            MediaSource::Url(url) => json!({ "url": url }),
            MediaSource::Inline(file) => json!({ "file": file.file_name, "bytes": file.len() }),
        };
        Ok(MediaAuthenticity::from_confidence(
            media_type,
            Some(self.confidence),
            json!({ "confidence": self.confidence, "source": source }),
        ))
    }
}

/// Router plus handles on the in-memory stores behind it.
pub struct TestApp {
    pub router: axum::Router<()>,
    pub state: AppState,
    pub pins: Arc<InMemoryPinStore>,
    pub ledger: Arc<InMemoryPaymentLedger>,
    pub metrics: Arc<MetricsRegistry>,
}

#[derive(Default)]
pub struct TestOptions {
    /// Leave the pinning provider unconfigured
    pub without_pinning: bool,
    pub verifier: Option<Arc<dyn ProofVerifier>>,
    pub media_checker: Option<Arc<dyn MediaAuthenticityChecker>>,
    pub max_upload_bytes: Option<usize>,
}

pub fn test_app() -> TestApp {
    test_app_with(TestOptions::default())
}

pub fn test_app_with(options: TestOptions) -> TestApp {
    let metrics = Arc::new(MetricsRegistry::new());
    let pins = Arc::new(InMemoryPinStore::new());
    let ledger = Arc::new(InMemoryPaymentLedger::new());

    let pinning: Option<Arc<dyn PinningService>> = if options.without_pinning {
        None
    } else {
        Some(pins.clone() as Arc<dyn PinningService>)
    };
    let gateway: Arc<dyn ContentGateway> = pins.clone();
    let payment_ledger: Arc<dyn PaymentLedger> = ledger.clone();

    let state = AppState {
        submission: Arc::new(
            SubmissionService::new(pinning.clone(), metrics.clone(), DEFAULT_PROJECT_TAG)
                .with_retry(RetryConfig::immediate(0)),
        ),
        directory: Arc::new(
            IncidentDirectory::new(pinning, gateway, metrics.clone(), DEFAULT_PROJECT_TAG)
                .with_concurrency(4),
        ),
        access: Arc::new(PremiumAccessService::new(payment_ledger, metrics.clone())),
        classifier: Arc::new(NaiveBayesClassifier::default()),
        media_checker: options.media_checker,
        verifier: options.verifier,
        metrics: metrics.clone(),
        db_pool: None,
    };

    let router = build_router(options.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES))
        .unwrap()
        .with_state::<()>(state.clone());

    TestApp {
        router,
        state,
        pins,
        ledger,
        metrics,
    }
}

/// The scenario report used throughout the tests.
pub fn vote_buying_report() -> Value {
    json!({
        "type": "Vote Buying",
        "severity": 3,
        "location": "40.7128, -74.0060",
        "description": "Saw cash exchanged at polling station"
    })
}

async fn into_parts(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();

    let json = if bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes) }))
    };

    (status, json)
}

/// Send a JSON request (or an empty body) to the test router.
pub async fn send_request(
    app: &axum::Router<()>,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    let body = body
        .map(|v| Body::from(serde_json::to_vec(&v).unwrap()))
        .unwrap_or_else(|| Body::from(Vec::new()));

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    into_parts(response).await
}

/// A file part for [`multipart_body`].
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// Encode text fields and an optional file as `multipart/form-data`.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some(file) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                file.field, file.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST a multipart body built by [`multipart_body`].
pub async fn send_multipart(app: &axum::Router<()>, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    into_parts(response).await
}

/// GET returning the raw body text.
pub async fn get_text(app: &axum::Router<()>, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}
