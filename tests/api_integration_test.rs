//! REST API integration tests for the incident relay.
//!
//! Every test runs the full router against the in-memory pin store and
//! payment ledger, so no network or database is needed.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use incident_relay::domain::ContentAddress;
use incident_relay::infra::InMemoryPinStore;

use common::*;

async fn submit(app: &TestApp, report: Value) -> String {
    let (status, body) =
        send_request(&app.router, Method::POST, "/api/v1/incidents", Some(report)).await;
    assert_eq!(status, StatusCode::OK, "submit failed: {body}");
    body["ipfsHash"].as_str().unwrap().to_string()
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_submit_json_then_fetch() {
    let app = test_app();
    let cid = submit(&app, vote_buying_report()).await;

    let (status, body) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{cid}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let incident = &body["incident"];
    assert_eq!(incident["type"], "Vote Buying");
    assert_eq!(incident["severity"], 3);
    assert_eq!(incident["location"], "40.7128, -74.0060");
    assert_eq!(incident["description"], "Saw cash exchanged at polling station");
    assert_eq!(incident["language"], "en");
    assert!(incident["timestamp"].is_string());
    assert!(incident["mediaHash"].is_null());
}

#[tokio::test]
async fn test_submit_accepts_string_severity() {
    let app = test_app();
    let mut report = vote_buying_report();
    report["severity"] = json!("5");

    let cid = submit(&app, report).await;
    let (_, body) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{cid}"),
        None,
    )
    .await;
    assert_eq!(body["incident"]["severity"], 5);
}

#[tokio::test]
async fn test_submit_multipart_with_media() {
    let app = test_app();
    let body = multipart_body(
        &[
            ("type", "Intimidation"),
            ("severity", "4"),
            ("location", "Ward 7, Lagos"),
            ("description", "Armed men chased voters from the queue"),
        ],
        Some(FilePart {
            field: "media",
            file_name: "queue.jpg",
            content_type: "image/jpeg",
            bytes: b"\xff\xd8\xff\xe0 not really a jpeg",
        }),
    );

    let (status, response) = send_multipart(&app.router, "/api/v1/incidents", body).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(response["success"], true);

    let media_hash = response["mediaHash"].as_str().unwrap();
    let media_cid = ContentAddress::parse(media_hash).unwrap();
    assert!(app.pins.contains(&media_cid).await);
    assert_eq!(app.pins.len().await, 2);

    let cid = response["ipfsHash"].as_str().unwrap();
    let (_, fetched) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{cid}"),
        None,
    )
    .await;
    assert_eq!(fetched["incident"]["mediaHash"], media_hash);
    assert_eq!(fetched["incident"]["type"], "Intimidation");
}

#[tokio::test]
async fn test_submit_multipart_data_field() {
    let app = test_app();
    let data = vote_buying_report().to_string();
    let body = multipart_body(&[("data", &data)], None);

    let (status, response) = send_multipart(&app.router, "/api/v1/incidents", body).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert!(response.get("mediaHash").is_none());

    let cid = response["ipfsHash"].as_str().unwrap();
    let (_, fetched) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{cid}"),
        None,
    )
    .await;
    assert_eq!(fetched["incident"]["severity"], 3);
}

#[tokio::test]
async fn test_submit_keeps_location_and_description_verbatim() {
    let app = test_app();
    let mut report = vote_buying_report();
    report["location"] = json!("  Ward 4, Kano  ");
    report["description"] = json!("Saw cash\n");

    let cid = submit(&app, report).await;
    let (_, body) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{cid}"),
        None,
    )
    .await;
    assert_eq!(body["incident"]["location"], "  Ward 4, Kano  ");
    assert_eq!(body["incident"]["description"], "Saw cash\n");

    let multipart = multipart_body(
        &[
            ("type", "Vote Buying"),
            ("severity", "2"),
            ("location", " 40.7128, -74.0060 "),
            ("description", "\tCash handed out "),
        ],
        None,
    );
    let (status, response) = send_multipart(&app.router, "/api/v1/incidents", multipart).await;
    assert_eq!(status, StatusCode::OK, "{response}");

    let cid = response["ipfsHash"].as_str().unwrap();
    let (_, fetched) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{cid}"),
        None,
    )
    .await;
    let incident = &fetched["incident"];
    assert_eq!(incident["location"], " 40.7128, -74.0060 ");
    assert_eq!(incident["description"], "\tCash handed out ");
    assert_eq!(incident["coordinates"]["latitude"], 40.7128);
}

#[tokio::test]
async fn test_submit_normalises_type_alias() {
    let app = test_app();
    let mut report = vote_buying_report();
    report["type"] = json!("vote_buying");

    let cid = submit(&app, report).await;
    let (_, body) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{cid}"),
        None,
    )
    .await;
    assert_eq!(body["incident"]["type"], "Vote Buying");
}

#[tokio::test]
async fn test_submit_rejects_out_of_range_severity() {
    let app = test_app();

    for severity in [json!(0), json!(6), json!("7"), json!("high")] {
        let mut report = vote_buying_report();
        report["severity"] = severity.clone();

        let (status, body) =
            send_request(&app.router, Method::POST, "/api/v1/incidents", Some(report)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "severity {severity}");
        assert_eq!(body["error"]["code"], "INVALID_FIELD_VALUE");
    }

    assert!(app.pins.is_empty().await);
}

#[tokio::test]
async fn test_submit_rejects_missing_description() {
    let app = test_app();
    let mut report = vote_buying_report();
    report["description"] = json!("   ");

    let (status, _) =
        send_request(&app.router, Method::POST, "/api/v1/incidents", Some(report)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.pins.is_empty().await);
}

#[tokio::test]
async fn test_submit_rejects_malformed_json() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/incidents")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_without_pinning_is_misconfigured() {
    let app = test_app_with(TestOptions {
        without_pinning: true,
        ..Default::default()
    });

    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/incidents",
        Some(vote_buying_report()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "SERVICE_MISCONFIGURED");
    assert_eq!(body["error"]["message"], "Server configuration error");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = test_app_with(TestOptions {
        max_upload_bytes: Some(64),
        ..Default::default()
    });
    let mut report = vote_buying_report();
    report["description"] = json!("x".repeat(512));

    let (status, body) =
        send_request(&app.router, Method::POST, "/api/v1/incidents", Some(report)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.pins.is_empty().await);
}

// ============================================================================
// Listing and feed
// ============================================================================

#[tokio::test]
async fn test_list_returns_submitted_hashes() {
    let app = test_app();
    let first = submit(&app, vote_buying_report()).await;

    let mut second_report = vote_buying_report();
    second_report["description"] = json!("Second report from the same ward");
    let second = submit(&app, second_report).await;

    let (status, body) = send_request(&app.router, Method::GET, "/api/v1/incidents", None).await;
    assert_eq!(status, StatusCode::OK);

    let hashes: Vec<&str> = body["hashes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h.as_str().unwrap())
        .collect();
    assert_eq!(hashes.len(), 2);
    assert!(hashes.contains(&first.as_str()));
    assert!(hashes.contains(&second.as_str()));
}

#[tokio::test]
async fn test_list_excludes_media_pins() {
    let app = test_app();
    let body = multipart_body(
        &[
            ("type", "Tampering"),
            ("severity", "2"),
            ("location", "Precinct 12"),
            ("description", "Result sheet altered"),
        ],
        Some(FilePart {
            field: "media",
            file_name: "sheet.png",
            content_type: "image/png",
            bytes: b"\x89PNG fake",
        }),
    );
    let (status, _) = send_multipart(&app.router, "/api/v1/incidents", body).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send_request(&app.router, Method::GET, "/api/v1/incidents", None).await;
    assert_eq!(listed["hashes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_feed_falls_back_when_empty() {
    let app = test_app();
    let (status, body) =
        send_request(&app.router, Method::GET, "/api/v1/incidents/feed", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"], "community-fallback");
    assert_eq!(body["incidents"], json!([]));
}

#[tokio::test]
async fn test_feed_lists_incidents_with_cids() {
    let app = test_app();
    let cid = submit(&app, vote_buying_report()).await;

    let (status, body) =
        send_request(&app.router, Method::GET, "/api/v1/incidents/feed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"], "incidents");
    assert_eq!(body["skipped"], 0);

    let incidents = body["incidents"].as_array().unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0]["cid"], cid.as_str());
    assert_eq!(incidents[0]["type"], "Vote Buying");
}

#[tokio::test]
async fn test_get_unknown_incident_is_not_found() {
    let app = test_app();
    let missing = InMemoryPinStore::address_for(b"never pinned");

    let (status, body) = send_request(
        &app.router,
        Method::GET,
        &format!("/api/v1/incidents/{missing}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_get_malformed_cid_is_bad_request() {
    let app = test_app();
    let (status, _) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/incidents/not%20a%20cid",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Analysis
// ============================================================================

#[tokio::test]
async fn test_analyze_text_returns_label() {
    let app = test_app();
    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/analysis/text",
        Some(json!({ "text": "They offered money as a bribe for votes" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "vote_buying");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!(confidence > 0.0 && confidence <= 1.0);
    assert_eq!(body["scores"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_analyze_text_requires_text() {
    let app = test_app();
    for payload in [json!({}), json!({ "text": "   " })] {
        let (status, _) = send_request(
            &app.router,
            Method::POST,
            "/api/v1/analysis/text",
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_analyze_media_by_url() {
    let app = test_app_with(TestOptions {
        media_checker: Some(Arc::new(StubMediaChecker { confidence: 0.92 })),
        ..Default::default()
    });

    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/analysis/media",
        Some(json!({ "mediaUrl": "https://example.org/clip.mp4", "mediaType": "video" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["isSynthetic"], true);
    assert_eq!(body["mediaType"], "video");
    assert_eq!(body["raw"]["source"]["url"], "https://example.org/clip.mp4");
}

#[tokio::test]
async fn test_analyze_media_upload() {
    let app = test_app_with(TestOptions {
        media_checker: Some(Arc::new(StubMediaChecker { confidence: 0.1 })),
        ..Default::default()
    });

    let body = multipart_body(
        &[],
        Some(FilePart {
            field: "media",
            file_name: "photo.jpg",
            content_type: "image/jpeg",
            bytes: b"jpeg bytes",
        }),
    );
    let (status, response) = send_multipart(&app.router, "/api/v1/analysis/media", body).await;

    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(response["isSynthetic"], false);
    assert_eq!(response["mediaType"], "image");
    assert_eq!(response["raw"]["source"]["file"], "photo.jpg");
}

#[tokio::test]
async fn test_analyze_media_requires_fields() {
    let app = test_app_with(TestOptions {
        media_checker: Some(Arc::new(StubMediaChecker { confidence: 0.5 })),
        ..Default::default()
    });

    let (status, _) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/analysis/media",
        Some(json!({ "mediaType": "image" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_media_unconfigured() {
    let app = test_app();
    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/analysis/media",
        Some(json!({ "mediaUrl": "https://example.org/a.jpg", "mediaType": "image" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "SERVICE_MISCONFIGURED");
}

// ============================================================================
// Proof verification
// ============================================================================

fn proof() -> Value {
    json!({
        "merkle_root": "0x1",
        "nullifier_hash": "0x2",
        "proof": "0x3",
        "verification_level": "orb"
    })
}

#[tokio::test]
async fn test_verify_accepted() {
    let app = test_app_with(TestOptions {
        verifier: Some(Arc::new(StubVerifier {
            verified: true,
            body: json!({ "nullifier_hash": "0x2" }),
        })),
        ..Default::default()
    });

    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/verify",
        Some(json!({ "proof": proof(), "action": "submit-incident" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["nullifier_hash"], "0x2");
    assert_eq!(body["action"], "submit-incident");
}

#[tokio::test]
async fn test_verify_rejected() {
    let app = test_app_with(TestOptions {
        verifier: Some(Arc::new(StubVerifier {
            verified: false,
            body: json!({ "code": "invalid_proof" }),
        })),
        ..Default::default()
    });

    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/verify",
        Some(json!({ "proof": proof(), "action": "submit-incident" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "invalid_proof");
}

#[tokio::test]
async fn test_verify_requires_proof() {
    let app = test_app_with(TestOptions {
        verifier: Some(Arc::new(StubVerifier {
            verified: true,
            body: json!({}),
        })),
        ..Default::default()
    });

    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/verify",
        Some(json!({ "action": "submit-incident" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
}

// ============================================================================
// Premium
// ============================================================================

#[tokio::test]
async fn test_access_denied_without_payment() {
    let app = test_app();
    let (status, body) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/premium/access?address=0xabc",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "hasAccess": false }));
}

#[tokio::test]
async fn test_access_without_address_is_denied() {
    let app = test_app();
    let (status, body) =
        send_request(&app.router, Method::GET, "/api/v1/premium/access", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasAccess"], false);
}

#[tokio::test]
async fn test_payment_grants_access() {
    let app = test_app();
    let (status, body) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/premium/payments",
        Some(json!({ "address": "0xABC", "transactionId": "0x123", "amount": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["daysRemaining"], 30);
    assert!(body["payment"]["expiresAt"].is_i64());

    let (_, access) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/premium/access?address=0xabc",
        None,
    )
    .await;
    assert_eq!(access["hasAccess"], true);
    assert_eq!(access["daysRemaining"], 30);
    assert_eq!(access["expiresAt"], body["payment"]["expiresAt"]);

    let (_, history) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/premium/payments?address=0xabc",
        None,
    )
    .await;
    let payments = history["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["transactionId"], "0x123");
    assert_eq!(payments[0]["currency"], "USDC");
    assert_eq!(payments[0]["status"], "confirmed");
}

#[tokio::test]
async fn test_payment_requires_address_and_transaction() {
    let app = test_app();
    for payload in [
        json!({ "transactionId": "0x1" }),
        json!({ "address": "0xabc" }),
        json!({ "address": " ", "transactionId": "0x1" }),
    ] {
        let (status, body) = send_request(
            &app.router,
            Method::POST,
            "/api/v1/premium/payments",
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
    }
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn test_analytics_requires_payment() {
    let app = test_app();
    submit(&app, vote_buying_report()).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/premium/analytics?address=0xabc")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers().get("x-error-code").unwrap(),
        "PREMIUM_REQUIRED"
    );

    let (status, body) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/premium/analytics?address=0xabc",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["premiumRequired"], true);
    assert_eq!(body["error"]["message"], "Premium access required");
}

#[tokio::test]
async fn test_analytics_after_payment() {
    let app = test_app();
    submit(&app, vote_buying_report()).await;

    let mut second = vote_buying_report();
    second["type"] = json!("Intimidation");
    second["severity"] = json!(5);
    submit(&app, second).await;

    send_request(
        &app.router,
        Method::POST,
        "/api/v1/premium/payments",
        Some(json!({ "address": "0xabc", "transactionId": "0xfeed" })),
    )
    .await;

    let (status, body) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/premium/analytics?address=0xabc",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["totals"]["all"], 2);
    assert_eq!(body["data"]["totals"]["today"], 2);
    assert_eq!(body["data"]["averageSeverity"], 4.0);
    assert_eq!(body["premiumAccess"]["daysRemaining"], 30);
}

#[tokio::test]
async fn test_analytics_requires_address() {
    let app = test_app();
    let (status, body) =
        send_request(&app.router, Method::GET, "/api/v1/premium/analytics", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("premiumRequired").is_none());
}

// ============================================================================
// Health and metrics
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send_request(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_reports_components() {
    let app = test_app();
    let (status, body) = send_request(&app.router, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);

    let components = body["components"].as_array().unwrap();
    let names: Vec<&str> = components
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"payment_ledger"));
    assert!(names.contains(&"pinning"));
}

#[tokio::test]
async fn test_metrics_after_submission() {
    let app = test_app();
    submit(&app, vote_buying_report()).await;

    let (status, text) = get_text(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("relay_incidents_submitted 1"), "{text}");
}
