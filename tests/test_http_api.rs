// HTTP surface: routes, status codes and the error body shape
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use deskqueue::infrastructure::http::build_router;
use serde_json::{json, Value};
use tower::ServiceExt;

mod helpers;
use helpers::*;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

async fn send_with_headers(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (_db, state) = setup_test_state(3).await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_full_conversation_flow_over_http() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let app = build_router(state);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/conversations",
        Some(json!({ "subject": "Order missing", "consumerId": consumer.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, depth) = send(&app, Method::GET, "/api/conversations/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(depth["pendingCount"], 1);

    let (status, assigned) = send(
        &app,
        Method::POST,
        "/api/conversations/assign",
        Some(json!({ "conversationId": id, "agentId": agent.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["status"], "open");
    assert_eq!(assigned["agentId"], agent.id.as_str());

    let (status, message) = send(
        &app,
        Method::POST,
        "/api/conversations/message",
        Some(json!({ "conversationId": id, "by": "consumer", "content": "Any news?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["by"], "consumer");

    let (status, finished) = send(
        &app,
        Method::PATCH,
        "/api/conversations/finish",
        Some(json!({ "conversationId": id, "closingReason": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(finished["status"], "closed");

    let (status, rated) = send(
        &app,
        Method::PATCH,
        "/api/conversations/rate",
        Some(json!({ "conversationId": id, "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rated["rate"], 5);

    let (status, full) = send(&app, Method::GET, &format!("/api/conversations/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = full["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["by"], "system");
    assert_eq!(messages[1]["content"], "Any news?");

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/api/agents/{}/conversations?status=closed", agent.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["pagination"]["totalCount"], 1);
}

#[tokio::test]
async fn test_error_bodies_carry_code() {
    let (db, state) = setup_test_state(1).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let first = create_pending_conversation(&db, &consumer.id, "first").await;
    let second = create_pending_conversation(&db, &consumer.id, "second").await;
    let app = build_router(state);

    // Rating a pending conversation
    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/conversations/rate",
        Some(json!({ "conversationId": first.id, "rating": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidState");
    assert!(body["error"].is_string());

    // Out-of-range rating
    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/conversations/rate",
        Some(json!({ "conversationId": first.id, "rating": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    // Capacity
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/conversations/assign",
        Some(json!({ "conversationId": first.id, "agentId": agent.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/conversations/assign",
        Some(json!({ "conversationId": second.id, "agentId": agent.id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CapacityExceeded");

    // Already assigned
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/conversations/assign",
        Some(json!({ "conversationId": first.id, "agentId": agent.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "Conflict");

    // Unknown conversation
    let (status, body) = send(&app, Method::GET, "/api/conversations/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");
}

#[tokio::test]
async fn test_malformed_bodies_are_validation_errors() {
    let (_db, state) = setup_test_state(3).await;
    let app = build_router(state);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/conversations",
        Some(json!({ "subject": "", "consumerId": "c-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/conversations/message",
        Some(json!({ "conversationId": "c-1", "by": "system", "content": "spoofed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/conversations/finish",
        Some(json!({ "conversationId": "c-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/agents/a-1/conversations?status=archived",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[tokio::test]
async fn test_availability_requires_agent_header() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let app = build_router(state);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/users/availability",
        Some(json!({ "available": false })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "Unauthorized");

    let (status, body) = send_with_headers(
        &app,
        Method::PATCH,
        "/api/users/availability",
        Some(json!({ "available": false })),
        &[("x-agent-id", "ghost")],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");

    let (status, body) = send_with_headers(
        &app,
        Method::PATCH,
        "/api/users/availability",
        Some(json!({ "available": false })),
        &[("x-agent-id", agent.id.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
}

#[tokio::test]
async fn test_distribute_endpoint_reports_pass() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;
    let app = build_router(state);

    let (status, report) = send(&app, Method::POST, "/api/conversations/distribute", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["assigned"][0]["conversationId"], conversation.id.as_str());
    assert_eq!(report["assigned"][0]["agentId"], agent.id.as_str());
    assert_eq!(report["remaining"], 0);
    assert_eq!(report["alreadyRunning"], false);
}

#[tokio::test]
async fn test_list_conversations_paginates() {
    let (db, state) = setup_test_state(3).await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    for i in 0..3 {
        create_pending_conversation(&db, &consumer.id, &format!("c{}", i)).await;
    }
    let app = build_router(state);

    let (status, page) = send(&app, Method::GET, "/api/conversations?page=0&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"]["totalCount"], 3);
    assert_eq!(page["pagination"]["totalPages"], 2);
    // Newest first
    assert_eq!(page["data"][0]["subject"], "c2");
}
