//! Broker API integration tests

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use helmi_broker::{BasicAuth, build_router};
use helmi_core::{Catalog, ClusterNode, FlatValues};
use helmi_kube::{MockDeploymentClient, MockRelease, MockTopologyClient, Orchestrator};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const CATALOG: &str = r#"
services:
  - _id: "9a1b6f52"
    _name: mariadb
    description: MariaDB database
    chart: stable/mariadb
    chart-values:
      mariadbUser: "{{ lookup('username', 'user') }}"
      mariadbPassword: "{{ lookup('password', 'password') }}"
    user-credentials:
      username: "{{ lookup('value', 'mariadbUser') }}"
      password: "{{ lookup('value', 'mariadbPassword') }}"
      host: "{{ lookup('cluster', 'address') }}"
    plans:
      - _id: "9a1b6f52-small"
        _name: small
        description: Small database
"#;

const INSTANCE: &str = "0f3e2d1c-b4a5-4c6d-8e7f-123456789abc";
const RELEASE: &str = "helmi0f3e2d1cb4a54c";

struct TestApp {
    router: Router,
    deployments: MockDeploymentClient,
}

fn test_app(auth: Option<BasicAuth>, releases: Vec<MockRelease>) -> TestApp {
    let catalog = Catalog::from_yaml(CATALOG).unwrap();
    let deployments = MockDeploymentClient::with_releases(releases);
    let topology =
        MockTopologyClient::with_nodes([ClusterNode::new("node").with_internal_ip("10.0.0.7")]);

    let orchestrator = Orchestrator::new(
        Arc::new(catalog),
        Arc::new(deployments.clone()),
        Arc::new(topology),
        tracing::Span::none(),
    );

    TestApp {
        router: build_router(Arc::new(orchestrator), auth),
        deployments,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, json)
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn service_body() -> Value {
    json!({ "service_id": "9a1b6f52", "plan_id": "9a1b6f52-small" })
}

fn instance_uri(suffix: &str) -> String {
    format!("/v2/service_instances/{INSTANCE}{suffix}")
}

#[tokio::test]
async fn test_liveness() {
    let app = test_app(Some(BasicAuth::new("admin", "secret")), vec![]);

    let (status, body) = send(&app.router, request(Method::GET, "/liveness", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_catalog() {
    let app = test_app(None, vec![]);

    let (status, body) = send(&app.router, request(Method::GET, "/v2/catalog", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"][0]["id"], "9a1b6f52");
    assert_eq!(body["services"][0]["bindable"], true);
    assert_eq!(body["services"][0]["plan_updateable"], false);
    assert_eq!(body["services"][0]["plans"][0]["id"], "9a1b6f52-small");
    assert_eq!(body["services"][0]["plans"][0]["free"], true);
}

#[tokio::test]
async fn test_auth_required_when_configured() {
    let auth = BasicAuth::new("admin", "secret");
    let app = test_app(Some(auth.clone()), vec![]);

    let (status, body) = send(&app.router, request(Method::GET, "/v2/catalog", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], "Unauthorized.");

    let wrong = BasicAuth::new("admin", "guess");
    let mut req = request(Method::GET, "/v2/catalog", None);
    req.headers_mut()
        .insert(header::AUTHORIZATION, wrong.header_value().parse().unwrap());
    let (status, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = request(Method::GET, "/v2/catalog", None);
    req.headers_mut()
        .insert(header::AUTHORIZATION, auth.header_value().parse().unwrap());
    let (status, _) = send(&app.router, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_provision_sync() {
    let app = test_app(None, vec![]);

    let (status, body) = send(
        &app.router,
        request(Method::PUT, &instance_uri(""), Some(service_body())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let release = app.deployments.release(RELEASE).unwrap();
    assert!(release.waited);
    assert_eq!(release.chart, "stable/mariadb");
    assert_eq!(release.values.get("mariadbPassword").map(str::len), Some(32));
}

#[tokio::test]
async fn test_provision_async() {
    let app = test_app(None, vec![]);

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &instance_uri("?accepts_incomplete=true"),
            Some(service_body()),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(!app.deployments.release(RELEASE).unwrap().waited);
}

#[tokio::test]
async fn test_provision_existing_instance_conflicts() {
    let app = test_app(None, vec![MockRelease::new(RELEASE)]);

    let (status, body) = send(
        &app.router,
        request(Method::PUT, &instance_uri(""), Some(service_body())),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["description"].as_str().unwrap().contains(RELEASE));
}

#[tokio::test]
async fn test_provision_bad_requests() {
    let app = test_app(None, vec![]);

    let (status, body) = send(
        &app.router,
        request(Method::PUT, &instance_uri(""), Some(json!({ "service_id": "9a1b6f52" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["description"], "Invalid Request");

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &instance_uri(""),
            Some(json!({ "service_id": "unknown", "plan_id": "small" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.deployments.operation_counts().installs, 0);
}

#[tokio::test]
async fn test_deprovision_is_idempotent() {
    let app = test_app(None, vec![MockRelease::new(RELEASE)]);

    let (status, _) = send(&app.router, request(Method::DELETE, &instance_uri(""), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.deployments.release_count(), 0);

    let (status, body) = send(
        &app.router,
        request(Method::DELETE, &instance_uri("?accepts_incomplete=true"), None),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_last_operation() {
    let app = test_app(None, vec![MockRelease::new(RELEASE)]);

    let (status, body) = send(
        &app.router,
        request(Method::GET, &instance_uri("/last_operation"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "state": "succeeded" }));
}

#[tokio::test]
async fn test_last_operation_unknown_instance_is_gone() {
    let app = test_app(None, vec![]);

    let (status, body) = send(
        &app.router,
        request(Method::GET, &instance_uri("/last_operation"), None),
    )
    .await;

    assert_eq!(status, StatusCode::GONE);
    assert!(body["description"].is_string());
}

#[tokio::test]
async fn test_bind() {
    let values: FlatValues = [("mariadbUser", "app"), ("mariadbPassword", "pw")]
        .into_iter()
        .collect();
    let app = test_app(None, vec![MockRelease::new(RELEASE).with_values(values)]);

    let (status, body) = send(
        &app.router,
        request(
            Method::PUT,
            &instance_uri("/service_bindings/binding-1"),
            Some(service_body()),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "credentials": {
                "username": "app",
                "password": "pw",
                "host": "10.0.0.7"
            }
        })
    );
}

#[tokio::test]
async fn test_bind_unknown_instance_is_gone() {
    let app = test_app(None, vec![]);

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &instance_uri("/service_bindings/binding-1"),
            Some(service_body()),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_unbind() {
    let app = test_app(None, vec![MockRelease::new(RELEASE)]);

    let (status, body) = send(
        &app.router,
        request(Method::DELETE, &instance_uri("/service_bindings/binding-1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let app = test_app(None, vec![]);
    let (status, _) = send(
        &app.router,
        request(Method::DELETE, &instance_uri("/service_bindings/binding-1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_full_lifecycle() {
    let app = test_app(None, vec![]);

    let (status, _) = send(
        &app.router,
        request(Method::PUT, &instance_uri(""), Some(service_body())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app.router,
        request(Method::GET, &instance_uri("/last_operation"), None),
    )
    .await;
    assert_eq!(body["state"], "succeeded");

    let (status, body) = send(
        &app.router,
        request(
            Method::PUT,
            &instance_uri("/service_bindings/b"),
            Some(service_body()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let installed = app.deployments.release(RELEASE).unwrap();
    assert_eq!(
        body["credentials"]["password"],
        installed.values.get("mariadbPassword").unwrap()
    );

    let (status, _) = send(&app.router, request(Method::DELETE, &instance_uri(""), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        request(Method::GET, &instance_uri("/last_operation"), None),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}

#[test]
fn test_catalog_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    std::fs::write(&path, CATALOG).unwrap();

    let catalog = Catalog::from_file(&path).unwrap();
    assert_eq!(catalog.services.len(), 1);
    assert!(catalog.plan("9A1B6F52", "9a1b6f52-SMALL").is_some());
}
