use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chat_room::{accounts::AccountStore, http};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    http::router(Arc::new(AccountStore::new()))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

fn alice() -> Value {
    json!({
        "name": "Alice",
        "email": "alice@example.com",
        "password": "hunter2",
        "tax_id": "123.456.789-00",
    })
}

#[tokio::test]
async fn health_check_reports_ok() -> Result<()> {
    let (status, body) = call(&app(), Method::GET, "/", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn register_then_login() -> Result<()> {
    let app = app();

    let (status, _) = call(&app, Method::POST, "/api/register", Some(alice())).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": "alice@example.com", "password": "hunter2" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_a_bad_request() -> Result<()> {
    let app = app();
    call(&app, Method::POST, "/api/register", Some(alice())).await?;

    let mut same_tax_id = alice();
    same_tax_id["email"] = json!("someone@example.com");
    let (status, body) = call(&app, Method::POST, "/api/register", Some(same_tax_id)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "email or tax id already registered");
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_a_bad_request() -> Result<()> {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/register",
        Some(json!({ "name": "Alice", "email": "alice@example.com" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, "/api/login", Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() -> Result<()> {
    let app = app();
    call(&app, Method::POST, "/api/register", Some(alice())).await?;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": "alice@example.com", "password": "wrong" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid credentials");
    Ok(())
}

#[tokio::test]
async fn portuguese_route_and_field_names_are_accepted() -> Result<()> {
    let app = app();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/registro",
        Some(json!({
            "nome": "Maria",
            "cpf": "987.654.321-00",
            "email": "maria@example.com",
            "senha": "segredo",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": "maria@example.com", "senha": "segredo" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["nome"], "Maria");
    assert_eq!(body["user"]["email"], "maria@example.com");

    let (status, _) = call(&app, Method::POST, "/api/registro", Some(alice())).await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn unreadable_bodies_get_a_json_message() -> Result<()> {
    let app = app();

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))?;
    let (status, body) = send(&app, malformed).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let untyped = Request::builder()
        .method(Method::POST)
        .uri("/api/login")
        .body(Body::from("email=alice@example.com"))?;
    let (status, body) = send(&app, untyped).await?;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body["message"].is_string());
    Ok(())
}
