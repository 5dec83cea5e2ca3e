// Integration tests for the account setup and balance API

use account_connector::api::{create_router, ApiState, SESSION_COOKIE};
use account_connector::connectors::coinbase::config::CoinbaseConfig;
use account_connector::connectors::coinbase::CoinbaseConnector;
use account_connector::ConnectorRegistry;
use account_oauth::oauth::SessionStore;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app(server: &ServerGuard) -> (Router, Arc<SessionStore>) {
    let config = CoinbaseConfig::new(
        "client",
        "secret",
        "http://localhost:3001/accounts/coinbase/interaction",
    )
    .with_base_url(&server.url());
    let registry = ConnectorRegistry::new(vec![Arc::new(CoinbaseConnector::new(config))]);
    let sessions = Arc::new(SessionStore::new(600));

    let router = create_router(ApiState {
        registry: Arc::new(registry),
        sessions: Arc::clone(&sessions),
        session_ttl_seconds: 600,
    });
    (router, sessions)
}

async fn json_of(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Runs the first interaction step and returns (cookie pair, state).
async fn start_interaction(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(get("/accounts/coinbase/interaction", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let state = location
        .split('&')
        .find_map(|kv| kv.strip_prefix("state="))
        .unwrap()
        .to_string();

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));

    (cookie, state)
}

#[tokio::test]
async fn test_list_connectors() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let response = app.oneshot(get("/accounts", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_of(response).await;
    let connectors = json.as_array().unwrap();
    assert_eq!(connectors.len(), 1);
    assert_eq!(connectors[0]["code"], "coinbase");
    assert_eq!(connectors[0]["fields"].as_array().unwrap().len(), 4);
    assert_eq!(connectors[0]["fields"][0]["interaction"], true);
}

#[tokio::test]
async fn test_interaction_redirects_to_provider() {
    let server = Server::new_async().await;
    let (app, sessions) = create_test_app(&server);

    let response = app
        .oneshot(get("/accounts/coinbase/interaction", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/oauth/authorize?", server.url())));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("state="));
    assert_eq!(sessions.count(), 1);
}

#[tokio::test]
async fn test_full_interaction_flow() {
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth_code".into()),
        ]))
        .with_status(200)
        .with_body(format!(
            r#"{{"access_token":"at_1","refresh_token":"rt_1","expires_in":{}}}"#,
            Utc::now().timestamp() + 7200
        ))
        .create_async()
        .await;

    let (app, sessions) = create_test_app(&server);
    let (cookie, state) = start_interaction(&app).await;

    let response = app
        .oneshot(get(
            &format!("/accounts/coinbase/interaction?code=auth_code&state={}", state),
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    token_mock.assert_async().await;
    assert_eq!(sessions.count(), 0);

    let json = json_of(response).await;
    assert_eq!(json["connector"], "coinbase");
    assert_eq!(json["fields"]["api_code"], "auth_code");
    assert_eq!(json["fields"]["access_token"], "at_1");
    assert_eq!(json["fields"]["refresh_token"], "rt_1");

    let expires: i64 = json["fields"]["access_token_expires"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(expires > Utc::now().timestamp());
}

#[tokio::test]
async fn test_interaction_state_mismatch_is_forbidden() {
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/oauth/token")
        .expect(0)
        .create_async()
        .await;

    let (app, sessions) = create_test_app(&server);
    let (cookie, _state) = start_interaction(&app).await;

    let response = app
        .clone()
        .oneshot(get(
            "/accounts/coinbase/interaction?code=auth_code&state=forged",
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = json_of(response).await;
    assert!(json["error"].as_str().unwrap().contains("CSRF"));
    assert_eq!(sessions.count(), 0);
    token_mock.assert_async().await;
}

#[tokio::test]
async fn test_callback_without_session_is_forbidden() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let response = app
        .oneshot(get(
            "/accounts/coinbase/interaction?code=auth_code&state=anything",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_declined_authorization_is_forbidden() {
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/oauth/token")
        .expect(0)
        .create_async()
        .await;

    let (app, sessions) = create_test_app(&server);
    let (cookie, state) = start_interaction(&app).await;

    let response = app
        .clone()
        .oneshot(get(
            &format!(
                "/accounts/coinbase/interaction?error=access_denied&state={}",
                state
            ),
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = json_of(response).await;
    assert!(json["error"].as_str().unwrap().contains("access_denied"));
    assert_eq!(sessions.count(), 0);
    token_mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_connector() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let response = app
        .oneshot(get("/accounts/mtgox/interaction", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fetch_balances() {
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "rt_old".into()))
        .with_status(200)
        .with_body(format!(
            r#"{{"access_token":"at_new","refresh_token":"rt_new","expires_in":{}}}"#,
            Utc::now().timestamp() + 7200
        ))
        .create_async()
        .await;
    let _balance_mock = server
        .mock("GET", "/account/balance")
        .match_header("authorization", "Bearer at_new")
        .with_status(200)
        .with_body(r#"{"currency": "BTC", "amount": "1.5"}"#)
        .create_async()
        .await;

    let (app, _) = create_test_app(&server);
    let body = serde_json::json!({
        "api_code": "code",
        "access_token": "at_old",
        "refresh_token": "rt_old",
        "access_token_expires": "1700000000",
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/accounts/coinbase/balances")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_of(response).await;
    assert_eq!(json["balances"], serde_json::json!({"btc": {"confirmed": "1.5"}}));
    assert_eq!(json["credentials"]["access_token"], "at_new");
    assert_eq!(json["credentials"]["refresh_token"], "rt_new");
    assert_eq!(json["credentials"]["api_code"], "code");
}

#[tokio::test]
async fn test_fetch_balances_failure_returns_refreshed_credentials() {
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(format!(
            r#"{{"access_token":"at_new","refresh_token":"rt_new","expires_in":{}}}"#,
            Utc::now().timestamp() + 7200
        ))
        .create_async()
        .await;
    let _balance_mock = server
        .mock("GET", "/account/balance")
        .with_status(503)
        .create_async()
        .await;

    let (app, _) = create_test_app(&server);
    let body = serde_json::json!({
        "api_code": "code",
        "access_token": "at_old",
        "refresh_token": "rt_old",
        "access_token_expires": "1700000000",
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/accounts/coinbase/balances")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_of(response).await;
    assert!(json["error"].as_str().unwrap().contains("balance query"));
    assert_eq!(json["credentials"]["refresh_token"], "rt_new");
}

#[tokio::test]
async fn test_fetch_balances_rejects_incomplete_credentials() {
    let server = Server::new_async().await;
    let (app, _) = create_test_app(&server);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/accounts/coinbase/balances")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"access_token": "at"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
