use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use calendash::components::{
    CalendarProvider, EventQuery, InMemoryStore, SessionContext, SessionStore,
    UnconfiguredSummarizer,
};
use calendash::config::DisplaySettings;
use calendash::error::{google_calendar_error, DashResult};
use calendash::pipeline::models::{AccessRole, RawEventTime};
use calendash::pipeline::{CalendarDetails, CalendarRef, RawEvent};
use calendash::service::DashboardService;
use calendash::web::auth::{AuthConfig, AuthService};
use calendash::web::{router, AppState};
use chrono::{Duration, Utc};
use chrono_tz::Tz;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Provider that is connected only when the context carries an account id
struct AccountProvider;

#[async_trait]
impl CalendarProvider for AccountProvider {
    fn name(&self) -> &'static str {
        "account"
    }

    async fn is_connected(&self, ctx: &SessionContext) -> DashResult<bool> {
        Ok(ctx.connected_account_id.is_some())
    }

    async fn list_calendars(&self, _ctx: &SessionContext) -> DashResult<Vec<CalendarRef>> {
        Ok(vec![CalendarRef {
            id: "primary".to_string(),
            label: "Work".to_string(),
            color: Some("#33b679".to_string()),
            access_role: AccessRole::Owner,
            primary: true,
        }])
    }

    async fn get_calendar(
        &self,
        _ctx: &SessionContext,
        calendar_id: &str,
    ) -> DashResult<CalendarDetails> {
        if calendar_id != "primary" {
            return Err(google_calendar_error("API request failed: HTTP 404 Not Found"));
        }
        Ok(CalendarDetails {
            id: "primary".to_string(),
            summary: Some("Work".to_string()),
            time_zone: Some("UTC".to_string()),
            ..Default::default()
        })
    }

    async fn list_events(
        &self,
        _ctx: &SessionContext,
        _calendar_id: &str,
        _query: &EventQuery,
    ) -> DashResult<Vec<RawEvent>> {
        let start = Utc::now() + Duration::hours(2);
        Ok(vec![RawEvent {
            id: Some("sync".to_string()),
            summary: Some("Team sync".to_string()),
            start: Some(RawEventTime {
                date_time: Some(start.to_rfc3339()),
                ..Default::default()
            }),
            ..Default::default()
        }])
    }
}

fn app() -> (Router, Arc<dyn SessionStore>) {
    let store: Arc<dyn SessionStore> = Arc::new(InMemoryStore::default());
    let service = DashboardService::new(
        Arc::new(AccountProvider),
        Arc::new(UnconfiguredSummarizer),
        DisplaySettings::default(),
        Tz::UTC,
    );
    let state = AppState {
        service,
        store: Arc::clone(&store),
        auth: Arc::new(AuthService::new(AuthConfig {
            jwt_secret: "smoke-secret".to_string(),
            token_expiration_minutes: 60,
        })),
        google_oauth: None,
        composio: None,
    };
    (router(state), store)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Sign up and return the `auth_token` cookie pair
async fn signup(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            json!({ "email": "ada@example.com", "password": "hunter2", "name": "Ada" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    cookie.split(';').next().unwrap().to_string()
}

fn authed_get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_api_requires_session() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/api/meetings").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_signup_login_and_duplicate() {
    let (app, _) = app();
    let cookie = signup(&app).await;
    assert!(cookie.starts_with("auth_token="));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            json!({ "email": "ADA@example.com", "password": "other" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "ada@example.com", "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["name"], "Ada");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "ada@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_requires_fields() {
    let (app, _) = app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            json!({ "email": "  ", "password": "x" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meetings_not_connected() {
    let (app, _) = app();
    let cookie = signup(&app).await;

    let response = app
        .oneshot(authed_get("/api/meetings", &cookie))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "Google Calendar not connected. Please authenticate first."
    );
}

#[tokio::test]
async fn test_connection_then_meetings() {
    let (app, _) = app();
    let cookie = signup(&app).await;

    let mut put = json_request(
        "PUT",
        "/api/connection",
        json!({ "connectedAccountId": "ca_123" }),
    );
    put.headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = app.clone().oneshot(put).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["connected"], true);
    assert_eq!(body["data"]["connectedAccountId"], "ca_123");

    let response = app
        .clone()
        .oneshot(authed_get("/api/meetings?limit=3", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["upcoming"][0]["title"], "Team sync");
    assert_eq!(body["data"]["upcoming"][0]["isUpcoming"], true);
    assert_eq!(body["data"]["upcoming"][0]["source"]["color"], "#33b679");
    assert_eq!(body["data"]["calendars"][0]["status"], "ok");

    let response = app
        .oneshot(authed_get("/api/dashboard", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["userName"], "Ada");
    assert_eq!(body["data"]["stats"]["upcomingCount"], 1);
}

#[tokio::test]
async fn test_calendar_details_route() {
    let (app, store) = app();
    let cookie = signup(&app).await;

    let details_request = |body: Value| {
        let mut request = json_request("POST", "/api/calendars/details", body);
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        request
    };

    let response = app
        .clone()
        .oneshot(details_request(json!({ "calendarIds": ["primary"] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user = store
        .get_user_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    store.set_connected_account(&user.id, "ca_123").await.unwrap();

    let response = app
        .clone()
        .oneshot(details_request(json!({ "calendarIds": ["primary", "gone"] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["summary"]["total"], 2);
    assert_eq!(body["data"]["summary"]["successful"], 1);
    assert_eq!(body["data"]["summary"]["failed"], 1);
    assert_eq!(body["data"]["successful"][0]["calendarId"], "primary");
    assert_eq!(body["data"]["successful"][0]["details"]["summary"], "Work");
    assert_eq!(body["data"]["failed"][0]["calendarId"], "gone");

    let response = app
        .oneshot(details_request(json!({ "calendarIds": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_without_assistant_is_bad_gateway() {
    let (app, store) = app();
    let cookie = signup(&app).await;

    let user = store
        .get_user_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    store.set_connected_account(&user.id, "ca_123").await.unwrap();

    let response = app
        .oneshot(authed_get("/api/chat", &cookie))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_google_auth_not_configured() {
    let (app, _) = app();
    let cookie = signup(&app).await;

    let response = app
        .oneshot(authed_get("/api/auth/google", &cookie))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_google_callback_rejects_unknown_state() {
    let (app, _) = app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/google/callback?code=abc&state=unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get(header::LOCATION).unwrap();
    assert!(location.to_str().unwrap().contains("error="));
}
