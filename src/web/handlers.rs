use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::auth::{hash_password, verify_password, AuthUser};
use super::AppState;
use crate::components::session_store::UserRecord;
use crate::components::SessionContext;
use crate::error::{auth_error, config_error, invalid_input_error, DashResult, Error};
use crate::service::BoardIssue;

/// JSON envelope shared by every API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

impl Error {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotConnected | Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NoCalendars => StatusCode::NOT_FOUND,
            Error::GoogleCalendar(_) | Error::Composio(_) | Error::Assistant(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Environment(_)
            | Error::Config(_)
            | Error::Store(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        failure(status, self.to_string())
    }
}

/// Build the caller's session context from the store
async fn session_context(state: &AppState, user: &AuthUser) -> DashResult<SessionContext> {
    let connected_account_id = state.store.get_connected_account(user.user_id()).await?;
    Ok(SessionContext::new(user.user_id(), connected_account_id))
}

/// Public view of a user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

impl From<&UserRecord> for UserView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.display_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

fn require_field(value: &str, name: &str) -> DashResult<()> {
    if value.trim().is_empty() {
        return Err(invalid_input_error(&format!("{} is required", name)));
    }
    Ok(())
}

/// Handler for health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Create an account and start a session
pub async fn signup_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<SignupForm>,
) -> Result<impl IntoResponse, Error> {
    require_field(&form.email, "email")?;
    require_field(&form.password, "password")?;

    let user = UserRecord {
        id: Uuid::new_v4().to_string(),
        email: form.email.trim().to_string(),
        display_name: form
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        password_hash: hash_password(&form.password).await?,
    };
    state.store.create_user(&user).await?;

    let token = state
        .auth
        .generate_token(&user.id, user.display_name.clone(), &user.email)?;
    info!("User {} signed up", user.id);

    Ok((
        StatusCode::CREATED,
        jar.add(state.auth.session_cookie(token)),
        ApiResponse::ok(UserView::from(&user)),
    ))
}

/// Verify credentials and start a session
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<impl IntoResponse, Error> {
    require_field(&form.email, "email")?;
    require_field(&form.password, "password")?;

    let user = state.store.get_user_by_email(&form.email).await?;
    let verified = match &user {
        Some(user) => verify_password(&form.password, &user.password_hash).await,
        None => false,
    };
    let user = match user {
        Some(user) if verified => user,
        _ => {
            warn!("Failed login attempt");
            return Err(auth_error("Invalid credentials"));
        }
    };

    let token = state
        .auth
        .generate_token(&user.id, user.display_name.clone(), &user.email)?;
    info!("User {} successfully authenticated", user.id);

    Ok((
        jar.add(state.auth.session_cookie(token)),
        ApiResponse::ok(UserView::from(&user)),
    ))
}

/// End the session
pub async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (jar.remove(state.auth.removal_cookie()), ApiResponse::ok(()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthView {
    pub already_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
}

/// Consent URL for the direct Google integration
pub async fn google_auth_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, Error> {
    let oauth = state
        .google_oauth
        .as_ref()
        .ok_or_else(|| config_error("Google OAuth is not configured"))?;

    if state.store.get_google_tokens(user.user_id()).await?.is_some() {
        return Ok(ApiResponse::ok(GoogleAuthView {
            already_connected: true,
            auth_url: None,
        }));
    }

    let nonce = Uuid::new_v4().to_string();
    state.store.save_oauth_state(&nonce, user.user_id()).await?;

    Ok(ApiResponse::ok(GoogleAuthView {
        already_connected: false,
        auth_url: Some(oauth.authorization_url(&nonce)?),
    }))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn dashboard_redirect(query: &str) -> Redirect {
    Redirect::to(&format!("/dashboard?{}", query))
}

/// Google redirects here after consent
pub async fn google_callback_handler(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallback>,
) -> Redirect {
    if let Some(err) = params.error {
        warn!("Google OAuth returned an error: {}", err);
        return dashboard_redirect("error=oauth_denied");
    }

    let (Some(code), Some(nonce)) = (params.code, params.state) else {
        return dashboard_redirect("error=missing_code");
    };

    let Some(oauth) = state.google_oauth.as_ref() else {
        return dashboard_redirect("error=not_configured");
    };

    let user_id = match state.store.take_oauth_state(&nonce).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return dashboard_redirect("error=invalid_state"),
        Err(e) => {
            error!("Failed to read OAuth state: {}", e);
            return dashboard_redirect("error=callback_failed");
        }
    };

    let result = async {
        let tokens = oauth.exchange_code(&code).await?;
        state.store.save_google_tokens(&user_id, &tokens).await
    }
    .await;

    match result {
        Ok(()) => {
            info!("Stored Google tokens for user {}", user_id);
            dashboard_redirect("auth=success&provider=google")
        }
        Err(e) => {
            error!("Google OAuth callback failed: {}", e);
            dashboard_redirect("error=callback_failed")
        }
    }
}

/// Start a broker connection for the caller
pub async fn composio_link_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, Error> {
    let composio = state
        .composio
        .as_ref()
        .ok_or_else(|| config_error("Integration broker is not configured"))?;

    let link = composio.link(user.user_id()).await?;
    Ok(ApiResponse::ok(link))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    pub connected: bool,
    pub connected_account_id: Option<String>,
    pub provider: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionForm {
    pub connected_account_id: String,
}

async fn connection_view(state: &AppState, user: &AuthUser) -> DashResult<ConnectionView> {
    let ctx = session_context(state, user).await?;
    let provider = state.service.provider();
    Ok(ConnectionView {
        connected: provider.is_connected(&ctx).await?,
        connected_account_id: ctx.connected_account_id,
        provider: provider.name(),
    })
}

pub async fn get_connection_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, Error> {
    Ok(ApiResponse::ok(connection_view(&state, &user).await?))
}

pub async fn put_connection_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Json(form): Json<ConnectionForm>,
) -> Result<impl IntoResponse, Error> {
    require_field(&form.connected_account_id, "connectedAccountId")?;
    state
        .store
        .set_connected_account(user.user_id(), form.connected_account_id.trim())
        .await?;
    info!("Stored connected account for user {}", user.user_id());
    Ok(ApiResponse::ok(connection_view(&state, &user).await?))
}

pub async fn delete_connection_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, Error> {
    state.store.remove_connected_account(user.user_id()).await?;
    Ok(ApiResponse::ok(connection_view(&state, &user).await?))
}

pub async fn calendars_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, Error> {
    let ctx = session_context(&state, &user).await?;
    let calendars = state.service.list_calendars(&ctx).await?;
    Ok(ApiResponse::ok(calendars))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDetailsForm {
    #[serde(default)]
    pub calendar_ids: Vec<String>,
}

/// Details of the requested calendars with per-calendar failures
pub async fn calendar_details_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Json(form): Json<CalendarDetailsForm>,
) -> Result<impl IntoResponse, Error> {
    let ctx = session_context(&state, &user).await?;
    let report = state
        .service
        .calendar_details(&ctx, &form.calendar_ids)
        .await?;
    Ok(ApiResponse::ok(report))
}

#[derive(Debug, Deserialize)]
pub struct MeetingsQuery {
    pub limit: Option<usize>,
}

/// Aggregated meeting board
pub async fn meetings_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<MeetingsQuery>,
) -> Result<Response, Error> {
    let ctx = session_context(&state, &user).await?;
    let board = state.service.refresh(&ctx, query.limit).await;

    let status = match board.issue {
        Some(BoardIssue::NotConnected) => StatusCode::UNAUTHORIZED,
        Some(BoardIssue::ListingFailed) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };

    if status.is_success() {
        Ok(ApiResponse::ok(board).into_response())
    } else {
        let message = board.error.unwrap_or_else(|| status.to_string());
        Ok(failure(status, message))
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub prompt: Option<String>,
}

/// Assistant summary of the chat window
pub async fn chat_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ChatQuery>,
) -> Result<impl IntoResponse, Error> {
    let ctx = session_context(&state, &user).await?;
    let response = state.service.get_chat(&ctx, query.prompt.as_deref()).await?;
    Ok(ApiResponse::ok(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub user_name: Option<String>,
    #[serde(flatten)]
    pub overview: crate::service::DashboardOverview,
}

/// Greeting and statistics for the landing page
pub async fn dashboard_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, Error> {
    let ctx = session_context(&state, &user).await?;
    let overview = state.service.overview(&ctx).await;
    Ok(ApiResponse::ok(DashboardView {
        user_name: user.claims.name.clone(),
        overview,
    }))
}
