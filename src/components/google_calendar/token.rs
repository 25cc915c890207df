use super::models::{GoogleTokens, TokenResponse};
use crate::components::SessionStore;
use crate::config::GoogleSettings;
use crate::error::{google_calendar_error, DashResult, Error};
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read-only scopes requested during consent
pub const CALENDAR_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/calendar.events.readonly",
];

/// Refresh this many seconds before the token actually expires
const EXPIRY_MARGIN_SECONDS: i64 = 60;

/// Google OAuth endpoints and client credentials
#[derive(Clone)]
pub struct GoogleOAuth {
    settings: GoogleSettings,
    auth_url: String,
    token_url: String,
    client: Client,
}

impl GoogleOAuth {
    pub fn new(settings: GoogleSettings) -> Self {
        Self::with_endpoints(settings, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL)
    }

    /// Point the OAuth flow at other endpoints
    pub fn with_endpoints(
        settings: GoogleSettings,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            client: Client::new(),
        }
    }

    /// Consent screen URL carrying our `state` nonce
    pub fn authorization_url(&self, state: &str) -> DashResult<String> {
        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &CALENDAR_SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> DashResult<GoogleTokens> {
        let params = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        let response = self.request_tokens(&params).await?;
        Ok(Self::into_tokens(response, None))
    }

    /// Get a fresh access token, keeping the existing refresh token
    pub async fn refresh(&self, refresh_token: &str) -> DashResult<GoogleTokens> {
        let params = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.request_tokens(&params).await?;
        Ok(Self::into_tokens(response, Some(refresh_token)))
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> DashResult<TokenResponse> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "Token request failed: HTTP {} - {}",
                status, error_body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse token response: {}", e)))
    }

    fn into_tokens(response: TokenResponse, previous_refresh: Option<&str>) -> GoogleTokens {
        let expires_in = response.expires_in.unwrap_or(3600);
        GoogleTokens {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            scope: response.scope,
            token_type: response.token_type,
            expires_at: Utc::now().timestamp() + expires_in,
        }
    }
}

/// Commands that can be sent to the token actor
pub enum TokenCommand {
    GetAccessToken(String, oneshot::Sender<DashResult<String>>),
    Shutdown,
}

/// Serializes token lookups so concurrent calendar fetches share one refresh
pub struct TokenActor {
    oauth: GoogleOAuth,
    store: Arc<dyn SessionStore>,
    command_rx: mpsc::Receiver<TokenCommand>,
}

/// Handle for communicating with the token actor
#[derive(Clone)]
pub struct TokenHandle {
    command_tx: mpsc::Sender<TokenCommand>,
}

impl TokenHandle {
    /// Create the actor and spawn its processing loop
    pub fn spawn(oauth: GoogleOAuth, store: Arc<dyn SessionStore>) -> Self {
        let (mut actor, handle) = TokenActor::new(oauth, store);
        tokio::spawn(async move {
            actor.run().await;
        });
        handle
    }

    /// Valid access token for the user, refreshed if needed
    pub async fn get_access_token(&self, user_id: &str) -> DashResult<String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(TokenCommand::GetAccessToken(user_id.to_string(), response_tx))
            .await
            .map_err(|e| google_calendar_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .await
            .map_err(|_| google_calendar_error("Response channel closed"))?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> DashResult<()> {
        let _ = self.command_tx.send(TokenCommand::Shutdown).await;
        Ok(())
    }
}

impl TokenActor {
    /// Create a new actor and return its handle
    pub fn new(oauth: GoogleOAuth, store: Arc<dyn SessionStore>) -> (Self, TokenHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let actor = Self {
            oauth,
            store,
            command_rx,
        };
        (actor, TokenHandle { command_tx })
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Google token actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                TokenCommand::GetAccessToken(user_id, response_tx) => {
                    let result = self.access_token(&user_id).await;
                    let _ = response_tx.send(result);
                }
                TokenCommand::Shutdown => {
                    info!("Google token actor shutting down");
                    break;
                }
            }
        }

        info!("Google token actor shut down");
    }

    async fn access_token(&self, user_id: &str) -> DashResult<String> {
        let tokens = self
            .store
            .get_google_tokens(user_id)
            .await?
            .ok_or(Error::NotConnected)?;

        if tokens.expires_at > Utc::now().timestamp() + EXPIRY_MARGIN_SECONDS {
            return Ok(tokens.access_token);
        }

        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| google_calendar_error("Access token expired and no refresh token stored"))?;

        info!("Refreshing Google access token for user {}", user_id);
        let refreshed = self.oauth.refresh(refresh_token).await?;
        self.store.save_google_tokens(user_id, &refreshed).await?;

        Ok(refreshed.access_token)
    }
}
